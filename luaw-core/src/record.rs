//! 宿主记录类型桥接
//!
//! 两种接入方式：
//! - 实现 [`Record`] 并用 [`impl_record!`](crate::impl_record) 接入编解码协议，
//!   值以普通表的形式写入 VM；
//! - [`Lua::push_userdata`] 把值原地移动到 VM 管理的 userdata 中，
//!   由 VM 的垃圾回收器触发终结器析构。
//!
//! 每个宿主类型共享一张元表，以 `type_name::<T>()` 为键登记在注册表中。

use std::any::type_name;
use std::ffi::{c_int, c_long, c_void};
use std::marker::PhantomData;
use std::mem::{align_of, size_of, ManuallyDrop};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use tracing::{debug, warn};

use crate::codec::{Check, Decode, Encode};
use crate::ffi;
use crate::state::{c_name, Lua, Tag};
use crate::targets;

/// 记录类型的能力契约
pub trait Record: Sized {
    /// 把字段写入一个新值：+1
    fn write_into(&self, lua: &Lua);
    /// 从槽位重建：+0
    fn read_from(lua: &Lua, index: c_int) -> Self;
    /// 结构检测（通常是"所有必需字段都存在"）：+0
    fn matches(lua: &Lua, index: c_int) -> bool;
}

/// 为实现了 [`Record`] 的类型接入 [`Encode`] / [`Check`] / [`Decode`]
///
/// 写入时若该类型已通过 [`Lua::set_metatable`] 注册元表，则附加到新值上。
#[macro_export]
macro_rules! impl_record {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::Encode for $t {
                fn push(&self, lua: &$crate::Lua) {
                    $crate::Record::write_into(self, lua);
                    lua.attach_metatable::<$t>(-1);
                }
            }

            impl $crate::Check for $t {
                fn is(lua: &$crate::Lua, index: ::std::ffi::c_int) -> bool {
                    <$t as $crate::Record>::matches(lua, index)
                }
            }

            impl $crate::Decode for $t {
                fn to(lua: &$crate::Lua, index: ::std::ffi::c_int) -> Self {
                    <$t as $crate::Record>::read_from(lua, index)
                }
            }
        )+
    };
}

/// VM 对 userdata 内存块保证的最大对齐
#[allow(dead_code)]
#[repr(C)]
union MaxAlign {
    number: f64,
    pointer: *const c_void,
    integer: i64,
    long: c_long,
}

/// userdata 内存布局：值位于偏移 0，`live` 标记值是否尚未析构
#[repr(C)]
struct Slot<T> {
    value: ManuallyDrop<T>,
    live: bool,
}

struct Layout<T>(PhantomData<T>);

impl<T> Layout<T> {
    /// 对齐超出 VM 保证时编译失败
    const FITS: () = assert!(
        align_of::<Slot<T>>() <= align_of::<MaxAlign>(),
        "type alignment exceeds the VM userdata alignment"
    );
}

fn metatable_name<T: 'static>() -> std::ffi::CString {
    c_name(type_name::<T>())
}

/// `__gc`：最多析构一次，重复调用是空操作
unsafe extern "C-unwind" fn finalize<T: 'static>(state: *mut ffi::lua_State) -> c_int {
    let name = metatable_name::<T>();
    let slot = ffi::luaL_testudata(state, 1, name.as_ptr()) as *mut Slot<T>;
    if slot.is_null() || !(*slot).live {
        return 0;
    }
    (*slot).live = false;

    let value = &mut (*slot).value;
    if catch_unwind(AssertUnwindSafe(|| ManuallyDrop::drop(value))).is_err() {
        warn!(target: targets::RECORD, ty = type_name::<T>(), "finalizer panicked");
    }
    0
}

impl Lua {
    /// 压入 `T` 的共享元表（首次使用时创建并安装 `__gc`）：+1
    pub fn ensure_metatable<T: 'static>(&self) {
        let raw = self.raw();
        let name = metatable_name::<T>();
        self.grow(2);
        let created = unsafe { ffi::luaL_newmetatable(raw, name.as_ptr()) } != 0;
        if created {
            self.push_function(finalize::<T>);
            unsafe { ffi::lua_setfield(raw, -2, c_name("__gc").as_ptr()) };
            self.push_copy(-1);
            unsafe { ffi::lua_setfield(raw, -2, c_name("__index").as_ptr()) };
            debug!(target: targets::RECORD, ty = type_name::<T>(), "metatable created");
        }
    }

    /// 把回调安装到 `T` 的共享元表；`__gc` 始终保留为内置终结器
    pub fn set_metatable<T: 'static>(&self, methods: &[(&str, ffi::lua_CFunction)]) {
        self.ensure_metatable::<T>();
        self.grow(1);
        for (name, function) in methods {
            if *name == "__gc" {
                warn!(target: targets::RECORD, ty = type_name::<T>(), "ignoring user __gc");
                continue;
            }
            self.push_function(*function);
            let key = c_name(name);
            unsafe { ffi::lua_setfield(self.raw(), -2, key.as_ptr()) };
        }
        self.pop_n(1);
    }

    /// 若 `T` 已注册元表且槽位是表或 userdata，则附加元表：+0
    pub fn attach_metatable<T: 'static>(&self, index: c_int) {
        if !matches!(self.tag(index), Tag::Table | Tag::UserData) {
            return;
        }
        let index = self.abs_index(index);
        let name = metatable_name::<T>();
        self.grow(1);
        let found = unsafe { ffi::lua_getfield(self.raw(), ffi::LUA_REGISTRYINDEX, name.as_ptr()) };
        if found == ffi::LUA_TTABLE {
            unsafe { ffi::lua_setmetatable(self.raw(), index) };
        } else {
            self.pop_n(1);
        }
    }

    /// 把 `value` 移入新的 userdata 并附加 `T` 的元表：+1
    ///
    /// 返回的指针在 userdata 可达期间有效。
    pub fn push_userdata<T: 'static>(&self, value: T) -> *mut T {
        #[allow(clippy::let_unit_value)]
        let () = Layout::<T>::FITS;

        let raw = self.raw();
        self.grow(1);
        let slot = unsafe { ffi::lua_newuserdatauv(raw, size_of::<Slot<T>>(), 0) } as *mut Slot<T>;
        unsafe {
            ptr::write(
                slot,
                Slot {
                    value: ManuallyDrop::new(value),
                    live: true,
                },
            )
        };
        self.ensure_metatable::<T>();
        unsafe { ffi::lua_setmetatable(raw, -2) };

        debug!(target: targets::RECORD, ty = type_name::<T>(), "userdata pushed");
        slot as *mut T
    }

    /// 槽位是 `T` 的 userdata 且尚未析构时返回指向值的指针：+0
    pub fn to_userdata<T: 'static>(&self, index: c_int) -> Option<*mut T> {
        let name = metatable_name::<T>();
        let slot = unsafe { ffi::luaL_testudata(self.raw(), index, name.as_ptr()) } as *mut Slot<T>;
        if slot.is_null() || unsafe { !(*slot).live } {
            None
        } else {
            Some(slot as *mut T)
        }
    }

    // ==================== 记录字段辅助 ====================

    /// 创建预分配的空表：+1
    pub fn new_table(&self, narray: c_int, nrecords: c_int) {
        self.grow(1);
        unsafe { ffi::lua_createtable(self.raw(), narray, nrecords) };
    }

    /// 不经过元方法地写入 `table[key]`；目标不是表时忽略：+0
    pub fn set_raw<T: Encode + ?Sized>(&self, index: c_int, key: &str, value: &T) {
        if self.tag(index) != Tag::Table {
            return;
        }
        let index = self.abs_index(index);
        self.push(key);
        self.push(value);
        unsafe { ffi::lua_rawset(self.raw(), index) };
    }

    /// 不经过元方法地读取 `table[key]`；目标不是表时按 nil 解码：+0
    pub fn get_raw<T: Decode>(&self, index: c_int, key: &str) -> T {
        self.push_raw(index, key);
        self.pop::<T>()
    }

    /// `table[key]` 是否可以解码为 `T`：+0
    pub fn raw_is<T: Check>(&self, index: c_int, key: &str) -> bool {
        if self.tag(index) != Tag::Table || self.reserve(1).is_err() {
            return false;
        }
        self.push_raw(index, key);
        let ok = T::is(self, -1);
        self.pop_n(1);
        ok
    }

    fn push_raw(&self, index: c_int, key: &str) {
        self.grow(1);
        if self.tag(index) != Tag::Table {
            self.push_nil();
            return;
        }
        let index = self.abs_index(index);
        self.push(key);
        unsafe { ffi::lua_rawget(self.raw(), index) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Tracked(Rc<Cell<u32>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_slot_value_at_offset_zero() {
        let lua = Lua::new().unwrap();
        let ptr = lua.push_userdata(41u64);
        unsafe { *ptr += 1 };
        let checked = lua.to_userdata::<u64>(-1).unwrap();
        assert_eq!(checked, ptr);
        assert_eq!(unsafe { *checked }, 42);
        lua.pop_n(1);
    }

    #[test]
    fn test_to_userdata_checks_type() {
        let lua = Lua::new().unwrap();
        lua.push_userdata(1u32);
        assert!(lua.to_userdata::<u32>(-1).is_some());
        assert!(lua.to_userdata::<i32>(-1).is_none());
        lua.push(&1);
        assert!(lua.to_userdata::<u32>(-1).is_none());
        lua.pop_n(2);
    }

    #[test]
    fn test_close_runs_finalizer() {
        let drops = Rc::new(Cell::new(0));
        {
            let lua = Lua::new().unwrap();
            lua.push_userdata(Tracked(drops.clone()));
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_user_gc_is_ignored() {
        #[allow(unused_variables)]
        unsafe extern "C-unwind" fn noop(state: *mut ffi::lua_State) -> c_int {
            0
        }
        let drops = Rc::new(Cell::new(0));
        let lua = Lua::new().unwrap();
        lua.set_metatable::<Tracked>(&[("__gc", noop)]);
        lua.push_userdata(Tracked(drops.clone()));
        lua.pop_n(1);
        lua.collect_garbage();
        assert_eq!(drops.get(), 1);
        lua.ensure(0).unwrap();
    }

    #[test]
    fn test_raw_helpers_on_non_table() {
        let lua = Lua::new().unwrap();
        lua.push(&5);
        lua.set_raw(-1, "x", &1);
        assert_eq!(lua.get_raw::<i32>(-1, "x"), 0);
        assert!(!lua.raw_is::<i32>(-1, "x"));
        lua.ensure(1).unwrap();
        lua.pop_n(1);
    }
}
