//! 标量与指针

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr;

use super::{Check, Decode, Encode};
use crate::ffi;
use crate::state::{Lua, Tag};

impl Lua {
    /// 以字节切片读取字符串或数字槽位
    ///
    /// 数字在副本上转换，原槽位保持不变。其它类型，或栈无法再容纳副本时，
    /// 读出空切片。
    pub(crate) fn with_bytes<R>(&self, index: c_int, f: impl FnOnce(&[u8]) -> R) -> R {
        match self.tag(index) {
            Tag::String => unsafe { f(raw_bytes(self.raw(), index)) },
            Tag::Number if self.reserve(1).is_ok() => {
                self.push_copy(index);
                let result = unsafe { f(raw_bytes(self.raw(), -1)) };
                self.pop_n(1);
                result
            }
            _ => f(&[]),
        }
    }
}

/// # Safety
/// 槽位必须是字符串；返回的切片只在该值留在栈上时有效。
unsafe fn raw_bytes<'a>(raw: *mut ffi::lua_State, index: c_int) -> &'a [u8] {
    let mut len = 0usize;
    let data = ffi::lua_tolstring(raw, index, &mut len);
    if data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(data as *const u8, len)
    }
}

// ==================== 整数 ====================

macro_rules! impl_integer {
    (@codec $ty:ty, |$v:ident| $fits:expr) => {
        impl Encode for $ty {
            fn push(&self, lua: &Lua) {
                unsafe { ffi::lua_pushinteger(lua.raw(), *self as ffi::lua_Integer) };
            }
        }

        impl Check for $ty {
            fn is(lua: &Lua, index: c_int) -> bool {
                if lua.tag(index) != Tag::Number {
                    return false;
                }
                let mut exact: c_int = 0;
                let $v = unsafe { ffi::lua_tointegerx(lua.raw(), index, &mut exact) };
                exact != 0 && $fits
            }
        }

        impl Decode for $ty {
            fn to(lua: &Lua, index: c_int) -> Self {
                let v = unsafe { ffi::lua_tointegerx(lua.raw(), index, ptr::null_mut()) };
                v as $ty
            }
        }
    };
    ($($ty:ty),* $(,)?) => {$(
        impl_integer!(@codec $ty, |v| <$ty>::try_from(v).is_ok());
    )*};
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32);

// 64 位无符号数与 lua_Integer 按位互转：u64::MAX 在 VM 中是 -1
impl_integer!(@codec u64, |v| v as u64 as ffi::lua_Integer == v);
impl_integer!(@codec usize, |v| v as usize as ffi::lua_Integer == v);

// ==================== 浮点 ====================

macro_rules! impl_float {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode for $ty {
            fn push(&self, lua: &Lua) {
                unsafe { ffi::lua_pushnumber(lua.raw(), *self as ffi::lua_Number) };
            }
        }

        impl Check for $ty {
            fn is(lua: &Lua, index: c_int) -> bool {
                lua.tag(index) == Tag::Number
            }
        }

        impl Decode for $ty {
            fn to(lua: &Lua, index: c_int) -> Self {
                unsafe { ffi::lua_tonumberx(lua.raw(), index, ptr::null_mut()) as $ty }
            }
        }
    )*};
}

impl_float!(f32, f64);

// ==================== 布尔 ====================

impl Encode for bool {
    fn push(&self, lua: &Lua) {
        unsafe { ffi::lua_pushboolean(lua.raw(), c_int::from(*self)) };
    }
}

impl Check for bool {
    fn is(lua: &Lua, index: c_int) -> bool {
        lua.tag(index) == Tag::Boolean
    }
}

impl Decode for bool {
    fn to(lua: &Lua, index: c_int) -> Self {
        unsafe { ffi::lua_toboolean(lua.raw(), index) != 0 }
    }
}

// ==================== 字符串 ====================

impl Encode for str {
    fn push(&self, lua: &Lua) {
        unsafe { ffi::lua_pushlstring(lua.raw(), self.as_ptr() as *const c_char, self.len()) };
    }
}

impl Encode for String {
    fn push(&self, lua: &Lua) {
        self.as_str().push(lua)
    }
}

impl Encode for CStr {
    fn push(&self, lua: &Lua) {
        let bytes = self.to_bytes();
        unsafe { ffi::lua_pushlstring(lua.raw(), bytes.as_ptr() as *const c_char, bytes.len()) };
    }
}

impl Encode for CString {
    fn push(&self, lua: &Lua) {
        self.as_c_str().push(lua)
    }
}

impl Check for String {
    fn is(lua: &Lua, index: c_int) -> bool {
        lua.tag(index) == Tag::String
    }
}

impl Check for CString {
    fn is(lua: &Lua, index: c_int) -> bool {
        lua.tag(index) == Tag::String
    }
}

impl Decode for String {
    fn to(lua: &Lua, index: c_int) -> Self {
        lua.with_bytes(index, |bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Decode for CString {
    /// 截断到第一个 NUL
    fn to(lua: &Lua, index: c_int) -> Self {
        lua.with_bytes(index, |bytes| {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            CString::new(&bytes[..end]).unwrap_or_default()
        })
    }
}

// ==================== 指针 ====================

impl<T> Encode for *mut T {
    fn push(&self, lua: &Lua) {
        unsafe { ffi::lua_pushlightuserdata(lua.raw(), *self as *mut c_void) };
    }
}

impl<T> Encode for *const T {
    fn push(&self, lua: &Lua) {
        unsafe { ffi::lua_pushlightuserdata(lua.raw(), *self as *mut c_void) };
    }
}

impl<T> Check for *mut T {
    fn is(lua: &Lua, index: c_int) -> bool {
        matches!(lua.tag(index), Tag::LightUserData | Tag::UserData)
    }
}

impl<T> Check for *const T {
    fn is(lua: &Lua, index: c_int) -> bool {
        matches!(lua.tag(index), Tag::LightUserData | Tag::UserData)
    }
}

impl<T> Decode for *mut T {
    fn to(lua: &Lua, index: c_int) -> Self {
        unsafe { ffi::lua_touserdata(lua.raw(), index) as *mut T }
    }
}

impl<T> Decode for *const T {
    fn to(lua: &Lua, index: c_int) -> Self {
        unsafe { ffi::lua_touserdata(lua.raw(), index) as *const T }
    }
}

// ==================== unit ====================

/// `()` 表示“没有值”：压入 nil，解码时忽略槽位内容
impl Encode for () {
    fn push(&self, lua: &Lua) {
        lua.push_nil();
    }
}

impl Check for () {
    fn is(lua: &Lua, index: c_int) -> bool {
        lua.tag(index) == Tag::Nil
    }
}

impl Decode for () {
    #[allow(unused_variables)]
    fn to(lua: &Lua, index: c_int) -> Self {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_checks_exactness() {
        let lua = Lua::new().unwrap();
        lua.do_string("return 42.0, 42.5, '12'", 3).unwrap();
        assert!(lua.is::<i32>(-3));
        assert!(!lua.is::<i32>(-2));
        assert!(!lua.is::<i32>(-1));
        assert!(lua.is::<f64>(-2));
        assert_eq!(lua.to::<i32>(-3), 42);
        lua.pop_n(3);
    }

    #[test]
    fn test_integer_range_check() {
        let lua = Lua::new().unwrap();
        lua.push(&300i32);
        assert!(lua.is::<i32>(-1));
        assert!(!lua.is::<u8>(-1));
        lua.push(&-1i64);
        assert!(!lua.is::<u32>(-1));
        assert!(lua.is::<i8>(-1));
        lua.pop_n(2);
    }

    #[test]
    fn test_string_decode_keeps_number_slot() {
        let lua = Lua::new().unwrap();
        lua.push(&7);
        assert_eq!(lua.to::<String>(-1), "7");
        assert_eq!(lua.tag(-1), Tag::Number);
        assert!(!lua.is::<String>(-1));
        lua.pop_n(1);
    }

    #[test]
    fn test_cstring_truncates_at_nul() {
        let lua = Lua::new().unwrap();
        lua.push("ab\0cd");
        assert_eq!(lua.to::<String>(-1), "ab\0cd");
        assert_eq!(lua.pop::<CString>().as_bytes(), b"ab");
    }

    #[test]
    fn test_unit_is_nil() {
        let lua = Lua::new().unwrap();
        lua.push(&());
        assert!(lua.is::<()>(-1));
        assert_eq!(lua.tag(-1), Tag::Nil);
        lua.pop::<()>();
        lua.ensure(0).unwrap();
    }

    #[test]
    fn test_large_unsigned_wraps_bitwise() {
        let lua = Lua::new().unwrap();
        lua.push(&u64::MAX);
        assert_eq!(lua.to::<i64>(-1), -1);
        assert!(lua.is::<u64>(-1));
        assert_eq!(lua.pop::<u64>(), u64::MAX);

        lua.push(&(i64::MAX as u64 + 1));
        assert!(lua.is::<u64>(-1));
        assert!(!lua.is::<u32>(-1));
        assert_eq!(lua.pop::<u64>(), i64::MAX as u64 + 1);
        lua.ensure(0).unwrap();
    }
}
