//! 值编解码
//!
//! 每种受支持的宿主类型恰好实现一次 [`Encode`] / [`Check`] / [`Decode`]：
//! 分类由 trait 实现静态决定，重叠的分类在编译期被一致性检查拒绝，
//! 未实现的类型无法通过编译。
//!
//! | 分类 | Rust 类型 |
//! |------|-----------|
//! | 整数 | `i8`..`i64`, `u8`..`u64`, `isize`, `usize` |
//! | 浮点 | `f32`, `f64` |
//! | 布尔 | `bool` |
//! | 字符串 | `String`, `str`, `CString`, `CStr` |
//! | 指针 | `*mut T`, `*const T`（light userdata） |
//! | 序列 | `Vec<T>`, `VecDeque<T>`, `[T]` |
//! | 可选 | `Option<T>` |
//! | 元组 | `(A,)` .. `(A, B, C, D, E, F, G, H)` |
//! | 映射 | `HashMap<K, V, S>`, `BTreeMap<K, V>` |
//! | 记录 | 实现 [`Record`](crate::Record) 并通过 `impl_record!` 接入 |

use std::ffi::c_int;

use crate::error::LuaError;
use crate::state::{Lua, Tag};

mod composite;
mod scalar;

/// 压栈：+1 槽位
pub trait Encode {
    fn push(&self, lua: &Lua);
}

/// 结构兼容性检测：+0 槽位，从不失败
pub trait Check {
    fn is(lua: &Lua, index: c_int) -> bool;
}

/// 解码：+0 槽位，不修改被读取的槽位
///
/// 前提是 [`Check::is`] 成立；否则结果由实现定义（数字为 0、字符串为空、
/// 组合类型为空、指针为 null），但始终是内存安全的。
pub trait Decode: Sized {
    fn to(lua: &Lua, index: c_int) -> Self;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn push(&self, lua: &Lua) {
        (**self).push(lua)
    }
}

impl Lua {
    /// 把 `value` 编码到栈顶
    ///
    /// 先为结果预留一个槽位；组合类型在每一层为自己的临时槽位预留。
    pub fn push<T: Encode + ?Sized>(&self, value: &T) {
        self.grow(1);
        value.push(self);
    }

    /// 槽位是否可以解码为 `T`
    pub fn is<T: Check>(&self, index: c_int) -> bool {
        T::is(self, index)
    }

    /// 不检查地解码（见 [`Decode`] 的约定）
    pub fn to<T: Decode>(&self, index: c_int) -> T {
        T::to(self, index)
    }

    /// 槽位为 nil 时返回 `default`，否则解码
    pub fn to_or<T: Decode>(&self, index: c_int, default: T) -> T {
        if self.tag(index) == Tag::Nil {
            default
        } else {
            T::to(self, index)
        }
    }

    /// 先检测再解码
    pub fn try_to<T: Check + Decode>(&self, index: c_int) -> Result<T, LuaError> {
        if T::is(self, index) {
            Ok(T::to(self, index))
        } else {
            Err(LuaError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: self.tag(index),
            })
        }
    }

    /// 解码栈顶并弹出：-1 槽位
    pub fn pop<T: Decode>(&self) -> T {
        let value = T::to(self, -1);
        self.pop_n(1);
        value
    }
}
