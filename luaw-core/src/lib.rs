//! Luaw Core - 类型导向的 Lua 栈编组层
//!
//! 在 Rust 宿主类型与 Lua 5.4 虚拟机共享栈之间进行双向转换：
//! - `codec`  - push / is / to / pop 协议（标量、指针、序列、可选值、元组、映射、记录）
//! - `stack`  - 栈平衡断言、作用域回滚、结构化 dump
//! - `path`   - 点分路径的字段读取 / 检测 / 写入
//! - `iter`   - 三种不修改源表的安全遍历
//! - `call`   - 加载与受保护调用，状态码翻译为 [`LuaError`]
//! - `record` - 宿主记录类型与 userdata 的桥接
//!
//! 配置在构造时显式传入，不使用全局状态。
//!
//! ```ignore
//! use luaw_core::Lua;
//!
//! let lua = Lua::new()?;
//! lua.do_string("function dbl(x) return x * 2 end", 0)?;
//! let n: i32 = lua.call_global("dbl", (24,))?;
//! assert_eq!(n, 48);
//! ```

pub mod call;
pub mod codec;
pub mod error;
mod iter;
mod path;
pub mod record;
pub mod stack;
pub mod state;

/// Lua 5.4 C API（由 `mlua-sys` 提供）
pub use mlua_sys as ffi;

pub use call::{Args, MULTRET};
pub use codec::{Check, Decode, Encode};
pub use error::{ErrorKind, LuaError};
pub use record::Record;
pub use stack::StackGuard;
pub use state::{Lua, Tag};

// Re-export config types from luaw-config
pub use luaw_config::{LimitConfig, Phase, StateConfig};

/// 各阶段的日志 target（与 [`Phase::target`] 一致）
pub mod targets {
    pub const STATE: &str = "luaw::state";
    pub const LOAD: &str = "luaw::load";
    pub const CALL: &str = "luaw::call";
    pub const PATH: &str = "luaw::path";
    pub const STACK: &str = "luaw::stack";
    pub const RECORD: &str = "luaw::record";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_match_phases() {
        let targets = [
            targets::STATE,
            targets::LOAD,
            targets::CALL,
            targets::PATH,
            targets::STACK,
            targets::RECORD,
        ];
        for (phase, target) in Phase::ALL.iter().zip(targets) {
            assert_eq!(phase.target(), target);
        }
    }
}
