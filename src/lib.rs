//! Luaw - typed marshalling bridge for an embedded Lua 5.4 VM
//!
//! Moves Rust values onto and off the Lua stack with statically checked
//! conversions, navigates nested tables by dotted path, iterates tables
//! without disturbing the stack, and turns every VM failure into a typed
//! [`LuaError`].
//!
//! # Architecture
//!
//! ```text
//! luaw-config/  - Pure configuration data
//! luaw-core/    - The bridge (codec, stack, path, iter, call, record)
//! luaw-api/     - Run/check orchestration and error reports
//! luaw-cli/     - The `luaw` binary
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use luaw::Lua;
//!
//! let lua = Lua::new()?;
//! lua.do_string("function dbl(x) return x * 2 end", 0)?;
//! assert_eq!(lua.call_global::<i32, _>("dbl", (24,))?, 48);
//!
//! lua.do_string("return { a = { b = { c = 84 } } }", 1)?;
//! assert_eq!(lua.field::<i32>(-1, "a.b.c")?, 84);
//! ```

// 核心层
pub use luaw_core::{
    ffi, impl_record, targets, Args, Check, Decode, Encode, ErrorKind, Lua, LuaError, Record,
    StackGuard, Tag, MULTRET,
};

// API 层
pub use luaw_api::{
    check, check_file, quick_run, run, run_file, ErrorReport, ExecuteOutput, RunConfig,
};

// 配置
pub use luaw_config::{LimitConfig, LogLevel, Phase, StateConfig};

/// 执行一段源码并解码唯一的返回值（默认配置的新 VM）
///
/// # Example
/// ```ignore
/// let n: i64 = luaw::eval("return 6 * 7")?;
/// assert_eq!(n, 42);
/// ```
pub fn eval<T: Decode>(source: &str) -> Result<T, LuaError> {
    let lua = Lua::new()?;
    lua.eval(source)
}
