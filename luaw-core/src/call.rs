//! 加载与受保护调用
//!
//! 每个穿越 VM 边界的操作都在本地检查状态码，在栈回滚之前读出错误消息，
//! 然后以 [`LuaError`] 返回。失败后栈深度等于调用前的深度
//! 减去被消耗的可调用对象和参数。

use std::ffi::{c_char, c_int};
use std::path::Path;
use std::ptr;

use tracing::debug;

use crate::codec::{Decode, Encode};
use crate::error::LuaError;
use crate::ffi;
use crate::state::{c_name, Lua, Tag};
use crate::targets;

/// 保留全部返回值
pub const MULTRET: c_int = ffi::LUA_MULTRET;

/// 调用参数：`()` 或由 [`Encode`] 值组成的元组
pub trait Args {
    /// 参数个数
    fn count(&self) -> c_int;
    /// 依次压入所有参数
    fn push_all(&self, lua: &Lua);
}

impl Args for () {
    fn count(&self) -> c_int {
        0
    }

    #[allow(unused_variables)]
    fn push_all(&self, lua: &Lua) {}
}

macro_rules! impl_args {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Encode),+> Args for ($($name,)+) {
            fn count(&self) -> c_int {
                [$(stringify!($name)),+].len() as c_int
            }

            fn push_all(&self, lua: &Lua) {
                $( lua.push(&self.$idx); )+
            }
        }
    };
}

impl_args!(A 0);
impl_args!(A 0, B 1);
impl_args!(A 0, B 1, C 2);
impl_args!(A 0, B 1, C 2, D 3);
impl_args!(A 0, B 1, C 2, D 3, E 4);
impl_args!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_args!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_args!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// 在错误消息后附加调用栈的消息处理函数
///
/// `luaL_traceback` 可能 longjmp，调用它时不能有带析构的 Rust 值存活：
/// 消息先作为字符串压栈，再借用 VM 中的那份。
unsafe extern "C-unwind" fn traceback_handler(state: *mut ffi::lua_State) -> c_int {
    {
        let lua = Lua::from_raw(state);
        let message = lua.error_message(1);
        lua.push(message.as_str());
    }
    let message = ffi::lua_tolstring(state, -1, ptr::null_mut());
    ffi::luaL_traceback(state, state, message, 1);
    1
}

/// 跳过 `#!` 首行，保留换行以维持行号
fn strip_shebang(source: &[u8]) -> &[u8] {
    if source.first() == Some(&b'#') {
        let end = source
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(source.len());
        &source[end..]
    } else {
        source
    }
}

impl Lua {
    /// 把错误对象渲染为消息；字符串和数字按原样，其它给出类型描述
    pub(crate) fn error_message(&self, index: c_int) -> String {
        match self.tag(index) {
            Tag::String | Tag::Number => self.to::<String>(index),
            found => format!("(error object is a {found} value)"),
        }
    }

    /// 编译一段源码：成功时压入编译后的 chunk（+1），失败时 +0
    pub fn load(&self, source: &[u8], name: &str) -> Result<(), LuaError> {
        let chunk = c_name(name);
        let status = unsafe {
            ffi::luaL_loadbufferx(
                self.raw(),
                source.as_ptr() as *const c_char,
                source.len(),
                chunk.as_ptr(),
                ptr::null(),
            )
        };
        if status == ffi::LUA_OK {
            debug!(target: targets::LOAD, name, bytes = source.len(), "chunk loaded");
            return Ok(());
        }

        let message = self.error_message(-1);
        self.pop_n(1);
        debug!(target: targets::LOAD, name, status, %message, "load failed");
        Err(match status {
            ffi::LUA_ERRSYNTAX => LuaError::Syntax(message),
            ffi::LUA_ERRMEM => LuaError::Memory(message),
            _ => LuaError::Runtime(message),
        })
    }

    /// 受保护地调用栈顶 `nargs` 个参数下方的可调用对象
    ///
    /// 返回压入的结果个数。状态开启 traceback 时自动插入消息处理函数。
    pub fn invoke(&self, nargs: c_int, nresults: c_int) -> Result<c_int, LuaError> {
        if !self.uses_traceback() {
            return self.invoke_with_handler(0, nargs, nresults);
        }

        let slot = self.top() - nargs;
        self.push_function(traceback_handler);
        self.insert(slot);
        let result = self.invoke_with_handler(slot, nargs, nresults);
        self.remove(slot);
        result
    }

    /// 使用指定位置的消息处理函数（位于可调用对象下方，0 表示无）
    pub fn invoke_with_handler(
        &self,
        handler: c_int,
        nargs: c_int,
        nresults: c_int,
    ) -> Result<c_int, LuaError> {
        let handler = if handler == 0 {
            0
        } else {
            self.abs_index(handler)
        };
        let base = self.top() - nargs - 1;

        let status = unsafe { ffi::lua_pcallk(self.raw(), nargs, nresults, handler, 0, None) };
        if status == ffi::LUA_OK {
            let pushed = self.top() - base;
            debug!(target: targets::CALL, nargs, pushed, "call returned");
            return Ok(pushed);
        }

        let message = self.error_message(-1);
        self.set_top(base);
        debug!(target: targets::CALL, status, %message, "call failed");
        Err(match status {
            ffi::LUA_ERRMEM => LuaError::Memory(message),
            ffi::LUA_ERRERR => LuaError::Handler(message),
            _ => LuaError::Runtime(message),
        })
    }

    /// 在受保护模式下运行宿主 C 函数
    ///
    /// 消耗栈顶 `nargs` 个参数，成功时压入 `nresults` 个结果；
    /// 失败时参数同样被消耗，错误消息被弹出并以 [`LuaError`] 返回。
    pub(crate) fn protected(
        &self,
        function: ffi::lua_CFunction,
        nargs: c_int,
        nresults: c_int,
    ) -> Result<(), LuaError> {
        if let Err(e) = self.reserve(1) {
            self.pop_n(nargs);
            return Err(e);
        }
        self.push_function(function);
        self.insert(-nargs - 1);

        let status = unsafe { ffi::lua_pcallk(self.raw(), nargs, nresults, 0, 0, None) };
        if status == ffi::LUA_OK {
            return Ok(());
        }

        let message = self.error_message(-1);
        self.pop_n(1);
        Err(match status {
            ffi::LUA_ERRMEM => LuaError::Memory(message),
            _ => LuaError::Runtime(message),
        })
    }

    /// 加载并执行一段字节
    pub fn do_buffer(&self, source: &[u8], name: &str, nresults: c_int) -> Result<c_int, LuaError> {
        self.load(source, name)?;
        self.invoke(0, nresults)
    }

    /// 以状态的 chunk 名执行源码
    pub fn do_string(&self, source: &str, nresults: c_int) -> Result<c_int, LuaError> {
        let name = self.chunk_name().to_string();
        self.do_buffer(source.as_bytes(), &name, nresults)
    }

    /// 读取并执行文件；文件无法读取时不触及 VM
    pub fn do_file(&self, path: impl AsRef<Path>, nresults: c_int) -> Result<c_int, LuaError> {
        let path = path.as_ref();
        let source = std::fs::read(path).map_err(|e| LuaError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.do_buffer(
            strip_shebang(&source),
            &format!("@{}", path.display()),
            nresults,
        )
    }

    /// 执行源码并解码唯一的返回值
    pub fn eval<T: Decode>(&self, source: &str) -> Result<T, LuaError> {
        self.do_string(source, 1)?;
        Ok(self.pop::<T>())
    }

    /// 调用栈顶的可调用对象并解码唯一的返回值：消耗可调用对象
    pub fn call<T: Decode, A: Args>(&self, args: A) -> Result<T, LuaError> {
        self.call_push(1, args)?;
        Ok(self.pop::<T>())
    }

    /// 调用栈顶的可调用对象，结果留在栈上
    pub fn call_push<A: Args>(&self, nresults: c_int, args: A) -> Result<c_int, LuaError> {
        let nargs = args.count();
        if let Err(e) = self.reserve(nargs + 1) {
            self.pop_n(1);
            return Err(e);
        }
        args.push_all(self);
        self.invoke(nargs, nresults)
    }

    /// 调用全局函数并解码唯一的返回值
    pub fn call_global<T: Decode, A: Args>(&self, name: &str, args: A) -> Result<T, LuaError> {
        self.call_push_global(name, 1, args)?;
        Ok(self.pop::<T>())
    }

    /// 调用全局函数，结果留在栈上
    pub fn call_push_global<A: Args>(
        &self,
        name: &str,
        nresults: c_int,
        args: A,
    ) -> Result<c_int, LuaError> {
        debug!(target: targets::CALL, name, "calling global");
        self.push_global(name);
        self.call_push(nresults, args)
    }

    /// 调用路径上的函数并解码唯一的返回值
    pub fn call_field<T: Decode, A: Args>(
        &self,
        index: c_int,
        path: &str,
        args: A,
    ) -> Result<T, LuaError> {
        self.call_push_field(index, path, 1, args)?;
        Ok(self.pop::<T>())
    }

    /// 调用路径上的函数，结果留在栈上
    pub fn call_push_field<A: Args>(
        &self,
        index: c_int,
        path: &str,
        nresults: c_int,
        args: A,
    ) -> Result<c_int, LuaError> {
        debug!(target: targets::CALL, path, "calling field");
        self.get_field(index, path)?;
        self.call_push(nresults, args)
    }

    /// 压入全局变量：+1
    pub fn push_global(&self, name: &str) {
        let name = c_name(name);
        self.grow(1);
        unsafe { ffi::lua_getglobal(self.raw(), name.as_ptr()) };
    }

    /// 读取并解码全局变量：+0
    pub fn get_global<T: Decode>(&self, name: &str) -> T {
        self.push_global(name);
        self.pop::<T>()
    }

    /// 编码 `value` 并赋给全局变量：+0
    pub fn set_global<T: Encode + ?Sized>(&self, name: &str, value: &T) {
        self.push(value);
        let name = c_name(name);
        unsafe { ffi::lua_setglobal(self.raw(), name.as_ptr()) };
    }

    /// 压入宿主 C 函数：+1
    pub fn push_function(&self, function: ffi::lua_CFunction) {
        self.grow(1);
        unsafe { ffi::lua_pushcclosure(self.raw(), function, 0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_count() {
        assert_eq!(().count(), 0);
        assert_eq!((1,).count(), 1);
        assert_eq!((1, "two", 3.0).count(), 3);
        assert_eq!((1, 2, 3, 4, 5, 6, 7, 8).count(), 8);
    }

    #[test]
    fn test_strip_shebang_keeps_line_numbers() {
        assert_eq!(strip_shebang(b"#!/usr/bin/lua\nreturn 1"), b"\nreturn 1");
        assert_eq!(strip_shebang(b"return 1"), b"return 1");
        assert_eq!(strip_shebang(b"#"), b"");
    }

    #[test]
    fn test_error_object_description() {
        let lua = Lua::new().unwrap();
        let err = lua.do_string("error({})", 0).unwrap_err();
        assert_eq!(
            err,
            LuaError::Runtime("(error object is a table value)".into())
        );
        let err = lua.do_string("error(7)", 0).unwrap_err();
        assert_eq!(err, LuaError::Runtime("7".into()));
        lua.ensure(0).unwrap();
    }

    #[test]
    fn test_multret_keeps_all_results() {
        let lua = Lua::new().unwrap();
        let pushed = lua.do_string("return 1, 2, 3", MULTRET).unwrap();
        assert_eq!(pushed, 3);
        assert_eq!(lua.pop::<i32>(), 3);
        lua.pop_n(2);
        lua.ensure(0).unwrap();
    }

    #[test]
    fn test_load_failure_pops_message() {
        let lua = Lua::new().unwrap();
        lua.push(&1);
        let err = lua.load(b"return +", "broken").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SyntaxError);
        lua.ensure(1).unwrap();
        lua.pop_n(1);
    }

    #[test]
    fn test_globals() {
        let lua = Lua::new().unwrap();
        lua.set_global("answer", &42);
        assert_eq!(lua.get_global::<i32>("answer"), 42);
        assert_eq!(lua.eval::<i32>("return answer + 1").unwrap(), 43);
        lua.ensure(0).unwrap();
    }
}
