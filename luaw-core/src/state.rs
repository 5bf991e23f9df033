//! VM 状态
//!
//! [`Lua`] 持有一个 Lua 5.4 虚拟机实例及其唯一的共享栈。
//! 配置在构造时显式传入，不存在进程级的全局注册表。

use std::ffi::{c_int, CString};
use std::ptr::NonNull;

use luaw_config::StateConfig;
use tracing::debug;

use crate::error::LuaError;
use crate::ffi;
use crate::targets;

/// 未声明全局变量保护脚本
const STRICT_GLOBALS: &str = include_str!("strict.lua");

/// VM 报告的值类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    UserData,
    LightUserData,
    Thread,
}

impl Tag {
    /// 从 `lua_type` 的返回值转换；无效索引 (`LUA_TNONE`) 视为 nil
    pub fn from_raw(t: c_int) -> Tag {
        match t {
            ffi::LUA_TBOOLEAN => Tag::Boolean,
            ffi::LUA_TNUMBER => Tag::Number,
            ffi::LUA_TSTRING => Tag::String,
            ffi::LUA_TTABLE => Tag::Table,
            ffi::LUA_TFUNCTION => Tag::Function,
            ffi::LUA_TUSERDATA => Tag::UserData,
            ffi::LUA_TLIGHTUSERDATA => Tag::LightUserData,
            ffi::LUA_TTHREAD => Tag::Thread,
            _ => Tag::Nil,
        }
    }

    /// Lua 侧的类型名
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Nil => "nil",
            Tag::Boolean => "boolean",
            Tag::Number => "number",
            Tag::String => "string",
            Tag::Table => "table",
            Tag::Function => "function",
            Tag::UserData => "userdata",
            Tag::LightUserData => "lightuserdata",
            Tag::Thread => "thread",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lua VM 状态
///
/// 由 [`Lua::new`] / [`Lua::with_config`] 创建的实例拥有底层 `lua_State`，
/// 析构时关闭 VM（会触发所有剩余 userdata 的终结器）。
/// [`Lua::from_raw`] 创建的是不拥有状态的视图，供 C 回调使用。
pub struct Lua {
    raw: NonNull<ffi::lua_State>,
    owned: bool,
    traceback: bool,
    chunk_name: String,
}

impl Lua {
    /// 使用默认配置创建 VM（开启严格全局变量检查）
    pub fn new() -> Result<Lua, LuaError> {
        Lua::with_config(&StateConfig::default())
    }

    /// 使用显式配置创建 VM
    pub fn with_config(config: &StateConfig) -> Result<Lua, LuaError> {
        let raw = unsafe { ffi::luaL_newstate() };
        let raw = NonNull::new(raw)
            .ok_or_else(|| LuaError::Memory("cannot create state: not enough memory".into()))?;

        let lua = Lua {
            raw,
            owned: true,
            traceback: config.traceback,
            chunk_name: config.chunk_name.clone(),
        };
        unsafe { ffi::luaL_openlibs(lua.raw()) };

        if config.strict_globals {
            lua.do_buffer(STRICT_GLOBALS.as_bytes(), "=strict", 0)?;
        }

        debug!(
            target: targets::STATE,
            strict_globals = config.strict_globals,
            traceback = config.traceback,
            "state created"
        );
        Ok(lua)
    }

    /// 在已有的 `lua_State` 上创建不拥有所有权的视图
    ///
    /// 回调拿到的是活动的共享栈：进入时的栈深度不可假设。
    ///
    /// # Safety
    /// `raw` 必须是有效的、非空的 `lua_State` 指针，并且在视图存活期间保持有效。
    pub unsafe fn from_raw(raw: *mut ffi::lua_State) -> Lua {
        Lua {
            raw: NonNull::new_unchecked(raw),
            owned: false,
            traceback: false,
            chunk_name: luaw_config::DEFAULT_CHUNK_NAME.to_string(),
        }
    }

    /// 底层 `lua_State` 指针
    #[inline]
    pub fn raw(&self) -> *mut ffi::lua_State {
        self.raw.as_ptr()
    }

    /// 是否拥有底层状态
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// `do_string` 使用的 chunk 名
    pub fn chunk_name(&self) -> &str {
        &self.chunk_name
    }

    /// 受保护调用是否自动插入 traceback 处理函数
    pub(crate) fn uses_traceback(&self) -> bool {
        self.traceback
    }

    /// 查询槽位的类型标签
    #[inline]
    pub fn tag(&self, index: c_int) -> Tag {
        Tag::from_raw(unsafe { ffi::lua_type(self.raw(), index) })
    }

    /// 强制执行一次完整的垃圾回收
    pub fn collect_garbage(&self) {
        unsafe { ffi::lua_gc(self.raw(), ffi::LUA_GCCOLLECT) };
    }
}

impl Drop for Lua {
    fn drop(&mut self) {
        if self.owned {
            debug!(target: targets::STATE, "closing state");
            unsafe { ffi::lua_close(self.raw()) };
        }
    }
}

impl std::fmt::Debug for Lua {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lua")
            .field("raw", &self.raw)
            .field("owned", &self.owned)
            .field("traceback", &self.traceback)
            .field("chunk_name", &self.chunk_name)
            .finish()
    }
}

/// 把任意 `&str` 转为 C 字符串（内部 NUL 被去除）
pub(crate) fn c_name(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}
