//! 安全遍历
//!
//! 三种模式都在目标表的副本引用上进行（额外压入一个槽位），
//! 结束、访问者返回错误或 panic 时栈深度都恢复到进入时的值。
//! 每次访问后栈被重置到循环深度，访问者多留下的槽位不会破坏遍历。
//! 进入前先预留所需槽位，栈无法增长时返回 [`LuaError::Memory`]。

use std::ffi::c_int;

use crate::error::LuaError;
use crate::ffi;
use crate::stack::StackGuard;
use crate::state::{Lua, Tag};

impl Lua {
    /// 目标必须是表
    pub(crate) fn expect_table(&self, index: c_int) -> Result<(), LuaError> {
        match self.tag(index) {
            Tag::Table => Ok(()),
            found => Err(LuaError::TypeMismatch {
                expected: "table",
                found,
            }),
        }
    }

    /// 顺序遍历：按 `1..=len` 访问，值位于 -1
    ///
    /// 长度由 VM 的边界语义决定，不在此处重新计算。
    pub fn for_each_index<E, F>(&self, index: c_int, mut visit: F) -> Result<(), E>
    where
        E: From<LuaError>,
        F: FnMut(&Lua, i64) -> Result<(), E>,
    {
        self.expect_table(index)?;
        let len = self.len(index);
        // 表副本 + 当前元素
        self.reserve(2)?;

        let guard = StackGuard::new(self);
        self.push_copy(index);
        let table = self.top();

        for i in 1..=len {
            unsafe { ffi::lua_rawgeti(self.raw(), table, i) };
            visit(self, i)?;
            self.set_top(table);
        }

        drop(guard);
        Ok(())
    }

    /// 只访问字符串键的条目，键已解码，值位于 -1；顺序由表的原生枚举决定
    pub fn for_each_named<E, F>(&self, index: c_int, mut visit: F) -> Result<(), E>
    where
        E: From<LuaError>,
        F: FnMut(&Lua, &str) -> Result<(), E>,
    {
        self.for_each_pair(index, |lua| {
            if lua.tag(-2) == Tag::String {
                let key: String = lua.to(-2);
                visit(lua, &key)?;
            }
            Ok(())
        })
    }

    /// 访问所有条目：键位于 -2，值位于 -1，不做任何解码
    ///
    /// 访问者不得就地转换键（例如对数字键调用 `lua_tolstring`），
    /// 否则 `lua_next` 无法继续。
    pub fn for_each_pair<E, F>(&self, index: c_int, mut visit: F) -> Result<(), E>
    where
        E: From<LuaError>,
        F: FnMut(&Lua) -> Result<(), E>,
    {
        self.expect_table(index)?;
        // 表副本 + 键 + 值
        self.reserve(3)?;

        let guard = StackGuard::new(self);
        self.push_copy(index);
        let table = self.top();
        self.push_nil();

        while unsafe { ffi::lua_next(self.raw(), table) } != 0 {
            visit(self)?;
            // 只保留键，供下一次 lua_next 使用
            self.set_top(table + 1);
        }

        drop(guard);
        Ok(())
    }
}
