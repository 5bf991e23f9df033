//! 栈纪律辅助
//!
//! - 基础栈操作（深度、复制、插入、移除）
//! - [`Lua::ensure`] 栈深度断言
//! - [`StackGuard`] 作用域回滚：无论成功、返回错误还是 panic 展开都恢复深度
//! - [`Lua::dump`] / [`Lua::dump_stack`] 结构化诊断输出

use std::ffi::c_int;
use std::ptr;

use tracing::warn;

use crate::error::LuaError;
use crate::ffi;
use crate::state::{Lua, Tag};
use crate::targets;

/// 与整数相差小于该值的数字按整数渲染
const INTEGER_EPSILON: f64 = 1e-6;

impl Lua {
    /// 当前栈深度
    #[inline]
    pub fn top(&self) -> c_int {
        unsafe { ffi::lua_gettop(self.raw()) }
    }

    /// 设置栈深度（截断或补 nil）
    #[inline]
    pub fn set_top(&self, top: c_int) {
        unsafe { ffi::lua_settop(self.raw(), top) };
    }

    /// 弹出 `n` 个槽位
    #[inline]
    pub fn pop_n(&self, n: c_int) {
        unsafe { ffi::lua_settop(self.raw(), -n - 1) };
    }

    /// 相对索引转绝对索引
    #[inline]
    pub fn abs_index(&self, index: c_int) -> c_int {
        unsafe { ffi::lua_absindex(self.raw(), index) }
    }

    /// 复制槽位到栈顶
    #[inline]
    pub fn push_copy(&self, index: c_int) {
        unsafe { ffi::lua_pushvalue(self.raw(), index) };
    }

    #[inline]
    pub fn push_nil(&self) {
        unsafe { ffi::lua_pushnil(self.raw()) };
    }

    /// 把栈顶移动到 `index`，其上的槽位依次上移
    pub fn insert(&self, index: c_int) {
        unsafe { ffi::lua_rotate(self.raw(), index, 1) };
    }

    /// 移除 `index` 处的槽位，其上的槽位依次下移
    pub fn remove(&self, index: c_int) {
        unsafe { ffi::lua_rotate(self.raw(), index, -1) };
        self.pop_n(1);
    }

    /// 确保还能再压入 `extra` 个槽位
    pub fn reserve(&self, extra: c_int) -> Result<(), LuaError> {
        if unsafe { ffi::lua_checkstack(self.raw(), extra) } != 0 {
            Ok(())
        } else {
            Err(LuaError::Memory(format!("stack overflow (cannot grow by {extra} slots)")))
        }
    }

    /// 为无法报告失败的编解码路径预留槽位
    ///
    /// 只在 VM 栈达到硬上限时失败，此时按 C API 约定抛出 Lua 错误。
    pub(crate) fn grow(&self, extra: c_int) {
        unsafe { ffi::luaL_checkstack(self.raw(), extra, ptr::null()) };
    }

    /// 断言当前栈深度
    pub fn ensure(&self, expected: c_int) -> Result<(), LuaError> {
        let actual = self.top();
        if actual == expected {
            Ok(())
        } else {
            warn!(target: targets::STACK, expected, actual, "stack imbalance");
            Err(LuaError::StackImbalance { expected, actual })
        }
    }

    /// 原始长度：表为边界，字符串为字节数，其它为 0
    pub fn len(&self, index: c_int) -> i64 {
        match self.tag(index) {
            Tag::Table | Tag::String | Tag::UserData => unsafe {
                ffi::lua_rawlen(self.raw(), index) as i64
            },
            _ => 0,
        }
    }

    /// `tostring` 语义的字符串表示（会调用 `__tostring`）
    ///
    /// 转换在受保护模式下进行；`__tostring` 出错时退回 `<类型>: <地址>`。
    pub fn to_display_string(&self, index: c_int) -> String {
        let index = self.abs_index(index);
        if self.reserve(2).is_ok() {
            self.push_copy(index);
            match self.protected(display_value, 1, 1) {
                Ok(()) => return self.pop::<String>(),
                Err(e) => warn!(target: targets::STACK, error = %e, "__tostring failed"),
            }
        }
        let ptr = unsafe { ffi::lua_topointer(self.raw(), index) };
        format!("{}: {ptr:p}", self.tag(index))
    }

    /// 单个槽位的结构化渲染，嵌套表最多展开 `max_depth` 层
    pub fn dump(&self, index: c_int, max_depth: usize) -> String {
        self.dump_at(index, max_depth, 0)
    }

    fn dump_at(&self, index: c_int, max_depth: usize, depth: usize) -> String {
        match self.tag(index) {
            Tag::Nil => "nil".to_string(),
            Tag::Boolean => self.to::<bool>(index).to_string(),
            Tag::Number => self.format_number(index),
            Tag::String => quote(&self.to::<String>(index)),
            Tag::Function => "[function]".to_string(),
            Tag::Thread => "[thread]".to_string(),
            Tag::UserData => "[userdata]".to_string(),
            Tag::LightUserData => {
                let ptr = unsafe { ffi::lua_touserdata(self.raw(), index) };
                format!("[&{ptr:p}]")
            }
            Tag::Table if depth >= max_depth => "...".to_string(),
            Tag::Table => self.dump_table(index, max_depth, depth),
        }
    }

    /// 顺序部分在前（按索引），字符串键在后（按字典序）
    fn dump_table(&self, index: c_int, max_depth: usize, depth: usize) -> String {
        let index = self.abs_index(index);

        let mut items = Vec::new();
        let sequential = self.for_each_index(index, |lua, _| {
            items.push(lua.dump_at(-1, max_depth, depth + 1));
            Ok::<(), LuaError>(())
        });

        let mut named = Vec::new();
        let by_name = self.for_each_named(index, |lua, key| {
            named.push((key.to_string(), lua.dump_at(-1, max_depth, depth + 1)));
            Ok::<(), LuaError>(())
        });

        if sequential.is_err() || by_name.is_err() {
            return "...".to_string();
        }

        named.sort_by(|a, b| a.0.cmp(&b.0));
        items.extend(named.into_iter().map(|(key, value)| format!("{key}={value}")));

        if items.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", items.join(", "))
        }
    }

    fn format_number(&self, index: c_int) -> String {
        if unsafe { ffi::lua_isinteger(self.raw(), index) } != 0 {
            self.to::<i64>(index).to_string()
        } else {
            format_float(self.to::<f64>(index))
        }
    }

    /// 从栈顶到栈底逐行渲染，每行带正负两个索引
    pub fn dump_stack(&self, max_depth: usize) -> String {
        let top = self.top();
        if top == 0 {
            return "(empty stack)".to_string();
        }
        (1..=top)
            .rev()
            .map(|i| format!("[{}/{}] {}", i, i - top - 1, self.dump(i, max_depth)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 打印 [`Lua::dump_stack`] 到标准输出
    pub fn print_stack(&self, max_depth: usize) {
        println!("{}", self.dump_stack(max_depth));
    }
}

/// 数字渲染：接近整数的按整数输出，否则按最短往返精度输出
pub fn format_float(n: f64) -> String {
    let rounded = n.round();
    if n.is_finite() && rounded.abs() < i64::MAX as f64 && (n - rounded).abs() < INTEGER_EPSILON {
        (rounded as i64).to_string()
    } else {
        n.to_string()
    }
}

/// 受保护的 `luaL_tolstring`：参数为待转换的值
unsafe extern "C-unwind" fn display_value(state: *mut ffi::lua_State) -> c_int {
    ffi::luaL_tolstring(state, 1, ptr::null_mut());
    1
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// 作用域栈回滚
///
/// 记录创建时的深度，析构时（包括 panic 展开）恢复。
pub struct StackGuard<'a> {
    lua: &'a Lua,
    top: c_int,
    armed: bool,
}

impl<'a> StackGuard<'a> {
    /// 记录当前深度
    pub fn new(lua: &'a Lua) -> Self {
        StackGuard::at(lua, lua.top())
    }

    /// 析构时恢复到指定深度
    pub fn at(lua: &'a Lua, top: c_int) -> Self {
        StackGuard {
            lua,
            top,
            armed: true,
        }
    }

    /// 守护的深度
    pub fn depth(&self) -> c_int {
        self.top
    }

    /// 把栈顶 `n` 个槽位移到守护深度之上，丢弃中间的临时槽位
    pub fn keep(mut self, n: c_int) {
        let raw = self.lua.raw();
        let top = self.lua.top();
        let n = n.clamp(0, (top - self.top).max(0));
        for i in 0..n {
            unsafe { ffi::lua_copy(raw, top - n + 1 + i, self.top + 1 + i) };
        }
        self.lua.set_top(self.top + n);
        self.armed = false;
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.lua.set_top(self.top);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(42.0), "42");
        assert_eq!(format_float(42.0000001), "42");
        assert_eq!(format_float(42.8), "42.8");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let lua = Lua::new().unwrap();
        {
            let guard = StackGuard::new(&lua);
            assert_eq!(guard.depth(), 0);
            lua.push(&1);
            lua.push(&2);
        }
        lua.ensure(0).unwrap();
    }

    #[test]
    fn test_guard_keep_moves_top() {
        let lua = Lua::new().unwrap();
        lua.push("base");
        let guard = StackGuard::new(&lua);
        lua.push(&1);
        lua.push(&2);
        lua.push(&3);
        guard.keep(1);
        assert_eq!(lua.top(), 2);
        assert_eq!(lua.pop::<i32>(), 3);
        assert_eq!(lua.pop::<String>(), "base");
    }

    #[test]
    fn test_insert_and_remove() {
        let lua = Lua::new().unwrap();
        lua.push(&1);
        lua.push(&2);
        lua.push(&3);
        lua.insert(1);
        assert_eq!(lua.to::<i32>(1), 3);
        lua.remove(1);
        assert_eq!(lua.to::<i32>(1), 1);
        assert_eq!(lua.top(), 2);
        lua.pop_n(2);
    }

    #[test]
    fn test_len_of_scalars() {
        let lua = Lua::new().unwrap();
        lua.push("hello");
        lua.push(&3.5);
        assert_eq!(lua.len(-2), 5);
        assert_eq!(lua.len(-1), 0);
        lua.pop_n(2);
    }

    #[test]
    fn test_ensure_reports_actual_depth() {
        let lua = Lua::new().unwrap();
        lua.push(&true);
        assert_eq!(
            lua.ensure(0),
            Err(LuaError::StackImbalance {
                expected: 0,
                actual: 1
            })
        );
        lua.pop_n(1);
        assert!(lua.ensure(0).is_ok());
    }
}
