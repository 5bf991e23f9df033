//! 测试辅助工具
//!
//! 提供各组件集成测试共享的 VM 构造与栈断言

#![allow(dead_code)]

use luaw_core::{Lua, StateConfig};

/// 默认配置的新 VM（开启严格全局变量检查）
pub fn new_lua() -> Lua {
    Lua::new().expect("failed to create state")
}

/// 开启 traceback 的新 VM
pub fn new_lua_with_traceback() -> Lua {
    let config = StateConfig {
        traceback: true,
        ..StateConfig::default()
    };
    Lua::with_config(&config).expect("failed to create state")
}

/// 执行 `source` 并把唯一的返回值留在栈顶
pub fn push_eval(lua: &Lua, source: &str) {
    lua.do_string(source, 1)
        .unwrap_or_else(|e| panic!("failed to run {source:?}: {e}"));
}

/// 断言栈深度
pub fn assert_depth(lua: &Lua, expected: i32) {
    if let Err(e) = lua.ensure(expected) {
        panic!("{e}\n{}", lua.dump_stack(2));
    }
}

/// 本组测试共用的嵌套表
pub const NESTED: &str = "return { a = { b = { c = 84 } } }";

/// 混合顺序与命名条目、并带有空洞的表
pub const MIXED: &str = "return { 'd', 'e', a = 1, b = 2, c = 3, [8] = 'f' }";
