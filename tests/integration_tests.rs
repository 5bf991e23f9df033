//! 集成测试 - 通过门面包的端到端行为

mod common;
use common::{run_code, run_value, script};

use std::collections::HashMap;

use luaw::{eval, run_file, Lua, LuaError, RunConfig, StateConfig};

// ===== 执行与结果 =====

#[test]
fn test_values_are_dumped() {
    assert_eq!(run_value("return 1 + 2"), "3");
    assert_eq!(run_value("return 10 / 4"), "2.5");
    assert_eq!(run_value("return 20 / 4"), "5");
    assert_eq!(run_value("return 'hi' .. '!'"), "\"hi!\"");
    assert_eq!(run_value("return nil"), "nil");
}

#[test]
fn test_nested_tables_are_dumped() {
    assert_eq!(
        run_value("return { 1, { 2, { 3, { 4 } } }, k = 'v' }"),
        "{ 1, { 2, { 3, ... } }, k=\"v\" }"
    );
}

#[test]
fn test_error_kinds() {
    let report = run_code("return (").unwrap_err();
    assert_eq!(report.kind, "SyntaxError");

    let report = run_code("local t = nil\nreturn t.x").unwrap_err();
    assert_eq!(report.kind, "RuntimeError");
    assert_eq!(report.line, Some(2));

    let report = run_code("return undeclared").unwrap_err();
    assert!(report.message.contains("is not declared"), "{report}");
}

#[test]
fn test_eval_helper() {
    assert_eq!(eval::<i64>("return 6 * 7").unwrap(), 42);
    let map: HashMap<String, bool> = eval("return { yes = true, no = false }").unwrap();
    assert_eq!(map.get("yes"), Some(&true));
    assert_eq!(map.get("no"), Some(&false));
    assert!(matches!(eval::<i64>("error('x')"), Err(LuaError::Runtime(_))));
}

#[test]
fn test_run_file_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "app.lua", "function helper() return 5 end\nreturn helper() * 2\n");
    let output = run_file(&path, &RunConfig::default()).unwrap();
    assert_eq!(output.values, vec!["10"]);

    let path = script(&dir, "loose.lua", "local function f() x = 1 end f() return x\n");
    assert!(run_file(&path, &RunConfig::default()).is_err());
    let relaxed = RunConfig {
        state: StateConfig {
            strict_globals: false,
            ..StateConfig::default()
        },
        ..RunConfig::default()
    };
    assert_eq!(run_file(&path, &relaxed).unwrap().values, vec!["1"]);
}

// ===== 宿主与脚本往返 =====

#[test]
fn test_host_data_through_script() {
    let lua = Lua::new().unwrap();
    let mut scores = HashMap::new();
    scores.insert("ada".to_string(), vec![3, 4]);
    scores.insert("bob".to_string(), vec![10]);
    lua.set_global("scores", &scores);
    lua.do_string(
        "function total(name) local s = 0 for _, v in ipairs(scores[name]) do s = s + v end return s end",
        0,
    )
    .unwrap();
    assert_eq!(lua.call_global::<i32, _>("total", ("ada",)).unwrap(), 7);
    assert_eq!(lua.call_global::<i32, _>("total", ("bob",)).unwrap(), 10);

    let back: HashMap<String, Vec<i32>> = lua.get_global("scores");
    assert_eq!(back, scores);
    lua.ensure(0).unwrap();
}
