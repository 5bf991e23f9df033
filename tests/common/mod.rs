//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数

#![allow(dead_code)]

use std::path::PathBuf;

use luaw::{run, ErrorReport, ExecuteOutput, RunConfig};
use tempfile::TempDir;

/// 以默认配置执行代码
pub fn run_code(code: &str) -> Result<ExecuteOutput, ErrorReport> {
    run(code, "test", &RunConfig::default()).map_err(ErrorReport::from)
}

/// 执行代码并返回唯一返回值的 dump
pub fn run_value(code: &str) -> String {
    let output = run_code(code).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(output.values.len(), 1, "expected one result: {:?}", output.values);
    output.values[0].clone()
}

/// 在临时目录中创建脚本
pub fn script(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).expect("failed to write script");
    path
}
