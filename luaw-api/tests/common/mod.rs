//! 测试辅助工具
//!
//! 在临时目录中生成脚本文件

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

/// 在 `dir` 下写入脚本并返回其路径
pub fn write_script(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).expect("failed to write script");
    path
}

pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}
