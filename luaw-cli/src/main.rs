//! Luaw CLI - Command line interface
//!
//! Runs a Lua script through the typed bridge and prints its dumped results.
//! Configuration comes from an optional `luaw.json` project file, overridden
//! by command line flags.

use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

mod config;
mod logging;
mod platform;

use crate::config::{parse_phase, to_tracing_level, LogConfig};
use crate::logging::LogFormat;
use crate::platform::print_error_with_source;
use luaw_api::{
    check_file, init_config, run_file, ErrorReport, LimitConfig, LogLevel, RunConfig, StateConfig,
};

/// 默认项目文件名
const PROJECT_FILE: &str = "luaw.json";

/// luaw.json 结构
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProjectFile {
    /// 入口脚本路径（相对于 luaw.json 所在目录）
    entry: Option<String>,
    /// VM 状态配置
    state: Option<StateConfig>,
    /// 诊断输出限制
    limits: Option<LimitConfig>,
    /// 主 chunk 保留的返回值个数（-1 为全部）
    results: Option<i32>,
    /// 执行后是否输出整个栈
    show_stack: Option<bool>,
    /// 日志配置
    log: Option<ProjectLog>,
}

/// luaw.json 中的日志配置
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProjectLog {
    /// 全局日志级别: "silent", "error", "warn", "info", "debug", "trace"
    level: Option<String>,
    /// 输出格式: "pretty", "compact", "json"
    format: Option<LogFormat>,
    /// 各阶段的级别覆盖，例如 { "call": "debug" }
    phases: HashMap<String, String>,
}

#[derive(Parser)]
#[command(
    name = "luaw",
    about = "Run Lua scripts through the luaw typed bridge",
    version = "0.1.0"
)]
struct Cli {
    /// Script to run (default: `entry` from the project file)
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Project file path (default: ./luaw.json when present)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Number of results kept from the script (-1 = all)
    #[arg(short, long, allow_negative_numbers = true)]
    results: Option<i32>,

    /// Only compile the script, do not run it
    #[arg(long)]
    check: bool,

    /// Dump the whole stack after execution
    #[arg(long)]
    stack: bool,

    /// Append a stack traceback to runtime errors
    #[arg(long)]
    traceback: bool,

    /// Allow undeclared globals
    #[arg(long)]
    no_strict: bool,

    /// Log level: silent, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Also append logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Print errors as JSON reports
    #[arg(long)]
    json_errors: bool,
}

fn main() {
    let cli = Cli::parse();

    let project = match read_project_file(&cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let (log_config, log_format) = build_log_config(&cli, project.as_ref().map(|(p, _)| p));
    if let Err(e) = logging::init_with_file(&log_config, log_format, cli.log_file.as_ref()) {
        eprintln!("Error: Cannot open log file: {}", e);
        process::exit(1);
    }

    let entry_path = match resolve_entry_path(&cli, project.as_ref()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // Build run configuration from the project file and flags
    let run_config = build_run_config(&cli, project.as_ref().map(|(p, _)| p));

    // Initialize API config (global singleton for convenience)
    init_config(run_config.clone());

    tracing::debug!(entry = %entry_path.display(), ?run_config, "configuration resolved");

    let result = if cli.check {
        handle_check(&entry_path, &run_config)
    } else {
        handle_run(&entry_path, &run_config)
    };

    if let Err(report) = result {
        if cli.json_errors {
            eprintln!("{}", report.to_json());
        } else {
            let source = std::fs::read_to_string(&entry_path).ok();
            print_error_with_source(&report, source.as_deref());
        }
        process::exit(1);
    }
}

/// 读取并解析项目文件
///
/// 显式指定的 `--config` 必须存在；默认的 `luaw.json` 可以缺省。
fn read_project_file(cli: &Cli) -> Result<Option<(ProjectFile, PathBuf)>, String> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let default = PathBuf::from(PROJECT_FILE);
            if !default.exists() {
                return Ok(None);
            }
            default
        }
    };

    if !path.exists() {
        return Err(format!("未找到 '{}'", path.display()));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("无法读取 '{}': {}", path.display(), e))?;

    let project: ProjectFile = serde_json::from_str(&content)
        .map_err(|e| format!("解析 '{}' 失败: {}", path.display(), e))?;

    Ok(Some((project, path)))
}

/// 解析脚本路径：命令行参数优先于项目文件中的 entry
fn resolve_entry_path(
    cli: &Cli,
    project: Option<&(ProjectFile, PathBuf)>,
) -> Result<PathBuf, String> {
    if let Some(script) = &cli.script {
        return Ok(script.clone());
    }
    match project {
        Some((ProjectFile { entry: Some(entry), .. }, path)) if !entry.is_empty() => {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            Ok(base_dir.join(entry))
        }
        Some((_, path)) => Err(format!("'{}' 中的 'entry' 字段不能为空", path.display())),
        None => Err(format!(
            "没有指定脚本\n\n提示: 运行 'luaw <SCRIPT>'，或创建 '{}' 文件并指定 'entry' 字段",
            PROJECT_FILE
        )),
    }
}

/// 构建运行配置：先取项目文件的值，再用命令行参数覆盖
fn build_run_config(cli: &Cli, project: Option<&ProjectFile>) -> RunConfig {
    let defaults = RunConfig::default();

    let mut state = project
        .and_then(|p| p.state.clone())
        .unwrap_or(defaults.state);
    if cli.traceback {
        state.traceback = true;
    }
    if cli.no_strict {
        state.strict_globals = false;
    }

    RunConfig {
        state,
        limits: project
            .and_then(|p| p.limits.clone())
            .unwrap_or(defaults.limits),
        results: cli
            .results
            .or_else(|| project.and_then(|p| p.results))
            .unwrap_or(defaults.results),
        show_stack: cli.stack || project.and_then(|p| p.show_stack).unwrap_or(false),
    }
}

/// 构建日志配置：先取项目文件的值，再用命令行参数覆盖
fn build_log_config(cli: &Cli, project: Option<&ProjectFile>) -> (LogConfig, LogFormat) {
    let log = project.and_then(|p| p.log.as_ref());

    let mut config = LogConfig::default();
    let level = cli
        .log_level
        .as_deref()
        .or_else(|| log.and_then(|l| l.level.as_deref()))
        .and_then(LogLevel::parse);
    if let Some(level) = level {
        config.global = to_tracing_level(level);
    }

    if let Some(log) = log {
        for (name, level) in &log.phases {
            match (parse_phase(name), LogLevel::parse(level)) {
                (Some(phase), Some(level)) => config.set_phase(phase, to_tracing_level(level)),
                _ => eprintln!("Warning: ignoring log override '{}': '{}'", name, level),
            }
        }
    }

    let format = cli
        .log_format
        .or_else(|| log.and_then(|l| l.format))
        .unwrap_or(LogFormat::Compact);
    (config, format)
}

fn handle_check(path: &Path, config: &RunConfig) -> Result<(), ErrorReport> {
    check_file(path, config)?;
    println!("{}: syntax ok", path.display());
    Ok(())
}

fn handle_run(path: &Path, config: &RunConfig) -> Result<(), ErrorReport> {
    let output = run_file(path, config)?;
    for value in &output.values {
        println!("{value}");
    }
    if let Some(stack) = output.stack {
        println!("[Stack]");
        println!("{stack}");
    }
    Ok(())
}
