//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。
//! 日志写到 stderr，stdout 只留给脚本的返回值。

use std::io;
use std::path::Path;
use std::sync::Mutex;

use luaw_config::Phase;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::config::LogConfig;

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 构建按阶段过滤的 targets
pub fn build_targets(log_config: &LogConfig) -> Targets {
    Phase::ALL
        .into_iter()
        .fold(Targets::new().with_default(log_config.global), |targets, phase| {
            targets.with_target(phase.target(), log_config.level_for(phase))
        })
}

/// 使用指定格式和日志配置初始化日志系统
///
/// 指定文件时同时输出到 stderr 和文件。
pub fn init_with_file<P: AsRef<Path>>(
    log_config: &LogConfig,
    format: LogFormat,
    file: Option<P>,
) -> io::Result<()> {
    let targets = build_targets(log_config);

    let file_layer = match file {
        Some(path) => {
            let handle = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(handle))
                    .with_filter(targets.clone()),
            )
        }
        None => None,
    };

    let stderr_layer = create_format_layer(format, io::stderr).with_filter(targets);
    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// 按输出格式创建格式化层
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> impl Layer<tracing_subscriber::Registry>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_targets_follow_phase_levels() {
        let mut config = LogConfig::with_global(Level::WARN);
        config.set_phase(Phase::Call, Level::DEBUG);
        let targets = build_targets(&config);
        assert!(targets.would_enable("luaw::call", &Level::DEBUG));
        assert!(!targets.would_enable("luaw::path", &Level::DEBUG));
        assert!(targets.would_enable("luaw::path", &Level::WARN));
        assert!(!targets.would_enable("luaw_api", &Level::INFO));
    }
}
