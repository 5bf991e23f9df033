//! CLI 配置
//!
//! 包含 CLI 特有的配置：日志配置与各阶段的级别覆盖

use luaw_config::{LogLevel, Phase};
use tracing::Level;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub state: Option<Level>,
    pub load: Option<Level>,
    pub call: Option<Level>,
    pub path: Option<Level>,
    pub stack: Option<Level>,
    pub record: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            state: None,
            load: None,
            call: None,
            path: None,
            stack: None,
            record: None,
        }
    }
}

impl LogConfig {
    /// 单一级别的配置
    pub fn with_global(level: Level) -> Self {
        Self {
            global: level,
            ..Self::default()
        }
    }

    /// 某个阶段的生效级别（未覆盖时使用全局级别）
    pub fn level_for(&self, phase: Phase) -> Level {
        let level = match phase {
            Phase::State => self.state,
            Phase::Load => self.load,
            Phase::Call => self.call,
            Phase::Path => self.path,
            Phase::Stack => self.stack,
            Phase::Record => self.record,
        };
        level.unwrap_or(self.global)
    }

    /// 覆盖单个阶段的级别
    pub fn set_phase(&mut self, phase: Phase, level: Level) {
        let slot = match phase {
            Phase::State => &mut self.state,
            Phase::Load => &mut self.load,
            Phase::Call => &mut self.call,
            Phase::Path => &mut self.path,
            Phase::Stack => &mut self.stack,
            Phase::Record => &mut self.record,
        };
        *slot = Some(level);
    }
}

/// 配置层的日志级别转换为 tracing 级别
pub fn to_tracing_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

/// 按名字查找阶段
pub fn parse_phase(s: &str) -> Option<Phase> {
    Phase::ALL.into_iter().find(|p| p.as_str() == s)
}
