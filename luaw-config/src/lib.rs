//! Luaw Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Luaw crates.

use serde::{Deserialize, Serialize};

/// Default chunk name used when a buffer is loaded without an explicit name
pub const DEFAULT_CHUNK_NAME: &str = "anonymous";

/// Configuration applied once when a VM state is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Install the undeclared-global guard after opening the standard libraries
    pub strict_globals: bool,
    /// Insert a traceback message handler around every protected call
    pub traceback: bool,
    /// Chunk name used by `do_string`
    pub chunk_name: String,
}

/// Configuration for diagnostic output limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum table nesting rendered by `dump`
    pub dump_depth: usize,
}

/// Log level, mirrored from `tracing::Level` so config stays dependency-free
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Bridge phase enum for phase-specific log targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    State,
    Load,
    Call,
    Path,
    Stack,
    Record,
}

impl Phase {
    /// All phases, in a stable order
    pub const ALL: [Phase; 6] = [
        Phase::State,
        Phase::Load,
        Phase::Call,
        Phase::Path,
        Phase::Stack,
        Phase::Record,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::State => "state",
            Phase::Load => "load",
            Phase::Call => "call",
            Phase::Path => "path",
            Phase::Stack => "stack",
            Phase::Record => "record",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("luaw::{}", self.as_str())
    }
}

impl LogLevel {
    /// Parse a level name; `silent` maps to `Error`
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_lowercase().as_str() {
            "silent" | "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            strict_globals: true,
            traceback: false,
            chunk_name: DEFAULT_CHUNK_NAME.to_string(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            dump_depth: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_config() {
        let cfg = StateConfig::default();
        assert!(cfg.strict_globals);
        assert!(!cfg.traceback);
        assert_eq!(cfg.chunk_name, "anonymous");
    }

    #[test]
    fn test_default_limit_config() {
        let cfg = LimitConfig::default();
        assert_eq!(cfg.dump_depth, 3);
    }

    #[test]
    fn test_phase_as_str() {
        assert_eq!(Phase::Load.as_str(), "load");
        assert_eq!(Phase::Call.target(), "luaw::call");
        assert_eq!(Phase::ALL.len(), 6);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("silent"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_state_config_partial_json() {
        let cfg: StateConfig = serde_json::from_str(r#"{ "traceback": true }"#).unwrap();
        assert!(cfg.traceback);
        assert!(cfg.strict_globals);
        assert_eq!(cfg.chunk_name, DEFAULT_CHUNK_NAME);
    }
}
