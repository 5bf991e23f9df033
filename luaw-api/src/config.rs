//! API 层配置
//!
//! 包含执行配置 RunConfig 和全局单例（供 CLI 使用）

use luaw_config::{LimitConfig, StateConfig};
use luaw_core::MULTRET;
use once_cell::sync::OnceCell;

/// Execution configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// VM state configuration (strict globals, traceback, chunk name)
    pub state: StateConfig,
    /// Diagnostic output limits
    pub limits: LimitConfig,
    /// Number of results kept from the main chunk (`MULTRET` = all)
    pub results: i32,
    /// Whether to dump the whole stack after execution
    pub show_stack: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            state: StateConfig::default(),
            limits: LimitConfig::default(),
            results: MULTRET,
            show_stack: false,
        }
    }
}

// Global config singleton for CLI convenience
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration (must be called once before any operation)
///
/// # Panics
/// If config is already initialized
pub fn init(config: RunConfig) {
    GLOBAL_CONFIG
        .set(config)
        .expect("Config already initialized");
}

/// Get global config reference
///
/// # Panics
/// If config is not initialized
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get().expect("Config not initialized")
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(!cfg.show_stack);
        assert_eq!(cfg.results, MULTRET);
        assert!(cfg.state.strict_globals);
        assert!(!cfg.state.traceback);
        assert_eq!(cfg.limits.dump_depth, 3);
    }

    #[test]
    fn test_run_config_debug() {
        let cfg = RunConfig::default();
        let debug_str = format!("{:?}", cfg);
        assert!(debug_str.contains("state"));
        assert!(debug_str.contains("limits"));
        assert!(debug_str.contains("show_stack"));
    }

    #[test]
    fn test_global_config_init_and_get() {
        // 全局状态：已被其它测试初始化时跳过
        if !is_initialized() {
            let cfg = RunConfig {
                show_stack: true,
                ..RunConfig::default()
            };
            init(cfg.clone());
            assert!(is_initialized());
            assert_eq!(config(), &cfg);
        }
    }
}
