//! Luaw API - Execution orchestration layer
//!
//! Provides a unified execution interface on top of `luaw-core`, including:
//! - Script execution with dumped results (`run`, `run_file`)
//! - Load-only syntax checking (`check`, `check_file`)
//! - Configuration abstraction (RunConfig)
//! - Structured error reports (ErrorReport)
//!
//! For CLI convenience, this crate provides a global singleton API.
//! For library use, prefer the explicit `run(source, name, &config)` API.

use std::path::Path;

use tracing::{debug, info};

// Re-export config
pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

// Re-export config types from luaw_config
pub use luaw_config::{LimitConfig, LogLevel, Phase, StateConfig};

// Re-export error and types
pub mod error;
pub mod types;
pub use error::ErrorReport;
pub use types::ExecuteOutput;

// Re-export core types
pub use luaw_config;
pub use luaw_core;
pub use luaw_core::{ErrorKind, Lua, LuaError, Tag, MULTRET};

/// Execute source with explicit configuration
///
/// `name` becomes the chunk name shown in error messages.
pub fn run(source: &str, name: &str, config: &RunConfig) -> Result<ExecuteOutput, LuaError> {
    info!(name, "Starting execution");
    let lua = new_state(name, config)?;
    let pushed = lua.do_string(source, config.results)?;
    let output = collect_output(&lua, pushed, config);
    info!(name, results = output.values.len(), "Execution completed");
    Ok(output)
}

/// Execute a script file with explicit configuration
pub fn run_file(path: impl AsRef<Path>, config: &RunConfig) -> Result<ExecuteOutput, LuaError> {
    let path = path.as_ref();
    info!(path = %path.display(), "Starting execution");
    let lua = new_state(&format!("@{}", path.display()), config)?;
    let pushed = lua.do_file(path, config.results)?;
    let output = collect_output(&lua, pushed, config);
    info!(results = output.values.len(), "Execution completed");
    Ok(output)
}

/// Compile source without running it
pub fn check(source: &str, name: &str, config: &RunConfig) -> Result<(), LuaError> {
    let lua = new_state(name, config)?;
    lua.load(source.as_bytes(), name)?;
    lua.pop_n(1);
    debug!(name, "Syntax check passed");
    Ok(())
}

/// Compile a script file without running it
pub fn check_file(path: impl AsRef<Path>, config: &RunConfig) -> Result<(), LuaError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| LuaError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    check(&source, &format!("@{}", path.display()), config)
}

fn new_state(name: &str, config: &RunConfig) -> Result<Lua, LuaError> {
    let state = StateConfig {
        chunk_name: name.to_string(),
        ..config.state.clone()
    };
    Lua::with_config(&state)
}

/// Render the main chunk results (the top `pushed` slots)
fn collect_output(lua: &Lua, pushed: i32, config: &RunConfig) -> ExecuteOutput {
    let depth = config.limits.dump_depth;
    let top = lua.top();
    let values = (top - pushed + 1..=top).map(|i| lua.dump(i, depth)).collect();
    let stack = config.show_stack.then(|| lua.dump_stack(depth));
    ExecuteOutput { values, stack }
}

// ==================== Legacy API (using global config) ====================

/// Execute source (uses global config)
///
/// # Panics
/// If global config is not initialized
pub fn run_global(source: &str, name: &str) -> Result<ExecuteOutput, LuaError> {
    let config = get_config();
    run(source, name, config)
}

/// Quick run with default config (auto-initializes if needed)
pub fn quick_run(source: &str) -> Result<ExecuteOutput, LuaError> {
    if !is_initialized() {
        init_config(RunConfig::default());
    }
    run_global(source, luaw_config::DEFAULT_CHUNK_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_explicit_config() {
        let config = RunConfig::default();
        let output = run("return 42, 'x', { 1, 2 }", "main", &config).unwrap();
        assert_eq!(output.values, vec!["42", "\"x\"", "{ 1, 2 }"]);
        assert_eq!(output.stack, None);
    }

    #[test]
    fn test_run_limits_results() {
        let config = RunConfig {
            results: 1,
            ..RunConfig::default()
        };
        let output = run("return 1, 2, 3", "main", &config).unwrap();
        assert_eq!(output.values, vec!["1"]);
    }

    #[test]
    fn test_run_without_results() {
        let output = run("local x = 1", "main", &RunConfig::default()).unwrap();
        assert!(output.values.is_empty());
    }

    #[test]
    fn test_run_shows_stack() {
        let config = RunConfig {
            show_stack: true,
            ..RunConfig::default()
        };
        let output = run("return true", "main", &config).unwrap();
        assert_eq!(output.stack.as_deref(), Some("[1/-1] true"));
    }

    #[test]
    fn test_chunk_name_in_errors() {
        let err = run("error('boom')", "startup", &RunConfig::default()).unwrap_err();
        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, "RuntimeError");
        assert_eq!(report.line, Some(1));
        assert!(report.message.contains("startup"), "{}", report.message);
    }

    #[test]
    fn test_check_does_not_run() {
        let config = RunConfig::default();
        assert!(check("error('never raised')", "main", &config).is_ok());
        let err = check("return +", "main", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }
}
