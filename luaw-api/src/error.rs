//! 结构化错误报告
//!
//! 把 [`LuaError`] 转换为上层应用（CLI、工具集成）可以直接格式化的报告。

use luaw_core::LuaError;
use serde::Serialize;

/// 结构化错误报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// 出错的阶段: load, call, path, stack, decode, io
    pub phase: &'static str,
    /// 错误行号（1-based，能从 VM 消息中解析时）
    pub line: Option<usize>,
    /// 错误种类（可用于程序化处理）
    pub kind: &'static str,
    /// 人类可读的错误消息
    pub message: String,
}

impl From<&LuaError> for ErrorReport {
    fn from(e: &LuaError) -> Self {
        let (phase, message) = match e {
            LuaError::Syntax(m) => ("load", m.clone()),
            LuaError::Memory(m) | LuaError::Runtime(m) | LuaError::Handler(m) => {
                ("call", m.clone())
            }
            LuaError::Io { .. } => ("io", e.to_string()),
            LuaError::FieldNotFound { .. } => ("path", e.to_string()),
            LuaError::StackImbalance { .. } => ("stack", e.to_string()),
            LuaError::TypeMismatch { .. } => ("decode", e.to_string()),
        };
        let line = if e.is_vm_error() {
            line_of(&message)
        } else {
            None
        };
        ErrorReport {
            phase,
            line,
            kind: e.kind().as_str(),
            message,
        }
    }
}

impl From<LuaError> for ErrorReport {
    fn from(e: LuaError) -> Self {
        ErrorReport::from(&e)
    }
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式（工具集成使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 从 `chunk:line: message` 形式的 VM 消息中取出行号
fn line_of(message: &str) -> Option<usize> {
    let first_line = message.lines().next()?;
    let mut parts = first_line.split(':').skip(1).peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_some() && !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            return part.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of() {
        assert_eq!(line_of("[string \"main\"]:3: boom"), Some(3));
        assert_eq!(line_of("/tmp/x.lua:12: bad argument"), Some(12));
        assert_eq!(line_of("no location here"), None);
        assert_eq!(line_of("boom\nstack traceback:\n\t[C]: in ?"), None);
    }

    #[test]
    fn test_runtime_report() {
        let err = LuaError::Runtime("[string \"main\"]:2: boom".into());
        let report = ErrorReport::from(&err);
        assert_eq!(report.phase, "call");
        assert_eq!(report.line, Some(2));
        assert_eq!(report.kind, "RuntimeError");
        assert_eq!(report.to_string(), "[RuntimeError] [string \"main\"]:2: boom");
    }

    #[test]
    fn test_path_report_has_no_line() {
        let err = LuaError::FieldNotFound {
            path: "a.b".into(),
            segment: "a".into(),
        };
        let report = ErrorReport::from(err);
        assert_eq!(report.phase, "path");
        assert_eq!(report.line, None);
        assert_eq!(report.kind, "FieldNotFound");
        assert!(report.message.contains("a.b"));
    }

    #[test]
    fn test_to_json() {
        let report = ErrorReport {
            phase: "load",
            line: Some(1),
            kind: "SyntaxError",
            message: "unexpected \"symbol\"".into(),
        };
        assert_eq!(
            report.to_json(),
            r#"{"phase":"load","line":1,"kind":"SyntaxError","message":"unexpected \"symbol\""}"#
        );

        let report = ErrorReport {
            line: None,
            ..report
        };
        assert!(report.to_json().contains(r#""line":null"#));
    }
}
