//! 错误类型
//!
//! 所有越过 VM 边界的操作都把 Lua 状态码翻译成 [`LuaError`]。
//! 错误消息在栈回滚之前读取。

use thiserror::Error;

use crate::state::Tag;

/// Luaw 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LuaError {
    /// 源码无法解析
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// VM 内存分配失败
    #[error("Memory error: {0}")]
    Memory(String),

    /// 脚本执行期间抛出错误
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// 错误处理函数本身出错
    #[error("Error running the error message handler: {0}")]
    Handler(String),

    /// 文件无法读取（未触及 VM）
    #[error("Could not open file '{path}': {message}")]
    Io { path: String, message: String },

    /// 路径中某一段缺失或不是表
    #[error("Field not found: '{segment}' in path '{path}'")]
    FieldNotFound { path: String, segment: String },

    /// 栈深度断言失败
    #[error("Stack imbalance: expected {expected} slots, found {actual}")]
    StackImbalance { expected: i32, actual: i32 },

    /// 槽位内容与期望的宿主类型不符
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: Tag },
}

/// 错误种类（可用于程序化处理）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SyntaxError,
    MemoryError,
    RuntimeError,
    HandlerError,
    IOError,
    FieldNotFound,
    StackImbalance,
    TypeMismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::MemoryError => "MemoryError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::HandlerError => "HandlerError",
            ErrorKind::IOError => "IOError",
            ErrorKind::FieldNotFound => "FieldNotFound",
            ErrorKind::StackImbalance => "StackImbalance",
            ErrorKind::TypeMismatch => "TypeMismatch",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LuaError {
    /// 获取错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            LuaError::Syntax(_) => ErrorKind::SyntaxError,
            LuaError::Memory(_) => ErrorKind::MemoryError,
            LuaError::Runtime(_) => ErrorKind::RuntimeError,
            LuaError::Handler(_) => ErrorKind::HandlerError,
            LuaError::Io { .. } => ErrorKind::IOError,
            LuaError::FieldNotFound { .. } => ErrorKind::FieldNotFound,
            LuaError::StackImbalance { .. } => ErrorKind::StackImbalance,
            LuaError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        }
    }

    /// 错误是否来自 VM 本身（而非宿主侧的检查）
    pub fn is_vm_error(&self) -> bool {
        matches!(
            self,
            LuaError::Syntax(_) | LuaError::Memory(_) | LuaError::Runtime(_) | LuaError::Handler(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(LuaError::Syntax("x".into()).kind(), ErrorKind::SyntaxError);
        assert_eq!(LuaError::Handler("x".into()).kind(), ErrorKind::HandlerError);
        let err = LuaError::FieldNotFound {
            path: "a.b".into(),
            segment: "b".into(),
        };
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
        assert!(!err.is_vm_error());
        assert!(LuaError::Runtime("boom".into()).is_vm_error());
    }

    #[test]
    fn test_display() {
        let err = LuaError::Runtime("boom".into());
        assert_eq!(err.to_string(), "Runtime error: boom");

        let err = LuaError::TypeMismatch {
            expected: "i32",
            found: Tag::String,
        };
        assert_eq!(err.to_string(), "Type mismatch: expected i32, found string");

        let err = LuaError::StackImbalance {
            expected: 0,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Stack imbalance: expected 0 slots, found 2");
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ErrorKind::IOError.as_str(), "IOError");
        assert_eq!(ErrorKind::TypeMismatch.to_string(), "TypeMismatch");
    }
}
