//! API 类型定义
//!
//! 执行的输出类型。

/// 执行输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteOutput {
    /// 主 chunk 返回值的 dump，按返回顺序
    pub values: Vec<String>,
    /// 执行结束时整个栈的 dump（`show_stack` 开启时）
    pub stack: Option<String>,
}
