//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use luaw_api::ErrorReport;

/// 打印错误并显示源代码上下文
pub fn print_error_with_source(report: &ErrorReport, source: Option<&str>) {
    eprintln!("❌ {}", report);

    if let (Some(error_line), Some(source)) = (report.line, source) {
        print_source_context(source, error_line);
    }
}

/// 打印源代码上下文（显示错误行前后几行）
pub fn print_source_context(source: &str, error_line: usize) {
    eprint!("{}", render_source_context(source, error_line));
}

/// 错误行用 `>` 标出
pub fn render_source_context(source: &str, error_line: usize) -> String {
    const CONTEXT_LINES: usize = 3; // 错误行前后显示的上下文行数

    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len();

    if error_line == 0 || error_line > total_lines {
        return String::new();
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(total_lines);
    let width = end_line.to_string().len();

    let separator = "-".repeat(width + 2);
    let mut out = format!("{separator}|--\n");
    for line_idx in start_line..=end_line {
        let marker = if line_idx == error_line { '>' } else { ' ' };
        out.push_str(&format!(
            "{marker} {line_idx:>width$} | {}\n",
            lines[line_idx - 1]
        ));
    }
    out.push_str(&format!("{separator}|--\n"));
    out
}
