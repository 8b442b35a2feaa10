use std::fmt;

/// A syntax or resolution error in a field or conversion expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    /// Byte offset of the offending text.
    pub offset: usize,
    /// Length in bytes of the offending text (at least 1 when rendered).
    pub len: usize,
    /// Human readable message.
    pub message: String,
}

impl ExprError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            len: 1,
            message: message.into(),
        }
    }

    pub(crate) fn spanning(offset: usize, len: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            len,
            message: message.into(),
        }
    }

    /// Render a compiler-style diagnostic pointing into `src`.
    ///
    /// ```text
    /// error: unknown identifier 'q'
    ///  --> field:1:5
    ///   |
    /// 1 | sin(q)
    ///   |     ^
    /// ```
    pub fn render(&self, label: &str, src: &str) -> String {
        let offset = self.offset.min(src.len());
        let line_start = src[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let line_end = src[offset..]
            .find('\n')
            .map(|p| offset + p)
            .unwrap_or(src.len());
        let line_no = src[..line_start].matches('\n').count() + 1;
        let col = src[line_start..offset].chars().count() + 1;
        let gutter = line_no.to_string().len();
        let caret_len = self.len.clamp(1, (line_end - offset).max(1));

        let mut out = String::new();
        out.push_str(&format!("error: {}\n", self.message));
        out.push_str(&format!("{:gutter$}--> {label}:{line_no}:{col}\n", ""));
        out.push_str(&format!("{:gutter$} |\n", ""));
        out.push_str(&format!("{line_no} | {}\n", &src[line_start..line_end]));
        out.push_str(&format!(
            "{:gutter$} | {}{}",
            "",
            " ".repeat(col - 1),
            "^".repeat(caret_len)
        ));
        out
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expr error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ExprError {}
