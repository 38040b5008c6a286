use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "alert alert-success",
            Self::Info => "alert alert-info",
            Self::Warning => "alert alert-warning",
            Self::Error => "alert alert-danger",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub severity: Severity,
    pub message: String,
}

/// User-visible outcome of one operation, rendered by whatever front end called it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    lines: Vec<LogLine>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.lines.push(LogLine {
            severity,
            message: message.into(),
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn has_errors(&self) -> bool {
        self.lines.iter().any(|line| line.severity == Severity::Error)
    }

    pub fn render_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("[{}] {}", line.severity.label(), line.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One `<div>` per line; messages are escaped since they carry archive paths.
    pub fn render_html(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                format!(
                    "<div class=\"{}\">{}</div>",
                    line.severity.css_class(),
                    escape_html(&line.message)
                )
            })
            .collect()
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
