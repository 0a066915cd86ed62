//! Structured diagnostics and parsing of compiler output.

use serde::Serialize;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured message from a compiler or tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic with no source location.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            file: None,
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `file:line:col` as far as it is known, or `None` without a file.
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(col)) => format!("{file}:{line}:{col}"),
            (Some(line), None) => format!("{file}:{line}"),
            _ => file.to_owned(),
        })
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location() {
            Some(loc) => write!(f, "{}: {loc}: {}", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Parse all diagnostics in a block of compiler output.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output.lines().filter_map(parse_line).collect()
}

/// Parse a single line of compiler output.
///
/// Recognized forms:
/// - `src/Main.java:12: error: ';' expected`
/// - `src/Main.java:12:5: warning: [unchecked] unchecked call`
/// - `error: invalid flag: -foo`, `warning: ...`, `note: ...` (also `Note:`)
///
/// Source echo lines, caret markers and `1 error` summaries yield `None`.
pub fn parse_line(line: &str) -> Option<Diagnostic> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_located(trimmed).or_else(|| parse_bare(trimmed))
}

const LEVELS: [(&str, Severity); 4] = [
    ("error:", Severity::Error),
    ("warning:", Severity::Warning),
    ("note:", Severity::Info),
    ("Note:", Severity::Info),
];

fn parse_located(line: &str) -> Option<Diagnostic> {
    for (prefix, severity) in LEVELS {
        let needle = format!(": {prefix}");
        let Some(pos) = line.find(&needle) else {
            continue;
        };
        let before = line.get(..pos)?;
        let message = line.get(pos + needle.len()..)?.trim();
        if let Some((file, line_no, column)) = split_location(before) {
            return Some(Diagnostic {
                severity,
                file: Some(file),
                line: Some(line_no),
                column,
                message: message.to_owned(),
            });
        }
    }
    None
}

/// Split `file:line` or `file:line:col`. The file part may itself contain
/// colons (Windows drive letters), so digits are taken from the right.
fn split_location(s: &str) -> Option<(String, u32, Option<u32>)> {
    let (head, last) = s.rsplit_once(':')?;
    let last: u32 = last.parse().ok()?;
    if let Some((file, mid)) = head.rsplit_once(':') {
        if let Ok(line) = mid.parse::<u32>() {
            if !file.is_empty() {
                return Some((file.to_owned(), line, Some(last)));
            }
        }
    }
    if head.is_empty() {
        return None;
    }
    Some((head.to_owned(), last, None))
}

fn parse_bare(line: &str) -> Option<Diagnostic> {
    LEVELS.into_iter().find_map(|(prefix, severity)| {
        line.strip_prefix(prefix)
            .map(|msg| Diagnostic::new(severity, msg.trim()))
    })
}
