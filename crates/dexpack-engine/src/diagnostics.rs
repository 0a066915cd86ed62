//! Diagnostics sinks: where compiler and tool messages go as they occur.

use std::io::Write;

use dexpack_tools::{Diagnostic, Severity};

/// Receives diagnostics one at a time, in the order they are produced.
pub trait DiagnosticSink: Send {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Prints `error: file:line:col: message` lines to stderr.
#[derive(Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        eprintln!("{diagnostic}");
    }
}

/// Writes one JSON object per diagnostic, for editors and IDEs.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DiagnosticSink for JsonLinesSink<W> {
    fn report(&mut self, diagnostic: Diagnostic) {
        match serde_json::to_string(&diagnostic) {
            Ok(line) => {
                if let Err(e) = writeln!(self.writer, "{line}") {
                    tracing::warn!(error = %e, "cannot write diagnostic");
                }
            }
            Err(e) => tracing::warn!(error = %e, "cannot serialize diagnostic"),
        }
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// A shareable `CollectingSink`: the builder owns one handle, the caller keeps
/// another to inspect what was reported.
#[derive(Debug, Default, Clone)]
pub struct SharedSink(std::sync::Arc<std::sync::Mutex<Vec<Diagnostic>>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        match self.0.lock() {
            Ok(list) => list.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for SharedSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match self.0.lock() {
            Ok(mut list) => list.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

/// Per-severity totals for one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl DiagnosticCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
    }
}

/// Forwards to an inner sink while counting by severity.
pub(crate) struct CountingSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    pub(crate) counts: DiagnosticCounts,
}

impl<'a> CountingSink<'a> {
    pub(crate) fn new(inner: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            inner,
            counts: DiagnosticCounts::default(),
        }
    }
}

impl DiagnosticSink for CountingSink<'_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.counts.record(diagnostic.severity);
        self.inner.report(diagnostic);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn located(severity: Severity, msg: &str) -> Diagnostic {
        Diagnostic {
            severity,
            file: Some("src/Main.java".to_owned()),
            line: Some(4),
            column: Some(9),
            message: msg.to_owned(),
        }
    }

    #[test]
    fn json_lines_one_object_per_diagnostic() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.report(located(Severity::Error, "';' expected"));
        sink.report(Diagnostic::new(Severity::Info, "note"));
        let text = String::from_utf8(sink.into_inner()).unwrap();

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines.first().unwrap()).unwrap();
        assert_eq!(first["severity"], "error");
        assert_eq!(first["file"], "src/Main.java");
        assert_eq!(first["line"], 4);
        assert_eq!(first["column"], 9);
        assert_eq!(first["message"], "';' expected");
        let second: serde_json::Value = serde_json::from_str(lines.get(1).unwrap()).unwrap();
        assert_eq!(second["severity"], "info");
        assert!(second["file"].is_null());
    }

    #[test]
    fn counting_sink_forwards_and_counts() {
        let mut collected = CollectingSink::new();
        let counts = {
            let mut counting = CountingSink::new(&mut collected);
            counting.report(located(Severity::Error, "a"));
            counting.report(located(Severity::Warning, "b"));
            counting.report(located(Severity::Warning, "c"));
            counting.counts
        };
        assert_eq!(
            counts,
            DiagnosticCounts {
                errors: 1,
                warnings: 2,
                infos: 0
            }
        );
        assert_eq!(collected.diagnostics.len(), 3);
        assert_eq!(collected.errors().count(), 1);
    }

    #[test]
    fn shared_sink_is_visible_through_clones() {
        let shared = SharedSink::new();
        let mut handle = shared.clone();
        handle.report(Diagnostic::new(Severity::Warning, "w"));
        assert_eq!(shared.snapshot().len(), 1);
    }
}
