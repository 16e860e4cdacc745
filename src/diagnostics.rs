//! Structured diagnostics for the load/validate/pivot pipeline.
//!
//! The source tables are hand-maintained XML, so the pipeline never stops
//! at the first problem: every violation is recorded here and forwarded to
//! the `log` facade, and processing carries on. Callers inspect the
//! collector afterwards to decide how much to trust the result.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One recorded problem, tagged with the table it came from.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub table: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.severity, self.table, self.message)
    }
}

/// Accumulates diagnostics for one pipeline run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, table: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{table}] {message}");
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            table: table.to_string(),
            message,
        });
    }

    pub fn error(&mut self, table: &str, message: impl Into<String>) {
        let message = message.into();
        log::error!("[{table}] {message}");
        self.items.push(Diagnostic {
            severity: Severity::Error,
            table: table.to_string(),
            message,
        });
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    /// True if any recorded message contains `needle` (test helper, mainly).
    pub fn any_contains(&self, needle: &str) -> bool {
        self.items.iter().any(|d| d.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diags = Diagnostics::new();
        diags.warn("T", "minor drift");
        diags.error("T", "duplicate key 'GEN'");
        diags.warn("U", "another");
        assert_eq!(diags.len(), 3);
        assert_eq!(diags.warning_count(), 2);
        assert_eq!(diags.error_count(), 1);
        assert!(diags.any_contains("duplicate key"));
        assert!(!diags.any_contains("absent text"));
    }

    #[test]
    fn display_includes_table_and_severity() {
        let mut diags = Diagnostics::new();
        diags.error("BibleBooksCodes", "bad code");
        let rendered = diags.items()[0].to_string();
        assert_eq!(rendered, "error: [BibleBooksCodes] bad code");
    }
}
