//! Diagnostics
//!
//! Warnings are collected while a unit compiles; fatal errors travel as
//! [`Error`] values. Both can be rendered as plain text or as a
//! machine-readable [`Report`].

use serde::{Deserialize, Serialize};

use crate::utils::{Error, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single non-fatal or fatal message tied to a source position
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub pos: Option<Position>,
}

impl Diagnostic {
    pub fn warning(pos: Position, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            pos: Some(pos),
        }
    }

    /// Human readable form: `file:line:col: warning: message`
    pub fn render(&self) -> String {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.pos {
            Some(pos) => format!("{}: {}: {}", pos, label, self.message),
            None => format!("{}: {}", label, self.message),
        }
    }
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        Self {
            severity: Severity::Error,
            message: err.to_string(),
            pos: Some(err.pos().clone()),
        }
    }
}

/// Collects warnings raised during one compilation
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning. Compilation continues.
    pub fn warning(&mut self, pos: Position, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(pos, message);
        log::warn!("{}", diagnostic.render());
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

// ==================== Structured Report ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Error code (e.g., "E0002"); warnings carry none
    pub code: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

/// JSON-friendly summary of a compilation's diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub success: bool,
    pub diagnostics: Vec<ReportEntry>,
}

impl Report {
    pub fn new(warnings: &[Diagnostic], error: Option<&Error>) -> Self {
        let mut diagnostics: Vec<ReportEntry> = warnings
            .iter()
            .map(|d| ReportEntry {
                code: None,
                severity: d.severity,
                message: d.message.clone(),
                location: d.pos.as_ref().map(Location::from),
            })
            .collect();

        if let Some(err) = error {
            diagnostics.push(ReportEntry {
                code: Some(err.code().to_string()),
                severity: Severity::Error,
                message: err.to_string(),
                location: Some(Location::from(err.pos())),
            });
        }

        Self {
            success: error.is_none(),
            diagnostics,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<&Position> for Location {
    fn from(pos: &Position) -> Self {
        Self {
            file: pos.filename.to_string(),
            line: pos.line,
            column: pos.col,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_warning_render() {
        let mut diags = Diagnostics::new();
        diags.warning(Position::start("w.cmm"), "something odd");
        assert_eq!(diags.len(), 1);
        let rendered: Vec<String> = diags.iter().map(Diagnostic::render).collect();
        assert_eq!(rendered, vec!["w.cmm:1:1: warning: something odd".to_string()]);
    }

    #[test]
    fn test_report_json() {
        let err = Error::UnterminatedComment {
            pos: Position::start("c.cmm"),
        };
        let warn = Diagnostic::warning(Position::start("c.cmm"), "w");
        let report = Report::new(&[warn], Some(&err));
        assert!(!report.success);
        assert_eq!(report.diagnostics.len(), 2);

        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["diagnostics"][1]["code"], "E0002");
        assert_eq!(value["diagnostics"][0]["severity"], "warning");
        assert_eq!(value["diagnostics"][1]["location"]["line"], 1);
    }
}
