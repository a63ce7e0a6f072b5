//! Accumulating diagnostic log for a compilation run.
//!
//! Every stage appends here instead of failing on the first problem, so a
//! single run reports everything it found. `has_errors` is the gate checked
//! between dependent stages.

use std::fmt;

use tracing::warn;

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Missing primary key, bad key or order spec, malformed computed column.
    Validation,
    /// No storage type or no converter for a member.
    TypeMapping,
    /// Key expansion revisited a key already being expanded.
    CircularReference,
    /// An object name collided and was renamed.
    NamingCollision,
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational; does not fail compilation.
    Warning,
    /// Fails compilation.
    Error,
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// Severity.
    pub severity: Severity,
    /// Entity the problem was found on, if any.
    pub entity: Option<String>,
    /// Human readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.entity {
            Some(entity) => write!(f, "{level} [{:?}] {entity}: {}", self.kind, self.message),
            None => write!(f, "{level} [{:?}] {}", self.kind, self.message),
        }
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error.
    pub fn error(&mut self, kind: DiagnosticKind, entity: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = ?kind, entity = entity.unwrap_or(""), "{message}");
        self.items.push(Diagnostic {
            kind,
            severity: Severity::Error,
            entity: entity.map(str::to_string),
            message,
        });
    }

    /// Append a warning.
    pub fn warning(
        &mut self,
        kind: DiagnosticKind,
        entity: Option<&str>,
        message: impl Into<String>,
    ) {
        self.items.push(Diagnostic {
            kind,
            severity: Severity::Warning,
            entity: entity.map(str::to_string),
            message: message.into(),
        });
    }

    /// Check if any error has been recorded.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Iterate over errors only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over all diagnostics of a kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    /// Iterate over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Total number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.items {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}
