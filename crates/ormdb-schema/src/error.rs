//! Schema compiler error types.

use ormdb_types::{ConversionError, ValueType};
use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Schema compiler errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A second default storage type was registered for the same host type bucket.
    #[error(
        "duplicate default storage type for {host_type} (unlimited: {unlimited}): '{existing}' already registered, cannot add '{added}'"
    )]
    DuplicateDefaultType {
        /// Host type of the bucket.
        host_type: ValueType,
        /// Whether the bucket is the unlimited-size one.
        unlimited: bool,
        /// Name of the descriptor already registered.
        existing: String,
        /// Name of the rejected descriptor.
        added: String,
    },

    /// A storage type definition is malformed.
    #[error("invalid storage type definition '{name}': {reason}")]
    InvalidTypeDef {
        /// Descriptor name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Compilation failed; carries every diagnostic collected during the run.
    #[error("schema compilation failed with {} error(s):\n{}", .0.error_count(), .0)]
    Compilation(Diagnostics),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Value conversion error.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl Error {
    /// Diagnostics of a failed compilation.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Error::Compilation(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use ormdb_types::ScalarType;

    #[test]
    fn test_duplicate_default_display() {
        let err = Error::DuplicateDefaultType {
            host_type: ValueType::scalar(ScalarType::Int32),
            unlimited: false,
            existing: "int".into(),
            added: "integer".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("i32"));
        assert!(msg.contains("'int'"));
        assert!(msg.contains("'integer'"));
    }

    #[test]
    fn test_compilation_error_carries_diagnostics() {
        let mut diags = Diagnostics::new();
        diags.error(DiagnosticKind::Validation, Some("Book"), "no primary key");
        let err = Error::Compilation(diags);

        assert!(err.to_string().contains("1 error(s)"));
        assert_eq!(err.diagnostics().map(|d| d.len()), Some(1));
    }
}
