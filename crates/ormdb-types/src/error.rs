//! Conversion error types.

use thiserror::Error;

/// A value could not be converted between a storage type and a host type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert value '{value}' from {from_type} to {to_type} ({context}): {reason}")]
pub struct ConversionError {
    /// Display form of the offending value.
    pub value: String,
    /// Source type name.
    pub from_type: String,
    /// Target type name.
    pub to_type: String,
    /// Direction or call-site context.
    pub context: String,
    /// Underlying failure.
    pub reason: String,
}

impl ConversionError {
    /// Create a conversion error with no context attached yet.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            value: String::new(),
            from_type: String::new(),
            to_type: String::new(),
            context: String::new(),
            reason: reason.into(),
        }
    }

    /// Attach the offending value, both type names, and context.
    pub fn with_context(
        mut self,
        value: impl ToString,
        from_type: impl ToString,
        to_type: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        self.value = value.to_string();
        self.from_type = from_type.to_string();
        self.to_type = to_type.to_string();
        self.context = context.into();
        self
    }
}
