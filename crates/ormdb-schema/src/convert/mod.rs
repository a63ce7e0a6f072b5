//! Bidirectional value converters between storage and host types.

mod converter;
pub mod numeric;
mod registry;

pub use converter::{ConvertFn, Converter};
pub use registry::ConverterRegistry;
