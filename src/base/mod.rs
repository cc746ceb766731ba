//! Foundation types shared by every layer.
//!
//! - [`SourceLocation`], [`LineCol`], [`LineIndex`] - Source positions
//! - [`Dialect`] - Languages a document or library may be written in
//!
//! This module has NO dependencies on other qmljs modules.

mod dialect;
mod span;

pub use dialect::Dialect;
pub use span::{LineCol, LineIndex, SourceLocation, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
