//! Error types for text operations.

use thiserror::Error;

/// Errors from segment and input operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    /// Range is inverted or runs past the end of the text.
    #[error("invalid range {start}..{end} for text of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// Editable snapshot whose selection lies outside its value.
    #[error("selection {start}..{end} outside value of length {len}")]
    InvalidSelection { start: usize, end: usize, len: usize },
}
