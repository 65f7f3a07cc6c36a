//! Text algorithms for folio titles.
//!
//! - [`diff`]: character diffs between two snapshots
//! - [`segment`]: splicing and toggling annotations on segment lists
//! - [`editable`]: turning native input snapshots into minimal edits
//! - [`markdown`]: `"# "`-style block conversion shortcuts
//!
//! Everything here is pure and synchronous. The store layer decides where the
//! results get written.

pub mod diff;
pub mod editable;
pub mod error;
pub mod markdown;
pub mod segment;

pub use diff::{DEFAULT_DIFF_TIMEOUT, Diff, DiffEngine, DiffOp, HalfMatch, text_change};
pub use editable::{EditableState, TypeData, apply_type_data, deduce_input};
pub use error::TextError;
pub use markdown::{Shortcut, detect_shortcut};

/// Result alias for text operations.
pub type Result<T> = std::result::Result<T, TextError>;
