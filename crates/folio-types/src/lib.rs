//! Shared record, pointer, and segment types for folio.
//!
//! This crate is the data-model foundation: record addresses, versioned record
//! values, viewer roles, block types, and annotated text segments. It has **no
//! internal folio dependencies**. It is the leaf crate the text, store, and client
//! layers build on.
//!
//! # Record Model
//!
//! ```text
//! space_root (id = user id)
//!     └── content: [space ids]
//! space
//!     └── content: [page ids]
//! page / block
//!     └── title: [Segment]           annotated text
//!     └── content: [child block ids] ordered adjacency list
//!     └── properties: { .. }         free-form JSON
//!     └── version                    assigned by the authoritative remote
//! ```
//!
//! # Key Types
//!
//! |--------------------|------------------------------------------------|
//! | Type               | Purpose                                        |
//! |--------------------|------------------------------------------------|
//! | [`Pointer`]        | `(table, id)` address, optional `spaceId`      |
//! | [`RecordValue`]    | Versioned record payload                       |
//! | [`Role`]           | Viewer permission on a record                  |
//! | [`RecordWithRole`] | The unit stored in the record cache            |
//! | [`CacheKey`]       | `table:id:userId`                              |
//! | [`Segment`]        | Run of text with a uniform annotation set      |
//! | [`BlockType`]      | Closed set of block kinds + render table       |
//! |--------------------|------------------------------------------------|

pub mod block;
pub mod ids;
pub mod record;
pub mod segment;

pub use block::{BlockType, BlockTypeSpec};
pub use ids::{TransactionId, UserId, new_record_id};
pub use record::{CacheKey, Pointer, RecordValue, RecordWithRole, Role, Table};
pub use segment::{Annotation, Segment, same_annotation_set};

