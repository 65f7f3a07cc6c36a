//! Record addresses, values, and viewer roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::block::BlockType;
use crate::ids::UserId;
use crate::segment::Segment;

/// Table a record lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Table {
    #[default]
    Block,
    Page,
    Space,
    SpaceRoot,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Block => "block",
            Table::Page => "page",
            Table::Space => "space",
            Table::SpaceRoot => "space_root",
        }
    }

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a record, independent of who is looking at it.
///
/// `space_id` is enrichment: the cache keeps a previously learned space id
/// when a later write arrives without one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    pub table: Table,
    pub id: String,
    #[serde(rename = "spaceId", default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
}

impl Pointer {
    pub fn new(table: Table, id: impl Into<String>) -> Self {
        Self {
            table,
            id: id.into(),
            space_id: None,
        }
    }

    pub fn block(id: impl Into<String>) -> Self {
        Self::new(Table::Block, id)
    }

    pub fn page(id: impl Into<String>) -> Self {
        Self::new(Table::Page, id)
    }

    pub fn space(id: impl Into<String>) -> Self {
        Self::new(Table::Space, id)
    }

    /// The per-user root listing that user's spaces.
    pub fn space_root(user_id: &UserId) -> Self {
        Self::new(Table::SpaceRoot, user_id.as_str())
    }

    pub fn with_space(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    /// Same table and id, ignoring enrichment.
    pub fn same_record(&self, other: &Pointer) -> bool {
        self.table == other.table && self.id == other.id
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.id)
    }
}

/// A viewer's access level on a record.
///
/// Not a record attribute: the same record can be cached under different
/// roles for different users.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    /// No access. Entries with this role are skipped by per-user iteration.
    #[default]
    None,
    Reader,
    CommentOnly,
    ReadAndWrite,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Reader => "reader",
            Role::CommentOnly => "comment_only",
            Role::ReadAndWrite => "read_and_write",
            Role::Editor => "editor",
        }
    }

    /// Whether operations may be applied on behalf of this viewer.
    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Editor | Role::ReadAndWrite)
    }

    pub fn can_read(&self) -> bool {
        !matches!(self, Role::None)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Versioned record payload.
///
/// `version` is assigned by the authoritative remote and is the only signal the
/// cache uses to order competing writes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    pub id: String,
    #[serde(default)]
    pub table: Table,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<Segment>,
    /// Ordered child ids, the adjacency list of the tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub version: u64,
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_table: Option<Table>,
}

impl RecordValue {
    pub fn new(table: Table, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            table,
            ..Default::default()
        }
    }

    pub fn block(id: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            block_type,
            ..Self::new(Table::Block, id)
        }
    }

    pub fn with_title(mut self, title: Vec<Segment>) -> Self {
        self.title = title;
        self
    }

    pub fn with_content(mut self, content: Vec<String>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_parent(mut self, parent: &Pointer) -> Self {
        self.parent_id = Some(parent.id.clone());
        self.parent_table = Some(parent.table);
        self
    }

    pub fn pointer(&self) -> Pointer {
        Pointer {
            table: self.table,
            id: self.id.clone(),
            space_id: self.space_id.clone(),
        }
    }

    /// Child ids, empty when the record has no content list.
    pub fn children(&self) -> &[String] {
        self.content.as_deref().unwrap_or(&[])
    }

    /// Title as plain text, annotations dropped.
    pub fn plain_title(&self) -> String {
        self.title.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }
}

/// The unit stored in the cache: a record as seen by one viewer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordWithRole {
    pub role: Role,
    pub value: RecordValue,
}

impl RecordWithRole {
    pub fn new(role: Role, value: RecordValue) -> Self {
        Self { role, value }
    }

    pub fn version(&self) -> u64 {
        self.value.version
    }
}

/// Cache address: `table:id:userId`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(pointer: &Pointer, user_id: &UserId) -> Self {
        Self(format!("{}:{}:{}", pointer.table, pointer.id, user_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(table, id, user)`.
    ///
    /// Record ids never contain `:`, but user ids might, so the user part
    /// takes the remainder.
    pub fn parse(key: &str) -> Option<(Table, String, UserId)> {
        let mut parts = key.splitn(3, ':');
        let table = Table::from_str(parts.next()?)?;
        let id = parts.next()?.to_string();
        let user = parts.next()?;
        if id.is_empty() || user.is_empty() {
            return None;
        }
        Some((table, id, UserId::new(user)))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.0)
    }
}
