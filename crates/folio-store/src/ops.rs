//! Operations: single structural mutations against a record.
//!
//! Operations apply to the JSON projection of a `RecordValue`. A path is a
//! sequence of property names from the record root (`["title"]`,
//! `["properties", "checked"]`, `["content"]`); the empty path addresses the
//! record itself.
//!
//! Missing intermediate objects are created on the way down for `Set`,
//! `Update`, and the list inserts. Walking through a value that is not an
//! object is a [`StoreError::PathConflict`]. `ListRemove` on a missing path
//! is a no-op.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

use folio_types::{Pointer, Table};

use crate::error::{Result, StoreError};

/// Operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Command {
    /// Replace the value at the path.
    Set,
    /// Shallow-merge an object into the value at the path.
    Update,
    /// Insert an id into the list at the path, before a reference id.
    ListBefore,
    /// Insert an id into the list at the path, after a reference id.
    ListAfter,
    /// Remove an id from the list at the path.
    ListRemove,
}

impl Command {
    pub fn is_list(&self) -> bool {
        matches!(self, Command::ListBefore | Command::ListAfter | Command::ListRemove)
    }
}

/// One mutation of one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub table: Table,
    #[serde(default)]
    pub path: Vec<String>,
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default)]
    pub args: Value,
}

impl Operation {
    pub fn new(pointer: &Pointer, path: &[&str], command: Command, args: Value) -> Self {
        Self {
            id: pointer.id.clone(),
            table: pointer.table,
            path: path.iter().map(|s| s.to_string()).collect(),
            command,
            size: None,
            args,
        }
    }

    pub fn set(pointer: &Pointer, path: &[&str], args: Value) -> Self {
        Self::new(pointer, path, Command::Set, args)
    }

    pub fn update(pointer: &Pointer, path: &[&str], args: Value) -> Self {
        Self::new(pointer, path, Command::Update, args)
    }

    /// Insert `id` after `after`, or at the tail when `after` is `None`.
    pub fn list_after(pointer: &Pointer, path: &[&str], id: &str, after: Option<&str>) -> Self {
        let mut args = serde_json::json!({ "id": id });
        if let Some(after) = after {
            args["after"] = Value::from(after);
        }
        Self::new(pointer, path, Command::ListAfter, args)
    }

    /// Insert `id` before `before`, or at the head when `before` is `None`.
    pub fn list_before(pointer: &Pointer, path: &[&str], id: &str, before: Option<&str>) -> Self {
        let mut args = serde_json::json!({ "id": id });
        if let Some(before) = before {
            args["before"] = Value::from(before);
        }
        Self::new(pointer, path, Command::ListBefore, args)
    }

    pub fn list_remove(pointer: &Pointer, path: &[&str], id: &str) -> Self {
        Self::new(pointer, path, Command::ListRemove, serde_json::json!({ "id": id }))
    }

    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.table, self.id.clone())
    }

    /// Apply to a record's JSON projection in place.
    pub fn apply(&self, record: &mut Value) -> Result<()> {
        match self.command {
            Command::Set => {
                let slot = self.resolve(record, true)?.ok_or_else(|| self.conflict(0))?;
                *slot = self.args.clone();
            }
            Command::Update => {
                let slot = self.resolve(record, true)?.ok_or_else(|| self.conflict(0))?;
                match (slot, &self.args) {
                    (Value::Object(target), Value::Object(patch)) => {
                        for (k, v) in patch {
                            target.insert(k.clone(), v.clone());
                        }
                    }
                    (slot, args) => *slot = args.clone(),
                }
            }
            Command::ListBefore | Command::ListAfter => {
                let (id, reference) = self.list_args()?;
                let slot = self.resolve(record, true)?.ok_or_else(|| self.conflict(0))?;
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                let Value::Array(list) = slot else {
                    return Err(self.conflict(self.path.len()));
                };
                list_insert(list, id, reference, self.command == Command::ListAfter);
            }
            Command::ListRemove => {
                let (id, _) = self.list_args()?;
                match self.resolve(record, false)? {
                    Some(Value::Array(list)) => list.retain(|v| v.as_str() != Some(id)),
                    Some(Value::Null) | None => {}
                    Some(_) => return Err(self.conflict(self.path.len())),
                }
            }
        }
        Ok(())
    }

    /// Walk to the value at `self.path`. With `create`, missing steps are
    /// filled in (intermediates as objects, the leaf as null); without it a
    /// missing step yields `None`.
    fn resolve<'a>(&self, root: &'a mut Value, create: bool) -> Result<Option<&'a mut Value>> {
        let mut current = root;
        for (depth, key) in self.path.iter().enumerate() {
            if current.is_null() {
                if !create {
                    return Ok(None);
                }
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                return Err(self.conflict(depth));
            };
            current = if create {
                map.entry(key.clone()).or_insert(Value::Null)
            } else {
                match map.get_mut(key) {
                    Some(value) => value,
                    None => return Ok(None),
                }
            };
        }
        Ok(Some(current))
    }

    fn list_args(&self) -> Result<(&str, Option<&str>)> {
        let id = self
            .args
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::InvalidArgs(format!("{:?} requires a string id", self.command))
            })?;
        let reference_key = match self.command {
            Command::ListBefore => "before",
            _ => "after",
        };
        let reference = self.args.get(reference_key).and_then(Value::as_str);
        Ok((id, reference))
    }

    fn conflict(&self, depth: usize) -> StoreError {
        StoreError::PathConflict {
            record: self.pointer().to_string(),
            path: self.path[..depth.min(self.path.len())].to_vec(),
        }
    }
}

/// Insert `id` next to `reference`, moving it if already present. An unknown
/// or absent reference means head (before) or tail (after).
fn list_insert(list: &mut Vec<Value>, id: &str, reference: Option<&str>, after: bool) {
    list.retain(|v| v.as_str() != Some(id));
    let position = reference.and_then(|r| list.iter().position(|v| v.as_str() == Some(r)));
    let index = match (position, after) {
        (Some(i), true) => i + 1,
        (Some(i), false) => i,
        (None, true) => list.len(),
        (None, false) => 0,
    };
    list.insert(index, Value::from(id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block() -> Pointer {
        Pointer::block("b1")
    }

    fn ids(value: &Value) -> Vec<&str> {
        value["content"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_set_replaces_and_creates_intermediates() {
        let mut record = json!({ "id": "b1" });
        Operation::set(&block(), &["properties", "checked"], json!(true))
            .apply(&mut record)
            .unwrap();
        assert_eq!(record["properties"]["checked"], json!(true));

        Operation::set(&block(), &["properties"], json!({ "x": 1 }))
            .apply(&mut record)
            .unwrap();
        assert_eq!(record["properties"], json!({ "x": 1 }));
    }

    #[test]
    fn test_update_merges_shallowly() {
        let mut record = json!({ "properties": { "a": 1, "b": { "deep": true } } });
        Operation::update(&block(), &["properties"], json!({ "b": 2, "c": 3 }))
            .apply(&mut record)
            .unwrap();
        assert_eq!(record["properties"], json!({ "a": 1, "b": 2, "c": 3 }));
    }

    #[test]
    fn test_path_through_scalar_conflicts() {
        let mut record = json!({ "title": "plain" });
        let err = Operation::set(&block(), &["title", "x"], json!(1))
            .apply(&mut record)
            .unwrap_err();
        match err {
            StoreError::PathConflict { path, .. } => assert_eq!(path, vec!["title".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_list_insert_positions() {
        let mut record = json!({ "content": ["a", "c"] });
        Operation::list_after(&block(), &["content"], "b", Some("a"))
            .apply(&mut record)
            .unwrap();
        Operation::list_before(&block(), &["content"], "z", None)
            .apply(&mut record)
            .unwrap();
        Operation::list_after(&block(), &["content"], "y", Some("missing"))
            .apply(&mut record)
            .unwrap();
        assert_eq!(ids(&record), ["z", "a", "b", "c", "y"]);
    }

    #[test]
    fn test_list_ops_replay_safely() {
        let mut record = json!({});
        let insert = Operation::list_after(&block(), &["content"], "a", None);
        insert.apply(&mut record).unwrap();
        insert.apply(&mut record).unwrap();
        assert_eq!(ids(&record), ["a"]);

        let remove = Operation::list_remove(&block(), &["content"], "a");
        remove.apply(&mut record).unwrap();
        remove.apply(&mut record).unwrap();
        assert!(ids(&record).is_empty());

        // Removing from a list that was never created is fine too.
        let mut bare = json!({});
        remove.apply(&mut bare).unwrap();
        assert_eq!(bare, json!({}));
    }

    #[test]
    fn test_list_args_validated() {
        let mut record = json!({});
        let op = Operation::new(&block(), &["content"], Command::ListAfter, json!({ "id": 5 }));
        assert!(matches!(op.apply(&mut record), Err(StoreError::InvalidArgs(_))));
    }

    #[test]
    fn test_operation_wire_shape() {
        let op = Operation::list_after(&block(), &["content"], "c1", Some("c0"));
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({
                "id": "b1",
                "table": "block",
                "path": ["content"],
                "command": "listAfter",
                "args": { "id": "c1", "after": "c0" }
            })
        );
    }
}
