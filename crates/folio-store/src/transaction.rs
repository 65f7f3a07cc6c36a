//! Transactions: ordered, all-or-nothing batches of operations.
//!
//! A transaction moves through `Open -> Applied -> Queued -> Committed`, or
//! to `Failed` when local application or the remote commit rejects it.
//! Application stages every touched record on a copy and writes back only if
//! every operation succeeded.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use folio_types::{Pointer, RecordValue, RecordWithRole, Role, TransactionId, UserId};

use crate::cache::RecordCacheStore;
use crate::error::{Result, StoreError};
use crate::ops::{Command, Operation};

/// Lifecycle of a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    #[default]
    Open,
    Applied,
    Queued,
    Committed,
    Failed,
}

/// An atomic batch of operations issued by one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    pub operations: Vec<Operation>,
    #[serde(skip)]
    state: TransactionState,
}

impl Transaction {
    pub fn new(user_id: UserId, space_id: Option<String>) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            space_id,
            operations: Vec::new(),
            state: TransactionState::Open,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn push(&mut self, op: Operation) -> &mut Self {
        self.operations.push(op);
        self
    }

    pub fn set(&mut self, pointer: &Pointer, path: &[&str], args: Value) -> &mut Self {
        self.push(Operation::set(pointer, path, args))
    }

    pub fn update(&mut self, pointer: &Pointer, path: &[&str], args: Value) -> &mut Self {
        self.push(Operation::update(pointer, path, args))
    }

    pub fn list_before(
        &mut self,
        pointer: &Pointer,
        path: &[&str],
        id: &str,
        before: Option<&str>,
    ) -> &mut Self {
        self.push(Operation::list_before(pointer, path, id, before))
    }

    pub fn list_after(
        &mut self,
        pointer: &Pointer,
        path: &[&str],
        id: &str,
        after: Option<&str>,
    ) -> &mut Self {
        self.push(Operation::list_after(pointer, path, id, after))
    }

    pub fn list_remove(&mut self, pointer: &Pointer, path: &[&str], id: &str) -> &mut Self {
        self.push(Operation::list_remove(pointer, path, id))
    }

    /// Apply every operation to `cache` for this transaction's user.
    ///
    /// Returns the pointers of the records written, in first-touch order.
    /// On error nothing is written and the transaction is `Failed`.
    pub fn apply(&mut self, cache: &RecordCacheStore) -> Result<Vec<Pointer>> {
        match apply_operations(cache, &self.user_id, &self.operations) {
            Ok(written) => {
                self.state = TransactionState::Applied;
                tracing::debug!(
                    txn = %self.id.short(),
                    ops = self.operations.len(),
                    records = written.len(),
                    "transaction applied"
                );
                Ok(written)
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                tracing::warn!(txn = %self.id.short(), error = %e, "transaction aborted");
                Err(e)
            }
        }
    }
}

/// A record staged for write-back.
struct Staged {
    pointer: Pointer,
    role: Role,
    base_version: u64,
    value: Option<Value>,
}

/// Apply `ops` for `user_id` against `cache`, all or nothing.
///
/// Each touched record is written once with its version bumped by one.
pub fn apply_operations(
    cache: &RecordCacheStore,
    user_id: &UserId,
    ops: &[Operation],
) -> Result<Vec<Pointer>> {
    let mut staged: Vec<Staged> = Vec::new();

    for op in ops {
        let pointer = op.pointer();
        let index = match staged.iter().position(|s| s.pointer.same_record(&pointer)) {
            Some(index) => index,
            None => {
                staged.push(stage(cache, user_id, &pointer)?);
                staged.len() - 1
            }
        };
        let entry = &mut staged[index];

        if let Some(value) = entry.value.as_mut() {
            op.apply(value)?;
        } else if op.command == Command::Set && op.path.is_empty() {
            let mut value = op.args.clone();
            let Value::Object(map) = &mut value else {
                return Err(StoreError::InvalidArgs(format!(
                    "record body for {pointer} must be an object"
                )));
            };
            map.insert("id".into(), Value::from(pointer.id.clone()));
            map.insert("table".into(), Value::from(pointer.table.as_str()));
            entry.value = Some(value);
        } else if op.command.is_list() {
            tracing::trace!(%pointer, command = ?op.command, "list op on absent record ignored");
        } else {
            return Err(StoreError::RecordNotFound(pointer.to_string()));
        }
    }

    // Decode everything before writing anything.
    let mut decoded = Vec::with_capacity(staged.len());
    for entry in staged {
        let Some(value) = entry.value else { continue };
        let mut record: RecordValue = serde_json::from_value(value)?;
        record.version = entry.base_version + 1;
        decoded.push((entry.pointer, RecordWithRole::new(entry.role, record)));
    }

    let mut written = Vec::with_capacity(decoded.len());
    for (pointer, record) in decoded {
        cache.set_record(user_id, &pointer, Some(record), true);
        written.push(pointer);
    }
    Ok(written)
}

fn stage(cache: &RecordCacheStore, user_id: &UserId, pointer: &Pointer) -> Result<Staged> {
    match cache.get_entry(user_id, pointer) {
        Some(entry) => {
            if !entry.record.role.can_edit() {
                return Err(StoreError::PermissionDenied(pointer.to_string()));
            }
            Ok(Staged {
                pointer: entry.pointer,
                role: entry.record.role,
                base_version: entry.record.version(),
                value: Some(serde_json::to_value(&entry.record.value)?),
            })
        }
        None => Ok(Staged {
            pointer: pointer.clone(),
            role: Role::Editor,
            base_version: 0,
            value: None,
        }),
    }
}

/// FIFO of transactions waiting for remote commit.
#[derive(Default)]
pub struct TransactionQueue {
    pending: Mutex<VecDeque<Transaction>>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, mut txn: Transaction) {
        txn.set_state(TransactionState::Queued);
        self.pending.lock().push_back(txn);
    }

    /// Take up to `max` transactions from the front.
    pub fn drain(&self, max: usize) -> Vec<Transaction> {
        let mut pending = self.pending.lock();
        let n = max.min(pending.len());
        pending.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Mark a drained transaction with its remote outcome.
pub fn settle(txn: &mut Transaction, committed: bool) {
    txn.set_state(if committed {
        TransactionState::Committed
    } else {
        TransactionState::Failed
    });
}

/// Body of a fresh record, for `Set` at the empty path.
pub fn record_body(value: &RecordValue) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
