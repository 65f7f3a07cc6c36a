//! In-process authority.
//!
//! `LocalRemote` plays the server for offline users and tests. It keeps the
//! canonical records in its own [`RecordCacheStore`] (one entry per viewer,
//! carrying that viewer's role) and applies transactions with the same
//! operation engine the client uses, so versions advance identically on both
//! sides. A batch of transactions is all or nothing: when one is rejected,
//! every record the batch touched is put back as it was.
//!
//! Passwords are compared in memory as given. This authority never leaves the
//! process.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use folio_store::{RecordCacheStore, StoreError, Transaction, apply_operations};
use folio_types::{Pointer, RecordValue, RecordWithRole, Role, Table, UserId};

use crate::constants::{
    INVALID_CREDENTIALS, LOCAL_AUTHORITY_WORKSPACE, PERMISSION_DENIED, TOKEN_EXPIRED,
    TRANSACTION_REJECTED, USER_EXISTS,
};
use crate::error::RemoteError;
use crate::remote::{AuthToken, Credentials, LoginResponse, RemoteService, SyncRequest, UserInfo};

struct Account {
    user: UserInfo,
    password: String,
}

/// An authority living in this process.
pub struct LocalRemote {
    records: RecordCacheStore,
    accounts: DashMap<String, Account>,
    tokens: DashMap<AuthToken, UserId>,
    offline: AtomicBool,
    sync_batches: AtomicUsize,
    synced_requests: AtomicUsize,
}

impl Default for LocalRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRemote {
    pub fn new() -> Self {
        Self {
            records: RecordCacheStore::new(LOCAL_AUTHORITY_WORKSPACE),
            accounts: DashMap::new(),
            tokens: DashMap::new(),
            offline: AtomicBool::new(false),
            sync_batches: AtomicUsize::new(0),
            synced_requests: AtomicUsize::new(0),
        }
    }

    // =========================================================================
    // Seeding and inspection
    // =========================================================================

    /// Store `record` as `user_id`'s canonical view, replacing what was there.
    pub fn put_record(&self, user_id: &UserId, record: RecordWithRole) {
        let pointer = record.value.pointer();
        self.records.set_record(user_id, &pointer, Some(record), true);
    }

    /// Drop `user_id`'s view of `pointer`.
    pub fn remove_record(&self, user_id: &UserId, pointer: &Pointer) {
        self.records.delete_record(user_id, pointer);
    }

    /// `user_id`'s canonical view of `pointer`.
    pub fn record(&self, user_id: &UserId, pointer: &Pointer) -> Option<RecordWithRole> {
        self.records.get_record(user_id, pointer)
    }

    /// Fail every call with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidate every issued token.
    pub fn expire_tokens(&self) {
        self.tokens.clear();
    }

    /// Number of `sync_record_values` calls served.
    pub fn sync_batches(&self) -> usize {
        self.sync_batches.load(Ordering::SeqCst)
    }

    /// Number of individual sync requests served across all batches.
    pub fn synced_requests(&self) -> usize {
        self.synced_requests.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("authority offline".into()));
        }
        Ok(())
    }

    fn authenticate(&self, token: &AuthToken) -> Result<UserId, RemoteError> {
        self.tokens
            .get(token)
            .map(|user| user.value().clone())
            .ok_or_else(|| RemoteError::domain(TOKEN_EXPIRED, "token expired"))
    }

    fn issue_token(&self, user: &UserInfo) -> AuthToken {
        let token = AuthToken::new(uuid::Uuid::new_v4().simple().to_string());
        self.tokens.insert(token.clone(), user.id.clone());
        token
    }

    fn apply_one(&self, user_id: &UserId, txn: &Transaction) -> Result<(), RemoteError> {
        if &txn.user_id != user_id {
            return Err(RemoteError::domain(
                PERMISSION_DENIED,
                format!("transaction {} belongs to another user", txn.id.short()),
            ));
        }
        apply_operations(&self.records, user_id, &txn.operations).map_err(|e| match e {
            StoreError::PermissionDenied(record) => {
                RemoteError::domain(PERMISSION_DENIED, format!("cannot edit {record}"))
            }
            other => RemoteError::domain(TRANSACTION_REJECTED, other.to_string()),
        })?;
        tracing::debug!(
            txn = %txn.id.short(),
            user = %user_id,
            ops = txn.operations.len(),
            "authority applied transaction"
        );
        Ok(())
    }

    /// Canonical state of every record `transactions` touch, before any apply.
    fn snapshot(
        &self,
        user_id: &UserId,
        transactions: &[Transaction],
    ) -> Vec<(Pointer, Option<RecordWithRole>)> {
        let mut snapshot: Vec<(Pointer, Option<RecordWithRole>)> = Vec::new();
        for op in transactions.iter().flat_map(|txn| &txn.operations) {
            let pointer = op.pointer();
            if snapshot.iter().any(|(seen, _)| seen.same_record(&pointer)) {
                continue;
            }
            let record = self.records.get_record(user_id, &pointer);
            snapshot.push((pointer, record));
        }
        snapshot
    }
}

#[async_trait]
impl RemoteService for LocalRemote {
    async fn get_user(&self, token: &AuthToken) -> Result<UserInfo, RemoteError> {
        self.check_online()?;
        let user_id = self.authenticate(token)?;
        self.accounts
            .iter()
            .find(|account| account.user.id == user_id)
            .map(|account| account.user.clone())
            .ok_or_else(|| RemoteError::domain(TOKEN_EXPIRED, "account no longer exists"))
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, RemoteError> {
        self.check_online()?;
        let user = match self.accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => account.user.clone(),
            _ => {
                return Err(RemoteError::domain(
                    INVALID_CREDENTIALS,
                    "invalid email or password",
                ));
            }
        };
        let token = self.issue_token(&user);
        tracing::info!(user = %user.id, "login");
        Ok(LoginResponse { user, token })
    }

    async fn signup(&self, credentials: &Credentials) -> Result<LoginResponse, RemoteError> {
        self.check_online()?;
        let user = match self.accounts.entry(credentials.email.clone()) {
            Entry::Occupied(_) => {
                return Err(RemoteError::domain(USER_EXISTS, "an account with this email exists"));
            }
            Entry::Vacant(vacant) => {
                let user = UserInfo {
                    id: UserId::new(uuid::Uuid::now_v7().to_string()),
                    email: credentials.email.clone(),
                };
                vacant.insert(Account {
                    user: user.clone(),
                    password: credentials.password.clone(),
                });
                user
            }
        };

        let root = Pointer::space_root(&user.id);
        let value = RecordValue::new(Table::SpaceRoot, &root.id).with_version(1);
        self.put_record(&user.id, RecordWithRole::new(Role::Editor, value));

        let token = self.issue_token(&user);
        tracing::info!(user = %user.id, "signup");
        Ok(LoginResponse { user, token })
    }

    async fn sync_record_values(
        &self,
        requests: Vec<SyncRequest>,
    ) -> Result<Vec<Option<RecordWithRole>>, RemoteError> {
        self.check_online()?;
        self.sync_batches.fetch_add(1, Ordering::SeqCst);
        self.synced_requests.fetch_add(requests.len(), Ordering::SeqCst);
        Ok(requests
            .iter()
            .map(|request| self.records.get_record(&request.user_id, &request.pointer))
            .collect())
    }

    async fn apply_transactions(
        &self,
        token: &AuthToken,
        transactions: Vec<Transaction>,
    ) -> Result<(), RemoteError> {
        self.check_online()?;
        let user_id = self.authenticate(token)?;

        // A batch lands whole or not at all.
        let snapshot = self.snapshot(&user_id, &transactions);
        for (applied, txn) in transactions.iter().enumerate() {
            if let Err(error) = self.apply_one(&user_id, txn) {
                for (pointer, record) in snapshot {
                    self.records.set_record(&user_id, &pointer, record, true);
                }
                tracing::warn!(
                    txn = %txn.id.short(),
                    user = %user_id,
                    rolled_back = applied,
                    %error,
                    "authority rejected batch"
                );
                return Err(error);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BlockType, Segment};

    fn creds() -> Credentials {
        Credentials::new("ada@example.com", "hunter2")
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let remote = LocalRemote::new();
        let signed = remote.signup(&creds()).await.unwrap();
        let root = remote
            .record(&signed.user.id, &Pointer::space_root(&signed.user.id))
            .unwrap();
        assert_eq!(root.role, Role::Editor);
        assert_eq!(root.version(), 1);

        let logged = remote.login(&creds()).await.unwrap();
        assert_eq!(logged.user, signed.user);
        assert_ne!(logged.token, signed.token);
        assert_eq!(remote.get_user(&logged.token).await.unwrap(), signed.user);
    }

    #[tokio::test]
    async fn test_duplicate_signup_and_bad_password() {
        let remote = LocalRemote::new();
        remote.signup(&creds()).await.unwrap();

        let err = remote.signup(&creds()).await.unwrap_err();
        assert_eq!(err.code(), Some(USER_EXISTS));

        let err = remote
            .login(&Credentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let remote = LocalRemote::new();
        let signed = remote.signup(&creds()).await.unwrap();
        remote.expire_tokens();
        let err = remote.get_user(&signed.token).await.unwrap_err();
        assert!(err.is_token_expired());
    }

    #[tokio::test]
    async fn test_apply_bumps_canonical_version() {
        let remote = LocalRemote::new();
        let signed = remote.signup(&creds()).await.unwrap();
        let user = signed.user.id.clone();

        let block = RecordValue::block("b1", BlockType::Text)
            .with_title(vec![Segment::plain("hi")])
            .with_version(3);
        remote.put_record(&user, RecordWithRole::new(Role::Editor, block));

        let mut txn = Transaction::new(user.clone(), None);
        txn.set(&Pointer::block("b1"), &["properties", "checked"], serde_json::json!(true));
        remote.apply_transactions(&signed.token, vec![txn]).await.unwrap();

        assert_eq!(remote.record(&user, &Pointer::block("b1")).unwrap().version(), 4);
    }

    #[tokio::test]
    async fn test_apply_rejects_reader() {
        let remote = LocalRemote::new();
        let signed = remote.signup(&creds()).await.unwrap();
        let user = signed.user.id.clone();
        let block = RecordValue::block("b1", BlockType::Text);
        remote.put_record(&user, RecordWithRole::new(Role::Reader, block));

        let mut txn = Transaction::new(user.clone(), None);
        txn.set(&Pointer::block("b1"), &["title"], serde_json::json!([]));
        let err = remote.apply_transactions(&signed.token, vec![txn]).await.unwrap_err();
        assert_eq!(err.code(), Some(PERMISSION_DENIED));
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_no_trace() {
        let remote = LocalRemote::new();
        let signed = remote.signup(&creds()).await.unwrap();
        let user = signed.user.id.clone();
        let editable = RecordValue::block("b1", BlockType::Text).with_version(3);
        remote.put_record(&user, RecordWithRole::new(Role::Editor, editable));
        let locked = RecordValue::block("b2", BlockType::Text).with_version(1);
        remote.put_record(&user, RecordWithRole::new(Role::Reader, locked));

        let mut first = Transaction::new(user.clone(), None);
        let title = serde_json::to_value(vec![Segment::plain("kept?")]).unwrap();
        first.set(&Pointer::block("b1"), &["title"], title);
        let mut created = Transaction::new(user.clone(), None);
        let body = serde_json::to_value(RecordValue::block("b3", BlockType::Text)).unwrap();
        created.set(&Pointer::block("b3"), &[], body);
        let mut rejected = Transaction::new(user.clone(), None);
        rejected.set(&Pointer::block("b2"), &["title"], serde_json::json!([]));

        let err = remote
            .apply_transactions(&signed.token, vec![first, created, rejected])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(PERMISSION_DENIED));

        let b1 = remote.record(&user, &Pointer::block("b1")).unwrap();
        assert_eq!(b1.version(), 3);
        assert_eq!(b1.value.plain_title(), "");
        assert!(remote.record(&user, &Pointer::block("b3")).is_none());
        assert_eq!(remote.record(&user, &Pointer::block("b2")).unwrap().version(), 1);
    }

    #[tokio::test]
    async fn test_offline() {
        let remote = LocalRemote::new();
        remote.set_offline(true);
        assert!(matches!(remote.signup(&creds()).await, Err(RemoteError::Transport(_))));
        remote.set_offline(false);
        assert!(remote.signup(&creds()).await.is_ok());
    }
}
