//! The remote authority, as seen from a client.
//!
//! Transport is somebody else's problem: an implementation might speak JSON
//! over HTTPS with a bearer token, or (see [`LocalRemote`](crate::LocalRemote))
//! run the authority in-process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use folio_store::Transaction;
use folio_types::{Pointer, RecordWithRole, UserId};

use crate::error::RemoteError;

/// Login or signup payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Opaque bearer token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Account details returned by the authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserId,
    pub email: String,
}

/// Successful login or signup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    pub token: AuthToken,
}

/// "Send me `pointer` if you have something newer than `version`."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub user_id: UserId,
    pub pointer: Pointer,
    pub version: u64,
}

impl SyncRequest {
    /// Interchangeable for batching: same user, record, and version.
    pub fn same_request(&self, other: &SyncRequest) -> bool {
        self.user_id == other.user_id
            && self.pointer.same_record(&other.pointer)
            && self.version == other.version
    }
}

/// Remote RPC surface.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn get_user(&self, token: &AuthToken) -> Result<UserInfo, RemoteError>;

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, RemoteError>;

    async fn signup(&self, credentials: &Credentials) -> Result<LoginResponse, RemoteError>;

    /// Canonical records for a batch of requests, one answer per request in
    /// order. `None` means the viewer has no record: a tombstone.
    async fn sync_record_values(
        &self,
        requests: Vec<SyncRequest>,
    ) -> Result<Vec<Option<RecordWithRole>>, RemoteError>;

    /// Apply transactions in order on the authority.
    async fn apply_transactions(
        &self,
        token: &AuthToken,
        transactions: Vec<Transaction>,
    ) -> Result<(), RemoteError>;

    /// Single-record convenience over [`sync_record_values`](Self::sync_record_values).
    async fn sync_record_value(
        &self,
        user_id: &UserId,
        pointer: &Pointer,
        version: u64,
    ) -> Result<Option<RecordWithRole>, RemoteError> {
        let request = SyncRequest {
            user_id: user_id.clone(),
            pointer: pointer.clone(),
            version,
        };
        let mut answers = self.sync_record_values(vec![request]).await?;
        answers
            .pop()
            .ok_or_else(|| RemoteError::Transport("empty sync response".into()))
    }
}
