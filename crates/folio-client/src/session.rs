//! Login state.
//!
//! A `Session` holds at most one logged-in user and their token. Every remote
//! error that passes through it is inspected: the token-expired code logs the
//! user out, which also drops that user's cached records.

use std::sync::Arc;

use parking_lot::RwLock;

use folio_store::{SharedRecordCache, Transaction};

use crate::constants::NOT_LOGGED_IN;
use crate::error::RemoteError;
use crate::remote::{AuthToken, Credentials, LoginResponse, RemoteService, UserInfo};

pub struct Session {
    remote: Arc<dyn RemoteService>,
    cache: SharedRecordCache,
    current: RwLock<Option<LoginResponse>>,
}

impl Session {
    pub fn new(remote: Arc<dyn RemoteService>, cache: SharedRecordCache) -> Self {
        Self {
            remote,
            cache,
            current: RwLock::new(None),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteService> {
        &self.remote
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.current.read().as_ref().map(|login| login.user.clone())
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.current.read().as_ref().map(|login| login.token.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.read().is_some()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserInfo, RemoteError> {
        let response = self.remote.login(credentials).await?;
        Ok(self.begin(response))
    }

    pub async fn signup(&self, credentials: &Credentials) -> Result<UserInfo, RemoteError> {
        let response = self.remote.signup(credentials).await?;
        Ok(self.begin(response))
    }

    fn begin(&self, response: LoginResponse) -> UserInfo {
        let user = response.user.clone();
        let previous = self.current.write().replace(response);
        if let Some(previous) = previous.filter(|p| p.user.id != user.id) {
            self.cache.delete_user_records(&previous.user.id);
        }
        tracing::info!(user = %user.id, "session started");
        user
    }

    /// End the session and drop the user's cached records.
    ///
    /// Returns the user that was logged in, if any.
    pub fn logout(&self) -> Option<UserInfo> {
        let previous = self.current.write().take()?;
        let removed = self.cache.delete_user_records(&previous.user.id);
        tracing::info!(user = %previous.user.id, removed, "session ended");
        Some(previous.user)
    }

    /// Inspect a remote error, logging out on an expired token.
    pub fn observe(&self, error: &RemoteError) {
        if error.is_token_expired() && self.is_logged_in() {
            tracing::warn!("token expired, forcing logout");
            self.logout();
        }
    }

    /// Re-read the account behind the current token.
    pub async fn refresh_user(&self) -> Result<UserInfo, RemoteError> {
        let token = self.require_token()?;
        let result = self.remote.get_user(&token).await;
        match &result {
            Ok(user) => {
                if let Some(login) = self.current.write().as_mut() {
                    login.user = user.clone();
                }
            }
            Err(e) => self.observe(e),
        }
        result
    }

    /// Submit transactions with the current token.
    pub async fn apply_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<(), RemoteError> {
        let token = self.require_token()?;
        let result = self.remote.apply_transactions(&token, transactions).await;
        if let Err(e) = &result {
            self.observe(e);
        }
        result
    }

    fn require_token(&self) -> Result<AuthToken, RemoteError> {
        self.token()
            .ok_or_else(|| RemoteError::domain(NOT_LOGGED_IN, "not logged in"))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("user", &self.user()).finish_non_exhaustive()
    }
}
