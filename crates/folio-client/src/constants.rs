//! Client constants.
//!
//! Centralizes hardcoded values: remote error codes and channel sizes.
//! Batching and commit intervals are configurable, see
//! `folio_store::config`.

/// The supplied email/password pair was rejected.
pub const INVALID_CREDENTIALS: u32 = 1001;

/// The bearer token is no longer valid. Forces a logout.
pub const TOKEN_EXPIRED: u32 = 1002;

/// Signup for an email that already has an account.
pub const USER_EXISTS: u32 = 1003;

/// The call needs a logged-in session.
pub const NOT_LOGGED_IN: u32 = 1004;

/// The viewer may not modify the target record.
pub const PERMISSION_DENIED: u32 = 1005;

/// The authority could not apply a transaction.
pub const TRANSACTION_REJECTED: u32 = 1006;

/// Capacity of the committer's event channel.
pub const COMMIT_EVENT_CAPACITY: usize = 256;

/// Persistence partition name used by the in-process authority.
pub const LOCAL_AUTHORITY_WORKSPACE: &str = "local-authority";
