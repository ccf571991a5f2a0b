use chrono::{DateTime, TimeZone, Utc};

pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// One stored document: backend-assigned id plus its JSON fields.
/// Timestamps inside `fields` are backend-native epoch milliseconds.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub fields: JsonMap,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered: {email}")]
    DuplicateEmail { email: String },

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("backend failure: {message}")]
    Backend { message: String },
}

impl RemoteError {
    pub fn backend(message: impl Into<String>) -> Self {
        RemoteError::Backend {
            message: message.into(),
        }
    }
}

/// The remote identity + document-database contract the core consumes.
///
/// The identity half knows nothing about roles; role lives in the `users`
/// collection and is joined by the session manager. `current_session`
/// models the provider's persisted session (what a session-change
/// subscription would deliver on startup).
pub trait RemoteDataService {
    fn register(&self, email: &str, password: &str) -> Result<String, RemoteError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<String, RemoteError>;
    fn sign_out(&self) -> Result<(), RemoteError>;
    fn current_session(&self) -> Result<Option<String>, RemoteError>;

    /// Creates a document with a backend-assigned id.
    fn create(&self, collection: &str, fields: JsonMap) -> Result<String, RemoteError>;
    /// Writes a document under a caller-chosen id (used for `users/<uid>`).
    fn put(&self, collection: &str, id: &str, fields: JsonMap) -> Result<(), RemoteError>;
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError>;
    fn get_all(&self, collection: &str) -> Result<Vec<Document>, RemoteError>;
    /// Merges `patch` into the stored fields. `NotFound` when `id` is absent.
    fn update(&self, collection: &str, id: &str, patch: &JsonMap) -> Result<(), RemoteError>;
    fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

pub fn timestamp_to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn millis_to_timestamp(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
