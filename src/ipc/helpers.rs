use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::backend::SqliteBackend;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::models::{Principal, Role};
use crate::remote::RemoteError;
use crate::session::{SessionError, SessionManager};
use crate::store::{Entity, EntityStore, StoreError};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr::new("bad_params", message)
    }

    pub fn no_workspace() -> Self {
        HandlerErr::new("no_workspace", "no workspace selected")
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<SessionError> for HandlerErr {
    fn from(e: SessionError) -> Self {
        let code = match &e {
            SessionError::InvalidCredentials => "auth_invalid_credentials",
            SessionError::RoleMismatch { .. } => "role_mismatch",
            SessionError::DuplicateEmail { .. } => "duplicate_email",
            SessionError::RegistrationFailed { .. } => "registration_failed",
            SessionError::Backend { .. } => "backend_failure",
        };
        HandlerErr::new(code, e.to_string())
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::Remote(RemoteError::NotFound { .. }) => "not_found",
            _ => "backend_failure",
        };
        HandlerErr::new(code, e.to_string())
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_role(params: &serde_json::Value, key: &str) -> Result<Role, HandlerErr> {
    let raw = get_required_str(params, key)?;
    Role::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be teacher or student", key)))
}

/// Dates arrive as RFC 3339 or plain YYYY-MM-DD (midnight UTC).
pub fn parse_date(raw: &str, key: &str) -> Result<DateTime<Utc>, HandlerErr> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN).and_utc());
    }
    Err(HandlerErr::bad_params(format!(
        "{} must be RFC 3339 or YYYY-MM-DD: {}",
        key, raw
    )))
}

// Borrows only the backend slot so callers can keep store and session
// borrows alive alongside it.
pub fn require_backend(backend: &Option<SqliteBackend>) -> Result<&SqliteBackend, HandlerErr> {
    backend.as_ref().ok_or_else(HandlerErr::no_workspace)
}

pub fn require_principal(state: &AppState) -> Result<&Principal, HandlerErr> {
    state
        .session
        .principal()
        .ok_or_else(|| HandlerErr::new("no_session", "not signed in"))
}

/// Entity lifecycle transitions are teacher-initiated; mutations from any
/// other principal are rejected.
pub fn require_teacher(state: &AppState) -> Result<&Principal, HandlerErr> {
    let principal = require_principal(state)?;
    if principal.role != Role::Teacher {
        return Err(HandlerErr::new("role_mismatch", "teacher role required"));
    }
    Ok(principal)
}

/// Fetches the store's collection once per session epoch, lazily; a failed
/// earlier attempt is retried here and the error propagates to the caller.
pub fn ensure_fetched<T: Entity>(
    store: &mut EntityStore<T>,
    backend: Option<&SqliteBackend>,
    session: &SessionManager,
) -> Result<(), HandlerErr> {
    let Some(backend) = backend else {
        return Err(HandlerErr::no_workspace());
    };
    if store.needs_fetch(session.epoch()) {
        store.refresh(backend, session)?;
    }
    Ok(())
}

/// Eager fetch of all stores after a principal transition. Failures are
/// already logged by the stores; the fetch is retried from `ensure_fetched`
/// on the next read.
pub fn refresh_stores(state: &mut AppState) {
    let Some(backend) = state.backend.as_ref() else {
        return;
    };
    let _ = state.students.refresh(backend, &state.session);
    let _ = state.tasks.refresh(backend, &state.session);
    let _ = state.attendance.refresh(backend, &state.session);
    let _ = state.comments.refresh(backend, &state.session);
}

pub fn clear_stores(state: &mut AppState) {
    state.students.clear();
    state.tasks.clear();
    state.attendance.clear();
    state.comments.clear();
}

pub fn to_wire<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value)
        .map_err(|e| HandlerErr::new("backend_failure", format!("encode failed: {e}")))
}
