use chrono::Utc;
use log::error;
use serde_json::json;

use crate::models::{Principal, Role};
use crate::remote::{timestamp_to_millis, JsonMap, RemoteDataService, RemoteError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account role is {actual}, expected {expected}")]
    RoleMismatch { expected: Role, actual: Role },

    #[error("email already registered: {email}")]
    DuplicateEmail { email: String },

    #[error("registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("backend failure: {message}")]
    Backend { message: String },
}

fn backend_err(err: RemoteError) -> SessionError {
    SessionError::Backend {
        message: err.to_string(),
    }
}

/// Single authoritative source of "who is logged in and with what role".
///
/// The identity contract knows nothing about roles, so every resolution
/// joins the role from the `users` collection; no other component performs
/// that lookup. Each principal transition bumps the session epoch, which
/// entity stores use to discard stale fetch commits.
pub struct SessionManager {
    principal: Option<Principal>,
    loading: bool,
    epoch: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        SessionManager {
            principal: None,
            loading: true,
            epoch: 0,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn transition(&mut self, principal: Option<Principal>) {
        self.principal = principal;
        self.epoch += 1;
        self.loading = false;
    }

    fn sign_out_quietly(&self, remote: &dyn RemoteDataService) {
        if let Err(err) = remote.sign_out() {
            error!("sign_out during session cleanup failed: {err}");
        }
    }

    fn resolve_principal(
        &self,
        remote: &dyn RemoteDataService,
        id: &str,
    ) -> Result<Principal, SessionError> {
        let doc = remote
            .get("users", id)
            .map_err(backend_err)?
            .ok_or_else(|| SessionError::Backend {
                message: format!("users/{id} missing"),
            })?;
        let email = doc
            .fields
            .get("email")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SessionError::Backend {
                message: format!("users/{id}: missing email"),
            })?;
        let name = doc
            .fields
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let role_raw = doc
            .fields
            .get("role")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SessionError::Backend {
                message: format!("users/{id}: missing role"),
            })?;
        let role = Role::parse(role_raw).ok_or_else(|| SessionError::Backend {
            message: format!("users/{id}: unknown role {role_raw}"),
        })?;
        Ok(Principal {
            id: id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role,
        })
    }

    /// Resolves the persisted identity session (the startup equivalent of a
    /// session-change notification). Always ends with `loading = false`.
    /// An identity whose `users` document is missing or malformed is signed
    /// out rather than left half-authenticated.
    pub fn initialize(&mut self, remote: &dyn RemoteDataService) -> Result<(), SessionError> {
        let session = match remote.current_session() {
            Ok(s) => s,
            Err(err) => {
                self.transition(None);
                return Err(backend_err(err));
            }
        };
        let Some(id) = session else {
            self.transition(None);
            return Ok(());
        };
        match self.resolve_principal(remote, &id) {
            Ok(principal) => {
                self.transition(Some(principal));
                Ok(())
            }
            Err(err) => {
                error!("session restore for {id} failed: {err}");
                self.sign_out_quietly(remote);
                self.transition(None);
                Err(err)
            }
        }
    }

    /// Credential sign-in followed by the role join. A stored role that
    /// differs from `expected_role` fails the whole attempt: the identity is
    /// signed out again so no role-gated route sees it as authenticated.
    pub fn login(
        &mut self,
        remote: &dyn RemoteDataService,
        email: &str,
        password: &str,
        expected_role: Role,
    ) -> Result<Principal, SessionError> {
        let id = remote.sign_in(email, password).map_err(|err| match err {
            RemoteError::InvalidCredentials => SessionError::InvalidCredentials,
            other => backend_err(other),
        })?;
        let principal = match self.resolve_principal(remote, &id) {
            Ok(p) => p,
            Err(err) => {
                self.sign_out_quietly(remote);
                self.transition(None);
                return Err(err);
            }
        };
        if principal.role != expected_role {
            self.sign_out_quietly(remote);
            self.transition(None);
            return Err(SessionError::RoleMismatch {
                expected: expected_role,
                actual: principal.role,
            });
        }
        self.transition(Some(principal.clone()));
        Ok(principal)
    }

    /// Identity registration plus creation of the `users` document carrying
    /// the chosen role. Does not sign the new account in.
    pub fn register(
        &mut self,
        remote: &dyn RemoteDataService,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<String, SessionError> {
        let id = remote.register(email, password).map_err(|err| match err {
            RemoteError::DuplicateEmail { email } => SessionError::DuplicateEmail { email },
            other => SessionError::RegistrationFailed {
                message: other.to_string(),
            },
        })?;
        let now = timestamp_to_millis(Utc::now());
        let mut fields = JsonMap::new();
        fields.insert("email".to_string(), json!(email));
        fields.insert("name".to_string(), json!(name));
        fields.insert("role".to_string(), json!(role.as_str()));
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        remote.put("users", &id, fields).map_err(|err| {
            error!("creating users/{id} failed: {err}");
            SessionError::RegistrationFailed {
                message: err.to_string(),
            }
        })?;
        Ok(id)
    }

    pub fn logout(&mut self, remote: &dyn RemoteDataService) -> Result<(), SessionError> {
        remote.sign_out().map_err(backend_err)?;
        self.transition(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockRemote;

    #[test]
    fn initialize_without_session_clears_loading() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        assert!(session.loading());
        session.initialize(&remote).expect("initialize");
        assert!(!session.loading());
        assert!(session.principal().is_none());
    }

    #[test]
    fn register_then_login_yields_principal_with_role() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        session
            .register(&remote, "t1@x.com", "pw", "Teacher One", Role::Teacher)
            .expect("register");
        // Registration must not sign the account in.
        assert!(remote.current_session().expect("session").is_none());

        let principal = session
            .login(&remote, "t1@x.com", "pw", Role::Teacher)
            .expect("login");
        assert_eq!(principal.role, Role::Teacher);
        assert_eq!(principal.email, "t1@x.com");
        assert_eq!(session.principal(), Some(&principal));
    }

    #[test]
    fn login_with_wrong_role_fails_and_signs_out() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        session
            .register(&remote, "t1@x.com", "pw", "Teacher One", Role::Teacher)
            .expect("register");

        let err = session
            .login(&remote, "t1@x.com", "pw", Role::Student)
            .expect_err("role mismatch must fail");
        assert_eq!(
            err,
            SessionError::RoleMismatch {
                expected: Role::Student,
                actual: Role::Teacher,
            }
        );
        assert!(session.principal().is_none());
        // The identity session must not linger after the rejected attempt.
        assert!(remote.current_session().expect("session").is_none());
    }

    #[test]
    fn login_with_bad_password_is_invalid_credentials() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        session
            .register(&remote, "t1@x.com", "pw", "Teacher One", Role::Teacher)
            .expect("register");
        let err = session
            .login(&remote, "t1@x.com", "nope", Role::Teacher)
            .expect_err("bad password");
        assert_eq!(err, SessionError::InvalidCredentials);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        session
            .register(&remote, "t1@x.com", "pw", "Teacher One", Role::Teacher)
            .expect("register");
        let err = session
            .register(&remote, "t1@x.com", "pw2", "Other", Role::Student)
            .expect_err("duplicate email");
        assert_eq!(
            err,
            SessionError::DuplicateEmail {
                email: "t1@x.com".to_string(),
            }
        );
    }

    #[test]
    fn initialize_restores_persisted_session() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        session
            .register(&remote, "t1@x.com", "pw", "Teacher One", Role::Teacher)
            .expect("register");
        session
            .login(&remote, "t1@x.com", "pw", Role::Teacher)
            .expect("login");

        // A fresh manager over the same remote picks the session back up.
        let mut restored = SessionManager::new();
        restored.initialize(&remote).expect("initialize");
        let principal = restored.principal().expect("restored principal");
        assert_eq!(principal.email, "t1@x.com");
        assert_eq!(principal.role, Role::Teacher);
    }

    #[test]
    fn initialize_with_missing_users_doc_signs_out() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        // Account exists in the identity half only; no users document.
        remote.register("ghost@x.com", "pw").expect("register");
        remote.sign_in("ghost@x.com", "pw").expect("sign in");

        let err = session.initialize(&remote).expect_err("missing role doc");
        assert!(matches!(err, SessionError::Backend { .. }));
        assert!(session.principal().is_none());
        assert!(!session.loading());
        assert!(remote.current_session().expect("session").is_none());
    }

    #[test]
    fn every_transition_bumps_the_epoch() {
        let remote = MockRemote::new();
        let mut session = SessionManager::new();
        let e0 = session.epoch();
        session.initialize(&remote).expect("initialize");
        let e1 = session.epoch();
        assert!(e1 > e0);

        session
            .register(&remote, "t1@x.com", "pw", "Teacher One", Role::Teacher)
            .expect("register");
        assert_eq!(session.epoch(), e1);

        session
            .login(&remote, "t1@x.com", "pw", Role::Teacher)
            .expect("login");
        let e2 = session.epoch();
        assert!(e2 > e1);

        session.logout(&remote).expect("logout");
        assert!(session.epoch() > e2);
        assert!(session.principal().is_none());
    }
}
