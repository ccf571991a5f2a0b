use std::path::PathBuf;

use serde::Deserialize;

use crate::backend::SqliteBackend;
use crate::models::{AttendanceRecord, Comment, Student, Task};
use crate::session::SessionManager;
use crate::store::EntityStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One session manager and one store per entity type per process; the
/// backend is injected once a workspace is selected.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub backend: Option<SqliteBackend>,
    pub session: SessionManager,
    pub students: EntityStore<Student>,
    pub tasks: EntityStore<Task>,
    pub attendance: EntityStore<AttendanceRecord>,
    pub comments: EntityStore<Comment>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            backend: None,
            session: SessionManager::new(),
            students: EntityStore::new(),
            tasks: EntityStore::new(),
            attendance: EntityStore::new(),
            comments: EntityStore::new(),
        }
    }
}
