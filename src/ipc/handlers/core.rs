use std::path::PathBuf;

use log::error;
use serde_json::json;

use crate::backend;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{refresh_stores, to_wire};
use crate::ipc::types::{AppState, Request};
use crate::logging;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let backend = match backend::open_backend(&path) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    logging::init(&path);
    state.workspace = Some(path.clone());
    state.backend = Some(backend);

    // Session restore: resolve the persisted identity, if any. A stale
    // identity without a users document is signed out; that must not
    // prevent the workspace from opening.
    if let Some(backend) = state.backend.as_ref() {
        if let Err(e) = state.session.initialize(backend) {
            error!("session restore failed: {e}");
        }
    }
    refresh_stores(state);

    let principal = match state.session.principal() {
        Some(p) => match to_wire(p) {
            Ok(v) => v,
            Err(e) => return e.response(&req.id),
        },
        None => serde_json::Value::Null,
    };
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "principal": principal,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
