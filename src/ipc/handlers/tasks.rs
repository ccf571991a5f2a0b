use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    ensure_fetched, get_optional_str, get_required_str, parse_date, require_backend,
    require_principal, require_teacher, to_wire, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::TaskStatus;
use crate::remote::{timestamp_to_millis, JsonMap};

fn parse_status(raw: &str) -> Result<TaskStatus, HandlerErr> {
    TaskStatus::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("status must be pending or completed: {raw}")))
}

fn patch_from(raw: &JsonMap) -> Result<JsonMap, HandlerErr> {
    let mut patch = JsonMap::new();
    for (key, value) in raw {
        match key.as_str() {
            "title" | "description" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params(format!("{key} must be a string")));
                };
                patch.insert(key.clone(), json!(s));
            }
            "dueDate" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params("dueDate must be a date string"));
                };
                let at = parse_date(s, "dueDate")?;
                patch.insert(key.clone(), json!(timestamp_to_millis(at)));
            }
            "status" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params("status must be a string"));
                };
                let status = parse_status(s)?;
                patch.insert(key.clone(), json!(status.as_str()));
            }
            other => {
                return Err(HandlerErr::bad_params(format!("unknown field: {other}")));
            }
        }
    }
    if patch.is_empty() {
        return Err(HandlerErr::bad_params("empty patch"));
    }
    Ok(patch)
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_principal(state)?;
    ensure_fetched(&mut state.tasks, state.backend.as_ref(), &state.session)?;
    Ok(ok(&req.id, json!({ "tasks": to_wire(&state.tasks.items())? })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let title = get_required_str(&req.params, "title")?;
    let description = get_required_str(&req.params, "description")?;
    let due_date = parse_date(&get_required_str(&req.params, "dueDate")?, "dueDate")?;
    let status = match get_optional_str(&req.params, "status")? {
        Some(raw) => parse_status(&raw)?,
        None => TaskStatus::Pending,
    };
    ensure_fetched(&mut state.tasks, state.backend.as_ref(), &state.session)?;

    let mut fields = JsonMap::new();
    fields.insert("title".to_string(), json!(title));
    fields.insert("description".to_string(), json!(description));
    fields.insert("dueDate".to_string(), json!(timestamp_to_millis(due_date)));
    fields.insert("status".to_string(), json!(status.as_str()));
    let backend = require_backend(&state.backend)?;
    let task = state.tasks.add(backend, fields)?;
    Ok(ok(&req.id, json!({ "task": to_wire(&task)? })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let id = get_required_str(&req.params, "id")?;
    let raw = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch object"))?;
    let patch = patch_from(raw)?;
    ensure_fetched(&mut state.tasks, state.backend.as_ref(), &state.session)?;

    let backend = require_backend(&state.backend)?;
    let merged = state.tasks.update(backend, &id, patch)?;
    let task = match merged {
        Some(t) => to_wire(&t)?,
        None => serde_json::Value::Null,
    };
    Ok(ok(&req.id, json!({ "task": task })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let id = get_required_str(&req.params, "id")?;
    let backend = require_backend(&state.backend)?;
    state.tasks.delete(backend, &id)?;
    Ok(ok(&req.id, json!({})))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "tasks.list" => handle_list(state, req),
        "tasks.create" => handle_create(state, req),
        "tasks.update" => handle_update(state, req),
        "tasks.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
