use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    ensure_fetched, get_required_str, require_backend, require_principal, require_teacher, to_wire,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::remote::JsonMap;

fn patch_from(raw: &JsonMap) -> Result<JsonMap, HandlerErr> {
    let mut patch = JsonMap::new();
    for (key, value) in raw {
        match key.as_str() {
            "taskId" | "studentName" | "content" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params(format!("{key} must be a string")));
                };
                patch.insert(key.clone(), json!(s));
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
    ensure_fetched(&mut state.comments, state.backend.as_ref(), &state.session)?;
    Ok(ok(
        &req.id,
        json!({ "comments": to_wire(&state.comments.items())? }),
    ))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let task_id = get_required_str(&req.params, "taskId")?;
    let student_name = get_required_str(&req.params, "studentName")?;
    let content = get_required_str(&req.params, "content")?;
    ensure_fetched(&mut state.comments, state.backend.as_ref(), &state.session)?;

    let mut fields = JsonMap::new();
    fields.insert("taskId".to_string(), json!(task_id));
    fields.insert("studentName".to_string(), json!(student_name));
    fields.insert("content".to_string(), json!(content));
    let backend = require_backend(&state.backend)?;
    let comment = state.comments.add(backend, fields)?;
    Ok(ok(&req.id, json!({ "comment": to_wire(&comment)? })))
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
    ensure_fetched(&mut state.comments, state.backend.as_ref(), &state.session)?;

    let backend = require_backend(&state.backend)?;
    let merged = state.comments.update(backend, &id, patch)?;
    let comment = match merged {
        Some(c) => to_wire(&c)?,
        None => serde_json::Value::Null,
    };
    Ok(ok(&req.id, json!({ "comment": comment })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let id = get_required_str(&req.params, "id")?;
    let backend = require_backend(&state.backend)?;
    state.comments.delete(backend, &id)?;
    Ok(ok(&req.id, json!({})))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "comments.list" => handle_list(state, req),
        "comments.create" => handle_create(state, req),
        "comments.update" => handle_update(state, req),
        "comments.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
