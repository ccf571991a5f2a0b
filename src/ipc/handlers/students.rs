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
            "name" | "email" | "grade" => {
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
    ensure_fetched(&mut state.students, state.backend.as_ref(), &state.session)?;
    Ok(ok(
        &req.id,
        json!({ "students": to_wire(&state.students.items())? }),
    ))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let name = get_required_str(&req.params, "name")?;
    let email = get_required_str(&req.params, "email")?;
    let grade = get_required_str(&req.params, "grade")?;
    ensure_fetched(&mut state.students, state.backend.as_ref(), &state.session)?;

    let mut fields = JsonMap::new();
    fields.insert("name".to_string(), json!(name));
    fields.insert("email".to_string(), json!(email));
    fields.insert("grade".to_string(), json!(grade));
    let backend = require_backend(&state.backend)?;
    let student = state.students.add(backend, fields)?;
    Ok(ok(&req.id, json!({ "student": to_wire(&student)? })))
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
    ensure_fetched(&mut state.students, state.backend.as_ref(), &state.session)?;

    let backend = require_backend(&state.backend)?;
    let merged = state.students.update(backend, &id, patch)?;
    let student = match merged {
        Some(s) => to_wire(&s)?,
        None => serde_json::Value::Null,
    };
    Ok(ok(&req.id, json!({ "student": student })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let id = get_required_str(&req.params, "id")?;
    let backend = require_backend(&state.backend)?;
    state.students.delete(backend, &id)?;
    Ok(ok(&req.id, json!({})))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
