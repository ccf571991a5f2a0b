use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    ensure_fetched, get_optional_str, get_required_str, parse_date, require_backend,
    require_principal, require_teacher, to_wire, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::AttendanceStatus;
use crate::remote::{timestamp_to_millis, JsonMap};

fn parse_status(raw: &str) -> Result<AttendanceStatus, HandlerErr> {
    AttendanceStatus::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params(format!("status must be present, absent or late: {raw}"))
    })
}

fn patch_from(raw: &JsonMap) -> Result<JsonMap, HandlerErr> {
    let mut patch = JsonMap::new();
    for (key, value) in raw {
        match key.as_str() {
            "studentId" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params("studentId must be a string"));
                };
                patch.insert(key.clone(), json!(s));
            }
            "date" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params("date must be a date string"));
                };
                let at = parse_date(s, "date")?;
                patch.insert(key.clone(), json!(timestamp_to_millis(at)));
            }
            "status" => {
                let Some(s) = value.as_str() else {
                    return Err(HandlerErr::bad_params("status must be a string"));
                };
                let status = parse_status(s)?;
                patch.insert(key.clone(), json!(status.as_str()));
            }
            // notes: null clears the field.
            "notes" => match value.as_str() {
                Some(s) => {
                    patch.insert(key.clone(), json!(s));
                }
                None if value.is_null() => {
                    patch.insert(key.clone(), serde_json::Value::Null);
                }
                None => {
                    return Err(HandlerErr::bad_params("notes must be a string or null"));
                }
            },
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
    ensure_fetched(
        &mut state.attendance,
        state.backend.as_ref(),
        &state.session,
    )?;
    Ok(ok(
        &req.id,
        json!({ "records": to_wire(&state.attendance.items())? }),
    ))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    // A weak reference: the student is not required to exist, and deleting
    // it later does not cascade here.
    let student_id = get_required_str(&req.params, "studentId")?;
    let date = parse_date(&get_required_str(&req.params, "date")?, "date")?;
    let status = parse_status(&get_required_str(&req.params, "status")?)?;
    let notes = get_optional_str(&req.params, "notes")?;
    ensure_fetched(
        &mut state.attendance,
        state.backend.as_ref(),
        &state.session,
    )?;

    let mut fields = JsonMap::new();
    fields.insert("studentId".to_string(), json!(student_id));
    fields.insert("date".to_string(), json!(timestamp_to_millis(date)));
    fields.insert("status".to_string(), json!(status.as_str()));
    if let Some(notes) = notes {
        fields.insert("notes".to_string(), json!(notes));
    }
    let backend = require_backend(&state.backend)?;
    let record = state.attendance.add(backend, fields)?;
    Ok(ok(&req.id, json!({ "record": to_wire(&record)? })))
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
    ensure_fetched(
        &mut state.attendance,
        state.backend.as_ref(),
        &state.session,
    )?;

    let backend = require_backend(&state.backend)?;
    let merged = state.attendance.update(backend, &id, patch)?;
    let record = match merged {
        Some(r) => to_wire(&r)?,
        None => serde_json::Value::Null,
    };
    Ok(ok(&req.id, json!({ "record": record })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let id = get_required_str(&req.params, "id")?;
    let backend = require_backend(&state.backend)?;
    state.attendance.delete(backend, &id)?;
    Ok(ok(&req.id, json!({})))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.list" => handle_list(state, req),
        "attendance.create" => handle_create(state, req),
        "attendance.update" => handle_update(state, req),
        "attendance.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
