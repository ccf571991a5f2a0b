use chrono::Utc;
use serde_json::json;

use crate::dashboard;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    ensure_fetched, get_optional_str, parse_date, require_principal, to_wire, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

fn handle_summary(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_principal(state)?;
    let today = match get_optional_str(&req.params, "date")? {
        Some(raw) => parse_date(&raw, "date")?.date_naive(),
        None => Utc::now().date_naive(),
    };
    ensure_fetched(&mut state.students, state.backend.as_ref(), &state.session)?;
    ensure_fetched(&mut state.tasks, state.backend.as_ref(), &state.session)?;
    ensure_fetched(
        &mut state.attendance,
        state.backend.as_ref(),
        &state.session,
    )?;

    let summary = dashboard::summarize(
        state.students.items(),
        state.tasks.items(),
        state.attendance.items(),
        today,
    );
    Ok(ok(&req.id, json!({ "summary": to_wire(&summary)? })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => {
            Some(handle_summary(state, req).unwrap_or_else(|e| e.response(&req.id)))
        }
        _ => None,
    }
}
