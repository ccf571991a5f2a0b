use serde_json::json;

use crate::guard;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    clear_stores, get_required_role, get_required_str, refresh_stores, require_backend, to_wire,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};

fn handle_register(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(&req.params, "email")?;
    let password = get_required_str(&req.params, "password")?;
    let name = get_required_str(&req.params, "name")?;
    let role = get_required_role(&req.params, "role")?;
    let backend = require_backend(&state.backend)?;
    let principal_id = state
        .session
        .register(backend, &email, &password, &name, role)?;
    Ok(ok(&req.id, json!({ "principalId": principal_id })))
}

fn handle_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(&req.params, "email")?;
    let password = get_required_str(&req.params, "password")?;
    let role = get_required_role(&req.params, "role")?;
    let backend = require_backend(&state.backend)?;
    let principal = state.session.login(backend, &email, &password, role)?;
    refresh_stores(state);
    Ok(ok(&req.id, json!({ "principal": to_wire(&principal)? })))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let backend = require_backend(&state.backend)?;
    state.session.logout(backend)?;
    clear_stores(state);
    Ok(ok(&req.id, json!({})))
}

fn handle_session(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let principal = match state.session.principal() {
        Some(p) => to_wire(p)?,
        None => serde_json::Value::Null,
    };
    Ok(ok(
        &req.id,
        json!({
            "principal": principal,
            "loading": state.session.loading(),
        }),
    ))
}

fn handle_route_check(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let required = get_required_role(&req.params, "role")?;
    let decision = guard::decide(
        state.session.principal(),
        required,
        state.session.loading(),
    );
    Ok(ok(&req.id, json!({ "decision": decision.as_str() })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.register" => handle_register(state, req),
        "auth.login" => handle_login(state, req),
        "auth.logout" => handle_logout(state, req),
        "auth.session" => handle_session(state, req),
        "route.check" => handle_route_check(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
