use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "catalogSource": state.catalog.source(),
            "catalog": state.catalog.summary(),
            "revision": state.form.revision(),
            "title": state.form.title(),
        }),
    )
}

fn handle_session_title(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "title": state.form.title() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.title" => Some(handle_session_title(state, req)),
        _ => None,
    }
}
