use crate::document::{self, Tab};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value as JsonValue};

fn view_state(state: &AppState) -> JsonValue {
    let revision = state.form.revision();
    json!({
        "tab": state.view.tab(),
        "revision": revision,
        "ready": state.view.printable_area(revision).is_some(),
        "finalized": state.view.is_finalized(revision),
    })
}

fn handle_view_get(state: &mut AppState, req: &Request) -> JsonValue {
    ok(&req.id, view_state(state))
}

fn handle_view_set(state: &mut AppState, req: &Request) -> JsonValue {
    let raw = match required_str(req, "tab") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(tab) = Tab::parse(&raw) else {
        return err(
            &req.id,
            "bad_params",
            "tab must be one of: edit, preview",
            Some(json!({ "tab": raw })),
        );
    };
    match tab {
        Tab::Preview => {
            let AppState { form, view, .. } = state;
            view.show_preview(form.project(), form.revision(), form.title());
        }
        Tab::Edit => state.view.set_tab(Tab::Edit),
    }
    ok(&req.id, view_state(state))
}

/// Pure projection; does not touch the view.
fn handle_document_model(state: &mut AppState, req: &Request) -> JsonValue {
    let model = document::project_document(state.form.project(), state.config.export.margin_mm);
    ok(
        &req.id,
        json!({ "model": model, "revision": state.form.revision() }),
    )
}

/// Renders the current revision without switching tabs.
fn handle_document_html(state: &mut AppState, req: &Request) -> JsonValue {
    let model = document::project_document(state.form.project(), state.config.export.margin_mm);
    let html = document::render_html(&model, state.form.title());
    ok(
        &req.id,
        json!({
            "html": html,
            "pages": model.pages.len(),
            "revision": state.form.revision(),
            "printableAreaId": document::PRINTABLE_AREA_ID,
        }),
    )
}

fn handle_document_finalize(state: &mut AppState, req: &Request) -> JsonValue {
    let revision = state.form.revision();
    if state.view.printable_area(revision).is_none() {
        return err(
            &req.id,
            "bad_state",
            "preview is not rendered for the current revision",
            Some(json!({ "revision": revision })),
        );
    }
    state.view.finalize(revision);
    ok(&req.id, view_state(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "view.get" => Some(handle_view_get(state, req)),
        "view.set" => Some(handle_view_set(state, req)),
        "document.model" => Some(handle_document_model(state, req)),
        "document.html" => Some(handle_document_html(state, req)),
        "document.finalize" => Some(handle_document_finalize(state, req)),
        _ => None,
    }
}
