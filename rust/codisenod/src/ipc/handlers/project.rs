use crate::form::{FormError, ManualKind};
use crate::ipc::error::{err, form_err, ok};
use crate::ipc::helpers::{entry_id, raw_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::project::{self, ProjectPatch};
use chrono::NaiveDate;
use log::info;
use serde_json::{json, Map, Value as JsonValue};

fn project_snapshot(state: &AppState) -> JsonValue {
    let data = state.form.project();
    let mut manual = Map::new();
    for e in &data.disciplines {
        manual.insert(e.id.clone(), json!(state.form.manual_flags(&e.id)));
    }
    json!({
        "project": data,
        "revision": state.form.revision(),
        "title": state.form.title(),
        "manual": manual,
    })
}

fn entry_snapshot(state: &AppState, req: &Request, entry_id: &str) -> JsonValue {
    match state.form.entry_options(&state.catalog, entry_id) {
        Ok(options) => ok(
            &req.id,
            json!({
                "entry": state.form.project().entry(entry_id),
                "options": options,
                "revision": state.form.revision(),
            }),
        ),
        Err(e) => form_err(&req.id, e),
    }
}

fn handle_project_get(state: &mut AppState, req: &Request) -> JsonValue {
    ok(&req.id, project_snapshot(state))
}

fn handle_project_update(state: &mut AppState, req: &Request) -> JsonValue {
    let Some(raw) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch: ProjectPatch = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid patch: {e}"), None),
    };
    match state.form.update_metadata(&state.catalog, patch) {
        Ok(changed) => {
            let mut snapshot = project_snapshot(state);
            snapshot["changed"] = json!(changed);
            ok(&req.id, snapshot)
        }
        Err(e) => form_err(&req.id, e),
    }
}

fn handle_project_reset(state: &mut AppState, req: &Request) -> JsonValue {
    state.form.reset();
    info!("event=project_reset revision={}", state.form.revision());
    ok(&req.id, project_snapshot(state))
}

fn handle_disciplines_add(state: &mut AppState, req: &Request) -> JsonValue {
    let id = state.form.add_discipline();
    let mut snapshot = project_snapshot(state);
    snapshot["entryId"] = json!(id);
    ok(&req.id, snapshot)
}

fn handle_disciplines_remove(state: &mut AppState, req: &Request) -> JsonValue {
    let id = match entry_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.form.remove_discipline(&id) {
        Ok(()) => ok(&req.id, project_snapshot(state)),
        Err(e) => form_err(&req.id, e),
    }
}

/// Entry edits that take one string param.
fn handle_entry_edit(state: &mut AppState, req: &Request, key: &str) -> JsonValue {
    let id = match entry_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let value = match raw_str(req, key) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let catalog = &state.catalog;
    let form = &mut state.form;
    let result: Result<(), FormError> = match req.method.as_str() {
        "entry.setField" => form.set_field(&id, &value),
        "entry.setDiscipline" => form.set_discipline(catalog, &id, &value),
        "entry.selectContent" => form.select_content(catalog, &id, &value),
        "entry.setContentText" => form.set_content_text(&id, &value),
        "entry.togglePda" => form.toggle_pda(catalog, &id, &value),
        "entry.setPdaText" => form.set_pda_text(&id, &value),
        "entry.setTechnique" => form.set_technique(&id, &value),
        "entry.setInstrument" => form.set_instrument(&id, &value),
        "entry.setActivity" => form.set_activity(&id, &value),
        other => Err(FormError::new(
            "not_implemented",
            format!("unknown method: {}", other),
        )),
    };
    match result {
        Ok(()) => entry_snapshot(state, req, &id),
        Err(e) => form_err(&req.id, e),
    }
}

fn parse_manual_kind(req: &Request) -> Result<ManualKind, JsonValue> {
    let kind = required_str(req, "kind")?;
    ManualKind::parse(&kind).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "kind must be one of: content, pda",
            Some(json!({ "kind": kind })),
        )
    })
}

fn handle_entry_set_manual(state: &mut AppState, req: &Request) -> JsonValue {
    let id = match entry_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match parse_manual_kind(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(enabled) = req.params.get("enabled").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "enabled must be boolean", None);
    };
    match state.form.set_manual(&id, kind, enabled) {
        Ok(_) => entry_snapshot(state, req, &id),
        Err(e) => form_err(&req.id, e),
    }
}

fn handle_entry_toggle_manual(state: &mut AppState, req: &Request) -> JsonValue {
    let id = match entry_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match parse_manual_kind(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.form.toggle_manual(&id, kind) {
        Ok(_) => entry_snapshot(state, req, &id),
        Err(e) => form_err(&req.id, e),
    }
}

fn handle_entry_options(state: &mut AppState, req: &Request) -> JsonValue {
    match entry_id(req) {
        Ok(id) => entry_snapshot(state, req, &id),
        Err(e) => e,
    }
}

fn parse_iso_date(req: &Request, key: &str) -> Result<NaiveDate, JsonValue> {
    let raw = required_str(req, key)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be YYYY-MM-DD", key),
            Some(json!({ (key): raw })),
        )
    })
}

fn handle_temporality_from_range(state: &mut AppState, req: &Request) -> JsonValue {
    let start = match parse_iso_date(req, "start") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let end = match parse_iso_date(req, "end") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let temporality = project::temporality_from_range(start, end);
    let patch = ProjectPatch {
        temporality: Some(temporality.clone()),
        ..ProjectPatch::default()
    };
    match state.form.update_metadata(&state.catalog, patch) {
        Ok(_) => ok(
            &req.id,
            json!({ "temporality": temporality, "revision": state.form.revision() }),
        ),
        Err(e) => form_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "project.get" => Some(handle_project_get(state, req)),
        "project.update" => Some(handle_project_update(state, req)),
        "project.reset" => Some(handle_project_reset(state, req)),
        "disciplines.add" => Some(handle_disciplines_add(state, req)),
        "disciplines.remove" => Some(handle_disciplines_remove(state, req)),
        "entry.setField" => Some(handle_entry_edit(state, req, "field")),
        "entry.setDiscipline" => Some(handle_entry_edit(state, req, "discipline")),
        "entry.selectContent" => Some(handle_entry_edit(state, req, "content")),
        "entry.setContentText" => Some(handle_entry_edit(state, req, "text")),
        "entry.togglePda" => Some(handle_entry_edit(state, req, "fragment")),
        "entry.setPdaText" => Some(handle_entry_edit(state, req, "text")),
        "entry.setTechnique" => Some(handle_entry_edit(state, req, "technique")),
        "entry.setInstrument" => Some(handle_entry_edit(state, req, "instrument")),
        "entry.setActivity" => Some(handle_entry_edit(state, req, "text")),
        "entry.setManual" => Some(handle_entry_set_manual(state, req)),
        "entry.toggleManual" => Some(handle_entry_toggle_manual(state, req)),
        "entry.options" => Some(handle_entry_options(state, req)),
        "temporality.fromRange" => Some(handle_temporality_from_range(state, req)),
        _ => None,
    }
}
