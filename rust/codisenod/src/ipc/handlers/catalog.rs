use crate::catalog::Catalog;
use crate::evaluation;
use crate::form::ContentOption;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{raw_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::project::{self, FORMATIVE_FIELDS, GRADES, TRIMESTERS};
use log::error;
use serde_json::json;
use std::path::PathBuf;

fn handle_catalog_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    match Catalog::open(&path) {
        Ok(catalog) => {
            state.catalog = catalog;
            ok(
                &req.id,
                json!({
                    "catalogSource": state.catalog.source(),
                    "catalog": state.catalog.summary(),
                }),
            )
        }
        Err(e) => {
            error!("event=catalog_load_failed path={} error={:#}", path.display(), e);
            err(
                &req.id,
                "catalog_load_failed",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    }
}

fn handle_catalog_fields(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let fields: Vec<_> = FORMATIVE_FIELDS
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();
    ok(&req.id, json!({ "fields": fields }))
}

fn handle_catalog_disciplines(state: &mut AppState, req: &Request) -> serde_json::Value {
    let field = match raw_str(req, "field") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "disciplines": state.catalog.list_disciplines(&field) }),
    )
}

fn handle_catalog_contents(state: &mut AppState, req: &Request) -> serde_json::Value {
    let field = match raw_str(req, "field") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let discipline = match raw_str(req, "discipline") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let contents = state.catalog.list_contents(&field, &discipline);
    let options: Vec<ContentOption> = contents.iter().cloned().map(ContentOption::from).collect();
    ok(
        &req.id,
        json!({ "contents": contents, "options": options }),
    )
}

fn handle_catalog_pda(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut keys = Vec::with_capacity(4);
    for key in ["field", "discipline", "content", "grade"] {
        match raw_str(req, key) {
            Ok(v) => keys.push(v),
            Err(e) => return e,
        }
    }
    let fragments = match project::grade_digit(&keys[3]) {
        Some(digit) => state
            .catalog
            .lookup_pda_fragments(&keys[0], &keys[1], &keys[2], digit),
        None => Vec::new(),
    };
    ok(&req.id, json!({ "fragments": fragments }))
}

fn handle_options_grades(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "grades": GRADES }))
}

fn handle_options_trimesters(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "trimesters": TRIMESTERS }))
}

fn handle_options_evaluation(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let techniques: Vec<_> = evaluation::TECHNIQUES
        .iter()
        .map(|(t, instruments)| json!({ "technique": t, "instruments": instruments }))
        .collect();
    ok(&req.id, json!({ "techniques": techniques }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.load" => Some(handle_catalog_load(state, req)),
        "catalog.fields" => Some(handle_catalog_fields(state, req)),
        "catalog.disciplines" => Some(handle_catalog_disciplines(state, req)),
        "catalog.contents" => Some(handle_catalog_contents(state, req)),
        "catalog.pda" => Some(handle_catalog_pda(state, req)),
        "options.grades" => Some(handle_options_grades(state, req)),
        "options.trimesters" => Some(handle_options_trimesters(state, req)),
        "options.evaluation" => Some(handle_options_evaluation(state, req)),
        _ => None,
    }
}
