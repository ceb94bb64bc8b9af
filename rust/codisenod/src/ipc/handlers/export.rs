use crate::export::{CommandPrinter, CommandRenderer, ExportOptions, PreviewSurface};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;

fn handle_export_pdf(state: &mut AppState, req: &Request) -> JsonValue {
    let out_dir = match req.params.get("outDir") {
        None | Some(JsonValue::Null) => state.config.export.resolved_out_dir(),
        Some(v) => match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => PathBuf::from(s),
            None => return err(&req.id, "bad_params", "outDir must be a non-empty string", None),
        },
    };

    let AppState {
        config,
        form,
        view,
        exporter,
        ..
    } = state;
    let options = ExportOptions::for_project(&form.project().project_name, &config.export);
    let renderer = CommandRenderer {
        program: config.export.render_command.clone(),
    };
    let printer = CommandPrinter {
        program: config.export.print_command.clone(),
        staging_dir: out_dir.clone(),
    };
    let mut surface = PreviewSurface {
        view: &mut *view,
        data: form.project(),
        revision: form.revision(),
        title: form.title(),
    };

    match exporter.export(&mut surface, &options, &renderer, &printer, &out_dir) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "outcome": outcome,
                "filename": options.filename,
                "options": options,
                "tab": view.tab(),
                "busy": exporter.is_busy(),
                "fallbackCount": exporter.fallback_count(),
            }),
        ),
        Err(_) => err(
            &req.id,
            "export_busy",
            "an export is already in progress",
            None,
        ),
    }
}

fn handle_export_status(state: &mut AppState, req: &Request) -> JsonValue {
    ok(
        &req.id,
        json!({
            "busy": state.exporter.is_busy(),
            "fallbackCount": state.exporter.fallback_count(),
            "last": state.exporter.last_outcome(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "export.pdf" => Some(handle_export_pdf(state, req)),
        "export.status" => Some(handle_export_status(state, req)),
        _ => None,
    }
}
