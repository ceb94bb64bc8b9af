mod catalog;
mod config;
mod document;
mod evaluation;
mod export;
mod form;
mod ipc;
mod logging;
mod project;
mod title;

use log::{error, info, warn};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn config_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

fn load_catalog(cfg: &config::Config) -> Option<catalog::Catalog> {
    if let Some(path) = cfg.catalog.path.as_deref() {
        match catalog::Catalog::open(path) {
            Ok(c) => return Some(c),
            Err(e) => error!(
                "event=catalog_load_failed path={} error={:#}",
                path.display(),
                e
            ),
        }
    }
    match catalog::Catalog::bundled() {
        Ok(c) => Some(c),
        Err(e) => {
            error!("event=catalog_load_failed source=bundled error={:#}", e);
            None
        }
    }
}

fn main() {
    let (cfg, config_error) = match config::load_config(config_arg().as_deref()) {
        Ok(c) => (c, None),
        Err(e) => (config::Config::default(), Some(e)),
    };

    let _logger = match logging::init_logging(&cfg.log.level, cfg.log.dir.as_deref()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("codisenod: {e}");
            None
        }
    };
    if let Some(e) = config_error {
        warn!("event=config_invalid error={} fallback=defaults", e);
    }

    let Some(catalog) = load_catalog(&cfg) else {
        std::process::exit(1);
    };
    info!(
        "event=catalog_ready source={} disciplines={}",
        catalog.source(),
        catalog.summary().disciplines
    );

    let mut state = ipc::AppState::new(cfg, catalog);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                warn!("event=bad_json error={}", e);
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("event=app_stop");
}
