//! Daemon configuration.
//!
//! Load order: `codiseno.toml` in the working directory, then the file passed
//! with `--config`, then `CODISENO__*` environment variables (double
//! underscore nests, e.g. `CODISENO__EXPORT__RENDER_COMMAND=wkhtmltopdf`).

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogSection,
    pub log: LogSection,
    pub export: ExportSection,
}

/// [catalog]: curriculum catalog file; the bundled one when unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// [export]: external PDF renderer and print fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub out_dir: Option<PathBuf>,
    pub render_command: String,
    pub print_command: String,
    pub margin_mm: f64,
    pub image_quality: f64,
    pub scale: f64,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            out_dir: None,
            render_command: "wkhtmltopdf".to_string(),
            print_command: "lp".to_string(),
            margin_mm: 10.0,
            image_quality: 0.98,
            scale: 2.0,
        }
    }
}

impl ExportSection {
    pub fn resolved_out_dir(&self) -> PathBuf {
        self.out_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

pub fn load_config(config_path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("codiseno").required(false));

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
    }

    builder = builder.add_source(config::Environment::with_prefix("CODISENO").separator("__"));

    builder.build()?.try_deserialize()
}
