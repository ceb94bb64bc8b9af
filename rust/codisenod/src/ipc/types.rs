use serde::Deserialize;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::document::DocumentView;
use crate::export::ExportAdapter;
use crate::form::FormController;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub catalog: Catalog,
    pub form: FormController,
    pub view: DocumentView,
    pub exporter: ExportAdapter,
}

impl AppState {
    pub fn new(config: Config, catalog: Catalog) -> Self {
        let view = DocumentView::new(config.export.margin_mm);
        Self {
            config,
            catalog,
            form: FormController::default(),
            view,
            exporter: ExportAdapter::new(),
        }
    }
}
