//! Host window title derived from the project name.

use log::debug;

pub const TITLE_PREFIX: &str = "Planeacion_NEM_";
pub const DEFAULT_TITLE: &str = "DIGITAL_ENS_Planificación";

/// Collapses each whitespace run to a single underscore.
pub fn underscore_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                out.push('_');
            }
            in_ws = true;
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

pub fn title_for(project_name: &str) -> String {
    if project_name.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        format!("{}{}", TITLE_PREFIX, underscore_whitespace(project_name))
    }
}

/// Where the derived title ends up.
pub trait TitleSink {
    fn set_title(&mut self, title: &str);
    fn title(&self) -> &str;
}

/// Title reported back to the UI shell.
#[derive(Debug, Clone)]
pub struct HostTitle {
    current: String,
}

impl Default for HostTitle {
    fn default() -> Self {
        Self {
            current: DEFAULT_TITLE.to_string(),
        }
    }
}

impl TitleSink for HostTitle {
    fn set_title(&mut self, title: &str) {
        debug!("event=title_changed title={:?}", title);
        self.current = title.to_string();
    }

    fn title(&self) -> &str {
        &self.current
    }
}

/// Subscribes a sink to project-name changes.
pub struct TitleObserver {
    sink: Box<dyn TitleSink>,
}

impl TitleObserver {
    pub fn new(sink: Box<dyn TitleSink>) -> Self {
        Self { sink }
    }

    pub fn project_name_changed(&mut self, project_name: &str) {
        let next = title_for(project_name);
        if next != self.sink.title() {
            self.sink.set_title(&next);
        }
    }

    pub fn title(&self) -> &str {
        self.sink.title()
    }
}

impl Default for TitleObserver {
    fn default() -> Self {
        Self::new(Box::<HostTitle>::default())
    }
}
