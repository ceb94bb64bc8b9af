//! PDF export: switch to the preview, wait for it to render, hand the
//! printable area to an external renderer, and fall back to native print
//! when the renderer fails.

use anyhow::{anyhow, Context};
use log::{error, info, warn};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::ExportSection;
use crate::document::{DocumentView, RenderedDocument};
use crate::project::ProjectData;
use crate::title::{underscore_whitespace, TITLE_PREFIX};

pub const DEFAULT_FILE_STEM: &str = "Proyecto";

/// "Planeacion_NEM_<name>.pdf" with whitespace runs turned into underscores.
/// The result is a single path component: separators and control characters
/// become underscores, so `..` can never appear as a component of its own.
pub fn export_file_name(project_name: &str) -> String {
    let name = if project_name.is_empty() {
        DEFAULT_FILE_STEM
    } else {
        project_name
    };
    let stem: String = underscore_whitespace(name)
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}{}.pdf", TITLE_PREFIX, stem)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    pub scale: f64,
    pub use_cors: bool,
    pub letter_rendering: bool,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    pub unit: String,
    pub format: String,
    pub orientation: String,
}

/// Fixed renderer configuration; only the file name depends on the project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// top, right, bottom, left in millimetres.
    pub margin: [f64; 4],
    pub filename: String,
    pub image: ImageOptions,
    pub capture: CaptureOptions,
    pub pdf: PdfOptions,
}

impl ExportOptions {
    pub fn for_project(project_name: &str, settings: &ExportSection) -> Self {
        let m = settings.margin_mm;
        Self {
            margin: [m, m, m, m],
            filename: export_file_name(project_name),
            image: ImageOptions {
                kind: "jpeg".to_string(),
                quality: settings.image_quality,
            },
            capture: CaptureOptions {
                scale: settings.scale,
                use_cors: true,
                letter_rendering: true,
                background_color: "#ffffff".to_string(),
            },
            pdf: PdfOptions {
                unit: "mm".to_string(),
                format: "letter".to_string(),
                orientation: "portrait".to_string(),
            },
        }
    }
}

/// The rendered element handed to the renderer or the printer.
#[derive(Debug, Clone, Copy)]
pub struct PrintableArea<'a> {
    pub id: &'a str,
    pub html: &'a str,
}

/// Something that can show the document and expose its printable area.
pub trait DocumentSurface {
    fn is_preview_active(&self) -> bool;
    /// Switches to the preview and returns once layout has finished.
    fn show_preview(&mut self);
    fn printable_area(&self) -> Option<PrintableArea<'_>>;
}

/// External rasterizer that turns the printable area into a PDF file.
pub trait PdfRenderer {
    fn render(
        &self,
        area: PrintableArea<'_>,
        options: &ExportOptions,
        out_dir: &Path,
    ) -> anyhow::Result<PathBuf>;
}

/// Host print pipeline used when rendering fails.
pub trait NativePrint {
    fn print(&self, area: PrintableArea<'_>) -> anyhow::Result<()>;
}

/// Preview surface backed by the session's document view.
pub struct PreviewSurface<'a> {
    pub view: &'a mut DocumentView,
    pub data: &'a ProjectData,
    pub revision: u64,
    pub title: &'a str,
}

impl DocumentSurface for PreviewSurface<'_> {
    fn is_preview_active(&self) -> bool {
        self.view.printable_area(self.revision).is_some()
    }

    fn show_preview(&mut self) {
        let rendered: &RenderedDocument = self.view.show_preview(self.data, self.revision, self.title);
        info!(
            "event=preview_rendered revision={} pages={}",
            rendered.revision,
            rendered.model.pages.len()
        );
    }

    fn printable_area(&self) -> Option<PrintableArea<'_>> {
        self.view
            .printable_area(self.revision)
            .map(|r| PrintableArea {
                id: r.model.printable_area_id,
                html: &r.html,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExportOutcome {
    Saved {
        path: String,
        filename: String,
    },
    #[serde(rename_all = "camelCase")]
    PrintFallback {
        filename: String,
        reason: String,
        printed: bool,
    },
    /// No printable area was found; nothing happened.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportBusy;

/// Clears the busy flag on every exit path.
struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Runs one export at a time. The daemon's request loop is sequential, so
/// over the wire the busy flag is only ever observed as clear; it guards
/// callers that drive the adapter re-entrantly, such as a renderer that
/// calls back into it.
#[derive(Debug, Default)]
pub struct ExportAdapter {
    busy: Cell<bool>,
    fallback_count: Cell<u64>,
    last: RefCell<Option<ExportOutcome>>,
}

impl ExportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.get()
    }

    pub fn last_outcome(&self) -> Option<ExportOutcome> {
        self.last.borrow().clone()
    }

    pub fn export(
        &self,
        surface: &mut dyn DocumentSurface,
        options: &ExportOptions,
        renderer: &dyn PdfRenderer,
        printer: &dyn NativePrint,
        out_dir: &Path,
    ) -> Result<ExportOutcome, ExportBusy> {
        let outcome = {
            let Some(_guard) = BusyGuard::acquire(&self.busy) else {
                warn!("event=export_rejected reason=busy");
                return Err(ExportBusy);
            };
            run_export(surface, options, renderer, printer, out_dir, &self.fallback_count)
        };
        self.last.replace(Some(outcome.clone()));
        Ok(outcome)
    }
}

fn run_export(
    surface: &mut dyn DocumentSurface,
    options: &ExportOptions,
    renderer: &dyn PdfRenderer,
    printer: &dyn NativePrint,
    out_dir: &Path,
    fallback_count: &Cell<u64>,
) -> ExportOutcome {
    if !surface.is_preview_active() {
        surface.show_preview();
    }
    let Some(area) = surface.printable_area() else {
        return ExportOutcome::Skipped;
    };

    match renderer.render(area, options, out_dir) {
        Ok(path) => {
            info!(
                "event=export_saved area={} file={} path={}",
                area.id,
                options.filename,
                path.display()
            );
            ExportOutcome::Saved {
                path: path.to_string_lossy().to_string(),
                filename: options.filename.clone(),
            }
        }
        Err(e) => {
            error!(
                "event=export_failed area={} file={} error={:#}",
                area.id, options.filename, e
            );
            fallback_count.set(fallback_count.get() + 1);
            let printed = match printer.print(area) {
                Ok(()) => true,
                Err(pe) => {
                    error!("event=print_fallback_failed error={:#}", pe);
                    false
                }
            };
            ExportOutcome::PrintFallback {
                filename: options.filename.clone(),
                reason: format!("{:#}", e),
                printed,
            }
        }
    }
}

fn stage_html(area: PrintableArea<'_>, dir: &Path, stem: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let path = dir.join(format!("{}.html", stem));
    std::fs::write(&path, area.html)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(path)
}

fn run_command(cmd: &mut Command, program: &str) -> anyhow::Result<()> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to launch {}", program))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        ));
    }
    Ok(())
}

/// Renders through a wkhtmltopdf-compatible command line.
pub struct CommandRenderer {
    pub program: String,
}

impl PdfRenderer for CommandRenderer {
    fn render(
        &self,
        area: PrintableArea<'_>,
        options: &ExportOptions,
        out_dir: &Path,
    ) -> anyhow::Result<PathBuf> {
        let stem = options.filename.trim_end_matches(".pdf");
        let html_path = stage_html(area, out_dir, stem)?;
        let out_path = out_dir.join(&options.filename);
        let [top, right, bottom, left] = options.margin;
        let quality = ((options.image.quality * 100.0).round() as i64).clamp(1, 100);
        let dpi = (96.0 * options.capture.scale).round() as i64;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--quiet")
            .args(["--margin-top", &format!("{}mm", top)])
            .args(["--margin-right", &format!("{}mm", right)])
            .args(["--margin-bottom", &format!("{}mm", bottom)])
            .args(["--margin-left", &format!("{}mm", left)])
            .args(["--page-size", "Letter"])
            .args(["--orientation", "Portrait"])
            .args(["--image-quality", &quality.to_string()])
            .args(["--dpi", &dpi.to_string()])
            .arg("--background")
            .args(["--title", stem])
            .arg(&html_path)
            .arg(&out_path);
        run_command(&mut cmd, &self.program)?;
        if !out_path.is_file() {
            return Err(anyhow!(
                "{} produced no file at {}",
                self.program,
                out_path.to_string_lossy()
            ));
        }
        Ok(out_path)
    }
}

/// Sends the staged document to the host print spooler.
pub struct CommandPrinter {
    pub program: String,
    pub staging_dir: PathBuf,
}

impl NativePrint for CommandPrinter {
    fn print(&self, area: PrintableArea<'_>) -> anyhow::Result<()> {
        let html_path = stage_html(area, &self.staging_dir, "codiseno-print")?;
        let mut cmd = Command::new(&self.program);
        cmd.arg(&html_path);
        run_command(&mut cmd, &self.program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeSurface {
        active: bool,
        renders: usize,
        has_area: bool,
    }

    impl DocumentSurface for FakeSurface {
        fn is_preview_active(&self) -> bool {
            self.active
        }
        fn show_preview(&mut self) {
            self.active = true;
            self.renders += 1;
        }
        fn printable_area(&self) -> Option<PrintableArea<'_>> {
            (self.active && self.has_area).then_some(PrintableArea {
                id: "printable-area",
                html: "<div id=\"printable-area\"></div>",
            })
        }
    }

    struct FakeRenderer {
        fail: bool,
        seen: RefCell<Vec<ExportOptions>>,
    }

    impl PdfRenderer for FakeRenderer {
        fn render(
            &self,
            _area: PrintableArea<'_>,
            options: &ExportOptions,
            out_dir: &Path,
        ) -> anyhow::Result<PathBuf> {
            self.seen.borrow_mut().push(options.clone());
            if self.fail {
                return Err(anyhow!("canvas capture failed"));
            }
            Ok(out_dir.join(&options.filename))
        }
    }

    #[derive(Default)]
    struct FakePrinter {
        calls: Cell<usize>,
    }

    impl NativePrint for FakePrinter {
        fn print(&self, _area: PrintableArea<'_>) -> anyhow::Result<()> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }
    }

    fn options(name: &str) -> ExportOptions {
        ExportOptions::for_project(name, &ExportSection::default())
    }

    #[test]
    fn file_name_replaces_whitespace() {
        let name = export_file_name("Huerto Escolar 2025");
        assert_eq!(name, "Planeacion_NEM_Huerto_Escolar_2025.pdf");
        assert!(!name.contains(' '));
        assert_eq!(export_file_name(""), "Planeacion_NEM_Proyecto.pdf");
    }

    #[test]
    fn file_name_is_a_single_path_component() {
        assert_eq!(
            export_file_name("Ciencia y/o Arte"),
            "Planeacion_NEM_Ciencia_y_o_Arte.pdf"
        );
        assert_eq!(
            export_file_name("../../etc\\passwd\u{7}"),
            "Planeacion_NEM_.._.._etc_passwd_.pdf"
        );
        let out = Path::new("/tmp/out");
        for name in ["Ciencia y/o Arte", "../../etc/passwd", "a\\..\\b", "/abs"] {
            let path = out.join(export_file_name(name));
            assert_eq!(path.parent(), Some(out), "{name}");
        }
    }

    #[test]
    fn options_are_letter_portrait() {
        let o = options("X");
        assert_eq!(o.margin, [10.0; 4]);
        assert_eq!(o.pdf.format, "letter");
        assert_eq!(o.pdf.orientation, "portrait");
        assert_eq!(o.pdf.unit, "mm");
        assert_eq!(o.image.kind, "jpeg");
        assert!(o.capture.use_cors);
    }

    #[test]
    fn switches_to_preview_then_saves() {
        let adapter = ExportAdapter::new();
        let mut surface = FakeSurface {
            active: false,
            renders: 0,
            has_area: true,
        };
        let renderer = FakeRenderer {
            fail: false,
            seen: RefCell::new(Vec::new()),
        };
        let printer = FakePrinter::default();
        let out = adapter
            .export(
                &mut surface,
                &options("Huerto Escolar 2025"),
                &renderer,
                &printer,
                Path::new("/tmp"),
            )
            .expect("not busy");
        assert!(matches!(out, ExportOutcome::Saved { ref filename, .. } if filename.contains("Huerto_Escolar_2025")));
        assert_eq!(surface.renders, 1);
        assert_eq!(printer.calls.get(), 0);
        assert!(!adapter.is_busy());
    }

    #[test]
    fn renderer_failure_prints_exactly_once_and_clears_busy() {
        let adapter = ExportAdapter::new();
        let mut surface = FakeSurface {
            active: true,
            renders: 0,
            has_area: true,
        };
        let renderer = FakeRenderer {
            fail: true,
            seen: RefCell::new(Vec::new()),
        };
        let printer = FakePrinter::default();
        let out = adapter
            .export(&mut surface, &options("P"), &renderer, &printer, Path::new("/tmp"))
            .expect("not busy");
        assert!(matches!(out, ExportOutcome::PrintFallback { printed: true, .. }));
        assert_eq!(printer.calls.get(), 1);
        assert_eq!(adapter.fallback_count(), 1);
        assert_eq!(surface.renders, 0);
        assert!(!adapter.is_busy());
    }

    #[test]
    fn missing_printable_area_is_a_silent_no_op() {
        let adapter = ExportAdapter::new();
        let mut surface = FakeSurface {
            active: true,
            renders: 0,
            has_area: false,
        };
        let renderer = FakeRenderer {
            fail: false,
            seen: RefCell::new(Vec::new()),
        };
        let printer = FakePrinter::default();
        let out = adapter
            .export(&mut surface, &options("P"), &renderer, &printer, Path::new("/tmp"))
            .expect("not busy");
        assert_eq!(out, ExportOutcome::Skipped);
        assert!(renderer.seen.borrow().is_empty());
        assert_eq!(printer.calls.get(), 0);
        assert!(!adapter.is_busy());
    }

    /// Renderer that tries to start a second export while the first runs.
    struct ReentrantRenderer<'a> {
        adapter: &'a ExportAdapter,
        nested: RefCell<Option<Result<ExportOutcome, ExportBusy>>>,
    }

    impl PdfRenderer for ReentrantRenderer<'_> {
        fn render(
            &self,
            _area: PrintableArea<'_>,
            options: &ExportOptions,
            out_dir: &Path,
        ) -> anyhow::Result<PathBuf> {
            let mut surface = FakeSurface {
                active: true,
                renders: 0,
                has_area: true,
            };
            let inner = FakeRenderer {
                fail: false,
                seen: RefCell::new(Vec::new()),
            };
            let nested = self.adapter.export(
                &mut surface,
                options,
                &inner,
                &FakePrinter::default(),
                out_dir,
            );
            self.nested.replace(Some(nested));
            Ok(out_dir.join(&options.filename))
        }
    }

    #[test]
    fn export_started_during_an_export_is_rejected() {
        let adapter = ExportAdapter::new();
        let mut surface = FakeSurface {
            active: true,
            renders: 0,
            has_area: true,
        };
        let renderer = ReentrantRenderer {
            adapter: &adapter,
            nested: RefCell::new(None),
        };
        let out = adapter
            .export(
                &mut surface,
                &options("P"),
                &renderer,
                &FakePrinter::default(),
                Path::new("/tmp"),
            )
            .expect("outer export runs");
        assert!(matches!(out, ExportOutcome::Saved { .. }));
        assert_eq!(renderer.nested.borrow().clone(), Some(Err(ExportBusy)));
        assert!(!adapter.is_busy());
        assert_eq!(adapter.last_outcome(), Some(out));
    }

    #[test]
    fn busy_flag_rejects_reentry() {
        let busy = Cell::new(false);
        let guard = BusyGuard::acquire(&busy).expect("free");
        assert!(BusyGuard::acquire(&busy).is_none());
        drop(guard);
        assert!(!busy.get());
        assert!(BusyGuard::acquire(&busy).is_some());
    }
}
