//! Read-only projection of the project into the printable codiseño document.
//!
//! Layout is page aware: every block is measured before placement and a
//! block that does not fit on the current page moves whole to the next one.
//! Discipline tables are never split across pages.

use serde::Serialize;

use crate::project::{DisciplineEntry, ProjectData};

pub const PRINTABLE_AREA_ID: &str = "printable-area";

pub const DEFAULT_SCHOOL: &str = "Escuela Normal Superior Profr. Moisés Sáenz Garza";
pub const PENDING: &str = "Pendiente";
pub const NOT_ASSIGNED: &str = "No asignado";
pub const NO_PROJECT_NAME: &str = "Sin nombre definido";
pub const NOT_SPECIFIED: &str = "No especificada";
pub const UNDEFINED: &str = "Sin definir";
pub const NO_SELECTION: &str = "Sin selección";
pub const ACTIVITY_PENDING: &str = "Pendiente de desarrollo.";
pub const SIGNATURE_LABEL: &str = "Vo. Bo. Dirección Escolar";
pub const FOOTER: &str = "Documento de codiseño pedagógico - ENS.";
pub const PROJECT_SECTION_TITLE: &str = "1. Proyecto interdisciplinario - Codiseño";
pub const PROCESS_SECTION_TITLE: &str = "Proceso Interdisciplinario - Codiseño";

// Letter portrait, millimetres.
pub const PAGE_WIDTH_MM: f64 = 215.9;
pub const PAGE_HEIGHT_MM: f64 = 279.4;
const LINE_MM: f64 = 4.4;
const CHAR_MM: f64 = 1.9;
const CELL_PADDING_MM: f64 = 4.0;
const BLOCK_GAP_MM: f64 = 6.0;

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderBlock {
    pub school_name: String,
    pub school_year: String,
    pub grade: String,
    pub trimester: String,
    pub temporality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBlock {
    pub project_name: String,
    pub thematic_situation: String,
    pub temporality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineBlock {
    pub entry_id: String,
    pub field: String,
    pub discipline: String,
    pub content: String,
    pub pda: String,
    pub activity_generalities: String,
}

impl DisciplineBlock {
    fn from_entry(e: &DisciplineEntry) -> Self {
        Self {
            entry_id: e.id.clone(),
            field: e.field.clone(),
            discipline: or_placeholder(&e.discipline, UNDEFINED),
            content: or_placeholder(&e.content, NO_SELECTION),
            pda: or_placeholder(&e.pda, NO_SELECTION),
            activity_generalities: or_placeholder(&e.activity_generalities, ACTIVITY_PENDING),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "camelCase")]
pub enum BlockRef {
    Header,
    Project,
    Discipline(usize),
    Signature,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub number: usize,
    pub blocks: Vec<BlockRef>,
    pub used_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentModel {
    pub printable_area_id: &'static str,
    pub header: HeaderBlock,
    pub project: ProjectBlock,
    pub disciplines: Vec<DisciplineBlock>,
    pub signature_label: &'static str,
    pub footer: &'static str,
    pub pages: Vec<Page>,
}

/// Rough line count for `text` in a cell `width_mm` wide.
fn estimate_lines(text: &str, width_mm: f64) -> usize {
    let per_line = ((width_mm - CELL_PADDING_MM) / CHAR_MM).floor().max(1.0) as usize;
    text.split('\n')
        .map(|line| {
            let n = line.chars().count();
            n.div_ceil(per_line).max(1)
        })
        .sum()
}

fn discipline_height(block: &DisciplineBlock, width_mm: f64) -> f64 {
    let half = width_mm / 2.0;
    let head = LINE_MM * 2.0 + CELL_PADDING_MM;
    let content_lines = estimate_lines(&block.content, half);
    let pda_lines = estimate_lines(&block.pda, half);
    let middle = (content_lines.max(pda_lines) + 1) as f64 * LINE_MM + CELL_PADDING_MM;
    let activity =
        (estimate_lines(&block.activity_generalities, width_mm) + 1) as f64 * LINE_MM + CELL_PADDING_MM;
    head + middle + activity + BLOCK_GAP_MM
}

fn header_height() -> f64 {
    5.0 * LINE_MM + CELL_PADDING_MM + BLOCK_GAP_MM
}

fn project_height(block: &ProjectBlock, width_mm: f64) -> f64 {
    let title = LINE_MM + CELL_PADDING_MM;
    let name = estimate_lines(&block.project_name, width_mm) as f64 * LINE_MM + CELL_PADDING_MM;
    let half = width_mm / 2.0;
    let lower = (estimate_lines(&block.thematic_situation, half)
        .max(estimate_lines(&block.temporality, half))
        + 1) as f64
        * LINE_MM
        + CELL_PADDING_MM;
    // Section title for the discipline tables rides with the project table.
    title + name + lower + BLOCK_GAP_MM + LINE_MM * 1.5
}

fn signature_height() -> f64 {
    30.0
}

/// Greedy page filling. A block that does not fit starts a new page; a
/// block taller than a page still gets a page of its own.
pub fn paginate(heights: &[f64], page_height: f64) -> Vec<Vec<usize>> {
    let mut pages: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut used = 0.0_f64;
    for (i, &h) in heights.iter().enumerate() {
        if !current.is_empty() && used + h > page_height {
            pages.push(std::mem::take(&mut current));
            used = 0.0;
        }
        current.push(i);
        used += h;
    }
    if !current.is_empty() {
        pages.push(current);
    }
    pages
}

/// Pure projection. `margin_mm` is the per-side page margin used for export.
pub fn project_document(data: &ProjectData, margin_mm: f64) -> DocumentModel {
    let header = HeaderBlock {
        school_name: or_placeholder(&data.school_name, DEFAULT_SCHOOL),
        school_year: data.school_year.clone(),
        grade: or_placeholder(&data.grade, PENDING),
        trimester: or_placeholder(&data.trimester, NOT_ASSIGNED),
        temporality: or_placeholder(&data.temporality, PENDING),
    };
    let project = ProjectBlock {
        project_name: or_placeholder(&data.project_name, NO_PROJECT_NAME),
        thematic_situation: or_placeholder(&data.thematic_situation, NOT_SPECIFIED),
        temporality: data.temporality.clone(),
    };
    let disciplines: Vec<DisciplineBlock> = data
        .disciplines
        .iter()
        .map(DisciplineBlock::from_entry)
        .collect();

    let width = PAGE_WIDTH_MM - 2.0 * margin_mm;
    let page_height = PAGE_HEIGHT_MM - 2.0 * margin_mm;

    let mut refs = vec![BlockRef::Header, BlockRef::Project];
    let mut heights = vec![header_height(), project_height(&project, width)];
    for (i, d) in disciplines.iter().enumerate() {
        refs.push(BlockRef::Discipline(i));
        heights.push(discipline_height(d, width));
    }
    refs.push(BlockRef::Signature);
    heights.push(signature_height());

    let pages = paginate(&heights, page_height)
        .into_iter()
        .enumerate()
        .map(|(n, idxs)| Page {
            number: n + 1,
            used_mm: idxs.iter().map(|i| heights[*i]).sum(),
            blocks: idxs.into_iter().map(|i| refs[i]).collect(),
        })
        .collect();

    DocumentModel {
        printable_area_id: PRINTABLE_AREA_ID,
        header,
        project,
        disciplines,
        signature_label: SIGNATURE_LABEL,
        footer: FOOTER,
        pages,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = "body{margin:0;background:#ffffff;color:#000;font-family:Arial,Helvetica,sans-serif;font-size:10.5px}\
.page{page-break-after:always}.page:last-child{page-break-after:auto}\
.header{display:flex;justify-content:space-between;border-bottom:2px solid #000;padding-bottom:12px;margin-bottom:18px}\
.band{background:#002060;color:#fff;font-weight:bold;text-align:center;text-transform:uppercase;font-size:12px;border:1px solid #000;padding:3px}\
.section{font-weight:bold;font-size:12px;text-transform:uppercase;border-bottom:2px solid #000;margin-bottom:6px}\
table{width:100%;border-collapse:collapse;margin-bottom:18px}\
td,th{border:1px solid #000;padding:6px;text-align:left;vertical-align:top}\
th{background:#f9fafb;font-size:9px;text-transform:uppercase}\
.block{break-inside:avoid;page-break-inside:avoid}\
.pda{font-style:italic;white-space:pre-wrap}.activity{white-space:pre-wrap;text-align:justify}\
.signature{margin-top:48px;text-align:center;font-weight:bold;font-size:10px;text-transform:uppercase}\
.signature .line{width:256px;border-top:1px solid #000;margin:0 auto 4px}\
.footer{font-size:8.5px;color:#9ca3af;text-align:center;font-style:italic;border-top:1px solid #f3f4f6;padding-top:12px;margin-top:24px}";

fn render_block(out: &mut String, model: &DocumentModel, block: BlockRef) {
    match block {
        BlockRef::Header => {
            let h = &model.header;
            out.push_str(&format!(
                "<div class=\"header block\"><div><p><b style=\"font-size:14px;text-transform:uppercase\">{}</b></p>\
<p><b>Ciclo:</b> {}</p><p><b>Grado:</b> {}</p></div>\
<div style=\"text-align:right\"><p><b>Trimestre:</b> <span style=\"text-transform:uppercase\">{}</span></p>\
<p><b>Temporalidad:</b> {}</p></div></div>",
                escape_html(&h.school_name),
                escape_html(&h.school_year),
                escape_html(&h.grade),
                escape_html(&h.trimester),
                escape_html(&h.temporality),
            ));
        }
        BlockRef::Project => {
            let p = &model.project;
            out.push_str(&format!(
                "<div class=\"block\"><div class=\"band\">{}</div><table><tbody>\
<tr><td colspan=\"2\"><b>1.3 Nombre del proyecto:</b> <b style=\"font-size:12px;text-transform:uppercase\">{}</b></td></tr>\
<tr><td style=\"width:50%\"><b>1.4 Situación temática:</b><br/>{}</td>\
<td style=\"width:50%\"><b>1.5 Temporalidad:</b><br/>{}</td></tr>\
</tbody></table><div class=\"section\">{}</div></div>",
                PROJECT_SECTION_TITLE,
                escape_html(&p.project_name),
                escape_html(&p.thematic_situation),
                escape_html(&p.temporality),
                PROCESS_SECTION_TITLE,
            ));
        }
        BlockRef::Discipline(i) => {
            let Some(d) = model.disciplines.get(i) else {
                return;
            };
            out.push_str(&format!(
                "<div class=\"block\" data-entry-id=\"{}\"><table>\
<thead><tr><th style=\"width:50%\">2.1 Campo: {}</th><th style=\"width:50%\">2.2 Disciplina: {}</th></tr></thead>\
<tbody><tr><td><b>2.3 Contenido:</b><br/>{}</td><td><b>2.4 PDA:</b><br/><div class=\"pda\">{}</div></td></tr>\
<tr><td colspan=\"2\"><b>2.5 Orientaciones generales:</b><br/><div class=\"activity\">{}</div></td></tr>\
</tbody></table></div>",
                escape_html(&d.entry_id),
                escape_html(&d.field),
                escape_html(&d.discipline),
                escape_html(&d.content),
                escape_html(&d.pda),
                escape_html(&d.activity_generalities),
            ));
        }
        BlockRef::Signature => {
            out.push_str(&format!(
                "<div class=\"signature block\"><div class=\"line\"></div><p>{}</p></div>\
<div class=\"footer\">{}</div>",
                model.signature_label, model.footer
            ));
        }
    }
}

/// Standalone HTML document; the printable area carries `PRINTABLE_AREA_ID`.
pub fn render_html(model: &DocumentModel, title: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"utf-8\"/>");
    out.push_str(&format!("<title>{}</title>", escape_html(title)));
    out.push_str(&format!("<style>{}</style></head><body>", STYLE));
    out.push_str(&format!("<div id=\"{}\">", model.printable_area_id));
    for page in &model.pages {
        out.push_str(&format!("<section class=\"page\" data-page=\"{}\">", page.number));
        for block in &page.blocks {
            render_block(&mut out, model, *block);
        }
        out.push_str("</section>");
    }
    out.push_str("</div></body></html>");
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Tab {
    Edit,
    Preview,
}

impl Tab {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "edit" => Some(Self::Edit),
            "preview" => Some(Self::Preview),
            _ => None,
        }
    }
}

/// Result of laying out the preview for one project revision.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub revision: u64,
    pub model: DocumentModel,
    pub html: String,
}

/// Edit/preview switch plus the last rendered preview.
#[derive(Debug)]
pub struct DocumentView {
    tab: Tab,
    margin_mm: f64,
    rendered: Option<RenderedDocument>,
    finalized_at: Option<u64>,
}

impl DocumentView {
    pub fn new(margin_mm: f64) -> Self {
        Self {
            tab: Tab::Edit,
            margin_mm,
            rendered: None,
            finalized_at: None,
        }
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    /// Activates the preview and lays out `data`. The returned document is
    /// the completion signal: once it exists the printable area is ready.
    pub fn show_preview(&mut self, data: &ProjectData, revision: u64, title: &str) -> &RenderedDocument {
        self.tab = Tab::Preview;
        let current = self.rendered.take().filter(|r| r.revision == revision);
        let doc = match current {
            Some(doc) => doc,
            None => {
                let model = project_document(data, self.margin_mm);
                let html = render_html(&model, title);
                RenderedDocument {
                    revision,
                    model,
                    html,
                }
            }
        };
        self.rendered.insert(doc)
    }

    /// The printable area exists only while the preview shows the current revision.
    pub fn printable_area(&self, revision: u64) -> Option<&RenderedDocument> {
        if self.tab != Tab::Preview {
            return None;
        }
        self.rendered.as_ref().filter(|r| r.revision == revision)
    }

    pub fn finalize(&mut self, revision: u64) {
        self.finalized_at = Some(revision);
    }

    /// Finalization lapses as soon as the project changes again.
    pub fn is_finalized(&self, revision: u64) -> bool {
        self.finalized_at == Some(revision)
    }
}
