//! Form controller: the only path through which the project is mutated.
//!
//! Every edit rebuilds the affected array and merges it into the project
//! state, applying the cascading resets between field, discipline, content,
//! grade and the PDA selection. Manual-mode flags are UI state kept beside
//! the project, keyed by entry id.

use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};

use crate::catalog::{Catalog, CatalogContent, PDA_SEPARATOR};
use crate::evaluation;
use crate::project::{self, DisciplineEntry, ProjectData, ProjectPatch, ProjectState};
use crate::title::TitleObserver;

#[derive(Debug, Clone, Serialize)]
pub struct FormError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FormError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Same resets as the per-entry edits, applied to a replacement entry that
/// keeps the id of `stored`. The first changed level wins.
fn cascade_against(stored: &DisciplineEntry, next: &mut DisciplineEntry) {
    if next.field != stored.field {
        next.discipline.clear();
        next.content.clear();
        next.pda.clear();
        next.evaluation.clear();
        next.activity_generalities.clear();
    } else if next.discipline != stored.discipline {
        next.content.clear();
        next.pda.clear();
        next.activity_generalities.clear();
    } else if next.content != stored.content {
        next.pda.clear();
        next.activity_generalities.clear();
    }
}

fn offered_pda(catalog: &Catalog, grade: &str, entry: &DisciplineEntry) -> Vec<String> {
    if entry.content.is_empty() || entry.discipline.is_empty() {
        return Vec::new();
    }
    let Some(digit) = project::grade_digit(grade) else {
        return Vec::new();
    };
    catalog.lookup_pda_fragments(&entry.field, &entry.discipline, &entry.content, digit)
}

fn entry_not_found(entry_id: &str) -> FormError {
    FormError::new("not_found", "discipline entry not found")
        .with_details(json!({ "entryId": entry_id }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualKind {
    Content,
    Pda,
}

impl ManualKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "pda" => Some(Self::Pda),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManualFlags {
    pub content: bool,
    pub pda: bool,
}

impl ManualFlags {
    fn get(&self, kind: ManualKind) -> bool {
        match kind {
            ManualKind::Content => self.content,
            ManualKind::Pda => self.pda,
        }
    }

    fn set(&mut self, kind: ManualKind, enabled: bool) {
        match kind {
            ManualKind::Content => self.content = enabled,
            ManualKind::Pda => self.pda = enabled,
        }
    }
}

/// Selected fragments stored in `entry.pda`, in selection order.
pub fn split_selection(pda: &str) -> Vec<&str> {
    pda.split(PDA_SEPARATOR)
        .filter(|p| !p.trim().is_empty())
        .collect()
}

pub fn join_selection(fragments: &[&str]) -> String {
    fragments.join(PDA_SEPARATOR)
}

/// Removes `fragment` if selected, otherwise appends it. Re-selecting a
/// fragment therefore moves it to the end.
pub fn toggle_fragment(pda: &str, fragment: &str) -> String {
    let mut current = split_selection(pda);
    if let Some(pos) = current.iter().position(|p| *p == fragment) {
        current.remove(pos);
    } else {
        current.push(fragment);
    }
    join_selection(&current)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentOption {
    pub id: String,
    pub content: String,
    pub label: String,
}

impl From<CatalogContent> for ContentOption {
    fn from(c: CatalogContent) -> Self {
        Self {
            label: c.label(),
            id: c.id,
            content: c.content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PdaOption {
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOptions {
    pub entry_id: String,
    pub fields: Vec<&'static str>,
    pub disciplines: Vec<String>,
    pub contents: Vec<ContentOption>,
    pub pda: Vec<PdaOption>,
    pub selected_pda: Vec<String>,
    pub techniques: Vec<&'static str>,
    pub technique: String,
    pub instrument: String,
    pub instruments: Vec<&'static str>,
    pub instrument_enabled: bool,
    pub manual: ManualFlags,
    pub can_remove: bool,
}

pub struct FormController {
    state: ProjectState,
    manual: HashMap<String, ManualFlags>,
    title: TitleObserver,
}

impl FormController {
    pub fn new(title: TitleObserver) -> Self {
        Self {
            state: ProjectState::new(),
            manual: HashMap::new(),
            title,
        }
    }

    pub fn project(&self) -> &ProjectData {
        self.state.data()
    }

    pub fn revision(&self) -> u64 {
        self.state.revision()
    }

    pub fn title(&self) -> &str {
        self.title.title()
    }

    pub fn manual_flags(&self, entry_id: &str) -> ManualFlags {
        self.manual.get(entry_id).copied().unwrap_or_default()
    }

    fn apply(&mut self, patch: ProjectPatch) -> Vec<&'static str> {
        let changed = self.state.update(patch);
        if changed.contains(&"projectName") {
            self.title
                .project_name_changed(&self.state.data().project_name);
        }
        if changed.contains(&"disciplines") {
            let live: HashSet<&str> = self
                .state
                .data()
                .disciplines
                .iter()
                .map(|e| e.id.as_str())
                .collect();
            self.manual.retain(|id, _| live.contains(id.as_str()));
        }
        changed
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.manual.clear();
        self.title
            .project_name_changed(&self.state.data().project_name);
    }

    /// Merges project-level fields. A grade change clears the PDA selection
    /// of every entry, since PDA fragments are grade specific.
    ///
    /// A `disciplines` array goes through the same rules as the per-entry
    /// edits: entries that keep their id cascade against the stored entry,
    /// and every entry must agree with the catalog under the resulting grade.
    pub fn update_metadata(
        &mut self,
        catalog: &Catalog,
        mut patch: ProjectPatch,
    ) -> Result<Vec<&'static str>, FormError> {
        let supplied = patch.disciplines.is_some();
        if let Some(next) = patch.disciplines.as_mut() {
            if next.is_empty() {
                return Err(FormError::new(
                    "bad_params",
                    "disciplines must contain at least one entry",
                ));
            }
            let mut seen = HashSet::new();
            for entry in next.iter() {
                if !seen.insert(entry.id.as_str()) {
                    return Err(FormError::new("bad_params", "duplicate discipline entry id")
                        .with_details(json!({ "entryId": entry.id })));
                }
            }
            for entry in next.iter_mut() {
                if let Some(stored) = self.state.data().entry(&entry.id) {
                    cascade_against(stored, entry);
                }
            }
        }

        let grade_changed = patch
            .grade
            .as_ref()
            .map(|g| *g != self.project().grade)
            .unwrap_or(false);
        if grade_changed {
            let mut next = patch
                .disciplines
                .take()
                .unwrap_or_else(|| self.project().disciplines.clone());
            for entry in next.iter_mut() {
                entry.pda.clear();
            }
            patch.disciplines = Some(next);
        }

        if let Some(next) = patch.disciplines.as_ref().filter(|_| supplied) {
            let grade = patch
                .grade
                .as_deref()
                .unwrap_or(self.project().grade.as_str());
            for entry in next {
                self.check_entry(catalog, grade, entry)?;
            }
        }

        Ok(self.apply(patch))
    }

    /// Catalog agreement for a whole entry. Manual-mode values are free text.
    fn check_entry(
        &self,
        catalog: &Catalog,
        grade: &str,
        entry: &DisciplineEntry,
    ) -> Result<(), FormError> {
        let details = || json!({ "entryId": entry.id });
        if !project::is_formative_field(&entry.field) {
            return Err(FormError::new("bad_params", "unknown formative field")
                .with_details(json!({ "entryId": entry.id, "field": entry.field })));
        }
        if !entry.discipline.is_empty()
            && !catalog
                .list_disciplines(&entry.field)
                .iter()
                .any(|d| *d == entry.discipline)
        {
            return Err(FormError::new("bad_params", "discipline does not belong to field")
                .with_details(json!({
                    "entryId": entry.id,
                    "field": entry.field,
                    "discipline": entry.discipline
                })));
        }
        let manual = self.manual_flags(&entry.id);
        if !manual.content
            && !entry.content.is_empty()
            && !catalog.has_content(&entry.field, &entry.discipline, &entry.content)
        {
            return Err(FormError::new("bad_params", "content is not in the catalog")
                .with_details(details()));
        }
        if !manual.pda && !entry.pda.is_empty() {
            let offered = offered_pda(catalog, grade, entry);
            if let Some(bad) = split_selection(&entry.pda)
                .into_iter()
                .find(|f| !offered.iter().any(|o| o.as_str() == *f))
            {
                return Err(FormError::new("bad_params", "fragment is not available for this entry")
                    .with_details(json!({ "entryId": entry.id, "fragment": bad })));
            }
        }
        Ok(())
    }

    fn edit_entry<F>(&mut self, entry_id: &str, edit: F) -> Result<(), FormError>
    where
        F: FnOnce(&mut DisciplineEntry) -> Result<(), FormError>,
    {
        let idx = self
            .project()
            .entry_index(entry_id)
            .ok_or_else(|| entry_not_found(entry_id))?;
        let mut next = self.project().disciplines.clone();
        edit(&mut next[idx])?;
        self.apply(ProjectPatch::disciplines(next));
        Ok(())
    }

    fn entry(&self, entry_id: &str) -> Result<&DisciplineEntry, FormError> {
        self.project()
            .entry(entry_id)
            .ok_or_else(|| entry_not_found(entry_id))
    }

    pub fn add_discipline(&mut self) -> String {
        let entry = DisciplineEntry::blank();
        let id = entry.id.clone();
        let mut next = self.project().disciplines.clone();
        next.push(entry);
        self.apply(ProjectPatch::disciplines(next));
        id
    }

    /// The list never drops below one entry.
    pub fn remove_discipline(&mut self, entry_id: &str) -> Result<(), FormError> {
        self.entry(entry_id)?;
        if self.project().disciplines.len() <= 1 {
            return Err(FormError::new(
                "min_entries",
                "a plan needs at least one discipline entry",
            ));
        }
        let next: Vec<DisciplineEntry> = self
            .project()
            .disciplines
            .iter()
            .filter(|e| e.id != entry_id)
            .cloned()
            .collect();
        self.apply(ProjectPatch::disciplines(next));
        Ok(())
    }

    pub fn set_field(&mut self, entry_id: &str, field: &str) -> Result<(), FormError> {
        if !project::is_formative_field(field) {
            return Err(FormError::new("bad_params", "unknown formative field")
                .with_details(json!({ "field": field })));
        }
        self.edit_entry(entry_id, |e| {
            if e.field != field {
                e.field = field.to_string();
                e.discipline.clear();
                e.content.clear();
                e.pda.clear();
                e.evaluation.clear();
                e.activity_generalities.clear();
            }
            Ok(())
        })
    }

    pub fn set_discipline(
        &mut self,
        catalog: &Catalog,
        entry_id: &str,
        discipline: &str,
    ) -> Result<(), FormError> {
        let field = self.entry(entry_id)?.field.clone();
        if !discipline.is_empty() && !catalog.list_disciplines(&field).iter().any(|d| d == discipline) {
            return Err(FormError::new("bad_params", "discipline does not belong to field")
                .with_details(json!({ "field": field, "discipline": discipline })));
        }
        self.edit_entry(entry_id, |e| {
            if e.discipline != discipline {
                e.discipline = discipline.to_string();
                e.content.clear();
                e.pda.clear();
                e.activity_generalities.clear();
            }
            Ok(())
        })
    }

    /// Catalog selection. Leaves manual-content mode.
    pub fn select_content(
        &mut self,
        catalog: &Catalog,
        entry_id: &str,
        content: &str,
    ) -> Result<(), FormError> {
        let entry = self.entry(entry_id)?;
        if !content.is_empty() && !catalog.has_content(&entry.field, &entry.discipline, content) {
            return Err(FormError::new("bad_params", "content is not in the catalog")
                .with_details(json!({
                    "field": entry.field,
                    "discipline": entry.discipline,
                    "content": content
                })));
        }
        self.edit_entry(entry_id, |e| {
            if e.content != content {
                e.content = content.to_string();
                e.pda.clear();
                e.activity_generalities.clear();
            }
            Ok(())
        })?;
        if let Some(flags) = self.manual.get_mut(entry_id) {
            flags.content = false;
        }
        Ok(())
    }

    fn require_manual(&self, entry_id: &str, kind: ManualKind) -> Result<(), FormError> {
        if self.manual_flags(entry_id).get(kind) {
            Ok(())
        } else {
            Err(FormError::new("bad_state", "entry is not in manual mode"))
        }
    }

    pub fn set_content_text(&mut self, entry_id: &str, text: &str) -> Result<(), FormError> {
        self.entry(entry_id)?;
        self.require_manual(entry_id, ManualKind::Content)?;
        self.edit_entry(entry_id, |e| {
            e.content = text.to_string();
            Ok(())
        })
    }

    pub fn set_pda_text(&mut self, entry_id: &str, text: &str) -> Result<(), FormError> {
        self.entry(entry_id)?;
        self.require_manual(entry_id, ManualKind::Pda)?;
        self.edit_entry(entry_id, |e| {
            e.pda = text.to_string();
            Ok(())
        })
    }

    /// Fragments offered for the entry under the current grade.
    pub fn available_pda(&self, catalog: &Catalog, entry: &DisciplineEntry) -> Vec<String> {
        offered_pda(catalog, &self.project().grade, entry)
    }

    /// Toggles one catalog fragment. Deselecting always works; selecting
    /// requires the fragment to be currently offered.
    pub fn toggle_pda(
        &mut self,
        catalog: &Catalog,
        entry_id: &str,
        fragment: &str,
    ) -> Result<(), FormError> {
        let entry = self.entry(entry_id)?;
        if self.manual_flags(entry_id).pda {
            return Err(FormError::new("bad_state", "PDA is in manual mode"));
        }
        let selected = split_selection(&entry.pda).contains(&fragment);
        if !selected && !self.available_pda(catalog, entry).iter().any(|p| p == fragment) {
            return Err(FormError::new("bad_params", "fragment is not available for this entry")
                .with_details(json!({ "fragment": fragment })));
        }
        self.edit_entry(entry_id, |e| {
            e.pda = toggle_fragment(&e.pda, fragment);
            Ok(())
        })
    }

    pub fn set_technique(&mut self, entry_id: &str, technique: &str) -> Result<(), FormError> {
        self.edit_entry(entry_id, |e| {
            e.evaluation = evaluation::with_technique(technique);
            Ok(())
        })
    }

    pub fn set_instrument(&mut self, entry_id: &str, instrument: &str) -> Result<(), FormError> {
        self.edit_entry(entry_id, |e| {
            e.evaluation = evaluation::with_instrument(&e.evaluation, instrument)
                .ok_or_else(|| FormError::new("bad_state", "choose a technique first"))?;
            Ok(())
        })
    }

    pub fn set_activity(&mut self, entry_id: &str, text: &str) -> Result<(), FormError> {
        self.edit_entry(entry_id, |e| {
            e.activity_generalities = text.to_string();
            Ok(())
        })
    }

    /// Entering manual content clears the catalog value. Leaving either mode
    /// keeps whatever text is stored.
    pub fn set_manual(
        &mut self,
        entry_id: &str,
        kind: ManualKind,
        enabled: bool,
    ) -> Result<ManualFlags, FormError> {
        self.entry(entry_id)?;
        let was = self.manual_flags(entry_id).get(kind);
        if enabled && !was && kind == ManualKind::Content {
            self.edit_entry(entry_id, |e| {
                e.content.clear();
                Ok(())
            })?;
        }
        let flags = self.manual.entry(entry_id.to_string()).or_default();
        flags.set(kind, enabled);
        Ok(*flags)
    }

    pub fn toggle_manual(&mut self, entry_id: &str, kind: ManualKind) -> Result<ManualFlags, FormError> {
        let enabled = !self.manual_flags(entry_id).get(kind);
        self.set_manual(entry_id, kind, enabled)
    }

    pub fn entry_options(&self, catalog: &Catalog, entry_id: &str) -> Result<EntryOptions, FormError> {
        let entry = self.entry(entry_id)?;
        let selected: Vec<String> = split_selection(&entry.pda)
            .into_iter()
            .map(str::to_string)
            .collect();
        let pda = self
            .available_pda(catalog, entry)
            .into_iter()
            .map(|text| PdaOption {
                selected: selected.contains(&text),
                text,
            })
            .collect();
        let contents = if entry.discipline.is_empty() {
            Vec::new()
        } else {
            catalog
                .list_contents(&entry.field, &entry.discipline)
                .into_iter()
                .map(ContentOption::from)
                .collect()
        };
        let parsed = evaluation::parse(&entry.evaluation);
        let instrument_enabled = evaluation::has_technique(&entry.evaluation);
        let instruments = if instrument_enabled {
            evaluation::instruments_for(parsed.technique).to_vec()
        } else {
            Vec::new()
        };

        Ok(EntryOptions {
            entry_id: entry.id.clone(),
            fields: project::FORMATIVE_FIELDS.iter().map(|(_, n)| *n).collect(),
            disciplines: catalog.list_disciplines(&entry.field),
            contents,
            pda,
            selected_pda: selected,
            techniques: evaluation::technique_names(),
            technique: parsed.technique.to_string(),
            instrument: parsed.instrument.to_string(),
            instruments,
            instrument_enabled,
            manual: self.manual_flags(entry_id),
            can_remove: self.project().disciplines.len() > 1,
        })
    }
}

impl Default for FormController {
    fn default() -> Self {
        Self::new(TitleObserver::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
      "fields": [
        { "name": "Lenguajes", "disciplines": [
          { "name": "Español", "contents": [
            { "id": 1, "content": "Lectura crítica", "pda": { "1": "Frag A\n\nFrag B", "2": "Frag C" } },
            { "id": 2, "content": "Oralidad", "pda": { "1": "Frag D" } }
          ]}
        ]},
        { "name": "Saberes y Pensamiento Científico", "disciplines": [
          { "name": "Matemáticas", "contents": [] }
        ]}
      ]
    }"#;

    fn set_grade(form: &mut FormController, catalog: &Catalog, grade: &str) {
        form.update_metadata(
            catalog,
            ProjectPatch {
                grade: Some(grade.to_string()),
                ..ProjectPatch::default()
            },
        )
        .expect("grade");
    }

    fn setup() -> (FormController, Catalog, String) {
        let catalog = Catalog::from_json_str(FIXTURE, "test").expect("catalog");
        let mut form = FormController::default();
        let id = form.project().disciplines[0].id.clone();
        set_grade(&mut form, &catalog, "1° Grado");
        form.set_discipline(&catalog, &id, "Español").expect("discipline");
        form.select_content(&catalog, &id, "Lectura crítica")
            .expect("content");
        (form, catalog, id)
    }

    #[test]
    fn split_then_join_reproduces_the_string() {
        for s in ["", "A", "A\n\nB", "uno dos\n\ntres\ncuatro\n\ncinco"] {
            assert_eq!(join_selection(&split_selection(s)), s);
        }
    }

    #[test]
    fn toggling_appends_and_removes_preserving_order() {
        let (mut form, catalog, id) = setup();
        let entry = form.project().entry(&id).expect("entry").clone();
        assert_eq!(form.available_pda(&catalog, &entry), vec!["Frag A", "Frag B"]);

        form.toggle_pda(&catalog, &id, "Frag A").expect("toggle");
        form.toggle_pda(&catalog, &id, "Frag B").expect("toggle");
        assert_eq!(form.project().entry(&id).expect("entry").pda, "Frag A\n\nFrag B");

        form.toggle_pda(&catalog, &id, "Frag A").expect("toggle");
        assert_eq!(form.project().entry(&id).expect("entry").pda, "Frag B");

        form.toggle_pda(&catalog, &id, "Frag A").expect("toggle");
        assert_eq!(form.project().entry(&id).expect("entry").pda, "Frag B\n\nFrag A");
    }

    #[test]
    fn fragments_outside_the_catalog_are_rejected() {
        let (mut form, catalog, id) = setup();
        let e = form.toggle_pda(&catalog, &id, "Frag C").expect_err("grade 2 only");
        assert_eq!(e.code, "bad_params");
    }

    #[test]
    fn field_change_resets_every_dependent_value() {
        let (mut form, catalog, id) = setup();
        form.toggle_pda(&catalog, &id, "Frag A").expect("toggle");
        form.set_technique(&id, "Observación").expect("technique");
        form.set_activity(&id, "Lectura en voz alta").expect("activity");

        form.set_field(&id, "Saberes y Pensamiento Científico").expect("field");
        let e = form.project().entry(&id).expect("entry");
        assert_eq!(e.field, "Saberes y Pensamiento Científico");
        assert!(e.discipline.is_empty());
        assert!(e.content.is_empty());
        assert!(e.pda.is_empty());
        assert!(e.evaluation.is_empty());
        assert!(e.activity_generalities.is_empty());
    }

    #[test]
    fn discipline_and_content_changes_cascade() {
        let (mut form, catalog, id) = setup();
        form.toggle_pda(&catalog, &id, "Frag B").expect("toggle");
        form.set_technique(&id, "Observación").expect("technique");
        form.set_activity(&id, "Notas").expect("activity");

        form.select_content(&catalog, &id, "Oralidad").expect("content");
        let e = form.project().entry(&id).expect("entry");
        assert!(e.pda.is_empty());
        assert!(e.activity_generalities.is_empty());
        assert_eq!(e.evaluation, "Observación: ");

        form.set_discipline(&catalog, &id, "").expect("discipline");
        let e = form.project().entry(&id).expect("entry");
        assert!(e.content.is_empty());
        assert_eq!(e.evaluation, "Observación: ");
    }

    #[test]
    fn grade_change_clears_pda_everywhere() {
        let (mut form, catalog, id) = setup();
        let second = form.add_discipline();
        form.set_discipline(&catalog, &second, "Español").expect("discipline");
        form.select_content(&catalog, &second, "Oralidad").expect("content");
        form.toggle_pda(&catalog, &second, "Frag D").expect("toggle");
        form.toggle_pda(&catalog, &id, "Frag A").expect("toggle");

        set_grade(&mut form, &catalog, "2° Grado");
        assert!(form.project().disciplines.iter().all(|e| e.pda.is_empty()));
        assert_eq!(form.project().entry(&id).expect("entry").content, "Lectura crítica");
    }

    #[test]
    fn last_entry_cannot_be_removed() {
        let (mut form, catalog, id) = setup();
        let e = form.remove_discipline(&id).expect_err("last entry");
        assert_eq!(e.code, "min_entries");
        assert_eq!(form.project().disciplines.len(), 1);

        let e = form
            .update_metadata(&catalog, ProjectPatch::disciplines(Vec::new()))
            .expect_err("empty list");
        assert_eq!(e.code, "bad_params");
    }

    #[test]
    fn manual_flags_follow_entry_identity_across_removal() {
        let (mut form, _catalog, first) = setup();
        let second = form.add_discipline();
        let third = form.add_discipline();
        form.set_manual(&third, ManualKind::Pda, true).expect("manual");

        form.remove_discipline(&second).expect("remove");
        assert!(form.manual_flags(&third).pda);
        assert!(!form.manual_flags(&first).pda);

        form.remove_discipline(&third).expect("remove");
        assert_eq!(form.manual_flags(&third), ManualFlags::default());
    }

    #[test]
    fn manual_content_clears_and_catalog_selection_leaves_manual_mode() {
        let (mut form, catalog, id) = setup();
        assert!(form.set_content_text(&id, "libre").is_err());

        form.set_manual(&id, ManualKind::Content, true).expect("manual");
        assert!(form.project().entry(&id).expect("entry").content.is_empty());
        form.set_content_text(&id, "Contenido propio").expect("text");

        form.toggle_manual(&id, ManualKind::Content).expect("toggle");
        assert_eq!(
            form.project().entry(&id).expect("entry").content,
            "Contenido propio"
        );

        form.set_manual(&id, ManualKind::Content, true).expect("manual");
        form.select_content(&catalog, &id, "Oralidad").expect("content");
        assert!(!form.manual_flags(&id).content);
    }

    #[test]
    fn manual_values_are_cleared_by_field_change_but_mode_survives() {
        let (mut form, _catalog, id) = setup();
        form.set_manual(&id, ManualKind::Pda, true).expect("manual");
        form.set_pda_text(&id, "PDA escrito a mano").expect("pda");
        form.set_field(&id, "Saberes y Pensamiento Científico").expect("field");
        assert!(form.project().entry(&id).expect("entry").pda.is_empty());
        assert!(form.manual_flags(&id).pda);
    }

    #[test]
    fn project_name_changes_drive_the_title() {
        let catalog = Catalog::from_json_str(FIXTURE, "test").expect("catalog");
        let mut form = FormController::default();
        form.update_metadata(
            &catalog,
            ProjectPatch {
                project_name: Some("Huerto Escolar 2025".into()),
                ..ProjectPatch::default()
            },
        )
        .expect("update");
        assert_eq!(form.title(), "Planeacion_NEM_Huerto_Escolar_2025");
        form.reset();
        assert_eq!(form.title(), crate::title::DEFAULT_TITLE);
    }

    #[test]
    fn replacement_entries_must_agree_with_the_catalog() {
        let (mut form, catalog, id) = setup();
        let before = form.project().clone();

        let mut invented = before.disciplines[0].clone();
        invented.field = "Campo inventado".into();
        invented.discipline = "Matemáticas".into();
        let e = form
            .update_metadata(&catalog, ProjectPatch::disciplines(vec![invented]))
            .expect_err("unknown field");
        assert_eq!(e.code, "bad_params");

        let mut wrong_discipline = DisciplineEntry::blank();
        wrong_discipline.discipline = "Matemáticas".into();
        let e = form
            .update_metadata(&catalog, ProjectPatch::disciplines(vec![wrong_discipline]))
            .expect_err("discipline of another field");
        assert_eq!(e.code, "bad_params");

        let mut stray_pda = before.disciplines[0].clone();
        stray_pda.pda = "Frag C".into();
        let e = form
            .update_metadata(&catalog, ProjectPatch::disciplines(vec![stray_pda]))
            .expect_err("grade 2 fragment");
        assert_eq!(e.code, "bad_params");

        assert_eq!(form.project(), &before);
        assert_eq!(form.project().entry(&id).expect("entry").content, "Lectura crítica");
    }

    #[test]
    fn replacement_entries_cascade_against_the_stored_entry() {
        let (mut form, catalog, id) = setup();
        form.toggle_pda(&catalog, &id, "Frag A").expect("toggle");
        form.set_technique(&id, "Observación").expect("technique");
        form.set_activity(&id, "Notas").expect("activity");

        let mut moved = form.project().entry(&id).expect("entry").clone();
        moved.field = "Saberes y Pensamiento Científico".into();
        form.update_metadata(&catalog, ProjectPatch::disciplines(vec![moved]))
            .expect("field change");
        let e = form.project().entry(&id).expect("entry");
        assert_eq!(e.field, "Saberes y Pensamiento Científico");
        assert!(e.discipline.is_empty());
        assert!(e.content.is_empty());
        assert!(e.pda.is_empty());
        assert!(e.evaluation.is_empty());
        assert!(e.activity_generalities.is_empty());

        let mut fresh = DisciplineEntry::blank();
        fresh.discipline = "Español".into();
        fresh.content = "Oralidad".into();
        fresh.pda = "Frag D".into();
        let mut next = form.project().disciplines.clone();
        next.push(fresh);
        form.update_metadata(&catalog, ProjectPatch::disciplines(next))
            .expect("valid new entry");
        assert_eq!(form.project().disciplines[1].pda, "Frag D");
    }

    #[test]
    fn manual_text_is_accepted_in_replacement_entries() {
        let (mut form, catalog, id) = setup();
        form.set_manual(&id, ManualKind::Pda, true).expect("manual");
        let mut next = form.project().entry(&id).expect("entry").clone();
        next.pda = "PDA escrito a mano".into();
        form.update_metadata(&catalog, ProjectPatch::disciplines(vec![next]))
            .expect("manual pda");
        assert_eq!(form.project().entry(&id).expect("entry").pda, "PDA escrito a mano");
    }

    #[test]
    fn instrument_needs_a_technique() {
        let (mut form, catalog, id) = setup();
        let e = form.set_instrument(&id, "Rúbrica").expect_err("no technique");
        assert_eq!(e.code, "bad_state");
        form.set_technique(&id, "Análisis del desempeño").expect("technique");
        form.set_instrument(&id, "Rúbrica").expect("instrument");
        let opts = form.entry_options(&catalog, &id).expect("options");
        assert_eq!(opts.technique, "Análisis del desempeño");
        assert_eq!(opts.instrument, "Rúbrica");
        assert!(opts.instrument_enabled);
        assert_eq!(opts.instruments.len(), 3);
        assert_eq!(opts.contents.len(), 2);
        assert_eq!(opts.contents[0].label, "1. Lectura crítica...");
    }
}
