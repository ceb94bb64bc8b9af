use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SCHOOL_YEAR: &str = "2025 – 2026";
pub const DEFAULT_FIELD: &str = "Lenguajes";

/// Fixed formative fields, in display order.
pub const FORMATIVE_FIELDS: &[(&str, &str)] = &[
    ("lenguajes", "Lenguajes"),
    ("saberes", "Saberes y Pensamiento Científico"),
    ("etica", "Ética, Naturaleza y Sociedades"),
    ("humano", "De lo Humano y lo Comunitario"),
];

pub const GRADES: &[&str] = &["1° Grado", "2° Grado", "3° Grado"];
pub const TRIMESTERS: &[&str] = &["1er Trimestre", "2do Trimestre", "3er Trimestre"];

pub fn is_formative_field(name: &str) -> bool {
    FORMATIVE_FIELDS.iter().any(|(_, n)| *n == name)
}

/// Catalog key for a grade label: its first character ("1° Grado" -> "1").
pub fn grade_digit(grade: &str) -> Option<&str> {
    let first = grade.chars().next()?;
    Some(&grade[..first.len_utf8()])
}

/// "d/m/yyyy al d/m/yyyy", earliest date first.
pub fn temporality_from_range(a: NaiveDate, b: NaiveDate) -> String {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    format!(
        "{} al {}",
        start.format("%-d/%-m/%Y"),
        end.format("%-d/%-m/%Y")
    )
}

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub formative_field: String,
    #[serde(default)]
    pub discipline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineEntry {
    /// Stable identity assigned at creation; manual-mode flags key on it.
    #[serde(default = "new_entry_id")]
    pub id: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub discipline: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pda: String,
    #[serde(default)]
    pub evaluation: String,
    #[serde(default)]
    pub activity_generalities: String,
}

impl DisciplineEntry {
    pub fn blank() -> Self {
        Self {
            id: new_entry_id(),
            field: DEFAULT_FIELD.to_string(),
            discipline: String::new(),
            content: String::new(),
            pda: String::new(),
            evaluation: String::new(),
            activity_generalities: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub school_name: String,
    pub school_year: String,
    pub grade: String,
    pub trimester: String,
    pub project_name: String,
    pub thematic_situation: String,
    pub temporality: String,
    pub total_sessions: String,
    pub disciplines: Vec<DisciplineEntry>,
    pub teachers: Vec<TeacherEntry>,
}

impl Default for ProjectData {
    fn default() -> Self {
        Self {
            school_name: String::new(),
            school_year: DEFAULT_SCHOOL_YEAR.to_string(),
            grade: String::new(),
            trimester: String::new(),
            project_name: String::new(),
            thematic_situation: String::new(),
            temporality: String::new(),
            total_sessions: String::new(),
            disciplines: vec![DisciplineEntry::blank()],
            teachers: Vec::new(),
        }
    }
}

impl ProjectData {
    pub fn entry(&self, entry_id: &str) -> Option<&DisciplineEntry> {
        self.disciplines.iter().find(|e| e.id == entry_id)
    }

    pub fn entry_index(&self, entry_id: &str) -> Option<usize> {
        self.disciplines.iter().position(|e| e.id == entry_id)
    }
}

/// Partial project update. Every present key replaces the current value
/// wholesale, arrays included.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectPatch {
    pub school_name: Option<String>,
    pub school_year: Option<String>,
    pub grade: Option<String>,
    pub trimester: Option<String>,
    pub project_name: Option<String>,
    pub thematic_situation: Option<String>,
    pub temporality: Option<String>,
    pub total_sessions: Option<String>,
    pub disciplines: Option<Vec<DisciplineEntry>>,
    pub teachers: Option<Vec<TeacherEntry>>,
}

impl ProjectPatch {
    pub fn disciplines(next: Vec<DisciplineEntry>) -> Self {
        Self {
            disciplines: Some(next),
            ..Self::default()
        }
    }
}

fn merge_field(
    target: &mut String,
    value: Option<String>,
    key: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(v) = value {
        if *target != v {
            *target = v;
            changed.push(key);
        }
    }
}

/// Holder of the single live project for the session.
#[derive(Debug, Default)]
pub struct ProjectState {
    data: ProjectData,
    revision: u64,
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &ProjectData {
        &self.data
    }

    /// Bumped on every merge that changes something.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Shallow merge. Returns the camelCase keys whose value changed.
    pub fn update(&mut self, patch: ProjectPatch) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let d = &mut self.data;
        merge_field(&mut d.school_name, patch.school_name, "schoolName", &mut changed);
        merge_field(&mut d.school_year, patch.school_year, "schoolYear", &mut changed);
        merge_field(&mut d.grade, patch.grade, "grade", &mut changed);
        merge_field(&mut d.trimester, patch.trimester, "trimester", &mut changed);
        merge_field(&mut d.project_name, patch.project_name, "projectName", &mut changed);
        merge_field(
            &mut d.thematic_situation,
            patch.thematic_situation,
            "thematicSituation",
            &mut changed,
        );
        merge_field(&mut d.temporality, patch.temporality, "temporality", &mut changed);
        merge_field(
            &mut d.total_sessions,
            patch.total_sessions,
            "totalSessions",
            &mut changed,
        );
        if let Some(next) = patch.disciplines {
            if d.disciplines != next {
                d.disciplines = next;
                changed.push("disciplines");
            }
        }
        if let Some(next) = patch.teachers {
            if d.teachers != next {
                d.teachers = next;
                changed.push("teachers");
            }
        }
        if !changed.is_empty() {
            self.revision += 1;
        }
        changed
    }

    pub fn reset(&mut self) {
        self.data = ProjectData::default();
        self.revision += 1;
    }
}
