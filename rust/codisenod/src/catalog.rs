//! Read-only curriculum catalog: field -> discipline -> contents -> PDA by grade.
//!
//! Catalogs are JSON documents imported into an in-memory SQLite database, or
//! prebuilt SQLite files with the same schema opened read-only. Lookups are
//! total: a missing key yields an empty result, never an error.

use anyhow::{anyhow, Context};
use log::{info, warn};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::project;

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");
pub const BUNDLED_SOURCE: &str = "bundled";

/// Fragments inside a PDA block, and selections inside `entry.pda`, are
/// separated by one blank line.
pub const PDA_SEPARATOR: &str = "\n\n";

#[derive(Debug, Deserialize)]
struct CatalogFile {
    fields: Vec<FieldRecord>,
}

#[derive(Debug, Deserialize)]
struct FieldRecord {
    name: String,
    #[serde(default)]
    disciplines: Vec<DisciplineRecord>,
}

#[derive(Debug, Deserialize)]
struct DisciplineRecord {
    name: String,
    #[serde(default)]
    contents: Vec<ContentRecord>,
}

#[derive(Debug, Deserialize)]
struct ContentRecord {
    id: serde_json::Value,
    content: String,
    #[serde(default)]
    pda: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogContent {
    pub id: String,
    pub content: String,
    pub pda_by_grade: BTreeMap<String, String>,
}

impl CatalogContent {
    /// Option label used by the content picker: id plus a 60-char preview.
    pub fn label(&self) -> String {
        let preview: String = self.content.chars().take(60).collect();
        format!("{}. {}...", self.id, preview)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub disciplines: i64,
    pub contents: i64,
    pub pda_blocks: i64,
}

pub struct Catalog {
    conn: Connection,
    source: String,
}

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_disciplines(
            field TEXT NOT NULL,
            discipline TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(field, discipline)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_contents(
            id INTEGER PRIMARY KEY,
            field TEXT NOT NULL,
            discipline TEXT NOT NULL,
            content_id TEXT NOT NULL,
            content TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalog_contents_key
         ON catalog_contents(field, discipline, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_pda(
            content_row INTEGER NOT NULL,
            grade TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY(content_row, grade),
            FOREIGN KEY(content_row) REFERENCES catalog_contents(id)
        )",
        [],
    )?;
    Ok(())
}

fn id_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn import_file(conn: &mut Connection, file: CatalogFile) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    for field in file.fields {
        if !project::is_formative_field(&field.name) {
            warn!("event=catalog_skip_field field={:?}", field.name);
            continue;
        }
        for (d_order, discipline) in field.disciplines.into_iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO catalog_disciplines(field, discipline, sort_order)
                 VALUES(?, ?, ?)",
                params![field.name, discipline.name, d_order as i64],
            )?;
            for (c_order, content) in discipline.contents.into_iter().enumerate() {
                tx.execute(
                    "INSERT INTO catalog_contents(field, discipline, content_id, content, sort_order)
                     VALUES(?, ?, ?, ?, ?)",
                    params![
                        field.name,
                        discipline.name,
                        id_text(&content.id),
                        content.content,
                        c_order as i64
                    ],
                )?;
                let row = tx.last_insert_rowid();
                for (grade, body) in content.pda {
                    tx.execute(
                        "INSERT OR REPLACE INTO catalog_pda(content_row, grade, body) VALUES(?, ?, ?)",
                        params![row, grade, body],
                    )?;
                }
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Splits a PDA block into trimmed, non-empty fragments.
pub fn split_fragments(block: &str) -> Vec<String> {
    block
        .split(PDA_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Catalog {
    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json_str(BUNDLED_CATALOG, BUNDLED_SOURCE)
    }

    pub fn from_json_str(raw: &str, source: &str) -> anyhow::Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(raw).context("catalog is not a valid catalog document")?;
        let mut conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        import_file(&mut conn, file).context("failed to import catalog")?;
        let catalog = Self {
            conn,
            source: source.to_string(),
        };
        let s = catalog.summary();
        info!(
            "event=catalog_loaded source={} disciplines={} contents={} pda_blocks={}",
            source, s.disciplines, s.contents, s.pda_blocks
        );
        Ok(catalog)
    }

    /// Opens a JSON catalog, or a prebuilt SQLite catalog for any other extension.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let source = path.to_string_lossy().to_string();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read catalog {}", source))?;
            return Self::from_json_str(&raw, &source);
        }

        if !path.is_file() {
            return Err(anyhow!("catalog not found: {}", source));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open catalog {}", source))?;
        for table in ["catalog_disciplines", "catalog_contents", "catalog_pda"] {
            let present: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                |r| r.get(0),
            )?;
            if present == 0 {
                return Err(anyhow!("catalog {} is missing table {}", source, table));
            }
        }
        info!("event=catalog_opened source={}", source);
        Ok(Self { conn, source })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn summary(&self) -> CatalogSummary {
        let count = |sql: &str| -> i64 {
            self.conn
                .query_row(sql, [], |r| r.get(0))
                .unwrap_or_default()
        };
        CatalogSummary {
            disciplines: count("SELECT COUNT(*) FROM catalog_disciplines"),
            contents: count("SELECT COUNT(*) FROM catalog_contents"),
            pda_blocks: count("SELECT COUNT(*) FROM catalog_pda"),
        }
    }

    pub fn list_disciplines(&self, field: &str) -> Vec<String> {
        self.query_disciplines(field).unwrap_or_else(|e| {
            warn!("event=catalog_query_failed op=list_disciplines error={}", e);
            Vec::new()
        })
    }

    fn query_disciplines(&self, field: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT discipline FROM catalog_disciplines
             WHERE field = ?
             ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([field], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_contents(&self, field: &str, discipline: &str) -> Vec<CatalogContent> {
        self.query_contents(field, discipline).unwrap_or_else(|e| {
            warn!("event=catalog_query_failed op=list_contents error={}", e);
            Vec::new()
        })
    }

    fn query_contents(
        &self,
        field: &str,
        discipline: &str,
    ) -> rusqlite::Result<Vec<CatalogContent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content_id, content FROM catalog_contents
             WHERE field = ? AND discipline = ?
             ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([field, discipline], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut pda_stmt = self
            .conn
            .prepare("SELECT grade, body FROM catalog_pda WHERE content_row = ? ORDER BY grade")?;
        let mut out = Vec::with_capacity(rows.len());
        for (row, id, content) in rows {
            let pda_by_grade = pda_stmt
                .query_map([row], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            out.push(CatalogContent {
                id,
                content,
                pda_by_grade,
            });
        }
        Ok(out)
    }

    /// PDA fragments of the first content matching `content` for the grade.
    pub fn lookup_pda_fragments(
        &self,
        field: &str,
        discipline: &str,
        content: &str,
        grade_digit: &str,
    ) -> Vec<String> {
        let block: rusqlite::Result<Option<String>> = self
            .conn
            .query_row(
                "SELECT p.body
                 FROM catalog_contents c
                 LEFT JOIN catalog_pda p ON p.content_row = c.id AND p.grade = ?4
                 WHERE c.field = ?1 AND c.discipline = ?2 AND c.content = ?3
                 ORDER BY c.sort_order
                 LIMIT 1",
                params![field, discipline, content, grade_digit],
                |r| r.get(0),
            )
            .optional()
            .map(Option::flatten);
        match block {
            Ok(Some(body)) => split_fragments(&body),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("event=catalog_query_failed op=lookup_pda error={}", e);
                Vec::new()
            }
        }
    }

    pub fn has_content(&self, field: &str, discipline: &str, content: &str) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM catalog_contents
                 WHERE field = ? AND discipline = ? AND content = ?
                 LIMIT 1",
                [field, discipline, content],
                |_| Ok(()),
            )
            .is_ok()
    }
}
