//! On-disk artifacts produced for each schema
//!
//! All files live in a single working directory and are named from the schema:
//!
//! | Artifact    | Name                                |
//! |-------------|-------------------------------------|
//! | dump        | `<schema>_dump.sql`                 |
//! | backup      | `<schema>_dump_backup.sql`          |
//! | fixed dump  | `<schema>_dump-fixed.sql`           |
//! | views       | `views_<schema>-<YYYY-MM-DD>.sql`   |
//!
//! Files are written to a temporary sibling and renamed into place, so a file
//! either holds its previous content or the complete new content.

use crate::error::RedefinerError;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Paths of every artifact for one schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaArtifacts {
    pub schema: String,
    pub dump: PathBuf,
    pub backup: PathBuf,
    pub fixed: PathBuf,
    pub views: PathBuf,
}

impl SchemaArtifacts {
    pub fn new(work_dir: &Path, schema: &str, date: NaiveDate) -> Self {
        let dump = work_dir.join(format!("{}_dump.sql", schema));
        Self {
            schema: schema.to_string(),
            backup: backup_path(&dump),
            fixed: work_dir.join(format!("{}_dump-fixed.sql", schema)),
            views: work_dir.join(views_file_name(schema, date)),
            dump,
        }
    }
}

pub fn views_file_name(schema: &str, date: NaiveDate) -> String {
    format!("views_{}-{}.sql", schema, date.format("%Y-%m-%d"))
}

/// Glob-style pattern naming every views file of a schema, for messages
pub fn views_file_pattern(schema: &str) -> String {
    format!("views_{}-*.sql", schema)
}

/// Backup path for a dump: `dir/name.sql` becomes `dir/name_backup.sql`
pub fn backup_path(dump: &Path) -> PathBuf {
    let stem = dump
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    dump.with_file_name(format!("{}_backup.sql", stem))
}

/// Date of a views file name belonging to `schema`, if it is one
///
/// The part after `views_<schema>-` must be exactly `YYYY-MM-DD.sql`, so a
/// schema whose name continues with `-...` never matches a shorter schema.
pub fn views_file_date(name: &str, schema: &str) -> Option<NaiveDate> {
    let date = name
        .strip_prefix("views_")?
        .strip_prefix(schema)?
        .strip_prefix('-')?
        .strip_suffix(".sql")?;
    if date.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Find the single views file of `schema` in `dir`
///
/// Zero matches and several matches (for instance a file left over from an
/// earlier day) are both errors; the latter lists every match.
pub fn find_views_file(dir: &Path, schema: &str) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .map_err(|e| anyhow!("Unable to list directory {}: {}", dir.display(), e))?;

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| anyhow!("Unable to list directory {}: {}", dir.display(), e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if views_file_date(&name, schema).is_some() && entry.path().is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();

    let pattern = views_file_pattern(schema);
    match matches.len() {
        0 => Err(RedefinerError::NoViewsFile { pattern }.into()),
        1 => Ok(matches.remove(0)),
        _ => Err(RedefinerError::MultipleViewsFiles { pattern, matches }.into()),
    }
}

/// Create a temporary file in the same directory as `path`
pub(crate) fn temp_file_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".redefiner-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| anyhow!("Unable to create temporary file in {}: {}", dir.display(), e))
}

/// Replace the content of `path` with `contents` via write-then-rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = temp_file_beside(path)?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| anyhow!("Unable to write {}: {}", path.display(), e))?;
    tmp.persist(path)
        .map_err(|e| anyhow!("Unable to write {}: {}", path.display(), e.error))?;
    Ok(())
}
