//! Types for the definer pipeline lens

use crate::artifacts::SchemaArtifacts;
use crate::lens::definer::{PatternMode, DEFAULT_REPLACEMENT_DEFINER, DEFAULT_SOURCE_DEFINER};
use crate::mysql::{GtidMode, DEFAULT_EXCLUDED_SCHEMAS};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Progress of one schema through the pipeline
///
/// Stages only ever advance, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaStage {
    Discovered,
    Dumped,
    ViewsSynthesized,
    Rewritten,
    Restored,
}

impl fmt::Display for SchemaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaStage::Discovered => "discovered",
            SchemaStage::Dumped => "dumped",
            SchemaStage::ViewsSynthesized => "views-synthesized",
            SchemaStage::Rewritten => "rewritten",
            SchemaStage::Restored => "restored",
        };
        write!(f, "{}", name)
    }
}

/// Outcome for one schema
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct SchemaReport {
    pub schema: String,
    pub stage: SchemaStage,
    pub gtid_mode: String,
    pub definers_replaced: usize,
    pub views_patched: usize,
    pub fixed_dump: String,
    pub views_file: String,
    pub backup: String,
}

impl SchemaReport {
    pub(crate) fn new(artifacts: &SchemaArtifacts) -> Self {
        Self {
            schema: artifacts.schema.clone(),
            stage: SchemaStage::Discovered,
            gtid_mode: String::new(),
            definers_replaced: 0,
            views_patched: 0,
            fixed_dump: artifacts.fixed.display().to_string(),
            views_file: artifacts.views.display().to_string(),
            backup: artifacts.backup.display().to_string(),
        }
    }

    pub(crate) fn set_gtid_mode(&mut self, mode: &GtidMode) {
        self.gtid_mode = mode.to_string();
    }
}

/// Settings for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding every generated file
    pub work_dir: PathBuf,
    pub source_definer: String,
    pub replacement_definer: String,
    pub pattern_mode: PatternMode,
    pub excluded_schemas: Vec<String>,
    /// When non-empty, only these schemas are processed
    pub only_schemas: Vec<String>,
    /// Require the replacement definer's user to exist before each schema
    pub check_account: bool,
    /// Replay the rewritten files; when false the run stops after rewriting
    pub restore: bool,
    /// Date stamped into views file names
    pub date: NaiveDate,
}

impl PipelineOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            source_definer: DEFAULT_SOURCE_DEFINER.to_string(),
            replacement_definer: DEFAULT_REPLACEMENT_DEFINER.to_string(),
            pattern_mode: PatternMode::Regex,
            excluded_schemas: DEFAULT_EXCLUDED_SCHEMAS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            only_schemas: Vec::new(),
            check_account: true,
            restore: true,
            date: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_definers(mut self, source: &str, replacement: &str, mode: PatternMode) -> Self {
        self.source_definer = source.to_string();
        self.replacement_definer = replacement.to_string();
        self.pattern_mode = mode;
        self
    }

    pub fn with_excluded_schemas(mut self, excluded: Vec<String>) -> Self {
        self.excluded_schemas = excluded;
        self
    }

    pub fn with_only_schemas(mut self, only: Vec<String>) -> Self {
        self.only_schemas = only;
        self
    }

    pub fn with_account_check(mut self, check: bool) -> Self {
        self.check_account = check;
        self
    }

    pub fn with_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }
}
