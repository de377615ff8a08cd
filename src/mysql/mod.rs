//! MySQL server access
//!
//! All database interaction goes through the stock `mysql` and `mysqldump`
//! binaries; this crate never speaks the wire protocol.
//!
//! ```text
//! mysql/
//! ├── credentials  # option-file (~/.my.cnf) profile resolution
//! ├── command      # argument-vector process execution, binary lookup
//! └── client       # MysqlClient: the SchemaServer backed by the binaries
//! ```
//!
//! The [`SchemaServer`] trait is the seam between the pipeline and the server:
//! every stage that touches the database is one method on it.

pub mod client;
pub mod command;
pub mod credentials;

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub use client::{quote_literal, MysqlClient};
pub use credentials::ConnectionProfile;

/// Schemas that are never processed unless configured otherwise
pub const DEFAULT_EXCLUDED_SCHEMAS: [&str; 4] =
    ["mysql", "information_schema", "performance_schema", "sys"];

/// Value of `@@GLOBAL.GTID_MODE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GtidMode {
    Off,
    /// Any mode other than `OFF` (`ON`, `ON_PERMISSIVE`, `OFF_PERMISSIVE`)
    Enabled(String),
}

impl GtidMode {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("OFF") {
            GtidMode::Off
        } else {
            GtidMode::Enabled(raw.to_string())
        }
    }

    /// Whether dumps must carry `--set-gtid-purged=OFF`
    pub fn suppress_gtid_purged(&self) -> bool {
        !matches!(self, GtidMode::Off)
    }
}

impl fmt::Display for GtidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GtidMode::Off => write!(f, "OFF"),
            GtidMode::Enabled(mode) => write!(f, "{}", mode),
        }
    }
}

/// Operations the definer pipeline needs from a server
pub trait SchemaServer {
    /// All schema names, in server order
    fn list_schemas(&self) -> Result<Vec<String>>;

    fn gtid_mode(&self) -> Result<GtidMode>;

    /// Whether an account named `user` exists in `mysql.user`
    fn account_exists(&self, user: &str) -> Result<bool>;

    /// DDL-only dump of routines, triggers and events of `schema` into `dest`
    fn dump_schema(&self, schema: &str, gtid: &GtidMode, dest: &Path) -> Result<()>;

    /// `DROP TABLE IF EXISTS ...; CREATE OR REPLACE VIEW ...` statements for
    /// every view of `schema`, written to `dest`
    fn dump_views(&self, schema: &str, dest: &Path) -> Result<()>;

    /// Replay the SQL file `source` into `schema`
    fn restore(&self, schema: &str, source: &Path) -> Result<()>;
}

/// Drop excluded schemas, keeping server order
pub fn filter_schemas(all: Vec<String>, excluded: &[String]) -> Vec<String> {
    all.into_iter()
        .filter(|schema| !excluded.iter().any(|e| e == schema))
        .collect()
}
