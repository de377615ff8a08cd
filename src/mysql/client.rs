//! `SchemaServer` backed by the `mysql` and `mysqldump` binaries

use crate::error::RedefinerError;
use crate::mysql::command::{capture_stdout, resolve_binary, stdin_from_file, stdout_to_file};
use crate::mysql::{ConnectionProfile, GtidMode, SchemaServer};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Flags for a DDL-only dump of routines, triggers and events
///
/// Equivalent to `-d -E -R -n -t --triggers --add-drop-trigger`.
pub const DUMP_FLAGS: [&str; 7] = [
    "--no-data",
    "--events",
    "--routines",
    "--no-create-db",
    "--no-create-info",
    "--triggers",
    "--add-drop-trigger",
];

/// Quote a string as a single-quoted SQL literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Query producing one `DROP TABLE IF EXISTS ...; CREATE OR REPLACE VIEW ...`
/// line per view of `schema`
pub fn views_query(schema: &str) -> String {
    format!(
        "SELECT CONCAT(\
         'DROP TABLE IF EXISTS `', REPLACE(TABLE_SCHEMA, '`', '``'), '`.`', REPLACE(TABLE_NAME, '`', '``'), '`; ', \
         'CREATE OR REPLACE VIEW `', REPLACE(TABLE_SCHEMA, '`', '``'), '`.`', REPLACE(TABLE_NAME, '`', '``'), '` AS ', \
         VIEW_DEFINITION, '; ') \
         FROM information_schema.VIEWS WHERE TABLE_SCHEMA = {} ORDER BY TABLE_NAME",
        quote_literal(schema)
    )
}

pub fn account_query(user: &str) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM mysql.user WHERE user = {})",
        quote_literal(user)
    )
}

/// Client for one server, reached through one credentials profile
#[derive(Debug, Clone)]
pub struct MysqlClient {
    mysql: PathBuf,
    mysqldump: PathBuf,
    profile: ConnectionProfile,
    /// Option file the profile came from, handed to the binaries as
    /// `--defaults-file` so no other option file can supply a password
    option_file: Option<PathBuf>,
    /// Passed through as `--defaults-group-suffix` so other options of the
    /// profile (TLS settings and the like) still apply
    group_suffix: Option<String>,
}

impl MysqlClient {
    pub fn new(
        mysql: PathBuf,
        mysqldump: PathBuf,
        profile: ConnectionProfile,
        group_suffix: Option<String>,
    ) -> Self {
        Self {
            mysql,
            mysqldump,
            profile,
            option_file: None,
            group_suffix: group_suffix.filter(|s| !s.is_empty()),
        }
    }

    /// Read client options from `path` only
    pub fn with_option_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.option_file = Some(path.into());
        self
    }

    /// Build a client, locating the binaries when no path is configured
    pub fn locate(
        mysql: Option<&Path>,
        mysqldump: Option<&Path>,
        profile: ConnectionProfile,
        group_suffix: Option<String>,
    ) -> Result<Self> {
        let mysql = resolve_binary("mysql", mysql)?;
        let mysqldump = resolve_binary("mysqldump", mysqldump)?;
        debug!(
            "using mysql at {} and mysqldump at {}",
            mysql.display(),
            mysqldump.display()
        );
        Ok(Self::new(mysql, mysqldump, profile, group_suffix))
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    fn base_command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        // must be the first argument
        if let Some(file) = &self.option_file {
            cmd.arg(format!("--defaults-file={}", file.display()));
        }
        if let Some(suffix) = &self.group_suffix {
            cmd.arg(format!("--defaults-group-suffix={}", suffix));
        }
        cmd.args(self.profile.client_args());
        if let Some((key, value)) = self.profile.password_env() {
            cmd.env(key, value);
        }
        cmd
    }

    /// `mysql -N -B -e <sql>`: tab-separated rows without a header
    fn query_command(&self, sql: &str) -> Command {
        let mut cmd = self.base_command(&self.mysql);
        cmd.args(["--skip-column-names", "--batch", "--execute"]).arg(sql);
        cmd
    }

    fn query(&self, sql: &str) -> Result<String> {
        capture_stdout(&mut self.query_command(sql))
    }

    pub(crate) fn dump_command(&self, schema: &str, gtid: &GtidMode) -> Command {
        let mut cmd = self.base_command(&self.mysqldump);
        cmd.args(DUMP_FLAGS);
        if gtid.suppress_gtid_purged() {
            cmd.arg("--set-gtid-purged=OFF");
        }
        cmd.arg("--").arg(schema);
        cmd
    }

    pub(crate) fn views_command(&self, schema: &str) -> Command {
        let mut cmd = self.base_command(&self.mysql);
        // raw mode keeps backslashes and newlines of view bodies unescaped
        cmd.args(["--skip-column-names", "--batch", "--silent", "--raw", "--execute"])
            .arg(views_query(schema));
        cmd
    }

    pub(crate) fn restore_command(&self, schema: &str) -> Command {
        let mut cmd = self.base_command(&self.mysql);
        cmd.arg(format!("--database={}", schema));
        cmd
    }
}

/// Interpret the single `0`/`1` cell returned by an `EXISTS` query
fn parse_exists(query: &str, output: &str) -> Result<bool> {
    match output.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(RedefinerError::UnexpectedOutput {
            query: query.to_string(),
            output: other.to_string(),
        }
        .into()),
    }
}

fn parse_schema_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl SchemaServer for MysqlClient {
    fn list_schemas(&self) -> Result<Vec<String>> {
        let output = self.query("SHOW DATABASES")?;
        Ok(parse_schema_list(&output))
    }

    fn gtid_mode(&self) -> Result<GtidMode> {
        let output = self.query("SELECT @@GLOBAL.GTID_MODE")?;
        Ok(GtidMode::parse(&output))
    }

    fn account_exists(&self, user: &str) -> Result<bool> {
        let sql = account_query(user);
        let output = self.query(&sql)?;
        parse_exists(&sql, &output)
    }

    fn dump_schema(&self, schema: &str, gtid: &GtidMode, dest: &Path) -> Result<()> {
        info!("dumping routines, triggers and events of {}", schema);
        stdout_to_file(&mut self.dump_command(schema, gtid), dest)
    }

    fn dump_views(&self, schema: &str, dest: &Path) -> Result<()> {
        info!("collecting view definitions of {}", schema);
        stdout_to_file(&mut self.views_command(schema), dest)
    }

    fn restore(&self, schema: &str, source: &Path) -> Result<()> {
        info!("restoring {} from {}", schema, source.display());
        stdin_from_file(&mut self.restore_command(schema), source)
    }
}
