//! Definer pipeline lens
//!
//! Drives every eligible schema of a server through the same sequence:
//!
//! ```text
//! discovered -> dumped -> views-synthesized -> rewritten -> restored
//! ```
//!
//! Schemas are processed one at a time in server order, and the first failure
//! stops the run. Files written for a failed schema stay on disk for
//! inspection.

mod types;

pub use types::{PipelineOptions, SchemaReport, SchemaStage};

use crate::artifacts::{backup_path, find_views_file, SchemaArtifacts};
use crate::error::RedefinerError;
use crate::lens::definer::DefinerRewriter;
use crate::mysql::{filter_schemas, SchemaServer};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Runs the dump, rewrite and restore sequence against a [`SchemaServer`]
pub struct PipelineLens<'a, S: SchemaServer> {
    server: &'a S,
    options: PipelineOptions,
    rewriter: DefinerRewriter,
}

impl<'a, S: SchemaServer> PipelineLens<'a, S> {
    /// Create a pipeline; fails when the definers are empty or malformed
    pub fn new(server: &'a S, options: PipelineOptions) -> Result<Self> {
        let rewriter = DefinerRewriter::new(
            &options.source_definer,
            &options.replacement_definer,
            options.pattern_mode,
        )?;
        Ok(Self {
            server,
            options,
            rewriter,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn artifacts(&self, schema: &str) -> SchemaArtifacts {
        SchemaArtifacts::new(&self.options.work_dir, schema, self.options.date)
    }

    /// Schemas the run would process, in server order
    pub fn discover(&self) -> Result<Vec<String>> {
        let all = self
            .server
            .list_schemas()
            .context("Failed to list schemas")?;
        let eligible = filter_schemas(all, &self.options.excluded_schemas);

        if self.options.only_schemas.is_empty() {
            return Ok(eligible);
        }

        for wanted in &self.options.only_schemas {
            if !eligible.contains(wanted) {
                return Err(anyhow!(
                    "schema '{}' does not exist on the server or is excluded",
                    wanted
                ));
            }
        }
        Ok(eligible
            .into_iter()
            .filter(|schema| self.options.only_schemas.contains(schema))
            .collect())
    }

    /// Process every discovered schema, stopping at the first failure
    pub fn run(&self) -> Result<Vec<SchemaReport>> {
        let schemas = self.discover()?;
        info!(
            "processing {} schema(s) in {}",
            schemas.len(),
            self.options.work_dir.display()
        );

        let mut reports = Vec::with_capacity(schemas.len());
        for schema in &schemas {
            let report = self
                .process_schema(schema)
                .with_context(|| format!("Failed to process schema '{}'", schema))?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Run the full sequence for one schema
    pub fn process_schema(&self, schema: &str) -> Result<SchemaReport> {
        let artifacts = self.artifacts(schema);
        self.execute(&artifacts, &artifacts.dump, &artifacts.fixed)
    }

    /// Like [`process_schema`](Self::process_schema), but the definers of
    /// `input` are rewritten into `output` instead of the fresh dump
    ///
    /// The backup is taken of `input`.
    pub fn rename(&self, schema: &str, input: &Path, output: &Path) -> Result<SchemaReport> {
        let artifacts = self.artifacts(schema);
        let mut report = self.execute(&artifacts, input, output)?;
        report.fixed_dump = output.display().to_string();
        report.backup = backup_path(input).display().to_string();
        Ok(report)
    }

    fn ensure_account(&self) -> Result<()> {
        let user = &self.rewriter.replacement().user;
        if self.server.account_exists(user)? {
            debug!("account {} exists", user);
            Ok(())
        } else {
            Err(RedefinerError::MissingAccount { user: user.clone() }.into())
        }
    }

    fn advance(report: &mut SchemaReport, stage: SchemaStage) {
        debug!("{}: {} -> {}", report.schema, report.stage, stage);
        report.stage = stage;
    }

    /// `input` is the dump whose definers are rewritten into `output`
    fn execute(
        &self,
        artifacts: &SchemaArtifacts,
        input: &Path,
        output: &Path,
    ) -> Result<SchemaReport> {
        let schema = artifacts.schema.as_str();
        let mut report = SchemaReport::new(artifacts);

        if self.options.check_account {
            self.ensure_account()?;
        }

        let gtid = self.server.gtid_mode()?;
        report.set_gtid_mode(&gtid);
        self.server.dump_schema(schema, &gtid, &artifacts.dump)?;
        Self::advance(&mut report, SchemaStage::Dumped);

        self.server.dump_views(schema, &artifacts.views)?;
        Self::advance(&mut report, SchemaStage::ViewsSynthesized);

        report.views_patched = self.rewriter.rewrite_views_file(&artifacts.views)?;
        report.definers_replaced =
            self.rewriter
                .rewrite_dump_file(input, &backup_path(input), output)?;
        Self::advance(&mut report, SchemaStage::Rewritten);

        let views = find_views_file(&self.options.work_dir, schema)?;

        if !self.options.restore {
            info!("{}: rewritten, restore skipped", schema);
            return Ok(report);
        }

        for file in [output, views.as_path()] {
            self.server.restore(schema, file)?;
        }
        Self::advance(&mut report, SchemaStage::Restored);
        info!(
            "{}: restored {} definer(s) and {} view(s)",
            schema, report.definers_replaced, report.views_patched
        );
        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mysql::GtidMode;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const DUMP: &str = "/*!50003 CREATE*/ /*!50020 DEFINER=`root`@`%`*/ /*!50003 PROCEDURE `p`() SELECT 1 */;;\n\
/*!50003 CREATE*/ /*!50017 DEFINER=`admin`@`localhost`*/ /*!50003 TRIGGER `t` BEFORE INSERT ON `x` FOR EACH ROW SET NEW.a = 1 */;;\n";

    const VIEWS: &str =
        "DROP TABLE IF EXISTS `app_db`.`v`; CREATE OR REPLACE VIEW `app_db`.`v` AS select 1 AS `one`; \n";

    struct FakeServer {
        schemas: Vec<String>,
        gtid: GtidMode,
        account: bool,
        fail_dump_of: Option<String>,
        calls: RefCell<Vec<String>>,
        restored: RefCell<Vec<(String, String)>>,
    }

    impl FakeServer {
        fn new(schemas: &[&str]) -> Self {
            Self {
                schemas: schemas.iter().map(|s| s.to_string()).collect(),
                gtid: GtidMode::Off,
                account: true,
                fail_dump_of: None,
                calls: RefCell::new(Vec::new()),
                restored: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl SchemaServer for FakeServer {
        fn list_schemas(&self) -> Result<Vec<String>> {
            self.calls.borrow_mut().push("list".to_string());
            Ok(self.schemas.clone())
        }

        fn gtid_mode(&self) -> Result<GtidMode> {
            self.calls.borrow_mut().push("gtid".to_string());
            Ok(self.gtid.clone())
        }

        fn account_exists(&self, user: &str) -> Result<bool> {
            self.calls.borrow_mut().push(format!("account {}", user));
            Ok(self.account)
        }

        fn dump_schema(&self, schema: &str, gtid: &GtidMode, dest: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("dump {} gtid={}", schema, gtid));
            if self.fail_dump_of.as_deref() == Some(schema) {
                return Err(RedefinerError::CommandFailed {
                    program: "mysqldump".to_string(),
                    status: "exit status: 2".to_string(),
                    stderr: "Access denied".to_string(),
                }
                .into());
            }
            std::fs::write(dest, DUMP)?;
            Ok(())
        }

        fn dump_views(&self, schema: &str, dest: &Path) -> Result<()> {
            self.calls.borrow_mut().push(format!("views {}", schema));
            std::fs::write(dest, VIEWS.replace("app_db", schema))?;
            Ok(())
        }

        fn restore(&self, schema: &str, source: &Path) -> Result<()> {
            self.calls.borrow_mut().push(format!("restore {}", schema));
            let content = std::fs::read_to_string(source)?;
            self.restored
                .borrow_mut()
                .push((schema.to_string(), content));
            Ok(())
        }
    }

    fn options(dir: &TempDir) -> PipelineOptions {
        PipelineOptions::new(dir.path()).with_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    #[test]
    fn test_end_to_end_single_schema() {
        let dir = TempDir::new().unwrap();
        let server = FakeServer::new(&["mysql", "app_db", "sys"]);
        let lens = PipelineLens::new(&server, options(&dir)).unwrap();

        let reports = lens.run().unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.schema, "app_db");
        assert_eq!(report.stage, SchemaStage::Restored);
        assert_eq!(report.gtid_mode, "OFF");
        assert_eq!(report.definers_replaced, 2);
        assert_eq!(report.views_patched, 1);

        assert_eq!(
            server.calls(),
            vec![
                "list",
                "account flyway",
                "gtid",
                "dump app_db gtid=OFF",
                "views app_db",
                "restore app_db",
                "restore app_db",
            ]
        );

        // fixed dump first, then the views
        let restored = server.restored.borrow();
        assert!(restored[0].1.contains("DEFINER=`flyway`@`%`"));
        assert!(!restored[0].1.contains("`root`@`%`"));
        assert!(!restored[0].1.contains("`admin`@`localhost`"));
        assert!(restored[1]
            .1
            .contains("CREATE OR REPLACE DEFINER = `flyway`@`%` VIEW `app_db`.`v`"));

        for name in [
            "app_db_dump.sql",
            "app_db_dump_backup.sql",
            "app_db_dump-fixed.sql",
            "views_app_db-2024-03-09.sql",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {}", name);
        }
        assert!(!dir.path().join("sys_dump.sql").exists());

        let backup = std::fs::read_to_string(dir.path().join("app_db_dump_backup.sql")).unwrap();
        assert_eq!(backup, DUMP);
    }

    #[test]
    fn test_gtid_mode_forwarded_to_dump() {
        let dir = TempDir::new().unwrap();
        let mut server = FakeServer::new(&["app_db"]);
        server.gtid = GtidMode::Enabled("ON".to_string());
        let lens = PipelineLens::new(&server, options(&dir)).unwrap();

        let reports = lens.run().unwrap();
        assert_eq!(reports[0].gtid_mode, "ON");
        assert!(server.calls().contains(&"dump app_db gtid=ON".to_string()));
    }

    #[test]
    fn test_first_failure_stops_run() {
        let dir = TempDir::new().unwrap();
        let mut server = FakeServer::new(&["alpha", "beta", "gamma"]);
        server.fail_dump_of = Some("beta".to_string());
        let lens = PipelineLens::new(&server, options(&dir)).unwrap();

        let err = lens.run().unwrap_err();
        assert!(err.to_string().contains("Failed to process schema 'beta'"));
        assert!(matches!(
            err.root_cause().downcast_ref::<RedefinerError>(),
            Some(RedefinerError::CommandFailed { .. })
        ));

        let calls = server.calls();
        assert!(calls.contains(&"restore alpha".to_string()));
        assert!(!calls.iter().any(|c| c.contains("gamma")));
        assert!(!calls.contains(&"views beta".to_string()));
    }

    #[test]
    fn test_missing_account_aborts_before_dump() {
        let dir = TempDir::new().unwrap();
        let mut server = FakeServer::new(&["app_db"]);
        server.account = false;
        let lens = PipelineLens::new(&server, options(&dir)).unwrap();

        let err = lens.run().unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<RedefinerError>(),
            Some(RedefinerError::MissingAccount { user }) if user == "flyway"
        ));
        assert!(!server.calls().iter().any(|c| c.starts_with("dump")));
    }

    #[test]
    fn test_account_check_can_be_skipped() {
        let dir = TempDir::new().unwrap();
        let mut server = FakeServer::new(&["app_db"]);
        server.account = false;
        let lens = PipelineLens::new(&server, options(&dir).with_account_check(false)).unwrap();

        let reports = lens.run().unwrap();
        assert_eq!(reports[0].stage, SchemaStage::Restored);
        assert!(!server.calls().iter().any(|c| c.starts_with("account")));
    }

    #[test]
    fn test_without_restore_stops_after_rewrite() {
        let dir = TempDir::new().unwrap();
        let server = FakeServer::new(&["app_db"]);
        let lens = PipelineLens::new(&server, options(&dir).with_restore(false)).unwrap();

        let reports = lens.run().unwrap();
        assert_eq!(reports[0].stage, SchemaStage::Rewritten);
        assert!(server.restored.borrow().is_empty());
        assert!(dir.path().join("app_db_dump-fixed.sql").exists());
    }

    #[test]
    fn test_stale_views_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("views_app_db-2024-03-08.sql"), VIEWS).unwrap();
        let server = FakeServer::new(&["app_db"]);
        let lens = PipelineLens::new(&server, options(&dir)).unwrap();

        let err = lens.run().unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<RedefinerError>(),
            Some(RedefinerError::MultipleViewsFiles { matches, .. }) if matches.len() == 2
        ));
        assert!(server.restored.borrow().is_empty());
    }

    #[test]
    fn test_only_schemas() {
        let dir = TempDir::new().unwrap();
        let server = FakeServer::new(&["alpha", "beta", "gamma", "mysql"]);

        let lens = PipelineLens::new(
            &server,
            options(&dir).with_only_schemas(vec!["gamma".to_string(), "alpha".to_string()]),
        )
        .unwrap();
        assert_eq!(lens.discover().unwrap(), vec!["alpha", "gamma"]);

        let lens = PipelineLens::new(
            &server,
            options(&dir).with_only_schemas(vec!["mysql".to_string()]),
        )
        .unwrap();
        let err = lens.discover().unwrap_err();
        assert!(err.to_string().contains("schema 'mysql'"));
    }

    #[test]
    fn test_custom_exclusions() {
        let dir = TempDir::new().unwrap();
        let server = FakeServer::new(&["mysql", "app_db", "scratch"]);
        let lens = PipelineLens::new(
            &server,
            options(&dir).with_excluded_schemas(vec!["scratch".to_string()]),
        )
        .unwrap();
        assert_eq!(lens.discover().unwrap(), vec!["mysql", "app_db"]);
    }

    #[test]
    fn test_rename_existing_dump() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("edited.sql");
        let output = dir.path().join("edited-fixed.sql");
        std::fs::write(&input, DUMP.replace("PROCEDURE `p`", "PROCEDURE `q`")).unwrap();

        let server = FakeServer::new(&["char_test_db"]);
        let lens = PipelineLens::new(
            &server,
            options(&dir)
                .with_definers("`root`@`%`", "`app`@`%`", crate::lens::definer::PatternMode::Literal)
                .with_restore(false),
        )
        .unwrap();

        let report = lens.rename("char_test_db", &input, &output).unwrap();
        assert_eq!(report.definers_replaced, 1);
        assert_eq!(report.fixed_dump, output.display().to_string());
        assert_eq!(
            PathBuf::from(&report.backup),
            dir.path().join("edited_backup.sql")
        );

        let fixed = std::fs::read_to_string(&output).unwrap();
        assert!(fixed.contains("DEFINER=`app`@`%`"));
        assert!(fixed.contains("DEFINER=`admin`@`localhost`"));
        assert!(fixed.contains("PROCEDURE `q`"));
        // the fresh dump is taken but left as it is
        assert!(dir.path().join("char_test_db_dump.sql").exists());
        assert!(!dir.path().join("char_test_db_dump_backup.sql").exists());
        assert!(server.calls().contains(&"account app".to_string()));
    }

    #[test]
    fn test_invalid_replacement_rejected() {
        let dir = TempDir::new().unwrap();
        let server = FakeServer::new(&["app_db"]);
        let result = PipelineLens::new(
            &server,
            options(&dir).with_definers(
                crate::lens::definer::DEFAULT_SOURCE_DEFINER,
                "flyway",
                crate::lens::definer::PatternMode::Regex,
            ),
        );
        assert!(result.is_err());
    }
}
