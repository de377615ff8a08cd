use crate::lens::definer::{DEFAULT_REPLACEMENT_DEFINER, DEFAULT_SOURCE_DEFINER};
use crate::lens::pipeline::PipelineOptions;
use crate::mysql::DEFAULT_EXCLUDED_SCHEMAS;
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedefinerConfig {
    /// File the configuration was read from
    pub config_file: PathBuf,

    /// Explicit `mysql` binary; searched for when unset
    pub mysql_path: Option<PathBuf>,

    /// Explicit `mysqldump` binary; searched for when unset
    pub mysqldump_path: Option<PathBuf>,

    /// MySQL option file holding the connection profiles
    pub my_cnf_path: PathBuf,

    /// Selects the `[client<suffix>]` profile
    pub defaults_group_suffix: String,

    pub source_definer: String,

    pub replacement_definer: String,

    pub excluded_schemas: Vec<String>,

    /// Directory for dumps, backups and views files
    pub work_dir: PathBuf,
}

const EMPTY_CONFIG: &str = r#"### redefiner configuration file

### client binaries, searched for in PATH when not set
# mysql_path = "/usr/local/bin/mysql"
# mysqldump_path = "/usr/local/bin/mysqldump"

### option file with the [client<suffix>] connection profiles
# my_cnf_path = "~/.my.cnf"
# defaults_group_suffix = "_primary1"

### definer matched in dumps (regular expression) and its replacement
# source_definer = "`[^`]+`@`[^`]+`"
# replacement_definer = "`flyway`@`%`"

### comma-separated schemas that are never processed
# excluded_schemas = "mysql,information_schema,performance_schema,sys"

### directory holding generated dump and views files
# work_dir = "."
"#;

impl Default for RedefinerConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_file: PathBuf::from(Self::config_file_path()),
            mysql_path: None,
            mysqldump_path: None,
            my_cnf_path: home.join(".my.cnf"),
            defaults_group_suffix: String::new(),
            source_definer: DEFAULT_SOURCE_DEFINER.to_string(),
            replacement_definer: DEFAULT_REPLACEMENT_DEFINER.to_string(),
            excluded_schemas: DEFAULT_EXCLUDED_SCHEMAS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            work_dir: PathBuf::from("."),
        }
    }
}

impl RedefinerConfig {
    /// Load the configuration file plus `REDEFINER_*` environment overrides
    ///
    /// Without an explicit path `~/.redefiner/redefiner.toml` is used. A
    /// missing file is created from a commented template.
    pub fn new(path: &Option<String>) -> Result<RedefinerConfig> {
        let home = dirs::home_dir();
        let mut builder = Config::builder();

        let file = match path {
            Some(p) => PathBuf::from(p),
            None => {
                let home = home
                    .as_ref()
                    .ok_or_else(|| anyhow!("Could not find home directory"))?;
                let dir = home.join(".redefiner");
                std::fs::create_dir_all(&dir)
                    .map_err(|e| anyhow!("Unable to create redefiner directory: {}", e))?;
                dir.join("redefiner.toml")
            }
        };

        if file.exists() {
            let file_str = file
                .to_str()
                .ok_or_else(|| anyhow!("Could not convert path to string"))?;
            builder = builder.add_source(config::File::new(file_str, config::FileFormat::Toml));
        } else {
            std::fs::write(&file, EMPTY_CONFIG).map_err(|e| {
                anyhow!("Unable to create config file {}: {}", file.display(), e)
            })?;
        }

        // e.g. `REDEFINER_WORK_DIR=/var/tmp/redefiner redefiner run`
        builder = builder.add_source(config::Environment::with_prefix("REDEFINER"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let mut config = Self::from_settings(&config, home.as_deref());
        config.config_file = file;
        Ok(config)
    }

    /// Build a configuration from flat key/value settings
    ///
    /// Unknown keys are ignored and missing keys take their defaults.
    pub fn from_settings(settings: &HashMap<String, String>, home: Option<&Path>) -> Self {
        let defaults = RedefinerConfig::default();
        let path = |key: &str| {
            settings
                .get(key)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| expand_home(s, home))
        };
        let text = |key: &str, default: String| {
            settings
                .get(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
        };

        let excluded_schemas = match settings.get("excluded_schemas") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.excluded_schemas,
        };

        RedefinerConfig {
            config_file: defaults.config_file,
            mysql_path: path("mysql_path"),
            mysqldump_path: path("mysqldump_path"),
            my_cnf_path: path("my_cnf_path").unwrap_or(defaults.my_cnf_path),
            // the suffix may legitimately be empty, so it is taken verbatim
            defaults_group_suffix: settings
                .get("defaults_group_suffix")
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            source_definer: text("source_definer", defaults.source_definer),
            replacement_definer: text("replacement_definer", defaults.replacement_definer),
            excluded_schemas,
            work_dir: path("work_dir").unwrap_or(defaults.work_dir),
        }
    }

    /// Pipeline options seeded from this configuration
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::new(self.work_dir.clone())
            .with_definers(
                &self.source_definer,
                &self.replacement_definer,
                Default::default(),
            )
            .with_excluded_schemas(self.excluded_schemas.clone())
    }

    /// Key/value view of the effective configuration
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let binary = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(search PATH)".to_string())
        };
        vec![
            ("config_file", self.config_file.display().to_string()),
            ("mysql_path", binary(&self.mysql_path)),
            ("mysqldump_path", binary(&self.mysqldump_path)),
            ("my_cnf_path", self.my_cnf_path.display().to_string()),
            ("defaults_group_suffix", self.defaults_group_suffix.clone()),
            ("source_definer", self.source_definer.clone()),
            ("replacement_definer", self.replacement_definer.clone()),
            ("excluded_schemas", self.excluded_schemas.join(",")),
            ("work_dir", self.work_dir.display().to_string()),
        ]
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(key, value)| format!("{:<22} {}", format!("{}:", key), value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get the default config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.redefiner/redefiner.toml", home_dir)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RedefinerConfig::default();
        assert_eq!(config.source_definer, "`[^`]+`@`[^`]+`");
        assert_eq!(config.replacement_definer, "`flyway`@`%`");
        assert_eq!(config.defaults_group_suffix, "");
        assert_eq!(config.work_dir, PathBuf::from("."));
        assert_eq!(config.excluded_schemas.len(), 4);
        assert!(config.my_cnf_path.ends_with(".my.cnf"));
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/dba");
        assert_eq!(expand_home("~/.my.cnf", Some(home)), PathBuf::from("/home/dba/.my.cnf"));
        assert_eq!(expand_home("~", Some(home)), PathBuf::from("/home/dba"));
        assert_eq!(expand_home("/etc/my.cnf", Some(home)), PathBuf::from("/etc/my.cnf"));
        assert_eq!(expand_home("~other/x", Some(home)), PathBuf::from("~other/x"));
        assert_eq!(expand_home("~/.my.cnf", None), PathBuf::from("~/.my.cnf"));
    }

    #[test]
    fn test_from_settings() {
        let config = RedefinerConfig::from_settings(
            &settings(&[
                ("my_cnf_path", "~/secrets/my.cnf"),
                ("defaults_group_suffix", "_primary1"),
                ("replacement_definer", "`svc_deploy`@`%`"),
                ("excluded_schemas", "mysql, sys ,,scratch"),
                ("work_dir", "/var/tmp/redefiner"),
                ("mysql_path", ""),
                ("unrelated", "ignored"),
            ]),
            Some(Path::new("/home/dba")),
        );

        assert_eq!(config.my_cnf_path, PathBuf::from("/home/dba/secrets/my.cnf"));
        assert_eq!(config.defaults_group_suffix, "_primary1");
        assert_eq!(config.source_definer, DEFAULT_SOURCE_DEFINER);
        assert_eq!(config.replacement_definer, "`svc_deploy`@`%`");
        assert_eq!(config.excluded_schemas, vec!["mysql", "sys", "scratch"]);
        assert_eq!(config.work_dir, PathBuf::from("/var/tmp/redefiner"));
        assert_eq!(config.mysql_path, None);
    }

    #[test]
    fn test_empty_exclusion_list_disables_exclusions() {
        let config = RedefinerConfig::from_settings(&settings(&[("excluded_schemas", "")]), None);
        assert!(config.excluded_schemas.is_empty());
    }

    #[test]
    fn test_new_creates_template_then_reads_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("redefiner.toml");
        let path_str = Some(path.to_string_lossy().to_string());

        // first call writes the commented template and uses defaults
        let config = RedefinerConfig::new(&path_str).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_file, path);
        assert_eq!(config.replacement_definer, DEFAULT_REPLACEMENT_DEFINER);

        std::fs::write(
            &path,
            "replacement_definer = \"`deployer`@`10.%`\"\nwork_dir = \"/srv/dumps\"\n",
        )
        .unwrap();
        let config = RedefinerConfig::new(&path_str).unwrap();
        assert_eq!(config.replacement_definer, "`deployer`@`10.%`");
        assert_eq!(config.work_dir, PathBuf::from("/srv/dumps"));
    }

    #[test]
    fn test_pipeline_options_from_config() {
        let config = RedefinerConfig::from_settings(
            &settings(&[("excluded_schemas", "mysql"), ("work_dir", "/tmp/x")]),
            None,
        );
        let options = config.pipeline_options();
        assert_eq!(options.work_dir, PathBuf::from("/tmp/x"));
        assert_eq!(options.excluded_schemas, vec!["mysql"]);
        assert_eq!(options.replacement_definer, "`flyway`@`%`");
    }

    #[test]
    fn test_summary_lists_every_key() {
        let summary = RedefinerConfig::default().summary();
        for key in ["mysql_path", "my_cnf_path", "excluded_schemas", "work_dir"] {
            assert!(summary.contains(key), "missing {}", key);
        }
        assert!(summary.contains("(search PATH)"));
    }
}
