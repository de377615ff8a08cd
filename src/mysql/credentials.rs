//! Credential resolution from a MySQL option file
//!
//! The option file (`~/.my.cnf` by default) is INI-shaped. A profile is the
//! section `client<suffix>`, so a suffix of `_primary1` selects
//! `[client_primary1]` and an empty suffix selects `[client]`.

use crate::error::RedefinerError;
use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Environment variable the MySQL client binaries read the password from
pub const PASSWORD_ENV: &str = "MYSQL_PWD";

/// Connection credentials for one option-file profile
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionProfile {
    /// Option-file section the profile was read from
    pub section: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// `socket` in the option file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_socket: Option<String>,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("section", &self.section)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("unix_socket", &self.unix_socket)
            .finish()
    }
}

impl ConnectionProfile {
    /// Section name for a defaults-group suffix
    pub fn section_name(suffix: &str) -> String {
        format!("client{}", suffix)
    }

    /// Read the profile selected by `suffix` from the option file at `path`
    pub fn load(path: &Path, suffix: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            anyhow!(
                "Unable to read credentials file {}: {}",
                path.display(),
                e
            )
        })?;

        let mut sections = parse_option_file(&text)?;
        let section = Self::section_name(suffix);
        let entries = sections
            .remove(&section)
            .ok_or_else(|| RedefinerError::MissingProfile {
                section: section.clone(),
                path: path.to_path_buf(),
            })?;

        Self::from_entries(section, entries)
    }

    fn from_entries(section: String, entries: HashMap<String, String>) -> Result<Self> {
        let mut profile = ConnectionProfile {
            section,
            ..Default::default()
        };

        for (key, value) in entries {
            match key.to_lowercase().as_str() {
                "user" => profile.user = value,
                "password" => profile.password = Some(strip_quotes(&value).to_string()),
                "host" => profile.host = Some(value),
                "port" => {
                    let port = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| anyhow!("Invalid port '{}': {}", value, e))?;
                    profile.port = Some(port);
                }
                "socket" => profile.unix_socket = Some(value),
                _ => {}
            }
        }

        if profile.user.is_empty() {
            return Err(RedefinerError::MissingCredential {
                section: profile.section,
                key: "user".to_string(),
            }
            .into());
        }

        Ok(profile)
    }

    /// Command-line arguments selecting this profile's account and endpoint
    ///
    /// The password is deliberately absent, see [`ConnectionProfile::password_env`].
    pub fn client_args(&self) -> Vec<String> {
        let mut args = vec![format!("--user={}", self.user)];
        if let Some(host) = &self.host {
            args.push(format!("--host={}", host));
        }
        if let Some(port) = self.port {
            args.push(format!("--port={}", port));
        }
        if let Some(socket) = &self.unix_socket {
            args.push(format!("--socket={}", socket));
        }
        args
    }

    /// Environment entry carrying the password to a client process
    pub fn password_env(&self) -> Option<(&'static str, &str)> {
        self.password.as_deref().map(|p| (PASSWORD_ENV, p))
    }
}

/// Strip one pair of matching surrounding quotes
fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse option-file text into `section -> key -> value`
///
/// MySQL option files allow lines the INI reader rejects (`!include`
/// directives, bare boolean flags such as `skip-column-names`); those lines
/// never carry credentials and are dropped before parsing.
fn parse_option_file(text: &str) -> Result<HashMap<String, HashMap<String, String>>> {
    let filtered = text
        .lines()
        .filter(|line| {
            let line = line.trim();
            line.is_empty()
                || line.starts_with('[')
                || line.starts_with('#')
                || line.starts_with(';')
                || (line.contains('=') && !line.starts_with('!'))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let settings = Config::builder()
        .add_source(File::from_str(&filtered, FileFormat::Ini))
        .build()
        .map_err(|e| anyhow!("Failed to parse credentials file: {}", e))?;

    let raw = settings
        .try_deserialize::<HashMap<String, Value>>()
        .map_err(|e| anyhow!("Failed to read credentials file sections: {}", e))?;

    let mut sections = HashMap::new();
    for (name, value) in raw {
        // keys outside of any section come through as plain values
        let Ok(table) = value.into_table() else {
            continue;
        };
        let mut entries = HashMap::new();
        for (key, value) in table {
            let value = value
                .into_string()
                .map_err(|e| anyhow!("Invalid value for '{}' in [{}]: {}", key, name, e))?;
            entries.insert(key, value);
        }
        sections.insert(name, entries);
    }

    Ok(sections)
}
