//! Output formatting shared by every command

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Table with rounded borders (default)
    #[default]
    Table,
    Markdown,
    /// Compact JSON array
    Json,
    JsonPretty,
    /// One JSON object per line
    JsonLine,
    /// Pipe-separated values with a header line
    Psv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        Self::Table,
        Self::Markdown,
        Self::Json,
        Self::JsonPretty,
        Self::JsonLine,
        Self::Psv,
    ];

    /// Name accepted by `--format`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::JsonLine => "json-line",
            Self::Psv => "psv",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|f| f.name()).collect();
                format!(
                    "unknown output format '{}', expected one of: {}",
                    s,
                    names.join(", ")
                )
            })
    }
}

/// Render rows in the given format, without a trailing newline
#[cfg(feature = "display")]
pub fn render_rows<T>(rows: &[T], format: OutputFormat) -> anyhow::Result<String>
where
    T: tabled::Tabled + Serialize,
{
    use anyhow::{anyhow, Result};
    use tabled::settings::Style;
    use tabled::Table;

    let json_err = |e: serde_json::Error| anyhow!("Failed to serialize to JSON: {}", e);

    let rendered = match format {
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Markdown => Table::new(rows).with(Style::markdown()).to_string(),
        OutputFormat::Json => serde_json::to_string(rows).map_err(json_err)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(rows).map_err(json_err)?,
        OutputFormat::JsonLine => rows
            .iter()
            .map(|row| serde_json::to_string(row).map_err(json_err))
            .collect::<Result<Vec<_>>>()?
            .join("\n"),
        OutputFormat::Psv => {
            let mut lines = vec![T::headers().join("|")];
            lines.extend(rows.iter().map(|row| row.fields().join("|")));
            lines.join("\n")
        }
    };
    Ok(rendered)
}
