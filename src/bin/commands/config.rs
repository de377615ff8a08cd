use anyhow::{anyhow, Result};
use clap::Args;
use redefiner::lens::utils::OutputFormat;
use redefiner::mysql::ConnectionProfile;
use redefiner::RedefinerConfig;
use serde::Serialize;
use tabled::Tabled;

use super::print_rows;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also resolve and show the connection profile (never the password)
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Serialize, Tabled)]
struct ConfigEntry {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct ConfigInfo<'a> {
    #[serde(flatten)]
    config: &'a RedefinerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<ConnectionProfile>,
}

pub fn run(config: &RedefinerConfig, args: ConfigArgs, output_format: OutputFormat) -> Result<()> {
    let profile = if args.verbose {
        Some(ConnectionProfile::load(
            &config.my_cnf_path,
            &config.defaults_group_suffix,
        )?)
    } else {
        None
    };

    if output_format.is_json() {
        let info = ConfigInfo {
            config,
            profile,
        };
        let json = match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&info),
            _ => serde_json::to_string(&info),
        }
        .map_err(|e| anyhow!("Failed to serialize config info: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    let mut rows: Vec<ConfigEntry> = config
        .entries()
        .into_iter()
        .map(|(key, value)| ConfigEntry {
            key: key.to_string(),
            value,
        })
        .collect();
    if let Some(profile) = profile {
        let endpoint = match (&profile.host, &profile.unix_socket) {
            (Some(host), _) => match profile.port {
                Some(port) => format!("{}:{}", host, port),
                None => host.clone(),
            },
            (None, Some(socket)) => socket.clone(),
            (None, None) => "(client default)".to_string(),
        };
        rows.push(ConfigEntry {
            key: "profile".to_string(),
            value: format!("[{}] {}@{}", profile.section, profile.user, endpoint),
        });
    }

    print_rows(&rows, output_format)
}
