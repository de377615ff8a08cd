pub mod config;
pub mod rename;
pub mod run;
pub mod schemas;

use anyhow::Result;
use redefiner::lens::utils::{render_rows, OutputFormat};
use redefiner::mysql::{ConnectionProfile, MysqlClient};
use redefiner::RedefinerConfig;
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

/// Connect through the option-file profile selected by `suffix`, falling back
/// to the configured suffix
pub(crate) fn connect(config: &RedefinerConfig, suffix: Option<&str>) -> Result<MysqlClient> {
    let suffix = suffix.unwrap_or(config.defaults_group_suffix.as_str());
    let profile = ConnectionProfile::load(&config.my_cnf_path, suffix)?;
    info!(
        "using profile [{}] from {}",
        profile.section,
        config.my_cnf_path.display()
    );
    let client = MysqlClient::locate(
        config.mysql_path.as_deref(),
        config.mysqldump_path.as_deref(),
        profile,
        Some(suffix.to_string()),
    )?;
    Ok(client.with_option_file(config.my_cnf_path.clone()))
}

pub(crate) fn print_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> Result<()> {
    println!("{}", render_rows(rows, format)?);
    Ok(())
}
