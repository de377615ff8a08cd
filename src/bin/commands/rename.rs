use anyhow::Result;
use clap::Args;
use redefiner::lens::definer::PatternMode;
use redefiner::lens::pipeline::PipelineLens;
use redefiner::lens::utils::OutputFormat;
use redefiner::RedefinerConfig;
use std::path::PathBuf;
use tracing::info;

use super::{connect, print_rows};

/// Arguments for the Rename command
///
/// Backticks are required around the definer parts:
///
/// ```text
/// redefiner rename -s '`root`@`%`' -r '`flyway`@`%`' -d char_test_db \
///     -i ./char_test_db_dump.sql -o ./char_test_db_dump-fixed.sql
/// ```
#[derive(Args)]
pub struct RenameArgs {
    /// The definer to search for, e.g. `root`@`localhost`
    #[clap(short, long)]
    pub source_definer: String,

    /// The definer to put in its place, e.g. `flyway`@`%`
    #[clap(short, long)]
    pub replacement_definer: String,

    /// The schema the dump belongs to
    #[clap(short, long)]
    pub database: String,

    /// Option-file group suffix selecting the connection profile
    #[clap(long)]
    pub defaults_group_suffix: Option<String>,

    /// Dump file to rewrite
    #[clap(short, long)]
    pub input_file: PathBuf,

    /// Where the rewritten dump is written
    #[clap(short, long)]
    pub output_file: PathBuf,

    /// Treat the source definer as a regular expression
    #[clap(long)]
    pub regex: bool,

    /// Stop after rewriting, without restoring anything
    #[clap(long)]
    pub no_restore: bool,

    /// Do not require the replacement definer's account to exist
    #[clap(long)]
    pub skip_account_check: bool,
}

pub fn run(config: &RedefinerConfig, args: RenameArgs, output_format: OutputFormat) -> Result<()> {
    let RenameArgs {
        source_definer,
        replacement_definer,
        database,
        defaults_group_suffix,
        input_file,
        output_file,
        regex,
        no_restore,
        skip_account_check,
    } = args;

    let mode = if regex {
        PatternMode::Regex
    } else {
        PatternMode::Literal
    };

    let client = connect(config, defaults_group_suffix.as_deref())?;
    let options = config
        .pipeline_options()
        .with_definers(&source_definer, &replacement_definer, mode)
        .with_account_check(!skip_account_check)
        .with_restore(!no_restore);

    let lens = PipelineLens::new(&client, options)?;
    let report = lens.rename(&database, &input_file, &output_file)?;
    info!(
        "all objects with definer '{}' have been renamed to '{}' in database '{}'",
        source_definer, replacement_definer, database
    );

    print_rows(&[report], output_format)
}
