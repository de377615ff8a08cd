use anyhow::Result;
use clap::Args;
use redefiner::lens::definer::PatternMode;
use redefiner::lens::pipeline::PipelineLens;
use redefiner::lens::utils::OutputFormat;
use redefiner::RedefinerConfig;
use std::path::PathBuf;

use super::{connect, print_rows};

/// Arguments for the Run command
#[derive(Args)]
pub struct RunArgs {
    /// Only process these schemas (repeatable)
    #[clap(long = "schema")]
    pub schemas: Vec<String>,

    /// Stop after rewriting, without restoring anything
    #[clap(long)]
    pub no_restore: bool,

    /// Do not require the replacement definer's account to exist
    #[clap(long)]
    pub skip_account_check: bool,

    /// Definer pattern to replace (regular expression)
    #[clap(short, long)]
    pub source_definer: Option<String>,

    /// How the source definer is matched
    #[clap(long, value_enum)]
    pub pattern_mode: Option<PatternMode>,

    /// Replacement definer, e.g. `flyway`@`%`
    #[clap(short, long)]
    pub replacement_definer: Option<String>,

    /// Option-file group suffix selecting the connection profile
    #[clap(long)]
    pub defaults_group_suffix: Option<String>,

    /// Directory for generated files
    #[clap(short, long)]
    pub work_dir: Option<PathBuf>,
}

pub fn run(config: &RedefinerConfig, args: RunArgs, output_format: OutputFormat) -> Result<()> {
    let RunArgs {
        schemas,
        no_restore,
        skip_account_check,
        source_definer,
        pattern_mode,
        replacement_definer,
        defaults_group_suffix,
        work_dir,
    } = args;

    let client = connect(config, defaults_group_suffix.as_deref())?;

    let mut options = config.pipeline_options();
    if let Some(dir) = work_dir {
        options.work_dir = dir;
    }
    if let Some(source) = source_definer {
        options.source_definer = source;
    }
    if let Some(mode) = pattern_mode {
        options.pattern_mode = mode;
    }
    if let Some(replacement) = replacement_definer {
        options.replacement_definer = replacement;
    }
    let options = options
        .with_only_schemas(schemas)
        .with_account_check(!skip_account_check)
        .with_restore(!no_restore);

    let lens = PipelineLens::new(&client, options)?;
    let reports = lens.run()?;
    print_rows(&reports, output_format)
}
