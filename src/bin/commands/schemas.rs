use anyhow::Result;
use clap::Args;
use redefiner::lens::pipeline::PipelineLens;
use redefiner::lens::utils::OutputFormat;
use redefiner::RedefinerConfig;
use serde::Serialize;
use tabled::Tabled;

use super::{connect, print_rows};

/// Arguments for the Schemas command
#[derive(Args)]
pub struct SchemasArgs {
    /// Option-file group suffix selecting the connection profile
    #[clap(long)]
    pub defaults_group_suffix: Option<String>,
}

#[derive(Serialize, Tabled)]
struct SchemaRow {
    schema: String,
    dump: String,
    views_file: String,
}

pub fn run(config: &RedefinerConfig, args: SchemasArgs, output_format: OutputFormat) -> Result<()> {
    let client = connect(config, args.defaults_group_suffix.as_deref())?;
    let lens = PipelineLens::new(&client, config.pipeline_options())?;

    let rows: Vec<SchemaRow> = lens
        .discover()?
        .into_iter()
        .map(|schema| {
            let artifacts = lens.artifacts(&schema);
            SchemaRow {
                schema,
                dump: artifacts.dump.display().to_string(),
                views_file: artifacts.views.display().to_string(),
            }
        })
        .collect();

    print_rows(&rows, output_format)
}
