use clap::{Parser, Subcommand};
use redefiner::lens::utils::OutputFormat;
use redefiner::RedefinerConfig;
use tracing::{debug, Level};

mod commands;

use commands::config::ConfigArgs;
use commands::rename::RenameArgs;
use commands::run::RunArgs;
use commands::schemas::SchemasArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.redefiner/redefiner.toml is used
    #[clap(short, long, global = true)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite the definers of every eligible schema and restore them
    Run(RunArgs),

    /// List the schemas a run would process
    Schemas(SchemasArgs),

    /// Rewrite one schema's definers from an existing dump file
    Rename(RenameArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match RedefinerConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        }
    };
    debug!("configuration loaded:\n{}", config.summary());

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(&config, args, cli.format),
        Commands::Schemas(args) => commands::schemas::run(&config, args, cli.format),
        Commands::Rename(args) => commands::rename::run(&config, args, cli.format),
        Commands::Config(args) => commands::config::run(&config, args, cli.format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
