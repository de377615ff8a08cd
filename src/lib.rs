#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Redefiner - rewrite the definers of MySQL stored objects
//!
//! For every schema on a server (minus the system schemas) redefiner dumps
//! routines, triggers and events, synthesizes `CREATE OR REPLACE VIEW`
//! statements for the views, swaps each recorded definer for a service
//! account, and replays the rewritten definitions into the same schema.
//!
//! All database access goes through the stock `mysql` and `mysqldump`
//! binaries. It can be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table rendering of reports | `tabled` |
//! | `cli` | The `redefiner` binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`mysql`]**: credentials, process execution and the [`mysql::SchemaServer`]
//!   trait implemented by [`mysql::MysqlClient`]
//! - **[`lens`]**: business logic
//!   - `definer`: definer substitution and view clause insertion
//!   - `pipeline`: the per-schema dump, rewrite and restore sequence
//! - **[`artifacts`]**: file naming, views file lookup, atomic writes
//! - **[`config`]**: tool configuration
//! - **[`error`]**: typed failure kinds
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use redefiner::lens::pipeline::PipelineLens;
//! use redefiner::mysql::{ConnectionProfile, MysqlClient};
//! use redefiner::RedefinerConfig;
//!
//! let config = RedefinerConfig::new(&None)?;
//! let profile = ConnectionProfile::load(&config.my_cnf_path, &config.defaults_group_suffix)?;
//! let client = MysqlClient::locate(None, None, profile, None)?;
//!
//! let lens = PipelineLens::new(&client, config.pipeline_options())?;
//! for report in lens.run()? {
//!     println!("{} -> {}", report.schema, report.stage);
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod lens;
pub mod mysql;

pub use config::RedefinerConfig;
pub use error::RedefinerError;

pub use lens::definer::{Definer, DefinerRewriter, PatternMode};
pub use lens::pipeline::{PipelineLens, PipelineOptions, SchemaReport, SchemaStage};
pub use lens::utils::OutputFormat;
pub use mysql::{ConnectionProfile, GtidMode, MysqlClient, SchemaServer};
