//! Lens module
//!
//! Lenses hold the business logic of redefiner, independent of the command
//! line front end:
//!
//! | Lens | Purpose |
//! |------|---------|
//! | `DefinerRewriter` | definer substitution in dumps, clause insertion in views |
//! | `PipelineLens` | the per-schema dump, rewrite and restore sequence |
//!
//! `utils` carries the output format shared by every command.
//!
//! ```rust,ignore
//! use redefiner::lens::pipeline::{PipelineLens, PipelineOptions};
//! use redefiner::mysql::MysqlClient;
//!
//! let client = MysqlClient::locate(None, None, profile, None)?;
//! let lens = PipelineLens::new(&client, PipelineOptions::new("."))?;
//! for report in lens.run()? {
//!     println!("{}: {}", report.schema, report.stage);
//! }
//! ```

pub mod utils;

pub mod definer;

pub mod pipeline;
