//! Typed failure kinds
//!
//! Most of the crate propagates `anyhow::Error`; the variants here are the
//! conditions callers need to tell apart (and that tests assert on). They can
//! be recovered from an `anyhow::Error` with `downcast_ref::<RedefinerError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedefinerError {
    #[error("command `{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("no views SQL file found matching pattern '{pattern}'")]
    NoViewsFile { pattern: String },

    #[error("multiple views SQL files found matching pattern '{pattern}': {matches:?}")]
    MultipleViewsFiles {
        pattern: String,
        matches: Vec<PathBuf>,
    },

    #[error("user '{user}' does not exist on the server, create it and try again")]
    MissingAccount { user: String },

    #[error("unexpected output from `{query}`: {output}")]
    UnexpectedOutput { query: String, output: String },

    #[error("invalid definer '{0}', expected `user`@`host`")]
    InvalidDefiner(String),

    #[error("{0} definer must not be empty")]
    EmptyPattern(&'static str),

    #[error("section [{section}] not found in {path}")]
    MissingProfile { section: String, path: PathBuf },

    #[error("key '{key}' missing from section [{section}]")]
    MissingCredential { section: String, key: String },

    #[error("unable to locate the `{0}` executable")]
    BinaryNotFound(String),
}
