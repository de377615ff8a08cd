//! Definer rewriting lens
//!
//! Two transformations over generated SQL text:
//!
//! - **dump rewrite**: every match of the source definer pattern in a
//!   `mysqldump` file is replaced by the replacement definer. Routines, events
//!   and triggers all carry their definer as `` DEFINER=`user`@`host` ``, so a
//!   single pattern covers them.
//! - **view clause insertion**: view statements synthesized from
//!   `information_schema.VIEWS` carry no definer at all, so
//!   `` DEFINER = `user`@`host` `` is inserted between `REPLACE` and `VIEW`.
//!
//! # Example
//!
//! ```rust
//! use redefiner::lens::definer::{DefinerRewriter, PatternMode, DEFAULT_SOURCE_DEFINER};
//!
//! let rewriter =
//!     DefinerRewriter::new(DEFAULT_SOURCE_DEFINER, "`flyway`@`%`", PatternMode::Regex).unwrap();
//! let (fixed, count) = rewriter.rewrite_dump(b"CREATE DEFINER=`root`@`%` PROCEDURE p()");
//! assert_eq!(&fixed[..], &b"CREATE DEFINER=`flyway`@`%` PROCEDURE p()"[..]);
//! assert_eq!(count, 1);
//! ```

use crate::artifacts::write_atomic;
use crate::error::RedefinerError;
use anyhow::{anyhow, Result};
use regex::bytes::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Matches any backtick-quoted `user`@`host` pair
pub const DEFAULT_SOURCE_DEFINER: &str = r"`[^`]+`@`[^`]+`";

pub const DEFAULT_REPLACEMENT_DEFINER: &str = "`flyway`@`%`";

/// Literal text the view clause is inserted into
const VIEW_ANCHOR: &str = "REPLACE VIEW";

// =============================================================================
// Types
// =============================================================================

/// An account identity, rendered as `` `user`@`host` ``
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Definer {
    pub user: String,
    pub host: String,
}

impl Definer {
    pub fn new(user: &str, host: &str) -> Self {
        Self {
            user: user.to_string(),
            host: host.to_string(),
        }
    }
}

impl fmt::Display for Definer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`@`{}`", self.user, self.host)
    }
}

impl FromStr for Definer {
    type Err = RedefinerError;

    /// Accepts `` `user`@`host` `` as well as bare `user@host`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RedefinerError::InvalidDefiner(s.to_string());
        let trimmed = s.trim();

        let (user, host) = if trimmed.starts_with('`') {
            let rest = trimmed.strip_prefix('`').ok_or_else(invalid)?;
            let (user, rest) = rest.split_once("`@`").ok_or_else(invalid)?;
            let host = rest.strip_suffix('`').ok_or_else(invalid)?;
            (user, host)
        } else {
            trimmed.split_once('@').ok_or_else(invalid)?
        };

        if user.is_empty() || host.is_empty() || user.contains('`') || host.contains('`') {
            return Err(invalid());
        }

        Ok(Definer::new(user, host))
    }
}

/// How the source definer string is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Regular expression, e.g. `` `[^`]+`@`[^`]+` `` for any definer
    #[default]
    Regex,
    /// Exact text, e.g. `` `root`@`%` ``
    Literal,
}

// =============================================================================
// Lens
// =============================================================================

/// Rewrites definers in dump files and view files
#[derive(Debug, Clone)]
pub struct DefinerRewriter {
    source: String,
    pattern: Regex,
    view_anchor: Regex,
    replacement: Definer,
}

impl DefinerRewriter {
    /// Build a rewriter from a source definer and a replacement definer
    ///
    /// Empty strings are rejected for both. The replacement must parse as a
    /// [`Definer`].
    pub fn new(source: &str, replacement: &str, mode: PatternMode) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(RedefinerError::EmptyPattern("source").into());
        }
        if replacement.trim().is_empty() {
            return Err(RedefinerError::EmptyPattern("replacement").into());
        }

        let replacement = Definer::from_str(replacement)?;
        let expr = match mode {
            PatternMode::Regex => Cow::Borrowed(source),
            PatternMode::Literal => Cow::Owned(regex::escape(source)),
        };
        let pattern = Regex::new(&expr)
            .map_err(|e| anyhow!("Invalid source definer pattern '{}': {}", source, e))?;
        let view_anchor = Regex::new(&regex::escape(VIEW_ANCHOR))
            .map_err(|e| anyhow!("Invalid view anchor '{}': {}", VIEW_ANCHOR, e))?;

        Ok(Self {
            source: source.to_string(),
            pattern,
            view_anchor,
            replacement,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn replacement(&self) -> &Definer {
        &self.replacement
    }

    /// Replace every source-pattern match, returning the text and match count
    ///
    /// Bytes outside of matches are copied unchanged.
    pub fn rewrite_dump<'t>(&self, dump: &'t [u8]) -> (Cow<'t, [u8]>, usize) {
        let count = self.pattern.find_iter(dump).count();
        let replacement = self.replacement.to_string();
        let fixed = self
            .pattern
            .replace_all(dump, NoExpand(replacement.as_bytes()));
        (fixed, count)
    }

    /// The `DEFINER = ...` clause inserted into view statements
    pub fn view_clause(&self) -> String {
        format!("DEFINER = {}", self.replacement)
    }

    /// Insert the definer clause into every `CREATE OR REPLACE VIEW`
    ///
    /// Statements that already went through insertion no longer contain the
    /// `REPLACE VIEW` anchor, so they are left as they are. View bodies may
    /// hold any bytes; only the anchor itself is touched.
    pub fn insert_view_definers<'t>(&self, views: &'t [u8]) -> (Cow<'t, [u8]>, usize) {
        let count = self.view_anchor.find_iter(views).count();
        let clause = format!("REPLACE {} VIEW", self.view_clause());
        let patched = self
            .view_anchor
            .replace_all(views, NoExpand(clause.as_bytes()));
        (patched, count)
    }

    /// Back up `dump`, then write its rewritten content to `fixed`
    ///
    /// The backup is written before anything else happens to the dump; `dump`
    /// itself is never modified.
    pub fn rewrite_dump_file(&self, dump: &Path, backup: &Path, fixed: &Path) -> Result<usize> {
        let content = std::fs::read(dump)
            .map_err(|e| anyhow!("Unable to read dump file {}: {}", dump.display(), e))?;

        write_atomic(backup, &content)?;
        debug!("backed up {} to {}", dump.display(), backup.display());

        let (output, count) = self.rewrite_dump(&content);
        write_atomic(fixed, &output)?;
        info!(
            "replaced {} definer(s) matching '{}' with {} in {}",
            count,
            self.source,
            self.replacement,
            fixed.display()
        );
        Ok(count)
    }

    /// Insert the view definer clause into the views file, in place
    pub fn rewrite_views_file(&self, views: &Path) -> Result<usize> {
        let content = std::fs::read(views)
            .map_err(|e| anyhow!("Unable to read views file {}: {}", views.display(), e))?;

        let (patched, count) = self.insert_view_definers(&content);
        write_atomic(views, &patched)?;
        info!(
            "inserted {} into {} view statement(s) in {}",
            self.view_clause(),
            count,
            views.display()
        );
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
