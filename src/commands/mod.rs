//! Command implementations for the plancheck CLI.
//!
//! Each command returns its exit code; errors bubble up to `main` as
//! operational failures.

mod analyze;
mod engines;
mod rewrite;

pub use analyze::{analyze, AnalyzeArgs};
pub use engines::engines;
pub use rewrite::{rewrite, RewriteArgs};

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Path argument meaning "read standard input"
pub(crate) const STDIN: &str = "-";

pub(crate) fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == STDIN
}

/// Read an input file, or stdin for `-`.
pub(crate) fn read_input(path: &Path) -> Result<String> {
    if is_stdin(path) {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
