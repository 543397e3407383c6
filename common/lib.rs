//! Glue shared by `organize_photos` and `make_thumbnails`

use std::ffi::OsStr;
use std::fmt::Display;
#[cfg(unix)]
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Context as _;
use humantime::format_duration;
use tempfile::{Builder, NamedTempFile};
use tracing_subscriber::EnvFilter;
use uniquote::Quote as _;

#[must_use]
pub fn quote(string: &str) -> impl Display {
    // The Rust documentation says:
    //
    // > `Debug` implementations of types provided by the standard library (`std`, `core`, `alloc`,
    // > etc.) are not stable, and may also change with future Rust versions.
    //
    // This is why I use `format!("{}", quote(string))` instead of `format!("{string:?}")`.
    string.quote()
}

#[must_use]
pub fn quote_path(path: &Path) -> impl Display {
    // `std::path::Path::display` "may perform lossy conversion", so `quote_path` is used instead
    // of `path.display()` in messages.
    path.quote()
}

/// Diagnostics go to stderr and are filtered by `RUST_LOG` (default: `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Temporary file in `dir`, to be persisted next to it. Unlike [`NamedTempFile::new_in`], which
/// creates it with mode 0600, the file gets the permissions of a plain new file (0666 minus the
/// umask).
pub fn new_temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Case-insensitive check of the file extension.
#[must_use]
pub fn has_extension_in(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|extension| {
            extensions.iter().any(|ext| extension.eq_ignore_ascii_case(ext))
        })
}

pub fn write_elapsed_time(mut out: impl Write, start: Instant) -> anyhow::Result<()> {
    let duration = start.elapsed();
    writeln!(out, "Elapsed time: {}.", format_duration(duration))
        .context("failed to write to stdout")
}

/// Counters printed at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub found: usize,
    pub done: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Wording of each [`Summary`] line, which differs between the tools.
#[derive(Debug, Clone, Copy)]
pub struct SummaryLabels {
    pub found: &'static str,
    pub done: &'static str,
    pub skipped: &'static str,
    pub errors: &'static str,
}

impl Summary {
    pub fn write(&self, mut out: impl Write, labels: &SummaryLabels) -> anyhow::Result<()> {
        let rule = "=".repeat(50);
        writeln!(
            out,
            "\n{rule}\nSummary:\n  {}: {}\n  {}: {}\n  {}: {}\n  {}: {}\n{rule}",
            labels.found,
            self.found,
            labels.done,
            self.done,
            labels.skipped,
            self.skipped,
            labels.errors,
            self.errors,
        )
        .context("failed to write to stdout")
    }
}
