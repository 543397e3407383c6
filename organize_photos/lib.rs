pub mod config;
pub mod date;
pub mod decision;
pub mod naming;
pub mod scan;
pub mod state;

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};
use common::{Summary, SummaryLabels, new_temp_file_in, quote_path};
use time::macros::format_description;
use time::{PrimitiveDateTime, UtcOffset};
use tracing::{debug, error, info, warn};

use crate::date::DateResolver;
use crate::decision::{Decision, Filters, SourceFile, should_copy};
use crate::naming::CollisionResolver;
use crate::scan::{ScannedFile, scan};
use crate::state::SyncState;

pub const SUMMARY_LABELS: SummaryLabels = SummaryLabels {
    found: "Total photos found",
    done: "Copied",
    skipped: "Skipped",
    errors: "Errors",
};

#[derive(Debug, Clone)]
pub struct Options {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub filters: Filters,
    /// Used to date the photos without EXIF date from their modification time.
    pub local_offset: UtcOffset,
}

/// One synchronization run. `now` timestamps the copies and the run itself in the sync state.
///
/// Errors on a single photo are logged and counted, the run goes on. An unreadable or corrupt sync
/// state stops the run before anything is copied.
pub fn work(
    options: &Options,
    now: PrimitiveDateTime,
    mut out: impl Write,
) -> anyhow::Result<Summary> {
    let source = canonical_source_dir(&options.source)?;
    let destination = prepare_destination_dir(&options.destination)?;
    // Decisions only see the records of previous runs: two files of this run with the same
    // candidate key are both copied.
    let prior = SyncState::load(&destination)?;
    let mut state = prior.clone();
    write_mode(&mut out, options.filters, &prior)?;

    let dates = DateResolver::new(options.local_offset);
    let mut naming = CollisionResolver::new();
    let mut summary = Summary::default();
    for scanned_or_err in scan(&source, Some(&destination)) {
        summary.found += 1;
        let result = scanned_or_err.and_then(|scanned| {
            let file = to_source_file(scanned, &dates)?;
            match should_copy(&file, &prior, options.filters) {
                Decision::Copy { folder } => {
                    let copied = copy_file(&file, &destination, &folder, &mut naming)?;
                    state.record_copy(file.candidate_key(), now);
                    let relative_path = quote_path(&file.relative_path);
                    writeln!(out, "Copied: {relative_path} -> {folder}/{copied}")
                        .context("failed to write to stdout")?;
                    Ok(true)
                }
                Decision::Skip(reason) => {
                    debug!("skipped {}: {reason}", quote_path(&file.relative_path));
                    Ok(false)
                }
            }
        });
        match result {
            Ok(true) => summary.done += 1,
            Ok(false) => summary.skipped += 1,
            Err(error) => {
                error!("{error:#}");
                summary.errors += 1;
            }
        }
    }

    let saved = state.save(&destination, now);
    summary.write(&mut out, &SUMMARY_LABELS)?;
    saved?;
    Ok(summary)
}

fn canonical_source_dir(path: &Path) -> anyhow::Result<PathBuf> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read metadata from {}", quote_path(path)))?;
    ensure!(metadata.is_dir(), "{} is not a directory", quote_path(path));
    fs::canonicalize(path).with_context(|| format!("failed to canonicalize {}", quote_path(path)))
}

fn prepare_destination_dir(path: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create the directory {}", quote_path(path)))?;
    let path = fs::canonicalize(path)
        .with_context(|| format!("failed to canonicalize {}", quote_path(path)))?;
    new_temp_file_in(&path).with_context(|| {
        format!("the destination directory {} is not writable", quote_path(&path))
    })?;
    Ok(path)
}

fn write_mode(mut out: impl Write, filters: Filters, state: &SyncState) -> anyhow::Result<()> {
    let line = match (filters.start_date, state.last_sync) {
        (Some(start_date), _) => {
            let format = format_description!("[year]-[month]-[day]");
            format!("Starting from: {}", start_date.format(&format).context("failed to format")?)
        }
        (None, Some(last_sync)) if !filters.force_all => {
            let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
            format!("Last sync: {}", last_sync.format(&format).context("failed to format")?)
        }
        (None, _) => "Copying all files...".to_owned(),
    };
    writeln!(out, "{line}").context("failed to write to stdout")
}

fn to_source_file(scanned: ScannedFile, dates: &DateResolver) -> anyhow::Result<SourceFile> {
    let ScannedFile { path, relative_path, modified } = scanned;
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .with_context(|| format!("the name of {} is not valid UTF-8", quote_path(&path)))?
        .to_owned();
    let date = dates.resolve(&path, modified);
    Ok(SourceFile { path, relative_path, file_name, modified, date })
}

/// Returns the name of the copy, which differs from the source name after a collision.
fn copy_file(
    file: &SourceFile,
    destination_root: &Path,
    folder: &str,
    naming: &mut CollisionResolver,
) -> anyhow::Result<String> {
    let folder_path = destination_root.join(folder);
    fs::create_dir_all(&folder_path)
        .with_context(|| format!("failed to create the directory {}", quote_path(&folder_path)))?;
    let dst_path = naming.resolve(&folder_path.join(&file.file_name))?;
    // Nothing appears under the final name before the copy is complete.
    let mut temp_file = new_temp_file_in(&folder_path).with_context(|| {
        format!("failed to create a temporary file in {}", quote_path(&folder_path))
    })?;
    File::open(&file.path)
        .and_then(|mut src_file| io::copy(&mut src_file, &mut temp_file))
        .with_context(|| {
            format!("failed to copy {} to {}", quote_path(&file.path), quote_path(&dst_path))
        })?;
    if let Err(error) = temp_file.as_file().set_modified(file.modified) {
        warn!("failed to preserve the modification time of {}: {error}", quote_path(&dst_path));
    }
    temp_file
        .persist_noclobber(&dst_path)
        .with_context(|| format!("failed to write {}", quote_path(&dst_path)))?;
    info!("copied {} to {}", quote_path(&file.path), quote_path(&dst_path));
    let copied_name = dst_path.file_name().and_then(OsStr::to_str).unwrap_or(&file.file_name);
    Ok(copied_name.to_owned())
}
