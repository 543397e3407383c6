use std::io::{self, Write as _};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use clap::Parser;
use common::{init_logging, quote_path, write_elapsed_time};
use organize_photos::config::{Overrides, SavedConfig, default_config_path};
use organize_photos::date::parse_yymmdd;
use organize_photos::decision::Filters;
use organize_photos::{Options, work};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::warn;

#[derive(Parser)]
#[command(version)]
/// Copy photos into folders named after their creation date, for example `250118` for
/// 2025-01-18.
///
/// The creation date comes from the EXIF metadata, or else from the modification time. Photos are
/// searched recursively in the source directory. When a photo with the same name already exists in
/// the destination folder, the copy gets a suffix: `photo_1.jpg`, `photo_2.jpg`...
///
/// The copies are recorded in `.photo_organizer_state.json` in the destination directory, so that
/// the next run only copies the new photos. Delete this file to start over.
///
/// The source, destination and start date are saved in `~/.organize_photos.json` and reused when
/// omitted.
struct Cli {
    /// Directory which contains the photos
    source: Option<PathBuf>,

    /// Directory which receives the dated folders
    destination: Option<PathBuf>,

    /// Only copy the photos taken on or after this date (YYMMDD), even if already copied
    #[arg(short, long, value_parser = parse_yymmdd)]
    start_date: Option<Date>,

    /// Copy every photo, even if already copied
    #[arg(short, long)]
    force_all: bool,

    /// Neither read nor write the saved configuration
    #[arg(long)]
    no_config: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let start = Instant::now();
    let Cli { source, destination, start_date, force_all, no_config } = Cli::parse();
    let local_offset = UtcOffset::current_local_offset().unwrap_or_else(|error| {
        warn!("could not determine the local offset, dates are computed in UTC: {error}");
        UtcOffset::UTC
    });
    let now = OffsetDateTime::now_utc().to_offset(local_offset);
    let now = PrimitiveDateTime::new(now.date(), now.time());

    let overrides = Overrides { source, destination, start_date };
    let config_path = if no_config { None } else { Some(default_config_path()?) };
    let saved = config_path.as_deref().map(SavedConfig::load).unwrap_or_default();
    let resolved = saved.merge(&overrides)?;

    let mut out = io::stdout().lock();
    writeln!(
        out,
        "Photo Organizer\nSource: {}\nDestination: {}",
        quote_path(&resolved.source),
        quote_path(&resolved.destination)
    )
    .context("failed to write to stdout")?;
    if resolved.from_saved_config {
        writeln!(out, "(Using saved configuration)").context("failed to write to stdout")?;
    }
    writeln!(out, "{}", "-".repeat(50)).context("failed to write to stdout")?;

    let options = Options {
        source: resolved.source.clone(),
        destination: resolved.destination.clone(),
        filters: Filters { start_date: resolved.start_date, force_all },
        local_offset,
    };
    work(&options, now, &mut out)?;

    if let Some(config_path) = &config_path {
        resolved.remember(config_path, &overrides)?;
    }
    write_elapsed_time(out, start)
}
