pub mod config;
pub mod naming;
pub mod resize;

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};
use common::{Summary, SummaryLabels, has_extension_in, quote_path};
use tracing::error;

use crate::config::Size;
use crate::naming::{ExtCase, Naming};
use crate::resize::create_thumbnail;

pub const IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

pub const SUMMARY_LABELS: SummaryLabels = SummaryLabels {
    found: "Total images found",
    done: "Thumbnails created",
    skipped: "Skipped (already exist)",
    errors: "Errors",
};

#[derive(Debug, Clone)]
pub struct Options {
    pub source: PathBuf,
    pub output: PathBuf,
    pub size: Size,
    pub naming: Naming,
    pub ext_case: ExtCase,
    /// JPEG quality, from 1 to 100.
    pub quality: u8,
}

/// Makes a thumbnail of each image directly in `options.source`. Thumbnails which already exist
/// are left alone. A failure on one image is logged and counted, the others are still processed.
pub fn work(options: &Options, mut out: impl Write) -> anyhow::Result<Summary> {
    let source = &options.source;
    let metadata = fs::metadata(source)
        .with_context(|| format!("failed to read metadata from {}", quote_path(source)))?;
    ensure!(metadata.is_dir(), "{} is not a directory", quote_path(source));
    let output_dir = &options.output;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create the directory {}", quote_path(output_dir)))?;

    let Size { width, height, abbr } = &options.size;
    writeln!(
        out,
        "\nProcessing images from: {}\nOutput directory: {}\nThumbnail size: {width}x{height}\n{}",
        quote_path(source),
        quote_path(output_dir),
        "-".repeat(50),
    )
    .context("failed to write to stdout")?;

    let mut summary = Summary::default();
    for file_name in list_images(source)? {
        summary.found += 1;
        let result = file_name
            .to_str()
            .with_context(|| {
                format!("the name {} is not valid UTF-8", quote_path(Path::new(&file_name)))
            })
            .and_then(|name| {
                let output_name = options.naming.output_name(name, abbr, options.ext_case);
                let output_path = output_dir.join(&output_name);
                let exists = output_path.try_exists().with_context(|| {
                    format!("failed to check whether {} exists", quote_path(&output_path))
                })?;
                if exists {
                    writeln!(out, "Skipped (exists): {name} -> {output_name}")
                        .context("failed to write to stdout")?;
                    return Ok(false);
                }
                let input_path = source.join(name);
                create_thumbnail(&input_path, &output_path, (*width, *height), options.quality)?;
                writeln!(out, "Created: {name} -> {output_name}")
                    .context("failed to write to stdout")?;
                Ok(true)
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

    summary.write(&mut out, &SUMMARY_LABELS)?;
    Ok(summary)
}

/// Names of the image files directly in `dir`, sorted. Symlinks to files count as files.
fn list_images(dir: &Path) -> anyhow::Result<Vec<OsString>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read as a directory {}", quote_path(dir)))?;
    let mut result = Vec::new();
    for entry_or_err in entries {
        let entry = entry_or_err
            .with_context(|| format!("failed to read an entry in {}", quote_path(dir)))?;
        let path = entry.path();
        if has_extension_in(&path, IMAGE_EXTENSIONS) && path.is_file() {
            result.push(entry.file_name());
        }
    }
    result.sort();
    Ok(result)
}
