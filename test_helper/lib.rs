//! Utility to write unit tests

use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context as _, ensure};
use common::quote_path;
use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use time::OffsetDateTime;

pub trait Check {
    fn check_does_not_exist(&self) -> anyhow::Result<()>;
    fn check_is_file_with_content(&self, expected: impl AsRef<str>) -> anyhow::Result<()>;
    fn check_is_image_with_dimensions(&self, width: u32, height: u32) -> anyhow::Result<()>;
    #[cfg(unix)]
    fn check_has_plain_file_permissions(&self) -> anyhow::Result<()>;
    fn check_dir_contains_exactly<const N: usize>(&self, names: [&str; N])
    -> anyhow::Result<()>;
}

impl<T> Check for T
where
    T: AsRef<Path>,
{
    fn check_does_not_exist(&self) -> anyhow::Result<()> {
        let path = self.as_ref();
        ensure!(path.symlink_metadata().is_err(), "{} exists", quote_path(path));
        Ok(())
    }

    fn check_is_file_with_content(&self, expected: impl AsRef<str>) -> anyhow::Result<()> {
        let path = self.as_ref();
        let expected = expected.as_ref();
        let metadata = symlink_metadata(path)?;
        ensure!(metadata.is_file(), "{} exists but is not a file", quote_path(path));
        let cont = fs::read(path).with_context(|| format!("failed to read {}", quote_path(path)))?;
        let cont = String::from_utf8(cont)
            .with_context(|| format!("non-UTF8 data in {}", quote_path(path)))?;
        ensure!(
            cont == expected,
            "the content of {} is {cont:?}, not {expected:?}",
            quote_path(path)
        );
        Ok(())
    }

    fn check_is_image_with_dimensions(&self, width: u32, height: u32) -> anyhow::Result<()> {
        let path = self.as_ref();
        let dimensions = image::image_dimensions(path)
            .with_context(|| format!("failed to decode {}", quote_path(path)))?;
        ensure!(
            dimensions == (width, height),
            "{} is {}x{}, not {width}x{height}",
            quote_path(path),
            dimensions.0,
            dimensions.1,
        );
        Ok(())
    }

    /// Same mode as a file freshly written with `fs::write`.
    #[cfg(unix)]
    fn check_has_plain_file_permissions(&self) -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt as _;
        let path = self.as_ref();
        let reference = assert_fs::NamedTempFile::new("reference")?;
        fs::write(reference.path(), "")?;
        let expected = symlink_metadata(reference.path())?.permissions().mode() & 0o777;
        let actual = symlink_metadata(path)?.permissions().mode() & 0o777;
        ensure!(actual == expected, "{} has mode {actual:o}, not {expected:o}", quote_path(path));
        Ok(())
    }

    fn check_dir_contains_exactly<const N: usize>(
        &self,
        names: [&str; N],
    ) -> anyhow::Result<()> {
        let path = self.as_ref();
        let mut actual = Vec::new();
        for entry in
            fs::read_dir(path).with_context(|| format!("failed to read {}", quote_path(path)))?
        {
            let entry = entry
                .with_context(|| format!("failed to read an entry in {}", quote_path(path)))?;
            actual.push(entry.file_name().to_string_lossy().into_owned());
        }
        actual.sort();
        let mut expected: Vec<_> = names.iter().map(|&name| name.to_owned()).collect();
        expected.sort();
        ensure!(actual == expected, "{} contains {actual:?}, not {expected:?}", quote_path(path));
        Ok(())
    }
}

fn symlink_metadata(path: &Path) -> anyhow::Result<Metadata> {
    path.symlink_metadata()
        .with_context(|| format!("failed to read metadata from {}", quote_path(path)))
}

pub fn check_err_contains<T, E>(result: Result<T, E>, text: impl AsRef<str>) -> anyhow::Result<()>
where
    E: fmt::Debug,
{
    let text = text.as_ref();
    let error = result.err().context("missing error")?;
    let msg = format!("{error:?}");
    ensure!(msg.contains(text), "the error message {msg:?} does not contain {text:?}");
    Ok(())
}

pub fn set_modified(path: impl AsRef<Path>, modified: OffsetDateTime) -> anyhow::Result<()> {
    let path = path.as_ref();
    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(modified.into()))
        .with_context(|| format!("failed to set the modification time of {}", quote_path(path)))
}

/// Opaque gradient, so that resampling has something to chew on.
pub fn write_image(path: impl AsRef<Path>, width: u32, height: u32) -> anyhow::Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let image = RgbImage::from_fn(width, height, |column, row| {
        Rgb([channel(column), channel(row), 128])
    });
    image.save(path).with_context(|| format!("failed to write {}", quote_path(path)))
}

fn channel(coordinate: u32) -> u8 {
    u8::try_from(coordinate % 256).unwrap_or(u8::MAX)
}

/// Fully transparent red image.
pub fn write_transparent_image(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0]));
    image.save(path).with_context(|| format!("failed to write {}", quote_path(path)))
}

/// Write a TIFF file which only holds the given EXIF ASCII fields, e.g.
/// `(Tag::DateTimeOriginal, "2025:01:18 14:30:45")`.
pub fn write_exif_tiff(path: impl AsRef<Path>, fields: &[(Tag, &str)]) -> anyhow::Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let fields: Vec<_> = fields
        .iter()
        .map(|&(tag, value)| Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![value.as_bytes().to_vec()]),
        })
        .collect();
    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buffer = Cursor::new(Vec::new());
    writer.write(&mut buffer, false).context("failed to encode the EXIF fields")?;
    fs::write(path, buffer.into_inner())
        .with_context(|| format!("failed to write {}", quote_path(path)))
}

fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", quote_path(parent)))?;
    }
    Ok(())
}
