//! Creation date of a photo, and the `YYMMDD` names derived from it

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::SystemTime;

use anyhow::Context as _;
use common::{quote, quote_path};
use exif::{In, Reader, Tag, Value};
use regex_lite::Regex;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, UtcOffset};
use tracing::debug;

/// EXIF fields tried in order.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTime, Tag::DateTimeDigitized];

#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    local_offset: UtcOffset,
}

impl DateResolver {
    #[must_use]
    pub const fn new(local_offset: UtcOffset) -> Self {
        Self { local_offset }
    }

    /// Returns the EXIF date if the file has a usable one, the local date of `modified` otherwise.
    /// Never fails: a file without readable metadata is not an error.
    #[must_use]
    pub fn resolve(&self, path: &Path, modified: SystemTime) -> Date {
        match read_exif_date(path) {
            Ok(Some(date)) => date,
            Ok(None) => {
                debug!(path = %quote_path(path), "no EXIF date, using the modification time");
                self.modification_date(modified)
            }
            Err(error) => {
                debug!(path = %quote_path(path), "{error:#}, using the modification time");
                self.modification_date(modified)
            }
        }
    }

    #[must_use]
    pub fn modification_date(&self, modified: SystemTime) -> Date {
        OffsetDateTime::from(modified).to_offset(self.local_offset).date()
    }
}

fn read_exif_date(path: &Path) -> anyhow::Result<Option<Date>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", quote_path(path)))?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .with_context(|| format!("failed to read EXIF data from {}", quote_path(path)))?;
    Ok(DATE_TAGS.iter().find_map(|&tag| {
        let field = exif.get_field(tag, In::PRIMARY)?;
        parse_exif_date(&field.value)
    }))
}

/// EXIF dates look like `2025:01:18 14:30:45`. Blank ones (`0000:00:00 00:00:00`) are rejected.
fn parse_exif_date(value: &Value) -> Option<Date> {
    let Value::Ascii(strings) = value else {
        return None;
    };
    let datetime = exif::DateTime::from_ascii(strings.first()?).ok()?;
    let month = Month::try_from(datetime.month).ok()?;
    Date::from_calendar_date(i32::from(datetime.year), month, datetime.day).ok()
}

/// `2025-01-18` → `250118`. Destination trees depend on this exact format.
#[must_use]
pub fn folder_name(date: Date) -> String {
    let format = format_description!("[year repr:last_two][month][day]");
    date.format(&format).expect("a date always has a year, a month and a day")
}

/// Inverse of [`folder_name`]. Two-digit years from 69 to 99 are in the 1900s, the others in the
/// 2000s, like `strptime`.
pub fn parse_yymmdd(text: &str) -> anyhow::Result<Date> {
    let regex = Regex::new(r"^([[:digit:]]{2})([[:digit:]]{2})([[:digit:]]{2})$")
        .expect("the regex is valid");
    let captures = regex.captures(text).with_context(|| {
        format!("invalid date format {}: use YYMMDD, for example 250118", quote(text))
    })?;
    let year: i32 = captures[1].parse()?;
    let year = if year >= 69 { 1900 + year } else { 2000 + year };
    let month: u8 = captures[2].parse()?;
    let day: u8 = captures[3].parse()?;
    let month = Month::try_from(month)
        .with_context(|| format!("invalid month in {}", quote(text)))?;
    Date::from_calendar_date(year, month, day)
        .with_context(|| format!("invalid day in {}", quote(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_fs::TempDir;
    use assert_fs::fixture::{FileWriteStr as _, PathChild as _};
    use time::macros::{date, datetime};

    use test_helper::{check_err_contains, set_modified, write_exif_tiff};

    #[test]
    fn folder_names_are_yymmdd() {
        assert_eq!(folder_name(date!(2025-01-18)), "250118");
        assert_eq!(folder_name(date!(1999-12-31)), "991231");
        assert_eq!(folder_name(date!(2003-04-05)), "030405");
    }

    #[test]
    fn parse_yymmdd_accepts_valid_dates() -> anyhow::Result<()> {
        assert_eq!(parse_yymmdd("250118")?, date!(2025-01-18));
        assert_eq!(parse_yymmdd("680101")?, date!(2068-01-01));
        assert_eq!(parse_yymmdd("690101")?, date!(1969-01-01));
        assert_eq!(parse_yymmdd("240229")?, date!(2024-02-29));
        Ok(())
    }

    #[test]
    fn parse_yymmdd_rejects_invalid_dates() -> anyhow::Result<()> {
        check_err_contains(parse_yymmdd("2501"), "invalid date format")?;
        check_err_contains(parse_yymmdd("2025-01-18"), "invalid date format")?;
        check_err_contains(parse_yymmdd("25011a"), "invalid date format")?;
        check_err_contains(parse_yymmdd("251301"), "invalid month")?;
        check_err_contains(parse_yymmdd("250230"), "invalid day")
    }

    #[test]
    fn fall_back_to_the_modification_date() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let photo = temp.child("IMG_001.jpg");
        photo.write_str("not really a JPEG")?;
        set_modified(&photo, datetime!(2025-01-18 14:30:45 UTC))?;
        let modified = photo.metadata()?.modified()?;
        let resolver = DateResolver::new(UtcOffset::UTC);
        assert_eq!(resolver.resolve(&photo, modified), date!(2025-01-18));
        Ok(())
    }

    #[test]
    fn modification_date_uses_the_local_offset() -> anyhow::Result<()> {
        let modified = datetime!(2025-01-18 23:30:00 UTC).into();
        let paris = UtcOffset::from_hms(1, 0, 0)?;
        assert_eq!(DateResolver::new(paris).modification_date(modified), date!(2025-01-19));
        assert_eq!(
            DateResolver::new(UtcOffset::UTC).modification_date(modified),
            date!(2025-01-18)
        );
        Ok(())
    }

    #[test]
    fn missing_file_falls_back_too() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let modified = datetime!(2024-06-01 08:00:00 UTC).into();
        let resolver = DateResolver::new(UtcOffset::UTC);
        assert_eq!(resolver.resolve(&temp.child("gone.jpg"), modified), date!(2024-06-01));
        Ok(())
    }

    #[test]
    fn exif_original_date_comes_first() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let scan = temp.child("scan.tif");
        write_exif_tiff(
            &scan,
            &[
                (Tag::DateTime, "2025:03:04 10:00:00"),
                (Tag::DateTimeOriginal, "2024:12:31 23:59:59"),
            ],
        )?;
        let modified = datetime!(2025-01-18 14:30:45 UTC).into();
        let resolver = DateResolver::new(UtcOffset::UTC);
        assert_eq!(resolver.resolve(&scan, modified), date!(2024-12-31));
        Ok(())
    }

    #[test]
    fn blank_exif_date_is_skipped() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let scan = temp.child("scan.tif");
        write_exif_tiff(
            &scan,
            &[
                (Tag::DateTimeOriginal, "0000:00:00 00:00:00"),
                (Tag::DateTime, "2025:03:04 10:00:00"),
            ],
        )?;
        let modified = datetime!(2025-01-18 14:30:45 UTC).into();
        let resolver = DateResolver::new(UtcOffset::UTC);
        assert_eq!(resolver.resolve(&scan, modified), date!(2025-03-04));
        Ok(())
    }
}
