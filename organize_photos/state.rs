//! Sync state persisted in the destination root: which destination keys were already copied, and
//! when the last run finished.
//!
//! The file looks like:
//!
//! ```json
//! {
//!   "last_sync": "2025-01-20T09:15:00",
//!   "copied_files": {
//!     "250118/IMG_001.jpg": "2025-01-20T09:15:00"
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use common::{new_temp_file_in, quote, quote_path};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt as _, Snafu};
use time::PrimitiveDateTime;
use time::macros::format_description;

/// Deleting this file resets the incremental state.
pub const STATE_FILE_NAME: &str = ".photo_organizer_state.json";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub last_sync: Option<PrimitiveDateTime>,
    /// Destination key (`YYMMDD/file_name`) → copy timestamp.
    pub records: BTreeMap<String, PrimitiveDateTime>,
}

#[derive(Debug, Snafu)]
pub enum LoadStateError {
    #[snafu(display("failed to read the sync state file {}", quote_path(path)))]
    Read { source: io::Error, path: PathBuf },
    #[snafu(display(
        "the sync state file {} is corrupt: fix it or delete it to reset the incremental state",
        quote_path(path)
    ))]
    Corrupt { source: serde_json::Error, path: PathBuf },
}

#[derive(Debug, Snafu)]
pub enum SaveStateError {
    #[snafu(display("failed to serialize the sync state"))]
    Serialize { source: serde_json::Error },
    #[snafu(display("failed to write a temporary file in {}", quote_path(dir)))]
    WriteTemp { source: io::Error, dir: PathBuf },
    #[snafu(display("failed to replace the sync state file {}", quote_path(path)))]
    Replace { source: tempfile::PersistError, path: PathBuf },
}

#[must_use]
pub fn state_file_path(destination_root: &Path) -> PathBuf {
    destination_root.join(STATE_FILE_NAME)
}

impl SyncState {
    /// A missing file is an empty state. A file which cannot be read or parsed is an error: the
    /// caller must not go on and overwrite real sync history.
    pub fn load(destination_root: &Path) -> Result<Self, LoadStateError> {
        let path = state_file_path(destination_root);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(error).context(ReadSnafu { path }),
        };
        let file: StateFile = serde_json::from_slice(&content).context(CorruptSnafu { path })?;
        Ok(file.into())
    }

    /// Sets `last_sync` to `now` and replaces the state file atomically.
    pub fn save(
        &mut self,
        destination_root: &Path,
        now: PrimitiveDateTime,
    ) -> Result<(), SaveStateError> {
        self.last_sync = Some(now);
        let path = state_file_path(destination_root);
        let content =
            serde_json::to_vec_pretty(&StateFile::from(&*self)).context(SerializeSnafu)?;
        let temp_file = new_temp_file_in(destination_root)
            .and_then(|mut temp_file| {
                temp_file.write_all(&content)?;
                temp_file.as_file().sync_all()?;
                Ok(temp_file)
            })
            .context(WriteTempSnafu { dir: destination_root })?;
        temp_file.persist(&path).context(ReplaceSnafu { path })?;
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Only changes the state in memory. Nothing is persisted before [`SyncState::save`].
    pub fn record_copy(&mut self, key: String, timestamp: PrimitiveDateTime) {
        self.records.insert(key, timestamp);
    }
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    last_sync: Option<Timestamp>,
    #[serde(default)]
    copied_files: BTreeMap<String, Timestamp>,
}

impl From<StateFile> for SyncState {
    fn from(file: StateFile) -> Self {
        Self {
            last_sync: file.last_sync.map(|Timestamp(datetime)| datetime),
            records: file
                .copied_files
                .into_iter()
                .map(|(key, Timestamp(datetime))| (key, datetime))
                .collect(),
        }
    }
}

impl From<&SyncState> for StateFile {
    fn from(state: &SyncState) -> Self {
        Self {
            last_sync: state.last_sync.map(Timestamp),
            copied_files: state
                .records
                .iter()
                .map(|(key, &datetime)| (key.clone(), Timestamp(datetime)))
                .collect(),
        }
    }
}

/// ISO 8601 local datetime. The fraction of a second is written only when it is not zero, with as
/// many digits as needed, so that reading back gives the same value.
#[derive(Clone, Copy)]
struct Timestamp(PrimitiveDateTime);

impl fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let datetime = self.0;
        let result = if datetime.nanosecond() == 0 {
            datetime.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
        } else {
            datetime.format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"
            ))
        };
        formatter.write_str(&result.map_err(|_| fmt::Error)?)
    }
}

impl Timestamp {
    fn parse(text: &str) -> Result<Self, time::error::Parse> {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        )
        .or_else(|_| {
            PrimitiveDateTime::parse(
                text,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .map(Self)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(|error| {
            serde::de::Error::custom(format_args!("invalid datetime {}: {error}", quote(&text)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_fs::TempDir;
    use assert_fs::fixture::{FileWriteStr as _, PathChild as _, PathCreateDir as _};
    use time::macros::datetime;

    use test_helper::{Check as _, check_err_contains};

    #[test]
    fn missing_file_is_an_empty_state() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let state = SyncState::load(&temp)?;
        assert_eq!(state, SyncState::default());
        assert_eq!(state.last_sync, None);
        Ok(())
    }

    #[test]
    fn save_then_load_gives_the_same_state() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut state = SyncState::default();
        state.record_copy("250118/IMG_001.jpg".to_owned(), datetime!(2025-01-20 09:15:00));
        state.record_copy("250119/IMG_002.jpg".to_owned(), datetime!(2025-01-20 09:15:00.123456));
        state.save(&temp, datetime!(2025-01-20 09:16:07.000000001))?;
        let loaded = SyncState::load(&temp)?;
        assert_eq!(loaded, state);
        assert_eq!(loaded.last_sync, Some(datetime!(2025-01-20 09:16:07.000000001)));
        Ok(())
    }

    #[test]
    fn saved_file_has_the_documented_layout() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut state = SyncState::default();
        state.record_copy("250118/IMG_001.jpg".to_owned(), datetime!(2025-01-20 09:15:00));
        state.save(&temp, datetime!(2025-01-20 09:15:00))?;
        temp.child(STATE_FILE_NAME).check_is_file_with_content(
            r#"{
  "last_sync": "2025-01-20T09:15:00",
  "copied_files": {
    "250118/IMG_001.jpg": "2025-01-20T09:15:00"
  }
}"#,
        )?;
        temp.check_dir_contains_exactly([STATE_FILE_NAME])
    }

    #[test]
    #[cfg(unix)]
    fn saved_file_has_plain_permissions() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        SyncState::default().save(&temp, datetime!(2025-01-20 09:15:00))?;
        temp.child(STATE_FILE_NAME).check_has_plain_file_permissions()
    }

    #[test]
    fn save_replaces_the_previous_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut state = SyncState::default();
        state.record_copy("250118/a.jpg".to_owned(), datetime!(2025-01-20 09:15:00));
        state.save(&temp, datetime!(2025-01-20 09:15:00))?;
        state.record_copy("250118/b.jpg".to_owned(), datetime!(2025-01-21 10:00:00));
        state.save(&temp, datetime!(2025-01-21 10:00:00))?;
        let loaded = SyncState::load(&temp)?;
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.last_sync, Some(datetime!(2025-01-21 10:00:00)));
        Ok(())
    }

    #[test]
    fn load_accepts_microseconds_and_missing_last_sync() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        temp.child(STATE_FILE_NAME).write_str(
            r#"{"copied_files": {"250118/IMG_001.jpg": "2025-01-18T14:30:45.123456"}, "extra": 1}"#,
        )?;
        let state = SyncState::load(&temp)?;
        assert_eq!(state.last_sync, None);
        assert!(state.contains("250118/IMG_001.jpg"));
        assert_eq!(state.records["250118/IMG_001.jpg"], datetime!(2025-01-18 14:30:45.123456));
        Ok(())
    }

    #[test]
    fn unparseable_file_is_corrupt() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        temp.child(STATE_FILE_NAME).write_str("{not json")?;
        let result = SyncState::load(&temp);
        assert!(matches!(result, Err(LoadStateError::Corrupt { .. })));
        check_err_contains(result, "Corrupt")?;
        temp.child(STATE_FILE_NAME).check_is_file_with_content("{not json")
    }

    #[test]
    fn invalid_datetime_is_corrupt() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        temp.child(STATE_FILE_NAME)
            .write_str(r#"{"last_sync": "yesterday", "copied_files": {}}"#)?;
        let result = SyncState::load(&temp);
        assert!(matches!(result, Err(LoadStateError::Corrupt { .. })));
        Ok(())
    }

    #[test]
    fn directory_in_place_of_the_file_is_unreadable() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        temp.child(STATE_FILE_NAME).create_dir_all()?;
        let result = SyncState::load(&temp);
        assert!(matches!(result, Err(LoadStateError::Read { .. })));
        Ok(())
    }
}
