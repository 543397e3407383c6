//! Copy or skip: the incremental-sync decision for one source file

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use time::Date;

use crate::date::folder_name;
use crate::state::SyncState;

/// A photo found in the source tree, with its resolved creation date.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Relative to the source root.
    pub relative_path: PathBuf,
    pub file_name: String,
    pub modified: SystemTime,
    pub date: Date,
}

impl SourceFile {
    #[must_use]
    pub fn folder(&self) -> String {
        folder_name(self.date)
    }

    /// `YYMMDD/file_name`, before any collision renaming.
    #[must_use]
    pub fn candidate_key(&self) -> String {
        candidate_key(&self.folder(), &self.file_name)
    }
}

#[must_use]
pub fn candidate_key(folder: &str, file_name: &str) -> String {
    format!("{folder}/{file_name}")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Filters {
    pub start_date: Option<Date>,
    pub force_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Copy { folder: String },
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyCopied,
    BeforeStartDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::AlreadyCopied => "already copied",
            Self::BeforeStartDate => "before the start date",
        })
    }
}

/// `force_all` copies everything. Otherwise a start date selects by date alone, ignoring what was
/// already copied. Without a start date, a file is copied unless its candidate key is recorded.
#[must_use]
pub fn should_copy(file: &SourceFile, state: &SyncState, filters: Filters) -> Decision {
    let folder = file.folder();
    if filters.force_all {
        return Decision::Copy { folder };
    }
    if let Some(start_date) = filters.start_date {
        return if file.date >= start_date {
            Decision::Copy { folder }
        } else {
            Decision::Skip(SkipReason::BeforeStartDate)
        };
    }
    if state.contains(&candidate_key(&folder, &file.file_name)) {
        Decision::Skip(SkipReason::AlreadyCopied)
    } else {
        Decision::Copy { folder }
    }
}
