//! Remembered command-line values, so that `organize_photos` alone repeats the last sync.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use common::quote_path;
use home::home_dir;
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::warn;

use crate::date::{folder_name, parse_yymmdd};

pub const CONFIG_FILE_NAME: &str = ".organize_photos.json";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConfig {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    /// `YYMMDD`
    pub start_date: Option<String>,
}

/// What the command line provided.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub start_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub start_date: Option<Date>,
    pub from_saved_config: bool,
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let home_path = home_dir().context("failed to get the home directory path")?;
    Ok(home_path.join(CONFIG_FILE_NAME))
}

impl SavedConfig {
    /// The configuration is a convenience: a missing, unreadable or malformed file is an empty
    /// configuration.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(error) => {
                warn!("failed to read the configuration file {}: {error}", quote_path(path));
                return Self::default();
            }
        };
        serde_json::from_slice(&content).unwrap_or_else(|error| {
            warn!("ignoring the malformed configuration file {}: {error}", quote_path(path));
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content =
            serde_json::to_vec_pretty(self).context("failed to serialize the configuration")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write the configuration file {}", quote_path(path)))
    }

    /// Command-line values win over saved ones.
    pub fn merge(&self, overrides: &Overrides) -> anyhow::Result<Resolved> {
        let source = overrides.source.clone().or_else(|| self.source.clone());
        let destination = overrides.destination.clone().or_else(|| self.destination.clone());
        let (Some(source), Some(destination)) = (source, destination) else {
            bail!(
                "the source and destination directories are required: give them on the command \
                 line once, they are saved for the next runs"
            );
        };
        let start_date = match overrides.start_date {
            Some(start_date) => Some(start_date),
            None => self.saved_start_date(),
        };
        let from_saved_config = overrides.source.is_none() || overrides.destination.is_none();
        Ok(Resolved { source, destination, start_date, from_saved_config })
    }

    fn saved_start_date(&self) -> Option<Date> {
        let text = self.start_date.as_deref()?;
        parse_yymmdd(text)
            .inspect_err(|error| warn!("ignoring the saved start date: {error:#}"))
            .ok()
    }
}

impl Overrides {
    /// Whether the command line brought something worth saving.
    #[must_use]
    pub const fn has_new_values(&self) -> bool {
        self.source.is_some() || self.destination.is_some() || self.start_date.is_some()
    }
}

impl Resolved {
    /// Saves the configuration to `path` when the command line brought new values, so that a run
    /// from the saved configuration leaves the file untouched. Returns whether it was saved.
    pub fn remember(&self, path: &Path, overrides: &Overrides) -> anyhow::Result<bool> {
        if !overrides.has_new_values() {
            return Ok(false);
        }
        SavedConfig::from(self).save(path)?;
        Ok(true)
    }
}

impl From<&Resolved> for SavedConfig {
    fn from(resolved: &Resolved) -> Self {
        Self {
            source: Some(resolved.source.clone()),
            destination: Some(resolved.destination.clone()),
            start_date: resolved.start_date.map(folder_name),
        }
    }
}
