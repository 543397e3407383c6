//! Collision-free destination paths: `photo.jpg`, then `photo_1.jpg`, `photo_2.jpg`...

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use common::quote_path;
use snafu::{ResultExt as _, Snafu};

pub const MAX_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Snafu)]
pub enum NamingError {
    #[snafu(display("no free name for {} after {attempts} attempts", quote_path(desired)))]
    Exhausted { desired: PathBuf, attempts: u32 },
    #[snafu(display("failed to check whether {} exists", quote_path(path)))]
    CheckExists { source: io::Error, path: PathBuf },
}

/// Remembers every path it handed out, so that two files of the same run never get the same path,
/// even before the first one is written.
#[derive(Debug)]
pub struct CollisionResolver {
    claimed: HashSet<PathBuf>,
    max_attempts: u32,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self::with_max_attempts(MAX_ATTEMPTS)
    }
}

impl CollisionResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { claimed: HashSet::new(), max_attempts }
    }

    /// Returns `desired` if it is free, else the first free numbered variant. The result is
    /// claimed for the rest of the run.
    pub fn resolve(&mut self, desired: &Path) -> Result<PathBuf, NamingError> {
        if self.is_free(desired)? {
            return Ok(self.claim(desired.to_owned()));
        }
        for counter in 1..=self.max_attempts {
            let candidate = numbered(desired, counter);
            if self.is_free(&candidate)? {
                return Ok(self.claim(candidate));
            }
        }
        ExhaustedSnafu { desired, attempts: self.max_attempts }.fail()
    }

    fn is_free(&self, path: &Path) -> Result<bool, NamingError> {
        if self.claimed.contains(path) {
            return Ok(false);
        }
        // `symlink_metadata`, so that a dangling symlink counts as taken.
        match path.symlink_metadata() {
            Ok(_) => Ok(false),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(error) => Err(error).context(CheckExistsSnafu { path }),
        }
    }

    fn claim(&mut self, path: PathBuf) -> PathBuf {
        self.claimed.insert(path.clone());
        path
    }
}

fn numbered(path: &Path, counter: u32) -> PathBuf {
    let mut file_name = path.file_stem().unwrap_or_default().to_owned();
    file_name.push(format!("_{counter}"));
    if let Some(extension) = path.extension() {
        file_name.push(".");
        file_name.push(extension);
    }
    path.with_file_name(file_name)
}
