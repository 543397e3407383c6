//! `make_thumbnails.toml`: default size, naming and presets.
//!
//! ```toml
//! thumbnail_width = 800
//! thumbnail_height = 600
//! prefix = ""
//! postfix = "_thumb"
//! ext_case = "lower"
//!
//! [sizes]
//! "150" = "xs"
//!
//! [presets.md]
//! width = 800
//! height = 600
//! abbr = "md"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context as _, bail, ensure};
use common::{quote, quote_path};
use serde::Deserialize;
use tracing::warn;

use crate::naming::ExtCase;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub prefix: String,
    pub postfix: String,
    pub ext_case: ExtCase,
    /// Width → size abbreviation, overriding the built-in thresholds.
    pub sizes: BTreeMap<String, String>,
    pub presets: BTreeMap<String, Preset>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thumbnail_width: 800,
            thumbnail_height: 600,
            prefix: String::new(),
            postfix: "_thumb".to_owned(),
            ext_case: ExtCase::Lower,
            sizes: BTreeMap::new(),
            presets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub width: u32,
    pub height: u32,
    /// Defaults to the preset name.
    pub abbr: Option<String>,
}

impl Default for Preset {
    fn default() -> Self {
        Self { width: 800, height: 600, abbr: None }
    }
}

/// Bounding box of the thumbnails, and the abbreviation substituted for `{size}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
    pub abbr: String,
}

impl Config {
    /// Falls back to the defaults when the file is missing or invalid.
    pub fn load(path: &Path, mut out: impl Write) -> anyhow::Result<Self> {
        let result = match fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Self>(&content).map_err(anyhow::Error::from),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                writeln!(out, "Config file not found: {}\nUsing default settings", quote_path(path))
                    .context("failed to write to stdout")?;
                return Ok(Self::default());
            }
            Err(error) => Err(error.into()),
        };
        match result {
            Ok(config) => {
                writeln!(out, "Loaded configuration from: {}", quote_path(path))
                    .context("failed to write to stdout")?;
                Ok(config)
            }
            Err(error) => {
                warn!("could not read the config file {}: {error:#}", quote_path(path));
                writeln!(out, "Using default settings").context("failed to write to stdout")?;
                Ok(Self::default())
            }
        }
    }

    #[must_use]
    pub fn size_abbr(&self, width: u32) -> String {
        if let Some(abbr) = self.sizes.get(&width.to_string()) {
            return abbr.clone();
        }
        match width {
            0..=200 => "xs",
            201..=400 => "sm",
            401..=800 => "md",
            801..=1200 => "lg",
            _ => "xl",
        }
        .to_owned()
    }

    pub fn preset(&self, name: &str) -> anyhow::Result<Size> {
        let Some(preset) = self.presets.get(name) else {
            bail!("preset {} not found in the configuration", quote(name));
        };
        let abbr = preset.abbr.clone().unwrap_or_else(|| name.to_owned());
        Ok(Size { width: preset.width, height: preset.height, abbr })
    }

    /// A preset, else an explicit width and height, else the configured default size.
    pub fn select_size(
        &self,
        preset: Option<&str>,
        dimensions: Option<(u32, u32)>,
    ) -> anyhow::Result<Size> {
        let size = match (preset, dimensions) {
            (Some(_), Some(_)) => bail!("a preset and explicit dimensions cannot be combined"),
            (Some(name), None) => self.preset(name)?,
            (None, Some((width, height))) => Size { width, height, abbr: self.size_abbr(width) },
            (None, None) => Size {
                width: self.thumbnail_width,
                height: self.thumbnail_height,
                abbr: self.size_abbr(self.thumbnail_width),
            },
        };
        ensure!(
            size.width > 0 && size.height > 0,
            "invalid thumbnail size {}x{}: both dimensions must be positive",
            size.width,
            size.height
        );
        Ok(size)
    }
}
