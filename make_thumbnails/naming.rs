//! Output file names: `prefix + stem + postfix + extension`

use std::ffi::OsStr;
use std::path::Path;

use clap::ValueEnum;
use serde::Deserialize;

use crate::config::Config;

/// Replaced by the size abbreviation (`xs`, `md`...) in prefixes and postfixes.
pub const SIZE_TOKEN: &str = "{size}";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtCase {
    #[default]
    Lower,
    Upper,
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Naming {
    KeepName,
    Affixes { prefix: String, postfix: String },
}

#[must_use]
pub fn substitute(template: &str, size_abbr: &str) -> String {
    template.replace(SIZE_TOKEN, size_abbr)
}

impl Naming {
    /// At most one of `prefix`, `postfix` and `keep_name` comes from the command line. A prefix
    /// alone has no postfix and vice versa. Without any, the configured prefix and postfix apply
    /// together.
    #[must_use]
    pub fn select(
        prefix: Option<String>,
        postfix: Option<String>,
        keep_name: bool,
        config: &Config,
    ) -> Self {
        match (prefix, postfix) {
            _ if keep_name => Self::KeepName,
            (Some(prefix), _) => Self::Affixes { prefix, postfix: String::new() },
            (None, Some(postfix)) => Self::Affixes { prefix: String::new(), postfix },
            (None, None) => {
                Self::Affixes { prefix: config.prefix.clone(), postfix: config.postfix.clone() }
            }
        }
    }

    #[must_use]
    pub fn output_name(&self, input_name: &str, size_abbr: &str, ext_case: ExtCase) -> String {
        let Self::Affixes { prefix, postfix } = self else {
            return input_name.to_owned();
        };
        let (stem, extension) = split_extension(input_name);
        let extension = match ext_case {
            ExtCase::Lower => extension.to_lowercase(),
            ExtCase::Upper => extension.to_uppercase(),
            ExtCase::Preserve => extension,
        };
        let prefix = substitute(prefix, size_abbr);
        let postfix = substitute(postfix, size_abbr);
        format!("{prefix}{stem}{postfix}{extension}")
    }
}

/// `"a.b.jpg"` → `("a.b", ".jpg")`, following [`Path::file_stem`] and [`Path::extension`].
fn split_extension(file_name: &str) -> (&str, String) {
    let path = Path::new(file_name);
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or(file_name);
    let extension = path.extension().and_then(OsStr::to_str);
    (stem, extension.map_or_else(String::new, |extension| format!(".{extension}")))
}
