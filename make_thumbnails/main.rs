use std::env;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use clap::Parser;
use common::{init_logging, quote, write_elapsed_time};
use make_thumbnails::config::Config;
use make_thumbnails::naming::{ExtCase, Naming};
use make_thumbnails::{Options, work};

const CONFIG_FILE_NAME: &str = "make_thumbnails.toml";

#[derive(Parser)]
#[command(version)]
/// Make thumbnails of the images of a directory, keeping their aspect ratio.
///
/// The thumbnail size comes from a preset of the configuration file, from `--width` and
/// `--height`, or else from the default size of the configuration file. The output names are
/// `prefix + name + postfix + extension`, where `{size}` in the prefix or the postfix is replaced
/// by the size abbreviation, for example `--postfix _{size}` gives `photo_md.jpg`.
///
/// Subdirectories are ignored. Existing thumbnails are never overwritten.
struct Cli {
    /// Directory which contains the images
    source: PathBuf,

    /// Directory which receives the thumbnails
    output: PathBuf,

    /// Size preset defined in the configuration file
    #[arg(short, long, conflicts_with = "width")]
    preset: Option<String>,

    /// Maximum width of the thumbnails
    #[arg(short, long, requires = "height")]
    width: Option<u32>,

    /// Maximum height of the thumbnails
    #[arg(short = 'H', long, requires = "width")]
    height: Option<u32>,

    /// Prefix of the output names, without postfix
    #[arg(long, group = "naming")]
    prefix: Option<String>,

    /// Postfix of the output names, without prefix
    #[arg(long, group = "naming")]
    postfix: Option<String>,

    /// Give the thumbnails the names of the images
    #[arg(long, group = "naming")]
    keep_name: bool,

    /// JPEG quality
    #[arg(
        short,
        long,
        default_value_t = 85,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    quality: u8,

    /// Case of the output extensions [default: from the configuration file]
    #[arg(long, value_enum)]
    ext_case: Option<ExtCase>,

    /// Configuration file [default: make_thumbnails.toml next to the executable]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let start = Instant::now();
    let cli = Cli::parse();
    let mut out = io::stdout().lock();

    let config_path = match cli.config {
        Some(path) => path,
        None => env::current_exe()
            .context("failed to get the path of the executable")?
            .with_file_name(CONFIG_FILE_NAME),
    };
    let config = Config::load(&config_path, &mut out)?;

    let dimensions = cli.width.zip(cli.height);
    let size = config.select_size(cli.preset.as_deref(), dimensions)?;
    if let Some(preset) = &cli.preset {
        writeln!(out, "Using preset: {} ({}x{})", quote(preset), size.width, size.height)
            .context("failed to write to stdout")?;
    }

    let naming = Naming::select(cli.prefix, cli.postfix, cli.keep_name, &config);

    let options = Options {
        source: cli.source,
        output: cli.output,
        size,
        naming,
        ext_case: cli.ext_case.unwrap_or(config.ext_case),
        quality: cli.quality,
    };
    work(&options, &mut out)?;
    write_elapsed_time(out, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory as _;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(["make_thumbnails", "src", "out"].iter().chain(args))
    }

    #[test]
    fn command_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn naming_options_exclude_each_other() {
        assert!(parse(&["--prefix", "t_", "--postfix", "_t"]).is_err());
        assert!(parse(&["--keep-name", "--prefix", "t_"]).is_err());
        assert!(parse(&["--keep-name", "--postfix", "_t"]).is_err());
    }

    #[test]
    fn width_and_height_go_together() {
        assert!(parse(&["-w", "100"]).is_err());
        assert!(parse(&["-H", "100"]).is_err());
        assert!(parse(&["-p", "small", "-w", "100", "-H", "100"]).is_err());
    }

    #[test]
    fn quality_is_between_1_and_100() {
        assert!(parse(&["-q", "0"]).is_err());
        assert!(parse(&["-q", "101"]).is_err());
    }

    #[test]
    fn valid_command_lines() -> anyhow::Result<()> {
        let cli = parse(&[])?;
        assert_eq!(cli.quality, 85);
        assert!(cli.prefix.is_none() && cli.postfix.is_none() && !cli.keep_name);
        let cli = parse(&["-w", "320", "-H", "240", "--postfix", "_{size}", "-q", "100"])?;
        assert_eq!(cli.width.zip(cli.height), Some((320, 240)));
        assert_eq!(cli.postfix.as_deref(), Some("_{size}"));
        let cli = parse(&["-p", "small", "--keep-name", "--ext-case", "upper"])?;
        assert_eq!(cli.preset.as_deref(), Some("small"));
        assert_eq!(cli.ext_case, Some(ExtCase::Upper));
        Ok(())
    }
}
