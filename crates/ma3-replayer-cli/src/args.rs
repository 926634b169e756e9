//! Command-line argument parsing for the ringtone renderer.
//!
//! This module handles parsing and validation of CLI arguments including:
//! - Input file and output path
//! - Export overrides (sample rate, length limit, loop count)
//! - JSON configuration file
//! - Log verbosity

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    /// MLD or SMAF file to render
    pub file_path: Option<String>,
    /// WAV output path (default: input path with a `.wav` extension)
    pub output: Option<String>,
    /// Output sample rate override
    pub sample_rate: Option<u32>,
    /// Length limit override in seconds
    pub max_seconds: Option<f32>,
    /// Extra loop passes override
    pub loops: Option<u32>,
    /// JSON file with `sampler` and `export` sections
    pub config_path: Option<String>,
    /// Number of `-v` flags
    pub verbosity: u8,
    /// Whether help was requested (or the arguments were invalid)
    pub show_help: bool,
}

impl CliArgs {
    /// Parse arguments from command line.
    pub fn parse() -> Self {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse arguments from an iterator (program name already skipped).
    pub fn parse_from<I: IntoIterator<Item = String>>(items: I) -> Self {
        let mut args = Self::default();
        let mut iter = items.into_iter();

        while let Some(arg) = iter.next() {
            // `--flag=value` is accepted as well as `--flag value`
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if arg.starts_with("--") => {
                    (flag.to_string(), Some(value.to_string()))
                }
                _ => (arg.clone(), None),
            };
            let mut value = || inline.clone().or_else(|| iter.next());

            match flag.as_str() {
                "--help" | "-h" => args.show_help = true,
                "-v" | "--verbose" => args.verbosity = args.verbosity.saturating_add(1),
                "-vv" => args.verbosity = args.verbosity.saturating_add(2),
                "-o" | "--output" => match value() {
                    Some(path) => args.output = Some(path),
                    None => args.invalid("--output requires a path"),
                },
                "--config" => match value() {
                    Some(path) => args.config_path = Some(path),
                    None => args.invalid("--config requires a path"),
                },
                "--rate" => args.sample_rate = args.number(&flag, value()),
                "--seconds" => args.max_seconds = args.number(&flag, value()),
                "--loops" => args.loops = args.number(&flag, value()),
                _ if flag.starts_with('-') => args.invalid(&format!("Unknown flag: {arg}")),
                _ => {
                    if args.file_path.is_some() {
                        args.invalid(&format!("Unexpected argument: {arg}"));
                    } else {
                        args.file_path = Some(arg);
                    }
                }
            }
        }

        args
    }

    fn invalid(&mut self, message: &str) {
        eprintln!("{message}");
        self.show_help = true;
    }

    fn number<T: FromStr>(&mut self, flag: &str, value: Option<String>) -> Option<T> {
        let Some(value) = value else {
            self.invalid(&format!("{flag} requires a number"));
            return None;
        };
        match value.parse() {
            Ok(number) => Some(number),
            Err(_) => {
                self.invalid(&format!("Invalid value for {flag}: {value}"));
                None
            }
        }
    }

    /// Where the WAV file goes.
    pub fn output_path(&self) -> Option<PathBuf> {
        match (&self.output, &self.file_path) {
            (Some(output), _) => Some(PathBuf::from(output)),
            (None, Some(input)) => Some(PathBuf::from(input).with_extension("wav")),
            (None, None) => None,
        }
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  ma3-render [options] <file.mld|file.mmf>\n\n\
             Options:\n\
             \x20 -o, --output <path>   WAV file to write (default: input name with .wav)\n\
             \x20 --rate <hz>           Output sample rate (default 44100)\n\
             \x20 --seconds <s>         Stop after this many seconds (default 600)\n\
             \x20 --loops <n>           Extra passes through the loop section (MLD)\n\
             \x20 --config <file.json>  Load sampler and export settings\n\
             \x20 -v, -vv               More log output on stderr\n\
             \x20 -h, --help            Show this help\n\n\
             Supported Formats:\n\
             \x20 MLD (i-melody), SMAF/MMF (Handy-Phone Standard)\n\n\
             Examples:\n\
             \x20 ma3-render ring.mmf                 # Writes ring.wav\n\
             \x20 ma3-render --loops 2 -o out.wav tune.mld\n"
        );
    }
}
