use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::dispatch::Options;
use crate::encoder::DEFAULT_ENCODER;

/// Multi-letter short flags accepted for compatibility, and their long forms
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("-sd", "--source_directory"),
    ("-bu", "--build"),
    ("-dd", "--destination_directory"),
    ("-sf", "--source_file"),
    ("-df", "--destination_file"),
];

/// Build videos from rendered camera frames and upload files to S3.
#[derive(Parser, Debug)]
#[command(name = "sdg-utils", version, about)]
pub struct Args {
    /// Path to source folder to build videos in and/or copy from (-sd)
    #[arg(long = "source_directory", alias = "source-directory")]
    pub source_directory: Option<PathBuf>,

    /// Build videos in the source folder (-bu)
    #[arg(long = "build")]
    pub build: bool,

    /// Format of files to match and upload from the source folder
    #[arg(short = 'f', long = "format_to_copy", alias = "format-to-copy")]
    pub format_to_copy: Option<String>,

    /// Destination folder in the S3 bucket (-dd)
    #[arg(long = "destination_directory", alias = "destination-directory")]
    pub destination_directory: Option<String>,

    /// Path to a single source file to copy (-sf)
    #[arg(long = "source_file", alias = "source-file")]
    pub source_file: Option<PathBuf>,

    /// Destination key for the single source file (-df)
    #[arg(long = "destination_file", alias = "destination-file")]
    pub destination_file: Option<String>,

    /// S3 bucket to copy data to
    #[arg(short = 'b', long = "bucket")]
    pub bucket: Option<String>,

    /// Encoder program used to build videos
    #[arg(long, env = "SDG_ENCODER", default_value = DEFAULT_ENCODER)]
    pub encoder: PathBuf,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    /// Parse the process arguments, accepting the legacy short flags
    pub fn from_env() -> Self {
        Args::parse_from(normalize_legacy_flags(std::env::args_os()))
    }

    pub fn options(&self) -> Options {
        Options {
            build: self.build,
            source_directory: self.source_directory.clone(),
            format_to_copy: self.format_to_copy.clone(),
            destination_directory: self.destination_directory.clone(),
            source_file: self.source_file.clone(),
            destination_file: self.destination_file.clone(),
            bucket: self.bucket.clone().filter(|b| !b.is_empty()),
        }
    }
}

/// Rewrite `-sd dir` and `-sd=dir` style flags into their long forms
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut seen_terminator = false;

    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if seen_terminator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                seen_terminator = true;
                return arg;
            }

            let (flag, value) = match text.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (text, None),
            };

            match LEGACY_FLAGS.iter().find(|(short, _)| *short == flag) {
                Some((_, long)) => match value {
                    Some(v) => OsString::from(format!("{}={}", long, v)),
                    None => OsString::from(*long),
                },
                None => arg,
            }
        })
        .collect()
}
