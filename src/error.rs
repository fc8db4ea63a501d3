use std::path::PathBuf;
use thiserror::Error;

use crate::upload::UploadError;

/// Operation-level errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid source_directory passed: {}", .0.display())]
    InvalidSourceDirectory(PathBuf),

    #[error("Invalid source_directory passed: no source directory given")]
    MissingSourceDirectory,

    #[error("Invalid source_file passed: {}", .0.display())]
    InvalidSourceFile(PathBuf),

    #[error("No format_to_copy given, nothing to match in the source directory")]
    MissingFormat,

    #[error("Camera folder name {0:?} needs at least two '_' separators and a non-empty remainder")]
    MalformedCameraFolder(String),

    #[error("Camera identifier {camera:?} is already used by {}", .first.display())]
    DuplicateCamera { camera: String, first: PathBuf },

    #[error("Failed to create log directory {}", .path.display())]
    LogDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] UploadError),

    #[error("Failed to create log file {}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
