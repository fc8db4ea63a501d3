use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};

use crate::build::VideoBuilder;
use crate::error::{Error, Result};
use crate::report::{BuildReport, FileUpload, RunReport, UploadBatch};
use crate::resolver::find_matching;
use crate::upload::{prefixed_key, upload_file, ObjectUploader, UploadError};

/// What a single invocation was asked to do
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub build: bool,
    pub source_directory: Option<PathBuf>,
    pub format_to_copy: Option<String>,
    pub destination_directory: Option<String>,
    pub source_file: Option<PathBuf>,
    pub destination_file: Option<String>,
    pub bucket: Option<String>,
}

/// Runs the build step, then the uploads
pub struct Dispatcher {
    builder: VideoBuilder,
}

impl Dispatcher {
    pub fn new(builder: VideoBuilder) -> Self {
        Dispatcher { builder }
    }

    /// Run everything `opts` asks for.
    ///
    /// `connect` creates the storage client. It is called once, after the
    /// build step, and only when a bucket and something to upload are given.
    pub fn run<U, F>(&self, opts: &Options, connect: F) -> Result<RunReport>
    where
        U: ObjectUploader,
        F: FnOnce() -> std::result::Result<U, UploadError>,
    {
        let mut report = RunReport::new();

        if opts.build {
            report.build = Some(match &opts.source_directory {
                Some(dir) => self.builder.build(dir)?,
                None => {
                    let e = Error::MissingSourceDirectory;
                    error!("{}", e);
                    BuildReport {
                        log_dir: self.builder.config().log_dir.clone(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            });
        }

        if let Some(bucket) = opts.bucket.as_deref() {
            if opts.source_directory.is_some() || opts.source_file.is_some() {
                let uploader = connect()?;

                if let Some(dir) = &opts.source_directory {
                    report.directory_upload = Some(upload_directory(
                        &uploader,
                        dir,
                        opts.format_to_copy.as_deref(),
                        opts.destination_directory.as_deref(),
                        bucket,
                    ));
                }
                if let Some(file) = &opts.source_file {
                    report.file_upload = Some(upload_single(
                        &uploader,
                        file,
                        opts.destination_file.as_deref(),
                        bucket,
                    ));
                }
            } else {
                warn!(
                    "Bucket {} given without a source_directory or source_file, nothing to upload",
                    bucket
                );
            }
        }

        report.finish();
        Ok(report)
    }
}

/// Upload every file under `dir` ending with `.<format>`, one at a time
pub fn upload_directory(
    uploader: &dyn ObjectUploader,
    dir: &Path,
    format: Option<&str>,
    prefix: Option<&str>,
    bucket: &str,
) -> UploadBatch {
    let span = info_span!("upload", bucket);
    let _guard = span.enter();

    let mut batch = UploadBatch {
        source_directory: dir.to_path_buf(),
        ..Default::default()
    };

    let files = match find_matching(dir, format.unwrap_or("")) {
        Ok(files) => files,
        Err(e) => {
            error!("{}", e);
            batch.error = Some(e.to_string());
            return batch;
        }
    };

    info!("Total files to copy - {}", files.len());
    for file in files {
        info!("Copying file {}", file.display());
        let key = prefixed_key(&file, prefix);
        batch
            .outcomes
            .push(upload_file(uploader, &file, bucket, Some(&key)));
    }

    batch
}

/// Upload one file, under `destination` or its base name
pub fn upload_single(
    uploader: &dyn ObjectUploader,
    file: &Path,
    destination: Option<&str>,
    bucket: &str,
) -> FileUpload {
    let span = info_span!("upload", bucket);
    let _guard = span.enter();

    if !file.is_file() {
        let e = Error::InvalidSourceFile(file.to_path_buf());
        error!("{}", e);
        return FileUpload::Skipped {
            source_file: file.to_path_buf(),
            reason: e.to_string(),
        };
    }

    info!("Copying file {}", file.display());
    FileUpload::Attempted(upload_file(uploader, file, bucket, destination))
}
