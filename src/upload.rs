//! Object storage uploads.
//!
//! Uploads go through the [`ObjectUploader`] trait so the dispatcher can be
//! driven without network access. [`S3Uploader`] is the real client.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

use crate::report::UploadOutcome;

pub const ENDPOINT_URL_ENV: &str = "SDG_S3_ENDPOINT_URL";
pub const FORCE_PATH_STYLE_ENV: &str = "SDG_S3_FORCE_PATH_STYLE";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("{0}")]
    Transport(String),

    #[error("Failed to set up storage client: {0}")]
    Setup(String),
}

/// Uploads a single local file to `bucket/key`
pub trait ObjectUploader {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), UploadError>;
}

impl<T: ObjectUploader + ?Sized> ObjectUploader for &T {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), UploadError> {
        (**self).upload(local_path, bucket, key)
    }
}

/// Base name of a path, used as the default object key
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Object key for a file uploaded as part of a directory batch
pub fn prefixed_key(local_path: &Path, prefix: Option<&str>) -> String {
    let name = base_name(local_path);
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(p) if !p.is_empty() => format!("{}/{}", p, name),
        _ => name,
    }
}

/// Upload one file, mapping any failure into the returned outcome.
///
/// When `remote_key` is absent or empty the file's base name is used.
pub fn upload_file(
    uploader: &dyn ObjectUploader,
    local_path: &Path,
    bucket: &str,
    remote_key: Option<&str>,
) -> UploadOutcome {
    let key = match remote_key {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => base_name(local_path),
    };

    let error = match uploader.upload(local_path, bucket, &key) {
        Ok(()) => {
            debug!(bucket, key = %key, "uploaded {}", local_path.display());
            None
        }
        Err(e) => {
            error!("Failed to upload {} to s3://{}/{}: {}", local_path.display(), bucket, key, e);
            Some(e.to_string())
        }
    };

    UploadOutcome {
        local_path: local_path.to_path_buf(),
        bucket: bucket.to_string(),
        key,
        error,
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, UploadError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(UploadError::Setup(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}

/// Amazon S3 (or compatible) uploader backed by `aws-sdk-s3`
pub struct S3Uploader {
    runtime: tokio::runtime::Runtime,
    client: aws_sdk_s3::Client,
}

impl S3Uploader {
    /// Build a client from the standard AWS environment chain
    pub fn from_env() -> Result<Self, UploadError> {
        let endpoint_url = std::env::var(ENDPOINT_URL_ENV).ok().filter(|v| !v.is_empty());
        let force_path_style = match std::env::var(FORCE_PATH_STYLE_ENV) {
            Ok(v) => parse_bool(FORCE_PATH_STYLE_ENV, &v)?,
            Err(_) => endpoint_url.is_some(),
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| UploadError::Setup(format!("tokio runtime init failed: {}", e)))?;

        let client = runtime.block_on(async {
            let cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

            let mut builder = aws_sdk_s3::config::Builder::from(&cfg);
            if let Some(url) = endpoint_url {
                builder = builder.endpoint_url(url);
            }
            if force_path_style {
                builder = builder.force_path_style(true);
            }
            aws_sdk_s3::Client::from_conf(builder.build())
        });

        Ok(S3Uploader { runtime, client })
    }
}

impl ObjectUploader for S3Uploader {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), UploadError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| UploadError::Read {
                    path: local_path.to_path_buf(),
                    reason: e.to_string(),
                })?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| UploadError::Transport(DisplayErrorContext(&e).to_string()))?;

            Ok::<(), UploadError>(())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Records every upload call; keys listed in `failing` fail
    #[derive(Default)]
    pub(crate) struct RecordingUploader {
        pub calls: RefCell<Vec<(PathBuf, String, String)>>,
        pub failing: HashSet<String>,
    }

    impl RecordingUploader {
        pub fn failing_on(keys: &[&str]) -> Self {
            RecordingUploader {
                calls: RefCell::new(Vec::new()),
                failing: keys.iter().map(|k| k.to_string()).collect(),
            }
        }

        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.calls.borrow().iter().map(|c| c.2.clone()).collect();
            keys.sort();
            keys
        }
    }

    impl ObjectUploader for RecordingUploader {
        fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), UploadError> {
            self.calls
                .borrow_mut()
                .push((local_path.to_path_buf(), bucket.to_string(), key.to_string()));
            if self.failing.contains(key) {
                return Err(UploadError::Transport("AccessDenied".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_prefixed_key() {
        let file = Path::new("/data/frames/0001.png");
        assert_eq!(prefixed_key(file, None), "0001.png");
        assert_eq!(prefixed_key(file, Some("")), "0001.png");
        assert_eq!(prefixed_key(file, Some("runs/7")), "runs/7/0001.png");
        assert_eq!(prefixed_key(file, Some("runs/7/")), "runs/7/0001.png");
    }

    #[test]
    fn test_upload_file_defaults_to_base_name() {
        let uploader = RecordingUploader::default();
        let outcome = upload_file(&uploader, Path::new("/tmp/out/video.mp4"), "bucket", None);

        assert!(outcome.is_success());
        assert_eq!(outcome.key, "video.mp4");
        assert_eq!(
            uploader.calls.borrow()[0],
            (
                PathBuf::from("/tmp/out/video.mp4"),
                "bucket".to_string(),
                "video.mp4".to_string()
            )
        );

        let outcome = upload_file(&uploader, Path::new("/tmp/out/video.mp4"), "bucket", Some(""));
        assert_eq!(outcome.key, "video.mp4");
    }

    #[test]
    fn test_upload_file_explicit_key() {
        let uploader = RecordingUploader::default();
        let outcome = upload_file(
            &uploader,
            Path::new("video.mp4"),
            "bucket",
            Some("archive/camera.mp4"),
        );
        assert_eq!(outcome.key, "archive/camera.mp4");
        assert_eq!(uploader.keys(), vec!["archive/camera.mp4"]);
    }

    #[test]
    fn test_upload_file_maps_failure() {
        let uploader = RecordingUploader::failing_on(&["video.mp4"]);
        let outcome = upload_file(&uploader, Path::new("video.mp4"), "bucket", None);

        assert!(!outcome.is_success());
        assert_eq!(outcome.error.as_deref(), Some("AccessDenied"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", " ON ").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
