use std::path::Path;

use crate::error::{Error, Result};

/// Name of the frame folder expected inside every camera folder
pub const FRAME_DIR_NAME: &str = "rgb";

/// Derive the camera identifier from a camera folder name.
///
/// The first two `_`-delimited tokens are dropped, so
/// `World_Cameras_Camera_01` becomes `Camera_01`.
pub fn camera_identifier(folder_name: &str) -> Result<String> {
    let mut parts = folder_name.splitn(3, '_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(rest)) if !rest.is_empty() => Ok(rest.to_string()),
        _ => Err(Error::MalformedCameraFolder(folder_name.to_string())),
    }
}

/// Derive the camera identifier for a frame directory (`<camera folder>/rgb`)
pub fn camera_identifier_for_frames(frame_dir: &Path) -> Result<String> {
    let folder_name = frame_dir
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    camera_identifier(&folder_name)
}
