use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const DEFAULT_ENCODER: &str = "ffmpeg";
pub const FRAME_RATE: u32 = 30;
pub const FRAME_WIDTH: u32 = 1920;
pub const FRAME_HEIGHT: u32 = 1080;
/// Frames are named by zero-based index: 0.jpeg, 1.jpeg, ...
pub const FRAME_PATTERN: &str = "%d.jpeg";
pub const START_NUMBER: u32 = 0;
pub const VIDEO_CODEC: &str = "libx264";
pub const CRF: u32 = 23;
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Fixed settings for turning a frame directory into a video
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub program: PathBuf,
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub start_number: u32,
    pub frame_pattern: String,
    pub codec: String,
    pub crf: u32,
    pub pixel_format: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        EncoderSettings {
            program: PathBuf::from(DEFAULT_ENCODER),
            frame_rate: FRAME_RATE,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            start_number: START_NUMBER,
            frame_pattern: FRAME_PATTERN.to_string(),
            codec: VIDEO_CODEC.to_string(),
            crf: CRF,
            pixel_format: PIXEL_FORMAT.to_string(),
        }
    }
}

impl EncoderSettings {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        EncoderSettings {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Output video path for a camera: `<frame_dir>/<camera>.mp4`
    pub fn output_path(&self, frame_dir: &Path, camera: &str) -> PathBuf {
        frame_dir.join(format!("{}.mp4", camera))
    }

    /// Encoder arguments for one frame directory
    pub fn args(&self, frame_dir: &Path, camera: &str) -> Vec<OsString> {
        let input = frame_dir.join(&self.frame_pattern);
        let output = self.output_path(frame_dir, camera);

        let mut args: Vec<OsString> = [
            "-nostdin".to_string(),
            "-r".to_string(),
            self.frame_rate.to_string(),
            "-f".to_string(),
            "image2".to_string(),
            "-s".to_string(),
            format!("{}x{}", self.width, self.height),
            "-start_number".to_string(),
            self.start_number.to_string(),
            "-y".to_string(),
            "-i".to_string(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push(input.into_os_string());
        args.push("-vcodec".into());
        args.push(self.codec.clone().into());
        args.push("-crf".into());
        args.push(self.crf.to_string().into());
        args.push("-pix_fmt".into());
        args.push(self.pixel_format.clone().into());
        args.push(output.into_os_string());

        args
    }

    /// Build the encoder command; stdio is left to the caller
    pub fn command(&self, frame_dir: &Path, camera: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(frame_dir, camera));
        cmd
    }
}
