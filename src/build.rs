//! Per-camera video builds.
//!
//! Every `<source>/*/rgb/` frame directory gets one encoder process. All
//! processes are started before any is waited on, each writing stdout and
//! stderr to `<log_dir>/<camera>.log`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use tracing::{debug, error, info, info_span, warn};

use crate::camera::camera_identifier_for_frames;
use crate::encoder::EncoderSettings;
use crate::error::{Error, Result};
use crate::report::{BuildOutcome, BuildReport, JobStatus};
use crate::resolver::find_frame_dirs;

pub const LOG_DIR_NAME: &str = "video_creation_logs";

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub encoder: EncoderSettings,
    pub log_dir: PathBuf,
}

impl BuildConfig {
    /// Default settings with logs under `<base>/video_creation_logs`
    pub fn in_dir(base: &Path) -> Self {
        BuildConfig {
            encoder: EncoderSettings::default(),
            log_dir: base.join(LOG_DIR_NAME),
        }
    }
}

/// A launched encoder and the index of its outcome in the report
struct RunningJob {
    index: usize,
    camera: String,
    log_file: PathBuf,
    child: Child,
}

pub struct VideoBuilder {
    config: BuildConfig,
}

impl VideoBuilder {
    pub fn new(config: BuildConfig) -> Self {
        VideoBuilder { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build one video per camera folder under `source_directory`.
    ///
    /// Invalid input and launch failures end up in the report. Only failing
    /// to create the log directory or a log file is returned as an error.
    pub fn build(&self, source_directory: &Path) -> Result<BuildReport> {
        let span = info_span!("build", source = %source_directory.display());
        let _guard = span.enter();

        let mut report = BuildReport {
            source_directory: source_directory.to_path_buf(),
            log_dir: self.config.log_dir.clone(),
            error: None,
            jobs: Vec::new(),
        };

        let frame_dirs = match find_frame_dirs(source_directory) {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("{}", e);
                report.error = Some(e.to_string());
                return Ok(report);
            }
        };

        info!(
            "Creating videos from images in source_directory - {}. This might take a while based on the length of video to be generated. Logs for video creation are at {}.",
            source_directory.display(),
            self.config.log_dir.display()
        );

        let mut running = Vec::new();
        let launched = self.launch_all(frame_dirs, &mut report, &mut running);

        // started encoders are waited on even when launching stopped with an error
        info!("Waiting for {} encoder processes", running.len());
        for job in running {
            let index = job.index;
            report.jobs[index].status = wait_for(job);
        }

        if launched? {
            info!("Finished creating videos from images.");
        } else {
            warn!(
                "Stopped creating videos after a launch failure, {} of {} encoders ran.",
                report.launched(),
                report.jobs.len()
            );
        }
        Ok(report)
    }

    /// Start an encoder per frame directory, pushing each one onto `running`.
    ///
    /// Returns `false` when a launch failed and the remaining jobs were not
    /// started.
    fn launch_all(
        &self,
        frame_dirs: Vec<PathBuf>,
        report: &mut BuildReport,
        running: &mut Vec<RunningJob>,
    ) -> Result<bool> {
        let mut cameras: HashMap<String, PathBuf> = HashMap::new();
        let mut log_dir_ready = false;
        let mut launch_failed = false;

        for frame_dir in frame_dirs {
            let camera = camera_identifier_for_frames(&frame_dir);

            if launch_failed {
                report.jobs.push(BuildOutcome {
                    frame_dir,
                    camera: camera.ok(),
                    log_file: None,
                    video: None,
                    status: JobStatus::NotLaunched,
                });
                continue;
            }

            let camera = match camera {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping {}: {}", frame_dir.display(), e);
                    report.jobs.push(skipped(frame_dir, None, &e));
                    continue;
                }
            };

            if let Some(first) = cameras.get(&camera) {
                let e = Error::DuplicateCamera {
                    camera: camera.clone(),
                    first: first.clone(),
                };
                warn!("Skipping {}: {}", frame_dir.display(), e);
                report.jobs.push(skipped(frame_dir, Some(camera), &e));
                continue;
            }
            cameras.insert(camera.clone(), frame_dir.clone());

            if !log_dir_ready {
                fs::create_dir_all(&self.config.log_dir).map_err(|source| Error::LogDirectory {
                    path: self.config.log_dir.clone(),
                    source,
                })?;
                log_dir_ready = true;
            }

            let log_path = self.config.log_dir.join(format!("{}.log", camera));
            let video = self.config.encoder.output_path(&frame_dir, &camera);
            let index = report.jobs.len();

            match self.spawn(&frame_dir, &camera, &log_path)? {
                Ok(child) => {
                    debug!(camera = %camera, pid = child.id(), "encoder started");
                    running.push(RunningJob {
                        index,
                        camera: camera.clone(),
                        log_file: log_path.clone(),
                        child,
                    });
                    report.jobs.push(BuildOutcome {
                        frame_dir,
                        camera: Some(camera),
                        log_file: Some(log_path),
                        video: Some(video),
                        // replaced once the process has been waited on
                        status: JobStatus::NotLaunched,
                    });
                }
                Err(e) => {
                    error!(
                        "Could not run {} command due to error - {}. Note, this operation requires ffmpeg to be installed",
                        self.config.encoder.program.display(),
                        e
                    );
                    launch_failed = true;
                    report.jobs.push(BuildOutcome {
                        frame_dir,
                        camera: Some(camera),
                        log_file: Some(log_path),
                        video: None,
                        status: JobStatus::LaunchFailed {
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(!launch_failed)
    }

    /// Open the job's log file and start the encoder writing into it.
    ///
    /// The outer error is a log file failure, the inner one a launch failure.
    fn spawn(
        &self,
        frame_dir: &Path,
        camera: &str,
        log_path: &Path,
    ) -> Result<std::io::Result<Child>> {
        let log_file_error = |source| Error::LogFile {
            path: log_path.to_path_buf(),
            source,
        };
        let stdout = File::create(log_path).map_err(log_file_error)?;
        let stderr = stdout.try_clone().map_err(log_file_error)?;

        let mut cmd = self.config.encoder.command(frame_dir, camera);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        Ok(cmd.spawn())
    }
}

fn skipped(frame_dir: PathBuf, camera: Option<String>, reason: &Error) -> BuildOutcome {
    BuildOutcome {
        frame_dir,
        camera,
        log_file: None,
        video: None,
        status: JobStatus::Skipped {
            reason: reason.to_string(),
        },
    }
}

fn wait_for(mut job: RunningJob) -> JobStatus {
    match job.child.wait() {
        Ok(status) => {
            if status.success() {
                info!("Video for {} created", job.camera);
            } else {
                warn!(
                    "Encoder for {} exited with {} (see {})",
                    job.camera,
                    status,
                    job.log_file.display()
                );
            }
            JobStatus::Finished {
                exit_code: status.code(),
            }
        }
        Err(e) => {
            error!("Failed to wait for encoder of {}: {}", job.camera, e);
            JobStatus::WaitFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Encoder stand-in that exits a moment after start, leaving `marker` behind
    fn slow_encoder(dir: &Path, marker: &Path) -> PathBuf {
        let script = dir.join("slow-encoder.sh");
        fs::write(
            &script,
            format!("#!/bin/sh\nsleep 1\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn camera_tree(root: &Path, folders: &[&str]) {
        for folder in folders {
            let rgb = root.join(folder).join("rgb");
            fs::create_dir_all(&rgb).unwrap();
            fs::write(rgb.join("0.jpeg"), b"frame").unwrap();
        }
    }

    fn builder(work: &Path, program: &str) -> VideoBuilder {
        VideoBuilder::new(BuildConfig {
            encoder: EncoderSettings::with_program(program),
            log_dir: work.join(LOG_DIR_NAME),
        })
    }

    fn log_names(log_dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(log_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_one_job_per_camera() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(
            &source,
            &[
                "World_Cameras_Camera_01",
                "World_Cameras_Camera_02",
                "World_Cameras_Camera_03",
                ".World_Cameras_Camera_01_old",
            ],
        );
        fs::create_dir_all(source.join("World_Cameras_Camera_04/depth")).unwrap();

        let builder = builder(work.path(), "true");
        let report = builder.build(&source).unwrap();

        assert_eq!(report.jobs.len(), 3);
        assert_eq!(report.launched(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(
            log_names(&builder.config().log_dir),
            vec!["Camera_01.log", "Camera_02.log", "Camera_03.log"]
        );
        assert_eq!(
            report.jobs[0].video,
            Some(source.join("World_Cameras_Camera_01/rgb/Camera_01.mp4"))
        );
    }

    #[test]
    fn test_encoder_output_goes_to_log() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(&source, &["World_Cameras_Camera_01"]);

        let builder = builder(work.path(), "echo");
        builder.build(&source).unwrap();

        let log_path = builder.config().log_dir.join("Camera_01.log");
        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("-nostdin -r 30 -f image2 -s 1920x1080"));
        assert!(log.contains("World_Cameras_Camera_01/rgb/%d.jpeg"));
        assert!(log.trim_end().ends_with("World_Cameras_Camera_01/rgb/Camera_01.mp4"));

        // a second run truncates the log instead of appending
        builder.build(&source).unwrap();
        assert_eq!(fs::read_to_string(&log_path).unwrap(), log);
    }

    #[test]
    fn test_failed_encode_is_reported() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(&source, &["World_Cameras_Camera_01"]);

        let report = builder(work.path(), "false").build(&source).unwrap();
        assert_eq!(report.launched(), 1);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.jobs[0].status, JobStatus::Finished { exit_code: Some(1) });
    }

    #[test]
    fn test_missing_source_has_no_side_effects() {
        let work = TempDir::new().unwrap();
        let builder = builder(work.path(), "true");

        let report = builder.build(&work.path().join("missing")).unwrap();

        assert!(report.error.is_some());
        assert!(report.jobs.is_empty());
        assert!(!builder.config().log_dir.exists());
    }

    #[test]
    fn test_no_cameras_creates_no_log_dir() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        fs::create_dir_all(source.join("notes")).unwrap();

        let builder = builder(work.path(), "true");
        let report = builder.build(&source).unwrap();

        assert!(report.error.is_none());
        assert!(report.jobs.is_empty());
        assert!(!builder.config().log_dir.exists());
    }

    #[test]
    fn test_malformed_and_duplicate_cameras_are_skipped() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(
            &source,
            &["A_World_Camera_01", "B_World_Camera_01", "Camera01", "World_Cameras_Camera_02"],
        );

        let builder = builder(work.path(), "true");
        let report = builder.build(&source).unwrap();

        let statuses: Vec<&JobStatus> = report.jobs.iter().map(|j| &j.status).collect();
        assert!(matches!(statuses[0], JobStatus::Finished { .. }));
        assert!(matches!(statuses[1], JobStatus::Skipped { .. }));
        assert!(matches!(statuses[2], JobStatus::Skipped { .. }));
        assert!(matches!(statuses[3], JobStatus::Finished { .. }));
        assert_eq!(report.launched(), 2);
        assert_eq!(
            log_names(&builder.config().log_dir),
            vec!["Camera_01.log", "Camera_02.log"]
        );
    }

    #[test]
    fn test_launch_failure_stops_remaining_jobs() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(&source, &["World_Cameras_Camera_01", "World_Cameras_Camera_02"]);

        let report = builder(work.path(), "sdg-utils-no-such-encoder")
            .build(&source)
            .unwrap();

        assert_eq!(report.launched(), 0);
        assert!(matches!(report.jobs[0].status, JobStatus::LaunchFailed { .. }));
        assert_eq!(report.jobs[1].status, JobStatus::NotLaunched);
        assert_eq!(report.jobs[1].camera.as_deref(), Some("Camera_02"));
    }

    #[test]
    fn test_launch_all_reports_whether_every_job_started() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(&source, &["World_Cameras_Camera_01"]);
        let frame_dirs = find_frame_dirs(&source).unwrap();

        let missing = builder(work.path(), "sdg-utils-no-such-encoder");
        let mut report = BuildReport::default();
        let mut running = Vec::new();
        let all_started = missing
            .launch_all(frame_dirs.clone(), &mut report, &mut running)
            .unwrap();
        assert!(!all_started);
        assert!(running.is_empty());

        let present = builder(work.path(), "true");
        let mut report = BuildReport::default();
        let mut running = Vec::new();
        let all_started = present
            .launch_all(frame_dirs, &mut report, &mut running)
            .unwrap();
        assert!(all_started);
        assert_eq!(running.len(), 1);
        for job in running {
            wait_for(job);
        }
    }

    #[test]
    fn test_log_file_error_waits_for_started_encoders() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("gt");
        camera_tree(&source, &["World_Cameras_Camera_01", "World_Cameras_Camera_02"]);

        let marker = work.path().join("camera_01.done");
        let encoder = slow_encoder(work.path(), &marker);
        let builder = builder(work.path(), &encoder.to_string_lossy());
        // a directory where the second camera's log file should go
        fs::create_dir_all(builder.config().log_dir.join("Camera_02.log")).unwrap();

        let result = builder.build(&source);

        assert!(matches!(result, Err(Error::LogFile { .. })));
        assert!(marker.exists());
    }
}
