//! Still-camera capture through an external command.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, process::Command};

use crate::tracing::prelude::*;
use crate::types::Timestamp;

/// URL prefix under which the photo directory is served.
pub const PHOTO_URL_PREFIX: &str = "/captures";

/// Parameters for one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Pan angle the camera is pointing at; recorded in the file name.
    pub angle: u8,
    pub width: u32,
    pub height: u32,
    pub rotation: u16,
}

/// Where a saved photo lives on disk and how clients fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to prepare {path}: {source}")]
    PhotoDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// Take one photo. Blocks the calling task for the exposure, which
    /// is typically around a second.
    async fn capture(&self, request: CaptureRequest) -> Result<PhotoRef, CaptureError>;
}

/// Captures with `rpicam-still` (or a compatible command).
#[derive(Debug, Clone)]
pub struct RpicamStill {
    command: String,
    photo_dir: PathBuf,
}

impl RpicamStill {
    pub fn new(command: impl Into<String>, photo_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            photo_dir: photo_dir.into(),
        }
    }

    fn file_name(request: &CaptureRequest, stamp: &Timestamp) -> String {
        format!("{}_a{}.jpg", stamp.file_stamp(), request.angle)
    }

    fn args(&self, request: &CaptureRequest, output: &std::path::Path) -> Vec<String> {
        vec![
            "-n".into(),
            "-o".into(),
            output.display().to_string(),
            "--timeout".into(),
            "500".into(),
            "--width".into(),
            request.width.to_string(),
            "--height".into(),
            request.height.to_string(),
            "--rotation".into(),
            request.rotation.to_string(),
        ]
    }
}

#[async_trait]
impl Camera for RpicamStill {
    async fn capture(&self, request: CaptureRequest) -> Result<PhotoRef, CaptureError> {
        fs::create_dir_all(&self.photo_dir)
            .await
            .map_err(|source| CaptureError::PhotoDir {
                path: self.photo_dir.clone(),
                source,
            })?;

        let file_name = Self::file_name(&request, &Timestamp::now());
        let path = self.photo_dir.join(&file_name);
        let args = self.args(&request, &path);
        debug!(command = %self.command, ?args, "Running capture command");

        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| CaptureError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CaptureError::Failed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(PhotoRef {
            path,
            url: format!("{PHOTO_URL_PREFIX}/{file_name}"),
        })
    }
}
