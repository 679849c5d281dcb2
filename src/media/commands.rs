use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AutosubError, Result};

/// One ffmpeg invocation: binary, arguments and a label for error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new(binary_path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").path_arg(path)
    }

    /// Drop the video stream and encode 16-bit little-endian PCM
    pub fn pcm_audio(self, sample_rate: u32, channels: u32) -> Self {
        self.arg("-vn")
            .arg("-c:a").arg("pcm_s16le")
            .arg("-ar").arg(sample_rate.to_string())
            .arg("-ac").arg(channels.to_string())
    }

    /// Overwrite `path` if it exists
    pub fn output(self, path: &Path) -> Self {
        self.arg("-y").path_arg(path)
    }

    /// Run the command, returning its stdout
    pub async fn execute(&self) -> Result<String> {
        debug!("Running {}: {} {}", self.description, self.binary_path, self.args.join(" "));

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| AutosubError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutosubError::Media(format!("{} failed: {}", self.description, stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Commands for the media operations the pipeline runs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self { binary_path: binary_path.into() }
    }

    /// Mono 16 kHz PCM WAV, the input format speech recognisers expect
    pub fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> MediaCommand {
        MediaCommand::new(self.binary_path.as_str(), "audio extraction")
            .input(video_path)
            .pcm_audio(16_000, 1)
            .output(audio_path)
    }

    pub fn version(&self) -> MediaCommand {
        MediaCommand::new(self.binary_path.as_str(), "version query").arg("-version")
    }
}
