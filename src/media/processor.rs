use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{AutosubError, Result};
use super::{MediaCommandBuilder, MediaProcessor};

/// FFmpeg backed media processor
pub struct FfmpegProcessor {
    command_builder: MediaCommandBuilder,
}

impl FfmpegProcessor {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(config.binary_path),
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        if !video_path.exists() {
            return Err(AutosubError::Media(format!("Video file not found: {}", video_path.display())));
        }

        self.command_builder.extract_audio(video_path, audio_path).execute().await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version()
            .execute()
            .await
            .map_err(|e| AutosubError::Media(format!("Media processor not available: {}", e)))?;
        info!("Media processor is available");
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");
        let banner = self.command_builder.version().execute().await?;
        Ok(banner.lines().next().unwrap_or("Unknown version").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_video_is_rejected_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let processor = FfmpegProcessor::new(MediaConfig::default());
        let err = processor
            .extract_audio(&dir.path().join("missing.mkv"), &dir.path().join("out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, AutosubError::Media(msg) if msg.contains("missing.mkv")));
    }
}
