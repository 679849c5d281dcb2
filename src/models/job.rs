use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AutosubError, Result};
use super::Transcription;

/// Output of one subtitle job: the source track and its translation.
///
/// Both tracks have the same length, record `i` of `translated` carrying
/// the timestamps of record `i` of `transcriptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSubtitleJob")]
pub struct SubtitleJob {
    pub transcriptions: Vec<Transcription>,
    pub translated: Vec<Transcription>,
}

#[derive(Deserialize)]
struct UncheckedSubtitleJob {
    transcriptions: Vec<Transcription>,
    translated: Vec<Transcription>,
}

impl TryFrom<UncheckedSubtitleJob> for SubtitleJob {
    type Error = AutosubError;

    fn try_from(raw: UncheckedSubtitleJob) -> Result<Self> {
        Self::new(raw.transcriptions, raw.translated)
    }
}

impl SubtitleJob {
    pub fn new(transcriptions: Vec<Transcription>, translated: Vec<Transcription>) -> Result<Self> {
        if transcriptions.len() != translated.len() {
            return Err(AutosubError::Validation(format!(
                "{} transcriptions but {} translations",
                transcriptions.len(),
                translated.len()
            )));
        }
        Ok(Self { transcriptions, translated })
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading subtitle job from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
