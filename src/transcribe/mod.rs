// Speech to text providers behind one capability:
// - Whisper: the local whisper command-line tool
// - Gcloud: long running recognition on Google Cloud Speech
//
// Both use the context's foreign phrases as recognition hints.

pub mod whisper;
pub mod gcloud;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, EnvCredentials};
use crate::error::Result;
use crate::gcloud::GcloudClient;
use crate::models::{Language, Transcription, TranslationContext};

/// Main trait for transcription operations
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe speech in `audio_path`, spoken in `language`.
    ///
    /// Records come back in chronological order; the context is only read.
    async fn transcribe(
        &self,
        language: Language,
        audio_path: &Path,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<Transcription>>;
}

/// Transcription provider chosen on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriberProvider {
    Whisper { model: String },
    Gcloud,
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub async fn create_transcriber(
        provider: &TranscriberProvider,
        config: &Config,
        credentials: &EnvCredentials,
    ) -> Result<Box<dyn Transcriber>> {
        match provider {
            TranscriberProvider::Whisper { model } => {
                let transcriber = whisper::WhisperTranscriber::new(config.whisper.clone(), model.clone());
                transcriber.check_availability().await?;
                Ok(Box::new(transcriber))
            }
            TranscriberProvider::Gcloud => {
                let client = GcloudClient::connect(config.gcloud.clone(), credentials.gcloud()?).await?;
                Ok(Box::new(gcloud::GcloudTranscriber::new(Arc::new(client))))
            }
        }
    }
}

/// Foreign phrases of the context, used as recognition hints
pub fn hint_phrases(context: Option<&TranslationContext>) -> Vec<String> {
    context
        .map(|c| c.phrases.iter().map(|p| p.foreign.clone()).collect())
        .unwrap_or_default()
}
