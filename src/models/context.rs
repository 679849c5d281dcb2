use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use super::PhraseLocalisation;

/// Synopsis and glossary used to steer transcription and translation.
///
/// Built once per run and shared read-only by every provider call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContext {
    pub synopsis: Option<String>,
    pub phrases: Vec<PhraseLocalisation>,
}

impl TranslationContext {
    pub fn new(synopsis: Option<String>, phrases: Vec<PhraseLocalisation>) -> Self {
        Self { synopsis, phrases }
    }

    pub fn has_phrases(&self) -> bool {
        !self.phrases.is_empty()
    }

    /// Copy keeping at most `max_phrases` phrases, in order.
    pub fn truncated(&self, max_phrases: usize) -> Self {
        Self {
            synopsis: self.synopsis.clone(),
            phrases: self.phrases.iter().take(max_phrases).cloned().collect(),
        }
    }

    /// Load a context file, capping the phrase list to bound prompt size.
    pub async fn load<P: AsRef<Path>>(path: P, max_phrases: usize) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading translation context from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let context: TranslationContext = serde_json::from_str(&content)?;
        if context.phrases.len() > max_phrases {
            info!(
                "Context has {} phrases, keeping the first {}",
                context.phrases.len(),
                max_phrases
            );
        }
        Ok(context.truncated(max_phrases))
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Builds a [`TranslationContext`] from some reference source.
#[async_trait]
pub trait ContextTransformer: Send + Sync {
    async fn prepare_synopsis(&self) -> Result<Option<String>>;

    async fn prepare_phrases(&self) -> Result<Vec<PhraseLocalisation>>;

    async fn prepare_context(&self) -> Result<TranslationContext> {
        Ok(TranslationContext {
            synopsis: self.prepare_synopsis().await?,
            phrases: self.prepare_phrases().await?,
        })
    }
}
