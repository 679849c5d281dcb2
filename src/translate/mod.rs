// Translation providers behind one capability:
// - OpenAI: batched, enumerated chat prompts with bisection recovery
// - Gcloud: cloud translation with a temporary glossary
// - Llama: one local completion call per line
//
// Every implementation returns exactly one translation per input line, in
// input order.

pub mod batch;
pub mod openai;
pub mod llama;
pub mod gcloud;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use batch::batch_by_token_count;
use crate::config::{Config, EnvCredentials};
use crate::error::{AutosubError, Result};
use crate::gcloud::GcloudClient;
use crate::llm::{OpenAiChatClient, TiktokenTokenizer};
use crate::models::{Language, Transcription, TranslationContext};

/// Main trait for translation operations
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `input` line by line.
    ///
    /// The result has the same length and order as `input`. `context`, when
    /// given, is only read.
    async fn translate(
        &self,
        input: &[String],
        source_language: Language,
        target_language: Language,
        input_description: Option<&str>,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<String>>;
}

/// Translation provider chosen on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatorProvider {
    OpenAi { model: String },
    Gcloud,
    Llama { model: String },
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub async fn create_translator(
        provider: &TranslatorProvider,
        config: &Config,
        credentials: &EnvCredentials,
    ) -> Result<Box<dyn Translator>> {
        match provider {
            TranslatorProvider::OpenAi { model } => {
                let chat = OpenAiChatClient::new(&config.openai, credentials.openai_api_key()?, model.clone())?;
                let tokenizer = TiktokenTokenizer::for_model(model)?;
                Ok(Box::new(openai::OpenAiTranslator::new(
                    Arc::new(chat),
                    Box::new(tokenizer),
                    config.openai.clone(),
                )))
            }
            TranslatorProvider::Gcloud => {
                let client = GcloudClient::connect(config.gcloud.clone(), credentials.gcloud()?).await?;
                Ok(Box::new(gcloud::GcloudTranslator::new(Arc::new(client), config.gcloud.clone())))
            }
            TranslatorProvider::Llama { model } => {
                let translator = llama::LlamaTranslator::new(config.llama.clone(), model.clone())?;
                translator.check_availability().await?;
                Ok(Box::new(translator))
            }
        }
    }
}

/// Translate transcription texts and merge them back by position.
///
/// Returns new records carrying the translated text and the original
/// timestamps; the input is left untouched.
pub async fn translate_transcriptions(
    transcriptions: &[Transcription],
    translator: &dyn Translator,
    source_language: Language,
    target_language: Language,
    input_description: &str,
    context: Option<&TranslationContext>,
) -> Result<Vec<Transcription>> {
    let texts: Vec<String> = transcriptions.iter().map(|t| t.text.clone()).collect();
    info!("Translating {} lines from {} to {}", texts.len(), source_language, target_language);

    let translated = translator
        .translate(&texts, source_language, target_language, Some(input_description), context)
        .await?;

    if translated.len() != transcriptions.len() {
        return Err(AutosubError::UnexpectedResponse(format!(
            "Translator returned {} lines for {} inputs",
            translated.len(),
            transcriptions.len()
        )));
    }

    Ok(transcriptions
        .iter()
        .zip(translated)
        .map(|(transcription, text)| transcription.with_text(text))
        .collect())
}
