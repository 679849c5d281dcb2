use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::LlamaConfig;
use crate::error::{AutosubError, Result};
use crate::models::{Language, TranslationContext};
use super::Translator;

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    raw: bool,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    stop: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Local completion model served by Ollama, one call per line.
///
/// Completion models have no notion of a conversation, so each line is
/// framed as `"<source>: <line>\n<target>: "` and generation stops at the
/// next speaker label or newline.
pub struct LlamaTranslator {
    client: Client,
    endpoint: String,
    model: String,
}

impl LlamaTranslator {
    pub fn new(config: LlamaConfig, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Check that the endpoint is reachable and the model has been pulled
    pub async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.endpoint);
        let response = self.client
            .post(&url)
            .json(&json!({ "name": self.model }))
            .send()
            .await
            .map_err(|e| AutosubError::Transport(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.model);
            Ok(())
        } else {
            Err(AutosubError::Configuration(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.model, self.model
            )))
        }
    }

    async fn complete(&self, prompt: String, stop: Vec<String>) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            raw: true,
            stream: false,
            options: GenerateOptions { stop },
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AutosubError::Transport(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AutosubError::Transport(format!(
                "Ollama API error {}: {}", status, error_text
            )));
        }

        let generated: GenerateResponse = response.json().await
            .map_err(|e| AutosubError::UnexpectedResponse(format!("Failed to parse Ollama response: {}", e)))?;
        debug!("Raw Ollama response: {}", generated.response);
        Ok(generated.response)
    }
}

/// Glossary block placed before the line to translate, empty without phrases.
fn pretranslated_block(target_language: Language, context: Option<&TranslationContext>) -> String {
    match context.filter(|c| c.has_phrases()) {
        Some(context) => {
            let mut block = format!(
                "Below is a list of phrases with existing translation. Follow them if mentioned. \
                 If a phrase is not in the list, make up a suitable name in {}.\n",
                target_language.name()
            );
            for phrase in &context.phrases {
                block.push_str(&format!("{}: {}\n", phrase.foreign, phrase.local));
            }
            block
        }
        None => String::new(),
    }
}

fn build_prompt(source_language: Language, target_language: Language, pretranslated: &str, line: &str) -> String {
    format!(
        "Repeat the {src} sentence in {tgt} and terminate immediately.\n{pretranslated}\n\n{src}: {line}\n{tgt}: ",
        src = source_language.name(),
        tgt = target_language.name(),
        pretranslated = pretranslated,
        line = line,
    )
}

fn stop_sequences(source_language: Language, target_language: Language) -> Vec<String> {
    vec![
        format!("{}:", source_language.name()),
        format!("{}:", target_language.name()),
        "\n".to_string(),
    ]
}

#[async_trait]
impl Translator for LlamaTranslator {
    async fn translate(
        &self,
        input: &[String],
        source_language: Language,
        target_language: Language,
        _input_description: Option<&str>,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<String>> {
        let pretranslated = pretranslated_block(target_language, context);
        let stop = stop_sequences(source_language, target_language);
        info!("Translating {} lines with local model {}", input.len(), self.model);

        let mut result = Vec::with_capacity(input.len());
        for (index, line) in input.iter().enumerate() {
            let prompt = build_prompt(source_language, target_language, &pretranslated, line);
            let translated = self.complete(prompt, stop.clone()).await?;
            debug!("Line {}: '{}' -> '{}'", index, line, translated.trim());
            result.push(translated.trim().to_string());
        }

        Ok(result)
    }
}
