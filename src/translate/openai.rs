use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::OpenAiConfig;
use crate::error::{AutosubError, Result};
use crate::llm::{ChatCompletion, ChatMessage, Tokenizer};
use crate::models::{Language, TranslationContext};
use super::{Translator, batch::batch_by_token_count};

static INDEX_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+:\s*").expect("valid index prefix pattern"));

const DEFAULT_INPUT_DESCRIPTION: &str = "lines of text";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Chat model translation in enumerated batches.
///
/// Each batch is sent as `"<index>: <line>"` rows. A reply whose line count
/// does not match the batch is split in half and each half retried, down to
/// single lines.
pub struct OpenAiTranslator {
    chat: Arc<dyn ChatCompletion>,
    tokenizer: Box<dyn Tokenizer>,
    config: OpenAiConfig,
}

impl OpenAiTranslator {
    pub fn new(chat: Arc<dyn ChatCompletion>, tokenizer: Box<dyn Tokenizer>, config: OpenAiConfig) -> Self {
        Self { chat, tokenizer, config }
    }

    /// System prompt with the target language, input description and glossary.
    pub fn build_prompt(
        target_language: Language,
        input_description: Option<&str>,
        context: Option<&TranslationContext>,
    ) -> String {
        let mut prompt = format!(
            "The user is going to provide {}. \
             Translate each line to {}. \
             Provide all translations in 1 reply, 1 line per translation, \
             prefixed with the same index as the line it translates. \
             You must translate each line separately.\n",
            input_description.unwrap_or(DEFAULT_INPUT_DESCRIPTION),
            target_language.name(),
        );

        if let Some(context) = context.filter(|c| c.has_phrases()) {
            prompt.push_str(&format!(
                "Below are some phrases with preexisting translation. \
                 Please follow the given translation whenever they show up. \
                 If a name or phrase is not in the list, make up a suitable and consistent one in {}.\n",
                target_language.name()
            ));
            let glossary: Vec<String> = context
                .phrases
                .iter()
                .map(|phrase| format!("{}: {}", phrase.foreign, phrase.local))
                .collect();
            prompt.push_str(&glossary.join("\n"));
        }

        prompt
    }

    /// Tokens left for input once the prompt and buffer are paid for.
    fn input_budget(&self, prompt: &str) -> Result<usize> {
        let prompt_tokens = self.tokenizer.count_tokens(prompt);
        let remaining = self.config.max_model_tokens as i64
            - self.config.buffer_tokens as i64
            - prompt_tokens as i64;

        if remaining <= self.config.min_input_tokens as i64 {
            return Err(AutosubError::InsufficientBudget {
                remaining,
                required: self.config.min_input_tokens,
            });
        }
        Ok(remaining as usize)
    }

    /// Translate one batch, bisecting on a line count mismatch.
    ///
    /// Base case: a single line that still comes back mismatched is an
    /// `UnexpectedResponse`. Recursion depth is bounded by log2 of the
    /// batch size.
    fn translate_one_batch<'a>(&'a self, prompt: &'a str, batch: &'a [String]) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let messages = [ChatMessage::system(prompt), ChatMessage::user(enumerate_lines(batch))];
            let reply = self.chat.complete(&messages).await?;
            let lines = parse_reply(&reply);

            if lines.len() == batch.len() {
                return Ok(lines);
            }

            if batch.len() > 1 {
                warn!(
                    "Got {} lines for a batch of {}, splitting the batch",
                    lines.len(),
                    batch.len()
                );
                let (left, right) = batch.split_at(batch.len() / 2);
                let mut result = self.translate_one_batch(prompt, left).await?;
                result.extend(self.translate_one_batch(prompt, right).await?);
                return Ok(result);
            }

            Err(AutosubError::UnexpectedResponse(format!(
                "LLM did not produce exactly one translation for '{}', got '{}'",
                batch[0], reply
            )))
        })
    }
}

/// `"<index>: <line>"` rows, indexed from zero within the batch.
fn enumerate_lines(batch: &[String]) -> String {
    batch
        .iter()
        .enumerate()
        .map(|(index, text)| format!("{}: {}", index, text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-blank reply lines with any leading `"<index>:"` marker removed.
fn parse_reply(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| INDEX_PREFIX.replace(line, "").trim().to_string())
        .collect()
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        input: &[String],
        _source_language: Language,
        target_language: Language,
        input_description: Option<&str>,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<String>> {
        let prompt = Self::build_prompt(target_language, input_description, context);
        let budget = self.input_budget(&prompt)?;
        debug!("Input budget per batch: {} tokens", budget);

        let batches = batch_by_token_count(
            self.tokenizer.as_ref(),
            budget,
            input,
            self.config.max_items_per_batch,
        )?;
        info!("Translating {} lines in {} batches", input.len(), batches.len());

        let progress = ProgressBar::new(batches.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut result = Vec::with_capacity(input.len());
        for batch in batches.iter().filter(|batch| !batch.is_empty()) {
            result.extend(self.translate_one_batch(&prompt, batch).await?);
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(result)
    }
}
