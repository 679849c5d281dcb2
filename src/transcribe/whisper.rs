// Whisper command-line tool, run with JSON output into a scratch directory

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::WhisperConfig;
use crate::error::{AutosubError, Result};
use crate::models::{Language, Transcription, TranslationContext};
use super::{Transcriber, hint_phrases};

/// Whisper JSON output, only the fields we read
#[derive(Debug, Clone, Deserialize)]
struct WhisperOutput {
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

pub struct WhisperTranscriber {
    config: WhisperConfig,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig, model: String) -> Self {
        Self { config, model }
    }

    /// Check if whisper is available via command line
    pub async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| AutosubError::Transcriber(format!("whisper command not found: {}", e)))?;

        if output.status.success() {
            info!("Whisper command-line tool is available");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AutosubError::Transcriber(format!(
                "Whisper not available. Install with: pip install openai-whisper\nError: {}",
                stderr
            )))
        }
    }

    fn build_args(&self, audio_path: &Path, output_dir: &Path, language: Language, prompt: Option<&str>) -> Vec<String> {
        let mut args = vec![
            audio_path.to_string_lossy().to_string(),
            "--model".to_string(), self.model.clone(),
            "--output_dir".to_string(), output_dir.to_string_lossy().to_string(),
            "--output_format".to_string(), "json".to_string(),
            "--fp16".to_string(), "False".to_string(),
            "--language".to_string(), language.primary_subtag().to_string(),
        ];
        if let Some(prompt) = prompt {
            args.push("--initial_prompt".to_string());
            args.push(prompt.to_string());
        }
        args
    }
}

/// Comma separated hint phrases, `None` when there are none
fn initial_prompt(context: Option<&TranslationContext>) -> Option<String> {
    let phrases = hint_phrases(context);
    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(", "))
    }
}

fn to_transcriptions(output: WhisperOutput) -> Result<Vec<Transcription>> {
    output
        .segments
        .into_iter()
        .filter(|segment| !segment.text.trim().is_empty())
        .map(|segment| {
            Transcription::new(
                None,
                segment.text.trim(),
                Duration::from_secs_f64(segment.start.max(0.0)),
                Duration::from_secs_f64(segment.end.max(segment.start).max(0.0)),
            )
        })
        .collect()
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        language: Language,
        audio_path: &Path,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<Transcription>> {
        debug!("Executing whisper transcription with model: {}", self.model);

        let temp_dir = tempfile::tempdir()
            .map_err(|e| AutosubError::Transcriber(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let prompt = initial_prompt(context);
        let output = Command::new(&self.config.binary_path)
            .args(self.build_args(audio_path, output_dir, language, prompt.as_deref()))
            .output()
            .await
            .map_err(|e| AutosubError::Transcriber(format!("Failed to execute whisper command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutosubError::Transcriber(format!("Whisper transcription failed: {}", stderr)));
        }

        let audio_filename = audio_path.file_stem()
            .ok_or_else(|| AutosubError::Transcriber("Invalid audio filename".to_string()))?;
        let json_file = output_dir.join(format!("{}.json", audio_filename.to_string_lossy()));

        if !json_file.exists() {
            return Err(AutosubError::Transcriber("Whisper JSON output file not found".to_string()));
        }

        let json_content = tokio::fs::read_to_string(&json_file).await?;
        let parsed: WhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| AutosubError::Transcriber(format!("Failed to parse whisper JSON: {}", e)))?;

        let transcriptions = to_transcriptions(parsed)?;
        info!("Whisper produced {} segments", transcriptions.len());
        Ok(transcriptions)
    }
}
