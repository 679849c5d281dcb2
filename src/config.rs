use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, AutosubError};

pub const ENV_VAR_OPENAI_API_KEY: &str = "AUTOSUB_OPENAI_API_KEY";
pub const ENV_VAR_GC_ACCESS_TOKEN: &str = "AUTOSUB_GC_ACCESS_TOKEN";
pub const ENV_VAR_GC_SERVICE_ACCOUNT_FILE: &str = "AUTOSUB_GC_SERVICE_ACCOUNT_FILE";
pub const ENV_VAR_GC_PROJECT_ID: &str = "AUTOSUB_GC_PROJECT_ID";
pub const ENV_VAR_GC_LOCATION_ID: &str = "AUTOSUB_GC_LOCATION_ID";
pub const ENV_VAR_GC_GLOSSARY_BUCKET: &str = "AUTOSUB_GC_GLOSSARY_BUCKET";
pub const ENV_VAR_GC_AUDIO_BUCKET: &str = "AUTOSUB_GC_AUDIO_BUCKET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub llama: LlamaConfig,
    pub gcloud: GcloudConfig,
    pub whisper: WhisperConfig,
    pub media: MediaConfig,
    pub context: ContextConfig,
    pub wiki: WikiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL of an OpenAI compatible API
    pub endpoint: String,
    /// Context window of the model, prompt and input combined
    pub max_model_tokens: usize,
    /// Tokens held back from the window for message framing
    pub buffer_tokens: usize,
    /// Minimum tokens that must remain for input after the prompt
    pub min_input_tokens: usize,
    /// Maximum lines sent in a single request
    pub max_items_per_batch: usize,
    /// HTTP timeout per request
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlamaConfig {
    /// Ollama compatible completion endpoint
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcloudConfig {
    pub translation_endpoint: String,
    pub speech_endpoint: String,
    pub storage_endpoint: String,
    /// Speech recognition model
    pub speech_model: String,
    /// Bounded wait for long running operations
    pub operation_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Request limits of translateText
    pub max_codepoints_per_request: usize,
    pub max_items_per_request: usize,
    /// `gcloud` binary used to mint access tokens
    pub cli_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Path to the whisper command-line tool
    pub binary_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Phrases kept when a context file is loaded, bounds prompt size
    pub max_phrases: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            max_model_tokens: 4096,
            buffer_tokens: 20,
            min_input_tokens: 100,
            max_items_per_batch: 15,
            timeout_secs: 300,
        }
    }
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for GcloudConfig {
    fn default() -> Self {
        Self {
            translation_endpoint: "https://translation.googleapis.com".to_string(),
            speech_endpoint: "https://speech.googleapis.com".to_string(),
            storage_endpoint: "https://storage.googleapis.com".to_string(),
            speech_model: "latest_long".to_string(),
            operation_timeout_secs: 90,
            poll_interval_secs: 2,
            max_codepoints_per_request: 30_000,
            max_items_per_request: 1024,
            cli_path: "gcloud".to_string(),
        }
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary_path: "whisper".to_string(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_phrases: 30 }
    }
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("autosub/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AutosubError::Configuration(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| AutosubError::Configuration(format!("Failed to parse config file: {}", e)))
    }
}

/// Reads a required environment variable.
pub fn env_var(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AutosubError::Configuration(format!(
            "Environment variable {} is not defined",
            key
        ))),
    }
}

/// Credentials of the cloud providers, read from the environment on demand.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn openai_api_key(&self) -> Result<String> {
        env_var(ENV_VAR_OPENAI_API_KEY)
    }

    pub fn gcloud(&self) -> Result<GcloudCredentials> {
        let token_source = match env_var(ENV_VAR_GC_ACCESS_TOKEN) {
            Ok(token) => TokenSource::Static(token),
            Err(_) => TokenSource::ServiceAccount(env_var(ENV_VAR_GC_SERVICE_ACCOUNT_FILE).map_err(|_| {
                AutosubError::Configuration(format!(
                    "Either {} or {} must be defined",
                    ENV_VAR_GC_ACCESS_TOKEN, ENV_VAR_GC_SERVICE_ACCOUNT_FILE
                ))
            })?),
        };

        Ok(GcloudCredentials {
            token_source,
            project_id: env_var(ENV_VAR_GC_PROJECT_ID)?,
            location_id: env_var(ENV_VAR_GC_LOCATION_ID)?,
            glossary_bucket: env_var(ENV_VAR_GC_GLOSSARY_BUCKET)?,
            audio_bucket: env_var(ENV_VAR_GC_AUDIO_BUCKET)?,
        })
    }

    /// Help text listing the variables a provider needs.
    pub fn openai_help() -> String {
        format!(
            "Following environment variables need to be set:\n    {} - API key for OpenAI",
            ENV_VAR_OPENAI_API_KEY
        )
    }

    pub fn gcloud_help() -> String {
        format!(
            "Following environment variables need to be set:\n    \
             {} - Google Cloud access token (or {} - service account file)\n    \
             {} - Google Cloud project id\n    \
             {} - Google Cloud location id\n    \
             {} - Bucket to store glossary information for translation\n    \
             {} - Bucket to store audio file for transcription",
            ENV_VAR_GC_ACCESS_TOKEN,
            ENV_VAR_GC_SERVICE_ACCOUNT_FILE,
            ENV_VAR_GC_PROJECT_ID,
            ENV_VAR_GC_LOCATION_ID,
            ENV_VAR_GC_GLOSSARY_BUCKET,
            ENV_VAR_GC_AUDIO_BUCKET,
        )
    }
}

#[derive(Debug, Clone)]
pub enum TokenSource {
    Static(String),
    ServiceAccount(String),
}

#[derive(Debug, Clone)]
pub struct GcloudCredentials {
    pub token_source: TokenSource,
    pub project_id: String,
    pub location_id: String,
    pub glossary_bucket: String,
    pub audio_bucket: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_model_limits() {
        let config = Config::default();
        assert_eq!(config.openai.max_model_tokens, 4096);
        assert_eq!(config.openai.buffer_tokens, 20);
        assert_eq!(config.openai.min_input_tokens, 100);
        assert_eq!(config.openai.max_items_per_batch, 15);
        assert_eq!(config.context.max_phrases, 30);
        assert_eq!(config.gcloud.operation_timeout_secs, 90);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosub.toml");
        std::fs::write(&path, "[openai]\nmax_items_per_batch = 5\n\n[media]\nbinary_path = \"/opt/ffmpeg\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.openai.max_items_per_batch, 5);
        assert_eq!(config.openai.max_model_tokens, 4096);
        assert_eq!(config.media.binary_path, "/opt/ffmpeg");
        assert_eq!(config.whisper.binary_path, "whisper");
    }

    #[test]
    fn test_unreadable_config_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosub.toml");
        std::fs::write(&path, "[openai
").unwrap();

        assert!(matches!(Config::from_file(&path), Err(AutosubError::Configuration(_))));
        assert!(matches!(Config::from_file(dir.path().join("missing.toml")), Err(AutosubError::Configuration(_))));
    }

    #[test]
    fn test_missing_env_var_is_configuration_error() {
        let err = env_var("AUTOSUB_TEST_DEFINITELY_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, AutosubError::Configuration(msg) if msg.contains("AUTOSUB_TEST_DEFINITELY_UNSET_VARIABLE")));
    }
}
