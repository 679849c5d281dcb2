// Google Cloud REST plumbing shared by the cloud translator and transcriber:
// - access token resolution
// - Cloud Storage object upload and delete
// - Translation v3 glossaries and translateText
// - Speech v1 long running recognition
// - long running operation polling with a bounded wait

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{GcloudConfig, GcloudCredentials, TokenSource};
use crate::error::{AutosubError, Result};
use crate::models::Language;

/// One entry of `speech:longrunningrecognize` results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub words: Vec<SpeechWord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechWord {
    /// Offset such as `"1.500s"`, absent for zero
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub word: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<SpeechResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextRequest<'a> {
    contents: &'a [String],
    source_language_code: &'a str,
    target_language_code: &'a str,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_config: Option<GlossaryConfig<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct GlossaryConfig<'a> {
    glossary: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextResponse {
    #[serde(default)]
    translations: Vec<Translation>,
    #[serde(default)]
    glossary_translations: Vec<Translation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// The Cloud Storage, Translation and Speech calls the cloud translator
/// and transcriber make.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GcloudServices: Send + Sync {
    fn glossary_bucket(&self) -> String;

    fn audio_bucket(&self) -> String;

    /// `projects/<project>/locations/<location>`
    fn parent(&self) -> String;

    async fn upload_object(&self, bucket: &str, name: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    async fn delete_object(&self, bucket: &str, name: &str) -> Result<()>;

    /// Create a glossary from a TSV object and wait until it is ready.
    async fn create_glossary(
        &self,
        glossary_path: &str,
        source_language: Language,
        target_language: Language,
        input_uri: &str,
    ) -> Result<()>;

    async fn delete_glossary(&self, glossary_path: &str) -> Result<()>;

    /// Translate `contents`, preferring glossary-applied output when a
    /// glossary is given.
    async fn translate_text(
        &self,
        contents: &[String],
        source_language: Language,
        target_language: Language,
        glossary_path: Option<String>,
    ) -> Result<Vec<String>>;

    /// Run long running recognition on an uploaded audio object.
    async fn long_running_recognize(
        &self,
        audio_uri: &str,
        language: Language,
        phrases: Vec<String>,
    ) -> Result<Vec<SpeechResult>>;
}

/// Authorised client for the Google Cloud services the pipeline uses.
pub struct GcloudClient {
    client: Client,
    config: GcloudConfig,
    credentials: GcloudCredentials,
    token: String,
}

impl GcloudClient {
    /// Build a client, resolving an access token up front.
    pub async fn connect(config: GcloudConfig, credentials: GcloudCredentials) -> Result<Self> {
        let token = match &credentials.token_source {
            TokenSource::Static(token) => token.clone(),
            TokenSource::ServiceAccount(path) => Self::token_from_cli(&config.cli_path, path).await?,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.operation_timeout_secs.max(60)))
            .build()?;

        info!("Connected to Google Cloud project {}", credentials.project_id);
        Ok(Self { client, config, credentials, token })
    }

    /// Mint a token for a service account with the gcloud CLI
    async fn token_from_cli(cli_path: &str, service_account_file: &str) -> Result<String> {
        debug!("Requesting access token for {}", service_account_file);
        let output = Command::new(cli_path)
            .args(["auth", "application-default", "print-access-token"])
            .env("GOOGLE_APPLICATION_CREDENTIALS", service_account_file)
            .output()
            .await
            .map_err(|e| AutosubError::Configuration(format!("Failed to run {}: {}", cli_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutosubError::Configuration(format!(
                "Failed to obtain Google Cloud access token: {}",
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AutosubError::Configuration("gcloud returned an empty access token".to_string()));
        }
        Ok(token)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = self.authorized(builder)
            .send()
            .await
            .map_err(|e| AutosubError::Transport(format!("{} failed: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AutosubError::Transport(format!("{} failed with {}: {}", what, status, error_text)));
        }
        Ok(response)
    }

    /// Poll an operation until done, bounded by `operation_timeout_secs`.
    async fn wait_for_operation(&self, operation: Operation, url: &str) -> Result<Value> {
        let limit = Duration::from_secs(self.config.operation_timeout_secs);
        let name = operation.name.clone();

        tokio::time::timeout(limit, self.poll_operation(operation, url))
            .await
            .map_err(|_| AutosubError::Timeout(format!("Operation {} did not finish within {:?}", name, limit)))?
    }

    async fn poll_operation(&self, mut operation: Operation, url: &str) -> Result<Value> {
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        while !operation.done {
            tokio::time::sleep(interval).await;
            debug!("Polling operation {}", operation.name);
            operation = self.send(self.client.get(url), "Operation polling").await?.json().await?;
        }
        finish_operation(operation)
    }
}

#[async_trait]
impl GcloudServices for GcloudClient {
    fn glossary_bucket(&self) -> String {
        self.credentials.glossary_bucket.clone()
    }

    fn audio_bucket(&self) -> String {
        self.credentials.audio_bucket.clone()
    }

    fn parent(&self) -> String {
        parent_path(&self.credentials.project_id, &self.credentials.location_id)
    }

    async fn upload_object(&self, bucket: &str, name: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.config.storage_endpoint, bucket);
        debug!("Uploading gs://{}/{} ({} bytes)", bucket, name, data.len());
        let request = self.client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        self.send(request, "Storage upload").await?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> Result<()> {
        let url = format!("{}/storage/v1/b/{}/o/{}", self.config.storage_endpoint, bucket, name);
        debug!("Deleting gs://{}/{}", bucket, name);
        self.send(self.client.delete(&url), "Storage delete").await?;
        Ok(())
    }

    async fn create_glossary(
        &self,
        glossary_path: &str,
        source_language: Language,
        target_language: Language,
        input_uri: &str,
    ) -> Result<()> {
        let url = format!("{}/v3/{}/glossaries", self.config.translation_endpoint, self.parent());
        let body = serde_json::json!({
            "name": glossary_path,
            "languagePair": {
                "sourceLanguageCode": source_language.code(),
                "targetLanguageCode": target_language.code(),
            },
            "inputConfig": {
                "gcsSource": { "inputUri": input_uri },
            },
        });

        let operation: Operation = self.send(self.client.post(&url).json(&body), "Glossary creation")
            .await?
            .json()
            .await?;
        let operation_url = format!("{}/v3/{}", self.config.translation_endpoint, operation.name);
        self.wait_for_operation(operation, &operation_url).await?;
        info!("Created glossary {}", glossary_path);
        Ok(())
    }

    async fn delete_glossary(&self, glossary_path: &str) -> Result<()> {
        let url = format!("{}/v3/{}", self.config.translation_endpoint, glossary_path);
        self.send(self.client.delete(&url), "Glossary deletion").await?;
        Ok(())
    }

    async fn translate_text(
        &self,
        contents: &[String],
        source_language: Language,
        target_language: Language,
        glossary_path: Option<String>,
    ) -> Result<Vec<String>> {
        let url = format!("{}/v3/{}:translateText", self.config.translation_endpoint, self.parent());
        let request = TranslateTextRequest {
            contents,
            source_language_code: source_language.code(),
            target_language_code: target_language.code(),
            mime_type: "text/plain",
            glossary_config: glossary_path.as_deref().map(|glossary| GlossaryConfig { glossary }),
        };

        let response: TranslateTextResponse = self.send(self.client.post(&url).json(&request), "Translation")
            .await?
            .json()
            .await
            .map_err(|e| AutosubError::UnexpectedResponse(format!("Failed to parse translation response: {}", e)))?;

        Ok(translated_texts(response, glossary_path.is_some()))
    }

    async fn long_running_recognize(
        &self,
        audio_uri: &str,
        language: Language,
        phrases: Vec<String>,
    ) -> Result<Vec<SpeechResult>> {
        let url = format!("{}/v1/speech:longrunningrecognize", self.config.speech_endpoint);
        let body = recognize_body(audio_uri, language, &self.config.speech_model, phrases);

        let operation: Operation = self.send(self.client.post(&url).json(&body), "Speech recognition")
            .await?
            .json()
            .await?;
        let operation_url = format!("{}/v1/operations/{}", self.config.speech_endpoint, operation.name);
        let response = self.wait_for_operation(operation, &operation_url).await?;

        let recognized: RecognizeResponse = serde_json::from_value(response)
            .map_err(|e| AutosubError::UnexpectedResponse(format!("Failed to parse recognition result: {}", e)))?;
        Ok(recognized.results)
    }
}

pub fn parent_path(project_id: &str, location_id: &str) -> String {
    format!("projects/{}/locations/{}", project_id, location_id)
}

fn finish_operation(operation: Operation) -> Result<Value> {
    if let Some(error) = operation.error {
        return Err(AutosubError::Transport(format!(
            "Operation {} failed ({}): {}",
            operation.name, error.code, error.message
        )));
    }
    Ok(operation.response.unwrap_or(Value::Null))
}

fn translated_texts(response: TranslateTextResponse, with_glossary: bool) -> Vec<String> {
    let translations = if with_glossary && !response.glossary_translations.is_empty() {
        response.glossary_translations
    } else {
        response.translations
    };
    translations.into_iter().map(|t| t.translated_text).collect()
}

fn recognize_body(audio_uri: &str, language: Language, model: &str, phrases: Vec<String>) -> Value {
    let mut config = serde_json::json!({
        "enableWordTimeOffsets": true,
        "languageCode": language.gcloud_code(),
        "model": model,
    });
    if !phrases.is_empty() {
        config["speechContexts"] = serde_json::json!([{ "phrases": phrases }]);
    }
    serde_json::json!({
        "config": config,
        "audio": { "uri": audio_uri },
    })
}

/// Parse a protobuf JSON duration such as `"1.500s"`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = || AutosubError::UnexpectedResponse(format!("Invalid duration '{}'", value));

    let number = value.trim().strip_suffix('s').ok_or_else(invalid)?;
    let (seconds, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
    let nanos: u32 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse().map_err(|_| invalid())?
    };
    Ok(Duration::new(seconds, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1.500s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("12s").unwrap(), Duration::from_secs(12));
        assert!(parse_duration("12").is_err());
        assert_eq!(parse_duration("0.000001s").unwrap(), Duration::from_micros(1));
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("proj", "us-central1"), "projects/proj/locations/us-central1");
    }

    #[test]
    fn test_translate_request_omits_missing_glossary() {
        let contents = vec!["こんにちは".to_string()];
        let request = TranslateTextRequest {
            contents: &contents,
            source_language_code: "ja",
            target_language_code: "en",
            mime_type: "text/plain",
            glossary_config: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["sourceLanguageCode"], "ja");
        assert_eq!(body["mimeType"], "text/plain");
        assert!(body.get("glossaryConfig").is_none());
    }

    #[test]
    fn test_glossary_translations_preferred() {
        let response: TranslateTextResponse = serde_json::from_str(
            r#"{"translations":[{"translatedText":"plain"}],"glossaryTranslations":[{"translatedText":"glossed"}]}"#,
        )
        .unwrap();
        assert_eq!(translated_texts(response.clone(), true), vec!["glossed"]);
        assert_eq!(translated_texts(response, false), vec!["plain"]);
    }

    #[test]
    fn test_recognize_body() {
        let body = recognize_body("gs://b/a.wav", Language::Ja, "latest_long", vec!["外".to_string()]);
        assert_eq!(body["config"]["languageCode"], "ja-JP");
        assert_eq!(body["config"]["enableWordTimeOffsets"], true);
        assert_eq!(body["config"]["speechContexts"][0]["phrases"][0], "外");
        assert_eq!(body["audio"]["uri"], "gs://b/a.wav");

        let bare = recognize_body("gs://b/a.wav", Language::En, "latest_long", Vec::new());
        assert!(bare["config"].get("speechContexts").is_none());
    }

    #[test]
    fn test_failed_operation_is_error() {
        let operation: Operation = serde_json::from_str(
            r#"{"name":"op1","done":true,"error":{"code":3,"message":"bad glossary"}}"#,
        )
        .unwrap();
        let err = finish_operation(operation).unwrap_err();
        assert!(matches!(err, AutosubError::Transport(msg) if msg.contains("bad glossary")));
    }

    #[test]
    fn test_speech_result_parsing() {
        let parsed: RecognizeResponse = serde_json::from_str(
            r#"{"results":[{"alternatives":[{"transcript":"hi","words":[{"startTime":"0s","endTime":"0.400s","word":"hi"}]}]}]}"#,
        )
        .unwrap();
        let word = &parsed.results[0].alternatives[0].words[0];
        assert_eq!(word.end_time.as_deref(), Some("0.400s"));
    }
}
