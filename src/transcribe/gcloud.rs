use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AutosubError, Result};
use crate::gcloud::{GcloudServices, SpeechResult, parse_duration};
use crate::models::{Language, Transcription, TranslationContext};
use super::{Transcriber, hint_phrases};

/// Google Cloud Speech long running recognition.
///
/// The audio is uploaded under a random name to the audio bucket and
/// deleted once recognition finishes; deletion failures only warn.
pub struct GcloudTranscriber {
    client: Arc<dyn GcloudServices>,
}

impl GcloudTranscriber {
    pub fn new(client: Arc<dyn GcloudServices>) -> Self {
        Self { client }
    }
}

fn offset(value: Option<&str>) -> Result<Duration> {
    value.map(parse_duration).unwrap_or(Ok(Duration::ZERO))
}

/// One record per result; results without word timings are skipped.
fn to_transcriptions(results: Vec<SpeechResult>) -> Result<Vec<Transcription>> {
    let mut transcriptions = Vec::new();
    for result in results {
        let Some(alternative) = result.alternatives.into_iter().next() else {
            continue;
        };
        let (Some(first), Some(last)) = (alternative.words.first(), alternative.words.last()) else {
            continue;
        };
        transcriptions.push(Transcription::new(
            None,
            alternative.transcript.trim(),
            offset(first.start_time.as_deref())?,
            offset(last.end_time.as_deref())?,
        )?);
    }
    Ok(transcriptions)
}

fn uploaded_name(audio_path: &Path) -> String {
    match audio_path.extension() {
        Some(extension) => format!("{}.{}", Uuid::new_v4(), extension.to_string_lossy()),
        None => Uuid::new_v4().to_string(),
    }
}

#[async_trait]
impl Transcriber for GcloudTranscriber {
    async fn transcribe(
        &self,
        language: Language,
        audio_path: &Path,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<Transcription>> {
        let data = tokio::fs::read(audio_path)
            .await
            .map_err(|e| AutosubError::Transcriber(format!("Failed to read {}: {}", audio_path.display(), e)))?;

        let bucket = self.client.audio_bucket();
        let name = uploaded_name(audio_path);
        self.client.upload_object(&bucket, &name, data, "application/octet-stream").await?;
        info!("Uploaded audio to gs://{}/{}", bucket, name);

        let recognized = self.client
            .long_running_recognize(&format!("gs://{}/{}", bucket, name), language, hint_phrases(context))
            .await;

        if let Err(e) = self.client.delete_object(&bucket, &name).await {
            warn!("Failed to delete uploaded audio {}: {}", name, e);
        }

        to_transcriptions(recognized?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcloud::MockGcloudServices;
    use crate::models::PhraseLocalisation;
    use tempfile::TempDir;

    const ONE_RESULT: &str = r#"[{"alternatives":[{"transcript":" hi ","words":[
        {"startTime":"0.100s","endTime":"0.400s","word":"hi"}]}]}]"#;

    async fn audio_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("audio.wav");
        tokio::fs::write(&path, b"RIFF").await.unwrap();
        path
    }

    fn uploading_services() -> MockGcloudServices {
        let mut services = MockGcloudServices::new();
        services.expect_audio_bucket().return_const("audio".to_string());
        services
            .expect_upload_object()
            .withf(|bucket, name, data, _| bucket == "audio" && name.ends_with(".wav") && data == b"RIFF")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        services
    }

    #[tokio::test]
    async fn test_audio_removed_when_recognition_fails() {
        let mut services = uploading_services();
        services
            .expect_long_running_recognize()
            .times(1)
            .returning(|_, _, _| Err(AutosubError::Timeout("Operation op1 did not finish".to_string())));
        services
            .expect_delete_object()
            .withf(|bucket, name| bucket == "audio" && name.ends_with(".wav"))
            .times(1)
            .returning(|_, _| Ok(()));

        let dir = TempDir::new().unwrap();
        let audio = audio_file(&dir).await;
        let result = GcloudTranscriber::new(Arc::new(services)).transcribe(Language::Ja, &audio, None).await;
        assert!(matches!(result, Err(AutosubError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_transcription() {
        let mut services = uploading_services();
        services
            .expect_long_running_recognize()
            .withf(|uri, language, phrases| {
                uri.starts_with("gs://audio/") && *language == Language::Ja && phrases == &["竈門".to_string()]
            })
            .times(1)
            .returning(|_, _, _| Ok(serde_json::from_str(ONE_RESULT).unwrap()));
        services
            .expect_delete_object()
            .times(1)
            .returning(|_, _| Err(AutosubError::Transport("Storage delete failed".to_string())));

        let dir = TempDir::new().unwrap();
        let audio = audio_file(&dir).await;
        let context = TranslationContext::new(None, vec![PhraseLocalisation::new("竈門", "Kamado")]);
        let transcriptions = GcloudTranscriber::new(Arc::new(services))
            .transcribe(Language::Ja, &audio, Some(&context))
            .await
            .unwrap();
        assert_eq!(transcriptions.len(), 1);
        assert_eq!(transcriptions[0].text, "hi");
        assert_eq!(transcriptions[0].time_end, Duration::from_millis(400));
    }

    fn results(json: &str) -> Vec<SpeechResult> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_first_and_last_word_bound_the_record() {
        let parsed = results(
            r#"[{"alternatives":[{"transcript":"hello world","words":[
                {"startTime":"1.200s","endTime":"1.500s","word":"hello"},
                {"startTime":"1.500s","endTime":"2.100s","word":"world"}
            ]}]}]"#,
        );
        let transcriptions = to_transcriptions(parsed).unwrap();
        assert_eq!(transcriptions.len(), 1);
        assert_eq!(transcriptions[0].text, "hello world");
        assert_eq!(transcriptions[0].time_start, Duration::from_millis(1200));
        assert_eq!(transcriptions[0].time_end, Duration::from_millis(2100));
    }

    #[test]
    fn test_results_without_words_are_skipped() {
        let parsed = results(
            r#"[{"alternatives":[{"transcript":"noise","words":[]}]},
                {"alternatives":[]},
                {"alternatives":[{"transcript":"ok","words":[{"endTime":"0.300s","word":"ok"}]}]}]"#,
        );
        let transcriptions = to_transcriptions(parsed).unwrap();
        assert_eq!(transcriptions.len(), 1);
        assert_eq!(transcriptions[0].time_start, Duration::ZERO);
    }

    #[test]
    fn test_uploaded_name_keeps_extension() {
        assert!(uploaded_name(Path::new("/tmp/audio.wav")).ends_with(".wav"));
        assert!(!uploaded_name(Path::new("/tmp/audio")).contains('.'));
    }
}
