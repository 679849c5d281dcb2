use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AutosubError, Result};
use crate::config::GcloudConfig;
use crate::gcloud::GcloudServices;
use crate::llm::CodepointTokenizer;
use crate::models::{Language, PhraseLocalisation, TranslationContext};
use super::{Translator, batch::batch_by_token_count};

/// Cloud Translation with a temporary glossary built from the context.
///
/// The glossary and its TSV object exist only for the duration of one
/// `translate` call and are removed afterwards, whether or not the
/// translation succeeded. Removal failures are logged, never raised.
pub struct GcloudTranslator {
    client: Arc<dyn GcloudServices>,
    config: GcloudConfig,
}

/// Glossary created for one call.
struct TemporaryGlossary {
    path: String,
    object_name: String,
}

impl GcloudTranslator {
    pub fn new(client: Arc<dyn GcloudServices>, config: GcloudConfig) -> Self {
        Self { client, config }
    }

    async fn create_glossary(
        &self,
        phrases: &[PhraseLocalisation],
        source_language: Language,
        target_language: Language,
    ) -> Result<TemporaryGlossary> {
        let glossary_id = format!("g{}", Uuid::new_v4());
        let glossary = TemporaryGlossary {
            path: format!("{}/glossaries/{}", self.client.parent(), glossary_id),
            object_name: format!("{}.tsv", glossary_id),
        };
        let bucket = self.client.glossary_bucket();

        self.client
            .upload_object(&bucket, &glossary.object_name, glossary_tsv(phrases).into_bytes(), "text/tab-separated-values")
            .await?;

        let input_uri = format!("gs://{}/{}", bucket, glossary.object_name);
        if let Err(e) = self.client
            .create_glossary(&glossary.path, source_language, target_language, &input_uri)
            .await
        {
            self.remove_glossary(&glossary).await;
            return Err(e);
        }

        Ok(glossary)
    }

    async fn remove_glossary(&self, glossary: &TemporaryGlossary) {
        if let Err(e) = self.client.delete_glossary(&glossary.path).await {
            warn!("Failed to delete glossary {}: {}", glossary.path, e);
        }
        if let Err(e) = self.client.delete_object(&self.client.glossary_bucket(), &glossary.object_name).await {
            warn!("Failed to delete glossary file {}: {}", glossary.object_name, e);
        }
    }

    async fn translate_chunks(
        &self,
        input: &[String],
        source_language: Language,
        target_language: Language,
        glossary_path: Option<&str>,
    ) -> Result<Vec<String>> {
        let chunks = batch_by_token_count(
            &CodepointTokenizer,
            self.config.max_codepoints_per_request,
            input,
            self.config.max_items_per_request,
        )?;

        let mut result = Vec::with_capacity(input.len());
        for chunk in chunks.iter().filter(|chunk| !chunk.is_empty()) {
            let translated = self.client
                .translate_text(chunk, source_language, target_language, glossary_path.map(str::to_string))
                .await?;
            if translated.len() != chunk.len() {
                return Err(AutosubError::UnexpectedResponse(format!(
                    "Cloud translation returned {} lines for {} inputs",
                    translated.len(),
                    chunk.len()
                )));
            }
            result.extend(translated);
        }
        Ok(result)
    }
}

/// Tab separated `foreign<TAB>local` rows, one per phrase.
pub fn glossary_tsv(phrases: &[PhraseLocalisation]) -> String {
    phrases
        .iter()
        .map(|phrase| format!("{}\t{}", phrase.foreign, phrase.local))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Translator for GcloudTranslator {
    async fn translate(
        &self,
        input: &[String],
        source_language: Language,
        target_language: Language,
        _input_description: Option<&str>,
        context: Option<&TranslationContext>,
    ) -> Result<Vec<String>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let glossary = match context.filter(|c| c.has_phrases()) {
            Some(context) => {
                info!("Creating glossary with {} phrases", context.phrases.len());
                Some(self.create_glossary(&context.phrases, source_language, target_language).await?)
            }
            None => None,
        };

        let result = self
            .translate_chunks(input, source_language, target_language, glossary.as_ref().map(|g| g.path.as_str()))
            .await;

        if let Some(glossary) = &glossary {
            self.remove_glossary(glossary).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcloud::MockGcloudServices;

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn glossary_context() -> TranslationContext {
        TranslationContext::new(None, vec![PhraseLocalisation::new("竈門", "Kamado")])
    }

    /// Services that accept the glossary upload and creation
    fn glossary_services() -> MockGcloudServices {
        let mut services = MockGcloudServices::new();
        services.expect_glossary_bucket().return_const("glossaries".to_string());
        services.expect_parent().return_const("projects/p/locations/l".to_string());
        services
            .expect_upload_object()
            .withf(|bucket, name, data, _| {
                bucket == "glossaries" && name.starts_with('g') && name.ends_with(".tsv") && data == "竈門\tKamado".as_bytes()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        services
            .expect_create_glossary()
            .withf(|path, _, _, uri| {
                path.starts_with("projects/p/locations/l/glossaries/g") && uri.starts_with("gs://glossaries/g")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        services
    }

    fn translator(services: MockGcloudServices) -> GcloudTranslator {
        GcloudTranslator::new(Arc::new(services), GcloudConfig::default())
    }

    #[tokio::test]
    async fn test_glossary_removed_when_translation_fails() {
        let mut services = glossary_services();
        services
            .expect_translate_text()
            .times(1)
            .returning(|_, _, _, _| Err(AutosubError::Transport("Translation failed with 500".to_string())));
        services.expect_delete_glossary().times(1).returning(|_| Ok(()));
        services
            .expect_delete_object()
            .withf(|bucket, name| bucket == "glossaries" && name.ends_with(".tsv"))
            .times(1)
            .returning(|_, _| Ok(()));

        let context = glossary_context();
        let result = translator(services)
            .translate(&lines(&["竈門です"]), Language::Ja, Language::En, None, Some(&context))
            .await;
        assert!(matches!(result, Err(AutosubError::Transport(_))));
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_translation() {
        let mut services = glossary_services();
        services
            .expect_translate_text()
            .withf(|contents, _, _, glossary| {
                contents.len() == 2 && glossary.as_deref().is_some_and(|g| g.contains("/glossaries/g"))
            })
            .times(1)
            .returning(|contents, _, _, _| Ok(contents.iter().map(|c| format!("EN {}", c)).collect()));
        services
            .expect_delete_glossary()
            .times(1)
            .returning(|_| Err(AutosubError::Transport("Glossary deletion failed".to_string())));
        services
            .expect_delete_object()
            .times(1)
            .returning(|_, _| Err(AutosubError::Transport("Storage delete failed".to_string())));

        let context = glossary_context();
        let translated = translator(services)
            .translate(&lines(&["竈門", "です"]), Language::Ja, Language::En, None, Some(&context))
            .await
            .unwrap();
        assert_eq!(translated, lines(&["EN 竈門", "EN です"]));
    }

    #[tokio::test]
    async fn test_failed_glossary_creation_removes_upload() {
        let mut services = MockGcloudServices::new();
        services.expect_glossary_bucket().return_const("glossaries".to_string());
        services.expect_parent().return_const("projects/p/locations/l".to_string());
        services.expect_upload_object().times(1).returning(|_, _, _, _| Ok(()));
        services
            .expect_create_glossary()
            .times(1)
            .returning(|_, _, _, _| Err(AutosubError::Transport("Glossary creation failed".to_string())));
        services.expect_delete_glossary().times(1).returning(|_| Ok(()));
        services.expect_delete_object().times(1).returning(|_, _| Ok(()));
        services.expect_translate_text().times(0);

        let context = glossary_context();
        let result = translator(services)
            .translate(&lines(&["竈門"]), Language::Ja, Language::En, None, Some(&context))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_no_phrases_means_no_glossary() {
        let mut services = MockGcloudServices::new();
        services.expect_upload_object().times(0);
        services.expect_create_glossary().times(0);
        services.expect_delete_glossary().times(0);
        services
            .expect_translate_text()
            .withf(|_, _, _, glossary| glossary.is_none())
            .times(1)
            .returning(|contents, _, _, _| Ok(contents.to_vec()));

        let context = TranslationContext::new(Some("A story".to_string()), Vec::new());
        let translated = translator(services)
            .translate(&lines(&["a", "b"]), Language::Ja, Language::En, None, Some(&context))
            .await
            .unwrap();
        assert_eq!(translated, lines(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_short_chunk_response_is_error() {
        let mut services = MockGcloudServices::new();
        services.expect_translate_text().returning(|_, _, _, _| Ok(vec!["only one".to_string()]));

        let result = translator(services)
            .translate(&lines(&["a", "b"]), Language::Ja, Language::En, None, None)
            .await;
        assert!(matches!(result, Err(AutosubError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_glossary_tsv() {
        let phrases = vec![PhraseLocalisation::new("外", "ABC"), PhraseLocalisation::new("内", "DEF")];
        assert_eq!(glossary_tsv(&phrases), "外\tABC\n内\tDEF");
        assert_eq!(glossary_tsv(&[]), "");
    }
}
