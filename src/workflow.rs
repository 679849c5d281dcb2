use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{AutosubError, Result};
use crate::llm::Selector;
use crate::media::MediaProcessor;
use crate::models::{ContextTransformer, Language, SubtitleJob, TranslationContext};
use crate::subtitle::{SubtitleFile, SubtitleGroup, generate_srt};
use crate::transcribe::Transcriber;
use crate::translate::{Translator, translate_transcriptions};
use crate::wiki::{JpCreativeWorkTransformer, WikiSource};

const DIALOGUE_DESCRIPTION: &str = "dialogue from a video";
const EXTRACTED_AUDIO_NAME: &str = "audio.wav";

/// Inputs of one subtitle job
#[derive(Debug, Clone)]
pub struct SubtitleRequest {
    pub video: PathBuf,
    pub source_language: Language,
    pub target_language: Language,
    pub output: PathBuf,
    pub context: Option<PathBuf>,
    pub srt_output: Option<PathBuf>,
}

/// Video to translated subtitle track: extract audio, transcribe, translate.
///
/// Output files are written only once the whole job has succeeded.
pub struct SubtitleWorkflow {
    config: Config,
    media: Box<dyn MediaProcessor>,
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn Translator>,
}

impl SubtitleWorkflow {
    pub fn new(
        config: Config,
        media: Box<dyn MediaProcessor>,
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn Translator>,
    ) -> Self {
        Self { config, media, transcriber, translator }
    }

    pub async fn run(&self, request: &SubtitleRequest) -> Result<SubtitleJob> {
        info!("Processing video: {}", request.video.display());

        if !request.video.exists() {
            return Err(AutosubError::Validation(format!("Video file not found: {}", request.video.display())));
        }

        let context = match &request.context {
            Some(path) => Some(TranslationContext::load(path, self.config.context.max_phrases).await?),
            None => None,
        };

        let temp_dir = tempfile::tempdir()?;
        let audio_path = temp_dir.path().join(EXTRACTED_AUDIO_NAME);

        info!("Extracting audio from the video file");
        self.media.extract_audio(&request.video, &audio_path).await?;

        info!("Transcribing audio");
        let transcriptions = self.transcriber
            .transcribe(request.source_language, &audio_path, context.as_ref())
            .await?;
        info!("Got {} transcriptions", transcriptions.len());

        info!("Translating transcriptions");
        let translated = translate_transcriptions(
            &transcriptions,
            self.translator.as_ref(),
            request.source_language,
            request.target_language,
            DIALOGUE_DESCRIPTION,
            context.as_ref(),
        )
        .await?;

        let job = SubtitleJob::new(transcriptions, translated)?;

        info!("Writing to file {}", request.output.display());
        job.save(&request.output).await?;
        if let Some(srt_output) = &request.srt_output {
            generate_srt(&job.translated, srt_output).await?;
        }

        Ok(job)
    }
}

/// Build a context file from a wiki page about a Japanese creative work.
pub async fn generate_context(
    source: Arc<dyn WikiSource>,
    selector: Arc<dyn Selector>,
    title: &str,
    output: &Path,
) -> Result<TranslationContext> {
    info!("Querying wiki for '{}'", title);
    let page = source.retrieve_wikipage(title).await?;

    let transformer = JpCreativeWorkTransformer::new(source, selector, page);
    let context = transformer.prepare_context().await?;
    info!(
        "Extracted {} phrases, synopsis {}",
        context.phrases.len(),
        if context.synopsis.is_some() { "found" } else { "missing" }
    );

    info!("Writing context to file {}", output.display());
    context.save(output).await?;
    Ok(context)
}

/// Merge the translated tracks of several jobs into one styled ASS file.
///
/// Returns the number of subtitle lines written.
pub async fn combine_subtitles(config_path: &Path, output: &Path, prefix_group_name: bool) -> Result<usize> {
    info!("Loading combine config {}", config_path.display());
    let groups = SubtitleGroup::load_all(config_path).await?;

    let mut file = SubtitleFile::new(&groups, prefix_group_name)?;
    for group in &groups {
        let job_path = resolve_relative(config_path, &group.json_path);
        let job = SubtitleJob::load(&job_path).await?;
        info!("Adding {} lines for group {}", job.translated.len(), group.name);
        file.add_all(&group.name, &job.translated);
    }

    file.save(output).await?;
    Ok(file.event_count())
}

/// Relative job paths are taken from the current directory first, then
/// from the config file's directory.
fn resolve_relative(config_path: &Path, json_path: &str) -> PathBuf {
    let path = PathBuf::from(json_path);
    if path.is_absolute() || path.exists() {
        return path;
    }
    config_path
        .parent()
        .map(|dir| dir.join(&path))
        .unwrap_or(path)
}
