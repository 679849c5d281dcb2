//! autosub - context-aware subtitle translation
//!
//! Entry point: parses the command line, sets up logging and configuration,
//! then hands off to the workflow functions of the library.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autosub::cli::{Args, Commands};
use autosub::config::{Config, EnvCredentials};
use autosub::llm::{ChatSelector, OpenAiChatClient};
use autosub::media::MediaProcessorFactory;
use autosub::transcribe::TranscriberFactory;
use autosub::translate::TranslatorFactory;
use autosub::wiki::WikiTransport;
use autosub::workflow::{self, SubtitleRequest, SubtitleWorkflow};

const DEFAULT_CONFIG_FILE: &str = "autosub.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting autosub");

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    let credentials = EnvCredentials;

    match args.command {
        Commands::Subtitle {
            video,
            from_language,
            to_language,
            output_file,
            context,
            srt,
            transcription,
        } => {
            let (transcriber_provider, translator_provider) = transcription.providers();

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability().await?;
            info!("Using {}", media.version_info().await?);

            let transcriber =
                TranscriberFactory::create_transcriber(&transcriber_provider, &config, &credentials).await?;
            let translator =
                TranslatorFactory::create_translator(&translator_provider, &config, &credentials).await?;

            let request = SubtitleRequest {
                video,
                source_language: from_language,
                target_language: to_language,
                output: output_file,
                context,
                srt_output: srt,
            };

            let job = SubtitleWorkflow::new(config, media, transcriber, translator)
                .run(&request)
                .await?;
            info!("Subtitle job complete: {} lines", job.translated.len());
        }
        Commands::Context { wiki_domain, wiki_title, model, output } => {
            let transport = WikiTransport::new(&wiki_domain, &config.wiki)?;
            let chat = OpenAiChatClient::new(&config.openai, credentials.openai_api_key()?, model)?;
            let selector = ChatSelector::new(Arc::new(chat));

            workflow::generate_context(Arc::new(transport), Arc::new(selector), &wiki_title, &output).await?;
        }
        Commands::Combine { config: combine_config, output, no_prefix } => {
            let count = workflow::combine_subtitles(&combine_config, &output, !no_prefix).await?;
            info!("Combined {} subtitle lines into {}", count, output.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".autosub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "autosub.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    // HTTP stacks are chatty at debug level
    let filter = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("rustls=warn".parse()?)
        .add_directive("h2=warn".parse()?);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("autosub.log").display());
    Ok(())
}
