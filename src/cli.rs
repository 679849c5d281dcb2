use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::EnvCredentials;
use crate::models::Language;
use crate::transcribe::TranscriberProvider;
use crate::translate::TranslatorProvider;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a video and translate its dialogue into a subtitle job file
    Subtitle {
        /// Path to video file
        video: PathBuf,

        /// Spoken language (ZH_TW, EN, JA)
        from_language: Language,

        /// Subtitle language (ZH_TW, EN, JA)
        to_language: Language,

        /// Path to JSON output
        output_file: PathBuf,

        /// Context file with synopsis and phrases
        #[arg(long)]
        context: Option<PathBuf>,

        /// Also write the translated track as SRT
        #[arg(long)]
        srt: Option<PathBuf>,

        #[command(subcommand)]
        transcription: TranscriptionCommand,
    },

    /// Build a context file from a wiki page
    #[command(after_help = EnvCredentials::openai_help())]
    Context {
        /// Wiki base URL, e.g. https://en.wikipedia.org
        wiki_domain: String,

        /// Title of the page about the work
        wiki_title: String,

        /// OpenAI model used to select sections and related pages
        model: String,

        /// Path to JSON output
        output: PathBuf,
    },

    /// Combine the translated tracks of several subtitle jobs into one ASS file
    Combine {
        /// JSON array of {name, color_hex, margin_bottom, json_path}
        config: PathBuf,

        /// Path to ASS output
        output: PathBuf,

        /// Do not prefix lines with their group name
        #[arg(long)]
        no_prefix: bool,
    },
}

/// Provider for transcription
#[derive(Subcommand)]
pub enum TranscriptionCommand {
    /// Local whisper command-line tool
    Whisper {
        /// Whisper model, e.g. medium
        model: String,

        #[command(subcommand)]
        translation: TranslationCommand,
    },

    /// Google Cloud Speech
    #[command(after_help = EnvCredentials::gcloud_help())]
    Gcloud {
        #[command(subcommand)]
        translation: TranslationCommand,
    },
}

/// Provider for translation
#[derive(Subcommand)]
pub enum TranslationCommand {
    /// OpenAI chat model
    #[command(after_help = EnvCredentials::openai_help())]
    Openai {
        /// Model name, e.g. gpt-3.5-turbo
        model: String,
    },

    /// Google Cloud Translation with a temporary glossary
    #[command(after_help = EnvCredentials::gcloud_help())]
    Gcloud,

    /// Local completion model served by Ollama
    Llama {
        /// Model name as known to Ollama
        model: String,
    },
}

impl TranscriptionCommand {
    pub fn providers(&self) -> (TranscriberProvider, TranslatorProvider) {
        match self {
            Self::Whisper { model, translation } => {
                (TranscriberProvider::Whisper { model: model.clone() }, translation.provider())
            }
            Self::Gcloud { translation } => (TranscriberProvider::Gcloud, translation.provider()),
        }
    }
}

impl TranslationCommand {
    pub fn provider(&self) -> TranslatorProvider {
        match self {
            Self::Openai { model } => TranslatorProvider::OpenAi { model: model.clone() },
            Self::Gcloud => TranslatorProvider::Gcloud,
            Self::Llama { model } => TranslatorProvider::Llama { model: model.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_provider_commands() {
        let args = Args::try_parse_from([
            "autosub", "subtitle", "ep1.mkv", "JA", "EN", "ep1.json", "--context", "ctx.json",
            "whisper", "medium", "openai", "gpt-3.5-turbo",
        ])
        .unwrap();

        match args.command {
            Commands::Subtitle { from_language, to_language, context, transcription, .. } => {
                assert_eq!(from_language, Language::Ja);
                assert_eq!(to_language, Language::En);
                assert_eq!(context, Some(PathBuf::from("ctx.json")));
                assert_eq!(
                    transcription.providers(),
                    (
                        TranscriberProvider::Whisper { model: "medium".to_string() },
                        TranslatorProvider::OpenAi { model: "gpt-3.5-turbo".to_string() },
                    )
                );
            }
            _ => panic!("expected subtitle command"),
        }
    }

    #[test]
    fn test_gcloud_for_both_stages() {
        let args = Args::try_parse_from(["autosub", "subtitle", "v.mp4", "ZH_TW", "EN", "o.json", "gcloud", "gcloud"])
            .unwrap();
        let Commands::Subtitle { transcription, .. } = args.command else {
            panic!("expected subtitle command");
        };
        assert_eq!(transcription.providers(), (TranscriberProvider::Gcloud, TranslatorProvider::Gcloud));
    }

    #[test]
    fn test_unknown_language_rejected() {
        assert!(Args::try_parse_from(["autosub", "subtitle", "v.mp4", "KO", "EN", "o.json", "gcloud", "gcloud"]).is_err());
    }

    #[test]
    fn test_combine_flags() {
        let args = Args::try_parse_from(["autosub", "-v", "combine", "groups.json", "out.ass", "--no-prefix"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Commands::Combine { no_prefix: true, .. }));
    }
}
