//! autosub - context-aware subtitle translation
//!
//! Transcribes the dialogue of a video, translates it with a glossary of
//! names and terms mined from wiki pages, and merges translated tracks into
//! styled Advanced SubStation files.

pub mod cli;
pub mod config;
pub mod error;
pub mod gcloud;
pub mod llm;
pub mod media;
pub mod models;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod wiki;
pub mod workflow;
