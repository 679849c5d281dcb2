// Domain value types shared by every stage of the pipeline.

pub mod language;
pub mod transcription;
pub mod phrase;
pub mod context;
pub mod job;

pub use language::Language;
pub use transcription::Transcription;
pub use phrase::PhraseLocalisation;
pub use context::{ContextTransformer, TranslationContext};
pub use job::SubtitleJob;
