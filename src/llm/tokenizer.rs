use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::error::{AutosubError, Result};

/// Counts how many tokens a model would spend on a piece of text.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// BPE token counts for OpenAI models.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Encoding for `model`, falling back to `cl100k_base` for models the
    /// tokenizer tables do not know.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                warn!("No tokenizer registered for model '{}' ({}), using cl100k_base", model, e);
                tiktoken_rs::cl100k_base()
                    .map_err(|e| AutosubError::Configuration(format!("Failed to load tokenizer: {}", e)))?
            }
        };
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// One token per Unicode scalar value.
///
/// Used where a service limits requests by code points rather than tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodepointTokenizer;

impl Tokenizer for CodepointTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codepoints() {
        assert_eq!(CodepointTokenizer.count_tokens("abc"), 3);
        assert_eq!(CodepointTokenizer.count_tokens("こんにちは"), 5);
        assert_eq!(CodepointTokenizer.count_tokens(""), 0);
    }
}
