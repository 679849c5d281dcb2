// LLM plumbing shared by translation and context extraction:
// - ChatCompletion: role/content messages in, reply text out
// - Selector: pick the most suitable item from a list
// - Tokenizer: token counting used for batching

pub mod openai;
pub mod select;
pub mod tokenizer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiChatClient;
pub use select::ChatSelector;
pub use tokenizer::{CodepointTokenizer, TiktokenTokenizer, Tokenizer};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Chat style completion backed by some model.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the conversation and return the text of the first choice.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Ask a model to analyse a list and pick the most suitable item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Selector: Send + Sync {
    /// Returns `None` only when `allow_none` is set and the model declined
    /// to choose.
    async fn select_one_from_list(
        &self,
        items: &[String],
        item_description: &str,
        criteria_description: &str,
        allow_none: bool,
    ) -> Result<Option<String>>;
}
