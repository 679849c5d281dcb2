use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{AutosubError, Result};
use super::{ChatCompletion, ChatMessage, Selector};

static INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid index pattern"));
static NULL_ANSWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(null|none)\b").expect("valid null pattern"));

/// [`Selector`] that asks a chat model for the index of the best item.
pub struct ChatSelector {
    chat: Arc<dyn ChatCompletion>,
}

impl ChatSelector {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }

    fn build_prompt(item_description: &str, criteria_description: &str, allow_none: bool) -> String {
        let mut prompt = format!(
            "The user is going to provide a list of {}. One item per line. \
             Does any of them correspond to {}? \
             Please provide just the index of the most likely item. ",
            item_description, criteria_description
        );
        if allow_none {
            prompt.push_str("If none of them looks likely, you can reply 'null'");
        }
        prompt
    }

    fn enumerate(items: &[String]) -> String {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| format!("{}. {}", index, item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Interpret a model answer as an index into `items`.
pub fn parse_selection(reply: &str, items: &[String], allow_none: bool) -> Result<Option<String>> {
    let Some(capture) = INDEX.captures(reply) else {
        if allow_none && NULL_ANSWER.is_match(reply) {
            return Ok(None);
        }
        return Err(AutosubError::UnexpectedResponse(format!(
            "LLM gave an unexpected response '{}'",
            reply
        )));
    };

    let index: usize = capture[1]
        .parse()
        .map_err(|_| AutosubError::UnexpectedResponse(format!("LLM picked an unexpected index '{}'", &capture[1])))?;

    items
        .get(index)
        .cloned()
        .map(Some)
        .ok_or_else(|| AutosubError::UnexpectedResponse(format!("LLM picked an unexpected index '{}'", index)))
}

#[async_trait]
impl Selector for ChatSelector {
    async fn select_one_from_list(
        &self,
        items: &[String],
        item_description: &str,
        criteria_description: &str,
        allow_none: bool,
    ) -> Result<Option<String>> {
        if items.is_empty() {
            if allow_none {
                return Ok(None);
            }
            return Err(AutosubError::UnexpectedResponse(format!(
                "No {} to choose {} from",
                item_description, criteria_description
            )));
        }

        let messages = [
            ChatMessage::system(Self::build_prompt(item_description, criteria_description, allow_none)),
            ChatMessage::user(Self::enumerate(items)),
        ];
        let reply = self.chat.complete(&messages).await?;
        debug!("Selection reply: {}", reply);

        let selected = parse_selection(&reply, items, allow_none)?;
        match &selected {
            Some(item) => info!("Selected '{}' as {}", item, criteria_description),
            None => info!("No {} matched {}", item_description, criteria_description),
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedChat {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedChat {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.to_string(), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    fn items() -> Vec<String> {
        vec!["Plot".to_string(), "Characters".to_string(), "Reception".to_string()]
    }

    #[test]
    fn test_parse_first_integer() {
        assert_eq!(parse_selection("1", &items(), false).unwrap().as_deref(), Some("Characters"));
        assert_eq!(parse_selection("The answer is 2.", &items(), false).unwrap().as_deref(), Some("Reception"));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(parse_selection("7", &items(), true), Err(AutosubError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_parse_null() {
        assert_eq!(parse_selection("null", &items(), true).unwrap(), None);
        assert!(matches!(parse_selection("null", &items(), false), Err(AutosubError::UnexpectedResponse(_))));
        assert!(matches!(parse_selection("no idea", &items(), true), Err(AutosubError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_select_enumerates_items() {
        let chat = ScriptedChat::new("0");
        let selector = ChatSelector::new(chat.clone());

        let selected = selector
            .select_one_from_list(&items(), "section headings", "synopsis/overview", false)
            .await
            .unwrap();

        assert_eq!(selected.as_deref(), Some("Plot"));
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0][1].content, "0. Plot\n1. Characters\n2. Reception");
        assert!(seen[0][0].content.contains("synopsis/overview"));
        assert!(!seen[0][0].content.contains("null"));
    }

    #[tokio::test]
    async fn test_empty_list_without_model_call() {
        let chat = ScriptedChat::new("0");
        let selector = ChatSelector::new(chat.clone());

        assert_eq!(selector.select_one_from_list(&[], "entries", "character list", true).await.unwrap(), None);
        assert!(selector.select_one_from_list(&[], "entries", "character list", false).await.is_err());
        assert!(chat.seen.lock().unwrap().is_empty());
    }
}
