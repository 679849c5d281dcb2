use tracing::debug;

use crate::error::{AutosubError, Result};
use crate::llm::Tokenizer;

/// Split `items` into ordered batches that fit a model's context window.
///
/// Items are accumulated greedily; a new batch starts when the next item
/// would push the running token count over `max_tokens` or the batch past
/// `max_items_per_batch`. The last batch is always emitted, so empty input
/// yields a single empty batch. A single item costing more than
/// `max_tokens` is an error, never truncated or dropped.
pub fn batch_by_token_count(
    tokenizer: &dyn Tokenizer,
    max_tokens: usize,
    items: &[String],
    max_items_per_batch: usize,
) -> Result<Vec<Vec<String>>> {
    if max_items_per_batch < 1 {
        return Err(AutosubError::Configuration(format!(
            "max_items_per_batch must be at least 1, got {}",
            max_items_per_batch
        )));
    }

    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current_batch: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for item in items {
        let item_tokens = tokenizer.count_tokens(item);
        if item_tokens > max_tokens {
            return Err(AutosubError::InputTooLarge {
                text: item.clone(),
                tokens: item_tokens,
                max_tokens,
            });
        }
        if current_tokens + item_tokens > max_tokens || current_batch.len() + 1 > max_items_per_batch {
            batches.push(std::mem::take(&mut current_batch));
            current_tokens = 0;
        }
        current_batch.push(item.clone());
        current_tokens += item_tokens;
    }
    batches.push(current_batch);

    debug!("Split {} items into {} batches (max {} tokens, {} items)",
           items.len(), batches.len(), max_tokens, max_items_per_batch);
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CodepointTokenizer;
    use std::collections::HashMap;

    struct TableTokenizer(HashMap<&'static str, usize>);

    impl Tokenizer for TableTokenizer {
        fn count_tokens(&self, text: &str) -> usize {
            self.0.get(text).copied().unwrap_or(1)
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_token_limit_starts_new_batch() {
        let tokenizer = TableTokenizer(HashMap::from([("a", 3), ("b", 4), ("c", 5)]));
        let batches = batch_by_token_count(&tokenizer, 10, &strings(&["a", "b", "c"]), 2).unwrap();
        assert_eq!(batches, vec![strings(&["a", "b"]), strings(&["c"])]);
    }

    #[test]
    fn test_item_cap_starts_new_batch() {
        let batches = batch_by_token_count(&CodepointTokenizer, 100, &strings(&["a", "b", "c", "d", "e"]), 2).unwrap();
        assert_eq!(batches, vec![strings(&["a", "b"]), strings(&["c", "d"]), strings(&["e"])]);
    }

    #[test]
    fn test_zero_cap_is_configuration_error() {
        let result = batch_by_token_count(&CodepointTokenizer, 100, &strings(&["a"]), 0);
        assert!(matches!(result, Err(AutosubError::Configuration(_))));
    }

    #[test]
    fn test_oversized_item_is_reported() {
        let result = batch_by_token_count(&CodepointTokenizer, 3, &strings(&["ok", "too long"]), 5);
        match result {
            Err(AutosubError::InputTooLarge { text, tokens, max_tokens }) => {
                assert_eq!(text, "too long");
                assert_eq!(tokens, 8);
                assert_eq!(max_tokens, 3);
            }
            other => panic!("expected InputTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_yields_one_empty_batch() {
        let batches = batch_by_token_count(&CodepointTokenizer, 10, &[], 3).unwrap();
        assert_eq!(batches, vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_batches_preserve_order_and_respect_limits() {
        let items: Vec<String> = (0..57).map(|i| "x".repeat(i % 7 + 1) + &i.to_string()).collect();
        for (max_tokens, cap) in [(9, 1), (12, 3), (40, 15), (200, 4)] {
            let batches = batch_by_token_count(&CodepointTokenizer, max_tokens, &items, cap).unwrap();

            let flattened: Vec<String> = batches.iter().flatten().cloned().collect();
            assert_eq!(flattened, items);
            for batch in &batches {
                assert!(!batch.is_empty());
                assert!(batch.len() <= cap);
                let cost: usize = batch.iter().map(|s| CodepointTokenizer.count_tokens(s)).sum();
                assert!(cost <= max_tokens);
            }
        }
    }
}
