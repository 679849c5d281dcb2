use serde::{Deserialize, Serialize};

/// A term in the source language paired with its agreed translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhraseLocalisation {
    pub foreign: String,
    pub local: String,
}

impl PhraseLocalisation {
    pub fn new(foreign: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            foreign: foreign.into(),
            local: local.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.foreign.is_empty() && !self.local.is_empty()
    }
}
