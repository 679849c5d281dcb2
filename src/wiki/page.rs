use once_cell::sync::OnceCell;

use super::markup::{self, Wikicode};

/// One block of raw wikitext, parsed on first access and cached.
#[derive(Debug, Clone)]
pub struct WikiMarkup {
    raw: String,
    parsed: OnceCell<Wikicode>,
}

impl WikiMarkup {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), parsed: OnceCell::new() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parsed(&self) -> &Wikicode {
        self.parsed.get_or_init(|| markup::parse(&self.raw))
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }
}

/// An encyclopedia page: its title and the markup of each revision slot.
#[derive(Debug, Clone)]
pub struct WikiPage {
    pub title: String,
    pub markups: Vec<WikiMarkup>,
}

impl WikiPage {
    pub fn new(title: impl Into<String>, markups: Vec<WikiMarkup>) -> Self {
        Self { title: title.into(), markups }
    }

    pub fn from_raw<I, S>(title: impl Into<String>, raws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(title, raws.into_iter().map(WikiMarkup::new).collect())
    }
}
