use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::WikiConfig;
use crate::error::{AutosubError, Result};
use super::page::{WikiMarkup, WikiPage};

const API_PATH: &str = "/w/api.php";

/// Source of wiki pages by title
#[async_trait]
pub trait WikiSource: Send + Sync {
    /// Fails with `Transport` when the page does not exist.
    async fn retrieve_wikipage(&self, title: &str) -> Result<WikiPage>;
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<Query>,
}

#[derive(Debug, Default, Deserialize)]
struct Query {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    #[serde(default)]
    slots: Option<Slots>,
}

#[derive(Debug, Deserialize)]
struct Slots {
    #[serde(default)]
    main: Option<Slot>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    #[serde(default)]
    content: Option<String>,
}

/// MediaWiki query API client
pub struct WikiTransport {
    client: Client,
    api_url: Url,
}

impl WikiTransport {
    pub fn new(base_url: &str, config: &WikiConfig) -> Result<Self> {
        let api_url = Url::parse(base_url)
            .and_then(|base| base.join(API_PATH))
            .map_err(|e| AutosubError::Configuration(format!("Invalid wiki URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, api_url })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }
}

/// Collect the main slot content of every existing page.
fn to_wikipage(title: &str, response: QueryResponse) -> Result<WikiPage> {
    let pages: Vec<Page> = response
        .query
        .map(|query| query.pages)
        .unwrap_or_default()
        .into_iter()
        .filter(|page| !page.missing)
        .collect();

    if pages.is_empty() {
        return Err(AutosubError::Transport(format!("Wiki page not found for '{}'", title)));
    }

    let markups = pages
        .into_iter()
        .filter_map(|page| page.revisions.into_iter().next())
        .filter_map(|revision| revision.slots?.main?.content)
        .map(WikiMarkup::new)
        .collect();

    Ok(WikiPage::new(title, markups))
}

#[async_trait]
impl WikiSource for WikiTransport {
    async fn retrieve_wikipage(&self, title: &str) -> Result<WikiPage> {
        debug!("Retrieving wiki page '{}' from {}", title, self.api_url);
        let response = self.client
            .get(self.api_url.clone())
            .query(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("format", "json"),
                ("rvslots", "main"),
                ("formatversion", "2"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .send()
            .await
            .map_err(|e| AutosubError::Transport(format!("Wiki request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AutosubError::Transport(format!(
                "Unexpected status code ({}) from wiki API",
                response.status()
            )));
        }

        let parsed: QueryResponse = response.json().await
            .map_err(|e| AutosubError::UnexpectedResponse(format!("Failed to parse wiki response: {}", e)))?;
        let page = to_wikipage(title, parsed)?;
        info!("Retrieved wiki page '{}' with {} markup blocks", title, page.markups.len());
        Ok(page)
    }
}
