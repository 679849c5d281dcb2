use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AutosubError, Result};
use crate::llm::Selector;
use crate::models::{ContextTransformer, PhraseLocalisation};
use super::markup::{Node, Template};
use super::page::WikiPage;
use super::transport::WikiSource;

const CROSS_REFERENCE_TEMPLATES: &[&str] = &["main", "see", "further"];
const ANCHOR_TEMPLATE: &str = "vanchor";
const BILINGUAL_TEMPLATE_PREFIX: &str = "nihongo";
const CHARACTER_LIST_CRITERIA: &str = "character list";

/// Page-level extraction shared by wiki based context transformers:
/// synopsis selection and following cross references to related pages.
pub struct WikipageTransformer {
    source: Arc<dyn WikiSource>,
    selector: Arc<dyn Selector>,
    page: WikiPage,
}

impl WikipageTransformer {
    pub fn new(source: Arc<dyn WikiSource>, selector: Arc<dyn Selector>, page: WikiPage) -> Self {
        Self { source, selector, page }
    }

    pub fn page(&self) -> &WikiPage {
        &self.page
    }

    /// Plain text of the section the selector picks as the synopsis.
    ///
    /// A page without headings, or a selector that declines to pick one,
    /// is an error.
    pub async fn synopsis(&self) -> Result<String> {
        let mut sections: Vec<(String, String)> = Vec::new();
        for markup in &self.page.markups {
            for section in markup.parsed().sections() {
                let text = section.strip_code();
                match sections.iter_mut().find(|(title, _)| *title == section.title) {
                    Some(existing) => existing.1 = text,
                    None => sections.push((section.title, text)),
                }
            }
        }

        if sections.is_empty() {
            return Err(AutosubError::UnexpectedResponse(format!(
                "Wiki page '{}' has no sections to pick a synopsis from",
                self.page.title
            )));
        }

        let headings: Vec<String> = sections.iter().map(|(title, _)| title.clone()).collect();
        let selected = self.selector
            .select_one_from_list(&headings, "section headings of an encyclopedia entry", "synopsis/overview", false)
            .await?
            .ok_or_else(|| AutosubError::UnexpectedResponse("No synopsis section was selected".to_string()))?;
        info!("Using section '{}' as synopsis", selected);

        sections
            .into_iter()
            .find(|(title, _)| *title == selected)
            .map(|(_, text)| text)
            .ok_or_else(|| AutosubError::UnexpectedResponse(format!("Selected unknown section '{}'", selected)))
    }

    /// Titles named by cross reference templates, in first-seen order
    pub fn related_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        for markup in &self.page.markups {
            for template in markup.parsed().templates() {
                if let Some(title) = cross_reference_title(template) {
                    if !titles.contains(&title) {
                        titles.push(title);
                    }
                }
            }
        }
        titles
    }

    /// Follow the cross reference the selector judges closest to
    /// `criteria`, if any.
    pub async fn find_relevant_wikipage(&self, criteria: &str) -> Result<Option<WikiPage>> {
        let titles = self.related_titles();
        if titles.is_empty() {
            debug!("No related pages referenced from '{}'", self.page.title);
            return Ok(None);
        }

        match self.selector.select_one_from_list(&titles, "entries", criteria, true).await? {
            Some(title) => {
                info!("Following related page '{}' for {}", title, criteria);
                Ok(Some(self.source.retrieve_wikipage(&title).await?))
            }
            None => Ok(None),
        }
    }
}

/// Target of a `main`, `see` or `further` template, cut before any
/// nested template
fn cross_reference_title(template: &Template) -> Option<String> {
    if !CROSS_REFERENCE_TEMPLATES.iter().any(|name| template.name_is(name)) {
        return None;
    }
    let raw = &template.positional_param(0)?.raw;
    let title = raw.split("{{").next().unwrap_or(raw).trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Plain text of a positional parameter, unwrapping an anchor template
/// when the parameter has no text of its own
fn template_param_text(template: &Template, index: usize) -> Option<String> {
    let param = template.positional_param(index)?;
    let text = param.value.strip_code().trim().to_string();
    if !text.is_empty() {
        return Some(text);
    }

    let first = param.value.nodes.iter().find(|node| !matches!(node, Node::Text(t) if t.trim().is_empty()));
    match first {
        Some(Node::Template(inner)) if inner.name_is(ANCHOR_TEMPLATE) => template_param_text(inner, 0),
        _ => Some(text),
    }
}

/// Context from pages about Japanese creative works.
///
/// Phrases come from `nihongo` family templates, which annotate an English
/// term (position 0) with its Japanese original (position 1).
pub struct JpCreativeWorkTransformer {
    inner: WikipageTransformer,
}

impl JpCreativeWorkTransformer {
    pub fn new(source: Arc<dyn WikiSource>, selector: Arc<dyn Selector>, page: WikiPage) -> Self {
        Self { inner: WikipageTransformer::new(source, selector, page) }
    }

    fn extract_phrases(page: &WikiPage) -> Vec<PhraseLocalisation> {
        let mut phrases = Vec::new();
        for markup in &page.markups {
            for template in markup.parsed().templates() {
                if !template.name.to_lowercase().starts_with(BILINGUAL_TEMPLATE_PREFIX)
                    || template.positional().count() < 2
                {
                    continue;
                }
                let (Some(foreign), Some(local)) = (template_param_text(template, 1), template_param_text(template, 0))
                else {
                    continue;
                };
                let phrase = PhraseLocalisation::new(foreign, local);
                if phrase.is_valid() {
                    phrases.push(phrase);
                }
            }
        }
        debug!("Extracted {} phrases from '{}'", phrases.len(), page.title);
        phrases
    }
}

#[async_trait]
impl ContextTransformer for JpCreativeWorkTransformer {
    async fn prepare_synopsis(&self) -> Result<Option<String>> {
        Ok(Some(self.inner.synopsis().await?))
    }

    async fn prepare_phrases(&self) -> Result<Vec<PhraseLocalisation>> {
        match self.inner.find_relevant_wikipage(CHARACTER_LIST_CRITERIA).await? {
            Some(character_list) => Ok(Self::extract_phrases(&character_list)),
            None => Ok(Self::extract_phrases(self.inner.page())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockSelector;
    use crate::wiki::markup;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ROOT: &str = "Lead {{nihongo|Root Hero|根|Ne}}\n\
        == Plot ==\nA boy fights demons.\n\
        == Characters ==\n{{Main|List of Demon Slayer characters{{efn|a}}}}\n";

    const CHARACTER_LIST: &str = "{{Nihongo|Tanjiro Kamado|竈門 炭治郎|Kamado Tanjirō}}\n\
        {{nihongo|{{vanchor|Nezuko Kamado}}|竈門 禰豆子}}\n\
        {{nihongo|Only English}}\n\
        {{nihongo||空}}\n";

    struct MapSource {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MapSource {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages.iter().map(|(t, c)| (t.to_string(), c.to_string())).collect(),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WikiSource for MapSource {
        async fn retrieve_wikipage(&self, title: &str) -> Result<WikiPage> {
            self.requested.lock().unwrap().push(title.to_string());
            self.pages
                .get(title)
                .map(|content| WikiPage::from_raw(title, [content.clone()]))
                .ok_or_else(|| AutosubError::Transport(format!("Wiki page not found for '{}'", title)))
        }
    }

    fn transformer(source: Arc<MapSource>, selector: MockSelector, root: &str) -> JpCreativeWorkTransformer {
        JpCreativeWorkTransformer::new(source, Arc::new(selector), WikiPage::from_raw("Demon Slayer", [root]))
    }

    fn first_template(source: &str) -> Template {
        match markup::parse(source).nodes.into_iter().next() {
            Some(Node::Template(template)) => template,
            other => panic!("expected a template, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_synopsis_uses_selected_section() {
        let mut selector = MockSelector::new();
        selector
            .expect_select_one_from_list()
            .withf(|items, item_description, criteria, allow_none| {
                items == ["Plot".to_string(), "Characters".to_string()]
                    && item_description == "section headings of an encyclopedia entry"
                    && criteria == "synopsis/overview"
                    && !allow_none
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Some("Plot".to_string())));

        let transformer = transformer(MapSource::new(&[]), selector, ROOT);
        let synopsis = transformer.prepare_synopsis().await.unwrap();
        assert_eq!(synopsis.as_deref(), Some("Plot\nA boy fights demons.\n"));
    }

    #[tokio::test]
    async fn test_synopsis_without_headings_fails() {
        let mut selector = MockSelector::new();
        selector.expect_select_one_from_list().times(0);

        let transformer = transformer(MapSource::new(&[]), selector, "Just a lead.");
        assert!(matches!(transformer.prepare_synopsis().await, Err(AutosubError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_synopsis_declined_by_selector_fails() {
        let mut selector = MockSelector::new();
        selector.expect_select_one_from_list().times(1).returning(|_, _, _, _| Ok(None));

        let transformer = transformer(MapSource::new(&[]), selector, ROOT);
        assert!(matches!(transformer.prepare_synopsis().await, Err(AutosubError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_phrases_come_from_selected_character_list() {
        let mut selector = MockSelector::new();
        selector
            .expect_select_one_from_list()
            .withf(|items, item_description, criteria, allow_none| {
                items == ["List of Demon Slayer characters".to_string()]
                    && item_description == "entries"
                    && criteria == "character list"
                    && *allow_none
            })
            .times(1)
            .returning(|items, _, _, _| Ok(Some(items[0].clone())));

        let source = MapSource::new(&[("List of Demon Slayer characters", CHARACTER_LIST)]);
        let transformer = transformer(source.clone(), selector, ROOT);
        let phrases = transformer.prepare_phrases().await.unwrap();

        assert_eq!(
            phrases,
            vec![
                PhraseLocalisation::new("竈門 炭治郎", "Tanjiro Kamado"),
                PhraseLocalisation::new("竈門 禰豆子", "Nezuko Kamado"),
            ]
        );
        assert_eq!(*source.requested.lock().unwrap(), vec!["List of Demon Slayer characters".to_string()]);
    }

    #[tokio::test]
    async fn test_phrases_fall_back_to_root_page() {
        let mut selector = MockSelector::new();
        selector.expect_select_one_from_list().times(1).returning(|_, _, _, _| Ok(None));

        let source = MapSource::new(&[]);
        let transformer = transformer(source.clone(), selector, ROOT);
        let phrases = transformer.prepare_phrases().await.unwrap();

        assert_eq!(phrases, vec![PhraseLocalisation::new("根", "Root Hero")]);
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_related_page_is_fatal() {
        let mut selector = MockSelector::new();
        selector
            .expect_select_one_from_list()
            .returning(|items, _, _, _| Ok(Some(items[0].clone())));

        let transformer = transformer(MapSource::new(&[]), selector, ROOT);
        assert!(matches!(transformer.prepare_phrases().await, Err(AutosubError::Transport(_))));
    }

    #[tokio::test]
    async fn test_prepare_context_combines_both() {
        let mut selector = MockSelector::new();
        selector
            .expect_select_one_from_list()
            .returning(|items, _, _, allow_none| if allow_none { Ok(None) } else { Ok(Some(items[0].clone())) });

        let transformer = transformer(MapSource::new(&[]), selector, ROOT);
        let context = transformer.prepare_context().await.unwrap();
        assert!(context.synopsis.unwrap().starts_with("Plot"));
        assert_eq!(context.phrases.len(), 1);
    }

    #[test]
    fn test_cross_reference_title() {
        assert_eq!(
            cross_reference_title(&first_template("{{main|List of characters{{efn|x}}}}")).as_deref(),
            Some("List of characters")
        );
        assert_eq!(cross_reference_title(&first_template("{{Further| Other }}")).as_deref(), Some("Other"));
        assert_eq!(cross_reference_title(&first_template("{{Main}}")), None);
        assert_eq!(cross_reference_title(&first_template("{{Infobox|x}}")), None);
    }

    #[test]
    fn test_related_titles_deduplicated_in_order() {
        let page = WikiPage::from_raw("Root", ["{{See|B}} {{Main|A}} {{see|B}}"]);
        let transformer = WikipageTransformer::new(MapSource::new(&[]), Arc::new(MockSelector::new()), page);
        assert_eq!(transformer.related_titles(), vec!["B", "A"]);
    }

    #[test]
    fn test_template_param_text_unwraps_anchor() {
        let template = first_template("{{nihongo| {{vanchor|Zenitsu}} |我妻 善逸}}");
        assert_eq!(template_param_text(&template, 0).as_deref(), Some("Zenitsu"));
        assert_eq!(template_param_text(&template, 1).as_deref(), Some("我妻 善逸"));
        assert_eq!(template_param_text(&template, 2), None);
    }
}
