// Context extraction from encyclopedia pages:
// - transport: MediaWiki query API
// - page: pages and their lazily parsed markup
// - markup: wikitext node tree
// - transformer: synopsis and phrase extraction driven by an LLM selector

pub mod markup;
pub mod page;
pub mod transport;
pub mod transformer;

pub use page::{WikiMarkup, WikiPage};
pub use transformer::{JpCreativeWorkTransformer, WikipageTransformer};
pub use transport::{WikiSource, WikiTransport};
