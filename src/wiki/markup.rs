// Wikitext parsing into a node tree, covering the constructs context
// extraction reads: templates, headings, links, comments, tags and
// bold/italic quotes. Anything unrecognised or unclosed is kept as text.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([A-Za-z][A-Za-z0-9]*)(\s[^<>]*?)?(/?)>").expect("valid tag pattern"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

/// Tags whose content never shows up in rendered text
const INVISIBLE_TAGS: &[&str] = &[
    "ref", "references", "gallery", "math", "score", "timeline", "templatedata", "syntaxhighlight",
];
const VOID_TAGS: &[&str] = &["br", "hr", "wbr"];
const LITERAL_TAGS: &[&str] = &["nowiki", "pre"];

/// Parsed wikitext: an ordered list of nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wikicode {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Template(Template),
    Heading(Heading),
    WikiLink { target: String, label: Option<Wikicode> },
    ExternalLink { url: String, label: Option<Wikicode> },
    Comment(String),
    Tag { name: String, body: Option<Wikicode> },
    /// A run of `''` or `'''` quotes
    Formatting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// `None` for positional parameters
    pub name: Option<String>,
    pub value: Wikicode,
    /// Source text of the value
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub title: Wikicode,
}

/// A heading and everything up to the next heading of the same or a
/// higher level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub title: String,
    pub level: usize,
    pub nodes: &'a [Node],
}

impl Section<'_> {
    pub fn strip_code(&self) -> String {
        strip_nodes(self.nodes)
    }
}

impl Template {
    /// Name compared case-insensitively
    pub fn name_is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn positional(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|param| param.name.is_none())
    }

    pub fn positional_param(&self, index: usize) -> Option<&Parameter> {
        self.positional().nth(index)
    }
}

impl Parameter {
    fn from_parts(raw: &str, mut nodes: Vec<Node>) -> Self {
        let split = match nodes.first() {
            Some(Node::Text(first)) => first
                .find('=')
                .map(|eq| (first[..eq].trim().to_string(), first[eq + 1..].to_string())),
            _ => None,
        };

        match split {
            Some((name, remainder)) => {
                if remainder.is_empty() {
                    nodes.remove(0);
                } else {
                    nodes[0] = Node::Text(remainder);
                }
                let raw_value = raw.find('=').map(|eq| &raw[eq + 1..]).unwrap_or(raw);
                Self { name: Some(name), value: Wikicode { nodes }, raw: raw_value.to_string() }
            }
            None => Self { name: None, value: Wikicode { nodes }, raw: raw.to_string() },
        }
    }
}

impl Wikicode {
    /// Rendered plain text: templates, comments and markup dropped, link
    /// labels kept
    pub fn strip_code(&self) -> String {
        strip_nodes(&self.nodes)
    }

    /// Templates at the top level of this tree
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Template(template) => Some(template),
            _ => None,
        })
    }

    /// Sections introduced by top-level headings, in document order
    pub fn sections(&self) -> Vec<Section<'_>> {
        let headings: Vec<(usize, usize)> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match node {
                Node::Heading(heading) => Some((index, heading.level)),
                _ => None,
            })
            .collect();

        headings
            .iter()
            .enumerate()
            .filter_map(|(position, &(start, level))| {
                let end = headings[position + 1..]
                    .iter()
                    .find(|(_, next_level)| *next_level <= level)
                    .map(|(index, _)| *index)
                    .unwrap_or(self.nodes.len());
                match &self.nodes[start] {
                    Node::Heading(heading) => Some(Section {
                        title: heading.title.strip_code().trim().to_string(),
                        level,
                        nodes: &self.nodes[start..end],
                    }),
                    _ => None,
                }
            })
            .collect()
    }
}

fn strip_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.write_plain(&mut out);
    }
    EXCESS_NEWLINES.replace_all(&out, "\n\n").into_owned()
}

impl Node {
    fn write_plain(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Heading(heading) => out.push_str(heading.title.strip_code().trim()),
            Node::WikiLink { target, label } => match label {
                Some(label) => out.push_str(&label.strip_code()),
                None => out.push_str(target),
            },
            Node::ExternalLink { url, label } => match label {
                Some(label) => out.push_str(&label.strip_code()),
                None => out.push_str(url),
            },
            Node::Tag { name, body: Some(body) } if !INVISIBLE_TAGS.contains(&name.as_str()) => {
                out.push_str(&body.strip_code())
            }
            Node::Template(_) | Node::Comment(_) | Node::Tag { .. } | Node::Formatting => {}
        }
    }
}

/// Parse wikitext. Never fails: malformed markup degrades to text.
pub fn parse(source: &str) -> Wikicode {
    let mut parser = Parser { src: source, pos: 0, unclosed: HashSet::new() };
    Wikicode { nodes: parser.parse_nodes(Stop::Eof) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Eof,
    Template,
    LinkTarget,
    LinkLabel,
    ExternalLabel,
}

impl Stop {
    fn hit(self, rest: &str) -> bool {
        match self {
            Stop::Eof => false,
            Stop::Template => rest.starts_with('|') || rest.starts_with("}}"),
            Stop::LinkTarget => rest.starts_with('|') || rest.starts_with("]]"),
            Stop::LinkLabel => rest.starts_with("]]"),
            Stop::ExternalLabel => rest.starts_with(']'),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Offsets where a construct was tried and had no closer. The outcome
    /// depends only on the offset, so these are never retried.
    unclosed: HashSet<usize>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src[..self.pos].ends_with('\n')
    }

    fn parse_nodes(&mut self, stop: Stop) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while self.pos < self.src.len() {
            let rest = self.rest();
            if stop.hit(rest) {
                break;
            }

            let start = self.pos;
            let mut attempted = true;
            let node = if self.unclosed.contains(&start) {
                None
            } else if rest.starts_with("<!--") {
                Some(self.parse_comment())
            } else if rest.starts_with("{{") {
                self.parse_template()
            } else if rest.starts_with("[[") {
                self.parse_wikilink()
            } else if rest.starts_with('[') {
                self.parse_external_link()
            } else if rest.starts_with('<') {
                self.parse_tag()
            } else if rest.starts_with("''") {
                Some(self.parse_formatting())
            } else if rest.starts_with('=') && stop == Stop::Eof && self.at_line_start() {
                self.parse_heading()
            } else {
                attempted = false;
                None
            };

            match node {
                Some(node) => {
                    if !text.is_empty() {
                        nodes.push(Node::Text(std::mem::take(&mut text)));
                    }
                    nodes.push(node);
                }
                None => {
                    self.pos = start;
                    if attempted {
                        self.unclosed.insert(start);
                    }
                    if let Some(ch) = self.rest().chars().next() {
                        text.push(ch);
                        self.pos += ch.len_utf8();
                    }
                }
            }
        }

        if !text.is_empty() {
            nodes.push(Node::Text(text));
        }
        nodes
    }

    fn parse_comment(&mut self) -> Node {
        let body_start = self.pos + 4;
        match self.src[body_start..].find("-->") {
            Some(end) => {
                self.pos = body_start + end + 3;
                Node::Comment(self.src[body_start..body_start + end].to_string())
            }
            None => {
                self.pos = self.src.len();
                Node::Comment(self.src[body_start..].to_string())
            }
        }
    }

    fn parse_template(&mut self) -> Option<Node> {
        self.pos += 2;
        let name_nodes = self.parse_nodes(Stop::Template);
        let name: String = name_nodes
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<String>()
            .trim()
            .to_string();

        let mut params = Vec::new();
        loop {
            let rest = self.rest();
            if rest.starts_with("}}") {
                self.pos += 2;
                break;
            }
            if !rest.starts_with('|') {
                return None;
            }
            self.pos += 1;
            let start = self.pos;
            let nodes = self.parse_nodes(Stop::Template);
            params.push(Parameter::from_parts(&self.src[start..self.pos], nodes));
        }

        if name.is_empty() {
            return None;
        }
        Some(Node::Template(Template { name, params }))
    }

    fn parse_wikilink(&mut self) -> Option<Node> {
        self.pos += 2;
        let target_start = self.pos;
        self.parse_nodes(Stop::LinkTarget);
        let target = self.src[target_start..self.pos].trim().to_string();

        let label = if self.rest().starts_with('|') {
            self.pos += 1;
            Some(Wikicode { nodes: self.parse_nodes(Stop::LinkLabel) })
        } else {
            None
        };

        if !self.rest().starts_with("]]") || target.is_empty() {
            return None;
        }
        self.pos += 2;
        Some(Node::WikiLink { target, label })
    }

    fn parse_external_link(&mut self) -> Option<Node> {
        let after = &self.rest()[1..];
        if !(after.starts_with("http://") || after.starts_with("https://") || after.starts_with("//")) {
            return None;
        }
        self.pos += 1;

        let url_end = self.rest().find([' ', ']', '\n'])?;
        let url = self.rest()[..url_end].to_string();
        self.pos += url_end;

        let label = if self.rest().starts_with(' ') {
            self.pos += 1;
            Some(Wikicode { nodes: self.parse_nodes(Stop::ExternalLabel) })
        } else {
            None
        };

        if !self.rest().starts_with(']') {
            return None;
        }
        self.pos += 1;
        Some(Node::ExternalLink { url, label })
    }

    fn parse_tag(&mut self) -> Option<Node> {
        let (whole, name, self_closing) = {
            let captures = TAG_OPEN.captures(self.rest())?;
            (
                captures.get(0)?.len(),
                captures.get(1)?.as_str().to_ascii_lowercase(),
                captures.get(3).is_some_and(|slash| !slash.as_str().is_empty()),
            )
        };
        self.pos += whole;

        if self_closing || VOID_TAGS.contains(&name.as_str()) {
            return Some(Node::Tag { name, body: None });
        }

        let close = format!("</{}", name);
        let end = self.rest().to_ascii_lowercase().find(&close)?;
        let body_src = &self.rest()[..end];
        let body = if LITERAL_TAGS.contains(&name.as_str()) {
            Wikicode { nodes: vec![Node::Text(body_src.to_string())] }
        } else {
            parse(body_src)
        };
        self.pos += end;

        let close_end = self.rest().find('>').map(|gt| gt + 1).unwrap_or(self.rest().len());
        self.pos += close_end;
        Some(Node::Tag { name, body: Some(body) })
    }

    fn parse_formatting(&mut self) -> Node {
        let run = self.rest().chars().take_while(|&c| c == '\'').count();
        self.pos += run;
        Node::Formatting
    }

    fn parse_heading(&mut self) -> Option<Node> {
        let line = self.rest().split('\n').next().unwrap_or("");
        let trimmed = line.trim_end();
        let leading = trimmed.chars().take_while(|&c| c == '=').count();
        let trailing = trimmed.chars().rev().take_while(|&c| c == '=').count();
        let level = leading.min(trailing).min(6);

        if level == 0 || trimmed.len() <= level * 2 {
            return None;
        }

        let title = parse(&trimmed[level..trimmed.len() - level]);
        self.pos += line.len();
        Some(Node::Heading(Heading { level, title }))
    }
}
