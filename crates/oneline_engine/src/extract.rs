use std::collections::HashMap;

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeRef};
use oneline_core::{char_len, normalize_whitespace};
use oneline_logging::{oneline_debug, oneline_warn};
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

use crate::types::{ExtractedText, ExtractionFailure, PipelineError, MIN_TEXT_CHARS};

/// Elements whose text is never page content.
const NON_CONTENT_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// The fallback additionally drops navigation and footers.
const FLATTEN_SKIP_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "nav", "footer",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Ancestors that disqualify a paragraph regardless of its class.
const BOILERPLATE_TAGS: &[&str] = &["nav", "footer", "aside", "header", "form", "menu"];

const UNLIKELY_MARKERS: &[&str] = &[
    "comment", "sidebar", "footer", "sponsor", "advert", "banner", "popup", "cookie", "share",
    "social", "related", "menu", "breadcrumb", "pagination", "nav",
];
const MAYBE_MARKERS: &[&str] = &["article", "main", "content", "body", "column", "shadow"];

const NEGATIVE_MARKERS: &[&str] = &[
    "comment", "sidebar", "footer", "footnote", "masthead", "related", "share", "sponsor",
    "widget", "banner", "promo", "advert", "social", "breadcrumb", "menu", "nav", "popup",
    "cookie", "combx", "shoutbox", "pager", "pagination",
];
const POSITIVE_MARKERS: &[&str] = &[
    "article", "body", "content", "entry", "hentry", "main", "page", "post", "text", "blog",
    "story",
];

const MAX_ANCESTOR_LEVELS: usize = 3;
const CLASS_WEIGHT: f64 = 25.0;
const FRAGMENT_LINK_WEIGHT: f64 = 0.3;

/// One way of turning a parsed document into raw page text.
///
/// The returned text need not be normalized; an empty string means the
/// strategy found nothing.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract_text(&self, document: &Html, base_url: &Url) -> String;
}

/// Readability-style main-content scoring.
///
/// Paragraph-like elements add a score derived from their length and comma
/// count to their nearest ancestors. Ancestors start from a tag and class/id
/// weight and are discounted by link density; the best one and its
/// qualifying siblings form the article.
#[derive(Debug, Clone)]
pub struct ReadabilityStrategy {
    pub min_paragraph_chars: usize,
}

impl Default for ReadabilityStrategy {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 25,
        }
    }
}

impl ExtractionStrategy for ReadabilityStrategy {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn extract_text(&self, document: &Html, base_url: &Url) -> String {
        let root = body_or_root(document);
        let scores = self.score_candidates(root);

        let mut best: Option<(ElementRef<'_>, f64)> = None;
        for (id, raw_score) in &scores.ordered {
            let Some(candidate) = document.tree.get(*id).and_then(ElementRef::wrap) else {
                continue;
            };
            let score = raw_score * (1.0 - link_density(candidate, base_url));
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }
        let Some((top, top_score)) = best else {
            return String::new();
        };
        oneline_debug!(
            "Readability picked <{}> with score {:.1} out of {} candidates",
            top.value().name(),
            top_score,
            scores.ordered.len()
        );

        let threshold = (top_score * 0.2).max(10.0);
        let parts: Vec<ElementRef<'_>> = match top.parent().and_then(ElementRef::wrap) {
            Some(parent) => parent
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| {
                    sibling.id() == top.id()
                        || sibling_qualifies(*sibling, &scores, threshold, base_url)
                })
                .collect(),
            None => vec![top],
        };

        parts
            .into_iter()
            .map(|part| collect_text(*part, NON_CONTENT_TAGS))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Raw candidate scores, remembered in document order so ties are stable.
struct CandidateScores {
    ordered: Vec<(NodeId, f64)>,
    index: HashMap<NodeId, usize>,
}

impl CandidateScores {
    fn add(&mut self, candidate: ElementRef<'_>, amount: f64) {
        let slot = *self.index.entry(candidate.id()).or_insert_with(|| {
            self.ordered.push((candidate.id(), initial_score(candidate)));
            self.ordered.len() - 1
        });
        self.ordered[slot].1 += amount;
    }

    fn get(&self, id: NodeId) -> Option<f64> {
        self.index.get(&id).map(|slot| self.ordered[*slot].1)
    }
}

impl ReadabilityStrategy {
    fn score_candidates(&self, root: ElementRef<'_>) -> CandidateScores {
        let mut scores = CandidateScores {
            ordered: Vec::new(),
            index: HashMap::new(),
        };
        for element in root.descendants().filter_map(ElementRef::wrap) {
            if !is_scorable(element) || is_unlikely(element) {
                continue;
            }
            let text = text_of(element);
            let len = char_len(&text);
            if len < self.min_paragraph_chars {
                continue;
            }
            let content_score =
                1.0 + comma_count(&text) as f64 + (len as f64 / 100.0).floor().min(3.0);

            let mut ancestor = element.parent().and_then(ElementRef::wrap);
            for level in 0..MAX_ANCESTOR_LEVELS {
                let Some(candidate) = ancestor.filter(|el| el.value().name() != "html") else {
                    break;
                };
                let divider = match level {
                    0 => 1.0,
                    1 => 2.0,
                    n => n as f64 * 3.0,
                };
                scores.add(candidate, content_score / divider);
                ancestor = candidate.parent().and_then(ElementRef::wrap);
            }
        }
        scores
    }
}

/// Full-document text flattening; the generic fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlattenStrategy;

impl ExtractionStrategy for FlattenStrategy {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn extract_text(&self, document: &Html, _base_url: &Url) -> String {
        collect_text(*body_or_root(document), FLATTEN_SKIP_TAGS)
    }
}

/// Tries each strategy in order and keeps the first result that, once
/// normalized, reaches the minimum length.
pub struct MainTextExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_chars: usize,
}

impl Default for MainTextExtractor {
    fn default() -> Self {
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(ReadabilityStrategy::default()),
            Box::new(FlattenStrategy),
        ];
        Self::new(strategies, MIN_TEXT_CHARS)
    }
}

impl MainTextExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>, min_chars: usize) -> Self {
        Self {
            strategies,
            min_chars,
        }
    }

    pub fn extract(&self, html: &str, base_url: &str) -> Result<ExtractedText, PipelineError> {
        let base = Url::parse(base_url).map_err(|err| {
            oneline_warn!("Cannot parse base URL {:?}: {}", base_url, err);
            PipelineError::extraction(ExtractionFailure::Parse)
        })?;
        let document = Html::parse_document(html);

        for strategy in &self.strategies {
            let raw = strategy.extract_text(&document, &base);
            match ExtractedText::from_raw(&raw, self.min_chars) {
                Some(text) => {
                    oneline_debug!(
                        "Strategy {} extracted {} chars from {}",
                        strategy.name(),
                        text.char_len(),
                        base
                    );
                    return Ok(text);
                }
                None => oneline_debug!(
                    "Strategy {} gave fewer than {} chars for {}",
                    strategy.name(),
                    self.min_chars,
                    base
                ),
            }
        }
        Err(PipelineError::extraction(ExtractionFailure::TooShort))
    }
}

fn body_or_root(document: &Html) -> ElementRef<'_> {
    let root = document.root_element();
    root.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .unwrap_or(root)
}

/// Text under `root`, skipping the subtrees named in `skip` and putting
/// block elements on their own lines.
fn collect_text(root: NodeRef<'_, Node>, skip: &[&str]) -> String {
    let mut out = String::new();
    let mut skipping: Option<NodeId> = None;
    for edge in root.traverse() {
        match edge {
            Edge::Open(node) => {
                if skipping.is_some() {
                    continue;
                }
                match node.value() {
                    Node::Text(text) => out.push_str(text),
                    Node::Element(element) if skip.contains(&element.name()) => {
                        skipping = Some(node.id());
                    }
                    Node::Element(element) if BLOCK_TAGS.contains(&element.name()) => {
                        out.push('\n');
                    }
                    _ => {}
                }
            }
            Edge::Close(node) => {
                if skipping == Some(node.id()) {
                    skipping = None;
                    continue;
                }
                if skipping.is_some() {
                    continue;
                }
                if let Node::Element(element) = node.value() {
                    if BLOCK_TAGS.contains(&element.name()) {
                        out.push('\n');
                    }
                }
            }
        }
    }
    out
}

fn text_of(element: ElementRef<'_>) -> String {
    normalize_whitespace(&collect_text(*element, NON_CONTENT_TAGS))
}

fn is_scorable(element: ElementRef<'_>) -> bool {
    match element.value().name() {
        "p" | "pre" | "td" | "blockquote" => true,
        // A div holding only inline content acts as a paragraph.
        "div" => !element
            .children()
            .filter_map(ElementRef::wrap)
            .any(|child| BLOCK_TAGS.contains(&child.value().name())),
        _ => false,
    }
}

fn class_and_id(element: ElementRef<'_>) -> String {
    let value = element.value();
    format!(
        "{} {}",
        value.attr("class").unwrap_or_default(),
        value.attr("id").unwrap_or_default()
    )
    .to_ascii_lowercase()
}

fn has_marker(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| haystack.contains(marker))
}

fn is_unlikely(element: ElementRef<'_>) -> bool {
    let mut current = Some(element);
    while let Some(el) = current {
        let name = el.value().name();
        if name == "body" || name == "html" {
            return false;
        }
        if BOILERPLATE_TAGS.contains(&name) {
            return true;
        }
        let hints = class_and_id(el);
        if has_marker(&hints, UNLIKELY_MARKERS) && !has_marker(&hints, MAYBE_MARKERS) {
            return true;
        }
        current = el.parent().and_then(ElementRef::wrap);
    }
    false
}

fn initial_score(element: ElementRef<'_>) -> f64 {
    let tag_weight = match element.value().name() {
        "div" | "article" | "main" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    tag_weight + class_weight(element)
}

fn class_weight(element: ElementRef<'_>) -> f64 {
    let value = element.value();
    [value.attr("class"), value.attr("id")]
        .into_iter()
        .flatten()
        .map(|hint| {
            let hint = hint.to_ascii_lowercase();
            let mut weight = 0.0;
            if has_marker(&hint, NEGATIVE_MARKERS) {
                weight -= CLASS_WEIGHT;
            }
            if has_marker(&hint, POSITIVE_MARKERS) {
                weight += CLASS_WEIGHT;
            }
            weight
        })
        .sum()
}

fn comma_count(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, ',' | '、' | '，')).count()
}

/// Share of the element's text that sits inside links. Links to a fragment
/// of the page itself, resolved against `base_url`, count for less.
fn link_density(element: ElementRef<'_>, base_url: &Url) -> f64 {
    let total = char_len(&text_of(element));
    if total == 0 {
        return 0.0;
    }
    let link_chars: f64 = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .map(|anchor| {
            let weight = if is_in_page_link(anchor, base_url) {
                FRAGMENT_LINK_WEIGHT
            } else {
                1.0
            };
            char_len(&text_of(anchor)) as f64 * weight
        })
        .sum();
    (link_chars / total as f64).min(1.0)
}

fn is_in_page_link(anchor: ElementRef<'_>, base_url: &Url) -> bool {
    let Some(target) = anchor
        .value()
        .attr("href")
        .and_then(|href| base_url.join(href).ok())
    else {
        return false;
    };
    if target.fragment().is_none() {
        return false;
    }
    let mut target = target;
    let mut base = base_url.clone();
    target.set_fragment(None);
    base.set_fragment(None);
    target == base
}

fn sibling_qualifies(
    sibling: ElementRef<'_>,
    scores: &CandidateScores,
    threshold: f64,
    base_url: &Url,
) -> bool {
    if is_unlikely(sibling) {
        return false;
    }
    let density = link_density(sibling, base_url);
    if let Some(score) = scores.get(sibling.id()) {
        if score * (1.0 - density) >= threshold {
            return true;
        }
    }
    if sibling.value().name() != "p" {
        return false;
    }
    let text = text_of(sibling);
    let len = char_len(&text);
    if len > 80 {
        density < 0.25
    } else {
        len > 0 && density == 0.0 && text.ends_with(&['.', '。'][..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/article").unwrap()
    }

    #[test]
    fn collect_text_skips_subtrees_and_breaks_blocks() {
        let doc = Html::parse_document(
            "<body><p>one</p><script>var x;</script><nav>menu</nav><p>two <b>bold</b></p></body>",
        );
        let text = normalize_whitespace(&collect_text(*body_or_root(&doc), FLATTEN_SKIP_TAGS));
        assert_eq!(text, "one\ntwo bold");
    }

    #[test]
    fn fragment_links_weigh_less() {
        let doc = Html::parse_document(
            r##"<body><div id="a"><a href="#top">0123456789</a></div><div id="b"><a href="/other">0123456789</a></div></body>"##,
        );
        let divs: Vec<_> = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
            .collect();
        let in_page = link_density(divs[0], &base());
        let external = link_density(divs[1], &base());
        assert!((in_page - FRAGMENT_LINK_WEIGHT).abs() < 1e-9);
        assert!((external - 1.0).abs() < 1e-9);
    }

    #[test]
    fn boilerplate_ancestors_are_unlikely() {
        let doc = Html::parse_document(
            r#"<body><div class="sidebar"><p id="s">x</p></div><div class="sidebar-content"><p id="m">y</p></div></body>"#,
        );
        let p = |id: &str| {
            doc.root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().attr("id") == Some(id))
                .unwrap()
        };
        assert!(is_unlikely(p("s")));
        assert!(!is_unlikely(p("m")));
    }
}
