//! DOM helpers shared by the extraction strategies

use super::ExtractError;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never belongs to an article
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "form", "button", "select",
];

/// Elements that start a new line of text
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul",
    "ol", "blockquote", "pre", "table", "tr", "td", "th", "header", "footer", "figure",
    "figcaption", "dd", "dt",
];

/// Class fragments marking comment threads, share bars and similar noise
const NOISE_CLASSES: &[&str] = &["comment", "share", "related", "recommend", "advert"];

/// Parses a CSS selector, mapping the parse error into an [`ExtractError`]
pub fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Collapses runs of whitespace into single spaces and trims
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace and returns `None` for empty results
pub fn non_empty(text: &str) -> Option<String> {
    let collapsed = collapse_whitespace(text);
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Returns true for elements that are skipped wholesale
pub fn is_noise(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if SKIP_TAGS.contains(&value.name()) {
        return true;
    }
    value.classes().any(|class| {
        let class = class.to_ascii_lowercase();
        NOISE_CLASSES.iter().any(|noise| class.contains(noise))
    })
}

/// Text of an element with block boundaries kept as line breaks
///
/// Noise elements are skipped, whitespace inside a line is collapsed and
/// blank lines are dropped.
pub fn block_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    clean_lines(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_noise(&child_ref) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                collect_text(child_ref, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn clean_lines(raw: &str) -> String {
    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of characters of link text below an element
pub fn link_text_len(element: ElementRef<'_>, links: &Selector) -> usize {
    element
        .select(links)
        .map(|a| collapse_whitespace(&a.text().collect::<String>()).chars().count())
        .sum()
}

/// All visible text of a document, scripts and styles removed
///
/// # Examples
///
/// ```
/// use press_sieve::extract::visible_text;
///
/// let html = "<html><body><script>var x;</script><p>Hello</p><p>World</p></body></html>";
/// assert_eq!(visible_text(html), "Hello\nWorld");
/// ```
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let body = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next());

    block_text(body.unwrap_or(root))
}

/// Content of the first `<meta>` whose `property` or `name` is one of `keys`
pub fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    let metas = Selector::parse("meta[content]").ok()?;

    keys.iter().find_map(|key| {
        document.select(&metas).find_map(|meta| {
            let value = meta.value();
            let matches = value
                .attr("property")
                .or_else(|| value.attr("name"))
                .or_else(|| value.attr("itemprop"))
                .is_some_and(|name| name.eq_ignore_ascii_case(key));
            if matches {
                value.attr("content").and_then(non_empty)
            } else {
                None
            }
        })
    })
}

/// Collapsed text of the first element matching `css`
pub fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    document
        .select(&sel)
        .find_map(|el| non_empty(&el.text().collect::<String>()))
}

/// The document's `<title>`
pub fn document_title(document: &Html) -> Option<String> {
    first_text(document, "title")
}

/// `datetime` attribute of the first `<time>` element
pub fn time_datetime(document: &Html) -> Option<String> {
    let sel = Selector::parse("time[datetime]").ok()?;
    document
        .select(&sel)
        .find_map(|el| el.value().attr("datetime").and_then(non_empty))
}
