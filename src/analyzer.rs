//! HTML analysis of fetched pages.
//!
//! Everything that touches the DOM happens in [`analyze`], which is
//! synchronous: `scraper::Html` is not `Send`, so the parsed document never
//! lives across an await point.

use crate::domain::url_in_domain;
use crate::error::{AppError, Result};
use crate::models::{MailtoTarget, PageLink};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SITE_NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[property='og:site_name']").unwrap());
static JSON_LD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type='application/ld+json']").unwrap());

/// Elements whose text is never visible.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Elements treated as the enclosing block of a mailto anchor.
const BLOCK_TAGS: &[&str] = &[
    "p", "li", "td", "th", "dd", "dt", "address", "div", "section", "article", "footer",
    "header", "aside", "figure", "blockquote",
];

/// Upper bound on the block text kept for a mailto anchor.
const MAX_BLOCK_TEXT_CHARS: usize = 240;

/// Everything extracted from one HTML page.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageAnalysis {
    /// Visible text with whitespace collapsed.
    pub text: String,
    pub mailto_targets: Vec<MailtoTarget>,
    /// Resolved, de-duplicated `<a href>` targets in document order.
    pub links: Vec<PageLink>,
    pub title: Option<String>,
    /// OpenGraph `og:site_name`.
    pub site_name: Option<String>,
    /// `email` values from JSON-LD blocks.
    pub structured_emails: Vec<String>,
    /// `sameAs` URLs from JSON-LD blocks.
    pub same_as: Vec<Url>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if HIDDEN_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn visible_text(document: &Html) -> String {
    let mut raw = String::new();
    match document.select(&BODY_SELECTOR).next() {
        Some(body) => collect_visible_text(body, &mut raw),
        None => collect_visible_text(document.root_element(), &mut raw),
    }
    collapse_whitespace(&raw)
}

/// Splits a `mailto:` href into its decoded, lowercased addresses.
pub(crate) fn parse_mailto_href(href: &str) -> Vec<String> {
    let href = href.trim();
    match href.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => {}
        _ => return Vec::new(),
    }
    let recipients = href[7..].split('?').next().unwrap_or("");
    let decoded = urlencoding::decode(recipients)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| recipients.to_string());
    decoded
        .split([',', ';'])
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn enclosing_block_text(anchor: ElementRef<'_>) -> String {
    let block = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| BLOCK_TAGS.contains(&el.value().name()));
    match block {
        Some(el) => truncate_chars(
            &collapse_whitespace(&el.text().collect::<String>()),
            MAX_BLOCK_TEXT_CHARS,
        ),
        None => String::new(),
    }
}

/// Resolves an href against its page; `None` for links that are never followed.
fn resolve_link(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:", "sms:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = page_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn extract_anchors(
    document: &Html,
    page_url: &Url,
    root_domain: &str,
) -> (Vec<MailtoTarget>, Vec<PageLink>) {
    let mut mailto_targets = Vec::new();
    let mut links = Vec::new();
    let mut seen_links: HashSet<String> = HashSet::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let emails = parse_mailto_href(href);
        if !emails.is_empty() {
            let anchor_text = collapse_whitespace(&anchor.text().collect::<String>());
            let block_text = enclosing_block_text(anchor);
            for email in emails {
                mailto_targets.push(MailtoTarget {
                    email,
                    anchor_text: anchor_text.clone(),
                    block_text: block_text.clone(),
                });
            }
            continue;
        }

        if anchor.value().attr("download").is_some() {
            continue;
        }
        if let Some(url) = resolve_link(href, page_url) {
            if seen_links.insert(url.to_string()) {
                let same_domain = url_in_domain(&url, root_domain);
                links.push(PageLink { url, same_domain });
            }
        }
    }

    (mailto_targets, links)
}

fn collect_structured(value: &Value, emails: &mut Vec<String>, same_as: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                match key.as_str() {
                    "email" => push_strings(v, emails),
                    "sameAs" => push_strings(v, same_as),
                    _ => collect_structured(v, emails, same_as),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_structured(item, emails, same_as);
            }
        }
        _ => {}
    }
}

fn push_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.trim().to_string()),
        Value::Array(items) => {
            for item in items {
                if let Value::String(s) = item {
                    out.push(s.trim().to_string());
                }
            }
        }
        _ => {}
    }
}

fn extract_structured_data(document: &Html, page_url: &Url) -> (Vec<String>, Vec<Url>) {
    let mut emails = Vec::new();
    let mut same_as = Vec::new();

    for script in document.select(&JSON_LD_SELECTOR) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_structured(&value, &mut emails, &mut same_as),
            Err(e) => {
                tracing::debug!(target: "mine_task", "Ignoring malformed JSON-LD on {}: {}", page_url, e);
            }
        }
    }

    let emails = emails
        .into_iter()
        .map(|e| {
            let lower = e.to_lowercase();
            lower.strip_prefix("mailto:").unwrap_or(&lower).to_string()
        })
        .filter(|e| !e.is_empty())
        .collect();
    let same_as = same_as
        .iter()
        .filter_map(|s| Url::parse(s).ok())
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .collect();

    (emails, same_as)
}

/// Parses one HTML page.
///
/// # Returns
/// * `Err(AppError::Parse)` if the body is binary rather than markup.
pub(crate) fn analyze(html: &str, page_url: &Url, root_domain: &str) -> Result<PageAnalysis> {
    if html.contains('\0') {
        return Err(AppError::Parse {
            url: page_url.to_string(),
            message: "body contains NUL bytes".to_string(),
        });
    }

    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty());

    let site_name = document
        .select(&SITE_NAME_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty());

    let (mailto_targets, links) = extract_anchors(&document, page_url, root_domain);
    let (structured_emails, same_as) = extract_structured_data(&document, page_url);

    Ok(PageAnalysis {
        text: visible_text(&document),
        mailto_targets,
        links,
        title,
        site_name,
        structured_emails,
        same_as,
    })
}
