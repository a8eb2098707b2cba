//! Discovery of contact-like pages from `sitemap.xml`.

use crate::domain::{is_contact_like_path, is_static_asset, url_in_domain};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static LOC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?\s*(.*?)\s*(?:\]\]>)?\s*</loc>").unwrap());

/// Sitemap locations tried in order until one lists contact-like pages.
pub(crate) const SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap/sitemap.xml",
];

/// Upper bound on `<loc>` entries inspected per sitemap.
const MAX_SITEMAP_ENTRIES: usize = 5000;

fn unescape_xml(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

/// Every parsable `<loc>` URL in document order.
pub(crate) fn parse_locs(xml: &str) -> Vec<Url> {
    LOC_REGEX
        .captures_iter(xml)
        .take(MAX_SITEMAP_ENTRIES)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| Url::parse(&unescape_xml(m.as_str())).ok())
        .collect()
}

/// Sitemap entries worth crawling: on the root domain, contact-like and not an asset.
pub(crate) fn contact_like_locs(xml: &str, root_domain: &str) -> Vec<Url> {
    let locs: Vec<Url> = parse_locs(xml)
        .into_iter()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .filter(|url| url_in_domain(url, root_domain))
        .filter(|url| !is_static_asset(url))
        .filter(|url| is_contact_like_path(url))
        .collect();
    tracing::debug!(target: "mine_task",
        "Sitemap for {} listed {} contact-like pages", root_domain, locs.len()
    );
    locs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://acme.com/</loc></url>
  <url><loc>https://acme.com/company/team</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://acme.com/blog/launch </loc></url>
  <url><loc><![CDATA[https://acme.com/contact?lang=en&amp;x=1]]></loc></url>
  <url><loc>https://partner.io/contact</loc></url>
  <url><loc>https://acme.com/press/kit.pdf</loc></url>
  <url><LOC>https://jobs.acme.com/careers</LOC></url>
</urlset>"#;

    #[test]
    fn test_parse_locs() {
        let locs = parse_locs(SITEMAP);
        assert_eq!(locs.len(), 7);
        assert_eq!(locs[2].as_str(), "https://acme.com/blog/launch");
        assert_eq!(locs[3].as_str(), "https://acme.com/contact?lang=en&x=1");
    }

    #[test]
    fn test_contact_like_locs_filtered() {
        let locs: Vec<String> = contact_like_locs(SITEMAP, "acme.com")
            .iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            locs,
            vec![
                "https://acme.com/company/team",
                "https://acme.com/contact?lang=en&x=1",
                "https://jobs.acme.com/careers",
            ]
        );
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert!(parse_locs("<html><body>not a sitemap</body></html>").is_empty());
    }
}
