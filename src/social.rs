//! Collection of the company's social media profile links.

use std::collections::HashSet;
use url::Url;

const SOCIAL_PLATFORMS: &[&str] = &[
    "linkedin.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "youtube.com",
    "github.com",
    "instagram.com",
];

/// Path segments of share buttons and intent endpoints, which are not profiles.
const SHARE_SEGMENTS: &[&str] = &[
    "share",
    "sharer",
    "sharer.php",
    "share.php",
    "sharearticle",
    "sharing",
    "share-offsite",
    "intent",
    "dialog",
    "plugins",
];

fn strip_mobile_prefix(host: &str) -> &str {
    for prefix in ["www.", "m.", "mobile."] {
        if let Some(rest) = host.strip_prefix(prefix) {
            return rest;
        }
    }
    host
}

/// Canonical `https://host/path` form of a social profile URL.
///
/// # Returns
/// * `None` if the URL is not on a known platform, is a platform home page,
///   or is a share/intent endpoint.
pub(crate) fn normalize_social_url(url: &Url) -> Option<String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_lowercase();
    let host = strip_mobile_prefix(&host);

    let on_platform = SOCIAL_PLATFORMS
        .iter()
        .any(|p| host == *p || host.ends_with(&format!(".{}", p)));
    if !on_platform {
        return None;
    }

    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    let is_share = path
        .split('/')
        .any(|segment| SHARE_SEGMENTS.contains(&segment.to_lowercase().as_str()));
    if is_share {
        return None;
    }

    Some(format!("https://{}{}", host, path))
}

/// Ordered, de-duplicated set of profile links for one job.
#[derive(Debug, Default)]
pub(crate) struct SocialCollector {
    links: Vec<String>,
    seen: HashSet<String>,
}

impl SocialCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Offers a candidate URL; returns true if it was added.
    pub(crate) fn offer(&mut self, url: &Url) -> bool {
        match normalize_social_url(url) {
            Some(link) if self.seen.insert(link.clone()) => {
                tracing::debug!(target: "mine_task", "Found social link {}", link);
                self.links.push(link);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    /// Links in first-discovered order.
    pub(crate) fn into_links(self) -> Vec<String> {
        self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(collector: &mut SocialCollector, s: &str) -> bool {
        collector.offer(&Url::parse(s).unwrap())
    }

    #[test]
    fn test_profiles_are_normalized() {
        let norm = |s: &str| normalize_social_url(&Url::parse(s).unwrap());
        assert_eq!(
            norm("http://www.LinkedIn.com/company/acme/?trk=footer").as_deref(),
            Some("https://linkedin.com/company/acme")
        );
        assert_eq!(
            norm("https://mobile.twitter.com/acme#top").as_deref(),
            Some("https://twitter.com/acme")
        );
        assert_eq!(
            norm("https://m.facebook.com/acmeinc").as_deref(),
            Some("https://facebook.com/acmeinc")
        );
        assert_eq!(
            norm("https://x.com/acme").as_deref(),
            Some("https://x.com/acme")
        );
    }

    #[test]
    fn test_home_pages_share_links_and_other_hosts_rejected() {
        let norm = |s: &str| normalize_social_url(&Url::parse(s).unwrap());
        assert!(norm("https://www.linkedin.com/").is_none());
        assert!(norm("https://twitter.com/intent/tweet?text=hi").is_none());
        assert!(norm("https://www.facebook.com/sharer/sharer.php?u=x").is_none());
        assert!(norm("https://www.linkedin.com/shareArticle?url=x").is_none());
        assert!(norm("https://dropbox.com/acme").is_none());
        assert!(norm("https://notlinkedin.com/acme").is_none());
    }

    #[test]
    fn test_collector_keeps_first_discovered_order() {
        let mut collector = SocialCollector::new();
        assert!(offer(&mut collector, "https://github.com/acme"));
        assert!(offer(&mut collector, "https://www.linkedin.com/company/acme"));
        assert!(!offer(&mut collector, "https://github.com/acme/"));
        assert!(!offer(&mut collector, "https://acme.com/about"));
        assert!(offer(&mut collector, "https://instagram.com/acme"));
        assert_eq!(collector.len(), 3);
        assert_eq!(
            collector.into_links(),
            vec![
                "https://github.com/acme",
                "https://linkedin.com/company/acme",
                "https://instagram.com/acme",
            ]
        );
    }
}
