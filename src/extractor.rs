//! Email extraction, normalization and cross-page merging.

use crate::domain::{host_of, is_contact_like_path, is_same_domain, registrable_domain};
use crate::models::{FoundVia, MailtoTarget, RawContact};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use url::Url;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// `name [at] domain [dot] com`, `name(at)domain(dot)com`, `{at}` variants and
/// `name [at] domain.com`.
static BRACKET_OBFUSCATED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)([a-z0-9._%+-]+)\s*[\[\(\{]\s*at\s*[\]\)\}]\s*([a-z0-9-]+(?:\s*(?:[\[\(\{]\s*dot\s*[\]\)\}]|\.)\s*[a-z0-9-]+)+)",
    )
    .unwrap()
});

/// `name @ domain . com` and `name @ domain.com`.
static SPACED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9._%+-]+)\s+@\s+([A-Za-z0-9-]+(?:(?:\s+\.\s+|\.)[A-Za-z0-9-]+)+)")
        .unwrap()
});

static DOT_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\[\(\{]\s*dot\s*[\]\)\}]").unwrap());

const BLOCKED_LOCAL_PARTS: &[&str] = &[
    "noreply",
    "no-reply",
    "no_reply",
    "donotreply",
    "do-not-reply",
    "do_not_reply",
    "mailer-daemon",
];

/// Local parts that only appear in form placeholders and templates.
const PLACEHOLDER_LOCAL_PARTS: &[&str] = &[
    "you", "your", "yourname", "your.name", "name", "firstname", "first.last",
    "firstname.lastname", "john.doe", "jane.doe", "user", "username", "email",
];

/// TLDs that are really file extensions (`logo@2x.png`).
const ASSET_TLDS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "css", "js", "woff", "woff2", "ttf", "ico",
    "bmp", "avif", "mp4", "webm",
];

/// Tracking, analytics and placeholder domains, including their subdomains.
const BLOCKED_DOMAINS: &[&str] = &[
    "sentry.io",
    "sentry-next.wixpress.com",
    "wixpress.com",
    "example.com",
    "example.org",
    "example.net",
    "domain.com",
    "yourdomain.com",
    "yourcompany.com",
    "company.com",
    "email.tld",
    "godaddy.com",
    "mailchimp.com",
    "hubspot.com",
    "googleapis.com",
    "cloudflare.com",
];

const TRIM_CHARS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '\'', '"', '(', ')', '[', ']', '<', '>', '{', '}', '*',
];

/// Lowercases and strictly validates an address.
///
/// # Returns
/// * `None` if the address is syntactically invalid.
pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().trim_matches(TRIM_CHARS).to_lowercase();
    let (local, domain) = email.split_once('@')?;

    if local.is_empty()
        || local.len() > 64
        || domain.contains('@')
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return None;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || domain.len() > 253 {
        return None;
    }
    for label in &labels {
        if label.is_empty()
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return None;
        }
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(email)
}

fn is_hash_like(local: &str) -> bool {
    local.len() >= 24 && local.chars().all(|c| c.is_ascii_hexdigit())
}

/// True for addresses that are never real contacts: no-reply mailboxes,
/// asset file names, tracking keys and placeholder domains.
pub(crate) fn is_blocked(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return true;
    };
    let base_local = local.split('+').next().unwrap_or(local);

    if BLOCKED_LOCAL_PARTS.contains(&base_local)
        || base_local.starts_with("noreply")
        || base_local.starts_with("no-reply")
        || PLACEHOLDER_LOCAL_PARTS.contains(&base_local)
    {
        return true;
    }
    if is_hash_like(base_local) {
        return true;
    }

    let tld = domain.rsplit('.').next().unwrap_or("");
    if ASSET_TLDS.contains(&tld) {
        return true;
    }
    if domain.starts_with("2x.") || domain.starts_with("3x.") {
        return true;
    }

    BLOCKED_DOMAINS
        .iter()
        .any(|blocked| is_same_domain(domain, blocked))
}

/// Normalizes and filters one candidate address.
fn accept(raw: &str) -> Option<String> {
    let email = normalize_email(raw)?;
    if is_blocked(&email) {
        tracing::debug!(target: "mine_task", "Dropping blocklisted address {}", email);
        return None;
    }
    Some(email)
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Up to `radius` characters of text on each side of `start..end`, whitespace collapsed.
pub(crate) fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let start = floor_char_boundary(text, start.min(text.len()));
    let end = floor_char_boundary(text, end.min(text.len())).max(start);

    let window_start = if radius == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let window_end = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    text[window_start..window_end]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn overlaps(claimed: &[Range<usize>], span: &Range<usize>) -> bool {
    claimed
        .iter()
        .any(|c| c.start < span.end && span.start < c.end)
}

/// True when every dot in `raw` has whitespace on both sides.
fn every_dot_spaced(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('.').collect();
    parts
        .windows(2)
        .all(|w| w[0].ends_with(char::is_whitespace) && w[1].starts_with(char::is_whitespace))
}

/// Rejects capitalised words such as the start of the next sentence.
fn plausible_tld(label: &str) -> bool {
    label.len() >= 2
        && (label.chars().all(|c| c.is_ascii_lowercase())
            || label.chars().all(|c| c.is_ascii_uppercase()))
}

fn deobfuscate_domain(raw: &str) -> String {
    DOT_TOKEN_REGEX
        .replace_all(raw, ".")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Finds plain and obfuscated addresses in a page's visible text.
pub(crate) fn extract(text: &str, page_url: &Url, context_radius: usize) -> Vec<RawContact> {
    let mut contacts = Vec::new();
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let page_root = host_of(page_url).map(|h| registrable_domain(&h));

    let mut push = |email: String, span: Range<usize>, found_via: FoundVia| {
        contacts.push(RawContact {
            email,
            found_on_url: Some(page_url.to_string()),
            found_via,
            surrounding_context: context_window(text, span.start, span.end, context_radius),
        });
    };

    for m in EMAIL_REGEX.find_iter(text) {
        let span = m.range();
        claimed.push(span.clone());
        if let Some(email) = accept(m.as_str()) {
            push(email, span, FoundVia::Plaintext);
        }
    }

    for caps in BRACKET_OBFUSCATED_REGEX.captures_iter(text) {
        let (Some(whole), Some(local), Some(domain)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let span = whole.range();
        if overlaps(&claimed, &span) {
            continue;
        }
        claimed.push(span.clone());
        let candidate = format!("{}@{}", local.as_str(), deobfuscate_domain(domain.as_str()));
        if let Some(email) = accept(&candidate) {
            push(email, span, FoundVia::Obfuscated);
        }
    }

    for caps in SPACED_REGEX.captures_iter(text) {
        let (Some(whole), Some(local), Some(domain)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let span = whole.range();
        if overlaps(&claimed, &span) {
            continue;
        }
        let clean_domain = deobfuscate_domain(domain.as_str());
        // `name @ domain.com` is common in prose ("follow us @ twitter.com"),
        // so the half-spaced form must point at the site's own domain.
        let credible = if every_dot_spaced(domain.as_str()) {
            domain
                .as_str()
                .rsplit('.')
                .next()
                .is_some_and(|tld| plausible_tld(tld.trim()))
        } else {
            page_root
                .as_deref()
                .is_some_and(|root| is_same_domain(&clean_domain, root))
        };
        if !credible {
            continue;
        }
        claimed.push(span.clone());
        let candidate = format!("{}@{}", local.as_str(), clean_domain);
        if let Some(email) = accept(&candidate) {
            push(email, span, FoundVia::Obfuscated);
        }
    }

    contacts
}

/// Converts a mailto anchor into a candidate; the enclosing block text is the context.
pub(crate) fn from_mailto(target: &MailtoTarget, page_url: &Url) -> Option<RawContact> {
    let email = accept(&target.email)?;
    let context = if target.block_text.is_empty() {
        target.anchor_text.clone()
    } else {
        target.block_text.clone()
    };
    Some(RawContact {
        email,
        found_on_url: Some(page_url.to_string()),
        found_via: FoundVia::Mailto,
        surrounding_context: context,
    })
}

/// Converts a JSON-LD `email` value into a candidate.
pub(crate) fn from_structured(email: &str, page_url: &Url, context: &str) -> Option<RawContact> {
    let email = accept(email)?;
    Some(RawContact {
        email,
        found_on_url: Some(page_url.to_string()),
        found_via: FoundVia::StructuredData,
        surrounding_context: context.to_string(),
    })
}

fn on_contact_page(raw: &RawContact) -> bool {
    raw.found_on_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .map(|u| is_contact_like_path(&u))
        .unwrap_or(false)
}

/// Total order over occurrences of one address; the smallest key wins.
fn preference_key(raw: &RawContact) -> (Reverse<u8>, Reverse<bool>, Option<String>, String) {
    (
        Reverse(raw.found_via.trust_rank()),
        Reverse(on_contact_page(raw)),
        raw.found_on_url.clone(),
        raw.surrounding_context.clone(),
    )
}

/// Merged view of every occurrence of one address.
#[derive(Debug, Clone)]
pub(crate) struct LedgerEntry {
    /// The most trusted occurrence.
    pub best: RawContact,
    /// Distinct pages the address appeared on.
    pub pages: BTreeSet<String>,
    /// True if any occurrence was on a contact-like page.
    pub seen_on_contact_page: bool,
}

/// Per-job map from normalized email to its merged occurrences.
///
/// The result does not depend on the order occurrences are recorded in.
#[derive(Debug, Default)]
pub(crate) struct ContactLedger {
    entries: HashMap<String, LedgerEntry>,
}

impl ContactLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, raw: RawContact) {
        let contact_page = on_contact_page(&raw);
        match self.entries.get_mut(&raw.email) {
            Some(entry) => {
                if let Some(url) = &raw.found_on_url {
                    entry.pages.insert(url.clone());
                }
                entry.seen_on_contact_page |= contact_page;
                if preference_key(&raw) < preference_key(&entry.best) {
                    entry.best = raw;
                }
            }
            None => {
                let mut pages = BTreeSet::new();
                if let Some(url) = &raw.found_on_url {
                    pages.insert(url.clone());
                }
                self.entries.insert(
                    raw.email.clone(),
                    LedgerEntry {
                        best: raw,
                        pages,
                        seen_on_contact_page: contact_page,
                    },
                );
            }
        }
    }

    pub(crate) fn contains(&self, email: &str) -> bool {
        self.entries.contains_key(email)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any recorded address is on the root domain.
    pub(crate) fn has_domain_email(&self, root_domain: &str) -> bool {
        self.entries.keys().any(|email| {
            email
                .rsplit_once('@')
                .map(|(_, domain)| is_same_domain(domain, root_domain))
                .unwrap_or(false)
        })
    }

    /// Entries ordered by email.
    pub(crate) fn into_entries(self) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self.entries.into_values().collect();
        entries.sort_by(|a, b| a.best.email.cmp(&b.best.email));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn emails(contacts: &[RawContact]) -> Vec<(&str, FoundVia)> {
        contacts
            .iter()
            .map(|c| (c.email.as_str(), c.found_via))
            .collect()
    }

    #[test]
    fn test_plaintext_extraction_with_context() {
        let text = "For press inquiries write to Press@Acme.com. We answer fast.";
        let found = extract(text, &url("https://acme.com/press"), 20);
        assert_eq!(emails(&found), vec![("press@acme.com", FoundVia::Plaintext)]);
        assert_eq!(
            found[0].surrounding_context,
            "inquiries write to Press@Acme.com. We answer fast."
        );
        assert_eq!(found[0].found_on_url.as_deref(), Some("https://acme.com/press"));
    }

    #[test]
    fn test_obfuscated_variants() {
        let text = "jobs [at] acme [dot] com | sales(at)acme(dot)co(dot)uk | \
                    legal {AT} acme {DOT} com | hello [at] acme.com | support @ acme . com";
        let found = extract(text, &url("https://acme.com/"), 10);
        assert_eq!(
            emails(&found),
            vec![
                ("jobs@acme.com", FoundVia::Obfuscated),
                ("sales@acme.co.uk", FoundVia::Obfuscated),
                ("legal@acme.com", FoundVia::Obfuscated),
                ("hello@acme.com", FoundVia::Obfuscated),
                ("support@acme.com", FoundVia::Obfuscated),
            ]
        );
    }

    #[test]
    fn test_plain_address_is_not_double_counted() {
        let found = extract("mail info@acme.com now", &url("https://acme.com/"), 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].found_via, FoundVia::Plaintext);
    }

    #[test]
    fn test_sentence_end_is_not_part_of_domain() {
        let found = extract("reach me @ acme.com. Thanks", &url("https://acme.com/"), 10);
        assert_eq!(emails(&found), vec![("me@acme.com", FoundVia::Obfuscated)]);
    }

    #[test]
    fn test_spaced_at_in_prose_is_ignored() {
        let text = "Follow us @ twitter.com for news. Email us @ Acme . Then call.";
        assert!(extract(text, &url("https://acme.com/"), 10).is_empty());
    }

    #[test]
    fn test_half_spaced_address_needs_page_domain() {
        let text = "write us @ acme.com today";
        let on_site = extract(text, &url("https://www.acme.com/contact"), 10);
        assert_eq!(emails(&on_site), vec![("us@acme.com", FoundVia::Obfuscated)]);
        assert!(extract(text, &url("https://partner.io/"), 10).is_empty());
    }

    #[test]
    fn test_blocklist() {
        let text = "noreply@acme.com logo@2x.png a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6@o1.ingest.sentry.io \
                    you@example.com user@domain.com team@acme.com";
        let found = extract(text, &url("https://acme.com/"), 10);
        assert_eq!(emails(&found), vec![("team@acme.com", FoundVia::Plaintext)]);
    }

    #[test]
    fn test_normalize_email_rejects_malformed() {
        assert_eq!(normalize_email(" <Info@Acme.COM>, ").as_deref(), Some("info@acme.com"));
        assert!(normalize_email("a..b@acme.com").is_none());
        assert!(normalize_email(".a@acme.com").is_none());
        assert!(normalize_email("a@acme").is_none());
        assert!(normalize_email("a@acme.c0m").is_none());
        assert!(normalize_email("a@-acme.com").is_none());
        assert!(normalize_email("a@b@acme.com").is_none());
    }

    #[test]
    fn test_context_window_is_char_boundary_safe() {
        let text = "Kontakt für Bewerbungen: jobs@acme.de, schöne Grüße";
        let start = text.find("jobs@").unwrap();
        let end = start + "jobs@acme.de".len();
        let ctx = context_window(text, start, end, 8);
        assert_eq!(ctx, "bungen: jobs@acme.de, schöne");
        assert_eq!(context_window(text, start, end, 0), "jobs@acme.de");
    }

    #[test]
    fn test_mailto_and_structured_helpers() {
        let target = MailtoTarget {
            email: "hr@acme.com".to_string(),
            anchor_text: "Email HR".to_string(),
            block_text: String::new(),
        };
        let raw = from_mailto(&target, &url("https://acme.com/careers")).unwrap();
        assert_eq!(raw.found_via, FoundVia::Mailto);
        assert_eq!(raw.surrounding_context, "Email HR");

        let blocked = MailtoTarget {
            email: "no-reply@acme.com".to_string(),
            anchor_text: String::new(),
            block_text: String::new(),
        };
        assert!(from_mailto(&blocked, &url("https://acme.com/")).is_none());

        let structured = from_structured("Info@Acme.com", &url("https://acme.com/"), "").unwrap();
        assert_eq!(structured.email, "info@acme.com");
        assert_eq!(structured.found_via, FoundVia::StructuredData);
    }

    #[test]
    fn test_ledger_prefers_mailto_regardless_of_order() {
        let plain = RawContact {
            email: "hr@acme.com".to_string(),
            found_on_url: Some("https://acme.com/".to_string()),
            found_via: FoundVia::Plaintext,
            surrounding_context: "hr@acme.com".to_string(),
        };
        let mailto = RawContact {
            email: "hr@acme.com".to_string(),
            found_on_url: Some("https://acme.com/careers".to_string()),
            found_via: FoundVia::Mailto,
            surrounding_context: "Apply via HR".to_string(),
        };

        let mut forward = ContactLedger::new();
        forward.record(plain.clone());
        forward.record(mailto.clone());
        let mut backward = ContactLedger::new();
        backward.record(mailto);
        backward.record(plain);

        for ledger in [forward, backward] {
            assert_eq!(ledger.len(), 1);
            let entry = ledger.into_entries().remove(0);
            assert_eq!(entry.best.found_via, FoundVia::Mailto);
            assert_eq!(entry.best.surrounding_context, "Apply via HR");
            assert_eq!(entry.pages.len(), 2);
            assert!(entry.seen_on_contact_page);
        }
    }

    #[test]
    fn test_ledger_domain_email_check() {
        let mut ledger = ContactLedger::new();
        assert!(ledger.is_empty());
        ledger.record(RawContact {
            email: "founder@gmail.com".to_string(),
            found_on_url: Some("https://acme.com/".to_string()),
            found_via: FoundVia::Plaintext,
            surrounding_context: String::new(),
        });
        assert!(!ledger.has_domain_email("acme.com"));
        ledger.record(RawContact {
            email: "team@eu.acme.com".to_string(),
            found_on_url: Some("https://acme.com/".to_string()),
            found_via: FoundVia::Plaintext,
            surrounding_context: String::new(),
        });
        assert!(ledger.has_domain_email("acme.com"));
        assert!(ledger.contains("founder@gmail.com"));
    }
}
