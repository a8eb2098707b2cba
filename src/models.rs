//! Defines the core data structures used in the contact-miner application.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Identifies one mining run. Built once per request and never mutated.
#[derive(Debug, Clone)]
pub(crate) struct CrawlJob {
    /// The raw user string, URL or bare domain.
    pub seed_input: String,
    /// The seed parsed as a URL (scheme added if it was missing).
    pub seed_url: Url,
    /// Normalized registrable domain used for same-domain scoping.
    pub root_domain: String,
    pub page_budget: usize,
    pub max_depth: usize,
    pub per_page_timeout: Duration,
    pub overall_timeout: Duration,
}

/// What a frontier entry should be fetched as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    Page,
    Sitemap,
}

/// One URL in the frontier.
#[derive(Debug, Clone)]
pub(crate) struct CrawlTarget {
    pub url: Url,
    pub depth: usize,
    /// Parent page, if the target was discovered through a link.
    pub discovered_from: Option<Url>,
    pub kind: TargetKind,
}

/// A `mailto:` anchor found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MailtoTarget {
    /// Decoded, lowercased address.
    pub email: String,
    /// Text inside the anchor.
    pub anchor_text: String,
    /// Text of the element enclosing the anchor.
    pub block_text: String,
}

/// An `<a href>` target resolved against its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageLink {
    pub url: Url,
    pub same_domain: bool,
}

/// Output of processing one `CrawlTarget`. Transient, owned by the orchestrator.
#[derive(Debug, Clone)]
pub(crate) struct PageResult {
    pub url: Url,
    pub status_code: Option<u16>,
    pub raw_text: String,
    pub mailto_targets: Vec<MailtoTarget>,
    pub outbound_links: Vec<PageLink>,
    pub fetch_error: Option<FetchError>,
}

/// How an email candidate was discovered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FoundVia {
    Mailto,
    StructuredData,
    Obfuscated,
    Plaintext,
    Guessed,
}

impl FoundVia {
    /// Trust rank used when merging occurrences; higher wins.
    pub(crate) fn trust_rank(self) -> u8 {
        match self {
            FoundVia::Mailto => 4,
            FoundVia::StructuredData => 3,
            FoundVia::Obfuscated => 2,
            FoundVia::Plaintext => 1,
            FoundVia::Guessed => 0,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            FoundVia::Mailto => "mailto",
            FoundVia::StructuredData => "structured-data",
            FoundVia::Obfuscated => "obfuscated",
            FoundVia::Plaintext => "plaintext",
            FoundVia::Guessed => "pattern-guess",
        }
    }
}

/// An email candidate before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawContact {
    /// Lowercase, normalized address.
    pub email: String,
    /// Page the address was found on; `None` for guessed addresses.
    pub found_on_url: Option<String>,
    pub found_via: FoundVia,
    /// Bounded text window around the match.
    pub surrounding_context: String,
}

/// Organizational role of a contact.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Role {
    #[serde(rename = "HR")]
    Hr,
    Sales,
    Support,
    Info,
    Executive,
    Tech,
    Legal,
    General,
}

impl Role {
    /// Tie-break priority for contacts with equal confidence; lower sorts first.
    pub(crate) fn priority(self) -> u8 {
        match self {
            Role::Executive => 0,
            Role::Hr => 1,
            Role::Tech => 2,
            Role::Sales => 3,
            Role::Legal => 4,
            Role::Support => 5,
            Role::Info => 6,
            Role::General => 7,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Hr => "HR",
            Role::Sales => "Sales",
            Role::Support => "Support",
            Role::Info => "Info",
            Role::Executive => "Executive",
            Role::Tech => "Tech",
            Role::Legal => "Legal",
            Role::General => "General",
        };
        f.write_str(name)
    }
}

/// A scored contact in the final report.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Contact {
    pub email: String,
    pub role: Role,
    /// Best page the address was found on, or the discovery label.
    pub source: String,
    /// 0-100.
    pub confidence: u8,
    pub context: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MiningStats {
    pub pages_crawled: usize,
    pub emails_found: usize,
    pub social_links_found: usize,
}

/// The final output of one mining job.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MiningReport {
    pub company: String,
    pub stats: MiningStats,
    pub contacts: Vec<Contact>,
    pub social_links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub error: Option<String>,
}

/// A company record read from a batch input file or the batch API.
/// Unknown fields are carried through to the output untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub(crate) struct CompanyRecord {
    /// Company domain ("acme.com") or homepage URL.
    #[serde(alias = "website", alias = "company_domain")]
    pub domain: Option<String>,
    /// Display name, if the caller already knows it.
    pub name: Option<String>,
    #[serde(flatten)]
    pub other_fields: HashMap<String, serde_json::Value>,
}

/// Output record for batch processing: the input plus the mining outcome.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct ProcessingResult {
    #[serde(flatten)]
    pub company_input: CompanyRecord,

    /// Full report. Absent if the record was skipped or the job failed.
    pub contact_mining: Option<MiningReport>,
    /// Highest-ranked email (convenience field).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_confidence: Option<u8>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    #[serde(default)]
    pub mining_skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_error: Option<String>,
}
