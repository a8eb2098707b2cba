//! Turns the per-job ledger into the final, ranked report.

use crate::classifier::classify;
use crate::config::Config;
use crate::domain::{is_free_mail_domain, is_same_domain};
use crate::extractor::{ContactLedger, LedgerEntry};
use crate::models::{Contact, MiningReport, MiningStats};
use crate::patterns::generate_role_addresses;
use crate::scorer::{DomainRelation, ScoreSignals, band, score};
use crate::social::SocialCollector;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static CONTACT_WORDING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(e-?mail|contact|reach|send|apply|write to)").unwrap());

/// Everything the crawl collected for one job.
#[derive(Debug)]
pub(crate) struct CrawlHarvest {
    pub root_domain: String,
    pub homepage_title: Option<String>,
    pub homepage_site_name: Option<String>,
    pub ledger: ContactLedger,
    pub social: SocialCollector,
    /// Pages fetched and analyzed successfully.
    pub pages_crawled: usize,
    pub mail_domain_verified: Option<bool>,
}

/// Picks a display name for the company.
///
/// Prefers `og:site_name`, then the title segment that mentions the domain's
/// leading label, then the root domain itself.
pub(crate) fn company_name(
    site_name: Option<&str>,
    title: Option<&str>,
    root_domain: &str,
) -> String {
    if let Some(name) = site_name.map(str::trim).filter(|s| !s.is_empty()) {
        return name.to_string();
    }

    let leading_label = root_domain.split('.').next().unwrap_or("").to_lowercase();
    if let Some(title) = title {
        if !leading_label.is_empty() {
            let normalized = title.replace(" - ", "|");
            let segment = normalized
                .split(['|', '–', '—', ':', '·'])
                .map(str::trim)
                .find(|seg| !seg.is_empty() && seg.to_lowercase().contains(&leading_label));
            if let Some(segment) = segment {
                return segment.to_string();
            }
        }
    }

    root_domain.to_string()
}

fn domain_relation(email: &str, root_domain: &str) -> DomainRelation {
    let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or("");
    if is_same_domain(domain, root_domain) {
        DomainRelation::Same
    } else if is_free_mail_domain(domain) {
        DomainRelation::FreeMail
    } else {
        DomainRelation::ThirdParty
    }
}

fn build_contact(
    entry: &LedgerEntry,
    root_domain: &str,
    mail_domain_verified: Option<bool>,
    config: &Config,
) -> Contact {
    let raw = &entry.best;
    let role = classify(&raw.email, &raw.surrounding_context);
    let signals = ScoreSignals {
        found_via: raw.found_via,
        domain_relation: domain_relation(&raw.email, root_domain),
        on_contact_page: entry.seen_on_contact_page,
        distinct_pages: entry.pages.len(),
        role,
        context_mentions_contact: CONTACT_WORDING_REGEX.is_match(&raw.surrounding_context),
        mail_domain_verified,
    };
    let confidence = score(&signals, &config.scoring);
    tracing::debug!(target: "mine_task",
        "Scored {} as {} [{}] ({:?})", raw.email, confidence, band(confidence), signals
    );

    Contact {
        email: raw.email.clone(),
        role,
        source: raw
            .found_on_url
            .clone()
            .unwrap_or_else(|| raw.found_via.label().to_string()),
        confidence,
        context: raw.surrounding_context.clone(),
    }
}

/// Confidence descending, then role priority, then email.
pub(crate) fn compare_contacts(a: &Contact, b: &Contact) -> Ordering {
    b.confidence
        .cmp(&a.confidence)
        .then_with(|| a.role.priority().cmp(&b.role.priority()))
        .then_with(|| a.email.cmp(&b.email))
}

/// Builds the report: optional role-address guesses, scoring, ranking and stats.
pub(crate) fn aggregate(harvest: CrawlHarvest, config: &Config) -> MiningReport {
    let CrawlHarvest {
        root_domain,
        homepage_title,
        homepage_site_name,
        mut ledger,
        social,
        pages_crawled,
        mail_domain_verified,
    } = harvest;

    let receives_mail =
        mail_domain_verified == Some(true) || ledger.has_domain_email(&root_domain);
    if config.guess_role_addresses && receives_mail {
        for guess in generate_role_addresses(&config.guess_prefixes, &root_domain) {
            if !ledger.contains(&guess.email) {
                ledger.record(guess);
            }
        }
    }

    let mut contacts: Vec<Contact> = ledger
        .into_entries()
        .iter()
        .map(|entry| build_contact(entry, &root_domain, mail_domain_verified, config))
        .collect();
    contacts.sort_by(compare_contacts);

    let social_links = social.into_links();
    let company = company_name(
        homepage_site_name.as_deref(),
        homepage_title.as_deref(),
        &root_domain,
    );

    MiningReport {
        company,
        stats: MiningStats {
            pages_crawled,
            emails_found: contacts.len(),
            social_links_found: social_links.len(),
        },
        contacts,
        social_links,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoundVia, RawContact, Role};
    use url::Url;

    fn raw(email: &str, page: &str, via: FoundVia, context: &str) -> RawContact {
        RawContact {
            email: email.to_string(),
            found_on_url: Some(page.to_string()),
            found_via: via,
            surrounding_context: context.to_string(),
        }
    }

    fn harvest(ledger: ContactLedger) -> CrawlHarvest {
        CrawlHarvest {
            root_domain: "acme.com".to_string(),
            homepage_title: Some("Home | Acme Corp".to_string()),
            homepage_site_name: None,
            ledger,
            social: SocialCollector::new(),
            pages_crawled: 3,
            mail_domain_verified: None,
        }
    }

    #[test]
    fn test_company_name_fallbacks() {
        assert_eq!(company_name(Some(" Acme Inc "), Some("Whatever"), "acme.com"), "Acme Inc");
        assert_eq!(company_name(None, Some("Welcome - Acme Corp"), "acme.com"), "Acme Corp");
        assert_eq!(company_name(None, Some("ACME — Careers"), "acme.com"), "ACME");
        assert_eq!(company_name(None, Some("Home"), "acme.com"), "acme.com");
        assert_eq!(company_name(None, None, "acme.co.uk"), "acme.co.uk");
    }

    #[test]
    fn test_report_is_ranked_and_counted() {
        let mut ledger = ContactLedger::new();
        ledger.record(raw("info@acme.com", "https://acme.com/", FoundVia::Plaintext, "info@acme.com"));
        ledger.record(raw(
            "hr@acme.com",
            "https://acme.com/careers",
            FoundVia::Mailto,
            "Apply via HR",
        ));
        ledger.record(raw(
            "sales@acme.com",
            "https://acme.com/",
            FoundVia::Plaintext,
            "sales@acme.com",
        ));
        ledger.record(raw(
            "founder@gmail.com",
            "https://acme.com/",
            FoundVia::Plaintext,
            "",
        ));

        let report = aggregate(harvest(ledger), &Config::default());
        assert_eq!(report.company, "Acme Corp");
        assert_eq!(report.stats.emails_found, report.contacts.len());
        assert_eq!(report.stats.emails_found, 4);
        assert_eq!(report.stats.pages_crawled, 3);

        let order: Vec<&str> = report.contacts.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(
            order,
            vec!["hr@acme.com", "sales@acme.com", "info@acme.com", "founder@gmail.com"]
        );
        assert_eq!(report.contacts[0].role, Role::Hr);
        assert_eq!(report.contacts[0].source, "https://acme.com/careers");
        for pair in report.contacts.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_equal_confidence_sorted_by_role_priority() {
        let a = Contact {
            email: "a@acme.com".to_string(),
            role: Role::Info,
            source: String::new(),
            confidence: 70,
            context: String::new(),
        };
        let b = Contact {
            role: Role::Executive,
            email: "z@acme.com".to_string(),
            ..a.clone()
        };
        let mut contacts = vec![a, b];
        contacts.sort_by(compare_contacts);
        assert_eq!(contacts[0].role, Role::Executive);
    }

    #[test]
    fn test_guesses_only_when_domain_receives_mail() {
        let config = Config {
            guess_role_addresses: true,
            guess_prefixes: vec!["careers".to_string(), "hr".to_string()],
            ..Config::default()
        };

        let empty = aggregate(harvest(ContactLedger::new()), &config);
        assert!(empty.contacts.is_empty());

        let mut ledger = ContactLedger::new();
        ledger.record(raw(
            "hr@acme.com",
            "https://acme.com/careers",
            FoundVia::Mailto,
            "HR",
        ));
        let report = aggregate(harvest(ledger), &config);
        assert_eq!(report.contacts.len(), 2);
        let guessed = report
            .contacts
            .iter()
            .find(|c| c.email == "careers@acme.com")
            .unwrap();
        assert_eq!(guessed.source, "pattern-guess");
        assert!(guessed.confidence < report.contacts[0].confidence);
    }

    #[test]
    fn test_empty_harvest_is_a_valid_report() {
        let mut harvest = harvest(ContactLedger::new());
        harvest.pages_crawled = 0;
        harvest.social.offer(&Url::parse("https://github.com/acme").unwrap());
        let report = aggregate(harvest, &Config::default());
        assert!(report.contacts.is_empty());
        assert_eq!(report.stats.pages_crawled, 0);
        assert_eq!(report.social_links, vec!["https://github.com/acme"]);
        assert_eq!(report.stats.social_links_found, 1);
    }
}
