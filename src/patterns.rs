//! Generates common role addresses for a domain that is known to receive mail.

use crate::extractor::normalize_email;
use crate::models::{FoundVia, RawContact};
use std::collections::HashSet;

/// Removes whitespace and converts to lowercase.
fn sanitize_prefix(part: &str) -> String {
    part.trim().replace(char::is_whitespace, "").to_lowercase()
}

/// Builds `<prefix>@<domain>` guesses for each configured prefix.
///
/// # Arguments
/// * `prefixes` - Local parts to try (e.g., "careers", "hr").
/// * `domain` - The company's root domain (e.g., "example.com").
///
/// # Returns
/// * `Vec<RawContact>` of `Guessed` candidates, de-duplicated, in prefix order.
///   Empty if the domain is not a valid mail domain.
pub(crate) fn generate_role_addresses(prefixes: &[String], domain: &str) -> Vec<RawContact> {
    if domain.is_empty() || !domain.contains('.') {
        tracing::debug!("Cannot generate role addresses for domain '{}'", domain);
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let guesses: Vec<RawContact> = prefixes
        .iter()
        .map(|p| sanitize_prefix(p))
        .filter(|p| !p.is_empty())
        .filter_map(|p| normalize_email(&format!("{}@{}", p, domain)))
        .filter(|email| seen.insert(email.clone()))
        .map(|email| RawContact {
            email,
            found_on_url: None,
            found_via: FoundVia::Guessed,
            surrounding_context: String::new(),
        })
        .collect();

    tracing::debug!("Generated {} role address guesses for {}", guesses.len(), domain);
    guesses
}
