//! Confidence scoring for mined contacts.
//!
//! The score is a pure function of a small signal struct and a table of
//! weights, so it can be tuned from the `[scoring]` config section without
//! touching the crawl.

use crate::models::{FoundVia, Role};
use serde::Deserialize;

/// How an email's domain relates to the crawled company.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DomainRelation {
    /// The root domain or one of its subdomains.
    Same,
    /// A consumer mailbox provider (gmail.com, outlook.com, ...).
    FreeMail,
    /// Any other domain.
    ThirdParty,
}

/// Everything the scorer looks at for one contact.
#[derive(Debug, Clone)]
pub(crate) struct ScoreSignals {
    pub found_via: FoundVia,
    pub domain_relation: DomainRelation,
    pub on_contact_page: bool,
    /// Number of distinct pages the email appeared on.
    pub distinct_pages: usize,
    pub role: Role,
    pub context_mentions_contact: bool,
    /// Result of the mail exchanger lookup; `None` if not checked or inconclusive.
    pub mail_domain_verified: Option<bool>,
}

/// Additive weights of the confidence score.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct ScoringWeights {
    pub base_mailto: i32,
    pub base_structured: i32,
    pub base_plaintext: i32,
    pub base_obfuscated: i32,
    pub base_guessed: i32,
    pub same_domain_bonus: i32,
    pub free_mail_penalty: i32,
    pub third_party_penalty: i32,
    pub contact_page_bonus: i32,
    pub two_pages_bonus: i32,
    pub three_pages_bonus: i32,
    pub many_pages_bonus: i32,
    /// Executive and HR addresses.
    pub key_role_bonus: i32,
    /// Any other role except General.
    pub specific_role_bonus: i32,
    pub context_bonus: i32,
    pub unverified_mail_penalty: i32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            base_mailto: 50,
            base_structured: 45,
            base_plaintext: 30,
            base_obfuscated: 25,
            base_guessed: 10,
            same_domain_bonus: 20,
            free_mail_penalty: 10,
            third_party_penalty: 5,
            contact_page_bonus: 10,
            two_pages_bonus: 5,
            three_pages_bonus: 8,
            many_pages_bonus: 10,
            key_role_bonus: 10,
            specific_role_bonus: 5,
            context_bonus: 5,
            unverified_mail_penalty: 10,
        }
    }
}

/// Computes a 0-100 confidence for one contact.
pub(crate) fn score(signals: &ScoreSignals, weights: &ScoringWeights) -> u8 {
    let mut total = match signals.found_via {
        FoundVia::Mailto => weights.base_mailto,
        FoundVia::StructuredData => weights.base_structured,
        FoundVia::Plaintext => weights.base_plaintext,
        FoundVia::Obfuscated => weights.base_obfuscated,
        FoundVia::Guessed => weights.base_guessed,
    };

    total += match signals.domain_relation {
        DomainRelation::Same => weights.same_domain_bonus,
        DomainRelation::FreeMail => -weights.free_mail_penalty,
        DomainRelation::ThirdParty => -weights.third_party_penalty,
    };

    if signals.on_contact_page {
        total += weights.contact_page_bonus;
    }

    total += match signals.distinct_pages {
        0 | 1 => 0,
        2 => weights.two_pages_bonus,
        3 => weights.three_pages_bonus,
        _ => weights.many_pages_bonus,
    };

    total += match signals.role {
        Role::Executive | Role::Hr => weights.key_role_bonus,
        Role::General => 0,
        _ => weights.specific_role_bonus,
    };

    if signals.context_mentions_contact {
        total += weights.context_bonus;
    }

    if signals.mail_domain_verified == Some(false) {
        total -= weights.unverified_mail_penalty;
    }

    total.clamp(0, 100) as u8
}

/// Human-readable band of a confidence value.
pub(crate) fn band(confidence: u8) -> &'static str {
    match confidence {
        80..=u8::MAX => "high",
        60..=79 => "medium",
        _ => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(found_via: FoundVia, role: Role) -> ScoreSignals {
        ScoreSignals {
            found_via,
            domain_relation: DomainRelation::Same,
            on_contact_page: false,
            distinct_pages: 1,
            role,
            context_mentions_contact: false,
            mail_domain_verified: None,
        }
    }

    #[test]
    fn test_hr_mailto_on_contact_page_is_high() {
        let s = ScoreSignals {
            on_contact_page: true,
            ..signals(FoundVia::Mailto, Role::Hr)
        };
        let confidence = score(&s, &ScoringWeights::default());
        assert_eq!(confidence, 90);
        assert_eq!(band(confidence), "high");
    }

    #[test]
    fn test_generic_plaintext_off_domain_is_low() {
        let s = ScoreSignals {
            domain_relation: DomainRelation::ThirdParty,
            ..signals(FoundVia::Plaintext, Role::General)
        };
        let confidence = score(&s, &ScoringWeights::default());
        assert!(confidence < 60);
        assert_eq!(band(confidence), "low");
    }

    #[test]
    fn test_mailto_beats_plaintext_all_else_equal() {
        let weights = ScoringWeights::default();
        let mailto = score(&signals(FoundVia::Mailto, Role::Info), &weights);
        let plain = score(&signals(FoundVia::Plaintext, Role::Info), &weights);
        let obfuscated = score(&signals(FoundVia::Obfuscated, Role::Info), &weights);
        assert!(mailto > plain);
        assert!(plain > obfuscated);
    }

    #[test]
    fn test_multiplicity_bonus_is_capped() {
        let weights = ScoringWeights::default();
        let at = |pages| {
            score(
                &ScoreSignals {
                    distinct_pages: pages,
                    ..signals(FoundVia::Plaintext, Role::General)
                },
                &weights,
            )
        };
        assert_eq!(at(1), 50);
        assert_eq!(at(2), 55);
        assert_eq!(at(3), 58);
        assert_eq!(at(4), 60);
        assert_eq!(at(40), 60);
    }

    #[test]
    fn test_score_is_clamped() {
        let generous = ScoringWeights {
            base_mailto: 95,
            ..ScoringWeights::default()
        };
        let s = ScoreSignals {
            on_contact_page: true,
            distinct_pages: 5,
            context_mentions_contact: true,
            mail_domain_verified: Some(true),
            ..signals(FoundVia::Mailto, Role::Executive)
        };
        assert_eq!(score(&s, &generous), 100);

        let harsh = ScoringWeights {
            base_guessed: 0,
            ..ScoringWeights::default()
        };
        let s = ScoreSignals {
            domain_relation: DomainRelation::FreeMail,
            mail_domain_verified: Some(false),
            ..signals(FoundVia::Guessed, Role::General)
        };
        assert_eq!(score(&s, &harsh), 0);
    }

    #[test]
    fn test_unverified_mail_domain_penalized() {
        let weights = ScoringWeights::default();
        let unknown = score(&signals(FoundVia::Mailto, Role::Sales), &weights);
        let failed = score(
            &ScoreSignals {
                mail_domain_verified: Some(false),
                ..signals(FoundVia::Mailto, Role::Sales)
            },
            &weights,
        );
        assert_eq!(unknown - failed, 10);
    }
}
