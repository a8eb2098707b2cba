//! Assigns an organizational role to each contact.

use crate::models::Role;

/// Ordered rule table; the first matching rule wins.
const ROLE_RULES: &[(Role, &[&str])] = &[
    (
        Role::Hr,
        &["hr", "career", "recruit", "talent", "jobs", "job", "hiring"],
    ),
    (Role::Sales, &["sales", "bd", "partnership"]),
    (Role::Support, &["support", "help", "service"]),
    (Role::Info, &["info", "contact", "hello"]),
    (
        Role::Executive,
        &["ceo", "cto", "cfo", "founder", "president", "executive"],
    ),
    (Role::Tech, &["tech", "engineering", "dev", "it"]),
    (Role::Legal, &["legal", "compliance", "privacy"]),
];

fn local_part_matches(local: &str, tokens: &[&str], keyword: &str) -> bool {
    if keyword.len() <= 3 {
        tokens.contains(&keyword)
    } else {
        local.contains(keyword)
    }
}

fn context_matches(words: &[&str], keyword: &str) -> bool {
    match keyword.len() {
        0..=2 => {
            let acronym = keyword.to_uppercase();
            words.iter().any(|w| *w == acronym)
        }
        3 => words.iter().any(|w| w.eq_ignore_ascii_case(keyword)),
        _ => words
            .iter()
            .any(|w| w.to_lowercase().starts_with(keyword)),
    }
}

/// Classifies an address by its local part, then by its surrounding text.
///
/// The local part is the stronger signal, so the whole table is tried on it
/// before the context is consulted.
pub(crate) fn classify(email: &str, context: &str) -> Role {
    let local = email
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();
    let tokens: Vec<&str> = local
        .split(|c: char| matches!(c, '.' | '_' | '-' | '+') || c.is_ascii_digit())
        .filter(|t| !t.is_empty())
        .collect();

    for (role, keywords) in ROLE_RULES {
        if keywords
            .iter()
            .any(|kw| local_part_matches(&local, &tokens, kw))
        {
            return *role;
        }
    }

    // The window usually contains the address itself; its own labels say
    // nothing about the role ("sales" in sales-force.com).
    let own_labels: Vec<&str> = email
        .split(['@', '.'])
        .chain(tokens.iter().copied())
        .filter(|l| !l.is_empty())
        .collect();
    let words: Vec<&str> = context
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .filter(|w| !own_labels.iter().any(|l| w.eq_ignore_ascii_case(l)))
        .collect();

    for (role, keywords) in ROLE_RULES {
        if keywords.iter().any(|kw| context_matches(&words, kw)) {
            return *role;
        }
    }

    Role::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_part_roles() {
        assert_eq!(classify("hr@acme.com", ""), Role::Hr);
        assert_eq!(classify("careers@acme.com", ""), Role::Hr);
        assert_eq!(classify("talent-team@acme.com", ""), Role::Hr);
        assert_eq!(classify("sales@acme.com", ""), Role::Sales);
        assert_eq!(classify("bd@acme.com", ""), Role::Sales);
        assert_eq!(classify("helpdesk@acme.com", ""), Role::Support);
        assert_eq!(classify("info@acme.com", ""), Role::Info);
        assert_eq!(classify("hello@acme.com", ""), Role::Info);
        assert_eq!(classify("ceo@acme.com", ""), Role::Executive);
        assert_eq!(classify("founder@acme.com", ""), Role::Executive);
        assert_eq!(classify("it@acme.com", ""), Role::Tech);
        assert_eq!(classify("dev.team@acme.com", ""), Role::Tech);
        assert_eq!(classify("privacy@acme.com", ""), Role::Legal);
        assert_eq!(classify("jane.doe@acme.com", ""), Role::General);
    }

    #[test]
    fn test_short_keywords_need_whole_tokens() {
        // "hr" inside "chris", "it" inside "smith" and "bd" inside "abdul".
        assert_eq!(classify("chris.smith@acme.com", ""), Role::General);
        assert_eq!(classify("abdul@acme.com", ""), Role::General);
        assert_eq!(classify("hr2@acme.com", ""), Role::Hr);
    }

    #[test]
    fn test_first_rule_wins() {
        // Both HR and Support keywords; HR comes first.
        assert_eq!(classify("jobs-support@acme.com", ""), Role::Hr);
    }

    #[test]
    fn test_context_roles() {
        assert_eq!(classify("jane@acme.com", "Jane Doe, CEO and co-founder"), Role::Executive);
        assert_eq!(classify("mark@acme.com", "Questions about recruiting?"), Role::Hr);
        assert_eq!(classify("ann@acme.com", "Our HR team"), Role::Hr);
        assert_eq!(classify("ann@acme.com", "she said it was fine"), Role::General);
        assert_eq!(classify("ann@acme.com", "Engineering lead"), Role::Tech);
    }

    #[test]
    fn test_address_in_context_is_not_a_signal() {
        assert_eq!(
            classify(
                "marc@salesforce.com",
                "Our founder Marc can be reached at marc@salesforce.com today"
            ),
            Role::Executive
        );
        assert_eq!(
            classify("jane@techcorp.com", "Write to jane@techcorp.com with any question"),
            Role::General
        );
        assert_eq!(
            classify("anna@careerbuilder.com", "Reach anna@careerbuilder.com anytime"),
            Role::General
        );
        assert_eq!(
            classify("anna@careerbuilder.com", "anna [at] careerbuilder [dot] com"),
            Role::General
        );
        assert_eq!(classify("bob@salesforce.com", "bob@salesforce.com"), Role::General);
    }

    #[test]
    fn test_local_part_beats_context() {
        assert_eq!(classify("ceo@acme.com", "Contact our office"), Role::Executive);
    }
}
