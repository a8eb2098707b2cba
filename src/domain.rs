//! Utility functions for handling domain names and URLs.

use crate::error::{AppError, Result};
use std::net::IpAddr;
use url::Url;

/// Public second-level suffixes under which the registrable domain has three labels.
const MULTI_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "ltd.uk", "plc.uk", "com.au", "net.au",
    "org.au", "edu.au", "gov.au", "co.nz", "org.nz", "co.jp", "ne.jp", "or.jp", "co.kr",
    "co.in", "net.in", "org.in", "com.br", "com.cn", "net.cn", "org.cn", "com.hk", "com.sg",
    "com.mx", "com.ar", "com.tr", "com.tw", "co.za", "co.il", "com.my", "com.ph", "com.vn",
    "com.pk", "com.ng", "co.id",
];

/// File extensions that are never fetched as pages.
const STATIC_ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "avif", "pdf",
    "zip", "rar", "gz", "tgz", "tar", "7z", "bz2", "mp3", "wav", "ogg", "mp4", "m4v", "avi",
    "mov", "wmv", "webm", "mkv", "css", "js", "mjs", "json", "xml", "rss", "atom", "woff",
    "woff2", "ttf", "eot", "otf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "exe",
    "dmg", "apk", "msi", "iso", "bin",
];

/// Path keywords of pages likely to list contact details.
pub(crate) const CONTACT_PAGE_KEYWORDS: &[&str] = &[
    "contact", "about", "team", "people", "staff", "career", "job", "impressum", "legal",
    "privacy", "press",
];

/// Consumer mailbox providers.
const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com", "googlemail.com", "yahoo.com", "yahoo.co.uk", "ymail.com", "hotmail.com",
    "hotmail.co.uk", "outlook.com", "live.com", "msn.com", "aol.com", "icloud.com", "me.com",
    "mac.com", "gmx.com", "gmx.de", "gmx.net", "web.de", "mail.com", "protonmail.com",
    "proton.me", "pm.me", "zoho.com", "yandex.com", "yandex.ru", "mail.ru", "qq.com",
    "163.com", "126.com", "fastmail.com", "tutanota.com", "hey.com",
];

fn with_scheme(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    }
}

/// Parses the raw seed input into a crawlable URL, adding `https://` if no scheme is present.
///
/// # Returns
/// * `Err(AppError::InvalidInput)` if the input is empty, unparsable, not HTTP(S) or has no host.
pub(crate) fn normalize_url(website_url_str: &str) -> Result<Url> {
    let trimmed = website_url_str.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(
            "Input (domain/url) is required".to_string(),
        ));
    }

    let candidate = with_scheme(trimmed);
    let mut url = Url::parse(&candidate).map_err(|e| {
        tracing::debug!("Failed to parse seed '{}' ({}): {}", trimmed, candidate, e);
        AppError::InvalidInput(format!("'{}' is not a valid domain or URL: {}", trimmed, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::InvalidInput(format!(
            "Unsupported URL scheme '{}'",
            url.scheme()
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => {
            return Err(AppError::InvalidInput(format!(
                "'{}' has no host name",
                trimmed
            )));
        }
    }

    url.set_fragment(None);
    Ok(url)
}

/// Lowercase host of a URL with any leading `www.` removed.
pub(crate) fn host_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Reduces a host name to its registrable domain.
///
/// IP addresses and single-label hosts are returned unchanged.
pub(crate) fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let last_two = labels[labels.len() - 2..].join(".");
    if MULTI_PART_SUFFIXES.contains(&last_two.as_str()) {
        labels[labels.len() - 3..].join(".")
    } else {
        last_two
    }
}

/// Extracts the registrable root domain (e.g., "example.com") from a domain or URL string.
/// Handles missing schemes, "www." prefixes, subdomains and ports.
pub(crate) fn get_domain_from_url(website_url_str: &str) -> Result<String> {
    let url = normalize_url(website_url_str)?;
    let host = host_of(&url).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Could not extract host from '{}'",
            website_url_str
        ))
    })?;
    let domain = registrable_domain(&host);
    tracing::debug!("Extracted root domain '{}' from '{}'", domain, website_url_str);
    Ok(domain)
}

/// True if `host` is the root domain or one of its subdomains.
pub(crate) fn is_same_domain(host: &str, root_domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_lowercase();
    host == root_domain || host.ends_with(&format!(".{}", root_domain))
}

/// True if the email domain belongs to a consumer mailbox provider.
pub(crate) fn is_free_mail_domain(domain: &str) -> bool {
    FREE_MAIL_DOMAINS.contains(&domain.to_lowercase().as_str())
}

/// True if the URL's host is within the root domain.
pub(crate) fn url_in_domain(url: &Url, root_domain: &str) -> bool {
    url.host_str()
        .map(|host| is_same_domain(host, root_domain))
        .unwrap_or(false)
}

/// Visited-set key: host without `www.`, explicit port, path without trailing
/// slash. Scheme, query and fragment are ignored.
pub(crate) fn visit_key(url: &Url) -> String {
    let host = host_of(url).unwrap_or_default();
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };
    format!("{}{}{}", host, port, path)
}

/// True if the URL points at a static asset by file extension.
pub(crate) fn is_static_asset(url: &Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            STATIC_ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// True if the URL path suggests a contact, about, team or careers page.
pub(crate) fn is_contact_like_path(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    CONTACT_PAGE_KEYWORDS.iter().any(|kw| path.contains(kw))
}
