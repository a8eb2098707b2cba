//! Defines the custom error types for the contact-miner application.

use thiserror::Error;

/// The primary error type for a mining job.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error building the HTTP client.
    #[error("HTTP Client Error: {0}")]
    Request(#[from] reqwest::Error),

    /// The seed input is not a usable domain or URL. The job never starts.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The seed page itself could not be reached (DNS failure, refused connection).
    #[error("Could not reach {url}: {reason}")]
    UnreachableRoot {
        /// The seed URL that was attempted.
        url: String,
        /// Transport-level failure description.
        reason: String,
    },

    /// A fetched page could not be parsed as HTML at all.
    #[error("HTML Parsing Error for {url}: {message}")]
    Parse { url: String, message: String },

    /// Error during DNS resolution.
    #[error("DNS Resolution Error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// Specific DNS error indicating the domain does not exist.
    #[error("Domain Not Found (NXDOMAIN): {0}")]
    NxDomain(String),

    /// Specific DNS error indicating no relevant records were found.
    #[error("No DNS Records Found (MX/A): {0}")]
    NoDnsRecords(String),

    /// DNS operation timed out.
    #[error("DNS Timeout for domain: {0}")]
    DnsTimeout(String),

    /// Error related to concurrency or task execution.
    #[error("Task Execution Error: {0}")]
    Task(String),
}

/// Per-page fetch failures. None of these abort a job on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum FetchError {
    #[error("request timed out")]
    Timeout,

    /// DNS lookup or TCP/TLS connection failure.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("unsupported content type '{0}'")]
    NotHtml(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("redirected off the root domain to {0}")]
    OffDomainRedirect(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// True when the host could not be reached at all.
    pub(crate) fn is_unreachable(&self) -> bool {
        matches!(self, FetchError::Connect(_))
    }
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;
