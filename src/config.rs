//! Defines the configuration settings for the contact-miner application.
//!
//! Settings are layered: built-in defaults, then a TOML file, then command
//! line arguments (each of which also reads a `CONTACT_MINER_*` environment
//! variable), then validation.

use crate::scorer::ScoringWeights;
use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Command line overrides shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct ConfigOverrides {
    /// Path to configuration file (TOML format)
    #[arg(long, global = true, env = "CONTACT_MINER_CONFIG")]
    pub config_file: Option<String>,

    /// Maximum number of pages fetched per mining job
    #[arg(long, global = true, env = "CONTACT_MINER_PAGE_BUDGET")]
    pub page_budget: Option<usize>,

    /// Maximum link depth from the homepage
    #[arg(long, global = true, env = "CONTACT_MINER_MAX_DEPTH")]
    pub max_depth: Option<usize>,

    /// Number of pages fetched concurrently within one job
    #[arg(long, global = true, env = "CONTACT_MINER_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Per-page HTTP timeout in seconds
    #[arg(long, global = true, env = "CONTACT_MINER_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Overall job timeout in seconds
    #[arg(long, global = true, env = "CONTACT_MINER_OVERALL_TIMEOUT")]
    pub overall_timeout: Option<u64>,

    /// Minimum sleep before each fetch (seconds)
    #[arg(long, global = true, env = "CONTACT_MINER_MIN_SLEEP")]
    pub min_sleep: Option<f32>,

    /// Maximum sleep before each fetch (seconds)
    #[arg(long, global = true, env = "CONTACT_MINER_MAX_SLEEP")]
    pub max_sleep: Option<f32>,

    /// Comma-separated list of well-known paths seeded into every crawl
    #[arg(long, global = true, env = "CONTACT_MINER_WELL_KNOWN_PATHS")]
    pub well_known_paths: Option<String>,

    /// User agent string for HTTP requests
    #[arg(long, global = true, env = "CONTACT_MINER_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Comma-separated list of DNS servers
    #[arg(long, global = true, env = "CONTACT_MINER_DNS_SERVERS")]
    pub dns_servers: Option<String>,

    /// Skip the mail exchanger lookup for the root domain
    #[arg(long, global = true, env = "CONTACT_MINER_NO_MX_CHECK")]
    pub no_mx_check: bool,

    /// Skip sitemap.xml discovery
    #[arg(long, global = true, env = "CONTACT_MINER_NO_SITEMAP")]
    pub no_sitemap: bool,

    /// Add common role addresses (careers@, hr@, ...) as low-confidence guesses
    #[arg(long, global = true, env = "CONTACT_MINER_GUESS_ROLE_ADDRESSES")]
    pub guess_role_addresses: bool,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    crawl: Option<CrawlSection>,
    network: Option<NetworkSection>,
    dns: Option<DnsSection>,
    extraction: Option<ExtractionSection>,
    scoring: Option<ScoringWeights>,
    server: Option<ServerSection>,
}

#[derive(Deserialize, Debug, Default)]
struct CrawlSection {
    page_budget: Option<usize>,
    max_depth: Option<usize>,
    concurrency: Option<usize>,
    overall_timeout: Option<u64>,
    well_known_paths: Option<Vec<String>>,
    discover_sitemap: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct NetworkSection {
    request_timeout: Option<u64>,
    connect_timeout: Option<u64>,
    max_redirects: Option<usize>,
    max_response_bytes: Option<usize>,
    min_sleep: Option<f32>,
    max_sleep: Option<f32>,
    user_agent: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct DnsSection {
    check_mx: Option<bool>,
    dns_timeout: Option<u64>,
    dns_servers: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct ExtractionSection {
    context_radius: Option<usize>,
    guess_role_addresses: Option<bool>,
    guess_prefixes: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct ServerSection {
    max_concurrent_jobs: Option<usize>,
    batch_concurrency: Option<usize>,
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Maximum number of pages fetched per job.
    pub page_budget: usize,
    /// Maximum link depth; the homepage is depth 0.
    pub max_depth: usize,
    /// Concurrent page fetches within one job.
    pub concurrency: usize,
    /// Timeout for each page request.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Hard limit for a whole mining job.
    pub overall_timeout: Duration,
    /// Redirect hops followed per request.
    pub max_redirects: usize,
    /// Response bodies are truncated beyond this size.
    pub max_response_bytes: usize,
    /// Minimum and maximum sleep duration before each fetch (seconds).
    pub sleep_between_requests: (f32, f32),
    /// User agent string to use for HTTP requests.
    pub user_agent: String,
    /// Paths seeded into every crawl next to the homepage.
    pub well_known_paths: Vec<String>,
    /// Whether `/sitemap.xml` is consulted for contact-like pages.
    pub discover_sitemap: bool,
    /// Characters of text captured on each side of an email match.
    pub context_radius: usize,
    /// Whether the root domain's mail exchanger is looked up.
    pub check_mx: bool,
    /// DNS servers to use for resolution.
    pub dns_servers: Vec<String>,
    /// Timeout for DNS resolution queries.
    pub dns_timeout: Duration,
    /// Whether common role addresses are added as low-confidence guesses.
    pub guess_role_addresses: bool,
    /// Local parts used for guessed role addresses.
    pub guess_prefixes: Vec<String>,
    /// Tunable weights of the confidence scorer.
    pub scoring: ScoringWeights,
    /// Mining jobs run at the same time by the API server.
    pub max_concurrent_jobs: usize,
    /// Records mined at the same time in batch mode.
    pub batch_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        let well_known_paths = vec![
            "/contact",
            "/contact-us",
            "/about",
            "/about-us",
            "/team",
            "/careers",
            "/jobs",
        ];

        let guess_prefixes = vec!["careers", "jobs", "hr", "hello", "contact"];

        Config {
            page_budget: 15,
            max_depth: 2,
            concurrency: 5,
            request_timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(5),
            overall_timeout: Duration::from_secs(40),
            max_redirects: 5,
            max_response_bytes: 2 * 1024 * 1024,
            sleep_between_requests: (0.0, 0.25),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            well_known_paths: well_known_paths.iter().map(|s| s.to_string()).collect(),
            discover_sitemap: true,
            context_radius: 60,
            check_mx: true,
            dns_servers: vec![
                "8.8.8.8".to_string(),
                "8.8.4.4".to_string(),
                "1.1.1.1".to_string(),
                "1.0.0.1".to_string(),
            ],
            dns_timeout: Duration::from_secs(5),
            guess_role_addresses: false,
            guess_prefixes: guess_prefixes.iter().map(|s| s.to_string()).collect(),
            scoring: ScoringWeights::default(),
            max_concurrent_jobs: 4,
            batch_concurrency: 3,
        }
    }
}

impl Config {
    /// Builds the effective configuration from defaults, a TOML file and overrides.
    pub(crate) fn load(overrides: &ConfigOverrides) -> anyhow::Result<Config> {
        let mut config = Config::default();

        if let Some(ref file_path) = overrides.config_file {
            let file_config = load_config_file(file_path)?;
            apply_file_config(&mut config, &file_config);
        } else {
            for path in ["./contact-miner.toml", "./config.toml"] {
                if Path::new(path).exists() {
                    match load_config_file(path) {
                        Ok(file_config) => {
                            apply_file_config(&mut config, &file_config);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to load configuration from {}: {}", path, e);
                        }
                    }
                }
            }
        }

        apply_overrides(&mut config, overrides);
        validate_config(&mut config);

        tracing::debug!("Final configuration: {:?}", config);
        Ok(config)
    }
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config = parse_config_file(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn parse_config_file(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(crawl) = &file_config.crawl {
        if let Some(budget) = crawl.page_budget {
            config.page_budget = budget;
        }
        if let Some(depth) = crawl.max_depth {
            config.max_depth = depth;
        }
        if let Some(concurrency) = crawl.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = crawl.overall_timeout {
            config.overall_timeout = Duration::from_secs(timeout);
        }
        if let Some(paths) = &crawl.well_known_paths {
            config.well_known_paths = paths.clone();
        }
        if let Some(sitemap) = crawl.discover_sitemap {
            config.discover_sitemap = sitemap;
        }
    }

    if let Some(network) = &file_config.network {
        if let Some(timeout) = network.request_timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(timeout) = network.connect_timeout {
            config.connect_timeout = Duration::from_secs(timeout);
        }
        if let Some(redirects) = network.max_redirects {
            config.max_redirects = redirects;
        }
        if let Some(bytes) = network.max_response_bytes {
            config.max_response_bytes = bytes;
        }
        if let Some(min_sleep) = network.min_sleep {
            config.sleep_between_requests.0 = min_sleep;
        }
        if let Some(max_sleep) = network.max_sleep {
            config.sleep_between_requests.1 = max_sleep;
        }
        if let Some(user_agent) = &network.user_agent {
            config.user_agent = user_agent.clone();
        }
    }

    if let Some(dns) = &file_config.dns {
        if let Some(check) = dns.check_mx {
            config.check_mx = check;
        }
        if let Some(timeout) = dns.dns_timeout {
            config.dns_timeout = Duration::from_secs(timeout);
        }
        if let Some(servers) = &dns.dns_servers {
            config.dns_servers = servers.clone();
        }
    }

    if let Some(extraction) = &file_config.extraction {
        if let Some(radius) = extraction.context_radius {
            config.context_radius = radius;
        }
        if let Some(guess) = extraction.guess_role_addresses {
            config.guess_role_addresses = guess;
        }
        if let Some(prefixes) = &extraction.guess_prefixes {
            config.guess_prefixes = prefixes.clone();
        }
    }

    if let Some(scoring) = &file_config.scoring {
        config.scoring = scoring.clone();
    }

    if let Some(server) = &file_config.server {
        if let Some(jobs) = server.max_concurrent_jobs {
            config.max_concurrent_jobs = jobs;
        }
        if let Some(batch) = server.batch_concurrency {
            config.batch_concurrency = batch;
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Apply command line arguments to the Config instance
fn apply_overrides(config: &mut Config, args: &ConfigOverrides) {
    if let Some(budget) = args.page_budget {
        config.page_budget = budget;
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(timeout) = args.overall_timeout {
        config.overall_timeout = Duration::from_secs(timeout);
    }
    if let Some(min_sleep) = args.min_sleep {
        config.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = args.max_sleep {
        config.sleep_between_requests.1 = max_sleep;
    }
    if let Some(ref paths) = args.well_known_paths {
        config.well_known_paths = split_list(paths);
    }
    if let Some(ref agent) = args.user_agent {
        config.user_agent = agent.clone();
    }
    if let Some(ref servers) = args.dns_servers {
        config.dns_servers = split_list(servers);
    }
    if args.no_mx_check {
        config.check_mx = false;
    }
    if args.no_sitemap {
        config.discover_sitemap = false;
    }
    if args.guess_role_addresses {
        config.guess_role_addresses = true;
    }
}

fn validate_config(config: &mut Config) {
    if config.page_budget == 0 {
        config.page_budget = 1;
        tracing::warn!("Page budget was set to 0. Setting to 1.");
    }

    if config.concurrency == 0 {
        config.concurrency = 1;
        tracing::warn!("Concurrency was set to 0. Setting to 1.");
    }

    if config.max_concurrent_jobs == 0 {
        config.max_concurrent_jobs = 1;
        tracing::warn!("Max concurrent jobs was set to 0. Setting to 1.");
    }

    if config.batch_concurrency == 0 {
        config.batch_concurrency = 1;
        tracing::warn!("Batch concurrency was set to 0. Setting to 1.");
    }

    if config.sleep_between_requests.0 < 0.0 {
        config.sleep_between_requests.0 = 0.0;
        tracing::warn!("Min sleep was negative. Setting to 0.");
    }

    if config.sleep_between_requests.0 > config.sleep_between_requests.1 {
        config.sleep_between_requests.1 = config.sleep_between_requests.0;
        tracing::warn!(
            "Min sleep was greater than max sleep. Setting both to {}",
            config.sleep_between_requests.0
        );
    }

    if config.overall_timeout < config.request_timeout {
        config.overall_timeout = config.request_timeout;
        tracing::warn!(
            "Overall timeout was shorter than the per-page timeout. Setting to {:?}",
            config.request_timeout
        );
    }

    if config.max_response_bytes < 1024 {
        config.max_response_bytes = 1024;
        tracing::warn!("Max response size was below 1 KiB. Setting to 1 KiB.");
    }

    for path in config.well_known_paths.iter_mut() {
        if !path.starts_with('/') {
            *path = format!("/{}", path);
        }
    }

    if config.dns_servers.is_empty() {
        config.dns_servers = vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()];
        tracing::warn!("DNS servers list was empty. Setting to default public DNS servers.");
    }
}

/// Random politeness delay drawn from `sleep_between_requests`.
pub(crate) fn get_random_sleep_duration(config: &Config) -> Duration {
    use rand::Rng;
    let (min, max) = config.sleep_between_requests;
    if min >= max {
        return Duration::from_secs_f32(min.max(0.0));
    }
    let duration_secs = rand::thread_rng().gen_range(min..max);
    Duration::from_secs_f32(duration_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_overrides_defaults() {
        let file = parse_config_file(
            r#"
            [crawl]
            page_budget = 30
            max_depth = 3
            well_known_paths = ["/kontakt", "impressum"]

            [network]
            request_timeout = 12
            user_agent = "TestAgent/1.0"

            [scoring]
            base_mailto = 70
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        apply_file_config(&mut config, &file);
        validate_config(&mut config);

        assert_eq!(config.page_budget, 30);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.well_known_paths, vec!["/kontakt", "/impressum"]);
        assert_eq!(config.scoring.base_mailto, 70);
        // Untouched weights keep their defaults.
        assert_eq!(
            config.scoring.same_domain_bonus,
            ScoringWeights::default().same_domain_bonus
        );
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = parse_config_file("[crawl]\npage_budget = 30\n").unwrap();
        let overrides = ConfigOverrides {
            page_budget: Some(5),
            well_known_paths: Some("/a, /b,,".to_string()),
            no_mx_check: true,
            ..Default::default()
        };

        let mut config = Config::default();
        apply_file_config(&mut config, &file);
        apply_overrides(&mut config, &overrides);

        assert_eq!(config.page_budget, 5);
        assert_eq!(config.well_known_paths, vec!["/a", "/b"]);
        assert!(!config.check_mx);
    }

    #[test]
    fn test_validation_clamps_values() {
        let mut config = Config {
            page_budget: 0,
            concurrency: 0,
            sleep_between_requests: (1.0, 0.5),
            request_timeout: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(2),
            dns_servers: vec![],
            ..Config::default()
        };
        validate_config(&mut config);

        assert_eq!(config.page_budget, 1);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.sleep_between_requests, (1.0, 1.0));
        assert_eq!(config.overall_timeout, Duration::from_secs(10));
        assert!(!config.dns_servers.is_empty());
    }

    #[test]
    fn test_random_sleep_within_bounds() {
        let config = Config {
            sleep_between_requests: (0.1, 0.2),
            ..Config::default()
        };
        for _ in 0..20 {
            let d = get_random_sleep_duration(&config);
            assert!(d >= Duration::from_secs_f32(0.1) && d < Duration::from_secs_f32(0.2));
        }
    }
}
