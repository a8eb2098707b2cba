//! Crawl orchestration: runs one bounded mining job from seed to report.

use crate::aggregator::{CrawlHarvest, aggregate};
use crate::analyzer::{PageAnalysis, analyze};
use crate::config::{Config, get_random_sleep_duration};
use crate::dns::{check_mail_domain, create_resolver};
use crate::domain::{get_domain_from_url, normalize_url};
use crate::error::{AppError, FetchError, Result};
use crate::extractor::{ContactLedger, extract, from_mailto, from_structured};
use crate::fetcher::{FetchLimits, build_http_client, fetch_page};
use crate::frontier::Frontier;
use crate::models::{CrawlJob, CrawlTarget, MiningReport, PageLink, PageResult, TargetKind};
use crate::sitemap::contact_like_locs;
use crate::social::SocialCollector;
use reqwest::Client;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::{Instant as TokioInstant, sleep, sleep_until, timeout_at};
use trust_dns_resolver::TokioAsyncResolver;
use url::Url;

/// Why the crawl loop ended. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    FrontierExhausted,
    BudgetReached,
    OverallTimeout,
}

/// Page metadata that only the orchestrator needs.
#[derive(Debug, Clone, Default)]
struct PageExtras {
    title: Option<String>,
    site_name: Option<String>,
    structured_emails: Vec<String>,
    same_as: Vec<Url>,
}

/// What a worker sends back for one target.
#[derive(Debug)]
struct PageOutcome {
    target: CrawlTarget,
    page: PageResult,
    extras: PageExtras,
}

impl PageOutcome {
    fn failed(target: CrawlTarget, error: FetchError) -> Self {
        let status_code = match error {
            FetchError::Status(code) => Some(code),
            _ => None,
        };
        PageOutcome {
            page: PageResult {
                url: target.url.clone(),
                status_code,
                raw_text: String::new(),
                mailto_targets: Vec::new(),
                outbound_links: Vec::new(),
                fetch_error: Some(error),
            },
            target,
            extras: PageExtras::default(),
        }
    }
}

/// Shared clients and configuration for mining jobs.
#[derive(Clone)]
pub(crate) struct ContactMiner {
    config: Arc<Config>,
    http_client: Client,
    dns_resolver: Option<Arc<TokioAsyncResolver>>,
}

impl ContactMiner {
    /// Creates a miner with a shared HTTP client and, if enabled, a DNS resolver.
    pub(crate) fn new(config: Arc<Config>) -> Result<Self> {
        let http_client = build_http_client(&config)?;
        let dns_resolver = if config.check_mx {
            Some(Arc::new(create_resolver(&config)?))
        } else {
            None
        };
        Ok(Self {
            config,
            http_client,
            dns_resolver,
        })
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Validates the raw input and derives the job parameters.
    pub(crate) fn build_job(&self, input: &str) -> Result<CrawlJob> {
        let seed_url = normalize_url(input)?;
        let root_domain = get_domain_from_url(input)?;
        Ok(CrawlJob {
            seed_input: input.trim().to_string(),
            seed_url,
            root_domain,
            page_budget: self.config.page_budget,
            max_depth: self.config.max_depth,
            per_page_timeout: self.config.request_timeout,
            overall_timeout: self.config.overall_timeout,
        })
    }

    /// Mines contacts for a company domain or homepage URL.
    ///
    /// # Returns
    /// * `Ok(MiningReport)`, possibly empty, once the crawl has stopped.
    /// * `Err(AppError::InvalidInput)` if the input is not a usable domain or URL.
    /// * `Err(AppError::UnreachableRoot)` if the homepage cannot be connected to.
    pub(crate) async fn mine(&self, input: &str) -> Result<MiningReport> {
        let job = self.build_job(input)?;
        self.run_job(job).await
    }

    async fn run_job(&self, job: CrawlJob) -> Result<MiningReport> {
        let start_time = Instant::now();
        let deadline = TokioInstant::now() + job.overall_timeout;
        tracing::info!(target: "mine_task",
            "Starting mining job for '{}' at {} (root domain {}, budget {}, depth {})",
            job.seed_input, job.seed_url, job.root_domain, job.page_budget, job.max_depth
        );

        let mail_check = self.spawn_mail_check(&job.root_domain);

        let mut frontier = Frontier::new(&job);
        frontier.seed(
            &job,
            &self.config.well_known_paths,
            self.config.discover_sitemap,
        );

        let mut ledger = ContactLedger::new();
        let mut social = SocialCollector::new();
        let mut homepage: Option<PageExtras> = None;
        let mut pages_crawled = 0;
        let mut pages_failed = 0;

        let mut in_flight: JoinSet<PageOutcome> = JoinSet::new();
        let mut stop_reason = StopReason::FrontierExhausted;

        loop {
            while in_flight.len() < self.config.concurrency {
                match frontier.next() {
                    Some(target) => self.dispatch(&mut in_flight, target, &job),
                    None => break,
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = sleep_until(deadline) => {
                    tracing::warn!(target: "mine_task",
                        "Overall timeout of {:?} reached for {}; aborting {} in-flight fetches",
                        job.overall_timeout, job.root_domain, in_flight.len()
                    );
                    in_flight.abort_all();
                    stop_reason = StopReason::OverallTimeout;
                    break;
                }
                joined = in_flight.join_next() => {
                    let output = match joined {
                        Some(Ok(output)) => output,
                        Some(Err(e)) => {
                            let err = AppError::Task(e.to_string());
                            tracing::error!(target: "mine_task", "Fetch task failed to complete: {}", err);
                            pages_failed += 1;
                            continue;
                        }
                        None => continue,
                    };

                    if let Some(error) = &output.page.fetch_error {
                        if output.target.kind == TargetKind::Sitemap {
                            tracing::debug!(target: "mine_task",
                                "No sitemap at {}: {}", output.target.url, error
                            );
                            frontier.offer_next_sitemap(&output.target.url);
                            continue;
                        }
                        pages_failed += 1;
                        if is_homepage(&output.target, &job) && error.is_unreachable() {
                            in_flight.abort_all();
                            if let Some(handle) = &mail_check {
                                handle.abort();
                            }
                            tracing::error!(target: "mine_task",
                                "Could not reach {}: {}", job.seed_url, error
                            );
                            return Err(AppError::UnreachableRoot {
                                url: job.seed_url.to_string(),
                                reason: error.to_string(),
                            });
                        }
                        tracing::debug!(target: "mine_task",
                            "Skipping {} (status {:?}): {}", output.page.url, output.page.status_code, error
                        );
                        continue;
                    }

                    match output.target.kind {
                        TargetKind::Sitemap => {
                            if output.page.outbound_links.is_empty() {
                                frontier.offer_next_sitemap(&output.target.url);
                                continue;
                            }
                            let queued = frontier.offer_links(
                                &output.page.url,
                                1,
                                &output.page.outbound_links,
                            );
                            tracing::debug!(target: "mine_task",
                                "Queued {} pages from {}", queued, output.page.url
                            );
                        }
                        TargetKind::Page => {
                            pages_crawled += 1;
                            if is_homepage(&output.target, &job) {
                                homepage = Some(output.extras.clone());
                            }
                            self.harvest_page(&output, &mut ledger, &mut social);
                            tracing::debug!(target: "mine_task",
                                "After {}: {} addresses, {} social links",
                                output.page.url, ledger.len(), social.len()
                            );
                            frontier.offer_links(
                                &output.page.url,
                                output.target.depth + 1,
                                &output.page.outbound_links,
                            );
                        }
                    }
                }
            }
        }

        if ledger.is_empty() {
            tracing::info!(target: "mine_task",
                "No email addresses found for {} across {} pages", job.root_domain, pages_crawled
            );
        }

        if stop_reason == StopReason::FrontierExhausted && frontier.budget_reached() {
            stop_reason = StopReason::BudgetReached;
        }

        let mail_domain_verified = match mail_check {
            Some(handle) => {
                let abort = handle.abort_handle();
                match timeout_at(deadline, handle).await {
                    Ok(Ok(verified)) => verified,
                    Ok(Err(e)) => {
                        tracing::warn!(target: "mine_task", "Mail domain check task failed: {}", e);
                        None
                    }
                    Err(_) => {
                        abort.abort();
                        None
                    }
                }
            }
            None => None,
        };

        let (homepage_title, homepage_site_name) = match homepage {
            Some(extras) => (extras.title, extras.site_name),
            None => (None, None),
        };

        let report = aggregate(
            CrawlHarvest {
                root_domain: job.root_domain.clone(),
                homepage_title,
                homepage_site_name,
                ledger,
                social,
                pages_crawled,
                mail_domain_verified,
            },
            &self.config,
        );

        tracing::info!(target: "mine_task",
            "Mining for {} finished in {:.2?} ({:?}). Scheduled {} pages ({} successful, {} failed). Found {} contacts and {} social links.",
            job.root_domain,
            start_time.elapsed(),
            stop_reason,
            frontier.scheduled_pages(),
            pages_crawled,
            pages_failed,
            report.stats.emails_found,
            report.stats.social_links_found
        );

        Ok(report)
    }

    fn spawn_mail_check(&self, root_domain: &str) -> Option<tokio::task::JoinHandle<Option<bool>>> {
        let resolver = self.dns_resolver.clone()?;
        if root_domain.parse::<IpAddr>().is_ok() || !root_domain.contains('.') {
            tracing::debug!(target: "mine_task", "Skipping mail domain check for {}", root_domain);
            return None;
        }
        let domain = root_domain.to_string();
        let timeout = self.config.dns_timeout;
        Some(tokio::spawn(async move {
            check_mail_domain(&resolver, &domain, timeout).await
        }))
    }

    fn dispatch(&self, in_flight: &mut JoinSet<PageOutcome>, target: CrawlTarget, job: &CrawlJob) {
        let client = self.http_client.clone();
        let limits = FetchLimits {
            timeout: job.per_page_timeout,
            max_response_bytes: self.config.max_response_bytes,
            root_domain: job.root_domain.clone(),
            accept_xml: target.kind == TargetKind::Sitemap,
        };
        let delay = get_random_sleep_duration(&self.config);
        tracing::debug!(target: "mine_task",
            "Dispatching {} (depth {}, {:?})", target.url, target.depth, target.kind
        );
        in_flight.spawn(process_target(client, target, limits, delay));
    }

    fn harvest_page(
        &self,
        output: &PageOutcome,
        ledger: &mut ContactLedger,
        social: &mut SocialCollector,
    ) {
        let page_url = &output.page.url;

        for target in &output.page.mailto_targets {
            if let Some(raw) = from_mailto(target, page_url) {
                ledger.record(raw);
            }
        }
        for email in &output.extras.structured_emails {
            if let Some(raw) = from_structured(email, page_url, "") {
                ledger.record(raw);
            }
        }
        for raw in extract(&output.page.raw_text, page_url, self.config.context_radius) {
            ledger.record(raw);
        }

        for link in output.page.outbound_links.iter().filter(|l| !l.same_domain) {
            social.offer(&link.url);
        }
        for url in &output.extras.same_as {
            social.offer(url);
        }
    }
}

fn is_homepage(target: &CrawlTarget, job: &CrawlJob) -> bool {
    target.kind == TargetKind::Page
        && target.depth == 0
        && target.discovered_from.is_none()
        && target.url == job.seed_url
}

/// Worker body: fetch one target and analyze it. Runs inside the `JoinSet`.
async fn process_target(
    client: Client,
    target: CrawlTarget,
    limits: FetchLimits,
    delay: Duration,
) -> PageOutcome {
    if !delay.is_zero() {
        sleep(delay).await;
    }

    let fetched = match fetch_page(&client, &target.url, &limits).await {
        Ok(fetched) => fetched,
        Err(error) => return PageOutcome::failed(target, error),
    };
    if fetched.truncated {
        tracing::debug!(target: "mine_task",
            "Analyzing truncated body of {} ({})",
            fetched.final_url,
            fetched.content_type.as_deref().unwrap_or("no content type")
        );
    }

    if target.kind == TargetKind::Sitemap {
        let outbound_links = contact_like_locs(&fetched.body, &limits.root_domain)
            .into_iter()
            .map(|url| PageLink {
                url,
                same_domain: true,
            })
            .collect();
        return PageOutcome {
            page: PageResult {
                url: fetched.final_url,
                status_code: Some(fetched.status_code),
                raw_text: String::new(),
                mailto_targets: Vec::new(),
                outbound_links,
                fetch_error: None,
            },
            target,
            extras: PageExtras::default(),
        };
    }

    let analysis = match analyze(&fetched.body, &fetched.final_url, &limits.root_domain) {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!(target: "mine_task", "Treating {} as empty: {}", fetched.final_url, e);
            PageAnalysis::default()
        }
    };

    PageOutcome {
        page: PageResult {
            url: fetched.final_url,
            status_code: Some(fetched.status_code),
            raw_text: analysis.text,
            mailto_targets: analysis.mailto_targets,
            outbound_links: analysis.links,
            fetch_error: None,
        },
        target,
        extras: PageExtras {
            title: analysis.title,
            site_name: analysis.site_name,
            structured_emails: analysis.structured_emails,
            same_as: analysis.same_as,
        },
    }
}
