//! Breadth-first crawl frontier with its admission policy.
//!
//! The frontier is owned by the orchestrator task alone, so it needs no locks.

use crate::domain::{is_contact_like_path, is_static_asset, url_in_domain, visit_key};
use crate::models::{CrawlJob, CrawlTarget, PageLink, TargetKind};
use crate::sitemap::SITEMAP_PATHS;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Why a target was or was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Queued,
    AlreadyVisited,
    OffDomain,
    TooDeep,
    StaticAsset,
    UnsupportedScheme,
    BudgetFull,
}

#[derive(Debug)]
pub(crate) struct Frontier {
    queue: VecDeque<CrawlTarget>,
    visited: HashSet<String>,
    root_domain: String,
    page_budget: usize,
    max_depth: usize,
    /// Page targets queued or already handed out.
    scheduled_pages: usize,
}

impl Frontier {
    pub(crate) fn new(job: &CrawlJob) -> Self {
        Frontier {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            root_domain: job.root_domain.clone(),
            page_budget: job.page_budget,
            max_depth: job.max_depth,
            scheduled_pages: 0,
        }
    }

    /// Queues the homepage, the well-known paths and optionally the sitemap.
    pub(crate) fn seed(&mut self, job: &CrawlJob, well_known_paths: &[String], sitemap: bool) {
        self.offer(CrawlTarget {
            url: job.seed_url.clone(),
            depth: 0,
            discovered_from: None,
            kind: TargetKind::Page,
        });

        for path in well_known_paths {
            match job.seed_url.join(path) {
                Ok(url) => {
                    let admission = self.offer(CrawlTarget {
                        url,
                        depth: 1,
                        discovered_from: None,
                        kind: TargetKind::Page,
                    });
                    tracing::trace!(target: "mine_task", "Seed {} -> {:?}", path, admission);
                }
                Err(e) => {
                    tracing::warn!(target: "mine_task",
                        "Failed to join base URL {} with page {}: {}", job.seed_url, path, e
                    );
                }
            }
        }

        if sitemap {
            self.offer_sitemap(&job.seed_url, SITEMAP_PATHS[0]);
        }

        tracing::debug!(target: "mine_task",
            "Seeded frontier with {} targets for {}", self.queue.len(), job.root_domain
        );
    }

    fn offer_sitemap(&mut self, base: &Url, path: &str) -> Admission {
        match base.join(path) {
            Ok(url) => self.offer(CrawlTarget {
                url,
                depth: 0,
                discovered_from: None,
                kind: TargetKind::Sitemap,
            }),
            Err(_) => Admission::UnsupportedScheme,
        }
    }

    /// Queues the sitemap location that follows `tried`, if there is one.
    ///
    /// Called when `tried` failed or listed no contact-like pages.
    pub(crate) fn offer_next_sitemap(&mut self, tried: &Url) -> bool {
        let next = SITEMAP_PATHS
            .iter()
            .position(|p| *p == tried.path())
            .and_then(|i| SITEMAP_PATHS.get(i + 1));
        match next {
            Some(path) => self.offer_sitemap(tried, path) == Admission::Queued,
            None => false,
        }
    }

    /// Applies the admission policy to one target and queues it if allowed.
    pub(crate) fn offer(&mut self, target: CrawlTarget) -> Admission {
        let url = &target.url;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Admission::UnsupportedScheme;
        }
        if !url_in_domain(url, &self.root_domain) {
            return Admission::OffDomain;
        }
        if target.kind == TargetKind::Page && is_static_asset(url) {
            return Admission::StaticAsset;
        }
        if target.depth > self.max_depth {
            return Admission::TooDeep;
        }

        let key = match target.kind {
            TargetKind::Page => visit_key(url),
            TargetKind::Sitemap => format!("sitemap:{}", visit_key(url)),
        };
        if self.visited.contains(&key) {
            return Admission::AlreadyVisited;
        }
        if target.kind == TargetKind::Page {
            if self.budget_reached() {
                return Admission::BudgetFull;
            }
            self.scheduled_pages += 1;
        }

        self.visited.insert(key);
        self.queue.push_back(target);
        Admission::Queued
    }

    /// Offers the same-domain links of a page at `depth`, contact-like paths first.
    ///
    /// # Returns
    /// * Number of links queued.
    pub(crate) fn offer_links(&mut self, parent: &Url, depth: usize, links: &[PageLink]) -> usize {
        let (mut ordered, rest): (Vec<&PageLink>, Vec<&PageLink>) = links
            .iter()
            .filter(|link| link.same_domain)
            .partition(|link| is_contact_like_path(&link.url));
        ordered.extend(rest);

        let mut queued = 0;
        for link in ordered {
            let admission = self.offer(CrawlTarget {
                url: link.url.clone(),
                depth,
                discovered_from: Some(parent.clone()),
                kind: TargetKind::Page,
            });
            match admission {
                Admission::Queued => queued += 1,
                Admission::BudgetFull => break,
                _ => {}
            }
        }
        queued
    }

    pub(crate) fn next(&mut self) -> Option<CrawlTarget> {
        self.queue.pop_front()
    }

    pub(crate) fn budget_reached(&self) -> bool {
        self.scheduled_pages >= self.page_budget
    }

    pub(crate) fn scheduled_pages(&self) -> usize {
        self.scheduled_pages
    }
}
