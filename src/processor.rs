//! Functions for processing company records in batch.

use crate::error::AppError;
use crate::miner::ContactMiner;
use crate::models::{CompanyRecord, ProcessingResult};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::sync::Arc;

fn skipped(record: CompanyRecord, reason: String) -> ProcessingResult {
    ProcessingResult {
        company_input: record,
        contact_mining: None,
        primary_email: None,
        primary_confidence: None,
        mining_skipped: true,
        mining_skip_reason: Some(reason),
        mining_error: None,
    }
}

/// Mines contacts for a single company record.
///
/// # Arguments
/// * `miner` - Shared miner holding the HTTP client, resolver and config.
/// * `record` - The input `CompanyRecord`.
///
/// # Returns
/// * `ProcessingResult` containing the original input and the report, a skip
///   reason, or the job error.
pub(crate) async fn process_record(
    miner: Arc<ContactMiner>,
    record: CompanyRecord,
) -> ProcessingResult {
    let domain_input = record
        .domain
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    let record_id = record
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| domain_input.clone());

    if domain_input.is_empty() {
        tracing::warn!(target: "process_record_task",
            "[{}] Skipping record. Reason: Missing domain", record_id
        );
        return skipped(record, "Missing domain".to_string());
    }

    tracing::info!(target: "process_record_task", "[{}] Starting mining for '{}'", record_id, domain_input);

    match miner.mine(&domain_input).await {
        Ok(report) => {
            let primary = report.contacts.first();
            let primary_email = primary.map(|c| c.email.clone());
            let primary_confidence = primary.map(|c| c.confidence);
            match (&primary_email, primary_confidence) {
                (Some(email), Some(confidence)) => tracing::info!(target: "process_record_task",
                    "[{}] ✓ Primary contact: {} (confidence {}/100, {} total)",
                    record_id, email, confidence, report.contacts.len()
                ),
                _ => tracing::info!(target: "process_record_task",
                    "[{}] ✗ No contacts found across {} pages", record_id, report.stats.pages_crawled
                ),
            }
            ProcessingResult {
                company_input: record,
                contact_mining: Some(report),
                primary_email,
                primary_confidence,
                mining_skipped: false,
                mining_skip_reason: None,
                mining_error: None,
            }
        }
        Err(AppError::InvalidInput(reason)) => {
            tracing::warn!(target: "process_record_task",
                "[{}] Skipping record. Reason: {}", record_id, reason
            );
            skipped(record, format!("Invalid domain input '{}': {}", domain_input, reason))
        }
        Err(e) => {
            tracing::error!(target: "process_record_task", "[{}] Mining failed: {}", record_id, e);
            ProcessingResult {
                company_input: record,
                contact_mining: None,
                primary_email: None,
                primary_confidence: None,
                mining_skipped: false,
                mining_skip_reason: None,
                mining_error: Some(e.to_string()),
            }
        }
    }
}

/// Processes records with at most `concurrency` jobs in flight.
/// Results come back in input order.
pub(crate) async fn process_batch(
    miner: Arc<ContactMiner>,
    records: Vec<CompanyRecord>,
    concurrency: usize,
    progress: Option<ProgressBar>,
) -> Vec<ProcessingResult> {
    let total = records.len();
    let mut indexed: Vec<(usize, ProcessingResult)> = stream::iter(records.into_iter().enumerate())
        .map(|(index, record)| {
            let miner = miner.clone();
            let progress = progress.clone();
            async move {
                let result = process_record(miner, record).await;
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                (index, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    indexed.sort_by_key(|(index, _)| *index);
    tracing::info!(target: "process_record_task", "Processed {} of {} records", indexed.len(), total);
    indexed.into_iter().map(|(_, result)| result).collect()
}
