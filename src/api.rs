//! API server for contact-miner.

use crate::error::AppError;
use crate::miner::ContactMiner;
use crate::models::{CompanyRecord, MiningReport, ProcessingResult};
use crate::processor::process_record;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Semaphore;
use warp::{Filter, Rejection, Reply, http::StatusCode};

const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Mining API request structure
#[derive(Deserialize)]
struct MineRequest {
    #[serde(default)]
    input: Option<String>,
}

/// Successful mining response: the report fields plus `success`.
#[derive(Serialize)]
struct MineResponse {
    success: bool,
    #[serde(flatten)]
    report: MiningReport,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    message: String,
}

/// Batch API request structure
#[derive(Deserialize)]
struct BatchRequest {
    companies: Vec<CompanyRecord>,
}

/// Batch API response structure
#[derive(Serialize)]
struct BatchResponse {
    success: bool,
    message: String,
    results: Vec<ProcessingResult>,
}

/// Custom error type for API rejections
#[derive(Debug)]
struct ApiError;

impl warp::reject::Reject for ApiError {}

fn error_reply(status: StatusCode, error: impl Into<String>) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            success: false,
            error: error.into(),
        }),
        status,
    )
}

/// Maps a job failure onto the HTTP status returned to the caller.
fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::UnreachableRoot { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// All API routes, with rejections rendered as JSON.
pub(crate) fn routes(
    miner: Arc<ContactMiner>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let semaphore = Arc::new(Semaphore::new(miner.config().max_concurrent_jobs.max(1)));
    let miner_filter = warp::any().map(move || miner.clone());
    let semaphore_filter = warp::any().map(move || semaphore.clone());

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&HealthResponse {
                success: true,
                message: "contact-miner API is running".to_string(),
            })
        });

    let mine = warp::path("mine")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(miner_filter.clone())
        .and(semaphore_filter.clone())
        .and_then(handle_mine);

    let batch = warp::path("batch")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(miner_filter)
        .and(semaphore_filter)
        .and_then(handle_batch);

    health
        .or(mine)
        .or(batch)
        .with(warp::cors().allow_any_origin().allow_methods(vec!["GET", "POST"]))
        .recover(handle_rejection)
}

/// Start the API server
pub(crate) async fn start_api_server(miner: Arc<ContactMiner>, port: u16) {
    tracing::info!(target: "api", "Starting API server on port {}", port);
    warp::serve(routes(miner)).run(([0, 0, 0, 0], port)).await;
}

/// Handle a single mining request
async fn handle_mine(
    request: MineRequest,
    miner: Arc<ContactMiner>,
    semaphore: Arc<Semaphore>,
) -> Result<warp::reply::Response, Rejection> {
    let input = match request.input.as_deref().map(str::trim) {
        Some(input) if !input.is_empty() => input.to_string(),
        _ => {
            tracing::debug!(target: "api", "Rejecting mine request without input");
            return Ok(error_reply(StatusCode::BAD_REQUEST, "Missing 'input'").into_response());
        }
    };

    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| warp::reject::custom(ApiError))?;

    tracing::info!(target: "api", "Processing mine request for '{}'", input);
    match miner.mine(&input).await {
        Ok(report) => Ok(warp::reply::json(&MineResponse {
            success: true,
            report,
        })
        .into_response()),
        Err(e) => {
            let status = status_for(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!(target: "api", "Mining '{}' failed: {}", input, e);
            } else {
                tracing::warn!(target: "api", "Mining '{}' rejected: {}", input, e);
            }
            Ok(error_reply(status, e.to_string()).into_response())
        }
    }
}

/// Handle a batch mining request
async fn handle_batch(
    batch: BatchRequest,
    miner: Arc<ContactMiner>,
    semaphore: Arc<Semaphore>,
) -> Result<impl Reply, Rejection> {
    tracing::info!(target: "api", "Processing batch of {} companies", batch.companies.len());
    let concurrency = miner.config().batch_concurrency.max(1);

    let results: Vec<Option<ProcessingResult>> = stream::iter(batch.companies)
        .map(|record| {
            let miner = miner.clone();
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(process_record(miner, record).await)
            }
        })
        .buffered(concurrency)
        .collect()
        .await;

    let results: Vec<ProcessingResult> = results
        .into_iter()
        .collect::<Option<_>>()
        .ok_or_else(|| warp::reject::custom(ApiError))?;

    Ok(warp::reply::json(&BatchResponse {
        success: true,
        message: format!("Processed {} companies", results.len()),
        results,
    }))
}

/// Handle API rejections
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let reply = if err.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "Not Found")
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        error_reply(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<ApiError>().is_some() {
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    } else {
        tracing::debug!(target: "api", "Unhandled rejection: {:?}", err);
        error_reply(StatusCode::BAD_REQUEST, "Bad request")
    };
    Ok(reply)
}
