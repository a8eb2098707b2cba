//! HTTP fetching for crawl targets.

use crate::config::Config;
use crate::domain::{host_of, registrable_domain, url_in_domain};
use crate::error::{AppError, FetchError, Result};
use futures::StreamExt;
use reqwest::{Client, redirect::Policy};
use std::time::Duration;
use url::Url;

/// Per-job limits applied to every request.
#[derive(Debug, Clone)]
pub(crate) struct FetchLimits {
    pub timeout: Duration,
    pub max_response_bytes: usize,
    /// Redirects landing outside this domain fail the page.
    pub root_domain: String,
    /// Accept XML and plain text bodies (sitemaps).
    pub accept_xml: bool,
}

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub(crate) struct FetchedPage {
    pub status_code: u16,
    /// URL after redirects.
    pub final_url: Url,
    pub body: String,
    /// True if the body was cut at `max_response_bytes`.
    pub truncated: bool,
    pub content_type: Option<String>,
}

/// Builds the shared HTTP client.
pub(crate) fn build_http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .redirect(redirect_policy(config.max_redirects))
        .build()
        .map_err(|e| {
            tracing::error!(target: "fetch_task", "Failed to build HTTP client: {}", e);
            AppError::Request(e)
        })
}

/// Follows at most `max_redirects` hops, and stops before any hop that
/// leaves the registrable domain of the original request.
fn redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error("too many redirects");
        }
        let off_domain = attempt
            .previous()
            .first()
            .and_then(host_of)
            .map(|host| !url_in_domain(attempt.url(), &registrable_domain(&host)))
            .unwrap_or(false);
        if off_domain {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

fn classify_request_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

fn content_type_allowed(content_type: &str, accept_xml: bool) -> bool {
    let ct = content_type.to_lowercase();
    if ct.contains("html") {
        return true;
    }
    accept_xml && (ct.contains("xml") || ct.starts_with("text/plain"))
}

/// Fetches one URL, enforcing the timeout, redirect, domain and size limits.
///
/// # Returns
/// * `Ok(FetchedPage)` for a 2xx response with an acceptable content type.
/// * `Err(FetchError)` otherwise; the caller decides whether the failure matters.
pub(crate) async fn fetch_page(
    client: &Client,
    url: &Url,
    limits: &FetchLimits,
) -> std::result::Result<FetchedPage, FetchError> {
    tracing::debug!(target: "fetch_task", "Attempting to GET: {}", url);

    let response = client
        .get(url.clone())
        .timeout(limits.timeout)
        .send()
        .await
        .map_err(|e| {
            let err = classify_request_error(&e);
            tracing::debug!(target: "fetch_task", "GET {} failed: {} ({})", url, err, e);
            err
        })?;

    let status = response.status();
    let final_url = response.url().clone();
    tracing::debug!(target: "fetch_task", "GET {} status: {}", url, status);

    if &final_url != url && !url_in_domain(&final_url, &limits.root_domain) {
        tracing::debug!(target: "fetch_task", "{} redirected off-domain to {}", url, final_url);
        return Err(FetchError::OffDomainRedirect(final_url.to_string()));
    }

    // The redirect policy hands back the 3xx itself when the next hop is off-domain.
    if status.is_redirection() {
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|val| val.to_str().ok())
            .and_then(|loc| final_url.join(loc).ok());
        if let Some(location) = location {
            if !url_in_domain(&location, &limits.root_domain) {
                tracing::debug!(target: "fetch_task", "{} redirects off-domain to {}", url, location);
                return Err(FetchError::OffDomainRedirect(location.to_string()));
            }
        }
    }

    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|val| val.to_str().ok())
        .map(|s| s.to_string());

    if let Some(ct) = &content_type {
        if !content_type_allowed(ct, limits.accept_xml) {
            tracing::debug!(target: "fetch_task", "Skipping non-HTML content at {} ({})", url, ct);
            return Err(FetchError::NotHtml(ct.clone()));
        }
    }

    let mut body: Vec<u8> = Vec::new();
    let mut truncated = false;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;
        let remaining = limits.max_response_bytes.saturating_sub(body.len());
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            truncated = chunk.len() > remaining || stream.next().await.is_some();
            break;
        }
        body.extend_from_slice(&chunk);
    }

    if truncated {
        tracing::debug!(target: "fetch_task",
            "Truncated body of {} at {} bytes", url, limits.max_response_bytes
        );
    }

    Ok(FetchedPage {
        status_code: status.as_u16(),
        final_url,
        body: String::from_utf8_lossy(&body).into_owned(),
        truncated,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn limits(server: &MockServer, max_bytes: usize) -> FetchLimits {
        let url = Url::parse(&server.uri()).unwrap();
        FetchLimits {
            timeout: Duration::from_secs(5),
            max_response_bytes: max_bytes,
            root_domain: url.host_str().unwrap().to_string(),
            accept_xml: false,
        }
    }

    fn client() -> Client {
        build_http_client(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>hi</p>", "text/html"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/contact", server.uri())).unwrap();
        let page = fetch_page(&client(), &url, &limits(&server, 1024))
            .await
            .unwrap();
        assert_eq!(page.status_code, 200);
        assert_eq!(page.body, "<p>hi</p>");
        assert!(!page.truncated);
    }

    #[tokio::test]
    async fn test_fetch_status_and_content_type_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/brochure"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF", "application/pdf"))
            .mount(&server)
            .await;

        let client = client();
        let limits = limits(&server, 1024);

        let missing = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        assert_eq!(
            fetch_page(&client, &missing, &limits).await.unwrap_err(),
            FetchError::Status(404)
        );

        let pdf = Url::parse(&format!("{}/brochure", server.uri())).unwrap();
        assert!(matches!(
            fetch_page(&client, &pdf, &limits).await,
            Err(FetchError::NotHtml(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_truncates_large_bodies() {
        let server = MockServer::start().await;
        let big = "a".repeat(5000);
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(big.as_str(), "text/html"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let page = fetch_page(&client(), &url, &limits(&server, 1024))
            .await
            .unwrap();
        assert_eq!(page.body.len(), 1024);
        assert!(page.truncated);
    }

    #[tokio::test]
    async fn test_off_domain_redirect_fails_page() {
        let server = MockServer::start().await;
        let port = Url::parse(&server.uri()).unwrap().port().unwrap();
        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("http://localhost:{}/landing", port).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/landing"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>x</p>", "text/html"))
            .expect(0)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/moved", server.uri())).unwrap();
        assert!(matches!(
            fetch_page(&client(), &url, &limits(&server, 1024)).await,
            Err(FetchError::OffDomainRedirect(_))
        ));
    }

    #[tokio::test]
    async fn test_same_domain_redirect_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old-contact"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/contact", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>hi</p>", "text/html"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/old-contact", server.uri())).unwrap();
        let page = fetch_page(&client(), &url, &limits(&server, 1024)).await.unwrap();
        assert_eq!(page.final_url.path(), "/contact");
        assert_eq!(page.body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let limits = FetchLimits {
            timeout: Duration::from_secs(5),
            max_response_bytes: 1024,
            root_domain: "127.0.0.1".to_string(),
            accept_xml: false,
        };
        let err = fetch_page(&client(), &url, &limits).await.unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {:?}", err);
    }
}
