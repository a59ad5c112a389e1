//! HTTP access: client construction, single fetches, and the HTTP driver
//!
//! All network traffic goes through [`Fetcher`]. Redirects are never
//! followed by the client itself; callers see them as [`FetchOutcome`]
//! values and decide per context how far to follow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use url::Url;

use crate::config::UserAgentConfig;
use crate::crawler::pool::{paced_fetch, Pacer};
use crate::crawler::TransitionDriver;
use crate::extract::PageHandle;
use crate::target::normalize_target;
use crate::{Result, SatchelError};

/// Redirect hops one page navigation will follow
const MAX_REDIRECTS: usize = 5;

/// Result of one HTTP request
#[derive(Debug)]
pub enum FetchOutcome {
    /// A body was delivered
    Page {
        status: u16,
        content_type: String,
        body: String,
    },
    /// A redirect with its raw Location header value
    Redirect { location: String },
    /// HTTP 429
    RateLimited,
    /// Any other non-success status
    HttpError { status: u16 },
}

/// Builds the HTTP client all fetches share
///
/// The client keeps cookies, because the crawled site hands out a session
/// cookie at sign-in and every page after that requires it.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout_ms` - Per-request timeout in milliseconds
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout_ms: u64,
) -> std::result::Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.name, config.version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Redirects are handled by the caller
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Thin wrapper around the shared client
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs one GET without following redirects
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome)` - The server answered; inspect the outcome
    /// * `Err(SatchelError::Fetch)` - The request itself failed
    pub async fn fetch(&self, target: &str) -> Result<FetchOutcome> {
        debug!("GET {}", target);
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| classify_error(target, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(FetchOutcome::RateLimited);
        }
        if status.is_redirection() {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return match location {
                Some(location) => Ok(FetchOutcome::Redirect { location }),
                None => Ok(FetchOutcome::HttpError {
                    status: status.as_u16(),
                }),
            };
        }
        if !status.is_success() {
            return Ok(FetchOutcome::HttpError {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.map_err(|e| classify_error(target, e))?;

        Ok(FetchOutcome::Page {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn classify_error(target: &str, e: reqwest::Error) -> SatchelError {
    let message = if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        "Connection failed".to_string()
    } else {
        e.to_string()
    };
    SatchelError::Fetch {
        target: target.to_string(),
        message,
    }
}

/// Loads one page, following redirects up to [`MAX_REDIRECTS`] hops
///
/// The returned handle carries the final address after redirects, which is
/// what relative links on the page must resolve against.
pub(crate) async fn load_page(
    fetcher: &Fetcher,
    pacer: &Mutex<Pacer>,
    target: &str,
) -> Result<PageHandle> {
    let mut current = target.to_string();

    for _ in 0..MAX_REDIRECTS {
        match paced_fetch(fetcher, pacer, &current).await? {
            FetchOutcome::Page { body, .. } => {
                return Ok(PageHandle {
                    target: current,
                    body,
                });
            }
            FetchOutcome::Redirect { location } => {
                let base = Url::parse(&current).map_err(|e| SatchelError::Fetch {
                    target: current.clone(),
                    message: format!("Bad redirect base: {}", e),
                })?;
                let joined = base.join(&location).map_err(|e| SatchelError::Fetch {
                    target: current.clone(),
                    message: format!("Bad redirect location '{}': {}", location, e),
                })?;
                let next = normalize_target(joined.as_str())?;
                debug!("following redirect {} -> {}", current, next);
                current = String::from(next);
            }
            FetchOutcome::RateLimited => {
                return Err(SatchelError::Fetch {
                    target: current,
                    message: "HTTP 429 persisted after backoff".to_string(),
                });
            }
            FetchOutcome::HttpError { status } => {
                return Err(SatchelError::Fetch {
                    target: current,
                    message: format!("HTTP {}", status),
                });
            }
        }
    }

    Err(SatchelError::Fetch {
        target: target.to_string(),
        message: format!("Redirect chain exceeded {} hops", MAX_REDIRECTS),
    })
}

type TransitionResult = (String, Result<PageHandle>);

/// The production [`TransitionDriver`]: transitions are HTTP page loads
///
/// Requests run detached and deliver into an inbox. `resumption` drains the
/// inbox until the wanted target's result arrives; results for anything
/// else are leftovers from before an interruption and are discarded.
pub struct HttpDriver {
    fetcher: Fetcher,
    pacer: Arc<Mutex<Pacer>>,
    tx: mpsc::UnboundedSender<TransitionResult>,
    inbox: Mutex<mpsc::UnboundedReceiver<TransitionResult>>,
}

impl HttpDriver {
    pub fn new(fetcher: Fetcher, pacer: Arc<Mutex<Pacer>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            pacer,
            tx,
            inbox: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl TransitionDriver for HttpDriver {
    fn request_transition(&self, target: &str) {
        let fetcher = self.fetcher.clone();
        let pacer = self.pacer.clone();
        let tx = self.tx.clone();
        let target = target.to_string();

        tokio::spawn(async move {
            let result = load_page(&fetcher, &pacer, &target).await;
            // a dropped receiver means the crawl already ended
            let _ = tx.send((target, result));
        });
    }

    async fn resumption(&self, target: &str) -> Result<PageHandle> {
        let mut inbox = self.inbox.lock().await;
        while let Some((delivered, result)) = inbox.recv().await {
            if delivered == target {
                return result;
            }
            debug!("discarding stale transition result for {}", delivered);
        }
        Err(SatchelError::Fetch {
            target: target.to_string(),
            message: "Transition channel closed".to_string(),
        })
    }

    fn cached(&self, _target: &str) -> Option<PageHandle> {
        None
    }
}
