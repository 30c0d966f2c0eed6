//! Error types for scrape operations.
//!
//! `ScrapeError` distinguishes the failure kinds the pipeline reacts to
//! differently: transient network trouble is retried by the backoff layer,
//! throttling shrinks the request window, a 404 is terminal for that one
//! request, and fatal errors unwind the orchestrator.

/// Error type shared by the downloader, wiki client and orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Request exceeded the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Transport-level failure (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered 429; the concurrency window has been reduced.
    #[error("throttled by upstream: {0}")]
    Throttled(String),

    /// Upstream answered 404. Never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Body failed to parse or had an unexpected shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// The wiki database reported an internal error; stops enumeration.
    #[error("wiki database error: {0}")]
    WikiDatabase(String),

    /// Bad configuration detected before enumeration begins.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unrecoverable runtime condition (no renderer available, writer failure).
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ScrapeError {
    /// Whether the backoff layer should retry this error.
    ///
    /// Retried: timeouts, transport errors, throttling, and any HTTP status
    /// other than 404. Everything else is terminal for the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::Throttled(_) => true,
            Self::HttpStatus { status, .. } => *status != 404,
            Self::NotFound(_)
            | Self::Malformed { .. }
            | Self::WikiDatabase(_)
            | Self::Config(_)
            | Self::Fatal(_) => false,
        }
    }

    /// Whether this error must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::WikiDatabase(_) | Self::Config(_) | Self::Fatal(_)
        )
    }

    /// Classify a `reqwest` transport error.
    pub fn from_transport(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else {
            Self::Network(format!("{url}: {err}"))
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(url: &str, status: u16) -> Self {
        match status {
            404 => Self::NotFound(url.to_string()),
            429 => Self::Throttled(url.to_string()),
            _ => Self::HttpStatus {
                status,
                url: url.to_string(),
            },
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Short category label used for the one-line fatal report.
impl ScrapeError {
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::Throttled(_) => "throttled",
            Self::NotFound(_) => "not-found",
            Self::HttpStatus { .. } => "http",
            Self::Malformed { .. } => "malformed",
            Self::WikiDatabase(_) => "wiki-db",
            Self::Config(_) => "config",
            Self::Fatal(_) => "fatal",
        }
    }
}
