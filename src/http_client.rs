//! Outbound HTTP client construction.
//!
//! [`HttpClientFactory`] turns the global [`HttpConfig`] plus the
//! `SSR_SUB_REQUEST_TIMEOUT` override into an [`HttpClient`]. Building the
//! client performs no network I/O.
//!
//! Callers depend on the [`Transport`] trait rather than on `HttpClient`
//! directly, so a test can hand the SSR middleware a canned transport.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use tracing::debug;

use crate::config;
use crate::error::Error;
use crate::handler::BoxFuture;

// ── Configuration ─────────────────────────────────────────────────────────────

/// TLS peer verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verify {
    Enabled,
    Disabled,
    /// Verify against the PEM bundle at this path.
    CaBundle(PathBuf),
}

impl Verify {
    /// Boolean-ish strings (`1`, `true`, `on`, `yes`, `0`, `false`, `off`,
    /// `no`, empty) become on/off; anything else is taken as a CA bundle path.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Self::Enabled,
            "0" | "false" | "off" | "no" | "" => Self::Disabled,
            _ => Self::CaBundle(PathBuf::from(raw.trim())),
        }
    }
}

/// Hook applied to every outgoing request, in registration order.
///
/// Typical uses: auth headers for the SSR service, request tagging.
pub trait OutboundHandler: Send + Sync + 'static {
    fn on_request(&self, req: &mut http::Request<Bytes>);
}

impl<F> OutboundHandler for F
where
    F: Fn(&mut http::Request<Bytes>) + Send + Sync + 'static,
{
    fn on_request(&self, req: &mut http::Request<Bytes>) {
        self(req)
    }
}

/// Global HTTP settings shared by all outbound clients.
#[derive(Clone)]
pub struct HttpConfig {
    pub verify: Verify,
    handlers: Vec<(String, Arc<dyn OutboundHandler>)>,
}

impl HttpConfig {
    pub fn new() -> Self {
        Self { verify: Verify::Enabled, handlers: Vec::new() }
    }

    pub fn verify(mut self, verify: Verify) -> Self {
        self.verify = verify;
        self
    }

    /// Appends a named handler to the stack.
    pub fn handler(mut self, name: impl Into<String>, handler: impl OutboundHandler) -> Self {
        self.handlers.push((name.into(), Arc::new(handler)));
        self
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(name, _)| name.as_str())
    }
}

impl Default for HttpConfig {
    fn default() -> Self { Self::new() }
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Builds [`HttpClient`]s from [`HttpConfig`] and the timeout override.
pub struct HttpClientFactory {
    config: HttpConfig,
    timeout: Duration,
}

impl HttpClientFactory {
    /// Reads the timeout from `SSR_SUB_REQUEST_TIMEOUT`.
    pub fn from_env(config: HttpConfig) -> Result<Self, Error> {
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        config: HttpConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let timeout = config::sub_request_timeout(lookup)?;
        Ok(Self { config, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn build_client(&self) -> Result<HttpClient, Error> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        builder = match &self.config.verify {
            Verify::Enabled => builder,
            Verify::Disabled => builder.danger_accept_invalid_certs(true),
            Verify::CaBundle(path) => {
                let pem = std::fs::read(path)?;
                builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?)
            }
        };
        debug!(
            timeout_ms = self.timeout.as_millis() as u64,
            handlers = self.config.handlers.len(),
            "building outbound http client"
        );
        Ok(HttpClient {
            inner: builder.build()?,
            handlers: self.config.handlers.clone(),
            timeout: self.timeout,
        })
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Status and body of an outbound response.
#[derive(Clone, Debug)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Why an outbound call produced no response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Something that can send one request and buffer the reply.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'_, Result<OutboundResponse, TransportError>>;
}

/// The production [`Transport`]: reqwest plus the configured handler stack.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    handlers: Vec<(String, Arc<dyn OutboundHandler>)>,
    timeout: Duration,
}

impl HttpClient {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transport for HttpClient {
    fn send(&self, mut req: http::Request<Bytes>) -> BoxFuture<'_, Result<OutboundResponse, TransportError>> {
        for (_, handler) in &self.handlers {
            handler.on_request(&mut req);
        }
        Box::pin(async move {
            let req = reqwest::Request::try_from(req)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let res = self.inner.execute(req).await.map_err(classify)?;
            let status = res.status();
            let body = res.bytes().await.map_err(classify)?;
            Ok(OutboundResponse { status, body })
        })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() { TransportError::Timeout } else { TransportError::Http(e) }
}
