//! Server-side rendering pass-through.
//!
//! After the handler has rendered a page, [`SsrMiddleware`] POSTs the HTML and
//! the request's inline labels and settings to an external rendering service
//! and, if that service answers `200`, serves its body instead. Anything else
//! serves the page as rendered, so an SSR outage degrades to client-side
//! rendering without the visitor noticing.
//!
//! Requests pass through untouched when:
//!
//! - no `SSR_SUB_REQUEST_URI` is configured,
//! - the response is not `text/html`,
//! - the `type` query parameter is above the page threshold (JSON, feeds, …).

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SsrConfig;
use crate::context::{Labels, RenderContext, Settings};
use crate::handler::BoxFuture;
use crate::http_client::{Transport, TransportError};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Why the rendering service's answer was not used.
#[derive(Debug, thiserror::Error)]
pub enum SsrFailure {
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("page body is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("rendering service answered {0}")]
    Status(StatusCode),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

/// Receives SSR failures, e.g. to forward them to an error tracker.
///
/// Reporting never changes the response.
pub trait ErrorReporter: Send + Sync + 'static {
    fn report(&self, uri: &str, failure: &SsrFailure);
}

/// Default reporter: one `warn!` event per failure.
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, uri: &str, failure: &SsrFailure) {
        warn!(uri, error = %failure, "ssr sub-request failed, serving client-rendered page");
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    body: &'a str,
    url: String,
    labels: Labels,
    settings: Settings,
}

/// The SSR middleware. Register it with [`Router::layer`](crate::Router::layer).
pub struct SsrMiddleware {
    config: SsrConfig,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn ErrorReporter>,
}

impl SsrMiddleware {
    pub fn new(config: SsrConfig, transport: impl Transport) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: impl ErrorReporter) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    fn is_html(res: &Response) -> bool {
        res.content_type().to_ascii_lowercase().contains("text/html")
    }

    fn is_non_page_type(&self, req: &Request) -> bool {
        req.query("type")
            .and_then(|t| t.trim().parse::<f64>().ok())
            .is_some_and(|t| t > self.config.page_types.page_threshold as f64)
    }

    async fn render(
        &self,
        uri: &str,
        url: String,
        ctx: &RenderContext,
        res: &Response,
    ) -> Result<Bytes, SsrFailure> {
        let body = std::str::from_utf8(res.body())?;
        let payload = Payload {
            body,
            url,
            labels: ctx.labels(),
            settings: ctx.settings(),
        };
        let encoded = serde_json::to_vec(&payload)?;

        let outbound = http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(encoded))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let reply = self.transport.send(outbound).await?;
        if reply.status != StatusCode::OK {
            return Err(SsrFailure::Status(reply.status));
        }
        Ok(reply.body)
    }
}

impl Middleware for SsrMiddleware {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            // The context is shared with the handler, so whatever it
            // registers while rendering is visible through this clone.
            let ctx = req.context().clone();
            let url = req.absolute_url();
            let non_page = self.is_non_page_type(&req);

            let res = next.run(req).await;

            let Some(uri) = self.config.sub_request_uri.as_deref() else {
                return res;
            };
            if non_page || !Self::is_html(&res) {
                return res;
            }

            match self.render(uri, url, &ctx, &res).await {
                Ok(body) => {
                    debug!(bytes = body.len(), "serving server-side rendered page");
                    res.with_body(body)
                }
                Err(failure) => {
                    self.reporter.report(uri, &failure);
                    res
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::config::PageTypes;
    use crate::http_client::OutboundResponse;
    use crate::response::ContentType;

    /// Canned transport that records what it was sent.
    #[derive(Clone, Default)]
    struct Stub {
        reply: Arc<Mutex<Option<Result<OutboundResponse, ()>>>>,
        sent: Arc<Mutex<Vec<(Method, String, Bytes)>>>,
    }

    impl Stub {
        fn answering(status: StatusCode, body: &'static str) -> Self {
            let stub = Self::default();
            *stub.reply.lock().unwrap() =
                Some(Ok(OutboundResponse { status, body: Bytes::from_static(body.as_bytes()) }));
            stub
        }

        fn failing() -> Self {
            let stub = Self::default();
            *stub.reply.lock().unwrap() = Some(Err(()));
            stub
        }

        fn sent(&self) -> Vec<(Method, String, Bytes)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for Stub {
        fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'_, Result<OutboundResponse, TransportError>> {
            let (parts, body) = req.into_parts();
            self.sent.lock().unwrap().push((parts.method, parts.uri.to_string(), body));
            let reply = self.reply.lock().unwrap().clone();
            Box::pin(async move {
                match reply {
                    Some(Ok(res)) => Ok(res),
                    _ => Err(TransportError::Timeout),
                }
            })
        }
    }

    #[derive(Clone, Default)]
    struct Collecting(Arc<Mutex<Vec<String>>>);

    impl ErrorReporter for Collecting {
        fn report(&self, _uri: &str, failure: &SsrFailure) {
            self.0.lock().unwrap().push(failure.to_string());
        }
    }

    fn config(uri: Option<&str>) -> SsrConfig {
        SsrConfig { sub_request_uri: uri.map(str::to_owned), page_types: PageTypes::default() }
    }

    fn request(uri: &str) -> Request {
        let req = http::Request::builder()
            .uri(uri)
            .header("host", "www.example.com")
            .header("x-forwarded-proto", "https")
            .body(Bytes::new())
            .unwrap();
        Request::from_http(req, RenderContext::new())
    }

    async fn page(req: Request) -> Response {
        req.context().add_label("nav.open", "Menü öffnen");
        req.context().add_inline_setting("xhrCache", json!([{"url": "/api", "data": 1}]));
        Response::builder()
            .status(StatusCode::OK)
            .header("x-page", "home")
            .html("<div id=app></div>")
    }

    async fn feed(_req: Request) -> Response {
        Response::json(br#"{"items":[]}"#.to_vec())
    }

    async fn run(mw: &SsrMiddleware, req: Request, json_handler: bool) -> Response {
        if json_handler {
            mw.process(req, Next::handler(feed)).await
        } else {
            mw.process(req, Next::handler(page)).await
        }
    }

    #[tokio::test]
    async fn passes_through_without_endpoint() {
        let stub = Stub::answering(StatusCode::OK, "<ssr/>");
        let mw = SsrMiddleware::new(config(None), stub.clone());

        let res = run(&mw, request("/"), false).await;

        assert_eq!(res.body().as_ref(), b"<div id=app></div>");
        assert!(stub.sent().is_empty());
    }

    #[tokio::test]
    async fn passes_through_non_html() {
        let stub = Stub::answering(StatusCode::OK, "<ssr/>");
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), stub.clone());

        let res = run(&mw, request("/"), true).await;

        assert_eq!(res.body().as_ref(), br#"{"items":[]}"#);
        assert!(stub.sent().is_empty());
    }

    #[rstest]
    #[case("/?type=1", true)]
    #[case("/?type=1644444444", true)]
    #[case("/?type=0", false)]
    #[case("/?type=-3", false)]
    #[case("/?type=abc", false)]
    #[case("/?type=1.5", true)]
    #[case("/?type=0.0", false)]
    #[case("/", false)]
    #[tokio::test]
    async fn type_parameter_gate(#[case] uri: &str, #[case] bypassed: bool) {
        let stub = Stub::answering(StatusCode::OK, "<ssr/>");
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), stub.clone());

        let res = run(&mw, request(uri), false).await;

        assert_eq!(stub.sent().is_empty(), bypassed);
        let expected: &[u8] = if bypassed { b"<div id=app></div>" } else { b"<ssr/>" };
        assert_eq!(res.body().as_ref(), expected);
    }

    #[tokio::test]
    async fn substitutes_body_on_200_and_keeps_headers() {
        let stub = Stub::answering(StatusCode::OK, "<div id=app><h1>Home</h1></div>");
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), stub.clone());

        let res = run(&mw, request("/de/?x=1"), false).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()["x-page"], "home");
        assert_eq!(res.content_type(), "text/html; charset=utf-8");
        assert_eq!(res.body().as_ref(), b"<div id=app><h1>Home</h1></div>");
    }

    #[tokio::test]
    async fn posts_page_labels_and_settings() {
        let stub = Stub::answering(StatusCode::OK, "<ssr/>");
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), stub.clone());

        run(&mw, request("/de/?x=1"), false).await;

        let sent = stub.sent();
        assert_eq!(sent.len(), 1);
        let (method, uri, body) = &sent[0];
        assert_eq!(*method, Method::POST);
        assert_eq!(uri, "http://ssr/render");
        let payload: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(
            payload,
            json!({
                "body": "<div id=app></div>",
                "url": "https://www.example.com/de/?x=1",
                "labels": {"nav.open": "Menü öffnen"},
                "settings": {"xhrCache": [{"url": "/api", "data": 1}]},
            })
        );
    }

    #[rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(StatusCode::CREATED)]
    #[case(StatusCode::NOT_FOUND)]
    #[tokio::test]
    async fn non_200_keeps_original(#[case] status: StatusCode) {
        let reporter = Collecting::default();
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), Stub::answering(status, "oops"))
            .with_reporter(reporter.clone());

        let res = run(&mw, request("/"), false).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"<div id=app></div>");
        assert_eq!(reporter.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_keeps_original_and_reports() {
        let reporter = Collecting::default();
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), Stub::failing())
            .with_reporter(reporter.clone());

        let res = run(&mw, request("/"), false).await;

        assert_eq!(res.body().as_ref(), b"<div id=app></div>");
        assert_eq!(res.headers()["x-page"], "home");
        assert_eq!(reporter.0.lock().unwrap().as_slice(), ["transport: timed out"]);
    }

    #[tokio::test]
    async fn malformed_endpoint_keeps_original() {
        let reporter = Collecting::default();
        let mw = SsrMiddleware::new(config(Some("not a uri")), Stub::answering(StatusCode::OK, "<ssr/>"))
            .with_reporter(reporter.clone());

        let res = run(&mw, request("/"), false).await;

        assert_eq!(res.body().as_ref(), b"<div id=app></div>");
        assert_eq!(reporter.0.lock().unwrap().len(), 1);
    }

    #[rstest]
    #[case("/?type=98", false)]
    #[case("/?type=99", false)]
    #[case("/?type=100", true)]
    #[tokio::test]
    async fn type_gate_follows_configured_threshold(#[case] uri: &str, #[case] bypassed: bool) {
        let stub = Stub::answering(StatusCode::OK, "<ssr/>");
        let config = config(Some("http://ssr/render"))
            .with_page_types(PageTypes { page_threshold: 99, ..PageTypes::default() });
        let mw = SsrMiddleware::new(config, stub.clone());

        let res = run(&mw, request(uri), false).await;

        assert_eq!(stub.sent().is_empty(), bypassed);
        let expected: &[u8] = if bypassed { b"<div id=app></div>" } else { b"<ssr/>" };
        assert_eq!(res.body().as_ref(), expected);
    }

    async fn latin1_page(_req: Request) -> Response {
        Response::builder().bytes(ContentType::Html, b"<p>Gr\xfc\xdfe</p>".to_vec())
    }

    #[tokio::test]
    async fn non_utf8_page_is_not_posted() {
        let stub = Stub::answering(StatusCode::OK, "<ssr/>");
        let reporter = Collecting::default();
        let mw = SsrMiddleware::new(config(Some("http://ssr/render")), stub.clone())
            .with_reporter(reporter.clone());

        let res = mw.process(request("/"), Next::handler(latin1_page)).await;

        assert!(stub.sent().is_empty());
        assert_eq!(res.body().as_ref(), b"<p>Gr\xfc\xdfe</p>");
        let reports = reporter.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("page body is not valid UTF-8"), "{}", reports[0]);
    }
}
