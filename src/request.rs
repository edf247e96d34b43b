//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

use crate::context::RenderContext;

/// An incoming HTTP request with its body fully buffered.
///
/// Every request carries its own [`RenderContext`]; handlers write labels and
/// settings into it, middleware reads them back after the handler returns.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    context: RenderContext,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
        context: RenderContext,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params,
            context,
        }
    }

    /// Wraps an already-buffered [`http::Request`], e.g. when embedding vitrine
    /// handlers in another server or driving middleware from tests.
    pub fn from_http(req: http::Request<Bytes>, context: RenderContext) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, HashMap::new(), context)
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn context(&self) -> &RenderContext { &self.context }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/pages/{id}`, `req.param("id")` on `/pages/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the first value of query parameter `key`, percent-decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// The absolute URL the client asked for.
    ///
    /// Behind a reverse proxy the request line only carries the path, so the
    /// scheme comes from `x-forwarded-proto` and the authority from `host`.
    pub fn absolute_url(&self) -> String {
        if self.uri.scheme().is_some() {
            return self.uri.to_string();
        }
        let scheme = self.header("x-forwarded-proto").unwrap_or("http");
        let host = self
            .header("x-forwarded-host")
            .or_else(|| self.header("host"))
            .unwrap_or("localhost");
        let path_and_query = self.uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("{scheme}://{host}{path_and_query}")
    }
}
