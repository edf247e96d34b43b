//! Middleware layer.
//!
//! Middleware sees every routed request before the handler and every
//! response after it. A middleware receives the request together with a
//! [`Next`] that runs the rest of the chain; it decides what to do with the
//! response `next.run(req)` returns.
//!
//! ```rust
//! use vitrine::handler::BoxFuture;
//! use vitrine::middleware::{Middleware, Next};
//! use vitrine::{Request, Response};
//!
//! struct PoweredBy;
//!
//! impl Middleware for PoweredBy {
//!     fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let res = next.run(req).await;
//!             tracing::debug!(status = %res.status_code(), "page rendered");
//!             res
//!         })
//!     }
//! }
//! ```
//!
//! Built-in middleware:
//! - [`ssr::SsrMiddleware`]: forwards rendered HTML to an external SSR service

pub mod ssr;

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// A request/response interceptor.
pub trait Middleware: Send + Sync + 'static {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// The remainder of the middleware chain, ending in the route handler.
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    handler: BoxedHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(layers: &'a [Arc<dyn Middleware>], handler: BoxedHandler) -> Self {
        Self { layers, handler }
    }

    /// Runs the remaining layers and the handler.
    pub async fn run(self, req: Request) -> Response {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.process(req, Next::new(rest, self.handler)).await,
            None => self.handler.call(req).await,
        }
    }
}

impl Next<'static> {
    /// A chain that consists of `handler` only.
    ///
    /// Useful for driving a single middleware outside of a [`Router`](crate::Router).
    pub fn handler(handler: impl Handler) -> Self {
        Self { layers: &[], handler: handler.into_boxed_handler() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rstest::rstest;

    use crate::context::RenderContext;

    /// Appends its name to the `x-trail` header on the way out.
    struct Trail(&'static str);

    impl Middleware for Trail {
        fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let res = next.run(req).await;
                let trail = res.headers().get("x-trail").and_then(|v| v.to_str().ok()).unwrap_or("");
                let trail = format!("{trail}{}", self.0);
                Response::builder().header("x-trail", &trail).html(String::from_utf8_lossy(res.body()))
            })
        }
    }

    fn request() -> Request {
        let req = http::Request::builder().uri("/").body(Bytes::new()).unwrap();
        Request::from_http(req, RenderContext::new())
    }

    async fn page(_req: Request) -> Response {
        Response::html("<p>hi</p>")
    }

    #[rstest]
    #[tokio::test]
    async fn first_layer_runs_outermost() {
        let layers: Vec<Arc<dyn Middleware>> = vec![Arc::new(Trail("a")), Arc::new(Trail("b"))];
        let handler = page.into_boxed_handler();

        let res = Next::new(&layers, handler).run(request()).await;

        assert_eq!(res.headers()["x-trail"], "ba");
        assert_eq!(res.body(), b"<p>hi</p>".as_slice());
    }

    #[rstest]
    #[tokio::test]
    async fn bare_handler_chain() {
        let res = Next::handler(page).run(request()).await;
        assert_eq!(res.content_type(), "text/html; charset=utf-8");
    }
}
