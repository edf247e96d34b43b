//! Template helpers: inline XHR cache entries, file contents, Stencil loaders.

pub mod file_content;
pub mod stencil;
pub mod xhr_cache;

pub use file_content::{FileContent, FileOptions};
pub use stencil::Stencil;
pub use xhr_cache::XhrCache;

use bytes::Bytes;
use tracing::debug;

use crate::http_client::Transport;

/// GETs `url`, `None` unless the reply is a 2xx.
async fn fetch(transport: &dyn Transport, url: &str) -> Option<Bytes> {
    let req = match http::Request::get(url).body(Bytes::new()) {
        Ok(req) => req,
        Err(e) => {
            debug!(url, error = %e, "not a fetchable url");
            return None;
        }
    };
    match transport.send(req).await {
        Ok(res) if res.status.is_success() => Some(res.body),
        Ok(res) => {
            debug!(url, status = res.status.as_u16(), "fetch returned an error status");
            None
        }
        Err(e) => {
            debug!(url, error = %e, "fetch failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::StatusCode;

    use crate::handler::BoxFuture;
    use crate::http_client::{OutboundResponse, Transport, TransportError};

    /// Serves fixed bodies by URL, 404 for everything else.
    #[derive(Clone, Default)]
    pub(crate) struct Fixed {
        bodies: HashMap<String, &'static str>,
        pub(crate) requested: Arc<Mutex<Vec<String>>>,
    }

    impl Fixed {
        pub(crate) fn serving(url: &str, body: &'static str) -> Self {
            let mut fixed = Self::default();
            fixed.bodies.insert(url.to_owned(), body);
            fixed
        }
    }

    impl Transport for Fixed {
        fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'_, Result<OutboundResponse, TransportError>> {
            let url = req.uri().to_string();
            self.requested.lock().unwrap().push(url.clone());
            let reply = match self.bodies.get(&url) {
                Some(body) => OutboundResponse { status: StatusCode::OK, body: Bytes::from_static(body.as_bytes()) },
                None => OutboundResponse { status: StatusCode::NOT_FOUND, body: Bytes::new() },
            };
            Box::pin(async move { Ok(reply) })
        }
    }
}
