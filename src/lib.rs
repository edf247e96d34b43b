//! # vitrine
//!
//! Page-rendering plumbing for services that sit behind a reverse proxy.
//!
//! - [`middleware::ssr::SsrMiddleware`] hands finished HTML pages to an
//!   external server-side rendering service and serves its answer.
//! - [`image::PictureRenderer`] turns one stored image into responsive
//!   `<picture>` markup with per-breakpoint variants.
//! - [`cache::PageCacheStateAugmenter`] keeps inline labels and settings
//!   attached to cached pages.
//! - [`http_client::HttpClientFactory`] builds the outbound client the SSR
//!   middleware and the [`helpers`] use.
//!
//! Routing, dispatch and graceful shutdown come from a small hyper server.
//! TLS, rate limiting and body-size limits are left to the proxy.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::Method;
//! use vitrine::config::SsrConfig;
//! use vitrine::http_client::{HttpClientFactory, HttpConfig};
//! use vitrine::middleware::ssr::SsrMiddleware;
//! use vitrine::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vitrine::Error> {
//!     let client = HttpClientFactory::from_env(HttpConfig::new())?.build_client()?;
//!
//!     let app = Router::new()
//!         .on(Method::GET, "/", home)
//!         .layer(SsrMiddleware::new(SsrConfig::from_env(), client));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn home(req: Request) -> Response {
//!     req.context().add_label("nav.home", "Home");
//!     Response::html("<!doctype html><title>Home</title><app-root></app-root>")
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod handler;
pub mod helpers;
pub mod html;
pub mod http_client;
pub mod image;
pub mod middleware;

mod error;
mod request;
mod response;
mod router;
mod server;

pub use context::RenderContext;
pub use error::Error;
pub use handler::Handler;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
