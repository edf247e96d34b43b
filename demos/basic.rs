//! Minimal vitrine service.
//!
//! ```text
//! SSR_SUB_REQUEST_URI=http://127.0.0.1:4000/render cargo run --example basic
//! curl http://127.0.0.1:3000/
//! curl 'http://127.0.0.1:3000/?type=1644444444'   # print view, eager images
//! curl 'http://127.0.0.1:3000/news?type=100'      # JSON, never sent to SSR
//! ```
//!
//! Without `SSR_SUB_REQUEST_URI` every page is served as rendered.

use std::sync::Arc;

use http::Method;
use serde_json::json;
use vitrine::config::SsrConfig;
use vitrine::helpers::XhrCache;
use vitrine::http_client::{HttpClientFactory, HttpConfig};
use vitrine::image::{FileKind, ImageDescriptor, MemoryAssetStore, PictureOptions, PictureRenderer, ProcessingSpec};
use vitrine::middleware::ssr::SsrMiddleware;
use vitrine::{Request, Response, Router, Server};

#[tokio::main]
async fn main() -> Result<(), vitrine::Error> {
    tracing_subscriber::fmt::init();

    let config = SsrConfig::from_env();
    let client = HttpClientFactory::from_env(
        HttpConfig::new().handler("user-agent", |req: &mut http::Request<bytes::Bytes>| {
            req.headers_mut()
                .insert(http::header::USER_AGENT, http::HeaderValue::from_static("vitrine-demo"));
        }),
    )?
    .build_client()?;

    let pictures = Arc::new(PictureRenderer::new(Arc::new(store()), config.page_types));

    let app = Router::new()
        .on(Method::GET, "/", move |req: Request| {
            let pictures = Arc::clone(&pictures);
            async move { home(req, &pictures) }
        })
        .on(Method::GET, "/news", news)
        .layer(SsrMiddleware::new(config, client));

    Server::bind("127.0.0.1:3000").serve(app).await
}

fn store() -> MemoryAssetStore {
    let mut store = MemoryAssetStore::new("fileadmin");
    store.insert(ImageDescriptor {
        identifier: "fileadmin/hero.jpg".into(),
        public_uri: "/fileadmin/hero.jpg".into(),
        width: 2400,
        height: 1350,
        mime_type: "image/jpeg".into(),
        kind: FileKind::Image,
        crop: Some(r#"{"desktop": {"cropArea": {"x": 0, "y": 0.1, "width": 1, "height": 0.8}}}"#.into()),
        alternative: Some("Harbour at dawn".into()),
        title: None,
        content: None,
    });
    store
}

fn home(req: Request, pictures: &PictureRenderer) -> Response {
    let ctx = req.context();
    ctx.add_labels([("nav.home", "Home"), ("nav.news", "News")]);

    let hero = PictureOptions::path("fileadmin/hero.jpg")
        .breakpoint(1200, ProcessingSpec::width(1920).crop_variant("desktop"))
        .breakpoint(768, ProcessingSpec::width(1200).crop_variant("desktop"))
        .breakpoint(0, ProcessingSpec::width(768));
    let picture = match pictures.render(ctx, &hero) {
        Ok(markup) => markup,
        Err(e) => {
            tracing::error!(error = %e, "picture misconfigured");
            return Response::status(http::StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let xhr = XhrCache::default()
        .render(ctx, Some("/news"), Some(&json!({"items": ["Harbour reopens"]})))
        .unwrap_or_default();

    Response::html(format!(
        "<!doctype html><html><body><app-root>{picture}</app-root>{xhr}</body></html>"
    ))
}

async fn news(_req: Request) -> Response {
    Response::json(br#"{"items":["Harbour reopens"]}"#.to_vec())
}
