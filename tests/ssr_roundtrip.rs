//! End to end: a real vitrine server in front of a throwaway SSR service.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use vitrine::config::SsrConfig;
use vitrine::http_client::{HttpClientFactory, HttpConfig};
use vitrine::middleware::ssr::SsrMiddleware;
use vitrine::{Request, Response, Router, Server};

type Received = Arc<Mutex<Vec<Value>>>;

/// Answers every POST with `status` and a fixed body, recording the payloads.
async fn fake_ssr(status: StatusCode) -> (SocketAddr, Received) {
    slow_ssr(status, Duration::ZERO).await
}

/// Like [`fake_ssr`], but waits `delay` before answering.
async fn slow_ssr(status: StatusCode, delay: Duration) -> (SocketAddr, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Received::default();

    let log = Arc::clone(&received);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let svc = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    let log = Arc::clone(&log);
                    async move {
                        let body = req.into_body().collect().await.unwrap().to_bytes();
                        log.lock().unwrap().push(serde_json::from_slice(&body).unwrap());
                        tokio::time::sleep(delay).await;
                        let res = http::Response::builder()
                            .status(status)
                            .body(Full::new(Bytes::from_static(b"<html>server rendered</html>")))
                            .unwrap();
                        Ok::<_, Infallible>(res)
                    }
                });
                let _ = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });

    (addr, received)
}

struct App {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), vitrine::Error>>,
}

async fn page(req: Request) -> Response {
    req.context().add_label("nav.home", "Home");
    Response::builder()
        .header("x-page", "home")
        .html("<html><app-root></app-root></html>")
}

async fn feed(_req: Request) -> Response {
    Response::json(br#"{"items":[]}"#.to_vec())
}

async fn start(ssr: Option<SocketAddr>) -> App {
    start_with_timeout(ssr, None).await
}

async fn start_with_timeout(ssr: Option<SocketAddr>, timeout: Option<&'static str>) -> App {
    let lookup = move |key: &str| match key {
        "SSR_SUB_REQUEST_URI" => ssr.map(|addr| format!("http://{addr}/render")),
        "SSR_SUB_REQUEST_TIMEOUT" => timeout.map(str::to_owned),
        _ => None,
    };
    let config = SsrConfig::from_lookup(lookup);
    let client = HttpClientFactory::from_lookup(HttpConfig::new(), lookup)
        .unwrap()
        .build_client()
        .unwrap();
    let router = Router::new()
        .on(Method::GET, "/", page)
        .on(Method::GET, "/feed", feed)
        .layer(SsrMiddleware::new(config, client));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(Server::bind("127.0.0.1:0").serve_listener(listener, router, async {
        let _ = rx.await;
    }));

    App { addr, shutdown, task }
}

impl App {
    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::get(format!("http://{}{path}", self.addr)).await.unwrap()
    }

    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn html_page_is_replaced_by_ssr_output() {
    let (ssr, received) = fake_ssr(StatusCode::OK).await;
    let app = start(Some(ssr)).await;

    let res = app.get("/?utm=1").await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-page"], "home");
    assert_eq!(res.text().await.unwrap(), "<html>server rendered</html>");

    let payload = received.lock().unwrap()[0].clone();
    assert_eq!(payload["body"], "<html><app-root></app-root></html>");
    assert_eq!(payload["url"], format!("http://{}/?utm=1", app.addr));
    assert_eq!(payload["labels"]["nav.home"], "Home");
    assert!(payload["settings"].as_object().unwrap().is_empty());

    app.stop().await;
}

#[tokio::test]
async fn failing_ssr_serves_page_as_rendered() {
    let (ssr, received) = fake_ssr(StatusCode::INTERNAL_SERVER_ERROR).await;
    let app = start(Some(ssr)).await;

    let res = app.get("/").await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "<html><app-root></app-root></html>");
    assert_eq!(received.lock().unwrap().len(), 1);

    app.stop().await;
}

#[tokio::test]
async fn unreachable_ssr_serves_page_as_rendered() {
    // Bind and drop to get a port nobody listens on.
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let app = start(Some(closed)).await;

    let res = app.get("/").await;

    assert_eq!(res.text().await.unwrap(), "<html><app-root></app-root></html>");

    app.stop().await;
}

#[tokio::test]
async fn non_page_type_and_non_html_skip_ssr() {
    let (ssr, received) = fake_ssr(StatusCode::OK).await;
    let app = start(Some(ssr)).await;

    let typed = app.get("/?type=100").await;
    let json = app.get("/feed").await;

    assert_eq!(typed.text().await.unwrap(), "<html><app-root></app-root></html>");
    assert_eq!(json.text().await.unwrap(), r#"{"items":[]}"#);
    assert!(received.lock().unwrap().is_empty());

    app.stop().await;
}

#[tokio::test]
async fn unconfigured_ssr_and_unknown_routes() {
    let app = start(None).await;

    assert_eq!(app.get("/").await.text().await.unwrap(), "<html><app-root></app-root></html>");
    assert_eq!(app.get("/nope").await.status(), StatusCode::NOT_FOUND);

    app.stop().await;
}

#[tokio::test]
async fn slow_ssr_times_out_and_serves_page_as_rendered() {
    let (ssr, received) = slow_ssr(StatusCode::OK, Duration::from_secs(5)).await;
    let app = start_with_timeout(Some(ssr), Some("1")).await;

    let started = Instant::now();
    let res = app.get("/").await;
    let elapsed = started.elapsed();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "<html><app-root></app-root></html>");
    assert_eq!(received.lock().unwrap().len(), 1);
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");

    app.stop().await;
}
