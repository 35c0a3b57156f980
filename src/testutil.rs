//! In-process HTTP server used by the HTTP and checker tests.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Per-method request counters, plus the User-Agent of every request.
#[derive(Clone, Default)]
pub struct Hits {
    pub head: Arc<AtomicUsize>,
    pub get: Arc<AtomicUsize>,
    pub ranged_get: Arc<AtomicUsize>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

impl Hits {
    pub fn head(&self) -> usize {
        self.head.load(Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }

    pub fn ranged_get(&self) -> usize {
        self.ranged_get.load(Ordering::SeqCst)
    }

    /// In arrival order; empty string when the header was missing.
    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }

    fn record(&self, method: &Method, headers: &HeaderMap) {
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        self.user_agents.lock().unwrap().push(agent.to_string());

        if method == Method::HEAD {
            self.head.fetch_add(1, Ordering::SeqCst);
        } else if method == Method::GET {
            self.get.fetch_add(1, Ordering::SeqCst);
            if headers.get(header::RANGE).and_then(|v| v.to_str().ok()) == Some("bytes=0-0") {
                self.ranged_get.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

pub struct Fixture {
    pub base_url: String,
    pub hits: Hits,
}

impl Fixture {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// `/status/{head}/{get}[/...]`: answers HEAD with `head` and GET with `get`.
async fn status(
    State(hits): State<Hits>,
    method: Method,
    headers: HeaderMap,
    Path(params): Path<HashMap<String, String>>,
) -> StatusCode {
    hits.record(&method, &headers);
    let key = if method == Method::HEAD { "head" } else { "get" };
    params
        .get(key)
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// `/slow/{ms}`: sleeps before answering 200.
async fn slow(
    State(hits): State<Hits>,
    method: Method,
    headers: HeaderMap,
    Path(ms): Path<u64>,
) -> StatusCode {
    hits.record(&method, &headers);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    StatusCode::OK
}

/// `/slow-get/{ms}`: HEAD gets an immediate 404, GET sleeps before a 200.
async fn slow_get(
    State(hits): State<Hits>,
    method: Method,
    headers: HeaderMap,
    Path(ms): Path<u64>,
) -> StatusCode {
    hits.record(&method, &headers);
    if method == Method::HEAD {
        return StatusCode::NOT_FOUND;
    }
    tokio::time::sleep(Duration::from_millis(ms)).await;
    StatusCode::OK
}

/// `/redirect`: 307 to `/status/200/200`.
async fn redirect(State(hits): State<Hits>, method: Method, headers: HeaderMap) -> Response {
    hits.record(&method, &headers);
    (
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, "/status/200/200")],
    )
        .into_response()
}

pub async fn spawn_fixture() -> Fixture {
    let hits = Hits::default();
    let app = Router::new()
        .route("/status/{head}/{get}", any(status))
        .route("/status/{head}/{get}/{*rest}", any(status))
        .route("/slow/{ms}", any(slow))
        .route("/slow-get/{ms}", any(slow_get))
        .route("/redirect", any(redirect))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture listener");
    let addr = listener.local_addr().expect("fixture addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });

    Fixture {
        base_url: format!("http://{}", addr),
        hits,
    }
}

/// An address nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind closed-port listener");
    let addr = listener.local_addr().expect("closed-port addr");
    drop(listener);
    format!("http://{}/file.img", addr)
}
