//! Read-only HTTP API over the most recent status report.

use crate::error::Result;
use crate::types::{DistfileReport, StatusReport};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Where a status report is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    Url(String),
    File(PathBuf),
}

impl ReportSource {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            ReportSource::Url(location.to_string())
        } else {
            ReportSource::File(PathBuf::from(location))
        }
    }
}

/// Process-wide cache of the latest report. Only `refresh` writes to it.
#[derive(Clone)]
pub struct StatusCache {
    source: ReportSource,
    client: reqwest::Client,
    report: Arc<RwLock<Option<StatusReport>>>,
}

impl StatusCache {
    pub fn new(source: ReportSource) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            source,
            client,
            report: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn snapshot(&self) -> Option<StatusReport> {
        self.report.read().await.clone()
    }

    async fn fetch(&self) -> Result<StatusReport> {
        match &self.source {
            ReportSource::Url(url) => {
                let report = self
                    .client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<StatusReport>()
                    .await?;
                Ok(report)
            }
            ReportSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&content)?)
            }
        }
    }

    /// Reload the report. On failure the previous report stays in place.
    pub async fn refresh(&self) -> bool {
        match self.fetch().await {
            Ok(report) => {
                info!("Loaded {} boards from status report", report.boards.len());
                *self.report.write().await = Some(report);
                true
            }
            Err(e) => {
                warn!("Failed to fetch status report from {:?}: {}", self.source, e);
                false
            }
        }
    }

    /// Refresh every `interval`, starting one interval from now.
    pub fn spawn_refresh(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                cache.refresh().await;
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cache: StatusCache,
    pub results_url: String,
}

#[derive(Serialize)]
pub struct BoardListResponse {
    pub generated_at: Option<DateTime<Utc>>,
    pub boards: Vec<String>,
}

#[derive(Serialize)]
pub struct BoardResponse {
    pub generated_at: Option<DateTime<Utc>>,
    pub board: String,
    pub distfiles: Vec<DistfileReport>,
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "results_url": state.results_url,
    }))
}

async fn list_board_images(State(state): State<AppState>) -> Json<BoardListResponse> {
    let report = state.cache.snapshot().await;
    Json(BoardListResponse {
        generated_at: report.as_ref().map(|r| r.generated_at),
        // BTreeMap keys are already sorted
        boards: report
            .map(|r| r.boards.into_keys().collect())
            .unwrap_or_default(),
    })
}

async fn get_board_image(
    State(state): State<AppState>,
    Path(board_name): Path<String>,
) -> std::result::Result<Json<BoardResponse>, ApiError> {
    let report = state.cache.snapshot().await;
    let generated_at = report.as_ref().map(|r| r.generated_at);

    let board = report
        .and_then(|mut r| r.boards.remove(&board_name))
        .ok_or_else(|| ApiError::NotFound(format!("Board '{}' not found", board_name)))?;

    Ok(Json(BoardResponse {
        generated_at,
        board: board_name,
        distfiles: board.distfiles,
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/board-images", get(list_board_images))
        .route("/board-images/{board_name}", get(get_board_image))
        .with_state(state)
}
