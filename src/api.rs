//! HTTP boundary.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | `303 See Other` to `/news` |
//! | `GET /news?limit=<k>` | JSON array of articles, newest first |
//! | `GET /news/lookup?link=<url>` | the article stored under `link`, or 404 |
//! | `GET /health` | `{"status":"ok","collector":"running"}` |
//!
//! A missing, non-numeric or non-positive `limit` means 10. Every route only
//! reads from the store, so the API keeps serving after the collector halts.

use axum::{Json, Router};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::query::{QueryService, parse_limit};
use crate::scheduler::SchedulerState;

#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub collector: watch::Receiver<SchedulerState>,
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    link: String,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    collector: SchedulerState,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/news") }))
        .route("/news", get(latest_news))
        .route("/news/lookup", get(lookup_news))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn latest_news(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Response {
    let limit = parse_limit(params.limit.as_deref());
    match state.query.get_latest(limit).await {
        Ok(articles) => {
            debug!(limit, count = articles.len(), "Serving latest news");
            Json(articles).into_response()
        }
        Err(e) => {
            error!(limit, error = %e, "Failed to get news");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get news").into_response()
        }
    }
}

async fn lookup_news(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Response {
    match state.query.get_by_link(&params.link).await {
        Ok(Some(article)) => Json(article).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "News not found").into_response(),
        Err(e) => {
            error!(link = %params.link, error = %e, "Failed to look up news");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get news").into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        collector: *state.collector.borrow(),
    })
}
