use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Json, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use super::App;
use crate::db::{Article, Feed, FeedPatch, NewFeed};
use crate::error::Error;
use crate::scheduler::{CycleReport, SchedulerState};
use crate::TARGET_WEB_REQUEST;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    (status, Json(ErrorBody { error: kind, message })).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) | Error::Duplicate(_) | Error::InvalidFeed(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Fetch(e) => {
                warn!(target: TARGET_WEB_REQUEST, "On-demand fetch failed: {}", e);
                StatusCode::BAD_GATEWAY
            }
            Error::Storage(e) => {
                error!(target: TARGET_WEB_REQUEST, "Storage error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.kind(), self.to_string())
    }
}

#[derive(Serialize)]
struct SchedulerStatus {
    state: SchedulerState,
    last_cycle: Option<CycleReport>,
}

pub fn router(app: App) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/feeds", get(list_feeds).post(add_feed))
        .route(
            "/api/feeds/{id}",
            get(get_feed).put(update_feed).delete(delete_feed),
        )
        .route("/api/feeds/{id}/fetch", post(fetch_feed))
        .route("/api/feeds/{id}/articles", get(list_articles))
        .route("/api/refresh", post(start_cycle))
        .route("/api/scheduler", get(scheduler_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

/// Serves the API on `0.0.0.0:port` until `shutdown` resolves, then lets
/// in-flight requests finish.
pub async fn serve<F>(app: App, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(target: TARGET_WEB_REQUEST, "API listening on http://{}", addr);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown)
        .await
}

fn feed_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, Error> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::validation(format!("invalid feed id: {}", e.body_text())))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    body.map(|Json(value)| value)
        .map_err(|e| Error::validation(e.body_text()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": crate::version(),
        "built": option_env!("BUILD_TIMESTAMP"),
    }))
}

async fn list_feeds(State(app): State<App>) -> Result<Json<Vec<Feed>>, Error> {
    Ok(Json(app.list_feeds().await?))
}

async fn add_feed(
    State(app): State<App>,
    body: Result<Json<NewFeed>, JsonRejection>,
) -> Result<(StatusCode, Json<Feed>), Error> {
    let feed = app.add_feed(json_body(body)?).await?;
    Ok((StatusCode::CREATED, Json(feed)))
}

async fn get_feed(
    State(app): State<App>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Feed>, Error> {
    Ok(Json(app.get_feed(feed_id(id)?).await?))
}

async fn update_feed(
    State(app): State<App>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<FeedPatch>, JsonRejection>,
) -> Result<Json<Feed>, Error> {
    let id = feed_id(id)?;
    Ok(Json(app.update_feed(id, json_body(body)?).await?))
}

async fn delete_feed(
    State(app): State<App>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, Error> {
    app.delete_feed(feed_id(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_feed(
    State(app): State<App>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Article>>, Error> {
    Ok(Json(app.fetch_feed(feed_id(id)?).await?))
}

async fn list_articles(
    State(app): State<App>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Article>>, Error> {
    Ok(Json(app.list_articles(feed_id(id)?).await?))
}

async fn start_cycle(State(app): State<App>) -> Response {
    match app.scheduler().try_spawn_cycle() {
        Some(_) => {
            info!(target: TARGET_WEB_REQUEST, "Fetch cycle started on request");
            (StatusCode::ACCEPTED, Json(json!({ "status": "started" }))).into_response()
        }
        None => error_response(
            StatusCode::CONFLICT,
            "cycle_running",
            "a fetch cycle is already running".to_string(),
        ),
    }
}

async fn scheduler_status(State(app): State<App>) -> Json<SchedulerStatus> {
    let scheduler = app.scheduler();
    Json(SchedulerStatus {
        state: scheduler.state(),
        last_cycle: scheduler.last_report().await,
    })
}
