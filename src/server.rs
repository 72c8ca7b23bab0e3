//! HTTP surface: a single GET endpoint serving the merged subscription.
//!
//! Routes:
//! - `GET /{route_path}/{sub_id}`
//! - `GET /{route_path}` (uses `default_sub_id`)

use crate::aggregate::{aggregate, AggregateError};
use crate::config::Config;
use crate::feed::MergeError;
use crate::manifest::ManifestError;
use axum::extract::{Path, State};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

const PROFILE_TITLE: &str = "profile-title";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
}

/// Builds the router for the configured route path.
///
/// `route_path` must have passed [`Config::validate`]; route syntax in it
/// makes axum panic.
pub fn build_router(config: Arc<Config>) -> Router {
    let segment = config.route_path.trim_matches('/');
    let (root, with_id) = if segment.is_empty() {
        ("/".to_owned(), "/{sub_id}".to_owned())
    } else {
        (format!("/{segment}"), format!("/{segment}/{{sub_id}}"))
    };

    Router::new()
        .route(&with_id, get(subscription_for_id))
        .route(&root, get(subscription_default))
        .with_state(AppState { config })
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C.
pub async fn serve(config: Arc<Config>, listener: TcpListener) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, route = %config.route_path, "HTTP server starting");

    axum::serve(listener, build_router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn subscription_for_id(
    State(state): State<AppState>,
    Path(sub_id): Path<String>,
) -> Result<Response, AggregateError> {
    respond(&state.config, &sub_id).await
}

async fn subscription_default(State(state): State<AppState>) -> Result<Response, AggregateError> {
    respond(&state.config, &state.config.default_sub_id).await
}

async fn respond(config: &Config, sub_id: &str) -> Result<Response, AggregateError> {
    let aggregate = aggregate(config, sub_id).await?;

    // String bodies are served as text/plain; charset=utf-8
    let mut response = aggregate.payload.into_response();
    let headers = response.headers_mut();
    for (name, value) in &aggregate.headers {
        insert_header(headers, name, value);
    }
    insert_header(headers, PROFILE_TITLE, &config.sub_name);
    insert_header(
        headers,
        CONTENT_DISPOSITION.as_str(),
        &format!("attachment; filename={}", config.sub_name),
    );

    Ok(response)
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_bytes(value.as_bytes()),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::warn!(header = %name, "Skipping header with invalid name or value"),
    }
}

impl IntoResponse for AggregateError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AggregateError::Manifest(ManifestError::Unavailable(_)) => {
                (StatusCode::NOT_FOUND, "Config file not found")
            }
            AggregateError::Manifest(ManifestError::Io { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            AggregateError::Merge(MergeError::NothingToAggregate) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "There is nothing to return")
            }
            AggregateError::Merge(MergeError::Client(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };
        tracing::debug!(status = %status, error = %self, "Request failed");
        (status, message).into_response()
    }
}
