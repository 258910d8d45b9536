//! axum adapter over the [`crate::api`] handlers.

use crate::api::{self, ApiResponse, SharedState};
use crate::metrics;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Run a blocking handler on the blocking pool.
async fn blocking<T, F>(state: SharedState, handler: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&SharedState) -> ApiResponse<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || handler(&state)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!(error = %e, "Handler task failed");
            ApiResponse::<()>::internal(&format!("Internal server error: {e}")).into_response()
        }
    }
}

/// Turn a body rejection into the usual 400 envelope.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiResponse::<()>::error(&rejection.body_text()).into_response())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<SharedState>) -> Response {
    api::handle_health(&state).into_response()
}

async fn current_vitals(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_current_vitals).await
}

async fn single_vitals(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_single_vitals).await
}

async fn ranges() -> Response {
    api::handle_ranges().into_response()
}

async fn get_config(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_get_config).await
}

async fn get_status(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_get_status).await
}

async fn set_mode(
    State(state): State<SharedState>,
    payload: Result<Json<api::ModeRequest>, JsonRejection>,
) -> Response {
    match body(payload) {
        Ok(request) => blocking(state, move |s| api::handle_set_mode(s, request)).await,
        Err(response) => response,
    }
}

async fn set_interval(
    State(state): State<SharedState>,
    payload: Result<Json<api::IntervalRequest>, JsonRejection>,
) -> Response {
    match body(payload) {
        Ok(request) => blocking(state, move |s| api::handle_set_interval(s, request)).await,
        Err(response) => response,
    }
}

async fn start(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_start).await
}

async fn stop(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_stop).await
}

async fn set_patient(
    State(state): State<SharedState>,
    payload: Result<Json<api::PatientRequest>, JsonRejection>,
) -> Response {
    match body(payload) {
        Ok(request) => blocking(state, move |s| api::handle_set_patient(s, request)).await,
        Err(response) => response,
    }
}

async fn set_device(
    State(state): State<SharedState>,
    payload: Result<Json<api::DeviceRequest>, JsonRejection>,
) -> Response {
    match body(payload) {
        Ok(request) => blocking(state, move |s| api::handle_set_device(s, request)).await,
        Err(response) => response,
    }
}

async fn set_custom_range(
    State(state): State<SharedState>,
    payload: Result<Json<api::CustomRangeRequest>, JsonRejection>,
) -> Response {
    match body(payload) {
        Ok(request) => blocking(state, move |s| api::handle_set_custom_range(s, request)).await,
        Err(response) => response,
    }
}

async fn clear_custom_range(
    State(state): State<SharedState>,
    Path(vital): Path<String>,
) -> Response {
    blocking(state, move |s| api::handle_clear_custom_range(s, &vital)).await
}

async fn update_destination(
    State(state): State<SharedState>,
    Path(destination): Path<String>,
    payload: Result<Json<api::DestinationUpdate>, JsonRejection>,
) -> Response {
    match body(payload) {
        Ok(update) => {
            blocking(state, move |s| api::handle_update_destination(s, &destination, update)).await
        }
        Err(response) => response,
    }
}

async fn connectivity_test(State(state): State<SharedState>) -> Response {
    blocking(state, api::handle_connectivity_test).await
}

async fn metrics_handler(State(state): State<SharedState>) -> Response {
    metrics::set_running(state.engine.is_running());
    match metrics::render() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn not_found() -> Response {
    ApiResponse::<()>::not_found("API endpoint not found").into_response()
}

// ============================================================================
// Router / serve
// ============================================================================

pub fn router(state: SharedState) -> Router {
    let cors = state.config.server.cors;

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/vitals/current", get(current_vitals))
        .route("/api/vitals/single", get(single_vitals))
        .route("/api/vitals/ranges", get(ranges))
        .route("/api/simulator/config", get(get_config))
        .route("/api/simulator/status", get(get_status))
        .route("/api/simulator/mode", post(set_mode))
        .route("/api/simulator/interval", post(set_interval))
        .route("/api/simulator/start", post(start))
        .route("/api/simulator/stop", post(stop))
        .route("/api/simulator/patient", post(set_patient))
        .route("/api/simulator/device", post(set_device))
        .route("/api/vitals/custom-range", post(set_custom_range))
        .route("/api/vitals/custom-range/{vital}", delete(clear_custom_range))
        .route("/api/destinations/{destination}", post(update_destination))
        .route("/api/connectivity/test", post(connectivity_test))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve until Ctrl+C.
pub async fn serve(state: SharedState) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
}
