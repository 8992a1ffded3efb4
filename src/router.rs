use crate::error::{FetchError, StatusError};
use crate::request::StatusArgs;
use crate::status::{StatusResult, StatusService};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
struct Message {
    message: String,
}

pub fn new_router(service: Arc<StatusService>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status_query).post(status_body))
        .route("/list", get(status_query).post(status_body))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn healthz() -> Json<Message> {
    Json(Message {
        message: "ok".into(),
    })
}

async fn status_query(
    State(service): State<Arc<StatusService>>,
    Query(args): Query<StatusArgs>,
) -> Response {
    respond(service.status(&args).await)
}

async fn status_body(
    State(service): State<Arc<StatusService>>,
    Json(args): Json<StatusArgs>,
) -> Response {
    respond(service.status(&args).await)
}

fn respond(result: Result<StatusResult, StatusError>) -> Response {
    match result {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            let code = error_status(&err);
            if code.is_server_error() {
                tracing::error!(error = %err, "status request failed");
            } else {
                tracing::info!(error = %err, "status request rejected");
            }
            (
                code,
                Json(Message {
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn error_status(err: &StatusError) -> StatusCode {
    match err {
        StatusError::NoContextsFound | StatusError::Fetch(FetchError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        StatusError::MissingParameter(_) | StatusError::InvalidDocument(_) => {
            StatusCode::BAD_REQUEST
        }
        StatusError::Fetch(FetchError::Other(_)) => StatusCode::BAD_GATEWAY,
        StatusError::Load { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
