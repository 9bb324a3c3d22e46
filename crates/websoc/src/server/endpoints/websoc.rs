//! Aggregation endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregate::generate_correlation_id;
use crate::error::AggregateError;
use crate::server::types::{ApiErrorType, AppState, WebsocRequest};

/// Header a caller may use to supply its own correlation ID.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Converts AggregateError to API response.
fn aggregate_error_to_response(error: AggregateError) -> Response {
    let message = match &error {
        AggregateError::InvalidInput { .. } => "Malformed sub-query list",
        AggregateError::UpstreamUnavailable { .. } => "WebSoc is unavailable, try again later",
        AggregateError::Cancelled => "Request cancelled",
    };
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}

/// POST /websoc
///
/// Runs every sub-query in the body against WebSoc and returns the merged,
/// sorted tree.
pub async fn post_websoc(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<WebsocRequest>, JsonRejection>,
) -> Response {
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id);

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(
                correlation_id = %correlation_id,
                error = %rejection.body_text(),
                "Rejected malformed request body"
            );
            return ApiErrorType::from((
                StatusCode::BAD_REQUEST,
                "Malformed sub-query list",
                Some(rejection.body_text()),
            ))
            .into_response();
        }
    };

    info!(
        correlation_id = %correlation_id,
        sub_queries = body.queries.len(),
        "POST /websoc"
    );

    let cancel = CancellationToken::new();
    // Cancels in-flight work if the client goes away and this future is dropped.
    let _guard = cancel.clone().drop_guard();

    let aggregation = s.aggregator.aggregate(body.queries, &correlation_id, &cancel);
    match tokio::time::timeout(s.request_deadline, aggregation).await {
        Ok(Ok(tree)) => (StatusCode::OK, Json(tree)).into_response(),
        Ok(Err(e)) => {
            error!(correlation_id = %correlation_id, error = %e, "Aggregation failed");
            aggregate_error_to_response(e)
        }
        Err(_) => {
            cancel.cancel();
            warn!(
                correlation_id = %correlation_id,
                deadline_ms = s.request_deadline.as_millis() as u64,
                "Aggregation exceeded request deadline"
            );
            ApiErrorType::from((
                StatusCode::GATEWAY_TIMEOUT,
                "WebSoc aggregation timed out",
                None,
            ))
            .into_response()
        }
    }
}
