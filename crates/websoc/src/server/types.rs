use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregator, SubQueryFetcher};
use crate::types::SubQuery;

/// Shared state for every handler.
pub struct AppState {
    pub aggregator: Aggregator<Arc<dyn SubQueryFetcher>>,
    /// Deadline for a whole aggregation request
    pub request_deadline: Duration,
}

/// Body of `POST /websoc`. The list is already split by the caller.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsocRequest {
    pub queries: Vec<SubQuery>,
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiErrorType {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, error, context): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            error: error.to_string(),
            context,
        }
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
