use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{status, websoc};

mod endpoints;
mod types;

pub use endpoints::websoc::CORRELATION_HEADER;
pub use types::{AppState, WebsocRequest};

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(status::get_health))
        .route("/websoc", post(websoc::post_websoc))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, FnFetcher, SubQueryFetcher};
    use crate::config::AggregatorConfig;
    use crate::error::FetchError;
    use crate::types::{RawPartialTree, RawSchool, SubQuery};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_with(fetcher: Arc<dyn SubQueryFetcher>) -> Arc<AppState> {
        let config = AggregatorConfig {
            base_backoff_ms: 1,
            ..Default::default()
        };
        Arc::new(AppState {
            aggregator: Aggregator::with_config(fetcher, config),
            request_deadline: Duration::from_secs(5),
        })
    }

    fn post(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/websoc")
            .header("content-type", "application/json")
            .header(CORRELATION_HEADER, "test-request")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let fetcher: Arc<dyn SubQueryFetcher> =
            Arc::new(FnFetcher(|_q: SubQuery| async { Ok::<_, FetchError>(RawPartialTree::default()) }));
        let response = create_router(state_with(fetcher))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_websoc_success() {
        let fetcher: Arc<dyn SubQueryFetcher> = Arc::new(FnFetcher(|q: SubQuery| async move {
            Ok::<_, FetchError>(RawPartialTree {
                schools: vec![RawSchool {
                    name: format!("School of {}", q.department.unwrap_or_default()),
                    ..Default::default()
                }],
            })
        }));
        let response = create_router(state_with(fetcher))
            .oneshot(post(json!({
                "queries": [
                    { "term": "2024 Fall", "department": "MATH" },
                    { "term": "2024 Fall", "department": "BIO SCI" }
                ]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["schools"][0]["name"], "School of BIO SCI");
        assert_eq!(body["schools"][1]["name"], "School of MATH");
    }

    #[tokio::test]
    async fn test_post_websoc_empty_is_bad_request() {
        let fetcher: Arc<dyn SubQueryFetcher> =
            Arc::new(FnFetcher(|_q: SubQuery| async { Ok::<_, FetchError>(RawPartialTree::default()) }));
        let response = create_router(state_with(fetcher))
            .oneshot(post(json!({ "queries": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_websoc_missing_term_is_bad_request() {
        let fetcher: Arc<dyn SubQueryFetcher> =
            Arc::new(FnFetcher(|_q: SubQuery| async { Ok::<_, FetchError>(RawPartialTree::default()) }));
        let response = create_router(state_with(fetcher))
            .oneshot(post(json!({ "queries": [{ "department": "COMPSCI" }] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Malformed sub-query list");
        assert!(body["context"].as_str().unwrap().contains("term"));
    }

    #[tokio::test]
    async fn test_post_websoc_broken_json_is_bad_request() {
        let fetcher: Arc<dyn SubQueryFetcher> =
            Arc::new(FnFetcher(|_q: SubQuery| async { Ok::<_, FetchError>(RawPartialTree::default()) }));
        let request = Request::builder()
            .method("POST")
            .uri("/websoc")
            .header("content-type", "application/json")
            .body(Body::from("{\"queries\": ["))
            .unwrap();
        let response = create_router(state_with(fetcher)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Malformed sub-query list");
    }

    #[tokio::test]
    async fn test_post_websoc_upstream_down() {
        let fetcher: Arc<dyn SubQueryFetcher> = Arc::new(FnFetcher(|_q: SubQuery| async {
            Err::<RawPartialTree, _>(FetchError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }));
        let response = create_router(state_with(fetcher))
            .oneshot(post(json!({
                "queries": [{ "term": "2024 Fall", "geCategory": "GE-2" }]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["context"], "WebSoc failed to respond too many times");
    }
}
