//! HTTP invocation boundary: `POST /api/agent` runs one pipeline.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tracing::{error, info};

use serpwatch_core::{AnalysisInput, Pipeline};

const MISSING_INPUT: &str = "Keyword and domain are required";
const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Clone)]
pub(crate) struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
}

pub(crate) fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/agent", post(run_agent))
        .route("/health", get(health))
        .with_state(AppState { pipeline })
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn run_agent(
    State(state): State<AppState>,
    Json(payload): Json<AnalysisInput>,
) -> impl IntoResponse {
    if is_blank(&payload.keyword) || is_blank(&payload.domain) {
        let body = Json(ErrorResponse {
            error: MISSING_INPUT,
        });
        return (StatusCode::BAD_REQUEST, body).into_response();
    }

    info!(
        keyword = payload.keyword.as_deref().unwrap_or_default(),
        domain = payload.domain.as_deref().unwrap_or_default(),
        "rank check requested"
    );

    let pipeline = state.pipeline.clone();
    match tokio::spawn(async move { pipeline.run(payload).await }).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(join_error) => {
            error!(error = %join_error, "pipeline task aborted");
            let body = Json(ErrorResponse {
                error: INTERNAL_ERROR,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use serpwatch_core::{AnalysisState, Stage, StateUpdate};
    use tower::ServiceExt;

    use super::*;

    struct Advise;

    #[async_trait]
    impl Stage for Advise {
        fn name(&self) -> &'static str {
            "advise"
        }

        async fn run(&self, _state: &AnalysisState) -> StateUpdate {
            let mut update = StateUpdate::our_position(-1);
            update.analysis = Some("Publish a buying guide.".into());
            update
        }
    }

    struct Explode;

    #[async_trait]
    impl Stage for Explode {
        fn name(&self) -> &'static str {
            "explode"
        }

        async fn run(&self, _state: &AnalysisState) -> StateUpdate {
            panic!("stage blew up");
        }
    }

    fn router_with(stage: impl Stage + 'static) -> Router {
        let pipeline = Pipeline::builder().stage(stage).build().unwrap();
        build_router(Arc::new(pipeline))
    }

    async fn post_agent(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::post("/api/agent")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn returns_final_state() {
        let (status, json) = post_agent(
            router_with(Advise),
            r#"{"keyword":"kitchens","domain":"example.com","region":"moscow"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["keyword"], "kitchens");
        assert_eq!(json["region"], "moscow");
        assert_eq!(json["ourPosition"], -1);
        assert_eq!(json["analysis"], "Publish a buying guide.");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn rejects_missing_domain() {
        let (status, json) = post_agent(router_with(Advise), r#"{"keyword":"kitchens"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], MISSING_INPUT);
    }

    #[tokio::test]
    async fn rejects_blank_keyword() {
        let (status, json) = post_agent(
            router_with(Advise),
            r#"{"keyword":"  ","domain":"example.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], MISSING_INPUT);
    }

    #[tokio::test]
    async fn pipeline_panic_is_internal_error() {
        let (status, json) = post_agent(
            router_with(Explode),
            r#"{"keyword":"kitchens","domain":"example.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let response = router_with(Advise).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
