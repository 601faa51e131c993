// REST API endpoints for the dispatcher

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dispatcher::{Dispatcher, GenerateResponse};
use crate::error::DispatchError;
use crate::registry::HandlerDescriptor;
use crate::types::ConversationId;

pub type AppState = Arc<Dispatcher>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/handlers", get(list_handlers))
        .route("/conversations/{id}/generate", post(generate))
        .route("/conversations/{id}/history", get(conversation_history))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// A `DispatchError` rendered as `{status, kind, reason}`.
pub struct ApiError(DispatchError);

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "kind": self.0.kind(),
            "reason": self.0.to_string(),
        });
        (self.0.status_code(), Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    message: String,
}

/// Liveness plus a count of what the dispatcher is holding.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "handlers": state.registry().len(),
        "conversations": state.conversations().len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn list_handlers(State(state): State<AppState>) -> Json<Value> {
    let handlers: Vec<HandlerDescriptor> = state.registry().snapshot().into_values().collect();

    Json(json!({
        "handlers": handlers,
        "count": handlers.len(),
    }))
}

async fn generate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let id = ConversationId::new(id);
    let response = state.generate(&id, payload.message).await?;
    Ok(Json(response))
}

async fn conversation_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = ConversationId::new(id);
    let turns = state.history(&id).await?;

    Ok(Json(json!({
        "conversation": id,
        "turns": turns,
        "count": turns.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::decision::Decision;
    use crate::history::ConversationTurn;
    use crate::registry::HandlerCatalog;
    use crate::resolver::{CollaboratorFuture, DecisionResolver, HydratedChoice, Hydrator};

    /// Replies with the handler named in the request, or echoes it.
    struct KeywordResolver;

    impl DecisionResolver for KeywordResolver {
        fn resolve<'a>(
            &'a self,
            history: &'a [ConversationTurn],
            handlers: &'a HandlerCatalog,
        ) -> CollaboratorFuture<'a, Decision> {
            Box::pin(async move {
                let last = history.last().ok_or_else(|| anyhow!("empty history"))?;
                if last.message == "fail" {
                    return Err(anyhow!("resolver offline"));
                }
                if handlers.contains_key(last.message.as_str()) || last.message == "ghost" {
                    return Ok(Decision::render(
                        last.message.as_str(),
                        "Rendered",
                        json!({"data": [1]}),
                    ));
                }
                Ok(Decision::reply(format!("echo: {}", last.message)))
            })
        }
    }

    struct NoHydrator;

    impl Hydrator for NoHydrator {
        fn hydrate<'a>(
            &'a self,
            _history: &'a [ConversationTurn],
            _handler: &'a HandlerDescriptor,
            _tool_result: &'a Value,
        ) -> CollaboratorFuture<'a, HydratedChoice> {
            Box::pin(async { Err(anyhow!("not expected")) })
        }
    }

    async fn app() -> Router {
        let dispatcher = Dispatcher::builder()
            .resolver(Arc::new(KeywordResolver))
            .hydrator(Arc::new(NoHydrator))
            .build()
            .unwrap();
        dispatcher
            .register("chart", "Chart", json!({"type": "object"}), vec![])
            .await
            .unwrap();
        create_router(Arc::new(dispatcher))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_generate(id: &str, message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/conversations/{}/generate", id))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "message": message }).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app().await, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["handlers"], 1);
        assert_eq!(body["conversations"], 0);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_list_handlers() {
        let (status, body) = send(app().await, get("/handlers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["handlers"][0]["name"], "chart");
        assert_eq!(body["handlers"][0]["contextTools"], json!([]));
    }

    #[tokio::test]
    async fn test_generate_text_and_component() {
        let app = app().await;

        let (status, body) = send(app.clone(), post_generate("c1", "hello")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"handlerName": null, "properties": null, "message": "echo: hello"})
        );

        let (status, body) = send(app.clone(), post_generate("c1", "chart")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["handlerName"], "chart");
        assert_eq!(body["properties"], json!({"data": [1]}));

        let (status, body) = send(app, get("/conversations/c1/history")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 4);
        assert_eq!(body["turns"][0]["sender"], "requester");
        assert_eq!(body["turns"][3]["message"], "Rendered");
    }

    #[tokio::test]
    async fn test_generate_errors_carry_kind() {
        let app = app().await;

        let (status, body) = send(app.clone(), post_generate("c1", "ghost")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "handler_not_found");

        let (status, body) = send(app, post_generate("c1", "fail")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "resolver");
    }

    #[tokio::test]
    async fn test_unknown_conversation_history_is_404() {
        let (status, body) = send(app().await, get("/conversations/nobody/history")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "conversation_not_found");
    }
}
