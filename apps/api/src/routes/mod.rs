pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::critique::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        // Pipeline
        .route(
            "/api/v1/sessions/:id/document",
            post(handlers::handle_upload_document),
        )
        .route("/api/v1/sessions/:id/job", put(handlers::handle_confirm_job))
        .route(
            "/api/v1/sessions/:id/job/reopen",
            post(handlers::handle_reopen_job),
        )
        .route(
            "/api/v1/sessions/:id/analysis",
            post(handlers::handle_run_analysis),
        )
        .route(
            "/api/v1/sessions/:id/power-ups/:kind",
            post(handlers::handle_run_power_up).delete(handlers::handle_clear_power_up),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::critique::critic::Critic;
    use crate::critique::registry::SessionRegistry;
    use crate::ingest::Extractor;
    use crate::llm_client::mock::{MockReply, MockTransport};
    use crate::llm_client::LlmClient;

    const BOUNDARY: &str = "critic-test-boundary";

    fn app(transport: Arc<MockTransport>) -> Router {
        let llm = LlmClient::with_transport(transport);
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            max_upload_bytes: 64 * 1024,
            salary_currency: "BRL".to_string(),
        };
        build_router(AppState {
            critic: Arc::new(Critic::new(
                llm.clone(),
                Extractor::new(llm),
                config.salary_currency.clone(),
            )),
            sessions: SessionRegistry::new(),
            config,
        })
    }

    fn routed_transport() -> Arc<MockTransport> {
        Arc::new(MockTransport::with_responder(|request| {
            if request.tools.is_some() {
                MockReply::text(r#"{"matchPercentage": 64, "gaps": ["Go"]}"#)
            } else {
                MockReply::text(r#"{"name": "Jane Doe"}"#)
            }
        }))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn upload_request(uri: &str, file_name: &str, content_type: Option<&str>, data: &str) -> Request<Body> {
        let content_type_line = content_type
            .map(|ct| format!("Content-Type: {ct}\r\n"))
            .unwrap_or_default();
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             {content_type_line}\r\n\
             {data}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_session(app: &Router) -> String {
        let (status, body) = send(app, empty_request("POST", "/api/v1/sessions")).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(routed_transport());
        let (status, body) = send(&app, empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_full_session_flow() {
        let app = app(routed_transport());
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) = send(
            &app,
            upload_request(&format!("{base}/document"), "cv.txt", Some("text/plain"), "Jane Doe\nRust"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "plain_text");
        assert_eq!(body["profile"]["name"], "Jane Doe");

        let (status, body) = send(
            &app,
            json_request("PUT", &format!("{base}/job"), serde_json::json!({ "text": "Rust role" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "job_confirmed");

        let (status, body) = send(&app, empty_request("POST", &format!("{base}/analysis"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matchPercentage"], 64);

        let (status, body) = send(&app, empty_request("POST", &format!("{base}/power-ups/pitch"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "pitch");

        let (_, body) = send(&app, empty_request("GET", &base)).await;
        assert_eq!(body["phase"], "analysis_ready");
        assert_eq!(body["power_ups"]["pitch"]["status"], "done");

        let (status, _) = send(&app, empty_request("DELETE", &format!("{base}/power-ups/pitch"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, empty_request("GET", &base)).await;
        assert_eq!(body["power_ups"]["pitch"]["status"], "idle");
    }

    #[tokio::test]
    async fn test_upload_media_type_falls_back_to_extension() {
        let app = app(routed_transport());
        let id = create_session(&app).await;

        let (status, body) = send(
            &app,
            upload_request(&format!("/api/v1/sessions/{id}/document"), "notes.txt", None, "Jane"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "plain_text");
    }

    #[tokio::test]
    async fn test_blank_upload_is_unprocessable() {
        let transport = routed_transport();
        let app = app(transport.clone());
        let id = create_session(&app).await;

        let (status, body) = send(
            &app,
            upload_request(&format!("/api/v1/sessions/{id}/document"), "cv.txt", Some("text/plain"), "   "),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_job_is_rejected() {
        let app = app(routed_transport());
        let id = create_session(&app).await;

        let (status, body) = send(
            &app,
            json_request("PUT", &format!("/api/v1/sessions/{id}/job"), serde_json::json!({ "text": "  " })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analysis_without_document_conflicts() {
        let app = app(routed_transport());
        let id = create_session(&app).await;

        let (status, body) = send(&app, empty_request("POST", &format!("/api/v1/sessions/{id}/analysis"))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = app(routed_transport());
        let uri = format!("/api/v1/sessions/{}", uuid::Uuid::new_v4());

        let (status, _) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unauthorized_inference_surfaces_distinct_code() {
        let transport = Arc::new(MockTransport::sequence(vec![MockReply::Status(401)]));
        let app = app(transport);
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");
        send(
            &app,
            upload_request(&format!("{base}/document"), "cv.txt", Some("text/plain"), "Jane"),
        )
        .await;
        send(
            &app,
            json_request("PUT", &format!("{base}/job"), serde_json::json!({ "text": "role" })),
        )
        .await;

        let (status, body) = send(&app, empty_request("POST", &format!("{base}/analysis"))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "INFERENCE_UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let app = app(routed_transport());
        let id = create_session(&app).await;
        let big = "x".repeat(128 * 1024);

        let response = app
            .clone()
            .oneshot(upload_request(
                &format!("/api/v1/sessions/{id}/document"),
                "cv.txt",
                Some("text/plain"),
                &big,
            ))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
