pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::proposals::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/proposals",
            get(handlers::handle_list_proposals).post(handlers::handle_create_proposal),
        )
        .route(
            "/api/v1/proposals/:id",
            get(handlers::handle_get_proposal)
                .patch(handlers::handle_rename_proposal)
                .delete(handlers::handle_delete_proposal),
        )
        .route(
            "/api/v1/proposals/:id/documents",
            post(handlers::handle_upload_document),
        )
        .route(
            "/api/v1/proposals/:id/analysis/refresh",
            post(handlers::handle_refresh_analysis),
        )
        .route(
            "/api/v1/proposals/:id/document",
            post(handlers::handle_generate_document),
        )
        .route(
            "/api/v1/proposals/:id/artifacts/:name",
            get(handlers::handle_get_artifact).put(handlers::handle_update_artifact),
        )
        .route(
            "/api/v1/proposals/:id/artifacts/:name/download",
            get(handlers::handle_download_artifact),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::engine::tests::{ScriptedGenerator, ACME_ANALYSIS};
    use crate::analysis::{AnalysisConfig, AnalysisEngine};
    use crate::config::Config;
    use crate::extraction::ExtractorRegistry;
    use crate::proposals::ProposalService;
    use crate::storage::FsBlobStore;
    use crate::store::FsProposalStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn app(replies: Vec<String>) -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let config = Config::for_data_dir(dir.path());
        tokio::fs::create_dir_all(config.uploads_dir()).await.unwrap();

        let store = FsProposalStore::open(config.records_dir()).await.unwrap();
        let blobs = FsBlobStore::new(config.blobs_dir());
        let generator = Arc::new(ScriptedGenerator::new(replies.into_iter().map(Ok).collect()));
        let engine = AnalysisEngine::new(
            generator,
            AnalysisConfig {
                models: config.models.clone(),
                deadline: Duration::from_secs(30),
            },
        );
        let proposals = ProposalService::new(
            Arc::new(store),
            Arc::new(blobs),
            ExtractorRegistry::default(),
            engine,
        );
        let state = AppState {
            proposals,
            config: Arc::new(config),
        };
        (dir, build_router(state))
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

    fn get(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: String, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_upload(uri: String, filename: &str, content: &str) -> Request<Body> {
        let boundary = "rfp-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
            Content-Disposition: form-data; name=\"kind\"\r\n\r\n\
            rfp\r\n\
            --{boundary}\r\n\
            Content-Disposition: form-data; name=\"last_modified\"\r\n\r\n\
            1700000000000\r\n\
            --{boundary}\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            {content}\r\n\
            --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = app(vec![]).await;
        let (status, body) = send(&app, get("/health".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_proposal_lifecycle_over_http() {
        let (_dir, app) = app(vec![]).await;
        let user = Uuid::new_v4();

        let (status, list) = send(&app, get(format!("/api/v1/proposals?user_id={user}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        let first_id = list[0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/proposals/{first_id}?user_id={user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "LAST_PROPOSAL");

        let (status, created) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/proposals".to_string(),
                json!({"user_id": user, "name": "Second"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Second");

        let (status, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/proposals/{first_id}?user_id={user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &app,
            get(format!("/api/v1/proposals/{first_id}?user_id={user}")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_upload_analyze_and_read_artifact() {
        let (_dir, app) = app(vec![ACME_ANALYSIS.to_string()]).await;
        let user = Uuid::new_v4();
        let (_, list) = send(&app, get(format!("/api/v1/proposals?user_id={user}"))).await;
        let id = list[0]["id"].as_str().unwrap().to_string();

        let (status, outcome) = send(
            &app,
            multipart_upload(
                format!("/api/v1/proposals/{id}/documents?user_id={user}"),
                "acme.txt",
                "Organization: Acme Corp. Must support SSO.",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["analysis"]["overview"]["organization"], "Acme Corp");
        assert_eq!(outcome["artifacts"].as_array().unwrap().len(), 4);
        assert_eq!(outcome["cache_hit"], false);

        let (status, artifact) = send(
            &app,
            get(format!("/api/v1/proposals/{id}/artifacts/requirements.md?user_id={user}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(artifact["content"].as_str().unwrap().contains("Must support SSO"));

        let (status, body) = send(
            &app,
            json_request(
                "PUT",
                format!("/api/v1/proposals/{id}/artifacts/variables.json"),
                json!({"user_id": user, "content": "not json"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_all_models_failing_maps_to_bad_gateway() {
        let (_dir, app) = app(vec![]).await;
        let user = Uuid::new_v4();
        let (_, list) = send(&app, get(format!("/api/v1/proposals?user_id={user}"))).await;
        let id = list[0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            multipart_upload(
                format!("/api/v1/proposals/{id}/documents?user_id={user}"),
                "acme.txt",
                "Organization: Acme Corp.",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "ALL_MODELS_FAILED");
    }
}
