use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Headroom for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = (state.config.max_upload_size as usize).saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Metadata relay
        .route(
            "/api/metadata",
            get(handlers::list_metadata).post(handlers::create_metadata),
        )
        .route(
            "/api/metadata/:file_type/:name",
            delete(handlers::delete_metadata),
        )
        // Media workflow
        .route("/api/media", get(handlers::list_media))
        .route(
            "/api/media",
            post(handlers::upload_media).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/media/:name", delete(handlers::delete_media))
        // Object content (local backend)
        .route("/objects/*name", get(handlers::serve_object))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .route(
            "/_internal/reconcile",
            get(handlers::reconcile_report).post(handlers::reconcile_repair),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::testutil::{
        test_state, test_state_with, test_workflow, FlakyMetadataStore, FlakyObjectStore,
    };
    use crate::workflow::MediaWorkflow;

    fn upload_request(file_name: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--xyz\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n--xyz--\r\n");

        Request::post("/api/media")
            .header("content-type", "multipart/form-data; boundary=xyz")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let response = router
            .oneshot(Request::get("/api/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metadata_route_rejects_wrong_method() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let response = router
            .oneshot(Request::put("/api/metadata").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_upload_with_failed_metadata_write_names_the_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let base = test_workflow(&dir);
        let metadata = Arc::new(FlakyMetadataStore::new(Arc::clone(base.metadata())));
        metadata.fail_create(true);
        let workflow = MediaWorkflow::new(Arc::clone(base.objects()), metadata);
        let state = test_state_with(&dir, workflow);
        let router = create_router(Arc::clone(&state));

        let response = router
            .oneshot(upload_request("clip.mp4", b"frames"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = json_body(response).await;
        let orphan = body["orphan"].as_str().unwrap().to_string();
        assert!(orphan.ends_with("-clip.mp4"));
        assert!(body["error"].as_str().unwrap().contains(&orphan));

        // The object stays; no record was written
        assert!(state.workflow.objects().exists(&orphan).await.unwrap());
        assert!(base.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_key_conflict_is_409() {
        let dir = tempfile::tempdir().unwrap();
        let base = test_workflow(&dir);
        let objects = Arc::new(FlakyObjectStore::new(Arc::clone(base.objects())));
        objects.conflict_put(true);
        let workflow = MediaWorkflow::new(objects, Arc::clone(base.metadata()));
        let router = create_router(test_state_with(&dir, workflow));

        let response = router
            .oneshot(upload_request("a.png", b"second"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("-a.png"));
        assert!(body.get("orphan").is_none());
        assert!(base.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repair_keeps_orphans_inside_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let fresh = format!("{}-fresh.png", Utc::now().timestamp_millis());
        state
            .workflow
            .objects()
            .put(&fresh, Bytes::from_static(b"f"), "image/png")
            .await
            .unwrap();
        let router = create_router(Arc::clone(&state));

        let response = router
            .oneshot(
                Request::post("/_internal/reconcile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["stats"]["orphans_deleted"], 0);
        assert_eq!(body["stats"]["orphans_skipped"], 1);
        assert!(state.workflow.objects().exists(&fresh).await.unwrap());
    }
}
