//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod auth;
pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket quiz-taking at `/ws`
/// - quiz CRUD, scoring, import and uploads under `/api/v1/...`
/// - in-memory blob serving under `/blobs`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/quizzes", get(http::http_list_published).post(http::http_create_quiz))
        .route("/api/v1/me/quizzes", get(http::http_my_quizzes))
        .route(
            "/api/v1/quizzes/:id",
            get(http::http_get_quiz).put(http::http_update_quiz).delete(http::http_delete_quiz),
        )
        .route("/api/v1/quizzes/:id/score", post(http::http_score))
        .route("/api/v1/q/:slug", get(http::http_get_by_slug))
        .route("/api/v1/import", post(http::http_import))
        .route("/api/v1/images", post(http::http_upload_image))
        .route("/blobs/*path", get(http::http_get_blob))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::import::tests::DOC;
    use crate::logic::tests::test_state;

    fn app() -> Router {
        build_router(Arc::new(test_state()))
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn import(app: &Router, doc: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/import")
            .body(Body::from(doc.to_string()))
            .expect("request");
        call(app, req).await
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let (status, body) = call(&app(), request(Method::GET, "/api/v1/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "backend": "memory" }));
    }

    #[tokio::test]
    async fn create_take_and_score_over_http() {
        let app = app();
        let (status, mut draft) = import(&app, DOC).await;
        assert_eq!(status, StatusCode::OK);
        draft["isPublished"] = json!(true);

        let (status, _) = call(&app, request(Method::POST, "/api/v1/quizzes", None, Some(draft.clone()))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            call(&app, request(Method::POST, "/api/v1/quizzes", Some("bogus"), Some(draft.clone()))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, quiz) =
            call(&app, request(Method::POST, "/api/v1/quizzes", Some("alice-token"), Some(draft))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = quiz["id"].as_str().expect("id").to_string();
        let slug = quiz["slug"].as_str().expect("slug").to_string();

        let (status, playable) = call(&app, request(Method::GET, &format!("/api/v1/q/{slug}"), None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(playable["questions"].as_array().map(Vec::len), Some(2));
        assert!(playable["questions"][0]["answers"][0].get("weight").is_none());

        // Cocoa (Winter 3) + Beach (Summer 1.5)
        let responses: Vec<Value> = quiz["questions"]
            .as_array()
            .expect("questions")
            .iter()
            .zip([1usize, 0])
            .map(|(q, pick)| json!({ "questionId": q["id"], "answerId": q["answers"][pick]["id"] }))
            .collect();
        let (status, sheet) = call(
            &app,
            request(Method::POST, &format!("/api/v1/quizzes/{id}/score"), None, Some(json!({ "responses": responses }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sheet["winner"]["name"], "Winter");
        assert_eq!(sheet["counted"], 2);

        let (status, dash) = call(&app, request(Method::GET, "/api/v1/me/quizzes", Some("alice-token"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dash["stats"]["quizCount"], 1);
        assert_eq!(dash["stats"]["totalTakes"], 1);
    }

    #[tokio::test]
    async fn unknown_type_in_import_is_a_bad_request() {
        let doc = DOC.replacen("\"Cocoa\", \"personalityType\": \"Winter\"", "\"Cocoa\", \"personalityType\": \"Ghost\"", 1);
        let (status, body) = import(&app(), &doc).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "IMPORT_ERROR");
        assert!(body["error"]["message"].as_str().unwrap_or_default().contains("Ghost"));
    }

    #[tokio::test]
    async fn only_the_owner_may_delete() {
        let app = app();
        let (_, draft) = import(&app, DOC).await;
        let (_, quiz) = call(&app, request(Method::POST, "/api/v1/quizzes", Some("alice-token"), Some(draft))).await;
        let uri = format!("/api/v1/quizzes/{}", quiz["id"].as_str().expect("id"));

        let (status, _) = call(&app, request(Method::DELETE, &uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        // Unpublished: invisible to anonymous viewers.
        let (status, _) = call(&app, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, request(Method::DELETE, &uri, Some("alice-token"), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, request(Method::GET, &uri, Some("alice-token"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn uploaded_images_are_served_back() {
        let app = app();
        let body = json!({ "kind": "cover", "filename": "c.png", "contentType": "image/png", "dataBase64": "data:image/png;base64,AQID" });
        let (status, out) = call(&app, request(Method::POST, "/api/v1/images", Some("alice-token"), Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        let url = out["url"].as_str().expect("url");
        let path = url.strip_prefix("http://blobs.test/").expect("memory url");
        assert!(path.starts_with("alice/covers/"));

        let res = app
            .clone()
            .oneshot(request(Method::GET, &format!("/blobs/{path}"), None, None))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], &[1, 2, 3]);

        let bad = json!({ "kind": "cover", "filename": "c.txt", "contentType": "text/plain", "dataBase64": "AQID" });
        let (status, _) = call(&app, request(Method::POST, "/api/v1/images", Some("alice-token"), Some(bad))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
