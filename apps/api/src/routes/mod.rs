pub mod health;

use axum::{
    extract::{DefaultBodyLimit, FromRequest},
    http::{header, HeaderName},
    middleware,
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::rate_limit;
use crate::state::AppState;
use crate::{chat, cv, email};

/// Room for multipart boundaries and the text fields around the file part.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// JSON body extractor whose rejections become `AppError::Validation`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub type NoStoreHeaders = [(HeaderName, &'static str); 3];

/// Headers attached to every answer, upload and send response.
pub fn no_store_headers() -> NoStoreHeaders {
    [
        (header::CACHE_CONTROL, "no-store"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
}

/// Every API route carries its own limiter as route middleware, so the
/// check runs before any extractor touches the request body.
pub fn build_router(state: AppState) -> Router {
    let limits = state.limiters.clone();
    let upload_body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/chat",
            post(chat::handlers::handle_chat).route_layer(middleware::from_fn_with_state(
                limits.chat,
                rate_limit::enforce,
            )),
        )
        .route(
            "/api/cv/upload",
            post(cv::handlers::handle_upload)
                .layer(DefaultBodyLimit::max(upload_body_limit))
                .route_layer(middleware::from_fn_with_state(
                    limits.upload,
                    rate_limit::enforce,
                )),
        )
        .route(
            "/api/cv/list",
            get(cv::handlers::handle_list).route_layer(middleware::from_fn_with_state(
                limits.list,
                rate_limit::enforce,
            )),
        )
        .route(
            "/api/email",
            post(email::handlers::handle_send_email).route_layer(
                middleware::from_fn_with_state(limits.email, rate_limit::enforce),
            ),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::{Config, LlmConfig, RateLimitSettings};
    use crate::cv::extract::{ExtractError, TextExtractor};
    use crate::cv::store::ResumeStore;
    use crate::email::notifier::{Notifier, NotifyError, NotifyOutcome};
    use crate::email::templates::EmailTemplates;
    use crate::email::EmailMessage;
    use crate::llm_client::{AnswerService, LlmError};
    use crate::rate_limit::RateLimiters;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    /// Treats the stored bytes as the document text.
    struct RawTextExtractor;

    #[async_trait]
    impl TextExtractor for RawTextExtractor {
        async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ExtractError::NotFoundOrUnreadable(e.to_string()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    enum StubAnswer {
        EchoPrompt,
        Empty,
    }

    #[async_trait]
    impl AnswerService for StubAnswer {
        async fn answer(&self, prompt: &str) -> Result<String, LlmError> {
            match self {
                StubAnswer::EchoPrompt => Ok(prompt.to_string()),
                StubAnswer::Empty => Err(LlmError::UpstreamEmptyResponse),
            }
        }
    }

    struct RecordingNotifier {
        outcome: NotifyOutcome,
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: EmailMessage) -> Result<NotifyOutcome, NotifyError> {
            if self.outcome == NotifyOutcome::Sent {
                self.sent.lock().unwrap().push(message);
            }
            Ok(self.outcome)
        }
    }

    struct TestApp {
        router: Router,
        store: ResumeStore,
        notifier: Arc<RecordingNotifier>,
        _dir: TempDir,
    }

    fn limits(chat: u32, upload: u32, list: u32, email: u32) -> RateLimitSettings {
        RateLimitSettings {
            window: Duration::from_secs(60),
            chat,
            upload,
            list,
            email,
        }
    }

    fn test_app(rate_limits: RateLimitSettings, answer: StubAnswer, outcome: NotifyOutcome) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let default_resume: PathBuf = dir.path().join("resume.pdf");
        std::fs::write(&default_resume, "Default Resume: Rust, Go").unwrap();

        let config = Config {
            port: 0,
            rust_log: "debug".to_string(),
            cv_dir: dir.path().join("cvs"),
            default_resume_path: default_resume,
            max_upload_bytes: 1024,
            llm: LlmConfig {
                api_url: "http://127.0.0.1:9/unused".to_string(),
                api_key: None,
                model: "test".to_string(),
            },
            smtp: None,
            rate_limits,
        };
        let store = ResumeStore::new(config.cv_dir.clone());
        let notifier = Arc::new(RecordingNotifier {
            outcome,
            sent: Mutex::new(Vec::new()),
        });

        let state = AppState {
            limiters: RateLimiters::new(
                rate_limits.chat(),
                rate_limits.upload(),
                rate_limits.list(),
                rate_limits.email(),
            ),
            store: store.clone(),
            extractor: Arc::new(RawTextExtractor),
            answerer: Arc::new(answer),
            notifier: notifier.clone(),
            templates: Arc::new(EmailTemplates::new().unwrap()),
            config,
        };

        TestApp {
            router: build_router(state),
            store,
            notifier,
            _dir: dir,
        }
    }

    fn default_app() -> TestApp {
        test_app(limits(20, 20, 60, 10), StubAnswer::EchoPrompt, NotifyOutcome::Sent)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn json_post(uri: &str, body: &str, client: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(ip) = client {
            builder = builder.header("x-forwarded-for", ip);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload_request(name: &str, email: &str, content_type: &str, file: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        for (field, value) in [("name", name), ("email", email)] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/cv/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = default_app();
        let (status, _, body) = send(&app.router, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_answers_from_default_resume() {
        let app = default_app();
        let (status, headers, body) = send(
            &app.router,
            json_post("/api/chat", r#"{"question":"What languages?"}"#, None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let answer = body["answer"].as_str().unwrap();
        assert!(answer.contains("Resume:\nDefault Resume: Rust, Go"));
        assert!(answer.ends_with("Question: What languages?"));
        assert_eq!(headers["cache-control"], "no-store");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "no-referrer");
    }

    #[tokio::test]
    async fn test_chat_uses_stored_resume_when_id_resolves() {
        let app = default_app();
        app.store
            .save("JaneDoe", "jane@example.com", b"Jane Doe: Staff Engineer")
            .await
            .unwrap();

        let (status, _, body) = send(
            &app.router,
            json_post("/api/chat", r#"{"question":"Role?","resumeId":"JaneDoe"}"#, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["answer"].as_str().unwrap().contains("Jane Doe: Staff Engineer"));

        let (_, _, fallback) = send(
            &app.router,
            json_post("/api/chat", r#"{"question":"Role?","resumeId":"nobody"}"#, None),
        )
        .await;
        assert!(fallback["answer"].as_str().unwrap().contains("Default Resume"));
    }

    #[tokio::test]
    async fn test_chat_missing_resume_is_not_found() {
        let app = default_app();
        std::fs::remove_file(app._dir.path().join("resume.pdf")).unwrap();

        let (status, _, body) =
            send(&app.router, json_post("/api/chat", r#"{"question":"Skills?"}"#, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_chat_invalid_input() {
        let app = default_app();
        for bad in [r#"{"question":""}"#, r#"{"nope":1}"#, "not json"] {
            let (status, _, body) = send(&app.router, json_post("/api/chat", bad, None)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {bad}");
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_whitespace_only_text_is_not_empty() {
        let app = default_app();
        let (status, _, _) =
            send(&app.router, json_post("/api/chat", r#"{"question":" "}"#, None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = send(
            &app.router,
            json_post(
                "/api/email",
                r#"{"recipient":"jane@example.com","subject":" ","body":" "}"#,
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Email sent successfully");
    }

    #[tokio::test]
    async fn test_chat_empty_upstream_answer_is_bad_gateway() {
        let app = test_app(limits(20, 20, 60, 10), StubAnswer::Empty, NotifyOutcome::Sent);
        let (status, _, body) =
            send(&app.router, json_post("/api/chat", r#"{"question":"Skills?"}"#, None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "LLM_EMPTY_RESPONSE");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_before_body_is_read() {
        let app = test_app(limits(1, 20, 60, 10), StubAnswer::EchoPrompt, NotifyOutcome::Sent);

        let (first, _, _) = send(&app.router, json_post("/api/chat", "not json", None)).await;
        assert_eq!(first, StatusCode::BAD_REQUEST);

        let (second, _, body) = send(
            &app.router,
            json_post("/api/chat", r#"{"question":"Skills?"}"#, None),
        )
        .await;
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_client() {
        let app = test_app(limits(2, 20, 60, 10), StubAnswer::EchoPrompt, NotifyOutcome::Sent);
        let body = r#"{"question":"Skills?"}"#;

        for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
            let (status, _, _) = send(
                &app.router,
                json_post("/api/chat", body, Some("203.0.113.1, 10.0.0.1")),
            )
            .await;
            assert_eq!(status, expected);
        }

        let (other, _, _) = send(&app.router, json_post("/api/chat", body, Some("203.0.113.2"))).await;
        assert_eq!(other, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_endpoints_have_independent_limiters() {
        let app = test_app(limits(1, 20, 1, 10), StubAnswer::EchoPrompt, NotifyOutcome::Sent);
        let body = r#"{"question":"Skills?"}"#;

        send(&app.router, json_post("/api/chat", body, None)).await;
        let (chat, _, _) = send(&app.router, json_post("/api/chat", body, None)).await;
        assert_eq!(chat, StatusCode::TOO_MANY_REQUESTS);

        let (list, _, _) = send(&app.router, get_request("/api/cv/list")).await;
        assert_eq!(list, StatusCode::OK);
        let (list_again, _, _) = send(&app.router, get_request("/api/cv/list")).await;
        assert_eq!(list_again, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_upload_stores_notifies_and_lists() {
        let app = default_app();

        let (status, headers, body) = send(
            &app.router,
            upload_request("Jane Doe", "jane@example.com", "application/pdf", b"%PDF-1.4"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "JaneDoe");
        assert_eq!(body["name"], "JaneDoe.pdf");
        assert_eq!(body["hasThumbnail"], false);
        assert_eq!(headers["cache-control"], "no-store");

        let sent = app.notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@example.com");
        assert_eq!(sent[0].subject, "CV Processed: JaneDoe.pdf");

        let (status, _, list) = send(&app.router, get_request("/api/cv/list")).await;
        assert_eq!(status, StatusCode::OK);
        let items = list["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "JaneDoe");
        assert_eq!(items[0]["size"], 8);
        assert_eq!(items[0]["email"], "jane@example.com");
        assert!(items[0]["mtimeMs"].is_i64());
    }

    #[tokio::test]
    async fn test_upload_succeeds_when_email_is_unconfigured() {
        let app = test_app(limits(20, 20, 60, 10), StubAnswer::EchoPrompt, NotifyOutcome::Skipped);
        let (status, _, _) = send(
            &app.router,
            upload_request("cv", "jane@example.com", "application/pdf", b"%PDF"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(app.store.resolve("cv").await.is_some());
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let app = default_app();

        let (status, _, _) = send(
            &app.router,
            upload_request("Jane", "jane@example.com", "image/png", b"png"),
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (status, _, _) = send(
            &app.router,
            upload_request("Jane", "jane@example.com", "application/pdf", &[b'x'; 2048]),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (status, _, body) = send(
            &app.router,
            upload_request("", "jane@example.com", "application/pdf", b"%PDF"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Missing name");

        let (status, _, body) = send(&app.router, json_post("/api/cv/upload", "{}", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Expected multipart/form-data");
    }

    #[tokio::test]
    async fn test_send_email() {
        let app = default_app();
        let (status, headers, body) = send(
            &app.router,
            json_post(
                "/api/email",
                r#"{"recipient":"jane@example.com","subject":"Hi","body":"<b>Hello</b>"}"#,
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Email sent successfully");
        assert_eq!(headers["referrer-policy"], "no-referrer");

        let sent = app.notifier.sent.lock().unwrap().clone();
        assert_eq!(sent[0].text_body, "<b>Hello</b>");
        assert_eq!(sent[0].html_body.as_deref(), Some("<p>&lt;b&gt;Hello&lt;/b&gt;</p>"));
    }

    #[tokio::test]
    async fn test_send_email_validation_and_unconfigured() {
        let app = test_app(limits(20, 20, 60, 10), StubAnswer::EchoPrompt, NotifyOutcome::Skipped);

        let (status, _, _) = send(
            &app.router,
            json_post("/api/email", r#"{"recipient":"nope","subject":"Hi","body":"x"}"#, None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = send(
            &app.router,
            json_post(
                "/api/email",
                r#"{"recipient":"jane@example.com","subject":"Hi","body":"x"}"#,
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "EMAIL_ERROR");
    }
}
