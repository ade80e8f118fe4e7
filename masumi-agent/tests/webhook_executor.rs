use axum::{Json, Router, http::StatusCode, routing::post};
use masumi_agent::executor::{ExecutionError, TaskExecutor, WebhookExecutor};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

struct MockWebhook {
    url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl MockWebhook {
    async fn spawn() -> Self {
        let app = Router::new()
            .route(
                "/webhook/echo",
                post(|Json(body): Json<Value>| async move {
                    format!("processed: {}", body["text"].as_str().unwrap_or_default())
                }),
            )
            .route(
                "/webhook/broken",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "workflow crashed") }),
            )
            .route(
                "/webhook/inspect",
                post(|Json(body): Json<Value>| async move { Json(body) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/webhook", addr),
            handle,
        }
    }

    fn executor(&self, path: &str) -> WebhookExecutor {
        WebhookExecutor::new(format!("{}/{}", self.url, path), Duration::from_secs(5)).unwrap()
    }
}

impl Drop for MockWebhook {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn input(text: &str) -> BTreeMap<String, String> {
    let mut input_data = BTreeMap::new();
    input_data.insert("text".to_string(), text.to_string());
    input_data
}

#[tokio::test]
async fn webhook_response_body_becomes_result() {
    let webhook = MockWebhook::spawn().await;

    let result = webhook
        .executor("echo")
        .execute(Uuid::new_v4(), &input("hello"))
        .await
        .unwrap();

    assert_eq!(result, json!("processed: hello"));
}

#[tokio::test]
async fn webhook_receives_text_and_job_id() {
    let webhook = MockWebhook::spawn().await;
    let job_id = Uuid::new_v4();

    let result = webhook
        .executor("inspect")
        .execute(job_id, &input("what is sent"))
        .await
        .unwrap();

    let echoed: Value = serde_json::from_str(result.as_str().unwrap()).unwrap();
    assert_eq!(echoed["text"], "what is sent");
    assert_eq!(echoed["job_id"], job_id.to_string());
}

#[tokio::test]
async fn webhook_error_status_is_rejected() {
    let webhook = MockWebhook::spawn().await;

    let err = webhook
        .executor("broken")
        .execute(Uuid::new_v4(), &input("hello"))
        .await
        .unwrap_err();

    match err {
        ExecutionError::Rejected { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "workflow crashed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_webhook_is_request_error() {
    let executor = WebhookExecutor::new("http://127.0.0.1:9/webhook", Duration::from_secs(1)).unwrap();

    let err = executor
        .execute(Uuid::new_v4(), &input("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Request(_)));
}
