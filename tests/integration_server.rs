#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end tests: FAQ file -> Bedrock-shaped embeddings -> LanceDB -> HTTP
use axum::body::Body;
use axum::http::{Request, StatusCode};
use faq_search::config::Config;
use faq_search::embeddings::build_embedder;
use faq_search::ingest::{IngestMode, prepare_store};
use faq_search::query::FaqAnswer;
use faq_search::server::{AppState, create_router};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path_regex};
use wiremock::{Mock, MockServer, Request as MockRequest, Respond, ResponseTemplate};

const DIM: usize = 256;

/// Answers Titan invoke calls with a bag-of-words vector of the input text
struct TitanResponder;

impl Respond for TitanResponder {
    fn respond(&self, request: &MockRequest) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request should be JSON");
        let text = body["inputText"].as_str().expect("inputText should be set");

        let mut vector = vec![0.0_f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-6);
        vector.iter_mut().for_each(|v| *v /= norm);

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddingsByType": { "float": vector },
            "inputTextTokenCount": text.split_whitespace().count(),
        }))
    }
}

async fn start_bedrock() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/model/.+/invoke$"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(TitanResponder)
        .mount(&mock_server)
        .await;
    mock_server
}

fn write_faqs(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("faqs.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "1", "question": "What is your return policy?", "answer": "You can return items within 30 days."},
            {"id": "2", "question": "How long does shipping take?", "answer": "Standard shipping takes 3-5 business days."},
            {"id": "3", "question": "Do you offer gift cards?", "answer": "Yes, in any amount from $10."}
        ]"#,
    )
    .expect("should write faq file");
    path
}

fn test_config(bedrock: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.embedding.endpoint = Some(bedrock.uri());
    config.embedding.api_key = Some("test-key".to_string());
    config.embedding.dimension = DIM as u32;
    config.vector_store.uri = dir.path().join("vectors").to_string_lossy().into_owned();
    config.ingest.faq_file = Some(write_faqs(dir));
    config
}

fn query_request(question: &str) -> Request<Body> {
    Request::post("/query")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "question": question }).to_string(),
        ))
        .expect("should build request")
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_then_query_over_http() {
    let bedrock = start_bedrock().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&bedrock, &temp_dir);

    let embedder = build_embedder(&config.embedding).expect("should build embedder");
    let (store, report) = prepare_store(&config, &embedder, IngestMode::SkipIfPopulated)
        .await
        .expect("should ingest");
    assert_eq!(report.inserted, 3);
    assert_eq!(report.total_rows, 3);

    let app = create_router(AppState::new(store, embedder, config.server.top_k));

    let resp = app
        .clone()
        .oneshot(query_request("What is your return policy?"))
        .await
        .expect("should respond");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("should read body");
    let answer: FaqAnswer = serde_json::from_slice(&body).expect("should parse answer");
    assert_eq!(
        answer.answer.as_deref(),
        Some("You can return items within 30 days.")
    );

    let resp = app
        .oneshot(query_request("how long does shipping take"))
        .await
        .expect("should respond");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("should read body");
    let answer: FaqAnswer = serde_json::from_slice(&body).expect("should parse answer");
    assert_eq!(
        answer.question.as_deref(),
        Some("How long does shipping take?")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_keeps_existing_rows() {
    let bedrock = start_bedrock().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&bedrock, &temp_dir);
    let embedder = build_embedder(&config.embedding).expect("should build embedder");

    let (store, _) = prepare_store(&config, &embedder, IngestMode::SkipIfPopulated)
        .await
        .expect("first startup should ingest");
    drop(store);

    let (_, report) = prepare_store(&config, &embedder, IngestMode::SkipIfPopulated)
        .await
        .expect("second startup should succeed");
    assert!(report.skipped);
    assert_eq!(report.total_rows, 3);

    let (_, report) = prepare_store(&config, &embedder, IngestMode::Reset)
        .await
        .expect("reset startup should succeed");
    assert!(!report.skipped);
    assert_eq!(report.inserted, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_abort_ingestion() {
    let bedrock = start_bedrock().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = test_config(&bedrock, &temp_dir);
    config.embedding.api_key = Some("wrong-key".to_string());

    let embedder = build_embedder(&config.embedding).expect("should build embedder");
    let result = prepare_store(&config, &embedder, IngestMode::SkipIfPopulated).await;

    assert!(result.is_err());
}
