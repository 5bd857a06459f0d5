use super::*;
use serde_json::json;
use crate::config::AwsCredentials;
use wiremock::matchers::{body_json, header, header_exists, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INVOKE_PATH: &str = "/model/amazon.titan-embed-text-v2%3A0/invoke";

fn config_for(server: &MockServer, dimension: u32) -> EmbeddingConfig {
    EmbeddingConfig {
        endpoint: Some(server.uri()),
        dimension,
        api_key: Some("test-key".to_string()),
        ..EmbeddingConfig::default()
    }
}

async fn embed_on_blocking_pool(client: BedrockClient, text: &'static str) -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(move || client.embed(text))
        .await
        .expect("blocking task should not panic")
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        region: "eu-central-1".to_string(),
        dimension: 512,
        ..EmbeddingConfig::default()
    };
    let client = BedrockClient::new(&config).expect("should create client");

    assert_eq!(client.model, "amazon.titan-embed-text-v2:0");
    assert_eq!(client.dimension, 512);
    assert_eq!(
        client.endpoint.host_str(),
        Some("bedrock-runtime.eu-central-1.amazonaws.com")
    );
    assert_eq!(client.api_key, None);
    assert_eq!(
        client.invoke_url().expect("should build url").path(),
        INVOKE_PATH
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_titan_request_and_reads_float_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "inputText": "What is your return policy?",
            "dimensions": 256,
            "normalize": true,
            "embeddingTypes": ["float"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vec![0.0_f32; 256],
            "embeddingsByType": { "float": vec![0.25_f32; 256] },
            "inputTextTokenCount": 6
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BedrockClient::new(&config_for(&server, 256)).expect("should create client");
    let embedding = embed_on_blocking_pool(client, "What is your return policy?")
        .await
        .expect("embedding should succeed");

    assert_eq!(embedding.len(), 256);
    assert!(embedding.iter().all(|v| (*v - 0.25).abs() < f32::EPSILON));
}

#[tokio::test(flavor = "multi_thread")]
async fn falls_back_to_plain_embedding_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vec![0.5_f32; 256],
            "inputTextTokenCount": 2
        })))
        .mount(&server)
        .await;

    let client = BedrockClient::new(&config_for(&server, 256)).expect("should create client");
    let embedding = embed_on_blocking_pool(client, "hello")
        .await
        .expect("embedding should succeed");

    assert_eq!(embedding, vec![0.5_f32; 256]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_request_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Authentication failed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BedrockClient::new(&config_for(&server, 256)).expect("should create client");
    let err = embed_on_blocking_pool(client, "hello")
        .await
        .expect_err("403 should be an error");

    assert!(err.to_string().contains("403"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddingsByType": { "float": [0.1, 0.2, 0.3] }
        })))
        .mount(&server)
        .await;

    let client = BedrockClient::new(&config_for(&server, 256)).expect("should create client");
    let err = embed_on_blocking_pool(client, "hello")
        .await
        .expect_err("short vector should be rejected");

    assert!(err.to_string().contains("expected 256"), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = BedrockClient::new(&config_for(&server, 256)).expect("should create client");
    assert!(embed_on_blocking_pool(client, "hello").await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn static_credentials_sign_with_sigv4() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .and(header_regex(
            "authorization",
            r"^AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/\d{8}/us-east-1/bedrock/aws4_request, SignedHeaders=.*host.*, Signature=[0-9a-f]{64}$",
        ))
        .and(header_exists("x-amz-date"))
        .and(header("x-amz-security-token", "session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddingsByType": { "float": vec![0.5_f32; 256] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        endpoint: Some(server.uri()),
        dimension: 256,
        api_key: None,
        aws_credentials: Some(AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: Some("session-token".to_string()),
        }),
        ..EmbeddingConfig::default()
    };
    let client = BedrockClient::new(&config).expect("should create client");

    let embedding = embed_on_blocking_pool(client, "signed request")
        .await
        .expect("signed request should be accepted");
    assert_eq!(embedding.len(), 256);
}

#[tokio::test(flavor = "multi_thread")]
async fn api_key_takes_precedence_over_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddingsByType": { "float": vec![0.5_f32; 256] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, 256);
    config.aws_credentials = Some(AwsCredentials {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: None,
    });
    let client = BedrockClient::new(&config).expect("should create client");

    let embedding = embed_on_blocking_pool(client, "bearer request")
        .await
        .expect("bearer request should be accepted");
    assert_eq!(embedding.len(), 256);
}
