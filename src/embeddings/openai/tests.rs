use super::*;
use crate::config::ProviderKind;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: ProviderKind::Api,
        api_key: Some("sk-test".to_string()),
        base_url: format!("{}/v1", server.uri()),
        model: "test-embedder".to_string(),
        ..EmbeddingConfig::default()
    }
}

#[test]
fn endpoint_url_joins_paths() {
    assert_eq!(
        endpoint_url("https://api.openai.com/v1", "embeddings"),
        "https://api.openai.com/v1/embeddings"
    );
    assert_eq!(
        endpoint_url("http://localhost:8080/v1/", "chat/completions"),
        "http://localhost:8080/v1/chat/completions"
    );
}

#[test]
fn missing_api_key_is_rejected() {
    let config = EmbeddingConfig {
        provider: ProviderKind::Api,
        api_key: None,
        ..EmbeddingConfig::default()
    };

    let error = OpenAiEmbedder::new(&config).expect_err("should require an API key");
    assert!(error.to_string().contains("EMBEDDING_API_KEY"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embeddings_are_returned_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({ "model": "test-embedder" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [
                { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
            ],
            "model": "test-embedder"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(&config_for(&server)).expect("should build client");
    let vectors = embedder
        .embed(&["first".to_string(), "second".to_string()])
        .expect("should embed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_surface_as_network_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(&config_for(&server)).expect("should build client");
    let error = embedder
        .embed(&["text".to_string()])
        .expect_err("should fail on 401");

    match error {
        RagError::Network(message) => {
            assert!(message.contains("401"));
            assert!(message.contains("invalid api key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_response_is_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::new(&config_for(&server)).expect("should build client");
    let result = embedder.embed(&["text".to_string()]);

    assert!(matches!(result, Err(RagError::Embedding(_))));
}
