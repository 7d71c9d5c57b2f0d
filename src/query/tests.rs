use super::*;
use crate::config::{EmbeddingConfig, LlmConfig, ProviderKind};
use crate::database::lancedb::{ConnectionPool, DistanceMetric, EmbeddingRecord};
use crate::embeddings::create_embedding_provider;
use crate::llm::ANSWER_ERROR_PREFIX;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn result(source_file: &str, chunk_index: u32, document: &str, distance: f32) -> QueryResult {
    QueryResult {
        id: format!("{source_file}_{chunk_index}"),
        document: document.to_string(),
        similarity: 1.0 / (1.0 + distance),
        source_file: source_file.to_string(),
        chunk_index,
        distance,
    }
}

#[test]
fn context_is_numbered_with_sources() {
    let context = format_context(&[
        result("a.md", 0, "Intro\nHello", 0.0),
        result("guide/b.md", 3, "Body\nWorld", 1.5),
    ]);

    assert_eq!(
        context,
        "[1] (source: a.md, chunk 0)\nIntro\nHello\n\n[2] (source: guide/b.md, chunk 3)\nBody\nWorld"
    );
}

#[test]
fn empty_results_give_empty_context() {
    assert_eq!(format_context(&[]), "");
}

async fn mount_query_embedding(server: &MockServer, query: &str, embedding: [f32; 2]) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(serde_json::json!({ "input": [query] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{ "index": 0, "embedding": embedding }]
        })))
        .mount(server)
        .await;
}

async fn retriever_for(server: &MockServer, store_dir: &TempDir) -> Retriever {
    let config = EmbeddingConfig {
        provider: ProviderKind::Api,
        api_key: Some("sk-test".to_string()),
        base_url: server.uri(),
        ..EmbeddingConfig::default()
    };
    let provider = create_embedding_provider(&config, 8000).expect("should build provider");

    let mut pool = ConnectionPool::new();
    let connection = pool
        .connect(store_dir.path(), "rag")
        .await
        .expect("should connect");
    let collection = Collection::get_or_create(&connection, "docs", 2, DistanceMetric::L2, true)
        .await
        .expect("should create collection");

    collection
        .insert(vec![
            EmbeddingRecord::new("a.md", 0, "Intro\nHello".to_string(), Some(vec![1.0, 0.0])),
            EmbeddingRecord::new("a.md", 1, "Body\nWorld".to_string(), Some(vec![0.0, 1.0])),
            EmbeddingRecord::new("b.md", 0, "Elsewhere".to_string(), Some(vec![3.0, 3.0])),
        ])
        .await
        .expect("should insert");

    Retriever::new(collection, Arc::new(provider))
}

#[tokio::test(flavor = "multi_thread")]
async fn search_returns_nearest_first() {
    let server = MockServer::start().await;
    mount_query_embedding(&server, "Hello", [0.9, 0.1]).await;
    let store_dir = TempDir::new().expect("should create store dir");
    let retriever = retriever_for(&server, &store_dir).await;

    let results = retriever.search("Hello", 3).await.expect("search should succeed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, "a.md_0");
    assert_eq!(results[2].id, "b.md_0");
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_passes_retrieved_context_to_llm() {
    let server = MockServer::start().await;
    mount_query_embedding(&server, "What is said?", [1.0, 0.0]).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Intro\\nHello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let store_dir = TempDir::new().expect("should create store dir");
    let retriever = retriever_for(&server, &store_dir).await;
    let llm = LlmClient::new(&LlmConfig {
        api_key: Some("sk-chat".to_string()),
        base_url: server.uri(),
        ..LlmConfig::default()
    })
    .expect("should build llm client");

    let answer = retriever
        .ask(&llm, "What is said?", 1)
        .await
        .expect("ask should succeed");

    assert_eq!(answer.text, "Hello.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].id, "a.md_0");
    assert_eq!(answer.sources[0].similarity, 1.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_reports_llm_failure_as_text() {
    let server = MockServer::start().await;
    mount_query_embedding(&server, "Anything?", [0.0, 1.0]).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let store_dir = TempDir::new().expect("should create store dir");
    let retriever = retriever_for(&server, &store_dir).await;
    let llm = LlmClient::new(&LlmConfig {
        api_key: Some("sk-chat".to_string()),
        base_url: server.uri(),
        ..LlmConfig::default()
    })
    .expect("should build llm client");

    let answer = retriever
        .ask(&llm, "Anything?", 2)
        .await
        .expect("llm failure should not be an error");

    assert!(answer.text.starts_with(ANSWER_ERROR_PREFIX));
    assert_eq!(answer.sources.len(), 2);
}
