use std::sync::Arc;

use config::StdFsTemplateFilePort;
use integration_tests::{TestLogger, TestSettings, mock_provider::MockProvider, write_embedding_provider};
use llm_gateway::{Gateway, UniformEmbeddingRequest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn gateway(dir: &TempDir, base_url: &str, max_batch_size: usize) -> Gateway {
    write_embedding_provider(dir, "mock", base_url, "mock-embed", max_batch_size);

    let port = Arc::new(StdFsTemplateFilePort::new(dir.path().to_path_buf()));
    let mut settings = TestSettings::default();
    *settings.embedding_provider_id.lock().unwrap() = Some("mock".to_string());
    let logger = Arc::new(TestLogger::default());

    Gateway::new(port, vec![], vec!["mock".to_string()], Arc::new(settings), logger).unwrap()
}

#[tokio::test]
async fn results_preserve_input_order_regardless_of_batching() {
    let provider = MockProvider::start("unused").await;
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, &provider.base_url(), 2).await;
    let ctx = CancellationToken::new();

    let request = UniformEmbeddingRequest {
        input: vec!["a".to_string(), "bb".to_string(), "ccc".to_string(), "dddd".to_string(), "eeeee".to_string()],
    };

    let response = gateway.get_embeddings(request, &ctx).await.unwrap();

    assert_eq!(response.results.len(), 5);
    for (i, result) in response.results.iter().enumerate() {
        assert_eq!(result.index, i);
    }
    // The mock embeds each input as [len, len+1, len+2].
    assert_eq!(response.results[0].embedding, vec![1.0, 2.0, 3.0]);
    assert_eq!(response.results[4].embedding, vec![5.0, 6.0, 7.0]);
}

#[tokio::test]
async fn batch_size_larger_than_template_max_is_split_into_multiple_requests() {
    let provider = MockProvider::start("unused").await;
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, &provider.base_url(), 2).await;
    let ctx = CancellationToken::new();

    let request = UniformEmbeddingRequest {
        input: (0..5).map(|i| format!("input-{i}")).collect(),
    };

    gateway.get_embeddings(request, &ctx).await.unwrap();

    assert_eq!(provider.call_count(), 3, "5 inputs over a max batch size of 2 is 3 requests (2, 2, 1)");
}

#[tokio::test]
async fn a_cached_input_is_not_refetched_on_the_next_call() {
    let provider = MockProvider::start("unused").await;
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, &provider.base_url(), 10).await;
    let ctx = CancellationToken::new();

    let first = UniformEmbeddingRequest {
        input: vec!["a".to_string(), "bb".to_string()],
    };
    gateway.get_embeddings(first, &ctx).await.unwrap();
    assert_eq!(provider.call_count(), 1);

    // Second call: "a" is cached, "ccc" is new. Only the residual should dispatch.
    let second = UniformEmbeddingRequest {
        input: vec!["a".to_string(), "ccc".to_string()],
    };
    let response = gateway.get_embeddings(second, &ctx).await.unwrap();

    assert_eq!(provider.call_count(), 2, "only the uncached input should trigger a new request");
    assert_eq!(response.results[0].embedding, vec![1.0, 2.0, 3.0]);
    assert_eq!(response.results[1].embedding, vec![3.0, 4.0, 5.0]);
}
