//! Remote embedding providers against a mock HTTP server: auth headers,
//! batch ordering, error mapping, and bounded retries.

#![cfg(any(feature = "openai", feature = "gemini"))]

use docsearch::{EmbeddingProvider, SearchError};
use httpmock::prelude::*;
use serde_json::json;

#[cfg(feature = "openai")]
mod openai {
    use super::*;
    use docsearch::OpenAiEmbeddingProvider;

    fn provider(server: &MockServer) -> OpenAiEmbeddingProvider {
        OpenAiEmbeddingProvider::new("test-key")
            .unwrap()
            .with_dimensions(4)
            .with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn batch_embeddings_come_back_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(
                        json!({
                            "model": "text-embedding-3-small",
                            "input": ["first", "second"],
                            "dimensions": 4
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "data": [
                        { "embedding": [1.0, 0.0, 0.0, 0.0] },
                        { "embedding": [0.0, 1.0, 0.0, 0.0] }
                    ]
                }));
            })
            .await;

        let vectors = provider(&server).embed_batch(&["first", "second"]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]]);
    }

    #[tokio::test]
    async fn client_errors_surface_without_retrying() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(401)
                    .json_body(json!({ "error": { "message": "invalid api key" } }));
            })
            .await;

        let err = provider(&server).embed("anything").await.unwrap_err();

        assert_eq!(mock.hits_async().await, 1);
        assert!(matches!(err, SearchError::ProviderUnavailable { .. }));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn server_errors_are_retried_a_bounded_number_of_times() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(503);
            })
            .await;

        let err = provider(&server).embed("anything").await.unwrap_err();

        assert_eq!(mock.hits_async().await, 3);
        assert!(matches!(err, SearchError::ProviderUnavailable { .. }));
    }

    #[tokio::test]
    async fn undersized_vectors_are_a_dimension_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200)
                    .json_body(json!({ "data": [{ "embedding": [1.0, 0.0] }] }));
            })
            .await;

        let err = provider(&server).embed("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 4, actual: 2 }));
    }

    #[tokio::test]
    async fn mismatched_response_count_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200)
                    .json_body(json!({ "data": [{ "embedding": [1.0, 0.0, 0.0, 0.0] }] }));
            })
            .await;

        let err = provider(&server).embed_batch(&["first", "second"]).await.unwrap_err();
        assert!(matches!(err, SearchError::ProviderUnavailable { .. }));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(OpenAiEmbeddingProvider::new("").is_err());
    }
}

#[cfg(feature = "gemini")]
mod gemini {
    use super::*;
    use docsearch::GeminiEmbeddingProvider;

    fn provider(server: &MockServer) -> GeminiEmbeddingProvider {
        GeminiEmbeddingProvider::new("test-key")
            .unwrap()
            .with_output_dimensionality(3)
            .with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn single_embedding_uses_the_api_key_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-embedding-001:embedContent")
                    .header("x-goog-api-key", "test-key");
                then.status(200)
                    .json_body(json!({ "embedding": { "values": [0.6, 0.8, 0.0] } }));
            })
            .await;

        let vector = provider(&server).embed("relational database").await.unwrap();

        mock.assert_async().await;
        assert_eq!(vector, vec![0.6, 0.8, 0.0]);
    }

    #[tokio::test]
    async fn batch_embeddings_come_back_in_input_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-embedding-001:batchEmbedContents");
                then.status(200).json_body(json!({
                    "embeddings": [
                        { "values": [1.0, 0.0, 0.0] },
                        { "values": [0.0, 1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let vectors = provider(&server).embed_batch(&["first", "second"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn server_errors_are_retried_a_bounded_number_of_times() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-embedding-001:embedContent");
                then.status(500)
                    .json_body(json!({ "error": { "message": "internal" } }));
            })
            .await;

        let err = provider(&server).embed("anything").await.unwrap_err();

        assert_eq!(mock.hits_async().await, 3);
        assert!(matches!(err, SearchError::ProviderUnavailable { .. }));
    }

    #[tokio::test]
    async fn undersized_vectors_are_a_dimension_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-embedding-001:embedContent");
                then.status(200).json_body(json!({ "embedding": { "values": [0.5] } }));
            })
            .await;

        let err = provider(&server).embed("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 3, actual: 1 }));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(GeminiEmbeddingProvider::new("").is_err());
    }
}
