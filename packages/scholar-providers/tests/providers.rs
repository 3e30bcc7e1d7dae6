use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use scholar_config::EmbeddingProviderConfig;
use scholar_providers::{EmbeddingProvider, HttpEmbedding};

fn embedding_config() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "local".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: "secret".to_string(),
		path: "/embeddings".to_string(),
		model: "test".to_string(),
		dimensions: 4,
		timeout_ms: 1_000,
		default_headers: Map::new(),
		batch_size: 256,
		batch_delay_ms: 0,
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		scholar_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut default_headers = Map::new();

	default_headers.insert("x-retries".to_string(), Value::from(3));

	let err = scholar_providers::auth_headers("secret", &default_headers)
		.expect_err("Expected header validation error.");

	assert!(err.to_string().contains("Default header values must be strings."));
}

#[tokio::test]
async fn empty_input_skips_the_network() {
	let cfg = embedding_config();
	let vectors = HttpEmbedding.embed(&cfg, &[]).await.expect("Empty input must succeed.");

	assert!(vectors.is_empty());
}
