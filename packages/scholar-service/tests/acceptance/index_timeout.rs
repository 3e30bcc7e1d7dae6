use std::{sync::Arc, time::Duration};

use tokio::time::Instant;

use scholar_domain::LooseValue;
use scholar_service::{DiversitySearchRequest, HybridSearchRequest};
use scholar_testkit::{FailingIndex, HangingIndex};

use super::{COLLECTION, build_service, hash_embedding, loose};

fn request() -> HybridSearchRequest {
	HybridSearchRequest {
		collection: COLLECTION.to_string(),
		query: "중력 실험".to_string(),
		filter: Some(loose(&[("subject", LooseValue::from("과학"))])),
		k: 5,
		alpha: None,
	}
}

#[tokio::test(start_paused = true)]
async fn hanging_index_returns_empty_within_budget() {
	let mut cfg = scholar_testkit::test_config();

	cfg.retrieval.index_timeout_ms = 100;
	cfg.retrieval.search_timeout_ms = 1_000;

	let service = build_service(cfg, Arc::new(HangingIndex), hash_embedding());
	let started = Instant::now();
	let results = service.hybrid_search(request()).await.expect("Search failed.");

	assert!(results.is_empty());
	assert!(started.elapsed() <= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn search_budget_bounds_the_whole_call() {
	let mut cfg = scholar_testkit::test_config();

	cfg.retrieval.index_timeout_ms = 5_000;
	cfg.retrieval.search_timeout_ms = 300;

	let service = build_service(cfg, Arc::new(HangingIndex), hash_embedding());
	let started = Instant::now();
	let results = service.hybrid_search(request()).await.expect("Search failed.");

	assert!(results.is_empty());
	assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unreachable_index_yields_empty_results() {
	let service =
		build_service(scholar_testkit::test_config(), Arc::new(FailingIndex), hash_embedding());
	let results = service.hybrid_search(request()).await.expect("Search failed.");

	assert!(results.is_empty());
	assert!(service.fallback(COLLECTION, 5).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn diversity_search_on_hanging_index_returns_empty() {
	let mut cfg = scholar_testkit::test_config();

	cfg.retrieval.index_timeout_ms = 100;
	cfg.retrieval.search_timeout_ms = 1_000;

	let service = build_service(cfg, Arc::new(HangingIndex), hash_embedding());
	let results = service
		.diversity_search(
			DiversitySearchRequest {
				collection: COLLECTION.to_string(),
				query: "빛의 굴절".to_string(),
				k: 3,
				lambda: None,
				exclude_ids: Vec::new(),
				filter: None,
			},
			None,
		)
		.await
		.expect("Search failed.");

	assert!(results.is_empty());
}
