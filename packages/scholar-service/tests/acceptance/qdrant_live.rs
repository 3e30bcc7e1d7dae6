use std::sync::Arc;

use scholar_domain::LooseValue;
use scholar_service::HybridSearchRequest;
use scholar_storage::qdrant::QdrantIndex;
use scholar_testkit::TestCollections;

use super::{build_service, hash_embedding, loose};

#[tokio::test]
#[ignore = "Requires external Qdrant. Set SCHOLAR_QDRANT_URL to run."]
async fn qdrant_round_trip_honors_filters() {
	let Some(url) = scholar_testkit::env_qdrant_url() else {
		eprintln!(
			"Skipping qdrant_round_trip_honors_filters; set SCHOLAR_QDRANT_URL to run this test."
		);

		return;
	};
	let collections = TestCollections::new(url);
	let collection = collections.collection_name("lessons");
	let mut cfg = scholar_testkit::test_config();

	cfg.storage.qdrant.url = collections.url().to_string();

	let index =
		Arc::new(QdrantIndex::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client."));
	let service = build_service(cfg, index, hash_embedding());
	let documents = vec![
		scholar_testkit::document("q-science", "중력 실험 사과 낙하", "과학", 6, &["중력"]),
		scholar_testkit::document("q-social", "중력 주제 토론 자료", "사회", 6, &["중력"]),
	];
	let report = service.add_documents(&collection, documents).await.expect("Ingestion failed.");

	assert_eq!(report.indexed, 2);

	let results = service
		.hybrid_search(HybridSearchRequest {
			collection: collection.clone(),
			query: "중력 실험".to_string(),
			filter: Some(loose(&[("subject", LooseValue::from("과학"))])),
			k: 5,
			alpha: None,
		})
		.await
		.expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, "q-science");

	let samples = service.sample_metadata(&collection, 10).await.expect("Sampling failed.");

	assert_eq!(samples.len(), 2);

	collections.cleanup().await.expect("Failed to clean up Qdrant collections.");
}
