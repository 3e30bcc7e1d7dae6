use std::{collections::HashSet, sync::Arc};

use scholar_domain::Document;
use scholar_service::{DiversitySearchRequest, SearchSession};
use scholar_testkit::{KeyedEmbedding, TEST_VECTOR_DIM, YieldingIndex};

use super::{COLLECTION, build_service, hash_embedding, memory_index, seed};

const QUERY: &str = "energy conservation";
const DUPLICATE_TEXT: &str = "energy is conserved in closed systems";
const DISTINCT_TEXTS: [&str; 5] = [
	"photosynthesis converts sunlight",
	"volcanoes release magma",
	"magnets attract iron",
	"rivers erode canyons",
	"bacteria divide rapidly",
];

fn axis(weights: &[(usize, f32)]) -> Vec<f32> {
	let mut out = vec![0.0; TEST_VECTOR_DIM as usize];

	for (idx, weight) in weights {
		out[*idx] = *weight;
	}

	out
}

/// Query on axis 0. Duplicates sit at cosine 0.95, distinct texts at 0.8 on their own axes.
fn keyed_embedding() -> Arc<KeyedEmbedding> {
	let mut embedding = KeyedEmbedding::new(TEST_VECTOR_DIM)
		.with(QUERY, axis(&[(0, 1.0)]))
		.with(DUPLICATE_TEXT, axis(&[(0, 0.95), (1, 0.312_25)]));

	for (idx, text) in DISTINCT_TEXTS.iter().enumerate() {
		embedding = embedding.with(*text, axis(&[(0, 0.8), (2 + idx, 0.6)]));
	}

	Arc::new(embedding)
}

fn corpus() -> Vec<Document> {
	let mut documents: Vec<Document> =
		(0..20).map(|idx| Document::new(format!("dup-{idx}"), DUPLICATE_TEXT)).collect();

	documents.extend(
		DISTINCT_TEXTS
			.iter()
			.enumerate()
			.map(|(idx, text)| Document::new(format!("distinct-{idx}"), *text)),
	);

	documents
}

fn request(k: u32, exclude_ids: Vec<String>) -> DiversitySearchRequest {
	DiversitySearchRequest {
		collection: COLLECTION.to_string(),
		query: QUERY.to_string(),
		k,
		lambda: Some(0.7),
		exclude_ids,
		filter: None,
	}
}

async fn seeded_service() -> scholar_service::RetrievalService {
	let index = memory_index();
	let embedding = keyed_embedding();

	seed(index.clone(), embedding.clone(), corpus()).await;

	build_service(scholar_testkit::test_config(), index, embedding)
}

#[tokio::test]
async fn near_duplicates_yield_to_distinct_documents() {
	let service = seeded_service().await;
	let results =
		service.diversity_search(request(5, Vec::new()), None).await.expect("Search failed.");
	let distinct =
		results.iter().filter(|document| document.id.starts_with("distinct-")).count();

	assert_eq!(results.len(), 5);
	assert!(distinct >= 4, "Only {distinct} distinct documents selected.");
	assert!(results[0].id.starts_with("dup-"), "Most relevant document should seed the result.");
}

#[tokio::test]
async fn excluded_ids_never_return() {
	let service = seeded_service().await;
	let excluded = vec!["distinct-0".to_string(), "distinct-1".to_string(), "dup-0".to_string()];
	let results = service
		.diversity_search(request(10, excluded.clone()), None)
		.await
		.expect("Search failed.");

	assert_eq!(results.len(), 10);
	assert!(results.iter().all(|document| !excluded.contains(&document.id)));
}

#[tokio::test]
async fn session_prevents_reuse_across_searches() {
	let service = seeded_service().await;
	let session = SearchSession::new("job-42");
	let first = service
		.diversity_search(request(5, Vec::new()), Some(&session))
		.await
		.expect("Search failed.");
	let second = service
		.diversity_search(request(5, Vec::new()), Some(&session))
		.await
		.expect("Search failed.");
	let first_ids: HashSet<&str> = first.iter().map(|document| document.id.as_str()).collect();

	assert_eq!(first.len(), 5);
	assert_eq!(second.len(), 5);
	assert!(second.iter().all(|document| !first_ids.contains(document.id.as_str())));
	assert_eq!(session.used_ids().len(), 10);
	assert_eq!(session.usage_count(&first[0].id), 1);
}

#[tokio::test]
async fn concurrent_fallbacks_on_one_session_never_share_documents() {
	let index = memory_index();
	let embedding = hash_embedding();
	let documents =
		(0..6).map(|idx| Document::new(format!("d{idx}"), format!("lesson {idx}"))).collect();

	seed(index.clone(), embedding.clone(), documents).await;

	let service = build_service(
		scholar_testkit::test_config(),
		Arc::new(YieldingIndex::new(index)),
		embedding,
	);
	let session = SearchSession::new("job-7");
	let (a, b) = tokio::join!(
		service.diversity_search(request(3, Vec::new()), Some(&session)),
		service.diversity_search(request(3, Vec::new()), Some(&session)),
	);
	let a = a.expect("Search failed.");
	let b = b.expect("Search failed.");
	let a_ids: HashSet<&str> = a.iter().map(|document| document.id.as_str()).collect();

	assert!(!a.is_empty() || !b.is_empty(), "Fallback should serve at least one search.");
	assert!(b.iter().all(|document| !a_ids.contains(document.id.as_str())));
	assert_eq!(session.used_ids().len(), a.len() + b.len());

	for document in a.iter().chain(&b) {
		assert_eq!(session.usage_count(&document.id), 1, "{} was handed out twice.", document.id);
	}
}
