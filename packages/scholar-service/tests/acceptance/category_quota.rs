use std::collections::HashSet;

use scholar_domain::{Document, LooseValue};
use scholar_service::{CategoryQuery, CategorySearchRequest, SearchSession};

use super::{COLLECTION, build_service, hash_embedding, loose, memory_index, seed};

fn category(name: &str, query: &str, weight: f32, keyword: Option<&str>) -> CategoryQuery {
	CategoryQuery {
		category: name.to_string(),
		query: query.to_string(),
		weight,
		filter: keyword.map(|keyword| loose(&[("keyword_primary", LooseValue::from(keyword))])),
	}
}

async fn seeded_service() -> scholar_service::RetrievalService {
	let index = memory_index();
	let embedding = hash_embedding();
	let mut documents: Vec<Document> = (0..10)
		.map(|idx| {
			scholar_testkit::document(
				&format!("force-{idx}"),
				&format!("중력 실험 {idx}단계 물체의 낙하"),
				"과학",
				6,
				&["중력"],
			)
		})
		.collect();

	documents.extend((0..10).map(|idx| {
		scholar_testkit::document(
			&format!("light-{idx}"),
			&format!("빛의 굴절 관찰 {idx}회차 프리즘"),
			"과학",
			6,
			&["빛"],
		)
	}));
	seed(index.clone(), embedding.clone(), documents).await;

	build_service(scholar_testkit::test_config(), index, embedding)
}

fn ids_with_prefix(documents: &[Document], prefix: &str) -> usize {
	documents.iter().filter(|document| document.id.starts_with(prefix)).count()
}

#[tokio::test]
async fn weighted_categories_split_k_by_quota() {
	let service = seeded_service().await;
	let results = service
		.category_diversity_search(
			CategorySearchRequest {
				collection: COLLECTION.to_string(),
				categories: vec![
					category("force", "중력 실험", 2.0, Some("중력")),
					category("light", "빛의 굴절", 1.0, Some("빛")),
				],
				k: 9,
				exclude_ids: Vec::new(),
				filter: None,
				lambda: None,
			},
			None,
		)
		.await
		.expect("Search failed.");
	let unique: HashSet<&str> = results.iter().map(|document| document.id.as_str()).collect();

	assert_eq!(results.len(), 9);
	assert_eq!(unique.len(), 9);
	assert_eq!(ids_with_prefix(&results, "force-"), 6);
	assert_eq!(ids_with_prefix(&results, "light-"), 3);
	assert!(results[..6].iter().all(|document| document.id.starts_with("force-")));
}

#[tokio::test]
async fn overlapping_categories_never_repeat_documents() {
	let service = seeded_service().await;
	let session = SearchSession::new("lesson-plan");
	let results = service
		.category_diversity_search(
			CategorySearchRequest {
				collection: COLLECTION.to_string(),
				categories: vec![
					category("falling", "중력 실험", 1.0, None),
					category("motion", "물체의 낙하 중력", 1.0, None),
				],
				k: 8,
				exclude_ids: vec!["force-0".to_string()],
				filter: None,
				lambda: Some(0.5),
			},
			Some(&session),
		)
		.await
		.expect("Search failed.");
	let unique: HashSet<&str> = results.iter().map(|document| document.id.as_str()).collect();

	assert_eq!(results.len(), 8);
	assert_eq!(unique.len(), 8);
	assert!(!unique.contains("force-0"));
	assert_eq!(session.used_ids().len(), 8);
}
