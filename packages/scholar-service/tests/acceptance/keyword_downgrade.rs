use scholar_service::{KeywordMode, KeywordSearchRequest, RelaxationStage};

use super::{COLLECTION, build_service, hash_embedding, memory_index, seed};

fn request(keywords: &[&str], mode: KeywordMode) -> KeywordSearchRequest {
	KeywordSearchRequest {
		collection: COLLECTION.to_string(),
		query: "중력 마찰력".to_string(),
		keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
		mode,
		filter: None,
		k: 10,
		alpha: None,
	}
}

async fn seeded_service(with_both: bool) -> scholar_service::RetrievalService {
	let index = memory_index();
	let embedding = hash_embedding();
	let mut documents: Vec<_> = (0..4)
		.map(|idx| {
			scholar_testkit::document(
				&format!("gravity-{idx}"),
				&format!("중력 때문에 물체가 떨어진다 {idx}"),
				"과학",
				6,
				&["중력"],
			)
		})
		.collect();

	documents.extend((0..6).map(|idx| {
		scholar_testkit::document(
			&format!("magnet-{idx}"),
			&format!("자석은 쇠붙이를 끌어당긴다 {idx}"),
			"과학",
			6,
			&["자기력"],
		)
	}));

	if with_both {
		documents.push(scholar_testkit::document(
			"both",
			"중력 마찰력 비교 실험",
			"과학",
			6,
			&["중력", "마찰력"],
		));
	}

	seed(index.clone(), embedding.clone(), documents).await;

	build_service(scholar_testkit::test_config(), index, embedding)
}

#[tokio::test]
async fn and_without_full_match_downgrades_to_or() {
	let service = seeded_service(false).await;
	let response = service
		.keyword_search(request(&["중력", "마찰력"], KeywordMode::And))
		.await
		.expect("Search failed.");
	let mut ids: Vec<&str> =
		response.documents.iter().map(|document| document.id.as_str()).collect();

	ids.sort_unstable();

	assert_eq!(response.requested_mode, KeywordMode::And);
	assert_eq!(response.effective_mode, KeywordMode::Or);
	assert_eq!(response.stage, Some(RelaxationStage::Unfiltered));
	assert!(!response.fallback_used);
	assert_eq!(ids, vec!["gravity-0", "gravity-1", "gravity-2", "gravity-3"]);
	assert!(
		response
			.documents
			.iter()
			.all(|document| document.metadata.keywords.contains(&"중력".to_string()))
	);
}

#[tokio::test]
async fn and_keeps_documents_carrying_every_flag() {
	let service = seeded_service(true).await;
	let response = service
		.keyword_search(request(&["중력", "마찰력"], KeywordMode::And))
		.await
		.expect("Search failed.");

	assert_eq!(response.effective_mode, KeywordMode::And);
	assert_eq!(response.documents.len(), 1);
	assert_eq!(response.documents[0].id, "both");
	assert_eq!(response.documents[0].metadata.keywords, vec!["중력", "마찰력"]);
}

#[tokio::test]
async fn unknown_keywords_leave_results_unconstrained() {
	let service = seeded_service(false).await;
	let response = service
		.keyword_search(request(&["광합성"], KeywordMode::Or))
		.await
		.expect("Search failed.");

	assert_eq!(response.effective_mode, KeywordMode::Unconstrained);
	assert!(!response.documents.is_empty());
}
