use std::sync::Arc;

use scholar_domain::{Document, DocumentMetadata, FilterExpr, LooseValue};
use scholar_service::HybridSearchRequest;
use scholar_testkit::RecordingIndex;

use super::{COLLECTION, build_service, hash_embedding, loose, memory_index, seed};

fn request(filter: &[(&str, LooseValue)], k: u32) -> HybridSearchRequest {
	HybridSearchRequest {
		collection: COLLECTION.to_string(),
		query: "중력 실험".to_string(),
		filter: Some(loose(filter)),
		k,
		alpha: None,
	}
}

#[tokio::test]
async fn strict_stage_returns_only_matching_documents() {
	let index = memory_index();
	let embedding = hash_embedding();
	let mut documents: Vec<Document> = (0..3)
		.map(|idx| {
			scholar_testkit::document(
				&format!("match-{idx}"),
				&format!("중력 실험 기록 {idx}번 사과가 떨어진다"),
				"과학",
				6,
				&["중력"],
			)
		})
		.collect();

	documents.extend((0..50).map(|idx| {
		let (subject, grade) = if idx % 2 == 0 { ("사회", 6) } else { ("과학", 5) };

		scholar_testkit::document(
			&format!("other-{idx}"),
			&format!("중력 실험 참고 자료 {idx}"),
			subject,
			grade,
			&["중력"],
		)
	}));
	seed(index.clone(), embedding.clone(), documents).await;

	let recording = Arc::new(RecordingIndex::new(index));
	let service = build_service(scholar_testkit::test_config(), recording.clone(), embedding);
	let results = service
		.hybrid_search(request(
			&[("subject", LooseValue::from("과학")), ("grade", LooseValue::from(6_i64))],
			10,
		))
		.await
		.expect("Search failed.");
	let mut ids: Vec<&str> = results.iter().map(|document| document.id.as_str()).collect();

	ids.sort_unstable();

	assert_eq!(ids, vec!["match-0", "match-1", "match-2"]);
	assert!(results.iter().all(|document| document.metadata.grade.as_deref() == Some("6")));
	assert_eq!(recording.queries().len(), 1, "Strict stage should be sufficient.");
}

#[tokio::test]
async fn missing_grade_relaxes_to_subject_only() {
	let index = memory_index();
	let embedding = hash_embedding();
	let documents = (0..10)
		.map(|idx| {
			let (subject, grade) = if idx < 5 { ("과학", 5) } else { ("사회", 6) };

			scholar_testkit::document(
				&format!("doc-{idx}"),
				&format!("중력 실험 정리 {idx}"),
				subject,
				grade,
				&["중력"],
			)
		})
		.collect();

	seed(index.clone(), embedding.clone(), documents).await;

	let recording = Arc::new(RecordingIndex::new(index));
	let service = build_service(scholar_testkit::test_config(), recording.clone(), embedding);
	let results = service
		.hybrid_search(request(
			&[("subject", LooseValue::from("과학")), ("grade", LooseValue::from(6_i64))],
			10,
		))
		.await
		.expect("Search failed.");
	let queries = recording.queries();

	assert_eq!(results.len(), 5);
	assert!(results.iter().all(|document| document.metadata.subject.as_deref() == Some("과학")));
	assert_eq!(queries.len(), 2);
	assert_eq!(queries[0].hits, 0);
	assert_eq!(queries[1].filter, Some(FilterExpr::eq("subject", "과학")));
	assert_eq!(queries[1].hits, 5);
}

#[tokio::test]
async fn candidate_counts_never_shrink_across_stages() {
	let index = memory_index();
	let embedding = hash_embedding();
	let subjects = ["과학", "사회"];
	let documents = (0..20)
		.map(|idx| {
			let metadata = DocumentMetadata::default()
				.with_subject(subjects[idx % 2])
				.with_grade(5 + idx % 3)
				.with_chapter(format!("{}", idx % 4))
				.with_keywords([if idx % 5 == 0 { "중력" } else { "마찰력" }]);

			Document::new(format!("doc-{idx}"), format!("힘과 운동 중력 실험 {idx}"))
				.with_metadata(metadata)
		})
		.collect();

	seed(index.clone(), embedding.clone(), documents).await;

	let mut cfg = scholar_testkit::test_config();

	cfg.retrieval.relaxation.acceptable_threshold = 1_000;

	let recording = Arc::new(RecordingIndex::new(index));
	let service = build_service(cfg, recording.clone(), embedding);

	service
		.hybrid_search(request(
			&[
				("subject", LooseValue::from("과학")),
				("grade", LooseValue::from(6_i64)),
				("chapter", LooseValue::from(1_i64)),
				("keyword_primary", LooseValue::from("중력")),
			],
			10,
		))
		.await
		.expect("Search failed.");

	let counts: Vec<usize> = recording.queries().iter().map(|query| query.hits).collect();

	assert_eq!(counts.len(), 5, "Every relaxation stage should run.");
	assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]), "Counts shrank: {counts:?}.");
	assert_eq!(counts.last(), Some(&20));
}
