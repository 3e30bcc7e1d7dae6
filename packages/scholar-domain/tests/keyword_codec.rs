use scholar_domain::{
	Document, DocumentMetadata, FilterExpr, LooseFilter, LooseValue, filter,
	keywords::{self, KEYWORD_PRIMARY_FIELD},
};

#[test]
fn flag_codec_round_trips_korean_keywords() {
	let metadata = DocumentMetadata::default()
		.with_subject("과학")
		.with_grade("6")
		.with_keywords(["중력", "마찰력"]);
	let stored = keywords::encode_metadata(&metadata);
	let mut decoded = keywords::decode_keywords(&stored);

	decoded.sort();

	let mut expected = vec!["중력".to_string(), "마찰력".to_string()];

	expected.sort();

	assert_eq!(decoded, expected);
	assert!(FilterExpr::eq("kw_중력", true).matches(&stored));
	assert!(FilterExpr::eq("kw_마찰력", true).matches(&stored));
	assert!(FilterExpr::eq(KEYWORD_PRIMARY_FIELD, "중력").matches(&stored));
}

#[test]
fn decoded_metadata_matches_normalized_input() {
	let metadata = DocumentMetadata::default()
		.with_subject(" 사회 ")
		.with_grade(4)
		.with_chapter("2")
		.with_keywords(["Map", "Climate"]);
	let decoded = keywords::decode_metadata(&keywords::encode_metadata(&metadata));

	assert_eq!(decoded.subject.as_deref(), Some("사회"));
	assert_eq!(decoded.grade.as_deref(), Some("4"));
	assert_eq!(decoded.chapter.as_deref(), Some("2"));
	assert_eq!(decoded.keywords.first().map(String::as_str), Some("map"));
	assert_eq!(decoded.keywords.len(), 2);
	assert!(decoded.extra.is_empty());
}

#[test]
fn normalized_filter_selects_encoded_documents() {
	let documents = [
		Document::new("a", "중력과 무게")
			.with_metadata(DocumentMetadata::default().with_subject("과학").with_grade(6)),
		Document::new("b", "지도 읽기")
			.with_metadata(DocumentMetadata::default().with_subject("사회").with_grade(6)),
		Document::new("c", "빛의 굴절")
			.with_metadata(DocumentMetadata::default().with_subject("과학").with_grade(5)),
	];
	let loose: LooseFilter = [
		("subject".to_string(), LooseValue::from("과학")),
		("grade".to_string(), LooseValue::from(6)),
	]
	.into_iter()
	.collect();
	let expr = filter::normalize(Some(&loose)).expect("Expected a filter.");
	let matched: Vec<&str> = documents
		.iter()
		.filter(|doc| expr.matches(&keywords::encode_metadata(&doc.metadata)))
		.map(|doc| doc.id.as_str())
		.collect();

	assert_eq!(matched, vec!["a"]);
}
