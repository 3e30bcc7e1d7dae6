//! Keyword flag codec.
//!
//! An index that only filters on primitive fields cannot answer "has keyword X" against a list, so
//! every keyword is stored twice: the most representative token as `keyword_primary`, and each
//! token as its own boolean `kw_<token>` field.

use crate::{
	document::{DocumentMetadata, MetaValue, StoredMetadata, StoredValue, format_number},
	text,
};

pub const KEYWORD_PRIMARY_FIELD: &str = "keyword_primary";
pub const KEYWORD_FLAG_PREFIX: &str = "kw_";

const SUBJECT_FIELD: &str = "subject";
const GRADE_FIELD: &str = "grade";
const CHAPTER_FIELD: &str = "chapter";

/// Canonical tokens for a keyword list, deduplicated, in input order.
pub fn normalize_keywords<S>(keywords: &[S]) -> Vec<String>
where
	S: AsRef<str>,
{
	let mut out: Vec<String> = Vec::new();

	for keyword in keywords {
		let Some(token) = text::normalize_token(keyword.as_ref()) else { continue };

		if !out.contains(&token) {
			out.push(token);
		}
	}

	out
}

/// Flag field for a raw keyword. Equal tokens always map to the same field.
pub fn flag_field(keyword: &str) -> Option<String> {
	text::normalize_token(keyword).map(|token| format!("{KEYWORD_FLAG_PREFIX}{token}"))
}

pub fn is_keyword_field(field: &str) -> bool {
	field == KEYWORD_PRIMARY_FIELD || field.starts_with(KEYWORD_FLAG_PREFIX)
}

pub fn encode_metadata(metadata: &DocumentMetadata) -> StoredMetadata {
	let mut out = StoredMetadata::new();

	for (key, value) in &metadata.extra {
		let key = key.trim();

		if key.is_empty() || is_keyword_field(key) {
			continue;
		}
		if let Some(value) = store_extra(value) {
			out.insert(key.to_string(), value);
		}
	}
	for (key, value) in [
		(SUBJECT_FIELD, &metadata.subject),
		(GRADE_FIELD, &metadata.grade),
		(CHAPTER_FIELD, &metadata.chapter),
	] {
		let Some(value) = value.as_deref().map(str::trim).filter(|value| !value.is_empty()) else {
			continue;
		};

		out.insert(key.to_string(), StoredValue::Text(value.to_string()));
	}

	let tokens = normalize_keywords(&metadata.keywords);

	if let Some(primary) = tokens.first() {
		out.insert(KEYWORD_PRIMARY_FIELD.to_string(), StoredValue::Text(primary.clone()));
	}

	for token in tokens {
		out.insert(format!("{KEYWORD_FLAG_PREFIX}{token}"), StoredValue::Bool(true));
	}

	out
}

pub fn decode_metadata(stored: &StoredMetadata) -> DocumentMetadata {
	let mut metadata = DocumentMetadata { keywords: decode_keywords(stored), ..Default::default() };

	for (key, value) in stored {
		if is_keyword_field(key) {
			continue;
		}

		match (key.as_str(), value) {
			(SUBJECT_FIELD, StoredValue::Text(text)) => metadata.subject = Some(text.clone()),
			(GRADE_FIELD, StoredValue::Text(text)) => metadata.grade = Some(text.clone()),
			(CHAPTER_FIELD, StoredValue::Text(text)) => metadata.chapter = Some(text.clone()),
			(_, StoredValue::Text(text)) => {
				metadata.extra.insert(key.clone(), MetaValue::Text(text.clone()));
			},
			(_, StoredValue::Bool(flag)) => {
				metadata.extra.insert(key.clone(), MetaValue::Bool(*flag));
			},
			(_, StoredValue::List(items)) => {
				metadata.extra.insert(key.clone(), MetaValue::List(items.clone()));
			},
		}
	}

	metadata
}

/// Keyword tokens recovered from stored flags, primary first.
pub fn decode_keywords(stored: &StoredMetadata) -> Vec<String> {
	let primary = stored.get(KEYWORD_PRIMARY_FIELD).and_then(StoredValue::as_text);
	let mut out: Vec<String> = primary.map(|token| vec![token.to_string()]).unwrap_or_default();

	for (key, value) in stored {
		let Some(token) = key.strip_prefix(KEYWORD_FLAG_PREFIX) else { continue };

		if value.as_bool() != Some(true) || Some(token) == primary {
			continue;
		}

		out.push(token.to_string());
	}

	out
}

pub fn has_all_flags(stored: &StoredMetadata, tokens: &[String]) -> bool {
	!tokens.is_empty() && tokens.iter().all(|token| has_flag(stored, token))
}

pub fn has_any_flag(stored: &StoredMetadata, tokens: &[String]) -> bool {
	tokens.iter().any(|token| has_flag(stored, token))
}

fn has_flag(stored: &StoredMetadata, token: &str) -> bool {
	stored.get(&format!("{KEYWORD_FLAG_PREFIX}{token}")).and_then(StoredValue::as_bool)
		== Some(true)
}

fn store_extra(value: &MetaValue) -> Option<StoredValue> {
	match value {
		MetaValue::Bool(flag) => Some(StoredValue::Bool(*flag)),
		MetaValue::Integer(number) => Some(StoredValue::Text(number.to_string())),
		MetaValue::Float(number) => Some(StoredValue::Text(format_number(*number))),
		MetaValue::Text(text) => {
			let text = text.trim();

			(!text.is_empty()).then(|| StoredValue::Text(text.to_string()))
		},
		MetaValue::List(items) => {
			let items: Vec<String> = items
				.iter()
				.map(|item| item.trim())
				.filter(|item| !item.is_empty())
				.map(str::to_string)
				.collect();

			(!items.is_empty()).then_some(StoredValue::List(items))
		},
	}
}
