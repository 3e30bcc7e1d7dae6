use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Metadata in the form the index stores it: string-typed, trimmed, with keyword flags expanded.
pub type StoredMetadata = BTreeMap<String, StoredValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
	pub id: String,
	pub text: String,
	#[serde(default)]
	pub metadata: DocumentMetadata,
}
impl Document {
	pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
		Self { id: id.into(), text: text.into(), metadata: DocumentMetadata::default() }
	}

	pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
		self.metadata = metadata;

		self
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
	#[serde(
		default,
		deserialize_with = "deserialize_scalar_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub subject: Option<String>,
	/// Accepts `6` as well as `"6"`; both are kept as `"6"`.
	#[serde(
		default,
		deserialize_with = "deserialize_scalar_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub grade: Option<String>,
	#[serde(
		default,
		deserialize_with = "deserialize_scalar_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub chapter: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub keywords: Vec<String>,
	#[serde(flatten)]
	pub extra: BTreeMap<String, MetaValue>,
}
impl DocumentMetadata {
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());

		self
	}

	pub fn with_grade(mut self, grade: impl ToString) -> Self {
		self.grade = Some(grade.to_string());

		self
	}

	pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
		self.chapter = Some(chapter.into());

		self
	}

	pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.keywords = keywords.into_iter().map(Into::into).collect();

		self
	}

	pub fn with_extra(mut self, key: impl Into<String>, value: MetaValue) -> Self {
		self.extra.insert(key.into(), value);

		self
	}
}

/// Values accepted in the open extension map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
	Bool(bool),
	Integer(i64),
	Float(f64),
	Text(String),
	List(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
	Bool(bool),
	Text(String),
	List(Vec<String>),
}
impl StoredValue {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text.as_str()),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(flag) => Some(*flag),
			_ => None,
		}
	}
}

/// Decimal rendering used wherever numbers become strings: `6.0` and `6` both render as `"6"`.
pub fn format_number(value: f64) -> String {
	if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
		return format!("{}", value as i64);
	}

	value.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarInput {
	Integer(i64),
	Float(f64),
	Text(String),
	Bool(bool),
}

fn deserialize_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<ScalarInput>::deserialize(deserializer)?;

	Ok(value.map(|value| match value {
		ScalarInput::Integer(number) => number.to_string(),
		ScalarInput::Float(number) => format_number(number),
		ScalarInput::Text(text) => text,
		ScalarInput::Bool(flag) => flag.to_string(),
	}))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn numeric_grade_deserializes_as_string() {
		let from_number: DocumentMetadata =
			serde_json::from_value(serde_json::json!({ "subject": "과학", "grade": 6 }))
				.expect("Failed to parse metadata.");
		let from_text: DocumentMetadata =
			serde_json::from_value(serde_json::json!({ "subject": "과학", "grade": "6" }))
				.expect("Failed to parse metadata.");

		assert_eq!(from_number, from_text);
		assert_eq!(from_number.grade.as_deref(), Some("6"));
	}

	#[test]
	fn unknown_fields_land_in_extra() {
		let metadata: DocumentMetadata = serde_json::from_value(serde_json::json!({
			"subject": "사회",
			"pdf_id": "doc-17",
			"page": 4,
			"tags": ["map", "climate"],
		}))
		.expect("Failed to parse metadata.");

		assert_eq!(metadata.extra.get("pdf_id"), Some(&MetaValue::Text("doc-17".to_string())));
		assert_eq!(metadata.extra.get("page"), Some(&MetaValue::Integer(4)));
		assert_eq!(
			metadata.extra.get("tags"),
			Some(&MetaValue::List(vec!["map".to_string(), "climate".to_string()]))
		);
	}

	#[test]
	fn format_number_drops_integral_fraction() {
		assert_eq!(format_number(6.0), "6");
		assert_eq!(format_number(6.5), "6.5");
		assert_eq!(format_number(-3.0), "-3");
	}
}
