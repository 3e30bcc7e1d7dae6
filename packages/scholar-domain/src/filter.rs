//! Metadata filters.
//!
//! Callers hand in a loosely typed map; [`normalize`] turns it into a [`FilterExpr`], the only
//! shape the rest of the engine understands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{StoredMetadata, StoredValue, format_number};

pub type LooseFilter = BTreeMap<String, LooseValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseScalar {
	Bool(bool),
	Integer(i64),
	Float(f64),
	Text(String),
}
impl From<&str> for LooseScalar {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}
impl From<String> for LooseScalar {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl From<i64> for LooseScalar {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}
impl From<i32> for LooseScalar {
	fn from(value: i32) -> Self {
		Self::Integer(value.into())
	}
}
impl From<f64> for LooseScalar {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}
impl From<bool> for LooseScalar {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
	Null,
	Scalar(LooseScalar),
	Set(Vec<Option<LooseScalar>>),
	/// Operator form emitted by callers that speak the index's own filter syntax.
	In {
		#[serde(rename = "$in")]
		values: Vec<Option<LooseScalar>>,
	},
}
impl LooseValue {
	pub fn set<I, T>(values: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<LooseScalar>,
	{
		Self::Set(values.into_iter().map(|value| Some(value.into())).collect())
	}
}
impl From<LooseScalar> for LooseValue {
	fn from(value: LooseScalar) -> Self {
		Self::Scalar(value)
	}
}
impl From<&str> for LooseValue {
	fn from(value: &str) -> Self {
		Self::Scalar(value.into())
	}
}
impl From<String> for LooseValue {
	fn from(value: String) -> Self {
		Self::Scalar(value.into())
	}
}
impl From<i64> for LooseValue {
	fn from(value: i64) -> Self {
		Self::Scalar(value.into())
	}
}
impl From<i32> for LooseValue {
	fn from(value: i32) -> Self {
		Self::Scalar(value.into())
	}
}
impl From<f64> for LooseValue {
	fn from(value: f64) -> Self {
		Self::Scalar(value.into())
	}
}
impl From<bool> for LooseValue {
	fn from(value: bool) -> Self {
		Self::Scalar(value.into())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
	Text(String),
	Bool(bool),
}
impl From<&str> for FilterValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}
impl From<bool> for FilterValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterExpr {
	Eq { field: String, value: FilterValue },
	/// Members are trimmed and case-folded; matching is case-insensitive.
	In { field: String, values: Vec<String> },
	And(Vec<FilterExpr>),
}
impl FilterExpr {
	pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
		Self::Eq { field: field.into(), value: value.into() }
	}

	/// Field names referenced by the expression, in order of appearance.
	pub fn fields(&self) -> Vec<&str> {
		match self {
			Self::Eq { field, .. } | Self::In { field, .. } => vec![field.as_str()],
			Self::And(children) => children.iter().flat_map(Self::fields).collect(),
		}
	}

	/// Text values constraining `field`, whether given as an equality or a set.
	pub fn terms_for(&self, field: &str) -> Vec<String> {
		match self {
			Self::Eq { field: name, value: FilterValue::Text(text) } if name == field =>
				vec![text.clone()],
			Self::In { field: name, values } if name == field => values.clone(),
			Self::And(children) =>
				children.iter().flat_map(|child| child.terms_for(field)).collect(),
			_ => Vec::new(),
		}
	}

	/// Keeps only predicates on fields accepted by `keep`. A conjunction left with one predicate
	/// collapses to that predicate; nothing left yields `None`.
	pub fn retain_fields(&self, keep: &dyn Fn(&str) -> bool) -> Option<Self> {
		match self {
			Self::Eq { field, .. } | Self::In { field, .. } => keep(field).then(|| self.clone()),
			Self::And(children) => {
				let mut kept: Vec<Self> =
					children.iter().filter_map(|child| child.retain_fields(keep)).collect();

				match kept.len() {
					0 => None,
					1 => kept.pop(),
					_ => Some(Self::And(kept)),
				}
			},
		}
	}

	pub fn matches(&self, metadata: &StoredMetadata) -> bool {
		match self {
			Self::Eq { field, value } => match (metadata.get(field), value) {
				(Some(StoredValue::Text(stored)), FilterValue::Text(expected)) =>
					stored == expected,
				(Some(StoredValue::List(items)), FilterValue::Text(expected)) =>
					items.iter().any(|item| item == expected),
				(Some(StoredValue::Bool(stored)), FilterValue::Bool(expected)) =>
					stored == expected,
				_ => false,
			},
			Self::In { field, values } => match metadata.get(field) {
				Some(StoredValue::Text(stored)) => values.contains(stored),
				Some(StoredValue::List(items)) => items.iter().any(|item| values.contains(item)),
				_ => false,
			},
			Self::And(children) => children.iter().all(|child| child.matches(metadata)),
		}
	}

	/// Index-style JSON rendering, used for logs.
	pub fn to_value(&self) -> Value {
		match self {
			Self::Eq { field, value } => {
				let value = match value {
					FilterValue::Text(text) => Value::String(text.clone()),
					FilterValue::Bool(flag) => Value::Bool(*flag),
				};

				serde_json::json!({ field: value })
			},
			Self::In { field, values } => serde_json::json!({ field: { "$in": values } }),
			Self::And(children) => {
				let children: Vec<serde_json::Value> = children.iter().map(Self::to_value).collect();

				serde_json::json!({ "$and": children })
			},
		}
	}

	/// Converts back to the loose form. Nested conjunctions are flattened.
	pub fn to_loose(&self) -> LooseFilter {
		let mut out = LooseFilter::new();

		self.collect_loose(&mut out);

		out
	}

	fn collect_loose(&self, out: &mut LooseFilter) {
		match self {
			Self::Eq { field, value } => {
				let scalar = match value {
					FilterValue::Text(text) => LooseScalar::Text(text.clone()),
					FilterValue::Bool(flag) => LooseScalar::Bool(*flag),
				};

				out.insert(field.clone(), LooseValue::Scalar(scalar));
			},
			Self::In { field, values } => {
				out.insert(field.clone(), LooseValue::set(values.iter().map(String::as_str)));
			},
			Self::And(children) =>
				for child in children {
					child.collect_loose(out);
				},
		}
	}
}

/// Canonical filter for a loose map, or `None` when nothing constrains the query.
///
/// Keys that collide after trimming keep one leaf: the last non-empty value in key order.
pub fn normalize(filter: Option<&LooseFilter>) -> Option<FilterExpr> {
	let filter = filter?;
	let mut leaves: BTreeMap<&str, FilterExpr> = BTreeMap::new();

	for (key, value) in filter {
		let field = key.trim();

		if field.is_empty() {
			continue;
		}

		let leaf = match value {
			LooseValue::Null => None,
			LooseValue::Scalar(scalar) => normalize_scalar(scalar)
				.map(|value| FilterExpr::Eq { field: field.to_string(), value }),
			LooseValue::Set(members) | LooseValue::In { values: members } => {
				let values = normalize_members(members);

				(!values.is_empty()).then(|| FilterExpr::In { field: field.to_string(), values })
			},
		};

		if let Some(leaf) = leaf {
			leaves.insert(field, leaf);
		}
	}

	let mut leaves: Vec<FilterExpr> = leaves.into_values().collect();

	match leaves.len() {
		0 => None,
		1 => leaves.pop(),
		_ => Some(FilterExpr::And(leaves)),
	}
}

fn normalize_scalar(scalar: &LooseScalar) -> Option<FilterValue> {
	match scalar {
		LooseScalar::Bool(flag) => Some(FilterValue::Bool(*flag)),
		LooseScalar::Integer(number) => Some(FilterValue::Text(number.to_string())),
		LooseScalar::Float(number) => Some(FilterValue::Text(format_number(*number))),
		LooseScalar::Text(text) => {
			let text = text.trim();

			(!text.is_empty()).then(|| FilterValue::Text(text.to_string()))
		},
	}
}

fn normalize_members(members: &[Option<LooseScalar>]) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for member in members.iter().flatten() {
		let text = match member {
			LooseScalar::Bool(flag) => flag.to_string(),
			LooseScalar::Integer(number) => number.to_string(),
			LooseScalar::Float(number) => format_number(*number),
			LooseScalar::Text(text) => text.trim().to_lowercase(),
		};

		if !text.is_empty() && !out.contains(&text) {
			out.push(text);
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn loose(entries: Vec<(&str, LooseValue)>) -> LooseFilter {
		entries.into_iter().map(|(key, value)| (key.to_string(), value)).collect()
	}

	#[test]
	fn single_key_is_a_bare_leaf() {
		let filter = loose(vec![("subject", " 과학 ".into())]);

		assert_eq!(normalize(Some(&filter)), Some(FilterExpr::eq("subject", "과학")));
	}

	#[test]
	fn several_keys_become_a_conjunction() {
		let filter = loose(vec![("subject", "과학".into()), ("grade", 6.into())]);
		let expr = normalize(Some(&filter)).expect("Expected a filter.");

		assert_eq!(
			expr,
			FilterExpr::And(vec![FilterExpr::eq("grade", "6"), FilterExpr::eq("subject", "과학")])
		);
	}

	#[test]
	fn numbers_and_numeric_strings_normalize_identically() {
		let numeric = loose(vec![("grade", 6.into())]);
		let float = loose(vec![("grade", 6.0.into())]);
		let text = loose(vec![("grade", "6".into())]);

		assert_eq!(normalize(Some(&numeric)), normalize(Some(&text)));
		assert_eq!(normalize(Some(&float)), normalize(Some(&text)));
	}

	#[test]
	fn empty_values_are_dropped() {
		let filter = loose(vec![
			("subject", "  ".into()),
			("chapter", LooseValue::Null),
			("keyword_primary", LooseValue::set(["", "  "])),
			("  ", "orphan".into()),
		]);

		assert_eq!(normalize(Some(&filter)), None);
		assert_eq!(normalize(None), None);
	}

	#[test]
	fn set_members_are_trimmed_folded_and_deduplicated() {
		let filter =
			loose(vec![("keyword_primary", LooseValue::set([" Force", "force ", "중력", ""]))]);

		assert_eq!(
			normalize(Some(&filter)),
			Some(FilterExpr::In {
				field: "keyword_primary".to_string(),
				values: vec!["force".to_string(), "중력".to_string()],
			})
		);
	}

	#[test]
	fn operator_form_is_accepted() {
		let raw = serde_json::json!({ "keyword_primary": { "$in": ["중력", null] } });
		let parsed: LooseFilter = serde_json::from_value(raw).expect("Failed to parse filter.");
		let plain: LooseFilter =
			serde_json::from_value(serde_json::json!({ "keyword_primary": ["중력"] }))
				.expect("Failed to parse filter.");

		assert_eq!(normalize(Some(&parsed)), normalize(Some(&plain)));
	}

	#[test]
	fn normalize_is_idempotent() {
		let filter = loose(vec![
			("subject", " 과학".into()),
			("grade", 6.into()),
			("keyword_primary", LooseValue::set(["Force ", "중력"])),
			("kw_중력", true.into()),
		]);
		let once = normalize(Some(&filter)).expect("Expected a filter.");
		let twice = normalize(Some(&once.to_loose())).expect("Expected a filter.");

		assert_eq!(once, twice);
	}

	#[test]
	fn keys_colliding_after_trim_keep_one_leaf() {
		let filter = loose(vec![
			("subject", "과학".into()),
			(" subject", "사회".into()),
			("grade ", "  ".into()),
			("grade", 6.into()),
		]);
		let once = normalize(Some(&filter)).expect("Expected a filter.");
		let twice = normalize(Some(&once.to_loose())).expect("Expected a filter.");

		assert_eq!(
			once,
			FilterExpr::And(vec![FilterExpr::eq("grade", "6"), FilterExpr::eq("subject", "과학")])
		);
		assert_eq!(once, twice);
	}

	#[test]
	fn retain_fields_collapses_single_survivor() {
		let expr = FilterExpr::And(vec![
			FilterExpr::eq("chapter", "3"),
			FilterExpr::eq("grade", "6"),
			FilterExpr::eq("subject", "과학"),
		]);

		assert_eq!(
			expr.retain_fields(&|field| field == "subject"),
			Some(FilterExpr::eq("subject", "과학"))
		);
		assert_eq!(expr.retain_fields(&|_| false), None);
	}

	#[test]
	fn matches_stored_metadata() {
		let stored: StoredMetadata = [
			("subject".to_string(), StoredValue::Text("과학".to_string())),
			("grade".to_string(), StoredValue::Text("6".to_string())),
			("keyword_primary".to_string(), StoredValue::Text("force".to_string())),
			("kw_force".to_string(), StoredValue::Bool(true)),
			("tags".to_string(), StoredValue::List(vec!["lab".to_string()])),
		]
		.into_iter()
		.collect();

		assert!(FilterExpr::eq("subject", "과학").matches(&stored));
		assert!(!FilterExpr::eq("grade", "5").matches(&stored));
		assert!(FilterExpr::eq("kw_force", true).matches(&stored));
		assert!(!FilterExpr::eq("kw_friction", true).matches(&stored));
		assert!(FilterExpr::eq("tags", "lab").matches(&stored));
		assert!(
			FilterExpr::In {
				field: "keyword_primary".to_string(),
				values: vec!["force".to_string(), "energy".to_string()],
			}
			.matches(&stored)
		);
	}

	#[test]
	fn set_membership_is_exact() {
		let stored: StoredMetadata = [
			("subject".to_string(), StoredValue::Text("Science".to_string())),
			("tags".to_string(), StoredValue::List(vec!["Lab".to_string(), "field".to_string()])),
		]
		.into_iter()
		.collect();
		let set = |field: &str, value: &str| FilterExpr::In {
			field: field.to_string(),
			values: vec![value.to_string()],
		};

		assert!(set("subject", "Science").matches(&stored));
		assert!(!set("subject", "science").matches(&stored));
		assert!(set("tags", "field").matches(&stored));
		assert!(!set("tags", "lab").matches(&stored));
	}

	#[test]
	fn renders_index_style_json() {
		let expr = FilterExpr::And(vec![
			FilterExpr::eq("subject", "과학"),
			FilterExpr::In { field: "keyword_primary".to_string(), values: vec!["중력".to_string()] },
		]);

		assert_eq!(
			expr.to_value(),
			serde_json::json!({
				"$and": [{ "subject": "과학" }, { "keyword_primary": { "$in": ["중력"] } }]
			})
		);
	}
}
