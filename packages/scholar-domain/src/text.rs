//! Script-aware tokenization shared by keyword scoring and diversity similarity.
//!
//! Space-delimited scripts (Latin, Cyrillic, Hangul, ...) are split on Unicode word boundaries.
//! Runs of Han, Hiragana, or Katakana carry no word separators, so they are indexed as
//! overlapping character bigrams instead.

use ahash::AHashMap;
use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};
use unicode_segmentation::UnicodeSegmentation;

pub type TermVector = AHashMap<String, f32>;

/// NFKC followed by lowercase.
pub fn fold(text: &str) -> String {
	text.nfkc().collect::<String>().to_lowercase()
}

pub fn is_logographic(ch: char) -> bool {
	matches!(ch.script(), Script::Han | Script::Hiragana | Script::Katakana)
}

/// Tokens of `text` in reading order, repetitions kept. Every token is longer than one character.
pub fn tokenize(text: &str) -> Vec<String> {
	let folded = fold(text);
	let mut tokens = Vec::new();
	let mut segment = String::new();
	let mut logographic = false;

	for ch in folded.chars() {
		let is_logo = is_logographic(ch);

		if is_logo != logographic && !segment.is_empty() {
			flush_segment(&segment, logographic, &mut tokens);
			segment.clear();
		}

		logographic = is_logo;

		segment.push(ch);
	}

	if !segment.is_empty() {
		flush_segment(&segment, logographic, &mut tokens);
	}

	tokens
}

/// Distinct query terms in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for token in tokenize(query) {
		if !out.contains(&token) {
			out.push(token);
		}
	}

	out
}

/// Folds a raw keyword into its canonical token: case-folded, with everything except letters,
/// digits, and `_` removed. Returns `None` when nothing survives.
pub fn normalize_token(raw: &str) -> Option<String> {
	let token: String =
		fold(raw.trim()).chars().filter(|ch| ch.is_alphanumeric() || *ch == '_').collect();

	if token.is_empty() { None } else { Some(token) }
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
	if needle.is_empty() {
		return 0;
	}

	haystack.matches(needle).count()
}

pub fn term_vector(text: &str) -> TermVector {
	let mut out = TermVector::default();

	for token in tokenize(text) {
		*out.entry(token).or_insert(0.0) += 1.0;
	}

	out
}

/// Cosine similarity of two term vectors. Empty vectors are dissimilar to everything.
pub fn cosine_similarity(lhs: &TermVector, rhs: &TermVector) -> f32 {
	if lhs.is_empty() || rhs.is_empty() {
		return 0.0;
	}

	let (small, large) = if lhs.len() <= rhs.len() { (lhs, rhs) } else { (rhs, lhs) };
	let dot: f32 = small
		.iter()
		.filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
		.sum();
	let lhs_norm: f32 = lhs.values().map(|weight| weight * weight).sum::<f32>().sqrt();
	let rhs_norm: f32 = rhs.values().map(|weight| weight * weight).sum::<f32>().sqrt();

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return 0.0;
	}

	(dot / (lhs_norm * rhs_norm)).clamp(0.0, 1.0)
}

fn flush_segment(segment: &str, logographic: bool, out: &mut Vec<String>) {
	if logographic {
		push_bigrams(segment, out);

		return;
	}

	for word in segment.unicode_words() {
		let cleaned: String =
			word.chars().filter(|ch| ch.is_alphanumeric() || *ch == '_').collect();

		if cleaned.chars().count() > 1 {
			out.push(cleaned);
		}
	}
}

fn push_bigrams(run: &str, out: &mut Vec<String>) {
	let chars: Vec<char> = run.chars().filter(|ch| ch.is_alphanumeric()).collect();

	for pair in chars.windows(2) {
		out.push(pair.iter().collect());
	}
}
