use scholar_config::{Lexical, Retrieval};
use scholar_domain::text;

use crate::search::{Candidate, ranking::retrieval};

/// Saturating term-frequency score of `candidate_text` against pre-tokenized query terms.
///
/// Each term contributes `exact_weight * tf / (tf + k1 + k2 * len / avg_len)` for its exact
/// occurrences plus `partial_weight * partial / len`, where `partial` counts document tokens that
/// contain the term or are contained by it without being equal.
pub fn keyword_score(candidate_text: &str, terms: &[String], cfg: &Lexical) -> f32 {
	if terms.is_empty() {
		return 0.0;
	}

	let folded = text::fold(candidate_text);
	let tokens = text::tokenize(candidate_text);
	let doc_len = tokens.len().max(1) as f32;
	let saturation = cfg.k1 + cfg.k2 * (doc_len / cfg.avg_doc_len);
	let mut score = 0.0_f32;

	for term in terms {
		let exact = text::count_occurrences(&folded, term) as f32;

		if exact > 0.0 {
			let tf = exact / doc_len;

			score += cfg.exact_weight * tf / (tf + saturation);
		}

		let partial = tokens
			.iter()
			.filter(|token| {
				token.as_str() != term
					&& (token.contains(term.as_str()) || term.contains(token.as_str()))
			})
			.count() as f32;

		score += cfg.partial_weight * partial / doc_len;
	}

	score
}

/// Scores and sorts candidates by `alpha * keyword + (1 - alpha) * vector`.
///
/// A query without usable terms keeps the index order and scores by vector relevance alone.
/// Candidates with no positive score and vector relevance below the configured floor are dropped.
pub fn score_candidates(
	candidates: Vec<Candidate>,
	query: &str,
	alpha: f32,
	cfg: &Retrieval,
) -> Vec<Candidate> {
	let terms = text::query_terms(query);
	let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());

	if terms.is_empty() {
		out.extend(candidates.into_iter().map(|mut candidate| {
			candidate.keyword_score = 0.0;
			candidate.combined_score = candidate.vector_relevance;

			candidate
		}));
		out.sort_by_key(|candidate| candidate.retrieval_rank);

		return out;
	}

	for mut candidate in candidates {
		candidate.keyword_score = keyword_score(&candidate.hit.text, &terms, &cfg.lexical);
		candidate.combined_score =
			alpha * candidate.keyword_score + (1.0 - alpha) * candidate.vector_relevance;

		let noise = candidate.combined_score <= 0.0
			&& candidate.vector_relevance < cfg.hybrid.min_vector_relevance;

		if noise {
			continue;
		}

		out.push(candidate);
	}

	out.sort_by(|a, b| {
		retrieval::cmp_f32_desc(a.combined_score, b.combined_score)
			.then_with(|| a.retrieval_rank.cmp(&b.retrieval_rank))
	});

	out
}
