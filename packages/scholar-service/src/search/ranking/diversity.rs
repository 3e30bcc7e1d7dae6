use std::collections::{HashMap, HashSet};

use serde::Serialize;

use scholar_domain::text::{self, TermVector};

use crate::search::{Candidate, ranking::retrieval};

#[derive(Clone, Copy, Debug)]
pub struct DiversityPolicy {
	/// Weight of relevance against redundancy, in `[0, 1]`.
	pub lambda: f32,
	/// Skipped candidates above this similarity are reported as near-duplicates.
	pub sim_threshold: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiversityDecision {
	pub selected: bool,
	pub selected_rank: Option<u32>,
	pub selected_reason: String,
	pub skipped_reason: Option<String>,
	pub nearest_selected_id: Option<String>,
	pub similarity: Option<f32>,
	pub mmr_score: Option<f32>,
}

#[derive(Clone, Copy)]
struct DiversityPick {
	pos: usize,
	mmr_score: f32,
	relevance: f32,
	retrieval_rank: u32,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		if self.mmr_score != other.mmr_score {
			return self.mmr_score > other.mmr_score;
		}
		if self.relevance != other.relevance {
			return self.relevance > other.relevance;
		}

		self.retrieval_rank < other.retrieval_rank
	}
}

/// Greedy maximal-marginal-relevance selection of up to `k` candidates.
///
/// Excluded ids and repeated ids are dropped first. The most relevant candidate seeds the result;
/// each further pick maximizes `lambda * relevance - (1 - lambda) * max_similarity`, where
/// similarity is the token cosine between texts. Relevance is the vector relevance when every
/// candidate carries a distance and the normalized retrieval rank otherwise.
pub fn select_diverse(
	candidates: Vec<Candidate>,
	k: u32,
	policy: &DiversityPolicy,
	excluded: &HashSet<String>,
) -> (Vec<Candidate>, HashMap<String, DiversityDecision>) {
	let mut seen: HashSet<String> = HashSet::new();
	let pool: Vec<Candidate> = candidates
		.into_iter()
		.filter(|candidate| !excluded.contains(&candidate.hit.id))
		.filter(|candidate| seen.insert(candidate.hit.id.clone()))
		.collect();

	if pool.is_empty() || k == 0 {
		return (Vec::new(), HashMap::new());
	}

	let relevance = relevance_scores(&pool);
	let vectors: Vec<TermVector> =
		pool.iter().map(|candidate| text::term_vector(&candidate.hit.text)).collect();
	let mut max_sim: Vec<f32> = vec![0.0; pool.len()];
	let mut nearest: Vec<Option<usize>> = vec![None; pool.len()];
	let mut remaining: Vec<usize> = (0..pool.len()).collect();
	let mut selected: Vec<usize> = Vec::new();
	let mut decisions: HashMap<String, DiversityDecision> = HashMap::new();
	let mut reason = "top_relevance";

	while selected.len() < k as usize && !remaining.is_empty() {
		let lambda = if selected.is_empty() { 1.0 } else { policy.lambda };
		let Some(pick) = best_pick(&remaining, &pool, &relevance, &max_sim, lambda) else {
			break;
		};
		let picked = remaining.swap_remove(pick.pos);
		let similarity = nearest[picked].map(|_| max_sim[picked]);

		selected.push(picked);
		decisions.insert(
			pool[picked].hit.id.clone(),
			DiversityDecision {
				selected: true,
				selected_rank: Some(selected.len() as u32),
				selected_reason: reason.to_string(),
				skipped_reason: None,
				nearest_selected_id: nearest[picked].map(|idx| pool[idx].hit.id.clone()),
				similarity,
				mmr_score: Some(pick.mmr_score),
			},
		);

		reason = "mmr";

		for &idx in &remaining {
			let sim = text::cosine_similarity(&vectors[idx], &vectors[picked]);

			if nearest[idx].is_none() || sim > max_sim[idx] {
				max_sim[idx] = sim;
				nearest[idx] = Some(picked);
			}
		}
	}

	for idx in remaining {
		let skipped_reason = if max_sim[idx] > policy.sim_threshold {
			"similarity_threshold"
		} else {
			"lower_mmr"
		};
		let mmr_score = policy.lambda * relevance[idx] - (1.0 - policy.lambda) * max_sim[idx];

		decisions.insert(
			pool[idx].hit.id.clone(),
			DiversityDecision {
				selected: false,
				selected_rank: None,
				selected_reason: "not_selected".to_string(),
				skipped_reason: Some(skipped_reason.to_string()),
				nearest_selected_id: nearest[idx].map(|near| pool[near].hit.id.clone()),
				similarity: nearest[idx].map(|_| max_sim[idx]),
				mmr_score: Some(mmr_score),
			},
		);
	}

	let mut slots: Vec<Option<Candidate>> = pool.into_iter().map(Some).collect();
	let out = selected.into_iter().filter_map(|idx| slots[idx].take()).collect();

	(out, decisions)
}

fn relevance_scores(pool: &[Candidate]) -> Vec<f32> {
	if pool.iter().all(|candidate| candidate.hit.distance.is_some()) {
		return pool.iter().map(|candidate| candidate.vector_relevance).collect();
	}

	let total = u32::try_from(pool.len()).unwrap_or(u32::MAX);

	(0..pool.len()).map(|idx| retrieval::rank_normalize(idx as u32 + 1, total)).collect()
}

fn best_pick(
	remaining: &[usize],
	pool: &[Candidate],
	relevance: &[f32],
	max_sim: &[f32],
	lambda: f32,
) -> Option<DiversityPick> {
	let mut best: Option<DiversityPick> = None;

	for (pos, &idx) in remaining.iter().enumerate() {
		let pick = DiversityPick {
			pos,
			mmr_score: lambda * relevance[idx] - (1.0 - lambda) * max_sim[idx],
			relevance: relevance[idx],
			retrieval_rank: pool[idx].retrieval_rank,
		};

		if best.as_ref().map(|current| pick.better_than(current)).unwrap_or(true) {
			best = Some(pick);
		}
	}

	best
}
