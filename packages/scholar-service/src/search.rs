pub mod ranking;
pub mod relax;

mod diversify;

use serde::{Deserialize, Serialize};
use tokio::time;

use crate::{
	Error, RetrievalService, Result,
	search::{ranking::hybrid, relax::RelaxationStage},
};
use scholar_domain::{
	Document, FilterExpr, LooseFilter, filter,
	keywords::{self, KEYWORD_PRIMARY_FIELD},
};
use scholar_storage::{IndexHit, QueryInput};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HybridSearchRequest {
	pub collection: String,
	pub query: String,
	#[serde(default)]
	pub filter: Option<LooseFilter>,
	pub k: u32,
	/// Keyword weight in `[0, 1]`. Defaults to `retrieval.hybrid.alpha`.
	#[serde(default)]
	pub alpha: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
	/// Every keyword flag must be present.
	And,
	/// At least one keyword flag must be present.
	Or,
	/// Keyword flags are ignored.
	Unconstrained,
}
impl KeywordMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::And => "and",
			Self::Or => "or",
			Self::Unconstrained => "unconstrained",
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeywordSearchRequest {
	pub collection: String,
	pub query: String,
	/// Keywords to require. Empty means the filter's `keyword_primary` values.
	#[serde(default)]
	pub keywords: Vec<String>,
	pub mode: KeywordMode,
	#[serde(default)]
	pub filter: Option<LooseFilter>,
	pub k: u32,
	#[serde(default)]
	pub alpha: Option<f32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct KeywordSearchResponse {
	pub documents: Vec<Document>,
	pub requested_mode: KeywordMode,
	/// Mode that actually produced the documents after any downgrade.
	pub effective_mode: KeywordMode,
	pub stage: Option<RelaxationStage>,
	pub fallback_used: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiversitySearchRequest {
	pub collection: String,
	pub query: String,
	pub k: u32,
	/// Relevance/novelty trade-off in `[0, 1]`. Defaults to `retrieval.diversity.lambda`.
	#[serde(default)]
	pub lambda: Option<f32>,
	#[serde(default)]
	pub exclude_ids: Vec<String>,
	#[serde(default)]
	pub filter: Option<LooseFilter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoryQuery {
	pub category: String,
	pub query: String,
	#[serde(default = "default_category_weight")]
	pub weight: f32,
	/// Merged over the request filter for this category only.
	#[serde(default)]
	pub filter: Option<LooseFilter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategorySearchRequest {
	pub collection: String,
	pub categories: Vec<CategoryQuery>,
	pub k: u32,
	#[serde(default)]
	pub exclude_ids: Vec<String>,
	#[serde(default)]
	pub filter: Option<LooseFilter>,
	/// Defaults to `retrieval.diversity.category_lambda`.
	#[serde(default)]
	pub lambda: Option<f32>,
}

/// A retrieved document together with its scores.
#[derive(Clone, Debug)]
pub struct Candidate {
	pub hit: IndexHit,
	/// 1-based position in the index response.
	pub retrieval_rank: u32,
	pub vector_relevance: f32,
	pub keyword_score: f32,
	pub combined_score: f32,
}
impl Candidate {
	pub fn new(hit: IndexHit, retrieval_rank: u32) -> Self {
		let vector_relevance = hit.distance.map(ranking::vector_relevance).unwrap_or(0.0);

		Self {
			hit,
			retrieval_rank,
			vector_relevance,
			keyword_score: 0.0,
			combined_score: vector_relevance,
		}
	}
}

pub(crate) struct CandidateSet {
	pub(crate) candidates: Vec<Candidate>,
	pub(crate) stage: RelaxationStage,
	/// The query ran lexically because no embedding was available.
	pub(crate) text_mode: bool,
}

pub(crate) enum Retrieval {
	Found(CandidateSet),
	/// Every relaxation step came back empty.
	Exhausted,
	/// The index did not answer in time.
	Unavailable,
}

impl RetrievalService {
	pub async fn hybrid_search(&self, req: HybridSearchRequest) -> Result<Vec<Document>> {
		crate::validate_collection(&req.collection)?;
		crate::validate_k(req.k)?;

		let alpha = req.alpha.unwrap_or(self.cfg.retrieval.hybrid.alpha);

		crate::validate_unit("alpha", alpha)?;

		let documents =
			self.within_budget(&req.collection, self.hybrid_ranked(&req, alpha)).await;

		Ok(documents.unwrap_or_default())
	}

	pub async fn keyword_search(&self, req: KeywordSearchRequest) -> Result<KeywordSearchResponse> {
		crate::validate_collection(&req.collection)?;
		crate::validate_k(req.k)?;

		let alpha = req.alpha.unwrap_or(self.cfg.retrieval.hybrid.alpha);

		crate::validate_unit("alpha", alpha)?;

		let response = self.within_budget(&req.collection, self.keyword_ranked(&req, alpha)).await;

		Ok(response.unwrap_or(KeywordSearchResponse {
			documents: Vec::new(),
			requested_mode: req.mode,
			effective_mode: KeywordMode::Unconstrained,
			stage: None,
			fallback_used: false,
		}))
	}

	async fn hybrid_ranked(&self, req: &HybridSearchRequest, alpha: f32) -> Vec<Document> {
		if req.query.trim().is_empty() {
			return self.fallback(&req.collection, req.k).await;
		}

		let filter = filter::normalize(req.filter.as_ref());
		let candidate_size = self.hybrid_candidate_size(req.k);
		let Some(set) = self
			.collect_candidates(&req.collection, &req.query, filter.as_ref(), candidate_size)
			.await
		else {
			return self.fallback(&req.collection, req.k).await;
		};
		let alpha = if set.text_mode { 1.0 } else { alpha };
		let scored =
			hybrid::score_candidates(set.candidates, &req.query, alpha, &self.cfg.retrieval);

		if scored.is_empty() {
			return self.fallback(&req.collection, req.k).await;
		}

		let top_score = scored.first().map(|candidate| candidate.combined_score);
		let documents: Vec<Document> = scored
			.into_iter()
			.take(req.k as usize)
			.map(|candidate| hit_into_document(candidate.hit))
			.collect();

		tracing::info!(
			collection = %req.collection,
			stage = set.stage.as_str(),
			text_mode = set.text_mode,
			alpha,
			returned = documents.len(),
			top_score = ?top_score,
			"Hybrid search completed."
		);

		documents
	}

	async fn keyword_ranked(
		&self,
		req: &KeywordSearchRequest,
		alpha: f32,
	) -> KeywordSearchResponse {
		let filter = filter::normalize(req.filter.as_ref());
		let raw_keywords = if req.keywords.is_empty() {
			filter.as_ref().map(|expr| expr.terms_for(KEYWORD_PRIMARY_FIELD)).unwrap_or_default()
		} else {
			req.keywords.clone()
		};
		let tokens = keywords::normalize_keywords(&raw_keywords);
		let fallback_response = |documents| KeywordSearchResponse {
			documents,
			requested_mode: req.mode,
			effective_mode: KeywordMode::Unconstrained,
			stage: None,
			fallback_used: true,
		};

		if req.query.trim().is_empty() {
			return fallback_response(self.fallback(&req.collection, req.k).await);
		}

		let candidate_size = self.hybrid_candidate_size(req.k);
		let Some(set) = self
			.collect_candidates(&req.collection, &req.query, filter.as_ref(), candidate_size)
			.await
		else {
			return fallback_response(self.fallback(&req.collection, req.k).await);
		};
		let (candidates, effective_mode) = apply_keyword_mode(set.candidates, &tokens, req.mode);

		if effective_mode != req.mode {
			tracing::info!(
				collection = %req.collection,
				requested = req.mode.as_str(),
				effective = effective_mode.as_str(),
				keywords = ?tokens,
				"Keyword mode downgraded."
			);
		}

		let alpha = if set.text_mode { 1.0 } else { alpha };
		let scored = hybrid::score_candidates(candidates, &req.query, alpha, &self.cfg.retrieval);

		if scored.is_empty() {
			return fallback_response(self.fallback(&req.collection, req.k).await);
		}

		let documents: Vec<Document> = scored
			.into_iter()
			.take(req.k as usize)
			.map(|candidate| hit_into_document(candidate.hit))
			.collect();

		tracing::info!(
			collection = %req.collection,
			stage = set.stage.as_str(),
			mode = effective_mode.as_str(),
			returned = documents.len(),
			"Keyword search completed."
		);

		KeywordSearchResponse {
			documents,
			requested_mode: req.mode,
			effective_mode,
			stage: Some(set.stage),
			fallback_used: false,
		}
	}

	pub(crate) fn hybrid_candidate_size(&self, k: u32) -> u32 {
		let hybrid = &self.cfg.retrieval.hybrid;

		k.saturating_mul(hybrid.candidate_multiplier).max(hybrid.min_candidates)
	}

	/// Bounds a whole search, fallback included, by `retrieval.search_timeout_ms`.
	pub(crate) async fn within_budget<T>(
		&self,
		collection: &str,
		search: impl Future<Output = T>,
	) -> Option<T> {
		match time::timeout(self.search_timeout(), search).await {
			Ok(out) => Some(out),
			Err(_) => {
				tracing::warn!(
					collection,
					budget_ms = self.cfg.retrieval.search_timeout_ms,
					"Search budget exhausted. Returning no documents."
				);

				None
			},
		}
	}

	/// Candidates for `query`, or `None` when the caller should use the fallback.
	pub(crate) async fn collect_candidates(
		&self,
		collection: &str,
		query: &str,
		filter: Option<&FilterExpr>,
		candidate_size: u32,
	) -> Option<CandidateSet> {
		match self.retrieve(collection, query, filter, candidate_size).await {
			Retrieval::Found(set) => Some(set),
			Retrieval::Exhausted => {
				tracing::info!(collection, "All relaxation stages returned no candidates.");

				None
			},
			Retrieval::Unavailable => None,
		}
	}

	/// Embeds the query and walks the relaxation plan until a stage yields enough candidates.
	pub(crate) async fn retrieve(
		&self,
		collection: &str,
		query: &str,
		filter: Option<&FilterExpr>,
		candidate_size: u32,
	) -> Retrieval {
		let input = self.query_input(query).await;
		let text_mode = matches!(input, QueryInput::Text(_));
		let relaxation = &self.cfg.retrieval.relaxation;
		let threshold = candidate_size.min(relaxation.acceptable_threshold) as usize;
		let mut best: Option<(RelaxationStage, Vec<IndexHit>)> = None;

		for step in relax::plan(filter, relaxation) {
			let response = time::timeout(
				self.index_timeout(),
				self.index.query(collection, &input, candidate_size, step.filter.as_ref()),
			)
			.await;
			let hits = match response {
				Ok(Ok(hits)) => hits,
				Ok(Err(err)) => {
					tracing::warn!(
						error = %err,
						collection,
						stage = step.stage.as_str(),
						"Relaxation stage query failed."
					);

					continue;
				},
				Err(_) => {
					tracing::warn!(
						collection,
						stage = step.stage.as_str(),
						"Relaxation stage query timed out. Treating index as unavailable."
					);

					return Retrieval::Unavailable;
				},
			};

			tracing::debug!(
				collection,
				stage = step.stage.as_str(),
				filter = ?step.filter.as_ref().map(FilterExpr::to_value),
				candidates = hits.len(),
				"Relaxation stage completed."
			);

			if hits.len() >= threshold {
				best = Some((step.stage, hits));

				break;
			}
			if hits.len() > best.as_ref().map(|(_, hits)| hits.len()).unwrap_or(0) {
				best = Some((step.stage, hits));
			}
		}

		let Some((stage, hits)) = best else { return Retrieval::Exhausted };
		let candidates = hits
			.into_iter()
			.enumerate()
			.map(|(idx, hit)| Candidate::new(hit, idx as u32 + 1))
			.collect();

		Retrieval::Found(CandidateSet { candidates, stage, text_mode })
	}

	async fn query_input(&self, query: &str) -> QueryInput {
		let texts = vec![query.to_string()];
		let response = time::timeout(
			self.embed_timeout(),
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts),
		)
		.await;

		match response {
			Ok(Ok(mut vectors)) if vectors.len() == 1 => QueryInput::Embedding(vectors.remove(0)),
			Ok(Ok(vectors)) => {
				tracing::warn!(
					vectors = vectors.len(),
					"Embedding provider returned an unexpected vector count. Using text query."
				);

				QueryInput::Text(query.to_string())
			},
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Query embedding failed. Using text query.");

				QueryInput::Text(query.to_string())
			},
			Err(_) => {
				tracing::warn!("Query embedding timed out. Using text query.");

				QueryInput::Text(query.to_string())
			},
		}
	}
}

pub(crate) fn hit_into_document(hit: IndexHit) -> Document {
	Document { id: hit.id, text: hit.text, metadata: keywords::decode_metadata(&hit.metadata) }
}

pub(crate) fn invalid_request(message: impl Into<String>) -> Error {
	Error::InvalidRequest { message: message.into() }
}

/// Filters candidates by keyword flags, downgrading `And` to `Or` and `Or` to unconstrained
/// when nothing qualifies.
pub(crate) fn apply_keyword_mode(
	candidates: Vec<Candidate>,
	tokens: &[String],
	mode: KeywordMode,
) -> (Vec<Candidate>, KeywordMode) {
	if tokens.is_empty() {
		return (candidates, KeywordMode::Unconstrained);
	}

	if mode == KeywordMode::And {
		let all: Vec<Candidate> = candidates
			.iter()
			.filter(|candidate| keywords::has_all_flags(&candidate.hit.metadata, tokens))
			.cloned()
			.collect();

		if !all.is_empty() {
			return (all, KeywordMode::And);
		}
	}
	if mode != KeywordMode::Unconstrained {
		let any: Vec<Candidate> = candidates
			.iter()
			.filter(|candidate| keywords::has_any_flag(&candidate.hit.metadata, tokens))
			.cloned()
			.collect();

		if !any.is_empty() {
			return (any, KeywordMode::Or);
		}
	}

	(candidates, KeywordMode::Unconstrained)
}

fn default_category_weight() -> f32 {
	1.0
}
