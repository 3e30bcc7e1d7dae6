use std::collections::HashSet;

use futures::future;

use crate::{
	Result, RetrievalService, SearchSession,
	search::{
		Candidate, CategorySearchRequest, DiversitySearchRequest, hit_into_document,
		invalid_request,
		ranking::{DiversityPolicy, select_diverse},
	},
};
use scholar_domain::{Document, FilterExpr, LooseFilter, filter};

impl RetrievalService {
	/// MMR-diversified search. Documents in `exclude_ids` or already used by `session` are never
	/// returned; the returned documents are recorded in `session`.
	pub async fn diversity_search(
		&self,
		req: DiversitySearchRequest,
		session: Option<&SearchSession>,
	) -> Result<Vec<Document>> {
		crate::validate_collection(&req.collection)?;
		crate::validate_k(req.k)?;

		let lambda = req.lambda.unwrap_or(self.cfg.retrieval.diversity.lambda);

		crate::validate_unit("lambda", lambda)?;

		let documents =
			self.within_budget(&req.collection, self.diversity_ranked(&req, lambda, session)).await;

		Ok(documents.unwrap_or_default())
	}

	/// Diversity search balanced across weighted sub-topics.
	///
	/// Each category receives `ceil(k * weight / total_weight)` slots. Candidate pools are fetched
	/// concurrently; selection runs category by category so no document is chosen twice. The
	/// concatenated result is truncated to `k`.
	pub async fn category_diversity_search(
		&self,
		req: CategorySearchRequest,
		session: Option<&SearchSession>,
	) -> Result<Vec<Document>> {
		crate::validate_collection(&req.collection)?;
		crate::validate_k(req.k)?;

		if req.categories.is_empty() {
			return Err(invalid_request("categories must be non-empty."));
		}
		for category in &req.categories {
			if !category.weight.is_finite() || category.weight <= 0.0 {
				return Err(invalid_request(format!(
					"Category {:?} weight must be a finite number greater than zero.",
					category.category
				)));
			}
		}

		let lambda = req.lambda.unwrap_or(self.cfg.retrieval.diversity.category_lambda);

		crate::validate_unit("lambda", lambda)?;

		let documents = self
			.within_budget(&req.collection, self.category_ranked(&req, lambda, session))
			.await;

		Ok(documents.unwrap_or_default())
	}

	async fn diversity_ranked(
		&self,
		req: &DiversitySearchRequest,
		lambda: f32,
		session: Option<&SearchSession>,
	) -> Vec<Document> {
		let excluded = exclusion_set(&req.exclude_ids);
		let policy = DiversityPolicy {
			lambda,
			sim_threshold: self.cfg.retrieval.diversity.dup_sim_threshold,
		};
		let filter = filter::normalize(req.filter.as_ref());
		let candidate_size = self.diversity_candidate_size(req.k, &excluded, session);
		let pool = self
			.diversity_pool(&req.collection, &req.query, filter.as_ref(), candidate_size)
			.await;
		let selected = match pool {
			Some(pool) => select_recorded(session, &excluded, |excluded| {
				select_diverse(pool, req.k, &policy, excluded).0
			}),
			None => Vec::new(),
		};

		if selected.is_empty() {
			return self.fallback_recorded(&req.collection, req.k, &excluded, session).await;
		}

		tracing::info!(
			collection = %req.collection,
			lambda,
			returned = selected.len(),
			job_id = session.map(SearchSession::job_id),
			"Diversity search completed."
		);

		selected.into_iter().map(|candidate| hit_into_document(candidate.hit)).collect()
	}

	async fn category_ranked(
		&self,
		req: &CategorySearchRequest,
		lambda: f32,
		session: Option<&SearchSession>,
	) -> Vec<Document> {
		let policy = DiversityPolicy {
			lambda,
			sim_threshold: self.cfg.retrieval.diversity.dup_sim_threshold,
		};
		let mut excluded = exclusion_set(&req.exclude_ids);
		let quotas = category_quotas(req.k, req.categories.iter().map(|category| category.weight));
		let filters: Vec<Option<FilterExpr>> = req
			.categories
			.iter()
			.map(|category| {
				filter::normalize(
					merge_filters(req.filter.as_ref(), category.filter.as_ref()).as_ref(),
				)
			})
			.collect();
		let lookups = req.categories.iter().zip(&quotas).zip(&filters).map(
			|((category, quota), filter)| {
				let candidate_size = self.diversity_candidate_size(*quota, &excluded, session);
				let query = category.query.as_str();

				self.diversity_pool(&req.collection, query, filter.as_ref(), candidate_size)
			},
		);
		let pools = future::join_all(lookups).await;
		let mut selected: Vec<Candidate> = Vec::new();

		for ((category, quota), pool) in req.categories.iter().zip(quotas).zip(pools) {
			let Some(pool) = pool else {
				tracing::info!(
					collection = %req.collection,
					category = %category.category,
					"Category returned no candidates."
				);

				continue;
			};
			let picked = select_recorded(session, &excluded, |excluded| {
				select_diverse(pool, quota, &policy, excluded).0
			});

			tracing::debug!(
				collection = %req.collection,
				category = %category.category,
				quota,
				selected = picked.len(),
				"Category selection completed."
			);

			excluded.extend(picked.iter().map(|candidate| candidate.hit.id.clone()));
			selected.extend(picked);
		}

		selected.truncate(req.k as usize);

		if selected.is_empty() {
			return self.fallback_recorded(&req.collection, req.k, &excluded, session).await;
		}

		tracing::info!(
			collection = %req.collection,
			categories = req.categories.len(),
			returned = selected.len(),
			job_id = session.map(SearchSession::job_id),
			"Category diversity search completed."
		);

		selected.into_iter().map(|candidate| hit_into_document(candidate.hit)).collect()
	}

	fn diversity_candidate_size(
		&self,
		k: u32,
		excluded: &HashSet<String>,
		session: Option<&SearchSession>,
	) -> u32 {
		let diversity = &self.cfg.retrieval.diversity;
		let used = session.map(|session| session.used_ids().len()).unwrap_or(0);
		let skip = u32::try_from(excluded.len() + used).unwrap_or(u32::MAX);

		k.saturating_mul(diversity.candidate_multiplier)
			.max(diversity.min_candidates)
			.saturating_add(skip)
	}

	async fn diversity_pool(
		&self,
		collection: &str,
		query: &str,
		filter: Option<&FilterExpr>,
		candidate_size: u32,
	) -> Option<Vec<Candidate>> {
		if query.trim().is_empty() {
			return None;
		}

		let set = self.collect_candidates(collection, query, filter, candidate_size).await?;

		tracing::debug!(
			collection,
			stage = set.stage.as_str(),
			text_mode = set.text_mode,
			candidates = set.candidates.len(),
			"Diversity candidates retrieved."
		);

		Some(set.candidates)
	}

	/// Fallback that honors the session. The index read happens outside the ledger lock; ids
	/// recorded by concurrent searches meanwhile are dropped when the survivors are recorded.
	async fn fallback_recorded(
		&self,
		collection: &str,
		k: u32,
		excluded: &HashSet<String>,
		session: Option<&SearchSession>,
	) -> Vec<Document> {
		let Some(session) = session else {
			return self.fallback_excluding(collection, k, excluded).await;
		};
		let used = session.used_ids();
		let headroom = u32::try_from(used.len()).unwrap_or(u32::MAX);
		let mut skip = excluded.clone();

		skip.extend(used);

		let documents =
			self.fallback_excluding(collection, k.saturating_add(headroom), &skip).await;

		session.with_ledger(|ledger| {
			let taken: HashSet<String> = ledger.ids().cloned().collect();
			let documents: Vec<Document> = documents
				.into_iter()
				.filter(|document| !taken.contains(&document.id))
				.take(k as usize)
				.collect();

			for document in &documents {
				ledger.record(&document.id);
			}

			documents
		})
	}
}

/// Quota per weight: `ceil(k * weight / total)`, at least one slot each.
pub(crate) fn category_quotas(k: u32, weights: impl Iterator<Item = f32> + Clone) -> Vec<u32> {
	let total: f32 = weights.clone().sum();

	weights
		.map(|weight| {
			let share = (k as f32 * weight / total).ceil();

			if share.is_finite() { (share as u32).clamp(1, k.max(1)) } else { k }
		})
		.collect()
}

/// Reads exclusions, selects, and records the picks as one step against the session ledger.
fn select_recorded(
	session: Option<&SearchSession>,
	excluded: &HashSet<String>,
	select: impl FnOnce(&HashSet<String>) -> Vec<Candidate>,
) -> Vec<Candidate> {
	let Some(session) = session else { return select(excluded) };

	session.with_ledger(|ledger| {
		let mut all = excluded.clone();

		all.extend(ledger.ids().cloned());

		let picked = select(&all);

		for candidate in &picked {
			ledger.record(&candidate.hit.id);
		}

		picked
	})
}

fn exclusion_set(ids: &[String]) -> HashSet<String> {
	ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).map(str::to_string).collect()
}

fn merge_filters(base: Option<&LooseFilter>, overlay: Option<&LooseFilter>) -> Option<LooseFilter> {
	match (base, overlay) {
		(None, None) => None,
		(Some(base), None) => Some(base.clone()),
		(None, Some(overlay)) => Some(overlay.clone()),
		(Some(base), Some(overlay)) => {
			let mut merged = base.clone();

			merged.extend(overlay.iter().map(|(key, value)| (key.clone(), value.clone())));

			Some(merged)
		},
	}
}
