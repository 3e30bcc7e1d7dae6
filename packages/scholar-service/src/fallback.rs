use std::collections::HashSet;

use tokio::time;

use crate::{RetrievalService, search::hit_into_document};
use scholar_domain::Document;
use scholar_storage::GetRequest;

impl RetrievalService {
	/// Up to `k` arbitrary documents from `collection`. Never fails: index errors and timeouts
	/// yield an empty list.
	pub async fn fallback(&self, collection: &str, k: u32) -> Vec<Document> {
		self.fallback_excluding(collection, k, &HashSet::new()).await
	}

	pub(crate) async fn fallback_excluding(
		&self,
		collection: &str,
		k: u32,
		excluded: &HashSet<String>,
	) -> Vec<Document> {
		if k == 0 {
			return Vec::new();
		}

		let limit = k.saturating_add(u32::try_from(excluded.len()).unwrap_or(u32::MAX));
		let request = GetRequest { ids: None, filter: None, limit: Some(limit) };
		let hits = match time::timeout(self.index_timeout(), self.index.get(collection, &request))
			.await
		{
			Ok(Ok(hits)) => hits,
			Ok(Err(err)) => {
				tracing::warn!(error = %err, collection, "Fallback retrieval failed.");

				return Vec::new();
			},
			Err(_) => {
				tracing::warn!(collection, "Fallback retrieval timed out.");

				return Vec::new();
			},
		};
		let documents: Vec<Document> = hits
			.into_iter()
			.filter(|hit| !excluded.contains(&hit.id))
			.take(k as usize)
			.map(hit_into_document)
			.collect();

		tracing::info!(collection, returned = documents.len(), "Fallback retrieval served.");

		documents
	}
}
