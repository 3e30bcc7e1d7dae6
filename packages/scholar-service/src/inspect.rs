use serde::Serialize;
use tokio::time;

use crate::{Error, Result, RetrievalService};
use scholar_domain::{StoredMetadata, keywords};
use scholar_storage::GetRequest;

/// Stored metadata of one document, as the index sees it.
#[derive(Clone, Debug, Serialize)]
pub struct MetadataSample {
	pub id: String,
	pub metadata: StoredMetadata,
	/// Decoded keyword tokens, primary first.
	pub keywords: Vec<String>,
}

impl RetrievalService {
	/// Up to `limit` documents with their raw stored metadata, for checking how filters will see
	/// a collection. Unlike searches, index failures are returned.
	pub async fn sample_metadata(
		&self,
		collection: &str,
		limit: u32,
	) -> Result<Vec<MetadataSample>> {
		crate::validate_collection(collection)?;
		crate::validate_k(limit)?;

		let request = GetRequest { ids: None, filter: None, limit: Some(limit) };
		let hits = time::timeout(self.index_timeout(), self.index.get(collection, &request))
			.await
			.map_err(|_| Error::Storage { message: "Metadata sampling timed out.".to_string() })??;

		Ok(hits
			.into_iter()
			.map(|hit| MetadataSample {
				keywords: keywords::decode_keywords(&hit.metadata),
				id: hit.id,
				metadata: hit.metadata,
			})
			.collect())
	}
}
