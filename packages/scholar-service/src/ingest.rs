use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time;
use uuid::Uuid;

use crate::{Error, Result, RetrievalService};
use scholar_domain::{Document, keywords};
use scholar_storage::IndexRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
	pub collection: String,
	/// Documents written to the index.
	pub indexed: usize,
	/// Documents skipped because their text was blank.
	pub skipped: usize,
	pub batches: usize,
}

impl RetrievalService {
	/// Embeds and indexes `documents` in batches.
	///
	/// Documents without an id receive `{collection}_{uuid}`. A failing batch aborts the call;
	/// batches written before it stay in the index.
	pub async fn add_documents(
		&self,
		collection: &str,
		documents: Vec<Document>,
	) -> Result<IngestReport> {
		crate::validate_collection(collection)?;

		let embedding_cfg = &self.cfg.providers.embedding;
		let batch_size = embedding_cfg.batch_size.max(1) as usize;
		let batch_delay = Duration::from_millis(embedding_cfg.batch_delay_ms);
		let vector_dim = self.cfg.storage.qdrant.vector_dim as usize;
		let mut report =
			IngestReport { collection: collection.to_string(), indexed: 0, skipped: 0, batches: 0 };
		let mut pending: Vec<Document> = Vec::with_capacity(documents.len());

		for mut document in documents {
			if document.text.trim().is_empty() {
				tracing::warn!(collection, id = %document.id, "Skipping document with blank text.");

				report.skipped += 1;

				continue;
			}
			if document.id.trim().is_empty() {
				document.id = format!("{collection}_{}", Uuid::new_v4().simple());
			}

			pending.push(document);
		}

		for batch in pending.chunks(batch_size) {
			if report.batches > 0 && !batch_delay.is_zero() {
				time::sleep(batch_delay).await;
			}

			let texts: Vec<String> = batch.iter().map(|document| document.text.clone()).collect();
			let embedding = self.providers.embedding.embed(embedding_cfg, &texts);
			let vectors = match time::timeout(self.embed_timeout(), embedding).await {
				Ok(Ok(vectors)) => vectors,
				Ok(Err(err)) =>
					return Err(Error::Provider {
						message: format!(
							"Embedding batch {} failed after {} documents were indexed: {err}",
							report.batches + 1,
							report.indexed
						),
					}),
				Err(_) =>
					return Err(Error::Provider {
						message: format!(
							"Embedding batch {} timed out after {} documents were indexed.",
							report.batches + 1,
							report.indexed
						),
					}),
			};

			if vectors.len() != batch.len() {
				return Err(Error::Provider {
					message: format!(
						"Embedding provider returned {} vectors for {} documents.",
						vectors.len(),
						batch.len()
					),
				});
			}
			if let Some(vector) = vectors.iter().find(|vector| vector.len() != vector_dim) {
				return Err(Error::Provider {
					message: format!(
						"Embedding dimension {} does not match storage.qdrant.vector_dim {vector_dim}.",
						vector.len()
					),
				});
			}

			let records: Vec<IndexRecord> = batch
				.iter()
				.zip(vectors)
				.map(|(document, embedding)| IndexRecord {
					id: document.id.clone(),
					text: document.text.clone(),
					metadata: keywords::encode_metadata(&document.metadata),
					embedding,
				})
				.collect();

			match time::timeout(self.index_timeout(), self.index.add(collection, &records)).await {
				Ok(result) => result?,
				Err(_) =>
					return Err(Error::Storage {
						message: format!(
							"Index write timed out after {} documents were indexed.",
							report.indexed
						),
					}),
			}

			report.batches += 1;
			report.indexed += records.len();

			tracing::debug!(
				collection,
				batch = report.batches,
				indexed = report.indexed,
				"Ingestion batch written."
			);
		}

		tracing::info!(
			collection,
			indexed = report.indexed,
			skipped = report.skipped,
			batches = report.batches,
			"Documents ingested."
		);

		Ok(report)
	}
}
