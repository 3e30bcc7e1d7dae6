pub mod embedding;
pub mod index;

mod error;

pub use embedding::{
	FailingEmbedding, FlakyEmbedding, HangingEmbedding, HashEmbedding, KeyedEmbedding,
};
pub use error::{Error, Result};
pub use index::{FailingIndex, HangingIndex, QueryRecord, RecordingIndex, YieldingIndex};

use std::{collections::HashSet, env, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use serde_json::Map;
use tokio::{runtime::Builder, time};
use uuid::Uuid;

use scholar_config::{
	Config, EmbeddingProviderConfig, Providers, Retrieval, Service, Storage, StorageBackend,
};
use scholar_domain::{Document, DocumentMetadata};

pub const TEST_VECTOR_DIM: u32 = 64;

/// Memory-backed configuration with default retrieval settings and no ingestion delay.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "debug".to_string() },
		storage: Storage {
			backend: StorageBackend::Memory,
			qdrant: scholar_config::Qdrant {
				url: String::new(),
				vector_dim: TEST_VECTOR_DIM,
				timeout_ms: 1_000,
				upsert_batch_size: 64,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test".to_string(),
				dimensions: TEST_VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
				batch_size: 256,
				batch_delay_ms: 0,
			},
		},
		retrieval: Retrieval::default(),
	}
}

/// Document with the common curriculum fields set.
pub fn document(id: &str, text: &str, subject: &str, grade: u32, keywords: &[&str]) -> Document {
	Document::new(id, text).with_metadata(
		DocumentMetadata::default()
			.with_subject(subject)
			.with_grade(grade)
			.with_keywords(keywords.iter().copied()),
	)
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("SCHOLAR_QDRANT_URL").ok()
}

/// Qdrant collections created by one test. Dropping the value deletes them.
pub struct TestCollections {
	url: String,
	suffix: String,
	cleaned: bool,
	collections: Mutex<HashSet<String>>,
}
impl TestCollections {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			suffix: Uuid::new_v4().simple().to_string(),
			cleaned: false,
			collections: Mutex::new(HashSet::new()),
		}
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.suffix);
		let mut tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		tracked.insert(collection.clone());

		collection
	}

	pub async fn cleanup(mut self) -> Result<()> {
		let collections = self.tracked();

		cleanup_qdrant_collections(&self.url, &collections).await?;

		self.cleaned = true;

		Ok(())
	}

	fn tracked(&self) -> Vec<String> {
		let tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		tracked.iter().cloned().collect()
	}
}
impl Drop for TestCollections {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let collections = self.tracked();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(cleanup_qdrant_collections(&url, &collections)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

async fn cleanup_qdrant_collections(url: &str, collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let client = Qdrant::from_url(url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;

	for collection in collections {
		let exists = time::timeout(
			Duration::from_secs(10),
			client.collection_exists(collection.clone()),
		)
		.await
		.map_err(|_| Error::Message("Qdrant collection_exists timed out.".to_string()))??;

		if !exists {
			continue;
		}

		time::timeout(Duration::from_secs(10), client.delete_collection(collection.clone()))
			.await
			.map_err(|_| {
				Error::Message(format!("Timed out deleting Qdrant collection {collection:?}."))
			})??;
	}

	Ok(())
}
