pub mod fallback;
pub mod ingest;
pub mod inspect;
pub mod search;
pub mod session;

mod error;

pub use error::{Error, Result};
pub use ingest::IngestReport;
pub use inspect::MetadataSample;
pub use search::{
	CategoryQuery, CategorySearchRequest, DiversitySearchRequest, HybridSearchRequest,
	KeywordMode, KeywordSearchRequest, KeywordSearchResponse,
	relax::{RelaxationStage, RelaxationStep},
};
pub use session::SearchSession;

use std::{
	sync::{Arc, LazyLock},
	time::Duration,
};

use regex::Regex;

use scholar_config::Config;
use scholar_providers::{EmbeddingProvider, HttpEmbedding};
use scholar_storage::VectorIndex;

static COLLECTION_NAME: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{1,61}[A-Za-z0-9]$").ok());

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(HttpEmbedding) }
	}
}

/// Retrieval engine for one deployment. Holds no per-job state; see [`SearchSession`].
pub struct RetrievalService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
}
impl RetrievalService {
	pub fn new(cfg: Config, index: Arc<dyn VectorIndex>) -> Self {
		Self { cfg, index, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, index: Arc<dyn VectorIndex>, providers: Providers) -> Self {
		Self { cfg, index, providers }
	}

	pub(crate) fn index_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.retrieval.index_timeout_ms)
	}

	pub(crate) fn embed_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.retrieval.embed_timeout_ms)
	}

	pub(crate) fn search_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.retrieval.search_timeout_ms)
	}
}

pub(crate) fn validate_collection(collection: &str) -> Result<()> {
	let valid =
		COLLECTION_NAME.as_ref().map(|pattern| pattern.is_match(collection)).unwrap_or(false);

	if !valid {
		return Err(Error::InvalidRequest {
			message: format!(
				"Collection name {collection:?} must be 3-63 characters from [A-Za-z0-9._-] with alphanumeric ends."
			),
		});
	}

	Ok(())
}

pub(crate) fn validate_k(k: u32) -> Result<()> {
	if k == 0 {
		return Err(Error::InvalidRequest { message: "k must be greater than zero.".to_string() });
	}

	Ok(())
}

pub(crate) fn validate_unit(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() || !(0.0..=1.0).contains(&value) {
		return Err(Error::InvalidRequest {
			message: format!("{label} must be a finite number in the range 0.0-1.0."),
		});
	}

	Ok(())
}
