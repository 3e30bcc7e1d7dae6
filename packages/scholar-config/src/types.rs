use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
	#[default]
	Qdrant,
	/// In-process index. Nothing survives a restart.
	Memory,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	#[serde(default)]
	pub backend: StorageBackend,
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub vector_dim: u32,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_upsert_batch_size")]
	pub upsert_batch_size: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	/// Texts per embedding request during ingestion.
	#[serde(default = "default_embedding_batch_size")]
	pub batch_size: u32,
	/// Pause between consecutive ingestion batches, in milliseconds.
	#[serde(default = "default_embedding_batch_delay_ms")]
	pub batch_delay_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Upper bound for a single index call.
	pub index_timeout_ms: u64,
	/// Upper bound for embedding a search query.
	pub embed_timeout_ms: u64,
	/// Upper bound for the whole candidate collection phase of one search.
	pub search_timeout_ms: u64,
	pub hybrid: Hybrid,
	pub lexical: Lexical,
	pub relaxation: Relaxation,
	pub diversity: Diversity,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			index_timeout_ms: 5_000,
			embed_timeout_ms: 10_000,
			search_timeout_ms: 30_000,
			hybrid: Hybrid::default(),
			lexical: Lexical::default(),
			relaxation: Relaxation::default(),
			diversity: Diversity::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Hybrid {
	/// Keyword weight when the request does not carry one.
	pub alpha: f32,
	pub candidate_multiplier: u32,
	pub min_candidates: u32,
	/// Candidates with no keyword signal survive only above this vector relevance.
	pub min_vector_relevance: f32,
}
impl Default for Hybrid {
	fn default() -> Self {
		Self { alpha: 0.6, candidate_multiplier: 3, min_candidates: 30, min_vector_relevance: 0.1 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Lexical {
	pub k1: f32,
	pub k2: f32,
	pub avg_doc_len: f32,
	pub exact_weight: f32,
	pub partial_weight: f32,
}
impl Default for Lexical {
	fn default() -> Self {
		Self { k1: 0.5, k2: 1.5, avg_doc_len: 100.0, exact_weight: 2.0, partial_weight: 0.5 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Relaxation {
	/// A stage returning at least `min(candidate_size, acceptable_threshold)` hits ends the loop.
	pub acceptable_threshold: u32,
	pub core_fields: Vec<String>,
	pub basic_fields: Vec<String>,
	pub subject_fields: Vec<String>,
}
impl Default for Relaxation {
	fn default() -> Self {
		Self {
			acceptable_threshold: 1,
			core_fields: vec![
				"keyword_primary".to_string(),
				"subject".to_string(),
				"grade".to_string(),
			],
			basic_fields: vec!["subject".to_string(), "grade".to_string()],
			subject_fields: vec!["subject".to_string()],
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Diversity {
	pub lambda: f32,
	pub category_lambda: f32,
	pub candidate_multiplier: u32,
	pub min_candidates: u32,
	pub dup_sim_threshold: f32,
}
impl Default for Diversity {
	fn default() -> Self {
		Self {
			lambda: 0.7,
			category_lambda: 0.6,
			candidate_multiplier: 4,
			min_candidates: 50,
			dup_sim_threshold: 0.8,
		}
	}
}

fn default_qdrant_timeout_ms() -> u64 {
	5_000
}

fn default_upsert_batch_size() -> u32 {
	500
}

fn default_embedding_batch_size() -> u32 {
	256
}

fn default_embedding_batch_delay_ms() -> u64 {
	250
}
