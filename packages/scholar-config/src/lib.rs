mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Diversity, EmbeddingProviderConfig, Hybrid, Lexical, Providers, Qdrant, Relaxation,
	Retrieval, Service, Storage, StorageBackend,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.upsert_batch_size == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.upsert_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.backend == StorageBackend::Qdrant && cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.storage.backend == StorageBackend::Qdrant && embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if embedding.batch_size == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.batch_size must be greater than zero.".to_string(),
		});
	}

	let retrieval = &cfg.retrieval;

	for (label, value) in [
		("storage.qdrant.timeout_ms", cfg.storage.qdrant.timeout_ms),
		("providers.embedding.timeout_ms", embedding.timeout_ms),
		("retrieval.index_timeout_ms", retrieval.index_timeout_ms),
		("retrieval.embed_timeout_ms", retrieval.embed_timeout_ms),
		("retrieval.search_timeout_ms", retrieval.search_timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	for (label, value) in [
		("retrieval.hybrid.alpha", retrieval.hybrid.alpha),
		("retrieval.hybrid.min_vector_relevance", retrieval.hybrid.min_vector_relevance),
		("retrieval.diversity.lambda", retrieval.diversity.lambda),
		("retrieval.diversity.category_lambda", retrieval.diversity.category_lambda),
		("retrieval.diversity.dup_sim_threshold", retrieval.diversity.dup_sim_threshold),
	] {
		validate_unit_range(label, value)?;
	}

	for (label, value) in [
		("retrieval.hybrid.candidate_multiplier", retrieval.hybrid.candidate_multiplier),
		("retrieval.hybrid.min_candidates", retrieval.hybrid.min_candidates),
		("retrieval.diversity.candidate_multiplier", retrieval.diversity.candidate_multiplier),
		("retrieval.diversity.min_candidates", retrieval.diversity.min_candidates),
		("retrieval.relaxation.acceptable_threshold", retrieval.relaxation.acceptable_threshold),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	let lexical = &retrieval.lexical;

	for (label, value) in [
		("retrieval.lexical.k1", lexical.k1),
		("retrieval.lexical.k2", lexical.k2),
		("retrieval.lexical.exact_weight", lexical.exact_weight),
		("retrieval.lexical.partial_weight", lexical.partial_weight),
	] {
		if !value.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if value < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be zero or greater."),
			});
		}
	}

	if !lexical.avg_doc_len.is_finite() || lexical.avg_doc_len <= 0.0 {
		return Err(Error::Validation {
			message: "retrieval.lexical.avg_doc_len must be greater than zero.".to_string(),
		});
	}

	let relaxation = &retrieval.relaxation;

	for (label, fields) in [
		("retrieval.relaxation.core_fields", &relaxation.core_fields),
		("retrieval.relaxation.basic_fields", &relaxation.basic_fields),
		("retrieval.relaxation.subject_fields", &relaxation.subject_fields),
	] {
		if fields.iter().any(|field| field.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!("{label} must not contain empty field names."),
			});
		}
	}

	if !relaxation.basic_fields.iter().all(|field| relaxation.core_fields.contains(field)) {
		return Err(Error::Validation {
			message: "retrieval.relaxation.basic_fields must be a subset of retrieval.relaxation.core_fields."
				.to_string(),
		});
	}
	if !relaxation.subject_fields.iter().all(|field| relaxation.basic_fields.contains(field)) {
		return Err(Error::Validation {
			message: "retrieval.relaxation.subject_fields must be a subset of retrieval.relaxation.basic_fields."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_unit_range(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation {
			message: format!("{label} must be in the range 0.0-1.0."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	let relaxation = &mut cfg.retrieval.relaxation;

	for fields in
		[&mut relaxation.core_fields, &mut relaxation.basic_fields, &mut relaxation.subject_fields]
	{
		for field in fields.iter_mut() {
			*field = field.trim().to_string();
		}
	}
}
