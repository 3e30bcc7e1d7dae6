//! Embedding providers that never touch the network.

use std::{
	collections::HashMap,
	future,
	sync::atomic::{AtomicUsize, Ordering},
};

use scholar_config::EmbeddingProviderConfig;
use scholar_domain::text;
use scholar_providers::{BoxFuture, EmbeddingProvider, Error, Result};

/// Bag-of-tokens embedding: each token is hashed into a signed bucket and the sum is
/// L2-normalized. Texts sharing tokens land close together.
#[derive(Clone, Debug)]
pub struct HashEmbedding {
	dim: usize,
}
impl HashEmbedding {
	pub fn new(dim: u32) -> Self {
		Self { dim: dim.max(1) as usize }
	}

	pub fn vector(&self, input: &str) -> Vec<f32> {
		let mut out = vec![0.0_f32; self.dim];
		let mut tokens = text::tokenize(input);

		if tokens.is_empty() {
			tokens.push(input.to_string());
		}

		for token in &tokens {
			let hash = blake3::hash(token.as_bytes());
			let bytes = hash.as_bytes();
			let bucket = u64::from_le_bytes([
				bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
			]) as usize % self.dim;
			let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

			out[bucket] += sign;
		}

		normalize(out)
	}
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|input| self.vector(input)).collect()) })
	}
}

/// Fixed vectors for known texts; everything else falls back to [`HashEmbedding`].
#[derive(Clone, Debug)]
pub struct KeyedEmbedding {
	vectors: HashMap<String, Vec<f32>>,
	fallback: HashEmbedding,
}
impl KeyedEmbedding {
	pub fn new(dim: u32) -> Self {
		Self { vectors: HashMap::new(), fallback: HashEmbedding::new(dim) }
	}

	pub fn with(mut self, input: impl Into<String>, vector: Vec<f32>) -> Self {
		self.vectors.insert(input.into(), normalize(vector));

		self
	}

	pub fn vector(&self, input: &str) -> Vec<f32> {
		self.vectors.get(input).cloned().unwrap_or_else(|| self.fallback.vector(input))
	}
}
impl EmbeddingProvider for KeyedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|input| self.vector(input)).collect()) })
	}
}

/// Fails every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingEmbedding;
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			Err(Error::InvalidResponse { message: "Embedding provider is down.".to_string() })
		})
	}
}

/// Never answers.
#[derive(Clone, Copy, Debug, Default)]
pub struct HangingEmbedding;
impl EmbeddingProvider for HangingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(future::pending())
	}
}

/// Succeeds for the first `healthy_calls` calls, then fails.
#[derive(Debug)]
pub struct FlakyEmbedding {
	inner: HashEmbedding,
	healthy_calls: usize,
	calls: AtomicUsize,
}
impl FlakyEmbedding {
	pub fn new(dim: u32, healthy_calls: usize) -> Self {
		Self { inner: HashEmbedding::new(dim), healthy_calls, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FlakyEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		if call >= self.healthy_calls {
			return Box::pin(async move {
				Err(Error::InvalidResponse {
					message: format!("Embedding call {} rejected.", call + 1),
				})
			});
		}

		self.inner.embed(cfg, texts)
	}
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > f32::EPSILON {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_vectors_are_unit_length_and_deterministic() {
		let embedding = HashEmbedding::new(32);
		let first = embedding.vector("gravity pulls objects");
		let second = embedding.vector("gravity pulls objects");
		let norm = first.iter().map(|value| value * value).sum::<f32>().sqrt();

		assert_eq!(first, second);
		assert!((norm - 1.0).abs() < 1e-5);
	}

	#[test]
	fn keyed_vectors_override_hashing() {
		let embedding = KeyedEmbedding::new(4).with("topic", vec![3.0, 4.0, 0.0, 0.0]);

		assert_eq!(embedding.vector("topic"), vec![0.6, 0.8, 0.0, 0.0]);
		assert_eq!(embedding.vector("other").len(), 4);
	}
}
