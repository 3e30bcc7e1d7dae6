//! In-process index with brute-force scans. Serves offline runs and tests.

use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	sync::RwLock,
};

use crate::{BoxFuture, Error, GetRequest, IndexHit, IndexRecord, QueryInput, Result, VectorIndex};
use scholar_domain::{FilterExpr, text};

const DEFAULT_GET_LIMIT: u32 = 100;

#[derive(Debug)]
pub struct MemoryIndex {
	vector_dim: u32,
	collections: RwLock<HashMap<String, Vec<IndexRecord>>>,
}
impl MemoryIndex {
	pub fn new(vector_dim: u32) -> Self {
		Self { vector_dim, collections: RwLock::new(HashMap::new()) }
	}

	pub fn len(&self, collection: &str) -> usize {
		let collections = self.collections.read().unwrap_or_else(|err| err.into_inner());

		collections.get(collection).map(Vec::len).unwrap_or(0)
	}

	pub fn is_empty(&self, collection: &str) -> bool {
		self.len(collection) == 0
	}

	fn search(
		&self,
		collection: &str,
		input: &QueryInput,
		k: u32,
		filter: Option<&FilterExpr>,
	) -> Result<Vec<IndexHit>> {
		if let QueryInput::Embedding(vector) = input {
			self.check_dim(vector.len())?;
		}

		let collections = self.collections.read().unwrap_or_else(|err| err.into_inner());
		let Some(records) = collections.get(collection) else { return Ok(Vec::new()) };
		let candidates = records
			.iter()
			.filter(|record| filter.map(|expr| expr.matches(&record.metadata)).unwrap_or(true));
		let mut scored: Vec<(f32, &IndexRecord)> = match input {
			QueryInput::Embedding(vector) => candidates
				.map(|record| (1.0 - cosine(vector, &record.embedding), record))
				.collect(),
			QueryInput::Text(query) => {
				let terms: HashSet<String> = text::query_terms(query).into_iter().collect();

				candidates
					.filter_map(|record| {
						let overlap = text::query_terms(&record.text)
							.iter()
							.filter(|token| terms.contains(*token))
							.count();

						(overlap > 0).then_some((-(overlap as f32), record))
					})
					.collect()
			},
		};

		scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

		let with_distance = matches!(input, QueryInput::Embedding(_));

		Ok(scored
			.into_iter()
			.take(k as usize)
			.map(|(score, record)| IndexHit {
				id: record.id.clone(),
				text: record.text.clone(),
				metadata: record.metadata.clone(),
				distance: with_distance.then_some(score),
			})
			.collect())
	}

	fn read(&self, collection: &str, request: &GetRequest) -> Vec<IndexHit> {
		let collections = self.collections.read().unwrap_or_else(|err| err.into_inner());
		let Some(records) = collections.get(collection) else { return Vec::new() };
		let limit = request.limit.unwrap_or(DEFAULT_GET_LIMIT) as usize;

		records
			.iter()
			.filter(|record| {
				request.ids.as_ref().map(|ids| ids.contains(&record.id)).unwrap_or(true)
			})
			.filter(|record| {
				request.filter.as_ref().map(|expr| expr.matches(&record.metadata)).unwrap_or(true)
			})
			.take(limit)
			.map(|record| IndexHit {
				id: record.id.clone(),
				text: record.text.clone(),
				metadata: record.metadata.clone(),
				distance: None,
			})
			.collect()
	}

	fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
		for record in records {
			self.check_dim(record.embedding.len())?;
		}

		let mut collections = self.collections.write().unwrap_or_else(|err| err.into_inner());
		let stored = collections.entry(collection.to_string()).or_default();

		for record in records {
			match stored.iter_mut().find(|existing| existing.id == record.id) {
				Some(existing) => *existing = record.clone(),
				None => stored.push(record.clone()),
			}
		}

		Ok(())
	}

	fn check_dim(&self, len: usize) -> Result<()> {
		if len != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector dimension mismatch. Expected {}, got {len}.",
				self.vector_dim
			)));
		}

		Ok(())
	}
}
impl VectorIndex for MemoryIndex {
	fn query<'a>(
		&'a self,
		collection: &'a str,
		input: &'a QueryInput,
		k: u32,
		filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move { self.search(collection, input, k, filter) })
	}

	fn get<'a>(
		&'a self,
		collection: &'a str,
		request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move { Ok(self.read(collection, request)) })
	}

	fn add<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [IndexRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.upsert(collection, records) })
	}
}

fn cosine(lhs: &[f32], rhs: &[f32]) -> f32 {
	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return 0.0;
	}

	(dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0)
}
