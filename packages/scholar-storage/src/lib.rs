pub mod memory;
pub mod qdrant;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::{future::Future, pin::Pin};

use scholar_domain::{FilterExpr, StoredMetadata};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Debug, PartialEq)]
pub enum QueryInput {
	Embedding(Vec<f32>),
	/// Lexical query used when no embedding is available.
	Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexHit {
	pub id: String,
	pub text: String,
	pub metadata: StoredMetadata,
	/// Cosine distance for embedding queries; `None` for text queries and direct reads.
	pub distance: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexRecord {
	pub id: String,
	pub text: String,
	pub metadata: StoredMetadata,
	pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct GetRequest {
	pub ids: Option<Vec<String>>,
	pub filter: Option<FilterExpr>,
	pub limit: Option<u32>,
}

/// Nearest-neighbour store holding documents, their embeddings, and string-typed metadata.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		collection: &'a str,
		input: &'a QueryInput,
		k: u32,
		filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>>;

	fn get<'a>(
		&'a self,
		collection: &'a str,
		request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>>;

	/// Inserts or replaces records by id.
	fn add<'a>(&'a self, collection: &'a str, records: &'a [IndexRecord])
	-> BoxFuture<'a, Result<()>>;
}
