//! Vector index doubles for failure and inspection scenarios.

use std::{future, sync::{Arc, Mutex}};

use scholar_domain::FilterExpr;
use scholar_storage::{
	BoxFuture, Error, GetRequest, IndexHit, IndexRecord, QueryInput, Result, VectorIndex,
	memory::MemoryIndex,
};

/// Every call fails as if the index were unreachable.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingIndex;
impl VectorIndex for FailingIndex {
	fn query<'a>(
		&'a self,
		_collection: &'a str,
		_input: &'a QueryInput,
		_k: u32,
		_filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async { Err(Error::Unavailable("Connection refused.".to_string())) })
	}

	fn get<'a>(
		&'a self,
		_collection: &'a str,
		_request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async { Err(Error::Unavailable("Connection refused.".to_string())) })
	}

	fn add<'a>(
		&'a self,
		_collection: &'a str,
		_records: &'a [IndexRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Err(Error::Unavailable("Connection refused.".to_string())) })
	}
}

/// Every call waits forever.
#[derive(Clone, Copy, Debug, Default)]
pub struct HangingIndex;
impl VectorIndex for HangingIndex {
	fn query<'a>(
		&'a self,
		_collection: &'a str,
		_input: &'a QueryInput,
		_k: u32,
		_filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(future::pending())
	}

	fn get<'a>(
		&'a self,
		_collection: &'a str,
		_request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(future::pending())
	}

	fn add<'a>(
		&'a self,
		_collection: &'a str,
		_records: &'a [IndexRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(future::pending())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryRecord {
	pub filter: Option<FilterExpr>,
	pub hits: usize,
}

/// Delegates to a [`MemoryIndex`] and records every query's filter and hit count.
#[derive(Debug)]
pub struct RecordingIndex {
	inner: Arc<MemoryIndex>,
	queries: Mutex<Vec<QueryRecord>>,
}
impl RecordingIndex {
	pub fn new(inner: Arc<MemoryIndex>) -> Self {
		Self { inner, queries: Mutex::new(Vec::new()) }
	}

	pub fn queries(&self) -> Vec<QueryRecord> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl VectorIndex for RecordingIndex {
	fn query<'a>(
		&'a self,
		collection: &'a str,
		input: &'a QueryInput,
		k: u32,
		filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move {
			let hits = self.inner.query(collection, input, k, filter).await?;
			let mut queries = self.queries.lock().unwrap_or_else(|err| err.into_inner());

			queries.push(QueryRecord { filter: filter.cloned(), hits: hits.len() });

			Ok(hits)
		})
	}

	fn get<'a>(
		&'a self,
		collection: &'a str,
		request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		self.inner.get(collection, request)
	}

	fn add<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [IndexRecord],
	) -> BoxFuture<'a, Result<()>> {
		self.inner.add(collection, records)
	}
}

/// Finds nothing by similarity and yields before serving reads from a [`MemoryIndex`], so
/// concurrent callers interleave on the fallback path.
#[derive(Debug)]
pub struct YieldingIndex {
	inner: Arc<MemoryIndex>,
}
impl YieldingIndex {
	pub fn new(inner: Arc<MemoryIndex>) -> Self {
		Self { inner }
	}
}
impl VectorIndex for YieldingIndex {
	fn query<'a>(
		&'a self,
		_collection: &'a str,
		_input: &'a QueryInput,
		_k: u32,
		_filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async { Ok(Vec::new()) })
	}

	fn get<'a>(
		&'a self,
		collection: &'a str,
		request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move {
			tokio::task::yield_now().await;

			self.inner.get(collection, request).await
		})
	}

	fn add<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [IndexRecord],
	) -> BoxFuture<'a, Result<()>> {
		self.inner.add(collection, records)
	}
}
