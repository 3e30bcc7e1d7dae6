pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";
/// Payload field carrying the caller's document id. Point ids are derived from it.
pub const DOC_ID_FIELD: &str = "doc_id";
pub const TEXT_FIELD: &str = "text";

use std::{
	collections::{HashMap, HashSet},
	sync::Mutex,
	time::Duration,
};

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, Distance, Document, Filter, Modifier, PointStruct,
		Query, QueryPointsBuilder, ScrollPointsBuilder, SparseVectorParamsBuilder,
		SparseVectorsConfigBuilder, UpsertPointsBuilder, Value, Vector, VectorParamsBuilder,
		VectorsConfigBuilder, value::Kind,
	},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{BoxFuture, Error, GetRequest, IndexHit, IndexRecord, QueryInput, Result, VectorIndex};
use scholar_domain::{
	FilterExpr, FilterValue, StoredMetadata, StoredValue, document::format_number,
};

const DEFAULT_GET_LIMIT: u32 = 100;

pub struct QdrantIndex {
	pub client: Qdrant,
	pub vector_dim: u32,
	pub upsert_batch_size: u32,
	ready_collections: Mutex<HashSet<String>>,
}
impl QdrantIndex {
	pub fn new(cfg: &scholar_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self {
			client,
			vector_dim: cfg.vector_dim,
			upsert_batch_size: cfg.upsert_batch_size.max(1),
			ready_collections: Mutex::new(HashSet::new()),
		})
	}

	async fn query_points(
		&self,
		collection: &str,
		input: &QueryInput,
		k: u32,
		filter: Option<&FilterExpr>,
	) -> Result<Vec<IndexHit>> {
		let (query, using) = match input {
			QueryInput::Embedding(vector) => {
				self.check_dim(vector.len())?;

				(Query::new_nearest(vector.clone()), DENSE_VECTOR_NAME)
			},
			QueryInput::Text(text) =>
				(Query::new_nearest(Document::new(text.clone(), BM25_MODEL)), BM25_VECTOR_NAME),
		};
		let mut search = QueryPointsBuilder::new(collection.to_string())
			.query(query)
			.using(using)
			.limit(k as u64)
			.with_payload(true);

		if let Some(filter) = filter {
			search = search.filter(to_qdrant_filter(filter));
		}

		let response = self.client.query(search).await?;
		let dense = matches!(input, QueryInput::Embedding(_));
		let hits = response
			.result
			.into_iter()
			.filter_map(|point| {
				let distance = dense.then(|| (1.0 - point.score).max(0.0));

				hit_from_payload(point.payload, distance)
			})
			.collect();

		Ok(hits)
	}

	async fn scroll_points(&self, collection: &str, request: &GetRequest) -> Result<Vec<IndexHit>> {
		let mut conditions: Vec<Condition> = Vec::new();

		if let Some(ids) = request.ids.as_ref() {
			if ids.is_empty() {
				return Ok(Vec::new());
			}

			conditions.push(Condition::has_id(ids.iter().map(|id| point_id(id))));
		}
		if let Some(filter) = request.filter.as_ref() {
			conditions.push(to_condition(filter));
		}

		let limit = request
			.limit
			.or_else(|| request.ids.as_ref().map(|ids| ids.len() as u32))
			.unwrap_or(DEFAULT_GET_LIMIT);
		let mut scroll =
			ScrollPointsBuilder::new(collection.to_string()).limit(limit).with_payload(true);

		if !conditions.is_empty() {
			scroll = scroll.filter(Filter::must(conditions));
		}

		let response = self.client.scroll(scroll).await?;

		Ok(response
			.result
			.into_iter()
			.filter_map(|point| hit_from_payload(point.payload, None))
			.collect())
	}

	async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
		for record in records {
			self.check_dim(record.embedding.len())?;
		}

		self.ensure_collection(collection).await?;

		for batch in records.chunks(self.upsert_batch_size as usize) {
			let points: Vec<PointStruct> = batch.iter().map(point_from_record).collect();

			self.client
				.upsert_points(UpsertPointsBuilder::new(collection.to_string(), points).wait(true))
				.await?;

			tracing::debug!(collection, points = batch.len(), "Upserted points.");
		}

		Ok(())
	}

	async fn ensure_collection(&self, collection: &str) -> Result<()> {
		if self.is_ready(collection) {
			return Ok(());
		}
		if !self.client.collection_exists(collection.to_string()).await? {
			let mut vectors_config = VectorsConfigBuilder::default();

			vectors_config.add_named_vector_params(
				DENSE_VECTOR_NAME,
				VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
			);

			let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

			sparse_vectors_config.add_named_vector_params(
				BM25_VECTOR_NAME,
				SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
			);

			let builder = CreateCollectionBuilder::new(collection.to_string())
				.vectors_config(vectors_config)
				.sparse_vectors_config(sparse_vectors_config);

			self.client.create_collection(builder).await?;

			tracing::info!(collection, vector_dim = self.vector_dim, "Created collection.");
		}

		self.ready_collections
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(collection.to_string());

		Ok(())
	}

	fn is_ready(&self, collection: &str) -> bool {
		self.ready_collections.lock().unwrap_or_else(|err| err.into_inner()).contains(collection)
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
impl VectorIndex for QdrantIndex {
	fn query<'a>(
		&'a self,
		collection: &'a str,
		input: &'a QueryInput,
		k: u32,
		filter: Option<&'a FilterExpr>,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(self.query_points(collection, input, k, filter))
	}

	fn get<'a>(
		&'a self,
		collection: &'a str,
		request: &'a GetRequest,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(self.scroll_points(collection, request))
	}

	fn add<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [IndexRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert(collection, records))
	}
}

/// Stable point id for a document id. Re-adding a document overwrites its point.
pub fn point_id(doc_id: &str) -> String {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string()
}

pub fn to_qdrant_filter(expr: &FilterExpr) -> Filter {
	match expr {
		FilterExpr::And(children) => Filter::must(children.iter().map(to_condition)),
		leaf => Filter::must([to_condition(leaf)]),
	}
}

fn to_condition(expr: &FilterExpr) -> Condition {
	match expr {
		FilterExpr::Eq { field, value: FilterValue::Text(text) } =>
			Condition::matches(field.clone(), text.clone()),
		FilterExpr::Eq { field, value: FilterValue::Bool(flag) } =>
			Condition::matches(field.clone(), *flag),
		FilterExpr::In { field, values } => Condition::matches(field.clone(), values.clone()),
		FilterExpr::And(children) =>
			Condition::from(Filter::must(children.iter().map(to_condition))),
	}
}

fn point_from_record(record: &IndexRecord) -> PointStruct {
	let mut payload_map: HashMap<String, Value> = HashMap::new();

	for (key, value) in &record.metadata {
		payload_map.insert(key.clone(), payload_value(value));
	}

	payload_map.insert(DOC_ID_FIELD.to_string(), Value::from(record.id.clone()));
	payload_map.insert(TEXT_FIELD.to_string(), Value::from(record.text.clone()));

	let mut vector_map = HashMap::new();

	vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(record.embedding.clone()));
	vector_map.insert(
		BM25_VECTOR_NAME.to_string(),
		Vector::from(Document::new(record.text.clone(), BM25_MODEL)),
	);

	PointStruct::new(point_id(&record.id), vector_map, Payload::from(payload_map))
}

fn payload_value(value: &StoredValue) -> Value {
	let json = match value {
		StoredValue::Text(text) => JsonValue::String(text.clone()),
		StoredValue::Bool(flag) => JsonValue::Bool(*flag),
		StoredValue::List(items) => JsonValue::from(items.clone()),
	};

	Value::from(json)
}

fn hit_from_payload(payload: HashMap<String, Value>, distance: Option<f32>) -> Option<IndexHit> {
	let Some(id) = payload_string(&payload, DOC_ID_FIELD) else {
		tracing::warn!("Point payload missing doc_id.");

		return None;
	};
	let text = payload_string(&payload, TEXT_FIELD).unwrap_or_default();
	let mut metadata = StoredMetadata::new();

	for (key, value) in payload {
		if key == DOC_ID_FIELD || key == TEXT_FIELD {
			continue;
		}
		if let Some(value) = stored_value(value) {
			metadata.insert(key, value);
		}
	}

	Some(IndexHit { id, text, metadata, distance })
}

fn stored_value(value: Value) -> Option<StoredValue> {
	match value.kind? {
		Kind::StringValue(text) => Some(StoredValue::Text(text)),
		Kind::BoolValue(flag) => Some(StoredValue::Bool(flag)),
		Kind::IntegerValue(number) => Some(StoredValue::Text(number.to_string())),
		Kind::DoubleValue(number) => Some(StoredValue::Text(format_number(number))),
		Kind::ListValue(list) => Some(StoredValue::List(
			list.values
				.into_iter()
				.filter_map(|item| match item.kind {
					Some(Kind::StringValue(text)) => Some(text),
					_ => None,
				})
				.collect(),
		)),
		_ => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}
