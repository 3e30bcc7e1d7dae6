use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::EnvFilter;

use scholar_config::{Config, StorageBackend};
use scholar_domain::{Document, LooseFilter};
use scholar_service::{HybridSearchRequest, IngestReport, MetadataSample, RetrievalService};
use scholar_storage::{VectorIndex, memory::MemoryIndex, qdrant::QdrantIndex};

#[derive(Debug, Parser)]
#[command(
	version = scholar_cli::VERSION,
	rename_all = "kebab",
	styles = scholar_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Alpha values to sweep. Each one reruns every query.
	#[arg(
		long = "alpha",
		value_name = "ALPHA",
		value_delimiter = ',',
		default_values_t = [0.0, 0.25, 0.5, 0.75, 1.0],
	)]
	pub alphas: Vec<f32>,
	/// Overrides the per-query `k`.
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	/// Index the dataset's documents before querying.
	#[arg(long)]
	pub ingest: bool,
	/// Include up to N stored metadata records in the output.
	#[arg(long, value_name = "N")]
	pub sample_metadata: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	collection: String,
	#[serde(default)]
	documents: Vec<Document>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	#[serde(default)]
	filter: Option<LooseFilter>,
	k: Option<u32>,
	expected_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	generated_at: String,
	settings: EvalSettings,
	#[serde(skip_serializing_if = "Option::is_none")]
	ingest: Option<IngestReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	metadata_sample: Option<Vec<MetadataSample>>,
	best_alpha: Option<f32>,
	sweep: Vec<AlphaReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	collection: String,
	query_count: usize,
	document_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	backend: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	top_k: Option<u32>,
	alphas: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct AlphaReport {
	alpha: f32,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	avg_precision_at_k: f64,
	avg_recall_at_k: f64,
	avg_f1_at_k: f64,
	mean_rr: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	k: u32,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	precision_at_k: f64,
	recall_at_k: f64,
	f1_at_k: f64,
	rr: f64,
	latency_ms: f64,
	retrieved_ids: Vec<String>,
}

#[derive(Debug, PartialEq)]
struct Metrics {
	precision_at_k: f64,
	recall_at_k: f64,
	f1_at_k: f64,
	rr: f64,
	relevant_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = scholar_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	if args.alphas.is_empty() {
		return Err(eyre::eyre!("At least one --alpha value is required."));
	}
	if let Some(alpha) = args.alphas.iter().find(|alpha| !(0.0..=1.0).contains(*alpha)) {
		return Err(eyre::eyre!("Alpha {alpha} must be in the range 0.0-1.0."));
	}

	let dataset = load_dataset(&args.dataset)?;
	let backend = backend_name(config.storage.backend);
	let index = build_index(&config)?;
	let service = RetrievalService::new(config, index);
	let ingest = if args.ingest {
		Some(service.add_documents(&dataset.collection, dataset.documents.clone()).await?)
	} else {
		if service.cfg.storage.backend == StorageBackend::Memory {
			tracing::warn!(
				collection = %dataset.collection,
				"Memory backend starts empty. Pass --ingest to index the dataset documents."
			);
		}

		None
	};
	let metadata_sample = match args.sample_metadata {
		Some(limit) => Some(service.sample_metadata(&dataset.collection, limit).await?),
		None => None,
	};
	let mut sweep = Vec::with_capacity(args.alphas.len());

	for alpha in &args.alphas {
		let report = eval_alpha(&service, &dataset, *alpha, args.top_k).await?;

		tracing::info!(
			alpha,
			avg_f1_at_k = report.summary.avg_f1_at_k,
			latency_ms_p95 = report.summary.latency_ms_p95,
			"Alpha evaluated."
		);

		sweep.push(report);
	}

	let output = EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			collection: dataset.collection.clone(),
			query_count: dataset.queries.len(),
			document_count: dataset.documents.len(),
		},
		generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
		settings: EvalSettings {
			config_path: args.config.display().to_string(),
			backend,
			top_k: args.top_k,
			alphas: args.alphas.clone(),
		},
		ingest,
		metadata_sample,
		best_alpha: best_alpha(&sweep),
		sweep,
	};
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

fn build_index(config: &Config) -> color_eyre::Result<Arc<dyn VectorIndex>> {
	let index: Arc<dyn VectorIndex> = match config.storage.backend {
		StorageBackend::Qdrant => Arc::new(QdrantIndex::new(&config.storage.qdrant)?),
		StorageBackend::Memory => Arc::new(MemoryIndex::new(config.storage.qdrant.vector_dim)),
	};

	Ok(index)
}

fn backend_name(backend: StorageBackend) -> &'static str {
	match backend {
		StorageBackend::Qdrant => "qdrant",
		StorageBackend::Memory => "memory",
	}
}

async fn eval_alpha(
	service: &RetrievalService,
	dataset: &EvalDataset,
	alpha: f32,
	top_k: Option<u32>,
) -> color_eyre::Result<AlphaReport> {
	let mut queries = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (idx, query) in dataset.queries.iter().enumerate() {
		let k = top_k.or(query.k).unwrap_or(10);
		let started = Instant::now();
		let documents = service
			.hybrid_search(HybridSearchRequest {
				collection: dataset.collection.clone(),
				query: query.query.clone(),
				filter: query.filter.clone(),
				k,
				alpha: Some(alpha),
			})
			.await?;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let retrieved: Vec<String> = documents.into_iter().map(|document| document.id).collect();
		let expected: HashSet<&str> = query.expected_ids.iter().map(String::as_str).collect();
		let metrics = compute_metrics(&retrieved, &expected);

		queries.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| format!("q{}", idx + 1)),
			query: query.query.clone(),
			k,
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			precision_at_k: metrics.precision_at_k,
			recall_at_k: metrics.recall_at_k,
			f1_at_k: metrics.f1_at_k,
			rr: metrics.rr,
			latency_ms,
			retrieved_ids: retrieved,
		});
		latencies_ms.push(latency_ms);
	}

	Ok(AlphaReport { alpha, summary: summarize(&queries, &latencies_ms), queries })
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<&str>) -> Metrics {
	let mut relevant_count = 0_usize;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if expected.contains(id.as_str()) {
			relevant_count += 1;

			first_hit.get_or_insert(idx + 1);
		}
	}

	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected.is_empty() { 0.0 } else { relevant_count as f64 / expected.len() as f64 };
	let f1_at_k = if precision_at_k + recall_at_k > 0.0 {
		2.0 * precision_at_k * recall_at_k / (precision_at_k + recall_at_k)
	} else {
		0.0
	};
	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);

	Metrics { precision_at_k, recall_at_k, f1_at_k, rr, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(|a, b| a.total_cmp(b));

	EvalSummary {
		avg_precision_at_k: reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count,
		avg_recall_at_k: reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count,
		avg_f1_at_k: reports.iter().map(|r| r.f1_at_k).sum::<f64>() / count,
		mean_rr: reports.iter().map(|r| r.rr).sum::<f64>() / count,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

/// Alpha with the highest average F1. The earliest swept value wins ties.
fn best_alpha(sweep: &[AlphaReport]) -> Option<f32> {
	let mut best: Option<&AlphaReport> = None;

	for report in sweep {
		if best.is_none_or(|current| report.summary.avg_f1_at_k > current.summary.avg_f1_at_k) {
			best = Some(report);
		}
	}

	best.map(|report| report.alpha)
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
