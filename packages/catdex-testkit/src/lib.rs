//! In-memory collaborators and fixtures for exercising `catdex-service` without network access.

use std::{
	collections::{BTreeMap, HashMap},
	sync::{
		Arc, Mutex,
		atomic::{AtomicU32, Ordering},
	},
};

use serde_json::Map;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use catdex_config::{Catalog, Config, EmbeddingProviderConfig};
use catdex_providers::{
	catalog::{CatalogRecord, CatalogSort},
	embedding::EmbeddingBatch,
};
use catdex_service::{
	BoxFuture, CatalogSource, CatdexService, EmbeddingProvider, Error, Providers, Result,
	RetryPolicy, VectorIndex, time_codec,
};
use catdex_storage::models::{
	IndexMatch, IndexQuery, IndexedVector, MetadataFilter, VectorMetadata,
};

/// 2024-01-01T00:00:00Z.
pub const BASE_TS: i64 = 1_704_067_200;
pub const VECTOR_DIM: u32 = 4;

/// One recorded `CatalogSource::list` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogCall {
	pub sort: Option<CatalogSort>,
	pub take: u32,
	pub skip: u32,
}

#[derive(Default)]
pub struct MemoryCatalog {
	records: Mutex<Vec<CatalogRecord>>,
	calls: Mutex<Vec<CatalogCall>>,
	failures: AtomicU32,
}
impl MemoryCatalog {
	pub fn new(records: Vec<CatalogRecord>) -> Self {
		Self { records: Mutex::new(records), ..Default::default() }
	}

	pub fn push(&self, record: CatalogRecord) {
		lock(&self.records).push(record);
	}

	pub fn calls(&self) -> Vec<CatalogCall> {
		lock(&self.calls).clone()
	}

	/// The next `count` calls fail with a transient catalog error.
	pub fn fail_next(&self, count: u32) {
		self.failures.store(count, Ordering::SeqCst);
	}

	fn page(&self, sort: Option<CatalogSort>, take: u32, skip: u32) -> Result<Vec<CatalogRecord>> {
		let mut records = lock(&self.records).clone();

		if let Some(sort) = sort {
			let mut keyed = Vec::with_capacity(records.len());

			for record in records {
				let text = match sort {
					CatalogSort::Newest => &record.created,
					CatalogSort::Updated => &record.updated,
				};

				keyed.push((time_codec::to_timestamp(text)?, record));
			}

			keyed.sort_by(|a, b| b.0.cmp(&a.0));

			records = keyed.into_iter().map(|(_, record)| record).collect();
		}

		Ok(records.into_iter().skip(skip as usize).take(take as usize).collect())
	}
}
impl CatalogSource for MemoryCatalog {
	fn list<'a>(
		&'a self,
		_: &'a Catalog,
		sort: Option<CatalogSort>,
		take: u32,
		skip: u32,
	) -> BoxFuture<'a, Result<Vec<CatalogRecord>>> {
		lock(&self.calls).push(CatalogCall { sort, take, skip });

		let result = if take_failure(&self.failures) {
			Err(Error::Catalog { message: "catalog unavailable".to_string() })
		} else {
			self.page(sort, take, skip)
		};

		Box::pin(async move { result })
	}
}

/// Deterministic, never-zero embeddings. One token is billed per whitespace-separated word.
pub struct MemoryEmbedding {
	pub vector_dim: u32,
	calls: Mutex<Vec<Vec<String>>>,
	fixed: Mutex<HashMap<String, Vec<f32>>>,
	failures: AtomicU32,
	failing_calls: Mutex<Vec<usize>>,
}
impl MemoryEmbedding {
	pub fn new(vector_dim: u32) -> Self {
		Self {
			vector_dim,
			calls: Mutex::new(Vec::new()),
			fixed: Mutex::new(HashMap::new()),
			failures: AtomicU32::new(0),
			failing_calls: Mutex::new(Vec::new()),
		}
	}

	/// Every `embed` call with the texts it received.
	pub fn calls(&self) -> Vec<Vec<String>> {
		lock(&self.calls).clone()
	}

	/// Pins the vector returned for `text`.
	pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
		lock(&self.fixed).insert(text.to_string(), vector);
	}

	pub fn fail_next(&self, count: u32) {
		self.failures.store(count, Ordering::SeqCst);
	}

	/// Fails the given calls, numbered from 1 in the order they arrive.
	pub fn fail_calls(&self, calls: &[usize]) {
		lock(&self.failing_calls).extend_from_slice(calls);
	}

	fn vector_for(&self, text: &str) -> Vec<f32> {
		if let Some(vector) = lock(&self.fixed).get(text) {
			return vector.clone();
		}

		let seed = text
			.bytes()
			.fold(7_u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(u32::from(byte)));

		(0..self.vector_dim)
			.map(|i| (seed.wrapping_add(i.wrapping_mul(17)) % 97 + 1) as f32 / 97.0)
			.collect()
	}
}
impl EmbeddingProvider for MemoryEmbedding {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<EmbeddingBatch>> {
		let call = {
			let mut calls = lock(&self.calls);

			calls.push(texts.to_vec());

			calls.len()
		};
		let scheduled = lock(&self.failing_calls).contains(&call);
		let result = if take_failure(&self.failures) || scheduled {
			Err(Error::Provider { message: "embedding provider unavailable".to_string() })
		} else {
			Ok(EmbeddingBatch {
				vectors: texts.iter().map(|text| self.vector_for(text)).collect(),
				total_tokens: texts.iter().map(|text| text.split_whitespace().count() as u64).sum(),
			})
		};

		Box::pin(async move { result })
	}
}

/// Vector index backed by a map keyed by identifier. Unranked queries return points in key
/// order; ranked queries order by cosine similarity.
#[derive(Default)]
pub struct MemoryIndex {
	points: Mutex<BTreeMap<String, IndexedVector>>,
	upserts: Mutex<Vec<usize>>,
	queries: Mutex<Vec<IndexQuery>>,
	failures: AtomicU32,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_vectors(vectors: Vec<IndexedVector>) -> Self {
		let index = Self::default();

		lock(&index.points).extend(vectors.into_iter().map(|vector| (vector.id.clone(), vector)));

		index
	}

	pub fn len(&self) -> usize {
		lock(&self.points).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, id: &str) -> Option<IndexedVector> {
		lock(&self.points).get(id).cloned()
	}

	/// Batch size of every upsert call.
	pub fn upserts(&self) -> Vec<usize> {
		lock(&self.upserts).clone()
	}

	pub fn queries(&self) -> Vec<IndexQuery> {
		lock(&self.queries).clone()
	}

	pub fn fail_next(&self, count: u32) {
		self.failures.store(count, Ordering::SeqCst);
	}

	fn search(&self, query: &IndexQuery) -> Vec<IndexMatch> {
		let points = lock(&self.points);
		let mut matches: Vec<IndexMatch> = points
			.values()
			.filter(|point| matches_filter(query.filter.as_ref(), &point.metadata))
			.map(|point| IndexMatch {
				id: point.id.clone(),
				score: if query.is_unranked() { 0.0 } else { cosine(&query.vector, &point.values) },
				metadata: point.metadata.clone(),
			})
			.collect();

		if !query.is_unranked() {
			matches.sort_by(|a, b| b.score.total_cmp(&a.score));
		}

		matches.truncate(query.top_k as usize);

		matches
	}
}
impl VectorIndex for MemoryIndex {
	fn upsert<'a>(&'a self, vectors: &'a [IndexedVector]) -> BoxFuture<'a, Result<()>> {
		let result = if take_failure(&self.failures) {
			Err(Error::Index { message: "index unavailable".to_string() })
		} else {
			lock(&self.upserts).push(vectors.len());
			lock(&self.points)
				.extend(vectors.iter().map(|vector| (vector.id.clone(), vector.clone())));

			Ok(())
		};

		Box::pin(async move { result })
	}

	fn query<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<Vec<IndexMatch>>> {
		lock(&self.queries).push(query.clone());

		let result = if take_failure(&self.failures) {
			Err(Error::Index { message: "index unavailable".to_string() })
		} else {
			Ok(self.search(query))
		};

		Box::pin(async move { result })
	}

	fn delete_all(&self) -> BoxFuture<'_, Result<()>> {
		lock(&self.points).clear();

		Box::pin(async { Ok(()) })
	}
}

/// Fakes wired into a service that never sleeps between retries.
pub struct Harness {
	pub catalog: Arc<MemoryCatalog>,
	pub embedding: Arc<MemoryEmbedding>,
	pub index: Arc<MemoryIndex>,
	pub service: CatdexService,
}
impl Harness {
	pub fn new(records: Vec<CatalogRecord>, indexed: Vec<IndexedVector>) -> Self {
		Self::with_config(test_config(VECTOR_DIM), records, indexed)
	}

	pub fn with_config(
		cfg: Config,
		records: Vec<CatalogRecord>,
		indexed: Vec<IndexedVector>,
	) -> Self {
		let catalog = Arc::new(MemoryCatalog::new(records));
		let embedding = Arc::new(MemoryEmbedding::new(cfg.storage.qdrant.vector_dim));
		let index = Arc::new(MemoryIndex::with_vectors(indexed));
		let providers = Providers::new(catalog.clone(), embedding.clone());
		let service = CatdexService::with_providers(cfg, index.clone(), providers)
			.with_retry(RetryPolicy::none());

		Self { catalog, embedding, index, service }
	}

	/// Allows `attempts` tries per remote call with no backoff delay.
	pub fn with_retries(mut self, attempts: u32) -> Self {
		self.service.retry = RetryPolicy { max_attempts: attempts, ..RetryPolicy::none() };

		self
	}
}

pub fn test_config(vector_dim: u32) -> Config {
	Config {
		service: catdex_config::Service { log_level: "info".to_string() },
		catalog: Catalog {
			api_base: "http://127.0.0.1:1".to_string(),
			path: "/find".to_string(),
			timeout_ms: 1_000,
			dump_path: None,
		},
		providers: catdex_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/".to_string(),
				model: "test".to_string(),
				dimensions: vector_dim,
				timeout_ms: 1_000,
				max_batch: 2_048,
				default_headers: Map::new(),
			},
		},
		storage: catdex_config::Storage {
			qdrant: catdex_config::Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				api_key: None,
				collection: "catdex_test".to_string(),
				vector_dim,
			},
		},
		retry: catdex_config::Retry::default(),
		sync: catdex_config::Sync::default(),
	}
}

/// RFC 3339 text for epoch seconds.
pub fn rfc3339(timestamp: i64) -> String {
	OffsetDateTime::from_unix_timestamp(timestamp)
		.ok()
		.and_then(|ts| ts.format(&Rfc3339).ok())
		.unwrap_or_else(|| panic!("Timestamp {timestamp} is out of range."))
}

pub fn record(ident: &str, created: i64, updated: i64) -> CatalogRecord {
	CatalogRecord {
		full_ident: ident.to_string(),
		title: format!("Package {ident}"),
		summary: None,
		tags: Vec::new(),
		type_name: "addon".to_string(),
		thumb: format!("https://cdn.example/{ident}.png"),
		created: rfc3339(created),
		updated: rfc3339(updated),
	}
}

pub fn indexed(ident: &str, created: i64, updated: i64) -> IndexedVector {
	IndexedVector {
		id: ident.to_string(),
		values: vec![1.0; VECTOR_DIM as usize],
		metadata: VectorMetadata {
			title: format!("Package {ident}"),
			full_ident: ident.to_string(),
			tags: Vec::new(),
			summary: None,
			type_name: "addon".to_string(),
			thumb: format!("https://cdn.example/{ident}.png"),
			created,
			updated,
		},
	}
}

fn matches_filter(filter: Option<&MetadataFilter>, metadata: &VectorMetadata) -> bool {
	match filter {
		None => true,
		Some(MetadataFilter::TimestampAtLeast { direction, since }) =>
			direction.timestamp(metadata) >= *since,
		Some(MetadataFilter::TypeIn(types)) => types.contains(&metadata.type_name),
	}
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

fn take_failure(failures: &AtomicU32) -> bool {
	failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)).is_ok()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
