pub mod delta;
pub mod recency;
pub mod record;
pub mod retry;
pub mod search;
pub mod sync;
pub mod time_codec;

mod error;

use std::{future::Future, path::Path, pin::Pin, sync::Arc};

pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use search::SearchRequest;
pub use sync::SyncReport;

use catdex_config::{Catalog, Config, EmbeddingProviderConfig};
use catdex_providers::{
	catalog::{self, CatalogRecord, CatalogSort},
	embedding::{self, EmbeddingBatch},
};
use catdex_storage::{
	models::{IndexMatch, IndexQuery, IndexedVector},
	qdrant::QdrantStore,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Paged listing of catalog records, newest first when a sort is given.
pub trait CatalogSource
where
	Self: Send + Sync,
{
	fn list<'a>(
		&'a self,
		cfg: &'a Catalog,
		sort: Option<CatalogSort>,
		take: u32,
		skip: u32,
	) -> BoxFuture<'a, Result<Vec<CatalogRecord>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<EmbeddingBatch>>;
}

/// Vector store keyed by catalog identifier. Upserts replace existing records.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(&'a self, vectors: &'a [IndexedVector]) -> BoxFuture<'a, Result<()>>;

	fn query<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<Vec<IndexMatch>>>;

	fn delete_all(&self) -> BoxFuture<'_, Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub catalog: Arc<dyn CatalogSource>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(catalog: Arc<dyn CatalogSource>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { catalog, embedding }
	}

	/// HTTP providers, or the catalog dump at `catalog.dump_path` when one is configured.
	pub async fn from_config(cfg: &Config) -> Result<Self> {
		let Some(path) = cfg.catalog.dump_path.as_deref() else {
			return Ok(Self::default());
		};
		let dump = FileCatalog::load(path).await?;

		tracing::info!(path = %path.display(), records = dump.len(), "Loaded catalog dump.");

		Ok(Self { catalog: Arc::new(dump), embedding: Arc::new(DefaultProviders) })
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { catalog: provider.clone(), embedding: provider }
	}
}

/// Catalog served from a local dump, ordered the way the HTTP source orders its sorts.
pub struct FileCatalog {
	records: Vec<CatalogRecord>,
}
impl FileCatalog {
	pub fn new(records: Vec<CatalogRecord>) -> Self {
		Self { records }
	}

	pub async fn load(path: &Path) -> Result<Self> {
		Ok(Self::new(catalog::load_dump(path).await.map_err(Error::catalog)?))
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	fn page(&self, sort: Option<CatalogSort>, take: u32, skip: u32) -> Result<Vec<CatalogRecord>> {
		let mut keyed = Vec::with_capacity(self.records.len());

		for record in &self.records {
			let key = match sort {
				Some(CatalogSort::Newest) => time_codec::to_timestamp(&record.created)?,
				Some(CatalogSort::Updated) => time_codec::to_timestamp(&record.updated)?,
				None => 0,
			};

			keyed.push((key, record));
		}

		if sort.is_some() {
			keyed.sort_by(|a, b| b.0.cmp(&a.0));
		}

		Ok(keyed
			.into_iter()
			.skip(skip as usize)
			.take(take as usize)
			.map(|(_, record)| record.clone())
			.collect())
	}
}
impl CatalogSource for FileCatalog {
	fn list<'a>(
		&'a self,
		_: &'a Catalog,
		sort: Option<CatalogSort>,
		take: u32,
		skip: u32,
	) -> BoxFuture<'a, Result<Vec<CatalogRecord>>> {
		Box::pin(async move { self.page(sort, take, skip) })
	}
}

struct DefaultProviders;
impl CatalogSource for DefaultProviders {
	fn list<'a>(
		&'a self,
		cfg: &'a Catalog,
		sort: Option<CatalogSort>,
		take: u32,
		skip: u32,
	) -> BoxFuture<'a, Result<Vec<CatalogRecord>>> {
		Box::pin(async move { catalog::find(cfg, sort, take, skip).await.map_err(Error::catalog) })
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<EmbeddingBatch>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}

impl VectorIndex for QdrantStore {
	fn upsert<'a>(&'a self, vectors: &'a [IndexedVector]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(self.upsert_vectors(vectors).await?) })
	}

	fn query<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<Vec<IndexMatch>>> {
		Box::pin(async move { Ok(self.query_vectors(query).await?) })
	}

	fn delete_all(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(self.delete_all_vectors().await?) })
	}
}

pub struct CatdexService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	pub retry: RetryPolicy,
}
impl CatdexService {
	pub fn new(cfg: Config, index: Arc<dyn VectorIndex>) -> Self {
		let retry = RetryPolicy::from_config(&cfg.retry);

		Self { cfg, index, providers: Providers::default(), retry }
	}

	pub fn with_providers(cfg: Config, index: Arc<dyn VectorIndex>, providers: Providers) -> Self {
		let retry = RetryPolicy::from_config(&cfg.retry);

		Self { cfg, index, providers, retry }
	}

	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// One page of raw catalog records.
	pub async fn fetch_catalog(
		&self,
		sort: Option<CatalogSort>,
		take: u32,
		skip: u32,
	) -> Result<Vec<CatalogRecord>> {
		catalog::check_take(take).map_err(Error::catalog)?;

		let source = self.providers.catalog.as_ref();
		let cfg = &self.cfg.catalog;

		self.retry.run("catalog.list", || source.list(cfg, sort, take, skip)).await
	}

	/// Embeds `texts` in order, checking the count and dimension of what comes back.
	pub(crate) async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch> {
		if texts.is_empty() {
			return Ok(EmbeddingBatch::default());
		}

		let provider = self.providers.embedding.as_ref();
		let cfg = &self.cfg.providers.embedding;
		let mut batch =
			EmbeddingBatch { vectors: Vec::with_capacity(texts.len()), total_tokens: 0 };

		// Each sub-batch is retried on its own.
		for chunk in texts.chunks(cfg.max_batch.max(1) as usize) {
			let embedded = self.retry.run("embedding.embed", || provider.embed(cfg, chunk)).await?;

			if embedded.vectors.len() != chunk.len() {
				return Err(Error::Provider {
					message: format!(
						"Embedding provider returned {} vectors for {} inputs.",
						embedded.vectors.len(),
						chunk.len()
					),
				});
			}

			tracing::debug!(
				provider = %cfg.provider_id,
				model = %cfg.model,
				inputs = chunk.len(),
				tokens = embedded.total_tokens,
				"Embedded sub-batch."
			);

			batch.vectors.extend(embedded.vectors);
			batch.total_tokens += embedded.total_tokens;
		}

		let dim = self.vector_dim();

		if let Some(vector) = batch.vectors.iter().find(|vector| vector.len() != dim) {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch. Expected {dim}, got {}.",
					vector.len()
				),
			});
		}

		Ok(batch)
	}

	pub(crate) async fn upsert_index(&self, vectors: &[IndexedVector]) -> Result<()> {
		let index = self.index.as_ref();

		self.retry.run("index.upsert", || index.upsert(vectors)).await
	}

	pub(crate) async fn query_index(&self, query: &IndexQuery) -> Result<Vec<IndexMatch>> {
		let index = self.index.as_ref();

		self.retry.run("index.query", || index.query(query)).await
	}

	pub(crate) async fn clear_index(&self) -> Result<()> {
		let index = self.index.as_ref();

		self.retry.run("index.delete_all", || index.delete_all()).await
	}

	pub(crate) fn vector_dim(&self) -> usize {
		self.cfg.storage.qdrant.vector_dim as usize
	}
}
