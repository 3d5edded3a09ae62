use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub catalog: Catalog,
	pub providers: Providers,
	pub storage: Storage,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub sync: Sync,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Catalog {
	pub api_base: String,
	pub path: String,
	pub timeout_ms: u64,
	/// Optional. When set, the catalog is served from this JSON dump instead of the HTTP source.
	pub dump_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default = "default_max_batch")]
	pub max_batch: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_attempts: 4, base_delay_ms: 1_000, max_delay_ms: 10_000 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sync {
	pub discovery_page_size: u32,
	pub discovery_max_pages: u32,
	pub recency_initial_window_secs: i64,
	pub recency_max_iterations: u32,
	pub upsert_batch_size: u32,
	pub reindex_page_size: u32,
}
impl Default for Sync {
	fn default() -> Self {
		Self {
			discovery_page_size: 100,
			discovery_max_pages: 10,
			recency_initial_window_secs: 12 * 3_600,
			recency_max_iterations: 10,
			upsert_batch_size: 100,
			reindex_page_size: 500,
		}
	}
}

fn default_max_batch() -> u32 {
	2_048
}
