mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Catalog, Config, EmbeddingProviderConfig, Providers, Qdrant, Retry, Service, Storage, Sync,
};

use std::{fs, path::Path};

/// Largest page the catalog source accepts for a single listing call.
pub const MAX_CATALOG_PAGE: u32 = 500;
/// Largest input batch accepted by a single embedding request.
pub const MAX_EMBEDDING_BATCH: u32 = 2_048;

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
	if cfg.catalog.dump_path.is_none() && cfg.catalog.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "catalog.api_base must be non-empty when catalog.dump_path is not set."
				.to_string(),
		});
	}
	if cfg.providers.embedding.provider_id.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.provider_id must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !(1..=MAX_EMBEDDING_BATCH).contains(&cfg.providers.embedding.max_batch) {
		return Err(Error::Validation {
			message: format!(
				"providers.embedding.max_batch must be in the range 1-{MAX_EMBEDDING_BATCH}."
			),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "retry.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.base_delay_ms > cfg.retry.max_delay_ms {
		return Err(Error::Validation {
			message: "retry.base_delay_ms must not exceed retry.max_delay_ms.".to_string(),
		});
	}

	for (label, value) in [
		("sync.discovery_page_size", cfg.sync.discovery_page_size),
		("sync.reindex_page_size", cfg.sync.reindex_page_size),
	] {
		if !(1..=MAX_CATALOG_PAGE).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 1-{MAX_CATALOG_PAGE}."),
			});
		}
	}
	for (label, value) in [
		("sync.discovery_max_pages", cfg.sync.discovery_max_pages),
		("sync.recency_max_iterations", cfg.sync.recency_max_iterations),
		("sync.upsert_batch_size", cfg.sync.upsert_batch_size),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.sync.recency_initial_window_secs <= 0 {
		return Err(Error::Validation {
			message: "sync.recency_initial_window_secs must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg
		.catalog
		.dump_path
		.as_deref()
		.map(|path| path.as_os_str().is_empty())
		.unwrap_or(false)
	{
		cfg.catalog.dump_path = None;
	}
}
