use serde::{Deserialize, Serialize};

use crate::{CatdexService, Error, Result, record};
use catdex_providers::catalog::CatalogRecord;
use catdex_storage::models::{Direction, IndexedVector};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
	pub indexed: u64,
	pub tokens: u64,
}

impl CatdexService {
	/// Indexes catalog records created or updated since the newest indexed record.
	pub async fn sync_delta(&self) -> Result<SyncReport> {
		let watermark_created = self.watermark(Direction::Created).await?;
		let watermark_updated = self.watermark(Direction::Updated).await?;
		let mut delta = self.discover_newer_than(Direction::Updated, watermark_updated).await?;

		delta.extend(self.discover_newer_than(Direction::Created, watermark_created).await?);

		tracing::info!(
			watermark_created,
			watermark_updated,
			delta = delta.len(),
			"Collected sync delta."
		);

		self.index_records(&delta).await
	}

	/// Re-embeds and upserts the whole catalog.
	pub async fn reindex_all(&self) -> Result<SyncReport> {
		let page_size = self.cfg.sync.reindex_page_size;
		let mut records = Vec::new();
		let mut skip = 0;

		loop {
			let page = self.fetch_catalog(None, page_size, skip).await?;
			let short = page.len() < page_size as usize;

			records.extend(page);

			if short {
				break;
			}

			skip += page_size;
		}

		tracing::info!(records = records.len(), "Fetched full catalog.");

		self.index_records(&records).await
	}

	pub async fn delete_all(&self) -> Result<()> {
		self.clear_index().await?;

		tracing::info!("Deleted every indexed vector.");

		Ok(())
	}

	async fn watermark(&self, direction: Direction) -> Result<i64> {
		let newest = self.estimate_recent(direction, 1).await?;

		newest
			.first()
			.map(|found| direction.timestamp(&found.metadata))
			.ok_or(Error::NoWatermark { direction })
	}

	async fn index_records(&self, records: &[CatalogRecord]) -> Result<SyncReport> {
		if records.is_empty() {
			tracing::info!("Nothing to index.");

			return Ok(SyncReport::default());
		}

		let mut texts = Vec::with_capacity(records.len());
		let mut metadata = Vec::with_capacity(records.len());

		for source in records {
			metadata.push(record::metadata_for(source)?);
			texts.push(record::embed_text(source));
		}

		let batch = self.embed_texts(&texts).await?;
		let tokens = batch.total_tokens;
		let vectors: Vec<IndexedVector> = batch
			.vectors
			.into_iter()
			.zip(metadata)
			.map(|(embedding, metadata)| record::assemble(embedding, metadata))
			.collect();
		let batch_size = self.cfg.sync.upsert_batch_size.max(1) as usize;

		for chunk in vectors.chunks(batch_size) {
			self.upsert_index(chunk).await?;
		}

		tracing::info!(indexed = vectors.len(), tokens, "Indexed records.");

		Ok(SyncReport { indexed: vectors.len() as u64, tokens })
	}
}
