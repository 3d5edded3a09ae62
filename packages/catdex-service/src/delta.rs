use crate::{CatdexService, Result, record};
use catdex_providers::catalog::CatalogRecord;
use catdex_storage::models::Direction;

impl CatdexService {
	/// Catalog records strictly newer than `watermark`, newest first.
	///
	/// Pages through the catalog in its native order for `direction` until a page ends at or
	/// before the watermark. When the page cap is reached while records are still newer, the
	/// delta is unbounded and the result is empty.
	pub async fn discover_newer_than(
		&self,
		direction: Direction,
		watermark: i64,
	) -> Result<Vec<CatalogRecord>> {
		let page_size = self.cfg.sync.discovery_page_size;
		let max_pages = self.cfg.sync.discovery_max_pages;
		let sort = record::catalog_sort(direction);
		let mut fetched = Vec::new();
		let mut pages = 0;

		loop {
			let page = self.fetch_catalog(Some(sort), page_size, pages * page_size).await?;
			let full = page.len() == page_size as usize;
			let ends_newer = match page.last() {
				Some(last) => record::record_timestamp(direction, last)? > watermark,
				None => false,
			};

			pages += 1;

			fetched.extend(page);

			if !full || !ends_newer {
				break;
			}
			if pages >= max_pages {
				tracing::warn!(
					%direction,
					watermark,
					pages,
					"Discovery page cap reached with newer records remaining. Skipping this delta."
				);

				return Ok(Vec::new());
			}
		}

		let mut newer = Vec::new();

		for candidate in fetched {
			let timestamp = record::record_timestamp(direction, &candidate)?;

			if timestamp > watermark {
				newer.push((timestamp, candidate));
			}
		}

		newer.sort_by(|a, b| b.0.cmp(&a.0));

		tracing::info!(%direction, watermark, pages, found = newer.len(), "Discovered delta.");

		Ok(newer.into_iter().map(|(_, candidate)| candidate).collect())
	}
}
