//! Most recent indexed records by creation or update time.
//!
//! The index cannot order by metadata, so the estimator widens a time window until it holds
//! more candidates than requested, then grows the fetch size until the window is no longer
//! truncated. Only then is the local sort guaranteed to see the true newest records.

use time::OffsetDateTime;

use crate::{CatdexService, Result};
use catdex_storage::models::{Direction, IndexMatch, IndexQuery, MetadataFilter};

const MIN_FETCH_AMOUNT: u32 = 20;

impl CatdexService {
	pub async fn estimate_recent(
		&self,
		direction: Direction,
		take: u32,
	) -> Result<Vec<IndexMatch>> {
		self.estimate_recent_at(direction, take, OffsetDateTime::now_utc().unix_timestamp()).await
	}

	/// Same as [`CatdexService::estimate_recent`] with an explicit "now" in epoch seconds.
	pub async fn estimate_recent_at(
		&self,
		direction: Direction,
		take: u32,
		now: i64,
	) -> Result<Vec<IndexMatch>> {
		if take == 0 {
			return Ok(Vec::new());
		}

		let max_iterations = self.cfg.sync.recency_max_iterations;
		let mut window = self.cfg.sync.recency_initial_window_secs;
		let mut fetch_amount = take.saturating_mul(2).max(MIN_FETCH_AMOUNT);
		let mut since = now;
		let mut candidates = Vec::new();
		let mut widenings = 0;

		while candidates.len() <= take as usize && widenings < max_iterations {
			since = now.saturating_sub(window);
			candidates = self.recent_since(direction, since, fetch_amount).await?;
			window = window.saturating_mul(2);
			widenings += 1;

			tracing::debug!(
				%direction,
				since,
				fetch_amount,
				fetched = candidates.len(),
				"Recency window queried."
			);
		}

		let mut enlargements = 0;

		while candidates.len() == fetch_amount as usize && enlargements < max_iterations {
			fetch_amount = fetch_amount.saturating_mul(2);
			candidates = self.recent_since(direction, since, fetch_amount).await?;
			enlargements += 1;

			tracing::debug!(
				%direction,
				since,
				fetch_amount,
				fetched = candidates.len(),
				"Recency fetch enlarged."
			);
		}

		if candidates.len() == fetch_amount as usize {
			tracing::warn!(
				%direction,
				since,
				fetch_amount,
				"Recency window is still truncated. Returning best effort."
			);
		}

		candidates.sort_by(|a, b| {
			direction.timestamp(&b.metadata).cmp(&direction.timestamp(&a.metadata))
		});
		candidates.truncate(take as usize);

		tracing::info!(
			%direction,
			take,
			found = candidates.len(),
			iterations = widenings + enlargements,
			"Estimated recent records."
		);

		Ok(candidates)
	}

	async fn recent_since(
		&self,
		direction: Direction,
		since: i64,
		top_k: u32,
	) -> Result<Vec<IndexMatch>> {
		let query = IndexQuery {
			vector: vec![0.0; self.vector_dim()],
			top_k,
			filter: Some(MetadataFilter::TimestampAtLeast { direction, since }),
		};

		self.query_index(&query).await
	}
}
