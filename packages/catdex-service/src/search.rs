use serde::{Deserialize, Serialize};

use crate::{CatdexService, Error, Result};
use catdex_storage::models::{IndexMatch, IndexQuery, MetadataFilter};

pub const DEFAULT_SEARCH_TAKE: u32 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default = "default_take")]
	pub take: u32,
	#[serde(default)]
	pub skip: u32,
	/// Restricts matches to these catalog type names. Empty means every type.
	#[serde(default)]
	pub type_filter: Vec<String>,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), take: DEFAULT_SEARCH_TAKE, skip: 0, type_filter: Vec::new() }
	}
}

impl CatdexService {
	pub async fn search(&self, req: SearchRequest) -> Result<Vec<IndexMatch>> {
		if req.query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must not be empty.".to_string() });
		}
		if req.take == 0 {
			return Ok(Vec::new());
		}

		let top_k = req.take.checked_add(req.skip).ok_or_else(|| Error::InvalidRequest {
			message: "take + skip is too large.".to_string(),
		})?;
		let texts = [req.query.clone()];
		let mut batch = self.embed_texts(&texts).await?;
		let Some(vector) = batch.vectors.pop() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vector for the query.".to_string(),
			});
		};
		let filter = (!req.type_filter.is_empty())
			.then(|| MetadataFilter::TypeIn(req.type_filter.clone()));
		let matches = self.query_index(&IndexQuery { vector, top_k, filter }).await?;
		let hits: Vec<IndexMatch> =
			matches.into_iter().skip(req.skip as usize).take(req.take as usize).collect();

		tracing::info!(
			take = req.take,
			skip = req.skip,
			types = req.type_filter.len(),
			hits = hits.len(),
			tokens = batch.total_tokens,
			"Search completed."
		);

		Ok(hits)
	}
}

fn default_take() -> u32 {
	DEFAULT_SEARCH_TAKE
}
