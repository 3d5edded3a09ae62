use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// USD per million input tokens for the embedding models with a known price.
const COST_PER_MILLION_TOKENS: [(&str, f64); 2] =
	[("text-embedding-3-small", 0.02), ("text-embedding-3-large", 0.13)];

/// Vectors in input order plus the tokens billed for producing them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddingBatch {
	pub vectors: Vec<Vec<f32>>,
	pub total_tokens: u64,
}

/// Embeds `texts`, splitting the request into sub-batches of at most `cfg.max_batch` inputs.
pub async fn embed(
	cfg: &catdex_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<EmbeddingBatch> {
	if texts.is_empty() {
		return Ok(EmbeddingBatch::default());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let mut out =
		EmbeddingBatch { vectors: Vec::with_capacity(texts.len()), total_tokens: 0 };

	for chunk in texts.chunks(cfg.max_batch.max(1) as usize) {
		let body = serde_json::json!({
			"model": cfg.model,
			"input": chunk,
			"dimensions": cfg.dimensions,
		});
		let res = client.post(&url).headers(headers.clone()).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;
		let batch = parse_embedding_response(json)?;

		if batch.vectors.len() != chunk.len() {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					batch.vectors.len(),
					chunk.len()
				),
			});
		}

		out.vectors.extend(batch.vectors);
		out.total_tokens += batch.total_tokens;
	}

	Ok(out)
}

/// Price in USD of `tokens` embedding tokens, or `None` for models without a known price.
pub fn token_cost(model: &str, tokens: u64) -> Option<f64> {
	COST_PER_MILLION_TOKENS
		.iter()
		.find(|(name, _)| *name == model)
		.map(|(_, per_million)| tokens as f64 * per_million / 1_000_000.0)
}

fn parse_embedding_response(json: Value) -> Result<EmbeddingBatch> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	let total_tokens = json
		.get("usage")
		.and_then(|usage| usage.get("total_tokens"))
		.and_then(|v| v.as_u64())
		.unwrap_or(0);

	Ok(EmbeddingBatch { vectors: indexed.into_iter().map(|(_, vec)| vec).collect(), total_tokens })
}
