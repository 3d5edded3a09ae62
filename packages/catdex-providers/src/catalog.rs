use std::{path::Path, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use catdex_config::MAX_CATALOG_PAGE;

/// One package as listed by the catalog source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
	#[serde(rename = "FullIdent")]
	pub full_ident: String,
	#[serde(rename = "Title")]
	pub title: String,
	#[serde(rename = "Summary", default)]
	pub summary: Option<String>,
	#[serde(rename = "Tags", default)]
	pub tags: Vec<String>,
	#[serde(rename = "TypeName")]
	pub type_name: String,
	#[serde(rename = "Thumb", default)]
	pub thumb: String,
	#[serde(rename = "Created")]
	pub created: String,
	#[serde(rename = "Updated")]
	pub updated: String,
}

/// Server-side orderings understood by the catalog source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogSort {
	Newest,
	Updated,
}
impl CatalogSort {
	pub fn query(self) -> &'static str {
		match self {
			Self::Newest => "sort:newest",
			Self::Updated => "sort:updated",
		}
	}
}

#[derive(Debug, Deserialize)]
struct FindResponse {
	#[serde(rename = "Packages")]
	packages: Vec<CatalogRecord>,
}

pub async fn find(
	cfg: &catdex_config::Catalog,
	sort: Option<CatalogSort>,
	take: u32,
	skip: u32,
) -> Result<Vec<CatalogRecord>> {
	check_take(take)?;

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let query = sort.map(CatalogSort::query).unwrap_or("");
	let res = client
		.get(url)
		.query(&[("skip", skip.to_string()), ("take", take.to_string()), ("q", query.to_string())])
		.send()
		.await?;
	let body = res.error_for_status()?.text().await?;

	parse_find_response(&body)
}

/// Reads a catalog dump: a JSON array of records in the source's wire format.
pub async fn load_dump(path: &Path) -> Result<Vec<CatalogRecord>> {
	let raw = tokio::fs::read_to_string(path)
		.await
		.map_err(|err| Error::ReadDump { path: path.to_path_buf(), source: err })?;

	Ok(serde_json::from_str(&raw)?)
}

pub fn check_take(take: u32) -> Result<()> {
	if take > MAX_CATALOG_PAGE {
		return Err(Error::InvalidRequest {
			message: format!("Catalog take must be less than or equal to {MAX_CATALOG_PAGE}."),
		});
	}

	Ok(())
}

fn parse_find_response(body: &str) -> Result<Vec<CatalogRecord>> {
	let response: FindResponse = serde_json::from_str(body)?;

	Ok(response.packages)
}
