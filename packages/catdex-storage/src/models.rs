use std::fmt;

use serde::{Deserialize, Serialize};

/// Which catalog timestamp a recency question is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	Created,
	Updated,
}
impl Direction {
	pub fn metadata_key(self) -> &'static str {
		match self {
			Self::Created => "Created",
			Self::Updated => "Updated",
		}
	}

	pub fn timestamp(self, metadata: &VectorMetadata) -> i64 {
		match self {
			Self::Created => metadata.created,
			Self::Updated => metadata.updated,
		}
	}
}
impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Created => f.write_str("created"),
			Self::Updated => f.write_str("updated"),
		}
	}
}

/// Metadata stored next to every indexed embedding. Timestamps are epoch seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadata {
	#[serde(rename = "Title")]
	pub title: String,
	#[serde(rename = "FullIdent")]
	pub full_ident: String,
	#[serde(rename = "Tags", default)]
	pub tags: Vec<String>,
	#[serde(rename = "Summary", default)]
	pub summary: Option<String>,
	#[serde(rename = "Type")]
	pub type_name: String,
	#[serde(rename = "Thumb", default)]
	pub thumb: String,
	#[serde(rename = "Created")]
	pub created: i64,
	#[serde(rename = "Updated")]
	pub updated: i64,
}

/// One record of the vector index, keyed by the catalog identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedVector {
	pub id: String,
	pub values: Vec<f32>,
	pub metadata: VectorMetadata,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataFilter {
	/// `metadata[direction] >= since`.
	TimestampAtLeast { direction: Direction, since: i64 },
	/// `metadata.Type` is one of the listed type names.
	TypeIn(Vec<String>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexQuery {
	pub vector: Vec<f32>,
	pub top_k: u32,
	pub filter: Option<MetadataFilter>,
}
impl IndexQuery {
	/// True when the query vector carries no similarity signal.
	pub fn is_unranked(&self) -> bool {
		self.vector.iter().all(|value| *value == 0.0)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndexMatch {
	pub id: String,
	pub score: f32,
	pub metadata: VectorMetadata,
}
