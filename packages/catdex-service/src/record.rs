//! Mapping between catalog records and the vectors stored for them.

use catdex_providers::catalog::{CatalogRecord, CatalogSort};
use catdex_storage::models::{Direction, IndexedVector, VectorMetadata};

use crate::{Result, time_codec};

/// Text sent to the embedding model for one record.
pub fn embed_text(record: &CatalogRecord) -> String {
	let mut text = format!("Title:{}", record.title);

	if let Some(summary) = record.summary.as_deref().filter(|summary| !summary.is_empty()) {
		text.push_str(", Summary: ");
		text.push_str(summary);
	}
	if !record.tags.is_empty() {
		text.push_str(", Tags:");
		text.push_str(&record.tags.join(", "));
	}

	text
}

pub fn encode(embedding: Vec<f32>, record: &CatalogRecord) -> Result<IndexedVector> {
	Ok(assemble(embedding, metadata_for(record)?))
}

pub fn metadata_for(record: &CatalogRecord) -> Result<VectorMetadata> {
	Ok(VectorMetadata {
		title: record.title.clone(),
		full_ident: record.full_ident.clone(),
		tags: record.tags.clone(),
		summary: record.summary.clone(),
		type_name: record.type_name.clone(),
		thumb: record.thumb.clone(),
		created: time_codec::to_timestamp(&record.created)?,
		updated: time_codec::to_timestamp(&record.updated)?,
	})
}

pub(crate) fn assemble(embedding: Vec<f32>, metadata: VectorMetadata) -> IndexedVector {
	IndexedVector { id: metadata.full_ident.clone(), values: embedding, metadata }
}

pub fn record_timestamp(direction: Direction, record: &CatalogRecord) -> Result<i64> {
	match direction {
		Direction::Created => time_codec::to_timestamp(&record.created),
		Direction::Updated => time_codec::to_timestamp(&record.updated),
	}
}

pub fn catalog_sort(direction: Direction) -> CatalogSort {
	match direction {
		Direction::Created => CatalogSort::Newest,
		Direction::Updated => CatalogSort::Updated,
	}
}
