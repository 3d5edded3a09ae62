use catdex_providers::catalog::CatalogRecord;
use catdex_service::{Error, SyncReport};
use catdex_storage::models::Direction;
use catdex_testkit::{BASE_TS, CatalogCall, Harness, VECTOR_DIM, indexed, record, test_config};

use super::{HOUR, now};

fn bulk_catalog(count: i64) -> Vec<CatalogRecord> {
	(0..count).map(|i| record(&format!("pkg.{i:05}"), BASE_TS + i, BASE_TS + i)).collect()
}

#[tokio::test]
async fn sync_without_indexed_records_needs_a_reindex() {
	let harness = Harness::new(vec![record("a", BASE_TS, BASE_TS)], Vec::new());
	let err = harness.service.sync_delta().await.expect_err("Expected a missing watermark.");

	assert!(matches!(err, Error::NoWatermark { direction: Direction::Created }), "{err:?}");
	assert!(harness.catalog.calls().is_empty());
	assert!(harness.embedding.calls().is_empty());
}

#[tokio::test]
async fn sync_indexes_a_record_created_after_the_watermark() {
	let t = now() - HOUR;
	let harness = Harness::new(
		vec![record("a.old", t, t), record("a.new", t + 1, t + 1)],
		vec![indexed("a.old", t, t)],
	);
	let report = harness.service.sync_delta().await.expect("Failed to sync delta.");
	let stored = harness.index.get("a.new").expect("Expected the new record to be indexed.");

	// The record is both created and updated after the watermark, so it appears twice.
	assert_eq!(report.indexed, 2);
	assert_eq!(harness.index.upserts(), vec![2]);
	assert_eq!(harness.embedding.calls().len(), 1);
	assert_eq!(stored.metadata.created, t + 1);
	assert_eq!(harness.index.len(), 2);
}

#[tokio::test]
async fn sync_stores_a_record_that_is_only_new_by_creation() {
	let t = now() - HOUR;
	let harness = Harness::new(
		vec![record("a.old", t, t + 5), record("a.new", t + 1, t + 1)],
		vec![indexed("a.old", t, t + 5)],
	);
	let report = harness.service.sync_delta().await.expect("Failed to sync delta.");
	let stored = harness.index.get("a.new").expect("Expected the new record to be indexed.");

	assert_eq!(report.indexed, 1);
	assert_eq!(harness.index.upserts(), vec![1]);
	assert_eq!(stored.metadata.created, t + 1);
	assert_eq!(harness.index.len(), 2);
}

#[tokio::test]
async fn sync_with_an_empty_delta_does_not_embed() {
	let t = now() - HOUR;
	let harness = Harness::new(vec![record("a.old", t, t)], vec![indexed("a.old", t, t)]);
	let report = harness.service.sync_delta().await.expect("Failed to sync delta.");

	assert_eq!(report, SyncReport::default());
	assert!(harness.embedding.calls().is_empty());
	assert!(harness.index.upserts().is_empty());
}

#[tokio::test]
async fn embedding_text_joins_title_summary_and_tags() {
	let mut source = record("gm.sandbox", BASE_TS, BASE_TS);

	source.title = "Sandbox".to_string();
	source.summary = Some("Build anything.".to_string());
	source.tags = vec!["sandbox".to_string(), "building".to_string()];

	let mut bare = record("gm.bare", BASE_TS, BASE_TS);

	bare.title = "Bare".to_string();

	let harness = Harness::new(vec![source, bare], Vec::new());
	let report = harness.service.reindex_all().await.expect("Failed to reindex.");

	assert_eq!(
		harness.embedding.calls(),
		vec![vec![
			"Title:Sandbox, Summary: Build anything., Tags:sandbox, building".to_string(),
			"Title:Bare".to_string(),
		]]
	);
	assert_eq!(report.tokens, 7);
}

#[tokio::test]
async fn reindex_pages_the_catalog_and_embeds_once() {
	let harness = Harness::new(bulk_catalog(1_200), Vec::new());
	let report = harness.service.reindex_all().await.expect("Failed to reindex.");
	let calls = harness.catalog.calls();
	let embed_calls = harness.embedding.calls();

	assert_eq!(report.indexed, 1_200);
	assert_eq!(
		calls,
		[0, 500, 1_000]
			.into_iter()
			.map(|skip| CatalogCall { sort: None, take: 500, skip })
			.collect::<Vec<_>>()
	);
	assert_eq!(embed_calls.len(), 1);
	assert_eq!(embed_calls[0].len(), 1_200);
	assert_eq!(harness.index.upserts(), vec![100; 12]);
	assert_eq!(harness.index.len(), 1_200);
}

#[tokio::test]
async fn reindexing_twice_replaces_records_in_place() {
	let harness = Harness::new(bulk_catalog(3), Vec::new());

	harness.service.reindex_all().await.expect("Failed to reindex.");

	let first = harness.index.get("pkg.00001").expect("Expected an indexed record.");

	harness.service.reindex_all().await.expect("Failed to reindex again.");

	assert_eq!(harness.index.len(), 3);
	assert_eq!(harness.index.get("pkg.00001"), Some(first));
}

#[tokio::test]
async fn remote_calls_are_retried_individually() {
	let harness = Harness::new(bulk_catalog(3), Vec::new()).with_retries(3);

	harness.catalog.fail_next(2);
	harness.embedding.fail_next(1);
	harness.index.fail_next(2);

	let report = harness.service.reindex_all().await.expect("Retries should absorb failures.");

	assert_eq!(report.indexed, 3);
	assert_eq!(harness.catalog.calls().len(), 3);
	assert_eq!(harness.embedding.calls().len(), 2);
	assert_eq!(harness.index.upserts(), vec![3]);
}

#[tokio::test]
async fn a_failed_sub_batch_does_not_resend_earlier_ones() {
	let mut cfg = test_config(VECTOR_DIM);

	cfg.providers.embedding.max_batch = 2;

	let harness = Harness::with_config(cfg, bulk_catalog(5), Vec::new()).with_retries(3);

	harness.embedding.fail_calls(&[2]);

	let report = harness.service.reindex_all().await.expect("Retries should absorb failures.");
	let text = |i: usize| format!("Title:Package pkg.{i:05}");
	let calls = harness.embedding.calls();

	assert_eq!(report.indexed, 5);
	assert_eq!(
		calls,
		vec![
			vec![text(0), text(1)],
			vec![text(2), text(3)],
			vec![text(2), text(3)],
			vec![text(4)],
		]
	);
	assert_eq!(calls.iter().filter(|call| call.contains(&text(0))).count(), 1);
	assert_eq!(harness.index.upserts(), vec![5]);
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_error() {
	let harness = Harness::new(bulk_catalog(3), Vec::new()).with_retries(2);

	harness.catalog.fail_next(2);

	let err = harness.service.reindex_all().await.expect_err("Expected a catalog failure.");

	assert!(matches!(err, Error::Catalog { .. }), "{err:?}");
	assert_eq!(harness.catalog.calls().len(), 2);
	assert!(harness.embedding.calls().is_empty());
}

#[tokio::test]
async fn wrong_embedding_dimension_upserts_nothing() {
	let harness = Harness::new(bulk_catalog(2), Vec::new());

	harness.embedding.set_vector("Title:Package pkg.00001", vec![1.0, 0.0]);

	let err = harness.service.reindex_all().await.expect_err("Expected a dimension mismatch.");

	assert!(matches!(err, Error::Provider { .. }), "{err:?}");
	assert!(harness.index.upserts().is_empty());
}

#[tokio::test]
async fn delete_all_empties_the_index() {
	let harness = Harness::new(Vec::new(), vec![indexed("a", BASE_TS, BASE_TS)]);

	harness.service.delete_all().await.expect("Failed to delete.");

	assert!(harness.index.is_empty());
}

#[tokio::test]
async fn oversized_catalog_pages_are_rejected_locally() {
	let harness = Harness::new(bulk_catalog(3), Vec::new());
	let err = harness
		.service
		.fetch_catalog(None, 501, 0)
		.await
		.expect_err("Expected the page size to be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "{err:?}");
	assert!(harness.catalog.calls().is_empty());
}
