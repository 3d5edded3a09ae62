use catdex_providers::catalog::{CatalogRecord, CatalogSort};
use catdex_storage::models::Direction;
use catdex_testkit::{BASE_TS, CatalogCall, Harness, record};

use super::{assert_parse_error, ids};

const MINUTE: i64 = 60;

/// `count` records created one minute apart starting at `BASE_TS`, updated an hour later.
fn catalog(count: i64) -> Vec<CatalogRecord> {
	(0..count)
		.map(|i| record(&format!("pkg.{i:04}"), BASE_TS + i * MINUTE, BASE_TS + i * MINUTE + 3_600))
		.collect()
}

fn record_ids(records: &[CatalogRecord]) -> Vec<String> {
	ids(records, |found| found.full_ident.as_str())
}

fn newest_pages(skips: &[u32]) -> Vec<CatalogCall> {
	skips
		.iter()
		.map(|skip| CatalogCall { sort: Some(CatalogSort::Newest), take: 100, skip: *skip })
		.collect()
}

#[tokio::test]
async fn returns_only_newer_records_from_a_single_page() {
	let harness = Harness::new(catalog(250), Vec::new());
	let delta = harness
		.service
		.discover_newer_than(Direction::Created, BASE_TS + 199 * MINUTE)
		.await
		.expect("Failed to discover delta.");
	let expected: Vec<String> = (200..250).rev().map(|i| format!("pkg.{i:04}")).collect();

	assert_eq!(record_ids(&delta), expected);
	assert_eq!(harness.catalog.calls(), newest_pages(&[0]));
}

#[tokio::test]
async fn keeps_records_from_every_fetched_page() {
	let harness = Harness::new(catalog(250), Vec::new());
	let delta = harness
		.service
		.discover_newer_than(Direction::Created, BASE_TS + 49 * MINUTE)
		.await
		.expect("Failed to discover delta.");

	assert_eq!(delta.len(), 200);
	assert_eq!(delta.first().map(|found| found.full_ident.as_str()), Some("pkg.0249"));
	assert_eq!(delta.last().map(|found| found.full_ident.as_str()), Some("pkg.0050"));
	assert_eq!(harness.catalog.calls(), newest_pages(&[0, 100, 200]));
}

#[tokio::test]
async fn unbounded_delta_is_skipped_after_the_page_cap() {
	let harness = Harness::new(catalog(1_001), Vec::new());
	let delta = harness
		.service
		.discover_newer_than(Direction::Created, BASE_TS - MINUTE)
		.await
		.expect("Failed to discover delta.");

	assert!(delta.is_empty());
	assert_eq!(harness.catalog.calls().len(), 10);
}

#[tokio::test]
async fn nothing_newer_than_the_watermark() {
	let harness = Harness::new(catalog(20), Vec::new());
	let delta = harness
		.service
		.discover_newer_than(Direction::Created, BASE_TS + 19 * MINUTE)
		.await
		.expect("Failed to discover delta.");

	assert!(delta.is_empty());
	assert_eq!(harness.catalog.calls(), newest_pages(&[0]));
}

#[tokio::test]
async fn updated_direction_uses_the_update_sort_and_timestamps() {
	let harness = Harness::new(catalog(5), Vec::new());
	let delta = harness
		.service
		.discover_newer_than(Direction::Updated, BASE_TS + 3 * MINUTE + 3_600)
		.await
		.expect("Failed to discover delta.");

	assert_eq!(record_ids(&delta), vec!["pkg.0004"]);
	assert_eq!(
		harness.catalog.calls(),
		vec![CatalogCall { sort: Some(CatalogSort::Updated), take: 100, skip: 0 }]
	);
}

#[tokio::test]
async fn malformed_timestamps_fail_discovery() {
	let mut records = catalog(3);

	records[1].created = "not a date".to_string();

	let harness = Harness::new(records, Vec::new());

	assert_parse_error(harness.service.discover_newer_than(Direction::Created, BASE_TS).await);
}
