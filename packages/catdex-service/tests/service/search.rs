use catdex_service::{Error, SearchRequest};
use catdex_storage::models::{IndexedVector, MetadataFilter};
use catdex_testkit::{BASE_TS, Harness, indexed};

use super::ids;

const QUERY: &str = "zombie survival map";

/// Ten records whose similarity to the query falls with their number. Odd ones are maps.
fn ranked_index() -> Vec<IndexedVector> {
	(0..10)
		.map(|i| {
			let mut vector = indexed(&format!("pkg.{i}"), BASE_TS, BASE_TS);

			vector.values = vec![1.0, i as f32 * 0.25, 0.0, 0.0];
			vector.metadata.type_name = if i % 2 == 1 { "map" } else { "addon" }.to_string();

			vector
		})
		.collect()
}

fn harness() -> Harness {
	let harness = Harness::new(Vec::new(), ranked_index());

	harness.embedding.set_vector(QUERY, vec![1.0, 0.0, 0.0, 0.0]);

	harness
}

fn hit_ids(hits: &[catdex_storage::models::IndexMatch]) -> Vec<String> {
	ids(hits, |hit| hit.id.as_str())
}

#[tokio::test]
async fn returns_the_requested_window_of_ranked_matches() {
	let harness = harness();
	let hits = harness
		.service
		.search(SearchRequest { take: 3, skip: 2, ..SearchRequest::new(QUERY) })
		.await
		.expect("Failed to search.");
	let queries = harness.index.queries();

	assert_eq!(hit_ids(&hits), vec!["pkg.2", "pkg.3", "pkg.4"]);
	assert_eq!(queries.len(), 1);
	assert_eq!(queries[0].top_k, 5);
	assert_eq!(queries[0].filter, None);
	assert_eq!(harness.embedding.calls(), vec![vec![QUERY.to_string()]]);
}

#[tokio::test]
async fn type_filter_restricts_matches() {
	let harness = harness();
	let hits = harness
		.service
		.search(SearchRequest { type_filter: vec!["map".to_string()], ..SearchRequest::new(QUERY) })
		.await
		.expect("Failed to search.");

	assert_eq!(hit_ids(&hits), vec!["pkg.1", "pkg.3", "pkg.5", "pkg.7", "pkg.9"]);
	assert_eq!(
		harness.index.queries()[0].filter,
		Some(MetadataFilter::TypeIn(vec!["map".to_string()]))
	);
}

#[tokio::test]
async fn skipping_past_the_matches_returns_nothing() {
	let harness = harness();
	let hits = harness
		.service
		.search(SearchRequest { take: 5, skip: 20, ..SearchRequest::new(QUERY) })
		.await
		.expect("Failed to search.");

	assert!(hits.is_empty());
}

#[tokio::test]
async fn blank_queries_are_rejected_before_embedding() {
	let harness = harness();
	let err = harness
		.service
		.search(SearchRequest::new("   "))
		.await
		.expect_err("Expected a blank query to be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "{err:?}");
	assert!(harness.embedding.calls().is_empty());
}

#[test]
fn request_defaults_to_five_results() {
	let req: SearchRequest =
		serde_json::from_value(serde_json::json!({ "query": QUERY })).expect("Failed to parse.");

	assert_eq!(req.take, 5);
	assert_eq!(req.skip, 0);
	assert!(req.type_filter.is_empty());
}
