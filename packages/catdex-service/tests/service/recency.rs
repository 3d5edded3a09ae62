use catdex_storage::models::{Direction, MetadataFilter};
use catdex_testkit::{BASE_TS, Harness, VECTOR_DIM, indexed, test_config};

use super::{DAY, HOUR, ids};

const NOW: i64 = BASE_TS + 30 * DAY;

fn match_ids(matches: &[catdex_storage::models::IndexMatch]) -> Vec<String> {
	ids(matches, |found| found.id.as_str())
}

#[tokio::test]
async fn returns_every_record_when_the_index_holds_exactly_take() {
	let vectors = (1..=5).map(|age| indexed(&format!("p{age}"), NOW - age * HOUR, NOW)).collect();
	let harness = Harness::new(Vec::new(), vectors);
	let recent = harness
		.service
		.estimate_recent_at(Direction::Created, 5, NOW)
		.await
		.expect("Failed to estimate recent records.");

	assert_eq!(match_ids(&recent), vec!["p1", "p2", "p3", "p4", "p5"]);
}

#[tokio::test]
async fn empty_index_yields_no_records_after_widening_every_window() {
	let harness = Harness::new(Vec::new(), Vec::new());
	let recent = harness
		.service
		.estimate_recent_at(Direction::Updated, 1, NOW)
		.await
		.expect("Failed to estimate recent records.");

	assert!(recent.is_empty());
	assert_eq!(harness.index.queries().len(), 10);
}

#[tokio::test]
async fn zero_take_does_not_query() {
	let harness = Harness::new(Vec::new(), vec![indexed("p1", NOW, NOW)]);
	let recent = harness
		.service
		.estimate_recent_at(Direction::Created, 0, NOW)
		.await
		.expect("Failed to estimate recent records.");

	assert!(recent.is_empty());
	assert!(harness.index.queries().is_empty());
}

#[tokio::test]
async fn widens_the_window_until_it_holds_more_than_take() {
	let vectors =
		(0..3).map(|i| indexed(&format!("p{i}"), NOW - 3 * DAY - i * HOUR, NOW)).collect();
	let harness = Harness::new(Vec::new(), vectors);
	let recent = harness
		.service
		.estimate_recent_at(Direction::Created, 1, NOW)
		.await
		.expect("Failed to estimate recent records.");
	let windows: Vec<i64> = harness
		.index
		.queries()
		.into_iter()
		.map(|query| match query.filter {
			Some(MetadataFilter::TimestampAtLeast { direction: Direction::Created, since }) =>
				NOW - since,
			other => panic!("Unexpected filter {other:?}."),
		})
		.collect();

	assert_eq!(windows, vec![12 * HOUR, DAY, 2 * DAY, 4 * DAY]);
	assert_eq!(match_ids(&recent), vec!["p0"]);
}

#[tokio::test]
async fn enlarges_truncated_fetches_before_sorting() {
	// Key order puts the oldest records first, so a truncated fetch misses the newest ones.
	let vectors = (0..30)
		.map(|i| indexed(&format!("p{i:02}"), NOW - (30 - i) * 60, NOW - (30 - i) * 60))
		.collect();
	let harness = Harness::new(Vec::new(), vectors);
	let recent = harness
		.service
		.estimate_recent_at(Direction::Updated, 3, NOW)
		.await
		.expect("Failed to estimate recent records.");
	let queries = harness.index.queries();

	assert_eq!(match_ids(&recent), vec!["p29", "p28", "p27"]);
	assert_eq!(queries.iter().map(|query| query.top_k).collect::<Vec<_>>(), vec![20, 40]);
	assert_eq!(queries[0].filter, queries[1].filter);
	assert!(queries.iter().all(|query| query.is_unranked() && query.vector.len() == 4));
}

#[tokio::test]
async fn capped_enlargement_returns_a_truncated_best_effort() {
	let mut cfg = test_config(VECTOR_DIM);

	cfg.sync.recency_max_iterations = 2;

	let vectors = (0..100)
		.map(|i| indexed(&format!("p{i:03}"), NOW - (100 - i) * 60, NOW - (100 - i) * 60))
		.collect();
	let harness = Harness::with_config(cfg, Vec::new(), vectors);
	let recent = harness
		.service
		.estimate_recent_at(Direction::Updated, 3, NOW)
		.await
		.expect("Failed to estimate recent records.");
	let top_ks = harness.index.queries().iter().map(|query| query.top_k).collect::<Vec<_>>();

	assert_eq!(top_ks, vec![20, 40, 80]);
	assert_eq!(match_ids(&recent), vec!["p079", "p078", "p077"]);
}

#[tokio::test]
async fn orders_by_the_requested_direction() {
	let harness = Harness::new(
		Vec::new(),
		vec![
			indexed("old.created", NOW - 2 * HOUR, NOW - HOUR),
			indexed("new.created", NOW - HOUR, NOW - 3 * HOUR),
		],
	);
	let by_created = harness
		.service
		.estimate_recent_at(Direction::Created, 1, NOW)
		.await
		.expect("Failed to estimate recent records.");
	let by_updated = harness
		.service
		.estimate_recent_at(Direction::Updated, 1, NOW)
		.await
		.expect("Failed to estimate recent records.");

	assert_eq!(match_ids(&by_created), vec!["new.created"]);
	assert_eq!(match_ids(&by_updated), vec!["old.created"]);
}
