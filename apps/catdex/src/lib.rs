use std::{path::PathBuf, sync::Arc};

use clap::{
	Parser, Subcommand, ValueEnum,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use color_eyre::eyre;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use catdex_config::Config;
use catdex_providers::{catalog::CatalogSort, embedding};
use catdex_service::{CatdexService, Providers, SearchRequest, SyncReport, time_codec};
use catdex_storage::{
	models::{Direction, IndexMatch},
	qdrant::QdrantStore,
};

#[derive(Debug, Parser)]
#[command(
	version = env!("CARGO_PKG_VERSION"),
	rename_all = "kebab",
	styles = styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Index catalog records created or updated since the last sync.
	Sync,
	/// Re-embed and upsert the whole catalog.
	Reindex,
	/// Semantic search over indexed records.
	Search {
		query: String,
		#[arg(long, default_value_t = 5)]
		take: u32,
		#[arg(long, default_value_t = 0)]
		skip: u32,
		/// Only return records of this type. Repeatable.
		#[arg(long = "type", value_name = "TYPE")]
		types: Vec<String>,
	},
	/// Newest indexed records by creation or update time.
	Recent {
		#[arg(long, value_enum, default_value_t = DirectionArg::Updated)]
		direction: DirectionArg,
		#[arg(long, default_value_t = 10)]
		take: u32,
	},
	/// Catalog records newer than a timestamp, without indexing them.
	Discover {
		#[arg(long, value_enum)]
		direction: DirectionArg,
		/// ISO-8601 timestamp.
		#[arg(long)]
		watermark: String,
	},
	/// One raw page of the catalog source.
	Catalog {
		#[arg(long, value_enum)]
		sort: Option<SortArg>,
		#[arg(long, default_value_t = 20)]
		take: u32,
		#[arg(long, default_value_t = 0)]
		skip: u32,
	},
	/// Remove every vector from the index.
	DeleteAll {
		#[arg(long)]
		yes: bool,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
	Created,
	Updated,
}
impl From<DirectionArg> for Direction {
	fn from(arg: DirectionArg) -> Self {
		match arg {
			DirectionArg::Created => Self::Created,
			DirectionArg::Updated => Self::Updated,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
	Newest,
	Updated,
}
impl From<SortArg> for CatalogSort {
	fn from(arg: SortArg) -> Self {
		match arg {
			SortArg::Newest => Self::Newest,
			SortArg::Updated => Self::Updated,
		}
	}
}

#[derive(Debug, Serialize)]
struct RecentEntry {
	id: String,
	title: String,
	timestamp: String,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = catdex_config::load(&args.config)?;

	init_tracing(&config);

	if let Command::DeleteAll { yes: false } = args.command {
		return Err(eyre::eyre!("delete-all removes every indexed vector. Pass --yes to confirm."));
	}

	let store = QdrantStore::new(&config.storage.qdrant)?;

	if !matches!(args.command, Command::Catalog { .. }) {
		store.ensure_collection().await?;
	}

	let providers = Providers::from_config(&config).await?;
	let service = CatdexService::with_providers(config, Arc::new(store), providers);

	match args.command {
		Command::Sync => {
			let report = service.sync_delta().await?;

			log_cost(&service.cfg, &report);
			print_json(&report)
		},
		Command::Reindex => {
			let report = service.reindex_all().await?;

			log_cost(&service.cfg, &report);
			print_json(&report)
		},
		Command::Search { query, take, skip, types } => {
			let hits =
				service.search(SearchRequest { query, take, skip, type_filter: types }).await?;

			print_json(&hits)
		},
		Command::Recent { direction, take } => {
			let direction = Direction::from(direction);
			let recent = service.estimate_recent(direction, take).await?;
			let entries = recent
				.iter()
				.map(|found| recent_entry(direction, found))
				.collect::<catdex_service::Result<Vec<_>>>()?;

			print_json(&entries)
		},
		Command::Discover { direction, watermark } => {
			let watermark = time_codec::to_timestamp(&watermark)?;
			let delta = service.discover_newer_than(direction.into(), watermark).await?;

			print_json(&delta)
		},
		Command::Catalog { sort, take, skip } => {
			let page = service.fetch_catalog(sort.map(CatalogSort::from), take, skip).await?;

			print_json(&page)
		},
		Command::DeleteAll { .. } => {
			service.delete_all().await?;

			Ok(())
		},
	}
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
}

fn recent_entry(direction: Direction, found: &IndexMatch) -> catdex_service::Result<RecentEntry> {
	Ok(RecentEntry {
		id: found.id.clone(),
		title: found.metadata.title.clone(),
		timestamp: time_codec::from_timestamp(direction.timestamp(&found.metadata))?,
	})
}

fn log_cost(config: &Config, report: &SyncReport) {
	let provider = &config.providers.embedding.provider_id;
	let model = &config.providers.embedding.model;

	match embedding::token_cost(model, report.tokens) {
		Some(usd) => tracing::info!(
			%provider,
			indexed = report.indexed,
			tokens = report.tokens,
			usd,
			"Embedding cost."
		),
		None => tracing::info!(
			%provider,
			indexed = report.indexed,
			tokens = report.tokens,
			%model,
			"Embedding cost is unknown for this model."
		),
	}
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}
