use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = catdex::Args::parse();

	catdex::run(args).await
}
