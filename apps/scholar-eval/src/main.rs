use clap::Parser;

use scholar_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	scholar_eval::run(args).await
}
