mod cli;

use clap::Parser as _;
use cli::{args::Cli, commands::Context};
use cpackget::{Config, Installation};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	cli::logging::init(cli.verbose, cli.encoded_progress);

	if let Err(err) = run(cli).await {
		cli::display_err(&err);
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let root = cli::resolve_pack_root(cli.pack_root)?;

	let mut config = Config::default();
	if let Some(concurrency) = cli.concurrent_downloads {
		config.concurrency = concurrency;
	}
	if let Some(timeout_secs) = cli.timeout_secs {
		config.timeout = std::time::Duration::from_secs(timeout_secs);
	}
	config.insecure_skip_verify = cli.insecure_skip_verify;

	let installation = Installation::new(root, config);
	let ctx = Context { installation, encoded_progress: cli.encoded_progress };

	cli.command.run(&ctx).await
}
