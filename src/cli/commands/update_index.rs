use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;

use super::Context;

#[derive(Debug, Args)]
pub struct UpdateIndexCommand {
	/// Fetch only the public index itself (the default).
	#[arg(short = 's', long, conflicts_with = "all_pdsc_files")]
	pub sparse: bool,

	/// Also refresh every per-pack `.pdsc` the index references.
	#[arg(short = 'a', long = "all-pdsc-files")]
	pub all_pdsc_files: bool,
}

impl UpdateIndexCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let installation = &ctx.installation;
		let source = super::read_index_source(installation).await?;

		let installer = cpackget::installer::Installer::new(installation)?;
		installer.update_index(&source, false).await.context("failed refreshing public index")?;

		if self.all_pdsc_files {
			let index = cpackget::index::public::read(&installation.public_index_path()).await?;
			installer
				.refresh_pdsc_files(&index)
				.await
				.context("failed fetching per-pack manifests")?;
		}

		println!("{} refreshed public index from {source}", "done:".green().bold());
		Ok(())
	}
}
