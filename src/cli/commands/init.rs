use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use url::Url;

use super::Context;

#[derive(Debug, Args)]
pub struct InitCommand {
	/// URL of the public index to seed the new pack root with.
	pub index_url: Url,

	/// Also fetch every per-pack `.pdsc` file referenced by the seeded index.
	#[arg(short = 'a', long = "all-pdsc-files")]
	pub all_pdsc_files: bool,

	/// Overwrite an already-initialized pack root's public index.
	#[arg(short = 'f', long)]
	pub force: bool,
}

impl InitCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let installation = &ctx.installation;

		if cpackget::layout::is_initialized(installation.root()).await && !self.force {
			anyhow::bail!(
				"pack root {} is already initialized; pass --force to overwrite its public index",
				installation.root().display()
			);
		}

		cpackget::layout::init(installation).await.context("failed initializing pack root")?;

		let installer = cpackget::installer::Installer::new(installation)?;
		installer.update_index(&self.index_url, true).await.context("failed seeding public index")?;
		super::write_index_source(installation, &self.index_url).await?;

		if self.all_pdsc_files {
			let index = cpackget::index::public::read(&installation.public_index_path()).await?;
			installer
				.refresh_pdsc_files(&index)
				.await
				.context("failed fetching per-pack manifests")?;
		}

		println!("{} initialized pack root at {}", "done:".green().bold(), installation.root().display());
		Ok(())
	}
}
