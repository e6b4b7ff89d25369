use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use cpackget::{
	identifier::PackRef,
	reporters::{AutoAccept, AutoReject},
};

use super::Context;

#[derive(Debug, Args)]
pub struct AddCommand {
	/// Pack reference: `Vendor::Name[@X.Y.Z]`, `Vendor.Name.X.Y.Z`, a
	/// `.pack`/`.zip` path or URL, or a local `.pdsc` path.
	pub pack_ref: PackRef,

	/// Accept every embedded EULA without prompting.
	#[arg(short = 'a', long = "agree-embedded-license")]
	pub agree_embedded_license: bool,

	/// Extract this pack's embedded license file next to the current
	/// directory without installing the pack.
	#[arg(short = 'x', long = "extract-embedded-license")]
	pub extract_embedded_license: bool,

	/// Reinstall even if this exact version is already installed.
	#[arg(short = 'F', long = "force-reinstall")]
	pub force_reinstall: bool,

	/// Skip installing this pack's declared dependencies.
	#[arg(short = 'n', long = "no-dependencies")]
	pub no_dependencies: bool,

	/// Don't refresh the installed pack's access timestamp after installing.
	#[arg(long = "skip-touch")]
	pub skip_touch: bool,

	/// Resolve, fetch, and validate without writing anything to the pack root.
	#[arg(long = "dry-run")]
	pub dry_run: bool,
}

impl AddCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let config = cpackget::Config { skip_touch: self.skip_touch, ..ctx.installation.config().clone() };
		let installation = cpackget::Installation::new(ctx.installation.root(), config);
		let installer = cpackget::installer::Installer::new(&installation)?;

		if self.extract_embedded_license {
			let dest_dir = std::env::current_dir()?;
			return match installer.extract_license(&self.pack_ref, &dest_dir).await? {
				Some(path) => {
					println!("{} extracted license to {}", "done:".green().bold(), path.display());
					Ok(())
				}
				None => {
					println!("{} this release has no embedded license", "note:".yellow().bold());
					Ok(())
				}
			};
		}

		let reporter = ctx.reporter();
		let eula_prompter = ctx.eula_prompter();

		let pack_id = if self.dry_run {
			installer
				.add(&self.pack_ref, reporter.as_ref(), &AutoReject, true, self.force_reinstall, self.no_dependencies)
				.await
		} else if self.agree_embedded_license {
			installer
				.add(&self.pack_ref, reporter.as_ref(), &AutoAccept, false, self.force_reinstall, self.no_dependencies)
				.await
		} else {
			installer
				.add(&self.pack_ref, reporter.as_ref(), &eula_prompter, false, self.force_reinstall, self.no_dependencies)
				.await
		}
		.context("failed installing pack")?;

		if self.dry_run {
			println!("{} would install {pack_id}", "dry-run:".yellow().bold());
		} else {
			println!("{} installed {pack_id}", "done:".green().bold());
		}
		Ok(())
	}
}
