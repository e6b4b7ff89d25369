use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;

use super::Context;

#[derive(Debug, Args)]
pub struct UpdateCommand {
	/// Restrict the update to this `Vendor::Name`; updates everything
	/// installed when omitted.
	pub pack: Option<String>,

	/// Also refresh the public index before checking for newer versions.
	#[arg(short = 'a', long = "all")]
	pub refresh_index_first: bool,

	/// Skip installing newly-required dependencies of updated packs.
	#[arg(short = 'n', long = "no-dependencies")]
	pub no_dependencies: bool,

	/// Report what would be updated without installing anything.
	#[arg(long = "dry-run")]
	pub dry_run: bool,
}

impl UpdateCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let installer = cpackget::installer::Installer::new(&ctx.installation)?;

		if self.refresh_index_first {
			let source = super::read_index_source(&ctx.installation).await?;
			installer.update_index(&source, false).await.context("failed refreshing public index")?;
		}

		let filter = match &self.pack {
			Some(raw) => Some(parse_vendor_name(raw)?),
			None => None,
		};
		let filter_ref = filter.as_ref().map(|(v, n)| (v.as_str(), n.as_str()));

		let reporter = ctx.reporter();
		let eula_prompter = ctx.eula_prompter();
		let updated = installer
			.update(filter_ref, reporter.as_ref(), &eula_prompter, self.no_dependencies, self.dry_run)
			.await
			.context("failed updating packs")?;

		if updated.is_empty() {
			println!("{} everything is up to date", "note:".yellow().bold());
		}
		let verb = if self.dry_run { "would update to" } else { "updated to" };
		for pack_id in &updated {
			println!("{} {verb} {pack_id}", "done:".green().bold());
		}
		Ok(())
	}
}

fn parse_vendor_name(raw: &str) -> anyhow::Result<(String, String)> {
	let (vendor, name) = raw
		.split_once("::")
		.or_else(|| raw.split_once('.'))
		.ok_or_else(|| anyhow::anyhow!("`{raw}` is not a `Vendor::Name` reference"))?;
	Ok((vendor.to_string(), name.to_string()))
}
