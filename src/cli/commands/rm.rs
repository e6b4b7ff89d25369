use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use cpackget::installer::errors::RemoveError;

use super::Context;

#[derive(Debug, Args)]
pub struct RmCommand {
	/// `Vendor::Name[@X.Y.Z]` or `Vendor.Name[.X.Y.Z]`; a bare name with no
	/// version removes every installed version.
	pub pack_ref: cpackget::identifier::PackRef,

	/// Also delete the cached `.Download/*.pack` archive for this pack.
	#[arg(short = 'p', long = "purge")]
	pub purge: bool,

	/// Report what would be removed without removing anything.
	#[arg(long = "dry-run")]
	pub dry_run: bool,
}

impl RmCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let (vendor, name, version) = reference_parts(&self.pack_ref)?;
		let installer = cpackget::installer::Installer::new(&ctx.installation)?;

		let removed = match installer.remove(&vendor, &name, version.as_ref(), self.dry_run).await {
			Ok(removed) => removed,
			Err(RemoveError::PackNotInstalled { vendor, name }) => {
				anyhow::bail!("pack not installed: `{vendor}::{name}`")
			}
			Err(e) => return Err(e).context("failed removing pack"),
		};

		if self.purge && !self.dry_run {
			for pack_id in &removed {
				let cache_path = cpackget::layout::download_cache_path(&ctx.installation, pack_id);
				let _ = fs_err::tokio::remove_file(&cache_path).await;
			}
		}

		let verb = if self.dry_run { "would remove" } else { "removed" };
		for pack_id in &removed {
			println!("{} {verb} {pack_id}", "done:".green().bold());
		}
		Ok(())
	}
}

fn reference_parts(pack_ref: &cpackget::identifier::PackRef) -> anyhow::Result<(String, String, Option<semver::Version>)> {
	match pack_ref {
		cpackget::identifier::PackRef::IdentifierOnly { vendor, name, version, .. } => {
			Ok((vendor.clone(), name.clone(), version.clone()))
		}
		other => anyhow::bail!("`{}` is not a removable pack identifier (expected `Vendor::Name[@X.Y.Z]`)", other.raw()),
	}
}
