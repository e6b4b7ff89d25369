use anyhow::Context as _;
use clap::Args;

use super::Context;

#[derive(Debug, Args)]
pub struct ListCommand {
	/// Only list packs required by at least one other installed pack.
	#[arg(long)]
	pub required: bool,

	/// Only list packs whose `Vendor::Name` contains this substring
	/// (case-insensitive).
	#[arg(short = 'f', long)]
	pub filter: Option<String>,

	/// List the cached `.Download/*.pack` archives instead of installed packs.
	#[arg(short = 'c', long)]
	pub cached: bool,

	/// List every pack family known to the public index instead of installed
	/// packs.
	#[arg(short = 'p', long)]
	pub public: bool,

	/// Only list installed packs with a newer version in the public index.
	#[arg(short = 'u', long)]
	pub updates: bool,
}

impl ListCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let installation = &ctx.installation;

		if self.cached {
			return self.list_cached(installation).await;
		}
		if self.public {
			return self.list_public(installation).await;
		}
		if self.updates {
			return self.list_updates(installation).await;
		}

		let installer = cpackget::installer::Installer::new(installation)?;
		let packs = installer
			.list(self.filter.as_deref(), self.required)
			.await
			.context("failed listing installed packs")?;

		if packs.is_empty() {
			println!("no packs installed");
		}
		for pack_id in packs {
			println!("{}::{}@{}", pack_id.vendor(), pack_id.name(), pack_id.version());
		}
		Ok(())
	}

	async fn list_cached(&self, installation: &cpackget::Installation) -> anyhow::Result<()> {
		let mut entries = fs_err::tokio::read_dir(installation.download_dir()).await?;
		let mut names = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name().to_string_lossy().into_owned();
			if name.ends_with(".pack") {
				names.push(name);
			}
		}
		names.sort();

		if names.is_empty() {
			println!("no cached archives");
		}
		for name in names {
			println!("{name}");
		}
		Ok(())
	}

	async fn list_public(&self, installation: &cpackget::Installation) -> anyhow::Result<()> {
		let index = cpackget::index::public::read(&installation.public_index_path()).await?;
		let mut entries: Vec<_> = index
			.entries
			.iter()
			.filter(|e| {
				self.filter
					.as_deref()
					.is_none_or(|f| format!("{}::{}", e.vendor, e.name).to_lowercase().contains(&f.to_lowercase()))
			})
			.collect();
		entries.sort_by(|a, b| (&a.vendor, &a.name).cmp(&(&b.vendor, &b.name)));

		if entries.is_empty() {
			println!("public index has no matching entries");
		}
		for entry in entries {
			println!("{}::{}@{}", entry.vendor, entry.name, entry.version);
		}
		Ok(())
	}

	async fn list_updates(&self, installation: &cpackget::Installation) -> anyhow::Result<()> {
		let installed = cpackget::layout::installed_packs(installation.root()).await?;
		let public_index = cpackget::index::public::read(&installation.public_index_path()).await?;

		let mut found_any = false;
		for pack_id in &installed {
			let Some(public_entry) = public_index.find(pack_id.vendor(), pack_id.name()) else {
				continue;
			};
			let Ok(latest) = public_entry.version.parse::<semver::Version>() else {
				continue;
			};

			if cpackget::identifier::pack_version_cmp(&latest, pack_id.version()) == std::cmp::Ordering::Greater {
				found_any = true;
				println!("{}::{}@{} -> {}", pack_id.vendor(), pack_id.name(), pack_id.version(), public_entry.version);
			}
		}

		if !found_any {
			println!("everything is up to date");
		}
		Ok(())
	}
}
