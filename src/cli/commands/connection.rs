use clap::Args;
use colored::Colorize as _;
use std::time::Duration;

use super::Context;

#[derive(Debug, Args)]
pub struct ConnectionCommand {
	/// Single URL to probe. Probes every distinct vendor URL on record in
	/// the public index when omitted.
	pub url: Option<String>,
}

impl ConnectionCommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;

		let urls: Vec<String> = match self.url {
			Some(url) => vec![url],
			None => {
				let index = cpackget::index::public::read(&ctx.installation.public_index_path()).await?;
				index.vendor_urls().into_iter().map(str::to_string).collect()
			}
		};

		if urls.is_empty() {
			println!("{} public index has no vendor urls to probe", "note:".yellow().bold());
			return Ok(());
		}

		let mut any_failed = false;
		for url in urls {
			match client.head(&url).send().await {
				Ok(response) if response.status().is_success() || response.status().is_redirection() => {
					println!("{} {url} ({})", "reachable:".green().bold(), response.status());
				}
				Ok(response) => {
					any_failed = true;
					println!("{} {url} ({})", "unreachable:".red().bold(), response.status());
				}
				Err(source) => {
					any_failed = true;
					println!("{} {url} ({source})", "unreachable:".red().bold());
				}
			}
		}

		if any_failed {
			anyhow::bail!("one or more vendor servers were unreachable");
		}
		Ok(())
	}
}
