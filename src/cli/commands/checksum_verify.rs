use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use cpackget::crypto::checksum::{algorithm_from_file_name, verify, ChecksumAlgorithm};
use std::path::PathBuf;

use super::Context;

#[derive(Debug, Args)]
pub struct ChecksumVerifyCommand {
	/// Path to the `.pack`/`.zip` archive to verify.
	pub pack: PathBuf,

	/// Path to the `.checksum` sidecar file to verify against.
	pub checksum: PathBuf,

	/// Digest algorithm the checksum file uses. Parsed from the checksum
	/// file's own name (`<pack-file-name>.<algorithm>.checksum`) when
	/// omitted; set this to override that.
	#[arg(short = 'a', long)]
	pub algorithm: Option<ChecksumAlgorithm>,
}

impl ChecksumVerifyCommand {
	pub async fn run(self, _ctx: &Context) -> anyhow::Result<()> {
		let algorithm = match self.algorithm {
			Some(algorithm) => algorithm,
			None => {
				let file_name = self
					.checksum
					.file_name()
					.and_then(|n| n.to_str())
					.ok_or_else(|| anyhow::anyhow!("checksum path {} has no file name", self.checksum.display()))?;
				algorithm_from_file_name(file_name)
					.with_context(|| format!("could not determine checksum algorithm from {file_name}"))?
			}
		};

		let contents = fs_err::tokio::read_to_string(&self.checksum)
			.await
			.with_context(|| format!("failed reading checksum file {}", self.checksum.display()))?;

		verify(&self.pack, &contents, algorithm).context("checksum verification failed")?;

		println!("{} {} matches {}", "ok:".green().bold(), self.pack.display(), self.checksum.display());
		Ok(())
	}
}
