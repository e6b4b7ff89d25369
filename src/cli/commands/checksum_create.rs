use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use cpackget::crypto::checksum::{checksum_file_name, create, ChecksumAlgorithm};
use std::path::PathBuf;

use super::Context;

#[derive(Debug, Args)]
pub struct ChecksumCreateCommand {
	/// Path to the `.pack`/`.zip` archive to checksum.
	pub pack: PathBuf,

	/// Digest algorithm to use.
	#[arg(short = 'a', long, default_value = "sha256")]
	pub algorithm: ChecksumAlgorithm,

	/// Directory to write the `.checksum` sidecar into (defaults to the
	/// archive's own directory).
	#[arg(short = 'o', long)]
	pub output_dir: Option<PathBuf>,
}

impl ChecksumCreateCommand {
	pub async fn run(self, _ctx: &Context) -> anyhow::Result<()> {
		let contents = create(&self.pack, self.algorithm).context("failed computing checksum")?;

		let file_name = checksum_file_name(
			self.pack.file_name().and_then(|n| n.to_str()).context("archive path has no file name")?,
			self.algorithm,
		);
		let dir = self
			.output_dir
			.clone()
			.or_else(|| self.pack.parent().map(std::path::Path::to_path_buf))
			.unwrap_or_default();
		let dest = dir.join(&file_name);

		fs_err::tokio::create_dir_all(&dir).await?;
		fs_err::tokio::write(&dest, contents).await?;

		println!("{} wrote {}", "done:".green().bold(), dest.display());
		Ok(())
	}
}
