//! One module per subcommand (§6), each exposing an
//! `async fn run(self, &Context)`.

pub mod add;
pub mod checksum_create;
pub mod checksum_verify;
pub mod connection;
pub mod init;
pub mod list;
pub mod rm;
pub mod signature_create;
pub mod signature_verify;
pub mod update;
pub mod update_index;

use anyhow::Context as _;
use crate::cli::{args::Subcommand, eula::TerminalEulaPrompter, reporters::{HumanReporter, MachineReporter}};
use cpackget::{reporters::InstallReporter, Installation};

/// Sidecar file recording the URL the public index was last seeded or
/// refreshed from. The library's own persisted state (the two `.pidx`
/// documents and the sentinel file) doesn't track this, so `update-index`
/// — which the CLI table takes with no positional source — needs somewhere
/// to read it back from.
const INDEX_SOURCE_FILE_NAME: &str = ".index-source";

pub(super) async fn read_index_source(installation: &Installation) -> anyhow::Result<url::Url> {
	let path = installation.web_dir().join(INDEX_SOURCE_FILE_NAME);
	let raw = fs_err::tokio::read_to_string(&path)
		.await
		.with_context(|| format!("no index source recorded at {}; run `cpackget init <url>` first", path.display()))?;
	raw.trim().parse().context("recorded index source is not a valid url")
}

pub(super) async fn write_index_source(installation: &Installation, url: &url::Url) -> anyhow::Result<()> {
	let path = installation.web_dir().join(INDEX_SOURCE_FILE_NAME);
	fs_err::tokio::write(&path, url.as_str()).await.context("failed recording index source")
}

/// Everything a subcommand needs beyond its own flags: the resolved
/// [`Installation`] and whether to report progress as a terminal UI or as
/// machine-readable lines.
pub struct Context {
	pub installation: Installation,
	pub encoded_progress: bool,
}

impl Context {
	#[must_use]
	pub fn reporter(&self) -> Box<dyn InstallReporter> {
		if self.encoded_progress {
			Box::new(MachineReporter::default())
		} else {
			Box::new(HumanReporter::default())
		}
	}

	#[must_use]
	pub fn eula_prompter(&self) -> TerminalEulaPrompter {
		TerminalEulaPrompter
	}
}

impl Subcommand {
	pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
		match self {
			Subcommand::Init(cmd) => cmd.run(ctx).await,
			Subcommand::Add(cmd) => cmd.run(ctx).await,
			Subcommand::Rm(cmd) => cmd.run(ctx).await,
			Subcommand::Update(cmd) => cmd.run(ctx).await,
			Subcommand::UpdateIndex(cmd) => cmd.run(ctx).await,
			Subcommand::List(cmd) => cmd.run(ctx).await,
			Subcommand::ChecksumCreate(cmd) => cmd.run(ctx).await,
			Subcommand::ChecksumVerify(cmd) => cmd.run(ctx).await,
			Subcommand::SignatureCreate(cmd) => cmd.run(ctx).await,
			Subcommand::SignatureVerify(cmd) => cmd.run(ctx).await,
			Subcommand::Connection(cmd) => cmd.run(ctx).await,
		}
	}
}
