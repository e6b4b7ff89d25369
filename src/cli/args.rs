//! The root CLI surface (§6): global flags plus one subcommand per
//! operation the Installer exposes.

use clap::{Parser, Subcommand as ClapSubcommand};
use std::{num::NonZeroUsize, path::PathBuf};

use super::commands::{
	add::AddCommand, checksum_create::ChecksumCreateCommand, checksum_verify::ChecksumVerifyCommand,
	connection::ConnectionCommand, init::InitCommand, list::ListCommand, rm::RmCommand,
	signature_create::SignatureCreateCommand, signature_verify::SignatureVerifyCommand, update::UpdateCommand,
	update_index::UpdateIndexCommand,
};

#[derive(Parser, Debug)]
#[command(name = "cpackget", version, about = "Installation manager for CMSIS-Pack software component archives")]
pub struct Cli {
	/// Pack root directory. Falls back to `CMSIS_PACK_ROOT`, then to
	/// auto-discovery from the current directory, then to
	/// `CPACKGET_DEFAULT_MODE_PATH` (§B.3).
	#[arg(short = 'R', long = "pack-root", global = true)]
	pub pack_root: Option<PathBuf>,

	/// Maximum number of concurrent downloads.
	#[arg(long = "concurrent-downloads", global = true)]
	pub concurrent_downloads: Option<NonZeroUsize>,

	/// Per-request network timeout, in seconds.
	#[arg(long = "timeout", global = true)]
	pub timeout_secs: Option<u64>,

	/// Increase verbosity (stackable: `-v` is info, `-vv` debug, `-vvv` trace).
	#[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
	pub verbose: u8,

	/// Emit machine-readable, line-oriented progress instead of a terminal UI.
	#[arg(short = 'E', long = "encoded-progress", global = true)]
	pub encoded_progress: bool,

	/// Skip TLS certificate verification (for internal mirrors only).
	#[arg(long = "insecure-skip-verify", global = true)]
	pub insecure_skip_verify: bool,

	#[command(subcommand)]
	pub command: Subcommand,
}

#[derive(ClapSubcommand, Debug)]
pub enum Subcommand {
	/// Create a new pack root and seed its public index.
	Init(InitCommand),
	/// Install a pack by identifier, archive path/URL, or local `.pdsc`.
	Add(AddCommand),
	/// Remove one or every installed version of a pack.
	Rm(RmCommand),
	/// Reinstall installed packs at their newest available version.
	Update(UpdateCommand),
	/// Refresh the public index (and optionally every per-pack `.pdsc`).
	UpdateIndex(UpdateIndexCommand),
	/// List installed packs.
	List(ListCommand),
	/// Create a `.checksum` sidecar file for a pack archive.
	ChecksumCreate(ChecksumCreateCommand),
	/// Verify a pack archive against a `.checksum` sidecar file.
	ChecksumVerify(ChecksumVerifyCommand),
	/// Sign a pack archive with an X.509 certificate or a PGP key.
	SignatureCreate(SignatureCreateCommand),
	/// Verify a signed pack archive's embedded signature tag.
	SignatureVerify(SignatureVerifyCommand),
	/// Check (or list) connectivity to a vendor's pack server.
	Connection(ConnectionCommand),
}
