//! cpackget: an installation manager for CMSIS-Pack software component
//! archives.
//!
//! The library is organized as a pipeline of largely independent components,
//! leaves first: [`identifier`] parses pack references, [`layout`] owns the
//! on-disk pack root, [`index`] reads/writes the three XML index documents,
//! [`fetch`] retrieves archives, [`archive`] reads/writes `.pack` ZIPs,
//! [`crypto`] checksums and signs them, and [`installer`] coordinates all of
//! the above into the add/remove/update operations the CLI exposes.

use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

/// Pack identifiers and reference parsing.
pub mod identifier;
/// Pack root directory layout and locking.
pub mod layout;
/// The three XML index documents (public, local, manifest).
pub mod index;
/// Downloading pack archives.
pub mod fetch;
/// Reading and writing `.pack` ZIP archives.
pub mod archive;
/// Checksums and signatures.
pub mod crypto;
/// The add/remove/update coordinator.
pub mod installer;
/// Progress/EULA reporting abstractions.
pub mod reporters;
pub(crate) mod util;

/// Name of the pack-root sentinel file created by `init`.
pub const SENTINEL_FILE_NAME: &str = "pack.idx";
/// Subdirectory holding downloaded archives pending installation.
pub const DOWNLOAD_DIR_NAME: &str = ".Download";
/// Subdirectory holding locally added packs (no public index entry).
pub const LOCAL_DIR_NAME: &str = ".Local";
/// Subdirectory holding the mirrored public index and vendor indices.
pub const WEB_DIR_NAME: &str = ".Web";
/// Name of the public index file within [`WEB_DIR_NAME`].
pub const PUBLIC_INDEX_FILE_NAME: &str = "index.pidx";
/// Name of the local repository index within [`LOCAL_DIR_NAME`].
pub const LOCAL_INDEX_FILE_NAME: &str = "local_repository.pidx";
/// Environment variable naming the default pack root.
pub const PACK_ROOT_ENV: &str = "CMSIS_PACK_ROOT";
/// Environment variable naming a fallback pack root when none is discoverable.
pub const DEFAULT_MODE_PATH_ENV: &str = "CPACKGET_DEFAULT_MODE_PATH";

/// Run-wide configuration, mirrored from CLI flags or environment (§A.3).
#[derive(Debug, Clone)]
pub struct Config {
	/// Maximum number of concurrent downloads.
	pub concurrency: NonZeroUsize,
	/// Per-request network timeout.
	pub timeout: Duration,
	/// Skip TLS certificate verification (insecure, for internal mirrors).
	pub insecure_skip_verify: bool,
	/// Skip touching (refreshing the access timestamp of) installed packs.
	pub skip_touch: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			concurrency: NonZeroUsize::new(4).expect("4 is nonzero"),
			timeout: Duration::from_secs(60),
			insecure_skip_verify: false,
			skip_touch: false,
		}
	}
}

/// A value-typed handle onto one pack root.
///
/// This replaces what would otherwise be process-wide mutable state (a
/// single global pack root, a single global HTTP client) with a struct that
/// can be constructed fresh per test or per concurrent caller — the same
/// "re-architect as a value type" move, matching Design Note §9
/// (`lib.rs`).
#[derive(Debug, Clone)]
pub struct Installation {
	root: PathBuf,
	config: Config,
}

impl Installation {
	/// Opens an `Installation` over `root` without validating its layout;
	/// use [`layout::is_initialized`] first if that matters to the caller.
	pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
		Self { root: root.into(), config }
	}

	/// The pack root directory.
	#[must_use]
	pub fn root(&self) -> &std::path::Path {
		&self.root
	}

	/// The active configuration.
	#[must_use]
	pub fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub fn download_dir(&self) -> PathBuf {
		self.root.join(DOWNLOAD_DIR_NAME)
	}

	#[must_use]
	pub fn local_dir(&self) -> PathBuf {
		self.root.join(LOCAL_DIR_NAME)
	}

	#[must_use]
	pub fn web_dir(&self) -> PathBuf {
		self.root.join(WEB_DIR_NAME)
	}

	#[must_use]
	pub fn public_index_path(&self) -> PathBuf {
		self.web_dir().join(PUBLIC_INDEX_FILE_NAME)
	}

	#[must_use]
	pub fn local_index_path(&self) -> PathBuf {
		self.local_dir().join(LOCAL_INDEX_FILE_NAME)
	}
}
