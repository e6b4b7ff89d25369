//! Progress and EULA reporting abstractions (§A.4): library code only ever
//! calls through these traits, never touches a terminal directly. Each has a
//! no-op `()` implementation, directly following this crate's former
//! `DownloadsReporter`/`DownloadProgressReporter` split.

#![allow(unused_variables)]

use std::sync::Arc;

/// Receives progress updates for one whole install/update/remove operation.
pub trait InstallReporter: Send + Sync {
	/// A named stage of the operation has started (e.g. "resolving",
	/// "fetching", "staging").
	fn stage_started(&self, stage: &str) {}

	/// A named stage finished.
	fn stage_finished(&self, stage: &str) {}

	/// Returns a reporter for one pack's download, started lazily so a
	/// reporter that doesn't care about per-download detail (like `()`)
	/// pays nothing.
	fn download_reporter(&self, pack: &str) -> Arc<dyn DownloadProgressReporter> {
		Arc::new(())
	}
}

impl InstallReporter for () {}

/// Receives byte-level progress for one archive download.
pub trait DownloadProgressReporter: Send + Sync {
	/// The total size became known (a `Content-Length` header arrived).
	fn set_total(&self, bytes: u64) {}

	/// `bytes` more were received since the last report.
	fn add_progress(&self, bytes: u64) {}

	/// The download finished (successfully or not).
	fn finish(&self) {}
}

impl DownloadProgressReporter for () {}

/// Presents a pack's EULA text to the user and returns whether they accept
/// it. `Auto` implementations (e.g. `--agree-embedded-license`) never block;
/// `Interactive` implementations may.
pub trait EulaPrompter: Send + Sync {
	fn confirm(&self, eula_text: &str) -> Result<bool, errors::EulaPromptError>;
}

/// Always accepts, for `--agree-embedded-license` / non-interactive runs
/// that have explicitly opted in.
pub struct AutoAccept;

impl EulaPrompter for AutoAccept {
	fn confirm(&self, eula_text: &str) -> Result<bool, errors::EulaPromptError> {
		Ok(true)
	}
}

/// Always rejects, used by `--dry-run` (§B.5): a dry run should report what
/// a EULA-gated pack *would* require, not accept it on the user's behalf.
pub struct AutoReject;

impl EulaPrompter for AutoReject {
	fn confirm(&self, eula_text: &str) -> Result<bool, errors::EulaPromptError> {
		Ok(false)
	}
}

pub mod errors {
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum EulaPromptError {
		#[error("no terminal attached to prompt for EULA acceptance")]
		NoTty,

		#[error("failed reading EULA response")]
		Io(#[from] std::io::Error),
	}
}
