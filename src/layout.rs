//! Pack Root Layout (§4.2): the on-disk directory tree, its sentinel file,
//! and the cooperative lock that serializes mutating operations across
//! processes.

use crate::{Installation, DOWNLOAD_DIR_NAME, LOCAL_DIR_NAME, SENTINEL_FILE_NAME, WEB_DIR_NAME};
use fs_err::tokio as fs;
use fs4::tokio::AsyncFileExt as _;
use std::path::Path;
use tracing::instrument;

/// Whether `root` already looks like an initialized pack root (the sentinel
/// file is present).
#[instrument(level = "debug")]
pub async fn is_initialized(root: &Path) -> bool {
	fs::metadata(root.join(SENTINEL_FILE_NAME)).await.is_ok()
}

/// Creates the `.Download/`, `.Local/`, `.Web/` subdirectories and the
/// `pack.idx` sentinel, and writes empty index documents if they don't
/// already exist. Safe to call on an already-initialized root: every step is
/// idempotent.
#[instrument(skip(installation), level = "debug")]
pub async fn init(installation: &Installation) -> Result<(), errors::InitError> {
	let root = installation.root();
	fs::create_dir_all(root).await?;
	fs::create_dir_all(installation.download_dir()).await?;
	fs::create_dir_all(installation.local_dir()).await?;
	fs::create_dir_all(installation.web_dir()).await?;

	if fs::metadata(installation.public_index_path()).await.is_err() {
		crate::index::public::write_empty(&installation.public_index_path()).await?;
	}
	if fs::metadata(installation.local_index_path()).await.is_err() {
		crate::index::local::write_empty(&installation.local_index_path()).await?;
	}

	fs::write(root.join(SENTINEL_FILE_NAME), b"").await?;

	Ok(())
}

/// Walks up from `start` looking for a directory containing `.Web/index.pidx`
/// (§B.3 of the supplemented features). Returns the pack root, not the
/// `.Web` directory.
#[instrument(level = "debug")]
pub fn discover(start: &Path) -> Option<std::path::PathBuf> {
	let mut dir = Some(start);
	while let Some(candidate) = dir {
		if candidate
			.join(WEB_DIR_NAME)
			.join(crate::PUBLIC_INDEX_FILE_NAME)
			.is_file()
		{
			return Some(candidate.to_path_buf());
		}
		dir = candidate.parent();
	}
	None
}

/// An RAII guard holding the pack root's advisory exclusive lock for the
/// duration of one mutating operation (add/remove/update/update-index).
/// Read-only operations (list, checksum-verify, signature-verify) never
/// acquire this lock, per §5.
pub struct PackRootLock {
	_file: tokio::fs::File,
}

impl PackRootLock {
	/// Acquires the exclusive lock on `root`'s sentinel file, waiting for any
	/// other process's mutating operation to finish first.
	#[instrument(level = "debug")]
	pub async fn acquire(root: &Path) -> Result<Self, errors::LockError> {
		let path = root.join(SENTINEL_FILE_NAME);
		let file = tokio::fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(&path)
			.await
			.map_err(|source| errors::LockError::Open { path: path.clone(), source })?;

		file.lock_exclusive()
			.await
			.map_err(|source| errors::LockError::Lock { path, source })?;

		Ok(Self { _file: file })
	}
}

/// Returns the pack root's `<vendor>.<name>.<x.y.z>.pack` cache path within
/// `.Download/`.
#[must_use]
pub fn download_cache_path(installation: &Installation, pack_id: &crate::identifier::PackId) -> std::path::PathBuf {
	installation.download_dir().join(pack_id.download_file_name())
}

/// Discovers every installed pack by walking the `<root>/<Vendor>/<Name>/<Version>/`
/// tree directly: the actual ground truth for "is this pack installed",
/// independent of how it got there (§4.7, "Registered"). A version directory
/// counts as installed only if it holds the matching `<Vendor>.<Name>.pdsc`
/// manifest.
#[instrument(level = "debug")]
pub async fn installed_packs(root: &Path) -> std::io::Result<Vec<crate::identifier::PackId>> {
	use crate::identifier::PackId;

	let mut packs = Vec::new();
	let mut vendor_entries = match fs::read_dir(root).await {
		Ok(entries) => entries,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(packs),
		Err(e) => return Err(e),
	};

	while let Some(vendor_entry) = vendor_entries.next_entry().await? {
		let vendor = vendor_entry.file_name().to_string_lossy().into_owned();
		if vendor.starts_with('.') || !vendor_entry.file_type().await?.is_dir() {
			continue;
		}

		let mut name_entries = fs::read_dir(vendor_entry.path()).await?;
		while let Some(name_entry) = name_entries.next_entry().await? {
			if !name_entry.file_type().await?.is_dir() {
				continue;
			}
			let name = name_entry.file_name().to_string_lossy().into_owned();

			let mut version_entries = fs::read_dir(name_entry.path()).await?;
			while let Some(version_entry) = version_entries.next_entry().await? {
				if !version_entry.file_type().await?.is_dir() {
					continue;
				}
				let Ok(version) = version_entry.file_name().to_string_lossy().parse() else {
					continue;
				};
				let manifest_path = version_entry.path().join(format!("{vendor}.{name}.pdsc"));
				if fs::metadata(&manifest_path).await.is_err() {
					continue;
				}
				if let Ok(pack_id) = PackId::new(vendor.clone(), name.clone(), version) {
					packs.push(pack_id);
				}
			}
		}
	}

	Ok(packs)
}

/// Removes the cascading `<V>/<N>/<X.Y.Z>` directory tree for one pack,
/// along with its now-possibly-empty `<V>/<N>` and `<V>` parents.
#[instrument(skip(installation), level = "debug")]
pub async fn remove_install_dir(
	installation: &Installation,
	pack_id: &crate::identifier::PackId,
) -> std::io::Result<()> {
	let dir = pack_id.install_dir(installation.root());
	match fs::remove_dir_all(&dir).await {
		Ok(()) => {}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => return Err(e),
	}

	if let Some(name_dir) = dir.parent() {
		crate::util::remove_empty_dir(name_dir).await?;
		if let Some(vendor_dir) = name_dir.parent() {
			crate::util::remove_empty_dir(vendor_dir).await?;
		}
	}

	Ok(())
}

pub mod errors {
	use std::path::PathBuf;
	use thiserror::Error;

	/// Errors initializing a pack root.
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum InitError {
		#[error("io error initializing pack root")]
		Io(#[from] std::io::Error),

		#[error("failed writing initial public index")]
		PublicIndex(#[from] crate::index::errors::WriteError),

		#[error("failed writing initial local index")]
		LocalIndex(#[from] crate::index::errors::LocalWriteError),
	}

	/// Errors acquiring the pack-root lock.
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum LockError {
		#[error("could not open sentinel file {path} (is this a pack root? run `cpackget init`)")]
		Open { path: PathBuf, #[source] source: std::io::Error },

		#[error("could not acquire lock on {path}")]
		Lock { path: PathBuf, #[source] source: std::io::Error },
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Config;

	#[tokio::test]
	async fn init_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let installation = Installation::new(dir.path(), Config::default());
		init(&installation).await.unwrap();
		init(&installation).await.unwrap();
		assert!(is_initialized(dir.path()).await);
	}

	#[tokio::test]
	async fn discover_walks_up() {
		let dir = tempfile::tempdir().unwrap();
		let installation = Installation::new(dir.path(), Config::default());
		init(&installation).await.unwrap();

		let nested = dir.path().join("a/b/c");
		fs::create_dir_all(&nested).await.unwrap();

		assert_eq!(discover(&nested).unwrap(), dir.path());
	}

	#[tokio::test]
	async fn lock_is_exclusive_within_process() {
		let dir = tempfile::tempdir().unwrap();
		let installation = Installation::new(dir.path(), Config::default());
		init(&installation).await.unwrap();

		let _guard = PackRootLock::acquire(dir.path()).await.unwrap();
		// a second attempt from another handle on the same lock type is
		// exercised in the integration tests, where it can be done across
		// real OS processes.
	}

	#[tokio::test]
	async fn installed_packs_finds_only_directories_with_a_matching_manifest() {
		let dir = tempfile::tempdir().unwrap();
		let installation = Installation::new(dir.path(), Config::default());
		init(&installation).await.unwrap();

		let complete = dir.path().join("ARM/CMSIS/5.9.0");
		fs::create_dir_all(&complete).await.unwrap();
		fs::write(complete.join("ARM.CMSIS.pdsc"), b"<package/>").await.unwrap();

		// a version directory with no manifest doesn't count as installed.
		let incomplete = dir.path().join("ARM/CMSIS/6.0.0");
		fs::create_dir_all(&incomplete).await.unwrap();

		let packs = installed_packs(dir.path()).await.unwrap();
		assert_eq!(packs.len(), 1);
		assert_eq!(packs[0].vendor(), "ARM");
		assert_eq!(packs[0].name(), "CMSIS");
		assert_eq!(packs[0].version().to_string(), "5.9.0");
	}

	#[tokio::test]
	async fn installed_packs_on_an_uninitialized_root_is_empty() {
		let dir = tempfile::tempdir().unwrap();
		assert!(installed_packs(dir.path()).await.unwrap().is_empty());
	}
}
