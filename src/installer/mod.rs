//! The Installer (§4.7): coordinates identifier resolution, fetching,
//! archive validation, staging, and index registration into the
//! `add`/`rm`/`update`/`update-index`/`list` operations the CLI exposes.
//!
//! Owns the pack-root lock for the lifetime of one mutating call, using a
//! worker-pool shape for the fetch stage and visited-set recursion for
//! dependency resolution.

use crate::{
	archive::Archive,
	crypto::checksum::{self, ChecksumAlgorithm},
	fetch::{FetchJob, Fetcher},
	identifier::{PackId, PackRef},
	index::{local, manifest, public},
	installer::state::{State, Transition},
	layout::{self, PackRootLock},
	reporters::{EulaPrompter, InstallReporter},
	Installation,
};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The state machine driving one operation's lifecycle (§4.7).
pub mod state;
/// Dependency DAG resolution over installed manifests.
pub mod dependency;

/// Coordinates mutating and read-only operations against one [`Installation`].
pub struct Installer<'a> {
	installation: &'a Installation,
	fetcher: Fetcher,
}

impl<'a> Installer<'a> {
	pub fn new(installation: &'a Installation) -> Result<Self, errors::BuildError> {
		let fetcher = Fetcher::new(installation.config())?;
		Ok(Self { installation, fetcher })
	}

	/// Resolves, fetches, validates, and registers one pack. `dry_run` runs
	/// every step through `Validated` and reports what would happen without
	/// ever writing to the pack root (§B.5). Unless `no_dependencies` is set,
	/// every pack named in the manifest's `<requirements><packages>` that
	/// isn't already installed is fetched and installed first (§4.7,
	/// "Dependency handling").
	#[instrument(skip(self, reporter, eula), level = "debug")]
	pub async fn add(
		&self,
		pack_ref: &PackRef,
		reporter: &dyn InstallReporter,
		eula: &dyn EulaPrompter,
		dry_run: bool,
		force: bool,
		no_dependencies: bool,
	) -> Result<PackId, errors::AddError> {
		let mut transition = Transition::default();
		transition.advance(State::Parsed)?;

		reporter.stage_started("resolve");
		let (pack_id, archive_source) = self.resolve(pack_ref).await?;
		transition.advance(State::Resolved)?;
		reporter.stage_finished("resolve");

		let _lock = if dry_run { None } else { Some(PackRootLock::acquire(self.installation.root()).await?) };

		reporter.stage_started("fetch");
		let archive_path = self.fetch(&pack_id, &archive_source, reporter).await?;
		transition.advance(State::Fetched)?;
		reporter.stage_finished("fetch");

		reporter.stage_started("validate");
		let manifest = self.validate(&pack_id, &archive_path)?;
		transition.advance(State::Validated)?;
		reporter.stage_finished("validate");

		if !no_dependencies && !dry_run {
			Box::pin(self.install_missing_dependencies(&manifest, reporter, eula, force)).await?;
		}

		if let Some(release) = manifest.releases.releases.iter().find(|r| r.version == pack_id.version().to_string()) {
			if let Some(license) = &release.license {
				if !eula.confirm(license)? {
					transition.advance(State::EulaRejected)?;
					return Err(errors::AddError::EulaRejected);
				}
			}
		}

		if dry_run {
			return Ok(pack_id);
		}

		reporter.stage_started("stage");
		let staged_dir = self.stage(&pack_id, &archive_path)?;
		transition.advance(State::Staged)?;
		reporter.stage_finished("stage");

		reporter.stage_started("register");
		self.register(&pack_id, staged_dir, &archive_source, force).await?;
		transition.advance(State::Registered)?;
		reporter.stage_finished("register");

		if !self.installation.config().skip_touch {
			self.touch(&pack_id).await?;
		}
		transition.advance(State::Touched)?;
		transition.advance(State::Done)?;

		Ok(pack_id)
	}

	/// Removes one pack. A bare `vendor.name` reference (no version) removes
	/// every installed version (Open Question (b), §9). Returns
	/// [`errors::RemoveError::PackNotInstalled`] if nothing on disk matches.
	#[instrument(skip(self), level = "debug")]
	pub async fn remove(&self, vendor: &str, name: &str, version: Option<&semver::Version>, dry_run: bool) -> Result<Vec<PackId>, errors::RemoveError> {
		let _lock = if dry_run { None } else { Some(PackRootLock::acquire(self.installation.root()).await?) };

		let matching: Vec<PackId> = layout::installed_packs(self.installation.root())
			.await?
			.into_iter()
			.filter(|id| id.vendor() == vendor && id.name() == name)
			.filter(|id| version.is_none_or(|v| id.version() == v))
			.collect();

		if matching.is_empty() {
			return Err(errors::RemoveError::PackNotInstalled { vendor: vendor.to_string(), name: name.to_string() });
		}

		if !dry_run {
			for pack_id in &matching {
				layout::remove_install_dir(self.installation, pack_id).await?;
			}

			// Archive-installed packs were never recorded here; this is a
			// no-op for them and drops the entry for manifest-installed ones.
			let mut local_index = local::read(&self.installation.local_index_path()).await?;
			local_index.remove(vendor, name, version.map(ToString::to_string).as_deref());
			local::write(&self.installation.local_index_path(), &local_index).await?;
		}

		Ok(matching)
	}

	/// Refreshes the Public Index from `source_url`, merging per the policy
	/// in `src/index/public.rs::merge_from`.
	#[instrument(skip(self), level = "debug")]
	pub async fn update_index(&self, source_url: &url::Url, force: bool) -> Result<(), errors::UpdateIndexError> {
		let _lock = PackRootLock::acquire(self.installation.root()).await?;

		let tmp_dest = self.installation.download_dir().join(".index.pidx.tmp");
		let mut stream = Box::pin(self.fetcher.fetch_all(vec![FetchJob { url: source_url.clone(), dest: tmp_dest.clone() }]));

		use futures::StreamExt as _;
		stream.next().await.ok_or(errors::UpdateIndexError::NoResponse)??;

		let incoming = public::read(&tmp_dest).await?;
		let _ = fs_err::tokio::remove_file(&tmp_dest).await;

		let mut current = public::read(&self.installation.public_index_path()).await?;
		current.merge_from(incoming, force);
		public::write(&self.installation.public_index_path(), &current).await?;

		Ok(())
	}

	/// Lists installed packs, optionally filtered by `substring` on
	/// `Vendor::Name` (case-insensitive) or restricted to packs required by
	/// another installed pack (§B.2).
	#[instrument(skip(self), level = "debug")]
	pub async fn list(&self, filter: Option<&str>, required_only: bool) -> Result<Vec<PackId>, errors::ListError> {
		let pack_ids = layout::installed_packs(self.installation.root()).await?;

		let mut manifests = Vec::new();
		for pack_id in pack_ids {
			let manifest_path = pack_id.install_dir(self.installation.root()).join(pack_id.manifest_file_name());
			if let Ok(manifest) = manifest::read(&manifest_path).await {
				manifests.push((pack_id, manifest));
			}
		}

		let required = required_only.then(|| dependency::required_by_any(&manifests));

		Ok(manifests
			.into_iter()
			.filter(|(id, _)| {
				filter.is_none_or(|f| format!("{}::{}", id.vendor(), id.name()).to_lowercase().contains(&f.to_lowercase()))
			})
			.filter(|(id, _)| {
				required
					.as_ref()
					.is_none_or(|req| req.contains(&(id.vendor().to_string(), id.name().to_string())))
			})
			.map(|(id, _)| id)
			.collect())
	}

	/// Installs every `(vendor, name)` a manifest requires that isn't already
	/// present in the Local Repository index, recursing through each
	/// dependency's own manifest in turn. A dependency that isn't in the
	/// Public Index is skipped rather than failing the whole operation — an
	/// optional-looking requirement the index doesn't know about shouldn't
	/// block installing the pack that asked for it.
	async fn install_missing_dependencies(
		&self,
		manifest: &manifest::PackManifest,
		reporter: &dyn InstallReporter,
		eula: &dyn EulaPrompter,
		force: bool,
	) -> Result<(), errors::AddError> {
		let local_index = local::read(&self.installation.local_index_path()).await?;

		for (dep_vendor, dep_name) in manifest.required_packs() {
			if local_index.find(dep_vendor, dep_name).is_some() {
				continue;
			}

			let dep_ref = PackRef::IdentifierOnly {
				raw: format!("{dep_vendor}::{dep_name}"),
				vendor: dep_vendor.to_string(),
				name: dep_name.to_string(),
				version: None,
			};

			match Box::pin(self.add(&dep_ref, reporter, eula, false, force, false)).await {
				Ok(_) | Err(errors::AddError::NotInIndex { .. }) => {}
				Err(e) => return Err(e),
			}
		}

		Ok(())
	}

	/// Reinstalls every installed pack (or just `vendor`/`name` if given) at
	/// the newest version the Public Index knows about, skipping any already
	/// at or past that version (§4.7, "Update"). `dry_run` reports what would
	/// be updated without installing anything (§B.5).
	#[instrument(skip(self, reporter, eula), level = "debug")]
	pub async fn update(
		&self,
		filter: Option<(&str, &str)>,
		reporter: &dyn InstallReporter,
		eula: &dyn EulaPrompter,
		no_dependencies: bool,
		dry_run: bool,
	) -> Result<Vec<PackId>, errors::AddError> {
		let installed = layout::installed_packs(self.installation.root()).await?;
		let public_index = public::read(&self.installation.public_index_path()).await?;

		let mut updated = Vec::new();
		for pack_id in &installed {
			if filter.is_some_and(|(v, n)| v != pack_id.vendor() || n != pack_id.name()) {
				continue;
			}

			let Some(public_entry) = public_index.find(pack_id.vendor(), pack_id.name()) else {
				continue;
			};

			let latest: semver::Version = public_entry.version.parse()?;
			if crate::identifier::pack_version_cmp(&latest, pack_id.version()) != std::cmp::Ordering::Greater {
				continue;
			}

			let pack_ref = PackRef::IdentifierOnly {
				raw: format!("{}::{}@{}", pack_id.vendor(), pack_id.name(), latest),
				vendor: pack_id.vendor().to_string(),
				name: pack_id.name().to_string(),
				version: Some(latest),
			};

			let updated_id = self.add(&pack_ref, reporter, eula, dry_run, false, no_dependencies).await?;
			updated.push(updated_id);
		}

		Ok(updated)
	}

	/// Refreshes every per-pack `.pdsc` the Public Index references, under
	/// `.Web/`, used by `update-index --all-pdsc-files` and `init
	/// --all-pdsc-files` (§4.7).
	#[instrument(skip(self, index), level = "debug")]
	pub async fn refresh_pdsc_files(&self, index: &public::PublicIndex) -> Result<(), errors::UpdateIndexError> {
		let jobs: Vec<FetchJob> = index
			.entries
			.iter()
			.filter_map(|entry| {
				let base = url::Url::parse(&entry.url).ok()?;
				let file_name = format!("{}.{}.pdsc", entry.vendor, entry.name);
				let url = base.join(&file_name).ok()?;
				Some(FetchJob { url, dest: self.installation.web_dir().join(&file_name) })
			})
			.collect();

		if jobs.is_empty() {
			return Ok(());
		}

		use futures::StreamExt as _;
		let mut stream = Box::pin(self.fetcher.fetch_all(jobs));
		while let Some(result) = stream.next().await {
			result?;
		}
		Ok(())
	}

	/// Resolves and fetches `pack_ref` read-only, then extracts its release's
	/// embedded license file (if any) to `dest_dir`, without installing
	/// anything (`-x/--extract-embedded-license`, §6).
	#[instrument(skip(self), level = "debug")]
	pub async fn extract_license(&self, pack_ref: &PackRef, dest_dir: &Path) -> Result<Option<PathBuf>, errors::AddError> {
		let (pack_id, archive_source) = self.resolve(pack_ref).await?;
		let archive_path = self.fetch(&pack_id, &archive_source, &() as &dyn InstallReporter).await?;
		let manifest = self.validate(&pack_id, &archive_path)?;

		let Some(license) = manifest
			.releases
			.releases
			.iter()
			.find(|r| r.version == pack_id.version().to_string())
			.and_then(|r| r.license.clone())
		else {
			return Ok(None);
		};

		let file_name = Path::new(&license).file_name().unwrap_or_default();
		let dest = dest_dir.join(file_name);
		let mut archive = Archive::open(&archive_path).map_err(|_| errors::AddError::CorruptArchive)?;
		archive.extract_entry(&license, &dest).map_err(|_| errors::AddError::CorruptArchive)?;
		Ok(Some(dest))
	}

	async fn resolve(&self, pack_ref: &PackRef) -> Result<(PackId, ArchiveSource), errors::AddError> {
		match pack_ref {
			PackRef::RemoteArchive { url, .. } => {
				let pack_id = pack_id_from_archive_name(url.path())?;
				Ok((pack_id, ArchiveSource::Remote(url.clone())))
			}
			PackRef::LocalArchive { path, .. } => {
				let pack_id = pack_id_from_archive_name(&path.to_string_lossy())?;
				Ok((pack_id, ArchiveSource::Local(path.clone())))
			}
			PackRef::LocalManifest { path, .. } => {
				let manifest = manifest::read(path).await?;
				let version = manifest.latest_version().ok_or(errors::AddError::NoReleases)?;
				let pack_id = PackId::new(manifest.vendor, manifest.name, version.parse()?)?;
				Ok((pack_id, ArchiveSource::ManifestOnly(path.clone())))
			}
			PackRef::IdentifierOnly { vendor, name, version, .. } => {
				let public_index = public::read(&self.installation.public_index_path()).await?;
				let entry = public_index.find(vendor, name).ok_or_else(|| errors::AddError::NotInIndex {
					vendor: vendor.clone(),
					name: name.clone(),
				})?;

				let version = match version {
					Some(v) => v.clone(),
					None => entry.version.parse()?,
				};

				let pack_id = PackId::new(vendor.clone(), name.clone(), version)?;
				let url = url::Url::parse(&entry.url)
					.and_then(|base| base.join(&pack_id.download_file_name()))
					.map_err(|_| errors::AddError::BadIndexUrl(entry.url.clone()))?;

				Ok((pack_id, ArchiveSource::Remote(url)))
			}
		}
	}

	async fn fetch(&self, pack_id: &PackId, source: &ArchiveSource, reporter: &dyn InstallReporter) -> Result<PathBuf, errors::AddError> {
		match source {
			ArchiveSource::Remote(url) => {
				let dest = layout::download_cache_path(self.installation, pack_id);
				let _progress = reporter.download_reporter(&pack_id.to_string());

				use futures::StreamExt as _;
				let mut stream = Box::pin(self.fetcher.fetch_all(vec![FetchJob { url: url.clone(), dest: dest.clone() }]));
				stream.next().await.ok_or(errors::AddError::NoResponse)??;
				Ok(dest)
			}
			ArchiveSource::Local(path) => Ok(path.clone()),
			ArchiveSource::ManifestOnly(path) => Ok(path.clone()),
		}
	}

	fn validate(&self, pack_id: &PackId, archive_path: &PathBuf) -> Result<manifest::PackManifest, errors::AddError> {
		if archive_path.extension().is_some_and(|e| e == "pdsc") {
			return Ok(std::fs::read_to_string(archive_path).ok().and_then(|s| quick_xml::de::from_str(&s).ok()).ok_or(errors::AddError::CorruptArchive)?);
		}

		let mut archive = Archive::open(archive_path).map_err(|_| errors::AddError::CorruptArchive)?;
		let manifest_name = pack_id.manifest_file_name();
		let names = archive.entry_names();
		if !names.iter().any(|n| n == &manifest_name) {
			return Err(errors::AddError::ManifestMissing(manifest_name));
		}

		let dir = tempfile::tempdir().map_err(|_| errors::AddError::CorruptArchive)?;
		archive.extract(dir.path()).map_err(|_| errors::AddError::CorruptArchive)?;
		let text = std::fs::read_to_string(dir.path().join(&manifest_name)).map_err(|_| errors::AddError::CorruptArchive)?;
		quick_xml::de::from_str(&text).map_err(|_| errors::AddError::CorruptArchive)
	}

	fn stage(&self, pack_id: &PackId, archive_path: &PathBuf) -> Result<tempfile::TempDir, errors::AddError> {
		let staging = tempfile::tempdir_in(self.installation.download_dir()).map_err(|_| errors::AddError::CorruptArchive)?;

		if archive_path.extension().is_some_and(|e| e == "pdsc") {
			std::fs::copy(archive_path, staging.path().join(pack_id.manifest_file_name())).map_err(|_| errors::AddError::CorruptArchive)?;
		} else {
			let mut archive = Archive::open(archive_path).map_err(|_| errors::AddError::CorruptArchive)?;
			archive.extract(staging.path()).map_err(|_| errors::AddError::CorruptArchive)?;
		}

		Ok(staging)
	}

	/// `force` lets a pack already installed at this exact version be
	/// reinstalled, removing the existing install directory before the
	/// staged one takes its place (`-F/--force-reinstall`); without it, a
	/// pre-existing install directory is a collision.
	async fn register(&self, pack_id: &PackId, staged: tempfile::TempDir, source: &ArchiveSource, force: bool) -> Result<(), errors::AddError> {
		let install_dir = pack_id.install_dir(self.installation.root());
		if fs_err::tokio::metadata(&install_dir).await.is_ok() {
			if !force {
				return Err(errors::AddError::Collision(install_dir));
			}
			fs_err::tokio::remove_dir_all(&install_dir)
				.await
				.map_err(|source| errors::AddError::Io { path: install_dir.clone(), source })?;
		}

		if let Some(parent) = install_dir.parent() {
			fs_err::tokio::create_dir_all(parent).await?;
		}

		let staged_path = staged.keep();
		fs_err::tokio::rename(&staged_path, &install_dir)
			.await
			.map_err(|source| errors::AddError::Io { path: install_dir.clone(), source })?;

		// The Local Repository tracks manifest-reference and local-archive
		// installs only; a pack fetched by identifier from the Public Index
		// is found again there on the next add/update, not here.
		if matches!(source, ArchiveSource::Local(_) | ArchiveSource::ManifestOnly(_)) {
			let mut local_index = local::read(&self.installation.local_index_path()).await?;
			local_index.upsert(local::LocalEntry {
				vendor: pack_id.vendor().to_string(),
				name: pack_id.name().to_string(),
				version: pack_id.version().to_string(),
				source_path: source.display(),
			});
			local::write(&self.installation.local_index_path(), &local_index).await?;
		}

		Ok(())
	}

	async fn touch(&self, pack_id: &PackId) -> Result<(), errors::AddError> {
		let install_dir = pack_id.install_dir(self.installation.root());
		filetime::set_file_mtime(&install_dir, filetime::FileTime::now()).map_err(|source| errors::AddError::Io {
			path: install_dir,
			source,
		})
	}
}

enum ArchiveSource {
	Remote(url::Url),
	Local(PathBuf),
	ManifestOnly(PathBuf),
}

impl ArchiveSource {
	fn display(&self) -> String {
		match self {
			ArchiveSource::Remote(url) => url.to_string(),
			ArchiveSource::Local(path) | ArchiveSource::ManifestOnly(path) => path.display().to_string(),
		}
	}
}

fn pack_id_from_archive_name(name: &str) -> Result<PackId, errors::AddError> {
	let file_name = std::path::Path::new(name)
		.file_stem()
		.and_then(|s| s.to_str())
		.ok_or_else(|| errors::AddError::BadArchiveName(name.to_string()))?;
	file_name.parse().map_err(|_| errors::AddError::BadArchiveName(name.to_string()))
}

/// Checksum/signature verification for an already-installed or
/// not-yet-installed pack archive (read-only, never takes the pack-root
/// lock, §5).
#[instrument(level = "debug")]
pub fn create_checksum(archive_path: &PathBuf) -> Result<String, checksum::errors::ChecksumError> {
	checksum::create(archive_path, ChecksumAlgorithm::Sha256)
}

pub mod errors {
	use std::path::PathBuf;
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum BuildError {
		#[error(transparent)]
		Fetcher(#[from] crate::fetch::errors::BuildError),
	}

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum AddError {
		#[error("illegal installer state transition")]
		Transition(#[from] super::state::errors::TransitionError),

		#[error("could not acquire pack root lock")]
		Lock(#[from] crate::layout::errors::LockError),

		#[error("`{vendor}::{name}` is not in the public index; run `cpackget update-index` first")]
		NotInIndex { vendor: String, name: String },

		#[error("index entry has an unparsable url `{0}`")]
		BadIndexUrl(String),

		#[error("could not determine a pack id from archive name `{0}`")]
		BadArchiveName(String),

		#[error("manifest has no releases")]
		NoReleases,

		#[error(transparent)]
		Version(#[from] semver::Error),

		#[error(transparent)]
		PackId(#[from] crate::identifier::errors::PackIdError),

		#[error("error reading index")]
		IndexRead(#[from] crate::index::errors::ReadError),

		#[error("fetch produced no result")]
		NoResponse,

		#[error(transparent)]
		Fetch(#[from] crate::fetch::errors::FetchError),

		#[error("archive is missing its manifest `{0}`")]
		ManifestMissing(String),

		#[error("archive is corrupt or its manifest is malformed")]
		CorruptArchive,

		#[error("user rejected the pack's EULA")]
		EulaRejected,

		#[error(transparent)]
		EulaPrompt(#[from] crate::reporters::errors::EulaPromptError),

		#[error("pack already installed at {0}")]
		Collision(PathBuf),

		#[error("io error at {path}")]
		Io { path: PathBuf, source: std::io::Error },

		#[error("failed writing local index")]
		LocalIndexWrite(#[from] crate::index::errors::LocalWriteError),
	}

	impl From<std::io::Error> for AddError {
		fn from(source: std::io::Error) -> Self {
			AddError::Io { path: PathBuf::new(), source }
		}
	}

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum RemoveError {
		#[error("could not acquire pack root lock")]
		Lock(#[from] crate::layout::errors::LockError),

		#[error("error reading local index")]
		IndexRead(#[from] crate::index::errors::ReadError),

		#[error("failed writing local index")]
		IndexWrite(#[from] crate::index::errors::LocalWriteError),

		#[error("pack not installed: `{vendor}::{name}`")]
		PackNotInstalled { vendor: String, name: String },

		#[error("io error removing install directory")]
		Io(#[from] std::io::Error),
	}

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum UpdateIndexError {
		#[error("could not acquire pack root lock")]
		Lock(#[from] crate::layout::errors::LockError),

		#[error("fetch produced no result")]
		NoResponse,

		#[error(transparent)]
		Fetch(#[from] crate::fetch::errors::FetchError),

		#[error("error reading index")]
		Read(#[from] crate::index::errors::ReadError),

		#[error("error writing index")]
		Write(#[from] crate::index::errors::WriteError),
	}

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum ListError {
		#[error("io error scanning installed packs")]
		Io(#[from] std::io::Error),
	}
}
