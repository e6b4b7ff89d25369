//! Archive Engine (§4.5): hardened ZIP reading for `.pack` archives,
//! streamed per-entry digesting, and a byte-identical `write_copy` used when
//! embedding a signature into the archive's comment field.
//!
//! Grounded on `typst-typst/crates/typst-cli/src/update.rs`, the one example
//! repo that actually depends on and drives the `zip` crate.

use sha2::{Digest as _, Sha256};
use std::{
	collections::BTreeMap,
	io::{Read as _, Seek as _},
	path::{Component, Path, PathBuf},
};
use tracing::instrument;

/// Archives larger than this are rejected outright before any entry is read,
/// to bound memory/disk use from a hostile or corrupt download.
pub const MAX_ARCHIVE_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// Any single entry larger than this is rejected (a "zip bomb" guard).
pub const MAX_ENTRY_BYTES: u64 = 20 * 1024 * 1024 * 1024;

/// A validated, opened `.pack` archive.
pub struct Archive<R> {
	inner: zip::ZipArchive<R>,
}

impl Archive<std::fs::File> {
	/// Opens `path`, rejecting it up front if it exceeds [`MAX_ARCHIVE_BYTES`].
	#[instrument(level = "debug")]
	pub fn open(path: &Path) -> Result<Self, errors::ArchiveError> {
		let file = std::fs::File::open(path).map_err(|source| errors::ArchiveError::Io { path: path.to_path_buf(), source })?;
		let len = file
			.metadata()
			.map_err(|source| errors::ArchiveError::Io { path: path.to_path_buf(), source })?
			.len();
		if len > MAX_ARCHIVE_BYTES {
			return Err(errors::ArchiveError::TooLarge { path: path.to_path_buf(), bytes: len });
		}

		Self::from_reader(file)
	}
}

impl<R: std::io::Read + std::io::Seek> Archive<R> {
	pub fn from_reader(reader: R) -> Result<Self, errors::ArchiveError> {
		let mut inner = zip::ZipArchive::new(reader).map_err(errors::ArchiveError::Zip)?;
		validate_entries(&mut inner)?;
		Ok(Self { inner })
	}

	/// The validated, normalized name of every entry in the archive, in
	/// archive order.
	#[must_use]
	pub fn entry_names(&mut self) -> Vec<String> {
		(0..self.inner.len())
			.filter_map(|i| self.inner.by_index(i).ok().map(|e| e.name().to_string()))
			.collect()
	}

	/// SHA-256 of every entry, keyed by normalized name (Testable Property 2:
	/// `digest(extract(A)) == digest(A)` entry-wise).
	#[instrument(skip(self), level = "debug")]
	pub fn entry_digests(&mut self) -> Result<BTreeMap<String, String>, errors::ArchiveError> {
		let mut digests = BTreeMap::new();
		for i in 0..self.inner.len() {
			let mut entry = self.inner.by_index(i).map_err(errors::ArchiveError::Zip)?;
			if entry.is_dir() {
				continue;
			}
			let name = entry.name().to_string();
			let mut hasher = Sha256::new();
			std::io::copy(&mut entry, &mut hasher).map_err(|source| errors::ArchiveError::Io {
				path: PathBuf::from(&name),
				source,
			})?;
			digests.insert(name, format!("{:x}", hasher.finalize()));
		}
		Ok(digests)
	}

	/// SHA-256 of every entry in archive order (as opposed to
	/// [`Self::entry_digests`]'s name-sorted map), the order checksum
	/// sidecar files are written in.
	#[instrument(skip(self), level = "debug")]
	pub fn entry_digests_ordered(&mut self) -> Result<Vec<(String, String)>, errors::ArchiveError> {
		let mut digests = Vec::new();
		for i in 0..self.inner.len() {
			let mut entry = self.inner.by_index(i).map_err(errors::ArchiveError::Zip)?;
			if entry.is_dir() {
				continue;
			}
			let name = entry.name().to_string();
			let mut hasher = Sha256::new();
			std::io::copy(&mut entry, &mut hasher).map_err(|source| errors::ArchiveError::Io {
				path: PathBuf::from(&name),
				source,
			})?;
			digests.push((name, format!("{:x}", hasher.finalize())));
		}
		Ok(digests)
	}

	/// Extracts every entry under `dest`, preserving directory structure.
	/// Every entry name is re-validated at extraction time, not just at
	/// open time, so this is safe to call even if the archive was
	/// constructed by a caller that skipped [`Self::from_reader`]'s checks.
	#[instrument(skip(self), level = "debug")]
	pub fn extract(&mut self, dest: &Path) -> Result<(), errors::ArchiveError> {
		for i in 0..self.inner.len() {
			let mut entry = self.inner.by_index(i).map_err(errors::ArchiveError::Zip)?;
			validate_entry_name(entry.name())?;
			let out_path = dest.join(sanitized_relative_path(entry.name()));

			if entry.is_dir() {
				std::fs::create_dir_all(&out_path)
					.map_err(|source| errors::ArchiveError::Io { path: out_path.clone(), source })?;
				continue;
			}

			if let Some(parent) = out_path.parent() {
				std::fs::create_dir_all(parent).map_err(|source| errors::ArchiveError::Io { path: parent.to_path_buf(), source })?;
			}

			let mut out_file =
				std::fs::File::create(&out_path).map_err(|source| errors::ArchiveError::Io { path: out_path.clone(), source })?;
			std::io::copy(&mut entry, &mut out_file).map_err(|source| errors::ArchiveError::Io { path: out_path.clone(), source })?;
		}
		Ok(())
	}

	/// A single SHA-256 accumulated across every entry's bytes in archive
	/// order — the `H` of the signing pipeline (§4.6.2), distinct from
	/// [`Self::entry_digests_ordered`]'s per-entry digests.
	#[instrument(skip(self), level = "debug")]
	pub fn rollup_digest(&mut self) -> Result<[u8; 32], errors::ArchiveError> {
		let mut hasher = Sha256::new();
		for i in 0..self.inner.len() {
			let mut entry = self.inner.by_index(i).map_err(errors::ArchiveError::Zip)?;
			if entry.is_dir() {
				continue;
			}
			let name = entry.name().to_string();
			std::io::copy(&mut entry, &mut hasher).map_err(|source| errors::ArchiveError::Io { path: PathBuf::from(&name), source })?;
		}
		Ok(hasher.finalize().into())
	}

	/// Extracts a single named entry to `dest` (a file path, not a
	/// directory), used to pull a pack's embedded license out without
	/// installing the rest of the archive.
	#[instrument(skip(self), level = "debug")]
	pub fn extract_entry(&mut self, name: &str, dest: &Path) -> Result<(), errors::ArchiveError> {
		validate_entry_name(name)?;
		let mut entry = self
			.inner
			.by_name(name)
			.map_err(|_| errors::ArchiveError::BadEntryName(name.to_string()))?;

		if let Some(parent) = dest.parent() {
			std::fs::create_dir_all(parent).map_err(|source| errors::ArchiveError::Io { path: parent.to_path_buf(), source })?;
		}
		let mut out_file = std::fs::File::create(dest).map_err(|source| errors::ArchiveError::Io { path: dest.to_path_buf(), source })?;
		std::io::copy(&mut entry, &mut out_file).map_err(|source| errors::ArchiveError::Io { path: dest.to_path_buf(), source })?;
		Ok(())
	}

	/// The archive comment field, used to carry an embedded signature tag
	/// (§4.6.2).
	#[must_use]
	pub fn comment(&self) -> Vec<u8> {
		self.inner.comment().to_vec()
	}
}

/// Checks every entry's declared name and size, and rejects the archive if
/// the sum of entries' declared *uncompressed* sizes exceeds
/// [`MAX_ARCHIVE_BYTES`] — a high compression ratio would otherwise let a
/// zip bomb sail past [`Archive::open`]'s on-disk size check.
fn validate_entries<R: std::io::Read + std::io::Seek>(archive: &mut zip::ZipArchive<R>) -> Result<(), errors::ArchiveError> {
	let mut inflated_total: u64 = 0;
	for i in 0..archive.len() {
		let entry = archive.by_index(i).map_err(errors::ArchiveError::Zip)?;
		validate_entry_name(entry.name())?;
		if entry.size() > MAX_ENTRY_BYTES {
			return Err(errors::ArchiveError::EntryTooLarge {
				name: entry.name().to_string(),
				bytes: entry.size(),
			});
		}

		inflated_total = inflated_total.saturating_add(entry.size());
		if inflated_total > MAX_ARCHIVE_BYTES {
			return Err(errors::ArchiveError::InflatedTooLarge { bytes: inflated_total });
		}
	}
	Ok(())
}

/// Rejects entry names that escape the extraction root: absolute paths,
/// `..` components, and (on non-Windows builds reading a Windows-built
/// archive) drive-letter-style prefixes (§4.5, §8 invariant 5).
fn validate_entry_name(name: &str) -> Result<(), errors::ArchiveError> {
	if name.is_empty() {
		return Err(errors::ArchiveError::BadEntryName(name.to_string()));
	}

	let path = Path::new(name);
	if path.is_absolute() {
		return Err(errors::ArchiveError::BadEntryName(name.to_string()));
	}

	for component in path.components() {
		match component {
			Component::Normal(_) | Component::CurDir => {}
			Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
				return Err(errors::ArchiveError::BadEntryName(name.to_string()));
			}
		}
	}

	Ok(())
}

fn sanitized_relative_path(name: &str) -> PathBuf {
	Path::new(name)
		.components()
		.filter(|c| matches!(c, Component::Normal(_)))
		.collect()
}

/// Copies `src` into a freshly-written ZIP at `dest`, byte-identical in
/// entry order, compressed bytes, and timestamps, optionally rewriting the
/// archive comment (used to embed a signature tag without touching any
/// entry's bytes, §4.6.2).
#[instrument(level = "debug")]
pub fn write_copy(src: &Path, dest: &Path, comment: Option<&[u8]>) -> Result<(), errors::ArchiveError> {
	let src_file = std::fs::File::open(src).map_err(|source| errors::ArchiveError::Io { path: src.to_path_buf(), source })?;
	let mut archive = zip::ZipArchive::new(src_file).map_err(errors::ArchiveError::Zip)?;

	let dir = dest.parent().unwrap_or_else(|| Path::new("."));
	std::fs::create_dir_all(dir).map_err(|source| errors::ArchiveError::Io { path: dir.to_path_buf(), source })?;
	let mut tmp = tempfile::Builder::new()
		.prefix(".cpackget-archive-")
		.tempfile_in(dir)
		.map_err(|source| errors::ArchiveError::Io { path: dir.to_path_buf(), source })?;

	{
		let mut writer = zip::ZipWriter::new(&mut tmp);
		for i in 0..archive.len() {
			let entry = archive.by_index(i).map_err(errors::ArchiveError::Zip)?;
			writer.raw_copy_file(entry).map_err(errors::ArchiveError::Zip)?;
		}

		let comment = comment.map(<[u8]>::to_vec).unwrap_or_else(|| archive.comment().to_vec());
		writer.set_raw_comment(comment);
		writer.finish().map_err(errors::ArchiveError::Zip)?;
	}

	tmp.seek(std::io::SeekFrom::Start(0))
		.map_err(|source| errors::ArchiveError::Io { path: dest.to_path_buf(), source })?;
	tmp.persist(dest)
		.map_err(|e| errors::ArchiveError::Io { path: dest.to_path_buf(), source: e.error })?;

	Ok(())
}

pub mod errors {
	use std::path::PathBuf;
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum ArchiveError {
		#[error("io error reading archive at {path}")]
		Io { path: PathBuf, #[source] source: std::io::Error },

		#[error("archive at {path} is {bytes} bytes, exceeding the maximum")]
		TooLarge { path: PathBuf, bytes: u64 },

		#[error("archive entry {name} is {bytes} bytes, exceeding the maximum")]
		EntryTooLarge { name: String, bytes: u64 },

		#[error("archive's inflated size reaches {bytes} bytes, exceeding the maximum")]
		InflatedTooLarge { bytes: u64 },

		#[error("archive entry name `{0}` escapes the extraction root")]
		BadEntryName(String),

		#[error("malformed zip archive")]
		Zip(#[from] zip::result::ZipError),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn build_fixture() -> Vec<u8> {
		let mut buf = Cursor::new(Vec::new());
		{
			let mut writer = zip::ZipWriter::new(&mut buf);
			let options = zip::write::SimpleFileOptions::default();
			writer.start_file("ARM.CMSIS.pdsc", options).unwrap();
			std::io::Write::write_all(&mut writer, b"<package/>").unwrap();
			writer.start_file("CMSIS/Core.h", options).unwrap();
			std::io::Write::write_all(&mut writer, b"// header").unwrap();
			writer.finish().unwrap();
		}
		buf.into_inner()
	}

	#[test]
	fn rejects_path_traversal_entries() {
		let mut buf = Cursor::new(Vec::new());
		{
			let mut writer = zip::ZipWriter::new(&mut buf);
			let options = zip::write::SimpleFileOptions::default();
			writer.start_file("../evil.txt", options).unwrap();
			std::io::Write::write_all(&mut writer, b"evil").unwrap();
			writer.finish().unwrap();
		}

		let result = Archive::from_reader(Cursor::new(buf.into_inner()));
		assert!(matches!(result, Err(errors::ArchiveError::BadEntryName(_))));
	}

	#[test]
	fn rejects_inflated_size_over_the_cap_even_when_compressed_small() {
		let mut buf = Cursor::new(Vec::new());
		{
			let mut writer = zip::ZipWriter::new(&mut buf);
			// A highly compressible entry whose *declared* uncompressed size
			// alone exceeds the cap, while the written bytes stay tiny.
			let options = zip::write::SimpleFileOptions::default()
				.compression_method(zip::CompressionMethod::Deflated)
				.large_file(true);
			writer.start_file("bomb.bin", options).unwrap();
			let chunk = vec![0u8; 1024 * 1024];
			for _ in 0..(MAX_ARCHIVE_BYTES / chunk.len() as u64 + 1) {
				std::io::Write::write_all(&mut writer, &chunk).unwrap();
			}
			writer.finish().unwrap();
		}

		let result = Archive::from_reader(Cursor::new(buf.into_inner()));
		assert!(matches!(result, Err(errors::ArchiveError::InflatedTooLarge { .. })));
	}

	#[test]
	fn entry_digests_are_stable() {
		let bytes = build_fixture();
		let mut archive = Archive::from_reader(Cursor::new(bytes)).unwrap();
		let digests = archive.entry_digests().unwrap();
		assert_eq!(digests.len(), 2);
		assert_eq!(digests["ARM.CMSIS.pdsc"], crate::util::hash(b"<package/>"));
	}

	#[test]
	fn extract_entry_pulls_a_single_file() {
		let bytes = build_fixture();
		let mut archive = Archive::from_reader(Cursor::new(bytes)).unwrap();
		let dir = tempfile::tempdir().unwrap();
		let dest = dir.path().join("license.txt");
		archive.extract_entry("ARM.CMSIS.pdsc", &dest).unwrap();
		assert_eq!(std::fs::read(&dest).unwrap(), b"<package/>");
	}

	#[test]
	fn extract_then_digest_matches_archive_digest() {
		let bytes = build_fixture();
		let mut archive = Archive::from_reader(Cursor::new(bytes)).unwrap();
		let digests_before = archive.entry_digests().unwrap();

		let dir = tempfile::tempdir().unwrap();
		archive.extract(dir.path()).unwrap();

		let on_disk = std::fs::read(dir.path().join("ARM.CMSIS.pdsc")).unwrap();
		assert_eq!(crate::util::hash(&on_disk), digests_before["ARM.CMSIS.pdsc"]);
	}
}
