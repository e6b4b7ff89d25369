//! Per-entry `.checksum` sidecar files (§4.6.1): `<pack>.<algo>.checksum`
//! containing one `<hexdigest> <entry-name>\n` line per archive entry, in
//! archive order.
//!
//! The `ChecksumAlgorithm` dispatch enum follows the shape of
//! `other_examples/.../debian-packaging-src-repository-release.rs.rs`'s
//! `ChecksumType`, forward-compatible with a second algorithm per §B.4
//! even though only `sha256` is wired up.

use crate::archive::Archive;
use std::path::Path;
use tracing::instrument;

/// A supported digest algorithm. Only [`ChecksumAlgorithm::Sha256`] is
/// implemented; the enum exists so a future algorithm doesn't require
/// reshaping the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChecksumAlgorithm {
	Sha256,
}

impl ChecksumAlgorithm {
	#[must_use]
	pub fn field_name(self) -> &'static str {
		match self {
			ChecksumAlgorithm::Sha256 => "sha256",
		}
	}
}

impl std::str::FromStr for ChecksumAlgorithm {
	type Err = errors::ChecksumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"sha256" => Ok(ChecksumAlgorithm::Sha256),
			other => Err(errors::ChecksumError::UnknownAlgorithm(other.to_string())),
		}
	}
}

/// The file name a checksum sidecar for `pack_file_name` uses:
/// `<pack-file-name>.<algo>.checksum`.
#[must_use]
pub fn checksum_file_name(pack_file_name: &str, algorithm: ChecksumAlgorithm) -> String {
	format!("{pack_file_name}.{}.checksum", algorithm.field_name())
}

/// Recovers the algorithm from a `.checksum` sidecar's own file name — the
/// `<algo>` component of `<pack-file-name>.<algo>.checksum` (§4.6.1).
pub fn algorithm_from_file_name(checksum_file_name: &str) -> Result<ChecksumAlgorithm, errors::ChecksumError> {
	let without_suffix = checksum_file_name
		.strip_suffix(".checksum")
		.ok_or(errors::ChecksumError::MalformedFileName)?;
	let algo = without_suffix
		.rsplit_once('.')
		.map(|(_, algo)| algo)
		.ok_or(errors::ChecksumError::MalformedFileName)?;
	algo.parse()
}

/// Computes `archive_path`'s checksum file contents: one
/// `<hexdigest> <entry-name>\n` line per entry, in archive order.
#[instrument(level = "debug")]
pub fn create(archive_path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, errors::ChecksumError> {
	let ChecksumAlgorithm::Sha256 = algorithm;
	let mut archive = Archive::open(archive_path).map_err(errors::ChecksumError::Archive)?;
	let digests = archive.entry_digests_ordered().map_err(errors::ChecksumError::Archive)?;

	let mut out = String::new();
	for (name, digest) in digests {
		out.push_str(&digest);
		out.push(' ');
		out.push_str(&name);
		out.push('\n');
	}
	Ok(out)
}

/// Verifies `archive_path` against a previously-created checksum file's
/// contents: every entry must appear with a matching digest, in the same
/// archive order, with no entries missing or added.
#[instrument(skip(checksum_file_contents), level = "debug")]
pub fn verify(archive_path: &Path, checksum_file_contents: &str, algorithm: ChecksumAlgorithm) -> Result<(), errors::ChecksumError> {
	let ChecksumAlgorithm::Sha256 = algorithm;

	let expected: Vec<(&str, &str)> = checksum_file_contents
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(|line| {
			let mut parts = line.splitn(2, ' ');
			let digest = parts.next().ok_or(errors::ChecksumError::MalformedFile)?;
			let name = parts.next().ok_or(errors::ChecksumError::MalformedFile)?;
			Ok((digest, name))
		})
		.collect::<Result<_, errors::ChecksumError>>()?;

	let mut archive = Archive::open(archive_path).map_err(errors::ChecksumError::Archive)?;
	let actual = archive.entry_digests_ordered().map_err(errors::ChecksumError::Archive)?;

	if actual.len() < expected.len() {
		let missing = expected[actual.len()].1.to_string();
		return Err(errors::ChecksumError::MissingEntry(missing));
	}
	if actual.len() > expected.len() {
		let unexpected = actual[expected.len()].0.clone();
		return Err(errors::ChecksumError::UnexpectedEntry(unexpected));
	}

	for ((actual_name, actual_digest), (expected_digest, expected_name)) in actual.iter().zip(expected.iter()) {
		if actual_name != expected_name {
			return Err(errors::ChecksumError::UnexpectedEntry(actual_name.clone()));
		}
		if !actual_digest.eq_ignore_ascii_case(expected_digest) {
			return Err(errors::ChecksumError::Mismatch {
				entry: actual_name.clone(),
				expected: (*expected_digest).to_string(),
				actual: actual_digest.clone(),
			});
		}
	}

	Ok(())
}

pub mod errors {
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum ChecksumError {
		#[error("could not read archive")]
		Archive(#[source] crate::archive::errors::ArchiveError),

		#[error("checksum file line is empty or malformed")]
		MalformedFile,

		#[error("unknown checksum algorithm `{0}`")]
		UnknownAlgorithm(String),

		#[error("checksum file name does not end in `.<algorithm>.checksum`")]
		MalformedFileName,

		#[error("checksum file is missing an entry for `{0}`")]
		MissingEntry(String),

		#[error("archive has an entry `{0}` not listed in the checksum file")]
		UnexpectedEntry(String),

		#[error("checksum mismatch for `{entry}`: expected {expected}, computed {actual}")]
		Mismatch { entry: String, expected: String, actual: String },
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn build_pack(dir: &Path) -> std::path::PathBuf {
		let path = dir.join("ARM.CMSIS.5.9.0.pack");
		let file = std::fs::File::create(&path).unwrap();
		let mut writer = zip::ZipWriter::new(file);
		let options = zip::write::SimpleFileOptions::default();
		writer.start_file("ARM.CMSIS.pdsc", options).unwrap();
		std::io::Write::write_all(&mut writer, b"<package/>").unwrap();
		writer.start_file("CMSIS/Core.h", options).unwrap();
		std::io::Write::write_all(&mut writer, b"// header").unwrap();
		writer.finish().unwrap();
		path
	}

	#[test]
	fn algorithm_from_file_name_recovers_sha256() {
		let name = checksum_file_name("ARM.CMSIS.5.9.0.pack", ChecksumAlgorithm::Sha256);
		assert_eq!(algorithm_from_file_name(&name).unwrap(), ChecksumAlgorithm::Sha256);
	}

	#[test]
	fn algorithm_from_file_name_rejects_unsuffixed_name() {
		assert!(matches!(
			algorithm_from_file_name("ARM.CMSIS.5.9.0.pack"),
			Err(errors::ChecksumError::MalformedFileName)
		));
	}

	#[test]
	fn create_then_verify_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let path = build_pack(dir.path());

		let contents = create(&path, ChecksumAlgorithm::Sha256).unwrap();
		assert_eq!(contents.lines().count(), 2);
		verify(&path, &contents, ChecksumAlgorithm::Sha256).unwrap();
	}

	#[test]
	fn verify_detects_tampered_entry() {
		let dir = tempfile::tempdir().unwrap();
		let path = build_pack(dir.path());
		let contents = create(&path, ChecksumAlgorithm::Sha256).unwrap();

		let tampered = contents.replace(&crate::util::hash(b"<package/>"), &"0".repeat(64));
		assert!(matches!(
			verify(&path, &tampered, ChecksumAlgorithm::Sha256),
			Err(errors::ChecksumError::Mismatch { .. })
		));
	}

	#[test]
	fn verify_detects_missing_entry() {
		let dir = tempfile::tempdir().unwrap();
		let path = build_pack(dir.path());
		let contents = create(&path, ChecksumAlgorithm::Sha256).unwrap();
		let truncated: String = contents.lines().take(1).map(|l| format!("{l}\n")).collect();

		assert!(matches!(
			verify(&path, &truncated, ChecksumAlgorithm::Sha256),
			Err(errors::ChecksumError::UnexpectedEntry(_))
		));
	}
}
