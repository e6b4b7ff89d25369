//! Index Store (§4.3): the three XML documents cpackget reads and writes —
//! the Public Index (`.Web/index.pidx`), the Local Repository index
//! (`.Local/local_repository.pidx`), and per-pack `.pdsc` manifests.
//!
//! All three share the same read/atomic-write shape: a read/deserialize/write
//! triad generalized from TOML to XML via `quick-xml`.

use fs_err::tokio as fs;
use std::path::Path;
use tracing::instrument;

/// The local repository document (`.Local/local_repository.pidx`).
pub mod local;
/// A pack's own `.pdsc` manifest (opaque passthrough, §4.3).
pub mod manifest;
/// The public index document (`.Web/index.pidx`).
pub mod public;

/// Reads and deserializes an XML document at `path`.
#[instrument(level = "debug")]
pub(crate) async fn read_xml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, errors::ReadError> {
	let raw = fs::read_to_string(path)
		.await
		.map_err(|source| errors::ReadError::Io { path: path.to_path_buf(), source })?;
	quick_xml::de::from_str(&raw).map_err(|source| errors::ReadError::Xml {
		path: path.to_path_buf(),
		source,
	})
}

/// Serializes `value` and writes it to `path` atomically (temp file in the
/// same directory, then rename).
#[instrument(skip(value), level = "debug")]
pub(crate) async fn write_xml<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), errors::WriteError> {
	let body = quick_xml::se::to_string(value).map_err(errors::WriteError::Xml)?;
	let document = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n");
	crate::util::write_atomic(path, document)
		.await
		.map_err(|source| errors::WriteError::Io { path: path.to_path_buf(), source })
}

pub mod errors {
	use std::path::PathBuf;
	use thiserror::Error;

	/// Errors reading any of the three index documents.
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum ReadError {
		#[error("io error reading index document {path}")]
		Io { path: PathBuf, #[source] source: std::io::Error },

		#[error("malformed index document {path}")]
		Xml { path: PathBuf, #[source] source: quick_xml::DeError },
	}

	/// Errors writing the public index.
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum WriteError {
		#[error("io error writing index document {path}")]
		Io { path: PathBuf, #[source] source: std::io::Error },

		#[error("failed serializing index document")]
		Xml(#[source] quick_xml::se::SeError),
	}

	/// Errors writing the local repository index. A distinct type from
	/// [`WriteError`] so [`crate::layout::errors::InitError`] can name both
	/// without ambiguity.
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum LocalWriteError {
		#[error(transparent)]
		Write(#[from] WriteError),
	}
}
