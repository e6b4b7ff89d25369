//! The Local Repository index (`.Local/local_repository.pidx`): tracks packs
//! installed from a local `.pack`/`.zip`/`.pdsc` path rather than fetched
//! from the Public Index.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::instrument;

/// The root `<index>` document for locally-added packs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename = "index")]
pub struct LocalIndex {
	#[serde(rename = "pdsc", default)]
	pub entries: Vec<LocalEntry>,
}

/// One locally-installed pack: vendor/name/version plus the original path it
/// was installed from, kept for `list`'s display and for re-resolving the
/// source on an `update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalEntry {
	#[serde(rename = "@vendor")]
	pub vendor: String,
	#[serde(rename = "@name")]
	pub name: String,
	#[serde(rename = "@version")]
	pub version: String,
	#[serde(rename = "@url")]
	pub source_path: String,
}

impl LocalIndex {
	#[must_use]
	pub fn find(&self, vendor: &str, name: &str) -> Option<&LocalEntry> {
		self.entries.iter().find(|e| e.vendor == vendor && e.name == name)
	}

	/// Removes every entry matching `vendor`/`name` (and `version`, if
	/// given), returning how many were removed.
	pub fn remove(&mut self, vendor: &str, name: &str, version: Option<&str>) -> usize {
		let before = self.entries.len();
		self.entries
			.retain(|e| !(e.vendor == vendor && e.name == name && version.is_none_or(|v| v == e.version)));
		before - self.entries.len()
	}

	pub fn upsert(&mut self, entry: LocalEntry) {
		if let Some(existing) = self
			.entries
			.iter_mut()
			.find(|e| e.vendor == entry.vendor && e.name == entry.name && e.version == entry.version)
		{
			*existing = entry;
		} else {
			self.entries.push(entry);
		}
	}
}

#[instrument(level = "debug")]
pub async fn read(path: &Path) -> Result<LocalIndex, super::errors::ReadError> {
	super::read_xml(path).await
}

#[instrument(skip(index), level = "debug")]
pub async fn write(path: &Path, index: &LocalIndex) -> Result<(), super::errors::LocalWriteError> {
	super::write_xml(path, index).await.map_err(Into::into)
}

pub(crate) async fn write_empty(path: &Path) -> Result<(), super::errors::LocalWriteError> {
	write(path, &LocalIndex::default()).await
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry() -> LocalEntry {
		LocalEntry {
			vendor: "ARM".to_string(),
			name: "CMSIS".to_string(),
			version: "5.9.0".to_string(),
			source_path: "./ARM.CMSIS.5.9.0.pack".to_string(),
		}
	}

	#[test]
	fn remove_matches_version() {
		let mut index = LocalIndex { entries: vec![entry()] };
		assert_eq!(index.remove("ARM", "CMSIS", Some("1.0.0")), 0);
		assert_eq!(index.remove("ARM", "CMSIS", Some("5.9.0")), 1);
		assert!(index.entries.is_empty());
	}

	#[test]
	fn remove_bare_basename_removes_all_matching_versions() {
		let mut index = LocalIndex {
			entries: vec![
				entry(),
				LocalEntry { version: "6.0.0".to_string(), ..entry() },
			],
		};
		assert_eq!(index.remove("ARM", "CMSIS", None), 2);
	}
}
