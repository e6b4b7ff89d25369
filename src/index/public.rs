//! The Public Index (`.Web/index.pidx`): the mirrored catalog of every
//! `.pdsc` the tool knows how to fetch, one `<pdsc>` entry per vendor/name.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::instrument;

/// The root `<index>` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename = "index")]
pub struct PublicIndex {
	/// One entry per known vendor/name pack family.
	#[serde(rename = "pdsc", default)]
	pub entries: Vec<PdscEntry>,
}

/// One `<pdsc>` element: where to fetch a pack family's manifest, and when
/// this entry was last refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PdscEntry {
	#[serde(rename = "@vendor")]
	pub vendor: String,
	#[serde(rename = "@name")]
	pub name: String,
	#[serde(rename = "@url")]
	pub url: String,
	#[serde(rename = "@version")]
	pub version: String,
	#[serde(rename = "@date")]
	pub timestamp: String,
}

impl PublicIndex {
	/// Finds the entry for `vendor`/`name`, if one is recorded.
	#[must_use]
	pub fn find(&self, vendor: &str, name: &str) -> Option<&PdscEntry> {
		self.entries.iter().find(|e| e.vendor == vendor && e.name == name)
	}

	/// Every distinct vendor URL on record (used by the `connection` command
	/// when given no argument, §B.1).
	#[must_use]
	pub fn vendor_urls(&self) -> Vec<&str> {
		let mut urls: Vec<&str> = self.entries.iter().map(|e| e.url.as_str()).collect();
		urls.sort_unstable();
		urls.dedup();
		urls
	}

	/// Merges `incoming` into `self`. For each vendor/name already present,
	/// the entry with the newer timestamp wins, unless `force` is set, in
	/// which case `incoming` always wins (Open Question (a), resolved in
	/// `DESIGN.md`). New entries are always added.
	pub fn merge_from(&mut self, incoming: PublicIndex, force: bool) {
		for new_entry in incoming.entries {
			match self
				.entries
				.iter_mut()
				.find(|e| e.vendor == new_entry.vendor && e.name == new_entry.name)
			{
				Some(existing) => {
					let keep_incoming = force
						|| match (existing.timestamp.parse::<Timestamp>(), new_entry.timestamp.parse::<Timestamp>()) {
							(Ok(old), Ok(new)) => new > old,
							// an unparsable timestamp loses to anything parsable; two
							// unparsable timestamps keep the existing entry.
							(Err(_), Ok(_)) => true,
							_ => false,
						};

					if keep_incoming {
						*existing = new_entry;
					}
				}
				None => self.entries.push(new_entry),
			}
		}
	}
}

#[instrument(level = "debug")]
pub async fn read(path: &Path) -> Result<PublicIndex, super::errors::ReadError> {
	super::read_xml(path).await
}

#[instrument(skip(index), level = "debug")]
pub async fn write(path: &Path, index: &PublicIndex) -> Result<(), super::errors::WriteError> {
	super::write_xml(path, index).await
}

pub(crate) async fn write_empty(path: &Path) -> Result<(), super::errors::WriteError> {
	write(path, &PublicIndex::default()).await
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(vendor: &str, date: &str) -> PdscEntry {
		PdscEntry {
			vendor: vendor.to_string(),
			name: "CMSIS".to_string(),
			url: "https://example.com/".to_string(),
			version: "5.9.0".to_string(),
			timestamp: date.to_string(),
		}
	}

	#[test]
	fn merge_keeps_newer_unless_forced() {
		let mut index = PublicIndex { entries: vec![entry("ARM", "2024-01-01T00:00:00Z")] };
		let incoming = PublicIndex { entries: vec![entry("ARM", "2020-01-01T00:00:00Z")] };

		index.merge_from(incoming.clone(), false);
		assert_eq!(index.entries[0].timestamp, "2024-01-01T00:00:00Z");

		index.merge_from(incoming, true);
		assert_eq!(index.entries[0].timestamp, "2020-01-01T00:00:00Z");
	}

	#[test]
	fn merge_adds_new_entries() {
		let mut index = PublicIndex { entries: vec![entry("ARM", "2024-01-01T00:00:00Z")] };
		index.merge_from(PublicIndex { entries: vec![entry("NXP", "2024-01-01T00:00:00Z")] }, false);
		assert_eq!(index.entries.len(), 2);
	}

	#[test]
	fn xml_roundtrip() {
		let index = PublicIndex { entries: vec![entry("ARM", "2024-01-01T00:00:00Z")] };
		let xml = quick_xml::se::to_string(&index).unwrap();
		let reparsed: PublicIndex = quick_xml::de::from_str(&xml).unwrap();
		assert_eq!(index, reparsed);
	}
}
