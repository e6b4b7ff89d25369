//! A pack's own `.pdsc` manifest, read as an opaque passthrough: only
//! `vendor`, `name`, `releases`, and `requirements` are consumed (§4.3); the
//! rest of the document (boards, devices, components, examples...) is beyond
//! scope and never parsed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::instrument;

/// The root `<package>` element, opaquely passed through except for the
/// fields this tool actually needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "package")]
pub struct PackManifest {
	pub vendor: String,
	pub name: String,
	pub releases: Releases,
	#[serde(default)]
	pub requirements: Option<Requirements>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Releases {
	#[serde(rename = "release", default)]
	pub releases: Vec<Release>,
}

/// One `<release>` entry: a version this pack's manifest declares it has.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
	#[serde(rename = "@version")]
	pub version: String,
	#[serde(rename = "@date", default)]
	pub date: Option<String>,
	/// Relative path, within the pack, to a EULA text file the user must
	/// accept before this release is installed. Absent for packs with no
	/// license gate.
	#[serde(rename = "@license", default)]
	pub license: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirements {
	#[serde(rename = "packages", default)]
	pub packages: Option<PackageRequirements>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRequirements {
	#[serde(rename = "package", default)]
	pub packages: Vec<PackageRequirement>,
}

/// One `<package>` entry under `<requirements><packages>`: a pack this
/// manifest's pack depends on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRequirement {
	#[serde(rename = "@vendor")]
	pub vendor: String,
	#[serde(rename = "@name")]
	pub name: String,
	#[serde(rename = "@version", default)]
	pub version: Option<String>,
}

impl PackManifest {
	/// The most recent version this manifest declares, by document order
	/// (the `.pdsc` convention is that the first `<release>` is the latest).
	#[must_use]
	pub fn latest_version(&self) -> Option<&str> {
		self.releases.releases.first().map(|r| r.version.as_str())
	}

	/// Flattened `(vendor, name)` pairs this pack depends on.
	#[must_use]
	pub fn required_packs(&self) -> Vec<(&str, &str)> {
		self.requirements
			.as_ref()
			.and_then(|r| r.packages.as_ref())
			.map(|p| p.packages.iter().map(|r| (r.vendor.as_str(), r.name.as_str())).collect())
			.unwrap_or_default()
	}
}

#[instrument(level = "debug")]
pub async fn read(path: &Path) -> Result<PackManifest, super::errors::ReadError> {
	super::read_xml(path).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_minimal_manifest() {
		let xml = r#"<?xml version="1.0"?>
<package schemaVersion="1.7.2">
  <vendor>ARM</vendor>
  <name>CMSIS</name>
  <releases>
    <release version="5.9.0" date="2022-01-01">latest</release>
    <release version="5.8.0">older</release>
  </releases>
  <requirements>
    <packages>
      <package vendor="Keil" name="MDK-Middleware" version="7.0.0"/>
    </packages>
  </requirements>
</package>"#;

		let manifest: PackManifest = quick_xml::de::from_str(xml).unwrap();
		assert_eq!(manifest.vendor, "ARM");
		assert_eq!(manifest.name, "CMSIS");
		assert_eq!(manifest.latest_version(), Some("5.9.0"));
		assert_eq!(manifest.required_packs(), vec![("Keil", "MDK-Middleware")]);
	}

	#[test]
	fn ignores_unknown_elements() {
		let xml = r#"<?xml version="1.0"?>
<package schemaVersion="1.7.2">
  <vendor>ARM</vendor>
  <name>CMSIS</name>
  <releases><release version="5.9.0"/></releases>
  <boards><board vendor="ARM" name="Some Board"/></boards>
  <devices><family Dname="whatever"/></devices>
</package>"#;

		let manifest: PackManifest = quick_xml::de::from_str(xml).unwrap();
		assert_eq!(manifest.latest_version(), Some("5.9.0"));
	}
}
