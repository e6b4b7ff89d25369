//! Dependency resolution (§4.7): walks a pack manifest's
//! `<requirements><packages>` entries, recursively, tolerating cycles.
//!
//! Recursion is gated through a `HashSet::insert` visited set rather than
//! treating a repeat visit as an error.

use crate::{identifier::PackId, index::manifest::PackManifest};
use std::collections::HashSet;
use tracing::instrument;

/// Something that can look up an installed pack's manifest by vendor/name,
/// used to walk `<requirements>` without the dependency module needing to
/// know about the filesystem layout directly.
pub trait ManifestLookup {
	fn manifest_for(&self, vendor: &str, name: &str) -> Option<&PackManifest>;
}

/// Recursively collects every `(vendor, name)` pair `root` depends on,
/// transitively, visiting each pack at most once. A dependency cycle simply
/// stops recursing into an already-visited pack — it is not an error (§4.7).
#[instrument(skip(lookup), level = "debug")]
pub fn resolve_transitive_dependencies<L: ManifestLookup>(root_vendor: &str, root_name: &str, lookup: &L) -> Vec<(String, String)> {
	let mut visited = HashSet::new();
	let mut order = Vec::new();
	visit(root_vendor, root_name, lookup, &mut visited, &mut order);
	order
}

fn visit<L: ManifestLookup>(
	vendor: &str,
	name: &str,
	lookup: &L,
	visited: &mut HashSet<(String, String)>,
	order: &mut Vec<(String, String)>,
) {
	if !visited.insert((vendor.to_string(), name.to_string())) {
		return;
	}

	let Some(manifest) = lookup.manifest_for(vendor, name) else {
		return;
	};

	for (dep_vendor, dep_name) in manifest.required_packs() {
		order.push((dep_vendor.to_string(), dep_name.to_string()));
		visit(dep_vendor, dep_name, lookup, visited, order);
	}
}

/// Packs that are referenced as a requirement by at least one other
/// installed pack (§B.2's `list required` filter).
#[must_use]
pub fn required_by_any(manifests: &[(PackId, PackManifest)]) -> HashSet<(String, String)> {
	manifests
		.iter()
		.flat_map(|(_, manifest)| manifest.required_packs())
		.map(|(v, n)| (v.to_string(), n.to_string()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::manifest::{PackageRequirement, PackageRequirements, Release, Releases, Requirements};
	use std::collections::HashMap;

	struct FakeLookup(HashMap<(String, String), PackManifest>);

	impl ManifestLookup for FakeLookup {
		fn manifest_for(&self, vendor: &str, name: &str) -> Option<&PackManifest> {
			self.0.get(&(vendor.to_string(), name.to_string()))
		}
	}

	fn manifest_requiring(deps: &[(&str, &str)]) -> PackManifest {
		PackManifest {
			vendor: "V".to_string(),
			name: "N".to_string(),
			releases: Releases { releases: vec![Release { version: "1.0.0".to_string(), date: None, license: None }] },
			requirements: Some(Requirements {
				packages: Some(PackageRequirements {
					packages: deps
						.iter()
						.map(|(v, n)| PackageRequirement { vendor: v.to_string(), name: n.to_string(), version: None })
						.collect(),
				}),
			}),
		}
	}

	#[test]
	fn cycles_are_not_errors() {
		let mut lookups = HashMap::new();
		lookups.insert(("A".to_string(), "X".to_string()), manifest_requiring(&[("B", "Y")]));
		lookups.insert(("B".to_string(), "Y".to_string()), manifest_requiring(&[("A", "X")]));
		let lookup = FakeLookup(lookups);

		let deps = resolve_transitive_dependencies("A", "X", &lookup);
		assert_eq!(deps, vec![("B".to_string(), "Y".to_string())]);
	}

	#[test]
	fn collects_transitive_chain() {
		let mut lookups = HashMap::new();
		lookups.insert(("A".to_string(), "X".to_string()), manifest_requiring(&[("B", "Y")]));
		lookups.insert(("B".to_string(), "Y".to_string()), manifest_requiring(&[("C", "Z")]));
		lookups.insert(("C".to_string(), "Z".to_string()), manifest_requiring(&[]));
		let lookup = FakeLookup(lookups);

		let deps = resolve_transitive_dependencies("A", "X", &lookup);
		assert_eq!(deps, vec![("B".to_string(), "Y".to_string()), ("C".to_string(), "Z".to_string())]);
	}
}
