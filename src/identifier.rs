//! Pack identifiers and reference parsing (§4.1 of the Installation Core).
//!
//! A [`PackRef`] is what the user types on the command line or writes into an
//! index; a [`PackId`] is the canonical `(vendor, name, version)` triple that
//! identifies an installed pack on disk. Parsing a reference never touches
//! the filesystem or the network — resolving an [`PackRef::IdentifierOnly`]
//! reference to a concrete URL is the Installer's job (§4.7, "Resolved").

use semver::Version;
use std::{
	cmp::Ordering,
	fmt::{self, Display, Formatter},
	path::{Path, PathBuf},
	str::FromStr,
};
use url::Url;

/// A canonical `(vendor, name, version)` triple.
///
/// Two `PackId`s are equal iff all three fields are equal (§3). Ordering
/// compares vendor, then name, then [`pack_version_cmp`] on the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackId {
	vendor: String,
	name: String,
	version: Version,
}

crate::ser_display_deser_fromstr!(PackId);

impl PackId {
	/// Builds a `PackId`, validating the vendor/name character classes.
	pub fn new(vendor: impl Into<String>, name: impl Into<String>, version: Version) -> Result<Self, errors::PackIdError> {
		let vendor = vendor.into();
		let name = name.into();
		validate_ident(&vendor, errors::IdentPart::Vendor)?;
		validate_ident(&name, errors::IdentPart::Name)?;
		Ok(Self { vendor, name, version })
	}

	#[must_use]
	pub fn vendor(&self) -> &str {
		&self.vendor
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn version(&self) -> &Version {
		&self.version
	}

	/// The `<V>.<N>.pdsc` manifest file name this pack must contain.
	#[must_use]
	pub fn manifest_file_name(&self) -> String {
		format!("{}.{}.pdsc", self.vendor, self.name)
	}

	/// The `<V>.<N>.<X.Y.Z>.pack` download cache file name.
	#[must_use]
	pub fn download_file_name(&self) -> String {
		format!("{}.{}.{}.pack", self.vendor, self.name, self.version)
	}

	/// The `<root>/<V>/<N>/<X.Y.Z>/` directory for this pack.
	#[must_use]
	pub fn install_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.vendor)
			.join(&self.name)
			.join(self.version.to_string())
	}
}

impl Display for PackId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.vendor, self.name, self.version)
	}
}

impl FromStr for PackId {
	type Err = errors::PackIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let parts: Vec<&str> = s.splitn(3, '.').collect();
		let [vendor, name, rest] = parts.as_slice() else {
			return Err(errors::PackIdError::Malformed(s.to_string()));
		};

		// `rest` is `x.y.z[-suffix]`; re-join since `Version::from_str` wants it whole.
		let version = parse_legacy_version(rest).map_err(errors::PackIdError::Version)?;

		PackId::new(*vendor, *name, version)
	}
}

impl PartialOrd for PackId {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for PackId {
	fn cmp(&self, other: &Self) -> Ordering {
		self.vendor
			.cmp(&other.vendor)
			.then_with(|| self.name.cmp(&other.name))
			.then_with(|| pack_version_cmp(&self.version, &other.version))
	}
}

/// SemVer comparison with an inverted tie-break: a version **with** a
/// `-suffix` sorts **before** the suffix-less version of the same numeric
/// triple (inverted from stock SemVer precedence, where pre-release sorts
/// before release — here it's the other way because a `-suffix` marks a
/// vendor-specific "in development" build that should be superseded first).
#[must_use]
pub fn pack_version_cmp(a: &Version, b: &Version) -> Ordering {
	(a.major, a.minor, a.patch)
		.cmp(&(b.major, b.minor, b.patch))
		.then_with(|| match (a.pre.is_empty(), b.pre.is_empty()) {
			(true, true) => Ordering::Equal,
			(true, false) => Ordering::Greater,
			(false, true) => Ordering::Less,
			(false, false) => a.pre.cmp(&b.pre),
		})
}

fn validate_ident(s: &str, part: errors::IdentPart) -> Result<(), errors::PackIdError> {
	let mut chars = s.chars();
	let Some(first) = chars.next() else {
		return Err(errors::PackIdError::Empty(part));
	};

	if !first.is_ascii_alphabetic() {
		return Err(errors::PackIdError::InvalidChars(part, s.to_string()));
	}

	if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
		return Err(errors::PackIdError::InvalidChars(part, s.to_string()));
	}

	Ok(())
}

fn parse_legacy_version(s: &str) -> Result<Version, errors::VersionError> {
	let parts: Vec<&str> = s.splitn(3, '.').collect();
	let [x, y, rest] = parts.as_slice() else {
		return Err(errors::VersionError::Malformed(s.to_string()));
	};

	// `rest` is `z` or `z-suffix`.
	let (z, suffix) = match rest.split_once('-') {
		Some((z, suffix)) => (z, Some(suffix)),
		None => (*rest, None),
	};

	for field in [*x, y, z] {
		if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit()) {
			return Err(errors::VersionError::Malformed(s.to_string()));
		}
	}

	let canonical = match suffix {
		Some(suffix) => format!("{x}.{y}.{z}-{suffix}"),
		None => format!("{x}.{y}.{z}"),
	};

	Version::parse(&canonical).map_err(|e| errors::VersionError::Invalid(canonical, e))
}

/// One parsed-and-classified pack reference, as accepted by `add`/`rm`/`update`.
#[derive(Debug, Clone)]
pub enum PackRef {
	/// A URL ending in `.pack`/`.zip`, to be fetched directly.
	RemoteArchive { raw: String, url: Url },
	/// A local filesystem path ending in `.pack`/`.zip`.
	LocalArchive { raw: String, path: PathBuf },
	/// A local filesystem path ending in `.pdsc`, installed in place.
	LocalManifest { raw: String, path: PathBuf },
	/// A bare `Vendor.Name.X.Y.Z` or `Vendor::Name[@X.Y.Z]` identifier, to be
	/// resolved against the Public Index.
	IdentifierOnly {
		raw: String,
		vendor: String,
		name: String,
		version: Option<Version>,
	},
}

impl PackRef {
	/// The [`PackId`] this reference names, if it's fully determined (i.e.
	/// not a version-less modern identifier, which must first be resolved
	/// against the Public Index to learn its latest version).
	#[must_use]
	pub fn pack_id(&self) -> Option<PackId> {
		match self {
			PackRef::RemoteArchive { .. } | PackRef::LocalArchive { .. } | PackRef::LocalManifest { .. } => None,
			PackRef::IdentifierOnly { vendor, name, version: Some(version), .. } => {
				PackId::new(vendor.clone(), name.clone(), version.clone()).ok()
			}
			PackRef::IdentifierOnly { .. } => None,
		}
	}

	#[must_use]
	pub fn raw(&self) -> &str {
		match self {
			PackRef::RemoteArchive { raw, .. }
			| PackRef::LocalArchive { raw, .. }
			| PackRef::LocalManifest { raw, .. }
			| PackRef::IdentifierOnly { raw, .. } => raw,
		}
	}
}

impl FromStr for PackRef {
	type Err = errors::PackRefError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let raw = s.to_string();

		if s.ends_with(".pdsc") {
			return Ok(PackRef::LocalManifest { raw, path: PathBuf::from(s) });
		}

		if s.ends_with(".pack") || s.ends_with(".zip") {
			return match Url::parse(s) {
				Ok(url) if matches!(url.scheme(), "http" | "https") => {
					Ok(PackRef::RemoteArchive { raw, url })
				}
				_ => Ok(PackRef::LocalArchive { raw, path: PathBuf::from(s) }),
			};
		}

		if let Some((vendor, rest)) = s.split_once("::") {
			let (name, version) = match rest.split_once('@') {
				Some((name, version)) => (
					name,
					Some(
						parse_legacy_version(version)
							.or_else(|_| Version::parse(version))
							.map_err(|_| errors::PackRefError::BadVersion(version.to_string()))?,
					),
				),
				None => (rest, None),
			};

			validate_ident(vendor, errors::IdentPart::Vendor).map_err(|_| errors::PackRefError::BadReference(raw.clone()))?;
			validate_ident(name, errors::IdentPart::Name).map_err(|_| errors::PackRefError::BadReference(raw.clone()))?;

			return Ok(PackRef::IdentifierOnly {
				raw,
				vendor: vendor.to_string(),
				name: name.to_string(),
				version,
			});
		}

		// legacy `Vendor.Name.X.Y.Z[-suffix]`
		let parts: Vec<&str> = s.splitn(3, '.').collect();
		if let [vendor, name, rest] = parts.as_slice() {
			if validate_ident(vendor, errors::IdentPart::Vendor).is_ok()
				&& validate_ident(name, errors::IdentPart::Name).is_ok()
			{
				let version = parse_legacy_version(rest)
					.map_err(|_| errors::PackRefError::BadVersion(rest.to_string()))?;

				return Ok(PackRef::IdentifierOnly {
					raw,
					vendor: vendor.to_string(),
					name: name.to_string(),
					version: Some(version),
				});
			}
		}

		Err(errors::PackRefError::BadReference(raw))
	}
}

pub mod errors {
	use thiserror::Error;

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub enum IdentPart {
		Vendor,
		Name,
	}

	impl std::fmt::Display for IdentPart {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			match self {
				IdentPart::Vendor => write!(f, "vendor"),
				IdentPart::Name => write!(f, "name"),
			}
		}
	}

	/// Errors constructing or parsing a [`super::PackId`].
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum PackIdError {
		/// The string didn't split into `vendor.name.version`.
		#[error("malformed pack id `{0}`, expected `Vendor.Name.X.Y.Z`")]
		Malformed(String),

		/// The vendor or name part was empty.
		#[error("pack id {0} is empty")]
		Empty(IdentPart),

		/// The vendor or name part used disallowed characters.
		#[error("pack id {0} `{1}` must start with a letter and contain only letters, digits, `_`, `-`")]
		InvalidChars(IdentPart, String),

		/// The version part didn't parse.
		#[error("invalid version")]
		Version(#[from] VersionError),
	}

	/// Errors parsing the version portion of a reference.
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum VersionError {
		#[error("malformed version `{0}`, expected `X.Y.Z[-suffix]`")]
		Malformed(String),

		#[error("invalid version `{0}`")]
		Invalid(String, #[source] semver::Error),
	}

	/// Errors classifying a [`super::PackRef`].
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum PackRefError {
		/// No reference form matched.
		#[error("`{0}` is not a recognized pack reference (expected Vendor.Name.X.Y.Z, Vendor::Name[@X.Y.Z], a `.pack`/`.zip`/`.pdsc` path, or URL)")]
		BadReference(String),

		/// A reference form matched but its version fragment was malformed.
		#[error("malformed version `{0}`")]
		BadVersion(String),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_legacy_form() {
		let r: PackRef = "ARM.CMSIS.5.9.0".parse().unwrap();
		let PackRef::IdentifierOnly { vendor, name, version, .. } = r else {
			panic!("wrong kind")
		};
		assert_eq!(vendor, "ARM");
		assert_eq!(name, "CMSIS");
		assert_eq!(version.unwrap(), Version::new(5, 9, 0));
	}

	#[test]
	fn parses_legacy_form_with_suffix() {
		let r: PackRef = "ARM.CMSIS.5.9.0-beta1".parse().unwrap();
		let PackRef::IdentifierOnly { version, .. } = r else {
			panic!("wrong kind")
		};
		assert_eq!(version.unwrap().to_string(), "5.9.0-beta1");
	}

	#[test]
	fn parses_modern_form_with_version() {
		let r: PackRef = "ARM::CMSIS@5.9.0".parse().unwrap();
		let PackRef::IdentifierOnly { vendor, name, version, .. } = r else {
			panic!("wrong kind")
		};
		assert_eq!(vendor, "ARM");
		assert_eq!(name, "CMSIS");
		assert_eq!(version.unwrap(), Version::new(5, 9, 0));
	}

	#[test]
	fn parses_modern_form_without_version() {
		let r: PackRef = "ARM::CMSIS".parse().unwrap();
		let PackRef::IdentifierOnly { version, .. } = r else {
			panic!("wrong kind")
		};
		assert!(version.is_none());
	}

	#[test]
	fn parses_local_archive_and_manifest() {
		assert!(matches!("./Foo.Bar.1.0.0.pack".parse::<PackRef>().unwrap(), PackRef::LocalArchive { .. }));
		assert!(matches!("./Foo.Bar.zip".parse::<PackRef>().unwrap(), PackRef::LocalArchive { .. }));
		assert!(matches!("./Foo.Bar.pdsc".parse::<PackRef>().unwrap(), PackRef::LocalManifest { .. }));
	}

	#[test]
	fn parses_remote_archive() {
		let r: PackRef = "http://example.com/Foo.Bar.1.0.0.pack".parse().unwrap();
		assert!(matches!(r, PackRef::RemoteArchive { .. }));
	}

	#[test]
	fn rejects_garbage() {
		assert!("not a pack ref at all!!".parse::<PackRef>().is_err());
	}

	#[test]
	fn canonicalize_roundtrip() {
		// invariant 1 from spec §8: parse(canonicalize(r)) == parse(r)
		let id: PackId = "ARM.CMSIS.5.9.0".parse().unwrap();
		let canonical = id.to_string();
		let reparsed: PackId = canonical.parse().unwrap();
		assert_eq!(id, reparsed);
	}

	#[test]
	fn version_ordering_suffix_sorts_before_release() {
		let with_suffix = Version::parse("1.0.0-beta1").unwrap();
		let release = Version::parse("1.0.0").unwrap();
		assert_eq!(pack_version_cmp(&with_suffix, &release), Ordering::Less);
	}

	#[test]
	fn pack_id_rejects_bad_vendor() {
		assert!(PackId::new("1bad", "Name", Version::new(1, 0, 0)).is_err());
	}
}
