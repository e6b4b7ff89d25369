//! Cryptography (§4.6): checksum files, X.509 signatures, and PGP
//! signatures, built on the `x509-certificate` and `pgp` crates rather than
//! hand-rolled crypto.

/// SHA-256 `.checksum` sidecar files.
pub mod checksum;
/// PGP detached/embedded signatures.
pub mod pgp;
/// X.509 certificate signing.
pub mod x509;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::path::Path;

/// Computes the value the signing pipeline actually signs (§4.6.2): the
/// archive's rolled-up SHA-256 (`H`, one hasher fed every entry in archive
/// order), itself hashed once more with SHA-256.
pub fn archive_signing_digest(archive_path: &Path) -> Result<[u8; 32], crate::archive::errors::ArchiveError> {
	let mut archive = crate::archive::Archive::open(archive_path)?;
	let rollup = archive.rollup_digest()?;
	Ok(Sha256::digest(rollup).into())
}

/// The `cpackget-<version>` prefix every signature tag begins with (§4.6.2),
/// byte-exact with the legacy `cpackget-vX.Y.Z:...` form.
pub const SIGNATURE_TAG_VERSION: &str = "v1.0.0";

/// The byte-exact `cpackget-<version>:<type>:...` signature tag embedded in
/// a signed pack's ZIP comment field (§4.6.2). `type` fixes the field count:
/// `f` (full X.509: certificate + PKCS1v15 signature, 4 colon-separated
/// fields), `c` (cert-only identity attestation, 3 fields), `p` (PGP
/// detached signature, 3 fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureTag {
	/// X.509 certificate plus a PKCS1v15 signature over the archive's
	/// rolled-up SHA-256.
	Full { certificate_der: Vec<u8>, signature: Vec<u8> },
	/// An X.509 certificate embedded without a signature, for identity
	/// attestation only.
	CertOnly { certificate_der: Vec<u8> },
	/// An ASCII-armored detached PGP signature.
	Pgp { armored_signature: Vec<u8> },
}

impl SignatureTag {
	fn tag_char(&self) -> char {
		match self {
			SignatureTag::Full { .. } => 'f',
			SignatureTag::CertOnly { .. } => 'c',
			SignatureTag::Pgp { .. } => 'p',
		}
	}

	#[must_use]
	pub fn encode(&self) -> String {
		let prefix = format!("cpackget-{}:{}", SIGNATURE_TAG_VERSION, self.tag_char());
		match self {
			SignatureTag::Full { certificate_der, signature } => {
				format!("{prefix}:{}:{}", BASE64.encode(certificate_der), BASE64.encode(signature))
			}
			SignatureTag::CertOnly { certificate_der } => format!("{prefix}:{}", BASE64.encode(certificate_der)),
			SignatureTag::Pgp { armored_signature } => format!("{prefix}:{}", BASE64.encode(armored_signature)),
		}
	}

	pub fn decode(s: &str) -> Result<Self, errors::TagError> {
		let mut parts = s.splitn(4, ':');
		let version_marker = parts.next().ok_or(errors::TagError::Malformed)?;
		if version_marker != format!("cpackget-{SIGNATURE_TAG_VERSION}") {
			return Err(errors::TagError::UnsupportedVersion(version_marker.to_string()));
		}

		let kind_char = parts.next().ok_or(errors::TagError::Malformed)?;
		let rest: Vec<&str> = parts.collect();

		match kind_char {
			"f" => {
				let [cert_b64, sig_b64] = rest.as_slice() else {
					return Err(errors::TagError::WrongFieldCount { kind: "f", expected: 4 });
				};
				Ok(SignatureTag::Full {
					certificate_der: BASE64.decode(cert_b64).map_err(errors::TagError::Base64)?,
					signature: BASE64.decode(sig_b64).map_err(errors::TagError::Base64)?,
				})
			}
			"c" => {
				let [cert_b64] = rest.as_slice() else {
					return Err(errors::TagError::WrongFieldCount { kind: "c", expected: 3 });
				};
				Ok(SignatureTag::CertOnly { certificate_der: BASE64.decode(cert_b64).map_err(errors::TagError::Base64)? })
			}
			"p" => {
				let [sig_b64] = rest.as_slice() else {
					return Err(errors::TagError::WrongFieldCount { kind: "p", expected: 3 });
				};
				Ok(SignatureTag::Pgp { armored_signature: BASE64.decode(sig_b64).map_err(errors::TagError::Base64)? })
			}
			other => Err(errors::TagError::UnknownKind(other.to_string())),
		}
	}
}

impl fmt::Display for SignatureTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.encode())
	}
}

pub mod errors {
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum TagError {
		#[error("malformed signature tag")]
		Malformed,

		#[error("unsupported signature tag version `{0}`")]
		UnsupportedVersion(String),

		#[error("unknown signature kind `{0}`")]
		UnknownKind(String),

		#[error("signature kind `{kind}` tag must have {expected} colon-separated fields")]
		WrongFieldCount { kind: &'static str, expected: usize },

		#[error("malformed base64 in signature tag")]
		Base64(#[from] base64::DecodeError),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn full_round_trips() {
		let tag = SignatureTag::Full { certificate_der: vec![1, 2, 3], signature: vec![4, 5, 6] };
		let encoded = tag.encode();
		assert!(encoded.starts_with("cpackget-v1.0.0:f:"));
		assert_eq!(SignatureTag::decode(&encoded).unwrap(), tag);
	}

	#[test]
	fn cert_only_round_trips() {
		let tag = SignatureTag::CertOnly { certificate_der: vec![9] };
		let encoded = tag.encode();
		assert_eq!(SignatureTag::decode(&encoded).unwrap(), tag);
	}

	#[test]
	fn pgp_round_trips() {
		let tag = SignatureTag::Pgp { armored_signature: b"-----BEGIN PGP SIGNATURE-----".to_vec() };
		let encoded = tag.encode();
		assert!(encoded.starts_with("cpackget-v1.0.0:p:"));
		assert_eq!(SignatureTag::decode(&encoded).unwrap(), tag);
	}

	#[test]
	fn rejects_unknown_kind() {
		assert!(SignatureTag::decode("cpackget-v1.0.0:z:AAAA").is_err());
	}

	#[test]
	fn rejects_wrong_field_count() {
		assert!(matches!(
			SignatureTag::decode("cpackget-v1.0.0:f:AAAA"),
			Err(errors::TagError::WrongFieldCount { kind: "f", .. })
		));
	}
}
