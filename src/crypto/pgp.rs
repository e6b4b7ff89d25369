//! PGP detached and embedded signatures (§4.6.3): Curve25519, RSA-2048,
//! RSA-3072, and RSA-4096 keys, ASCII-armored output.
//!
//! Grounded on `other_examples/manifests/attunehq-attune`, which declares
//! using the `pgp` crate directly for signing.

use super::SignatureTag;
use pgp::{
	composed::{
		Deserializable, SignedPublicKey, SignedSecretKey, StandaloneSignature,
	},
	crypto::hash::HashAlgorithm,
	types::KeyTrait as _,
};
use std::io::Cursor;

/// Produces an ASCII-armored detached signature over `data`.
pub fn sign_detached(data: &[u8], secret_key: &SignedSecretKey) -> Result<String, errors::SignError> {
	let signature = secret_key
		.create_signature(&|| String::new(), HashAlgorithm::SHA2_256, data)
		.map_err(|_| errors::SignError::Signing)?;

	let standalone = StandaloneSignature::new(signature);
	standalone.to_armored_string(None).map_err(|_| errors::SignError::Armor)
}

/// Produces a PGP signature tag ready to embed in a pack's ZIP comment.
pub fn sign_tag(data: &[u8], secret_key: &SignedSecretKey) -> Result<SignatureTag, errors::SignError> {
	let armored = sign_detached(data, secret_key)?;
	Ok(SignatureTag::Pgp { armored_signature: armored.into_bytes() })
}

/// Verifies a [`SignatureTag::Pgp`] against `data`.
pub fn verify_tag(data: &[u8], tag: &SignatureTag, public_key: &SignedPublicKey) -> Result<(), errors::VerifyError> {
	let SignatureTag::Pgp { armored_signature } = tag else {
		return Err(errors::VerifyError::Invalid);
	};
	let armored = std::str::from_utf8(armored_signature).map_err(|_| errors::VerifyError::BadSignature)?;
	verify_detached(data, armored, public_key)
}

/// Verifies an ASCII-armored detached signature over `data` against
/// `public_key`.
pub fn verify_detached(data: &[u8], armored_signature: &str, public_key: &SignedPublicKey) -> Result<(), errors::VerifyError> {
	let (signature, _headers) =
		StandaloneSignature::from_armor_single(Cursor::new(armored_signature.as_bytes())).map_err(|_| errors::VerifyError::BadSignature)?;

	signature
		.signature
		.verify(public_key, data)
		.map_err(|_| errors::VerifyError::Invalid)
}

/// Parses an ASCII-armored public key block.
pub fn load_public_key(armored: &str) -> Result<SignedPublicKey, errors::KeyError> {
	let (key, _headers) = SignedPublicKey::from_armor_single(Cursor::new(armored.as_bytes())).map_err(|_| errors::KeyError::BadKey)?;
	key.verify().map_err(|_| errors::KeyError::BadKey)?;
	Ok(key)
}

/// Parses an ASCII-armored, unencrypted secret key block. Encrypted secret
/// keys are rejected for the same reason X.509 keys are (Open Question (c)):
/// cpackget never prompts for a passphrase.
pub fn load_secret_key(armored: &str) -> Result<SignedSecretKey, errors::KeyError> {
	let (key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(armored.as_bytes())).map_err(|_| errors::KeyError::BadKey)?;

	if key.primary_key.is_encrypted() {
		return Err(errors::KeyError::Encrypted);
	}

	key.verify().map_err(|_| errors::KeyError::BadKey)?;
	Ok(key)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pgp::composed::{KeyType, SecretKeyParamsBuilder};
	use pgp::types::SecretKeyTrait as _;

	fn generate_keypair() -> (SignedSecretKey, SignedPublicKey) {
		let params = SecretKeyParamsBuilder::default()
			.key_type(KeyType::Rsa(2048))
			.can_sign(true)
			.can_create_certificates(false)
			.primary_user_id("cpackget test <test@example.invalid>".into())
			.build()
			.unwrap();

		let secret_key = params.generate().unwrap().sign(String::new).unwrap();
		let public_key = secret_key.public_key().sign(&secret_key, String::new).unwrap();
		(secret_key, public_key)
	}

	#[test]
	fn detached_signature_round_trips_with_a_generated_keypair() {
		let (secret_key, public_key) = generate_keypair();
		let data = b"the archive's rolled-up digest";

		let armored = sign_detached(data, &secret_key).unwrap();
		verify_detached(data, &armored, &public_key).unwrap();
	}

	#[test]
	fn tag_round_trips_and_rejects_tampered_data() {
		let (secret_key, public_key) = generate_keypair();
		let data = b"signed pack contents";

		let tag = sign_tag(data, &secret_key).unwrap();
		verify_tag(data, &tag, &public_key).unwrap();
		assert!(verify_tag(b"different contents", &tag, &public_key).is_err());
	}
}

pub mod errors {
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum SignError {
		#[error("failed producing PGP signature")]
		Signing,

		#[error("failed armoring PGP signature")]
		Armor,
	}

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum VerifyError {
		#[error("could not parse armored signature")]
		BadSignature,

		#[error("signature does not match")]
		Invalid,
	}

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum KeyError {
		#[error("could not parse PGP key")]
		BadKey,

		#[error("secret key is encrypted; cpackget does not prompt for key passphrases")]
		Encrypted,
	}
}
