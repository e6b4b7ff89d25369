use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use cpackget::{archive::Archive, crypto};
use std::path::PathBuf;

use super::Context;

#[derive(Debug, Args)]
pub struct SignatureVerifyCommand {
	/// Path to the signed `.pack`/`.zip` archive.
	pub pack: PathBuf,

	/// Armored PGP public key to verify against. Required iff the embedded
	/// tag is a PGP signature; ignored for X.509 tags, which carry their own
	/// certificate.
	#[arg(long = "pub-key")]
	pub pub_key: Option<PathBuf>,

	/// Print the embedded X.509 certificate as PEM instead of verifying.
	#[arg(short = 'e', long = "export")]
	pub export: bool,
}

impl SignatureVerifyCommand {
	pub async fn run(self, _ctx: &Context) -> anyhow::Result<()> {
		let comment = Archive::open(&self.pack).context("failed opening archive")?.comment();
		let comment = std::str::from_utf8(&comment).context("archive comment is not a signature tag")?;
		let tag = crypto::SignatureTag::decode(comment).context("failed decoding signature tag")?;

		if self.export {
			let certificate_der = match &tag {
				crypto::SignatureTag::Full { certificate_der, .. } | crypto::SignatureTag::CertOnly { certificate_der } => certificate_der,
				crypto::SignatureTag::Pgp { .. } => anyhow::bail!("this pack is PGP-signed; there is no embedded certificate to export"),
			};
			let certificate = x509_certificate::CapturedX509Certificate::from_der(certificate_der.clone()).context("failed parsing embedded certificate")?;
			print!("{}", certificate.encode_pem());
			return Ok(());
		}

		let digest = crypto::archive_signing_digest(&self.pack).context("failed hashing archive")?;

		match &tag {
			crypto::SignatureTag::Full { .. } | crypto::SignatureTag::CertOnly { .. } => {
				crypto::x509::verify(&digest, &tag).context("signature verification failed")?;
			}
			crypto::SignatureTag::Pgp { .. } => {
				let pub_key_path = self.pub_key.as_ref().context("--pub-key is required to verify a PGP-signed pack")?;
				let armored = fs_err::tokio::read_to_string(pub_key_path)
					.await
					.with_context(|| format!("failed reading public key {}", pub_key_path.display()))?;
				let public_key = crypto::pgp::load_public_key(&armored).context("failed parsing PGP public key")?;
				crypto::pgp::verify_tag(&digest, &tag, &public_key).context("signature verification failed")?;
			}
		}

		println!("{} {} is validly signed", "ok:".green().bold(), self.pack.display());
		Ok(())
	}
}
