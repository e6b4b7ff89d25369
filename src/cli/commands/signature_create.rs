use anyhow::Context as _;
use clap::Args;
use colored::Colorize as _;
use cpackget::{archive, crypto};
use std::path::PathBuf;

use super::Context;

#[derive(Debug, Args)]
pub struct SignatureCreateCommand {
	/// Path to the `.pack`/`.zip` archive to sign.
	pub pack: PathBuf,

	/// PEM private key (PKCS#1 or unencrypted PKCS#8). Required unless
	/// `--pgp`.
	#[arg(short = 'k', long)]
	pub key: Option<PathBuf>,

	/// PEM X.509 certificate matching `--key`. Required unless `--pgp`.
	#[arg(short = 'c', long)]
	pub cert: Option<PathBuf>,

	/// Embed the certificate without a signature, for identity attestation
	/// only. Ignored with `--pgp`.
	#[arg(long = "cert-only")]
	pub cert_only: bool,

	/// Armored PGP secret key to sign with instead of X.509.
	#[arg(long)]
	pub pgp: Option<PathBuf>,

	/// Directory to write `<pack-file-name>.signed` into (defaults to the
	/// archive's own directory).
	#[arg(short = 'o', long)]
	pub output_dir: Option<PathBuf>,
}

impl SignatureCreateCommand {
	pub async fn run(self, _ctx: &Context) -> anyhow::Result<()> {
		let tag = if let Some(pgp_key_path) = &self.pgp {
			let armored = fs_err::tokio::read_to_string(pgp_key_path)
				.await
				.with_context(|| format!("failed reading PGP secret key {}", pgp_key_path.display()))?;
			let secret_key = crypto::pgp::load_secret_key(&armored).context("failed parsing PGP secret key")?;

			let digest = crypto::archive_signing_digest(&self.pack).context("failed hashing archive")?;
			crypto::pgp::sign_tag(&digest, &secret_key).context("failed producing PGP signature")?
		} else {
			let key_path = self.key.as_ref().context("--key is required unless --pgp is given")?;
			let cert_path = self.cert.as_ref().context("--cert is required unless --pgp is given")?;

			let key_pem = fs_err::tokio::read_to_string(key_path).await.with_context(|| format!("failed reading private key {}", key_path.display()))?;
			let cert_pem = fs_err::tokio::read_to_string(cert_path).await.with_context(|| format!("failed reading certificate {}", cert_path.display()))?;

			let key = crypto::x509::load_private_key(&key_pem).context("failed parsing private key")?;
			let certificate =
				x509_certificate::CapturedX509Certificate::from_pem(cert_pem.as_bytes()).context("failed parsing certificate")?;

			if self.cert_only {
				crypto::x509::sign_cert_only(&certificate).context("failed preparing cert-only tag")?
			} else {
				let digest = crypto::archive_signing_digest(&self.pack).context("failed hashing archive")?;
				crypto::x509::sign_full(&digest, &key, &certificate).context("failed signing archive")?
			}
		};

		let file_name = self.pack.file_name().and_then(|n| n.to_str()).context("archive path has no file name")?;
		let dir = self.output_dir.clone().or_else(|| self.pack.parent().map(std::path::Path::to_path_buf)).unwrap_or_default();
		let dest = dir.join(format!("{file_name}.signed"));

		fs_err::tokio::create_dir_all(&dir).await?;
		archive::write_copy(&self.pack, &dest, Some(tag.encode().as_bytes())).context("failed embedding signature tag")?;

		println!("{} wrote {}", "done:".green().bold(), dest.display());
		Ok(())
	}
}
