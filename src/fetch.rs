//! Fetcher (§4.4): a bounded worker pool that retrieves `.pack` archives over
//! plain HTTP(S) GET, streaming each into a temp file while hashing it, with
//! exponential backoff retry on transient failures.
//!
//! Built around a `Semaphore`-bounded `JoinSet` whose results are surfaced
//! as an out-of-order `Stream` via `async_stream::try_stream!`.

use crate::util;
use async_stream::try_stream;
use futures::Stream;
use sha2::{Digest as _, Sha256};
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};
use tokio::{io::AsyncWriteExt as _, sync::Semaphore, task::JoinSet};
use tracing::{instrument, Instrument as _};
use url::Url;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// One archive to retrieve.
#[derive(Debug, Clone)]
pub struct FetchJob {
	pub url: Url,
	/// Final destination; the archive is streamed to a sibling temp file
	/// first and only persisted here once fully downloaded and hashed.
	pub dest: PathBuf,
}

/// The outcome of one successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
	pub job_index: usize,
	pub dest: PathBuf,
	pub sha256: String,
	pub bytes: u64,
}

/// Downloads pack archives with bounded concurrency.
#[derive(Debug, Clone)]
pub struct Fetcher {
	client: reqwest::Client,
	concurrency: NonZeroUsize,
}

impl Fetcher {
	/// Builds a `Fetcher` from run configuration (§A.3): timeout and
	/// insecure-skip-verify come straight off `Config`.
	pub fn new(config: &crate::Config) -> Result<Self, errors::BuildError> {
		let client = reqwest::Client::builder()
			.user_agent(concat!("cpackget/", env!("CARGO_PKG_VERSION")))
			.timeout(config.timeout)
			.danger_accept_invalid_certs(config.insecure_skip_verify)
			.build()?;

		Ok(Self { client, concurrency: config.concurrency })
	}

	/// Fetches every job in `jobs`, respecting the configured concurrency
	/// bound, yielding each [`FetchOutcome`] as soon as it completes (not in
	/// `jobs` order).
	#[instrument(skip_all, level = "debug")]
	pub fn fetch_all<'a>(
		&'a self,
		jobs: Vec<FetchJob>,
	) -> impl Stream<Item = Result<FetchOutcome, errors::FetchError>> + 'a {
		try_stream! {
			let semaphore = Semaphore::new(self.concurrency.get());
			let mut tasks = JoinSet::new();

			for (index, job) in jobs.into_iter().enumerate() {
				let permit = semaphore.acquire().await.expect("semaphore is never closed");
				let client = self.client.clone();
				let span = tracing::info_span!("fetch", url = %job.url, index);
				tasks.spawn(
					async move {
						let _permit = permit;
						fetch_one(&client, index, &job).await
					}
					.instrument(span),
				);
			}

			while let Some(result) = tasks.join_next().await {
				yield result.map_err(errors::FetchError::Join)??;
			}
		}
	}
}

#[instrument(skip(client), level = "debug")]
async fn fetch_one(client: &reqwest::Client, job_index: usize, job: &FetchJob) -> Result<FetchOutcome, errors::FetchError> {
	let mut attempt = 0;
	loop {
		attempt += 1;
		match try_fetch_once(client, job_index, job).await {
			Ok(outcome) => return Ok(outcome),
			Err(e) if attempt < MAX_ATTEMPTS && e.is_retryable() => {
				tracing::warn!(attempt, url = %job.url, error = %e, "retrying fetch");
				tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
			}
			Err(e) => return Err(e),
		}
	}
}

async fn try_fetch_once(client: &reqwest::Client, job_index: usize, job: &FetchJob) -> Result<FetchOutcome, errors::FetchError> {
	if job.url.scheme() == "file" {
		return fetch_local(job_index, job).await;
	}

	let response = client.get(job.url.clone()).send().await?;
	let status = response.status();
	if status.is_client_error() {
		return Err(errors::FetchError::ClientStatus { url: job.url.clone(), status: status.as_u16() });
	}
	if !status.is_success() {
		return Err(errors::FetchError::ServerStatus { url: job.url.clone(), status: status.as_u16() });
	}

	let dir = job.dest.parent().unwrap_or_else(|| std::path::Path::new("."));
	fs_err::tokio::create_dir_all(dir)
		.await
		.map_err(|source| errors::FetchError::Io { path: dir.to_path_buf(), source })?;

	let mut tmp = tempfile::Builder::new()
		.prefix(".cpackget-fetch-")
		.tempfile_in(dir)
		.map_err(|source| errors::FetchError::Io { path: dir.to_path_buf(), source })?;

	let mut hasher = Sha256::new();
	let mut bytes = 0u64;
	let mut stream = response.bytes_stream();

	use futures::StreamExt as _;
	let mut tokio_file = tokio::fs::File::from_std(tmp.reopen().map_err(|source| errors::FetchError::Io {
		path: dir.to_path_buf(),
		source,
	})?);

	while let Some(chunk) = stream.next().await {
		let chunk = chunk.map_err(|source| errors::FetchError::Transport { url: job.url.clone(), source })?;
		hasher.update(&chunk);
		bytes += chunk.len() as u64;
		tokio_file
			.write_all(&chunk)
			.await
			.map_err(|source| errors::FetchError::Io { path: job.dest.clone(), source })?;
	}
	tokio_file
		.flush()
		.await
		.map_err(|source| errors::FetchError::Io { path: job.dest.clone(), source })?;
	drop(tokio_file);

	tmp.persist(&job.dest)
		.map_err(|e| errors::FetchError::Io { path: job.dest.clone(), source: e.error })?;

	Ok(FetchOutcome {
		job_index,
		dest: job.dest.clone(),
		sha256: util::hash(hasher.finalize()),
		bytes,
	})
}

/// Handles a `file://` reference (§4.4): copied rather than requested over
/// the network, but otherwise producing the same [`FetchOutcome`] shape so
/// callers never need to know the difference.
#[instrument(level = "debug")]
async fn fetch_local(job_index: usize, job: &FetchJob) -> Result<FetchOutcome, errors::FetchError> {
	let src = job
		.url
		.to_file_path()
		.map_err(|()| errors::FetchError::BadFileUrl(job.url.clone()))?;

	let dir = job.dest.parent().unwrap_or_else(|| std::path::Path::new("."));
	fs_err::tokio::create_dir_all(dir)
		.await
		.map_err(|source| errors::FetchError::Io { path: dir.to_path_buf(), source })?;

	let bytes = fs_err::tokio::read(&src)
		.await
		.map_err(|source| errors::FetchError::Io { path: src.clone(), source })?;

	let sha256 = util::hash(&bytes);
	let len = bytes.len() as u64;
	util::write_atomic(&job.dest, bytes)
		.await
		.map_err(|source| errors::FetchError::Io { path: job.dest.clone(), source })?;

	Ok(FetchOutcome { job_index, dest: job.dest.clone(), sha256, bytes: len })
}

pub mod errors {
	use std::path::PathBuf;
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum BuildError {
		#[error("failed building HTTP client")]
		Reqwest(#[from] reqwest::Error),
	}

	/// Errors fetching one archive. 5xx statuses and transport-level errors
	/// are retryable; 4xx statuses are not (§4.4).
	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum FetchError {
		#[error("server returned {status} fetching {url}")]
		ServerStatus { url: url::Url, status: u16 },

		#[error("request rejected ({status}) fetching {url}")]
		ClientStatus { url: url::Url, status: u16 },

		#[error("transport error fetching {url}")]
		Transport { url: url::Url, #[source] source: reqwest::Error },

		#[error("network error fetching {0}")]
		Reqwest(#[from] reqwest::Error),

		#[error("io error writing {path}")]
		Io { path: PathBuf, #[source] source: std::io::Error },

		#[error("fetch task panicked")]
		Join(#[source] tokio::task::JoinError),

		#[error("`{0}` is not a valid file:// reference")]
		BadFileUrl(url::Url),
	}

	impl FetchError {
		/// Whether retrying the same request might succeed.
		pub(crate) fn is_retryable(&self) -> bool {
			matches!(
				self,
				FetchError::ServerStatus { .. } | FetchError::Transport { .. } | FetchError::Reqwest(_)
			)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::convert::Infallible;
	use tokio::net::TcpListener;

	async fn serve_once(body: &'static [u8], status: u16) -> Url {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
			let mut buf = [0u8; 1024];
			let _ = socket.read(&mut buf).await;
			let response = format!(
				"HTTP/1.1 {status} OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
				body.len()
			);
			let _: Result<(), Infallible> = async {
				let _ = socket.write_all(response.as_bytes()).await;
				let _ = socket.write_all(body).await;
				Ok(())
			}
			.await;
		});

		Url::parse(&format!("http://{addr}/pack.pack")).unwrap()
	}

	#[tokio::test]
	async fn fetches_and_hashes_a_small_body() {
		let url = serve_once(b"hello", 200).await;
		let dir = tempfile::tempdir().unwrap();
		let dest = dir.path().join("out.pack");

		let config = crate::Config::default();
		let fetcher = Fetcher::new(&config).unwrap();

		use futures::StreamExt as _;
		let mut stream = Box::pin(fetcher.fetch_all(vec![FetchJob { url, dest: dest.clone() }]));
		let outcome = stream.next().await.unwrap().unwrap();

		assert_eq!(outcome.bytes, 5);
		assert_eq!(outcome.sha256, util::hash(b"hello"));
		assert!(dest.exists());
	}

	#[tokio::test]
	async fn fetches_a_file_url() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("src.pack");
		std::fs::write(&src, b"local pack").unwrap();
		let dest = dir.path().join("out.pack");

		let config = crate::Config::default();
		let fetcher = Fetcher::new(&config).unwrap();
		let url = Url::from_file_path(&src).unwrap();

		use futures::StreamExt as _;
		let mut stream = Box::pin(fetcher.fetch_all(vec![FetchJob { url, dest: dest.clone() }]));
		let outcome = stream.next().await.unwrap().unwrap();

		assert_eq!(outcome.bytes, 10);
		assert_eq!(outcome.sha256, util::hash(b"local pack"));
		assert!(dest.exists());
	}

	#[tokio::test]
	async fn client_error_is_not_retried() {
		let url = serve_once(b"nope", 404).await;
		let dir = tempfile::tempdir().unwrap();
		let dest = dir.path().join("out.pack");

		let config = crate::Config::default();
		let fetcher = Fetcher::new(&config).unwrap();

		use futures::StreamExt as _;
		let mut stream = Box::pin(fetcher.fetch_all(vec![FetchJob { url, dest }]));
		let result = stream.next().await.unwrap();
		assert!(matches!(result, Err(errors::FetchError::ClientStatus { status: 404, .. })));
	}
}
