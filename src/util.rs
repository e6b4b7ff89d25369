use fs_err::tokio as fs;
use sha2::{Digest as _, Sha256};
use std::path::Path;

/// Hashes a byte slice with SHA-256 and returns its lowercase hex digest.
pub fn hash<S: AsRef<[u8]>>(bytes: S) -> String {
	format!("{:x}", Sha256::digest(bytes.as_ref()))
}

/// Writes `contents` to `path` atomically: write to a temp file in the same
/// directory, then rename over the destination.
pub async fn write_atomic<C: AsRef<[u8]>>(path: &Path, contents: C) -> std::io::Result<()> {
	let dir = path.parent().unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(dir).await?;

	let mut tmp = tempfile::Builder::new()
		.prefix(".cpackget-tmp-")
		.tempfile_in(dir)?;

	{
		use std::io::Write as _;
		tmp.write_all(contents.as_ref())?;
		tmp.flush()?;
	}

	tmp.persist(path)
		.map_err(|e| e.error)
		.map(|_| ())
}

/// Removes a directory if it exists and is empty; a non-empty directory or a
/// missing one are both treated as success, matching the cascading
/// `<V>/<N>/<X.Y.Z>` cleanup in the Installer's remove path.
pub async fn remove_empty_dir(path: &Path) -> std::io::Result<()> {
	match fs::remove_dir(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => Ok(()),
		#[cfg(windows)]
		Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(()),
		Err(e) => Err(e),
	}
}

/// Implements `Serialize`/`Deserialize` for a type via its `Display`/`FromStr`
/// impls.
#[macro_export]
macro_rules! ser_display_deser_fromstr {
	($struct_name:ident) => {
		impl serde::Serialize for $struct_name {
			fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
			where
				S: serde::ser::Serializer,
			{
				serializer.collect_str(self)
			}
		}

		impl<'de> serde::Deserialize<'de> for $struct_name {
			fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
			where
				D: serde::de::Deserializer<'de>,
			{
				let s = String::deserialize(deserializer)?;
				s.parse().map_err(serde::de::Error::custom)
			}
		}
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_is_stable() {
		assert_eq!(
			hash(b"hello"),
			"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
		);
	}

	#[tokio::test]
	async fn write_atomic_creates_parent_dirs() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("a/b/c.txt");
		write_atomic(&path, "hi").await.unwrap();
		assert_eq!(fs_err::tokio::read_to_string(&path).await.unwrap(), "hi");
	}
}
