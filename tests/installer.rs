//! End-to-end coverage of the add/remove/update lifecycle and the index
//! and crash-safety invariants (§8).

use cpackget::{
	identifier::PackRef,
	index::{local, public},
	installer::Installer,
	layout, reporters, Config, Installation,
};
use std::convert::Infallible;
use std::io::Write as _;
use tokio::net::TcpListener;

fn build_pack_archive(path: &std::path::Path, vendor: &str, name: &str, version: &str, requires: &[(&str, &str)]) {
	let file = std::fs::File::create(path).unwrap();
	let mut writer = zip::ZipWriter::new(file);
	let options = zip::write::SimpleFileOptions::default();

	let requirements_xml: String = requires
		.iter()
		.map(|(v, n)| format!(r#"<package vendor="{v}" name="{n}"/>"#))
		.collect();

	let pdsc = format!(
		r#"<?xml version="1.0"?>
<package schemaVersion="1.7.2">
  <vendor>{vendor}</vendor>
  <name>{name}</name>
  <releases><release version="{version}">first release</release></releases>
  <requirements><packages>{requirements_xml}</packages></requirements>
</package>"#
	);

	writer.start_file(format!("{vendor}.{name}.pdsc"), options).unwrap();
	writer.write_all(pdsc.as_bytes()).unwrap();
	writer.start_file("Device/Include/device.h", options).unwrap();
	writer.write_all(b"// header").unwrap();
	writer.finish().unwrap();
}

/// Serves every `.pack` file under `dir` over plain HTTP, forever, until the
/// test process exits — enough for one test's worth of fetches.
async fn serve_dir(dir: std::path::PathBuf) -> url::Url {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		loop {
			let (mut socket, _) = match listener.accept().await {
				Ok(pair) => pair,
				Err(_) => return,
			};
			let dir = dir.clone();
			tokio::spawn(async move {
				use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
				let mut buf = [0u8; 4096];
				let n = socket.read(&mut buf).await.unwrap_or(0);
				let request = String::from_utf8_lossy(&buf[..n]);
				let path = request.lines().next().and_then(|l| l.split_whitespace().nth(1)).unwrap_or("/").trim_start_matches('/');

				let body = std::fs::read(dir.join(path));
				let _: Result<(), Infallible> = async {
					match body {
						Ok(bytes) => {
							let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", bytes.len());
							let _ = socket.write_all(response.as_bytes()).await;
							let _ = socket.write_all(&bytes).await;
						}
						Err(_) => {
							let _ = socket.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
						}
					}
					Ok(())
				}
				.await;
			});
		}
	});

	url::Url::parse(&format!("http://{addr}/")).unwrap()
}

#[tokio::test]
async fn add_by_identifier_then_remove() {
	let root = tempfile::tempdir().unwrap();
	let server_dir = tempfile::tempdir().unwrap();

	build_pack_archive(&server_dir.path().join("TheVendor.PackName.1.2.3.pack"), "TheVendor", "PackName", "1.2.3", &[]);
	let base_url = serve_dir(server_dir.path().to_path_buf()).await;

	let installation = Installation::new(root.path(), Config::default());
	layout::init(&installation).await.unwrap();

	let mut index = public::PublicIndex::default();
	index.entries.push(public::PdscEntry {
		vendor: "TheVendor".to_string(),
		name: "PackName".to_string(),
		url: base_url.to_string(),
		version: "1.2.3".to_string(),
		timestamp: "2024-01-01T00:00:00Z".to_string(),
	});
	public::write(&installation.public_index_path(), &index).await.unwrap();

	let installer = Installer::new(&installation).unwrap();
	let pack_ref: PackRef = "TheVendor::PackName@1.2.3".parse().unwrap();

	let pack_id = installer.add(&pack_ref, &(), &reporters::AutoAccept, false, false, false).await.unwrap();
	assert_eq!(pack_id.to_string(), "TheVendor.PackName.1.2.3");

	let install_dir = root.path().join("TheVendor/PackName/1.2.3");
	assert!(install_dir.join("TheVendor.PackName.pdsc").is_file());
	assert!(installation.download_dir().join("TheVendor.PackName.1.2.3.pack").is_file());

	// both index documents still parse after a mutating operation
	public::read(&installation.public_index_path()).await.unwrap();
	// a pure-identifier remote install is found again via the Public Index on
	// the next add/update, not recorded in the Local Repository.
	let local_index = local::read(&installation.local_index_path()).await.unwrap();
	assert!(local_index.find("TheVendor", "PackName").is_none());

	let removed = installer.remove("TheVendor", "PackName", None, false).await.unwrap();
	assert_eq!(removed.len(), 1);
	assert!(!install_dir.exists());

	let removed_again = installer.remove("TheVendor", "PackName", None, false).await;
	assert!(matches!(removed_again, Err(cpackget::installer::errors::RemoveError::PackNotInstalled { .. })));
}

#[tokio::test]
async fn add_installs_declared_dependency() {
	let root = tempfile::tempdir().unwrap();
	let server_dir = tempfile::tempdir().unwrap();

	build_pack_archive(&server_dir.path().join("TheVendor.Needs.1.0.0.pack"), "TheVendor", "Needs", "1.0.0", &[("TheVendor", "Base")]);
	build_pack_archive(&server_dir.path().join("TheVendor.Base.2.0.0.pack"), "TheVendor", "Base", "2.0.0", &[]);
	let base_url = serve_dir(server_dir.path().to_path_buf()).await;

	let installation = Installation::new(root.path(), Config::default());
	layout::init(&installation).await.unwrap();

	let mut index = public::PublicIndex::default();
	for (name, version) in [("Needs", "1.0.0"), ("Base", "2.0.0")] {
		index.entries.push(public::PdscEntry {
			vendor: "TheVendor".to_string(),
			name: name.to_string(),
			url: base_url.to_string(),
			version: version.to_string(),
			timestamp: "2024-01-01T00:00:00Z".to_string(),
		});
	}
	public::write(&installation.public_index_path(), &index).await.unwrap();

	let installer = Installer::new(&installation).unwrap();
	let pack_ref: PackRef = "TheVendor::Needs@1.0.0".parse().unwrap();
	installer.add(&pack_ref, &(), &reporters::AutoAccept, false, false, false).await.unwrap();

	let installed = layout::installed_packs(installation.root()).await.unwrap();
	assert!(installed.iter().any(|id| id.vendor() == "TheVendor" && id.name() == "Needs"));
	assert!(
		installed.iter().any(|id| id.vendor() == "TheVendor" && id.name() == "Base"),
		"transitive dependency should have been installed too"
	);
}

#[tokio::test]
async fn remove_missing_pack_reports_pack_not_installed() {
	let root = tempfile::tempdir().unwrap();
	let installation = Installation::new(root.path(), Config::default());
	layout::init(&installation).await.unwrap();

	let installer = Installer::new(&installation).unwrap();
	let removed = installer.remove("Unknown", "Pack", None, false).await;
	assert!(matches!(removed, Err(cpackget::installer::errors::RemoveError::PackNotInstalled { .. })));
}
