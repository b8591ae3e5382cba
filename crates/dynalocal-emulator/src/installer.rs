//! ---
//! dl_section: "03-emulator"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Locating and installing the DynamoDB Local distribution."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::fs::File;
use std::path::{Path, PathBuf};

use dynalocal_common::InstallerConfig;
use flate2::read::GzDecoder;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::LaunchError;

pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://s3.us-west-2.amazonaws.com/dynamodb-local/dynamodb_local_latest.tar.gz";
pub const JAR_NAME: &str = "DynamoDBLocal.jar";
pub const LIB_DIR: &str = "DynamoDBLocal_lib";
const ARCHIVE_NAME: &str = "dynamodb_local_latest.tar.gz";

/// Where the emulator lives and how it is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerSettings {
    pub install_path: PathBuf,
    pub download_url: String,
    pub java_path: PathBuf,
    pub java_opts: Vec<String>,
    /// Inherit the emulator's stdout/stderr instead of discarding them.
    pub verbose: bool,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            install_path: std::env::temp_dir().join("dynamodb-local"),
            download_url: DEFAULT_DOWNLOAD_URL.to_owned(),
            java_path: PathBuf::from("java"),
            java_opts: Vec::new(),
            verbose: false,
        }
    }
}

impl InstallerSettings {
    /// Layer user overrides on top of the current settings.
    pub fn apply(&mut self, overrides: &InstallerConfig) {
        if let Some(path) = &overrides.install_path {
            self.install_path = path.clone();
        }
        if let Some(url) = &overrides.download_url {
            self.download_url = url.clone();
        }
        if let Some(java) = &overrides.java_path {
            self.java_path = java.clone();
        }
        if !overrides.java_opts.is_empty() {
            self.java_opts = overrides.java_opts.clone();
        }
        self.verbose = overrides.verbose;
    }

    pub fn jar_path(&self) -> PathBuf {
        self.install_path.join(JAR_NAME)
    }

    pub fn lib_path(&self) -> PathBuf {
        self.install_path.join(LIB_DIR)
    }
}

/// Make sure the emulator jar is present, downloading and unpacking it if needed.
pub async fn ensure_installed(settings: &InstallerSettings) -> Result<(), LaunchError> {
    let jar = settings.jar_path();
    if jar.is_file() {
        debug!(jar = %jar.display(), "emulator already installed");
        return Ok(());
    }

    let dir = &settings.install_path;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| LaunchError::Install {
            path: dir.clone(),
            reason: err.to_string(),
        })?;

    let archive = dir.join(ARCHIVE_NAME);
    info!(url = %settings.download_url, dir = %dir.display(), "installing dynamodb local");
    download(&settings.download_url, &archive).await?;
    extract(&archive, dir).await?;

    if let Err(err) = tokio::fs::remove_file(&archive).await {
        warn!(archive = %archive.display(), error = %err, "unable to remove downloaded archive");
    }

    if !jar.is_file() {
        return Err(LaunchError::Install {
            path: dir.clone(),
            reason: format!("archive did not contain {JAR_NAME}"),
        });
    }
    Ok(())
}

async fn download(url: &str, destination: &Path) -> Result<(), LaunchError> {
    let failed = |reason: String| LaunchError::Download {
        url: url.to_owned(),
        reason,
    };
    let mut response = reqwest::get(url)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| failed(err.to_string()))?;
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|err| failed(format!("creating {}: {err}", destination.display())))?;

    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await.map_err(|err| failed(err.to_string()))? {
        file.write_all(&chunk)
            .await
            .map_err(|err| failed(format!("writing {}: {err}", destination.display())))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|err| failed(format!("writing {}: {err}", destination.display())))?;
    debug!(bytes = written, archive = %destination.display(), "archive downloaded");
    Ok(())
}

async fn extract(archive: &Path, into: &Path) -> Result<(), LaunchError> {
    let failed = |reason: String| LaunchError::Extract {
        archive: archive.to_path_buf(),
        reason,
    };
    let (source, target) = (archive.to_path_buf(), into.to_path_buf());
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tarball = tar::Archive::new(GzDecoder::new(File::open(&source)?));
        tarball.unpack(&target)
    })
    .await
    .map_err(|err| failed(format!("unpack task aborted: {err}")))?
    .map_err(|err| failed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn overrides_replace_defaults() {
        let mut settings = InstallerSettings::default();
        settings.apply(&InstallerConfig {
            install_path: Some(PathBuf::from("/opt/ddb")),
            java_opts: vec!["-Xmx128m".into()],
            verbose: true,
            ..InstallerConfig::default()
        });
        assert_eq!(settings.jar_path(), PathBuf::from("/opt/ddb/DynamoDBLocal.jar"));
        assert_eq!(settings.lib_path(), PathBuf::from("/opt/ddb/DynamoDBLocal_lib"));
        assert_eq!(settings.download_url, DEFAULT_DOWNLOAD_URL);
        assert_eq!(settings.java_path, PathBuf::from("java"));
        assert!(settings.verbose);
    }

    #[tokio::test]
    async fn existing_jar_skips_download() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(JAR_NAME), b"").unwrap();
        let settings = InstallerSettings {
            install_path: dir.path().to_path_buf(),
            download_url: "http://127.0.0.1:9/never-fetched.tar.gz".into(),
            ..InstallerSettings::default()
        };
        ensure_installed(&settings).await.unwrap();
    }

    fn write_distribution(path: &Path) {
        let encoder = flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in [(JAR_NAME, &b"jar"[..]), ("DynamoDBLocal_lib/libsqlite4java.so", &b"lib"[..])] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    /// Serves `body` once over plain HTTP and returns its URL.
    async fn serve_once(body: Vec<u8>) -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/gzip\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{address}/{ARCHIVE_NAME}")
    }

    #[tokio::test]
    async fn archive_unpacks_into_install_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join(ARCHIVE_NAME);
        write_distribution(&archive);
        let target = dir.path().join("ddb");
        std::fs::create_dir_all(&target).unwrap();

        extract(&archive, &target).await.unwrap();

        assert_eq!(std::fs::read(target.join(JAR_NAME)).unwrap(), b"jar");
        assert!(target.join(LIB_DIR).join("libsqlite4java.so").is_file());
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_extract_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join(ARCHIVE_NAME);
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract(&archive, dir.path()).await.unwrap_err();
        assert!(matches!(err, LaunchError::Extract { .. }), "unexpected {err}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_jar_is_downloaded_and_installed() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staged.tar.gz");
        write_distribution(&staged);
        let url = serve_once(std::fs::read(&staged).unwrap()).await;
        let settings = InstallerSettings {
            install_path: dir.path().join("ddb"),
            download_url: url,
            ..InstallerSettings::default()
        };

        ensure_installed(&settings).await.unwrap();

        assert!(settings.jar_path().is_file());
        assert!(settings.lib_path().is_dir());
        assert!(!settings.install_path.join(ARCHIVE_NAME).exists(), "archive is removed after unpacking");
    }

    #[tokio::test]
    async fn unreachable_download_is_reported() {
        let dir = tempdir().unwrap();
        let settings = InstallerSettings {
            install_path: dir.path().join("ddb"),
            download_url: "http://127.0.0.1:9/missing.tar.gz".into(),
            ..InstallerSettings::default()
        };
        let err = ensure_installed(&settings).await.unwrap_err();
        assert!(matches!(err, LaunchError::Download { .. }), "unexpected {err}");
    }
}
