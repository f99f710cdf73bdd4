//! Model and data package acquisition.
//!
//! Packages are gzip tarballs fetched from a release base URL and cached
//! under the packages directory. `resolve` returns the local directory,
//! downloading and unpacking on first use only.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://packages.sauti.dev/v1";

pub struct PackageResolver {
    packages_dir: PathBuf,
    base_url: String,
    client: reqwest::Client,
}

impl PackageResolver {
    pub fn new(packages_dir: impl Into<PathBuf>) -> Self {
        Self {
            packages_dir: packages_dir.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Default cache location under the platform data directory.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sauti")
            .join("packages")
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Names of packages already present in the cache.
    pub fn installed(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.packages_dir) {
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    if let Ok(name) = entry.file_name().into_string() {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        names
    }

    /// Resolve `name` to its local package directory, fetching it on a
    /// cache miss.
    pub async fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\', '.']) {
            return Err(Error::Package(format!("invalid package name '{name}'")));
        }

        let package_dir = self.packages_dir.join(name);
        if package_dir.is_dir() {
            debug!(package = name, "package already cached");
            return Ok(package_dir);
        }

        tokio::fs::create_dir_all(&self.packages_dir).await?;

        let url = format!("{}/{}.tar.gz", self.base_url, name);
        info!(package = name, url = %url, "downloading package");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Package(format!("download of '{name}' failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Package(format!(
                "download of '{name}' failed: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Package(format!("download of '{name}' failed: {e}")))?;

        let archive_path = self.packages_dir.join(format!("{name}.tar.gz.partial"));
        tokio::fs::write(&archive_path, &bytes).await?;

        let unpack_result = unpack_archive(&archive_path, &self.packages_dir).await;
        let _ = tokio::fs::remove_file(&archive_path).await;
        unpack_result?;

        if !package_dir.is_dir() {
            return Err(Error::Package(format!(
                "archive for '{name}' did not contain a '{name}' directory"
            )));
        }

        info!(package = name, "package installed");
        Ok(package_dir)
    }
}

/// Unpack a gzip tarball with the system `tar` executable.
async fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let status = tokio::process::Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .status()
        .await
        .map_err(|e| Error::Package(format!("failed to invoke tar: {e}")))?;

    if !status.success() {
        return Err(Error::Package(format!("tar exited with {status}")));
    }
    Ok(())
}
