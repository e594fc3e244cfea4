use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Address the HTTP server listens on.
    pub bind_address: SocketAddr,
    /// Externally reachable base URL, used for the admin QR code.
    pub public_url: Option<String>,
    /// YAML photo catalog backing album/tag/all queries.
    pub catalog_path: PathBuf,
    /// Where display configurations are stored. In-memory only when unset.
    pub settings_path: Option<PathBuf>,
    /// Reload the catalog when the file changes on disk.
    pub watch_catalog: bool,
    /// Deterministic seed for shuffle order.
    pub shuffle_seed: Option<u64>,
    /// Upper bound on `count` accepted by the preload endpoint.
    pub preload_limit: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_url: None,
            catalog_path: PathBuf::from("catalog.yaml"),
            settings_path: None,
            watch_catalog: true,
            shuffle_seed: None,
            preload_limit: 16,
        }
    }
}

impl Configuration {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&s)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.preload_limit > 0,
            "preload-limit must be greater than zero"
        );
        ensure!(
            !self.catalog_path.as_os_str().is_empty(),
            "catalog-path must not be empty"
        );
        if let Some(path) = &self.settings_path {
            ensure!(
                path.file_name().is_some(),
                "settings-path must include a file name"
            );
        }
        if let Some(url) = &self.public_url {
            ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "public-url must start with http:// or https://"
            );
        }
        Ok(self)
    }
}
