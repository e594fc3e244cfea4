use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use display_model::DisplayConfiguration;
use tokio::fs;

/// YAML file holding the list of display configurations.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every stored configuration. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<DisplayConfiguration>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read display settings {}", self.path.display())
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse display settings {}", self.path.display()))
    }

    /// Replaces the file contents through a sibling temp file and a rename.
    pub async fn save(&self, configs: &[DisplayConfiguration]) -> Result<()> {
        let content =
            serde_yaml::to_string(configs).context("failed to serialize display settings")?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty_and_save_round_trips() {
        let tmp = tempdir().unwrap();
        let file = SettingsFile::new(tmp.path().join("nested").join("settings.yaml"));
        assert!(file.load().await.unwrap().is_empty());

        let mut cfg = DisplayConfiguration::with_defaults(1);
        cfg.is_active = true;
        cfg.name = "Den".into();
        file.save(std::slice::from_ref(&cfg)).await.unwrap();

        assert_eq!(file.load().await.unwrap(), vec![cfg]);
        assert!(!file.path().with_extension("yaml.tmp").exists());
    }
}
