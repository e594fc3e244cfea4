//! Display configuration manager.
//!
//! Owns the set of named display configurations and keeps two invariants:
//! at least one configuration exists, and exactly one of them is active.
//! Every mutation is staged on a copy, persisted, and only then committed, so
//! a rejected or failed change leaves the visible set untouched. Any change to
//! a configuration resets its in-flight sequence.

use std::ops::Deref;
use std::sync::Arc;

use display_model::{ConfigId, DisplayConfiguration, DisplaySettingsFields};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::error::{DisplayError, Result};
use crate::sequencer::Sequencer;
use crate::settings_file::SettingsFile;

/// A configuration held under the read lock.
///
/// While a lease is alive the configuration cannot be updated, activated or
/// deleted, so sequence state is never committed for a configuration that
/// is already gone.
pub struct ConfigLease<'a> {
    _configs: RwLockReadGuard<'a, Vec<DisplayConfiguration>>,
    config: DisplayConfiguration,
}

impl Deref for ConfigLease<'_> {
    type Target = DisplayConfiguration;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

pub struct SettingsManager {
    configs: RwLock<Vec<DisplayConfiguration>>,
    file: Option<SettingsFile>,
    sequencer: Arc<Sequencer>,
}

impl SettingsManager {
    /// Loads stored configurations, repairing the active flag if needed.
    pub async fn load(file: Option<SettingsFile>, sequencer: Arc<Sequencer>) -> Result<Self> {
        let stored = match &file {
            Some(file) => file.load().await.map_err(DisplayError::Persistence)?,
            None => Vec::new(),
        };
        let (configs, healed) = heal(stored);
        let manager = Self {
            configs: RwLock::new(Vec::new()),
            file,
            sequencer,
        };
        if healed {
            manager.persist(&configs).await?;
        }
        info!(
            configurations = configs.len(),
            active = active_id(&configs),
            "display settings loaded"
        );
        *manager.configs.write().await = configs;
        Ok(manager)
    }

    pub async fn all(&self) -> Vec<DisplayConfiguration> {
        self.configs.read().await.clone()
    }

    pub async fn get(&self, id: ConfigId) -> Result<DisplayConfiguration> {
        self.configs
            .read()
            .await
            .iter()
            .find(|cfg| cfg.id == id)
            .cloned()
            .ok_or(DisplayError::NotFound(id))
    }

    /// The active configuration, creating or promoting one if the set is corrupted.
    pub async fn active(&self) -> Result<DisplayConfiguration> {
        if let Some(active) = self.configs.read().await.iter().find(|cfg| cfg.is_active) {
            return Ok(active.clone());
        }
        let mut configs = self.configs.write().await;
        let (next, healed) = heal(configs.clone());
        if healed {
            warn!("no active display configuration; repaired");
            self.persist(&next).await?;
            *configs = next;
        }
        configs
            .iter()
            .find(|cfg| cfg.is_active)
            .cloned()
            .ok_or(DisplayError::NotFound(0))
    }

    /// Leases configuration `id`, or the active one when `id` is `None`.
    pub async fn lease(&self, id: Option<ConfigId>) -> Result<ConfigLease<'_>> {
        if let Some(lease) = self.try_lease(id).await? {
            return Ok(lease);
        }
        // Only reachable without an active entry; repair and look again.
        self.active().await?;
        self.try_lease(id).await?.ok_or(DisplayError::NotFound(0))
    }

    async fn try_lease(&self, id: Option<ConfigId>) -> Result<Option<ConfigLease<'_>>> {
        let configs = self.configs.read().await;
        let found = match id {
            Some(id) => Some(configs[position(&configs, id)?].clone()),
            None => configs.iter().find(|cfg| cfg.is_active).cloned(),
        };
        Ok(found.map(|config| ConfigLease {
            _configs: configs,
            config,
        }))
    }

    pub async fn create(&self, fields: &DisplaySettingsFields) -> Result<DisplayConfiguration> {
        let mut configs = self.configs.write().await;
        let id = configs.iter().map(|cfg| cfg.id).max().unwrap_or(0) + 1;
        let mut created = DisplayConfiguration::from_fields(id, fields)?;
        created.is_active = configs.is_empty();

        let mut next = configs.clone();
        next.push(created.clone());
        self.persist(&next).await?;
        *configs = next;
        info!(config_id = id, name = %created.name, "display configuration created");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: ConfigId,
        fields: &DisplaySettingsFields,
    ) -> Result<DisplayConfiguration> {
        let mut configs = self.configs.write().await;
        let pos = position(&configs, id)?;
        let updated = configs[pos].merged(fields)?;

        let mut next = configs.clone();
        next[pos] = updated.clone();
        self.persist(&next).await?;
        *configs = next;
        self.sequencer.reset(id).await;
        info!(config_id = id, "display configuration updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: ConfigId) -> Result<()> {
        let mut configs = self.configs.write().await;
        let pos = position(&configs, id)?;
        if configs.len() == 1 {
            return Err(DisplayError::CannotDeleteLast);
        }

        let mut next = configs.clone();
        let removed = next.remove(pos);
        let promoted = if removed.is_active {
            next.first_mut().map(|cfg| {
                cfg.is_active = true;
                cfg.id
            })
        } else {
            None
        };
        self.persist(&next).await?;
        *configs = next;
        self.sequencer.forget(id).await;
        if let Some(promoted) = promoted {
            self.sequencer.reset(promoted).await;
            info!(config_id = id, promoted, "active display configuration deleted");
        } else {
            info!(config_id = id, "display configuration deleted");
        }
        Ok(())
    }

    pub async fn activate(&self, id: ConfigId) -> Result<DisplayConfiguration> {
        let mut configs = self.configs.write().await;
        let pos = position(&configs, id)?;

        let mut next = configs.clone();
        for cfg in &mut next {
            cfg.is_active = cfg.id == id;
        }
        let activated = next[pos].clone();
        self.persist(&next).await?;
        *configs = next;
        self.sequencer.reset(id).await;
        info!(config_id = id, "display configuration activated");
        Ok(activated)
    }

    async fn persist(&self, configs: &[DisplayConfiguration]) -> Result<()> {
        match &self.file {
            Some(file) => file.save(configs).await.map_err(DisplayError::Persistence),
            None => Ok(()),
        }
    }
}

fn position(configs: &[DisplayConfiguration], id: ConfigId) -> Result<usize> {
    configs
        .iter()
        .position(|cfg| cfg.id == id)
        .ok_or(DisplayError::NotFound(id))
}

fn active_id(configs: &[DisplayConfiguration]) -> Option<ConfigId> {
    configs.iter().find(|cfg| cfg.is_active).map(|cfg| cfg.id)
}

/// Sorts by id, drops duplicate ids, and enforces "one exists, exactly one active".
fn heal(mut configs: Vec<DisplayConfiguration>) -> (Vec<DisplayConfiguration>, bool) {
    let mut healed = false;
    let before = configs.len();
    configs.sort_by_key(|cfg| cfg.id);
    configs.dedup_by_key(|cfg| cfg.id);
    if configs.len() != before {
        healed = true;
    }
    if configs.is_empty() {
        configs.push(DisplayConfiguration::with_defaults(1));
        healed = true;
    }
    let mut seen_active = false;
    for cfg in &mut configs {
        if cfg.is_active {
            if seen_active {
                cfg.is_active = false;
                healed = true;
            }
            seen_active = true;
        }
    }
    if !seen_active && let Some(first) = configs.first_mut() {
        first.is_active = true;
        healed = true;
    }
    (configs, healed)
}
