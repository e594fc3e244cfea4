use std::sync::Arc;

use display_model::{ConfigId, DisplayConfiguration, DisplaySettingsFields, PhotoDescriptor};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::sequencer::Sequencer;
use crate::settings::SettingsManager;

/// Operations offered to the display client and the admin surface.
///
/// Photo reads take an optional configuration id; `None` means whichever
/// configuration is active at the time of the call. The configuration stays
/// leased until the read finishes, so admin changes to it wait.
#[derive(Clone)]
pub struct DisplayService {
    settings: Arc<SettingsManager>,
    sequencer: Arc<Sequencer>,
}

impl DisplayService {
    pub fn new(settings: Arc<SettingsManager>, sequencer: Arc<Sequencer>) -> Self {
        Self {
            settings,
            sequencer,
        }
    }

    pub fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    pub async fn get_active_settings(&self) -> Result<DisplayConfiguration> {
        self.settings.active().await
    }

    pub async fn get_all_settings(&self) -> Vec<DisplayConfiguration> {
        self.settings.all().await
    }

    pub async fn get_settings_by_id(&self, id: ConfigId) -> Result<DisplayConfiguration> {
        self.settings.get(id).await
    }

    pub async fn create_settings(
        &self,
        fields: &DisplaySettingsFields,
    ) -> Result<DisplayConfiguration> {
        self.settings.create(fields).await
    }

    pub async fn update_settings(
        &self,
        id: ConfigId,
        fields: &DisplaySettingsFields,
    ) -> Result<DisplayConfiguration> {
        self.settings.update(id, fields).await
    }

    pub async fn delete_settings(&self, id: ConfigId) -> Result<()> {
        self.settings.delete(id).await
    }

    pub async fn activate_settings(&self, id: ConfigId) -> Result<DisplayConfiguration> {
        self.settings.activate(id).await
    }

    pub async fn get_next_photo(
        &self,
        config_id: Option<ConfigId>,
        cancel: &CancellationToken,
    ) -> Result<Option<PhotoDescriptor>> {
        let config = self.settings.lease(config_id).await?;
        self.sequencer.next(&config, cancel).await
    }

    pub async fn get_current_photo(
        &self,
        config_id: Option<ConfigId>,
        cancel: &CancellationToken,
    ) -> Result<Option<PhotoDescriptor>> {
        let config = self.settings.lease(config_id).await?;
        self.sequencer.current(&config, cancel).await
    }

    pub async fn get_preload_photos(
        &self,
        count: usize,
        config_id: Option<ConfigId>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PhotoDescriptor>> {
        let config = self.settings.lease(config_id).await?;
        self.sequencer.preload(&config, count, cancel).await
    }

    pub async fn get_photo_count(
        &self,
        config_id: Option<ConfigId>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let config = self.settings.lease(config_id).await?;
        self.sequencer.count(&config, cancel).await
    }

    pub async fn reset_sequence(&self, config_id: Option<ConfigId>) -> Result<ConfigId> {
        let config = self.settings.lease(config_id).await?;
        self.sequencer.reset(config.id).await;
        Ok(config.id)
    }
}
