use crate::catalog::CatalogConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub image_viewing_time_ms: u64,
    pub inter_trial_interval_ms: u64,
    /// "Ready" pause between loading and the first trial prompt
    pub ready_delay_ms: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            image_viewing_time_ms: 10_000,
            inter_trial_interval_ms: 250,
            ready_delay_ms: 500,
        }
    }
}

impl ExperimentConfig {
    /// Applies overrides carried by the stimulus catalog
    pub fn with_catalog(mut self, catalog: &CatalogConfig) -> Self {
        if let Some(ms) = catalog.image_viewing_time {
            self.image_viewing_time_ms = ms;
        }
        self
    }

    pub fn viewing_time(&self) -> Duration {
        Duration::from_millis(self.image_viewing_time_ms)
    }

    pub fn inter_trial_interval(&self) -> Duration {
        Duration::from_millis(self.inter_trial_interval_ms)
    }

    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }
}
