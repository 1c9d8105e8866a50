//! Component factory.

use crate::config::TuningConfig;

use super::CgroupRuntime;

/// Identifier the component registers under.
pub const COMPONENT_TYPE: &str = "cgroupruntime";

/// Builds [`CgroupRuntime`] components for a host process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Factory;

impl Factory {
    pub fn component_type(&self) -> &'static str {
        COMPONENT_TYPE
    }

    /// CPU and memory enabled, ratio 0.9, 5s metadata timeout.
    pub fn default_config(&self) -> TuningConfig {
        TuningConfig::default()
    }

    /// New component in the `Created` state. The configuration is checked
    /// on `validate`/`start`, not here.
    pub fn create(&self, config: TuningConfig) -> CgroupRuntime {
        CgroupRuntime::new(config)
    }
}
