// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted controller configuration (`controller.json`).

use crate::atomic;
use crate::error::StorageError;
use crate::paths::StateLayout;
use cm_core::{AgentId, AutonomousMode, MonitoringId, SessionId};
use serde::{Deserialize, Serialize};

/// Identity and session of the controller agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerAgentConfig {
    pub agent_id: AgentId,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_id: Option<MonitoringId>,
}

/// The full controller record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ControllerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_config: Option<ControllerAgentConfig>,
    #[serde(default)]
    pub autonomous_mode: AutonomousMode,
}

/// Store for the controller record.
pub struct ControllerStore {
    layout: StateLayout,
}

impl ControllerStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    /// Load the record; a missing file is the default record.
    pub fn load(&self) -> Result<ControllerConfig, StorageError> {
        Ok(atomic::read_json(&self.layout.controller_file())?.unwrap_or_default())
    }

    pub fn save(&self, config: &ControllerConfig) -> Result<(), StorageError> {
        atomic::write_json(&self.layout.controller_file(), config)
    }

    /// Persist only the autonomous-mode flag.
    pub fn set_autonomous_mode(&self, mode: AutonomousMode) -> Result<(), StorageError> {
        let mut config = self.load()?;
        config.autonomous_mode = mode;
        self.save(&config)
    }

    /// Persist the controller's captured session identity.
    pub fn set_controller_session(
        &self,
        session_id: SessionId,
        monitoring_id: Option<MonitoringId>,
    ) -> Result<(), StorageError> {
        let mut config = self.load()?;
        if let Some(controller) = config.controller_config.as_mut() {
            controller.session_id = Some(session_id);
            if monitoring_id.is_some() {
                controller.monitoring_id = monitoring_id;
            }
            self.save(&config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "controller_store_tests.rs"]
mod tests;
