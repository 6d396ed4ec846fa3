//! Shared helpers for command handlers.

use plantwatch_core::{Coordinator, DeviceId, MoistureSensor};

use crate::error::CliError;

/// Look a sensor up in the most recently published snapshot.
pub fn find_sensor(coordinator: &Coordinator, id: DeviceId) -> Result<MoistureSensor, CliError> {
    coordinator
        .current_sensors()
        .iter()
        .find(|sensor| sensor.id == id)
        .cloned()
        .ok_or(CliError::SensorNotFound { id: id.get() })
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
