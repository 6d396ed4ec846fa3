//! Moisture classification and polling refresh engine.
//!
//! Sits between `plantwatch-api` and a presentation layer (the CLI):
//!
//! - **[`Coordinator`]**: owns the current sensor set, drives periodic and
//!   manual refreshes with at-most-one pass in flight, and publishes a
//!   [`StatusSnapshot`] per completed pass through a `watch` channel and
//!   registered callbacks.
//!
//! - **Classifier** ([`classify`]): pure functions mapping hub devices and
//!   attributes to [`MoistureSensor`] records, plus the batch fetch that
//!   contains per-device failures.
//!
//! - **[`SettingsStore`]**: the persistence seam. The core reads settings and
//!   the access token through it at the start of every operation and never
//!   touches disk itself; `plantwatch-config` provides the file/keyring
//!   implementation.

pub mod classify;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod settings;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::{DeviceFailure, SensorBatch};
pub use coordinator::{Coordinator, RefreshOutcome, RefreshState, StatusSnapshot};
pub use error::{CoreError, ErrorKind};
pub use model::{Device, DeviceAttribute, DeviceId, MoistureSensor, MoistureStatus};
pub use settings::{MemorySettingsStore, Settings, SettingsStore};

// Hub client types needed to construct a `Coordinator`.
pub use plantwatch_api::{HubClient, TransportConfig};
