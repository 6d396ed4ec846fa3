// ── Domain model ──
//
// Hub-level types come straight from plantwatch-api; the sensor types
// are what a refresh pass publishes.

pub mod sensor;

pub use plantwatch_api::{Device, DeviceAttribute, DeviceId};
pub use sensor::{MoistureSensor, MoistureStatus};
