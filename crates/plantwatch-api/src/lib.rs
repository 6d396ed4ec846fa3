// plantwatch-api: Async client for the Hubitat Maker API (device list + device detail)

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{API_PATH, HubClient};
pub use error::Error;
pub use models::{Device, DeviceAttribute, DeviceId};
pub use transport::TransportConfig;
