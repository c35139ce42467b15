// hs3-api: Async Rust client for the HomeSeer HS3 JSON API and ASCII event socket

pub mod ascii;
pub mod error;
pub mod json;
pub mod models;
pub mod transport;

pub use ascii::{
    AsciiListener, AsciiMessage, DEFAULT_ASCII_PORT, ListenerConfig, ListenerEvent, ListenerState,
    ListenerTimings,
};
pub use error::Error;
pub use json::{DEFAULT_HTTP_PORT, JsonClient};
pub use models::{
    ControlPair, ControlRecord, DeviceRecord, DeviceRef, DeviceValue, EventRecord, InvalidValue,
};
pub use transport::{DEFAULT_HTTP_TIMEOUT, TransportConfig};
