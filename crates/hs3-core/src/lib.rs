// hs3-core: Device model, registry, and controller facade over hs3-api.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, DEFAULT_PASSWORD, DEFAULT_USERNAME};
pub use controller::Controller;
pub use error::CoreError;
pub use store::DeviceRegistry;

pub use model::{
    BarrierOperator, BarrierState, ControlAction, ControlValues, Device, DeviceKind,
    DeviceSubscription, DeviceUpdate, DeviceVariant, Dimmer, DoorLock, Event, Switch,
    UpdateReason,
};

// Wire types that appear in the public API.
pub use hs3_api::{DeviceRef, DeviceValue, ListenerState, ListenerTimings};
