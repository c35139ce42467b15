// ── Domain model ──
//
// Devices and events as callers see them. Wire records from hs3-api are
// turned into these once, at snapshot time.

pub mod device;
pub mod event;
pub mod zwave;

pub use device::{
    ControlAction, ControlValues, Device, DeviceSubscription, DeviceUpdate, UpdateReason,
};
pub use event::Event;
pub use zwave::{
    BarrierOperator, BarrierState, DeviceKind, DeviceVariant, Dimmer, DoorLock, Switch,
    zwave_device,
};
