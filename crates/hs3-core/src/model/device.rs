// ── Device domain type ──
//
// One controller device: identity, location, type, the control values it
// was constructed with, and its current value. The value is the only
// thing that changes after construction; every change is published to
// per-device subscribers.

use std::fmt;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use hs3_api::{ControlPair, DeviceRecord, DeviceRef, DeviceValue, JsonClient};

use super::zwave::DeviceKind;
use crate::error::CoreError;

const UPDATE_CHANNEL_SIZE: usize = 64;

// ── Control values ───────────────────────────────────────────────

/// A semantic control action a device may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ControlAction {
    On,
    Off,
    Lock,
    Unlock,
}

impl ControlAction {
    /// Map the controller's `ControlUse` code to an action.
    pub fn from_control_use(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::On),
            2 => Some(Self::Off),
            18 => Some(Self::Lock),
            19 => Some(Self::Unlock),
            _ => None,
        }
    }
}

/// Control values resolved once from a device's control pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlValues {
    pub on: Option<DeviceValue>,
    pub off: Option<DeviceValue>,
    pub lock: Option<DeviceValue>,
    pub unlock: Option<DeviceValue>,
}

impl ControlValues {
    /// Extract the known actions from `pairs`; unknown use codes are
    /// ignored and a later pair for the same action wins.
    pub fn from_pairs(pairs: &[ControlPair]) -> Self {
        let mut values = Self::default();
        for pair in pairs {
            let Some(action) = ControlAction::from_control_use(pair.control_use) else {
                continue;
            };
            let slot = match action {
                ControlAction::On => &mut values.on,
                ControlAction::Off => &mut values.off,
                ControlAction::Lock => &mut values.lock,
                ControlAction::Unlock => &mut values.unlock,
            };
            *slot = Some(pair.control_value);
        }
        values
    }

    pub fn get(&self, action: ControlAction) -> Option<DeviceValue> {
        match action {
            ControlAction::On => self.on,
            ControlAction::Off => self.off,
            ControlAction::Lock => self.lock,
            ControlAction::Unlock => self.unlock,
        }
    }
}

// ── Updates ──────────────────────────────────────────────────────

/// Why an update was published outside the normal change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum UpdateReason {
    /// Value re-read from a full refresh after the listener reconnected.
    Reconnected,
    /// The listener lost its session; the value may be stale.
    Disconnected,
}

/// A value change published to a device's subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceUpdate {
    pub reference: DeviceRef,
    /// The device's value after the update.
    pub value: DeviceValue,
    /// `None` for a live change from the event socket or a plain refresh.
    pub reason: Option<UpdateReason>,
}

/// Receiving side of [`Device::subscribe`].
pub struct DeviceSubscription {
    rx: broadcast::Receiver<DeviceUpdate>,
    suppress_on_reconnect: bool,
}

impl DeviceSubscription {
    /// Wait for the next update this subscriber should see.
    ///
    /// With `suppress_on_reconnect`, updates carrying a reason are
    /// skipped. Returns `None` once the device is dropped.
    pub async fn recv(&mut self) -> Option<DeviceUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) if self.suppress_on_reconnect && update.reason.is_some() => {}
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "device subscriber lagged, updates dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn suppresses_on_reconnect(&self) -> bool {
        self.suppress_on_reconnect
    }
}

// ── Device ───────────────────────────────────────────────────────

/// A supported controller device.
///
/// Shared as `Arc<Device>` between the registry and callers. Category
/// behavior is reached through the typed views (`as_switch()`,
/// `as_dimmer()`, ...) which borrow the device.
pub struct Device {
    reference: DeviceRef,
    name: String,
    location: String,
    location2: String,
    device_type: String,
    kind: DeviceKind,
    controls: ControlValues,
    value: watch::Sender<DeviceValue>,
    updates: broadcast::Sender<DeviceUpdate>,
    client: JsonClient,
}

impl Device {
    pub(crate) fn new(
        record: DeviceRecord,
        kind: DeviceKind,
        controls: ControlValues,
        client: JsonClient,
    ) -> Self {
        let (value, _) = watch::channel(record.value);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        Self {
            reference: record.reference,
            name: record.name,
            location: record.location,
            location2: record.location2,
            device_type: record.device_type_string,
            kind,
            controls,
            value,
            updates,
            client,
        }
    }

    pub fn reference(&self) -> DeviceRef {
        self.reference
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn location2(&self) -> &str {
        &self.location2
    }

    /// The controller's type string, e.g. `Z-Wave Switch`.
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn controls(&self) -> &ControlValues {
        &self.controls
    }

    /// Current value.
    pub fn value(&self) -> DeviceValue {
        *self.value.borrow()
    }

    /// Watch the current value without reason filtering.
    pub fn watch_value(&self) -> watch::Receiver<DeviceValue> {
        self.value.subscribe()
    }

    /// Register for value updates.
    ///
    /// A subscriber created with `suppress_on_reconnect` does not see the
    /// updates published across a listener disconnect/reconnect.
    pub fn subscribe(&self, suppress_on_reconnect: bool) -> DeviceSubscription {
        DeviceSubscription {
            rx: self.updates.subscribe(),
            suppress_on_reconnect,
        }
    }

    /// Store `value` (if any) and notify subscribers.
    ///
    /// A `None` value only publishes the reason, as done when the
    /// listener disconnects.
    pub fn update_value(&self, value: Option<DeviceValue>, reason: Option<UpdateReason>) {
        if let Some(value) = value {
            self.value.send_replace(value);
        }
        let update = DeviceUpdate {
            reference: self.reference,
            value: self.value(),
            reason,
        };
        // No receivers is the common case.
        let _ = self.updates.send(update);
    }

    // ── Control ──────────────────────────────────────────────────

    /// Issue the control value registered for `action`.
    pub async fn control(&self, action: ControlAction) -> Result<(), CoreError> {
        let value = self
            .controls
            .get(action)
            .ok_or(CoreError::ControlValueMissing {
                reference: self.reference,
                control: action,
            })?;
        self.control_by_value(value).await
    }

    /// Set the device to a raw value.
    pub async fn control_by_value(&self, value: DeviceValue) -> Result<(), CoreError> {
        debug!(reference = self.reference, %value, "device control");
        self.client
            .control_device_by_value(self.reference, value)
            .await
            .map(|_| ())
            .ok_or(CoreError::RequestFailed {
                request: "controldevicebyvalue",
            })
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("reference", &self.reference)
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .field("value", &self.value())
            .field("controls", &self.controls)
            .finish_non_exhaustive()
    }
}
