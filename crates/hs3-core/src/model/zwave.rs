// ── Z-Wave device catalog ──
//
// The controller's type string selects a `DeviceKind`; the kind decides
// which category views a device offers. Views borrow the device and add
// only the behavior their category has.

use std::ops::Deref;

use tracing::debug;

use hs3_api::{ControlRecord, DeviceRecord, DeviceValue, JsonClient};

use super::device::{ControlAction, ControlValues, Device};
use crate::error::CoreError;

// ── DeviceKind ───────────────────────────────────────────────────

/// Supported device categories, keyed by the controller's type string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, strum::AsRefStr,
)]
pub enum DeviceKind {
    #[strum(serialize = "Z-Wave Barrier Operator")]
    BarrierOperator,
    #[strum(serialize = "Z-Wave Battery")]
    Battery,
    #[strum(serialize = "Z-Wave Central Scene")]
    CentralScene,
    #[strum(serialize = "Z-Wave Door Lock")]
    DoorLock,
    #[strum(serialize = "Z-Wave Fan State")]
    FanState,
    #[strum(serialize = "Z-Wave Luminance")]
    Luminance,
    #[strum(serialize = "Z-Wave Operating State")]
    OperatingState,
    #[strum(serialize = "Z-Wave Relative Humidity")]
    RelativeHumidity,
    #[strum(serialize = "Z-Wave Sensor Binary")]
    SensorBinary,
    #[strum(serialize = "Z-Wave Sensor Multilevel")]
    SensorMultilevel,
    #[strum(serialize = "Z-Wave Switch")]
    Switch,
    #[strum(serialize = "Z-Wave Switch Binary")]
    SwitchBinary,
    #[strum(serialize = "Z-Wave Switch Multilevel")]
    SwitchMultilevel,
    #[strum(serialize = "Z-Wave Temperature")]
    Temperature,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 14] = [
        Self::BarrierOperator,
        Self::Battery,
        Self::CentralScene,
        Self::DoorLock,
        Self::FanState,
        Self::Luminance,
        Self::OperatingState,
        Self::RelativeHumidity,
        Self::SensorBinary,
        Self::SensorMultilevel,
        Self::Switch,
        Self::SwitchBinary,
        Self::SwitchMultilevel,
        Self::Temperature,
    ];

    /// Look up a type string; `None` for unsupported types.
    pub fn from_type_string(device_type: &str) -> Option<Self> {
        device_type.parse().ok()
    }

    /// On/off capable (multilevel switches included).
    pub fn is_switch(self) -> bool {
        matches!(
            self,
            Self::Switch | Self::SwitchBinary | Self::SwitchMultilevel
        )
    }
}

// ── Construction ─────────────────────────────────────────────────

/// Build a device from its status record and the control dataset.
///
/// Returns `None` when the type string has no known kind; the caller
/// skips such devices. Control values come from the first control record
/// with the same reference.
pub fn zwave_device(
    record: DeviceRecord,
    control_data: &[ControlRecord],
    client: &JsonClient,
) -> Option<Device> {
    let Some(kind) = DeviceKind::from_type_string(&record.device_type_string) else {
        debug!(
            reference = record.reference,
            device_type = %record.device_type_string,
            "device type not supported"
        );
        return None;
    };

    let controls = control_data
        .iter()
        .find(|c| c.reference == record.reference)
        .map(|c| ControlValues::from_pairs(&c.control_pairs))
        .unwrap_or_default();

    Some(Device::new(record, kind, controls, client.clone()))
}

// ── Variant dispatch ─────────────────────────────────────────────

/// A device seen through its category's behavior.
#[derive(Debug, Clone, Copy)]
pub enum DeviceVariant<'a> {
    /// Read-only devices: sensors, battery, scene and state reporters.
    Sensor(&'a Device),
    Switch(Switch<'a>),
    Dimmer(Dimmer<'a>),
    DoorLock(DoorLock<'a>),
    BarrierOperator(BarrierOperator<'a>),
}

impl Device {
    pub fn variant(&self) -> DeviceVariant<'_> {
        match self.kind() {
            DeviceKind::SwitchMultilevel => DeviceVariant::Dimmer(Dimmer {
                switch: Switch(self),
            }),
            DeviceKind::Switch | DeviceKind::SwitchBinary => DeviceVariant::Switch(Switch(self)),
            DeviceKind::DoorLock => DeviceVariant::DoorLock(DoorLock(self)),
            DeviceKind::BarrierOperator => DeviceVariant::BarrierOperator(BarrierOperator(self)),
            DeviceKind::Battery
            | DeviceKind::CentralScene
            | DeviceKind::FanState
            | DeviceKind::Luminance
            | DeviceKind::OperatingState
            | DeviceKind::RelativeHumidity
            | DeviceKind::SensorBinary
            | DeviceKind::SensorMultilevel
            | DeviceKind::Temperature => DeviceVariant::Sensor(self),
        }
    }

    /// Switch view; also available on multilevel switches.
    pub fn as_switch(&self) -> Option<Switch<'_>> {
        self.kind().is_switch().then_some(Switch(self))
    }

    pub fn as_dimmer(&self) -> Option<Dimmer<'_>> {
        (self.kind() == DeviceKind::SwitchMultilevel).then_some(Dimmer {
            switch: Switch(self),
        })
    }

    pub fn as_door_lock(&self) -> Option<DoorLock<'_>> {
        (self.kind() == DeviceKind::DoorLock).then_some(DoorLock(self))
    }

    pub fn as_barrier_operator(&self) -> Option<BarrierOperator<'_>> {
        (self.kind() == DeviceKind::BarrierOperator).then_some(BarrierOperator(self))
    }
}

// ── Switch ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Switch<'a>(&'a Device);

impl<'a> Switch<'a> {
    pub fn device(&self) -> &'a Device {
        self.0
    }

    /// `value > off`. `None` if the device has no off value.
    pub fn is_on(&self) -> Option<bool> {
        let off = self.0.controls().off?;
        Some(self.0.value() > off)
    }

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.0.control(ControlAction::On).await
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.0.control(ControlAction::Off).await
    }
}

// ── Dimmer ───────────────────────────────────────────────────────

/// Multilevel switch. Derefs to [`Switch`] for on/off.
#[derive(Debug, Clone, Copy)]
pub struct Dimmer<'a> {
    switch: Switch<'a>,
}

impl<'a> Deref for Dimmer<'a> {
    type Target = Switch<'a>;

    fn deref(&self) -> &Self::Target {
        &self.switch
    }
}

impl Dimmer<'_> {
    /// Current level as a fraction of the on value.
    pub fn dim_percent(&self) -> Option<f64> {
        let on = self.device().controls().on?;
        Some(self.device().value().as_f64() / on.as_f64())
    }

    /// Dim to `percent` of the on value, rounded down.
    ///
    /// `percent` is passed through unchecked.
    pub async fn dim(&self, percent: u8) -> Result<(), CoreError> {
        let device = self.device();
        let on = device
            .controls()
            .on
            .ok_or(CoreError::ControlValueMissing {
                reference: device.reference(),
                control: ControlAction::On,
            })?;
        device.control_by_value(dim_value(on, percent)).await
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn dim_value(on: DeviceValue, percent: u8) -> DeviceValue {
    let level = (on.as_f64() * f64::from(percent) / 100.0).floor();
    DeviceValue::Integer(level as i64)
}

// ── Door lock ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct DoorLock<'a>(&'a Device);

impl<'a> DoorLock<'a> {
    pub fn device(&self) -> &'a Device {
        self.0
    }

    /// `value == lock`; never locked without a lock value.
    pub fn is_locked(&self) -> bool {
        self.0.controls().lock == Some(self.0.value())
    }

    pub async fn lock(&self) -> Result<(), CoreError> {
        self.0.control(ControlAction::Lock).await
    }

    pub async fn unlock(&self) -> Result<(), CoreError> {
        self.0.control(ControlAction::Unlock).await
    }
}

// ── Barrier operator ─────────────────────────────────────────────

/// Door-like status derived from a barrier operator's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum BarrierState {
    Closed,
    Closing,
    Opening,
    Open,
}

impl BarrierState {
    pub fn from_value(value: DeviceValue) -> Self {
        if value == DeviceValue::Integer(0) {
            Self::Closed
        } else if value == DeviceValue::Integer(252) {
            Self::Closing
        } else if value == DeviceValue::Integer(254) {
            Self::Opening
        } else {
            Self::Open
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BarrierOperator<'a>(&'a Device);

impl<'a> BarrierOperator<'a> {
    pub fn device(&self) -> &'a Device {
        self.0
    }

    pub fn current_state(&self) -> BarrierState {
        BarrierState::from_value(self.0.value())
    }

    /// Sends the on control value.
    pub async fn open(&self) -> Result<(), CoreError> {
        self.0.control(ControlAction::On).await
    }

    /// Sends the off control value.
    pub async fn close(&self) -> Result<(), CoreError> {
        self.0.control(ControlAction::Off).await
    }
}
