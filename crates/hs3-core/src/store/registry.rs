// ── Device registry ──
//
// Concurrent map from device reference to the shared `Device`. Reads
// never block writers of other shards; each device's value lives in its
// own watch channel, so concurrent updates resolve last-writer-wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use hs3_api::{DeviceRef, DeviceValue};

use crate::model::{Device, UpdateReason};

/// All supported devices of one controller.
pub struct DeviceRegistry {
    pub(crate) devices: DashMap<DeviceRef, Arc<Device>>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (last_full_refresh, _) = watch::channel(None);
        Self {
            devices: DashMap::new(),
            last_full_refresh,
        }
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn get(&self, reference: DeviceRef) -> Option<Arc<Device>> {
        self.devices.get(&reference).map(|d| Arc::clone(d.value()))
    }

    /// All devices, ordered by reference.
    pub fn snapshot(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<_> = self.devices.iter().map(|d| Arc::clone(d.value())).collect();
        devices.sort_by_key(|d| d.reference());
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    // ── Updates ──────────────────────────────────────────────────

    /// Apply one value change to a known device.
    ///
    /// Unknown references are dropped; returns whether a device matched.
    pub fn apply_value_update(
        &self,
        reference: DeviceRef,
        value: DeviceValue,
        reason: Option<UpdateReason>,
    ) -> bool {
        let Some(device) = self.get(reference) else {
            debug!(reference, %value, "update received for unsupported device");
            return false;
        };
        device.update_value(Some(value), reason);
        debug!(reference, name = device.name(), %value, "device updated");
        true
    }

    /// Publish a value-less `disconnected` update on every device.
    pub fn mark_disconnected(&self) {
        for device in self.snapshot() {
            device.update_value(None, Some(UpdateReason::Disconnected));
        }
    }

    // ── Metadata ─────────────────────────────────────────────────

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn subscribe_full_refresh(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_full_refresh.subscribe()
    }

    /// How long ago the last full snapshot was applied.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_full_refresh().map(|t| Utc::now() - t)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
