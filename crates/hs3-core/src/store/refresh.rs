// ── Snapshot application logic ──
//
// Applies full device listings from the control channel to the
// registry. The initial snapshot decides membership; later refreshes only
// move values.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use hs3_api::{ControlRecord, DeviceRecord, JsonClient};

use super::DeviceRegistry;
use crate::model::{UpdateReason, zwave_device};

impl DeviceRegistry {
    /// Populate from a full status listing joined with control metadata.
    ///
    /// Unsupported types are skipped. A reference that is already
    /// registered keeps its device (and its subscribers and control
    /// values); only the value is taken from the record. Returns the
    /// number of newly registered devices.
    pub fn upsert_from_snapshot(
        &self,
        records: Vec<DeviceRecord>,
        control_data: &[ControlRecord],
        client: &JsonClient,
    ) -> usize {
        let mut added = 0;
        for record in records {
            if let Some(existing) = self.get(record.reference) {
                existing.update_value(Some(record.value), None);
                continue;
            }
            if let Some(device) = zwave_device(record, control_data, client) {
                self.devices.insert(device.reference(), Arc::new(device));
                added += 1;
            }
        }

        self.last_full_refresh.send_replace(Some(Utc::now()));
        debug!(added, total = self.len(), "device snapshot applied");
        added
    }

    /// Apply each record's value to the registered device.
    ///
    /// Membership is unchanged; records for unknown references are
    /// dropped one by one. Returns the number of devices updated.
    pub fn apply_full_refresh(&self, records: &[DeviceRecord], reason: Option<UpdateReason>) -> usize {
        let mut applied = 0;
        for record in records {
            let Some(device) = self.get(record.reference) else {
                debug!(
                    reference = record.reference,
                    device_type = %record.device_type_string,
                    "refresh data for unsupported device"
                );
                continue;
            };
            device.update_value(Some(record.value), reason);
            debug!(
                reference = record.reference,
                name = device.name(),
                value = %record.value,
                "device refreshed"
            );
            applied += 1;
        }

        self.last_full_refresh.send_replace(Some(Utc::now()));
        applied
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hs3_api::DeviceValue;

    use super::*;
    use crate::model::device::tests::{record, test_client};

    #[tokio::test]
    async fn refresh_moves_values_not_membership() {
        let registry = DeviceRegistry::new();
        registry.upsert_from_snapshot(
            vec![record(5, "Z-Wave Switch", DeviceValue::Integer(0))],
            &[],
            &test_client(),
        );
        let mut quiet = registry.get(5).unwrap().subscribe(true);
        let mut loud = registry.get(5).unwrap().subscribe(false);

        let applied = registry.apply_full_refresh(
            &[
                record(5, "Z-Wave Switch", DeviceValue::Integer(255)),
                record(77, "Z-Wave Switch", DeviceValue::Integer(1)),
            ],
            Some(UpdateReason::Reconnected),
        );

        assert_eq!(applied, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(5).unwrap().value(), DeviceValue::Integer(255));
        assert_eq!(loud.recv().await.unwrap().reason, Some(UpdateReason::Reconnected));

        registry.apply_value_update(5, DeviceValue::Integer(0), None);
        let update = quiet.recv().await.unwrap();
        assert_eq!(update.value, DeviceValue::Integer(0));
        assert_eq!(update.reason, None);
    }

    #[test]
    fn repeated_snapshot_keeps_existing_device() {
        let registry = DeviceRegistry::new();
        let client = test_client();
        registry.upsert_from_snapshot(
            vec![record(5, "Z-Wave Switch", DeviceValue::Integer(0))],
            &[],
            &client,
        );
        let first = registry.get(5).unwrap();

        let added = registry.upsert_from_snapshot(
            vec![
                record(5, "Z-Wave Switch", DeviceValue::Integer(255)),
                record(6, "Z-Wave Battery", DeviceValue::Integer(90)),
            ],
            &[],
            &client,
        );

        assert_eq!(added, 1);
        assert!(Arc::ptr_eq(&first, &registry.get(5).unwrap()));
        assert_eq!(first.value(), DeviceValue::Integer(255));
    }
}
