// ── Event domain type ──

use hs3_api::{EventRecord, JsonClient};

use crate::error::CoreError;

/// A controller event definition, identified by `(group, name)`.
///
/// Immutable; the only operation is triggering it.
#[derive(Debug, Clone)]
pub struct Event {
    group: String,
    name: String,
    client: JsonClient,
}

impl Event {
    pub(crate) fn new(record: EventRecord, client: JsonClient) -> Self {
        Self {
            group: record.group,
            name: record.name,
            client,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the event on the controller.
    pub async fn run(&self) -> Result<(), CoreError> {
        self.client
            .run_event(&self.group, &self.name)
            .await
            .map(|_| ())
            .ok_or(CoreError::RequestFailed { request: "runevent" })
    }
}
