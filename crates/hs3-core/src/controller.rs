// ── Controller abstraction ──
//
// Composes the control channel, the device registry, and the ASCII
// listener for one HS3 controller. Snapshots come over HTTP; deltas come
// over the event socket and are applied to the registry by a background
// pump task.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hs3_api::{AsciiListener, DeviceRef, DeviceValue, JsonClient, ListenerEvent, ListenerState};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{Device, Event, UpdateReason};
use crate::store::DeviceRegistry;

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Create it, call
/// [`initialize()`](Self::initialize) to load devices and events, then
/// [`start_listener()`](Self::start_listener) to keep device values live.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    client: JsonClient,
    registry: Arc<DeviceRegistry>,
    events: ArcSwap<Vec<Arc<Event>>>,
    listener: AsciiListener,
    listener_rx: Mutex<Option<mpsc::Receiver<ListenerEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Controller {
    /// Create a controller from configuration. Does not connect.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let client = JsonClient::new(
            &config.host,
            config.http_port,
            config.username.clone(),
            config.password.clone(),
            &config.transport(),
        )?;
        let (listener, listener_rx) = AsciiListener::new(config.listener_config());

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                registry: Arc::new(DeviceRegistry::new()),
                events: ArcSwap::from_pointee(Vec::new()),
                listener,
                listener_rx: Mutex::new(Some(listener_rx)),
                pump: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// The control channel this controller issues requests through.
    pub fn client(&self) -> &JsonClient {
        &self.inner.client
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// Load the device and event snapshots.
    ///
    /// A failed fetch is logged and leaves that collection empty; it does
    /// not fail initialization.
    pub async fn initialize(&self) {
        self.load_devices().await;
        self.load_events().await;
    }

    async fn load_devices(&self) {
        let client = &self.inner.client;
        let Some(records) = client.get_status().await else {
            error!("error retrieving HS3 devices");
            return;
        };
        let Some(control_data) = client.get_control().await else {
            error!("error retrieving HS3 control data");
            return;
        };

        let added = self
            .inner
            .registry
            .upsert_from_snapshot(records, &control_data, client);
        info!(added, total = self.inner.registry.len(), "devices loaded");
    }

    async fn load_events(&self) {
        let Some(records) = self.inner.client.get_events().await else {
            error!("error retrieving HS3 events");
            return;
        };

        let events: Vec<_> = records
            .into_iter()
            .map(|r| Arc::new(Event::new(r, self.inner.client.clone())))
            .collect();
        info!(count = events.len(), "events loaded");
        self.inner.events.store(Arc::new(events));
    }

    /// Re-read every device value and apply it, tagged with `reason`.
    ///
    /// Runs automatically when the listener reconnects. Returns the number
    /// of devices updated.
    pub async fn refresh_devices(&self, reason: Option<UpdateReason>) -> Result<usize, CoreError> {
        refresh_registry(&self.inner.registry, &self.inner.client, reason).await
    }

    // ── Listener lifecycle ───────────────────────────────────────

    /// Start the ASCII listener and the task applying its events.
    pub async fn start_listener(&self) {
        {
            let mut pump = self.inner.pump.lock().await;
            if pump.is_none() {
                if let Some(rx) = self.inner.listener_rx.lock().await.take() {
                    *pump = Some(tokio::spawn(event_pump(
                        Arc::clone(&self.inner.registry),
                        self.inner.client.clone(),
                        rx,
                        self.inner.cancel.clone(),
                    )));
                }
            }
        }
        self.inner.listener.start().await;
    }

    /// Stop the listener; no reconnect follows until the next start.
    pub async fn stop_listener(&self) {
        self.inner.listener.stop().await;
    }

    /// Stop the listener and end the event pump. Terminal.
    pub async fn shutdown(&self) {
        self.inner.listener.stop().await;
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.pump.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "event pump task failed");
            }
        }
        debug!("controller shut down");
    }

    pub fn state(&self) -> ListenerState {
        self.inner.listener.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.inner.listener.subscribe_state()
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Set any device to a raw value, without going through a variant.
    pub async fn control_device_by_value(
        &self,
        reference: DeviceRef,
        value: impl Into<DeviceValue>,
    ) -> Result<(), CoreError> {
        self.inner
            .client
            .control_device_by_value(reference, value.into())
            .await
            .map(|_| ())
            .ok_or(CoreError::RequestFailed {
                request: "controldevicebyvalue",
            })
    }

    // ── Accessors ────────────────────────────────────────────────

    /// All supported devices, ordered by reference.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.inner.registry.snapshot()
    }

    pub fn device(&self, reference: DeviceRef) -> Result<Arc<Device>, CoreError> {
        self.inner
            .registry
            .get(reference)
            .ok_or(CoreError::DeviceNotFound { reference })
    }

    pub fn events(&self) -> Arc<Vec<Arc<Event>>> {
        self.inner.events.load_full()
    }

    pub fn event(&self, group: &str, name: &str) -> Option<Arc<Event>> {
        self.inner
            .events
            .load()
            .iter()
            .find(|e| e.group() == group && e.name() == name)
            .cloned()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Apply listener events to the registry in arrival order.
///
/// Holds the registry and client rather than the controller, so dropping
/// the last `Controller` still tears the listener down.
async fn event_pump(
    registry: Arc<DeviceRegistry>,
    client: JsonClient,
    mut rx: mpsc::Receiver<ListenerEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => event,
        };
        let Some(event) = event else { break };

        match event {
            ListenerEvent::DeviceChanged { reference, value } => {
                registry.apply_value_update(reference, value, None);
            }
            ListenerEvent::Reconnected => {
                if let Err(e) =
                    refresh_registry(&registry, &client, Some(UpdateReason::Reconnected)).await
                {
                    warn!(error = %e, "refresh after reconnect failed");
                }
            }
            ListenerEvent::Disconnected => registry.mark_disconnected(),
        }
    }
    debug!("event pump stopped");
}

async fn refresh_registry(
    registry: &DeviceRegistry,
    client: &JsonClient,
    reason: Option<UpdateReason>,
) -> Result<usize, CoreError> {
    let Some(records) = client.get_status().await else {
        error!("error retrieving HS3 data for refresh");
        return Err(CoreError::RequestFailed { request: "getstatus" });
    };
    let applied = registry.apply_full_refresh(&records, reason);
    debug!(applied, reason = ?reason, "device refresh complete");
    Ok(applied)
}
