//! ASCII event listener with auto-reconnect.
//!
//! Holds a persistent TCP session to the controller's ASCII port, logs in,
//! and forwards `DC` (device change) lines as [`ListenerEvent`]s through a
//! bounded [`tokio::sync::mpsc`] channel, in socket order. A keep-alive task
//! pings the controller while the session is listening and tears the
//! session down when the peer goes quiet. Every failure funnels into one
//! reconnect loop; only [`AsciiListener::stop`] ends it.
//!
//! # Example
//!
//! ```rust,ignore
//! use hs3_api::ascii::{AsciiListener, ListenerConfig, ListenerEvent};
//! use secrecy::SecretString;
//!
//! let config = ListenerConfig::new("192.168.1.20", 11000, "default", SecretString::from("default".to_string()));
//! let (listener, mut events) = AsciiListener::new(config);
//! listener.start().await;
//!
//! while let Some(event) = events.recv().await {
//!     if let ListenerEvent::DeviceChanged { reference, value } = event {
//!         println!("{reference} -> {value}");
//!     }
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::models::{DeviceRef, DeviceValue};

/// Default TCP port of the ASCII interface.
pub const DEFAULT_ASCII_PORT: u16 = 11000;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

const DEVICE_CHANGE_TAG: &str = "DC";
const PING_LINE: &str = "vr\r\n";

/// Longest line, newline included, the listener will buffer.
const MAX_LINE_LEN: u64 = 4096;

// ── State & events ───────────────────────────────────────────────────

/// Lifecycle state of the listener session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ListenerState {
    Idle,
    Connecting,
    Listening,
    Disconnected,
    Stopped,
}

/// Notification emitted by the listener to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// A `DC` line: device `reference` now has `value`.
    DeviceChanged {
        reference: DeviceRef,
        value: DeviceValue,
    },
    /// A session was established after a previous one failed.
    Reconnected,
    /// A healthy (or fresh) session was lost or stopped.
    Disconnected,
}

/// One parsed line from the ASCII socket.
#[derive(Debug, Clone, PartialEq)]
pub enum AsciiMessage {
    DeviceChange {
        reference: DeviceRef,
        value: DeviceValue,
    },
    /// Any other message tag. The protocol has more types than the
    /// listener understands; these are dropped.
    Unhandled(String),
    /// A `DC` line whose fields could not be read.
    Malformed(String),
}

/// Parse one CRLF-terminated line: `TAG,field,field,...`.
///
/// Fields after the third are ignored for `DC` lines.
pub fn parse_line(line: &str) -> AsciiMessage {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields = line.split(',');
    let tag = fields.next().unwrap_or_default().trim();

    if tag != DEVICE_CHANGE_TAG {
        return AsciiMessage::Unhandled(tag.to_owned());
    }

    let (Some(reference), Some(value)) = (fields.next(), fields.next()) else {
        return AsciiMessage::Malformed(format!("expected DC,<ref>,<value>, got {line:?}"));
    };
    let Ok(reference) = reference.trim().parse::<DeviceRef>() else {
        return AsciiMessage::Malformed(format!("invalid device reference {reference:?}"));
    };
    match value.parse::<DeviceValue>() {
        Ok(value) => AsciiMessage::DeviceChange { reference, value },
        Err(e) => AsciiMessage::Malformed(e.to_string()),
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Timeouts and intervals governing one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerTimings {
    /// Bound on the TCP connect. Default: 3s.
    pub connect_timeout: Duration,
    /// Bound on waiting for the login acknowledgement. Default: 3s.
    pub login_timeout: Duration,
    /// Keep-alive period; a full period without traffic kills the session.
    /// Default: 120s.
    pub ping_interval: Duration,
    /// Fixed delay before reconnecting after a failed session. Default: 10s.
    pub reconnect_delay: Duration,
}

impl Default for ListenerTimings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            login_timeout: Duration::from_secs(3),
            ping_interval: Duration::from_secs(120),
            reconnect_delay: Duration::from_secs(10),
        }
    }
}

/// Where and as whom the listener connects.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub timings: ListenerTimings,
}

impl ListenerConfig {
    /// Config with default timings.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password,
            timings: ListenerTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: ListenerTimings) -> Self {
        self.timings = timings;
        self
    }
}

// ── AsciiListener ────────────────────────────────────────────────────

/// State shared between the handle and the background tasks.
struct Shared {
    config: ListenerConfig,
    state: watch::Sender<ListenerState>,
    pending_reconnect: AtomicBool,
    event_tx: mpsc::Sender<ListenerEvent>,
}

impl Shared {
    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
    }

    /// Write `state` unless a stop has been requested; a stopped
    /// listener only ever moves back to `Idle` through `start()`.
    fn advance(&self, cancel: &CancellationToken, state: ListenerState) {
        if !cancel.is_cancelled() {
            self.set_state(state);
        }
    }

    /// Set the pending-reconnect flag; `true` if it was previously clear.
    fn mark_pending(&self) -> bool {
        !self.pending_reconnect.swap(true, Ordering::SeqCst)
    }

    async fn notify(&self, event: ListenerEvent) {
        if self.event_tx.send(event).await.is_err() {
            trace!("listener event dropped, no receiver");
        }
    }
}

struct RunHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle to the ASCII listener.
///
/// At most one background connection loop runs per listener. Dropping the
/// handle stops it.
pub struct AsciiListener {
    shared: Arc<Shared>,
    run: Mutex<Option<RunHandle>>,
}

impl AsciiListener {
    /// Create an idle listener and the receiver its events are delivered on.
    pub fn new(config: ListenerConfig) -> (Self, mpsc::Receiver<ListenerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state, _) = watch::channel(ListenerState::Idle);

        let listener = Self {
            shared: Arc::new(Shared {
                config,
                state,
                pending_reconnect: AtomicBool::new(false),
                event_tx,
            }),
            run: Mutex::new(None),
        };
        (listener, event_rx)
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.shared.config
    }

    /// Current session state.
    pub fn state(&self) -> ListenerState {
        *self.shared.state.borrow()
    }

    /// Subscribe to session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.shared.state.subscribe()
    }

    /// Whether the next successful session counts as a reconnection.
    pub fn is_reconnect_pending(&self) -> bool {
        self.shared.pending_reconnect.load(Ordering::SeqCst)
    }

    /// Start (or restart) the connection loop.
    ///
    /// No-op if a loop is already running. A loop that is still unwinding
    /// from a `stop()` is awaited first, so two loops never overlap.
    pub async fn start(&self) {
        let mut run = self.run.lock().await;

        if let Some(current) = run.as_ref() {
            if !current.cancel.is_cancelled() && !current.handle.is_finished() {
                debug!("ASCII listener already running");
                return;
            }
        }

        if let Some(previous) = run.take() {
            previous.cancel.cancel();
            if let Err(e) = previous.handle.await {
                warn!(error = %e, "previous ASCII listener task failed");
            }
        }

        self.shared.set_state(ListenerState::Idle);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener_loop(Arc::clone(&self.shared), cancel.clone()));
        *run = Some(RunHandle { cancel, handle });
    }

    /// Stop the listener and suppress any further reconnect.
    ///
    /// Safe in any state. The in-flight connect or read unwinds on its own;
    /// this call does not wait for it.
    pub async fn stop(&self) {
        info!("stopping ASCII listener");
        self.shared.set_state(ListenerState::Stopped);

        let run = self.run.lock().await;
        match run.as_ref() {
            Some(current) if !current.handle.is_finished() => current.cancel.cancel(),
            _ => {
                self.shared.pending_reconnect.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for AsciiListener {
    fn drop(&mut self) {
        if let Some(current) = self.run.get_mut().as_ref() {
            current.cancel.cancel();
        }
    }
}

// ── Background connection loop ───────────────────────────────────────

/// Main loop: (backoff) → connect → login → listen → on error, disconnect.
///
/// The single retry loop for both the first start and every reconnect.
async fn listener_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let config = &shared.config;

    loop {
        if shared.pending_reconnect.load(Ordering::SeqCst) {
            let delay = config.timings.reconnect_delay;
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting ASCII listener"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        debug!(host = %config.host, port = config.port, "connecting ASCII listener");
        match run_session(&shared, &cancel).await {
            Ok(()) => break,
            Err(e) => {
                warn!(error = %e, category = e.category(), "ASCII listener session failed");
                shared.advance(&cancel, ListenerState::Disconnected);
                if shared.mark_pending() {
                    shared.notify(ListenerEvent::Disconnected).await;
                }
            }
        }
    }

    if shared.mark_pending() {
        shared.notify(ListenerEvent::Disconnected).await;
    }
    shared.set_state(ListenerState::Stopped);
    debug!("ASCII listener stopped");
}

// ── Single session lifecycle ─────────────────────────────────────────

/// Connect, log in, and read until the session fails.
///
/// `Ok(())` means the session ended because a stop was requested; every
/// other ending is an `Err` that routes to the reconnect path. The socket
/// and keep-alive task are torn down before this returns.
async fn run_session(shared: &Shared, cancel: &CancellationToken) -> Result<(), Error> {
    let config = &shared.config;
    let timings = &config.timings;
    shared.advance(cancel, ListenerState::Connecting);

    let connect = tokio::time::timeout(
        timings.connect_timeout,
        TcpStream::connect((config.host.as_str(), config.port)),
    );
    let stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = connect => result
            .map_err(|_| Error::AsciiConnectTimeout {
                timeout_secs: timings.connect_timeout.as_secs(),
            })?
            .map_err(Error::AsciiConnect)?,
    };
    info!(host = %config.host, port = config.port, "ASCII listener connected");

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer = Arc::new(Mutex::new(write_half));

    tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = login(config, &mut reader, &writer) => result?,
    }

    shared.advance(cancel, ListenerState::Listening);

    let alive = Arc::new(AtomicBool::new(true));
    let stale = CancellationToken::new();
    let pinger = tokio::spawn(keep_alive(
        Arc::clone(&writer),
        Arc::clone(&alive),
        shared.state.subscribe(),
        timings.ping_interval,
        stale.clone(),
    ));

    if shared.pending_reconnect.swap(false, Ordering::SeqCst) {
        info!("ASCII listener reconnected");
        shared.notify(ListenerEvent::Reconnected).await;
    }

    let result = read_loop(shared, &mut reader, &alive, &stale, cancel).await;
    pinger.abort();
    result
}

/// Send `au,<user>,<pass>` and wait for the one-line acknowledgement.
async fn login(
    config: &ListenerConfig,
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &Mutex<OwnedWriteHalf>,
) -> Result<(), Error> {
    let line = format!(
        "au,{},{}\r\n",
        config.username,
        config.password.expose_secret()
    );
    send_line(&mut *writer.lock().await, &line).await?;

    let timeout = config.timings.login_timeout;
    let mut reply = Vec::new();
    let read = tokio::time::timeout(timeout, read_line_capped(reader, &mut reply))
        .await
        .map_err(|_| Error::LoginTimeout {
            timeout_secs: timeout.as_secs(),
        })??;

    match read {
        LineRead::Eof => return Err(Error::ConnectionClosed),
        LineRead::Overlong => warn!("ASCII login reply too long, not acknowledged"),
        LineRead::Line => {
            let reply = String::from_utf8_lossy(&reply);
            let reply = reply.trim();
            if reply.eq_ignore_ascii_case("ok") {
                info!("ASCII login accepted");
            } else {
                warn!(reply, "ASCII login not acknowledged");
            }
        }
    }
    Ok(())
}

/// Read lines until the peer closes, the keep-alive gives up, or a stop
/// is requested.
async fn read_loop(
    shared: &Shared,
    reader: &mut BufReader<OwnedReadHalf>,
    alive: &AtomicBool,
    stale: &CancellationToken,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut buf = Vec::new();

    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            () = stale.cancelled() => return Err(Error::PingTimeout),
            read = read_line_capped(reader, &mut buf) => read?,
        };
        match read {
            LineRead::Eof => return Err(Error::ConnectionClosed),
            LineRead::Overlong => {
                alive.store(true, Ordering::SeqCst);
                warn!(max = MAX_LINE_LEN, "dropping over-long ASCII message");
                continue;
            }
            LineRead::Line => alive.store(true, Ordering::SeqCst),
        }

        let line = String::from_utf8_lossy(&buf);
        trace!(raw = %line.trim_end(), "ASCII message received");

        match parse_line(&line) {
            AsciiMessage::DeviceChange { reference, value } => {
                shared
                    .notify(ListenerEvent::DeviceChanged { reference, value })
                    .await;
            }
            AsciiMessage::Unhandled(tag) => {
                debug!(tag = %tag, "unhandled ASCII message type");
            }
            AsciiMessage::Malformed(reason) => {
                warn!(reason = %reason, "dropping malformed ASCII message");
            }
        }
    }
}

/// Result of [`read_line_capped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line,
    Overlong,
}

/// Read one `\n`-terminated line into `buf`, buffering at most
/// [`MAX_LINE_LEN`] bytes. The rest of an over-long line is discarded up to
/// and including its newline.
async fn read_line_capped(
    reader: &mut BufReader<OwnedReadHalf>,
    buf: &mut Vec<u8>,
) -> std::io::Result<LineRead> {
    buf.clear();
    if (&mut *reader).take(MAX_LINE_LEN).read_until(b'\n', buf).await? == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.ends_with(b"\n") {
        return Ok(LineRead::Line);
    }

    // Either the cap was hit or the peer closed mid-line.
    loop {
        buf.clear();
        if (&mut *reader).take(MAX_LINE_LEN).read_until(b'\n', buf).await? == 0 {
            return Ok(LineRead::Eof);
        }
        if buf.ends_with(b"\n") {
            buf.clear();
            return Ok(LineRead::Overlong);
        }
    }
}

// ── Keep-alive ───────────────────────────────────────────────────────

/// Ping every `interval` while listening.
///
/// If no line was read since the previous ping, the peer is considered
/// dead: the write side is shut down and `stale` is cancelled, which the
/// read loop treats as the end of the session.
async fn keep_alive(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    alive: Arc<AtomicBool>,
    mut state: watch::Receiver<ListenerState>,
    interval: Duration,
    stale: CancellationToken,
) {
    loop {
        if *state.borrow_and_update() != ListenerState::Listening {
            break;
        }

        if alive.swap(false, Ordering::SeqCst) {
            trace!("sending ASCII ping");
            if let Err(e) = send_line(&mut *writer.lock().await, PING_LINE).await {
                debug!(error = %e, "ASCII ping failed");
                stale.cancel();
                break;
            }
        } else {
            warn!("ASCII ping timeout, closing connection");
            if let Err(e) = writer.lock().await.shutdown().await {
                debug!(error = %e, "ASCII shutdown failed");
            }
            stale.cancel();
            break;
        }

        if !wait_while_listening(&mut state, interval).await {
            break;
        }
    }
}

/// Sleep for `interval`; `false` if the state left `Listening` first.
async fn wait_while_listening(state: &mut watch::Receiver<ListenerState>, interval: Duration) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;
            changed = state.changed() => {
                if changed.is_err() || *state.borrow_and_update() != ListenerState::Listening {
                    return false;
                }
            }
            () = &mut sleep => return true,
        }
    }
}

async fn send_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let timings = ListenerTimings::default();
        assert_eq!(timings.connect_timeout, Duration::from_secs(3));
        assert_eq!(timings.login_timeout, Duration::from_secs(3));
        assert_eq!(timings.ping_interval, Duration::from_secs(120));
        assert_eq!(timings.reconnect_delay, Duration::from_secs(10));
    }

    #[test]
    fn parse_device_change_fractional() {
        assert_eq!(
            parse_line("DC,12,75.5\r\n"),
            AsciiMessage::DeviceChange {
                reference: 12,
                value: DeviceValue::Fractional(75.5),
            }
        );
    }

    #[test]
    fn parse_device_change_ignores_extra_fields() {
        assert_eq!(
            parse_line("DC,5,255,0,Kitchen Light\r\n"),
            AsciiMessage::DeviceChange {
                reference: 5,
                value: DeviceValue::Integer(255),
            }
        );
    }

    #[test]
    fn parse_unknown_tag() {
        assert_eq!(
            parse_line("EV,Lighting,All Off\r\n"),
            AsciiMessage::Unhandled("EV".into())
        );
        assert_eq!(parse_line("\r\n"), AsciiMessage::Unhandled(String::new()));
    }

    #[test]
    fn parse_malformed_device_change() {
        assert!(matches!(parse_line("DC,12\r\n"), AsciiMessage::Malformed(_)));
        assert!(matches!(parse_line("DC,abc,1\r\n"), AsciiMessage::Malformed(_)));
        assert!(matches!(parse_line("DC,12,on\r\n"), AsciiMessage::Malformed(_)));
    }

    #[test]
    fn state_labels() {
        assert_eq!(ListenerState::Listening.to_string(), "listening");
        assert_eq!(ListenerState::Stopped.as_ref(), "stopped");
    }

    #[tokio::test]
    async fn stop_before_start_is_terminal() {
        let config = ListenerConfig::new(
            "127.0.0.1",
            1,
            "default",
            SecretString::from("default".to_string()),
        );
        let (listener, _events) = AsciiListener::new(config);
        assert_eq!(listener.state(), ListenerState::Idle);

        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(listener.is_reconnect_pending());
    }
}
