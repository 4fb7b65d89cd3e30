//! Push-gateway event stream with auto-reconnect.
//!
//! Connects to the hosted push-messaging gateway and streams named events
//! through a [`tokio::sync::broadcast`] channel. Channels are subscribed
//! and unsubscribed over the same connection; subscriptions are
//! re-announced after a reconnect. Reconnection uses exponential backoff
//! with jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use corral_api::push::{PushConfig, PushHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let config = PushConfig::new("app-key", "eu1");
//!
//! let handle = PushHandle::connect(config, ReconnectConfig::default(), cancel.clone())?;
//! let mut sub = handle.subscribe("gen_rules_abc123");
//!
//! if let Some(event) = sub.next_event("result").await {
//!     println!("payload: {}", event.data);
//! }
//! sub.unsubscribe();
//!
//! handle.shutdown();
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── PushEvent ────────────────────────────────────────────────────────

/// A named event delivered by the push gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    /// Channel the event was delivered on. `None` for connection-level
    /// events the gateway emits outside any channel.
    pub channel: Option<String>,

    /// Event name, e.g. `"result"` or `"rules-aigen-created"`.
    pub event: String,

    /// Decoded payload. Passed through to consumers unmodified.
    #[serde(default)]
    pub data: serde_json::Value,
}

// ── PushConfig ───────────────────────────────────────────────────────

/// Connection parameters for the push gateway.
///
/// The application key and cluster region are opaque strings supplied by
/// the hosting environment.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub app_key: String,
    pub cluster: String,
    /// Endpoint override for self-hosted gateways and tests. When unset,
    /// the hosted gateway for `cluster` is used.
    pub endpoint: Option<Url>,
}

impl PushConfig {
    pub fn new(app_key: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            cluster: cluster.into(),
            endpoint: None,
        }
    }

    /// The WebSocket URL this config connects to.
    pub fn gateway_url(&self) -> Result<Url, Error> {
        let base = match &self.endpoint {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => format!("wss://push-{}.corral.sh", self.cluster),
        };
        Ok(Url::parse(&format!(
            "{base}/app/{}?protocol=7",
            self.app_key
        ))?)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for gateway reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// Channel-management traffic sent from handles to the connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushCommand {
    Subscribe(String),
    Unsubscribe(String),
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push-gateway connection.
///
/// Cheaply cloneable; one connection serves any number of logical
/// subscriptions. Drop all handles and call
/// [`shutdown`](Self::shutdown) to tear down the background task.
#[derive(Clone)]
pub struct PushHandle {
    cmd_tx: mpsc::UnboundedSender<PushCommand>,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    cancel: CancellationToken,
}

impl PushHandle {
    /// Connect to the gateway and spawn the reconnection loop.
    ///
    /// Returns immediately once the background task is spawned; the
    /// first connection attempt happens asynchronously.
    pub fn connect(
        config: PushConfig,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let url = config.gateway_url()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let task_tx = event_tx.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            push_loop(url, task_tx, cmd_rx, reconnect, task_cancel).await;
        });

        Ok(Self {
            cmd_tx,
            event_tx,
            cancel,
        })
    }

    /// Create an in-process handle with no gateway connection.
    ///
    /// The returned [`LoopbackDriver`] injects events and exposes the
    /// subscribe/unsubscribe traffic the handle generates. Used by tests
    /// and offline tooling.
    pub fn loopback() -> (Self, LoopbackDriver) {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let handle = Self {
            cmd_tx,
            event_tx: event_tx.clone(),
            cancel: CancellationToken::new(),
        };
        (handle, LoopbackDriver { event_tx, cmd_rx })
    }

    /// Subscribe to a channel.
    ///
    /// The subscribe frame is sent to the gateway and a [`Subscription`]
    /// is returned that filters the event stream down to that channel.
    pub fn subscribe(&self, channel: &str) -> Subscription {
        let _ = self.cmd_tx.send(PushCommand::Subscribe(channel.to_owned()));
        Subscription {
            channel: channel.to_owned(),
            events: self.event_tx.subscribe(),
            cmd_tx: self.cmd_tx.clone(),
            active: true,
        }
    }

    /// Get a raw receiver for every event on the connection.
    ///
    /// Multiple consumers can subscribe concurrently. If a consumer
    /// falls behind, it receives [`broadcast::error::RecvError::Lagged`].
    pub fn events(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.event_tx.subscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// A live subscription to one channel.
///
/// Unsubscription is idempotent: the first call (or drop) sends exactly
/// one unsubscribe frame; later calls are no-ops. Dropping an abandoned
/// subscription therefore never leaks a gateway channel.
pub struct Subscription {
    channel: String,
    events: broadcast::Receiver<Arc<PushEvent>>,
    cmd_tx: mpsc::UnboundedSender<PushCommand>,
    active: bool,
}

impl Subscription {
    /// The channel name this subscription is bound to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next delivery of `event` on this channel.
    ///
    /// Deliveries on other channels or with other event names are
    /// skipped. Returns `None` once the connection's event stream is
    /// closed.
    pub async fn next_event(&mut self, event: &str) -> Option<Arc<PushEvent>> {
        loop {
            match self.events.recv().await {
                Ok(ev) => {
                    if ev.channel.as_deref() == Some(self.channel.as_str()) && ev.event == event {
                        return Some(ev);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(channel = %self.channel, skipped = n, "subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Unsubscribe from the channel. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let _ = self
            .cmd_tx
            .send(PushCommand::Unsubscribe(self.channel.clone()));
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ── LoopbackDriver ───────────────────────────────────────────────────

/// Test-side counterpart of [`PushHandle::loopback`].
pub struct LoopbackDriver {
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    cmd_rx: mpsc::UnboundedReceiver<PushCommand>,
}

impl LoopbackDriver {
    /// Inject an event as if the gateway had delivered it.
    pub fn deliver(&self, channel: &str, event: &str, data: serde_json::Value) {
        let _ = self.event_tx.send(Arc::new(PushEvent {
            channel: Some(channel.to_owned()),
            event: event.to_owned(),
            data,
        }));
    }

    /// Pop the next subscribe/unsubscribe command, if any was sent.
    pub fn try_next_command(&mut self) -> Option<PushCommand> {
        self.cmd_rx.try_recv().ok()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump → on error, backoff → reconnect.
async fn push_loop(
    url: Url,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    mut cmd_rx: mpsc::UnboundedReceiver<PushCommand>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    // Channels with live subscriptions -- re-announced after a reconnect.
    let mut subscribed: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_pump(&url, &event_tx, &mut cmd_rx, &mut subscribed, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    Ok(()) => {
                        tracing::info!("push gateway disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "push gateway error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "push gateway reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("push loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Outbound channel-management frame.
#[derive(Serialize)]
struct ClientFrame<'a> {
    event: &'a str,
    data: ChannelRef<'a>,
}

#[derive(Serialize)]
struct ChannelRef<'a> {
    channel: &'a str,
}

fn channel_frame(event: &str, channel: &str) -> String {
    serde_json::to_string(&ClientFrame {
        event,
        data: ChannelRef { channel },
    })
    .expect("frame serialization cannot fail")
}

/// Establish one gateway connection and pump it until it drops.
///
/// Re-announces channels in `subscribed` on connect, then interleaves
/// inbound frames with subscribe/unsubscribe commands from handles.
async fn connect_and_pump(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    cmd_rx: &mut mpsc::UnboundedReceiver<PushCommand>,
    subscribed: &mut HashSet<String>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to push gateway");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::PushConnect(e.to_string()))?;

    tracing::info!("push gateway connected");

    let (mut write, mut read) = ws_stream.split();

    for channel in &*subscribed {
        write
            .send(tungstenite::Message::text(channel_frame(
                "subscribe", channel,
            )))
            .await
            .map_err(|e| Error::PushConnect(e.to_string()))?;
    }

    // Once every handle is gone the command stream closes; keep pumping
    // inbound events until cancellation.
    let mut cmds_open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            cmd = cmd_rx.recv(), if cmds_open => {
                match cmd {
                    Some(PushCommand::Subscribe(channel)) => {
                        if subscribed.insert(channel.clone()) {
                            write
                                .send(tungstenite::Message::text(channel_frame("subscribe", &channel)))
                                .await
                                .map_err(|e| Error::PushConnect(e.to_string()))?;
                        }
                    }
                    Some(PushCommand::Unsubscribe(channel)) => {
                        if subscribed.remove(&channel) {
                            write
                                .send(tungstenite::Message::text(channel_frame("unsubscribe", &channel)))
                                .await
                                .map_err(|e| Error::PushConnect(e.to_string()))?;
                        }
                    }
                    None => cmds_open = false,
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(event) = parse_push_frame(&text) {
                            // Ignore send errors -- just means no active
                            // subscribers right now.
                            let _ = event_tx.send(Arc::new(event));
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("push gateway ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "push gateway close frame received"
                            );
                        } else {
                            tracing::info!("push gateway close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::PushConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("push gateway stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Raw frame shape the gateway sends.
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    channel: Option<String>,
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a gateway text frame into a [`PushEvent`].
///
/// Gateways double-encode payloads: `data` usually arrives as a
/// JSON-encoded string. Decode it when possible, keep the raw string
/// otherwise.
fn parse_push_frame(text: &str) -> Option<PushEvent> {
    let frame: WireFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse push frame");
            return None;
        }
    };

    let data = match frame.data {
        serde_json::Value::String(s) => match serde_json::from_str(&s) {
            Ok(decoded) => decoded,
            Err(_) => serde_json::Value::String(s),
        },
        other => other,
    };

    Some(PushEvent {
        channel: frame.channel,
        event: frame.event,
        data,
    })
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn gateway_url_for_cluster() {
        let config = PushConfig::new("key123", "eu1");
        assert_eq!(
            config.gateway_url().unwrap().as_str(),
            "wss://push-eu1.corral.sh/app/key123?protocol=7"
        );
    }

    #[test]
    fn gateway_url_endpoint_override() {
        let mut config = PushConfig::new("key123", "eu1");
        config.endpoint = Some(Url::parse("ws://localhost:6001/").unwrap());
        assert_eq!(
            config.gateway_url().unwrap().as_str(),
            "ws://localhost:6001/app/key123?protocol=7"
        );
    }

    #[test]
    fn parse_frame_with_double_encoded_data() {
        let text = r#"{"channel":"gen_rules_t1","event":"result","data":"{\"hasResults\":true}"}"#;
        let event = parse_push_frame(text).unwrap();
        assert_eq!(event.channel.as_deref(), Some("gen_rules_t1"));
        assert_eq!(event.event, "result");
        assert_eq!(event.data["hasResults"], true);
    }

    #[test]
    fn parse_frame_with_object_data() {
        let text = r#"{"channel":"ai-rules","event":"rules-aigen-created","data":{"results":[]}}"#;
        let event = parse_push_frame(text).unwrap();
        assert_eq!(event.event, "rules-aigen-created");
        assert!(event.data["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn parse_frame_keeps_non_json_string_data() {
        let text = r#"{"event":"log","data":"plain words"}"#;
        let event = parse_push_frame(text).unwrap();
        assert!(event.channel.is_none());
        assert_eq!(event.data, serde_json::json!("plain words"));
    }

    #[test]
    fn parse_malformed_frame() {
        assert!(parse_push_frame("not json at all").is_none());
    }

    #[test]
    fn channel_frame_shape() {
        let frame = channel_frame("subscribe", "gen_rules_t1");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "subscribe");
        assert_eq!(value["data"]["channel"], "gen_rules_t1");
    }

    #[test]
    fn subscribe_announces_channel() {
        let (handle, mut driver) = PushHandle::loopback();
        let _sub = handle.subscribe("gen_rules_t1");

        assert_eq!(
            driver.try_next_command(),
            Some(PushCommand::Subscribe("gen_rules_t1".into()))
        );
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let (handle, mut driver) = PushHandle::loopback();
        let mut sub = handle.subscribe("gen_rules_t1");
        let _ = driver.try_next_command(); // subscribe

        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        assert_eq!(
            driver.try_next_command(),
            Some(PushCommand::Unsubscribe("gen_rules_t1".into()))
        );
        // Second unsubscribe and the drop were both no-ops.
        assert_eq!(driver.try_next_command(), None);
    }

    #[test]
    fn drop_unsubscribes_once() {
        let (handle, mut driver) = PushHandle::loopback();
        {
            let _sub = handle.subscribe("gen_rules_t2");
            let _ = driver.try_next_command();
        }
        assert_eq!(
            driver.try_next_command(),
            Some(PushCommand::Unsubscribe("gen_rules_t2".into()))
        );
        assert_eq!(driver.try_next_command(), None);
    }

    #[tokio::test]
    async fn subscription_filters_by_channel_and_event() {
        let (handle, driver) = PushHandle::loopback();
        let mut sub = handle.subscribe("gen_rules_t1");

        driver.deliver("other_channel", "result", serde_json::json!(1));
        driver.deliver("gen_rules_t1", "progress", serde_json::json!(2));
        driver.deliver("gen_rules_t1", "result", serde_json::json!({"ok": true}));

        let event = sub.next_event("result").await.unwrap();
        assert_eq!(event.data["ok"], true);
    }

    #[tokio::test]
    async fn raw_event_stream_fans_out_to_all_receivers() {
        let (handle, driver) = PushHandle::loopback();
        let mut rx_a = handle.events();
        let mut rx_b = handle.events();

        driver.deliver("ai-rules", "rules-aigen-created", serde_json::json!([1]));

        assert_eq!(rx_a.recv().await.unwrap().event, "rules-aigen-created");
        assert_eq!(rx_b.recv().await.unwrap().event, "rules-aigen-created");
    }
}
