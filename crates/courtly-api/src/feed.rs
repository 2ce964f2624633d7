//! Reservation change feed with auto-reconnect.
//!
//! Connects to the service's WebSocket feed endpoint and streams parsed
//! [`FeedEvent`]s through a [`tokio::sync::broadcast`] channel. Handles
//! reconnection with exponential backoff + jitter automatically, and
//! replays the latest subscription filter after every reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use courtly_api::feed::{FeedFilter, FeedHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = client.feed_url()?;
//!
//! let handle = FeedHandle::connect(url, None, ReconnectConfig::default(), cancel.clone());
//! handle.set_filter(FeedFilter { date, court_id });
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::types::{ChangeAction, CourtId, ReservationChange};

// ── Broadcast channel capacity ───────────────────────────────────────

const FEED_CHANNEL_CAPACITY: usize = 256;

// ── FeedEvent ────────────────────────────────────────────────────────

/// A parsed event from the change feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A reservation was created, updated, or cancelled.
    Changed(ReservationChange),
    /// The feed (re)connected. Events may have been missed while the
    /// connection was down, so consumers should re-read their state.
    Connected,
    /// The feed connection dropped; the handle is reconnecting.
    Disconnected,
}

impl FeedEvent {
    /// The change payload, if this is a reservation event.
    pub fn change(&self) -> Option<&ReservationChange> {
        match self {
            Self::Changed(change) => Some(change),
            _ => None,
        }
    }
}

/// Server-side subscription filter: only changes touching this
/// (date, court) pair are pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFilter {
    pub date: chrono::NaiveDate,
    pub court_id: CourtId,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for feed reconnection.
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

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to a running change-feed connection.
///
/// Owns the subscription filter; the background task replays the latest
/// filter whenever the socket reconnects. Call
/// [`shutdown`](Self::shutdown) to tear down the background task.
pub struct FeedHandle {
    event_rx: broadcast::Receiver<FeedEvent>,
    filter_tx: watch::Sender<Option<FeedFilter>>,
    cancel: CancellationToken,
}

impl FeedHandle {
    /// Connect to the feed endpoint and spawn the reconnection loop.
    ///
    /// Returns immediately once the background task is spawned. The first
    /// connection attempt happens asynchronously -- subscribe to the event
    /// receiver to observe [`FeedEvent::Connected`].
    pub fn connect(
        url: Url,
        bearer: Option<String>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        let (filter_tx, filter_rx) = watch::channel(None);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            feed_loop(url, bearer, event_tx, filter_rx, reconnect, task_cancel).await;
        });

        Self {
            event_rx,
            filter_tx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// Multiple consumers can subscribe concurrently. If a consumer falls
    /// behind, it receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_rx.resubscribe()
    }

    /// Point the server-side subscription at a new (date, court) pair.
    ///
    /// No-op when the filter already matches, so re-selecting the same
    /// query does not generate redundant frames.
    pub fn set_filter(&self, filter: FeedFilter) {
        self.filter_tx.send_if_modified(|current| {
            if current.as_ref() == Some(&filter) {
                false
            } else {
                *current = Some(filter);
                true
            }
        });
    }

    /// Drop the server-side subscription entirely.
    pub fn clear_filter(&self) {
        self.filter_tx.send_if_modified(|current| {
            if current.is_none() {
                false
            } else {
                *current = None;
                true
            }
        });
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump → on error, backoff → reconnect.
async fn feed_loop(
    url: Url,
    bearer: Option<String>,
    event_tx: broadcast::Sender<FeedEvent>,
    mut filter_rx: watch::Receiver<Option<FeedFilter>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_pump(&url, bearer.as_deref(), &event_tx, &mut filter_rx, &cancel) => {
                if cancel.is_cancelled() {
                    break;
                }
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("Change feed disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "Change feed error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "Change feed reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt,
                            "Waiting before reconnect"
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

    // Note: tracing after the loop is technically reachable (via break)
    // but the compiler's macro expansion for select! can't prove it.
    #[allow(unreachable_code)]
    {
        tracing::debug!("Change feed loop exiting");
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one feed connection and pump it until it drops.
///
/// If `bearer` is provided, it's injected as an `Authorization` header on
/// the WebSocket upgrade request. A `Connected` event is broadcast once
/// the socket is up and a `Disconnected` event when the pump returns.
async fn connect_and_pump(
    url: &Url,
    bearer: Option<&str>,
    event_tx: &broadcast::Sender<FeedEvent>,
    filter_rx: &mut watch::Receiver<Option<FeedFilter>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "Connecting to change feed");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::FeedConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = bearer {
        request = request.with_header("Authorization", format!("Bearer {token}"));
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::FeedConnect(e.to_string()))?;

    tracing::info!("Change feed connected");
    let _ = event_tx.send(FeedEvent::Connected);

    let result = pump(ws_stream, event_tx, filter_rx, cancel).await;

    let _ = event_tx.send(FeedEvent::Disconnected);
    result
}

/// Read frames and forward filter changes until the connection drops.
async fn pump<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    event_tx: &broadcast::Sender<FeedEvent>,
    filter_rx: &mut watch::Receiver<Option<FeedFilter>>,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    // Replay the latest filter on every (re)connect, so a reconnect
    // restores the server-side subscription the consumer expects.
    let current = filter_rx.borrow_and_update().clone();
    if current.is_some() {
        send_frame(&mut write, filter_frame(current.as_ref())).await?;
    }

    let mut filter_open = true;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            changed = filter_rx.changed(), if filter_open => {
                if changed.is_ok() {
                    let frame = filter_frame(filter_rx.borrow_and_update().as_ref());
                    send_frame(&mut write, frame).await?;
                } else {
                    // All handles dropped; stop watching for filter updates
                    // but keep pumping for remaining event subscribers.
                    filter_open = false;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(event) = parse_frame(&text) {
                            // Ignore send errors -- just means no active
                            // subscribers right now.
                            let _ = event_tx.send(event);
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("Feed ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "Feed close frame received"
                            );
                        } else {
                            tracing::info!("Feed close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::FeedConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("Feed stream ended");
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

async fn send_frame<S>(write: &mut S, payload: String) -> Result<(), Error>
where
    S: futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    tracing::debug!(frame = %payload, "Sending feed frame");
    write
        .send(tungstenite::Message::text(payload))
        .await
        .map_err(|e| Error::FeedConnect(format!("failed to send filter frame: {e}")))
}

// ── Frame encoding / parsing ─────────────────────────────────────────

/// Client → server subscription frame.
///
/// `{"action":"subscribe","filter":{...}}` to target a (date, court)
/// pair, `{"action":"unsubscribe"}` to drop the subscription.
fn filter_frame(filter: Option<&FeedFilter>) -> String {
    match filter {
        Some(f) => serde_json::json!({ "action": "subscribe", "filter": f }).to_string(),
        None => serde_json::json!({ "action": "unsubscribe" }).to_string(),
    }
}

/// Server → client frame envelope: `{"event": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct ServerFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a feed text frame into an event, if it carries one.
///
/// Acks and unknown events are logged and skipped; malformed frames
/// never panic.
fn parse_frame(text: &str) -> Option<FeedEvent> {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse feed frame");
            return None;
        }
    };

    match frame.event.as_str() {
        "reservation.changed" => match serde_json::from_value::<ReservationChange>(frame.data) {
            Ok(change) => {
                tracing::debug!(
                    action = %change.action,
                    reservation = %change.reservation.id,
                    "Reservation change received"
                );
                Some(FeedEvent::Changed(change))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Malformed reservation.changed payload");
                None
            }
        },
        "subscribed" | "unsubscribed" | "pong" => {
            tracing::trace!(event = %frame.event, "Feed ack");
            None
        }
        other => {
            tracing::debug!(event = other, "Ignoring unknown feed event");
            None
        }
    }
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
    use crate::types::{ReservationId, ReservationStatus, SlotTime};
    use chrono::NaiveDate;

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

        // Each step should roughly double (within jitter bounds)
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
    fn subscribe_frame_shape() {
        let filter = FeedFilter {
            date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            court_id: CourtId(3),
        };
        assert_eq!(
            filter_frame(Some(&filter)),
            r#"{"action":"subscribe","filter":{"court_id":3,"date":"2026-09-12"}}"#
        );
        assert_eq!(filter_frame(None), r#"{"action":"unsubscribe"}"#);
    }

    #[test]
    fn parse_reservation_changed_frame() {
        let raw = serde_json::json!({
            "event": "reservation.changed",
            "data": {
                "action": "created",
                "reservation": {
                    "id": 42,
                    "court_id": 3,
                    "date": "2026-09-12",
                    "start_time": "19:00:00",
                    "end_time": "20:00:00",
                    "status": "confirmed",
                    "user_ref": "u-77"
                }
            }
        });

        let event = parse_frame(&raw.to_string()).unwrap();
        let change = event.change().unwrap();
        assert_eq!(change.action, ChangeAction::Created);
        assert_eq!(change.reservation.id, ReservationId(42));
        assert_eq!(change.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(
            change.reservation.start_time,
            SlotTime::from_hour(19).unwrap()
        );
    }

    #[test]
    fn acks_and_unknown_events_are_skipped() {
        assert!(parse_frame(r#"{"event":"subscribed"}"#).is_none());
        assert!(parse_frame(r#"{"event":"pong"}"#).is_none());
        assert!(parse_frame(r#"{"event":"court.changed","data":{}}"#).is_none());
    }

    #[test]
    fn malformed_frames_are_skipped() {
        // Should not panic, should just log and skip
        assert!(parse_frame("not json at all").is_none());
        assert!(parse_frame(r#"{"event":"reservation.changed","data":{"action":"exploded"}}"#).is_none());
        assert!(parse_frame(r#"{"no_event_key":true}"#).is_none());
    }
}
