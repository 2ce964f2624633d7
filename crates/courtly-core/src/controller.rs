// ── Availability controller ──
//
// Owns the live derivation lifecycle: one active query at a time, a
// change feed that triggers re-derivation, and a watch channel
// publishing board snapshots. Consumers never see out-of-order
// results: every run carries a token, and only the run holding the
// newest token may publish.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courtly_api::transport::{TlsMode, TransportConfig};
use courtly_api::{BookingClient, FeedEvent, FeedFilter, FeedHandle, ReconnectConfig};

use crate::board::{BoardStatus, SlotBoard};
use crate::config::{OperatingWindow, ServiceConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{SlotQuery, SlotTarget, TimeSlot};
use crate::slots;
use crate::stream::BoardStream;

/// Clock used to stamp derivations triggered by feed events, so the
/// past cutoff tracks wall time instead of the moment the query was
/// first issued. Injectable for deterministic tests.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

fn default_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

// ── AvailabilityController ───────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Tracks at most one query at a time;
/// selecting a new one cancels whatever run is in flight and retargets
/// the change feed. Board snapshots are published through a watch
/// channel -- see [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct AvailabilityController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    client: BookingClient,
    window: OperatingWindow,
    board: watch::Sender<SlotBoard>,
    active: Mutex<ActiveQuery>,
    /// Newest issued run token. A run may publish only while its own
    /// token is still the newest.
    run_seq: AtomicU64,
    feed: Option<FeedHandle>,
    clock: Clock,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

struct ActiveQuery {
    query: Option<SlotQuery>,
    /// Cancels the in-flight run when the query moves on.
    run_cancel: CancellationToken,
}

impl AvailabilityController {
    /// Connect to the reservation service described by `config`.
    ///
    /// Builds the HTTP client, opens the change feed (unless disabled),
    /// and spawns the event dispatch task. The board starts `Idle`;
    /// call [`set_query`](Self::set_query) to begin tracking.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect(config: &ServiceConfig) -> Result<Self, CoreError> {
        let transport = build_transport(config);
        let client = BookingClient::new(&config.base_url, config.token.as_ref(), &transport)?;

        let cancel = CancellationToken::new();
        let (feed, events) = if config.feed_enabled {
            let url = client.feed_url()?;
            let bearer = config
                .token
                .as_ref()
                .map(|t| t.expose_secret().to_owned());
            let feed = FeedHandle::connect(
                url,
                bearer,
                ReconnectConfig::default(),
                cancel.child_token(),
            );
            let events = feed.subscribe();
            (Some(feed), events)
        } else {
            // No feed: hand the dispatch task a channel that is already
            // closed so it exits immediately.
            let (tx, rx) = broadcast::channel(1);
            drop(tx);
            (None, rx)
        };

        Ok(Self::assemble(
            client,
            config.window,
            events,
            feed,
            default_clock(),
            cancel,
        ))
    }

    /// Assemble a controller from pre-built parts.
    ///
    /// Lets tests inject their own event stream in place of a live feed.
    pub fn from_parts(
        client: BookingClient,
        window: OperatingWindow,
        events: broadcast::Receiver<FeedEvent>,
        feed: Option<FeedHandle>,
    ) -> Self {
        Self::assemble(
            client,
            window,
            events,
            feed,
            default_clock(),
            CancellationToken::new(),
        )
    }

    /// Like [`from_parts`](Self::from_parts), with an injected clock for
    /// deterministic past-cutoff stamping.
    pub fn from_parts_with_clock(
        client: BookingClient,
        window: OperatingWindow,
        events: broadcast::Receiver<FeedEvent>,
        feed: Option<FeedHandle>,
        clock: Clock,
    ) -> Self {
        Self::assemble(client, window, events, feed, clock, CancellationToken::new())
    }

    fn assemble(
        client: BookingClient,
        window: OperatingWindow,
        events: broadcast::Receiver<FeedEvent>,
        feed: Option<FeedHandle>,
        clock: Clock,
        cancel: CancellationToken,
    ) -> Self {
        let (board, _) = watch::channel(SlotBoard::default());

        let controller = Self {
            inner: Arc::new(ControllerInner {
                client,
                window,
                board,
                active: Mutex::new(ActiveQuery {
                    query: None,
                    run_cancel: cancel.child_token(),
                }),
                run_seq: AtomicU64::new(0),
                feed,
                clock,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        };

        let dispatch = tokio::spawn(event_dispatch_task(controller.clone(), events));
        controller
            .inner
            .task_handles
            .try_lock()
            .expect("no other lock holders during construction")
            .push(dispatch);

        controller
    }

    // ── Query lifecycle ──────────────────────────────────────────────

    /// Select the (date, court) the board should track.
    ///
    /// Cancels any in-flight run, moves the board to `Loading`,
    /// retargets the change feed, and starts a new derivation run. When
    /// the target is unchanged the previous slots stay on the board
    /// while the run is in flight; when it changed they are cleared.
    pub async fn set_query(&self, query: SlotQuery) {
        let mut active = self.inner.active.lock().await;

        let target = query.target();
        let target_changed = active.query.map(|q| q.target()) != Some(target);

        active.run_cancel.cancel();
        active.run_cancel = self.inner.cancel.child_token();
        active.query = Some(query);

        let seq = self.next_token();
        self.publish(seq, |board| {
            board.status = BoardStatus::Loading;
            board.target = Some(target);
            if target_changed {
                board.slots = Arc::default();
            }
        });

        if let Some(ref feed) = self.inner.feed {
            feed.set_filter(FeedFilter {
                date: target.date,
                court_id: target.court,
            });
        }

        let run_cancel = active.run_cancel.clone();
        drop(active);

        debug!(date = %query.date, court = %query.court, seq, "Query selected");
        self.spawn_run(query, seq, run_cancel);
    }

    /// Re-derive for the current query with a fresh clock reading.
    ///
    /// No-op when no query is selected.
    pub async fn refresh(&self) {
        let mut active = self.inner.active.lock().await;
        let Some(mut query) = active.query else {
            return;
        };

        query.reference_now = (self.inner.clock)();
        active.query = Some(query);

        active.run_cancel.cancel();
        active.run_cancel = self.inner.cancel.child_token();

        let seq = self.next_token();
        self.publish(seq, |board| {
            board.status = BoardStatus::Loading;
        });

        let run_cancel = active.run_cancel.clone();
        drop(active);

        self.spawn_run(query, seq, run_cancel);
    }

    /// Stop tracking. Cancels the in-flight run, clears the feed
    /// subscription, and resets the board to `Idle`.
    pub async fn clear_query(&self) {
        let mut active = self.inner.active.lock().await;
        active.query = None;
        active.run_cancel.cancel();
        active.run_cancel = self.inner.cancel.child_token();

        // Token issued under the lock, like set_query, so a concurrent
        // selection can't be overwritten by this reset.
        let seq = self.next_token();
        self.publish(seq, |board| {
            board.status = BoardStatus::Idle;
            board.target = None;
            board.slots = Arc::default();
        });
        drop(active);

        if let Some(ref feed) = self.inner.feed {
            feed.clear_filter();
        }
        debug!("Query cleared");
    }

    // ── State observation ────────────────────────────────────────────

    /// Current board snapshot.
    pub fn board(&self) -> SlotBoard {
        self.inner.board.borrow().clone()
    }

    /// Subscribe to board publishes.
    pub fn subscribe(&self) -> BoardStream {
        BoardStream::new(self.inner.board.subscribe())
    }

    /// The underlying service client, for direct reservation calls.
    pub fn client(&self) -> &BookingClient {
        &self.inner.client
    }

    /// The operating window slots are derived from.
    pub fn window(&self) -> OperatingWindow {
        self.inner.window
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Tear down: invalidate outstanding run tokens, cancel all
    /// background tasks, and close the change feed.
    pub async fn shutdown(&self) {
        self.next_token();
        self.inner.cancel.cancel();

        if let Some(ref feed) = self.inner.feed {
            feed.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("Controller shut down");
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Issue a fresh run token, invalidating all previously issued ones.
    fn next_token(&self) -> u64 {
        self.inner.run_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Write to the board iff `seq` is still the newest issued token.
    ///
    /// The check runs inside the watch channel's send closure, so a
    /// stale run can never overwrite a newer run's snapshot: the board
    /// converges on the newest query in issue order, not completion
    /// order. Returns whether the write was accepted.
    fn publish(&self, seq: u64, update: impl FnOnce(&mut SlotBoard)) -> bool {
        self.inner.board.send_if_modified(|board| {
            if seq != self.inner.run_seq.load(Ordering::SeqCst) {
                return false;
            }
            update(board);
            board.revision += 1;
            true
        })
    }

    fn spawn_run(&self, query: SlotQuery, seq: u64, run_cancel: CancellationToken) {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_derivation(query, seq, run_cancel).await;
        });
    }

    /// One derivation run: fetch confirmed reservations, apply the
    /// pipeline, publish. Cancellation and token staleness both keep
    /// the result off the board.
    async fn run_derivation(&self, query: SlotQuery, seq: u64, run_cancel: CancellationToken) {
        let outcome = tokio::select! {
            biased;
            _ = run_cancel.cancelled() => {
                debug!(seq, "Derivation run cancelled");
                return;
            }
            result = self.derive(&query) => result,
        };

        match outcome {
            Ok(derived) => {
                let accepted = self.publish(seq, |board| {
                    board.status = BoardStatus::Ready;
                    board.target = Some(query.target());
                    board.slots = Arc::from(derived);
                });
                if accepted {
                    debug!(seq, "Board published");
                } else {
                    debug!(seq, "Run result discarded (superseded)");
                }
            }
            Err(e) => {
                // Keep the last good slots on the board; stale data
                // beats an empty board when the service hiccups.
                let accepted = self.publish(seq, |board| {
                    board.status = BoardStatus::Failed {
                        reason: e.to_string(),
                    };
                    board.target = Some(query.target());
                });
                if accepted {
                    warn!(error = %e, seq, "Derivation run failed");
                }
            }
        }
    }

    async fn derive(&self, query: &SlotQuery) -> Result<Vec<TimeSlot>, CoreError> {
        let reservations = self
            .inner
            .client
            .fetch_confirmed(query.court, query.date)
            .await
            .map_err(store_error)?;
        slots::derive(self.inner.window, query, &reservations)
    }

    async fn current_target(&self) -> Option<SlotTarget> {
        self.inner.active.lock().await.query.map(|q| q.target())
    }
}

// ── One-shot derivation ──────────────────────────────────────────────

/// Derive a board once, without a controller: fetch confirmed
/// reservations and run the pipeline. Suited to CLI list commands --
/// no feed, no background tasks.
pub async fn derive_once(
    client: &BookingClient,
    window: OperatingWindow,
    query: &SlotQuery,
) -> Result<Vec<TimeSlot>, CoreError> {
    let reservations = client
        .fetch_confirmed(query.court, query.date)
        .await
        .map_err(store_error)?;
    slots::derive(window, query, &reservations)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Route feed events to derivation runs.
///
/// Reservation changes re-derive only when they touch the active
/// target; events for other dates or courts are dropped here. A feed
/// reconnect re-derives unconditionally, since changes may have been
/// missed while the connection was down.
async fn event_dispatch_task(
    controller: AvailabilityController,
    mut events: broadcast::Receiver<FeedEvent>,
) {
    let cancel = controller.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                match event {
                    Ok(FeedEvent::Changed(change)) => {
                        let Some(target) = controller.current_target().await else {
                            continue;
                        };
                        let relevant = change.reservation.court_id == target.court
                            && change.reservation.date == target.date;
                        if relevant {
                            debug!(action = %change.action, "Relevant change, re-deriving");
                            controller.refresh().await;
                        }
                    }
                    Ok(FeedEvent::Connected) => {
                        if controller.current_target().await.is_some() {
                            info!("Change feed connected, re-deriving");
                            controller.refresh().await;
                        }
                    }
                    Ok(FeedEvent::Disconnected) => {
                        debug!("Change feed disconnected");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Feed consumer lagged, re-deriving");
                        controller.refresh().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("Event dispatch exiting");
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Classify a client failure from the store read path: transport-level
/// failures surface as [`CoreError::StoreUnavailable`], protocol errors
/// keep their identity.
fn store_error(err: courtly_api::Error) -> CoreError {
    if err.is_transient() {
        CoreError::StoreUnavailable {
            reason: err.to_string(),
        }
    } else {
        err.into()
    }
}

/// Build a [`TransportConfig`] from the service configuration.
fn build_transport(config: &ServiceConfig) -> TransportConfig {
    TransportConfig {
        tls: match config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use courtly_api::SlotTime;

    fn offline_client() -> BookingClient {
        // Never actually called in these tests.
        BookingClient::new("http://127.0.0.1:9", None, &TransportConfig::default()).unwrap()
    }

    fn controller() -> AvailabilityController {
        let (_tx, rx) = broadcast::channel(4);
        AvailabilityController::from_parts(offline_client(), OperatingWindow::default(), rx, None)
    }

    fn slot(hour: u32) -> TimeSlot {
        TimeSlot {
            start: SlotTime::from_hour(hour).unwrap(),
            end: SlotTime::from_hour(hour + 1).unwrap(),
            available: true,
        }
    }

    #[tokio::test]
    async fn newest_token_wins_publish() {
        let c = controller();

        let seq1 = c.next_token();
        let seq2 = c.next_token();

        assert!(
            !c.publish(seq1, |b| b.status = BoardStatus::Ready),
            "stale token must not publish"
        );
        assert!(c.publish(seq2, |b| b.status = BoardStatus::Ready));
        assert_eq!(c.board().status, BoardStatus::Ready);
    }

    #[tokio::test]
    async fn rejected_publish_leaves_the_board_untouched() {
        let c = controller();

        let seq1 = c.next_token();
        let seq2 = c.next_token();

        c.publish(seq2, |b| {
            b.status = BoardStatus::Ready;
            b.slots = Arc::from(vec![slot(19)]);
        });
        let before = c.board();
        assert_eq!(before.revision, 1);

        c.publish(seq1, |b| {
            b.status = BoardStatus::Failed {
                reason: "late failure from a superseded run".into(),
            };
            b.slots = Arc::default();
        });

        let after = c.board();
        assert_eq!(after.revision, 1);
        assert_eq!(after.status, BoardStatus::Ready);
        assert_eq!(after.slots.len(), 1);
    }

    #[tokio::test]
    async fn clear_query_resets_the_board() {
        let c = controller();

        let seq = c.next_token();
        c.publish(seq, |b| {
            b.status = BoardStatus::Ready;
            b.slots = Arc::from(vec![slot(19), slot(20)]);
        });

        c.clear_query().await;

        let board = c.board();
        assert_eq!(board.status, BoardStatus::Idle);
        assert!(board.target.is_none());
        assert!(board.slots.is_empty());
        assert_eq!(board.revision, 2, "revision keeps climbing across resets");
    }

    #[tokio::test]
    async fn shutdown_invalidates_outstanding_tokens() {
        let c = controller();
        let seq = c.next_token();

        c.shutdown().await;

        assert!(!c.publish(seq, |b| b.status = BoardStatus::Ready));
        assert_eq!(c.board().status, BoardStatus::Idle);
    }

    #[test]
    fn transient_store_failures_become_store_unavailable() {
        let err = store_error(courtly_api::Error::Timeout { timeout_secs: 5 });
        assert!(matches!(err, CoreError::StoreUnavailable { .. }));

        let err = store_error(courtly_api::Error::FeedConnect("connection refused".into()));
        assert!(matches!(err, CoreError::StoreUnavailable { .. }));
    }

    #[test]
    fn protocol_errors_pass_through_store_classification() {
        let err = store_error(courtly_api::Error::Unauthorized {
            message: "token expired".into(),
        });
        assert!(matches!(err, CoreError::Unauthorized { .. }));

        let err = store_error(courtly_api::Error::NotFound {
            message: "court 99".into(),
        });
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
