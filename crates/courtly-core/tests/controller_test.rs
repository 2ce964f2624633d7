#![allow(clippy::unwrap_used)]
// End-to-end tests for `AvailabilityController` against a wiremock
// service: query lifecycle, stale-run suppression, feed-driven
// re-derivation, and failure handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courtly_api::{BookingClient, TransportConfig};
use courtly_core::{
    AvailabilityController, BoardStatus, BoardStream, ChangeAction, Clock, CourtId, FeedEvent,
    OperatingWindow, ReservationChange, ReservationId, ReservationRecord, ReservationStatus,
    SlotBoard, SlotQuery, SlotTime,
};

// ── Helpers ─────────────────────────────────────────────────────────

const COURT: CourtId = CourtId(3);

fn date_a() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 12).unwrap()
}

fn date_b() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 13).unwrap()
}

/// 09:00 on date A: before the evening window opens, so the past
/// cutoff never interferes with these tests.
fn morning() -> NaiveDateTime {
    date_a().and_hms_opt(9, 0, 0).unwrap()
}

fn fixed_clock(now: NaiveDateTime) -> Clock {
    Arc::new(move || now)
}

fn query(date: NaiveDate) -> SlotQuery {
    SlotQuery::new(date, COURT, morning())
}

fn reservation_json(date: NaiveDate, start: &str, end: &str) -> serde_json::Value {
    json!({
        "id": 501,
        "court_id": 3,
        "date": date.to_string(),
        "start_time": start,
        "end_time": end,
        "status": "confirmed",
        "user_ref": "u-3021"
    })
}

fn change_for(date: NaiveDate) -> FeedEvent {
    FeedEvent::Changed(ReservationChange {
        action: ChangeAction::Created,
        reservation: ReservationRecord {
            id: ReservationId(501),
            court_id: COURT,
            date,
            start_time: SlotTime::from_hour(19).unwrap(),
            end_time: SlotTime::from_hour(20).unwrap(),
            status: ReservationStatus::Confirmed,
            user_ref: "u-3021".into(),
        },
    })
}

/// (controller, event sender) wired to the given mock server.
async fn harness(server: &MockServer) -> (AvailabilityController, broadcast::Sender<FeedEvent>) {
    let client = BookingClient::new(&server.uri(), None, &TransportConfig::default()).unwrap();
    let (tx, rx) = broadcast::channel(16);
    let controller = AvailabilityController::from_parts_with_clock(
        client,
        OperatingWindow::default(),
        rx,
        None,
        fixed_clock(morning()),
    );
    (controller, tx)
}

/// Await board states until `pred` holds, with a hard timeout.
async fn wait_for(
    stream: &mut BoardStream,
    mut pred: impl FnMut(&SlotBoard) -> bool,
) -> SlotBoard {
    for _ in 0..100 {
        let board = stream.latest();
        if pred(&board) {
            return board;
        }
        match tokio::time::timeout(Duration::from_secs(3), stream.changed()).await {
            Ok(Some(_)) => {}
            Ok(None) => panic!("controller dropped before the expected state"),
            Err(_) => panic!("timed out waiting for board state, last: {board:?}"),
        }
    }
    panic!("board never reached the expected state");
}

fn mock_reservations(date: NaiveDate, body: serde_json::Value) -> Mock {
    Mock::given(method("GET"))
        .and(path("/api/v1/reservations"))
        .and(query_param("date", date.to_string()))
        .and(query_param("status", "confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

// ── Query lifecycle ─────────────────────────────────────────────────

#[tokio::test]
async fn set_query_derives_a_ready_board() {
    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([reservation_json(date_a(), "19:00:00", "20:00:00")]))
        .mount(&server)
        .await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    let board = wait_for(&mut stream, |b| b.status.is_ready()).await;

    assert_eq!(board.target.unwrap().date, date_a());
    assert_eq!(board.slots.len(), 8);
    assert_eq!(board.available_count(), 7);
    let blocked = board
        .slot_starting(SlotTime::from_hour(19).unwrap())
        .unwrap();
    assert!(!blocked.available);

    controller.shutdown().await;
}

#[tokio::test]
async fn switching_targets_clears_slots_while_loading() {
    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([])).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reservations"))
        .and(query_param("date", date_b().to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    wait_for(&mut stream, |b| b.status.is_ready()).await;

    controller.set_query(query(date_b())).await;
    let loading = stream.latest();
    assert_eq!(loading.status, BoardStatus::Loading);
    assert_eq!(loading.target.unwrap().date, date_b());
    assert!(
        loading.slots.is_empty(),
        "previous target's slots must not linger"
    );

    let ready = wait_for(&mut stream, |b| b.status.is_ready()).await;
    assert_eq!(ready.slots.len(), 8);

    controller.shutdown().await;
}

#[tokio::test]
async fn refresh_keeps_slots_on_the_board_while_loading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reservations"))
        .and(query_param("date", date_a().to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    wait_for(&mut stream, |b| b.status.is_ready()).await;

    controller.refresh().await;
    let loading = stream.latest();
    assert_eq!(loading.status, BoardStatus::Loading);
    assert_eq!(loading.slots.len(), 8, "same target keeps the stale board");

    controller.shutdown().await;
}

#[tokio::test]
async fn clear_query_returns_to_idle() {
    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([])).mount(&server).await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    wait_for(&mut stream, |b| b.status.is_ready()).await;

    controller.clear_query().await;
    let board = wait_for(&mut stream, |b| b.status == BoardStatus::Idle).await;
    assert!(board.target.is_none());
    assert!(board.slots.is_empty());

    controller.shutdown().await;
}

// ── Stale-run suppression ───────────────────────────────────────────

#[tokio::test]
async fn newest_query_wins_even_when_an_older_run_finishes_last() {
    let server = MockServer::start().await;
    // Date A answers slowly and carries a reservation; date B answers
    // instantly and is empty. Selecting A then B must leave B's board
    // in place even after A's response finally arrives.
    Mock::given(method("GET"))
        .and(path("/api/v1/reservations"))
        .and(query_param("date", date_a().to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([reservation_json(date_a(), "19:00:00", "20:00:00")]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mock_reservations(date_b(), json!([])).mount(&server).await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    controller.set_query(query(date_b())).await;

    let board = wait_for(&mut stream, |b| b.status.is_ready()).await;
    assert_eq!(board.target.unwrap().date, date_b());
    assert!(board.slots.iter().all(|s| s.available));
    let settled_revision = board.revision;

    // Give A's run ample time to complete; its result must be discarded.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let latest = controller.board();
    assert_eq!(latest.revision, settled_revision, "no publish after B");
    assert_eq!(latest.target.unwrap().date, date_b());
    assert!(latest.slots.iter().all(|s| s.available));

    controller.shutdown().await;
}

// ── Feed-driven re-derivation ───────────────────────────────────────

#[tokio::test]
async fn change_for_the_active_target_rederives() {
    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_reservations(date_a(), json!([reservation_json(date_a(), "19:00:00", "20:00:00")]))
        .mount(&server)
        .await;

    let (controller, tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    let first = wait_for(&mut stream, |b| b.status.is_ready()).await;
    assert_eq!(first.available_count(), 8);

    tx.send(change_for(date_a())).unwrap();

    let rederived = wait_for(&mut stream, |b| {
        b.status.is_ready() && b.available_count() == 7
    })
    .await;
    let blocked = rederived
        .slot_starting(SlotTime::from_hour(19).unwrap())
        .unwrap();
    assert!(!blocked.available);

    controller.shutdown().await;
}

#[tokio::test]
async fn change_for_another_target_is_ignored() {
    let server = MockServer::start().await;
    mock_reservations(date_b(), json!([])).mount(&server).await;

    let (controller, tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_b())).await;
    let board = wait_for(&mut stream, |b| b.status.is_ready()).await;
    let settled_revision = board.revision;

    // A change for date A while the board tracks date B.
    tx.send(change_for(date_a())).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let latest = controller.board();
    assert_eq!(latest.revision, settled_revision, "irrelevant change must not publish");
    assert_eq!(latest.status, BoardStatus::Ready);

    controller.shutdown().await;
}

#[tokio::test]
async fn feed_reconnect_rederives() {
    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_reservations(date_a(), json!([reservation_json(date_a(), "19:00:00", "20:00:00")]))
        .mount(&server)
        .await;

    let (controller, tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    wait_for(&mut stream, |b| b.status.is_ready()).await;

    // Changes may have been missed while the feed was down; a
    // reconnect re-reads the service state.
    tx.send(FeedEvent::Connected).unwrap();

    let rederived = wait_for(&mut stream, |b| {
        b.status.is_ready() && b.available_count() == 7
    })
    .await;
    assert_eq!(rederived.target.unwrap().date, date_a());

    controller.shutdown().await;
}

// ── Failure handling ────────────────────────────────────────────────

#[tokio::test]
async fn failed_run_preserves_the_previous_board() {
    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([reservation_json(date_a(), "19:00:00", "20:00:00")]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reservations"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "database unavailable"
        })))
        .mount(&server)
        .await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    let ready = wait_for(&mut stream, |b| b.status.is_ready()).await;
    assert_eq!(ready.available_count(), 7);

    controller.refresh().await;
    let failed = wait_for(&mut stream, |b| b.status.is_failed()).await;

    assert_eq!(failed.slots.len(), 8, "stale slots stay on the board");
    assert_eq!(failed.available_count(), 7);
    match failed.status {
        BoardStatus::Failed { ref reason } => {
            assert!(reason.contains("database unavailable"), "reason: {reason}");
        }
        ref other => panic!("expected Failed, got {other:?}"),
    }

    controller.shutdown().await;
}

#[tokio::test]
async fn failed_board_recovers_on_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reservations"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "warming up"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_reservations(date_a(), json!([])).mount(&server).await;

    let (controller, _tx) = harness(&server).await;
    let mut stream = controller.subscribe();

    controller.set_query(query(date_a())).await;
    let failed = wait_for(&mut stream, |b| b.status.is_failed()).await;
    assert!(failed.slots.is_empty(), "nothing good to show yet");

    controller.refresh().await;
    let ready = wait_for(&mut stream, |b| b.status.is_ready()).await;
    assert_eq!(ready.slots.len(), 8);

    controller.shutdown().await;
}

// ── Stream adapter ──────────────────────────────────────────────────

#[tokio::test]
async fn into_stream_yields_published_boards() {
    use futures_util::StreamExt;

    let server = MockServer::start().await;
    mock_reservations(date_a(), json!([])).mount(&server).await;

    let (controller, _tx) = harness(&server).await;
    let mut boards = controller.subscribe().into_stream();

    controller.set_query(query(date_a())).await;

    let mut saw_ready = false;
    for _ in 0..10 {
        let Ok(Some(board)) =
            tokio::time::timeout(Duration::from_secs(3), boards.next()).await
        else {
            break;
        };
        if board.status.is_ready() {
            assert_eq!(board.slots.len(), 8);
            saw_ready = true;
            break;
        }
    }
    assert!(saw_ready, "stream never yielded a ready board");

    controller.shutdown().await;
}
