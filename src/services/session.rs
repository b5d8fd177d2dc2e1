use std::{fmt::Display, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ControlFrame, InitialSnapshot, PING, PONG},
    state::{SharedState, match_aggregate::MatchId, registry::ViewerConnection},
};

/// Why a viewer session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The viewer closed the channel or the stream ended.
    Disconnected,
    /// Reading from the socket failed.
    ReceiveError,
    /// The writer task stopped, so nothing more can be delivered.
    WriteFailed,
    /// Too many consecutive receive timeouts under the strict liveness policy.
    Idle,
}

/// Handle the full lifecycle of one viewer WebSocket watching `match_id`.
pub async fn handle_socket(state: SharedState, socket: WebSocket, match_id: MatchId) {
    let (sender, receiver) = socket.split();
    let end = run_session(state, match_id, sender, receiver).await;
    debug!(match_id, reason = ?end, "viewer session finished");
}

/// Drive a viewer session over any frame sink and stream.
///
/// The session registers the viewer, sends the initial snapshot, then runs the heartbeat
/// and receive loops together. Whichever terminal condition comes first cancels the
/// heartbeat, unregisters the viewer once and drains the writer.
pub async fn run_session<S, R, E>(
    state: SharedState,
    match_id: MatchId,
    mut sink: S,
    mut stream: R,
) -> SessionEnd
where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing while we await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let connection = ViewerConnection::new(outbound_tx);
    let connection_id = connection.id;
    state.registry().register(match_id, connection.clone());

    send_initial_snapshot(&state, match_id, &connection).await;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut heartbeat = tokio::spawn(run_heartbeat(
        connection.clone(),
        match_id,
        state.config().heartbeat_interval,
        cancel_rx,
    ));

    let end = receive_loop(
        &state,
        match_id,
        &connection,
        &mut stream,
        &mut heartbeat,
    )
    .await;

    let _ = cancel_tx.send(true);
    if end != SessionEnd::WriteFailed {
        let _ = heartbeat.await;
    }

    if !state.registry().unregister(match_id, connection_id) {
        debug!(match_id, %connection_id, "viewer already removed by a failed broadcast");
    }
    if end == SessionEnd::Idle {
        let _ = connection.send(Message::Close(None));
    }
    info!(match_id, %connection_id, reason = ?end, "viewer session closed");

    finalize(writer_task, connection).await;
    end
}

async fn send_initial_snapshot(state: &SharedState, match_id: MatchId, connection: &ViewerConnection) {
    let aggregate = match state.load_match(match_id).await {
        Ok(aggregate) => aggregate,
        Err(err) => {
            warn!(match_id, error = %err, "no initial snapshot for viewer");
            return;
        }
    };

    let message = InitialSnapshot::from(aggregate);
    let payload = match serde_json::to_string(&message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(match_id, error = %err, "failed to serialize initial snapshot");
            return;
        }
    };
    if let Err(err) = connection.send_text(&payload) {
        warn!(match_id, connection_id = %connection.id, error = %err, "failed to queue initial snapshot");
    }
}

/// Write a liveness probe every `every` until cancelled or the writer stops.
async fn run_heartbeat(
    connection: ViewerConnection,
    match_id: MatchId,
    every: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    debug!(match_id, connection_id = %connection.id, "heartbeat cancelled");
                    return;
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = connection.send_text(PING) {
                    warn!(match_id, connection_id = %connection.id, error = %err, "heartbeat write failed");
                    return;
                }
                debug!(match_id, connection_id = %connection.id, "heartbeat sent");
            }
        }
    }
}

async fn receive_loop<R, E>(
    state: &SharedState,
    match_id: MatchId,
    connection: &ViewerConnection,
    stream: &mut R,
    heartbeat: &mut JoinHandle<()>,
) -> SessionEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let receive_timeout = state.config().receive_timeout;
    let max_missed = state.config().max_missed_receives;
    let mut missed: u32 = 0;

    loop {
        let frame = tokio::select! {
            _ = &mut *heartbeat => return SessionEnd::WriteFailed,
            frame = timeout(receive_timeout, stream.next()) => frame,
        };

        let message = match frame {
            Err(_) => {
                missed += 1;
                warn!(match_id, connection_id = %connection.id, missed, "no frame from viewer within receive timeout");
                if max_missed.is_some_and(|max| missed >= max) {
                    return SessionEnd::Idle;
                }
                continue;
            }
            Ok(None) => return SessionEnd::Disconnected,
            Ok(Some(Err(err))) => {
                warn!(match_id, connection_id = %connection.id, error = %err, "websocket receive error");
                return SessionEnd::ReceiveError;
            }
            Ok(Some(Ok(message))) => message,
        };
        missed = 0;

        match message {
            Message::Text(text) => match ControlFrame::parse(text.as_str()) {
                Some(ControlFrame::Ping) => {
                    if connection.send_text(PONG).is_err() {
                        return SessionEnd::WriteFailed;
                    }
                }
                Some(ControlFrame::Pong) => {
                    debug!(match_id, connection_id = %connection.id, "viewer confirmed liveness");
                }
                None => {
                    debug!(match_id, connection_id = %connection.id, payload = text.as_str(), "ignoring viewer message");
                }
            },
            Message::Close(_) => return SessionEnd::Disconnected,
            // Protocol pings are answered by the websocket layer itself.
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

async fn finalize(writer_task: JoinHandle<()>, connection: ViewerConnection) {
    drop(connection);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::channel::mpsc as futures_mpsc;
    use tokio::time::sleep;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::{MatchStore, memory::MemoryMatchStore},
        pubsub::memory::MemoryBus,
        state::{AppState, match_aggregate::NewMatch},
    };

    type Inbound = futures_mpsc::UnboundedSender<Result<Message, axum::Error>>;
    type Outbound = futures_mpsc::UnboundedReceiver<Message>;

    struct Harness {
        state: SharedState,
        match_id: MatchId,
        inbound: Inbound,
        outbound: Outbound,
        session: JoinHandle<SessionEnd>,
    }

    async fn start(config: AppConfig) -> Harness {
        let state = AppState::new(config, Arc::new(MemoryBus::default()));
        let store = MemoryMatchStore::new();
        let created = store
            .create_match(NewMatch {
                tournament_id: 1,
                team1_id: 2,
                team2_id: 3,
            })
            .await
            .unwrap();
        state.install_match_store(Arc::new(store)).await;

        let (sink, outbound) = futures_mpsc::unbounded::<Message>();
        let (inbound, stream) = futures_mpsc::unbounded::<Result<Message, axum::Error>>();
        let session = tokio::spawn(run_session(state.clone(), created.id, sink, stream));
        Harness {
            state,
            match_id: created.id,
            inbound,
            outbound,
            session,
        }
    }

    fn quiet_config() -> AppConfig {
        AppConfig {
            heartbeat_interval: Duration::from_secs(3600),
            receive_timeout: Duration::from_secs(3600),
            ..AppConfig::default()
        }
    }

    async fn next_text(outbound: &mut Outbound) -> String {
        match timeout(Duration::from_secs(1), outbound.next()).await {
            Ok(Some(Message::Text(text))) => text.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    fn text_frame(text: &str) -> Result<Message, axum::Error> {
        Ok(Message::Text(text.to_owned().into()))
    }

    #[tokio::test]
    async fn sends_snapshot_and_answers_ping() {
        let mut harness = start(quiet_config()).await;

        let snapshot: serde_json::Value =
            serde_json::from_str(&next_text(&mut harness.outbound).await).unwrap();
        assert_eq!(snapshot["type"], "initial");
        assert_eq!(snapshot["matchId"], harness.match_id);
        assert_eq!(snapshot["status"], "Scheduled");
        assert_eq!(harness.state.registry().viewer_count(harness.match_id), 1);

        harness.inbound.unbounded_send(text_frame("ping")).unwrap();
        assert_eq!(next_text(&mut harness.outbound).await, "pong");

        harness.inbound.unbounded_send(text_frame("pong")).unwrap();
        harness.inbound.unbounded_send(text_frame("hello")).unwrap();
        harness.inbound.unbounded_send(text_frame("ping")).unwrap();
        assert_eq!(next_text(&mut harness.outbound).await, "pong");
    }

    #[tokio::test]
    async fn protocol_ping_gets_no_extra_reply() {
        let mut harness = start(quiet_config()).await;
        next_text(&mut harness.outbound).await;

        harness
            .inbound
            .unbounded_send(Ok(Message::Ping(axum::body::Bytes::from_static(b"hb"))))
            .unwrap();
        harness.inbound.unbounded_send(text_frame("ping")).unwrap();
        assert_eq!(next_text(&mut harness.outbound).await, "pong");
    }

    #[tokio::test]
    async fn disconnect_unregisters_exactly_once() {
        let mut harness = start(quiet_config()).await;
        next_text(&mut harness.outbound).await;

        drop(harness.inbound);
        let end = timeout(Duration::from_secs(1), harness.session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::Disconnected);
        assert!(!harness.state.registry().has_match(harness.match_id));
    }

    #[tokio::test]
    async fn receive_error_ends_the_session() {
        let mut harness = start(quiet_config()).await;
        next_text(&mut harness.outbound).await;

        harness
            .inbound
            .unbounded_send(Err(axum::Error::new(std::io::Error::other("reset"))))
            .unwrap();
        let end = timeout(Duration::from_secs(1), harness.session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::ReceiveError);
        assert!(!harness.state.registry().has_match(harness.match_id));
    }

    #[tokio::test]
    async fn heartbeat_sends_ping_on_interval() {
        let mut harness = start(AppConfig {
            heartbeat_interval: Duration::from_millis(20),
            ..quiet_config()
        })
        .await;
        next_text(&mut harness.outbound).await;

        assert_eq!(next_text(&mut harness.outbound).await, "ping");
        assert_eq!(next_text(&mut harness.outbound).await, "ping");
    }

    #[tokio::test]
    async fn broadcast_reaches_session() {
        let mut harness = start(quiet_config()).await;
        next_text(&mut harness.outbound).await;

        let report = harness
            .state
            .registry()
            .broadcast(harness.match_id, "{\"runs\":4}");
        assert_eq!(report.delivered, 1);
        assert_eq!(next_text(&mut harness.outbound).await, "{\"runs\":4}");
    }

    #[tokio::test]
    async fn receive_timeout_alone_keeps_the_viewer() {
        let harness = start(AppConfig {
            receive_timeout: Duration::from_millis(10),
            ..quiet_config()
        })
        .await;

        sleep(Duration::from_millis(80)).await;
        assert!(!harness.session.is_finished());
        assert_eq!(harness.state.registry().viewer_count(harness.match_id), 1);
        harness.session.abort();
    }

    #[tokio::test]
    async fn strict_policy_closes_idle_viewer() {
        let mut harness = start(AppConfig {
            receive_timeout: Duration::from_millis(10),
            max_missed_receives: Some(3),
            ..quiet_config()
        })
        .await;
        next_text(&mut harness.outbound).await;

        let end = timeout(Duration::from_secs(1), harness.session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::Idle);
        assert!(!harness.state.registry().has_match(harness.match_id));
        assert!(matches!(
            timeout(Duration::from_secs(1), harness.outbound.next()).await,
            Ok(Some(Message::Close(None)))
        ));
    }

    #[tokio::test]
    async fn failed_writes_stop_the_heartbeat_and_session() {
        let harness = start(AppConfig {
            heartbeat_interval: Duration::from_millis(20),
            ..quiet_config()
        })
        .await;
        drop(harness.outbound);

        let end = timeout(Duration::from_secs(1), harness.session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::WriteFailed);
        assert!(!harness.state.registry().has_match(harness.match_id));
    }

    #[tokio::test]
    async fn unknown_match_still_serves_control_frames() {
        let state = AppState::new(quiet_config(), Arc::new(MemoryBus::default()));
        state
            .install_match_store(Arc::new(MemoryMatchStore::new()))
            .await;
        let (sink, mut outbound) = futures_mpsc::unbounded::<Message>();
        let (inbound, stream) = futures_mpsc::unbounded::<Result<Message, axum::Error>>();
        let session = tokio::spawn(run_session(state.clone(), 77, sink, stream));

        inbound.unbounded_send(text_frame("ping")).unwrap();
        assert_eq!(next_text(&mut outbound).await, "pong");
        drop(inbound);
        assert_eq!(session.await.unwrap(), SessionEnd::Disconnected);
        assert!(!state.registry().has_match(77));
    }
}
