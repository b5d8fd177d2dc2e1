use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{error::DeliveryError, state::match_aggregate::MatchId};

/// Identifier of one viewer connection.
pub type ConnectionId = Uuid;

#[derive(Clone, Debug)]
/// Handle used to push frames to a connected viewer through its writer task.
pub struct ViewerConnection {
    /// Unique per socket.
    pub id: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
}

impl ViewerConnection {
    /// Wrap the outbound queue of a socket writer task under a fresh identifier.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// Queue a text frame; fails once the writer task has stopped.
    pub fn send_text(&self, payload: &str) -> Result<(), DeliveryError> {
        self.send(Message::Text(payload.to_owned().into()))
    }

    /// Queue any frame for the writer task.
    pub fn send(&self, message: Message) -> Result<(), DeliveryError> {
        self.tx
            .send(message)
            .map_err(|_| DeliveryError::ConnectionClosed)
    }
}

/// Outcome of a fanout pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was queued for.
    pub delivered: usize,
    /// Connections registered when the pass started.
    pub total: usize,
}

impl BroadcastReport {
    /// Connections that were dropped during the pass.
    pub fn failed(&self) -> usize {
        self.total - self.delivered
    }
}

/// Live viewer connections grouped by the match they watch.
#[derive(Default)]
pub struct ConnectionRegistry {
    topics: DashMap<MatchId, HashMap<ConnectionId, ViewerConnection>>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a match, creating the entry when it is the first viewer.
    pub fn register(&self, match_id: MatchId, connection: ViewerConnection) {
        let mut viewers = self.topics.entry(match_id).or_default();
        viewers.insert(connection.id, connection);
        info!(
            match_id,
            total = viewers.len(),
            "viewer connected to match"
        );
    }

    /// Remove a connection, dropping the match entry once it is empty.
    ///
    /// Returns `false` when the connection was already gone, so callers can tell which
    /// path performed the removal.
    pub fn unregister(&self, match_id: MatchId, connection_id: ConnectionId) -> bool {
        let Entry::Occupied(mut entry) = self.topics.entry(match_id) else {
            debug!(match_id, %connection_id, "no viewers registered for match");
            return false;
        };

        let removed = entry.get_mut().remove(&connection_id).is_some();
        if entry.get().is_empty() {
            entry.remove();
            debug!(match_id, "last viewer left; match entry dropped");
        }
        if removed {
            info!(match_id, %connection_id, "viewer disconnected from match");
        }
        removed
    }

    /// Deliver `payload` to every viewer of a match, then drop the viewers that failed.
    ///
    /// Delivery runs over a snapshot taken before the pass, so viewers joining or leaving
    /// concurrently neither corrupt the iteration nor receive duplicates.
    pub fn broadcast(&self, match_id: MatchId, payload: &str) -> BroadcastReport {
        let snapshot: Vec<ViewerConnection> = match self.topics.get(&match_id) {
            Some(viewers) => viewers.values().cloned().collect(),
            None => {
                debug!(match_id, "no active viewers for match");
                return BroadcastReport::default();
            }
        };

        let total = snapshot.len();
        let failed: Vec<ConnectionId> = snapshot
            .iter()
            .filter_map(|connection| match connection.send_text(payload) {
                Ok(()) => None,
                Err(err) => {
                    warn!(match_id, connection_id = %connection.id, error = %err, "failed to deliver update");
                    Some(connection.id)
                }
            })
            .collect();

        for connection_id in &failed {
            self.unregister(match_id, *connection_id);
        }

        let report = BroadcastReport {
            delivered: total - failed.len(),
            total,
        };
        info!(
            match_id,
            delivered = report.delivered,
            total = report.total,
            "broadcast {}/{} viewers",
            report.delivered,
            report.total
        );
        report
    }

    /// Number of viewers currently watching a match.
    pub fn viewer_count(&self, match_id: MatchId) -> usize {
        self.topics
            .get(&match_id)
            .map(|viewers| viewers.len())
            .unwrap_or(0)
    }

    /// Whether any viewer entry exists for a match.
    pub fn has_match(&self, match_id: MatchId) -> bool {
        self.topics.contains_key(&match_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (ViewerConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ViewerConnection::new(tx), rx)
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn register_creates_entry_and_unregister_drops_it() {
        let registry = ConnectionRegistry::new();
        let (viewer, _rx) = connection();
        let id = viewer.id;

        registry.register(7, viewer);
        assert!(registry.has_match(7));
        assert_eq!(registry.viewer_count(7), 1);

        assert!(registry.unregister(7, id));
        assert!(!registry.has_match(7));
        assert_eq!(registry.viewer_count(7), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (viewer, _rx) = connection();
        let id = viewer.id;
        registry.register(1, viewer);

        assert!(registry.unregister(1, id));
        assert!(!registry.unregister(1, id));
        assert!(!registry.unregister(99, id));
    }

    #[test]
    fn broadcast_reaches_every_viewer_of_the_match_only() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = connection();
        let (second, mut second_rx) = connection();
        let (other, mut other_rx) = connection();
        registry.register(1, first);
        registry.register(1, second);
        registry.register(2, other);

        let report = registry.broadcast(1, "{\"runs\":6}");

        assert_eq!(report, BroadcastReport { delivered: 2, total: 2 });
        assert_eq!(text(first_rx.try_recv().unwrap()), "{\"runs\":6}");
        assert_eq!(text(second_rx.try_recv().unwrap()), "{\"runs\":6}");
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn failing_viewer_is_removed_and_others_still_receive() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = connection();
        let (broken, broken_rx) = connection();
        let (third, mut third_rx) = connection();
        let first_id = first.id;
        let third_id = third.id;
        registry.register(3, first);
        registry.register(3, broken);
        registry.register(3, third);
        drop(broken_rx);

        let report = registry.broadcast(3, "update");

        assert_eq!(report.delivered, 2);
        assert_eq!(report.total, 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(registry.viewer_count(3), 2);
        assert_eq!(text(first_rx.try_recv().unwrap()), "update");
        assert_eq!(text(third_rx.try_recv().unwrap()), "update");

        registry.unregister(3, first_id);
        assert!(registry.has_match(3));
        registry.unregister(3, third_id);
        assert!(!registry.has_match(3));
    }

    #[test]
    fn broadcast_to_unknown_match_is_empty() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.broadcast(11, "x"), BroadcastReport::default());
        assert!(!registry.has_match(11));
    }

    #[test]
    fn all_failures_drop_the_match_entry() {
        let registry = ConnectionRegistry::new();
        let (viewer, rx) = connection();
        registry.register(4, viewer);
        drop(rx);

        let report = registry.broadcast(4, "x");
        assert_eq!(report, BroadcastReport { delivered: 0, total: 1 });
        assert!(!registry.has_match(4));
    }

    #[tokio::test]
    async fn concurrent_joins_during_broadcast_are_not_lost() {
        let registry = std::sync::Arc::new(ConnectionRegistry::new());
        let mut receivers = Vec::new();
        for _ in 0..8 {
            let (viewer, rx) = connection();
            registry.register(5, viewer);
            receivers.push(rx);
        }

        let joiner = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut late = Vec::new();
                for _ in 0..32 {
                    let (viewer, rx) = connection();
                    registry.register(5, viewer);
                    late.push(rx);
                    tokio::task::yield_now().await;
                }
                late
            })
        };

        for round in 0..16 {
            let report = registry.broadcast(5, &format!("round-{round}"));
            assert!(report.total >= 8);
            assert_eq!(report.delivered, report.total);
            tokio::task::yield_now().await;
        }
        let late = joiner.await.unwrap();

        assert_eq!(registry.viewer_count(5), 8 + late.len());
        for mut rx in receivers {
            let mut received = 0;
            while rx.try_recv().is_ok() {
                received += 1;
            }
            assert_eq!(received, 16);
        }
    }
}
