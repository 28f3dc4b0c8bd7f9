//! In-process peer link
//!
//! A broker shared by every peer in the process: it maps session
//! identifiers to listeners and pairs up connections. Delivery is
//! synchronous into the receiving peer's event queue, so ordering matches
//! send order exactly. Used by tests and single-process demos.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::remote::link::{
    Connection, ConnectionId, LinkError, LinkEvent, LinkEvents, Listener, ListenerId, PeerLink,
};
use crate::remote::session::SessionId;

struct ListenerEntry {
    id: ListenerId,
    events: LinkEvents,
}

struct Endpoint {
    remote: ConnectionId,
    events: LinkEvents,
}

#[derive(Default)]
struct BrokerState {
    listeners: HashMap<SessionId, ListenerEntry>,
    endpoints: HashMap<ConnectionId, Endpoint>,
}

impl BrokerState {
    /// Drop both ends of a pair and tell each side
    fn sever(&mut self, id: ConnectionId) -> bool {
        let Some(local) = self.endpoints.remove(&id) else {
            return false;
        };
        let _ = local.events.send(LinkEvent::Closed(id));
        if let Some(remote) = self.endpoints.remove(&local.remote) {
            let _ = remote.events.send(LinkEvent::Closed(local.remote));
        }
        true
    }
}

/// Shared in-process broker; clone it for every peer
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        lock(&self.state)
    }

    /// Whether a listener is bound to `id`
    pub fn is_listening(&self, id: &SessionId) -> bool {
        self.lock().listeners.contains_key(id)
    }

    /// Number of live connection ends
    pub fn open_endpoints(&self) -> usize {
        self.lock().endpoints.len()
    }

    /// Tear down a connection as if the network dropped it
    pub fn drop_connection(&self, id: ConnectionId) -> bool {
        self.lock().sever(id)
    }
}

impl PeerLink for MemoryBroker {
    fn listen(
        &mut self,
        id: &SessionId,
        events: LinkEvents,
    ) -> Result<Box<dyn Listener>, LinkError> {
        let listener_id = ListenerId::new();
        let mut state = self.lock();
        if state.listeners.contains_key(id) {
            let _ = events.send(LinkEvent::ListenerError(
                listener_id,
                LinkError::UnavailableId(id.to_string()),
            ));
            // Hand back an inert listener; closing it must not evict the owner
            return Ok(Box::new(MemoryListener {
                id: listener_id,
                session_id: id.clone(),
                bound: false,
                state: self.state.clone(),
            }));
        }

        state.listeners.insert(
            id.clone(),
            ListenerEntry {
                id: listener_id,
                events: events.clone(),
            },
        );
        let _ = events.send(LinkEvent::ListenerReady(listener_id));
        debug!(session = %id, listener = %listener_id, "memory listener bound");

        Ok(Box::new(MemoryListener {
            id: listener_id,
            session_id: id.clone(),
            bound: true,
            state: self.state.clone(),
        }))
    }

    fn connect(
        &mut self,
        id: &SessionId,
        events: LinkEvents,
    ) -> Result<Box<dyn Connection>, LinkError> {
        let local = ConnectionId::new();
        let mut state = self.lock();

        let Some(listener) = state.listeners.get(id) else {
            let _ = events.send(LinkEvent::Error(
                local,
                LinkError::PeerUnavailable(id.to_string()),
            ));
            return Ok(Box::new(MemoryConnection {
                id: local,
                state: self.state.clone(),
            }));
        };

        let remote = ConnectionId::new();
        let listener_id = listener.id;
        let host_events = listener.events.clone();
        state.endpoints.insert(
            local,
            Endpoint {
                remote,
                events: events.clone(),
            },
        );
        state.endpoints.insert(
            remote,
            Endpoint {
                remote: local,
                events: host_events.clone(),
            },
        );

        let _ = host_events.send(LinkEvent::Incoming(
            listener_id,
            Box::new(MemoryConnection {
                id: remote,
                state: self.state.clone(),
            }),
        ));
        let _ = host_events.send(LinkEvent::Open(remote));
        let _ = events.send(LinkEvent::Open(local));
        debug!(session = %id, %local, %remote, "memory connection paired");

        Ok(Box::new(MemoryConnection {
            id: local,
            state: self.state.clone(),
        }))
    }
}

struct MemoryListener {
    id: ListenerId,
    session_id: SessionId,
    /// False for a listener that collided and never bound
    bound: bool,
    state: Arc<Mutex<BrokerState>>,
}

impl Listener for MemoryListener {
    fn id(&self) -> ListenerId {
        self.id
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn close(&self) {
        if !self.bound {
            return;
        }
        let mut state = lock(&self.state);
        if state.listeners.get(&self.session_id).map(|l| l.id) == Some(self.id) {
            state.listeners.remove(&self.session_id);
            debug!(session = %self.session_id, "memory listener released");
        }
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.close();
    }
}

struct MemoryConnection {
    id: ConnectionId,
    state: Arc<Mutex<BrokerState>>,
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: Value) -> Result<(), LinkError> {
        let state = lock(&self.state);
        let local = state.endpoints.get(&self.id).ok_or(LinkError::Closed)?;
        let remote = state.endpoints.get(&local.remote).ok_or(LinkError::Closed)?;
        remote
            .events
            .send(LinkEvent::Data(local.remote, message))
            .map_err(|_| LinkError::Closed)
    }

    fn close(&self) {
        lock(&self.state).sever(self.id);
    }

    fn is_open(&self) -> bool {
        lock(&self.state).endpoints.contains_key(&self.id)
    }
}

fn lock(state: &Mutex<BrokerState>) -> MutexGuard<'_, BrokerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn id() -> SessionId {
        SessionId::parse("TEST01").unwrap()
    }

    #[test]
    fn test_second_listener_gets_unavailable_id() {
        let mut broker = MemoryBroker::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let _first = broker.listen(&id(), tx1).unwrap();
        let second = broker.listen(&id(), tx2).unwrap();

        assert!(matches!(rx1.try_recv(), Ok(LinkEvent::ListenerReady(_))));
        assert!(matches!(
            rx2.try_recv(),
            Ok(LinkEvent::ListenerError(lid, LinkError::UnavailableId(_))) if lid == second.id()
        ));

        // The failed listener must not unbind the live one
        drop(second);
        assert!(broker.is_listening(&id()));
    }

    #[test]
    fn test_messages_delivered_in_order() {
        let mut broker = MemoryBroker::new();
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (ctl_tx, _ctl_rx) = mpsc::unbounded_channel();
        let _listener = broker.listen(&id(), host_tx).unwrap();
        let conn = broker.connect(&id(), ctl_tx).unwrap();

        conn.send(json!(1)).unwrap();
        conn.send(json!(2)).unwrap();

        let mut data = Vec::new();
        while let Ok(event) = host_rx.try_recv() {
            if let LinkEvent::Data(_, v) = event {
                data.push(v);
            }
        }
        assert_eq!(data, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_connect_without_listener_reports_error() {
        let mut broker = MemoryBroker::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = broker.connect(&id(), tx).unwrap();
        assert!(!conn.is_open());
        assert!(matches!(
            rx.try_recv(),
            Ok(LinkEvent::Error(_, LinkError::PeerUnavailable(_)))
        ));
    }

    #[test]
    fn test_close_notifies_both_sides() {
        let mut broker = MemoryBroker::new();
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (ctl_tx, _ctl_rx) = mpsc::unbounded_channel();
        let _listener = broker.listen(&id(), host_tx).unwrap();
        let conn = broker.connect(&id(), ctl_tx).unwrap();
        conn.close();

        assert!(conn.send(json!(null)).is_err());
        assert_eq!(broker.open_endpoints(), 0);
        let closed = std::iter::from_fn(|| host_rx.try_recv().ok())
            .any(|e| matches!(e, LinkEvent::Closed(_)));
        assert!(closed);
    }
}
