//! Direct TCP peer link
//!
//! For hosts and remotes on the same LAN. The host binds a TCP port; a
//! remote connects and first sends a hello line naming the session code.
//! Connections whose code does not match the listener's are closed. After
//! the hello, every line is one JSON protocol message.
//!
//! Each socket gets a reader task and a writer task; both only post
//! [`LinkEvent`]s, so all protocol state stays on the owner's event loop.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crate::remote::link::{
    Connection, ConnectionId, LinkError, LinkEvent, LinkEvents, Listener, ListenerId, PeerLink,
};
use crate::remote::session::SessionId;

/// Longest accepted line; snapshots are far smaller
const MAX_LINE: usize = 64 * 1024;

/// First line a remote sends
#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    session: String,
}

enum Outbound {
    Message(String),
    Close,
}

/// TCP transport. `bind` is used by hosts, `target` by remotes.
#[derive(Debug, Clone)]
pub struct TcpLink {
    bind: SocketAddr,
    target: Option<SocketAddr>,
}

impl TcpLink {
    /// Link for a host listening on `bind`
    pub fn host(bind: SocketAddr) -> Self {
        Self { bind, target: None }
    }

    /// Link for a remote dialing the host at `target`
    pub fn remote(target: SocketAddr) -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            target: Some(target),
        }
    }
}

impl PeerLink for TcpLink {
    fn listen(
        &mut self,
        id: &SessionId,
        events: LinkEvents,
    ) -> Result<Box<dyn Listener>, LinkError> {
        let session = id.clone();
        let bind = self.bind;
        let listener_id = ListenerId::new();
        let task = tokio::spawn(async move {
            let listener = match TcpListener::bind(bind).await {
                Ok(listener) => listener,
                Err(e) => {
                    let _ = events.send(LinkEvent::ListenerError(listener_id, e.into()));
                    return;
                }
            };
            info!(addr = ?listener.local_addr().ok(), %session, "tcp listener bound");
            let _ = events.send(LinkEvent::ListenerReady(listener_id));
            accept_loop(listener_id, listener, session, events).await;
        });
        Ok(Box::new(TcpListenerHandle {
            id: listener_id,
            session_id: id.clone(),
            task,
        }))
    }

    fn connect(
        &mut self,
        id: &SessionId,
        events: LinkEvents,
    ) -> Result<Box<dyn Connection>, LinkError> {
        let target = self
            .target
            .ok_or_else(|| LinkError::Protocol("no host address configured".into()))?;
        let conn_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let hello = serde_json::to_string(&Hello {
            session: id.to_string(),
        })
        .map_err(|e| LinkError::Protocol(e.to_string()))?;

        let task_events = events.clone();
        let task_open = open.clone();
        let task = tokio::spawn(async move {
            let stream = match TcpStream::connect(target).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = task_events.send(LinkEvent::Error(conn_id, e.into()));
                    return;
                }
            };
            let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE));
            if let Err(e) = framed.send(hello).await {
                let _ = task_events.send(LinkEvent::Error(
                    conn_id,
                    LinkError::Protocol(e.to_string()),
                ));
                return;
            }
            task_open.store(true, Ordering::SeqCst);
            let _ = task_events.send(LinkEvent::Open(conn_id));
            pump(conn_id, framed, rx, task_open, task_events).await;
        });

        Ok(Box::new(TcpConnection {
            id: conn_id,
            tx,
            open,
            events,
            task: task.abort_handle(),
        }))
    }
}

async fn accept_loop(
    listener_id: ListenerId,
    listener: TcpListener,
    session: SessionId,
    events: LinkEvents,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "tcp connection accepted");
                let session = session.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = handshake(listener_id, stream, session, events).await {
                        warn!(%peer, error = %e, "rejected remote");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "tcp accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }
    }
}

/// Validate the hello line, then hand the connection to the owner
async fn handshake(
    listener_id: ListenerId,
    stream: TcpStream,
    session: SessionId,
    events: LinkEvents,
) -> Result<(), LinkError> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE));
    let line = match framed.next().await {
        Some(Ok(line)) => line,
        Some(Err(e)) => return Err(LinkError::Protocol(e.to_string())),
        None => return Err(LinkError::Closed),
    };
    let hello: Hello =
        serde_json::from_str(&line).map_err(|e| LinkError::Protocol(e.to_string()))?;
    match SessionId::parse(&hello.session) {
        Ok(id) if id == session => {}
        _ => return Err(LinkError::PeerUnavailable(hello.session)),
    }

    let conn_id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));
    let task_events = events.clone();
    let task_open = open.clone();
    let task = tokio::spawn(async move {
        pump(conn_id, framed, rx, task_open, task_events).await;
    });

    let conn = TcpConnection {
        id: conn_id,
        tx,
        open,
        events: events.clone(),
        task: task.abort_handle(),
    };
    let _ = events.send(LinkEvent::Incoming(listener_id, Box::new(conn)));
    let _ = events.send(LinkEvent::Open(conn_id));
    Ok(())
}

/// Shuttle lines between the socket and the owner until either side closes
async fn pump(
    id: ConnectionId,
    framed: Framed<TcpStream, LinesCodec>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
    events: LinkEvents,
) {
    let (mut sink, mut stream) = framed.split();
    loop {
        tokio::select! {
            line = stream.next() => match line {
                Some(Ok(line)) => match serde_json::from_str::<Value>(&line) {
                    Ok(value) => {
                        let _ = events.send(LinkEvent::Data(id, value));
                    }
                    Err(e) => debug!(%id, error = %e, "dropping non-json line"),
                },
                Some(Err(e)) => {
                    if open.swap(false, Ordering::SeqCst) {
                        let _ = events.send(LinkEvent::Error(id, LinkError::Protocol(e.to_string())));
                    }
                    return;
                }
                None => break,
            },
            msg = outbound.recv() => match msg {
                Some(Outbound::Message(line)) => {
                    if let Err(e) = sink.send(line).await {
                        if open.swap(false, Ordering::SeqCst) {
                            let _ = events.send(LinkEvent::Error(id, LinkError::Protocol(e.to_string())));
                        }
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }
    if open.swap(false, Ordering::SeqCst) {
        let _ = events.send(LinkEvent::Closed(id));
    }
}

struct TcpListenerHandle {
    id: ListenerId,
    session_id: SessionId,
    task: JoinHandle<()>,
}

impl Listener for TcpListenerHandle {
    fn id(&self) -> ListenerId {
        self.id
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn close(&self) {
        self.task.abort();
    }
}

impl Drop for TcpListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct TcpConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
    events: LinkEvents,
    task: AbortHandle,
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: Value) -> Result<(), LinkError> {
        // Messages queued before the socket opens are flushed once it does
        let line = serde_json::to_string(&message).map_err(|e| LinkError::Protocol(e.to_string()))?;
        self.tx
            .send(Outbound::Message(line))
            .map_err(|_| LinkError::Closed)
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(LinkEvent::Closed(self.id));
        } else {
            // Still dialing; nothing to flush
            self.task.abort();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> LinkEvent {
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for link event")
            .expect("event queue closed")
    }

    fn free_addr() -> SocketAddr {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let addr = free_addr();
        let session = SessionId::parse("TCP001").unwrap();

        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let mut host = TcpLink::host(addr);
        let listener = host.listen(&session, host_tx).unwrap();
        match next_event(&mut host_rx).await {
            LinkEvent::ListenerReady(id) => assert_eq!(id, listener.id()),
            other => panic!("expected ready, got {:?}", other),
        }

        let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();
        let mut remote = TcpLink::remote(addr);
        let conn = remote.connect(&SessionId::parse("tcp001").unwrap(), ctl_tx).unwrap();
        assert!(matches!(next_event(&mut ctl_rx).await, LinkEvent::Open(_)));

        let incoming = match next_event(&mut host_rx).await {
            LinkEvent::Incoming(id, conn) => {
                assert_eq!(id, listener.id());
                conn
            }
            other => panic!("expected incoming, got {:?}", other),
        };
        assert!(matches!(next_event(&mut host_rx).await, LinkEvent::Open(_)));

        conn.send(json!({"type": "remote-ready"})).unwrap();
        match next_event(&mut host_rx).await {
            LinkEvent::Data(id, value) => {
                assert_eq!(id, incoming.id());
                assert_eq!(value, json!({"type": "remote-ready"}));
            }
            other => panic!("expected data, got {:?}", other),
        }

        incoming.close();
        loop {
            if let LinkEvent::Closed(id) = next_event(&mut ctl_rx).await {
                assert_eq!(id, conn.id());
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_tcp_wrong_session_rejected() {
        let addr = free_addr();
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let mut host = TcpLink::host(addr);
        let _listener = host
            .listen(&SessionId::parse("RIGHT1").unwrap(), host_tx)
            .unwrap();
        assert!(matches!(next_event(&mut host_rx).await, LinkEvent::ListenerReady(_)));

        let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();
        let mut remote = TcpLink::remote(addr);
        let _conn = remote
            .connect(&SessionId::parse("WRONG1").unwrap(), ctl_tx)
            .unwrap();
        assert!(matches!(next_event(&mut ctl_rx).await, LinkEvent::Open(_)));
        assert!(matches!(next_event(&mut ctl_rx).await, LinkEvent::Closed(_)));
        assert!(host_rx.try_recv().is_err());
    }
}
