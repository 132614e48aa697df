//! TCP front end.
//!
//! One task per connection reads request lines and answers them; a forwarder
//! task relays broadcast events; a writer task owns the socket's write half
//! and serializes both streams onto it. A slow client only ever lags its own
//! broadcast subscription, which is then resynchronized with fresh snapshots.

use std::{net::SocketAddr, sync::Arc};

use tally_ledger::LedgerStore;
use tally_types::{LedgerEvent, Result, SessionId, TallyError, constants};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::{Mutex, broadcast, mpsc},
};

use crate::{
    coordinator::Coordinator,
    protocol::{ClientMessage, ServerMessage},
};

/// The coordinator as shared by every connection task.
pub type SharedCoordinator<S> = Arc<Mutex<Coordinator<S>>>;

/// Outbound queue depth per connection.
const OUTBOUND_CAPACITY: usize = 256;

/// Listening TCP server.
pub struct Server<S: LedgerStore> {
    listener: TcpListener,
    coordinator: SharedCoordinator<S>,
}

impl<S: LedgerStore> Server<S> {
    /// Bind the listener.
    ///
    /// # Errors
    /// Returns [`TallyError::Io`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, coordinator: Coordinator<S>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            coordinator: Arc::new(Mutex::new(coordinator)),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the shared coordinator.
    #[must_use]
    pub fn coordinator(&self) -> SharedCoordinator<S> {
        Arc::clone(&self.coordinator)
    }

    /// Accept connections until the task is cancelled.
    pub async fn run(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "Server accepting connections");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let coordinator = Arc::clone(&self.coordinator);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, coordinator).await {
                            tracing::warn!(peer = %peer, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept error");
                }
            }
        }
    }
}

/// Serve one client connection until it closes.
async fn handle_connection<S: LedgerStore>(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: SharedCoordinator<S>,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(write_loop(write_half, rx));

    let connection = coordinator.lock().await.connect();
    let id = connection.id;
    tracing::debug!(session = %id, peer = %peer, "Client connected");

    for event in connection.snapshot {
        // The writer only stops if the socket is gone; the read loop notices.
        let _ = tx.send(ServerMessage::Event { event }).await;
    }
    let forwarder = tokio::spawn(forward_events(
        id,
        connection.events,
        Arc::clone(&coordinator),
        tx.clone(),
    ));

    let result = read_loop(read_half, id, &coordinator, &tx).await;

    forwarder.abort();
    coordinator.lock().await.disconnect(id);
    drop(tx);
    let _ = writer.await;
    tracing::debug!(session = %id, peer = %peer, "Client disconnected");
    result
}

async fn read_loop<S: LedgerStore>(
    read_half: tokio::net::tcp::OwnedReadHalf,
    id: SessionId,
    coordinator: &SharedCoordinator<S>,
    tx: &mpsc::Sender<ServerMessage>,
) -> Result<()> {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let limit = constants::MAX_MESSAGE_BYTES as u64 + 1;

    loop {
        line.clear();
        let read = (&mut reader).take(limit).read_line(&mut line).await?;
        if read == 0 {
            return Ok(());
        }
        if !line.ends_with('\n') && line.len() > constants::MAX_MESSAGE_BYTES {
            let err = TallyError::InvalidRequest {
                reason: format!("message exceeds {} bytes", constants::MAX_MESSAGE_BYTES),
            };
            let _ = tx.send(ServerMessage::from_error(&err)).await;
            return Err(err);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<ClientMessage>(trimmed) {
            Ok(message) => dispatch(coordinator, id, message).await,
            Err(e) => ServerMessage::from_error(&TallyError::InvalidRequest {
                reason: format!("malformed message: {e}"),
            }),
        };
        if tx.send(reply).await.is_err() {
            return Ok(());
        }
    }
}

/// Apply one client message under the coordinator lock.
pub async fn dispatch<S: LedgerStore>(
    coordinator: &SharedCoordinator<S>,
    id: SessionId,
    message: ClientMessage,
) -> ServerMessage {
    let mut coordinator = coordinator.lock().await;
    let result = match message {
        ClientMessage::Authenticate { identity, secret } => coordinator
            .authenticate(id, &identity, &secret)
            .map(|session| ServerMessage::auth_success(&session)),
        ClientMessage::StartOperations { target } => coordinator
            .start_operations(id, &target)
            .map(ServerMessage::ack),
        ClientMessage::EndOperations { target } => coordinator
            .end_operations(id, &target)
            .map(ServerMessage::ack),
        ClientMessage::Operation { op } => coordinator
            .submit(id, &op)
            .map(|record| ServerMessage::ack(record.description)),
        ClientMessage::RequestBalances => coordinator
            .request_balances(id)
            .map(|()| ServerMessage::ack("balances refreshed")),
        ClientMessage::RecentOperations { limit } => Ok(ServerMessage::RecentOperations {
            records: coordinator
                .recent_operations(limit.unwrap_or(constants::DEFAULT_RECENT_LIMIT)),
        }),
    };
    result.unwrap_or_else(|e| ServerMessage::from_error(&e))
}

/// Relay broadcast events to one connection, resyncing after lag.
async fn forward_events<S: LedgerStore>(
    id: SessionId,
    mut events: broadcast::Receiver<LedgerEvent>,
    coordinator: SharedCoordinator<S>,
    tx: mpsc::Sender<ServerMessage>,
) {
    loop {
        let batch = match events.recv().await {
            Ok(event) => vec![event],
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(session = %id, skipped, "Observer lagged; resending snapshots");
                // Publishing only happens under this lock, so the fresh
                // receiver starts exactly where the snapshot ends.
                let coordinator = coordinator.lock().await;
                events = events.resubscribe();
                coordinator.snapshot_events()
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        for event in batch {
            if tx.send(ServerMessage::Event { event }).await.is_err() {
                return;
            }
        }
    }
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<ServerMessage>) {
    while let Some(message) = rx.recv().await {
        let mut bytes = match serde_json::to_vec(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server message");
                continue;
            }
        };
        bytes.push(b'\n');
        if let Err(e) = write_half.write_all(&bytes).await {
            tracing::debug!(error = %e, "Write failed; closing writer");
            return;
        }
    }
    let _ = write_half.shutdown().await;
}
