//! # Connection
//!
//! One duplex byte stream carrying packet frames.
//!
//! The stream is split into a read half and a write half. Each half sits
//! behind its own async mutex: the write lock guarantees that frames from
//! concurrent writers are never interleaved, while the read side is normally
//! driven by a single receive loop.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, instrument, warn};

use crate::core::codec::FrameCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};

type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;
type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub struct Connection {
    id: u64,
    peer_addr: Option<SocketAddr>,
    reader: tokio::sync::Mutex<FramedRead<BoxedReader, FrameCodec>>,
    writer: tokio::sync::Mutex<FramedWrite<BoxedWriter, FrameCodec>>,
    closed: AtomicBool,
}

impl Connection {
    /// Wrap any duplex stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_peer(stream, None)
    }

    /// Wrap a TCP stream, remembering the remote address for logging.
    pub fn from_tcp(stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let peer = stream.peer_addr().ok();
        Self::with_peer(stream, peer)
    }

    fn with_peer<S>(stream: S, peer_addr: Option<SocketAddr>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader: BoxedReader = Box::pin(read_half);
        let writer: BoxedWriter = Box::pin(write_half);

        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer_addr,
            reader: tokio::sync::Mutex::new(FramedRead::new(reader, FrameCodec)),
            writer: tokio::sync::Mutex::new(FramedWrite::new(writer, FrameCodec)),
            closed: AtomicBool::new(false),
        }
    }

    /// Process-unique identifier of this connection
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Read the next packet from the stream.
    ///
    /// # Errors
    /// `ConnectionClosed` on a clean end of stream, `Framing` on a truncated
    /// frame, `Decode` on a malformed payload. All of these are fatal for the
    /// connection.
    pub async fn read_packet(&self) -> Result<Packet> {
        let mut reader = self.reader.lock().await;
        match reader.next().await {
            Some(Ok(packet)) => {
                debug!(connection_id = self.id, packet = %packet, "Packet received");
                Ok(packet)
            }
            Some(Err(e)) => Err(e),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Write one packet as a single frame and flush it.
    ///
    /// # Errors
    /// `OversizedPacket` if the frame exceeds the wire limit. Nothing is written
    /// in that case and the connection remains usable.
    pub async fn write_packet(&self, packet: &Packet) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        // The codec checks the size before touching the write buffer
        let mut writer = self.writer.lock().await;
        writer.send(packet).await?;
        debug!(connection_id = self.id, packet = %packet, "Packet sent");
        Ok(())
    }

    /// Shut down the write half of the stream. Safe to call more than once.
    #[instrument(skip(self), fields(connection_id = self.id))]
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            debug!(error = %e, "Error while closing connection");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The set of live connections accepted by a server.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    inner: Mutex<HashMap<u64, Arc<Connection>>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<Connection>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, connection: Arc<Connection>) {
        self.entries().insert(connection.id(), connection);
    }

    /// Returns true if the connection was present.
    pub fn remove(&self, connection_id: u64) -> bool {
        self.entries().remove(&connection_id).is_some()
    }

    pub fn contains(&self, connection_id: u64) -> bool {
        self.entries().contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Clone out the current members so callers never hold the lock across awaits.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.entries().values().cloned().collect()
    }

    /// Write a packet to every live connection. Returns how many writes succeeded.
    pub async fn broadcast(&self, packet: &Packet) -> usize {
        let mut delivered = 0;
        for connection in self.snapshot() {
            match connection.write_packet(packet).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    connection_id = connection.id(),
                    error = %e,
                    "Failed to deliver broadcast"
                ),
            }
        }
        delivered
    }
}
