//! The socket-like API consumers use: bind, run, associate, send, receive,
//! close. Thread-safe against the event loop; every method only touches the
//! mutex-guarded association table and send queue.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use strait_core::wire::{Chunk, ChunkBody, DataChunk, InitChunk, Packet, RWND};

use crate::assoc::{Association, AssociationKey, AssociationState};
use crate::event_loop::{self, Shared};
use crate::queue::{Deliverable, SendQueue};
use crate::table::AssociationTable;

/// Errors surfaced by the socket API. Wire-level failures never appear
/// here; they are absorbed by the event loop.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("not an IPv4 endpoint: {0}")]
    BadAddress(String),

    #[error("socket is not running")]
    NotRunning,

    #[error("association did not reach ESTABLISHED in time")]
    Timeout,
}

/// An SCTP-like socket multiplexing peer associations over one UDP
/// endpoint.
pub struct Socket {
    shared: Arc<Shared>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Socket {
    /// Bind the underlying UDP socket to a local IPv4 endpoint. Port 0
    /// asks the OS for an ephemeral port; see [`Socket::local_key`] for the
    /// resolved endpoint.
    pub async fn bind(ip: &str, port: u16) -> Result<Socket, TransportError> {
        let addr: Ipv4Addr = ip
            .parse()
            .map_err(|_| TransportError::BadAddress(ip.to_string()))?;
        let udp = UdpSocket::bind(SocketAddrV4::new(addr, port))
            .await
            .map_err(TransportError::Bind)?;
        let local = match udp.local_addr().map_err(TransportError::Bind)? {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(v6) => return Err(TransportError::BadAddress(v6.to_string())),
        };

        tracing::debug!(%local, "socket bound");
        Ok(Socket {
            shared: Arc::new(Shared {
                udp,
                local,
                running: AtomicBool::new(false),
                table: AssociationTable::new(),
                send_queue: SendQueue::new(),
            }),
            worker: tokio::sync::Mutex::new(None),
        })
    }

    /// Spawn the event-loop task. A second call is a no-op while the first
    /// loop is still running. The tokio socket is non-blocking by
    /// construction, so the loop's receive side returns promptly when idle.
    pub async fn run(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let shared = self.shared.clone();
        *self.worker.lock().await = Some(tokio::spawn(event_loop::run(shared)));
    }

    /// Create an association toward a peer and enqueue the opening INIT.
    /// The record starts in CookieWait; use [`Socket::await_established`]
    /// to wait for the handshake to finish.
    pub async fn associate(
        &self,
        ip: &str,
        port: u16,
    ) -> Result<AssociationKey, TransportError> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(TransportError::NotRunning);
        }
        let addr: Ipv4Addr = ip
            .parse()
            .map_err(|_| TransportError::BadAddress(ip.to_string()))?;
        let key = AssociationKey::new(addr, port);

        let assoc = Association::initiate(key);
        let init = Packet {
            src_port: self.shared.local.port(),
            dst_port: port,
            verification_tag: 0,
            chunks: vec![Chunk::new(ChunkBody::Init(InitChunk {
                initiate_tag: assoc.this_ver_tag,
                a_rwnd: RWND as u32,
                out_streams: 1,
                in_streams: 1,
                initial_tsn: assoc.next_tsn,
                optional_parameters: Bytes::new(),
            }))],
        };

        self.shared.table.lock().await.insert(key, assoc);
        self.shared
            .send_queue
            .push(Deliverable { key, packet: init })
            .await;

        tracing::debug!(peer = %key, "association initiated");
        Ok(key)
    }

    /// Wait until the association reaches ESTABLISHED, or `timeout`
    /// elapses. Wakes on establishment rather than polling.
    pub async fn await_established(
        &self,
        key: AssociationKey,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking state so a transition
            // between the check and the wait cannot be missed.
            let notified = self.shared.table.established_signal().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.table.state_of(&key).await == Some(AssociationState::Established) {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(TransportError::Timeout);
            }
        }
    }

    /// Current state of an association, if one exists for `key`.
    pub async fn association_state(&self, key: AssociationKey) -> Option<AssociationState> {
        self.shared.table.state_of(&key).await
    }

    /// Enqueue one DATA packet carrying `payload`. A missing or
    /// not-yet-established association is a silent no-op; the transport's
    /// I/O contract is best-effort.
    pub async fn send_data(&self, key: AssociationKey, payload: &[u8]) {
        let packet = {
            let mut records = self.shared.table.lock().await;
            let Some(assoc) = records.get_mut(&key) else {
                tracing::debug!(peer = %key, "send_data on unknown association");
                return;
            };
            if assoc.state != AssociationState::Established {
                tracing::debug!(peer = %key, state = ?assoc.state, "send_data before establishment");
                return;
            }

            let tsn = assoc.next_tsn;
            assoc.next_tsn = assoc.next_tsn.wrapping_add(1);
            Packet {
                src_port: self.shared.local.port(),
                dst_port: key.port,
                verification_tag: assoc.peer_ver_tag,
                chunks: vec![Chunk::new(ChunkBody::Data(DataChunk {
                    tsn,
                    stream_identifier: 0,
                    stream_seq_num: 0,
                    payload_protocol_id: 0,
                    user_data: Bytes::copy_from_slice(payload),
                }))],
            }
        };

        self.shared
            .send_queue
            .push(Deliverable { key, packet })
            .await;
    }

    /// Pop the next delivered payload from any established association,
    /// copying up to `buf.len()` bytes. Returns the source association and
    /// the copy count, or None when nothing is waiting anywhere.
    pub async fn recv_data(&self, buf: &mut [u8]) -> Option<(AssociationKey, usize)> {
        let mut records = self.shared.table.lock().await;
        for (key, assoc) in records.iter_mut() {
            if assoc.state != AssociationState::Established {
                continue;
            }
            if let Some(payload) = assoc.ulp_buffer.pop_front() {
                let n = payload.len().min(buf.len());
                buf[..n].copy_from_slice(&payload[..n]);
                return Some((*key, n));
            }
        }
        None
    }

    /// Like [`Socket::recv_data`], restricted to one association. Returns 0
    /// when the association is missing, not established, or has nothing
    /// queued.
    pub async fn recv_data_from(&self, key: AssociationKey, buf: &mut [u8]) -> usize {
        let mut records = self.shared.table.lock().await;
        let Some(assoc) = records.get_mut(&key) else {
            return 0;
        };
        if assoc.state != AssociationState::Established {
            return 0;
        }
        let Some(payload) = assoc.ulp_buffer.pop_front() else {
            return 0;
        };
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        n
    }

    /// Stop the event loop and join its task. Packets still queued are
    /// discarded. The UDP socket closes when the `Socket` drops.
    pub async fn close(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "event loop task failed");
            }
        }
        tracing::debug!(local = %self.shared.local, "socket closed");
    }

    /// The local bound endpoint as an association key — lets callers in the
    /// same process address this socket from a peer's table.
    pub fn local_key(&self) -> AssociationKey {
        AssociationKey::new(*self.shared.local.ip(), self.shared.local.port())
    }
}
