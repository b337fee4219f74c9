//! The single worker task behind a [`crate::Socket`].
//!
//! Each turn drains at most one queued outbound packet, then attempts a
//! non-blocking receive. All wire-level failures (checksum mismatch,
//! truncation, unsupported chunk types) are absorbed here: log, drop the
//! datagram, keep going. The loop never blocks; a yield per turn keeps it
//! cooperative with the rest of the runtime.

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;

use strait_core::checksum::verify_datagram;
use strait_core::codec::{deserialize_packet, serialize_packet};
use strait_core::wire::RWND;

use crate::assoc::AssociationKey;
use crate::handlers;
use crate::queue::SendQueue;
use crate::table::AssociationTable;

/// State shared between the socket API and the worker task.
pub(crate) struct Shared {
    pub udp: UdpSocket,
    pub local: SocketAddrV4,
    pub running: AtomicBool,
    pub table: AssociationTable,
    pub send_queue: SendQueue,
}

pub(crate) async fn run(shared: Arc<Shared>) {
    let mut buf = vec![0u8; RWND];

    while shared.running.load(Ordering::SeqCst) {
        if let Some(deliverable) = shared.send_queue.pop().await {
            let wire = serialize_packet(&deliverable.packet);
            let dest = SocketAddr::V4(deliverable.key.socket_addr());
            if let Err(e) = shared.udp.send_to(&wire, dest).await {
                tracing::warn!(peer = %deliverable.key, error = %e, "sendto failed");
            }
        }

        match shared.udp.try_recv_from(&mut buf) {
            Ok((n, SocketAddr::V4(src))) => {
                handle_datagram(&shared, &buf[..n], src.into()).await;
            }
            Ok((_, src)) => {
                tracing::trace!(%src, "ignoring datagram from non-IPv4 source");
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                tracing::warn!(error = %e, "recvfrom failed");
            }
        }

        tokio::task::yield_now().await;
    }

    tracing::debug!(local = %shared.local, "event loop stopped");
}

async fn handle_datagram(shared: &Shared, datagram: &[u8], src: AssociationKey) {
    if !verify_datagram(datagram) {
        tracing::warn!(peer = %src, len = datagram.len(), "checksum mismatch, dropping datagram");
        return;
    }

    let packet = match deserialize_packet(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(peer = %src, error = %e, "undecodable datagram, dropping");
            return;
        }
    };

    for chunk in &packet.chunks {
        handlers::dispatch(&shared.table, &shared.send_queue, &packet, chunk, src).await;
    }
}
