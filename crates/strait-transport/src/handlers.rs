//! Chunk handlers — the handshake state machine and the DATA TSN path.
//!
//! Each handler decides its state transition while holding the association
//! table lock, releases it, and only then enqueues any reply packet. Reply
//! packets reuse the received common header with the verification tag
//! rewritten where the transition calls for it; in particular the
//! COOKIE_ECHO inherits the tag straight from the INIT_ACK header.
//!
//! A chunk arriving in a state that does not accept it is dropped without
//! touching the record.

use bytes::Bytes;

use strait_core::wire::{Chunk, ChunkBody, DataChunk, InitChunk, Packet, RWND};

use crate::assoc::{Association, AssociationKey, AssociationState};
use crate::queue::{Deliverable, SendQueue};
use crate::table::AssociationTable;

/// Route one received chunk to its handler. `src` is the datagram's source
/// address, which is the only demultiplexing key.
pub(crate) async fn dispatch(
    table: &AssociationTable,
    queue: &SendQueue,
    packet: &Packet,
    chunk: &Chunk,
    src: AssociationKey,
) {
    match &chunk.body {
        ChunkBody::Init(init) => handle_init(table, queue, packet, init, src).await,
        ChunkBody::InitAck(init) => handle_init_ack(table, queue, packet, init, src).await,
        ChunkBody::CookieEcho(_) => handle_cookie_echo(table, queue, packet, src).await,
        ChunkBody::CookieAck => handle_cookie_ack(table, src).await,
        ChunkBody::Data(data) => handle_data(table, data, src).await,
    }
}

fn init_ack_body(assoc: &Association) -> ChunkBody {
    ChunkBody::InitAck(InitChunk {
        initiate_tag: assoc.this_ver_tag,
        a_rwnd: RWND as u32,
        out_streams: 1,
        in_streams: 1,
        initial_tsn: assoc.next_tsn,
        optional_parameters: Bytes::new(),
    })
}

async fn handle_init(
    table: &AssociationTable,
    queue: &SendQueue,
    packet: &Packet,
    init: &InitChunk,
    src: AssociationKey,
) {
    let reply_body;
    let reply_tag;
    {
        let mut records = table.lock().await;
        if records.contains_key(&src) {
            tracing::trace!(peer = %src, "INIT for existing association, dropping");
            return;
        }

        let mut assoc = Association::initiate(src);
        assoc.peer_ver_tag = init.initiate_tag;
        assoc.last_peer_tsn = init.initial_tsn.wrapping_sub(1);
        reply_body = init_ack_body(&assoc);
        reply_tag = assoc.peer_ver_tag;
        records.insert(src, assoc);
    }

    tracing::debug!(peer = %src, "INIT received, replying INIT_ACK");
    queue
        .push(Deliverable {
            key: src,
            packet: Packet {
                src_port: packet.src_port,
                dst_port: packet.dst_port,
                verification_tag: reply_tag,
                chunks: vec![Chunk::new(reply_body)],
            },
        })
        .await;
}

async fn handle_init_ack(
    table: &AssociationTable,
    queue: &SendQueue,
    packet: &Packet,
    init: &InitChunk,
    src: AssociationKey,
) {
    {
        let mut records = table.lock().await;
        let Some(assoc) = records.get_mut(&src) else {
            tracing::trace!(peer = %src, "INIT_ACK without association, dropping");
            return;
        };
        if assoc.state != AssociationState::CookieWait {
            tracing::trace!(peer = %src, state = ?assoc.state, "INIT_ACK in wrong state, dropping");
            return;
        }
        assoc.peer_ver_tag = init.initiate_tag;
        assoc.last_peer_tsn = init.initial_tsn.wrapping_sub(1);
        assoc.state = AssociationState::CookieEchoed;
    }

    tracing::debug!(peer = %src, "INIT_ACK received, replying COOKIE_ECHO");
    queue
        .push(Deliverable {
            key: src,
            packet: Packet {
                src_port: packet.src_port,
                dst_port: packet.dst_port,
                verification_tag: packet.verification_tag,
                chunks: vec![Chunk::new(ChunkBody::CookieEcho(Bytes::new()))],
            },
        })
        .await;
}

async fn handle_cookie_echo(
    table: &AssociationTable,
    queue: &SendQueue,
    packet: &Packet,
    src: AssociationKey,
) {
    {
        let mut records = table.lock().await;
        let Some(assoc) = records.get_mut(&src) else {
            tracing::trace!(peer = %src, "COOKIE_ECHO without association, dropping");
            return;
        };
        if assoc.state != AssociationState::CookieWait {
            tracing::trace!(peer = %src, state = ?assoc.state, "COOKIE_ECHO in wrong state, dropping");
            return;
        }
        assoc.state = AssociationState::Established;
    }
    table.notify_established();

    tracing::debug!(peer = %src, "association established, replying COOKIE_ACK");
    queue
        .push(Deliverable {
            key: src,
            packet: Packet {
                src_port: packet.src_port,
                dst_port: packet.dst_port,
                verification_tag: packet.verification_tag,
                chunks: vec![Chunk::new(ChunkBody::CookieAck)],
            },
        })
        .await;
}

async fn handle_cookie_ack(table: &AssociationTable, src: AssociationKey) {
    {
        let mut records = table.lock().await;
        let Some(assoc) = records.get_mut(&src) else {
            tracing::trace!(peer = %src, "COOKIE_ACK without association, dropping");
            return;
        };
        if assoc.state != AssociationState::CookieEchoed {
            tracing::trace!(peer = %src, state = ?assoc.state, "COOKIE_ACK in wrong state, dropping");
            return;
        }
        assoc.state = AssociationState::Established;
    }
    table.notify_established();
    tracing::debug!(peer = %src, "association established");
}

async fn handle_data(table: &AssociationTable, data: &DataChunk, src: AssociationKey) {
    let mut records = table.lock().await;
    let Some(assoc) = records.get_mut(&src) else {
        tracing::trace!(peer = %src, "DATA without association, dropping");
        return;
    };
    if assoc.state != AssociationState::Established {
        tracing::trace!(peer = %src, state = ?assoc.state, "DATA before establishment, dropping");
        return;
    }

    let next = assoc.last_peer_tsn.wrapping_add(1);
    if data.tsn == next {
        assoc.ulp_buffer.push_back(data.user_data.clone());
        assoc.last_peer_tsn = next;
        drain_ooo_buffer(assoc);
    } else if data.tsn > next {
        assoc.tsn_ooo_buffer.insert(data.tsn, data.clone());
    } else {
        tracing::trace!(peer = %src, tsn = data.tsn, "duplicate DATA, dropping");
    }
}

/// Deliver buffered chunks that have become contiguous.
fn drain_ooo_buffer(assoc: &mut Association) {
    loop {
        let lookahead = assoc.last_peer_tsn.wrapping_add(1);
        match assoc.tsn_ooo_buffer.remove(&lookahead) {
            Some(buffered) => {
                assoc.ulp_buffer.push_back(buffered.user_data);
                assoc.last_peer_tsn = lookahead;
            }
            None => break,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
