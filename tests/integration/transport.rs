//! Transport-level end-to-end scenarios over loopback UDP.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;

use strait_core::serialize_packet;
use strait_core::wire::{Chunk, ChunkBody, InitChunk, Packet, RWND};
use strait_transport::{AssociationKey, AssociationState, Socket};

use crate::*;

/// S1 — loopback handshake: both sides reach ESTABLISHED.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn loopback_handshake_establishes_both_sides() -> Result<()> {
    let a = spawn_socket().await?;
    let b = spawn_socket().await?;

    let (b_key, a_key) = establish(&a, &b).await?;

    assert_eq!(
        a.association_state(b_key).await,
        Some(AssociationState::Established)
    );
    assert_eq!(
        b.association_state(a_key).await,
        Some(AssociationState::Established)
    );

    a.close().await;
    b.close().await;
    Ok(())
}

/// S2 — echo: a payload crosses the wire intact, in both directions.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn echo_payload_arrives_intact() -> Result<()> {
    let a = spawn_socket().await?;
    let b = spawn_socket().await?;
    let (b_key, a_key) = establish(&a, &b).await?;

    let message = b"Hello from socket1!";
    a.send_data(b_key, message).await;

    let mut buf = vec![0u8; 2048];
    let n = recv_from_with_retry(&b, a_key, &mut buf).await?;
    assert_eq!(n, message.len());
    assert_eq!(&buf[..n], message);

    b.send_data(a_key, b"Hello back!").await;
    let n = recv_from_with_retry(&a, b_key, &mut buf).await?;
    assert_eq!(&buf[..n], b"Hello back!");

    a.close().await;
    b.close().await;
    Ok(())
}

/// A peer that never runs its event loop answers nothing; the initiator
/// stays stuck in CookieWait until the await times out.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn silent_peer_leaves_initiator_in_cookie_wait() -> Result<()> {
    let a = spawn_socket().await?;
    let silent = Socket::bind("127.0.0.1", 0).await?;

    let key = a.associate("127.0.0.1", silent.local_key().port).await?;
    let result = a
        .await_established(key, std::time::Duration::from_millis(300))
        .await;
    assert!(result.is_err());
    assert_eq!(
        a.association_state(key).await,
        Some(AssociationState::CookieWait)
    );

    a.close().await;
    Ok(())
}

fn init_packet(dst_port: u16) -> Packet {
    Packet {
        src_port: 0,
        dst_port,
        verification_tag: 0,
        chunks: vec![Chunk::new(ChunkBody::Init(InitChunk {
            initiate_tag: 0x0BAD,
            a_rwnd: RWND as u32,
            out_streams: 1,
            in_streams: 1,
            initial_tsn: 42,
            optional_parameters: Bytes::new(),
        }))],
    }
}

/// S5 — corruption drop: a bit-flipped datagram changes no state, while
/// the same datagram intact creates an association.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn corrupted_datagram_is_dropped() -> Result<()> {
    let b = spawn_socket().await?;

    let raw = tokio::net::UdpSocket::bind("127.0.0.1:0").await?;
    let raw_port = match raw.local_addr()? {
        std::net::SocketAddr::V4(v4) => v4.port(),
        other => anyhow::bail!("unexpected local addr {other}"),
    };
    let raw_key = AssociationKey::new(std::net::Ipv4Addr::LOCALHOST, raw_port);

    let wire = serialize_packet(&init_packet(b.local_key().port));

    // Flip one bit in the INIT body.
    let mut corrupted = wire.clone();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x40;
    raw.send_to(&corrupted, b.local_key().socket_addr()).await?;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(
        b.association_state(raw_key).await,
        None,
        "corrupted INIT must not create a record"
    );

    // The intact datagram goes through.
    raw.send_to(&wire, b.local_key().socket_addr()).await?;
    let mut state = None;
    for _ in 0..RECV_BUDGET {
        state = b.association_state(raw_key).await;
        if state.is_some() {
            break;
        }
        tokio::time::sleep(RECV_POLL).await;
    }
    assert_eq!(state, Some(AssociationState::CookieWait));

    b.close().await;
    Ok(())
}

/// S6 — cross-peer isolation: payloads from B and C never mix in A's
/// per-association queues.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cross_peer_payloads_stay_isolated() -> Result<()> {
    let a = spawn_socket().await?;
    let b = spawn_socket().await?;
    let c = spawn_socket().await?;

    let (a_key_for_b, b_key) = establish(&b, &a).await?;
    let (a_key_for_c, c_key) = establish(&c, &a).await?;

    b.send_data(a_key_for_b, b"b-one").await;
    b.send_data(a_key_for_b, b"b-two").await;
    c.send_data(a_key_for_c, b"c-one").await;
    c.send_data(a_key_for_c, b"c-two").await;

    let mut buf = vec![0u8; 64];
    let n = recv_from_with_retry(&a, b_key, &mut buf).await?;
    assert_eq!(&buf[..n], b"b-one");
    let n = recv_from_with_retry(&a, b_key, &mut buf).await?;
    assert_eq!(&buf[..n], b"b-two");

    let n = recv_from_with_retry(&a, c_key, &mut buf).await?;
    assert_eq!(&buf[..n], b"c-one");
    let n = recv_from_with_retry(&a, c_key, &mut buf).await?;
    assert_eq!(&buf[..n], b"c-two");

    // Both queues are now drained.
    assert_eq!(a.recv_data_from(b_key, &mut buf).await, 0);
    assert_eq!(a.recv_data_from(c_key, &mut buf).await, 0);

    a.close().await;
    b.close().await;
    c.close().await;
    Ok(())
}

/// Concurrent senders on one association: every payload is delivered
/// exactly once, which holds only if TSN assignment never duplicates.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_deliver_every_payload_once() -> Result<()> {
    let a = Arc::new(spawn_socket().await?);
    let b = spawn_socket().await?;
    let (b_key, a_key) = establish(a.as_ref(), &b).await?;

    const TASKS: usize = 4;
    const PER_TASK: usize = 25;

    let mut senders = Vec::new();
    for task in 0..TASKS {
        let a = a.clone();
        senders.push(tokio::spawn(async move {
            for i in 0..PER_TASK {
                let payload = format!("task{}-msg{}", task, i);
                a.send_data(b_key, payload.as_bytes()).await;
            }
        }));
    }
    for sender in senders {
        sender.await?;
    }

    let mut received = Vec::new();
    let mut buf = vec![0u8; 64];
    while received.len() < TASKS * PER_TASK {
        let n = recv_from_with_retry(&b, a_key, &mut buf).await?;
        received.push(String::from_utf8_lossy(&buf[..n]).to_string());
    }

    let unique: HashSet<&String> = received.iter().collect();
    assert_eq!(unique.len(), TASKS * PER_TASK, "duplicate delivery");
    for task in 0..TASKS {
        for i in 0..PER_TASK {
            let expected = format!("task{}-msg{}", task, i);
            assert!(received.contains(&expected), "missing {}", expected);
        }
    }

    a.close().await;
    b.close().await;
    Ok(())
}
