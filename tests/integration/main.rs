//! strait integration test harness.
//!
//! Every scenario runs over real UDP sockets on 127.0.0.1 with
//! OS-assigned ports, so tests are safe to run in parallel and need no
//! external setup.

mod http;
mod transport;

use std::time::Duration;

use anyhow::{bail, Result};

use strait_transport::{AssociationKey, Socket};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const ESTABLISH_TIMEOUT: Duration = Duration::from_millis(5000);
pub const RECV_POLL: Duration = Duration::from_millis(10);
pub const RECV_BUDGET: u32 = 500;

// ── Harness helpers ───────────────────────────────────────────────────────────

/// Bind a socket on 127.0.0.1 with an ephemeral port and start its event
/// loop.
pub async fn spawn_socket() -> Result<Socket> {
    let socket = Socket::bind("127.0.0.1", 0).await?;
    socket.run().await;
    Ok(socket)
}

/// Poll `recv_data_from` until bytes arrive or the budget runs out.
pub async fn recv_from_with_retry(
    socket: &Socket,
    key: AssociationKey,
    buf: &mut [u8],
) -> Result<usize> {
    for _ in 0..RECV_BUDGET {
        let n = socket.recv_data_from(key, buf).await;
        if n > 0 {
            return Ok(n);
        }
        tokio::time::sleep(RECV_POLL).await;
    }
    bail!("no data from {} within the poll budget", key)
}

/// Drive the four-way handshake from `a` to `b` and wait for both sides.
/// Returns (b's key in a's table, a's key in b's table).
pub async fn establish(a: &Socket, b: &Socket) -> Result<(AssociationKey, AssociationKey)> {
    let b_key = a.associate("127.0.0.1", b.local_key().port).await?;
    a.await_established(b_key, ESTABLISH_TIMEOUT).await?;
    b.await_established(a.local_key(), ESTABLISH_TIMEOUT).await?;
    Ok((b_key, a.local_key()))
}
