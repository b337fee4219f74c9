//! Association records — one per peer endpoint.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::Bytes;
use rand::Rng;

use strait_core::wire::DataChunk;

/// Identifies an association by the peer's IPv4 address and port.
/// Equality and hashing use exactly those two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssociationKey {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl AssociationKey {
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        AssociationKey { addr, port }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, self.port)
    }
}

impl From<SocketAddrV4> for AssociationKey {
    fn from(addr: SocketAddrV4) -> Self {
        AssociationKey::new(*addr.ip(), addr.port())
    }
}

impl fmt::Display for AssociationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Handshake and data-phase states. Both sides of a fresh association start
/// in CookieWait. The Shutdown* states are reserved; nothing drives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    CookieWait,
    CookieEchoed,
    Established,
    ShutdownPending,
    ShutdownSent,
    ShutdownReceived,
    ShutdownAckSent,
}

/// Per-peer association state.
///
/// Owned by the association table; handlers take a short-lived mutable
/// borrow scoped to the table's critical section.
#[derive(Debug, Clone)]
pub struct Association {
    /// The peer's verification tag, learned from INIT / INIT_ACK. Stamped
    /// onto every outbound DATA packet header.
    pub peer_ver_tag: u32,
    /// Our own tag, offered as initiate_tag during the handshake.
    pub this_ver_tag: u32,
    pub state: AssociationState,
    pub primary_path: AssociationKey,
    /// Next TSN to stamp on outbound DATA. Post-incremented per send.
    pub next_tsn: u32,
    /// Highest contiguously-delivered inbound TSN.
    pub last_peer_tsn: u32,
    /// Inbound DATA received ahead of `last_peer_tsn + 1`, keyed by TSN.
    pub tsn_ooo_buffer: BTreeMap<u32, DataChunk>,
    /// Delivered user payloads awaiting an application read, in TSN order.
    pub ulp_buffer: VecDeque<Bytes>,

    // Reserved for mechanisms the state machine does not drive:
    // multihoming, error budgets, windows, SACK, stream negotiation.
    pub peer_address_list: Vec<AssociationKey>,
    pub error_count: u16,
    pub error_threshold: u16,
    pub peer_rwnd: u32,
    pub ack_state: u16,
    pub in_streams: u16,
    pub out_streams: u16,
}

impl Association {
    /// A fresh record for `key` in CookieWait, with random 16-bit values
    /// (widened to u32) for the local verification tag and initial TSN.
    pub fn initiate(key: AssociationKey) -> Self {
        let mut rng = rand::thread_rng();
        Association {
            peer_ver_tag: 0,
            this_ver_tag: rng.gen_range(0..=u32::from(u16::MAX)),
            state: AssociationState::CookieWait,
            primary_path: key,
            next_tsn: rng.gen_range(0..=u32::from(u16::MAX)),
            last_peer_tsn: 0,
            tsn_ooo_buffer: BTreeMap::new(),
            ulp_buffer: VecDeque::new(),
            peer_address_list: Vec::new(),
            error_count: 0,
            error_threshold: 0,
            peer_rwnd: 0,
            ack_state: 0,
            in_streams: 0,
            out_streams: 0,
        }
    }
}
