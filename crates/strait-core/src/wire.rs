//! strait wire format — on-wire types for the SCTP-like transport.
//!
//! These types ARE the protocol. Every field, every size, every numeric
//! chunk code is part of the wire format and must not change once peers
//! are deployed against it.
//!
//! Fixed-size headers are #[repr(C, packed)] for deterministic layout and
//! use zerocopy derives for safe, allocation-free serialization. Integer
//! fields travel in native byte order; both peers of this stack must share
//! endianness. There is no unsafe code in this module.

use bytes::Bytes;
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Common Header ────────────────────────────────────────────────────────────

/// The 12-byte header that starts every packet on the wire.
///
/// `checksum` carries CRC32C over the whole datagram, computed with these
/// four bytes zeroed. It exists only on the wire; in-memory [`Packet`]s do
/// not carry it.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct CommonHeader {
    pub src_port: u16,
    pub dst_port: u16,
    /// Binds a datagram to its association. 0 on INIT, the peer's tag
    /// afterwards.
    pub verification_tag: u32,
    pub checksum: u32,
}

assert_eq_size!(CommonHeader, [u8; 12]);

/// Wire size of [`CommonHeader`].
pub const COMMON_HEADER_LEN: usize = 12;

/// Byte offset of the checksum field within a datagram.
pub const CHECKSUM_OFFSET: usize = 8;

// ── Chunk Header ─────────────────────────────────────────────────────────────

/// The 4-byte header preceding every chunk.
///
/// `length` is the total chunk length including this header but excluding
/// trailing padding. On the wire each chunk is padded with zero bytes so
/// the next chunk starts on a 4-byte boundary.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ChunkHeader {
    pub chunk_type: u8,
    pub flags: u8,
    pub length: u16,
}

assert_eq_size!(ChunkHeader, [u8; 4]);

/// Wire size of [`ChunkHeader`].
pub const CHUNK_HEADER_LEN: usize = 4;

// ── Chunk Types ──────────────────────────────────────────────────────────────

/// Numeric chunk type codes. Only DATA, INIT, INIT_ACK, COOKIE_ECHO, and
/// COOKIE_ACK are handled; a datagram carrying any other code fails to
/// decode and is dropped whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    Data = 0,
    Init = 1,
    InitAck = 2,
    Sack = 3,
    Heartbeat = 4,
    HeartbeatAck = 5,
    Abort = 6,
    Shutdown = 7,
    ShutdownAck = 8,
    CookieEcho = 10,
    CookieAck = 11,
    Ecne = 12,
    Cwr = 13,
    ShutdownComplete = 14,
}

impl TryFrom<u8> for ChunkType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChunkType::Data),
            1 => Ok(ChunkType::Init),
            2 => Ok(ChunkType::InitAck),
            3 => Ok(ChunkType::Sack),
            4 => Ok(ChunkType::Heartbeat),
            5 => Ok(ChunkType::HeartbeatAck),
            6 => Ok(ChunkType::Abort),
            7 => Ok(ChunkType::Shutdown),
            8 => Ok(ChunkType::ShutdownAck),
            10 => Ok(ChunkType::CookieEcho),
            11 => Ok(ChunkType::CookieAck),
            12 => Ok(ChunkType::Ecne),
            13 => Ok(ChunkType::Cwr),
            14 => Ok(ChunkType::ShutdownComplete),
            other => Err(WireError::UnsupportedChunkType(other)),
        }
    }
}

impl From<ChunkType> for u8 {
    fn from(t: ChunkType) -> u8 {
        t as u8
    }
}

// ── Chunk Bodies ─────────────────────────────────────────────────────────────

/// Fixed prefix of an INIT / INIT_ACK body. Followed on the wire by
/// optional parameters as an opaque byte tail.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct InitFixed {
    pub initiate_tag: u32,
    pub a_rwnd: u32,
    pub out_streams: u16,
    pub in_streams: u16,
    pub initial_tsn: u32,
}

assert_eq_size!(InitFixed, [u8; 16]);

/// Fixed prefix of a DATA body. Followed on the wire by the user payload.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct DataFixed {
    pub tsn: u32,
    pub stream_identifier: u16,
    pub stream_seq_num: u16,
    pub payload_protocol_id: u32,
}

assert_eq_size!(DataFixed, [u8; 12]);

/// INIT / INIT_ACK chunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitChunk {
    pub initiate_tag: u32,
    pub a_rwnd: u32,
    pub out_streams: u16,
    pub in_streams: u16,
    pub initial_tsn: u32,
    /// Optional parameters, carried opaquely. Never inspected.
    pub optional_parameters: Bytes,
}

/// DATA chunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub tsn: u32,
    pub stream_identifier: u16,
    pub stream_seq_num: u16,
    pub payload_protocol_id: u32,
    pub user_data: Bytes,
}

/// The decoded body of a chunk, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkBody {
    Init(InitChunk),
    InitAck(InitChunk),
    /// Opaque cookie bytes. This stack manufactures no cookie state, so
    /// outbound echoes carry an empty body.
    CookieEcho(Bytes),
    CookieAck,
    Data(DataChunk),
}

impl ChunkBody {
    /// The wire type code for this body.
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            ChunkBody::Init(_) => ChunkType::Init,
            ChunkBody::InitAck(_) => ChunkType::InitAck,
            ChunkBody::CookieEcho(_) => ChunkType::CookieEcho,
            ChunkBody::CookieAck => ChunkType::CookieAck,
            ChunkBody::Data(_) => ChunkType::Data,
        }
    }
}

/// One typed unit inside a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub flags: u8,
    pub body: ChunkBody,
}

impl Chunk {
    /// A chunk with zeroed flags, the only kind this stack emits.
    pub fn new(body: ChunkBody) -> Self {
        Chunk { flags: 0, body }
    }
}

/// A full packet: common header fields plus its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub src_port: u16,
    pub dst_port: u16,
    pub verification_tag: u32,
    pub chunks: Vec<Chunk>,
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Receive-window byte budget. Advertised in INIT/INIT_ACK and used as the
/// UDP read buffer size.
pub const RWND: usize = 65535;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise while decoding wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("datagram truncated while reading {0}")]
    Truncated(&'static str),

    #[error("unsupported chunk type: {0}")]
    UnsupportedChunkType(u8),
}

// ── Tests ────────────────────────────────────────────────────────────────────
