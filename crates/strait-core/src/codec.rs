//! Packet serialization and deserialization.
//!
//! Serialization writes the common header with a zeroed checksum, appends
//! each chunk (header reserved, body written, length patched in place, zero
//! padding to the next 4-byte boundary), then patches the CRC32C of the
//! whole buffer into the header. Deserialization is the exact inverse; any
//! truncation fails the whole datagram.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{AsBytes, FromBytes};

use crate::checksum::crc32c;
use crate::wire::{
    Chunk, ChunkBody, ChunkHeader, ChunkType, CommonHeader, DataChunk, DataFixed, InitChunk,
    InitFixed, Packet, WireError, CHECKSUM_OFFSET, CHUNK_HEADER_LEN, COMMON_HEADER_LEN,
};

/// Trailing zero bytes needed to bring a chunk of `length` bytes to a
/// 4-byte boundary.
fn padding_for(length: usize) -> usize {
    (4 - length % 4) % 4
}

// ── Serialization ────────────────────────────────────────────────────────────

/// Serialize a packet to its wire form, checksum included.
pub fn serialize_packet(packet: &Packet) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(COMMON_HEADER_LEN + 64);

    let header = CommonHeader {
        src_port: packet.src_port,
        dst_port: packet.dst_port,
        verification_tag: packet.verification_tag,
        checksum: 0,
    };
    buf.put_slice(header.as_bytes());

    for chunk in &packet.chunks {
        write_chunk(&mut buf, chunk);
    }

    let checksum = crc32c(&buf);
    buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_ne_bytes());

    buf.to_vec()
}

fn write_chunk(buf: &mut BytesMut, chunk: &Chunk) {
    let start = buf.len();
    buf.put_bytes(0, CHUNK_HEADER_LEN);

    match &chunk.body {
        ChunkBody::Init(init) | ChunkBody::InitAck(init) => {
            let fixed = InitFixed {
                initiate_tag: init.initiate_tag,
                a_rwnd: init.a_rwnd,
                out_streams: init.out_streams,
                in_streams: init.in_streams,
                initial_tsn: init.initial_tsn,
            };
            buf.put_slice(fixed.as_bytes());
            buf.put_slice(&init.optional_parameters);
        }
        ChunkBody::CookieEcho(cookie) => buf.put_slice(cookie),
        ChunkBody::CookieAck => {}
        ChunkBody::Data(data) => {
            let fixed = DataFixed {
                tsn: data.tsn,
                stream_identifier: data.stream_identifier,
                stream_seq_num: data.stream_seq_num,
                payload_protocol_id: data.payload_protocol_id,
            };
            buf.put_slice(fixed.as_bytes());
            buf.put_slice(&data.user_data);
        }
    }

    let length = buf.len() - start;
    let header = ChunkHeader {
        chunk_type: chunk.body.chunk_type().into(),
        flags: chunk.flags,
        length: length as u16,
    };
    buf[start..start + CHUNK_HEADER_LEN].copy_from_slice(header.as_bytes());

    buf.put_bytes(0, padding_for(length));
}

// ── Deserialization ──────────────────────────────────────────────────────────

/// Decode a datagram into a packet. Fails on truncation or on a chunk type
/// this stack does not carry; the caller drops the whole datagram.
pub fn deserialize_packet(data: &[u8]) -> Result<Packet, WireError> {
    let header =
        CommonHeader::read_from_prefix(data).ok_or(WireError::Truncated("common header"))?;

    let mut chunks = Vec::new();
    let mut offset = COMMON_HEADER_LEN;

    while offset < data.len() {
        let header_bytes = data
            .get(offset..offset + CHUNK_HEADER_LEN)
            .ok_or(WireError::Truncated("chunk header"))?;
        let chunk_header =
            ChunkHeader::read_from(header_bytes).ok_or(WireError::Truncated("chunk header"))?;
        offset += CHUNK_HEADER_LEN;

        let length = usize::from(chunk_header.length);
        let body_len = length
            .checked_sub(CHUNK_HEADER_LEN)
            .ok_or(WireError::Truncated("chunk length"))?;
        let body = data
            .get(offset..offset + body_len)
            .ok_or(WireError::Truncated("chunk body"))?;
        offset += body_len;

        let chunk_type = ChunkType::try_from(chunk_header.chunk_type)?;
        chunks.push(Chunk {
            flags: chunk_header.flags,
            body: read_body(chunk_type, body)?,
        });

        let pad = padding_for(length);
        if pad > 0 {
            if offset + pad > data.len() {
                return Err(WireError::Truncated("chunk padding"));
            }
            offset += pad;
        }
    }

    Ok(Packet {
        src_port: header.src_port,
        dst_port: header.dst_port,
        verification_tag: header.verification_tag,
        chunks,
    })
}

fn read_body(chunk_type: ChunkType, body: &[u8]) -> Result<ChunkBody, WireError> {
    match chunk_type {
        ChunkType::Init => Ok(ChunkBody::Init(read_init(body)?)),
        ChunkType::InitAck => Ok(ChunkBody::InitAck(read_init(body)?)),
        ChunkType::CookieEcho => Ok(ChunkBody::CookieEcho(Bytes::copy_from_slice(body))),
        ChunkType::CookieAck => Ok(ChunkBody::CookieAck),
        ChunkType::Data => read_data(body),
        other => Err(WireError::UnsupportedChunkType(other.into())),
    }
}

fn read_init(body: &[u8]) -> Result<InitChunk, WireError> {
    let fixed = InitFixed::read_from_prefix(body).ok_or(WireError::Truncated("init chunk"))?;
    Ok(InitChunk {
        initiate_tag: fixed.initiate_tag,
        a_rwnd: fixed.a_rwnd,
        out_streams: fixed.out_streams,
        in_streams: fixed.in_streams,
        initial_tsn: fixed.initial_tsn,
        optional_parameters: Bytes::copy_from_slice(&body[std::mem::size_of::<InitFixed>()..]),
    })
}

fn read_data(body: &[u8]) -> Result<ChunkBody, WireError> {
    let fixed = DataFixed::read_from_prefix(body).ok_or(WireError::Truncated("data chunk"))?;
    Ok(ChunkBody::Data(DataChunk {
        tsn: fixed.tsn,
        stream_identifier: fixed.stream_identifier,
        stream_seq_num: fixed.stream_seq_num,
        payload_protocol_id: fixed.payload_protocol_id,
        user_data: Bytes::copy_from_slice(&body[std::mem::size_of::<DataFixed>()..]),
    }))
}

// ── Tests ────────────────────────────────────────────────────────────────────
