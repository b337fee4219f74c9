//! strait-core — wire format, CRC32C checksum, and configuration.
//! All other strait crates depend on this one.

pub mod checksum;
pub mod codec;
pub mod config;
pub mod wire;

pub use codec::{deserialize_packet, serialize_packet};
pub use wire::{Chunk, ChunkBody, Packet, WireError};
