//! strait-transport — per-peer association state, the four-way handshake
//! state machine, and the single event loop that drives a UDP socket
//! underneath them.
//!
//! The public surface is [`Socket`]: a socket-like API that multiplexes any
//! number of peer associations over one UDP endpoint. All I/O happens on a
//! background task started by [`Socket::run`]; the API methods only touch
//! the shared association table and send queue.

mod assoc;
mod event_loop;
mod handlers;
mod queue;
mod socket;
mod table;

pub use assoc::{Association, AssociationKey, AssociationState};
pub use socket::{Socket, TransportError};
