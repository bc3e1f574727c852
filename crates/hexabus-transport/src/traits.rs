//! Packet handler trait

use hexabus_core::Packet;

use crate::listeners::ListenerRegistry;

/// Something the channel routes decoded packets to and drains requests from
///
/// Both methods are called from the channel loop task and must not block on
/// I/O. Implementations serialize their own state.
pub trait PacketHandler: Send + Sync {
    /// Handle a packet addressed from the remote this handler is registered
    /// for (or any unrouted packet, for the fallback).
    ///
    /// Returns true when the handler has something to send, which cuts the
    /// channel's receive phase short so the next flush happens right away.
    fn handle_packet(&self, packet: Packet, listeners: &ListenerRegistry) -> bool;

    /// The request to put on the wire during this flush, if any
    fn next_request(&self) -> Option<Packet>;
}
