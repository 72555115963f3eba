//! Application event hooks.
//!
//! Each event class carries an optional handler. A bound handler that
//! returns true claims the packet: default processing is skipped for
//! it. Handlers must not re-enter the dispatcher on the same node.

use artnode_protocol::packets::ArtPacket;

/// Event classes a handler can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Any inbound Art-Net packet, before opcode routing
    Recv,
    /// Any outbound Art-Net packet, before transmission
    Send,
    Poll,
    Reply,
    Dmx,
    Address,
    IpProg,
}

/// A bound packet hook. Returning true means "handled".
pub type PacketHook = Box<dyn FnMut(&ArtPacket) -> bool>;

/// Per-port DMX hook, invoked with the port index and its output buffer
/// after a frame for that port was processed.
pub type DmxHook = Box<dyn FnMut(usize, &[u8])>;

#[derive(Default)]
pub struct Hooks {
    recv: Option<PacketHook>,
    send: Option<PacketHook>,
    poll: Option<PacketHook>,
    reply: Option<PacketHook>,
    dmx: Option<PacketHook>,
    address: Option<PacketHook>,
    ipprog: Option<PacketHook>,
    pub(crate) dmx_port: Option<DmxHook>,
}

impl Hooks {
    pub(crate) fn slot(&mut self, event: Event) -> &mut Option<PacketHook> {
        match event {
            Event::Recv => &mut self.recv,
            Event::Send => &mut self.send,
            Event::Poll => &mut self.poll,
            Event::Reply => &mut self.reply,
            Event::Dmx => &mut self.dmx,
            Event::Address => &mut self.address,
            Event::IpProg => &mut self.ipprog,
        }
    }

    /// Fire the hook for an event if one is bound. True = handled.
    pub(crate) fn fire(&mut self, event: Event, packet: &ArtPacket) -> bool {
        match self.slot(event).as_mut() {
            Some(hook) => hook(packet),
            None => false,
        }
    }
}
