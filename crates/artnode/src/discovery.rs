//! ArtPoll handling and ArtPollReply construction.

use std::net::Ipv4Addr;

use tracing::debug;

use artnode_protocol::packets::{pack_name, ArtPacket, ArtPoll, ArtPollReply};
use artnode_protocol::{
    TtmMode, ARTNET_PORT, MAX_PORTS, TTM_BEHAVIOUR_MASK, TTM_REPLY_MASK,
};

use crate::error::{Error, Result};
use crate::hooks::Event;
use crate::node::{Mode, Node, NodeType};

impl Node {
    /// Answer an ArtPoll: set the reply destination and change-notify
    /// flag from the talk-to-me bits, then reply. Raw nodes stay quiet.
    pub(crate) fn handle_poll(
        &mut self,
        poll: &ArtPoll,
        from: Ipv4Addr,
        packet: &ArtPacket,
    ) -> Result<()> {
        if self.hooks.fire(Event::Poll, packet) {
            return Ok(());
        }
        if self.node_type == NodeType::Raw {
            return Ok(());
        }

        if poll.ttm & TTM_REPLY_MASK != 0 {
            self.reply_addr = from;
        } else {
            self.reply_addr = self.broadcast;
        }
        self.send_reply_on_change = poll.ttm & TTM_BEHAVIOUR_MASK != 0;

        debug!(from = %from, reply_to = %self.reply_addr, "poll handled");
        self.send_poll_reply_internal(true)
    }

    /// Default processing for an inbound reply: record the peer in the
    /// directory consulted by the DMX unicast fan-out.
    pub(crate) fn handle_reply(&mut self, reply: &ArtPollReply, packet: &ArtPacket) {
        if self.hooks.fire(Event::Reply, packet) {
            return;
        }
        self.directory.update(reply);
    }

    /// Broadcast (or unicast) an ArtPoll. Only servers and raw nodes
    /// poll the network.
    pub fn send_poll(&mut self, destination: Option<Ipv4Addr>, ttm: TtmMode) -> Result<()> {
        if self.mode != Mode::On {
            return Err(Error::Action("node is not running".into()));
        }
        if !matches!(self.node_type, NodeType::Server | NodeType::Raw) {
            return Err(Error::State("only servers poll the network".into()));
        }
        let poll = ArtPacket::Poll(ArtPoll {
            ttm: ttm.wire_value(),
            priority: 0,
        });
        let to = destination.unwrap_or(self.broadcast);
        self.send_packet(&poll, to)
    }

    /// Send an unsolicited ArtPollReply to the current reply address.
    pub fn send_poll_reply(&mut self) -> Result<()> {
        if self.mode != Mode::On {
            return Err(Error::Action("node is not running".into()));
        }
        self.send_poll_reply_internal(false)
    }

    /// Snapshot the node into a reply record. Pure: node state is not
    /// touched, and the record is fully initialized every time.
    pub(crate) fn build_poll_reply(&self) -> ArtPollReply {
        let mut reply = ArtPollReply {
            ip: self.ip.octets(),
            port: ARTNET_PORT,
            firmware_hi: self.firmware_hi,
            firmware_lo: self.firmware_lo,
            subnet_hi: 0,
            subnet_lo: self.subnet,
            oem_hi: self.oem_hi,
            oem_lo: self.oem_lo,
            esta: [self.esta_hi, self.esta_lo],
            short_name: pack_name(&self.short_name),
            long_name: pack_name(&self.long_name),
            node_report: pack_name(&self.report_string()),
            num_ports: MAX_PORTS as u16,
            style: self.node_type.style() as u8,
            mac: self.mac,
            ..ArtPollReply::default()
        };
        reply.port_types = self.ports.types;
        for i in 0..MAX_PORTS {
            reply.good_input[i] = self.ports.input[i].status;
            reply.good_output[i] = self.ports.output[i].status;
            reply.sw_in[i] = self.ports.input[i].port.addr;
            reply.sw_out[i] = self.ports.output[i].port.addr;
        }
        reply
    }

    /// The fixed-format report line: code, reply counter, tag.
    fn report_string(&self) -> String {
        format!(
            "{:04x} [{:04}] artnode",
            self.report_code as u16, self.reply_count
        )
    }

    /// Build and transmit a reply. Unsolicited replies bump the counter
    /// embedded in the report string; solicited ones do not.
    pub(crate) fn send_poll_reply_internal(&mut self, solicited: bool) -> Result<()> {
        if !solicited {
            self.reply_count = self.reply_count.wrapping_add(1);
        }
        let reply = ArtPacket::PollReply(self.build_poll_reply());
        let to = self.reply_addr;
        self.send_packet(&reply, to)
    }
}

impl NodeType {
    pub(crate) fn style(self) -> artnode_protocol::StyleCode {
        use artnode_protocol::StyleCode;
        match self {
            NodeType::Server => StyleCode::Server,
            NodeType::Node => StyleCode::Node,
            NodeType::MediaServer => StyleCode::Media,
            NodeType::Route => StyleCode::Route,
            NodeType::Backup => StyleCode::Backup,
            NodeType::Raw => StyleCode::Node,
        }
    }
}
