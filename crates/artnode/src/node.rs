//! The node itself: lifecycle, configuration setters, the data plane,
//! and the inbound dispatch loop.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use artnode_protocol::opcode::classify;
use artnode_protocol::packets::{ArtDmx, ArtPacket};
use artnode_protocol::{
    PortDataCode, ReportCode, TtmMode, DMX_LENGTH, LONG_NAME_LENGTH, LOW_NIBBLE,
    MAX_NODE_BCAST_LIMIT, MAX_PORTS, MIN_PACKET_SIZE, PORT_STATUS_ACT_MASK,
    PORT_STATUS_DISABLED_MASK, SHORT_NAME_LENGTH,
};

use crate::error::{Error, Result};
use crate::hooks::{Event, Hooks};
use crate::nodes::NodeDirectory;
use crate::ports::{PortBank, PortDirection};
use crate::transport::{Transport, UdpTransport};

/// The node's lifecycle mode. Nearly every mutating and network
/// operation is gated on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Standby,
    On,
}

/// What kind of device this node presents as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Transmits DMX, polls the network
    Server,
    /// Receives DMX
    Node,
    MediaServer,
    Route,
    Backup,
    /// Diagnostics only; never answers polls or address programming
    Raw,
}

/// Construction parameters. Interface enumeration is never performed
/// here; addresses are explicit.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub ip: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mac: [u8; 6],
    pub node_type: NodeType,
    pub verbose: bool,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            broadcast: Ipv4Addr::BROADCAST,
            gateway: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            mac: [0; 6],
            node_type: NodeType::Node,
            verbose: false,
        }
    }
}

/// Snapshot of the node's addressing configuration.
#[derive(Debug, Clone, Serialize)]
pub struct NodeConfig {
    pub short_name: String,
    pub long_name: String,
    pub subnet: u8,
    /// Low nibble of each input port's universe address
    pub in_ports: [u8; MAX_PORTS],
    /// Low nibble of each output port's universe address
    pub out_ports: [u8; MAX_PORTS],
}

/// One Art-Net node: identity, addressing, four ports per direction,
/// and the transport it speaks through.
pub struct Node {
    pub(crate) ip: Ipv4Addr,
    pub(crate) broadcast: Ipv4Addr,
    pub(crate) gateway: Ipv4Addr,
    pub(crate) netmask: Ipv4Addr,
    pub(crate) mac: [u8; 6],

    pub(crate) short_name: String,
    pub(crate) long_name: String,
    pub(crate) default_short_name: String,
    pub(crate) default_long_name: String,

    pub(crate) node_type: NodeType,
    pub(crate) mode: Mode,

    pub(crate) subnet: u8,
    pub(crate) default_subnet: u8,
    pub(crate) subnet_net_ctl: bool,

    pub(crate) oem_hi: u8,
    pub(crate) oem_lo: u8,
    pub(crate) esta_hi: u8,
    pub(crate) esta_lo: u8,
    pub(crate) firmware_hi: u8,
    pub(crate) firmware_lo: u8,

    pub(crate) bcast_limit: u8,
    pub(crate) reply_addr: Ipv4Addr,
    pub(crate) send_reply_on_change: bool,
    pub(crate) report_code: ReportCode,
    pub(crate) reply_count: u16,

    pub(crate) ports: PortBank,
    pub(crate) directory: NodeDirectory,
    pub(crate) hooks: Hooks,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) master: bool,
    verbose: bool,
}

pub(crate) fn truncate_name(name: &str, field_len: usize) -> String {
    // field_len includes the wire NUL terminator
    let limit = field_len - 1;
    if name.len() <= limit {
        return name.to_string();
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

impl Node {
    /// Create a node speaking plain UDP bound to the options' address.
    pub fn new(options: NodeOptions) -> Self {
        let transport = Box::new(UdpTransport::new(options.ip));
        Self::with_transport(options, transport)
    }

    /// Create a node over a caller-supplied transport.
    pub fn with_transport(options: NodeOptions, transport: Box<dyn Transport>) -> Self {
        if options.verbose {
            info!(
                ip = %options.ip,
                broadcast = %options.broadcast,
                node_type = ?options.node_type,
                "creating node"
            );
        }
        Self {
            ip: options.ip,
            broadcast: options.broadcast,
            gateway: options.gateway,
            netmask: options.netmask,
            mac: options.mac,
            short_name: String::new(),
            long_name: String::new(),
            default_short_name: String::new(),
            default_long_name: String::new(),
            node_type: options.node_type,
            mode: Mode::Standby,
            subnet: 0,
            default_subnet: 0,
            subnet_net_ctl: false,
            oem_hi: 0x04,
            oem_lo: 0x30,
            esta_hi: b'z',
            esta_lo: b'p',
            firmware_hi: 0,
            firmware_lo: 1,
            bcast_limit: 0,
            reply_addr: Ipv4Addr::UNSPECIFIED,
            send_reply_on_change: false,
            report_code: ReportCode::PowerOk,
            reply_count: 0,
            ports: PortBank::default(),
            directory: NodeDirectory::default(),
            hooks: Hooks::default(),
            transport,
            master: true,
            verbose: options.verbose,
        }
    }

    // -- lifecycle --

    /// Open the transport and go network-active. A server polls the
    /// network; every other type announces itself with an unsolicited
    /// reply.
    pub fn start(&mut self) -> Result<()> {
        if self.mode != Mode::Standby {
            return Err(Error::State("start requires a standby node".into()));
        }
        self.transport.open()?;
        self.mode = Mode::On;
        if self.reply_addr.is_unspecified() {
            self.reply_addr = self.broadcast;
        }
        info!(ip = %self.ip, node_type = ?self.node_type, "node started");
        if self.verbose {
            debug!(config = ?self.config(), "node configuration");
        }

        if self.node_type == NodeType::Server {
            self.send_poll(None, TtmMode::Auto)
        } else {
            self.send_poll_reply_internal(false)
        }
    }

    /// Close the transport and fall back to standby.
    pub fn stop(&mut self) -> Result<()> {
        if self.mode != Mode::On {
            return Err(Error::Action("stop requires a running node".into()));
        }
        self.transport.close();
        self.mode = Mode::Standby;
        info!(ip = %self.ip, "node stopped");
        Ok(())
    }

    // -- accessors --

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }

    /// True once an ArtPoll asked for replies on condition changes.
    pub fn notify_on_change(&self) -> bool {
        self.send_reply_on_change
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn report_code(&self) -> ReportCode {
        self.report_code
    }

    /// True for a standalone node or the designated master of its group.
    pub fn is_master(&self) -> bool {
        self.master
    }

    /// Peers learned from ArtPollReply traffic.
    pub fn directory(&self) -> &NodeDirectory {
        &self.directory
    }

    /// The universe address of a port.
    pub fn universe_address(&self, port_id: usize, direction: PortDirection) -> Result<u8> {
        self.check_port_id(port_id)?;
        Ok(match direction {
            PortDirection::Input => self.ports.input[port_id].port.addr,
            PortDirection::Output => self.ports.output[port_id].port.addr,
        })
    }

    /// Snapshot of names, subnet and per-port low nibbles.
    pub fn config(&self) -> NodeConfig {
        let mut config = NodeConfig {
            short_name: self.short_name.clone(),
            long_name: self.long_name.clone(),
            subnet: self.subnet,
            in_ports: [0; MAX_PORTS],
            out_ports: [0; MAX_PORTS],
        };
        for i in 0..MAX_PORTS {
            config.in_ports[i] = self.ports.input[i].port.addr & LOW_NIBBLE;
            config.out_ports[i] = self.ports.output[i].port.addr & LOW_NIBBLE;
        }
        config
    }

    /// Raw socket descriptor for readiness polling. Only meaningful
    /// while the node is on.
    #[cfg(unix)]
    pub fn socket_fd(&self) -> Result<std::os::fd::RawFd> {
        if self.mode != Mode::On {
            return Err(Error::Action("node is not running".into()));
        }
        self.transport
            .raw_fd()
            .ok_or_else(|| Error::Action("transport has no descriptor".into()))
    }

    // -- configuration setters --

    /// Set the OEM code. Standby only.
    pub fn set_oem(&mut self, hi: u8, lo: u8) -> Result<()> {
        if self.mode != Mode::Standby {
            return Err(Error::State("oem code can only change in standby".into()));
        }
        self.oem_hi = hi;
        self.oem_lo = lo;
        Ok(())
    }

    /// Set the ESTA manufacturer code. Standby only.
    pub fn set_esta(&mut self, hi: u8, lo: u8) -> Result<()> {
        if self.mode != Mode::Standby {
            return Err(Error::State("esta code can only change in standby".into()));
        }
        self.esta_hi = hi;
        self.esta_lo = lo;
        Ok(())
    }

    /// Number of known receivers above which DMX falls back to
    /// broadcast. Zero always broadcasts.
    pub fn set_bcast_limit(&mut self, limit: u8) -> Result<()> {
        if limit > MAX_NODE_BCAST_LIMIT {
            return Err(Error::Argument(format!(
                "bcast limit {limit} exceeds {MAX_NODE_BCAST_LIMIT}"
            )));
        }
        self.bcast_limit = limit;
        Ok(())
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type;
    }

    /// Set the short name (≤17 bytes kept). Also becomes the default
    /// that ArtAddress "reset" restores.
    pub fn set_short_name(&mut self, name: &str) {
        self.short_name = truncate_name(name, SHORT_NAME_LENGTH);
        self.default_short_name = self.short_name.clone();
    }

    /// Set the long name (≤63 bytes kept). Also becomes the default
    /// that ArtAddress "reset" restores.
    pub fn set_long_name(&mut self, name: &str) {
        self.long_name = truncate_name(name, LONG_NAME_LENGTH);
        self.default_long_name = self.long_name.clone();
    }

    /// Store the PortTypes byte for a port: direction enable bits OR'd
    /// with the data code.
    pub fn set_port_type(
        &mut self,
        port_id: usize,
        settings: u8,
        data: PortDataCode,
    ) -> Result<()> {
        self.check_port_id(port_id)?;
        self.ports.types[port_id] = settings | data as u8;
        Ok(())
    }

    /// Set the node's subnet. Ineffective (beyond a report code) while
    /// the subnet is under network control.
    pub fn set_subnet_addr(&mut self, subnet: u8) -> Result<()> {
        let subnet = subnet & LOW_NIBBLE;
        self.default_subnet = subnet;

        if !self.subnet_net_ctl && subnet != self.subnet {
            self.subnet = subnet;
            self.ports.apply_subnet(subnet);
            if self.mode == Mode::On {
                return self.send_poll_reply_internal(false);
            }
        } else if self.subnet_net_ctl {
            // user action refused while a controller owns the address
            self.report_code = ReportCode::UserFail;
        }
        Ok(())
    }

    /// Set a port's address (low nibble of `addr`). First use enables
    /// the port. Ineffective (beyond a report code) while that port is
    /// under network control.
    pub fn set_port_addr(
        &mut self,
        port_id: usize,
        direction: PortDirection,
        addr: u8,
    ) -> Result<()> {
        self.check_port_id(port_id)?;
        if addr > 16 {
            return Err(Error::Argument(format!(
                "port address {addr:#04x} out of range"
            )));
        }

        let subnet = self.subnet;
        let mut changed = false;
        let mut refused = false;
        match direction {
            PortDirection::Input => {
                let port = &mut self.ports.input[port_id];
                let first_enable = !port.enabled;
                port.enabled = true;
                port.port.default_addr = addr;
                if !port.port.net_ctl
                    && (first_enable || (addr & LOW_NIBBLE) != (port.port.addr & LOW_NIBBLE))
                {
                    port.port.addr = crate::ports::universe_address(subnet, addr);
                    port.sequence = 0;
                    changed = true;
                } else if port.port.net_ctl {
                    refused = true;
                }
            }
            PortDirection::Output => {
                let port = &mut self.ports.output[port_id];
                let first_enable = !port.enabled;
                port.enabled = true;
                port.port.default_addr = addr;
                if !port.port.net_ctl
                    && (first_enable || (addr & LOW_NIBBLE) != (port.port.addr & LOW_NIBBLE))
                {
                    port.port.addr = crate::ports::universe_address(subnet, addr);
                    changed = true;
                } else if port.port.net_ctl {
                    refused = true;
                }
            }
        }

        if refused {
            self.report_code = ReportCode::UserFail;
        } else if changed && self.mode == Mode::On {
            return self.send_poll_reply_internal(false);
        }
        Ok(())
    }

    // -- event wiring --

    /// Bind a handler for an event class, replacing any previous one.
    pub fn set_handler<F>(&mut self, event: Event, hook: F)
    where
        F: FnMut(&ArtPacket) -> bool + 'static,
    {
        *self.hooks.slot(event) = Some(Box::new(hook));
    }

    pub fn clear_handler(&mut self, event: Event) {
        *self.hooks.slot(event) = None;
    }

    /// Bind the per-port DMX handler, invoked after an output port's
    /// buffer is updated.
    pub fn set_dmx_handler<F>(&mut self, hook: F)
    where
        F: FnMut(usize, &[u8]) + 'static,
    {
        self.hooks.dmx_port = Some(Box::new(hook));
    }

    pub fn clear_dmx_handler(&mut self) {
        self.hooks.dmx_port = None;
    }

    // -- data plane --

    /// Transmit a DMX frame from an input port. Broadcast, unless the
    /// fan-out limit is set and the peer directory knows few enough
    /// receivers for the port's universe.
    pub fn send_dmx(&mut self, port_id: usize, data: &[u8]) -> Result<()> {
        if self.mode != Mode::On {
            return Err(Error::Action("node is not running".into()));
        }
        self.check_port_id(port_id)?;
        self.check_dmx_length(data.len())?;

        let (sequence, universe) = {
            let port = &mut self.ports.input[port_id];
            if !port.enabled || port.status & PORT_STATUS_DISABLED_MASK != 0 {
                return Err(Error::Argument(format!("port {port_id} is disabled")));
            }
            port.status |= PORT_STATUS_ACT_MASK;
            (port.sequence, port.port.addr)
        };

        let packet = ArtPacket::Dmx(ArtDmx {
            sequence,
            physical: port_id as u8,
            universe: universe as u16,
            data: data.to_vec(),
        });

        if self.bcast_limit == 0 {
            self.send_packet(&packet, self.broadcast)?;
        } else {
            match self
                .directory
                .nodes_for_universe(universe, self.bcast_limit as usize)
            {
                Some(ips) if !ips.is_empty() => {
                    for ip in ips {
                        self.send_packet(&packet, ip)?;
                    }
                }
                // nobody known, or too many for unicast
                _ => self.send_packet(&packet, self.broadcast)?,
            }
        }

        self.ports.input[port_id].sequence = self.ports.input[port_id].sequence.wrapping_add(1);
        Ok(())
    }

    /// Broadcast DMX on an arbitrary universe, bypassing port
    /// configuration. Raw nodes only; used for diagnostics.
    pub fn raw_send_dmx(&mut self, universe: u8, data: &[u8]) -> Result<()> {
        if self.mode != Mode::On {
            return Err(Error::Action("node is not running".into()));
        }
        if self.node_type != NodeType::Raw {
            return Err(Error::State("raw send requires a raw node".into()));
        }
        self.check_dmx_length(data.len())?;

        let packet = ArtPacket::Dmx(ArtDmx {
            sequence: 0,
            physical: 0,
            universe: universe as u16,
            data: data.to_vec(),
        });
        self.send_packet(&packet, self.broadcast)
    }

    /// The current reconciled frame of an output port.
    pub fn read_dmx(&self, port_id: usize) -> Result<&[u8]> {
        self.check_port_id(port_id)?;
        let port = &self.ports.output[port_id];
        Ok(&port.data[..port.length])
    }

    // -- inbound dispatch --

    /// Drain and dispatch every pending datagram. Blocks at most
    /// `timeout` per receive attempt; zero polls without blocking.
    pub fn read(&mut self, timeout: Duration) -> Result<()> {
        if self.mode != Mode::On {
            return Err(Error::Action("node is not running".into()));
        }
        let mut buf = [0u8; 1024];
        loop {
            let Some((len, from)) = self.transport.recv_from(&mut buf, timeout)? else {
                break;
            };
            // zero length marks a filtered datagram; our own traffic is
            // filtered too
            if len == 0 || from == self.ip {
                continue;
            }
            let data = &buf[..len];
            if len > MIN_PACKET_SIZE && classify(data).is_some() {
                match ArtPacket::decode(data) {
                    Some(packet) => self.handle(&packet, from, Instant::now())?,
                    None => self.note_parse_failure(),
                }
            }
        }
        Ok(())
    }

    /// Route one classified packet. `now` is injected so merge timeouts
    /// are testable.
    pub(crate) fn handle(
        &mut self,
        packet: &ArtPacket,
        from: Ipv4Addr,
        now: Instant,
    ) -> Result<()> {
        if self.hooks.fire(Event::Recv, packet) {
            return Ok(());
        }
        match packet {
            ArtPacket::Poll(poll) => self.handle_poll(poll, from, packet)?,
            ArtPacket::PollReply(reply) => self.handle_reply(reply, packet),
            ArtPacket::Dmx(frame) => self.handle_dmx(frame, from, now, packet),
            ArtPacket::Address(address) => self.handle_address(address, packet)?,
            ArtPacket::IpProg(_) => {
                if !self.hooks.fire(Event::IpProg, packet) {
                    debug!("ipprog received; no default processing");
                }
            }
            ArtPacket::Other(opcode) => {
                self.report_code = ReportCode::ParseFail;
                debug!(opcode = *opcode, "opcode recognized but not implemented");
            }
        }
        Ok(())
    }

    pub(crate) fn note_parse_failure(&mut self) {
        self.report_code = ReportCode::ParseFail;
        debug!("malformed art-net body dropped");
    }

    /// Encode and transmit a packet, offering it to the send hook
    /// first. Failures set the diagnostic report code peers will see.
    pub(crate) fn send_packet(&mut self, packet: &ArtPacket, to: Ipv4Addr) -> Result<()> {
        if self.hooks.fire(Event::Send, packet) {
            return Ok(());
        }
        let bytes = packet.encode();
        match self.transport.send_to(&bytes, to) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(n) => {
                self.report_code = ReportCode::SocketWr1;
                error!(sent = n, expected = bytes.len(), "short datagram write");
                Err(Error::Network(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "short datagram write",
                )))
            }
            Err(e) => {
                self.report_code = ReportCode::UdpFail;
                error!(to = %to, "datagram send failed: {}", e);
                Err(e)
            }
        }
    }

    pub(crate) fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    fn check_port_id(&self, port_id: usize) -> Result<()> {
        if port_id >= MAX_PORTS {
            return Err(Error::Argument(format!(
                "port index {port_id} out of bounds"
            )));
        }
        Ok(())
    }

    fn check_dmx_length(&self, length: usize) -> Result<()> {
        if length < 1 || length > DMX_LENGTH {
            return Err(Error::Argument(format!(
                "dmx length {length} out of bounds"
            )));
        }
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.transport.close();
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("ip", &self.ip)
            .field("node_type", &self.node_type)
            .field("mode", &self.mode)
            .field("short_name", &self.short_name)
            .field("subnet", &self.subnet)
            .finish_non_exhaustive()
    }
}
