//! Port bank state: four input and four output ports per node.

use std::net::Ipv4Addr;
use std::time::Instant;

use artnode_protocol::{DMX_LENGTH, LOW_NIBBLE, MAX_PORTS};

/// Combine the 4-bit subnet and 4-bit port address into the 8-bit
/// universe address. The subnet is the high nibble.
pub fn universe_address(subnet: u8, port_addr: u8) -> u8 {
    ((subnet & LOW_NIBBLE) << 4) | (port_addr & LOW_NIBBLE)
}

/// Which side of a port a call refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// How two concurrent DMX sources are reconciled on an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Highest takes precedence: byte-wise max
    Htp,
    /// Latest takes precedence: most recent source wins
    Ltp,
}

/// Addressing state shared by both port directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortAddr {
    /// Effective universe address (subnet nibble | port nibble)
    pub addr: u8,
    /// Pre-subnet fallback, restored by ArtAddress defaults
    pub default_addr: u8,
    /// True while the address is under remote control
    pub net_ctl: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InputPort {
    pub port: PortAddr,
    pub enabled: bool,
    pub status: u8,
    /// Outbound frame sequence; resets whenever the address changes
    pub sequence: u8,
}

/// One tracked DMX source feeding an output port.
#[derive(Debug, Clone)]
pub struct SourceSlot {
    pub ip: Option<Ipv4Addr>,
    pub last_seen: Option<Instant>,
    pub data: [u8; DMX_LENGTH],
    pub length: usize,
}

impl Default for SourceSlot {
    fn default() -> Self {
        Self {
            ip: None,
            last_seen: None,
            data: [0; DMX_LENGTH],
            length: 0,
        }
    }
}

impl SourceSlot {
    pub fn is_empty(&self) -> bool {
        self.ip.is_none()
    }

    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        self.ip == Some(ip)
    }

    /// Take ownership of the slot for a new source.
    pub fn adopt(&mut self, ip: Ipv4Addr, now: Instant, payload: &[u8]) {
        self.ip = Some(ip);
        self.refresh(now, payload);
    }

    /// Record a fresh frame from the slot's current source.
    pub fn refresh(&mut self, now: Instant, payload: &[u8]) {
        self.last_seen = Some(now);
        self.length = payload.len();
        self.data[..payload.len()].copy_from_slice(payload);
    }

    /// Forget the source. The stale buffer is kept; a later HTP merge
    /// only ever reads up to the active output length.
    pub fn evict(&mut self) {
        self.ip = None;
    }
}

#[derive(Debug, Clone)]
pub struct OutputPort {
    pub port: PortAddr,
    pub enabled: bool,
    pub status: u8,
    pub merge_mode: MergeMode,
    pub source_a: SourceSlot,
    pub source_b: SourceSlot,
    /// Reconciled frame handed to the consumer
    pub data: [u8; DMX_LENGTH],
    pub length: usize,
}

impl Default for OutputPort {
    fn default() -> Self {
        Self {
            port: PortAddr::default(),
            enabled: false,
            status: 0,
            merge_mode: MergeMode::Htp,
            source_a: SourceSlot::default(),
            source_b: SourceSlot::default(),
            data: [0; DMX_LENGTH],
            length: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PortBank {
    pub input: [InputPort; MAX_PORTS],
    pub output: [OutputPort; MAX_PORTS],
    /// PortTypes byte per port: enable bits OR'd with the data code
    pub types: [u8; MAX_PORTS],
}

impl PortBank {
    /// Re-derive every port's universe address from a new subnet,
    /// preserving each port's low nibble. Input sequences reset because
    /// their addresses change.
    pub fn apply_subnet(&mut self, subnet: u8) {
        for port in &mut self.input {
            port.port.addr = universe_address(subnet, port.port.addr);
            port.sequence = 0;
        }
        for port in &mut self.output {
            port.port.addr = universe_address(subnet, port.port.addr);
        }
    }
}
