//! Typed Art-Net packets with fixed-offset wire codecs.
//!
//! One struct per opcode, each with an explicit serialize/deserialize
//! pair. Every decode validates lengths before copying; malformed input
//! yields None, never a partial read.

use crate::opcode::{classify, Opcode};
use crate::{
    ARTNET_ID, ARTNET_PORT, DMX_LENGTH, LONG_NAME_LENGTH, MAC_SIZE, MAX_PORTS, MIN_PACKET_SIZE,
    PROTOCOL_VERSION, REPORT_LENGTH, SHORT_NAME_LENGTH,
};

/// Truncate a string into a fixed NUL-terminated name field.
/// At most `N - 1` bytes are kept so the terminator always fits.
pub fn pack_name<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = name.as_bytes();
    let n = bytes.len().min(N - 1);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Read a NUL-terminated name field back into a string, dropping the
/// terminator and anything after it.
pub fn unpack_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).to_string()
}

fn check_header(data: &[u8], opcode: Opcode, min_len: usize) -> bool {
    data.len() >= min_len && classify(data) == Some(opcode as u16)
}

// -- ArtPoll --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPoll {
    /// Talk-to-me byte, already in wire form (see `TtmMode::wire_value`)
    pub ttm: u8,
    pub priority: u8,
}

impl ArtPoll {
    pub const SIZE: usize = 14;

    pub fn serialize(&self, buf: &mut [u8; Self::SIZE]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(&ARTNET_ID);
        buf[8..10].copy_from_slice(&(Opcode::Poll as u16).to_le_bytes());
        buf[10] = 0;
        buf[11] = PROTOCOL_VERSION;
        buf[12] = self.ttm;
        buf[13] = self.priority;
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if !check_header(data, Opcode::Poll, Self::SIZE) {
            return None;
        }
        Some(Self {
            ttm: data[12],
            priority: data[13],
        })
    }
}

// -- ArtPollReply --

/// A node-description snapshot. Field order follows the wire layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPollReply {
    pub ip: [u8; 4],
    pub port: u16,
    pub firmware_hi: u8,
    pub firmware_lo: u8,
    pub subnet_hi: u8,
    pub subnet_lo: u8,
    pub oem_hi: u8,
    pub oem_lo: u8,
    pub ubea: u8,
    pub status: u8,
    pub esta: [u8; 2],
    pub short_name: [u8; SHORT_NAME_LENGTH],
    pub long_name: [u8; LONG_NAME_LENGTH],
    pub node_report: [u8; REPORT_LENGTH],
    pub num_ports: u16,
    pub port_types: [u8; MAX_PORTS],
    pub good_input: [u8; MAX_PORTS],
    pub good_output: [u8; MAX_PORTS],
    pub sw_in: [u8; MAX_PORTS],
    pub sw_out: [u8; MAX_PORTS],
    pub sw_video: u8,
    pub sw_macro: u8,
    pub sw_remote: u8,
    pub style: u8,
    pub mac: [u8; MAC_SIZE],
}

impl Default for ArtPollReply {
    fn default() -> Self {
        Self {
            ip: [0; 4],
            port: ARTNET_PORT,
            firmware_hi: 0,
            firmware_lo: 0,
            subnet_hi: 0,
            subnet_lo: 0,
            oem_hi: 0,
            oem_lo: 0,
            ubea: 0,
            status: 0,
            esta: [0; 2],
            short_name: [0; SHORT_NAME_LENGTH],
            long_name: [0; LONG_NAME_LENGTH],
            node_report: [0; REPORT_LENGTH],
            num_ports: 0,
            port_types: [0; MAX_PORTS],
            good_input: [0; MAX_PORTS],
            good_output: [0; MAX_PORTS],
            sw_in: [0; MAX_PORTS],
            sw_out: [0; MAX_PORTS],
            sw_video: 0,
            sw_macro: 0,
            sw_remote: 0,
            style: 0,
            mac: [0; MAC_SIZE],
        }
    }
}

impl ArtPollReply {
    pub const SIZE: usize = 239;
    /// Offset of the short name field, fixed by the wire layout
    pub const SHORT_NAME_OFFSET: usize = 26;

    pub fn serialize(&self, buf: &mut [u8; Self::SIZE]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(&ARTNET_ID);
        buf[8..10].copy_from_slice(&(Opcode::PollReply as u16).to_le_bytes());
        buf[10..14].copy_from_slice(&self.ip);
        buf[14..16].copy_from_slice(&self.port.to_le_bytes());
        buf[16] = self.firmware_hi;
        buf[17] = self.firmware_lo;
        buf[18] = self.subnet_hi;
        buf[19] = self.subnet_lo;
        buf[20] = self.oem_hi;
        buf[21] = self.oem_lo;
        buf[22] = self.ubea;
        buf[23] = self.status;
        buf[24..26].copy_from_slice(&self.esta);
        buf[26..44].copy_from_slice(&self.short_name);
        buf[44..108].copy_from_slice(&self.long_name);
        buf[108..172].copy_from_slice(&self.node_report);
        buf[172..174].copy_from_slice(&self.num_ports.to_be_bytes());
        buf[174..178].copy_from_slice(&self.port_types);
        buf[178..182].copy_from_slice(&self.good_input);
        buf[182..186].copy_from_slice(&self.good_output);
        buf[186..190].copy_from_slice(&self.sw_in);
        buf[190..194].copy_from_slice(&self.sw_out);
        buf[194] = self.sw_video;
        buf[195] = self.sw_macro;
        buf[196] = self.sw_remote;
        // 197..200 spare
        buf[200] = self.style;
        buf[201..207].copy_from_slice(&self.mac);
        // 207..239 filler
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if !check_header(data, Opcode::PollReply, Self::SIZE) {
            return None;
        }
        let mut reply = Self::default();
        reply.ip.copy_from_slice(&data[10..14]);
        reply.port = u16::from_le_bytes([data[14], data[15]]);
        reply.firmware_hi = data[16];
        reply.firmware_lo = data[17];
        reply.subnet_hi = data[18];
        reply.subnet_lo = data[19];
        reply.oem_hi = data[20];
        reply.oem_lo = data[21];
        reply.ubea = data[22];
        reply.status = data[23];
        reply.esta.copy_from_slice(&data[24..26]);
        reply.short_name.copy_from_slice(&data[26..44]);
        reply.long_name.copy_from_slice(&data[44..108]);
        reply.node_report.copy_from_slice(&data[108..172]);
        reply.num_ports = u16::from_be_bytes([data[172], data[173]]);
        reply.port_types.copy_from_slice(&data[174..178]);
        reply.good_input.copy_from_slice(&data[178..182]);
        reply.good_output.copy_from_slice(&data[182..186]);
        reply.sw_in.copy_from_slice(&data[186..190]);
        reply.sw_out.copy_from_slice(&data[190..194]);
        reply.sw_video = data[194];
        reply.sw_macro = data[195];
        reply.sw_remote = data[196];
        reply.style = data[200];
        reply.mac.copy_from_slice(&data[201..207]);
        Some(reply)
    }
}

// -- ArtDmx --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    pub sequence: u8,
    pub physical: u8,
    /// Port-address; the low byte carries the 8-bit universe
    pub universe: u16,
    /// Frame data, 1..=512 bytes
    pub data: Vec<u8>,
}

impl ArtDmx {
    pub const HEADER_SIZE: usize = 18;

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.clear();
        buf.extend_from_slice(&ARTNET_ID);
        buf.extend_from_slice(&(Opcode::Dmx as u16).to_le_bytes());
        buf.push(0);
        buf.push(PROTOCOL_VERSION);
        buf.push(self.sequence);
        buf.push(self.physical);
        buf.extend_from_slice(&self.universe.to_le_bytes());
        // length is big-endian: high byte first
        buf.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.data);
    }

    /// Decode a frame. The declared length is capped at 512 and at the
    /// bytes actually present; the cap is authoritative.
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if !check_header(data, Opcode::Dmx, Self::HEADER_SIZE) {
            return None;
        }
        let declared = u16::from_be_bytes([data[16], data[17]]) as usize;
        let available = data.len() - Self::HEADER_SIZE;
        let n = declared.min(DMX_LENGTH).min(available);
        Some(Self {
            sequence: data[12],
            physical: data[13],
            universe: u16::from_le_bytes([data[14], data[15]]),
            data: data[Self::HEADER_SIZE..Self::HEADER_SIZE + n].to_vec(),
        })
    }
}

// -- ArtAddress --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtAddress {
    pub short_name: [u8; SHORT_NAME_LENGTH],
    pub long_name: [u8; LONG_NAME_LENGTH],
    pub sw_in: [u8; MAX_PORTS],
    pub sw_out: [u8; MAX_PORTS],
    pub subnet: u8,
    pub sw_video: u8,
    pub command: u8,
}

impl ArtAddress {
    pub const SIZE: usize = 107;

    pub fn serialize(&self, buf: &mut [u8; Self::SIZE]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(&ARTNET_ID);
        buf[8..10].copy_from_slice(&(Opcode::Address as u16).to_le_bytes());
        buf[10] = 0;
        buf[11] = PROTOCOL_VERSION;
        buf[14..32].copy_from_slice(&self.short_name);
        buf[32..96].copy_from_slice(&self.long_name);
        buf[96..100].copy_from_slice(&self.sw_in);
        buf[100..104].copy_from_slice(&self.sw_out);
        buf[104] = self.subnet;
        buf[105] = self.sw_video;
        buf[106] = self.command;
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if !check_header(data, Opcode::Address, Self::SIZE) {
            return None;
        }
        let mut addr = Self {
            short_name: [0; SHORT_NAME_LENGTH],
            long_name: [0; LONG_NAME_LENGTH],
            sw_in: [0; MAX_PORTS],
            sw_out: [0; MAX_PORTS],
            subnet: data[104],
            sw_video: data[105],
            command: data[106],
        };
        addr.short_name.copy_from_slice(&data[14..32]);
        addr.long_name.copy_from_slice(&data[32..96]);
        addr.sw_in.copy_from_slice(&data[96..100]);
        addr.sw_out.copy_from_slice(&data[100..104]);
        Some(addr)
    }
}

// -- ArtIpProg --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtIpProg {
    pub command: u8,
    pub prog_ip: [u8; 4],
    pub prog_subnet_mask: [u8; 4],
    pub prog_port: u16,
}

impl ArtIpProg {
    pub const SIZE: usize = 34;

    pub fn serialize(&self, buf: &mut [u8; Self::SIZE]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(&ARTNET_ID);
        buf[8..10].copy_from_slice(&(Opcode::IpProg as u16).to_le_bytes());
        buf[10] = 0;
        buf[11] = PROTOCOL_VERSION;
        buf[14] = self.command;
        buf[16..20].copy_from_slice(&self.prog_ip);
        buf[20..24].copy_from_slice(&self.prog_subnet_mask);
        buf[24..26].copy_from_slice(&self.prog_port.to_le_bytes());
        // 26..34 spare
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if !check_header(data, Opcode::IpProg, Self::SIZE) {
            return None;
        }
        let mut prog = Self {
            command: data[14],
            prog_ip: [0; 4],
            prog_subnet_mask: [0; 4],
            prog_port: u16::from_le_bytes([data[24], data[25]]),
        };
        prog.prog_ip.copy_from_slice(&data[16..20]);
        prog.prog_subnet_mask.copy_from_slice(&data[20..24]);
        Some(prog)
    }
}

// -- Tagged packet --

/// A classified inbound packet. Opcodes this implementation recognizes
/// but does not process are carried as `Other` with the raw opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtPacket {
    Poll(ArtPoll),
    PollReply(ArtPollReply),
    Dmx(ArtDmx),
    Address(ArtAddress),
    IpProg(ArtIpProg),
    Other(u16),
}

impl ArtPacket {
    /// Decode a classified datagram into its typed form. Returns None
    /// when the datagram is not Art-Net or a recognized opcode carries
    /// a malformed body.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let raw = classify(data)?;
        match Opcode::from_u16(raw) {
            Some(Opcode::Poll) => ArtPoll::deserialize(data).map(Self::Poll),
            Some(Opcode::PollReply) => ArtPollReply::deserialize(data).map(Self::PollReply),
            Some(Opcode::Dmx) => ArtDmx::deserialize(data).map(Self::Dmx),
            Some(Opcode::Address) => ArtAddress::deserialize(data).map(Self::Address),
            Some(Opcode::IpProg) => ArtIpProg::deserialize(data).map(Self::IpProg),
            _ => Some(Self::Other(raw)),
        }
    }

    /// Encode for transmission. `Other` produces a bare header; it never
    /// travels outbound in practice.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Poll(p) => {
                let mut buf = [0u8; ArtPoll::SIZE];
                p.serialize(&mut buf);
                buf.to_vec()
            }
            Self::PollReply(r) => {
                let mut buf = [0u8; ArtPollReply::SIZE];
                r.serialize(&mut buf);
                buf.to_vec()
            }
            Self::Dmx(d) => {
                let mut buf = Vec::with_capacity(ArtDmx::HEADER_SIZE + d.data.len());
                d.serialize(&mut buf);
                buf
            }
            Self::Address(a) => {
                let mut buf = [0u8; ArtAddress::SIZE];
                a.serialize(&mut buf);
                buf.to_vec()
            }
            Self::IpProg(p) => {
                let mut buf = [0u8; ArtIpProg::SIZE];
                p.serialize(&mut buf);
                buf.to_vec()
            }
            Self::Other(op) => {
                let mut buf = Vec::with_capacity(MIN_PACKET_SIZE);
                buf.extend_from_slice(&ARTNET_ID);
                buf.extend_from_slice(&op.to_le_bytes());
                buf
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortCommand;

    #[test]
    fn poll_roundtrip() {
        let poll = ArtPoll {
            ttm: 0x03,
            priority: 0,
        };
        let mut buf = [0u8; ArtPoll::SIZE];
        poll.serialize(&mut buf);

        assert_eq!(&buf[0..8], b"Art-Net\0");
        assert_eq!(buf[8], 0x00);
        assert_eq!(buf[9], 0x20);
        assert_eq!(buf[11], PROTOCOL_VERSION);

        let decoded = ArtPoll::deserialize(&buf).unwrap();
        assert_eq!(decoded, poll);
    }

    #[test]
    fn poll_reply_field_offsets() {
        let reply = ArtPollReply {
            ip: [10, 0, 0, 5],
            short_name: pack_name("desk-node"),
            subnet_lo: 0x03,
            style: 0x00,
            mac: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
            ..Default::default()
        };
        let mut buf = [0u8; ArtPollReply::SIZE];
        reply.serialize(&mut buf);

        // opcode 0x2100 little-endian
        assert_eq!(buf[8], 0x00);
        assert_eq!(buf[9], 0x21);
        // port 6454 = 0x1936 little-endian
        assert_eq!(buf[14], 0x36);
        assert_eq!(buf[15], 0x19);
        assert_eq!(buf[19], 0x03);
        // short name at its documented offset
        assert_eq!(
            &buf[ArtPollReply::SHORT_NAME_OFFSET..ArtPollReply::SHORT_NAME_OFFSET + 9],
            b"desk-node"
        );
        assert_eq!(buf[201..207], [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);

        let decoded = ArtPollReply::deserialize(&buf).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn dmx_roundtrip() {
        let dmx = ArtDmx {
            sequence: 7,
            physical: 1,
            universe: 0x0105,
            data: vec![1, 2, 3, 4],
        };
        let mut buf = Vec::new();
        dmx.serialize(&mut buf);

        assert_eq!(buf.len(), ArtDmx::HEADER_SIZE + 4);
        // universe little-endian
        assert_eq!(buf[14], 0x05);
        assert_eq!(buf[15], 0x01);
        // length big-endian
        assert_eq!(buf[16], 0x00);
        assert_eq!(buf[17], 0x04);

        let decoded = ArtDmx::deserialize(&buf).unwrap();
        assert_eq!(decoded, dmx);
    }

    #[test]
    fn dmx_clamps_declared_length() {
        let dmx = ArtDmx {
            sequence: 0,
            physical: 0,
            universe: 0,
            data: vec![0xaa; 16],
        };
        let mut buf = Vec::new();
        dmx.serialize(&mut buf);
        // lie about the length: claim 513 bytes
        buf[16..18].copy_from_slice(&513u16.to_be_bytes());

        let decoded = ArtDmx::deserialize(&buf).unwrap();
        // clamped to the bytes actually present, never past 512
        assert_eq!(decoded.data.len(), 16);
    }

    #[test]
    fn dmx_declared_shorter_than_payload() {
        let dmx = ArtDmx {
            sequence: 0,
            physical: 0,
            universe: 0,
            data: vec![0xbb; 32],
        };
        let mut buf = Vec::new();
        dmx.serialize(&mut buf);
        buf[16..18].copy_from_slice(&8u16.to_be_bytes());

        let decoded = ArtDmx::deserialize(&buf).unwrap();
        assert_eq!(decoded.data.len(), 8);
    }

    #[test]
    fn address_roundtrip() {
        let addr = ArtAddress {
            short_name: pack_name("booth"),
            long_name: pack_name("front of house booth"),
            sw_in: [0x7f; 4],
            sw_out: [0x80, 0x81, 0x7f, 0x00],
            subnet: 0x82,
            sw_video: 0,
            command: PortCommand::MergeLtp1 as u8,
        };
        let mut buf = [0u8; ArtAddress::SIZE];
        addr.serialize(&mut buf);

        assert_eq!(buf[104], 0x82);
        assert_eq!(buf[106], 0x11);

        let decoded = ArtAddress::deserialize(&buf).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn ipprog_roundtrip() {
        let prog = ArtIpProg {
            command: 0x04,
            prog_ip: [192, 168, 1, 20],
            prog_subnet_mask: [255, 255, 255, 0],
            prog_port: ARTNET_PORT,
        };
        let mut buf = [0u8; ArtIpProg::SIZE];
        prog.serialize(&mut buf);
        let decoded = ArtIpProg::deserialize(&buf).unwrap();
        assert_eq!(decoded, prog);
    }

    #[test]
    fn decode_routes_by_opcode() {
        let mut buf = Vec::new();
        ArtDmx {
            sequence: 0,
            physical: 0,
            universe: 5,
            data: vec![1],
        }
        .serialize(&mut buf);
        assert!(matches!(ArtPacket::decode(&buf), Some(ArtPacket::Dmx(_))));

        let mut poll = [0u8; ArtPoll::SIZE];
        ArtPoll {
            ttm: 0,
            priority: 0,
        }
        .serialize(&mut poll);
        assert!(matches!(ArtPacket::decode(&poll), Some(ArtPacket::Poll(_))));
    }

    #[test]
    fn decode_unhandled_opcode_is_other() {
        let mut data = [0u8; 14];
        data[..8].copy_from_slice(&ARTNET_ID);
        data[8..10].copy_from_slice(&(Opcode::TodRequest as u16).to_le_bytes());
        assert_eq!(ArtPacket::decode(&data), Some(ArtPacket::Other(0x8000)));
    }

    #[test]
    fn decode_rejects_malformed_body() {
        // valid id + Dmx opcode, but a body too short for the header
        let mut data = [0u8; 12];
        data[..8].copy_from_slice(&ARTNET_ID);
        data[8..10].copy_from_slice(&(Opcode::Dmx as u16).to_le_bytes());
        assert!(ArtPacket::decode(&data).is_none());
    }

    #[test]
    fn reject_invalid_magic() {
        let bad = [0xffu8; 64];
        assert!(ArtPoll::deserialize(&bad).is_none());
        assert!(ArtPollReply::deserialize(&bad).is_none());
        assert!(ArtDmx::deserialize(&bad).is_none());
        assert!(ArtAddress::deserialize(&bad).is_none());
        assert!(ArtPacket::decode(&bad).is_none());
    }

    #[test]
    fn pack_name_truncates_and_terminates() {
        let field: [u8; 18] = pack_name("a name that is far too long for the field");
        assert_eq!(field[17], 0);
        assert_eq!(unpack_name(&field), "a name that is fa");

        let short: [u8; 18] = pack_name("ok");
        assert_eq!(unpack_name(&short), "ok");
    }
}
