//! Integration tests for the artnode-protocol crate.
//!
//! These exercise classification and the typed codecs together, the way
//! the node core consumes them: raw datagram in, classified packet out.

use artnode_protocol::opcode::{classify, Opcode};
use artnode_protocol::packets::{
    pack_name, unpack_name, ArtAddress, ArtDmx, ArtPacket, ArtPoll, ArtPollReply,
};
use artnode_protocol::{TtmMode, ARTNET_ID, DMX_LENGTH, PROGRAM_NO_CHANGE};

// ---------------------------------------------------------------------------
// 1. Classification feeding decode
// ---------------------------------------------------------------------------

#[test]
fn classified_poll_decodes_to_poll_variant() {
    let mut buf = [0u8; ArtPoll::SIZE];
    ArtPoll {
        ttm: TtmMode::Private.wire_value(),
        priority: 0,
    }
    .serialize(&mut buf);

    assert_eq!(classify(&buf), Some(Opcode::Poll as u16));
    let ArtPacket::Poll(poll) = ArtPacket::decode(&buf).unwrap() else {
        panic!("expected a poll");
    };
    assert_eq!(poll.ttm & 0x01, 0x01);
}

#[test]
fn non_artnet_traffic_never_classifies() {
    // sACN (E1.31) shares the wire with Art-Net on many rigs
    let mut sacn = vec![0u8; 126];
    sacn[4..16].copy_from_slice(b"ASC-E1.17\0\0\0");
    assert!(classify(&sacn).is_none());
    assert!(ArtPacket::decode(&sacn).is_none());
}

#[test]
fn classification_does_not_depend_on_body_validity() {
    // ArtAddress opcode with a truncated body: classifies, fails decode
    let mut data = vec![0u8; 20];
    data[..8].copy_from_slice(&ARTNET_ID);
    data[8..10].copy_from_slice(&(Opcode::Address as u16).to_le_bytes());

    assert_eq!(classify(&data), Some(Opcode::Address as u16));
    assert!(ArtPacket::decode(&data).is_none());
}

// ---------------------------------------------------------------------------
// 2. ArtDmx payload bounds
// ---------------------------------------------------------------------------

#[test]
fn full_frame_roundtrip() {
    let mut frame = vec![0u8; DMX_LENGTH];
    for (i, slot) in frame.iter_mut().enumerate() {
        *slot = (i % 251) as u8;
    }
    let dmx = ArtDmx {
        sequence: 255,
        physical: 3,
        universe: 0x00ff,
        data: frame.clone(),
    };
    let mut buf = Vec::new();
    dmx.serialize(&mut buf);
    assert_eq!(buf.len(), ArtDmx::HEADER_SIZE + DMX_LENGTH);

    let decoded = ArtDmx::deserialize(&buf).unwrap();
    assert_eq!(decoded.data, frame);
}

#[test]
fn oversized_declaration_cannot_overrun() {
    let dmx = ArtDmx {
        sequence: 0,
        physical: 0,
        universe: 0,
        data: vec![7; DMX_LENGTH],
    };
    let mut buf = Vec::new();
    dmx.serialize(&mut buf);
    buf[16..18].copy_from_slice(&u16::MAX.to_be_bytes());
    // pad the datagram so more than 512 bytes are actually available
    buf.extend_from_slice(&[9; 64]);

    let decoded = ArtDmx::deserialize(&buf).unwrap();
    assert_eq!(decoded.data.len(), DMX_LENGTH);
    assert!(decoded.data.iter().all(|&b| b == 7));
}

// ---------------------------------------------------------------------------
// 3. ArtPollReply as consumed by discovery
// ---------------------------------------------------------------------------

#[test]
fn reply_snapshot_survives_the_wire() {
    let reply = ArtPollReply {
        ip: [2, 0, 0, 44],
        subnet_lo: 0x0a,
        esta: *b"zp",
        short_name: pack_name("dimmer-rack"),
        long_name: pack_name("stage left dimmer rack, 4 universes"),
        node_report: pack_name("0001 [0004] artnode"),
        num_ports: 4,
        port_types: [0x80, 0x80, 0x40, 0x00],
        sw_out: [0xa0, 0xa1, 0xa2, 0xa3],
        style: 0x00,
        mac: [2, 0, 0, 0, 0, 44],
        ..Default::default()
    };
    let mut buf = [0u8; ArtPollReply::SIZE];
    reply.serialize(&mut buf);

    let decoded = ArtPollReply::deserialize(&buf).unwrap();
    assert_eq!(unpack_name(&decoded.short_name), "dimmer-rack");
    assert_eq!(unpack_name(&decoded.node_report), "0001 [0004] artnode");
    assert_eq!(decoded.sw_out, [0xa0, 0xa1, 0xa2, 0xa3]);
    assert_eq!(decoded, reply);
}

// ---------------------------------------------------------------------------
// 4. ArtAddress sentinel bytes
// ---------------------------------------------------------------------------

#[test]
fn address_sentinels_pass_through_unchanged() {
    let addr = ArtAddress {
        short_name: [PROGRAM_NO_CHANGE; 18],
        long_name: [0; 64],
        sw_in: [PROGRAM_NO_CHANGE; 4],
        sw_out: [0x85, PROGRAM_NO_CHANGE, 0x00, PROGRAM_NO_CHANGE],
        subnet: PROGRAM_NO_CHANGE,
        sw_video: 0,
        command: 0,
    };
    let mut buf = [0u8; ArtAddress::SIZE];
    addr.serialize(&mut buf);

    let decoded = ArtAddress::deserialize(&buf).unwrap();
    assert_eq!(decoded.sw_out, [0x85, PROGRAM_NO_CHANGE, 0x00, PROGRAM_NO_CHANGE]);
    assert_eq!(decoded.subnet, PROGRAM_NO_CHANGE);
}
