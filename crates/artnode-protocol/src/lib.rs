pub mod opcode;
pub mod packets;

/// UDP port registered for Art-Net
pub const ARTNET_PORT: u16 = 6454;

/// 8-byte packet id: "Art-Net" plus a trailing NUL
pub const ARTNET_ID: [u8; 8] = *b"Art-Net\0";

/// Protocol revision carried in every versioned packet
pub const PROTOCOL_VERSION: u8 = 14;

/// Smallest datagram that can carry the id and an opcode
pub const MIN_PACKET_SIZE: usize = 10;

/// Ports per direction built into the protocol. Always 4.
pub const MAX_PORTS: usize = 4;

/// Length of the short name field. Always 18.
pub const SHORT_NAME_LENGTH: usize = 18;
/// Length of the long name field. Always 64.
pub const LONG_NAME_LENGTH: usize = 64;
/// Length of the node report field. Always 64.
pub const REPORT_LENGTH: usize = 64;
/// Length of a full DMX frame. Always 512.
pub const DMX_LENGTH: usize = 512;
/// Length of the hardware address field
pub const MAC_SIZE: usize = 6;

/// Seconds of source silence after which a merge participant is evicted
pub const MERGE_TIMEOUT_SECONDS: u64 = 10;

/// Largest permitted unicast fan-out; above this DMX is always broadcast
pub const MAX_NODE_BCAST_LIMIT: u8 = 30;

/// ArtPoll talk-to-me: bit 0 set means unicast further replies to the requester
pub const TTM_REPLY_MASK: u8 = 0x01;
/// ArtPoll talk-to-me: bit 1 set means send replies when node conditions change
pub const TTM_BEHAVIOUR_MASK: u8 = 0x02;

/// ArtAddress value meaning "leave this field alone"
pub const PROGRAM_NO_CHANGE: u8 = 0x7f;
/// ArtAddress value meaning "reset this field to its default"
pub const PROGRAM_DEFAULTS: u8 = 0x00;
/// ArtAddress bit flagging a value to adopt
pub const PROGRAM_CHANGE_MASK: u8 = 0x80;

pub const LOW_NIBBLE: u8 = 0x0f;
pub const HIGH_NIBBLE: u8 = 0xf0;

// GoodOutput status bits
pub const PORT_STATUS_LPT_MODE: u8 = 0x02;
pub const PORT_STATUS_SHORT: u8 = 0x04;
pub const PORT_STATUS_MERGE: u8 = 0x08;
// GoodInput status bits
pub const PORT_STATUS_ERROR: u8 = 0x04;
pub const PORT_STATUS_DISABLED_MASK: u8 = 0x08;
pub const PORT_STATUS_DMX_TEXT: u8 = 0x10;
pub const PORT_STATUS_DMX_SIP: u8 = 0x20;
pub const PORT_STATUS_DMX_TEST: u8 = 0x40;
// Shared by both directions
pub const PORT_STATUS_ACT_MASK: u8 = 0x80;

/// PortTypes bit enabling the input side of a port
pub const PORT_ENABLE_INPUT: u8 = 0x40;
/// PortTypes bit enabling the output side of a port
pub const PORT_ENABLE_OUTPUT: u8 = 0x80;

// -- Talk-to-me values --
// The wire byte in an ArtPoll is the bitwise complement of these.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TtmMode {
    /// Replies are broadcast, no unsolicited replies on change
    Default = 0xff,
    /// Replies are unicast to the requester
    Private = 0xfe,
    /// Replies are sent whenever node conditions change
    Auto = 0xfd,
}

impl TtmMode {
    /// The byte actually placed in the ArtPoll talk-to-me field.
    pub fn wire_value(self) -> u8 {
        !(self as u8)
    }
}

// -- Type of data carried on a port --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortDataCode {
    Dmx = 0x00,
    Midi = 0x01,
    Avab = 0x02,
    Cmx = 0x03,
    Adb = 0x04,
    ArtNet = 0x05,
}

// -- ArtAddress port commands --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortCommand {
    None = 0x00,
    Cancel = 0x01,
    LedNormal = 0x02,
    LedMute = 0x03,
    LedLocate = 0x04,
    Reset = 0x05,
    MergeLtp0 = 0x10,
    MergeLtp1 = 0x11,
    MergeLtp2 = 0x12,
    MergeLtp3 = 0x13,
    MergeHtp0 = 0x50,
    MergeHtp1 = 0x51,
    MergeHtp2 = 0x52,
    MergeHtp3 = 0x53,
}

impl PortCommand {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Cancel),
            0x02 => Some(Self::LedNormal),
            0x03 => Some(Self::LedMute),
            0x04 => Some(Self::LedLocate),
            0x05 => Some(Self::Reset),
            0x10 => Some(Self::MergeLtp0),
            0x11 => Some(Self::MergeLtp1),
            0x12 => Some(Self::MergeLtp2),
            0x13 => Some(Self::MergeLtp3),
            0x50 => Some(Self::MergeHtp0),
            0x51 => Some(Self::MergeHtp1),
            0x52 => Some(Self::MergeHtp2),
            0x53 => Some(Self::MergeHtp3),
            _ => None,
        }
    }
}

// -- Node report codes --
// Surfaced to peers in the ArtPollReply report string, never returned
// to the local caller.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReportCode {
    Debug = 0x0000,
    PowerOk = 0x0001,
    PowerFail = 0x0002,
    SocketWr1 = 0x0003,
    ParseFail = 0x0004,
    UdpFail = 0x0005,
    ShNameOk = 0x0006,
    LoNameOk = 0x0007,
    DmxError = 0x0008,
    DmxUdpFull = 0x0009,
    DmxRxFull = 0x000a,
    SwitchErr = 0x000b,
    ConfigErr = 0x000c,
    DmxShort = 0x000d,
    FirmwareFail = 0x000e,
    UserFail = 0x000f,
}

// -- Node style codes (ArtPollReply Style field) --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StyleCode {
    Node = 0x00,
    Server = 0x01,
    Media = 0x02,
    Route = 0x03,
    Backup = 0x04,
    Config = 0x05,
}
