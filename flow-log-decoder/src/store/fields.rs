//! Flow record field table
//!
//! Every flow record starts with a 32-bit presence mask. Each set bit selects
//! one optional field group, and the groups follow the mask in the order of
//! [`FIELD_TABLE`]. The same order drives rendering, so the table must never
//! be reordered.

use crate::types::DecoderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// Closed set of field groups, in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    Tag,
    RecvTime,
    ProtoFlagsTos,
    AgentAddr4,
    AgentAddr6,
    SrcAddr4,
    SrcAddr6,
    DstAddr4,
    DstAddr6,
    GatewayAddr4,
    GatewayAddr6,
    SrcDstPort,
    Packets,
    Octets,
    IfIndices,
    AgentInfo,
    FlowTimes,
    AsInfo,
    FlowEngineInfo,
    Crc32,
}

/// Number of rows in the field table
pub const FIELD_COUNT: usize = 20;

impl FieldId {
    /// Table row describing this field
    pub fn descriptor(self) -> &'static FieldDescriptor {
        &FIELD_TABLE[self as usize]
    }

    /// Presence-mask bit of this field
    pub fn mask(self) -> FieldMask {
        FieldMask(self.descriptor().bit)
    }
}

/// One packed slot of a fixed-layout field group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    U8(&'static str),
    U16(&'static str),
    U32(&'static str),
    U64(&'static str),
    /// Padding bytes, skipped on decode
    Pad(usize),
}

impl Slot {
    /// Width of the slot in bytes
    pub const fn size(&self) -> usize {
        match self {
            Slot::U8(_) => 1,
            Slot::U16(_) => 2,
            Slot::U32(_) => 4,
            Slot::U64(_) => 8,
            Slot::Pad(n) => *n,
        }
    }

    /// Sub-field name, `None` for padding
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Slot::U8(n) | Slot::U16(n) | Slot::U32(n) | Slot::U64(n) => Some(*n),
            Slot::Pad(_) => None,
        }
    }
}

/// How the bytes of a field group are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// IPv4 (4 bytes) or IPv6 (16 bytes) address stored under the given name
    Address(&'static str),
    /// Big-endian integers laid out back to back
    Packed(&'static [Slot]),
}

/// Static description of one field group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    /// Single presence-mask bit
    pub bit: u32,
    /// Bytes occupied on disk
    pub len: usize,
    /// Field group name, used in error messages and mask specs
    pub name: &'static str,
    pub shape: FieldShape,
}

impl FieldDescriptor {
    /// Names of the decoded sub-fields, in layout order
    pub fn sub_fields(&self) -> Vec<&'static str> {
        match self.shape {
            FieldShape::Address(name) => vec![name],
            FieldShape::Packed(slots) => slots.iter().filter_map(Slot::name).collect(),
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(self.shape, FieldShape::Address(_))
    }
}

const fn packed(
    id: FieldId,
    bit: u32,
    len: usize,
    name: &'static str,
    slots: &'static [Slot],
) -> FieldDescriptor {
    FieldDescriptor { id, bit, len, name, shape: FieldShape::Packed(slots) }
}

const fn address(
    id: FieldId,
    bit: u32,
    len: usize,
    name: &'static str,
    sub: &'static str,
) -> FieldDescriptor {
    FieldDescriptor { id, bit, len, name, shape: FieldShape::Address(sub) }
}

const ROWS: [FieldDescriptor; FIELD_COUNT] = [
    packed(FieldId::Tag, FieldMask::TAG.0, 4, "tag", &[Slot::U32("tag")]),
    packed(FieldId::RecvTime, FieldMask::RECV_TIME.0, 4, "recv_time", &[Slot::U32("recv_secs")]),
    packed(
        FieldId::ProtoFlagsTos,
        FieldMask::PROTO_FLAGS_TOS.0,
        4,
        "proto_flags_tos",
        &[Slot::U8("tcp_flags"), Slot::U8("protocol"), Slot::U8("tos"), Slot::Pad(1)],
    ),
    address(FieldId::AgentAddr4, FieldMask::AGENT_ADDR4.0, 4, "agent_addr4", "agent_addr"),
    address(FieldId::AgentAddr6, FieldMask::AGENT_ADDR6.0, 16, "agent_addr6", "agent_addr"),
    address(FieldId::SrcAddr4, FieldMask::SRC_ADDR4.0, 4, "src_addr4", "src_addr"),
    address(FieldId::SrcAddr6, FieldMask::SRC_ADDR6.0, 16, "src_addr6", "src_addr"),
    address(FieldId::DstAddr4, FieldMask::DST_ADDR4.0, 4, "dst_addr4", "dst_addr"),
    address(FieldId::DstAddr6, FieldMask::DST_ADDR6.0, 16, "dst_addr6", "dst_addr"),
    address(FieldId::GatewayAddr4, FieldMask::GATEWAY_ADDR4.0, 4, "gateway_addr4", "gateway_addr"),
    address(FieldId::GatewayAddr6, FieldMask::GATEWAY_ADDR6.0, 16, "gateway_addr6", "gateway_addr"),
    packed(
        FieldId::SrcDstPort,
        FieldMask::SRCDST_PORT.0,
        4,
        "srcdst_port",
        &[Slot::U16("src_port"), Slot::U16("dst_port")],
    ),
    packed(FieldId::Packets, FieldMask::PACKETS.0, 8, "packets", &[Slot::U64("flow_packets")]),
    packed(FieldId::Octets, FieldMask::OCTETS.0, 8, "octets", &[Slot::U64("flow_octets")]),
    packed(
        FieldId::IfIndices,
        FieldMask::IF_INDICES.0,
        4,
        "if_indices",
        &[Slot::U16("if_index_in"), Slot::U16("if_index_out")],
    ),
    packed(
        FieldId::AgentInfo,
        FieldMask::AGENT_INFO.0,
        16,
        "agent_info",
        &[
            Slot::U32("sys_uptime_ms"),
            Slot::U32("time_sec"),
            Slot::U32("time_nanosec"),
            Slot::U16("netflow_version"),
            Slot::Pad(2),
        ],
    ),
    packed(
        FieldId::FlowTimes,
        FieldMask::FLOW_TIMES.0,
        8,
        "flow_times",
        &[Slot::U32("flow_start"), Slot::U32("flow_finish")],
    ),
    packed(
        FieldId::AsInfo,
        FieldMask::AS_INFO.0,
        8,
        "as_info",
        &[
            Slot::U16("src_as"),
            Slot::U16("dst_as"),
            Slot::U8("src_masklen"),
            Slot::U8("dst_masklen"),
            Slot::Pad(2),
        ],
    ),
    packed(
        FieldId::FlowEngineInfo,
        FieldMask::FLOW_ENGINE_INFO.0,
        8,
        "flow_engine_info",
        &[Slot::U8("engine_type"), Slot::U8("engine_id"), Slot::Pad(2), Slot::U32("flow_sequence")],
    ),
    packed(FieldId::Crc32, FieldMask::CRC32.0, 4, "crc32", &[Slot::U32("crc")]),
];

/// The field table, in decode and render order
pub static FIELD_TABLE: [FieldDescriptor; FIELD_COUNT] = ROWS;

const fn table_is_consistent() -> bool {
    let mut i = 0;
    let mut seen = 0u32;
    while i < FIELD_COUNT {
        let d = &ROWS[i];
        if d.id as usize != i || d.bit.count_ones() != 1 || seen & d.bit != 0 {
            return false;
        }
        seen |= d.bit;
        match d.shape {
            FieldShape::Address(_) => {
                if d.len != 4 && d.len != 16 {
                    return false;
                }
            }
            FieldShape::Packed(slots) => {
                let mut size = 0;
                let mut j = 0;
                while j < slots.len() {
                    size += slots[j].size();
                    j += 1;
                }
                if size != d.len {
                    return false;
                }
            }
        }
        i += 1;
    }
    true
}

const _: () = assert!(table_is_consistent(), "flow field table is inconsistent");

/// Set of field groups, as found in a record's presence mask or a display mask
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldMask(pub u32);

impl FieldMask {
    pub const NONE: FieldMask = FieldMask(0);

    pub const TAG: FieldMask = FieldMask(1);
    pub const RECV_TIME: FieldMask = FieldMask(1 << 1);
    pub const PROTO_FLAGS_TOS: FieldMask = FieldMask(1 << 2);
    pub const AGENT_ADDR4: FieldMask = FieldMask(1 << 3);
    pub const AGENT_ADDR6: FieldMask = FieldMask(1 << 4);
    pub const SRC_ADDR4: FieldMask = FieldMask(1 << 5);
    pub const SRC_ADDR6: FieldMask = FieldMask(1 << 6);
    pub const DST_ADDR4: FieldMask = FieldMask(1 << 7);
    pub const DST_ADDR6: FieldMask = FieldMask(1 << 8);
    pub const GATEWAY_ADDR4: FieldMask = FieldMask(1 << 9);
    pub const GATEWAY_ADDR6: FieldMask = FieldMask(1 << 10);
    pub const SRCDST_PORT: FieldMask = FieldMask(1 << 11);
    pub const PACKETS: FieldMask = FieldMask(1 << 12);
    pub const OCTETS: FieldMask = FieldMask(1 << 13);
    pub const IF_INDICES: FieldMask = FieldMask(1 << 14);
    pub const AGENT_INFO: FieldMask = FieldMask(1 << 15);
    pub const FLOW_TIMES: FieldMask = FieldMask(1 << 16);
    pub const AS_INFO: FieldMask = FieldMask(1 << 17);
    pub const FLOW_ENGINE_INFO: FieldMask = FieldMask(1 << 18);
    pub const CRC32: FieldMask = FieldMask(1 << 30);

    // Useful combinations
    pub const AGENT_ADDR: FieldMask = FieldMask(Self::AGENT_ADDR4.0 | Self::AGENT_ADDR6.0);
    pub const SRC_ADDR: FieldMask = FieldMask(Self::SRC_ADDR4.0 | Self::SRC_ADDR6.0);
    pub const DST_ADDR: FieldMask = FieldMask(Self::DST_ADDR4.0 | Self::DST_ADDR6.0);
    pub const SRCDST_ADDR: FieldMask = FieldMask(Self::SRC_ADDR.0 | Self::DST_ADDR.0);
    pub const GATEWAY_ADDR: FieldMask = FieldMask(Self::GATEWAY_ADDR4.0 | Self::GATEWAY_ADDR6.0);
    pub const BRIEF: FieldMask = FieldMask(0x0000_39ff);
    pub const ALL: FieldMask = FieldMask(0x4007_ffff);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: FieldMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set
    pub const fn intersects(self, other: FieldMask) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Table rows selected by this mask, in table order
    pub fn descriptors(self) -> impl Iterator<Item = &'static FieldDescriptor> {
        FIELD_TABLE.iter().filter(move |d| self.0 & d.bit != 0)
    }

    fn named(name: &str) -> Option<FieldMask> {
        let mask = match name {
            "none" => Self::NONE,
            "brief" => Self::BRIEF,
            "all" => Self::ALL,
            "agent_addr" => Self::AGENT_ADDR,
            "src_addr" => Self::SRC_ADDR,
            "dst_addr" => Self::DST_ADDR,
            "srcdst_addr" => Self::SRCDST_ADDR,
            "gateway_addr" => Self::GATEWAY_ADDR,
            other => return FIELD_TABLE.iter().find(|d| d.name == other).map(|d| FieldMask(d.bit)),
        };
        Some(mask)
    }
}

impl BitOr for FieldMask {
    type Output = FieldMask;

    fn bitor(self, rhs: FieldMask) -> FieldMask {
        FieldMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for FieldMask {
    fn bitor_assign(&mut self, rhs: FieldMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FieldMask {
    type Output = FieldMask;

    fn bitand(self, rhs: FieldMask) -> FieldMask {
        FieldMask(self.0 & rhs.0)
    }
}

impl Not for FieldMask {
    type Output = FieldMask;

    fn not(self) -> FieldMask {
        FieldMask(!self.0)
    }
}

impl From<u32> for FieldMask {
    fn from(bits: u32) -> Self {
        FieldMask(bits)
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldMask(0x{:08x})", self.0)
    }
}

/// Parses `0x...` hex, plain decimal, or a comma separated list of names
/// such as `brief,as_info,crc32`
impl FromStr for FieldMask {
    type Err = DecoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .map(FieldMask)
                .map_err(|_| DecoderError::InvalidFieldMask(s.to_string()));
        }
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u32>()
                .map(FieldMask)
                .map_err(|_| DecoderError::InvalidFieldMask(s.to_string()));
        }

        if s.split(',').all(|p| p.trim().is_empty()) {
            return Err(DecoderError::InvalidFieldMask(s.to_string()));
        }

        let mut mask = FieldMask::NONE;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_ascii_lowercase();
            mask |= FieldMask::named(&lower)
                .ok_or_else(|| DecoderError::InvalidFieldMask(part.to_string()))?;
        }
        Ok(mask)
    }
}

impl TryFrom<String> for FieldMask {
    type Error = DecoderError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FieldMask> for String {
    fn from(mask: FieldMask) -> String {
        mask.to_string()
    }
}
