//! Core types for the flow log decoder library
//!
//! This module defines the decoded flow record and the errors the decoder
//! reports. A [`FlowRecord`] is immutable once built and owns all of its data.

use crate::store::fields::{FieldId, FieldMask, FieldShape, FIELD_COUNT, FIELD_TABLE};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::net::IpAddr;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur while reading a flow log
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Short read on flow log header: got {got} of 16 bytes")]
    ShortHeader { got: usize },

    #[error("Bad magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("Unsupported version {0}")]
    UnsupportedVersion(u32),

    #[error("Short read on flow field {field}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        field: &'static str,
        wanted: usize,
        got: usize,
    },

    #[error("Checksum mismatch: record says 0x{expected:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("Unexpected address length {len} for field {field}")]
    UnexpectedAddressLength { field: &'static str, len: usize },

    #[error("Flow log has been closed")]
    Closed,

    #[error("Flow log stream aborted by an earlier decode error")]
    StreamAborted,

    #[error("Invalid field mask: {0}")]
    InvalidFieldMask(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Address family of a decoded address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AddressFamily {
    #[serde(rename = "AF_INET")]
    Inet,
    #[serde(rename = "AF_INET6")]
    Inet6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Inet => write!(f, "AF_INET"),
            AddressFamily::Inet6 => write!(f, "AF_INET6"),
        }
    }
}

/// Decoded contents of one field group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Address(IpAddr),
    /// One value per named slot of the group's layout, padding excluded
    Packed(Vec<u64>),
}

/// A single named value looked up from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Unsigned(u64),
    Address(IpAddr),
    Family(AddressFamily),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_addr(&self) -> Option<IpAddr> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{}", v),
            Value::Address(a) => write!(f, "{}", a),
            Value::Family(af) => write!(f, "{}", af),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Unsigned(v) => serializer.serialize_u64(*v),
            Value::Address(a) => serializer.collect_str(a),
            Value::Family(af) => af.serialize(serializer),
        }
    }
}

/// One decoded flow record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    presence_mask: FieldMask,
    values: [Option<FieldValue>; FIELD_COUNT],
}

impl FlowRecord {
    pub(crate) fn new(presence_mask: FieldMask, values: [Option<FieldValue>; FIELD_COUNT]) -> Self {
        Self { presence_mask, values }
    }

    /// Presence mask read from the start of the record
    pub fn presence_mask(&self) -> FieldMask {
        self.presence_mask
    }

    pub fn has(&self, id: FieldId) -> bool {
        self.values[id as usize].is_some()
    }

    /// Raw decoded value of a field group
    pub fn field(&self, id: FieldId) -> Option<&FieldValue> {
        self.values[id as usize].as_ref()
    }

    /// Look up a value by sub-field name.
    ///
    /// Besides the layout names (`tag`, `recv_secs`, `src_port`, ...) this
    /// accepts `fields` for the presence mask and `<addr>_af` for the family of
    /// an address. If both the v4 and v6 variant of an address are present the
    /// later table row wins.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == "fields" {
            return Some(Value::Unsigned(self.presence_mask.bits() as u64));
        }
        let mut found = None;
        for (key, value) in self.iter() {
            if key.name() == name {
                found = Some(value);
            }
        }
        found
    }

    /// All values in table order, starting with the presence mask
    pub fn iter(&self) -> impl Iterator<Item = (Key, Value)> + '_ {
        self.iter_masked(FieldMask::ALL)
    }

    /// Like [`FlowRecord::iter`], but only for field groups selected by `mask`.
    /// The presence mask itself is always yielded first.
    pub fn iter_masked(&self, mask: FieldMask) -> impl Iterator<Item = (Key, Value)> + '_ {
        let presence = Value::Unsigned(self.presence_mask.bits() as u64);
        let header = std::iter::once((Key::Name("fields"), presence));
        let selected = FIELD_TABLE.iter().filter(move |desc| mask.bits() & desc.bit != 0);
        let body = selected.flat_map(move |desc| {
            let mut out = Vec::new();
            match (&self.values[desc.id as usize], desc.shape) {
                (Some(FieldValue::Address(addr)), FieldShape::Address(name)) => {
                    out.push((Key::Name(name), Value::Address(*addr)));
                    out.push((Key::Family(name), Value::Family(AddressFamily::of(addr))));
                }
                (Some(FieldValue::Packed(values)), FieldShape::Packed(_)) => {
                    for (name, v) in desc.sub_fields().into_iter().zip(values) {
                        out.push((Key::Name(name), Value::Unsigned(*v)));
                    }
                }
                _ => {}
            }
            out
        });
        header.chain(body)
    }

    fn packed(&self, id: FieldId, index: usize) -> Option<u64> {
        match self.field(id)? {
            FieldValue::Packed(values) => values.get(index).copied(),
            FieldValue::Address(_) => None,
        }
    }

    fn address(&self, v4: FieldId, v6: FieldId) -> Option<IpAddr> {
        let pick = |id| match self.field(id) {
            Some(FieldValue::Address(a)) => Some(*a),
            _ => None,
        };
        pick(v6).or_else(|| pick(v4))
    }

    pub fn tag(&self) -> Option<u32> {
        self.packed(FieldId::Tag, 0).map(|v| v as u32)
    }

    pub fn recv_secs(&self) -> Option<u32> {
        self.packed(FieldId::RecvTime, 0).map(|v| v as u32)
    }

    pub fn tcp_flags(&self) -> Option<u8> {
        self.packed(FieldId::ProtoFlagsTos, 0).map(|v| v as u8)
    }

    pub fn protocol(&self) -> Option<u8> {
        self.packed(FieldId::ProtoFlagsTos, 1).map(|v| v as u8)
    }

    pub fn tos(&self) -> Option<u8> {
        self.packed(FieldId::ProtoFlagsTos, 2).map(|v| v as u8)
    }

    pub fn agent_addr(&self) -> Option<IpAddr> {
        self.address(FieldId::AgentAddr4, FieldId::AgentAddr6)
    }

    pub fn src_addr(&self) -> Option<IpAddr> {
        self.address(FieldId::SrcAddr4, FieldId::SrcAddr6)
    }

    pub fn dst_addr(&self) -> Option<IpAddr> {
        self.address(FieldId::DstAddr4, FieldId::DstAddr6)
    }

    pub fn gateway_addr(&self) -> Option<IpAddr> {
        self.address(FieldId::GatewayAddr4, FieldId::GatewayAddr6)
    }

    pub fn src_port(&self) -> Option<u16> {
        self.packed(FieldId::SrcDstPort, 0).map(|v| v as u16)
    }

    pub fn dst_port(&self) -> Option<u16> {
        self.packed(FieldId::SrcDstPort, 1).map(|v| v as u16)
    }

    pub fn flow_packets(&self) -> Option<u64> {
        self.packed(FieldId::Packets, 0)
    }

    pub fn flow_octets(&self) -> Option<u64> {
        self.packed(FieldId::Octets, 0)
    }

    pub fn if_index_in(&self) -> Option<u16> {
        self.packed(FieldId::IfIndices, 0).map(|v| v as u16)
    }

    pub fn if_index_out(&self) -> Option<u16> {
        self.packed(FieldId::IfIndices, 1).map(|v| v as u16)
    }

    pub fn sys_uptime_ms(&self) -> Option<u32> {
        self.packed(FieldId::AgentInfo, 0).map(|v| v as u32)
    }

    pub fn time_sec(&self) -> Option<u32> {
        self.packed(FieldId::AgentInfo, 1).map(|v| v as u32)
    }

    pub fn time_nanosec(&self) -> Option<u32> {
        self.packed(FieldId::AgentInfo, 2).map(|v| v as u32)
    }

    pub fn netflow_version(&self) -> Option<u16> {
        self.packed(FieldId::AgentInfo, 3).map(|v| v as u16)
    }

    pub fn flow_start(&self) -> Option<u32> {
        self.packed(FieldId::FlowTimes, 0).map(|v| v as u32)
    }

    pub fn flow_finish(&self) -> Option<u32> {
        self.packed(FieldId::FlowTimes, 1).map(|v| v as u32)
    }

    pub fn src_as(&self) -> Option<u16> {
        self.packed(FieldId::AsInfo, 0).map(|v| v as u16)
    }

    pub fn dst_as(&self) -> Option<u16> {
        self.packed(FieldId::AsInfo, 1).map(|v| v as u16)
    }

    pub fn src_masklen(&self) -> Option<u8> {
        self.packed(FieldId::AsInfo, 2).map(|v| v as u8)
    }

    pub fn dst_masklen(&self) -> Option<u8> {
        self.packed(FieldId::AsInfo, 3).map(|v| v as u8)
    }

    pub fn engine_type(&self) -> Option<u8> {
        self.packed(FieldId::FlowEngineInfo, 0).map(|v| v as u8)
    }

    pub fn engine_id(&self) -> Option<u8> {
        self.packed(FieldId::FlowEngineInfo, 1).map(|v| v as u8)
    }

    pub fn flow_sequence(&self) -> Option<u32> {
        self.packed(FieldId::FlowEngineInfo, 2).map(|v| v as u32)
    }

    /// Checksum stored in the record trailer
    pub fn crc(&self) -> Option<u32> {
        self.packed(FieldId::Crc32, 0).map(|v| v as u32)
    }
}

/// Name of a value yielded by [`FlowRecord::iter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Name(&'static str),
    /// `<addr>_af` companion of an address
    Family(&'static str),
}

impl Key {
    pub fn name(&self) -> String {
        match self {
            Key::Name(n) => n.to_string(),
            Key::Family(n) => format!("{}_af", n),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(n) => write!(f, "{}", n),
            Key::Family(n) => write!(f, "{}_af", n),
        }
    }
}

/// Serialisable view of a record restricted to a field mask
#[derive(Debug, Clone, Copy)]
pub struct MaskedRecord<'a> {
    record: &'a FlowRecord,
    mask: FieldMask,
}

impl FlowRecord {
    /// View of this record that serialises only the field groups in `mask`
    pub fn masked(&self, mask: FieldMask) -> MaskedRecord<'_> {
        MaskedRecord { record: self, mask }
    }
}

/// Serialises as a map of name to value, in table order. When both address
/// variants are present only the later one is kept, as with [`FlowRecord::get`].
impl Serialize for MaskedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut entries: Vec<(Key, Value)> = Vec::new();
        for (key, value) in self.record.iter_masked(self.mask) {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

impl Serialize for FlowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.masked(FieldMask::ALL).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn sample() -> FlowRecord {
        let mut values: [Option<FieldValue>; FIELD_COUNT] = Default::default();
        values[FieldId::Tag as usize] = Some(FieldValue::Packed(vec![42]));
        values[FieldId::SrcAddr4 as usize] =
            Some(FieldValue::Address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        values[FieldId::SrcAddr6 as usize] =
            Some(FieldValue::Address(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        values[FieldId::SrcDstPort as usize] = Some(FieldValue::Packed(vec![1234, 80]));
        FlowRecord::new(
            FieldMask::TAG | FieldMask::SRC_ADDR | FieldMask::SRCDST_PORT,
            values,
        )
    }

    #[test]
    fn test_lookup_by_name() {
        let record = sample();
        assert_eq!(record.get("tag"), Some(Value::Unsigned(42)));
        assert_eq!(record.get("dst_port"), Some(Value::Unsigned(80)));
        assert_eq!(record.get("fields"), Some(Value::Unsigned(0x0000_0861)));
        assert_eq!(record.get("recv_secs"), None);
    }

    #[test]
    fn test_later_address_variant_wins() {
        let record = sample();
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(record.get("src_addr"), Some(Value::Address(v6)));
        assert_eq!(record.get("src_addr_af"), Some(Value::Family(AddressFamily::Inet6)));
        assert_eq!(record.src_addr(), Some(v6));
        assert!(record.has(FieldId::SrcAddr4));
    }

    #[test]
    fn test_typed_accessors() {
        let record = sample();
        assert_eq!(record.tag(), Some(42));
        assert_eq!(record.src_port(), Some(1234));
        assert_eq!(record.dst_addr(), None);
        assert_eq!(record.crc(), None);
    }

    #[test]
    fn test_iter_masked_skips_unselected_groups() {
        let record = sample();
        let names: Vec<String> = record
            .iter_masked(FieldMask::TAG)
            .map(|(key, _)| key.name())
            .collect();
        assert_eq!(names, vec!["fields", "tag"]);
        assert_eq!(record.iter().count(), 8);
    }

    #[test]
    fn test_error_display() {
        let err = DecoderError::ShortRead { field: "packets", wanted: 8, got: 3 };
        assert_eq!(
            err.to_string(),
            "Short read on flow field packets: wanted 8 bytes, got 3"
        );
        let err = DecoderError::ChecksumMismatch { expected: 1, computed: 0xdeadbeef };
        assert!(err.to_string().contains("0xdeadbeef"));
    }
}
