//! Text rendering of flow records
//!
//! A record renders as one line starting with `FLOW `, followed by a
//! `label value ` segment for every field group that is both present in the
//! record and selected by the display mask. The segment order is fixed.

use crate::config::FormatConfig;
use crate::store::fields::FieldMask;
use crate::store::header::LogHeader;
use crate::time::{interval_time_ms, iso_time};
use crate::types::FlowRecord;
use std::net::IpAddr;

/// Render `record` showing only fields in `mask`
pub fn format_flow(record: &FlowRecord, mask: FieldMask, utc: bool) -> String {
    let fields = record.presence_mask() & mask;
    let mut out = String::from("FLOW ");

    let mut seg = |label: &str, value: String| {
        out.push_str(label);
        out.push(' ');
        out.push_str(&value);
        out.push(' ');
    };

    if fields.intersects(FieldMask::TAG) {
        seg("tag", opt(record.tag()));
    }
    if fields.intersects(FieldMask::RECV_TIME) {
        seg("recv_time", record.recv_secs().map(|t| iso_time(t, utc)).unwrap_or_default());
    }
    if fields.intersects(FieldMask::PROTO_FLAGS_TOS) {
        seg("proto", opt(record.protocol()));
        seg("tcpflags", hex2(record.tcp_flags()));
        seg("tos", hex2(record.tos()));
    }
    if fields.intersects(FieldMask::AGENT_ADDR) {
        seg("agent", addr(record.agent_addr()));
    }

    let ports = fields.intersects(FieldMask::SRCDST_PORT);
    if fields.intersects(FieldMask::SRC_ADDR) {
        seg("src", with_port(record.src_addr(), ports.then(|| record.src_port()).flatten()));
    }
    if fields.intersects(FieldMask::DST_ADDR) {
        seg("dst", with_port(record.dst_addr(), ports.then(|| record.dst_port()).flatten()));
    }

    if fields.intersects(FieldMask::GATEWAY_ADDR) {
        seg("gateway", addr(record.gateway_addr()));
    }
    if fields.intersects(FieldMask::PACKETS) {
        seg("packets", opt(record.flow_packets()));
    }
    if fields.intersects(FieldMask::OCTETS) {
        seg("octets", opt(record.flow_octets()));
    }
    if fields.intersects(FieldMask::IF_INDICES) {
        seg("in_if", opt(record.if_index_in()));
        seg("out_if", opt(record.if_index_out()));
    }
    if fields.intersects(FieldMask::AGENT_INFO) {
        seg("sys_uptime_ms", interval(record.sys_uptime_ms()));
        seg("time_sec", record.time_sec().map(|t| iso_time(t, utc)).unwrap_or_default());
        seg("time_nanosec", opt(record.time_nanosec()));
        seg("netflow ver", opt(record.netflow_version()));
    }
    if fields.intersects(FieldMask::FLOW_TIMES) {
        seg("flow_start", interval(record.flow_start()));
        seg("flow_finish", interval(record.flow_finish()));
    }
    if fields.intersects(FieldMask::AS_INFO) {
        seg("src_AS", opt(record.src_as()));
        seg("src_masklen", opt(record.src_masklen()));
        seg("dst_AS", opt(record.dst_as()));
        seg("dst_masklen", opt(record.dst_masklen()));
    }
    if fields.intersects(FieldMask::FLOW_ENGINE_INFO) {
        seg("engine_type", opt(record.engine_type()));
        seg("engine_id", opt(record.engine_id()));
        seg("seq", opt(record.flow_sequence()));
    }
    if fields.intersects(FieldMask::CRC32) {
        seg("crc32", record.crc().map(|c| format!("{:08x}", c)).unwrap_or_default());
    }

    out
}

/// The line printed before the records of each log file
pub fn format_header_line(path: &str, header: &LogHeader, utc: bool) -> String {
    format!("LOGFILE {} started at {}", path, iso_time(header.start_time, utc))
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn hex2(value: Option<u8>) -> String {
    value.map(|v| format!("{:02x}", v)).unwrap_or_default()
}

fn addr(value: Option<IpAddr>) -> String {
    opt(value)
}

fn with_port(address: Option<IpAddr>, port: Option<u16>) -> String {
    match port {
        Some(p) => format!("{}:{}", addr(address), p),
        None => addr(address),
    }
}

fn interval(ms: Option<u32>) -> String {
    ms.map(|v| interval_time_ms(v as u64)).unwrap_or_default()
}

/// Formatter bound to a [`FormatConfig`], for rendering many records alike
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowFormatter {
    config: FormatConfig,
}

impl FlowFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    pub fn format(&self, record: &FlowRecord) -> String {
        format_flow(record, self.config.field_mask, self.config.utc)
    }

    pub fn format_header(&self, path: &str, header: &LogHeader) -> String {
        format_header_line(path, header, self.config.utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::decode_record;

    fn decode(mask: FieldMask, body: &[u8]) -> FlowRecord {
        let mut bytes = mask.bits().to_be_bytes().to_vec();
        bytes.extend_from_slice(body);
        decode_record(&mut bytes.as_slice()).unwrap().unwrap()
    }

    fn be(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn test_tag_and_recv_time() {
        let record = decode(FieldMask::TAG | FieldMask::RECV_TIME, &be(&[42, 1_000_000_000]));
        let line = format_flow(&record, FieldMask::BRIEF, true);
        assert_eq!(line, "FLOW tag 42 recv_time 2001-09-09T01:46:40 ");

        let local = format_flow(&record, FieldMask::BRIEF, false);
        assert!(local.contains("tag 42 "));
        assert!(local.contains(&iso_time(1_000_000_000, false)));
    }

    #[test]
    fn test_mask_hides_fields() {
        let record = decode(FieldMask::TAG | FieldMask::RECV_TIME, &be(&[42, 0]));
        assert_eq!(format_flow(&record, FieldMask::TAG, true), "FLOW tag 42 ");
        assert_eq!(format_flow(&record, FieldMask::NONE, true), "FLOW ");
    }

    #[test]
    fn test_addresses_with_ports() {
        let mut body = vec![0x02, 17, 0xb8, 0];
        body.extend(be(&[0x0a00_0001, 0xc0a8_0101, 0x0a00_00fe]));
        body.extend_from_slice(&[0x04, 0xd2, 0x00, 0x35]);
        let mask = FieldMask::PROTO_FLAGS_TOS
            | FieldMask::SRC_ADDR4
            | FieldMask::DST_ADDR4
            | FieldMask::GATEWAY_ADDR4
            | FieldMask::SRCDST_PORT;
        let record = decode(mask, &body);

        assert_eq!(
            format_flow(&record, FieldMask::BRIEF, true),
            "FLOW proto 17 tcpflags 02 tos b8 src 10.0.0.1:1234 dst 192.168.1.1:53 "
        );
        assert_eq!(
            format_flow(&record, FieldMask::ALL & !FieldMask::SRCDST_PORT, true),
            "FLOW proto 17 tcpflags 02 tos b8 src 10.0.0.1 dst 192.168.1.1 gateway 10.0.0.254 "
        );
    }

    #[test]
    fn test_all_fields() {
        let mut body = Vec::new();
        body.extend(be(&[7])); // tag
        body.extend(be(&[0x7f00_0001])); // agent v4
        body.extend_from_slice(&1_000u64.to_be_bytes()); // packets
        body.extend_from_slice(&64_000u64.to_be_bytes()); // octets
        body.extend_from_slice(&[0, 3, 0, 4]); // if indices
        body.extend(be(&[3_661_000, 0, 999]));
        body.extend_from_slice(&[0, 5, 0, 0]); // netflow version + pad
        body.extend(be(&[500, 65_020])); // flow times
        body.extend_from_slice(&[0xfd, 0xe8, 0x00, 0x01, 24, 32, 0, 0]); // AS info
        body.extend_from_slice(&[1, 2, 0, 0, 0, 0, 0, 99]); // engine info
        let mask = FieldMask::TAG
            | FieldMask::AGENT_ADDR4
            | FieldMask::PACKETS
            | FieldMask::OCTETS
            | FieldMask::IF_INDICES
            | FieldMask::AGENT_INFO
            | FieldMask::FLOW_TIMES
            | FieldMask::AS_INFO
            | FieldMask::FLOW_ENGINE_INFO;
        let record = decode(mask, &body);

        assert_eq!(
            format_flow(&record, FieldMask::ALL, true),
            "FLOW tag 7 agent 127.0.0.1 packets 1000 octets 64000 in_if 3 out_if 4 \
             sys_uptime_ms 1h1m1s.000 time_sec 1970-01-01T00:00:00 time_nanosec 999 \
             netflow ver 5 flow_start 0s.500 flow_finish 1m5s.020 \
             src_AS 65000 src_masklen 24 dst_AS 1 dst_masklen 32 \
             engine_type 1 engine_id 2 seq 99 "
        );
    }

    #[test]
    fn test_crc_segment() {
        let mut bytes = FieldMask::CRC32.bits().to_be_bytes().to_vec();
        let crc = crate::store::crc32::crc32(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        let record = decode_record(&mut bytes.as_slice()).unwrap().unwrap();
        assert_eq!(
            format_flow(&record, FieldMask::ALL, true),
            format!("FLOW crc32 {:08x} ", crc)
        );
        assert_eq!(format_flow(&record, FieldMask::BRIEF, true), "FLOW ");
    }

    #[test]
    fn test_deterministic() {
        let record = decode(FieldMask::TAG | FieldMask::RECV_TIME, &be(&[1, 2]));
        let formatter = FlowFormatter::new(FormatConfig::new().with_utc(true));
        assert_eq!(formatter.format(&record), formatter.format(&record));
    }

    #[test]
    fn test_header_line() {
        let header = LogHeader {
            magic: LogHeader::MAGIC,
            version: LogHeader::VERSION,
            start_time: 0,
            flags: 0,
        };
        assert_eq!(
            format_header_line("flows.log", &header, true),
            "LOGFILE flows.log started at 1970-01-01T00:00:00"
        );
    }
}
