//! Flow record decoder
//!
//! Reads one record from a byte source: the presence mask, then each selected
//! field group in table order, then checks the optional CRC-32 trailer. Any
//! failure abandons the whole record; no partially decoded record escapes.

use crate::store::crc32::Crc32;
use crate::store::fields::{
    FieldDescriptor, FieldId, FieldMask, FieldShape, Slot, FIELD_COUNT, FIELD_TABLE,
};
use crate::types::{DecoderError, FieldValue, FlowRecord, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, ErrorKind, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Largest field group on disk (IPv6 addresses and agent info)
const MAX_FIELD_LEN: usize = 16;

/// Read until `buf` is full or the source is exhausted, returning the number
/// of bytes read. Interrupted reads are retried.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decode the next record from `reader`.
///
/// Returns `Ok(None)` when the source is already exhausted at a record
/// boundary. A source that ends part way through a record yields
/// [`DecoderError::ShortRead`] naming the field being read.
pub fn decode_record<R: Read>(reader: &mut R) -> Result<Option<FlowRecord>> {
    let mut hdr = [0u8; 4];
    let got = read_full(reader, &mut hdr)?;
    if got == 0 {
        return Ok(None);
    }
    if got < hdr.len() {
        log::warn!("Short read on flow header: {} of 4 bytes", got);
        return Err(DecoderError::ShortRead { field: "fields", wanted: hdr.len(), got });
    }

    let mut crc = Crc32::new();
    crc.update(&hdr);
    let presence = FieldMask(u32::from_be_bytes(hdr));
    log::trace!("Flow record with fields {}", presence);

    let mut values: [Option<FieldValue>; FIELD_COUNT] = Default::default();
    let mut buf = [0u8; MAX_FIELD_LEN];

    for desc in FIELD_TABLE.iter().filter(|d| presence.bits() & d.bit != 0) {
        let data = &mut buf[..desc.len];
        let got = read_full(reader, data)?;
        if got < desc.len {
            log::warn!("Short read on flow field {}: {} of {} bytes", desc.name, got, desc.len);
            return Err(DecoderError::ShortRead { field: desc.name, wanted: desc.len, got });
        }

        if desc.id != FieldId::Crc32 {
            crc.update(data);
        }
        values[desc.id as usize] = Some(decode_field(desc, data)?);
    }

    let record = FlowRecord::new(presence, values);

    if let Some(expected) = record.crc() {
        let computed = crc.finalize();
        if expected != computed {
            log::warn!(
                "Checksum mismatch on flow record: stored 0x{:08x}, computed 0x{:08x}",
                expected,
                computed
            );
            return Err(DecoderError::ChecksumMismatch { expected, computed });
        }
    }

    Ok(Some(record))
}

/// Decode the bytes of one field group according to its table row
pub fn decode_field(desc: &FieldDescriptor, data: &[u8]) -> Result<FieldValue> {
    match desc.shape {
        FieldShape::Address(_) => decode_address(desc, data).map(FieldValue::Address),
        FieldShape::Packed(slots) => {
            let mut cursor = Cursor::new(data);
            let mut values = Vec::with_capacity(slots.len());
            for slot in slots {
                let value = match slot {
                    Slot::U8(_) => cursor.read_u8()? as u64,
                    Slot::U16(_) => cursor.read_u16::<BigEndian>()? as u64,
                    Slot::U32(_) => cursor.read_u32::<BigEndian>()? as u64,
                    Slot::U64(_) => cursor.read_u64::<BigEndian>()?,
                    Slot::Pad(n) => {
                        cursor.set_position(cursor.position() + *n as u64);
                        continue;
                    }
                };
                values.push(value);
            }
            Ok(FieldValue::Packed(values))
        }
    }
}

fn decode_address(desc: &FieldDescriptor, data: &[u8]) -> Result<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(data) {
        return Ok(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    if let Ok(octets) = <[u8; 16]>::try_from(data) {
        return Ok(IpAddr::V6(Ipv6Addr::from(octets)));
    }
    Err(DecoderError::UnexpectedAddressLength { field: desc.name, len: data.len() })
}
