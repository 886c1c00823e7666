//! Flow log file header

use crate::types::{DecoderError, Result};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

/// The 16-byte header at the start of every flow log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    pub magic: u32,
    pub version: u32,
    /// Time the log was started, in seconds since the epoch
    pub start_time: u32,
    pub flags: u32,
}

impl LogHeader {
    pub const SIZE: usize = 16;
    pub const MAGIC: u32 = 0x012c_f047;
    pub const VERSION: u32 = 2;

    /// Unpack and validate a big-endian header
    pub fn parse(buf: &[u8; 16]) -> Result<Self> {
        let header = LogHeader {
            magic: BigEndian::read_u32(&buf[0..4]),
            version: BigEndian::read_u32(&buf[4..8]),
            start_time: BigEndian::read_u32(&buf[8..12]),
            flags: BigEndian::read_u32(&buf[12..16]),
        };

        if header.magic != Self::MAGIC {
            return Err(DecoderError::BadMagic(header.magic));
        }
        if header.version != Self::VERSION {
            return Err(DecoderError::UnsupportedVersion(header.version));
        }

        Ok(header)
    }
}
