//! CRC-32 checksum engine
//!
//! Table-driven CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`) used to
//! protect flow records. The exposed state follows the zlib convention: the
//! state is always the finished CRC of everything fed so far, so a fresh
//! accumulator starts at 0 (the CRC of no bytes) and `finalize()` can be called
//! at any point without disturbing later updates.

/// Reflected form of the IEEE 802.3 polynomial
pub const POLYNOMIAL: u32 = 0xEDB8_8320;

/// 256-entry lookup table, built from [`POLYNOMIAL`] at compile time
static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Incremental CRC-32 accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create an accumulator with state 0
    pub fn new() -> Self {
        Self { state: 0 }
    }

    /// Fold `bytes` into the running checksum, one byte at a time
    pub fn update(&mut self, bytes: &[u8]) {
        let mut crc = !self.state;
        for &b in bytes {
            crc = TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8);
        }
        self.state = !crc;
    }

    /// Current checksum value. Does not reset the accumulator.
    pub fn finalize(&self) -> u32 {
        self.state
    }
}

/// One-shot CRC-32 of a byte slice
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finalize()
}
