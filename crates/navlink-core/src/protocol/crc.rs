//! X.25 (CRC-16/MCRF4XX) checksum used by MAVLink framing and CRC-extra seeds.
//!
//! The same accumulator serves two purposes:
//!
//! - the frame checksum, computed over the header and payload and then
//!   seeded with the message's CRC extra byte;
//! - the CRC extra itself, computed once per message definition from its
//!   field signature (see [`crate::protocol::dialect::MessageDef::compute_crc_extra`]).

/// Initial accumulator value.
pub const X25_INIT: u16 = 0xFFFF;

/// Incremental X.25 checksum.
///
/// # Examples
///
/// ```rust
/// use navlink_core::protocol::crc::X25Crc;
///
/// let mut crc = X25Crc::new();
/// crc.accumulate(b"123456789");
/// assert_eq!(crc.value(), 0x6F91);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X25Crc(u16);

impl X25Crc {
    /// Creates an accumulator at [`X25_INIT`].
    pub fn new() -> Self {
        Self(X25_INIT)
    }

    /// Folds one byte into the checksum.
    pub fn accumulate_byte(&mut self, byte: u8) {
        let mut tmp = byte ^ (self.0 & 0xFF) as u8;
        tmp ^= tmp << 4;
        let tmp = tmp as u16;
        self.0 = (self.0 >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4);
    }

    /// Folds every byte of `bytes` into the checksum.
    pub fn accumulate(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.accumulate_byte(b);
        }
    }

    /// Folds the UTF-8 bytes of `s` into the checksum.
    pub fn accumulate_str(&mut self, s: &str) {
        self.accumulate(s.as_bytes());
    }

    /// Current 16-bit value.
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Folds the 16-bit value into one byte, the form used for CRC extras.
    pub fn fold_to_byte(&self) -> u8 {
        ((self.0 & 0xFF) ^ (self.0 >> 8)) as u8
    }
}

impl Default for X25Crc {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the checksum of `bytes` in one call.
pub fn x25(bytes: &[u8]) -> u16 {
    let mut crc = X25Crc::new();
    crc.accumulate(bytes);
    crc.value()
}
