//! Readers for the binary resource formats the VM hands us offsets into.
//!
//! All fields are little-endian. Reads past the end of a blob decode as
//! zero; the VM is trusted to point at well-formed resources, but a bad
//! offset must not take the process down.

use byteorder::{ByteOrder, LittleEndian};

pub mod ccd;
pub mod eve;
pub mod mpx;

pub(crate) fn le16(data: &[u8], off: usize) -> u16 {
    match data.get(off..off + 2) {
        Some(b) => LittleEndian::read_u16(b),
        None => 0,
    }
}

pub(crate) fn byte(data: &[u8], off: usize) -> u8 {
    data.get(off).copied().unwrap_or(0)
}
