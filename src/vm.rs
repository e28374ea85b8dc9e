//! Shared memory between the bytecode VM and the map subsystem.
//!
//! The VM owns a flat `file_data` blob holding the loaded MPX/CCD/EVE
//! resources, a handful of variable banks, and a small struct-like block it
//! fills in right before calling `Map::load_tilemap`. The map never keeps
//! references into any of it across calls.

use byteorder::{ByteOrder, LittleEndian};

pub const VAR4_COUNT: usize = 8192;
pub const VAR16_COUNT: usize = 64;
pub const VAR32_COUNT: usize = 64;
pub const SYSVAR32_COUNT: usize = 64;

pub const MAP_DATA_SIZE: usize = 44;

/// Player facing direction, published after movement.
pub const VAR16_PLAYER_DIR: usize = 3;
/// General-purpose result register written by every public map call.
pub const VAR16_RESULT: usize = 18;
/// Result register for the 32-bit bank (path cancellation).
pub const VAR32_RESULT: usize = 18;
/// Flag allowing the player to cancel pathing with the cancel button.
pub const VAR4_PATH_CANCEL: usize = 4067;

pub const SYSVAR32_MPX_OFFSET: usize = 12;
pub const SYSVAR32_CCD_OFFSET: usize = 13;
pub const SYSVAR32_EVE_OFFSET: usize = 14;

#[derive(Serialize, Deserialize, Clone)]
pub struct VmMemory {
    pub var4: Vec<u8>,
    pub var16: Vec<u16>,
    pub var32: Vec<u32>,
    pub sysvar32: Vec<u32>,
    /// Loaded game resources; `sysvar32` holds offsets into this blob.
    pub file_data: Vec<u8>,
    /// Screen/camera parameters the game writes before `load_tilemap`.
    ///
    /// ```text
    /// struct map_data {
    ///     u32 mpx_ptr;
    ///     u32 screen_tx;    // offset 4
    ///     u32 screen_ty;    // offset 8
    ///     u32 cols;
    ///     u32 rows;
    ///     u32 uk[2];
    ///     u32 screen_tw;    // offset 28
    ///     u32 screen_th;    // offset 32
    ///     u32 cam_off_tx;   // offset 36
    ///     u32 cam_off_ty;   // offset 40
    /// };
    /// ```
    pub map_data: Vec<u8>,
}

impl Default for VmMemory {
    fn default() -> VmMemory {
        VmMemory {
            var4: vec![0; VAR4_COUNT],
            var16: vec![0; VAR16_COUNT],
            var32: vec![0; VAR32_COUNT],
            sysvar32: vec![0; SYSVAR32_COUNT],
            file_data: Vec::new(),
            map_data: vec![0; MAP_DATA_SIZE],
        }
    }
}

impl VmMemory {
    pub fn new() -> VmMemory {
        Default::default()
    }

    pub fn get_var4(&self, index: usize) -> u8 {
        self.var4.get(index).copied().unwrap_or(0)
    }

    pub fn set_var4(&mut self, index: usize, value: u8) {
        if let Some(v) = self.var4.get_mut(index) {
            *v = value;
        }
    }

    pub fn get_var16(&self, index: usize) -> u16 {
        self.var16.get(index).copied().unwrap_or(0)
    }

    pub fn set_var16(&mut self, index: usize, value: u16) {
        if let Some(v) = self.var16.get_mut(index) {
            *v = value;
        }
    }

    pub fn get_var32(&self, index: usize) -> u32 {
        self.var32.get(index).copied().unwrap_or(0)
    }

    pub fn set_var32(&mut self, index: usize, value: u32) {
        if let Some(v) = self.var32.get_mut(index) {
            *v = value;
        }
    }

    pub fn get_sysvar32(&self, index: usize) -> u32 {
        self.sysvar32.get(index).copied().unwrap_or(0)
    }

    pub fn set_sysvar32(&mut self, index: usize, value: u32) {
        if let Some(v) = self.sysvar32.get_mut(index) {
            *v = value;
        }
    }

    pub fn map_data_field(&self, offset: usize) -> u32 {
        match self.map_data.get(offset..offset + 4) {
            Some(b) => LittleEndian::read_u32(b),
            None => 0,
        }
    }

    pub fn set_map_data_field(&mut self, offset: usize, value: u32) {
        if let Some(b) = self.map_data.get_mut(offset..offset + 4) {
            LittleEndian::write_u32(b, value);
        }
    }

    /// The MPX tile grid within `file_data`.
    pub fn mpx(&self) -> &[u8] {
        self.blob(SYSVAR32_MPX_OFFSET)
    }

    /// The CCD sprite/script resource within `file_data`.
    pub fn ccd(&self) -> &[u8] {
        self.blob(SYSVAR32_CCD_OFFSET)
    }

    /// The EVE location-event table within `file_data`.
    pub fn eve(&self) -> &[u8] {
        self.blob(SYSVAR32_EVE_OFFSET)
    }

    fn blob(&self, sysvar: usize) -> &[u8] {
        let off = self.get_sysvar32(sysvar) as usize;
        self.file_data.get(off..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_data_fields_decode_little_endian() {
        let mut vm = VmMemory::new();
        vm.set_map_data_field(28, 0x1234);
        assert_eq!(vm.map_data[28..32], [0x34, 0x12, 0, 0]);
        assert_eq!(vm.map_data_field(28), 0x1234);
    }

    #[test]
    fn blob_offsets_follow_sysvars() {
        let mut vm = VmMemory::new();
        vm.file_data = vec![0xaa, 0xbb, 0xcc, 0xdd];
        vm.set_sysvar32(SYSVAR32_CCD_OFFSET, 2);
        assert_eq!(vm.ccd(), &[0xcc, 0xdd]);
        // an offset past the end yields an empty slice, not a panic
        vm.set_sysvar32(SYSVAR32_EVE_OFFSET, 100);
        assert_eq!(vm.eve(), &[] as &[u8]);
    }
}
