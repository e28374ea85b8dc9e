//! CCD sprite resources: header, sprite records, spawn points, per-sprite
//! tile tables and script bytecode, all in one blob.
//!
//! Header layout (u16 offsets into the blob):
//!
//! ```text
//! 0x00  sprite table
//! 0x02  script table (array of u16 bytecode pointers)
//! 0x04  spawn table
//! 0x06  sprite tile-index table
//! ```
//!
//! Sprite records are 10 bytes `{u8 state, u8 no, u8 w, u8 h, u16 x, u16 y,
//! u8 frame, u8 script_index}`; a record with state 0xFF terminates the
//! table. Spawn records are four u16s `{screen_x, screen_y, sprite_x,
//! sprite_y}`.

use super::{byte, le16};
use crate::map::sprite::{Sprite, SpriteFlags};

pub const TILES_PER_FRAME: usize = 9;
pub const FRAMES_PER_ANIM: usize = 12;
pub const ANIMS_PER_SHEET: usize = 4;

pub const BYTES_PER_FRAME: usize = TILES_PER_FRAME * 2;
pub const BYTES_PER_ANIM: usize = BYTES_PER_FRAME * FRAMES_PER_ANIM;
pub const BYTES_PER_SHEET: usize = BYTES_PER_ANIM * ANIMS_PER_SHEET;

const SPRITE_RECORD_SIZE: usize = 10;
const SPAWN_RECORD_SIZE: usize = 8;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Spawn {
    pub screen_x: u16,
    pub screen_y: u16,
    pub sprite_x: u16,
    pub sprite_y: u16,
}

pub struct Ccd<'a> {
    data: &'a [u8],
}

impl<'a> Ccd<'a> {
    pub fn new(data: &'a [u8]) -> Ccd<'a> {
        Ccd { data }
    }

    pub fn sprite_table_off(&self) -> u16 {
        le16(self.data, 0)
    }

    pub fn script_table_off(&self) -> u16 {
        le16(self.data, 2)
    }

    pub fn spawn_table_off(&self) -> u16 {
        le16(self.data, 4)
    }

    pub fn sprite_tiles_off(&self) -> u16 {
        le16(self.data, 6)
    }

    /// Load the `no`th sprite record. `None` past the table terminator.
    ///
    /// The script cursor fields come back zeroed; the caller resolves them
    /// through the script table.
    pub fn load_sprite(&self, no: usize) -> Option<Sprite> {
        let off = self.sprite_table_off() as usize + no * SPRITE_RECORD_SIZE;
        let rec = self.data.get(off..off + SPRITE_RECORD_SIZE)?;
        if rec[0] == 0xff {
            return None;
        }
        Some(Sprite {
            state: SpriteFlags::from_bits_truncate(rec[0]),
            no: rec[1],
            w: rec[2],
            h: rec[3],
            x: u16::from_le_bytes([rec[4], rec[5]]),
            y: u16::from_le_bytes([rec[6], rec[7]]),
            frame: rec[8],
            script_index: rec[9],
            script_ptr: 0,
            script_cmd: 0,
            script_repetitions: 0,
        })
    }

    pub fn load_spawn(&self, no: usize) -> Spawn {
        let off = self.spawn_table_off() as usize + no * SPAWN_RECORD_SIZE;
        Spawn {
            screen_x: le16(self.data, off),
            screen_y: le16(self.data, off + 2),
            sprite_x: le16(self.data, off + 4),
            sprite_y: le16(self.data, off + 6),
        }
    }

    /// Bytecode pointer for a script-table index.
    pub fn script_entry(&self, script_index: u8) -> u16 {
        le16(
            self.data,
            self.script_table_off() as usize + script_index as usize * 2,
        )
    }

    /// One bytecode instruction byte.
    pub fn script_byte(&self, ptr: u16) -> u8 {
        byte(self.data, ptr as usize)
    }

    /// A tile index out of a sprite sheet: `sheet_off` addresses the frame
    /// block within the tile table, `index` the tile within the frame.
    pub fn sprite_tile(&self, sheet_off: usize, index: usize) -> u16 {
        le16(
            self.data,
            self.sprite_tiles_off() as usize + sheet_off + index * 2,
        )
    }
}
