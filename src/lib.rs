#[macro_use]
extern crate serde;

#[macro_use]
extern crate enum_primitive_derive;

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

#[macro_use]
extern crate smart_default;

use std::error::Error;
use std::fmt;

#[macro_use]
pub mod util;

pub mod formats;
pub mod gfx;
pub mod input;
pub mod map;
pub mod timer;
pub mod vm;

pub use input::{Button, InputBackend};
pub use map::Map;

/// Loads raw archive entries by name.
///
/// The returned bytes are owned by the caller; the map copies what it needs
/// and drops the rest.
pub trait AssetLoader {
    fn load(&mut self, name: &str) -> Option<Vec<u8>>;
}

#[derive(Debug)]
pub enum MapError {
    TooManyTiles {
        cols: u32,
        rows: u32,
    },
    UnimplementedScriptCommand {
        sprite: usize,
        script_index: u8,
        script_ptr: u16,
        cmd: u8,
        repetitions: u8,
    },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::TooManyTiles { cols, rows } => {
                write!(f, "too many tiles in mpx: {}x{}", cols, rows)
            }
            MapError::UnimplementedScriptCommand {
                sprite,
                script_index,
                script_ptr,
                cmd,
                repetitions,
            } => write!(
                f,
                "unimplemented sprite command: {}\n\
                 sprite {}\n\
                 \tscript_index = {}\n\
                 \tscript_ptr = {}\n\
                 \tscript_cmd = {}\n\
                 \tscript_repetitions = {}",
                cmd, sprite, script_index, script_ptr, cmd, repetitions
            ),
        }
    }
}

impl Error for MapError {}

pub type MapResult<T> = Result<T, MapError>;

pub mod prelude {
    pub use super::gfx::{decode_bgr555, GfxBackend, Rgb, Surface};
    pub use super::map::{Direction, LocationMode, Map, SpriteFlags, NO_LOCATION, NO_TILE};
    pub use super::vm::VmMemory;
    pub use super::{AssetLoader, Button, InputBackend};
    pub use super::{MapError, MapResult};
}
