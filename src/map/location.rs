//! Location events: rectangle-plus-facing queries against the EVE table.

use crate::formats::eve;
use crate::map::sprite::SpriteFlags;
use crate::map::{Map, NO_LOCATION};
use crate::vm::{VmMemory, VAR16_RESULT};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocationMode {
    /// Queries always report no location.
    Disabled = 0,
    /// Queries report normally.
    Enabled = 1,
    /// Queries disarm after the first answer; a successful player move or
    /// the end of pathing re-arms them.
    Oneshot = 2,
    /// A location is suppressed when it equals the previous answer.
    NoRepeat = 3,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, SmartDefault)]
pub(crate) struct LocationState {
    #[default(LocationMode::Disabled)]
    pub mode: LocationMode,
    pub enabled: bool,
    #[default(NO_LOCATION)]
    pub prev_location: u16,
}

impl Map {
    pub fn set_location_mode(&mut self, mode: LocationMode) {
        self.location.mode = mode;
        self.location.enabled = mode != LocationMode::Disabled;
        self.location.prev_location = NO_LOCATION;
    }

    fn player_index(&self) -> Option<usize> {
        self.sprites
            .iter()
            .position(|sp| sp.state.contains(SpriteFlags::PLAYER))
    }

    fn sprite_location(&self, eve_data: &[u8], i: usize) -> u16 {
        let sp = &self.sprites[i];
        let x = sp.x as i32;
        let y = sp.y as i32;
        let w = sp.w as i32;
        let h = sp.h as i32;
        for rec in eve::records(eve_data) {
            if x + (w - 1) < rec.x_left as i32 || x > rec.x_right as i32 {
                continue;
            }
            if y + h <= rec.y_top as i32 || y >= rec.y_bot as i32 {
                continue;
            }
            if rec.dir_mask as u32 & (1 << (sp.frame >> 4)) == 0 {
                continue;
            }
            return rec.id;
        }
        NO_LOCATION
    }

    fn query_location(&mut self, vm: &VmMemory) -> u16 {
        if !self.location.enabled {
            return NO_LOCATION;
        }

        let player = match self.player_index() {
            Some(i) => i,
            None => {
                warn!("no player sprite?");
                return NO_LOCATION;
            }
        };

        let loc = self.sprite_location(vm.eve(), player);
        if self.location.mode == LocationMode::Oneshot {
            self.location.enabled = false;
        } else if self.location.mode == LocationMode::NoRepeat {
            if loc == self.location.prev_location {
                return NO_LOCATION;
            }
            self.location.prev_location = loc;
        }
        if loc != NO_LOCATION {
            debug!("map_get_location() -> {}", loc);
        }
        loc
    }

    /// Query the event table for the player's location and publish the
    /// answer to the VM result register.
    pub fn get_location(&mut self, vm: &mut VmMemory) {
        let loc = self.query_location(vm);
        vm.set_var16(VAR16_RESULT, loc);
    }
}
