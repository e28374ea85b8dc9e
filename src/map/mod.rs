//! The map aggregate: static tile grid, on-screen tile matrix, sprites,
//! camera, pathing and location state.
//!
//! Everything lives in one owned [`Map`] struct; the VM memory, surface
//! pool, input backend and asset archive are borrowed per call.

use std::time::Duration;

use crate::formats::ccd::{Ccd, BYTES_PER_ANIM, BYTES_PER_FRAME, BYTES_PER_SHEET};
use crate::formats::mpx::{MapTile, Mpx};
use crate::gfx::{GfxBackend, SURFACE_SCREEN, SURFACE_STATUS};
use crate::input::{Button, InputBackend};
use crate::timer::{FrameLimiter, MAP_FRAME_TIME};
use crate::vm::VmMemory;
use crate::{AssetLoader, MapError, MapResult};

pub mod bitmap;
pub mod location;
pub mod path;
pub mod sprite;

#[cfg(test)]
pub(crate) mod testutil;

pub use location::LocationMode;
pub use path::MapPos;
pub use sprite::{Direction, Sprite, SpriteFlags};

use bitmap::TileBitmaps;
use location::LocationState;
use path::PathState;

pub const MAP_MAX_TILES: usize = 11_655;

pub const NO_TILE: u16 = 0xffff;
pub const NO_LOCATION: u16 = 0xffff;

/// Tiles are fixed 16x16 pixels.
pub const TILE_SIZE: usize = 16;

/// Capacity of the on-screen tile matrix (rows x cols).
pub(crate) const SCREEN_GRID_W: usize = 640;
pub(crate) const SCREEN_GRID_H: usize = 480;

const STATUS_BAR_W: u32 = 640;
const STATUS_BAR_H: u32 = 32;
/// Viewport row covered by the status bar.
const STATUS_BAR_Y: u32 = 448;
/// Row of the status-bar art on the auxiliary surface.
const STATUS_BAR_ART_Y: u32 = 106;
/// Row on the auxiliary surface where the covered strip is parked.
const STATUS_BAR_SAVE_Y: u32 = 1248;

/// One cell of the on-screen tile matrix.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenTile {
    pub bg: u16,
    pub fg: u16,
    pub sp: u16,
    pub sp2: u16,
    /// Foreground index resolves against the character sheet, not the map
    /// sheet.
    pub fg_cha: bool,
}

impl Default for ScreenTile {
    fn default() -> ScreenTile {
        ScreenTile {
            bg: NO_TILE,
            fg: NO_TILE,
            sp: NO_TILE,
            sp2: NO_TILE,
            fg_cha: false,
        }
    }
}

/// The visible window into the map, in tile coordinates.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Screen {
    pub tx: usize,
    pub ty: usize,
    pub tw: usize,
    pub th: usize,
}

/// One sample of the player position history ring.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SpritePos {
    pub tx: u16,
    pub ty: u16,
    pub frame: u8,
}

pub(crate) const POS_HISTORY_LEN: usize = 32;

fn alloc_screen_tiles() -> Vec<ScreenTile> {
    vec![ScreenTile::default(); SCREEN_GRID_W * SCREEN_GRID_H]
}

#[derive(Serialize, Deserialize)]
pub struct Map {
    pub(crate) screen: Screen,
    pub(crate) cols: usize,
    pub(crate) rows: usize,
    // camera offset from the player sprite
    pub(crate) cam_off_tx: usize,
    pub(crate) cam_off_ty: usize,
    pub(crate) location: LocationState,
    pub(crate) sprites: Vec<Sprite>,
    // player position history
    pub(crate) pos_history: [SpritePos; POS_HISTORY_LEN],
    pub(crate) pos_history_ptr: usize,
    // static map tile data
    pub(crate) tile_data: Vec<MapTile>,
    // on-screen tiles, rebuilt every frame
    #[serde(skip, default = "alloc_screen_tiles")]
    pub(crate) tiles: Vec<ScreenTile>,
    #[serde(skip)]
    pub(crate) timer: FrameLimiter,
    // pathing scratch state; a restored save always starts idle
    #[serde(skip)]
    pub(crate) path: PathState,
    pub(crate) bitmaps: TileBitmaps,
}

impl Default for Map {
    fn default() -> Map {
        Map::new()
    }
}

impl Map {
    pub fn new() -> Map {
        Map {
            screen: Screen::default(),
            cols: 0,
            rows: 0,
            cam_off_tx: 0,
            cam_off_ty: 0,
            location: LocationState::default(),
            sprites: Vec::new(),
            pos_history: [SpritePos::default(); POS_HISTORY_LEN],
            pos_history_ptr: 0,
            tile_data: vec![MapTile::default(); MAP_MAX_TILES],
            tiles: alloc_screen_tiles(),
            timer: FrameLimiter::new(),
            path: PathState::default(),
            bitmaps: TileBitmaps::new(),
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn sprite(&self, no: usize) -> Option<&Sprite> {
        self.sprites.get(no)
    }

    pub fn screen_tile(&self, col: usize, row: usize) -> &ScreenTile {
        &self.tiles[index2d!(col, row, SCREEN_GRID_W)]
    }

    /// Load a tile-sheet page from the asset archive.
    pub fn load_bitmap(
        &mut self,
        assets: &mut dyn AssetLoader,
        name: &str,
        col: usize,
        row: usize,
        which: u32,
    ) {
        self.bitmaps.load_bitmap(assets, name, col, row, which);
    }

    /// Load one of the two 256-color palettes from the asset archive.
    pub fn load_palette(&mut self, assets: &mut dyn AssetLoader, name: &str, which: u32) {
        self.bitmaps.load_palette(assets, name, which);
    }

    /// Refresh screen/camera parameters from the VM's map-data block.
    fn update_map_data(&mut self, vm: &VmMemory) {
        self.screen.tx = vm.map_data_field(4) as usize;
        self.screen.ty = vm.map_data_field(8) as usize;
        self.screen.tw = vm.map_data_field(28) as usize;
        self.screen.th = vm.map_data_field(32) as usize;
        self.cam_off_tx = vm.map_data_field(36) as usize;
        self.cam_off_ty = vm.map_data_field(40) as usize;
        if self.screen.tw > SCREEN_GRID_W || self.screen.th > SCREEN_GRID_H {
            warn!(
                "Screen dimensions too large: {}x{}",
                self.screen.tw, self.screen.th
            );
            self.screen.tw = self.screen.tw.min(SCREEN_GRID_W);
            self.screen.th = self.screen.th.min(SCREEN_GRID_H);
        }
    }

    /// Rebuild the static tile grid from the MPX resource and reset the
    /// location-query state.
    pub fn load_tilemap(&mut self, vm: &VmMemory) -> MapResult<()> {
        debug!("map_load_tilemap()");
        self.update_map_data(vm);

        let mpx = Mpx::new(vm.mpx());
        self.cols = mpx.cols() as usize;
        self.rows = mpx.rows() as usize;
        self.location = LocationState::default();

        if self.rows * self.cols > MAP_MAX_TILES {
            return Err(MapError::TooManyTiles {
                cols: self.cols as u32,
                rows: self.rows as u32,
            });
        }

        for row in 0..self.rows {
            for col in 0..self.cols {
                let i = index2d!(col, row, self.cols);
                self.tile_data[i] = mpx.tile(i);
            }
        }
        Ok(())
    }

    /// Copy the visible window of the static grid into the screen matrix.
    pub fn load_tiles(&mut self) {
        for row in 0..self.screen.th {
            for col in 0..self.screen.tw {
                let i = index2d!(self.screen.tx + col, self.screen.ty + row, self.cols);
                let src = self.tile_data.get(i).copied().unwrap_or_default();
                self.tiles[index2d!(col, row, SCREEN_GRID_W)] = ScreenTile {
                    bg: src.bg,
                    fg: src.fg,
                    sp: NO_TILE,
                    sp2: NO_TILE,
                    fg_cha: false,
                };
            }
        }
    }

    pub(crate) fn tile_collides(&self, x: usize, y: usize) -> bool {
        if x >= self.cols || y >= self.rows {
            // off-map reads as solid
            return true;
        }
        self.tile_data[index2d!(x, y, self.cols)].collides
    }

    /// Stamp every enabled sprite's tiles into the screen matrix.
    pub fn place_sprites(&mut self, vm: &VmMemory) {
        let ccd = Ccd::new(vm.ccd());
        for i in 0..self.sprites.len() {
            if self.sprites[i].state.contains(SpriteFlags::ENABLED) {
                self.place_sprite(i, &ccd);
            }
        }
    }

    fn place_sprite(&mut self, i: usize, ccd: &Ccd) {
        let sp = self.sprites[i];
        let sheet_off = sp.no as usize * BYTES_PER_SHEET
            + (sp.frame >> 4) as usize * BYTES_PER_ANIM
            + (sp.frame & 0xf) as usize * BYTES_PER_FRAME;

        // a sprite left of / above the window contributes nothing
        let off_tx = match (sp.x as usize).checked_sub(self.screen.tx) {
            Some(v) => v,
            None => return,
        };
        let off_ty = match (sp.y as usize).checked_sub(self.screen.ty) {
            Some(v) => v,
            None => return,
        };

        let player_y = self.sprites[0].y;
        let mut sp_t = 0;
        for row in 0..sp.h as usize {
            if off_ty + row >= self.screen.th {
                break;
            }
            for col in 0..sp.w as usize {
                if off_tx + col >= self.screen.tw {
                    break;
                }
                let tile_no = ccd.sprite_tile(sheet_off, sp_t);
                sp_t += 1;
                let cell = &mut self.tiles[index2d!(off_tx + col, off_ty + row, SCREEN_GRID_W)];
                if sp.state.contains(SpriteFlags::NONCHARA) {
                    cell.fg = tile_no;
                    cell.fg_cha = true;
                } else if cell.sp == NO_TILE {
                    cell.sp = tile_no;
                } else if cell.sp2 == NO_TILE {
                    // sprite 0 is the player; keep the farther sprite in `sp`
                    if player_y < sp.y {
                        cell.sp2 = tile_no;
                    } else {
                        cell.sp2 = cell.sp;
                        cell.sp = tile_no;
                    }
                }
            }
        }
    }

    /// Blit the live screen matrix to the viewport surface, restore the
    /// status bar, and pace the frame.
    pub fn draw_tiles(&mut self, gfx: &mut dyn GfxBackend, input: &dyn InputBackend) {
        {
            let dst = gfx.surface_mut(SURFACE_SCREEN);
            for row in 0..self.screen.th {
                for col in 0..self.screen.tw {
                    let tile = self.tiles[index2d!(col, row, SCREEN_GRID_W)];
                    self.bitmaps
                        .draw_tile(dst, &tile, col * TILE_SIZE, row * TILE_SIZE);
                }
            }
        }

        // park the area hidden by the status bar, then draw the bar over it
        gfx.copy(
            SURFACE_SCREEN,
            0,
            STATUS_BAR_Y,
            STATUS_BAR_W,
            STATUS_BAR_H,
            SURFACE_STATUS,
            0,
            STATUS_BAR_SAVE_Y,
        );
        gfx.copy(
            SURFACE_STATUS,
            0,
            STATUS_BAR_ART_Y,
            STATUS_BAR_W,
            STATUS_BAR_H,
            SURFACE_SCREEN,
            0,
            STATUS_BAR_Y,
        );
        gfx.mark_dirty(SURFACE_SCREEN);

        // holding shift doubles the frame rate rather than the per-frame
        // movement; the end result matches and the motion is smoother
        let frame_time = if input.is_down(Button::Shift) {
            MAP_FRAME_TIME / 2
        } else {
            MAP_FRAME_TIME
        };
        self.timer.tick(Duration::from_millis(frame_time));
    }

    pub fn save_state(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn from_saved_state(data: &[u8]) -> bincode::Result<Map> {
        bincode::deserialize(data)
    }
}

#[cfg(feature = "debugger")]
impl std::fmt::Display for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ansi_term::Style;
        writeln!(f, "{}", Style::new().bold().paint("Map status:"))?;
        writeln!(f, "\tsize: {}x{}", self.cols, self.rows)?;
        writeln!(f, "\tscreen: {:?}", self.screen)?;
        writeln!(f, "\tcamera offset: ({},{})", self.cam_off_tx, self.cam_off_ty)?;
        writeln!(f, "\tlocation: {:?}", self.location)?;
        writeln!(f, "\tpathing: {}", self.path.active)?;
        for (i, sp) in self.sprites.iter().enumerate() {
            writeln!(
                f,
                "\tsprite {}: ({},{}) frame {:02x} state {:02x}",
                i,
                sp.x,
                sp.y,
                sp.frame,
                sp.state.bits()
            )?;
        }
        Ok(())
    }
}
