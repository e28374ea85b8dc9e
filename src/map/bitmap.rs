//! Tile sheet storage and the 16x16 blitters.
//!
//! Two indexed-color sheets: the map sheet (terrain) and the character
//! sheet (sprites, plus a misc region), each with its own 256-entry
//! palette. Sheets are stored bottom-up, so blits walk source rows
//! backwards.

use crate::gfx::{decode_bgr555, Rgb, Surface};
use crate::map::{ScreenTile, NO_TILE, TILE_SIZE};
use crate::AssetLoader;

pub const BMP_MAP_W: usize = 1280;
pub const BMP_MAP_H: usize = 960;
pub const BMP_CHA_W: usize = 640;
pub const BMP_CHA_H: usize = 192;

const BMP_MAP_SIZE: usize = BMP_MAP_W * BMP_MAP_H;
const BMP_CHA_SIZE: usize = BMP_CHA_W * BMP_CHA_H;

/// Offset of the character sheet's second page.
const CHA_PAGE2_OFF: usize = 0x7800;
/// Offset of the character sheet's misc region.
const CHA_MISC_OFF: usize = 0xf000;

const PALETTE_FILE_SIZE: usize = 512;

#[derive(Serialize, Deserialize, Clone)]
pub struct TileBitmaps {
    pub(crate) bmp_map: Vec<u8>,
    pub(crate) bmp_cha: Vec<u8>,
    pub(crate) pal_map: Vec<Rgb>,
    pub(crate) pal_cha: Vec<Rgb>,
}

impl Default for TileBitmaps {
    fn default() -> TileBitmaps {
        TileBitmaps {
            bmp_map: vec![0; BMP_MAP_SIZE],
            bmp_cha: vec![0; BMP_CHA_SIZE],
            pal_map: vec![Rgb::default(); 256],
            pal_cha: vec![Rgb::default(); 256],
        }
    }
}

fn copy_to_bmp(bmp: &mut [u8], off: usize, data: &[u8]) {
    if off >= bmp.len() {
        warn!("Tried to write past the end of bitmap");
        return;
    }
    let mut size = data.len();
    if off + size > bmp.len() {
        warn!("Tried to write past the end of bitmap");
        size = bmp.len() - off;
    }
    bmp[off..off + size].copy_from_slice(&data[..size]);
}

/// Source offset of a tile's bottom row within a bottom-up sheet.
fn bmp_offset(tile_no: usize, w: usize, h: usize) -> usize {
    let ty = tile_no / (w / TILE_SIZE);
    let tx = tile_no % (w / TILE_SIZE);
    ((h - ty * TILE_SIZE) - 1) * w + tx * TILE_SIZE
}

fn blit_tile(
    dst: &mut Surface,
    x: usize,
    y: usize,
    bmp: &[u8],
    pal: &[Rgb],
    tile_no: usize,
    bmp_w: usize,
    bmp_h: usize,
) {
    if tile_no >= (bmp_w / TILE_SIZE) * (bmp_h / TILE_SIZE) {
        warn!("Tile index out of range: {}", tile_no);
        return;
    }
    let base = bmp_offset(tile_no, bmp_w, bmp_h);
    for row in 0..TILE_SIZE {
        let dst_off = (y + row) * dst.pitch + x * 3;
        let src_off = base - row * bmp_w;
        let dst_row = &mut dst.pixels[dst_off..dst_off + TILE_SIZE * 3];
        let src_row = &bmp[src_off..src_off + TILE_SIZE];
        for (px, &index) in dst_row.chunks_exact_mut(3).zip(src_row) {
            let c = pal[index as usize];
            px[0] = c.r;
            px[1] = c.g;
            px[2] = c.b;
        }
    }
}

fn blit_tile_masked(
    dst: &mut Surface,
    x: usize,
    y: usize,
    bmp: &[u8],
    pal: &[Rgb],
    tile_no: usize,
    bmp_w: usize,
    bmp_h: usize,
) {
    if tile_no >= (bmp_w / TILE_SIZE) * (bmp_h / TILE_SIZE) {
        warn!("Tile index out of range: {}", tile_no);
        return;
    }
    let base = bmp_offset(tile_no, bmp_w, bmp_h);
    for row in 0..TILE_SIZE {
        let dst_off = (y + row) * dst.pitch + x * 3;
        let src_off = base - row * bmp_w;
        let dst_row = &mut dst.pixels[dst_off..dst_off + TILE_SIZE * 3];
        let src_row = &bmp[src_off..src_off + TILE_SIZE];
        for (px, &index) in dst_row.chunks_exact_mut(3).zip(src_row) {
            if index == 0 {
                continue;
            }
            let c = pal[index as usize];
            px[0] = c.r;
            px[1] = c.g;
            px[2] = c.b;
        }
    }
}

impl TileBitmaps {
    pub fn new() -> TileBitmaps {
        Default::default()
    }

    /// Copy an archive entry into one of the sheets. `which` selects the
    /// destination region: 0 = map sheet at (col,row), 1 = character misc
    /// region, 3 = character page 1, anything else = character page 2.
    pub fn load_bitmap(
        &mut self,
        assets: &mut dyn AssetLoader,
        name: &str,
        col: usize,
        row: usize,
        which: u32,
    ) {
        debug!("map_load_bitmap(\"{}\",{},{},{})", name, col, row, which);
        let data = match assets.load(name) {
            Some(data) => data,
            None => {
                warn!("Failed to load map bitmap: \"{}\"", name);
                return;
            }
        };

        match which {
            0 => copy_to_bmp(&mut self.bmp_map, row * BMP_MAP_W + col, &data),
            1 => copy_to_bmp(&mut self.bmp_cha, CHA_MISC_OFF + row * BMP_CHA_W + col, &data),
            3 => copy_to_bmp(&mut self.bmp_cha, 0, &data),
            _ => copy_to_bmp(&mut self.bmp_cha, CHA_PAGE2_OFF + col, &data),
        }
    }

    /// Decode a 512-byte BGR555 palette file. `which` 1 selects the
    /// character palette, anything else the map palette.
    pub fn load_palette(&mut self, assets: &mut dyn AssetLoader, name: &str, which: u32) {
        debug!("map_load_palette(\"{}\",{})", name, which);
        let data = match assets.load(name) {
            Some(data) => data,
            None => {
                warn!("Failed to load map palette: \"{}\"", name);
                return;
            }
        };
        if data.len() < PALETTE_FILE_SIZE {
            warn!("Incomplete palette ({}B)", data.len());
        } else if data.len() > PALETTE_FILE_SIZE {
            warn!("Palette file is larger than expected ({}B)", data.len());
        }

        let pal = if which == 1 {
            &mut self.pal_cha
        } else {
            &mut self.pal_map
        };
        let entries = (data.len() / 2).min(256);
        for i in 0..entries {
            let entry = u16::from_le_bytes([data[i * 2], data[i * 2 + 1]]);
            pal[i] = decode_bgr555(entry);
        }
    }

    /// Draw one screen cell: opaque background, masked sprites, masked
    /// foreground.
    pub fn draw_tile(&self, dst: &mut Surface, tile: &ScreenTile, x: usize, y: usize) {
        if tile.bg != NO_TILE {
            blit_tile(
                dst,
                x,
                y,
                &self.bmp_map,
                &self.pal_map,
                tile.bg as usize,
                BMP_MAP_W,
                BMP_MAP_H,
            );
        }
        if tile.sp != NO_TILE {
            blit_tile_masked(
                dst,
                x,
                y,
                &self.bmp_cha,
                &self.pal_cha,
                tile.sp as usize,
                BMP_CHA_W,
                BMP_CHA_H,
            );
            if tile.sp2 != NO_TILE {
                blit_tile_masked(
                    dst,
                    x,
                    y,
                    &self.bmp_cha,
                    &self.pal_cha,
                    tile.sp2 as usize,
                    BMP_CHA_W,
                    BMP_CHA_H,
                );
            }
        }
        if tile.fg != NO_TILE {
            if tile.fg_cha {
                blit_tile_masked(
                    dst,
                    x,
                    y,
                    &self.bmp_cha,
                    &self.pal_cha,
                    tile.fg as usize,
                    BMP_CHA_W,
                    BMP_CHA_H,
                );
            } else {
                blit_tile_masked(
                    dst,
                    x,
                    y,
                    &self.bmp_map,
                    &self.pal_map,
                    tile.fg as usize,
                    BMP_MAP_W,
                    BMP_MAP_H,
                );
            }
        }
    }
}
