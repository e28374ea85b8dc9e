//! Shared fixtures for the map tests: tiny trait backends and byte-level
//! resource builders wired into a ready-to-use [`Map`] + [`VmMemory`] pair.

use std::collections::HashMap;

use crate::formats::ccd::tests::{build_ccd, TestSprite};
use crate::formats::eve::tests::build_eve;
use crate::formats::mpx::tests::build_mpx;
use crate::gfx::{GfxBackend, Surface, SURFACE_SCREEN, SURFACE_STATUS};
use crate::input::{Button, InputBackend};
use crate::map::Map;
use crate::vm::{
    VmMemory, SYSVAR32_CCD_OFFSET, SYSVAR32_EVE_OFFSET, SYSVAR32_MPX_OFFSET,
};
use crate::AssetLoader;

#[derive(Default)]
pub(crate) struct TestInput {
    pub down: Vec<Button>,
    pub cursor: (u32, u32),
}

impl TestInput {
    pub fn press(&mut self, button: Button) {
        self.down.push(button);
    }
}

impl InputBackend for TestInput {
    fn is_down(&self, button: Button) -> bool {
        self.down.contains(&button)
    }

    fn cursor_pos(&self) -> (u32, u32) {
        self.cursor
    }
}

pub(crate) struct TestGfx {
    pub surfaces: HashMap<u32, Surface>,
    pub copies: Vec<(u32, u32, u32, u32, u32, u32, u32, u32)>,
    pub dirty: Vec<u32>,
}

impl TestGfx {
    pub fn new() -> TestGfx {
        let mut surfaces = HashMap::new();
        surfaces.insert(SURFACE_SCREEN, Surface::new(640, 480));
        surfaces.insert(SURFACE_STATUS, Surface::new(640, 1280));
        TestGfx {
            surfaces,
            copies: Vec::new(),
            dirty: Vec::new(),
        }
    }
}

impl GfxBackend for TestGfx {
    fn surface_mut(&mut self, id: u32) -> &mut Surface {
        self.surfaces.get_mut(&id).unwrap()
    }

    fn copy(&mut self, src_id: u32, sx: u32, sy: u32, w: u32, h: u32, dst_id: u32, dx: u32, dy: u32) {
        self.copies.push((src_id, sx, sy, w, h, dst_id, dx, dy));
    }

    fn mark_dirty(&mut self, id: u32) {
        self.dirty.push(id);
    }
}

#[derive(Default)]
pub(crate) struct TestAssets {
    entries: HashMap<String, Vec<u8>>,
}

impl TestAssets {
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.entries.insert(name.to_string(), data);
    }
}

impl AssetLoader for TestAssets {
    fn load(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.get(name).cloned()
    }
}

/// Player-only script: read input forever.
const PLAYER_SCRIPT: &[u8] = &[0xe0, 0x00];
/// Idle script for extras.
const IDLE_SCRIPT: &[u8] = &[0x00];

fn build_vm(cols: u16, rows: u16, walls: &[(u16, u16)], sprites: &[TestSprite], scripts: &[&[u8]]) -> VmMemory {
    let mpx = build_mpx(cols, rows, walls);
    let ccd = build_ccd(sprites, scripts, &[(8, 8, 6, 6)], sprites.len().max(1));
    let eve = build_eve(&[]);

    let mut vm = VmMemory::new();
    let ccd_off = mpx.len();
    let eve_off = ccd_off + ccd.len();
    vm.file_data = [mpx, ccd, eve].concat();
    vm.set_sysvar32(SYSVAR32_MPX_OFFSET, 0);
    vm.set_sysvar32(SYSVAR32_CCD_OFFSET, ccd_off as u32);
    vm.set_sysvar32(SYSVAR32_EVE_OFFSET, eve_off as u32);

    // screen (3,3) 5x5, camera offset (2,2)
    vm.set_map_data_field(4, 3);
    vm.set_map_data_field(8, 3);
    vm.set_map_data_field(28, 5);
    vm.set_map_data_field(32, 5);
    vm.set_map_data_field(36, 2);
    vm.set_map_data_field(40, 2);
    vm
}

fn player() -> TestSprite {
    TestSprite {
        state: 0x71, // enabled | collides | camera | player
        no: 0,
        x: 4,
        y: 4,
        script_index: 0,
        ..Default::default()
    }
}

fn load(vm: &VmMemory) -> Map {
    let mut map = Map::new();
    map.load_tilemap(vm).unwrap();
    map.load_sprite_scripts(vm);
    map
}

/// A map with a single input-driven player sprite at (4,4).
pub(crate) fn test_map(cols: u16, rows: u16, walls: &[(u16, u16)]) -> (Map, VmMemory) {
    let vm = build_vm(cols, rows, walls, &[player()], &[PLAYER_SCRIPT, IDLE_SCRIPT]);
    (load(&vm), vm)
}

/// As [`test_map`], plus an idle second sprite at the given tile.
pub(crate) fn test_map_with_npc(
    cols: u16,
    rows: u16,
    walls: &[(u16, u16)],
    npc_x: u16,
    npc_y: u16,
) -> (Map, VmMemory) {
    let npc = TestSprite {
        state: 0x01,
        no: 1,
        x: npc_x,
        y: npc_y,
        script_index: 1,
        ..Default::default()
    };
    let vm = build_vm(cols, rows, walls, &[player(), npc], &[PLAYER_SCRIPT, IDLE_SCRIPT]);
    (load(&vm), vm)
}

/// As [`test_map`], plus a second sprite at (8,8) running `npc_script`.
pub(crate) fn test_map_with_scripted_npc(
    cols: u16,
    rows: u16,
    walls: &[(u16, u16)],
    npc_script: &[u8],
) -> (Map, VmMemory) {
    let npc = TestSprite {
        state: 0x01,
        no: 1,
        x: 8,
        y: 8,
        script_index: 1,
        ..Default::default()
    };
    let vm = build_vm(cols, rows, walls, &[player(), npc], &[PLAYER_SCRIPT, npc_script]);
    (load(&vm), vm)
}

/// Swap the MPX resource out from under the VM.
pub(crate) fn set_mpx(vm: &mut VmMemory, mpx: &[u8]) {
    vm.file_data = mpx.to_vec();
    vm.set_sysvar32(SYSVAR32_MPX_OFFSET, 0);
    vm.set_sysvar32(SYSVAR32_CCD_OFFSET, mpx.len() as u32);
    vm.set_sysvar32(SYSVAR32_EVE_OFFSET, mpx.len() as u32);
}

/// Replace the EVE table (it sits at the end of the fixture blob).
pub(crate) fn set_eve(vm: &mut VmMemory, events: &[(u16, u16, u16, u16, u16, u8)]) {
    let eve_off = vm.get_sysvar32(SYSVAR32_EVE_OFFSET) as usize;
    vm.file_data.truncate(eve_off);
    let eve = build_eve(events);
    vm.file_data.extend_from_slice(&eve);
}
