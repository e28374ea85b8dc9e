//! Sprite records, tile-grained motion with corner sliding, the input
//! mapper and the per-tick script interpreter.

use num_traits::FromPrimitive;

use crate::formats::ccd::Ccd;
use crate::gfx::GfxBackend;
use crate::input::{Button, InputBackend};
use crate::map::{LocationMode, Map, SpritePos, POS_HISTORY_LEN};
use crate::vm::{VmMemory, VAR16_PLAYER_DIR, VAR16_RESULT};
use crate::{MapError, MapResult};

bitflags! {
    #[derive(Serialize, Deserialize, Default)]
    pub struct SpriteFlags: u8 {
        const ENABLED     = 0x01;
        const TRIGGER     = 0x02;
        const NONCHARA    = 0x04;
        const TRIGGERABLE = 0x08;
        const COLLIDES    = 0x10;
        const CAMERA      = 0x20;
        const PLAYER      = 0x40;
    }
}

#[derive(Debug, Primitive, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    UpLeft = 4,
    UpRight = 5,
    DownLeft = 6,
    DownRight = 7,
}

/// A CCD sprite and its script cursor.
///
/// `frame` packs the facing direction in the high nibble and the animation
/// phase (0..11) in the low nibble.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone)]
pub struct Sprite {
    pub state: SpriteFlags,
    pub no: u8,
    pub w: u8,
    pub h: u8,
    pub x: u16,
    pub y: u16,
    pub frame: u8,
    pub script_index: u8,
    pub script_ptr: u16,
    pub script_cmd: u8,
    pub script_repetitions: u8,
}

impl Sprite {
    pub fn direction(&self) -> u8 {
        self.frame >> 4
    }
}

/// Script command installed on a sprite while it is being pathed.
pub(crate) const SCRIPT_CMD_PATH: u8 = 13;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ScriptOp {
    Noop,
    Move(Direction),
    Rewind,
    Path,
    Input,
}

impl ScriptOp {
    fn decode(cmd: u8) -> Option<ScriptOp> {
        match cmd {
            0 => Some(ScriptOp::Noop),
            2..=5 => Direction::from_u8(cmd - 2).map(ScriptOp::Move),
            6 => Some(ScriptOp::Rewind),
            13 => Some(ScriptOp::Path),
            14 => Some(ScriptOp::Input),
            _ => None,
        }
    }
}

const SP_INPUT_UP: u16 = 1;
const SP_INPUT_DOWN: u16 = 2;
const SP_INPUT_LEFT: u16 = 4;
const SP_INPUT_RIGHT: u16 = 8;
const SP_INPUT_UP_LEFT: u16 = SP_INPUT_UP | SP_INPUT_LEFT;
const SP_INPUT_UP_RIGHT: u16 = SP_INPUT_UP | SP_INPUT_RIGHT;
const SP_INPUT_DOWN_LEFT: u16 = SP_INPUT_DOWN | SP_INPUT_LEFT;
const SP_INPUT_DOWN_RIGHT: u16 = SP_INPUT_DOWN | SP_INPUT_RIGHT;
/// Cancel pressed with no direction held: leave the map screen.
const SP_INPUT_EXIT: u16 = 0xfffe;

const BLOCKED: u16 = 0xffff;

impl Map {
    pub(crate) fn check_sprite_no(&self, no: usize) -> bool {
        if no >= self.sprites.len() {
            warn!("Invalid sprite index: {}", no);
            return false;
        }
        true
    }

    /// Rebuild the sprite vector from the CCD resource.
    pub fn load_sprite_scripts(&mut self, vm: &VmMemory) {
        debug!("map_load_sprite_scripts()");
        self.sprites.clear();

        let ccd = Ccd::new(vm.ccd());
        for i in 0.. {
            let mut sp = match ccd.load_sprite(i) {
                Some(sp) => sp,
                None => break,
            };
            sp.script_ptr = ccd.script_entry(sp.script_index);
            let op = ccd.script_byte(sp.script_ptr);
            sp.script_cmd = op >> 4;
            sp.script_repetitions = (op & 0xf) + 1;
            sp.script_ptr = sp.script_ptr.wrapping_add(1);
            self.sprites.push(sp);
        }
    }

    /// Point one sprite at another script-table entry.
    pub fn set_sprite_script(&mut self, vm: &VmMemory, sp_no: usize, script_no: u8) {
        debug!("map_set_sprite_script({},{})", sp_no, script_no);
        if !self.check_sprite_no(sp_no) {
            return;
        }
        let ccd = Ccd::new(vm.ccd());
        let sp = &mut self.sprites[sp_no];
        sp.script_index = script_no;
        sp.script_ptr = ccd.script_entry(script_no);
        let op = ccd.script_byte(sp.script_ptr);
        sp.script_cmd = op >> 4;
        sp.script_repetitions = (op & 0xf) + 1;
        sp.script_ptr = sp.script_ptr.wrapping_add(1);
    }

    pub fn set_sprite_anim(&mut self, sp_no: usize, anim_no: u8) {
        debug!("map_set_sprite_anim({},{})", sp_no, anim_no);
        if !self.check_sprite_no(sp_no) {
            return;
        }
        self.sprites[sp_no].frame = anim_no << 4;
    }

    pub fn set_sprite_state(&mut self, no: usize, state: SpriteFlags) {
        debug!("map_set_sprite_state({},0x{:x})", no, state.bits());
        if !self.check_sprite_no(no) {
            return;
        }
        self.sprites[no].state = state;
    }

    /// Place a sprite at a CCD spawn point and snap the viewport to it.
    pub fn spawn_sprite(&mut self, vm: &VmMemory, spawn_no: usize, sp_no: usize, anim_no: u8) {
        debug!("map_spawn_sprite({},{},{})", spawn_no, sp_no, anim_no);
        if !self.check_sprite_no(sp_no) {
            return;
        }
        let spawn = Ccd::new(vm.ccd()).load_spawn(spawn_no);

        let mut screen_tx = spawn.screen_x as usize;
        let mut screen_ty = spawn.screen_y as usize;

        // adjust screen location if spawn is near edge of map
        if screen_tx + self.screen.tw >= self.cols {
            screen_tx = self.cols.saturating_sub(self.screen.tw);
        }
        if screen_ty + self.screen.th >= self.rows {
            screen_ty = self.rows.saturating_sub(self.screen.th);
        }

        self.screen.tx = screen_tx;
        self.screen.ty = screen_ty;
        let sp = &mut self.sprites[sp_no];
        sp.x = spawn.sprite_x;
        sp.y = spawn.sprite_y;
        sp.frame = anim_no << 4;

        let pos = SpritePos {
            tx: sp.x,
            ty: sp.y,
            frame: sp.frame,
        };
        self.pos_history = [pos; POS_HISTORY_LEN];
        self.pos_history_ptr = 0;
    }

    pub(crate) fn pos_history_push(&mut self, i: usize) {
        let sp = &self.sprites[i];
        self.pos_history[self.pos_history_ptr] = SpritePos {
            tx: sp.x,
            ty: sp.y,
            frame: sp.frame,
        };
        self.pos_history_ptr = (self.pos_history_ptr + 1) % POS_HISTORY_LEN;
    }

    fn rewind_pos(&mut self, i: usize, d: usize) -> u16 {
        let idx = self
            .pos_history_ptr
            .wrapping_sub(1)
            .wrapping_sub(d.wrapping_mul(2))
            % POS_HISTORY_LEN;
        let pos = self.pos_history[idx];
        let sp = &mut self.sprites[i];
        sp.x = pos.tx;
        sp.y = pos.ty;
        sp.frame = pos.frame;
        0
    }

    /// Rewind a sprite `d` steps back through the position history.
    ///
    /// Each step spans two history samples; rewinding past the 32-entry
    /// ring wraps around.
    pub fn rewind_sprite_pos(&mut self, sp_no: usize, d: usize) {
        debug!("map_rewind_sprite_pos({},{})", sp_no, d);
        if !self.check_sprite_no(sp_no) {
            return;
        }
        self.rewind_pos(sp_no, d);
    }

    /// Collision-test a tile rectangle, recording each cell's state so the
    /// move functions can hook around corners.
    ///
    /// The original game instead slid the character up/right along walls,
    /// which made keyboard navigation very annoying.
    fn tiles_collide(&self, tx: usize, ty: usize, tw: usize, th: usize, result: &mut [bool]) -> bool {
        let mut any = false;
        let mut i = 0;
        for row in 0..th {
            for col in 0..tw {
                let c = self.tile_collides(tx + col, ty + row);
                result[i] = c;
                any |= c;
                i += 1;
            }
        }
        any
    }

    fn can_move_up(&self, i: usize, r: &mut [bool]) -> bool {
        let sp = &self.sprites[i];
        if sp.y == 0 {
            r[0] = true;
            r[1] = true;
            r[2] = true;
            return false;
        }
        !self.tiles_collide(sp.x as usize, sp.y as usize, 3, 1, r)
    }

    fn can_move_down(&self, i: usize, r: &mut [bool]) -> bool {
        let sp = &self.sprites[i];
        if sp.y as usize + 3 >= self.rows {
            r[0] = true;
            r[1] = true;
            r[2] = true;
            return false;
        }
        !self.tiles_collide(sp.x as usize, sp.y as usize + 3, 3, 1, r)
    }

    fn can_move_left(&self, i: usize, r: &mut [bool]) -> bool {
        let sp = &self.sprites[i];
        if sp.x == 0 {
            r[0] = true;
            r[1] = true;
            return false;
        }
        !self.tiles_collide(sp.x as usize - 1, sp.y as usize + 1, 1, 2, r)
    }

    fn can_move_right(&self, i: usize, r: &mut [bool]) -> bool {
        let sp = &self.sprites[i];
        if sp.x as usize + 3 >= self.cols {
            r[0] = true;
            r[1] = true;
            return false;
        }
        !self.tiles_collide(sp.x as usize + 3, sp.y as usize + 1, 1, 2, r)
    }

    fn advance_frame(&mut self, i: usize, dir: Direction) {
        let sp = &mut self.sprites[i];
        sp.frame = (sp.frame & 0xf) + 1;
        if sp.frame >= 12 {
            sp.frame = 1;
        }
        sp.frame |= (dir as u8) << 4;
    }

    fn commit_move_up(&mut self, i: usize) {
        if self.sprites[i].y > 0 {
            self.sprites[i].y -= 1;
            if self.sprites[i].state.contains(SpriteFlags::CAMERA)
                && (self.sprites[i].y as usize) < self.cam_off_ty + self.screen.ty
                && self.screen.ty > 0
            {
                self.screen.ty -= 1;
            }
        }
    }

    fn commit_move_down(&mut self, i: usize) {
        let sp = self.sprites[i];
        if (sp.y + sp.h as u16 + 1) < self.rows as u16 {
            self.sprites[i].y += 1;
            let max_ty = self.rows - self.screen.th;
            if sp.state.contains(SpriteFlags::CAMERA)
                && (self.sprites[i].y as usize) > self.cam_off_ty + self.screen.ty
                && self.screen.ty < max_ty
            {
                self.screen.ty += 1;
            }
        }
    }

    fn commit_move_left(&mut self, i: usize) {
        if self.sprites[i].x > 0 {
            self.sprites[i].x -= 1;
            if self.sprites[i].state.contains(SpriteFlags::CAMERA)
                && (self.sprites[i].x as usize) < self.cam_off_tx + self.screen.tx
                && self.screen.tx > 0
            {
                self.screen.tx -= 1;
            }
        }
    }

    fn commit_move_right(&mut self, i: usize) {
        let sp = self.sprites[i];
        if (sp.x + sp.w as u16 + 1) < self.cols as u16 {
            self.sprites[i].x += 1;
            let max_tx = self.cols - self.screen.tw;
            if sp.state.contains(SpriteFlags::CAMERA)
                && (self.sprites[i].x as usize) > self.cam_off_tx + self.screen.tx
                && self.screen.tx < max_tx
            {
                self.screen.tx += 1;
            }
        }
    }

    pub(crate) fn sprite_move_up(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Up);
        }

        let mut r = [false; 3];
        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) && !self.can_move_up(i, &mut r) {
            if !r[0] {
                return self.sprite_move_left(i, false);
            }
            if !r[2] {
                return self.sprite_move_right(i, false);
            }
            return BLOCKED;
        }

        self.commit_move_up(i);
        0
    }

    pub(crate) fn sprite_move_down(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Down);
        }

        let mut r = [false; 3];
        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) && !self.can_move_down(i, &mut r) {
            if !r[0] {
                return self.sprite_move_left(i, false);
            }
            if !r[2] {
                return self.sprite_move_right(i, false);
            }
            return BLOCKED;
        }

        self.commit_move_down(i);
        0
    }

    pub(crate) fn sprite_move_left(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Left);
        }

        let mut r = [false; 3];
        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) && !self.can_move_left(i, &mut r) {
            if !r[0] {
                return self.sprite_move_up(i, false);
            }
            if !r[1] {
                return self.sprite_move_down(i, false);
            }
            return BLOCKED;
        }

        self.commit_move_left(i);
        0
    }

    pub(crate) fn sprite_move_right(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Right);
        }

        let mut r = [false; 3];
        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) && !self.can_move_right(i, &mut r) {
            if !r[0] {
                return self.sprite_move_up(i, false);
            }
            if !r[1] {
                return self.sprite_move_down(i, false);
            }
            return BLOCKED;
        }

        self.commit_move_right(i);
        0
    }

    pub(crate) fn sprite_move_up_left(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Up);
        }

        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) {
            let mut r = [false; 3];
            if !self.can_move_up(i, &mut r) {
                if !self.can_move_left(i, &mut r) {
                    return BLOCKED;
                }
                self.commit_move_left(i);
                return 0;
            }
            self.commit_move_up(i);
            if self.can_move_left(i, &mut r) {
                self.commit_move_left(i);
            }
            return 0;
        }

        self.commit_move_up(i);
        self.commit_move_left(i);
        0
    }

    pub(crate) fn sprite_move_up_right(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Up);
        }

        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) {
            let mut r = [false; 3];
            if !self.can_move_up(i, &mut r) {
                if !self.can_move_right(i, &mut r) {
                    return BLOCKED;
                }
                self.commit_move_right(i);
                return 0;
            }
            self.commit_move_up(i);
            if self.can_move_right(i, &mut r) {
                self.commit_move_right(i);
            }
            return 0;
        }

        self.commit_move_up(i);
        self.commit_move_right(i);
        0
    }

    pub(crate) fn sprite_move_down_left(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Down);
        }

        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) {
            let mut r = [false; 3];
            if !self.can_move_down(i, &mut r) {
                if !self.can_move_left(i, &mut r) {
                    return BLOCKED;
                }
                self.commit_move_left(i);
                return 0;
            }
            self.commit_move_down(i);
            if self.can_move_left(i, &mut r) {
                self.commit_move_left(i);
            }
            return 0;
        }

        self.commit_move_down(i);
        self.commit_move_left(i);
        0
    }

    pub(crate) fn sprite_move_down_right(&mut self, i: usize, advance: bool) -> u16 {
        if advance {
            self.advance_frame(i, Direction::Down);
        }

        if self.sprites[i].state.contains(SpriteFlags::COLLIDES) {
            let mut r = [false; 3];
            if !self.can_move_down(i, &mut r) {
                if !self.can_move_right(i, &mut r) {
                    return BLOCKED;
                }
                self.commit_move_right(i);
                return 0;
            }
            self.commit_move_down(i);
            if self.can_move_right(i, &mut r) {
                self.commit_move_right(i);
            }
            return 0;
        }

        self.commit_move_down(i);
        self.commit_move_right(i);
        0
    }

    fn get_mouse_inputs(&self, i: usize, input: &dyn InputBackend) -> u16 {
        let (cur_x, cur_y) = input.cursor_pos();

        let sp = &self.sprites[i];
        let sp_x = (sp.x as u32)
            .wrapping_sub(self.screen.tx as u32)
            .wrapping_mul(16);
        let sp_y = (sp.y as u32 + 1)
            .wrapping_sub(self.screen.ty as u32)
            .wrapping_mul(16);

        let mut inputs = 0;
        if cur_y < sp_y {
            inputs |= SP_INPUT_UP;
        }
        if cur_y > sp_y.wrapping_add(32) {
            inputs |= SP_INPUT_DOWN;
        }
        if cur_x < sp_x {
            inputs |= SP_INPUT_LEFT;
        }
        if cur_x > sp_x.wrapping_add(48) {
            inputs |= SP_INPUT_RIGHT;
        }
        inputs
    }

    fn do_handle_input(&mut self, i: usize, inputs: u16) -> u16 {
        let tx = self.sprites[i].x;
        let ty = self.sprites[i].y;

        match inputs {
            SP_INPUT_UP => {
                self.sprite_move_up(i, true);
            }
            SP_INPUT_DOWN => {
                self.sprite_move_down(i, true);
            }
            SP_INPUT_LEFT => {
                self.sprite_move_left(i, true);
            }
            SP_INPUT_RIGHT => {
                self.sprite_move_right(i, true);
            }
            SP_INPUT_UP_LEFT => {
                self.sprite_move_up_left(i, true);
            }
            SP_INPUT_UP_RIGHT => {
                self.sprite_move_up_right(i, true);
            }
            SP_INPUT_DOWN_LEFT => {
                self.sprite_move_down_left(i, true);
            }
            SP_INPUT_DOWN_RIGHT => {
                self.sprite_move_down_right(i, true);
            }
            SP_INPUT_EXIT => return SP_INPUT_EXIT,
            _ => return BLOCKED,
        }

        if self.sprites[i].x != tx || self.sprites[i].y != ty {
            self.pos_history_push(i);
        }
        0
    }

    fn handle_input(&mut self, i: usize, input: &dyn InputBackend) -> u16 {
        let inputs = if input.is_down(Button::Activate) {
            self.get_mouse_inputs(i, input)
        } else {
            get_keyboard_inputs(input)
        };
        self.do_handle_input(i, inputs)
    }

    fn exec_sprite(
        &mut self,
        i: usize,
        vm: &mut VmMemory,
        input: &dyn InputBackend,
    ) -> MapResult<u16> {
        // load next command
        if self.sprites[i].script_repetitions == 0 {
            let ccd = Ccd::new(vm.ccd());
            let mut ptr = self.sprites[i].script_ptr;
            let mut op = ccd.script_byte(ptr);
            if op == 0 {
                // loop back to the start of this sprite's script
                ptr = ccd.script_entry(self.sprites[i].script_index);
                op = ccd.script_byte(ptr);
            }
            let sp = &mut self.sprites[i];
            sp.script_ptr = ptr.wrapping_add(1);
            sp.script_cmd = op >> 4;
            sp.script_repetitions = op & 0xf;
        }

        // exec command
        let cmd = self.sprites[i].script_cmd;
        let mut r: u16 = 0;
        match ScriptOp::decode(cmd) {
            Some(ScriptOp::Noop) => return Ok(0),
            Some(ScriptOp::Move(Direction::Up)) => {
                self.sprite_move_up(i, true);
            }
            Some(ScriptOp::Move(Direction::Down)) => {
                self.sprite_move_down(i, true);
            }
            Some(ScriptOp::Move(Direction::Left)) => {
                self.sprite_move_left(i, true);
            }
            Some(ScriptOp::Move(Direction::Right)) => {
                self.sprite_move_right(i, true);
            }
            Some(ScriptOp::Move(_)) => unreachable!(),
            Some(ScriptOp::Rewind) => {
                let d = self.sprites[i].script_repetitions as usize;
                r = self.rewind_pos(i, d);
            }
            Some(ScriptOp::Path) => {
                self.sprite_move_path(i, vm, input);
            }
            Some(ScriptOp::Input) => {
                r = self.handle_input(i, input);
            }
            None => {
                let sp = &self.sprites[i];
                return Err(MapError::UnimplementedScriptCommand {
                    sprite: i,
                    script_index: sp.script_index,
                    script_ptr: sp.script_ptr,
                    cmd,
                    repetitions: sp.script_repetitions,
                });
            }
        }

        if (r & 0xff) == 0 {
            let reps = self.sprites[i].script_repetitions;
            if reps != 0xff {
                // a zero count wraps to 0xff here, i.e. "repeat forever"
                self.sprites[i].script_repetitions = reps.wrapping_sub(1);
            }
            if self.location.mode == LocationMode::Oneshot
                && self.sprites[i].state.contains(SpriteFlags::PLAYER)
            {
                self.location.enabled = true;
            }
            return Ok(0xffff);
        }
        if (r & 0xff) == 0xff {
            return Ok(0);
        }
        Ok(r)
    }

    fn exec_all_sprites(&mut self, vm: &mut VmMemory, input: &dyn InputBackend) -> MapResult<u16> {
        let mut r: u16 = 0xffff;
        for i in 0..self.sprites.len() {
            if !self.sprites[i].state.is_empty() {
                let v = self.exec_sprite(i, vm, input)?;
                if self.sprites[i].state.contains(SpriteFlags::PLAYER) && i == 0 {
                    r = v;
                }
            }
        }
        Ok(r)
    }

    /// Run one script tick for every active sprite; the player's result
    /// lands in the VM result register.
    pub fn exec_sprites(&mut self, vm: &mut VmMemory, input: &dyn InputBackend) -> MapResult<()> {
        let r = self.exec_all_sprites(vm, input)?;
        vm.set_var16(VAR16_RESULT, r);
        Ok(())
    }

    /// The per-frame entry point: tick the sprites and, unless the player
    /// reported "nothing happened", recompose and redraw the screen.
    pub fn exec_sprites_and_redraw(
        &mut self,
        vm: &mut VmMemory,
        input: &dyn InputBackend,
        gfx: &mut dyn GfxBackend,
    ) -> MapResult<()> {
        assert!(!self.sprites.is_empty());
        let r = self.exec_all_sprites(vm, input)?;
        if r != 0 {
            self.load_tiles();
            self.place_sprites(vm);
            self.draw_tiles(gfx, input);
            vm.set_var16(VAR16_PLAYER_DIR, (self.sprites[0].frame >> 4) as u16);
        }
        vm.set_var16(VAR16_RESULT, r);
        Ok(())
    }

    /// Single cardinal step, driven by the VM rather than a script.
    pub fn move_sprite(&mut self, vm: &mut VmMemory, sp_no: usize, dir: Direction) {
        debug!("map_move_sprite({},{:?})", sp_no, dir);
        if !self.check_sprite_no(sp_no) {
            return;
        }

        match dir {
            Direction::Up => {
                self.sprite_move_up(sp_no, true);
            }
            Direction::Down => {
                self.sprite_move_down(sp_no, true);
            }
            Direction::Left => {
                self.sprite_move_left(sp_no, true);
            }
            Direction::Right => {
                self.sprite_move_right(sp_no, true);
            }
            _ => warn!("Invalid move direction: {:?}", dir),
        }
        self.pos_history_push(sp_no);
        vm.set_var16(VAR16_RESULT, 0);
    }
}

fn get_keyboard_inputs(input: &dyn InputBackend) -> u16 {
    let mut inputs = 0;
    if input.is_down(Button::Up) {
        inputs |= SP_INPUT_UP;
    }
    if input.is_down(Button::Down) {
        inputs |= SP_INPUT_DOWN;
    }
    if input.is_down(Button::Left) {
        inputs |= SP_INPUT_LEFT;
    }
    if input.is_down(Button::Right) {
        inputs |= SP_INPUT_RIGHT;
    }
    if input.is_down(Button::Cancel) && inputs == 0 {
        return SP_INPUT_EXIT;
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::testutil::*;

    #[test]
    fn one_step_down_moves_and_animates() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        map.move_sprite(&mut vm, 0, Direction::Down);

        let sp = map.sprite(0).unwrap();
        assert_eq!((sp.x, sp.y), (4, 5));
        assert_eq!(sp.frame >> 4, Direction::Down as u8);
        assert_eq!(sp.frame & 0xf, 1);
        // player moved from viewport row 1 to the camera line, no shift yet
        assert_eq!(map.screen().ty, 3);
        assert_eq!(vm.get_var16(crate::vm::VAR16_RESULT), 0);
    }

    #[test]
    fn camera_follows_past_the_offset_line() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        map.move_sprite(&mut vm, 0, Direction::Down);
        assert_eq!(map.screen().ty, 3);
        // second step crosses cam_off_ty + screen.ty
        map.move_sprite(&mut vm, 0, Direction::Down);
        assert_eq!(map.sprite(0).unwrap().y, 6);
        assert_eq!(map.screen().ty, 4);
    }

    #[test]
    fn camera_stops_at_the_map_edge() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        for _ in 0..10 {
            map.move_sprite(&mut vm, 0, Direction::Down);
        }
        // the commit guard blocks further steps once y reaches 6
        assert_eq!(map.sprite(0).unwrap().y, 6);
        assert!(map.screen().ty + map.screen().th <= 10);
    }

    #[test]
    fn blocked_up_move_slides_left() {
        // probe row for "up" is (x..x+2, y); wall in the middle, both
        // slide candidates clear -> left wins the tie
        let (mut map, mut vm) = test_map(10, 10, &[(5, 4)]);
        map.move_sprite(&mut vm, 0, Direction::Up);

        let sp = map.sprite(0).unwrap();
        assert_eq!((sp.x, sp.y), (3, 4));
        // the frame advanced for the original direction
        assert_eq!(sp.frame >> 4, Direction::Up as u8);
    }

    #[test]
    fn blocked_up_move_slides_right_when_left_probe_solid() {
        let (mut map, mut vm) = test_map(10, 10, &[(4, 4), (5, 4)]);
        map.move_sprite(&mut vm, 0, Direction::Up);
        let sp = map.sprite(0).unwrap();
        assert_eq!((sp.x, sp.y), (5, 4));
    }

    #[test]
    fn fully_blocked_move_stays_put() {
        let (mut map, mut vm) = test_map(10, 10, &[(4, 4), (5, 4), (6, 4)]);
        map.move_sprite(&mut vm, 0, Direction::Up);
        let sp = map.sprite(0).unwrap();
        assert_eq!((sp.x, sp.y), (4, 4));
    }

    #[test]
    fn map_edge_probes_as_solid() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        // walk to the left edge; column 0 then blocks and both slide
        // probes at the edge read solid too
        for _ in 0..4 {
            map.move_sprite(&mut vm, 0, Direction::Left);
        }
        assert_eq!(map.sprite(0).unwrap().x, 0);
        map.move_sprite(&mut vm, 0, Direction::Left);
        assert_eq!(map.sprite(0).unwrap().x, 0);
    }

    #[test]
    fn collision_ignored_without_collides_flag() {
        let (mut map, mut vm) = test_map(10, 10, &[(5, 4)]);
        map.sprites[0].state = SpriteFlags::PLAYER | SpriteFlags::ENABLED;
        map.move_sprite(&mut vm, 0, Direction::Up);
        assert_eq!(map.sprite(0).unwrap().y, 3);
    }

    #[test]
    fn animation_phase_cycles_one_to_eleven() {
        let (mut map, mut vm) = test_map(24, 24, &[]);
        let mut phases = Vec::new();
        for _ in 0..24 {
            map.move_sprite(&mut vm, 0, Direction::Right);
            let sp = map.sprite(0).unwrap();
            assert_eq!(sp.frame >> 4, Direction::Right as u8);
            phases.push(sp.frame & 0xf);
        }
        let expected: Vec<u8> = (0u8..24).map(|i| (i % 11) + 1).collect();
        assert_eq!(phases, expected);
    }

    #[test]
    fn rewind_restores_an_earlier_pose() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        map.move_sprite(&mut vm, 0, Direction::Down); // (4,5)
        map.move_sprite(&mut vm, 0, Direction::Right); // (5,5)
        map.move_sprite(&mut vm, 0, Direction::Down); // (5,6)

        // d=0 reads the last push (the current pose)
        map.rewind_sprite_pos(0, 0);
        assert_eq!((map.sprites[0].x, map.sprites[0].y), (5, 6));
        // d=1 steps two samples back
        map.rewind_sprite_pos(0, 1);
        assert_eq!((map.sprites[0].x, map.sprites[0].y), (4, 5));
    }

    #[test]
    fn keyboard_input_drives_the_player_script() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        let mut input = TestInput::default();
        input.press(crate::Button::Down);
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!(map.sprite(0).unwrap().y, 5);
        // a successful tick reports 0xffff
        assert_eq!(vm.get_var16(crate::vm::VAR16_RESULT), 0xffff);
    }

    #[test]
    fn conflicting_directions_do_nothing() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        let mut input = TestInput::default();
        input.press(crate::Button::Up);
        input.press(crate::Button::Down);
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!((map.sprites[0].x, map.sprites[0].y), (4, 4));
        assert_eq!(vm.get_var16(crate::vm::VAR16_RESULT), 0);
    }

    #[test]
    fn cancel_alone_requests_map_exit() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        let mut input = TestInput::default();
        input.press(crate::Button::Cancel);
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!(vm.get_var16(crate::vm::VAR16_RESULT), 0xfffe);
    }

    #[test]
    fn cancel_with_a_direction_still_moves() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        let mut input = TestInput::default();
        input.press(crate::Button::Cancel);
        input.press(crate::Button::Left);
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!(map.sprites[0].x, 3);
    }

    #[test]
    fn mouse_input_steers_toward_the_cursor() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        // player box starts at ((4-3)*16, (5-3)*16) = (16, 32), 48x32
        let mut input = TestInput::default();
        input.press(crate::Button::Activate);
        input.cursor = (8, 40); // left of the box, inside vertically
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!((map.sprites[0].x, map.sprites[0].y), (3, 4));

        // below and to the right moves diagonally
        let mut input = TestInput::default();
        input.press(crate::Button::Activate);
        input.cursor = (200, 200);
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!((map.sprites[0].x, map.sprites[0].y), (4, 5));
    }

    #[test]
    fn cursor_inside_the_player_box_is_inert() {
        let (mut map, mut vm) = test_map(10, 10, &[]);
        let mut input = TestInput::default();
        input.press(crate::Button::Activate);
        input.cursor = (40, 48);
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!((map.sprites[0].x, map.sprites[0].y), (4, 4));
        assert_eq!(vm.get_var16(crate::vm::VAR16_RESULT), 0);
    }

    #[test]
    fn diagonal_falls_back_to_the_free_axis() {
        // up blocked across the whole probe row, left clear
        let (mut map, mut vm) = test_map(10, 10, &[(4, 4), (5, 4), (6, 4)]);
        let mut input = TestInput::default();
        input.press(crate::Button::Up);
        input.press(crate::Button::Left);
        map.exec_sprites(&mut vm, &input).unwrap();
        let sp = map.sprite(0).unwrap();
        assert_eq!((sp.x, sp.y), (3, 4));
        // frame advanced for the vertical component
        assert_eq!(sp.frame >> 4, Direction::Up as u8);
    }

    #[test]
    fn npc_scripts_step_in_vector_order() {
        // npc script: 4 steps right, then loop
        let (mut map, mut vm) = test_map_with_scripted_npc(20, 12, &[], &[0x53, 0x00]);
        let input = TestInput::default();
        for _ in 0..4 {
            map.exec_sprites(&mut vm, &input).unwrap();
        }
        assert_eq!(map.sprites[1].x, 8 + 4);
        // looped back around: keeps walking right on later ticks
        map.exec_sprites(&mut vm, &input).unwrap();
        assert_eq!(map.sprites[1].x, 8 + 5);
    }

    #[test]
    fn unknown_script_command_is_fatal() {
        let (mut map, mut vm) = test_map_with_scripted_npc(12, 12, &[], &[0x71]);
        let input = TestInput::default();
        match map.exec_sprites(&mut vm, &input) {
            Err(MapError::UnimplementedScriptCommand { sprite: 1, cmd: 7, .. }) => {}
            other => panic!("expected script error, got {:?}", other),
        }
    }

    #[test]
    fn disabled_sprites_are_skipped() {
        let (mut map, mut vm) = test_map_with_scripted_npc(12, 12, &[], &[0x71]);
        map.sprites[1].state = SpriteFlags::empty();
        let input = TestInput::default();
        // the bad script never runs
        map.exec_sprites(&mut vm, &input).unwrap();
    }

    #[test]
    fn set_sprite_script_repoints_the_cursor() {
        let (mut map, vm) = test_map_with_scripted_npc(20, 12, &[], &[0x53, 0x00]);
        // switch the npc to the input script at table index 0
        map.set_sprite_script(&vm, 1, 0);
        let sp = map.sprite(1).unwrap();
        assert_eq!(sp.script_index, 0);
        assert_eq!(sp.script_cmd, 14);
        assert_eq!(sp.script_repetitions, 1);
    }

    #[test]
    fn set_sprite_state_and_anim_update_the_record() {
        let (mut map, _) = test_map(10, 10, &[]);
        map.set_sprite_state(0, SpriteFlags::ENABLED | SpriteFlags::NONCHARA);
        assert_eq!(
            map.sprite(0).unwrap().state,
            SpriteFlags::ENABLED | SpriteFlags::NONCHARA
        );
        map.set_sprite_anim(0, 3);
        assert_eq!(map.sprite(0).unwrap().frame, 0x30);
        // out-of-range indices are warning no-ops
        map.set_sprite_state(9, SpriteFlags::ENABLED);
        map.set_sprite_anim(9, 1);
        assert_eq!(map.sprites.len(), 1);
    }

    #[test]
    fn spawn_floods_the_history_and_clamps_the_screen() {
        let (mut map, vm) = test_map(10, 10, &[]);
        // spawn 0 in the fixture: screen (8,8) -> clamped, sprite at (6,6)
        map.spawn_sprite(&vm, 0, 0, 2);
        assert_eq!(map.screen().tx, 5);
        assert_eq!(map.screen().ty, 5);
        let sp = map.sprite(0).unwrap();
        assert_eq!((sp.x, sp.y), (6, 6));
        assert_eq!(sp.frame, 0x20);
        for pos in map.pos_history.iter() {
            assert_eq!((pos.tx, pos.ty, pos.frame), (6, 6, 0x20));
        }
    }

    #[test]
    fn sprite_bounds_hold_under_random_walk() {
        let (mut map, mut vm) = test_map(10, 10, &[(2, 2), (7, 3), (3, 7)]);
        let dirs = [
            Direction::Up,
            Direction::Left,
            Direction::Down,
            Direction::Left,
            Direction::Up,
            Direction::Right,
            Direction::Down,
            Direction::Right,
        ];
        for step in 0..64 {
            map.move_sprite(&mut vm, 0, dirs[step % dirs.len()]);
            let sp = map.sprite(0).unwrap();
            let (cols, rows) = map.size();
            assert!((sp.x as usize) + (sp.w as usize) < cols);
            assert!((sp.y as usize) + (sp.h as usize) < rows);
            assert!(map.screen().tx + map.screen().tw <= cols);
            assert!(map.screen().ty + map.screen().th <= rows);
        }
    }
}
