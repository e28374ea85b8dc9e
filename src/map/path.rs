//! A* pathfinding over the tile grid, and the transient "being pathed"
//! sprite state it installs.
//!
//! The search runs over an 8-connected grid of sprite positions, where a
//! position is walkable when the 3x2 block under the character's feet is
//! collision free. The frontier is an array-backed binary heap keyed by
//! f-score; a per-cell `not_in_frontier` bit stands in for decrease-key,
//! since pushing an improved position again is cheap.

use num_traits::FromPrimitive;

use crate::input::{Button, InputBackend};
use crate::map::sprite::{Direction, SpriteFlags, SCRIPT_CMD_PATH};
use crate::map::Map;
use crate::vm::{VmMemory, VAR16_PLAYER_DIR, VAR16_RESULT, VAR32_RESULT, VAR4_PATH_CANCEL};

use super::LocationMode;

pub(crate) const PATH_GRID_W: usize = 640;
pub(crate) const PATH_GRID_H: usize = 480;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MapPos {
    pub x: u16,
    pub y: u16,
}

const NO_POS: MapPos = MapPos { x: 0xffff, y: 0xffff };

#[derive(Copy, Clone)]
struct PathCell {
    pred: MapPos,
    g_score: u16,
    f_score: u16,
    not_in_frontier: bool,
}

impl PathCell {
    const UNVISITED: PathCell = PathCell {
        pred: NO_POS,
        g_score: 0xffff,
        f_score: 0x7fff,
        not_in_frontier: true,
    };
}

struct SavedScript {
    sprite: usize,
    state: SpriteFlags,
    cmd: u8,
    repetitions: u8,
}

pub(crate) struct PathState {
    pub(crate) active: bool,
    goal: MapPos,
    cells: Vec<PathCell>,
    frontier: Vec<MapPos>,
    path: Vec<MapPos>,
    path_ptr: usize,
    saved: Option<SavedScript>,
}

impl Default for PathState {
    fn default() -> PathState {
        PathState {
            active: false,
            goal: NO_POS,
            cells: vec![PathCell::UNVISITED; PATH_GRID_W * PATH_GRID_H],
            frontier: Vec::new(),
            path: Vec::new(),
            path_ptr: 0,
            saved: None,
        }
    }
}

fn cell_index(pos: MapPos) -> usize {
    index2d!(pos.x as usize, pos.y as usize, PATH_GRID_W)
}

/// Taxicab distance heuristic.
fn h_distance(from: MapPos, to: MapPos) -> u16 {
    ((to.x as i32 - from.x as i32).abs() + (to.y as i32 - from.y as i32).abs()) as u16
}

fn frontier_less_than(cells: &[PathCell], frontier: &[MapPos], a: usize, b: usize) -> bool {
    cells[cell_index(frontier[a])].f_score < cells[cell_index(frontier[b])].f_score
}

fn frontier_sink(cells: &[PathCell], frontier: &mut [MapPos], mut node: usize) {
    loop {
        let l_child = node * 2 + 1;
        let r_child = node * 2 + 2;
        let mut min_i = node;
        if l_child < frontier.len() && frontier_less_than(cells, frontier, l_child, min_i) {
            min_i = l_child;
        }
        if r_child < frontier.len() && frontier_less_than(cells, frontier, r_child, min_i) {
            min_i = r_child;
        }
        if min_i == node {
            return;
        }
        frontier.swap(node, min_i);
        node = min_i;
    }
}

fn frontier_swim(cells: &[PathCell], frontier: &mut [MapPos], mut node: usize) {
    while node > 0 {
        let parent = (node - 1) / 2;
        if !frontier_less_than(cells, frontier, node, parent) {
            return;
        }
        frontier.swap(node, parent);
        node = parent;
    }
}

fn frontier_push(cells: &[PathCell], frontier: &mut Vec<MapPos>, pos: MapPos) {
    frontier.push(pos);
    let node = frontier.len() - 1;
    frontier_swim(cells, frontier, node);
}

fn frontier_pop(cells: &[PathCell], frontier: &mut Vec<MapPos>) -> MapPos {
    let top = frontier[0];
    let last = frontier.pop().unwrap_or_else(|| unreachable!());
    if !frontier.is_empty() {
        frontier[0] = last;
        frontier_sink(cells, frontier, 0);
    }
    top
}

impl Map {
    /// A position is walkable when none of the six feet tiles collide.
    fn sprite_pos_valid(&self, x: usize, y: usize) -> bool {
        !self.tile_collides(x, y + 1)
            && !self.tile_collides(x, y + 2)
            && !self.tile_collides(x + 1, y + 1)
            && !self.tile_collides(x + 1, y + 2)
            && !self.tile_collides(x + 2, y + 1)
            && !self.tile_collides(x + 2, y + 2)
    }

    /// The adjacent walkable position in `dir`, or the no-position
    /// sentinel.
    fn get_neighbor(&self, pos: MapPos, dir: u8) -> MapPos {
        let x = pos.x as usize;
        let y = pos.y as usize;
        let (nx, ny) = match Direction::from_u8(dir) {
            Some(Direction::Up) => {
                if y == 0 {
                    return NO_POS;
                }
                (x, y - 1)
            }
            Some(Direction::Down) => {
                if y >= self.rows - 1 {
                    return NO_POS;
                }
                (x, y + 1)
            }
            Some(Direction::Left) => {
                if x == 0 {
                    return NO_POS;
                }
                (x - 1, y)
            }
            Some(Direction::Right) => {
                if x >= self.cols - 1 {
                    return NO_POS;
                }
                (x + 1, y)
            }
            Some(Direction::UpLeft) => {
                if x == 0 || y == 0 {
                    return NO_POS;
                }
                (x - 1, y - 1)
            }
            Some(Direction::UpRight) => {
                if x >= self.cols - 1 || y == 0 {
                    return NO_POS;
                }
                (x + 1, y - 1)
            }
            Some(Direction::DownLeft) => {
                if x == 0 || y >= self.rows - 1 {
                    return NO_POS;
                }
                (x - 1, y + 1)
            }
            Some(Direction::DownRight) => {
                if x >= self.cols - 1 || y >= self.rows - 1 {
                    return NO_POS;
                }
                (x + 1, y + 1)
            }
            None => return NO_POS,
        };
        if !self.sprite_pos_valid(nx, ny) {
            return NO_POS;
        }
        MapPos {
            x: nx as u16,
            y: ny as u16,
        }
    }

    /// Route a sprite to the clicked tile with A*, then put it into the
    /// pathing script state until the path is walked or cancelled.
    pub fn path_sprite(&mut self, sp_no: usize, tx: u32, ty: u32) {
        debug!("map_path_sprite({},{},{})", sp_no, tx, ty);
        if !self.check_sprite_no(sp_no) {
            return;
        }

        let tx = tx as usize;
        let ty = ty as usize;
        if tx + 2 >= self.cols || ty < 1 || ty + 1 >= self.rows || self.tile_collides(tx, ty) {
            warn!("Invalid pathing target: ({},{})", tx, ty);
            return;
        }

        // the click addresses the character's feet; path by its center
        let ty = ty - 1;

        if !self.sprite_pos_valid(tx, ty) {
            warn!("Invalid pathing target (collides): ({},{})", tx, ty);
            return;
        }

        let start = MapPos {
            x: self.sprites[sp_no].x,
            y: self.sprites[sp_no].y,
        };
        let goal = MapPos {
            x: tx as u16,
            y: ty as u16,
        };
        self.path.goal = goal;
        if start == goal {
            return;
        }

        // initialize path data
        self.path.cells.fill(PathCell::UNVISITED);
        self.path.cells[cell_index(start)].g_score = 0;
        self.path.cells[cell_index(start)].f_score = h_distance(start, goal);

        // put start node into frontier
        self.path.frontier.clear();
        self.path.frontier.push(start);
        self.path.cells[cell_index(start)].not_in_frontier = false;

        loop {
            if self.path.frontier.is_empty() {
                warn!("pathing failed");
                return;
            }
            let cur = frontier_pop(&self.path.cells, &mut self.path.frontier);
            self.path.cells[cell_index(cur)].not_in_frontier = true;
            if cur == goal {
                break;
            }

            for dir in 0..8 {
                let neighbor_pos = self.get_neighbor(cur, dir);
                if neighbor_pos.x == 0xffff {
                    continue;
                }

                let g = self.path.cells[cell_index(cur)].g_score + if dir < 3 { 1 } else { 2 };
                let neighbor = &mut self.path.cells[cell_index(neighbor_pos)];
                if g < neighbor.g_score {
                    neighbor.pred = cur;
                    neighbor.g_score = g;
                    neighbor.f_score = g + h_distance(neighbor_pos, goal);
                    let push = neighbor.not_in_frontier;
                    neighbor.not_in_frontier = false;
                    if push {
                        frontier_push(&self.path.cells, &mut self.path.frontier, neighbor_pos);
                    }
                }
            }
        }

        // reconstruct the path, goal first
        self.path.path.clear();
        let mut cur = goal;
        loop {
            self.path.path.push(cur);
            cur = self.path.cells[cell_index(cur)].pred;
            if cur == start {
                break;
            }
        }
        self.path.path_ptr = self.path.path.len();

        // put sprite into pathing state
        self.path.active = true;
        let sp = &mut self.sprites[sp_no];
        self.path.saved = Some(SavedScript {
            sprite: sp_no,
            state: sp.state,
            cmd: sp.script_cmd,
            repetitions: sp.script_repetitions,
        });
        sp.state = (sp.state & SpriteFlags::CAMERA) | SpriteFlags::PLAYER | SpriteFlags::ENABLED;
        sp.script_cmd = SCRIPT_CMD_PATH;
        sp.script_repetitions = 0xff;
    }

    /// One pathing tick: walk to the next waypoint, or wind down.
    pub(crate) fn sprite_move_path(&mut self, i: usize, vm: &mut VmMemory, input: &dyn InputBackend) {
        if self.path.path_ptr == 0 {
            self.stop_pathing();
            return;
        }

        if input.is_down(Button::Cancel) && vm.get_var4(VAR4_PATH_CANCEL) != 0 {
            vm.set_var32(VAR32_RESULT, 1);
            self.stop_pathing();
            return;
        }

        self.path.path_ptr -= 1;
        let next = self.path.path[self.path.path_ptr];
        let x = self.sprites[i].x;
        let y = self.sprites[i].y;
        if next.y < y {
            if next.x < x {
                self.sprite_move_up_left(i, true);
            } else if next.x > x {
                self.sprite_move_up_right(i, true);
            } else {
                self.sprite_move_up(i, true);
            }
        } else if next.y > y {
            if next.x < x {
                self.sprite_move_down_left(i, true);
            } else if next.x > x {
                self.sprite_move_down_right(i, true);
            } else {
                self.sprite_move_down(i, true);
            }
        } else if next.x < x {
            self.sprite_move_left(i, true);
        } else if next.x > x {
            self.sprite_move_right(i, true);
        }

        if self.sprites[i].x != next.x || self.sprites[i].y != next.y {
            warn!("pathed to wrong tile?");
            self.sprites[i].x = next.x;
            self.sprites[i].y = next.y;
        }
        vm.set_var16(VAR16_PLAYER_DIR, (self.sprites[i].frame >> 4) as u16);
        self.pos_history_push(i);
    }

    /// Leave the pathing state and restore the sprite's script snapshot.
    pub fn stop_pathing(&mut self) {
        debug!("map_stop_pathing()");
        if !self.path.active {
            return;
        }
        self.path.active = false;
        if let Some(saved) = self.path.saved.take() {
            if let Some(sp) = self.sprites.get_mut(saved.sprite) {
                sp.state = saved.state;
                sp.script_cmd = saved.cmd;
                sp.script_repetitions = saved.repetitions;
            }
        }
        if self.location.mode != LocationMode::Disabled {
            self.location.enabled = true;
        }
    }

    pub fn pathing_active(&self) -> bool {
        self.path.active
    }

    /// Publish whether a path is being walked into the VM result register.
    pub fn get_pathing(&self, vm: &mut VmMemory) {
        vm.set_var16(VAR16_RESULT, if self.path.active { 0xffff } else { 0 });
    }

    #[cfg(test)]
    pub(crate) fn path_len(&self) -> usize {
        self.path.path.len()
    }

    #[cfg(test)]
    pub(crate) fn goal_g_score(&self) -> u16 {
        self.path.cells[cell_index(self.path.goal)].g_score
    }
}
