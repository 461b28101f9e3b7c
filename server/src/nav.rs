//! A* pathfinding over a uniform blocked-cell grid (§4.3).
//!
//! Grounded in `original_source/server/ai/nav.py`. Cells are blocked when
//! their center lies inside any collider expanded by `pad`. 8-neighbor moves,
//! Manhattan heuristic, diagonal step cost 1.4, `max_nodes` expansion budget.

use shared::world::{Aabb, Vec3};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

type Cell = (i32, i32);

const MAX_NODES: usize = 1200;
const NEAREST_UNBLOCKED_RADIUS: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    f: f32,
    cell: Cell,
}

impl Eq for Scored {}
impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest f pops first.
        other.f.partial_cmp(&self.f).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A baked navigation grid for one map. Rebuilt whenever the map changes;
/// otherwise immutable and safe to share across bot AI calls within a tick.
pub struct GridNav {
    cell: f32,
    pad: f32,
    minx: f32,
    minz: f32,
    w: i32,
    h: i32,
    blocked: Vec<bool>,
}

impl GridNav {
    pub fn build(bounds: &Aabb, colliders: &[Aabb], cell_size: f32, pad: f32) -> Self {
        let minx = bounds.min.x;
        let minz = bounds.min.z;
        let maxx = bounds.max.x;
        let maxz = bounds.max.z;
        let w = (((maxx - minx) / cell_size).ceil() as i32).max(1);
        let h = (((maxz - minz) / cell_size).ceil() as i32).max(1);

        let mut blocked = vec![false; (w * h) as usize];
        for ix in 0..w {
            for iz in 0..h {
                let (x, z) = cell_center_of(minx, minz, cell_size, ix, iz);
                let mut is_blocked = false;
                for a in colliders {
                    if (a.min.x - pad) <= x && x <= (a.max.x + pad) && (a.min.z - pad) <= z && z <= (a.max.z + pad) {
                        is_blocked = true;
                        break;
                    }
                }
                blocked[(ix * h + iz) as usize] = is_blocked;
            }
        }

        GridNav {
            cell: cell_size,
            pad,
            minx,
            minz,
            w,
            h,
            blocked,
        }
    }

    fn idx(&self, c: Cell) -> usize {
        (c.0 * self.h + c.1) as usize
    }

    fn in_bounds(&self, c: Cell) -> bool {
        c.0 >= 0 && c.0 < self.w && c.1 >= 0 && c.1 < self.h
    }

    fn is_blocked(&self, c: Cell) -> bool {
        self.blocked[self.idx(c)]
    }

    fn cell_center(&self, c: Cell) -> (f32, f32) {
        cell_center_of(self.minx, self.minz, self.cell, c.0, c.1)
    }

    fn to_cell(&self, pos: Vec3) -> Cell {
        let ix = ((pos.x - self.minx) / self.cell) as i32;
        let iz = ((pos.z - self.minz) / self.cell) as i32;
        (ix.clamp(0, self.w - 1), iz.clamp(0, self.h - 1))
    }

    fn nearest_unblocked(&self, cell: Cell) -> Option<Cell> {
        if self.in_bounds(cell) && !self.is_blocked(cell) {
            return Some(cell);
        }
        for r in 1..=NEAREST_UNBLOCKED_RADIUS {
            for dx in -r..=r {
                for dz in -r..=r {
                    if dx.abs() != r && dz.abs() != r {
                        continue;
                    }
                    let c = (cell.0 + dx, cell.1 + dz);
                    if self.in_bounds(c) && !self.is_blocked(c) {
                        return Some(c);
                    }
                }
            }
        }
        None
    }

    fn neighbors(&self, n: Cell) -> impl Iterator<Item = Cell> + '_ {
        const DIRS: [Cell; 8] = [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (-1, 1), (1, -1), (-1, -1)];
        DIRS.iter().filter_map(move |&(dx, dz)| {
            let c = (n.0 + dx, n.1 + dz);
            (self.in_bounds(c) && !self.is_blocked(c)).then_some(c)
        })
    }

    /// A* from `start_pos` to `goal_pos`, snapping each endpoint to the
    /// nearest unblocked cell first. Returns cell-center waypoints, empty if
    /// either endpoint has no reachable unblocked cell within the search
    /// radius, or the node budget is exhausted before reaching the goal.
    pub fn plan(&self, start_pos: Vec3, goal_pos: Vec3) -> Vec<(f32, f32)> {
        let start0 = self.to_cell(start_pos);
        let goal0 = self.to_cell(goal_pos);
        let (Some(start), Some(goal)) = (self.nearest_unblocked(start0), self.nearest_unblocked(goal0)) else {
            return Vec::new();
        };
        if start == goal {
            return vec![self.cell_center(start)];
        }

        let mut open = BinaryHeap::new();
        open.push(Scored { f: 0.0, cell: start });
        let mut came: HashMap<Cell, Cell> = HashMap::new();
        let mut g: HashMap<Cell, f32> = HashMap::new();
        g.insert(start, 0.0);

        let mut visited = 0usize;
        while let Some(Scored { cell: cur, .. }) = open.pop() {
            if visited >= MAX_NODES {
                break;
            }
            visited += 1;
            if cur == goal {
                break;
            }
            for nb in self.neighbors(cur) {
                let step = if nb.0 == cur.0 || nb.1 == cur.1 { 1.0 } else { 1.4 };
                let ng = g[&cur] + step;
                if ng < *g.get(&nb).unwrap_or(&1e30) {
                    g.insert(nb, ng);
                    came.insert(nb, cur);
                    let f = ng + heuristic(nb, goal);
                    open.push(Scored { f, cell: nb });
                }
            }
        }

        if !came.contains_key(&goal) {
            return Vec::new();
        }

        let mut path = vec![goal];
        let mut cur = goal;
        while cur != start {
            cur = came[&cur];
            path.push(cur);
        }
        path.reverse();
        path.into_iter().map(|c| self.cell_center(c)).collect()
    }

    /// A normalized XZ direction toward `to_pos`, following the second
    /// waypoint of `plan` when one exists, otherwise the straight line.
    pub fn next_direction(&self, from_pos: Vec3, to_pos: Vec3) -> (f32, f32) {
        let path = self.plan(from_pos, to_pos);
        let (dx, dz) = if path.len() < 2 {
            (to_pos.x - from_pos.x, to_pos.z - from_pos.z)
        } else {
            (path[1].0 - from_pos.x, path[1].1 - from_pos.z)
        };
        let l = (dx * dx + dz * dz).sqrt();
        if l <= 1e-6 {
            (0.0, 0.0)
        } else {
            (dx / l, dz / l)
        }
    }
}

fn cell_center_of(minx: f32, minz: f32, cell: f32, ix: i32, iz: i32) -> (f32, f32) {
    (minx + (ix as f32 + 0.5) * cell, minz + (iz as f32 + 0.5) * cell)
}

fn heuristic(a: Cell, b: Cell) -> f32 {
    ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as f32
}
