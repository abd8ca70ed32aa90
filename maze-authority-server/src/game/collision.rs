//! Collision Detection
//!
//! Point-vs-wall-grid motion integration. A position is owned by the cell
//! `floor(coord + 0.5)` on each floor axis; crossing into another cell is
//! refused when the exiting edge of the current cell is walled.

use crate::core::vec3::Vec3;
use crate::game::maze::{Coord, Direction, Maze};

/// Substeps per integration call.
pub const SUBSTEPS: u32 = 10;

/// Cell that owns a floor-plane position for collision purposes.
#[inline]
pub fn collision_cell(x: f64, z: f64) -> Coord {
    Coord::new((x + 0.5).floor() as i32, (z + 0.5).floor() as i32)
}

/// Whether moving from `(x0, z0)` to `(x1, z1)` crosses a walled edge.
///
/// Only the wall of the cell being left is consulted. A cell outside the
/// maze counts as fully walled.
pub fn is_blocked(maze: &Maze, x0: f64, z0: f64, x1: f64, z1: f64) -> bool {
    let from = collision_cell(x0, z0);
    let to = collision_cell(x1, z1);
    if from == to {
        return false;
    }

    let Some(cell) = maze.cell(from) else {
        return true;
    };

    (to.x > from.x && cell.walls.has(Direction::East))
        || (to.x < from.x && cell.walls.has(Direction::West))
        || (to.y > from.y && cell.walls.has(Direction::South))
        || (to.y < from.y && cell.walls.has(Direction::North))
}

/// Advance `pos` by `vel * dt` against the maze walls.
///
/// `dt` is split into [`SUBSTEPS`] equal slices. Each slice moves along `x`
/// first, then along `z` from the updated `x`; an axis whose move would
/// cross a walled edge does not move for that slice. `y` is carried through
/// unchanged.
pub fn step_position(pos: Vec3, vel: Vec3, dt: f64, maze: &Maze) -> Vec3 {
    let sub_dt = dt / f64::from(SUBSTEPS);
    let (mut x, mut z) = (pos.x, pos.z);

    for _ in 0..SUBSTEPS {
        let nx = x + vel.x * sub_dt;
        if !is_blocked(maze, x, z, nx, z) {
            x = nx;
        }

        let nz = z + vel.z * sub_dt;
        if !is_blocked(maze, x, z, x, nz) {
            z = nz;
        }
    }

    Vec3::new(x, pos.y, z)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f64 = 0.05;

    #[test]
    fn test_collision_cell_rounds() {
        assert_eq!(collision_cell(1.49, 1.5), Coord::new(1, 2));
        assert_eq!(collision_cell(-0.2, 0.0), Coord::new(0, 0));
        assert_eq!(collision_cell(-0.6, 0.0), Coord::new(-1, 0));
    }

    #[test]
    fn test_walled_axis_does_not_move() {
        let maze = Maze::closed(5, 5);
        let pos = Vec3::new(2.49, 0.0, 2.2);
        let vel = Vec3::new(3.0, 0.0, 3.0);

        let out = step_position(pos, vel, DT, &maze);

        // East edge is walled: no x displacement at all.
        assert_eq!(out.x, pos.x);
        // z stays inside the cell and moves freely.
        assert!((out.z - 2.35).abs() < 1e-9);
    }

    #[test]
    fn test_open_edge_allows_crossing() {
        let mut maze = Maze::closed(5, 5);
        maze.open_edge(Coord::new(2, 2), Direction::East);

        let out = step_position(Vec3::new(2.49, 0.0, 2.2), Vec3::new(3.0, 0.0, 0.0), DT, &maze);
        assert!((out.x - 2.64).abs() < 1e-9);
        assert_eq!(collision_cell(out.x, out.z), Coord::new(3, 2));
    }

    #[test]
    fn test_no_sliding_into_wall_surface() {
        // Starting short of the edge, motion stops at the last substep that
        // stayed inside the cell rather than clamping to the boundary.
        let maze = Maze::closed(5, 5);
        let out = step_position(Vec3::new(2.40, 0.0, 2.0), Vec3::new(3.0, 0.0, 0.0), DT, &maze);
        assert!(out.x < 2.5);
        assert!((out.x - 2.49).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_passes_through() {
        let maze = Maze::closed(5, 5);
        let out = step_position(Vec3::new(2.0, 7.5, 2.0), Vec3::new(0.0, 100.0, 0.0), DT, &maze);
        assert_eq!(out, Vec3::new(2.0, 7.5, 2.0));
    }

    #[test]
    fn test_outside_maze_is_solid() {
        let mut maze = Maze::closed(3, 3);
        maze.open_edge(Coord::new(1, 1), Direction::East);
        // (5, 1) is out of bounds; any crossing out of it is refused.
        let pos = Vec3::new(5.49, 0.0, 1.0);
        let out = step_position(pos, Vec3::new(3.0, 0.0, 0.0), DT, &maze);
        assert_eq!(out.x, pos.x);
    }

    #[test]
    fn test_spawn_forward_move_in_generated_maze() {
        // Players spawn at the start cell center, which collides as (2,2).
        let maze = Maze::generate("abc123", 31, 31, 0.08).unwrap();
        let spawn = Vec3::new(1.5, 0.0, 1.5);
        let out = step_position(spawn, Vec3::new(0.0, 0.0, 3.0), DT, &maze);
        assert!((out.z - spawn.z - 0.15).abs() < 1e-9);
        assert_eq!(out.x, spawn.x);
    }

    proptest! {
        #[test]
        fn prop_closed_cell_contains_point(
            x in 1.0f64..3.0,
            z in 1.0f64..3.0,
            vx in -20.0f64..20.0,
            vz in -20.0f64..20.0,
        ) {
            let maze = Maze::closed(5, 5);
            let pos = Vec3::new(x, 0.0, z);
            let out = step_position(pos, Vec3::new(vx, 0.0, vz), DT, &maze);
            prop_assert_eq!(collision_cell(out.x, out.z), collision_cell(pos.x, pos.z));
        }
    }
}
