//! Maze Generation
//!
//! Deterministic wall-grid mazes: a recursive-backtracker spanning tree over
//! odd-coordinate rooms joined through even-coordinate corridors, followed
//! by a loop-carving pass that only ever removes walls.
//!
//! Identical `(seed, w, h, loopiness)` always yields a bit-identical maze, so
//! clients receive only the seed and a layout hash.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::hash::hash_layout;
use crate::core::rng::DeterministicRng;

/// Smallest width/height that still has an interior cell at (1,1).
pub const MIN_DIMENSION: i32 = 3;

/// Grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Key used in path histories, `"x,y"`.
    pub fn key(self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// Neighbor one step in `dir`.
    pub const fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Cardinal direction. North is towards row 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards smaller `y`.
    North,
    /// Towards larger `y`.
    South,
    /// Towards larger `x`.
    East,
    /// Towards smaller `x`.
    West,
}

impl Direction {
    /// Generation order. The backtracker filters neighbors in this order, so
    /// it is part of the determinism contract.
    pub const ALL: [Direction; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Grid offset of one step.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    /// The direction pointing back.
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }
}

/// Wall flags of one cell.
///
/// Field order and names match the serialized layout that the layout hash
/// covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Walls {
    /// Wall towards smaller `y`.
    #[serde(rename = "N")]
    pub north: bool,
    /// Wall towards larger `y`.
    #[serde(rename = "S")]
    pub south: bool,
    /// Wall towards larger `x`.
    #[serde(rename = "E")]
    pub east: bool,
    /// Wall towards smaller `x`.
    #[serde(rename = "W")]
    pub west: bool,
}

impl Walls {
    /// All four walls present.
    pub const CLOSED: Self = Self { north: true, south: true, east: true, west: true };

    /// Whether the wall on `dir` is present.
    pub const fn has(&self, dir: Direction) -> bool {
        match dir {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    fn clear(&mut self, dir: Direction) {
        match dir {
            Direction::North => self.north = false,
            Direction::South => self.south = false,
            Direction::East => self.east = false,
            Direction::West => self.west = false,
        }
    }
}

/// One grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Wall flags.
    pub walls: Walls,
}

/// Maze generation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MazeError {
    /// Width or height too small to hold the start cell.
    #[error("maze dimensions {w}x{h} are below the {MIN_DIMENSION}x{MIN_DIMENSION} minimum")]
    TooSmall {
        /// Requested width.
        w: i32,
        /// Requested height.
        h: i32,
    },
    /// Loopiness must be a finite, non-negative fraction.
    #[error("invalid loopiness {0}")]
    InvalidLoopiness(f64),
    /// Layout could not be serialized for hashing.
    #[error("layout serialization failed: {0}")]
    Serialization(String),
}

/// An immutable wall-grid maze.
///
/// Cells are stored row-major (`index = y * w + x`). Wall flags between
/// adjacent cells are always mutually consistent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    w: i32,
    h: i32,
    cells: Vec<Cell>,
    start: Coord,
    exit: Coord,
}

impl Maze {
    /// Generate a maze from a hex seed.
    ///
    /// 1. Seed the PRNG from the first 8 hex characters of `seed`.
    /// 2. Close every wall.
    /// 3. Recursive-backtracker carve from (1,1) over two-cell jumps.
    /// 4. Bridge the exit onto the tree when it sits on an even row or column.
    /// 5. `floor(w * h * loopiness)` extra random wall removals.
    /// 6. `start = (1,1)`, `exit = (w-2, h-2)`.
    ///
    /// Step 4 draws nothing from the PRNG and only fires for even dimensions,
    /// so odd-sized mazes match the plain backtracker exactly.
    pub fn generate(seed: &str, w: i32, h: i32, loopiness: f64) -> Result<Self, MazeError> {
        if w < MIN_DIMENSION || h < MIN_DIMENSION {
            return Err(MazeError::TooSmall { w, h });
        }
        if !loopiness.is_finite() || loopiness < 0.0 {
            return Err(MazeError::InvalidLoopiness(loopiness));
        }

        let mut rng = DeterministicRng::from_hex_seed(seed);
        let mut maze = Self::closed(w, h);

        maze.carve_spanning_tree(&mut rng);
        maze.bridge_exit();
        maze.carve_loops(&mut rng, loopiness);

        Ok(maze)
    }

    /// A maze with every wall present.
    pub fn closed(w: i32, h: i32) -> Self {
        let cells = (0..h)
            .flat_map(|y| (0..w).map(move |x| Cell { x, y, walls: Walls::CLOSED }))
            .collect();
        Self {
            w,
            h,
            cells,
            start: Coord::new(1, 1),
            exit: Coord::new(w - 2, h - 2),
        }
    }

    fn carve_spanning_tree(&mut self, rng: &mut DeterministicRng) {
        let mut visited = vec![false; self.cells.len()];
        let mut stack = vec![self.start];
        if let Some(i) = self.index(self.start) {
            visited[i] = true;
        }

        while let Some(&current) = stack.last() {
            let candidates: Vec<(Coord, Direction)> = Direction::ALL
                .iter()
                .filter_map(|&dir| {
                    let (dx, dy) = dir.delta();
                    let next = Coord::new(current.x + dx * 2, current.y + dy * 2);
                    let i = self.index(next)?;
                    (!visited[i]).then_some((next, dir))
                })
                .collect();

            let Some(&(next, dir)) = rng.choose(&candidates) else {
                stack.pop();
                continue;
            };

            let mid = current.step(dir);
            self.open_edge(current, dir);
            self.open_edge(mid, dir);

            if let Some(i) = self.index(next) {
                visited[i] = true;
            }
            stack.push(next);
        }
    }

    /// Even-coordinate cells are never rooms, so an exit at `(w-2, h-2)` with
    /// an even component is not on the tree. Walk west then north towards the
    /// nearest room, stopping at the first cell the tree already reaches.
    fn bridge_exit(&mut self) {
        let reached = self.reachable_from(self.start);
        let mut at = self.exit;
        let steps = [
            (self.exit.x % 2 == 0).then_some(Direction::West),
            (self.exit.y % 2 == 0).then_some(Direction::North),
        ];
        for dir in steps.into_iter().flatten() {
            if self.index(at).map_or(true, |i| reached[i]) {
                return;
            }
            self.open_edge(at, dir);
            at = at.step(dir);
        }
    }

    fn carve_loops(&mut self, rng: &mut DeterministicRng, loopiness: f64) {
        let carve_count = (f64::from(self.w) * f64::from(self.h) * loopiness).floor() as usize;
        for _ in 0..carve_count {
            // Always three draws per attempt, even when the target is out of bounds.
            let x = rng.next_index(self.w as usize) as i32;
            let y = rng.next_index(self.h as usize) as i32;
            let dir = Direction::ALL[rng.next_index(Direction::ALL.len())];

            let from = Coord::new(x, y);
            if self.in_bounds(from) && self.in_bounds(from.step(dir)) {
                self.open_edge(from, dir);
            }
        }
    }

    /// Remove the wall between `at` and its neighbor in `dir`, on both sides.
    ///
    /// Does nothing unless both cells are in bounds.
    pub(crate) fn open_edge(&mut self, at: Coord, dir: Direction) {
        let (Some(a), Some(b)) = (self.index(at), self.index(at.step(dir))) else {
            return;
        };
        self.cells[a].walls.clear(dir);
        self.cells[b].walls.clear(dir.opposite());
    }

    /// Width in cells.
    pub fn width(&self) -> i32 {
        self.w
    }

    /// Height in cells.
    pub fn height(&self) -> i32 {
        self.h
    }

    /// Start cell, always (1,1).
    pub fn start(&self) -> Coord {
        self.start
    }

    /// Exit cell, always (w-2, h-2).
    pub fn exit(&self) -> Coord {
        self.exit
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Whether `c` lies inside the grid.
    #[inline]
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.w && c.y < self.h
    }

    /// Row-major index of `c`, if in bounds.
    #[inline]
    pub fn index(&self, c: Coord) -> Option<usize> {
        self.in_bounds(c).then(|| (c.y * self.w + c.x) as usize)
    }

    /// Cell at `c`, if in bounds.
    #[inline]
    pub fn cell(&self, c: Coord) -> Option<&Cell> {
        self.index(c).and_then(|i| self.cells.get(i))
    }

    /// Whether movement from `c` in `dir` is blocked by a wall.
    ///
    /// Out-of-bounds cells count as solid.
    pub fn is_walled(&self, c: Coord, dir: Direction) -> bool {
        self.cell(c).map_or(true, |cell| cell.walls.has(dir))
    }

    /// Cells directly reachable from `c` (no wall in between).
    pub fn open_neighbors(&self, c: Coord) -> impl Iterator<Item = Coord> + '_ {
        Direction::ALL
            .into_iter()
            .filter(move |&dir| !self.is_walled(c, dir))
            .map(move |dir| c.step(dir))
            .filter(move |&n| self.in_bounds(n))
    }

    /// Mask (row-major) of every cell reachable from `from`.
    pub fn reachable_from(&self, from: Coord) -> Vec<bool> {
        let mut seen = vec![false; self.cells.len()];
        let Some(start) = self.index(from) else {
            return seen;
        };
        seen[start] = true;
        let mut queue = VecDeque::from([from]);
        while let Some(c) = queue.pop_front() {
            for n in self.open_neighbors(c) {
                if let Some(i) = self.index(n) {
                    if !seen[i] {
                        seen[i] = true;
                        queue.push_back(n);
                    }
                }
            }
        }
        seen
    }

    /// Breadth-first path length (in cell steps) between two cells.
    pub fn shortest_path_len(&self, from: Coord, to: Coord) -> Option<usize> {
        let start = self.index(from)?;
        self.index(to)?;

        let mut seen = vec![false; self.cells.len()];
        seen[start] = true;
        let mut queue = VecDeque::from([(from, 0usize)]);

        while let Some((c, dist)) = queue.pop_front() {
            if c == to {
                return Some(dist);
            }
            for n in self.open_neighbors(c) {
                if let Some(i) = self.index(n) {
                    if !seen[i] {
                        seen[i] = true;
                        queue.push_back((n, dist + 1));
                    }
                }
            }
        }
        None
    }

    /// Canonical JSON bytes of the layout.
    ///
    /// Shape: `{"w":..,"h":..,"cells":[{"x":..,"y":..,"walls":{"N":..,"S":..,"E":..,"W":..}}],"start":{..},"exit":{..}}`.
    pub fn to_layout_bytes(&self) -> Result<Vec<u8>, MazeError> {
        serde_json::to_vec(self).map_err(|e| MazeError::Serialization(e.to_string()))
    }

    /// Content fingerprint of the layout, surfaced to clients in INIT.
    pub fn layout_hash(&self) -> Result<String, MazeError> {
        Ok(hash_layout(&self.to_layout_bytes()?))
    }
}

// =============================================================================
// TESTS
// =============================================================================
