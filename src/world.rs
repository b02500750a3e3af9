//! Spatial grid: cell occupancy and Moore-neighborhood topology.
//!
//! Every cell holds at most one agent. All mutations go through
//! [`World::place`], [`World::move_agent`] and [`World::vacate`], which
//! refuse to break that rule.

use crate::agent::{Agent, AgentId};
use crate::config::{Geometry, WorldConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Moore neighborhood offsets, enumerated in a fixed order
static MOORE_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A grid cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    #[inline]
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The occupancy grid
#[derive(Clone, Debug)]
pub struct World {
    width: usize,
    height: usize,
    geometry: Geometry,
    /// cells[y * width + x] holds the occupant of (x, y)
    cells: Vec<Option<AgentId>>,
}

impl World {
    /// Create an empty grid
    pub fn new(width: usize, height: usize, geometry: Geometry) -> Self {
        Self {
            width,
            height,
            geometry,
            cells: vec![None; width * height],
        }
    }

    /// Create an empty grid from configuration
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.width, config.height, config.geometry)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x < self.width && pos.y < self.height {
            Some(pos.y * self.width + pos.x)
        } else {
            None
        }
    }

    /// Occupant of a cell, `None` when empty or out of range
    #[inline]
    pub fn get(&self, pos: Position) -> Option<AgentId> {
        self.index(pos).and_then(|i| self.cells[i])
    }

    /// Check if an in-range cell is free
    #[inline]
    pub fn is_empty(&self, pos: Position) -> bool {
        matches!(self.index(pos), Some(i) if self.cells[i].is_none())
    }

    /// Occupy an empty cell. Returns false, without mutating, if the cell
    /// is taken or out of range.
    pub fn place(&mut self, id: AgentId, pos: Position) -> bool {
        match self.index(pos) {
            Some(i) if self.cells[i].is_none() => {
                self.cells[i] = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Clear a cell, returning its former occupant
    pub fn vacate(&mut self, pos: Position) -> Option<AgentId> {
        self.index(pos).and_then(|i| self.cells[i].take())
    }

    /// Move an agent to an empty cell and update its stored position.
    /// Fails if the destination is occupied or the agent is not where it
    /// claims to be.
    pub fn move_agent(&mut self, agent: &mut Agent, to: Position) -> bool {
        let (Some(from_idx), Some(to_idx)) = (self.index(agent.position), self.index(to)) else {
            return false;
        };
        if self.cells[to_idx].is_some() || self.cells[from_idx] != Some(agent.id) {
            return false;
        }

        self.cells[from_idx] = None;
        self.cells[to_idx] = Some(agent.id);
        agent.position = to;
        true
    }

    /// Resolve a Moore offset under the grid geometry
    fn offset(&self, pos: Position, dx: isize, dy: isize) -> Option<Position> {
        let nx = pos.x as isize + dx;
        let ny = pos.y as isize + dy;

        if self.geometry.wraps() {
            let w = self.width as isize;
            let h = self.height as isize;
            Some(Position::new(nx.rem_euclid(w) as usize, ny.rem_euclid(h) as usize))
        } else if nx >= 0 && ny >= 0 && (nx as usize) < self.width && (ny as usize) < self.height {
            Some(Position::new(nx as usize, ny as usize))
        } else {
            None
        }
    }

    /// Cells of the Moore neighborhood around `pos`, in fixed order.
    /// On wrapped grids narrower than 3 cells an offset can land back on
    /// `pos` itself; such cells are skipped, others may repeat.
    pub fn moore_cells(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        MOORE_OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| self.offset(pos, dx, dy))
            .filter(move |&p| p != pos)
    }

    /// Agents occupying the 8 cells around `pos`
    pub fn neighbors(&self, pos: Position) -> Vec<AgentId> {
        self.moore_cells(pos).filter_map(|p| self.get(p)).collect()
    }

    /// A uniformly chosen empty neighboring cell, or `None` if all are taken
    pub fn find_empty_adjacent<R: Rng + ?Sized>(&self, pos: Position, rng: &mut R) -> Option<Position> {
        let candidates: Vec<Position> = self.moore_cells(pos).filter(|&p| self.is_empty(p)).collect();
        candidates.choose(rng).copied()
    }

    /// A uniformly random cell anywhere on the grid
    pub fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height))
    }

    /// Number of occupied cells
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Iterate over every cell and its occupant, row by row
    pub fn cells(&self) -> impl Iterator<Item = (Position, Option<AgentId>)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &cell)| (Position::new(i % self.width, i / self.width), cell))
    }
}
