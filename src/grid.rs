use crate::agent::{Agent, AgentId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cell coordinates, `0 <= x < width`, `0 <= y < height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    /// Manhattan distance to another cell, in blocks.
    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Occupant of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    /// The fixed city center; never scheduled, never relocated.
    Landmark,
    Agent(AgentId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("cell ({x}, {y}) is already occupied")]
    OccupiedCell { x: usize, y: usize },

    #[error("no vacant cell is left on the grid")]
    NoVacancy,
}

/// Bounded single-occupancy lattice.
///
/// Row-major flat cell storage plus a swap-remove list of vacant cells, so
/// that drawing a uniformly random vacant cell is O(1) instead of a
/// full-grid scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    /// Indices of currently vacant cells, in arbitrary order.
    vacant: Vec<usize>,
    /// Position of each vacant cell index within `vacant`; only meaningful
    /// while the cell is vacant.
    vacant_slot: Vec<usize>,
}

impl SpatialGrid {
    pub fn new(width: usize, height: usize) -> Self {
        let n_cells = width * height;
        Self {
            width,
            height,
            cells: vec![Cell::Empty; n_cells],
            vacant: (0..n_cells).collect(),
            vacant_slot: (0..n_cells).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, pos: Position) -> Cell {
        self.cells[self.idx(pos)]
    }

    /// Number of currently vacant cells.
    pub fn vacancy_count(&self) -> usize {
        self.vacant.len()
    }

    #[inline]
    fn idx(&self, pos: Position) -> usize {
        debug_assert!(pos.x < self.width && pos.y < self.height);
        pos.y * self.width + pos.x
    }

    #[inline]
    fn position(&self, idx: usize) -> Position {
        Position {
            x: idx % self.width,
            y: idx / self.width,
        }
    }

    /// Bind an occupant to a vacant cell.
    ///
    /// # Errors
    /// Returns [`GridError::OccupiedCell`] if the cell is not vacant.
    pub fn place(&mut self, occupant: Cell, pos: Position) -> Result<(), GridError> {
        debug_assert_ne!(occupant, Cell::Empty);
        let idx = self.idx(pos);
        if self.cells[idx] != Cell::Empty {
            return Err(GridError::OccupiedCell { x: pos.x, y: pos.y });
        }
        self.cells[idx] = occupant;
        self.claim_vacant(idx);
        Ok(())
    }

    /// Agent ids in the Moore neighborhood of `pos` within Chebyshev
    /// distance `radius`, center excluded. Out-of-bounds cells are clipped
    /// (the grid is not toroidal) and the landmark is never reported.
    pub fn neighbors(&self, pos: Position, radius: usize) -> Vec<AgentId> {
        let r = radius as i64;
        let mut ids = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let x = pos.x as i64 + dx;
                let y = pos.y as i64 + dy;
                if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
                    continue;
                }
                let idx = self.idx(Position {
                    x: x as usize,
                    y: y as usize,
                });
                if let Cell::Agent(id) = self.cells[idx] {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Move an agent to a uniformly random vacant cell, updating both the
    /// occupancy map and the agent's stored position.
    ///
    /// # Errors
    /// Returns [`GridError::NoVacancy`] if no vacant cell exists.
    pub fn relocate<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) -> Result<(), GridError> {
        if self.vacant.is_empty() {
            return Err(GridError::NoVacancy);
        }
        let dest = self.vacant[rng.random_range(0..self.vacant.len())];
        let src = self.idx(agent.pos);
        debug_assert_eq!(self.cells[src], Cell::Agent(agent.id));

        self.cells[dest] = Cell::Agent(agent.id);
        self.claim_vacant(dest);
        self.cells[src] = Cell::Empty;
        self.release_vacant(src);

        agent.pos = self.position(dest);
        Ok(())
    }

    fn claim_vacant(&mut self, idx: usize) {
        let slot = self.vacant_slot[idx];
        debug_assert_eq!(self.vacant[slot], idx);
        self.vacant.swap_remove(slot);
        if let Some(&moved) = self.vacant.get(slot) {
            self.vacant_slot[moved] = slot;
        }
    }

    fn release_vacant(&mut self, idx: usize) {
        self.vacant_slot[idx] = self.vacant.len();
        self.vacant.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn pos(x: usize, y: usize) -> Position {
        Position { x, y }
    }

    #[test]
    fn place_rejects_occupied_cell() {
        let mut grid = SpatialGrid::new(4, 4);
        grid.place(Cell::Landmark, pos(1, 1)).unwrap();
        let err = grid.place(Cell::Agent(0), pos(1, 1)).unwrap_err();
        assert_eq!(err, GridError::OccupiedCell { x: 1, y: 1 });
    }

    #[test]
    fn neighbors_clip_bounds_and_skip_landmark() {
        let mut grid = SpatialGrid::new(3, 3);
        grid.place(Cell::Landmark, pos(1, 1)).unwrap();
        grid.place(Cell::Agent(0), pos(0, 0)).unwrap();
        grid.place(Cell::Agent(1), pos(0, 1)).unwrap();
        grid.place(Cell::Agent(2), pos(2, 2)).unwrap();

        let mut ids = grid.neighbors(pos(0, 0), 1);
        ids.sort_unstable();
        assert_eq!(ids, vec![1]);

        let mut ids = grid.neighbors(pos(1, 1), 2);
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn relocate_preserves_single_occupancy() {
        let mut grid = SpatialGrid::new(3, 3);
        let mut agent = Agent::new(0, AgentKind::Majority, pos(0, 0));
        grid.place(Cell::Landmark, pos(1, 1)).unwrap();
        grid.place(Cell::Agent(agent.id), agent.pos).unwrap();

        let mut rng = ChaCha12Rng::seed_from_u64(7);
        for _ in 0..50 {
            let old = agent.pos;
            grid.relocate(&mut agent, &mut rng).unwrap();
            assert_ne!(agent.pos, old);
            assert_eq!(grid.cell(agent.pos), Cell::Agent(0));
            assert_eq!(grid.cell(old), Cell::Empty);
            assert_eq!(grid.cell(pos(1, 1)), Cell::Landmark);
            assert_eq!(grid.vacancy_count(), 7);
        }
    }

    #[test]
    fn relocate_fails_on_full_grid() {
        let mut grid = SpatialGrid::new(2, 2);
        grid.place(Cell::Landmark, pos(0, 0)).unwrap();
        let mut agents = Vec::new();
        for (id, (x, y)) in [(1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            let agent = Agent::new(id, AgentKind::Majority, pos(x, y));
            grid.place(Cell::Agent(id), agent.pos).unwrap();
            agents.push(agent);
        }

        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let err = grid.relocate(&mut agents[0], &mut rng).unwrap_err();
        assert_eq!(err, GridError::NoVacancy);
    }
}
