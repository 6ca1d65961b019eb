//! Fixed-size table of optional individuals.

use std::fmt;
use tracing::debug;

use crate::individual::same_individual;
use crate::scaling::apply_scaling;
use crate::{GridPos, IndividualRef, TrackerError};

/// `size_x * size_y` cells, each holding at most one individual.
///
/// Cells are stored with `x` as the outer axis, so a linear walk visits
/// `(0, 0), (0, 1), .., (1, 0), ..`; selection relies on that order.
pub struct PopulationGrid {
    size_x: usize,
    size_y: usize,
    cells: Vec<Option<IndividualRef>>,
    occupied: usize,
}

impl fmt::Debug for PopulationGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopulationGrid")
            .field("size_x", &self.size_x)
            .field("size_y", &self.size_y)
            .field("occupied", &self.occupied)
            .finish()
    }
}

impl PopulationGrid {
    /// Construct an empty grid.
    pub fn new(size_x: usize, size_y: usize) -> Result<Self, TrackerError> {
        if size_x == 0 || size_y == 0 {
            return Err(TrackerError::InvalidConfig(
                "population grid dimensions must be non-zero",
            ));
        }
        let len = size_x.checked_mul(size_y).ok_or(TrackerError::InvalidConfig(
            "population grid dimensions overflow",
        ))?;
        Ok(Self {
            size_x,
            size_y,
            cells: vec![None; len],
            occupied: 0,
        })
    }

    #[must_use]
    pub const fn size_x(&self) -> usize {
        self.size_x
    }

    #[must_use]
    pub const fn size_y(&self) -> usize {
        self.size_y
    }

    /// Number of occupied cells.
    #[must_use]
    pub const fn occupied(&self) -> usize {
        self.occupied
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[must_use]
    pub const fn contains(&self, pos: GridPos) -> bool {
        pos.x < self.size_x && pos.y < self.size_y
    }

    #[inline]
    fn offset(&self, pos: GridPos) -> usize {
        assert!(
            self.contains(pos),
            "position {pos} outside {}x{} population grid",
            self.size_x,
            self.size_y
        );
        pos.x * self.size_y + pos.y
    }

    /// Current occupant of `(x, y)`; `None` for empty or out-of-range cells.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&IndividualRef> {
        let pos = GridPos::new(x, y);
        if self.contains(pos) {
            self.cells[self.offset(pos)].as_ref()
        } else {
            None
        }
    }

    /// Store `individual` at its own position, returning the evicted occupant.
    ///
    /// A scaled fitness has its scale and shift folded into the individual's
    /// expressions before it is stored.
    ///
    /// # Panics
    ///
    /// Panics when the position lies outside the grid or the scaling vectors
    /// do not match the individual's dimensions.
    pub fn set(&mut self, individual: IndividualRef) -> Option<IndividualRef> {
        let pos = individual.position();
        let idx = self.offset(pos);
        apply_scaling(individual.as_ref());
        let previous = self.cells[idx].replace(individual);
        match &previous {
            Some(old) => debug!(%pos, evicted = %old.fitness(), "settling individual in place of previous occupant"),
            None => self.occupied += 1,
        }
        previous
    }

    /// Clear the cell of `individual` if it still holds that same individual.
    ///
    /// A stale removal, issued after a newer individual was set at the same
    /// position, leaves the newer occupant in place and returns `false`.
    ///
    /// # Panics
    ///
    /// Panics when the position lies outside the grid.
    pub fn remove(&mut self, individual: &IndividualRef) -> bool {
        let pos = individual.position();
        let idx = self.offset(pos);
        match &self.cells[idx] {
            Some(current) if same_individual(current, individual) => {
                self.cells[idx] = None;
                self.occupied -= 1;
                true
            }
            Some(_) => {
                debug!(%pos, "ignoring removal of an individual that was already replaced");
                false
            }
            None => false,
        }
    }

    /// Clear `pos` regardless of who occupies it.
    ///
    /// # Panics
    ///
    /// Panics when the position lies outside the grid.
    pub fn clear_cell(&mut self, pos: GridPos) -> Option<IndividualRef> {
        let idx = self.offset(pos);
        let previous = self.cells[idx].take();
        if previous.is_some() {
            self.occupied -= 1;
        }
        previous
    }

    /// Occupied cells in scan order.
    pub fn iter_occupied(&self) -> impl Iterator<Item = &IndividualRef> + '_ {
        self.cells.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Candidate, Expr, Fitness, Individual};
    use std::sync::Arc;

    fn individual(x: usize, y: usize, actual: f64) -> IndividualRef {
        Candidate::new(
            GridPos::new(x, y),
            Fitness::extended(actual, actual),
            vec![Expr::var("x0")],
        )
        .into_ref()
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(PopulationGrid::new(0, 4).is_err());
        assert!(PopulationGrid::new(4, 0).is_err());
    }

    #[test]
    fn set_get_and_evict() {
        let mut grid = PopulationGrid::new(3, 2).expect("grid");
        let first = individual(2, 1, 0.1);
        assert!(grid.set(Arc::clone(&first)).is_none());
        assert_eq!(grid.occupied(), 1);
        assert!(same_individual(grid.get(2, 1).expect("occupant"), &first));

        let second = individual(2, 1, 0.2);
        let evicted = grid.set(Arc::clone(&second)).expect("evicted");
        assert!(same_individual(&evicted, &first));
        assert_eq!(grid.occupied(), 1);
        assert!(grid.get(5, 5).is_none());
    }

    #[test]
    fn remove_clears_own_cell() {
        let mut grid = PopulationGrid::new(2, 2).expect("grid");
        let ind = individual(1, 0, 0.5);
        grid.set(Arc::clone(&ind));
        assert!(grid.remove(&ind));
        assert!(grid.get(1, 0).is_none());
        assert!(grid.is_empty());
        assert!(!grid.remove(&ind));
    }

    #[test]
    fn stale_remove_keeps_newer_occupant() {
        let mut grid = PopulationGrid::new(2, 2).expect("grid");
        let old = individual(0, 1, 0.3);
        let new = individual(0, 1, 0.4);
        grid.set(Arc::clone(&old));
        grid.set(Arc::clone(&new));
        assert!(!grid.remove(&old));
        assert!(same_individual(grid.get(0, 1).expect("occupant"), &new));
        assert_eq!(grid.clear_cell(GridPos::new(0, 1)).map(|i| i.position()), Some(GridPos::new(0, 1)));
        assert!(grid.is_empty());
    }

    #[test]
    fn iteration_walks_x_major() {
        let mut grid = PopulationGrid::new(2, 2).expect("grid");
        grid.set(individual(1, 0, 0.1));
        grid.set(individual(0, 1, 0.2));
        let order: Vec<GridPos> = grid.iter_occupied().map(|ind| ind.position()).collect();
        assert_eq!(order, vec![GridPos::new(0, 1), GridPos::new(1, 0)]);
    }

    #[test]
    fn scaled_individuals_are_rewritten_on_set() {
        let mut grid = PopulationGrid::new(1, 1).expect("grid");
        let ind = Candidate::new(
            GridPos::new(0, 0),
            Fitness::scaled(1.0, 1.0, vec![4.0], vec![0.0]),
            vec![Expr::var("x0")],
        )
        .into_ref();
        grid.set(Arc::clone(&ind));
        assert_eq!(ind.expr_text(), vec!["x0 * 4.0"]);
    }

    #[test]
    #[should_panic(expected = "outside 2x2 population grid")]
    fn out_of_bounds_set_is_fatal() {
        let mut grid = PopulationGrid::new(2, 2).expect("grid");
        grid.set(individual(2, 0, 0.1));
    }
}
