//! The seam between the tracker and the external search engine's individuals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{Expr, Fitness};

/// Cell coordinates of an individual on the population grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: usize,
    pub y: usize,
}

impl GridPos {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An evaluated candidate solution owned by the search engine.
///
/// The tracker only holds shared references. It reads the position and
/// fitness and rewrites expressions when the fitness carries a scaling
/// correction, so implementations provide interior mutability for the
/// expressions.
pub trait Individual: Send + Sync {
    /// Cell the individual occupies; fixed for its lifetime.
    fn position(&self) -> GridPos;

    fn fitness(&self) -> &Fitness;

    /// Number of output dimensions, one expression each.
    fn dimensions(&self) -> usize;

    /// Replace every dimension's expression with `update(dimension, expr)`.
    fn update_exprs(&self, update: &mut dyn FnMut(usize, Expr) -> Expr);

    /// Printable expression per dimension.
    fn expr_text(&self) -> Vec<String>;
}

/// Shared handle to an individual.
pub type IndividualRef = Arc<dyn Individual>;

/// Whether two handles point at the same individual.
///
/// Only the data address is compared; vtable pointers of the same type can
/// differ between codegen units.
#[must_use]
pub fn same_individual(a: &IndividualRef, b: &IndividualRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Plain in-memory individual.
///
/// Used by producers that do not have their own individual type, by the demo
/// binary and by tests.
pub struct Candidate {
    position: GridPos,
    fitness: Fitness,
    exprs: Mutex<Vec<Expr>>,
}

impl Candidate {
    #[must_use]
    pub fn new(position: GridPos, fitness: Fitness, exprs: Vec<Expr>) -> Self {
        Self {
            position,
            fitness,
            exprs: Mutex::new(exprs),
        }
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn into_ref(self) -> IndividualRef {
        Arc::new(self)
    }

    /// Copy of the current expressions.
    #[must_use]
    pub fn exprs(&self) -> Vec<Expr> {
        self.exprs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("position", &self.position)
            .field("fitness", &self.fitness)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

impl Individual for Candidate {
    fn position(&self) -> GridPos {
        self.position
    }

    fn fitness(&self) -> &Fitness {
        &self.fitness
    }

    fn dimensions(&self) -> usize {
        self.exprs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn update_exprs(&self, update: &mut dyn FnMut(usize, Expr) -> Expr) {
        let mut exprs = self.exprs.lock().unwrap_or_else(PoisonError::into_inner);
        let current = std::mem::take(&mut *exprs);
        *exprs = current
            .into_iter()
            .enumerate()
            .map(|(dim, expr)| update(dim, expr))
            .collect();
    }

    fn expr_text(&self) -> Vec<String> {
        self.exprs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}
