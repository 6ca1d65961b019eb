//! Folds a scaled fitness's affine correction into the individual's expressions.

use crate::fitness::{NO_SCALE, NO_SHIFT};
use crate::{Expr, Individual};

/// Rewrite one expression as `scale * expr + shift`, skipping identity factors.
#[must_use]
pub fn apply_affine(expr: Expr, scale: f64, shift: f64) -> Expr {
    let mut expr = expr;
    if scale != NO_SCALE {
        expr = expr.scaled_by(scale);
    }
    if shift != NO_SHIFT {
        expr = expr.shifted_by(shift);
    }
    expr
}

/// Apply the per-dimension scale and shift of a scaled fitness.
///
/// Returns `false` without touching the individual when its fitness is not
/// scaled.
///
/// # Panics
///
/// Panics when the scale or shift vector does not have exactly one entry per
/// output dimension; that is a producer bug, not a runtime condition.
pub fn apply_scaling(individual: &dyn Individual) -> bool {
    let Some((scales, shifts)) = individual.fitness().scaling() else {
        return false;
    };
    let dims = individual.dimensions();
    assert_eq!(
        scales.len(),
        dims,
        "scale vector has {} entries for {} dimensions at {}",
        scales.len(),
        dims,
        individual.position()
    );
    assert_eq!(
        shifts.len(),
        dims,
        "shift vector has {} entries for {} dimensions at {}",
        shifts.len(),
        dims,
        individual.position()
    );
    individual.update_exprs(&mut |dim, expr| apply_affine(expr, scales[dim], shifts[dim]));
    true
}
