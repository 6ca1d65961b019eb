//! Fitness values reported by the external evaluator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale factor that leaves an expression unchanged.
pub const NO_SCALE: f64 = 1.0;
/// Shift term that leaves an expression unchanged.
pub const NO_SHIFT: f64 = 0.0;

/// Fitness attached to an evaluated individual.
///
/// `actual` is the exact fitness the search tries to drive to `1.0`;
/// `guidance` over-estimates it and steers selection while the exact value
/// is still far off. A `Plain` fitness only carries a guidance score, which
/// happens when the individual could not be compiled or evaluated exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fitness {
    Plain {
        value: f64,
    },
    Extended {
        actual: f64,
        guidance: f64,
    },
    Scaled {
        actual: f64,
        guidance: f64,
        /// One scale factor per output dimension.
        scales: Vec<f64>,
        /// One shift term per output dimension.
        shifts: Vec<f64>,
    },
}

impl Fitness {
    #[must_use]
    pub const fn plain(value: f64) -> Self {
        Self::Plain { value }
    }

    #[must_use]
    pub const fn extended(actual: f64, guidance: f64) -> Self {
        Self::Extended { actual, guidance }
    }

    #[must_use]
    pub fn scaled(actual: f64, guidance: f64, scales: Vec<f64>, shifts: Vec<f64>) -> Self {
        Self::Scaled {
            actual,
            guidance,
            scales,
            shifts,
        }
    }

    /// Guidance score; every variant carries one.
    #[must_use]
    pub fn guidance(&self) -> f64 {
        match self {
            Self::Plain { value } => *value,
            Self::Extended { guidance, .. } | Self::Scaled { guidance, .. } => *guidance,
        }
    }

    /// Exact fitness when the evaluator could compute it.
    #[must_use]
    pub fn actual(&self) -> Option<f64> {
        match self {
            Self::Plain { .. } => None,
            Self::Extended { actual, .. } | Self::Scaled { actual, .. } => Some(*actual),
        }
    }

    /// Exact fitness, counting an uncomputable or non-finite one as `0.0`.
    ///
    /// Selection and aggregation both use this so that individuals whose
    /// compilation or evaluation failed still occupy their cell with the
    /// lowest score.
    #[must_use]
    pub fn actual_or_zero(&self) -> f64 {
        self.actual().filter(|value| value.is_finite()).unwrap_or(0.0)
    }

    /// Terminal condition used by callers to stop the search.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        match self {
            Self::Plain { value } => *value == 1.0,
            Self::Extended { actual, .. } | Self::Scaled { actual, .. } => *actual == 1.0,
        }
    }

    /// Same variant and same score on both channels; scale and shift
    /// vectors are not compared.
    #[must_use]
    pub fn same_as(&self, other: &Fitness) -> bool {
        match (self, other) {
            (Self::Plain { value: a }, Self::Plain { value: b }) => a == b,
            (
                Self::Extended { .. } | Self::Scaled { .. },
                Self::Extended { .. } | Self::Scaled { .. },
            ) => self.guidance() == other.guidance() && self.actual() == other.actual(),
            _ => false,
        }
    }

    /// Per-dimension `(scale, shift)` pairs, present only for scaled fitness.
    #[must_use]
    pub fn scaling(&self) -> Option<(&[f64], &[f64])> {
        match self {
            Self::Scaled { scales, shifts, .. } => Some((scales, shifts)),
            _ => None,
        }
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain { value } => write!(f, "[req: {value}]"),
            Self::Extended { actual, guidance } => write!(f, "[req: {guidance}, ex: {actual}]"),
            Self::Scaled {
                actual,
                guidance,
                scales,
                shifts,
            } => write!(
                f,
                "[req: {guidance}, ex: {actual}, sc: {scales:?}, sh: {shifts:?}]"
            ),
        }
    }
}
