//! Symbolic expressions carried by individuals, one per output dimension.
//!
//! The grammar and compiler live in the external search engine; this crate
//! only needs to wrap an existing expression in affine corrections and print
//! the result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators the scaling transform can introduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Expression tree over named inputs and double constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Named input signal, e.g. `x0`.
    Var(String),
    /// Double constant.
    Const(f64),
    /// Function application such as `sin(x0)`.
    Call { name: String, args: Vec<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    #[must_use]
    pub const fn constant(value: f64) -> Self {
        Self::Const(value)
    }

    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `self * const(factor)`.
    #[must_use]
    pub fn scaled_by(self, factor: f64) -> Self {
        Self::binary(BinaryOp::Mul, self, Self::Const(factor))
    }

    /// `self + const(term)`.
    #[must_use]
    pub fn shifted_by(self, term: f64) -> Self {
        Self::binary(BinaryOp::Add, self, Self::Const(term))
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Var(_) | Self::Const(_) => 1,
            Self::Call { args, .. } => 1 + args.iter().map(Expr::node_count).sum::<usize>(),
            Self::Binary { lhs, rhs, .. } => 1 + lhs.node_count() + rhs.node_count(),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self, Self::Binary { .. }) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => f.write_str(name),
            // Debug keeps the trailing ".0" so constants read as doubles.
            Self::Const(value) => write!(f, "{value:?}"),
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Binary { op, lhs, rhs } => {
                lhs.fmt_operand(f)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_binaries_are_parenthesised() {
        let expr = Expr::var("x1").scaled_by(2.0).shifted_by(3.0);
        assert_eq!(expr.to_string(), "(x1 * 2.0) + 3.0");
        assert_eq!(expr.node_count(), 5);
    }

    #[test]
    fn calls_print_their_arguments() {
        let expr = Expr::call(
            "sin",
            vec![Expr::binary(BinaryOp::Sub, Expr::var("x0"), Expr::constant(0.5))],
        );
        assert_eq!(expr.to_string(), "sin(x0 - 0.5)");
    }
}
