use thiserror::Error;

/// Structural failures raised while building or combining constraints.
///
/// Algebraic emptiness (an unsatisfiable intersection, a binding that
/// eliminates every cube) is never an error; it is represented as `None` or
/// an empty union and callers distinguish it structurally.
#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("cannot mix {left} and {right} constraints on the same dimension")]
    MixedKinds {
        left: &'static str,
        right: &'static str,
    },
    #[error("range arrays must have one or two elements, found {0}")]
    BadRangeArray(usize),
    #[error("range on dimension '{0}' does not equal the factor being removed")]
    ConstraintMismatch(String),
    #[error("invalid parameter name {0:?}")]
    InvalidParameter(String),
    #[error("no order named {0:?} is registered")]
    UnknownOrder(String),
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),
}
