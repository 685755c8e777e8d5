use crate::value::{Order, Value};
use std::{
    fmt::{Display, Formatter},
    ops::{BitAnd, BitOr, Not},
};

/// The result of a comparison or containment check that may involve
/// parameters: decidable now (`True`/`False`) or only after binding
/// (`Unknown`).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum TriBool {
    True,
    False,
    Unknown,
}

impl TriBool {
    #[inline]
    pub fn is_true(self) -> bool {
        self == Self::True
    }

    #[inline]
    pub fn is_false(self) -> bool {
        self == Self::False
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == Self::Unknown
    }

    /// Conjunction over an iterator: `False` dominates, then `Unknown`.
    pub fn all<I>(results: I) -> Self
    where
        I: IntoIterator<Item = TriBool>,
    {
        results.into_iter().fold(Self::True, BitAnd::bitand)
    }

    /// Disjunction over an iterator: `True` dominates, then `Unknown`.
    pub fn any<I>(results: I) -> Self
    where
        I: IntoIterator<Item = TriBool>,
    {
        results.into_iter().fold(Self::False, BitOr::bitor)
    }
}

impl From<bool> for TriBool {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl BitAnd for TriBool {
    type Output = Self;

    fn bitand(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::True, Self::True) => Self::True,
        }
    }
}

impl BitOr for TriBool {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::False, Self::False) => Self::False,
        }
    }
}

impl Not for TriBool {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

impl Display for TriBool {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::True => write!(formatter, "true"),
            Self::False => write!(formatter, "false"),
            Self::Unknown => write!(formatter, "unknown"),
        }
    }
}

// The tri-valued comparators. Concrete pairs delegate to the order's strict
// relation; the same parameter on both sides is decidable by reflexivity;
// every other parametric pair is unknown.

pub(crate) fn eq(order: &Order, a: &Value, b: &Value) -> TriBool {
    match (a.param_name(), b.param_name()) {
        (None, None) => (!order.lt(a, b) && !order.lt(b, a)).into(),
        (Some(p), Some(q)) if p == q => TriBool::True,
        _ => TriBool::Unknown,
    }
}

pub(crate) fn lt(order: &Order, a: &Value, b: &Value) -> TriBool {
    match (a.param_name(), b.param_name()) {
        (None, None) => order.lt(a, b).into(),
        (Some(p), Some(q)) if p == q => TriBool::False,
        _ => TriBool::Unknown,
    }
}

pub(crate) fn le(order: &Order, a: &Value, b: &Value) -> TriBool {
    match (a.param_name(), b.param_name()) {
        (None, None) => (!order.lt(b, a)).into(),
        (Some(p), Some(q)) if p == q => TriBool::True,
        _ => TriBool::Unknown,
    }
}

pub(crate) fn gt(order: &Order, a: &Value, b: &Value) -> TriBool {
    lt(order, b, a)
}

pub(crate) fn ge(order: &Order, a: &Value, b: &Value) -> TriBool {
    le(order, b, a)
}
