use crate::{
    bind::Bindings,
    compare::{self, TriBool},
    error::Error,
    expression::{ExprContext, ExpressionFormatter, Operand, Operator},
    json,
    query::Query,
    value::{Order, Value},
};
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

/// A constraint on a single dimension's value.
///
/// Ranges are immutable: every algebraic operation returns a fresh range.
/// Each range carries the [`Order`] it was built with (the natural order by
/// default); comparisons between its bound and other values go through that
/// order and are tri-valued when parameters are involved.
#[derive(Clone, PartialEq, Debug)]
pub struct Range {
    kind: RangeKind,
    order: Order,
}

/// The range variants. `Between` holds a lower bound (`GreaterThan` or
/// `GreaterThanOrEqual`) and an upper bound (`LessThan` or
/// `LessThanOrEqual`); `Intersection` is a deferred conjunction that keeps
/// one non-parametric bound plus one bound per parameter name.
#[derive(Clone, PartialEq, Debug)]
pub enum RangeKind {
    Unbounded,
    Equals(Value),
    LessThan(Value),
    LessThanOrEqual(Value),
    GreaterThan(Value),
    GreaterThanOrEqual(Value),
    Between(Box<Range>, Box<Range>),
    Intersection(Intersection),
    HasElement(Box<Range>),
    Subquery(Query),
}

impl Range {
    pub fn unbounded() -> Self {
        Self {
            kind: RangeKind::Unbounded,
            order: Order::natural(),
        }
    }

    pub fn equal_to(value: impl Into<Value>) -> Self {
        Self {
            kind: RangeKind::Equals(value.into()),
            order: Order::natural(),
        }
    }

    pub fn less_than(value: impl Into<Value>) -> Self {
        Self {
            kind: RangeKind::LessThan(value.into()),
            order: Order::natural(),
        }
    }

    pub fn less_than_or_equal(value: impl Into<Value>) -> Self {
        Self {
            kind: RangeKind::LessThanOrEqual(value.into()),
            order: Order::natural(),
        }
    }

    pub fn greater_than(value: impl Into<Value>) -> Self {
        Self {
            kind: RangeKind::GreaterThan(value.into()),
            order: Order::natural(),
        }
    }

    pub fn greater_than_or_equal(value: impl Into<Value>) -> Self {
        Self {
            kind: RangeKind::GreaterThanOrEqual(value.into()),
            order: Order::natural(),
        }
    }

    /// A range over collection values that matches when at least one element
    /// is accepted by `inner`.
    pub fn has_element(inner: Range) -> Self {
        Self {
            kind: RangeKind::HasElement(Box::new(inner)),
            order: Order::natural(),
        }
    }

    /// A range over record values that matches when the nested record is
    /// accepted by `query`.
    pub fn subquery(query: Query) -> Self {
        Self {
            kind: RangeKind::Subquery(query),
            order: Order::natural(),
        }
    }

    /// Combine a lower and an upper bound into the tightest representable
    /// range: a `Between`, a collapsed `Equals`, or `None` when the bounds
    /// are provably disjoint.
    pub fn between(lower: Range, upper: Range) -> Result<Option<Range>, Error> {
        if !lower.is_lower_bound() || !upper.is_upper_bound() {
            return Err(Error::InvalidConstraint(
                "between requires a greater-than lower bound and a less-than upper bound"
                    .to_string(),
            ));
        }
        lower.intersect(&upper)
    }

    /// Rebuild this range under a different order. `Between` bounds inherit
    /// the order; nested queries and element ranges keep their own.
    pub fn with_order(self, order: Order) -> Self {
        let kind = match self.kind {
            RangeKind::Between(lower, upper) => RangeKind::Between(
                Box::new(lower.with_order(order.clone())),
                Box::new(upper.with_order(order.clone())),
            ),
            kind => kind,
        };
        Self { kind, order }
    }

    #[inline]
    pub fn kind(&self) -> &RangeKind {
        &self.kind
    }

    #[inline]
    pub fn order(&self) -> &Order {
        &self.order
    }

    pub(crate) fn from_parts(kind: RangeKind, order: Order) -> Self {
        Self { kind, order }
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        matches!(self.kind, RangeKind::Unbounded)
    }

    fn is_lower_bound(&self) -> bool {
        matches!(
            self.kind,
            RangeKind::GreaterThan(_) | RangeKind::GreaterThanOrEqual(_)
        )
    }

    fn is_upper_bound(&self) -> bool {
        matches!(
            self.kind,
            RangeKind::LessThan(_) | RangeKind::LessThanOrEqual(_)
        )
    }

    fn bound_value(&self) -> Option<&Value> {
        match &self.kind {
            RangeKind::Equals(value)
            | RangeKind::LessThan(value)
            | RangeKind::LessThanOrEqual(value)
            | RangeKind::GreaterThan(value)
            | RangeKind::GreaterThanOrEqual(value) => Some(value),
            _ => None,
        }
    }

    /// The parameter this single-bound range references, if any.
    pub(crate) fn bound_param(&self) -> Option<&str> {
        self.bound_value().and_then(Value::param_name)
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self.kind {
            RangeKind::HasElement(_) => "has-element",
            RangeKind::Subquery(_) => "subquery",
            _ => "scalar",
        }
    }

    fn mixed(&self, other: &Range) -> Error {
        Error::MixedKinds {
            left: self.kind_label(),
            right: other.kind_label(),
        }
    }

    /// Whether every value accepted by `other` is accepted by `self`.
    ///
    /// Tri-valued: `Unknown` means the answer depends on parameters that are
    /// not bound yet. Mixing element, subquery and scalar ranges is a
    /// structural error.
    pub fn contains(&self, other: &Range) -> Result<TriBool, Error> {
        use RangeKind as K;
        match (&self.kind, &other.kind) {
            (K::Unbounded, _) => Ok(TriBool::True),
            (_, K::Unbounded) => Ok(TriBool::False),
            (K::HasElement(a), K::HasElement(b)) => a.contains(b),
            (K::Subquery(q), K::Subquery(r)) => q.contains(r),
            (K::HasElement(_) | K::Subquery(_), _) | (_, K::HasElement(_) | K::Subquery(_)) => {
                Err(self.mixed(other))
            }
            (K::Intersection(intersection), _) => intersection.contains(other),
            (_, K::Intersection(intersection)) => intersection.contained_by(self),
            (K::Equals(a), K::Equals(b)) => Ok(compare::eq(&self.order, a, b)),
            (K::Equals(_), _) => Ok(TriBool::False),
            (K::Between(lower, upper), _) => Ok(lower.contains(other)? & upper.contains(other)?),
            (K::LessThan(a), K::Equals(b) | K::LessThanOrEqual(b)) => {
                Ok(compare::gt(&self.order, a, b))
            }
            (K::LessThan(a), K::LessThan(b)) => Ok(compare::ge(&self.order, a, b)),
            (K::LessThan(_), K::Between(_, upper)) => self.contains(upper),
            (K::LessThan(_), _) => Ok(TriBool::False),
            (K::LessThanOrEqual(a), K::Equals(b) | K::LessThan(b) | K::LessThanOrEqual(b)) => {
                Ok(compare::ge(&self.order, a, b))
            }
            (K::LessThanOrEqual(_), K::Between(_, upper)) => self.contains(upper),
            (K::LessThanOrEqual(_), _) => Ok(TriBool::False),
            (K::GreaterThan(a), K::Equals(b) | K::GreaterThanOrEqual(b)) => {
                Ok(compare::lt(&self.order, a, b))
            }
            (K::GreaterThan(a), K::GreaterThan(b)) => Ok(compare::le(&self.order, a, b)),
            (K::GreaterThan(_), K::Between(lower, _)) => self.contains(lower),
            (K::GreaterThan(_), _) => Ok(TriBool::False),
            (K::GreaterThanOrEqual(a), K::Equals(b) | K::GreaterThan(b) | K::GreaterThanOrEqual(b)) => {
                Ok(compare::le(&self.order, a, b))
            }
            (K::GreaterThanOrEqual(_), K::Between(lower, _)) => self.contains(lower),
            (K::GreaterThanOrEqual(_), _) => Ok(TriBool::False),
        }
    }

    /// The tightest range accepting exactly the values accepted by both
    /// operands; `None` when the operands are provably disjoint.
    ///
    /// Parametric indecision stays symbolic: same-direction bounds defer
    /// into an [`RangeKind::Intersection`], opposite-direction bounds form a
    /// symbolic `Between`.
    pub fn intersect(&self, other: &Range) -> Result<Option<Range>, Error> {
        use RangeKind as K;
        match (&self.kind, &other.kind) {
            (K::Unbounded, _) => Ok(Some(other.clone())),
            (_, K::Unbounded) => Ok(Some(self.clone())),
            (K::HasElement(a), K::HasElement(b)) => Ok(a
                .intersect(b)?
                .map(|inner| Self::from_parts(K::HasElement(Box::new(inner)), self.order.clone()))),
            (K::Subquery(q), K::Subquery(r)) => {
                let combined = q.and(r)?;
                if combined.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Self::from_parts(K::Subquery(combined), self.order.clone())))
                }
            }
            (K::HasElement(_) | K::Subquery(_), _) | (_, K::HasElement(_) | K::Subquery(_)) => {
                Err(self.mixed(other))
            }
            (K::Intersection(_), _) | (_, K::Intersection(_)) => self.intersect_deferred(other),
            (K::Between(..), _) | (_, K::Between(..)) => self.intersect_between(other),
            (K::Equals(a), K::Equals(b)) => match compare::eq(&self.order, a, b) {
                TriBool::True => Ok(Some(self.clone())),
                TriBool::False => Ok(None),
                TriBool::Unknown => self.intersect_deferred(other),
            },
            (K::Equals(_), _) => match other.contains(self)? {
                TriBool::True => Ok(Some(self.clone())),
                TriBool::False => Ok(None),
                TriBool::Unknown => self.intersect_deferred(other),
            },
            (_, K::Equals(_)) => match self.contains(other)? {
                TriBool::True => Ok(Some(other.clone())),
                TriBool::False => Ok(None),
                TriBool::Unknown => self.intersect_deferred(other),
            },
            (K::LessThan(_) | K::LessThanOrEqual(_), K::LessThan(_) | K::LessThanOrEqual(_)) => {
                self.tighter_upper(other)
            }
            (
                K::GreaterThan(_) | K::GreaterThanOrEqual(_),
                K::GreaterThan(_) | K::GreaterThanOrEqual(_),
            ) => self.tighter_lower(other),
            (
                K::GreaterThan(_) | K::GreaterThanOrEqual(_),
                K::LessThan(_) | K::LessThanOrEqual(_),
            ) => Ok(combine_bounds(self, other)),
            (
                K::LessThan(_) | K::LessThanOrEqual(_),
                K::GreaterThan(_) | K::GreaterThanOrEqual(_),
            ) => Ok(combine_bounds(other, self)),
        }
    }

    // Same-direction upper bounds: keep the tighter; a strict bound wins a
    // tie against an inclusive one.
    fn tighter_upper(&self, other: &Range) -> Result<Option<Range>, Error> {
        use RangeKind as K;
        let (a, b) = match (self.bound_value(), other.bound_value()) {
            (Some(a), Some(b)) => (a, b),
            _ => unreachable!("tighter_upper called on non-bound ranges"),
        };
        let pick_self = match (&self.kind, &other.kind) {
            (K::LessThan(_), K::LessThan(_) | K::LessThanOrEqual(_)) => compare::le(&self.order, a, b),
            (K::LessThanOrEqual(_), K::LessThan(_)) => !compare::ge(&self.order, a, b),
            (K::LessThanOrEqual(_), K::LessThanOrEqual(_)) => compare::le(&self.order, a, b),
            _ => unreachable!("tighter_upper called on non-upper bounds"),
        };
        match pick_self {
            TriBool::True => Ok(Some(self.clone())),
            TriBool::False => Ok(Some(other.clone())),
            TriBool::Unknown => self.intersect_deferred(other),
        }
    }

    // Same-direction lower bounds: keep the tighter; strict wins ties.
    fn tighter_lower(&self, other: &Range) -> Result<Option<Range>, Error> {
        use RangeKind as K;
        let (a, b) = match (self.bound_value(), other.bound_value()) {
            (Some(a), Some(b)) => (a, b),
            _ => unreachable!("tighter_lower called on non-bound ranges"),
        };
        let pick_self = match (&self.kind, &other.kind) {
            (K::GreaterThan(_), K::GreaterThan(_) | K::GreaterThanOrEqual(_)) => {
                compare::ge(&self.order, a, b)
            }
            (K::GreaterThanOrEqual(_), K::GreaterThan(_)) => !compare::le(&self.order, a, b),
            (K::GreaterThanOrEqual(_), K::GreaterThanOrEqual(_)) => compare::ge(&self.order, a, b),
            _ => unreachable!("tighter_lower called on non-lower bounds"),
        };
        match pick_self {
            TriBool::True => Ok(Some(self.clone())),
            TriBool::False => Ok(Some(other.clone())),
            TriBool::Unknown => self.intersect_deferred(other),
        }
    }

    // At least one operand is a `Between`; both are scalar.
    fn intersect_between(&self, other: &Range) -> Result<Option<Range>, Error> {
        use RangeKind as K;
        match (&self.kind, &other.kind) {
            (K::Between(lower_a, upper_a), K::Between(lower_b, upper_b)) => {
                let lower = match lower_a.intersect(lower_b)? {
                    Some(lower) => lower,
                    None => return Ok(None),
                };
                let upper = match upper_a.intersect(upper_b)? {
                    Some(upper) => upper,
                    None => return Ok(None),
                };
                self.recombine(lower, upper, &[lower_a, upper_a, lower_b, upper_b].map(Box::as_ref))
            }
            (K::Between(..), K::Equals(_)) => match self.contains(other)? {
                TriBool::True => Ok(Some(other.clone())),
                TriBool::False => Ok(None),
                TriBool::Unknown => self.intersect_deferred(other),
            },
            (K::Equals(_), K::Between(..)) => other.intersect_between(self),
            (K::Between(lower, upper), _) if other.is_upper_bound() => {
                let tightened = match upper.tighter_upper(other)? {
                    Some(upper) => upper,
                    None => return Ok(None),
                };
                self.recombine((**lower).clone(), tightened, &[lower.as_ref(), upper.as_ref(), other])
            }
            (K::Between(lower, upper), _) if other.is_lower_bound() => {
                let tightened = match lower.tighter_lower(other)? {
                    Some(lower) => lower,
                    None => return Ok(None),
                };
                self.recombine(tightened, (**upper).clone(), &[lower.as_ref(), upper.as_ref(), other])
            }
            (_, K::Between(..)) => other.intersect_between(self),
            _ => unreachable!("intersect_between called without a between operand"),
        }
    }

    // Recombine tightened bounds into a `Between` when both stayed simple;
    // when a parametric merge deferred, fall back to an intersection node
    // over the original members.
    fn recombine(
        &self,
        lower: Range,
        upper: Range,
        members: &[&Range],
    ) -> Result<Option<Range>, Error> {
        if lower.is_lower_bound() && upper.is_upper_bound() {
            Ok(combine_bounds(&lower, &upper))
        } else {
            self.fold_members(members)
        }
    }

    fn intersect_deferred(&self, other: &Range) -> Result<Option<Range>, Error> {
        self.fold_members(&[self, other])
    }

    fn fold_members(&self, members: &[&Range]) -> Result<Option<Range>, Error> {
        let mut intersection = Intersection::new();
        for member in members {
            intersection = match intersection.add_range(member)? {
                Some(intersection) => intersection,
                None => return Ok(None),
            };
        }
        Ok(Some(intersection.simplify(self.order.clone())))
    }

    /// Tri-valued structural equality: same variant, same order (by name),
    /// same bounds under the tri-valued comparator.
    pub fn equals(&self, other: &Range) -> TriBool {
        use RangeKind as K;
        if self.order != other.order {
            return TriBool::False;
        }
        match (&self.kind, &other.kind) {
            (K::Unbounded, K::Unbounded) => TriBool::True,
            (K::Equals(a), K::Equals(b))
            | (K::LessThan(a), K::LessThan(b))
            | (K::LessThanOrEqual(a), K::LessThanOrEqual(b))
            | (K::GreaterThan(a), K::GreaterThan(b))
            | (K::GreaterThanOrEqual(a), K::GreaterThanOrEqual(b)) => {
                compare::eq(&self.order, a, b)
            }
            (K::Between(lower_a, upper_a), K::Between(lower_b, upper_b)) => {
                lower_a.equals(lower_b) & upper_a.equals(upper_b)
            }
            (K::Intersection(a), K::Intersection(b)) => a.equals(b),
            (K::HasElement(a), K::HasElement(b)) => a.equals(b),
            (K::Subquery(q), K::Subquery(r)) => q.equals(r),
            _ => TriBool::False,
        }
    }

    /// Whether a concrete item value is accepted by this range.
    ///
    /// Parametric bounds yield `Unknown`; a value of the wrong shape (a
    /// scalar where a collection is needed, and so on) yields `False`.
    pub fn contains_item(&self, item: &serde_json::Value) -> TriBool {
        match &self.kind {
            RangeKind::Unbounded => TriBool::True,
            RangeKind::Equals(bound) => self.compare_item(item, |order, item_value| {
                compare::eq(order, item_value, bound)
            }),
            RangeKind::LessThan(bound) => self.compare_item(item, |order, item_value| {
                compare::lt(order, item_value, bound)
            }),
            RangeKind::LessThanOrEqual(bound) => self.compare_item(item, |order, item_value| {
                compare::le(order, item_value, bound)
            }),
            RangeKind::GreaterThan(bound) => self.compare_item(item, |order, item_value| {
                compare::gt(order, item_value, bound)
            }),
            RangeKind::GreaterThanOrEqual(bound) => self.compare_item(item, |order, item_value| {
                compare::ge(order, item_value, bound)
            }),
            RangeKind::Between(lower, upper) => {
                lower.contains_item(item) & upper.contains_item(item)
            }
            RangeKind::Intersection(intersection) => intersection.contains_item(item),
            RangeKind::HasElement(inner) => match item.as_array() {
                Some(elements) => {
                    TriBool::any(elements.iter().map(|element| inner.contains_item(element)))
                }
                None => TriBool::False,
            },
            RangeKind::Subquery(query) => {
                if item.is_object() {
                    query.contains_item(item)
                } else {
                    TriBool::False
                }
            }
        }
    }

    fn compare_item<F>(&self, item: &serde_json::Value, check: F) -> TriBool
    where
        F: FnOnce(&Order, &Value) -> TriBool,
    {
        match json::scalar_value(item) {
            Some(item_value) => check(&self.order, &item_value),
            None => TriBool::False,
        }
    }

    /// Substitute bound parameters with the concrete values in `env`.
    ///
    /// `None` means the range became unsatisfiable under the binding.
    /// Unreferenced parameters stay symbolic.
    pub fn bind(&self, env: &Bindings) -> Result<Option<Range>, Error> {
        match &self.kind {
            RangeKind::Unbounded => Ok(Some(self.clone())),
            RangeKind::Equals(_)
            | RangeKind::LessThan(_)
            | RangeKind::LessThanOrEqual(_)
            | RangeKind::GreaterThan(_)
            | RangeKind::GreaterThanOrEqual(_) => Ok(Some(self.bind_bound(env))),
            RangeKind::Between(lower, upper) => {
                let lower = lower.bind_bound(env);
                let upper = upper.bind_bound(env);
                lower.intersect(&upper)
            }
            RangeKind::Intersection(intersection) => intersection.bind(env),
            RangeKind::HasElement(inner) => Ok(inner
                .bind(env)?
                .map(|inner| Self::from_parts(RangeKind::HasElement(Box::new(inner)), self.order.clone()))),
            RangeKind::Subquery(query) => Ok(query
                .bind(env)?
                .map(|query| Self::from_parts(RangeKind::Subquery(query), self.order.clone()))),
        }
    }

    // Substitution for the single-bound variants; never empties on its own.
    fn bind_bound(&self, env: &Bindings) -> Range {
        let subst = |value: &Value| match value.param_name().and_then(|name| env.get(name)) {
            Some(bound) => bound.clone(),
            None => value.clone(),
        };
        let kind = match &self.kind {
            RangeKind::Equals(value) => RangeKind::Equals(subst(value)),
            RangeKind::LessThan(value) => RangeKind::LessThan(subst(value)),
            RangeKind::LessThanOrEqual(value) => RangeKind::LessThanOrEqual(subst(value)),
            RangeKind::GreaterThan(value) => RangeKind::GreaterThan(subst(value)),
            RangeKind::GreaterThanOrEqual(value) => RangeKind::GreaterThanOrEqual(subst(value)),
            _ => unreachable!("bind_bound called on a non-bound range"),
        };
        Self::from_parts(kind, self.order.clone())
    }

    /// Render this range as a constraint on `dimension` through a formatter.
    pub fn to_expression(
        &self,
        dimension: &str,
        formatter: &dyn ExpressionFormatter,
        context: &ExprContext,
    ) -> String {
        match &self.kind {
            RangeKind::Unbounded => String::new(),
            RangeKind::Equals(value) => {
                formatter.oper_expr(dimension, Operator::Equal, &Operand::Value(value), context)
            }
            RangeKind::LessThan(value) => {
                formatter.oper_expr(dimension, Operator::LessThan, &Operand::Value(value), context)
            }
            RangeKind::LessThanOrEqual(value) => formatter.oper_expr(
                dimension,
                Operator::LessThanOrEqual,
                &Operand::Value(value),
                context,
            ),
            RangeKind::GreaterThan(value) => formatter.oper_expr(
                dimension,
                Operator::GreaterThan,
                &Operand::Value(value),
                context,
            ),
            RangeKind::GreaterThanOrEqual(value) => formatter.oper_expr(
                dimension,
                Operator::GreaterThanOrEqual,
                &Operand::Value(value),
                context,
            ),
            RangeKind::Between(lower, upper) => formatter.and_expr(&[
                lower.to_expression(dimension, formatter, context),
                upper.to_expression(dimension, formatter, context),
            ]),
            RangeKind::Intersection(intersection) => {
                let parts = intersection
                    .members()
                    .map(|member| member.to_expression(dimension, formatter, context))
                    .collect_vec();
                formatter.and_expr(&parts)
            }
            RangeKind::HasElement(inner) => match inner.kind() {
                RangeKind::Intersection(intersection) => {
                    let parts = intersection
                        .members()
                        .map(|member| has_expression(member, dimension, formatter, context))
                        .collect_vec();
                    formatter.and_expr(&parts)
                }
                _ => has_expression(inner, dimension, formatter, context),
            },
            RangeKind::Subquery(query) => {
                let inner = query.to_expression_with(formatter, &context.child(dimension));
                formatter.oper_expr(dimension, Operator::Contains, &Operand::Expression(inner), context)
            }
        }
    }
}

fn has_expression(
    inner: &Range,
    dimension: &str,
    formatter: &dyn ExpressionFormatter,
    context: &ExprContext,
) -> String {
    let element = inner.to_expression(dimension, formatter, &ExprContext::root());
    formatter.oper_expr(dimension, Operator::Has, &Operand::Expression(element), context)
}

// The tightest combination of a lower and an upper bound. `None` when the
// bounds are provably disjoint; parametric indecision yields a symbolic
// `Between` (an equal-valued inclusive pair collapses to `Equals` first).
fn combine_bounds(lower: &Range, upper: &Range) -> Option<Range> {
    let order = lower.order().clone();
    let (lower_value, upper_value) = match (lower.bound_value(), upper.bound_value()) {
        (Some(lower_value), Some(upper_value)) => (lower_value, upper_value),
        _ => unreachable!("combine_bounds called on non-bound ranges"),
    };
    if matches!(lower.kind(), RangeKind::GreaterThanOrEqual(_))
        && matches!(upper.kind(), RangeKind::LessThanOrEqual(_))
        && compare::eq(&order, lower_value, upper_value).is_true()
    {
        return Some(Range::from_parts(RangeKind::Equals(lower_value.clone()), order));
    }
    match compare::lt(&order, lower_value, upper_value) {
        TriBool::False => None,
        TriBool::True | TriBool::Unknown => Some(Range::from_parts(
            RangeKind::Between(Box::new(lower.clone()), Box::new(upper.clone())),
            order,
        )),
    }
}

/// A deferred conjunction of scalar ranges: one non-parametric bound
/// (`known`, `Unbounded` until a concrete range contributes) plus at most
/// one bound per parameter name.
#[derive(Clone, PartialEq, Debug)]
pub struct Intersection {
    known: Box<Range>,
    by_param: BTreeMap<String, Range>,
}

impl Intersection {
    fn new() -> Self {
        Self {
            known: Box::new(Range::unbounded()),
            by_param: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn known(&self) -> &Range {
        &self.known
    }

    #[inline]
    pub fn by_param(&self) -> &BTreeMap<String, Range> {
        &self.by_param
    }

    /// The contributing bounds: `known` (when constrained) followed by the
    /// per-parameter bounds in name order.
    pub fn members(&self) -> impl Iterator<Item = &Range> {
        let known = (!self.known.is_unbounded()).then_some(&*self.known);
        known.into_iter().chain(self.by_param.values())
    }

    /// Fold one more range into the conjunction. Adding `Unbounded` is a
    /// no-op; a `Between` decomposes into its bounds; a sub-intersection
    /// that empties collapses the whole conjunction to `None`.
    fn add_range(mut self, range: &Range) -> Result<Option<Self>, Error> {
        match range.kind() {
            RangeKind::Unbounded => Ok(Some(self)),
            RangeKind::Between(lower, upper) => match self.add_range(lower)? {
                Some(intersection) => intersection.add_range(upper),
                None => Ok(None),
            },
            RangeKind::Intersection(other) => {
                let mut current = self;
                for member in other.members() {
                    current = match current.add_range(member)? {
                        Some(current) => current,
                        None => return Ok(None),
                    };
                }
                Ok(Some(current))
            }
            RangeKind::HasElement(_) | RangeKind::Subquery(_) => Err(Error::MixedKinds {
                left: "scalar",
                right: range.kind_label(),
            }),
            _ => match range.bound_param() {
                Some(name) => match self.by_param.remove(name) {
                    None => {
                        self.by_param.insert(name.to_string(), range.clone());
                        Ok(Some(self))
                    }
                    Some(existing) => match existing.intersect(range)? {
                        Some(merged) => {
                            self.by_param.insert(name.to_string(), merged);
                            Ok(Some(self))
                        }
                        None => Ok(None),
                    },
                },
                None => match self.known.intersect(range)? {
                    Some(merged) => {
                        self.known = Box::new(merged);
                        Ok(Some(self))
                    }
                    None => Ok(None),
                },
            },
        }
    }

    // A conjunction with a single contributing bound is that bound.
    fn simplify(self, order: Order) -> Range {
        if self.by_param.is_empty() {
            return *self.known;
        }
        if self.known.is_unbounded() && self.by_param.len() == 1 {
            let (_, bound) = match self.by_param.into_iter().next() {
                Some(entry) => entry,
                None => unreachable!("single-entry map had no entry"),
            };
            return bound;
        }
        Range::from_parts(RangeKind::Intersection(self), order)
    }

    // Containment of `other` by the conjunction: every member must contain
    // it; `False` dominates `Unknown`.
    fn contains(&self, other: &Range) -> Result<TriBool, Error> {
        let mut result = self.known.contains(other)?;
        for bound in self.by_param.values() {
            if result.is_false() {
                return Ok(TriBool::False);
            }
            result = result & bound.contains(other)?;
        }
        Ok(result)
    }

    // Containment of the conjunction by `container`: the conjunction is a
    // subset of each of its members, so one contained member suffices;
    // `False` requires every member to fail.
    fn contained_by(&self, container: &Range) -> Result<TriBool, Error> {
        let mut any_unknown = false;
        for member in std::iter::once(&*self.known).chain(self.by_param.values()) {
            match container.contains(member)? {
                TriBool::True => return Ok(TriBool::True),
                TriBool::Unknown => any_unknown = true,
                TriBool::False => {}
            }
        }
        if any_unknown {
            Ok(TriBool::Unknown)
        } else {
            Ok(TriBool::False)
        }
    }

    fn contains_item(&self, item: &serde_json::Value) -> TriBool {
        let members = std::iter::once(&*self.known).chain(self.by_param.values());
        TriBool::all(members.map(|member| member.contains_item(item)))
    }

    // Structural equality: `known` plus order-independent equality of the
    // parameter-keyed map.
    fn equals(&self, other: &Self) -> TriBool {
        if !self.by_param.keys().eq(other.by_param.keys()) {
            return TriBool::False;
        }
        let bounds = self
            .by_param
            .values()
            .zip(other.by_param.values())
            .map(|(a, b)| a.equals(b));
        self.known.equals(&other.known) & TriBool::all(bounds)
    }

    // Rebuild by intersecting the bound `known` with each bound parametric
    // range; an empty intermediate empties the whole conjunction.
    fn bind(&self, env: &Bindings) -> Result<Option<Range>, Error> {
        let mut result = (*self.known).clone();
        for bound in self.by_param.values() {
            let bound = bound.bind_bound(env);
            result = match result.intersect(&bound)? {
                Some(result) => result,
                None => return Ok(None),
            };
        }
        Ok(Some(result))
    }
}

impl Display for Range {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.to_json())
    }
}

impl From<Value> for Range {
    fn from(value: Value) -> Self {
        Self::equal_to(value)
    }
}

impl From<bool> for Range {
    fn from(value: bool) -> Self {
        Self::equal_to(value)
    }
}

impl From<i64> for Range {
    fn from(value: i64) -> Self {
        Self::equal_to(value)
    }
}

impl From<i32> for Range {
    fn from(value: i32) -> Self {
        Self::equal_to(value)
    }
}

impl From<rust_decimal::Decimal> for Range {
    fn from(value: rust_decimal::Decimal) -> Self {
        Self::equal_to(value)
    }
}

impl From<&str> for Range {
    fn from(value: &str) -> Self {
        Self::equal_to(value)
    }
}

impl From<crate::value::Parameter> for Range {
    fn from(parameter: crate::value::Parameter) -> Self {
        Self::equal_to(parameter)
    }
}

impl From<Query> for Range {
    fn from(query: Query) -> Self {
        Self::subquery(query)
    }
}
