//! An abstract query algebra: build, compose, simplify, compare and render
//! structured predicates over record-like data without binding to any
//! storage backend.
//!
//! Predicates are kept in disjunctive normal form: a [`Query`] is an ordered
//! disjunction of [`Cube`]s, and a cube is a conjunction of per-dimension
//! [`Range`]s. Composition goes through [`Query::or`] (with absorption) and
//! [`Query::and`] (by distribution); rendering factors out shared
//! constraints first and then emits through a pluggable
//! [`ExpressionFormatter`].
//!
//! # Examples
//!
//! Composing and rendering a predicate:
//!
//! ```rust
//! use cube_algebra::Query;
//! use serde_json::json;
//!
//! let query = Query::from_json(&json!({"x": [null, 2], "y": 4}))
//!     .unwrap()
//!     .and(&Query::from_json(&json!({"z": 5})).unwrap())
//!     .unwrap()
//!     .or(&Query::from_json(&json!({"x": [6, 8], "y": 3, "z": 99})).unwrap())
//!     .unwrap();
//!
//! assert_eq!(
//!     "(x<2 and y=4 and z=5 or x>=6 and x<8 and y=3 and z=99)",
//!     query.to_expression_default()
//! );
//! ```
//!
//! Late-bound parameters and the tri-valued logic around them:
//!
//! ```rust
//! use cube_algebra::{Bindings, Query, TriBool};
//! use serde_json::json;
//!
//! let query = Query::from_json(&json!({"age": [{"$": "min_age"}, null]})).unwrap();
//!
//! // Before binding, matching an item cannot be decided.
//! assert_eq!(TriBool::Unknown, query.contains_item(&json!({"age": 30})));
//!
//! // Binding substitutes the parameter and the answer becomes concrete.
//! let bound = query
//!     .bind(&Bindings::new().with_integer("min_age", 27))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(TriBool::True, bound.contains_item(&json!({"age": 30})));
//! assert_eq!(TriBool::False, bound.contains_item(&json!({"age": 20})));
//! ```
//!
//! Matching records with the per-item predicate:
//!
//! ```rust
//! use cube_algebra::Query;
//! use serde_json::json;
//!
//! let query = Query::from_json(&json!({"country": "CA", "score": [50, null]})).unwrap();
//! let matches = query.predicate();
//!
//! let records = vec![
//!     json!({"country": "CA", "score": 80}),
//!     json!({"country": "US", "score": 80}),
//!     json!({"country": "CA", "score": 10}),
//! ];
//! let hits: Vec<_> = records.iter().filter(|r| matches(r).is_true()).collect();
//! assert_eq!(1, hits.len());
//! ```
//!
//! # Constraint grammar
//!
//! [`Query::from_json`] and [`Range::from_json`] accept a compact sugar:
//!
//! * a scalar is an equality constraint, `{"$": "name"}` a parametric one;
//! * `[a, b]` is a lower-inclusive, upper-exclusive range, with `null` for
//!   an unbounded side and operator objects (`{">": a}`) for other bounds;
//! * `{"<": v}`, `{"<=": v}`, `{">": v}`, `{">=": v}` and `{"=": v}` are
//!   single bounds, `{"$and": [..]}` folds ranges by intersection;
//! * `{"$has": inner}` matches collections containing a matching element;
//! * any other object is a nested record matched through a subquery.
//!
//! The same shapes are what [`Query::to_json`] emits, so constraints round-
//! trip losslessly, parameters included.

mod bind;
mod compare;
mod cube;
mod error;
mod expression;
mod json;
mod query;
mod range;
#[cfg(test)]
mod test_utils;
mod value;

pub use crate::{
    bind::Bindings,
    compare::TriBool,
    cube::Cube,
    error::Error,
    expression::{DefaultFormatter, ExprContext, ExpressionFormatter, Operand, Operator},
    query::{Factored, Query},
    range::{Intersection, Range, RangeKind},
    value::{Order, OrderRegistry, Parameter, Value},
};
