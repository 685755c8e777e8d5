use crate::{
    bind::Bindings,
    compare::TriBool,
    error::Error,
    expression::{ExprContext, ExpressionFormatter},
    range::Range,
};
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

/// A conjunction of per-dimension ranges: one product term of a
/// [`crate::Query`].
///
/// Dimension order carries no meaning; a missing dimension is equivalent to
/// an unbounded range on it.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Cube {
    ranges: BTreeMap<String, Range>,
}

impl Cube {
    pub fn new() -> Self {
        Self {
            ranges: BTreeMap::new(),
        }
    }

    /// Add a constraint on a dimension, replacing any previous one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cube_algebra::{Cube, Range};
    ///
    /// let cube = Cube::new()
    ///     .with("x", Range::less_than(2))
    ///     .with("y", 4);
    /// assert_eq!(2, cube.len());
    /// ```
    pub fn with(mut self, dimension: &str, range: impl Into<Range>) -> Self {
        self.ranges.insert(dimension.to_string(), range.into());
        self
    }

    #[inline]
    pub fn get(&self, dimension: &str) -> Option<&Range> {
        self.ranges.get(dimension)
    }

    /// The constrained dimensions with their ranges, in name order.
    pub fn dimensions(&self) -> impl Iterator<Item = (&str, &Range)> {
        self.ranges.iter().map(|(name, range)| (name.as_str(), range))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// An unconstrained cube accepts every record.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether every record accepted by `other` is accepted by `self`.
    ///
    /// A dimension missing from `other` is unbounded there, so a cube that
    /// constrains it cannot contain `other`.
    pub fn contains(&self, other: &Cube) -> Result<TriBool, Error> {
        let unbounded = Range::unbounded();
        let mut result = TriBool::True;
        for (dimension, range) in &self.ranges {
            let other_range = other.get(dimension).unwrap_or(&unbounded);
            result = result & range.contains(other_range)?;
            if result.is_false() {
                return Ok(TriBool::False);
            }
        }
        Ok(result)
    }

    /// Whether a record is accepted: every constrained dimension must be
    /// present and its field accepted by the range. Missing fields fail.
    pub fn contains_item(&self, item: &serde_json::Value) -> TriBool {
        if self.ranges.is_empty() {
            return TriBool::True;
        }
        let mut result = TriBool::True;
        for (dimension, range) in &self.ranges {
            let field = match item.get(dimension) {
                Some(field) => field,
                None => return TriBool::False,
            };
            result = result & range.contains_item(field);
            if result.is_false() {
                return TriBool::False;
            }
        }
        result
    }

    /// The conjunction of two cubes: the union of their dimensions, shared
    /// dimensions intersected. `None` when any dimension empties.
    pub fn intersect(&self, other: &Cube) -> Result<Option<Cube>, Error> {
        let mut ranges = self.ranges.clone();
        for (dimension, range) in &other.ranges {
            let merged = match ranges.get(dimension) {
                Some(existing) => match existing.intersect(range)? {
                    Some(merged) => merged,
                    None => return Ok(None),
                },
                None => range.clone(),
            };
            ranges.insert(dimension.clone(), merged);
        }
        Ok(Some(Self { ranges }))
    }

    /// Tri-valued equality: the same dimensions, pairwise equal ranges.
    pub fn equals(&self, other: &Cube) -> TriBool {
        if !self.ranges.keys().eq(other.ranges.keys()) {
            return TriBool::False;
        }
        TriBool::all(
            self.ranges
                .values()
                .zip(other.ranges.values())
                .map(|(a, b)| a.equals(b)),
        )
    }

    /// Remove the dimensions constrained by `factor`, provided this cube's
    /// range on each of them equals the factor's. The error is the signal
    /// callers use to partition a query into factored and remainder parts.
    pub fn remove_constraints(&self, factor: &Cube) -> Result<Cube, Error> {
        let mut ranges = self.ranges.clone();
        for (dimension, factor_range) in &factor.ranges {
            match ranges.get(dimension) {
                Some(range) if range.equals(factor_range).is_true() => {
                    ranges.remove(dimension);
                }
                _ => return Err(Error::ConstraintMismatch(dimension.clone())),
            }
        }
        Ok(Self { ranges })
    }

    /// Bind parameters in every range; `None` when any dimension becomes
    /// unsatisfiable.
    pub fn bind(&self, env: &Bindings) -> Result<Option<Cube>, Error> {
        let mut ranges = BTreeMap::new();
        for (dimension, range) in &self.ranges {
            match range.bind(env)? {
                Some(bound) => {
                    ranges.insert(dimension.clone(), bound);
                }
                None => return Ok(None),
            }
        }
        Ok(Some(Self { ranges }))
    }

    /// Render the conjunction of this cube's constraints through a
    /// formatter, skipping unbounded dimensions.
    pub fn to_expression(
        &self,
        formatter: &dyn ExpressionFormatter,
        context: &ExprContext,
    ) -> String {
        let parts = self
            .ranges
            .iter()
            .map(|(dimension, range)| range.to_expression(dimension, formatter, context))
            .filter(|part| !part.is_empty())
            .collect_vec();
        formatter.and_expr(&parts)
    }
}

impl Display for Cube {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ranges::{equal, greater_than_or_equal, less_than, param};
    use serde_json::json;

    fn a_cube() -> Cube {
        Cube::new()
            .with("x", less_than!(2))
            .with("y", 4)
    }

    #[test]
    fn a_cube_contains_itself() {
        let cube = a_cube();

        assert_eq!(TriBool::True, cube.contains(&cube).unwrap());
        assert_eq!(TriBool::True, cube.equals(&cube));
    }

    #[test]
    fn a_looser_cube_contains_a_tighter_one() {
        let loose = Cube::new().with("x", less_than!(9));
        let tight = Cube::new().with("x", less_than!(2)).with("y", 4);

        assert_eq!(TriBool::True, loose.contains(&tight).unwrap());
        assert_eq!(TriBool::False, tight.contains(&loose).unwrap());
    }

    #[test]
    fn a_cube_cannot_contain_one_that_leaves_a_dimension_free() {
        let constrained = Cube::new().with("x", less_than!(2)).with("y", 4);
        let free = Cube::new().with("x", less_than!(2));

        assert_eq!(TriBool::False, constrained.contains(&free).unwrap());
    }

    #[test]
    fn containment_is_unknown_when_a_dimension_is_parametric() {
        let parametric = Cube::new().with("x", less_than!(param!("p")));
        let concrete = Cube::new().with("x", less_than!(2));

        assert_eq!(TriBool::Unknown, parametric.contains(&concrete).unwrap());
    }

    #[test]
    fn intersecting_cubes_unions_their_dimensions() {
        let left = Cube::new().with("x", less_than!(2));
        let right = Cube::new().with("y", 4);

        let result = left.intersect(&right).unwrap().unwrap();

        assert_eq!(TriBool::True, a_cube().equals(&result));
    }

    #[test]
    fn intersecting_cubes_with_a_disjoint_dimension_is_empty() {
        let left = Cube::new().with("x", equal!(1));
        let right = Cube::new().with("x", equal!(2)).with("y", 4);

        assert_eq!(None, left.intersect(&right).unwrap());
    }

    #[test]
    fn cubes_are_equal_regardless_of_insertion_order() {
        let forward = Cube::new().with("x", 1).with("y", 2);
        let backward = Cube::new().with("y", 2).with("x", 1);

        assert_eq!(TriBool::True, forward.equals(&backward));
    }

    #[test]
    fn cubes_with_different_dimensions_are_not_equal() {
        let left = Cube::new().with("x", 1);
        let right = Cube::new().with("x", 1).with("y", 2);

        assert_eq!(TriBool::False, left.equals(&right));
    }

    #[test]
    fn can_remove_a_matching_constraint() {
        let cube = Cube::new().with("x", 2).with("y", 3);
        let factor = Cube::new().with("x", 2);

        let removed = cube.remove_constraints(&factor).unwrap();

        assert_eq!(TriBool::True, Cube::new().with("y", 3).equals(&removed));
    }

    #[test]
    fn return_an_error_when_removing_a_mismatched_constraint() {
        let cube = Cube::new().with("x", 2).with("y", 3);
        let factor = Cube::new().with("x", 5);

        assert_eq!(
            Err(Error::ConstraintMismatch("x".to_string())),
            cube.remove_constraints(&factor)
        );
    }

    #[test]
    fn return_an_error_when_removing_an_absent_dimension() {
        let cube = Cube::new().with("y", 3);
        let factor = Cube::new().with("x", 2);

        assert!(cube.remove_constraints(&factor).is_err());
    }

    #[test]
    fn parametric_constraints_only_factor_under_the_same_name() {
        let cube = Cube::new().with("x", equal!(param!("p")));
        let same = Cube::new().with("x", equal!(param!("p")));
        let different = Cube::new().with("x", equal!(param!("q")));

        assert!(cube.remove_constraints(&same).is_ok());
        assert!(cube.remove_constraints(&different).is_err());
    }

    #[test]
    fn a_record_matches_when_every_dimension_accepts_its_field() {
        let cube = a_cube();

        assert_eq!(TriBool::True, cube.contains_item(&json!({"x": 1, "y": 4})));
        assert_eq!(TriBool::False, cube.contains_item(&json!({"x": 3, "y": 4})));
        assert_eq!(TriBool::False, cube.contains_item(&json!({"x": 1, "y": 5})));
    }

    #[test]
    fn a_record_with_a_missing_field_does_not_match() {
        let cube = a_cube();

        assert_eq!(TriBool::False, cube.contains_item(&json!({"x": 1})));
    }

    #[test]
    fn an_unconstrained_cube_matches_everything() {
        assert_eq!(TriBool::True, Cube::new().contains_item(&json!({"x": 1})));
        assert_eq!(TriBool::True, Cube::new().contains_item(&json!(3)));
    }

    #[test]
    fn a_parametric_dimension_matches_as_unknown() {
        let cube = Cube::new().with("x", equal!(param!("p")));

        assert_eq!(TriBool::Unknown, cube.contains_item(&json!({"x": 1})));
    }

    #[test]
    fn binding_replaces_parameters_in_every_dimension() {
        let env = Bindings::new().with("min", 2);
        let cube = Cube::new()
            .with("age", greater_than_or_equal!(param!("min")))
            .with("name", "ada");

        let bound = cube.bind(&env).unwrap().unwrap();

        let expected = Cube::new()
            .with("age", greater_than_or_equal!(2))
            .with("name", "ada");
        assert_eq!(TriBool::True, expected.equals(&bound));
    }

    #[test]
    fn binding_drops_the_cube_when_a_dimension_empties() {
        let env = Bindings::new().with("p", 9);
        let cube = Cube::new().with("x", less_than!(2).intersect(&equal!(param!("p"))).unwrap().unwrap());

        assert_eq!(None, cube.bind(&env).unwrap());
    }
}
