use crate::{
    bind::Bindings,
    compare::TriBool,
    cube::Cube,
    error::Error,
    expression::{DefaultFormatter, ExprContext, ExpressionFormatter},
    range::Range,
};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// An ordered disjunction of [`Cube`]s: the canonical disjunctive normal
/// form of a predicate.
///
/// Insertion order is preserved modulo absorption but carries no meaning:
/// two queries are equal when their cube multisets are equal.
///
/// # Examples
///
/// ```rust
/// use cube_algebra::Query;
/// use serde_json::json;
///
/// let query = Query::from_json(&json!({"x": [null, 2], "y": 4}))
///     .unwrap()
///     .and(&Query::from_json(&json!({"z": 5})).unwrap())
///     .unwrap();
/// assert_eq!("x<2 and y=4 and z=5", query.to_expression_default());
/// ```
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Query {
    union: Vec<Cube>,
}

/// The two halves produced by [`Query::factor`]: the cubes that gave up the
/// factor and the cubes that did not carry it.
#[derive(Clone, PartialEq, Debug)]
pub struct Factored {
    pub factored: Option<Query>,
    pub remainder: Option<Query>,
}

impl Query {
    /// A query holding a single cube.
    pub fn from_cube(cube: Cube) -> Self {
        Self { union: vec![cube] }
    }

    pub(crate) fn from_cubes(union: Vec<Cube>) -> Self {
        Self { union }
    }

    /// The cubes of the disjunction, in insertion order.
    #[inline]
    pub fn union(&self) -> &[Cube] {
        &self.union
    }

    /// An empty union accepts nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.union.is_empty()
    }

    /// Disjunction with absorption: an incoming cube already contained by an
    /// existing cube is dropped; an incoming cube containing existing cubes
    /// replaces the first of them and drops the rest; otherwise it appends.
    pub fn or(&self, other: &Query) -> Result<Query, Error> {
        let mut union = self.union.clone();
        'incoming: for cube in &other.union {
            for existing in &union {
                if existing.contains(cube)?.is_true() {
                    continue 'incoming;
                }
            }
            let mut kept = Vec::with_capacity(union.len() + 1);
            let mut replaced = false;
            for existing in union {
                if cube.contains(&existing)?.is_true() {
                    if !replaced {
                        kept.push(cube.clone());
                        replaced = true;
                    }
                } else {
                    kept.push(existing);
                }
            }
            if !replaced {
                kept.push(cube.clone());
            }
            union = kept;
        }
        Ok(Self { union })
    }

    /// Conjunction by distribution over the disjunction: the result unions
    /// every non-empty pairwise cube intersection. The union may come out
    /// empty (an unsatisfiable query).
    pub fn and(&self, other: &Query) -> Result<Query, Error> {
        let mut union = Vec::new();
        for left in &self.union {
            for right in &other.union {
                if let Some(cube) = left.intersect(right)? {
                    union.push(cube);
                }
            }
        }
        Ok(Self { union })
    }

    /// Whether every record accepted by `other` is accepted by `self`: each
    /// of the argument's cubes needs a containing witness among this
    /// query's cubes.
    pub fn contains(&self, other: &Query) -> Result<TriBool, Error> {
        let mut result = TriBool::True;
        for cube in &other.union {
            let mut witness = TriBool::False;
            for candidate in &self.union {
                witness = witness | candidate.contains(cube)?;
                if witness.is_true() {
                    break;
                }
            }
            result = result & witness;
            if result.is_false() {
                return Ok(TriBool::False);
            }
        }
        Ok(result)
    }

    /// Whether any cube accepts the record; `Unknown` when none accepts but
    /// some are indeterminate.
    pub fn contains_item(&self, item: &serde_json::Value) -> TriBool {
        TriBool::any(self.union.iter().map(|cube| cube.contains_item(item)))
    }

    /// The per-item predicate, suitable for external filter operations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cube_algebra::Query;
    /// use serde_json::json;
    ///
    /// let query = Query::from_json(&json!({"x": [2, 5]})).unwrap();
    /// let matches = query.predicate();
    /// let hits: Vec<_> = [json!({"x": 1}), json!({"x": 3}), json!({"x": 4})]
    ///     .iter()
    ///     .filter(|item| matches(item).is_true())
    ///     .cloned()
    ///     .collect();
    /// assert_eq!(vec![json!({"x": 3}), json!({"x": 4})], hits);
    /// ```
    pub fn predicate(&self) -> impl Fn(&serde_json::Value) -> TriBool + '_ {
        move |item| self.contains_item(item)
    }

    /// Cube-multiset equality: every cube here must match exactly one cube
    /// of the argument, and none may be left over.
    pub fn equals(&self, other: &Query) -> TriBool {
        if self.union.len() != other.union.len() {
            return TriBool::False;
        }
        let mut remaining: Vec<&Cube> = other.union.iter().collect();
        let mut any_unknown = false;
        for cube in &self.union {
            if let Some(position) = remaining.iter().position(|c| cube.equals(c).is_true()) {
                remaining.remove(position);
            } else if let Some(position) = remaining.iter().position(|c| cube.equals(c).is_unknown())
            {
                remaining.remove(position);
                any_unknown = true;
            } else {
                return TriBool::False;
            }
        }
        if any_unknown {
            TriBool::Unknown
        } else {
            TriBool::True
        }
    }

    /// The most shared `(dimension, range)` constraint, when one occurs in
    /// more than one cube. Occurrences match under tri-bool `True` equality
    /// only; ties break toward the first constraint seen.
    pub fn find_factor(&self) -> Option<(String, Range)> {
        let mut buckets: Vec<(&str, &Range, usize)> = Vec::new();
        for cube in &self.union {
            for (dimension, range) in cube.dimensions() {
                match buckets
                    .iter_mut()
                    .find(|(name, seen, _)| *name == dimension && seen.equals(range).is_true())
                {
                    Some(bucket) => bucket.2 += 1,
                    None => buckets.push((dimension, range, 1)),
                }
            }
        }
        let mut best: Option<(&str, &Range, usize)> = None;
        for bucket in buckets {
            if bucket.2 > 1 && best.map_or(true, |(_, _, count)| bucket.2 > count) {
                best = Some(bucket);
            }
        }
        best.map(|(dimension, range, _)| (dimension.to_string(), range.clone()))
    }

    /// Partition the union by attempting to remove the factor's constraints
    /// from every cube: successes land in `factored` (with the constraints
    /// gone), failures in `remainder` (unchanged).
    pub fn factor(&self, factor: &Cube) -> Factored {
        let mut factored = Vec::new();
        let mut remainder = Vec::new();
        for cube in &self.union {
            match cube.remove_constraints(factor) {
                Ok(stripped) => factored.push(stripped),
                Err(_) => remainder.push(cube.clone()),
            }
        }
        Factored {
            factored: (!factored.is_empty()).then(|| Query { union: factored }),
            remainder: (!remainder.is_empty()).then(|| Query { union: remainder }),
        }
    }

    /// Bind parameters in every cube, dropping cubes that become
    /// unsatisfiable; `None` when every cube vanishes.
    pub fn bind(&self, env: &Bindings) -> Result<Option<Query>, Error> {
        let mut union = Vec::with_capacity(self.union.len());
        for cube in &self.union {
            if let Some(bound) = cube.bind(env)? {
                union.push(bound);
            }
        }
        if union.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self { union }))
        }
    }

    /// Render through a formatter. A single cube renders as its `and`
    /// expression; several cubes factor out their most shared constraint
    /// first, recursively, and join with `or`.
    pub fn to_expression(&self, formatter: &dyn ExpressionFormatter) -> String {
        self.to_expression_with(formatter, &ExprContext::root())
    }

    /// Render with the default formatter.
    pub fn to_expression_default(&self) -> String {
        self.to_expression(&DefaultFormatter)
    }

    pub(crate) fn to_expression_with(
        &self,
        formatter: &dyn ExpressionFormatter,
        context: &ExprContext,
    ) -> String {
        match self.union.as_slice() {
            [] => formatter.or_expr(&[]),
            [cube] => cube.to_expression(formatter, context),
            _ => {
                if let Some((dimension, range)) = self.find_factor() {
                    let factor = Cube::new().with(&dimension, range.clone());
                    let Factored {
                        factored,
                        remainder,
                    } = self.factor(&factor);
                    if let Some(factored) = factored {
                        let parts = [
                            range.to_expression(&dimension, formatter, context),
                            factored.to_expression_with(formatter, context),
                        ]
                        .into_iter()
                        .filter(|part| !part.is_empty())
                        .collect_vec();
                        let head = formatter.and_expr(&parts);
                        return match remainder {
                            Some(remainder) => formatter.or_expr(&[
                                head,
                                remainder.to_expression_with(formatter, context),
                            ]),
                            None => head,
                        };
                    }
                }
                let parts = self
                    .union
                    .iter()
                    .map(|cube| cube.to_expression(formatter, context))
                    .collect_vec();
                formatter.or_expr(&parts)
            }
        }
    }
}

impl From<Cube> for Query {
    fn from(cube: Cube) -> Self {
        Self::from_cube(cube)
    }
}

impl Display for Query {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cubes::cube;
    use crate::test_utils::ranges::{equal, greater_than_or_equal, less_than, param};
    use serde_json::json;

    fn query(constraint: serde_json::Value) -> Query {
        Query::from_json(&constraint).unwrap()
    }

    #[test]
    fn or_and_and_compose_and_factor_in_the_rendering() {
        let result = query(json!({"x": [null, 2], "y": 4}))
            .and(&query(json!({"z": 5})))
            .unwrap()
            .or(&query(json!({"x": [6, 8], "y": 3, "z": 99})))
            .unwrap();

        assert_eq!(
            "(x<2 and y=4 and z=5 or x>=6 and x<8 and y=3 and z=99)",
            result.to_expression_default()
        );
    }

    #[test]
    fn nested_subqueries_render_with_a_dotted_path() {
        let result = query(json!({
            "x": [null, 2],
            "y": {"alpha": [2, 6], "beta": {"nuts": "brazil"}}
        }));

        assert_eq!(
            r#"x<2 and (y.alpha>=2 and y.alpha<6 and (y.beta.nuts="brazil"))"#,
            result.to_expression_default()
        );
    }

    #[test]
    fn distinct_parametric_element_constraints_are_both_retained() {
        let result = query(json!({
            "x": [null, 2],
            "y": {"alpha": [2, 6], "nuts": {"$has": {"$": "param1"}}}
        }))
        .and(&query(json!({"y": {"nuts": {"$has": {"$": "param2"}}}})))
        .unwrap();

        let rendered = result.to_expression_default();
        assert!(rendered.contains("y has(nuts=$param1)"), "{rendered}");
        assert!(rendered.contains("y has(nuts=$param2)"), "{rendered}");
    }

    #[test]
    fn factoring_splits_the_union_into_factored_and_remainder() {
        let result = query(json!({"x": 2, "y": [3, 4], "z": 8}))
            .or(&query(json!({"x": 2, "y": [null, 4], "z": 7})))
            .unwrap()
            .or(&query(json!({"x": 3, "y": [3, null], "z": 7})))
            .unwrap();

        let Factored {
            factored,
            remainder,
        } = result.factor(&cube! {"x" => 2});

        let expected_factored = query(json!({"y": [3, 4], "z": 8}))
            .or(&query(json!({"y": [null, 4], "z": 7})))
            .unwrap();
        let expected_remainder = query(json!({"x": 3, "y": [3, null], "z": 7}));
        assert_eq!(TriBool::True, expected_factored.equals(&factored.unwrap()));
        assert_eq!(TriBool::True, expected_remainder.equals(&remainder.unwrap()));
    }

    #[test]
    fn parametric_containment_is_unknown_in_both_directions() {
        let q2 = query(json!({
            "x": [{"$": "p1"}, 2],
            "y": {"alpha": [2, {"$": "p3"}], "beta": {"nuts": {"$": "p2"}}}
        }));
        let q3 = query(json!({
            "x": [{"$": "p1"}, 2],
            "y": {"alpha": [2, 8], "beta": {"nuts": {"$": "p2"}}}
        }));

        assert_eq!(TriBool::Unknown, q3.contains(&q2).unwrap());
        assert_eq!(TriBool::Unknown, q2.contains(&q3).unwrap());
    }

    #[test]
    fn binding_substitutes_without_changing_the_structure() {
        let result = query(json!({
            "student": {"age": [{"$": "min_age"}, null], "name": "ada"}
        }));

        let bound = result
            .bind(&Bindings::new().with("min_age", 27))
            .unwrap()
            .unwrap();

        assert_eq!(
            r#"(student.age>=27 and student.name="ada")"#,
            bound.to_expression_default()
        );
    }

    #[test]
    fn or_absorbs_a_contained_cube() {
        let wide = query(json!({"x": [null, 9]}));
        let narrow = query(json!({"x": [null, 2], "y": 4}));

        let union = wide.or(&narrow).unwrap();

        assert_eq!(TriBool::True, wide.equals(&union));
    }

    #[test]
    fn or_replaces_an_existing_cube_contained_by_the_incoming_one() {
        let narrow = query(json!({"x": [null, 2], "y": 4}));
        let wide = query(json!({"x": [null, 9]}));

        let union = narrow.or(&wide).unwrap();

        assert_eq!(TriBool::True, wide.equals(&union));
    }

    #[test]
    fn or_keeps_incomparable_cubes() {
        let left = query(json!({"x": 1}));
        let right = query(json!({"y": 2}));

        let union = left.or(&right).unwrap();

        assert_eq!(2, union.union().len());
    }

    #[test]
    fn or_and_and_are_commutative_under_equality() {
        let a = query(json!({"x": 1}));
        let b = query(json!({"y": [null, 5]}));

        assert_eq!(
            TriBool::True,
            a.or(&b).unwrap().equals(&b.or(&a).unwrap())
        );
        assert_eq!(
            TriBool::True,
            a.and(&b).unwrap().equals(&b.and(&a).unwrap())
        );
    }

    #[test]
    fn or_absorbs_its_own_conjunction() {
        let a = query(json!({"x": 1}));
        let b = query(json!({"y": 2}));

        let result = a.or(&a.and(&b).unwrap()).unwrap();

        assert_eq!(TriBool::True, a.equals(&result));
    }

    #[test]
    fn a_disjunction_contains_its_disjuncts() {
        let a = query(json!({"x": 1}));
        let b = query(json!({"y": 2}));

        let union = a.or(&b).unwrap();

        assert_eq!(TriBool::True, union.contains(&a).unwrap());
        assert_eq!(TriBool::True, union.contains(&b).unwrap());
        assert_eq!(TriBool::False, a.contains(&union).unwrap());
    }

    #[test]
    fn and_distributes_over_or() {
        let a = query(json!({"x": 1}));
        let b = query(json!({"y": 2}));
        let c = query(json!({"z": 3}));

        let left = a.or(&b).unwrap().and(&c).unwrap();
        let right = a.and(&c).unwrap().or(&b.and(&c).unwrap()).unwrap();

        assert_eq!(TriBool::True, left.equals(&right));
    }

    #[test]
    fn and_with_a_contradiction_is_empty() {
        let a = query(json!({"x": 1}));
        let b = query(json!({"x": 2}));

        let result = a.and(&b).unwrap();

        assert!(result.is_empty());
    }

    #[test]
    fn queries_are_equal_regardless_of_cube_order() {
        let a = query(json!({"x": 1})).or(&query(json!({"y": 2}))).unwrap();
        let b = query(json!({"y": 2})).or(&query(json!({"x": 1}))).unwrap();

        assert_eq!(TriBool::True, a.equals(&b));
    }

    #[test]
    fn queries_with_different_cube_counts_are_not_equal() {
        let a = query(json!({"x": 1}));
        let b = query(json!({"x": 1})).or(&query(json!({"y": 2}))).unwrap();

        assert_eq!(TriBool::False, a.equals(&b));
    }

    #[test]
    fn queries_built_from_reordered_records_are_equal() {
        let forward = query(json!({"x": 1, "y": 2, "z": 3}));
        let backward = query(json!({"z": 3, "y": 2, "x": 1}));

        assert_eq!(TriBool::True, forward.equals(&backward));
    }

    #[test]
    fn find_factor_picks_the_most_shared_constraint() {
        let result = query(json!({"x": 2, "y": 3}))
            .or(&query(json!({"x": 2, "z": 7})))
            .unwrap()
            .or(&query(json!({"x": 3, "z": 7})))
            .unwrap();

        let (dimension, range) = result.find_factor().unwrap();

        assert_eq!("x", dimension);
        assert_eq!(TriBool::True, equal!(2).equals(&range));
    }

    #[test]
    fn find_factor_breaks_ties_toward_the_first_seen_constraint() {
        let result = query(json!({"x": 2, "z": 7, "p": 1}))
            .or(&query(json!({"x": 2, "z": 7, "q": 1})))
            .unwrap();

        let (dimension, _) = result.find_factor().unwrap();

        assert_eq!("x", dimension);
    }

    #[test]
    fn find_factor_returns_none_when_nothing_repeats() {
        let result = query(json!({"x": 2})).or(&query(json!({"y": 3}))).unwrap();

        assert_eq!(None, result.find_factor());
    }

    #[test]
    fn find_factor_ignores_constraints_that_match_only_after_binding() {
        let result = query(json!({"x": {"$": "p"}, "y": 1}))
            .or(&query(json!({"x": {"$": "q"}, "y": 2})))
            .unwrap();

        assert_eq!(None, result.find_factor());
    }

    #[test]
    fn binding_every_parameter_away_yields_none_when_all_cubes_empty() {
        let impossible = less_than!(2).intersect(&equal!(param!("p"))).unwrap().unwrap();
        let result = Query::from_cube(Cube::new().with("x", impossible));

        assert_eq!(None, result.bind(&Bindings::new().with("p", 5)).unwrap());
    }

    #[test]
    fn binding_keeps_cubes_that_survive() {
        let impossible = less_than!(2).intersect(&equal!(param!("p"))).unwrap().unwrap();
        let result = Query::from_cube(Cube::new().with("x", impossible))
            .or(&query(json!({"y": 1})))
            .unwrap();

        let bound = result.bind(&Bindings::new().with("p", 5)).unwrap().unwrap();

        assert_eq!(TriBool::True, query(json!({"y": 1})).equals(&bound));
    }

    #[test]
    fn binding_preserves_containment_once_parameters_are_concrete() {
        let env = Bindings::new().with("p", 5);
        let wide = Query::from_cube(Cube::new().with("x", less_than!(param!("p"))));
        let narrow = Query::from_cube(
            Cube::new()
                .with("x", less_than!(param!("p")))
                .with("y", equal!(1)),
        );

        assert_eq!(TriBool::True, wide.contains(&narrow).unwrap());

        let wide = wide.bind(&env).unwrap().unwrap();
        let narrow = narrow.bind(&env).unwrap().unwrap();
        assert_eq!(TriBool::True, wide.contains(&narrow).unwrap());
    }

    #[test]
    fn an_item_matches_when_any_cube_accepts_it() {
        let result = query(json!({"x": 1})).or(&query(json!({"y": 2}))).unwrap();

        assert_eq!(TriBool::True, result.contains_item(&json!({"y": 2})));
        assert_eq!(TriBool::False, result.contains_item(&json!({"y": 3})));
    }

    #[test]
    fn an_item_is_unknown_when_only_a_parametric_cube_could_accept_it() {
        let result = Query::from_cube(Cube::new().with("x", equal!(param!("p"))));

        assert_eq!(TriBool::Unknown, result.contains_item(&json!({"x": 1})));
    }

    #[test]
    fn nested_records_match_through_subqueries() {
        let result = query(json!({"y": {"alpha": [2, 6]}}));

        assert_eq!(
            TriBool::True,
            result.contains_item(&json!({"y": {"alpha": 3}}))
        );
        assert_eq!(
            TriBool::False,
            result.contains_item(&json!({"y": {"alpha": 9}}))
        );
        assert_eq!(TriBool::False, result.contains_item(&json!({"y": 3})));
    }

    #[test]
    fn a_greater_than_or_equal_lower_bound_includes_its_value() {
        let result = Query::from_cube(Cube::new().with("x", greater_than_or_equal!(2)));

        assert_eq!(TriBool::True, result.contains_item(&json!({"x": 2})));
        assert_eq!(TriBool::False, result.contains_item(&json!({"x": 1})));
    }

    #[test]
    fn an_empty_query_accepts_nothing() {
        let result = query(json!({"x": 1})).and(&query(json!({"x": 2}))).unwrap();

        assert!(result.is_empty());
        assert_eq!(TriBool::False, result.contains_item(&json!({"x": 1})));
    }
}
