use crate::{
    cube::Cube,
    error::Error,
    query::Query,
    range::{Range, RangeKind},
    value::{Order, OrderRegistry, Parameter, Value},
};
use itertools::Itertools;
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value as Json};
use std::str::FromStr;

const PARAM_KEY: &str = "$";
const HAS_KEY: &str = "$has";
const AND_KEY: &str = "$and";
const ORDER_KEY: &str = "$order";
const UNION_KEY: &str = "union";
const OPERATOR_KEYS: [&str; 5] = ["<", "<=", ">", ">=", "="];

enum Side {
    Lower,
    Upper,
}

// The scalar reading of an item field, for per-item matching.
pub(crate) fn scalar_value(json: &Json) -> Option<Value> {
    match json {
        Json::Bool(value) => Some(Value::Boolean(*value)),
        Json::Number(number) => number
            .as_i64()
            .map(Value::Integer)
            .or_else(|| decimal_from_number(number).map(Value::Float)),
        Json::String(value) => Some(Value::String(value.clone())),
        _ => None,
    }
}

// Decimals keep their exact value through the number's textual form; the
// float reading is only a last resort for exotic exponent spellings.
fn decimal_from_number(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
        .or_else(|| number.as_f64().and_then(Decimal::from_f64))
}

fn decimal_to_json(decimal: &Decimal) -> Json {
    let normalized = decimal.normalize();
    if normalized.scale() == 0 {
        if let Some(value) = normalized.to_i64() {
            return json!(value);
        }
    }
    match serde_json::Number::from_str(&normalized.to_string()) {
        Ok(number) => Json::Number(number),
        Err(_) => unreachable!("a decimal always renders as a valid JSON number"),
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Boolean(value) => json!(value),
        Value::Integer(value) => json!(value),
        Value::Float(decimal) => decimal_to_json(decimal),
        Value::String(value) => json!(value),
        Value::Param(parameter) => json!({ PARAM_KEY: parameter.name() }),
    }
}

fn value_from_json(json: &Json) -> Result<Value, Error> {
    if let Some(value) = scalar_value(json) {
        return Ok(value);
    }
    if let Json::Object(map) = json {
        if map.len() == 1 {
            if let Some(Json::String(name)) = map.get(PARAM_KEY) {
                return Ok(Value::Param(Parameter::of(name)?));
            }
        }
    }
    Err(Error::InvalidConstraint(format!(
        "expected a scalar or a parameter, found {json}"
    )))
}

fn is_operator_object(map: &Map<String, Json>) -> bool {
    !map.is_empty()
        && map.keys().any(|key| OPERATOR_KEYS.contains(&key.as_str()))
        && map
            .keys()
            .all(|key| OPERATOR_KEYS.contains(&key.as_str()) || key == ORDER_KEY)
}

impl Range {
    /// The serialized form: bare values for `Equals`, the array short forms
    /// for default-order bounds, operator objects otherwise.
    pub fn to_json(&self) -> Json {
        match self.kind() {
            RangeKind::Unbounded => json!([null, null]),
            RangeKind::Equals(value) if self.order().is_natural() => value_to_json(value),
            RangeKind::Equals(value) => self.operator_object(&[("=", value)]),
            RangeKind::LessThan(value) if self.order().is_natural() => {
                json!([null, value_to_json(value)])
            }
            RangeKind::LessThan(value) => self.operator_object(&[("<", value)]),
            RangeKind::GreaterThanOrEqual(value) if self.order().is_natural() => {
                json!([value_to_json(value), null])
            }
            RangeKind::GreaterThanOrEqual(value) => self.operator_object(&[(">=", value)]),
            RangeKind::LessThanOrEqual(value) => self.operator_object(&[("<=", value)]),
            RangeKind::GreaterThan(value) => self.operator_object(&[(">", value)]),
            RangeKind::Between(lower, upper) => {
                if self.order().is_natural() {
                    json!([lower_short_form(lower), upper_short_form(upper)])
                } else {
                    match (bound_entry(lower), bound_entry(upper)) {
                        (Some(lower), Some(upper)) => self.operator_object(&[lower, upper]),
                        _ => unreachable!("between bounds are always single bounds"),
                    }
                }
            }
            RangeKind::Intersection(intersection) => {
                let members = intersection.members().map(Range::to_json).collect_vec();
                json!({ AND_KEY: members })
            }
            RangeKind::HasElement(inner) => json!({ HAS_KEY: inner.to_json() }),
            RangeKind::Subquery(query) => query.to_json(),
        }
    }

    fn operator_object(&self, entries: &[(&str, &Value)]) -> Json {
        let mut map = Map::new();
        for (operator, value) in entries {
            map.insert((*operator).to_string(), value_to_json(value));
        }
        if !self.order().is_natural() {
            map.insert(ORDER_KEY.to_string(), json!(self.order().name()));
        }
        Json::Object(map)
    }

    /// Decode a constraint with only the natural order available.
    pub fn from_json(json: &Json) -> Result<Range, Error> {
        Self::from_json_with(json, &OrderRegistry::new())
    }

    /// Decode a constraint, resolving `"$order"` tags through `orders`.
    pub fn from_json_with(json: &Json, orders: &OrderRegistry) -> Result<Range, Error> {
        match json {
            Json::Null => Ok(Range::unbounded()),
            Json::Bool(_) | Json::Number(_) | Json::String(_) => {
                Ok(Range::equal_to(value_from_json(json)?))
            }
            Json::Array(items) => bounds_from_array(items, orders),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(Json::String(name)) = map.get(PARAM_KEY) {
                        return Ok(Range::equal_to(Parameter::of(name)?));
                    }
                    if let Some(inner) = map.get(HAS_KEY) {
                        return Ok(Range::has_element(Self::from_json_with(inner, orders)?));
                    }
                    if let Some(Json::Array(members)) = map.get(AND_KEY) {
                        return intersection_from_json(members, orders);
                    }
                }
                if map.contains_key(UNION_KEY) && map.len() == 1 {
                    return Ok(Range::subquery(Query::from_json_with(json, orders)?));
                }
                if is_operator_object(map) {
                    return bounds_from_object(map, orders);
                }
                Ok(Range::subquery(Query::from_json_with(json, orders)?))
            }
        }
    }
}

fn lower_short_form(lower: &Range) -> Json {
    match lower.kind() {
        RangeKind::GreaterThanOrEqual(value) => value_to_json(value),
        RangeKind::GreaterThan(value) => json!({ ">": value_to_json(value) }),
        _ => unreachable!("between lower bounds are greater-than bounds"),
    }
}

fn upper_short_form(upper: &Range) -> Json {
    match upper.kind() {
        RangeKind::LessThan(value) => value_to_json(value),
        RangeKind::LessThanOrEqual(value) => json!({ "<=": value_to_json(value) }),
        _ => unreachable!("between upper bounds are less-than bounds"),
    }
}

fn bound_entry(bound: &Range) -> Option<(&'static str, &Value)> {
    match bound.kind() {
        RangeKind::LessThan(value) => Some(("<", value)),
        RangeKind::LessThanOrEqual(value) => Some(("<=", value)),
        RangeKind::GreaterThan(value) => Some((">", value)),
        RangeKind::GreaterThanOrEqual(value) => Some((">=", value)),
        _ => None,
    }
}

fn intersection_from_json(members: &[Json], orders: &OrderRegistry) -> Result<Range, Error> {
    let mut folded: Option<Range> = None;
    for member in members {
        let range = Range::from_json_with(member, orders)?;
        folded = Some(match folded {
            None => range,
            Some(current) => current.intersect(&range)?.ok_or_else(|| {
                Error::InvalidConstraint("unsatisfiable intersection in $and".to_string())
            })?,
        });
    }
    Ok(folded.unwrap_or_else(Range::unbounded))
}

fn bounds_from_object(map: &Map<String, Json>, orders: &OrderRegistry) -> Result<Range, Error> {
    let order = match map.get(ORDER_KEY) {
        Some(Json::String(name)) => orders.resolve(name)?,
        Some(other) => {
            return Err(Error::InvalidConstraint(format!(
                "{ORDER_KEY} must name an order, found {other}"
            )))
        }
        None => Order::natural(),
    };
    let mut folded: Option<Range> = None;
    for (key, value) in map {
        if key == ORDER_KEY {
            continue;
        }
        let value = value_from_json(value)?;
        let range = match key.as_str() {
            "<" => Range::less_than(value),
            "<=" => Range::less_than_or_equal(value),
            ">" => Range::greater_than(value),
            ">=" => Range::greater_than_or_equal(value),
            "=" => Range::equal_to(value),
            other => {
                return Err(Error::InvalidConstraint(format!(
                    "unknown range operator {other:?}"
                )))
            }
        }
        .with_order(order.clone());
        folded = Some(match folded {
            None => range,
            Some(current) => current.intersect(&range)?.ok_or_else(|| {
                Error::InvalidConstraint("unsatisfiable bounds object".to_string())
            })?,
        });
    }
    folded.ok_or_else(|| Error::InvalidConstraint("empty bounds object".to_string()))
}

fn bounds_from_array(items: &[Json], orders: &OrderRegistry) -> Result<Range, Error> {
    if items.is_empty() || items.len() > 2 {
        return Err(Error::BadRangeArray(items.len()));
    }
    let lower = parse_side(&items[0], Side::Lower, orders)?;
    let upper = match items.get(1) {
        Some(item) => parse_side(item, Side::Upper, orders)?,
        None => None,
    };
    match (lower, upper) {
        (None, None) => Ok(Range::unbounded()),
        (Some(lower), None) => Ok(lower),
        (None, Some(upper)) => Ok(upper),
        (Some(lower), Some(upper)) => lower.intersect(&upper)?.ok_or_else(|| {
            Error::InvalidConstraint("range array bounds leave no values".to_string())
        }),
    }
}

fn parse_side(json: &Json, side: Side, orders: &OrderRegistry) -> Result<Option<Range>, Error> {
    if json.is_null() {
        return Ok(None);
    }
    if let Json::Object(map) = json {
        if is_operator_object(map) {
            let bound = bounds_from_object(map, orders)?;
            let valid = match side {
                Side::Lower => matches!(
                    bound.kind(),
                    RangeKind::GreaterThan(_) | RangeKind::GreaterThanOrEqual(_)
                ),
                Side::Upper => matches!(
                    bound.kind(),
                    RangeKind::LessThan(_) | RangeKind::LessThanOrEqual(_)
                ),
            };
            if !valid {
                return Err(Error::InvalidConstraint(
                    "range array sides must bound their own direction".to_string(),
                ));
            }
            return Ok(Some(bound));
        }
    }
    let value = value_from_json(json)?;
    Ok(Some(match side {
        Side::Lower => Range::greater_than_or_equal(value),
        Side::Upper => Range::less_than(value),
    }))
}

impl Cube {
    /// The serialized form: an object mapping each dimension to its range.
    pub fn to_json(&self) -> Json {
        let mut map = Map::new();
        for (dimension, range) in self.dimensions() {
            map.insert(dimension.to_string(), range.to_json());
        }
        Json::Object(map)
    }

    pub fn from_json(json: &Json) -> Result<Cube, Error> {
        Self::from_json_with(json, &OrderRegistry::new())
    }

    pub fn from_json_with(json: &Json, orders: &OrderRegistry) -> Result<Cube, Error> {
        let map = match json {
            Json::Object(map) => map,
            other => {
                return Err(Error::InvalidConstraint(format!(
                    "a constraint record must be an object, found {other}"
                )))
            }
        };
        let mut cube = Cube::new();
        for (dimension, constraint) in map {
            if dimension.starts_with('$') || OPERATOR_KEYS.contains(&dimension.as_str()) {
                return Err(Error::InvalidConstraint(format!(
                    "{dimension:?} is not a valid dimension name"
                )));
            }
            cube = cube.with(dimension, Range::from_json_with(constraint, orders)?);
        }
        Ok(cube)
    }
}

impl Query {
    /// The serialized form: `{"union": [cube, …]}`.
    pub fn to_json(&self) -> Json {
        let cubes = self.union().iter().map(Cube::to_json).collect_vec();
        json!({ UNION_KEY: cubes })
    }

    /// Build a query from the constraint sugar: a record object, or a
    /// `{"union": […]}` form.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cube_algebra::Query;
    /// use serde_json::json;
    ///
    /// let query = Query::from_json(&json!({"x": [null, 2], "y": 4})).unwrap();
    /// assert_eq!("x<2 and y=4", query.to_expression_default());
    /// ```
    pub fn from_json(json: &Json) -> Result<Query, Error> {
        Self::from_json_with(json, &OrderRegistry::new())
    }

    pub fn from_json_with(json: &Json, orders: &OrderRegistry) -> Result<Query, Error> {
        match json {
            Json::Object(map) if map.len() == 1 && map.contains_key(UNION_KEY) => {
                let cubes = match map.get(UNION_KEY) {
                    Some(Json::Array(cubes)) => cubes,
                    _ => {
                        return Err(Error::InvalidConstraint(
                            "the union form must hold an array of records".to_string(),
                        ))
                    }
                };
                let union = cubes
                    .iter()
                    .map(|cube| Cube::from_json_with(cube, orders))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Query::from_cubes(union))
            }
            Json::Object(_) => Ok(Query::from_cube(Cube::from_json_with(json, orders)?)),
            other => Err(Error::InvalidConstraint(format!(
                "a constraint must be an object, found {other}"
            ))),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Query::from_json(&json).map_err(de::Error::custom)
    }
}

impl Serialize for Range {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Range {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Range::from_json(&json).map_err(de::Error::custom)
    }
}
