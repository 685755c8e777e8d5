use crate::value::Value;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// An environment of parameter values for [`crate::Query::bind`] and
/// [`crate::Range::bind`].
///
/// # Examples
///
/// ```rust
/// use cube_algebra::{Bindings, Query};
/// use serde_json::json;
///
/// let query = Query::from_json(&json!({"age": [{"$": "min_age"}, null]})).unwrap();
/// let env = Bindings::new().with_integer("min_age", 27);
/// let bound = query.bind(&env).unwrap().unwrap();
/// assert_eq!("age>=27", bound.to_expression_default());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Bind a parameter to any value.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Bind a parameter to a boolean.
    pub fn with_boolean(self, name: &str, value: bool) -> Self {
        self.with(name, value)
    }

    /// Bind a parameter to an integer.
    pub fn with_integer(self, name: &str, value: i64) -> Self {
        self.with(name, value)
    }

    /// Bind a parameter to a decimal built from a mantissa and a scale.
    pub fn with_float(self, name: &str, number: i64, scale: u32) -> Self {
        self.with(name, Decimal::new(number, scale))
    }

    /// Bind a parameter to a string.
    pub fn with_string(self, name: &str, value: &str) -> Self {
        self.with(name, value)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
