use crate::error::Error;
use rust_decimal::Decimal;
use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::Arc,
};

/// A named placeholder for a value supplied later through
/// [`crate::Bindings`].
///
/// Identity is the name: two parameters are equal iff their names are equal.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Parameter {
    name: String,
}

impl Parameter {
    /// Create a parameter, validating the name.
    ///
    /// Names follow the identifier shape `[a-zA-Z_][a-zA-Z0-9_-]*`; anything
    /// else (including the empty string) is rejected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cube_algebra::Parameter;
    ///
    /// assert!(Parameter::of("min_age").is_ok());
    /// assert!(Parameter::of("").is_err());
    /// assert!(Parameter::of("1st").is_err());
    /// ```
    pub fn of(name: &str) -> Result<Self, Error> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            None => false,
        };
        if !valid {
            return Err(Error::InvalidParameter(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for Parameter {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "${}", self.name)
    }
}

/// A constraint value: a totally comparable scalar or a [`Parameter`].
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(String),
    Param(Parameter),
}

impl Value {
    /// The parameter name when this value is a placeholder.
    #[inline]
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Param(parameter) => Some(parameter.name()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::Param(_))
    }
}

impl Display for Value {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Boolean(value) => write!(formatter, "{value}"),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::String(value) => write!(formatter, "{value}"),
            Self::Param(parameter) => write!(formatter, "{parameter}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Parameter> for Value {
    fn from(parameter: Parameter) -> Self {
        Self::Param(parameter)
    }
}

/// A named total order over concrete values.
///
/// Every range carries the order it was built with; the default is
/// [`Order::natural()`]. Orders compare equal by name, which is also how
/// they are resolved when decoding serialized constraints (see
/// [`OrderRegistry`]).
#[derive(Clone)]
pub struct Order {
    name: Arc<str>,
    lt: Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>,
}

impl Order {
    pub const NATURAL: &'static str = "natural";

    /// The default order: booleans before numbers before strings, each rank
    /// compared naturally. Integers and decimals compare numerically across
    /// the two representations.
    pub fn natural() -> Self {
        Self {
            name: Arc::from(Self::NATURAL),
            lt: Arc::new(|a, b| natural_cmp(a, b) == Ordering::Less),
        }
    }

    /// Wrap a user-supplied strict total order under a resolvable name.
    pub fn custom<F>(name: &str, lt: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            lt: Arc::new(lt),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_natural(&self) -> bool {
        &*self.name == Self::NATURAL
    }

    /// Apply the strict order to two concrete values.
    #[inline]
    pub fn lt(&self, a: &Value, b: &Value) -> bool {
        debug_assert!(a.is_concrete() && b.is_concrete());
        (self.lt)(a, b)
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::natural()
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Order {}

impl std::fmt::Debug for Order {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.debug_tuple("Order").field(&self.name).finish()
    }
}

fn natural_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.cmp(b),
        (Value::Integer(a), Value::Float(b)) => Decimal::from(*a).cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.cmp(&Decimal::from(*b)),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        // Parameters never reach the order; ranks keep it total anyway.
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Boolean(_) => 0,
        Value::Integer(_) | Value::Float(_) => 1,
        Value::String(_) => 2,
        Value::Param(_) => 3,
    }
}

/// Resolves order names when decoding serialized constraints.
///
/// The registry always knows [`Order::natural()`]; custom orders must be
/// registered before decoding constraints that reference them.
#[derive(Clone, Debug)]
pub struct OrderRegistry {
    by_name: HashMap<String, Order>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        let natural = Order::natural();
        let mut by_name = HashMap::new();
        by_name.insert(natural.name().to_string(), natural);
        Self { by_name }
    }

    pub fn register(&mut self, order: Order) {
        self.by_name.insert(order.name().to_string(), order);
    }

    pub fn resolve(&self, name: &str) -> Result<Order, Error> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownOrder(name.to_string()))
    }
}

impl Default for OrderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
