use crate::value::Value;
use std::fmt::{Display, Formatter};

/// The operator tokens handed to a formatter, exactly as they render.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Operator {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Has,
    Contains,
}

impl Operator {
    pub const fn token(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Has => "has",
            Self::Contains => "contains",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.token())
    }
}

/// The right-hand side of an operator expression: a constraint value, or an
/// already-rendered sub-expression for `has` and `contains`.
#[derive(Clone, PartialEq, Debug)]
pub enum Operand<'a> {
    Value(&'a Value),
    Expression(String),
}

/// The dimension path leading into the current subquery, used to qualify
/// dimension names when rendering nested records.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ExprContext {
    path: Vec<String>,
}

impl ExprContext {
    pub fn root() -> Self {
        Self { path: Vec::new() }
    }

    /// The context one level deeper, inside the record on `dimension`.
    pub fn child(&self, dimension: &str) -> Self {
        let mut path = self.path.clone();
        path.push(dimension.to_string());
        Self { path }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The dot-joined path of a dimension under this context.
    pub fn dimension_path(&self, dimension: &str) -> String {
        if self.path.is_empty() {
            dimension.to_string()
        } else {
            format!("{}.{}", self.path.join("."), dimension)
        }
    }

    /// The dot-joined context itself, or `dimension` at the root.
    pub fn prefix_or(&self, dimension: &str) -> String {
        if self.path.is_empty() {
            dimension.to_string()
        } else {
            self.path.join(".")
        }
    }
}

/// The rendering seam: backends plug in by supplying the three expression
/// constructors.
pub trait ExpressionFormatter {
    fn and_expr(&self, parts: &[String]) -> String;
    fn or_expr(&self, parts: &[String]) -> String;
    fn oper_expr(
        &self,
        dimension: &str,
        operator: Operator,
        operand: &Operand,
        context: &ExprContext,
    ) -> String;
}

/// The built-in formatter: bare `and` joins, parenthesized `or` joins,
/// `dim<op>value` operands with double-quoted strings and `$name`
/// parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFormatter;

impl ExpressionFormatter for DefaultFormatter {
    fn and_expr(&self, parts: &[String]) -> String {
        parts.join(" and ")
    }

    fn or_expr(&self, parts: &[String]) -> String {
        format!("({})", parts.join(" or "))
    }

    fn oper_expr(
        &self,
        dimension: &str,
        operator: Operator,
        operand: &Operand,
        context: &ExprContext,
    ) -> String {
        match (operator, operand) {
            (Operator::Has, Operand::Expression(inner)) => {
                format!("{} has({inner})", context.prefix_or(dimension))
            }
            (Operator::Contains, Operand::Expression(inner)) => format!("({inner})"),
            (_, Operand::Value(value)) => format!(
                "{}{}{}",
                context.dimension_path(dimension),
                operator.token(),
                render_value(value)
            ),
            (_, Operand::Expression(inner)) => format!(
                "{}{}{inner}",
                context.dimension_path(dimension),
                operator.token()
            ),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => format!("{text:?}"),
        value => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Parameter;

    #[test]
    fn operators_render_their_exact_tokens() {
        let tokens: Vec<_> = [
            Operator::Equal,
            Operator::LessThan,
            Operator::LessThanOrEqual,
            Operator::GreaterThan,
            Operator::GreaterThanOrEqual,
            Operator::Has,
            Operator::Contains,
        ]
        .iter()
        .map(|operator| operator.token())
        .collect();

        assert_eq!(vec!["=", "<", "<=", ">", ">=", "has", "contains"], tokens);
    }

    #[test]
    fn the_default_formatter_joins_and_parts_bare() {
        let parts = vec!["x<2".to_string(), "y=4".to_string()];

        assert_eq!("x<2 and y=4", DefaultFormatter.and_expr(&parts));
    }

    #[test]
    fn the_default_formatter_parenthesizes_or_parts() {
        let parts = vec!["x<2".to_string(), "y=4".to_string()];

        assert_eq!("(x<2 or y=4)", DefaultFormatter.or_expr(&parts));
    }

    #[test]
    fn operands_render_against_the_context_path() {
        let context = ExprContext::root().child("y");

        let rendered = DefaultFormatter.oper_expr(
            "alpha",
            Operator::GreaterThanOrEqual,
            &Operand::Value(&Value::Integer(2)),
            &context,
        );

        assert_eq!("y.alpha>=2", rendered);
    }

    #[test]
    fn strings_render_double_quoted_and_parameters_with_a_dollar() {
        let context = ExprContext::root();

        assert_eq!(
            r#"country="CA""#,
            DefaultFormatter.oper_expr(
                "country",
                Operator::Equal,
                &Operand::Value(&Value::String("CA".to_string())),
                &context,
            )
        );
        assert_eq!(
            "age>=$min_age",
            DefaultFormatter.oper_expr(
                "age",
                Operator::GreaterThanOrEqual,
                &Operand::Value(&Value::Param(Parameter::of("min_age").unwrap())),
                &context,
            )
        );
    }

    #[test]
    fn has_renders_the_context_prefix_outside_the_parentheses() {
        let nested = ExprContext::root().child("y");
        let top = ExprContext::root();

        assert_eq!(
            "y has(nuts=$p)",
            DefaultFormatter.oper_expr(
                "nuts",
                Operator::Has,
                &Operand::Expression("nuts=$p".to_string()),
                &nested,
            )
        );
        assert_eq!(
            "tags has(tags=3)",
            DefaultFormatter.oper_expr(
                "tags",
                Operator::Has,
                &Operand::Expression("tags=3".to_string()),
                &top,
            )
        );
    }

    #[test]
    fn contains_wraps_the_subquery_in_parentheses() {
        let rendered = DefaultFormatter.oper_expr(
            "y",
            Operator::Contains,
            &Operand::Expression("y.alpha>=2".to_string()),
            &ExprContext::root(),
        );

        assert_eq!("(y.alpha>=2)", rendered);
    }
}
