//! Typed search terms produced from query text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::columns;

/// Comparison operators accepted in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (=)
    #[serde(rename = "=")]
    Eq,
    /// Not equal (!=)
    #[serde(rename = "!=")]
    NotEq,
    /// Greater than (>)
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal (>=)
    #[serde(rename = ">=")]
    GtEq,
    /// Less than (<)
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal (<=)
    #[serde(rename = "<=")]
    LtEq,
}

impl Operator {
    /// Returns the textual form used in query text and compiled conditions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
        }
    }

    /// Returns the logical complement of the operator.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Eq => Self::NotEq,
            Self::NotEq => Self::Eq,
            Self::Gt => Self::LtEq,
            Self::GtEq => Self::Lt,
            Self::Lt => Self::GtEq,
            Self::LtEq => Self::Gt,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical operators joining search terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOp {
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BooleanOp {
    /// Lower-case name used in compiled boolean conditions.
    #[must_use]
    pub fn condition_name(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl std::fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// The left-hand side of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchKey {
    /// Field name after key remapping. Aggregate keys keep the full call text.
    pub name: String,
    /// True when the key is an aggregate function call such as `count()`.
    #[serde(default)]
    pub aggregate: bool,
}

impl SearchKey {
    /// Creates a plain field key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aggregate: false,
        }
    }

    /// Creates an aggregate function key.
    pub fn aggregate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aggregate: true,
        }
    }

    /// Returns true when the key names a tag rather than a known column.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        !self.aggregate && (self.name.starts_with("tags[") || !columns::is_known_column(&self.name))
    }
}

impl std::fmt::Display for SearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A filter value with its inferred type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SearchValue {
    /// Raw string.
    String(String),
    /// String containing a `*`.
    Wildcard(String),
    /// Integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Duration in milliseconds.
    Duration(f64),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Set of strings.
    List(Vec<String>),
}

impl SearchValue {
    /// Creates a string value, typed as a wildcard when it contains a `*`.
    /// Escaped stars stay literal when the pattern is translated.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.contains('*') {
            Self::Wildcard(value)
        } else {
            Self::String(value)
        }
    }

    /// Returns true for the empty string, which `has:` filters compare against.
    #[must_use]
    pub fn is_empty_string(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }

    /// Returns true for wildcard patterns.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard(_))
    }
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl std::fmt::Display for SearchValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) | Self::Wildcard(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
            Self::Duration(ms) => write!(f, "{ms}ms"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// A single `key operator value` comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// The field being compared.
    pub key: SearchKey,
    /// The comparison operator.
    pub operator: Operator,
    /// The typed value.
    pub value: SearchValue,
}

impl SearchFilter {
    /// Creates a filter.
    pub fn new(key: SearchKey, operator: Operator, value: SearchValue) -> Self {
        Self {
            key,
            operator,
            value,
        }
    }
}

impl std::fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operator {
            Operator::Eq => write!(f, "{}:{}", self.key, self.value),
            Operator::NotEq => write!(f, "!{}:{}", self.key, self.value),
            op => write!(f, "{}:{}{}", self.key, op, self.value),
        }
    }
}

/// Two terms joined by a logical operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBoolean {
    /// Left operand.
    pub left: Box<SearchTerm>,
    /// The logical operator.
    pub operator: BooleanOp,
    /// Right operand.
    pub right: Box<SearchTerm>,
}

/// A node of the parsed search: a filter or a boolean combination of terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchTerm {
    /// A single filter.
    Filter(SearchFilter),
    /// A boolean combination.
    Boolean(SearchBoolean),
}

impl SearchTerm {
    /// Joins two terms with AND.
    #[must_use]
    pub fn and(left: SearchTerm, right: SearchTerm) -> Self {
        Self::combine(left, BooleanOp::And, right)
    }

    /// Joins two terms with OR.
    #[must_use]
    pub fn or(left: SearchTerm, right: SearchTerm) -> Self {
        Self::combine(left, BooleanOp::Or, right)
    }

    /// Joins two terms with the given operator.
    #[must_use]
    pub fn combine(left: SearchTerm, operator: BooleanOp, right: SearchTerm) -> Self {
        Self::Boolean(SearchBoolean {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    /// Returns true if any filter in the term has an aggregate key.
    #[must_use]
    pub fn has_aggregate(&self) -> bool {
        match self {
            Self::Filter(filter) => filter.key.aggregate,
            Self::Boolean(b) => b.left.has_aggregate() || b.right.has_aggregate(),
        }
    }

    /// Returns true if every filter in the term has an aggregate key.
    #[must_use]
    pub fn all_aggregate(&self) -> bool {
        match self {
            Self::Filter(filter) => filter.key.aggregate,
            Self::Boolean(b) => b.left.all_aggregate() && b.right.all_aggregate(),
        }
    }
}

impl From<SearchFilter> for SearchTerm {
    fn from(filter: SearchFilter) -> Self {
        Self::Filter(filter)
    }
}

impl std::fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filter(filter) => write!(f, "{filter}"),
            Self::Boolean(b) => write!(f, "({} {} {})", b.left, b.operator, b.right),
        }
    }
}
