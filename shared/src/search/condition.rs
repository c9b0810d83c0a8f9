//! Compiled conditions, expressions and aggregations.
//!
//! These serialize to the nested-list shape the query backend accepts:
//!
//! - a clause is `[lhs, op, literal]`
//! - an expression is `[function, [args...]]`
//! - an OR group is a list of clauses
//! - a boolean is `["and" | "or", [left, right]]`
//! - an aggregation is `[function, column, alias]`

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use super::ast::{BooleanOp, Operator};

/// A literal on the right-hand side of a clause or inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// Integer.
    Integer(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
    /// Set of strings, serialized sorted.
    List(Vec<String>),
}

impl Literal {
    /// Creates a number literal, integral values as integers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn number(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Self::Integer(value as i64)
        } else {
            Self::Float(value)
        }
    }

    /// Creates a string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(values) => {
                let mut sorted: Vec<&String> = values.iter().collect();
                sorted.sort();
                sorted.dedup();
                serializer.collect_seq(sorted)
            }
        }
    }
}

/// A column reference or function expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column name.
    Column(String),
    /// A string literal rendered single-quoted, as functions expect.
    Quoted(String),
    /// A bare literal.
    Literal(Literal),
    /// A function applied to arguments.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// References a column.
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// A single-quoted string argument.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self::Quoted(value.into())
    }

    /// A number argument.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Literal(Literal::number(value))
    }

    /// Applies a function.
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Column(name) => serializer.serialize_str(name),
            Self::Quoted(value) => {
                serializer.serialize_str(&format!("'{}'", value.replace('\'', "\\'")))
            }
            Self::Literal(literal) => literal.serialize(serializer),
            Self::Function { name, args } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(name)?;
                seq.serialize_element(args)?;
                seq.end()
            }
        }
    }
}

/// Operators of compiled clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionOp {
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    NotEq,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    GtEq,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    LtEq,
    /// `LIKE`
    #[serde(rename = "LIKE")]
    Like,
    /// `NOT LIKE`
    #[serde(rename = "NOT LIKE")]
    NotLike,
    /// `IN`
    #[serde(rename = "IN")]
    In,
    /// `NOT IN`
    #[serde(rename = "NOT IN")]
    NotIn,
    /// `IS NULL`
    #[serde(rename = "IS NULL")]
    IsNull,
    /// `IS NOT NULL`
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl From<Operator> for ConditionOp {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Eq => Self::Eq,
            Operator::NotEq => Self::NotEq,
            Operator::Gt => Self::Gt,
            Operator::GtEq => Self::GtEq,
            Operator::Lt => Self::Lt,
            Operator::LtEq => Self::LtEq,
        }
    }
}

/// A compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `[lhs, op, rhs]`
    Clause {
        /// Column or expression compared.
        lhs: Expr,
        /// Comparison.
        op: ConditionOp,
        /// Compared value.
        rhs: Literal,
    },
    /// Clauses of which at least one must hold.
    Any(Vec<Condition>),
    /// Two conditions joined by a logical operator.
    Boolean {
        /// Logical operator.
        op: BooleanOp,
        /// Left operand.
        left: Box<Condition>,
        /// Right operand.
        right: Box<Condition>,
    },
}

impl Condition {
    /// Creates a clause.
    pub fn clause(lhs: Expr, op: impl Into<ConditionOp>, rhs: Literal) -> Self {
        Self::Clause {
            lhs,
            op: op.into(),
            rhs,
        }
    }

    /// Joins two conditions with a logical operator.
    #[must_use]
    pub fn boolean(op: BooleanOp, left: Condition, right: Condition) -> Self {
        Self::Boolean {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Joins conditions with AND, nesting to the right.
    #[must_use]
    pub fn and_all(mut conditions: Vec<Condition>) -> Option<Self> {
        let last = conditions.pop()?;
        Some(conditions.into_iter().rev().fold(last, |right, left| {
            Self::boolean(BooleanOp::And, left, right)
        }))
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Clause { lhs, op, rhs } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(lhs)?;
                seq.serialize_element(op)?;
                seq.serialize_element(rhs)?;
                seq.end()
            }
            Self::Any(conditions) => serializer.collect_seq(conditions),
            Self::Boolean { op, left, right } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(op.condition_name())?;
                seq.serialize_element(&[left.as_ref(), right.as_ref()])?;
                seq.end()
            }
        }
    }
}

/// The column argument of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateColumn {
    /// No column (`null`).
    None,
    /// A single column.
    Single(String),
    /// Several columns, as `argMax` takes.
    Multiple(Vec<String>),
}

impl Serialize for AggregateColumn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_none(),
            Self::Single(column) => serializer.serialize_str(column),
            Self::Multiple(columns) => serializer.collect_seq(columns),
        }
    }
}

/// An aggregation: function expression, column and result alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Aggregate function, possibly a full expression.
    pub function: String,
    /// Column argument.
    pub column: AggregateColumn,
    /// Result alias.
    pub alias: String,
}

impl Aggregation {
    /// Creates an aggregation.
    pub fn new(function: impl Into<String>, column: AggregateColumn, alias: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            column,
            alias: alias.into(),
        }
    }
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.function)?;
        seq.serialize_element(&self.column)?;
        seq.serialize_element(&self.alias)?;
        seq.end()
    }
}

/// A selected column: a plain column or an aliased expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectedColumn {
    /// A plain column.
    Column(String),
    /// An expression selected under an alias, serialized as
    /// `[function, [args...], alias]`.
    Expression {
        /// Outer function name.
        function: String,
        /// Function arguments.
        args: Vec<Expr>,
        /// Result alias.
        alias: String,
    },
}

impl SelectedColumn {
    /// The name the column is referenced by in group-by and order-by.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Column(name) => name,
            Self::Expression { alias, .. } => alias,
        }
    }
}

impl Serialize for SelectedColumn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Column(name) => serializer.serialize_str(name),
            Self::Expression {
                function,
                args,
                alias,
            } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(function)?;
                seq.serialize_element(args)?;
                seq.serialize_element(alias)?;
                seq.end()
            }
        }
    }
}
