//! Aggregate function registry.
//!
//! Each function declares its arguments, how they are validated and what
//! aggregation or expression a call expands into. Calls are written
//! `name(arg, arg)` and resolved by [`resolve_function`].

use std::sync::LazyLock;

use regex::Regex;

use super::columns;
use super::condition::{AggregateColumn, Aggregation, Expr, SelectedColumn};
use super::error::{Result, SearchError};
use super::params::QueryParams;
use super::values::format_number;

static FUNCTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<function>[^()]+)\((?P<columns>[^()]*)\)$").unwrap_or_else(|e| {
        unreachable!("function pattern is valid: {e}")
    })
});

/// Returns true if `field` looks like a function call.
#[must_use]
pub fn is_function(field: &str) -> bool {
    FUNCTION_PATTERN.is_match(field)
}

// ============================================================================
// Argument specifications
// ============================================================================

/// How an argument is validated and normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgumentKind {
    /// Any column; field aliases are replaced by their column.
    CountColumn,
    /// A known column holding numbers or timestamps.
    NumericColumn,
    /// A known duration column.
    DurationColumn,
    /// A number in `[min, max)`.
    Number {
        /// Inclusive lower bound.
        min: Option<f64>,
        /// Exclusive upper bound.
        max: Option<f64>,
    },
}

/// What an argument defaults to when a one-argument function is called bare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentDefault {
    /// The argument is required.
    Required,
    /// Defaults to no column.
    Null,
    /// Defaults to the length of the query window in seconds.
    TimeWindow,
}

/// A declared function argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgumentSpec {
    /// Name used in error messages.
    pub name: &'static str,
    /// Validation.
    pub kind: ArgumentKind,
    /// Default value.
    pub default: ArgumentDefault,
}

const fn arg(name: &'static str, kind: ArgumentKind) -> ArgumentSpec {
    ArgumentSpec {
        name,
        kind,
        default: ArgumentDefault::Required,
    }
}

const fn number(name: &'static str, min: Option<f64>, max: Option<f64>) -> ArgumentSpec {
    arg(name, ArgumentKind::Number { min, max })
}

const fn with_default(spec: ArgumentSpec, default: ArgumentDefault) -> ArgumentSpec {
    ArgumentSpec {
        name: spec.name,
        kind: spec.kind,
        default,
    }
}

/// A normalized argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// A column name.
    Column(String),
    /// A number.
    Number(f64),
    /// No value.
    Null,
}

/// Normalized arguments of a call, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments(Vec<ArgumentValue>);

impl Arguments {
    fn column(&self, index: usize) -> Option<&str> {
        match self.0.get(index) {
            Some(ArgumentValue::Column(c)) => Some(c),
            _ => None,
        }
    }

    fn number(&self, index: usize) -> f64 {
        match self.0.get(index) {
            Some(ArgumentValue::Number(n)) => *n,
            _ => 0.0,
        }
    }

    fn formatted(&self, index: usize) -> String {
        format_number(self.number(index))
    }
}

// ============================================================================
// Function table
// ============================================================================

/// What a resolved call expands into.
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// An aggregate function applied to a column.
    Aggregate {
        /// Aggregate function or full expression.
        function: String,
        /// Column argument.
        column: AggregateColumn,
    },
    /// A per-row expression selected as a column.
    Column {
        /// Outer function name.
        function: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

/// A registered function.
#[derive(Debug)]
pub struct FunctionSpec {
    /// Function name, case-sensitive.
    pub name: &'static str,
    /// Declared arguments.
    pub args: &'static [ArgumentSpec],
    /// Display type of the result, when it differs from the column's.
    pub result_type: Option<&'static str>,
    expand: fn(&Arguments) -> Expansion,
}

fn aggregate(function: impl Into<String>, column: AggregateColumn) -> Expansion {
    Expansion::Aggregate {
        function: function.into(),
        column,
    }
}

fn first_column(args: &Arguments) -> AggregateColumn {
    args.column(0)
        .map_or(AggregateColumn::None, |c| AggregateColumn::Single(c.to_string()))
}

fn quantile(level: &str) -> Expansion {
    aggregate(
        format!("quantile({level})"),
        AggregateColumn::Single("transaction.duration".to_string()),
    )
}

const COUNT_COLUMN: ArgumentSpec = arg("column", ArgumentKind::CountColumn);
const NUMERIC_COLUMN: ArgumentSpec = arg("column", ArgumentKind::NumericColumn);
const DURATION_COLUMN: ArgumentSpec = arg("column", ArgumentKind::DurationColumn);
const SATISFACTION: ArgumentSpec = number("satisfaction", Some(0.0), None);

static FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "count_unique",
        args: &[COUNT_COLUMN],
        result_type: Some("integer"),
        expand: |args| aggregate("uniq", first_column(args)),
    },
    FunctionSpec {
        name: "count",
        args: &[with_default(COUNT_COLUMN, ArgumentDefault::Null)],
        result_type: Some("integer"),
        expand: |_| aggregate("count", AggregateColumn::None),
    },
    FunctionSpec {
        name: "min",
        args: &[NUMERIC_COLUMN],
        result_type: None,
        expand: |args| aggregate("min", first_column(args)),
    },
    FunctionSpec {
        name: "max",
        args: &[NUMERIC_COLUMN],
        result_type: None,
        expand: |args| aggregate("max", first_column(args)),
    },
    FunctionSpec {
        name: "avg",
        args: &[DURATION_COLUMN],
        result_type: Some("duration"),
        expand: |args| aggregate("avg", first_column(args)),
    },
    FunctionSpec {
        name: "sum",
        args: &[DURATION_COLUMN],
        result_type: Some("duration"),
        expand: |args| aggregate("sum", first_column(args)),
    },
    FunctionSpec {
        name: "percentile",
        args: &[DURATION_COLUMN, number("percentile", Some(0.0), Some(1.0))],
        result_type: Some("duration"),
        expand: |args| {
            aggregate(
                format!("quantile({})", args.formatted(1)),
                first_column(args),
            )
        },
    },
    FunctionSpec {
        name: "p50",
        args: &[],
        result_type: Some("duration"),
        expand: |_| quantile("0.5"),
    },
    FunctionSpec {
        name: "p75",
        args: &[],
        result_type: Some("duration"),
        expand: |_| quantile("0.75"),
    },
    FunctionSpec {
        name: "p95",
        args: &[],
        result_type: Some("duration"),
        expand: |_| quantile("0.95"),
    },
    FunctionSpec {
        name: "p99",
        args: &[],
        result_type: Some("duration"),
        expand: |_| quantile("0.99"),
    },
    FunctionSpec {
        name: "p100",
        args: &[],
        result_type: Some("duration"),
        expand: |_| quantile("1"),
    },
    FunctionSpec {
        name: "rps",
        args: &[with_default(
            number("interval", Some(1.0), None),
            ArgumentDefault::TimeWindow,
        )],
        result_type: Some("number"),
        expand: |args| {
            aggregate(
                format!("divide(count(), {})", args.formatted(0)),
                AggregateColumn::None,
            )
        },
    },
    FunctionSpec {
        name: "rpm",
        args: &[with_default(
            number("interval", Some(60.0), None),
            ArgumentDefault::TimeWindow,
        )],
        result_type: Some("number"),
        expand: |args| {
            aggregate(
                format!("divide(count(), divide({}, 60))", args.formatted(0)),
                AggregateColumn::None,
            )
        },
    },
    FunctionSpec {
        name: "last_seen",
        args: &[],
        result_type: Some("date"),
        expand: |_| aggregate("max", AggregateColumn::Single("timestamp".to_string())),
    },
    FunctionSpec {
        name: "latest_event",
        args: &[],
        result_type: Some("string"),
        expand: |_| {
            aggregate(
                "argMax",
                AggregateColumn::Multiple(vec!["id".to_string(), "timestamp".to_string()]),
            )
        },
    },
    FunctionSpec {
        name: "apdex",
        args: &[SATISFACTION],
        result_type: Some("number"),
        expand: |args| {
            aggregate(
                format!("apdex(duration, {})", args.formatted(0)),
                AggregateColumn::None,
            )
        },
    },
    FunctionSpec {
        name: "impact",
        args: &[SATISFACTION],
        result_type: Some("number"),
        expand: |args| {
            let satisfied = args.formatted(0);
            let tolerated = format_number(args.number(0) * 4.0);
            aggregate(
                format!(
                    "plus(minus(1, divide(plus(countIf(less(duration, {satisfied})),\
                     divide(countIf(and(greater(duration, {satisfied}),\
                     less(duration, {tolerated}))),2)),count())),\
                     multiply(minus(1,divide(1,sqrt(uniq(user)))),3))"
                ),
                AggregateColumn::None,
            )
        },
    },
    FunctionSpec {
        name: "user_misery",
        args: &[SATISFACTION],
        result_type: Some("number"),
        expand: |args| {
            aggregate(
                format!(
                    "uniqIf(user, duration > {})",
                    format_number(args.number(0) * 4.0)
                ),
                AggregateColumn::None,
            )
        },
    },
    FunctionSpec {
        name: "error_rate",
        args: &[],
        result_type: Some("percentage"),
        expand: |_| {
            aggregate(
                "divide(countIf(notIn(transaction_status, tuple(0, 1, 2))), count())",
                AggregateColumn::None,
            )
        },
    },
    FunctionSpec {
        name: "histogram",
        args: &[
            DURATION_COLUMN,
            number("num_buckets", Some(1.0), Some(500.0)),
            number("bucket_size", Some(1.0), None),
            number("start_offset", Some(0.0), None),
        ],
        result_type: Some("number"),
        expand: histogram,
    },
];

fn histogram(args: &Arguments) -> Expansion {
    let size = args.number(2);
    let offset = args.number(3);
    let column = Expr::column(args.column(0).unwrap_or("transaction.duration"));

    let shifted = if offset == 0.0 {
        column
    } else {
        Expr::function("minus", vec![column, Expr::number(offset)])
    };
    let bucket = Expr::function(
        "floor",
        vec![Expr::function("divide", vec![shifted, Expr::number(size)])],
    );

    if offset == 0.0 {
        Expansion::Column {
            function: "multiply".to_string(),
            args: vec![bucket, Expr::number(size)],
        }
    } else {
        Expansion::Column {
            function: "plus".to_string(),
            args: vec![
                Expr::function("multiply", vec![bucket, Expr::number(size)]),
                Expr::number(offset),
            ],
        }
    }
}

/// Looks up a registered function by exact name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Iterates over every registered function.
pub fn registered() -> impl Iterator<Item = &'static FunctionSpec> {
    FUNCTIONS.iter()
}

// ============================================================================
// Resolution
// ============================================================================

/// A function call resolved against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFunction {
    /// Function name.
    pub name: &'static str,
    /// Normalized arguments.
    pub arguments: Arguments,
    /// Result alias.
    pub alias: String,
    /// What the call expands into.
    pub expansion: Expansion,
}

impl ResolvedFunction {
    /// The column an aggregate is computed over, if any.
    #[must_use]
    pub fn aggregate_column(&self) -> Option<&str> {
        match &self.expansion {
            Expansion::Aggregate {
                column: AggregateColumn::Single(column),
                ..
            } => Some(column),
            _ => None,
        }
    }

    /// Renames the result.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// The aggregation this call expands into, if it is an aggregate.
    #[must_use]
    pub fn to_aggregation(&self) -> Option<Aggregation> {
        match &self.expansion {
            Expansion::Aggregate { function, column } => Some(Aggregation::new(
                function.clone(),
                column.clone(),
                self.alias.clone(),
            )),
            Expansion::Column { .. } => None,
        }
    }

    /// The selected column this call expands into, if it is an expression.
    #[must_use]
    pub fn to_selected_column(&self) -> Option<SelectedColumn> {
        match &self.expansion {
            Expansion::Column { function, args } => Some(SelectedColumn::Expression {
                function: function.clone(),
                args: args.clone(),
                alias: self.alias.clone(),
            }),
            Expansion::Aggregate { .. } => None,
        }
    }
}

/// Computes the alias of a call: `name_arg1_arg2` with every non-word
/// character replaced by `_` and trailing underscores removed.
#[must_use]
pub fn function_alias(name: &str, arguments: &[&str]) -> String {
    let raw = format!("{name}_{}", arguments.join("_"));
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>()
        .trim_end_matches('_')
        .to_string()
}

/// Resolves a call such as `percentile(transaction.duration, 0.95)`.
///
/// # Errors
///
/// Returns an error if the function is unknown, the argument count is wrong,
/// an argument fails validation or a default cannot be computed.
pub fn resolve_function(field: &str, params: Option<&QueryParams>) -> Result<ResolvedFunction> {
    let captures = FUNCTION_PATTERN
        .captures(field)
        .ok_or_else(|| SearchError::invalid(format!("{field} is not a valid function")))?;
    let name = captures.name("function").map_or("", |m| m.as_str());
    let spec = lookup(name)
        .ok_or_else(|| SearchError::invalid(format!("{field} is not a valid function")))?;

    let raw: Vec<&str> = captures
        .name("columns")
        .map_or("", |m| m.as_str())
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let arguments = if raw.is_empty() && spec.args.len() == 1 && spec.args[0].default != ArgumentDefault::Required {
        let default = default_argument(field, &spec.args[0], params)?;
        Arguments(vec![default])
    } else {
        if raw.len() != spec.args.len() {
            return Err(SearchError::invalid(format!(
                "{field}: expected {} arguments",
                spec.args.len()
            )));
        }
        let values = spec
            .args
            .iter()
            .zip(&raw)
            .map(|(arg, value)| {
                normalize(arg, value).map_err(|reason| {
                    SearchError::invalid(format!("{field}: {} argument invalid: {reason}", arg.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Arguments(values)
    };

    let alias = function_alias(name, &raw);
    let expansion = (spec.expand)(&arguments);

    Ok(ResolvedFunction {
        name: spec.name,
        arguments,
        alias,
        expansion,
    })
}

fn default_argument(
    field: &str,
    arg: &ArgumentSpec,
    params: Option<&QueryParams>,
) -> Result<ArgumentValue> {
    match arg.default {
        ArgumentDefault::Null => Ok(ArgumentValue::Null),
        ArgumentDefault::TimeWindow => {
            let seconds = params.and_then(QueryParams::window_seconds).ok_or_else(|| {
                SearchError::invalid(format!(
                    "{field}: invalid arguments: function called without default"
                ))
            })?;
            if seconds <= 0 {
                return Err(SearchError::invalid(format!(
                    "{field}: invalid arguments: function called with invalid default"
                )));
            }
            #[allow(clippy::cast_precision_loss)]
            let seconds = seconds as f64;
            normalize(arg, &format_number(seconds)).map_err(|reason| {
                SearchError::invalid(format!("{field}: {} argument invalid: {reason}", arg.name))
            })
        }
        ArgumentDefault::Required => Err(SearchError::invalid(format!(
            "{field}: expected 1 arguments"
        ))),
    }
}

fn normalize(arg: &ArgumentSpec, value: &str) -> std::result::Result<ArgumentValue, String> {
    match arg.kind {
        ArgumentKind::CountColumn => Ok(ArgumentValue::Column(
            columns::column_alias(value).unwrap_or(value).to_string(),
        )),
        ArgumentKind::NumericColumn => {
            if !columns::is_known_column(value) {
                Err(format!("{value} is not a valid column"))
            } else if !columns::is_numeric_column(value) {
                Err(format!("{value} is not a numeric column"))
            } else {
                Ok(ArgumentValue::Column(value.to_string()))
            }
        }
        ArgumentKind::DurationColumn => {
            if !columns::is_known_column(value) {
                Err(format!("{value} is not a valid column"))
            } else if !columns::is_duration_column(value) {
                Err(format!("{value} is not a duration column"))
            } else {
                Ok(ArgumentValue::Column(value.to_string()))
            }
        }
        ArgumentKind::Number { min, max } => {
            let number: f64 = value
                .parse()
                .ok()
                .filter(|number: &f64| number.is_finite())
                .ok_or_else(|| format!("{value} is not a number"))?;
            if let Some(min) = min.filter(|min| number < *min) {
                return Err(format!(
                    "{} must be greater than or equal to {}",
                    format_number(number),
                    format_number(min)
                ));
            }
            if let Some(max) = max.filter(|max| number >= *max) {
                return Err(format!(
                    "{} must be less than {}",
                    format_number(number),
                    format_number(max)
                ));
            }
            Ok(ArgumentValue::Number(number))
        }
    }
}
