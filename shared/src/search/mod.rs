//! Event search query language.
//!
//! This module parses the search bar syntax used to filter events and
//! compiles it into backend conditions, together with the field list that
//! decides which columns and aggregates a query returns.
//!
//! # Supported Syntax
//!
//! ```text
//! user.email:foo@example.com release:1.2.1 fatal error
//! !has:release transaction.duration:>500ms
//! (browser:chrome OR browser:firefox) AND count():>10
//! timestamp:-24h event.type:[error,default]
//! ```
//!
//! # Example
//!
//! ```
//! use shared::search::{prepare_query, FieldEntry, QueryParams};
//!
//! let params = QueryParams::new().with_project_ids([1]);
//! let fields = vec![FieldEntry::from("title"), FieldEntry::from("count()")];
//! let query = prepare_query("release:1.2.1", &fields, &params).unwrap();
//! assert_eq!(query.filter.conditions.len(), 1);
//! assert_eq!(query.fields.groupby, vec!["title"]);
//! ```

mod ast;
mod boolean;
mod columns;
mod condition;
mod error;
mod fields;
mod filter;
mod functions;
mod params;
mod parser;
mod values;
mod visitor;

use std::collections::BTreeMap;

use serde::Serialize;

pub use ast::*;
pub use boolean::build_boolean_tree;
pub use columns::{field_alias, FieldAlias};
pub use condition::{AggregateColumn, Aggregation, Condition, ConditionOp, Expr, Literal, SelectedColumn};
pub use error::{Result, SearchError};
pub use fields::{json_meta_type, resolve_field_list, FieldEntry, ResolvedFields};
pub use filter::{compile_filter, get_filter, Filter};
pub use functions::{
    function_alias, is_function, resolve_function, ArgumentDefault, ArgumentKind, ArgumentSpec,
    ArgumentValue, Arguments, Expansion, FunctionSpec, ResolvedFunction,
};
pub use params::{ProjectRef, QueryParams};
pub use visitor::SearchVisitor;

/// The formal grammar of the search syntax.
pub const GRAMMAR: &str = include_str!("grammar.peg");

/// Parses a search query into terms without compiling it.
///
/// # Errors
///
/// Returns an error if the query has a syntax error or a value does not fit
/// its key.
///
/// # Example
///
/// ```
/// use shared::search::{parse_search_query, SearchTerm};
///
/// let terms = parse_search_query("user.email:foo@example.com release:1.2.1").unwrap();
/// assert_eq!(terms.len(), 2);
/// assert!(matches!(terms[0], SearchTerm::Filter(_)));
/// ```
pub fn parse_search_query(query: &str) -> Result<Vec<SearchTerm>> {
    SearchVisitor::new().visit(query)
}

/// A compiled filter together with the resolved field list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventQuery {
    /// Conditions and scope.
    pub filter: Filter,
    /// Id sets the backend narrows the scan with.
    pub filter_keys: BTreeMap<&'static str, Vec<u64>>,
    /// Selected columns, aggregations and ordering.
    pub fields: ResolvedFields,
    /// Rollup interval in seconds, for time-series queries.
    pub rollup: Option<u64>,
}

impl EventQuery {
    /// Assembles a query from its compiled parts.
    #[must_use]
    pub fn new(filter: Filter, fields: ResolvedFields, rollup: Option<u64>) -> Self {
        Self {
            filter_keys: filter.filter_keys(),
            filter,
            fields,
            rollup,
        }
    }
}

/// Compiles a search query and resolves the requested fields.
///
/// # Arguments
///
/// * `query` - The search text.
/// * `fields` - Fields to display.
/// * `params` - Caller context shared by both steps.
///
/// # Errors
///
/// Returns the first error from compiling the query or resolving the fields.
pub fn prepare_query(query: &str, fields: &[FieldEntry], params: &QueryParams) -> Result<EventQuery> {
    let filter = get_filter(query, params)?;
    let fields = resolve_field_list(fields, params)?;

    tracing::debug!(
        conditions = filter.conditions.len(),
        having = filter.having.len(),
        aggregations = fields.aggregations.len(),
        "Prepared event query"
    );

    Ok(EventQuery::new(filter, fields, params.rollup))
}
