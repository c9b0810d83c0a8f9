//! Filter-to-condition compiler.
//!
//! Turns search terms plus caller parameters into backend conditions,
//! `having` clauses and the project and issue id sets the query is scoped to.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::ast::{BooleanOp, Operator, SearchFilter, SearchKey, SearchTerm, SearchValue};
use super::columns;
use super::condition::{Condition, ConditionOp, Expr, Literal};
use super::error::{Result, SearchError};
use super::functions::resolve_function;
use super::params::QueryParams;
use super::values::{translate_like, translate_wildcard};
use super::visitor::SearchVisitor;

/// A compiled search, ready to hand to the query backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    /// Inclusive start of the time window.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive end of the time window.
    pub end: Option<DateTime<Utc>>,
    /// Row conditions, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Conditions on aggregate results.
    pub having: Vec<Condition>,
    /// Projects searched.
    pub project_ids: Vec<u64>,
    /// Issues searched; empty means all issues.
    pub group_ids: Vec<u64>,
}

impl Filter {
    /// Id sets the backend narrows the scan with.
    #[must_use]
    pub fn filter_keys(&self) -> BTreeMap<&'static str, Vec<u64>> {
        let mut keys = BTreeMap::new();
        if !self.project_ids.is_empty() {
            keys.insert("project_id", self.project_ids.clone());
        }
        if !self.group_ids.is_empty() {
            keys.insert("group_id", self.group_ids.clone());
        }
        keys
    }
}

/// Compiles a search query into a [`Filter`].
///
/// # Arguments
///
/// * `query` - The search text. May be empty.
/// * `params` - Caller context: project scope, time window, environments and
///   pre-resolved project slugs and issue short ids.
///
/// # Errors
///
/// Returns an error if the query does not parse or a filter cannot be
/// compiled. No partial filter is returned.
///
/// # Example
///
/// ```
/// use shared::search::{get_filter, QueryParams};
///
/// let params = QueryParams::new().with_project_ids([1, 2]);
/// let filter = get_filter("release:1.2.1 has:user.email", &params).unwrap();
/// assert_eq!(filter.conditions.len(), 2);
/// assert_eq!(filter.project_ids, vec![1, 2]);
/// ```
pub fn get_filter(query: &str, params: &QueryParams) -> Result<Filter> {
    let terms = SearchVisitor::new().with_params(params).visit(query)?;
    compile_filter(&terms, params)
}

/// Compiles already visited search terms into a [`Filter`].
///
/// Use this with a [`SearchVisitor`] configured with key mappings.
///
/// # Errors
///
/// Returns an error if a filter cannot be compiled.
pub fn compile_filter(terms: &[SearchTerm], params: &QueryParams) -> Result<Filter> {
    let mut compiler = FilterCompiler::new(params);
    for term in terms {
        compiler.add_term(term)?;
    }
    let filter = compiler.finish();

    tracing::debug!(
        terms = terms.len(),
        conditions = filter.conditions.len(),
        having = filter.having.len(),
        "Compiled search filter"
    );
    Ok(filter)
}

// ============================================================================
// Compiler
// ============================================================================

struct FilterCompiler<'p> {
    params: &'p QueryParams,
    conditions: Vec<Condition>,
    having: Vec<Condition>,
    project_ids: Vec<u64>,
    group_ids: Vec<u64>,
}

impl<'p> FilterCompiler<'p> {
    fn new(params: &'p QueryParams) -> Self {
        Self {
            params,
            conditions: Vec::new(),
            having: Vec::new(),
            project_ids: Vec::new(),
            group_ids: Vec::new(),
        }
    }

    fn add_term(&mut self, term: &SearchTerm) -> Result<()> {
        match term {
            SearchTerm::Filter(filter) => self.add_filter(filter),
            SearchTerm::Boolean(boolean) => {
                if !term.has_aggregate() {
                    let condition = self.boolean_condition(term, false)?;
                    self.conditions.push(condition);
                    Ok(())
                } else if term.all_aggregate() {
                    let condition = self.boolean_condition(term, true)?;
                    self.having.push(condition);
                    Ok(())
                } else if boolean.operator == BooleanOp::And {
                    self.add_term(&boolean.left)?;
                    self.add_term(&boolean.right)
                } else {
                    Err(SearchError::invalid(
                        "Having an OR between aggregate filters and normal filters is invalid.",
                    ))
                }
            }
        }
    }

    fn add_filter(&mut self, filter: &SearchFilter) -> Result<()> {
        if filter.key.aggregate {
            let condition = self.having_condition(filter)?;
            self.having.push(condition);
            return Ok(());
        }

        match (filter.key.name.as_str(), filter.operator, &filter.value) {
            ("issue.id", Operator::Eq, SearchValue::Integer(id)) => {
                self.group_ids.push(id_value(*id)?);
            }
            ("project.id" | "project_id", Operator::Eq, SearchValue::Integer(id)) => {
                let id = id_value(*id)?;
                if !self.params.project_ids.is_empty() && !self.params.project_ids.contains(&id) {
                    return Err(unknown_project(id));
                }
                self.project_ids.push(id);
            }
            ("project.name" | "project", Operator::Eq, _) => {
                let id = self.resolve_project(&filter.value)?;
                let condition = project_condition(Operator::Eq, id)?;
                self.project_ids.push(id);
                self.conditions.push(condition);
            }
            ("issue", Operator::Eq, _) => {
                let id = self.resolve_issue(&filter.value)?;
                self.group_ids.push(id);
            }
            ("user", Operator::NotEq, _) => {
                let conditions = self.user_conditions(filter)?;
                self.conditions.extend(conditions);
            }
            _ => {
                let condition = self.convert_filter(filter)?;
                self.conditions.push(condition);
            }
        }
        Ok(())
    }

    fn finish(self) -> Filter {
        let mut conditions = self.conditions;
        if let Some(condition) = environment_param_condition(&self.params.environments) {
            conditions.push(condition);
        }

        let project_ids = if self.project_ids.is_empty() {
            self.params.project_ids.clone()
        } else {
            dedup(self.project_ids)
        };
        let group_ids = if self.params.group_ids.is_empty() {
            dedup(self.group_ids)
        } else {
            self.params.group_ids.clone()
        };

        Filter {
            start: self.params.start,
            end: self.params.end,
            conditions,
            having: self.having,
            project_ids,
            group_ids,
        }
    }

    fn boolean_condition(&self, term: &SearchTerm, having: bool) -> Result<Condition> {
        match term {
            SearchTerm::Filter(filter) if having => self.having_condition(filter),
            SearchTerm::Filter(filter) => self.convert_filter(filter),
            SearchTerm::Boolean(boolean) => Ok(Condition::boolean(
                boolean.operator,
                self.boolean_condition(&boolean.left, having)?,
                self.boolean_condition(&boolean.right, having)?,
            )),
        }
    }

    fn having_condition(&self, filter: &SearchFilter) -> Result<Condition> {
        let resolved = resolve_function(&filter.key.name, Some(self.params))?;
        let value = match &filter.value {
            SearchValue::Timestamp(ts) => Literal::Integer(ts.timestamp()),
            other => literal(&resolved.alias, other),
        };
        Ok(Condition::clause(
            Expr::column(resolved.alias),
            filter.operator,
            value,
        ))
    }

    /// Converts a single non-aggregate filter into one condition.
    fn convert_filter(&self, filter: &SearchFilter) -> Result<Condition> {
        match filter.key.name.as_str() {
            "user" => {
                let conditions = self.user_conditions(filter)?;
                Ok(Condition::and_all(conditions).unwrap_or(Condition::Any(Vec::new())))
            }
            "project.name" | "project" => {
                let id = self.resolve_project(&filter.value)?;
                project_condition(filter.operator, id)
            }
            "issue" => {
                let id = self.resolve_issue(&filter.value)?;
                let id = i64::try_from(id).map_err(|_| invalid_issue(&filter.value))?;
                column_condition(&SearchFilter::new(
                    SearchKey::new("issue.id"),
                    filter.operator,
                    SearchValue::Integer(id),
                ))
            }
            "environment" => Ok(environment_condition(filter)),
            "message" => Ok(message_condition(filter)),
            "transaction.status" => status_condition(filter),
            _ => column_condition(filter),
        }
    }

    /// `user` matches any of the user columns; `!user` must match none.
    fn user_conditions(&self, filter: &SearchFilter) -> Result<Vec<Condition>> {
        let conditions = columns::USER_COLUMNS
            .iter()
            .map(|column| {
                self.convert_filter(&SearchFilter::new(
                    SearchKey::new(*column),
                    filter.operator,
                    filter.value.clone(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        if filter.operator == Operator::NotEq {
            return Ok(conditions);
        }

        let mut any = Vec::with_capacity(conditions.len());
        for condition in conditions {
            match condition {
                Condition::Any(inner) => any.extend(inner),
                other => any.push(other),
            }
        }
        Ok(vec![Condition::Any(any)])
    }

    fn resolve_project(&self, value: &SearchValue) -> Result<u64> {
        let slug = value.to_string();
        self.params
            .selected_projects()
            .into_iter()
            .find(|project| project.slug == slug)
            .map(|project| project.id)
            .ok_or_else(|| unknown_project(slug))
    }

    fn resolve_issue(&self, value: &SearchValue) -> Result<u64> {
        self.params
            .issue_short_ids
            .get(&value.to_string())
            .copied()
            .ok_or_else(|| invalid_issue(value))
    }
}

// ============================================================================
// Condition builders
// ============================================================================

fn unknown_project(project: impl std::fmt::Display) -> SearchError {
    SearchError::invalid(format!(
        "Invalid query. Project {project} does not exist or is not an actively selected project."
    ))
}

fn invalid_issue(value: &SearchValue) -> SearchError {
    SearchError::invalid(format!("Invalid value '{value}' for 'issue:' filter"))
}

fn id_value(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| SearchError::invalid(format!("{id} is not a valid id")))
}

fn dedup(mut ids: Vec<u64>) -> Vec<u64> {
    let mut seen = std::collections::BTreeSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}

fn is_null(column: &str) -> Expr {
    Expr::function("isNull", vec![Expr::column(column)])
}

/// Wraps a `!=` clause so rows where the column is null also match.
fn null_aware(column: &str, clause: Condition) -> Condition {
    Condition::Any(vec![
        Condition::clause(is_null(column), ConditionOp::Eq, Literal::Integer(1)),
        clause,
    ])
}

fn project_condition(operator: Operator, id: u64) -> Result<Condition> {
    let value = i64::try_from(id)
        .map_err(|_| SearchError::invalid(format!("{id} is not a valid id")))?;
    let clause = Condition::clause(Expr::column("project_id"), operator, Literal::Integer(value));
    if operator == Operator::NotEq {
        Ok(null_aware("project_id", clause))
    } else {
        Ok(clause)
    }
}

fn literal(column: &str, value: &SearchValue) -> Literal {
    match value {
        SearchValue::String(s) | SearchValue::Wildcard(s) => Literal::string(s.as_str()),
        SearchValue::Integer(i) => Literal::Integer(*i),
        SearchValue::Float(f) => Literal::Float(*f),
        SearchValue::Duration(ms) => Literal::number(*ms),
        SearchValue::Timestamp(ts) if column == "timestamp" => {
            Literal::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        SearchValue::Timestamp(ts) => Literal::Integer(ts.timestamp_millis()),
        SearchValue::List(values) => Literal::List(values.clone()),
    }
}

/// Lists compare by membership.
fn comparison_op(value: &SearchValue, operator: Operator) -> ConditionOp {
    match (value, operator) {
        (SearchValue::List(_), Operator::Eq) => ConditionOp::In,
        (SearchValue::List(_), Operator::NotEq) => ConditionOp::NotIn,
        (_, operator) => operator.into(),
    }
}

fn environment_condition(filter: &SearchFilter) -> Condition {
    let column = Expr::column("environment");
    let clause = if filter.value.is_empty_string() {
        let op = if filter.operator == Operator::NotEq {
            ConditionOp::IsNotNull
        } else {
            ConditionOp::IsNull
        };
        Condition::clause(column, op, Literal::Null)
    } else {
        Condition::clause(
            column,
            comparison_op(&filter.value, filter.operator),
            literal("environment", &filter.value),
        )
    };
    Condition::Any(vec![clause])
}

/// Compiles the caller's environment list. The empty name matches events
/// without an environment.
fn environment_param_condition(environments: &[String]) -> Option<Condition> {
    if environments.is_empty() {
        return None;
    }

    let mut any = Vec::new();
    if environments.iter().any(String::is_empty) {
        any.push(Condition::clause(
            Expr::column("environment"),
            ConditionOp::IsNull,
            Literal::Null,
        ));
    }

    let named: Vec<String> = environments
        .iter()
        .filter(|env| !env.is_empty())
        .cloned()
        .collect();
    match named.as_slice() {
        [] => {}
        [single] => any.push(Condition::clause(
            Expr::column("environment"),
            ConditionOp::Eq,
            Literal::string(single.as_str()),
        )),
        _ => any.push(Condition::clause(
            Expr::column("environment"),
            ConditionOp::In,
            Literal::List(named),
        )),
    }
    Some(Condition::Any(any))
}

fn message_condition(filter: &SearchFilter) -> Condition {
    let text = filter.value.to_string();
    let negated = filter.operator == Operator::NotEq;

    if filter.value.is_wildcard() {
        let regex = translate_wildcard(&text);
        let regex = regex
            .strip_prefix('^')
            .and_then(|r| r.strip_suffix('$'))
            .unwrap_or(&regex);
        Condition::clause(
            Expr::function(
                "match",
                vec![Expr::column("message"), Expr::quoted(format!("(?i){regex}"))],
            ),
            filter.operator,
            Literal::Integer(1),
        )
    } else if text.is_empty() {
        Condition::clause(
            Expr::function("equals", vec![Expr::column("message"), Expr::quoted("")]),
            filter.operator,
            Literal::Integer(1),
        )
    } else {
        let op = if negated { ConditionOp::Eq } else { ConditionOp::NotEq };
        Condition::clause(
            Expr::function(
                "positionCaseInsensitive",
                vec![Expr::column("message"), Expr::quoted(text)],
            ),
            op,
            Literal::Integer(0),
        )
    }
}

fn status_condition(filter: &SearchFilter) -> Result<Condition> {
    let code = match &filter.value {
        SearchValue::String(name) => columns::span_status_code(name),
        _ => None,
    }
    .ok_or_else(|| {
        SearchError::invalid(format!(
            "Invalid value for transaction.status condition. Accepted values are {}",
            columns::span_status_names()
        ))
    })?;

    Ok(Condition::clause(
        Expr::column("transaction.status"),
        filter.operator,
        Literal::Integer(code),
    ))
}

fn column_condition(filter: &SearchFilter) -> Result<Condition> {
    let name = filter.key.name.as_str();
    let is_tag = filter.key.is_tag();

    if filter.value.is_wildcard() {
        if name == "id" {
            return Err(SearchError::invalid(
                "Wildcard conditions are not permitted on `id` field.",
            ));
        }
        if columns::is_array_column(name) {
            let op = if filter.operator == Operator::NotEq {
                ConditionOp::NotLike
            } else {
                ConditionOp::Like
            };
            let pattern = translate_like(&filter.value.to_string());
            return Ok(Condition::clause(
                Expr::column(name),
                op,
                Literal::String(pattern),
            ));
        }
    }

    if filter.value.is_empty_string() && !is_tag {
        let op = if filter.operator == Operator::Eq {
            ConditionOp::Eq
        } else {
            ConditionOp::NotEq
        };
        return Ok(Condition::clause(is_null(name), op, Literal::Integer(1)));
    }

    let lhs = if is_tag {
        Expr::function("ifNull", vec![Expr::column(name), Expr::quoted("")])
    } else {
        Expr::column(name)
    };

    let clause = if filter.value.is_wildcard() {
        let regex = translate_wildcard(&filter.value.to_string());
        Condition::clause(
            Expr::function("match", vec![lhs, Expr::quoted(format!("(?i){regex}"))]),
            filter.operator,
            Literal::Integer(1),
        )
    } else {
        Condition::clause(
            lhs,
            comparison_op(&filter.value, filter.operator),
            literal(name, &filter.value),
        )
    };

    if filter.operator == Operator::NotEq && !is_tag {
        Ok(null_aware(name, clause))
    } else {
        Ok(clause)
    }
}
