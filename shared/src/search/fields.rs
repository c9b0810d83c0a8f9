//! Field list resolution.
//!
//! Expands the fields a caller asks to display into selected columns,
//! aggregations, group-by and order-by lists, adding the automatic fields
//! result rows need to link back to events and projects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::columns::{self, FieldAlias};
use super::condition::{AggregateColumn, Aggregation, SelectedColumn};
use super::error::{Result, SearchError};
use super::functions::{self, ResolvedFunction};
use super::params::QueryParams;

/// A requested field. Anything other than a string is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    /// A field name, alias or function call.
    Name(String),
    /// Any other JSON value.
    Other(serde_json::Value),
}

impl From<&str> for FieldEntry {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FieldEntry {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Columns, aggregations and ordering a field list resolves to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedFields {
    /// Columns and expressions selected per row.
    pub selected_columns: Vec<SelectedColumn>,
    /// Aggregations computed per group.
    pub aggregations: Vec<Aggregation>,
    /// Group-by column names.
    pub groupby: Vec<String>,
    /// Order-by names, `-` prefixed when descending.
    pub orderby: Vec<String>,
}

impl ResolvedFields {
    fn has_column(&self, name: &str) -> bool {
        self.selected_columns.iter().any(|c| c.name() == name)
    }

    fn has_aggregation(&self, alias: &str) -> bool {
        self.aggregations.iter().any(|a| a.alias == alias)
    }

    fn push_resolved(&mut self, resolved: &ResolvedFunction) {
        if let Some(aggregation) = resolved.to_aggregation() {
            self.aggregations.push(aggregation);
        } else if let Some(column) = resolved.to_selected_column() {
            self.selected_columns.push(column);
        }
    }
}

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '[' | ']' | '(' | ')' | ',' | ' ' | ':')
}

/// Resolves the requested display fields.
///
/// # Errors
///
/// Returns an error for non-string or malformed fields, unknown or invalid
/// function calls, a rollup without any aggregate, or an order-by on a field
/// that is not selected.
pub fn resolve_field_list(fields: &[FieldEntry], params: &QueryParams) -> Result<ResolvedFields> {
    let mut resolved = ResolvedFields::default();
    let mut project_key: Option<String> = None;
    // Requested field text to the name it is selected under.
    let mut names: HashMap<String, String> = HashMap::new();

    for entry in fields {
        let field = match entry {
            FieldEntry::Name(name) => name.trim(),
            FieldEntry::Other(_) => return Err(SearchError::invalid("Field names must be strings")),
        };
        if field.is_empty() {
            continue;
        }
        if !field.chars().all(is_field_char) {
            return Err(SearchError::invalid(format!("Invalid characters in field {field}")));
        }

        match columns::field_alias(field) {
            Some(FieldAlias::Project) => {
                project_key = Some(field.to_string());
            }
            Some(FieldAlias::Columns(aliased)) => {
                for column in aliased {
                    resolved
                        .selected_columns
                        .push(SelectedColumn::Column((*column).to_string()));
                }
                if let [column] = aliased {
                    names.insert(field.to_string(), (*column).to_string());
                }
            }
            Some(FieldAlias::Aggregate(call)) => {
                let function = functions::resolve_function(call, Some(params))?.with_alias(field);
                resolved.push_resolved(&function);
            }
            None if functions::is_function(field) => {
                let function = functions::resolve_function(field, Some(params))?;
                names.insert(field.to_string(), function.alias.clone());
                resolved.push_resolved(&function);
            }
            None => {
                resolved
                    .selected_columns
                    .push(SelectedColumn::Column(field.to_string()));
            }
        }
    }

    let rollup = params.rollup.filter(|seconds| *seconds > 0);

    if project_key.is_some() && !resolved.has_column("project.id") {
        resolved
            .selected_columns
            .push(SelectedColumn::Column("project.id".to_string()));
    }

    let mut project_column = "project_id";
    if rollup.is_none() {
        if resolved.aggregations.is_empty() {
            for column in ["id", "project.id"] {
                if !resolved.has_column(column) {
                    resolved
                        .selected_columns
                        .push(SelectedColumn::Column(column.to_string()));
                }
            }
        } else {
            if !resolved.has_aggregation("latest_event") {
                resolved.aggregations.push(Aggregation::new(
                    "argMax",
                    AggregateColumn::Multiple(vec!["id".to_string(), "timestamp".to_string()]),
                    "latest_event",
                ));
            }
            if !resolved.has_column("project.id") {
                resolved.aggregations.push(Aggregation::new(
                    "argMax",
                    AggregateColumn::Multiple(vec![
                        "project.id".to_string(),
                        "timestamp".to_string(),
                    ]),
                    "projectid",
                ));
                project_column = "projectid";
            }
        }
    }

    if rollup.is_some() && !resolved.selected_columns.is_empty() && resolved.aggregations.is_empty() {
        return Err(SearchError::invalid(
            "You cannot use rollup without an aggregate field.",
        ));
    }

    if rollup.is_none() || project_key.is_some() {
        let alias = project_key.as_deref().unwrap_or("project.name");
        resolved
            .aggregations
            .push(project_lookup(project_column, params, alias));
    }

    if !resolved.aggregations.is_empty() {
        resolved.groupby = resolved
            .selected_columns
            .iter()
            .map(|c| c.name().to_string())
            .collect();
    }

    resolved.orderby = params
        .orderby
        .iter()
        .map(|entry| resolve_orderby(entry, &resolved, &names))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        fields = fields.len(),
        columns = resolved.selected_columns.len(),
        aggregations = resolved.aggregations.len(),
        "Resolved field list"
    );
    Ok(resolved)
}

/// Maps project ids to slugs so results can show project names.
fn project_lookup(column: &str, params: &QueryParams, alias: &str) -> Aggregation {
    let projects = params.selected_projects();
    let ids: Vec<String> = projects.iter().map(|p| p.id.to_string()).collect();
    let slugs: Vec<String> = projects
        .iter()
        .map(|p| format!("'{}'", p.slug.replace('\'', "\\'")))
        .collect();

    Aggregation::new(
        format!(
            "transform({column}, array({}), array({}), '')",
            ids.join(","),
            slugs.join(",")
        ),
        AggregateColumn::None,
        alias,
    )
}

fn resolve_orderby(
    entry: &str,
    resolved: &ResolvedFields,
    names: &HashMap<String, String>,
) -> Result<String> {
    let (descending, field) = match entry.strip_prefix('-') {
        Some(field) => (true, field),
        None => (false, entry),
    };
    let name = names.get(field).map_or(field, String::as_str);

    if !resolved.has_column(name) && !resolved.has_aggregation(name) {
        return Err(SearchError::invalid(
            "Cannot order by a field that is not selected.",
        ));
    }
    Ok(if descending {
        format!("-{name}")
    } else {
        name.to_string()
    })
}

/// Display type of a result column, from its alias and backend type.
///
/// Function results use the function's declared type. Otherwise anything
/// named like a duration is a duration and the backend type decides.
#[must_use]
pub fn json_meta_type(field_alias: &str, backend_type: &str) -> &'static str {
    let declared = functions::registered()
        .filter(|f| {
            field_alias
                .strip_prefix(f.name)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
        })
        .max_by_key(|f| f.name.len())
        .and_then(|f| f.result_type);
    if let Some(result_type) = declared {
        return result_type;
    }
    if field_alias.contains("duration") {
        return "duration";
    }

    let inner = backend_type
        .strip_prefix("Nullable(")
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(backend_type);
    if inner == "UInt8" {
        "boolean"
    } else if inner.starts_with("UInt") || inner.starts_with("Int") {
        "integer"
    } else if inner.starts_with("Float") {
        "number"
    } else if inner.starts_with("Array") {
        "array"
    } else if inner.starts_with("DateTime") {
        "date"
    } else {
        "string"
    }
}
