//! Caller context for compiling a search.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    /// Project id.
    pub id: u64,
    /// Project slug, as used in `project.name:` filters.
    pub slug: String,
}

impl ProjectRef {
    /// Creates a project reference.
    pub fn new(id: u64, slug: impl Into<String>) -> Self {
        Self {
            id,
            slug: slug.into(),
        }
    }
}

/// Query parameters supplied by the caller alongside the search text.
///
/// Lookups that would need I/O (project slugs, issue short ids) arrive here
/// pre-resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Projects the query is scoped to.
    #[serde(default)]
    pub project_ids: Vec<u64>,
    /// Organization owning the projects.
    #[serde(default)]
    pub organization_id: Option<u64>,
    /// Inclusive start of the time window.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Exclusive end of the time window.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Environment names; the empty string means "no environment".
    #[serde(default)]
    pub environments: Vec<String>,
    /// Rollup interval in seconds for time-series queries.
    #[serde(default)]
    pub rollup: Option<u64>,
    /// Requested ordering, `-` prefix for descending.
    #[serde(default)]
    pub orderby: Vec<String>,
    /// Slugs of the projects in `project_ids` and any others the caller knows.
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
    /// Issue short ids mapped to issue ids.
    #[serde(default)]
    pub issue_short_ids: BTreeMap<String, u64>,
    /// Issue ids overriding any `issue.id` filters in the query.
    #[serde(default)]
    pub group_ids: Vec<u64>,
}

impl QueryParams {
    /// Creates empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project scope.
    #[must_use]
    pub fn with_project_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.project_ids = ids.into_iter().collect();
        self
    }

    /// Sets the organization.
    #[must_use]
    pub fn with_organization_id(mut self, id: u64) -> Self {
        self.organization_id = Some(id);
        self
    }

    /// Sets the time window.
    #[must_use]
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Sets the environments.
    #[must_use]
    pub fn with_environments<S: Into<String>>(mut self, envs: impl IntoIterator<Item = S>) -> Self {
        self.environments = envs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the rollup interval.
    #[must_use]
    pub fn with_rollup(mut self, seconds: u64) -> Self {
        self.rollup = Some(seconds);
        self
    }

    /// Sets the requested ordering.
    #[must_use]
    pub fn with_orderby<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.orderby = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a project slug.
    #[must_use]
    pub fn with_project(mut self, project: ProjectRef) -> Self {
        self.projects.push(project);
        self
    }

    /// Adds an issue short id.
    #[must_use]
    pub fn with_issue_short_id(mut self, short_id: impl Into<String>, issue_id: u64) -> Self {
        self.issue_short_ids.insert(short_id.into(), issue_id);
        self
    }

    /// Sets issue ids overriding those found in the query.
    #[must_use]
    pub fn with_group_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.group_ids = ids.into_iter().collect();
        self
    }

    /// Projects that are both known by slug and in the active scope, in
    /// scope order.
    #[must_use]
    pub fn selected_projects(&self) -> Vec<&ProjectRef> {
        self.project_ids
            .iter()
            .filter_map(|id| self.projects.iter().find(|p| p.id == *id))
            .collect()
    }

    /// Length of the time window in whole seconds, if both ends are set.
    #[must_use]
    pub fn window_seconds(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}
