//! Search query endpoints.
//!
//! Exposes the search compiler over HTTP: parsing a query into terms,
//! compiling it with a field list into an event query, and resolving a field
//! list on its own.

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::search::{
    compile_filter, resolve_field_list, EventQuery, FieldEntry, QueryParams, ResolvedFields,
    SearchError, SearchTerm, SearchVisitor, GRAMMAR,
};
use validator::{Validate, ValidateLength, ValidationErrors};

/// Request body for parsing a search query.
#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    /// The search text.
    pub query: String,
}

/// Response for a parsed search query.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResponse {
    /// The terms the query parsed into.
    pub terms: Vec<SearchTerm>,
}

/// Request body for compiling a search query.
#[derive(Debug, Deserialize, Validate)]
pub struct CompileRequest {
    /// The search text.
    #[serde(default)]
    pub query: String,
    /// Fields to display.
    #[serde(default)]
    #[validate(length(max = 256, message = "Too many fields requested"))]
    pub fields: Vec<FieldEntry>,
    /// Caller context.
    #[serde(default)]
    pub params: QueryParams,
}

/// Request body for resolving a field list.
#[derive(Debug, Deserialize, Validate)]
pub struct ResolveRequest {
    /// Fields to display.
    #[validate(length(min = 1, max = 256, message = "Between 1 and 256 fields must be requested"))]
    pub fields: Vec<FieldEntry>,
    /// Caller context.
    #[serde(default)]
    pub params: QueryParams,
}

/// Error response for search operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchQueryError {
    /// Error type.
    pub error: String,
    /// Detailed error message.
    pub message: String,
}

impl From<SearchError> for SearchQueryError {
    fn from(e: SearchError) -> Self {
        Self {
            error: "invalid_search_query".to_string(),
            message: e.message().to_string(),
        }
    }
}

impl From<ValidationErrors> for SearchQueryError {
    fn from(e: ValidationErrors) -> Self {
        Self {
            error: "validation_error".to_string(),
            message: e.to_string(),
        }
    }
}

type Rejection = (StatusCode, Json<SearchQueryError>);

fn bad_request(error: impl Into<SearchQueryError>) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(error.into()))
}

/// Creates the search routes with application state.
pub fn search_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/search/parse", post(parse_query))
        .route("/api/v1/search/compile", post(compile_query))
        .route("/api/v1/search/resolve", post(resolve_fields))
        .route("/api/v1/search/grammar", get(grammar))
        .with_state(state)
}

fn check_query_length<Q>(state: &AppState, query: &Q) -> Result<(), Rejection>
where
    Q: ValidateLength<u64> + ?Sized,
{
    if query.validate_length(None, Some(state.max_query_length()), None) {
        return Ok(());
    }
    tracing::debug!(
        max = state.max_query_length(),
        "Rejected oversized search query"
    );
    Err(bad_request(SearchQueryError {
        error: "validation_error".to_string(),
        message: format!(
            "Search query exceeds the maximum length of {} characters",
            state.max_query_length()
        ),
    }))
}

fn visitor<'p>(state: &AppState, params: Option<&'p QueryParams>) -> SearchVisitor<'p> {
    let mut visitor = SearchVisitor::new();
    for (canonical, legacy) in state.key_mappings() {
        visitor = visitor.with_key_mapping(canonical, legacy.iter().cloned());
    }
    match params {
        Some(params) => visitor.with_params(params),
        None => visitor,
    }
}

/// Handler for parsing a search query into terms.
async fn parse_query(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, Rejection> {
    check_query_length(&state, &request.query)?;

    let terms = visitor(&state, None).visit(&request.query).map_err(|e| {
        tracing::debug!(query = %request.query, error = %e, "Failed to parse search query");
        bad_request(e)
    })?;

    tracing::debug!(terms = terms.len(), "Search query parsed");
    Ok(Json(ParseResponse { terms }))
}

/// Handler for compiling a search query and field list.
async fn compile_query(
    State(state): State<AppState>,
    Json(request): Json<CompileRequest>,
) -> Result<Json<EventQuery>, Rejection> {
    request.validate().map_err(bad_request)?;
    check_query_length(&state, &request.query)?;

    let params = &request.params;
    let filter = visitor(&state, Some(params))
        .visit(&request.query)
        .and_then(|terms| compile_filter(&terms, params))
        .map_err(|e| {
            tracing::debug!(query = %request.query, error = %e, "Failed to compile search query");
            bad_request(e)
        })?;
    let fields = resolve_field_list(&request.fields, params).map_err(|e| {
        tracing::debug!(error = %e, "Failed to resolve field list");
        bad_request(e)
    })?;

    tracing::debug!(
        conditions = filter.conditions.len(),
        having = filter.having.len(),
        aggregations = fields.aggregations.len(),
        "Search query compiled"
    );
    Ok(Json(EventQuery::new(filter, fields, params.rollup)))
}

/// Handler for resolving a field list on its own.
async fn resolve_fields(Json(request): Json<ResolveRequest>) -> Result<Json<ResolvedFields>, Rejection> {
    request.validate().map_err(bad_request)?;

    let fields = resolve_field_list(&request.fields, &request.params).map_err(|e| {
        tracing::debug!(error = %e, "Failed to resolve field list");
        bad_request(e)
    })?;
    Ok(Json(fields))
}

/// Handler returning the search grammar as plain text.
async fn grammar() -> &'static str {
    GRAMMAR
}
