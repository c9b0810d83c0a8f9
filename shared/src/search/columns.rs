//! Static column registry.
//!
//! Classifies the public field names accepted in search queries and field
//! lists, and holds the alias and status-code tables used while compiling.

/// Storage class of a known column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free-form string.
    String,
    /// Integer identifier or counter.
    Integer,
    /// Point in time.
    Timestamp,
    /// Duration in milliseconds.
    Duration,
    /// Array column, matched with `LIKE` for wildcards.
    Array,
}

/// A public column name and its storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Public field name.
    pub name: &'static str,
    /// Storage class.
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

static COLUMNS: &[Column] = &[
    column("id", ColumnKind::String),
    column("issue.id", ColumnKind::Integer),
    column("project.id", ColumnKind::Integer),
    column("project_id", ColumnKind::Integer),
    column("title", ColumnKind::String),
    column("message", ColumnKind::String),
    column("culprit", ColumnKind::String),
    column("location", ColumnKind::String),
    column("release", ColumnKind::String),
    column("dist", ColumnKind::String),
    column("environment", ColumnKind::String),
    column("platform", ColumnKind::String),
    column("event.type", ColumnKind::String),
    column("timestamp", ColumnKind::Timestamp),
    column("time", ColumnKind::Timestamp),
    column("user.id", ColumnKind::String),
    column("user.email", ColumnKind::String),
    column("user.username", ColumnKind::String),
    column("user.ip", ColumnKind::String),
    column("sdk.name", ColumnKind::String),
    column("sdk.version", ColumnKind::String),
    column("http.method", ColumnKind::String),
    column("http.url", ColumnKind::String),
    column("os.build", ColumnKind::String),
    column("os.kernel_version", ColumnKind::String),
    column("device.name", ColumnKind::String),
    column("device.brand", ColumnKind::String),
    column("device.locale", ColumnKind::String),
    column("device.uuid", ColumnKind::String),
    column("device.arch", ColumnKind::String),
    column("device.battery_level", ColumnKind::Integer),
    column("device.orientation", ColumnKind::String),
    column("device.simulator", ColumnKind::Integer),
    column("device.online", ColumnKind::Integer),
    column("device.charging", ColumnKind::Integer),
    column("geo.country_code", ColumnKind::String),
    column("geo.region", ColumnKind::String),
    column("geo.city", ColumnKind::String),
    column("error.type", ColumnKind::Array),
    column("error.value", ColumnKind::Array),
    column("error.mechanism", ColumnKind::Array),
    column("error.handled", ColumnKind::Array),
    column("stack.abs_path", ColumnKind::Array),
    column("stack.filename", ColumnKind::Array),
    column("stack.package", ColumnKind::Array),
    column("stack.module", ColumnKind::Array),
    column("stack.function", ColumnKind::Array),
    column("stack.in_app", ColumnKind::Array),
    column("stack.colno", ColumnKind::Array),
    column("stack.lineno", ColumnKind::Array),
    column("stack.stack_level", ColumnKind::Array),
    column("contexts.key", ColumnKind::Array),
    column("contexts.value", ColumnKind::Array),
    column("transaction", ColumnKind::String),
    column("transaction.op", ColumnKind::String),
    column("transaction.duration", ColumnKind::Duration),
    column("transaction.status", ColumnKind::Integer),
    column("transaction.start_timestamp", ColumnKind::Timestamp),
    column("transaction.end_timestamp", ColumnKind::Timestamp),
    column("trace", ColumnKind::String),
    column("trace.span", ColumnKind::String),
    column("trace.parent_span", ColumnKind::String),
];

/// Keys whose values are parsed as dates.
pub const DATE_KEYS: &[&str] = &[
    "start",
    "end",
    "first_seen",
    "last_seen",
    "time",
    "timestamp",
    "transaction.start_timestamp",
    "transaction.end_timestamp",
];

/// Keys whose values are parsed as numbers.
pub const NUMERIC_KEYS: &[&str] = &[
    "project_id",
    "project.id",
    "issue.id",
    "error.handled",
    "stack.colno",
    "stack.in_app",
    "stack.lineno",
    "stack.stack_level",
    "transaction.duration",
    "apdex",
    "impact",
    "p75",
    "p95",
    "p99",
    "error_rate",
];

/// Span status names and their numeric codes.
pub const SPAN_STATUSES: &[(&str, i64)] = &[
    ("ok", 0),
    ("cancelled", 1),
    ("unknown", 2),
    ("invalid_argument", 3),
    ("deadline_exceeded", 4),
    ("not_found", 5),
    ("already_exists", 6),
    ("permission_denied", 7),
    ("resource_exhausted", 8),
    ("failed_precondition", 9),
    ("aborted", 10),
    ("out_of_range", 11),
    ("unimplemented", 12),
    ("internal_error", 13),
    ("unavailable", 14),
    ("data_loss", 15),
    ("unauthenticated", 16),
];

/// Columns a `user` filter or field expands to, in output order.
pub const USER_COLUMNS: &[&str] = &["user.email", "user.username", "user.ip", "user.id"];

/// Looks up a known column.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.name == name)
}

/// Returns true for names present in the column registry.
#[must_use]
pub fn is_known_column(name: &str) -> bool {
    lookup(name).is_some()
}

/// Returns true for columns storing durations.
#[must_use]
pub fn is_duration_column(name: &str) -> bool {
    lookup(name).is_some_and(|c| c.kind == ColumnKind::Duration)
}

/// Returns true for columns that numeric aggregates such as `min` accept.
#[must_use]
pub fn is_numeric_column(name: &str) -> bool {
    lookup(name).is_some_and(|c| matches!(c.kind, ColumnKind::Duration | ColumnKind::Timestamp))
}

/// Returns true for array columns.
#[must_use]
pub fn is_array_column(name: &str) -> bool {
    lookup(name).is_some_and(|c| c.kind == ColumnKind::Array)
}

/// Returns true for keys parsed as dates.
#[must_use]
pub fn is_date_key(name: &str) -> bool {
    DATE_KEYS.contains(&name)
}

/// Returns true for keys parsed as numbers.
#[must_use]
pub fn is_numeric_key(name: &str) -> bool {
    NUMERIC_KEYS.contains(&name)
}

/// Returns true for keys parsed as durations.
#[must_use]
pub fn is_duration_key(name: &str) -> bool {
    is_duration_column(name)
}

/// Returns the numeric code of a span status name.
#[must_use]
pub fn span_status_code(name: &str) -> Option<i64> {
    SPAN_STATUSES
        .iter()
        .find(|(status, _)| *status == name)
        .map(|(_, code)| *code)
}

/// Comma-separated list of span status names, for error messages.
#[must_use]
pub fn span_status_names() -> String {
    SPAN_STATUSES
        .iter()
        .map(|(status, _)| *status)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Field aliases
// ============================================================================

/// What a human-facing field alias expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAlias {
    /// One or more plain columns.
    Columns(&'static [&'static str]),
    /// An aggregate function call, named after the alias.
    Aggregate(&'static str),
    /// A project id column plus a slug lookup.
    Project,
}

static FIELD_ALIASES: &[(&str, FieldAlias)] = &[
    ("issue", FieldAlias::Columns(&["issue.id"])),
    ("user", FieldAlias::Columns(USER_COLUMNS)),
    ("project", FieldAlias::Project),
    ("project.name", FieldAlias::Project),
    ("apdex", FieldAlias::Aggregate("apdex(300)")),
    ("impact", FieldAlias::Aggregate("impact(300)")),
    ("p75", FieldAlias::Aggregate("p75()")),
    ("p95", FieldAlias::Aggregate("p95()")),
    ("p99", FieldAlias::Aggregate("p99()")),
    ("last_seen", FieldAlias::Aggregate("last_seen()")),
    ("latest_event", FieldAlias::Aggregate("latest_event()")),
    ("error_rate", FieldAlias::Aggregate("error_rate()")),
];

/// Looks up a field alias.
#[must_use]
pub fn field_alias(name: &str) -> Option<FieldAlias> {
    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, expansion)| *expansion)
}

/// Returns the single column an alias stands for in filters and order-bys.
#[must_use]
pub fn column_alias(name: &str) -> Option<&'static str> {
    match field_alias(name)? {
        FieldAlias::Columns([column]) => Some(*column),
        FieldAlias::Project => Some("project.id"),
        _ => None,
    }
}
