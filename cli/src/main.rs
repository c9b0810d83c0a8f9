//! Eventsearch CLI
//!
//! Command-line interface for parsing and compiling event search queries.
//!
//! # Usage
//!
//! ```bash
//! eventsearch --help
//! eventsearch parse 'user.email:foo@example.com release:1.2.1'
//! eventsearch compile '!has:release' --field title --field 'count()' --project-id 1
//! eventsearch resolve --field 'count(id)' --orderby=-count_id
//! eventsearch grammar
//! ```

#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shared::chrono::{DateTime, Utc};
use shared::search::{
    compile_filter, resolve_field_list, EventQuery, FieldEntry, ProjectRef, QueryParams,
    SearchVisitor, GRAMMAR,
};

/// Eventsearch CLI - Event search query compiler
#[derive(Parser)]
#[command(name = "eventsearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, env = "EVENTSEARCH_FORMAT", default_value_t = Format::Pretty)]
    format: Format,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a search query and print its terms
    Parse {
        /// The search text
        query: String,

        /// Legacy key names, as CANONICAL=LEGACY
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,
    },
    /// Compile a search query and field list into an event query
    Compile {
        /// The search text
        query: String,

        #[command(flatten)]
        context: QueryContext,
    },
    /// Resolve a field list without a search query
    Resolve {
        #[command(flatten)]
        context: QueryContext,
    },
    /// Print the search grammar
    Grammar,
}

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Single-line JSON
    Json,
    /// Indented JSON
    Pretty,
}

/// Fields and query parameters shared by `compile` and `resolve`.
#[derive(Args, Debug, Default)]
struct QueryContext {
    /// Field to display; repeat for several
    #[arg(short, long = "field")]
    fields: Vec<String>,

    /// Project to search; repeat for several
    #[arg(short, long = "project-id")]
    project_ids: Vec<u64>,

    /// Project slug, as ID=SLUG
    #[arg(long = "project", value_parser = parse_project)]
    projects: Vec<ProjectRef>,

    /// Environment to search; repeat for several
    #[arg(short, long = "environment")]
    environments: Vec<String>,

    /// Start of the time window (RFC 3339)
    #[arg(long, requires = "end")]
    start: Option<DateTime<Utc>>,

    /// End of the time window (RFC 3339)
    #[arg(long, requires = "start")]
    end: Option<DateTime<Utc>>,

    /// Rollup interval in seconds
    #[arg(long)]
    rollup: Option<u64>,

    /// Field to order by, `-` prefix for descending; repeat for several
    #[arg(long = "orderby", allow_hyphen_values = true)]
    orderby: Vec<String>,

    /// Legacy key names, as CANONICAL=LEGACY
    #[arg(long = "map", value_parser = parse_mapping)]
    mappings: Vec<(String, String)>,
}

impl QueryContext {
    fn params(&self) -> QueryParams {
        let mut params = QueryParams::new()
            .with_project_ids(self.project_ids.iter().copied())
            .with_environments(self.environments.iter().cloned())
            .with_orderby(self.orderby.iter().cloned());
        if let (Some(start), Some(end)) = (self.start, self.end) {
            params = params.with_window(start, end);
        }
        if let Some(rollup) = self.rollup {
            params = params.with_rollup(rollup);
        }
        for project in &self.projects {
            params = params.with_project(project.clone());
        }
        params
    }

    fn fields(&self) -> Vec<FieldEntry> {
        self.fields.iter().cloned().map(FieldEntry::from).collect()
    }
}

fn parse_project(value: &str) -> Result<ProjectRef, String> {
    let (id, slug) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=SLUG, got '{value}'"))?;
    let id = id
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid project id '{id}': {e}"))?;
    Ok(ProjectRef::new(id, slug.trim()))
}

fn parse_mapping(value: &str) -> Result<(String, String), String> {
    let (canonical, legacy) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CANONICAL=LEGACY, got '{value}'"))?;
    if canonical.is_empty() || legacy.is_empty() {
        return Err(format!("expected CANONICAL=LEGACY, got '{value}'"));
    }
    Ok((canonical.to_string(), legacy.to_string()))
}

fn visitor<'p>(mappings: &[(String, String)], params: Option<&'p QueryParams>) -> SearchVisitor<'p> {
    let mut visitor = SearchVisitor::new();
    for (canonical, legacy) in mappings {
        visitor = visitor.with_key_mapping(canonical, [legacy.as_str()]);
    }
    match params {
        Some(params) => visitor.with_params(params),
        None => visitor,
    }
}

fn render<T: Serialize>(value: &T, format: Format) -> anyhow::Result<String> {
    let rendered = match format {
        Format::Json => serde_json::to_string(value)?,
        Format::Pretty => serde_json::to_string_pretty(value)?,
    };
    Ok(rendered)
}

/// Runs a command and returns what it prints.
fn run(command: Commands, format: Format) -> anyhow::Result<String> {
    match command {
        Commands::Parse { query, mappings } => {
            let terms = visitor(&mappings, None)
                .visit(&query)
                .context("Invalid search query")?;
            tracing::debug!(terms = terms.len(), "Parsed search query");
            render(&terms, format)
        }
        Commands::Compile { query, context } => {
            let params = context.params();
            let terms = visitor(&context.mappings, Some(&params))
                .visit(&query)
                .context("Invalid search query")?;
            let filter = compile_filter(&terms, &params).context("Invalid search query")?;
            let fields =
                resolve_field_list(&context.fields(), &params).context("Invalid field list")?;
            tracing::debug!(
                conditions = filter.conditions.len(),
                aggregations = fields.aggregations.len(),
                "Compiled search query"
            );
            render(&EventQuery::new(filter, fields, params.rollup), format)
        }
        Commands::Resolve { context } => {
            let params = context.params();
            let fields =
                resolve_field_list(&context.fields(), &params).context("Invalid field list")?;
            render(&fields, format)
        }
        Commands::Grammar => Ok(GRAMMAR.trim_end().to_string()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(command) => println!("{}", run(command, cli.format)?),
        None => {
            println!("Eventsearch CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn run_args(args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(args)?;
        run(cli.command.expect("command given"), Format::Json)
    }

    fn run_json(args: &[&str]) -> Value {
        serde_json::from_str(&run_args(args).unwrap()).unwrap()
    }

    #[test]
    fn test_cli_parse() {
        // Verify CLI can parse without arguments
        let cli = Cli::try_parse_from(["eventsearch"]);
        assert!(cli.is_ok());
        assert_eq!(cli.unwrap().format, Format::Pretty);
    }

    #[test]
    fn test_parse_command() {
        let terms = run_json(&["eventsearch", "parse", "release:1.2.1 fatal"]);
        assert_eq!(terms[0]["key"]["name"], "release");
        assert_eq!(terms[1]["key"]["name"], "message");
        assert_eq!(terms[1]["value"]["value"], "fatal");
    }

    #[test]
    fn test_parse_command_with_mapping() {
        let terms = run_json(&["eventsearch", "parse", "email:a@b.com", "--map", "user.email=email"]);
        assert_eq!(terms[0]["key"]["name"], "user.email");
    }

    #[test]
    fn test_parse_command_reports_error() {
        let err = run_args(&["eventsearch", "parse", "device.family:"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid search query");
        assert_eq!(
            err.root_cause().to_string(),
            "Empty string after 'device.family:'"
        );
    }

    #[test]
    fn test_compile_command() {
        let query = run_json(&[
            "eventsearch",
            "compile",
            "!has:release",
            "--field",
            "title",
            "--field",
            "count()",
            "--project-id",
            "1",
            "--project",
            "1=backend",
        ]);
        assert_eq!(
            query["filter"]["conditions"],
            json!([[["isNull", ["release"]], "=", 1]])
        );
        assert_eq!(query["filter_keys"], json!({"project_id": [1]}));
        assert_eq!(query["fields"]["groupby"], json!(["title"]));
        assert_eq!(
            query["fields"]["aggregations"][3],
            json!(["transform(projectid, array(1), array('backend'), '')", null, "project.name"])
        );
    }

    #[test]
    fn test_compile_with_window_and_rollup() {
        let query = run_json(&[
            "eventsearch",
            "compile",
            "",
            "--field",
            "count()",
            "--start",
            "2020-01-01T00:00:00Z",
            "--end",
            "2020-01-01T01:00:00Z",
            "--rollup",
            "60",
        ]);
        assert_eq!(query["filter"]["start"], "2020-01-01T00:00:00Z");
        assert_eq!(query["rollup"], 60);
        assert_eq!(query["fields"]["aggregations"], json!([["count", null, "count"]]));
    }

    #[test]
    fn test_start_requires_end() {
        let cli = Cli::try_parse_from(["eventsearch", "compile", "", "--start", "2020-01-01T00:00:00Z"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_resolve_command_orderby() {
        let fields = run_json(&[
            "eventsearch",
            "resolve",
            "--field",
            "count(id)",
            "--field",
            "count_unique(user)",
            "--orderby",
            "-count(id)",
        ]);
        assert_eq!(fields["orderby"], json!(["-count_id"]));
    }

    #[test]
    fn test_invalid_project_flag() {
        assert!(parse_project("backend").is_err());
        assert!(parse_project("x=backend").is_err());
        assert_eq!(parse_project("3=web").unwrap(), ProjectRef::new(3, "web"));
    }

    #[test]
    fn test_grammar_command() {
        let grammar = run_args(&["eventsearch", "grammar"]).unwrap();
        assert!(grammar.contains("search_term"));
    }
}
