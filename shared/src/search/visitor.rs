//! Parse-tree visitor.
//!
//! Walks the raw parse tree produced by the grammar and emits typed
//! [`SearchTerm`]s: keys are remapped, values are coerced according to the
//! key's type and boolean chains are folded into trees.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::ast::{BooleanOp, Operator, SearchFilter, SearchKey, SearchTerm, SearchValue};
use super::boolean::{and_all, build_boolean_tree};
use super::columns;
use super::error::{Result, SearchError};
use super::functions;
use super::params::QueryParams;
use super::parser::{self, HasTarget, Node, RawFilter, RawValue, Term};
use super::values::{self, RelativeBound};

/// Converts search text into search terms.
#[derive(Debug, Clone, Default)]
pub struct SearchVisitor<'p> {
    /// Legacy key name to canonical key name.
    key_mappings: HashMap<String, String>,
    params: Option<&'p QueryParams>,
    now: Option<DateTime<Utc>>,
}

impl<'p> SearchVisitor<'p> {
    /// Creates a visitor with no key mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps each of `legacy` onto the `canonical` key name.
    #[must_use]
    pub fn with_key_mapping<S: Into<String>>(
        mut self,
        canonical: &str,
        legacy: impl IntoIterator<Item = S>,
    ) -> Self {
        for name in legacy {
            self.key_mappings.insert(name.into(), canonical.to_string());
        }
        self
    }

    /// Supplies query parameters, used for function argument defaults.
    #[must_use]
    pub fn with_params(mut self, params: &'p QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Fixes the instant relative dates are computed from.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Parses and visits `query`.
    ///
    /// # Errors
    ///
    /// Returns an error on syntax errors or values that do not fit their key.
    pub fn visit(&self, query: &str) -> Result<Vec<SearchTerm>> {
        let nodes = parser::parse(query)?;
        let now = self.now.unwrap_or_else(Utc::now);

        let mut terms = Vec::new();
        for node in &nodes {
            terms.extend(self.visit_node(node, now)?);
        }
        Ok(terms)
    }

    fn visit_node(&self, node: &Node<'_>, now: DateTime<Utc>) -> Result<Vec<SearchTerm>> {
        match node {
            Node::Term(term) => self.visit_term(term, now),
            Node::Chain { first, rest } => {
                let mut operands = Vec::with_capacity(rest.len() + 1);
                let mut operators: Vec<BooleanOp> = Vec::with_capacity(rest.len());

                if let Some(term) = and_all(self.visit_node(first, now)?) {
                    operands.push(term);
                }
                for (operator, node) in rest {
                    if let Some(term) = and_all(self.visit_node(node, now)?) {
                        if !operands.is_empty() {
                            operators.push(*operator);
                        }
                        operands.push(term);
                    }
                }
                Ok(build_boolean_tree(&operands, &operators).into_iter().collect())
            }
            Node::Group(items) => {
                let mut terms = Vec::new();
                for item in items {
                    terms.extend(self.visit_node(item, now)?);
                }
                Ok(and_all(terms).into_iter().collect())
            }
        }
    }

    fn visit_term(&self, term: &Term<'_>, now: DateTime<Utc>) -> Result<Vec<SearchTerm>> {
        match term {
            Term::FreeText(text) => {
                let text = text.trim_matches(' ');
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![message_filter(text)])
            }
            Term::QuotedText(text) => {
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![message_filter(text)])
            }
            Term::Has { negated, target } => match target {
                HasTarget::Key(key) => {
                    let operator = if *negated { Operator::Eq } else { Operator::NotEq };
                    Ok(vec![SearchTerm::from(SearchFilter::new(
                        SearchKey::new(self.remap(key)),
                        operator,
                        SearchValue::String(String::new()),
                    ))])
                }
                HasTarget::Value(value) => Err(SearchError::invalid(format!(
                    "Invalid format for \"has\" search: {}",
                    value.text()
                ))),
            },
            Term::Is => Err(SearchError::invalid(
                "\"is:\" queries are only supported in issue search.",
            )),
            Term::Filter(raw) => {
                let filters = self.visit_filter(raw, now)?;
                Ok(filters.into_iter().map(SearchTerm::from).collect())
            }
        }
    }

    fn remap(&self, key: &str) -> String {
        self.key_mappings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn visit_filter(&self, raw: &RawFilter<'_>, now: DateTime<Utc>) -> Result<Vec<SearchFilter>> {
        let key = if raw.aggregate {
            SearchKey::aggregate(raw.key)
        } else {
            SearchKey::new(self.remap(raw.key))
        };
        let operator = raw.operator.unwrap_or(Operator::Eq);
        let negate = |filter: SearchFilter| apply_negation(filter, raw.negated);

        let filters = match &raw.value {
            RawValue::Text(text) => vec![negate(basic_filter(key, Operator::Eq, text)?)],
            RawValue::Quoted(text) => vec![negate(SearchFilter::new(
                key,
                Operator::Eq,
                SearchValue::text(text.as_str()),
            ))],
            RawValue::List(items) => {
                if key.name == "message"
                    || columns::is_date_key(&key.name)
                    || columns::is_numeric_key(&key.name)
                {
                    vec![negate(fallback(key, raw)?)]
                } else {
                    vec![negate(SearchFilter::new(
                        key,
                        Operator::Eq,
                        SearchValue::List(items.clone()),
                    ))]
                }
            }
            RawValue::Date(text) => {
                if key.aggregate || (raw.operator.is_some() && columns::is_date_key(&key.name)) {
                    let value = values::parse_datetime(text).map_err(|_| date_format_error())?;
                    vec![negate(SearchFilter::new(
                        key,
                        operator,
                        SearchValue::Timestamp(value),
                    ))]
                } else if columns::is_date_key(&key.name) {
                    let (start, end) = values::datetime_window(text).map_err(|_| date_format_error())?;
                    vec![
                        SearchFilter::new(key.clone(), Operator::GtEq, SearchValue::Timestamp(start)),
                        SearchFilter::new(key, Operator::Lt, SearchValue::Timestamp(end)),
                    ]
                } else {
                    vec![negate(fallback(key, raw)?)]
                }
            }
            RawValue::RelativeDate(text) => {
                if key.aggregate || columns::is_date_key(&key.name) {
                    let filter = match values::parse_relative_date(text, now)
                        .map_err(|_| date_format_error())?
                    {
                        RelativeBound::From(value) => {
                            SearchFilter::new(key, Operator::GtEq, SearchValue::Timestamp(value))
                        }
                        RelativeBound::To(value) => {
                            SearchFilter::new(key, Operator::LtEq, SearchValue::Timestamp(value))
                        }
                    };
                    vec![negate(filter)]
                } else {
                    vec![negate(fallback(key, raw)?)]
                }
            }
            RawValue::Duration { number, unit } => {
                if key.aggregate {
                    self.check_duration_aggregate(&key)?;
                } else if !columns::is_duration_key(&key.name) {
                    return Ok(vec![negate(fallback(key, raw)?)]);
                }
                let millis = values::parse_duration(number, unit)?;
                vec![negate(SearchFilter::new(
                    key,
                    operator,
                    SearchValue::Duration(millis),
                ))]
            }
            RawValue::Numeric(text) => {
                if key.aggregate {
                    let value = values::parse_numeric(text).map_err(|_| {
                        SearchError::invalid(format!("Invalid aggregate query condition: {key}"))
                    })?;
                    vec![negate(SearchFilter::new(key, operator, value))]
                } else if columns::is_numeric_key(&key.name) {
                    let value = values::parse_numeric(text).map_err(|_| numeric_format_error())?;
                    vec![negate(SearchFilter::new(key, operator, value))]
                } else {
                    vec![negate(fallback(key, raw)?)]
                }
            }
            RawValue::Percentage(text) => {
                let is_percentage = key
                    .name
                    .split('(')
                    .next()
                    .and_then(functions::lookup)
                    .is_some_and(|f| f.result_type == Some("percentage"));
                let number: f64 = text
                    .parse()
                    .ok()
                    .filter(|number: &f64| is_percentage && number.is_finite())
                    .ok_or_else(|| {
                        SearchError::invalid(format!("Invalid aggregate query condition: {key}"))
                    })?;
                vec![negate(SearchFilter::new(
                    key,
                    operator,
                    SearchValue::Float(number / 100.0),
                ))]
            }
        };
        Ok(filters)
    }

    fn check_duration_aggregate(&self, key: &SearchKey) -> Result<()> {
        let resolved = functions::resolve_function(&key.name, self.params)?;
        let column = resolved.aggregate_column();
        let duration_result = functions::lookup(resolved.name)
            .is_some_and(|f| f.result_type == Some("duration"));

        if duration_result || column.is_some_and(columns::is_duration_column) {
            Ok(())
        } else {
            Err(SearchError::invalid(format!(
                "{} is not a duration column",
                column.unwrap_or(&key.name)
            )))
        }
    }
}

fn message_filter(text: &str) -> SearchTerm {
    SearchTerm::from(SearchFilter::new(
        SearchKey::new("message"),
        Operator::Eq,
        SearchValue::text(text),
    ))
}

fn apply_negation(mut filter: SearchFilter, negated: bool) -> SearchFilter {
    if negated {
        filter.operator = filter.operator.negate();
    }
    filter
}

fn date_format_error() -> SearchError {
    SearchError::invalid("Invalid format for date search")
}

fn numeric_format_error() -> SearchError {
    SearchError::invalid("Invalid format for numeric search")
}

fn has_unescaped_quote(text: &str) -> bool {
    let mut prev = None;
    for c in text.chars() {
        if c == '"' && prev != Some('\\') {
            return true;
        }
        prev = Some(c);
    }
    false
}

/// Treats a value that did not fit its key's type as a plain string match on
/// the text as written, operator included.
fn fallback(key: SearchKey, raw: &RawFilter<'_>) -> Result<SearchFilter> {
    let operator = raw.operator.map_or("", Operator::as_str);
    let text = format!("{operator}{}", raw.value.text());
    basic_filter(key, Operator::Eq, &text)
}

fn basic_filter(key: SearchKey, operator: Operator, text: &str) -> Result<SearchFilter> {
    if text.is_empty() {
        return Err(SearchError::invalid(format!("Empty string after '{key}:'")));
    }
    if text.starts_with('"') || has_unescaped_quote(text) {
        return Err(SearchError::invalid(format!(
            "Invalid quote at '{text}': quotes must enclose text or be escaped."
        )));
    }
    if columns::is_date_key(&key.name) {
        return Err(date_format_error());
    }
    if columns::is_numeric_key(&key.name) {
        return Err(numeric_format_error());
    }

    let value = text.replace("\\\"", "\"");
    Ok(SearchFilter::new(key, operator, SearchValue::text(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn parse(query: &str) -> Vec<SearchTerm> {
        SearchVisitor::new().visit(query).unwrap()
    }

    fn parse_err(query: &str) -> String {
        SearchVisitor::new()
            .visit(query)
            .unwrap_err()
            .message()
            .to_string()
    }

    fn filter(name: &str, operator: Operator, value: SearchValue) -> SearchTerm {
        SearchTerm::from(SearchFilter::new(SearchKey::new(name), operator, value))
    }

    fn eq(name: &str, value: &str) -> SearchTerm {
        filter(name, Operator::Eq, SearchValue::text(value))
    }

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> SearchValue {
        SearchValue::Timestamp(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    #[test]
    fn test_simple() {
        assert_eq!(
            parse("user.email:foo@example.com release:1.2.1 hello"),
            vec![
                eq("user.email", "foo@example.com"),
                eq("release", "1.2.1"),
                eq("message", "hello"),
            ]
        );
    }

    #[test]
    fn test_raw_search_anywhere() {
        assert_eq!(
            parse("hello what user.email:foo@example.com where release:1.2.1 when"),
            vec![
                eq("message", "hello what"),
                eq("user.email", "foo@example.com"),
                eq("message", "where"),
                eq("release", "1.2.1"),
                eq("message", "when"),
            ]
        );
        assert_eq!(parse("  hello  "), vec![eq("message", "hello")]);
        assert_eq!(parse("  hello   there"), vec![eq("message", "hello   there")]);
        assert_eq!(
            parse("  hello   there:bye"),
            vec![eq("message", "hello"), eq("there", "bye")]
        );
    }

    #[test]
    fn test_quoted_raw_search() {
        assert_eq!(
            parse(r#""hello there" user.email:foo@example.com "general kenobi""#),
            vec![
                eq("message", "hello there"),
                eq("user.email", "foo@example.com"),
                eq("message", "general kenobi"),
            ]
        );
        assert_eq!(parse(r#" " hello " "#), vec![eq("message", " hello ")]);
        assert_eq!(parse(r#" " he\"llo " "#), vec![eq("message", " he\"llo ")]);
    }

    #[test]
    fn test_quotes_filtered_on_raw() {
        assert_eq!(
            parse(r#""thinger:unknown what is this?""#),
            vec![eq("message", "thinger:unknown what is this?")]
        );
        assert_eq!(parse(r#"end""#), vec![eq("message", "end\"")]);
        assert_eq!(parse(r#""beginning"#), vec![eq("message", "\"beginning")]);
        assert_eq!(parse(r#"""#), vec![eq("message", "\"")]);
        assert_eq!(parse(r#""""#), vec![]);
        assert_eq!(parse(r#"" ""#), vec![eq("message", " ")]);
        assert_eq!(parse(r#"""woof""#), vec![eq("message", "woof\"")]);
        assert_eq!(parse(r#"""""""""""#), vec![eq("message", "\"")]);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(
            parse("timestamp>2015-05-18"),
            vec![filter("timestamp", Operator::Gt, ts(2015, 5, 18, 0, 0, 0))]
        );
        assert_eq!(
            parse("timestamp>2015-05-18T10:15:01"),
            vec![filter("timestamp", Operator::Gt, ts(2015, 5, 18, 10, 15, 1))]
        );
        let expected = Utc.with_ymd_and_hms(2015, 5, 18, 10, 15, 1).unwrap() + Duration::milliseconds(103);
        assert_eq!(
            parse("timestamp:>2015-05-18T10:15:01.103Z"),
            vec![filter("timestamp", Operator::Gt, SearchValue::Timestamp(expected))]
        );
        assert_eq!(
            parse("first_seen:>2018-01-01T05:06:07+00:00"),
            vec![filter("first_seen", Operator::Gt, ts(2018, 1, 1, 5, 6, 7))]
        );
        assert_eq!(parse("random:>2015-05-18"), vec![eq("random", ">2015-05-18")]);
    }

    #[test]
    fn test_relative_time_filter() {
        let now = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
        let visitor = SearchVisitor::new().with_now(now);

        assert_eq!(
            visitor.visit("first_seen:+7d").unwrap(),
            vec![filter(
                "first_seen",
                Operator::LtEq,
                SearchValue::Timestamp(now - Duration::days(7))
            )]
        );
        assert_eq!(
            visitor.visit("first_seen:-2w").unwrap(),
            vec![filter(
                "first_seen",
                Operator::GtEq,
                SearchValue::Timestamp(now - Duration::days(14))
            )]
        );
        assert_eq!(visitor.visit("random:-2w").unwrap(), vec![eq("random", "-2w")]);

        assert_eq!(
            visitor.visit("last_seen():+7d").unwrap(),
            vec![SearchTerm::from(SearchFilter::new(
                SearchKey::aggregate("last_seen()"),
                Operator::LtEq,
                SearchValue::Timestamp(now - Duration::days(7)),
            ))]
        );
    }

    #[test]
    fn test_invalid_date_formats() {
        for query in ["first_seen:hello", "first_seen:123", "first_seen:2018-01-01T00:01ZZ"] {
            assert_eq!(parse_err(query), "Invalid format for date search", "query {query}");
        }
    }

    #[test]
    fn test_specific_time_filter() {
        assert_eq!(
            parse("first_seen:2018-01-01"),
            vec![
                filter("first_seen", Operator::GtEq, ts(2018, 1, 1, 0, 0, 0)),
                filter("first_seen", Operator::Lt, ts(2018, 1, 2, 0, 0, 0)),
            ]
        );
        let window = vec![
            filter("first_seen", Operator::GtEq, ts(2018, 1, 1, 5, 1, 7)),
            filter("first_seen", Operator::Lt, ts(2018, 1, 1, 5, 12, 7)),
        ];
        assert_eq!(parse("first_seen:2018-01-01T05:06:07Z"), window);
        assert_eq!(parse("first_seen:2018-01-01T05:06:07+00:00"), window);
        assert_eq!(
            parse("random:2018-01-01T05:06:07"),
            vec![eq("random", "2018-01-01T05:06:07")]
        );
    }

    #[test]
    fn test_quoted_values_and_keys() {
        assert_eq!(parse(r#"release:"a release""#), vec![eq("release", "a release")]);
        assert_eq!(
            parse(r#"!release:"a release""#),
            vec![filter("release", Operator::NotEq, SearchValue::text("a release"))]
        );
        assert_eq!(parse(r#""hi:there":value"#), vec![eq("hi:there", "value")]);
        assert_eq!(
            parse(r#"!"hi:there":value"#),
            vec![filter("hi:there", Operator::NotEq, SearchValue::text("value"))]
        );
        assert_eq!(parse("release:\"a\nrelease\""), vec![eq("release", "a\nrelease")]);
        assert_eq!(parse("release:\"a\trelease\""), vec![eq("release", "a\trelease")]);
    }

    #[test]
    fn test_quote_stripping_matches_unquoted() {
        for value in ["v", "1.2.1", "foo@example.com", "a*b"] {
            assert_eq!(
                parse(&format!(r#"release:"{value}""#)),
                parse(&format!("release:{value}")),
                "value {value}"
            );
        }
    }

    #[test]
    fn test_tab_and_newline_outside_quote() {
        assert_eq!(
            parse("release:a\trelease"),
            vec![eq("release", "a"), eq("message", "\trelease")]
        );
        assert!(SearchVisitor::new().visit("release:a\nrelease").is_err());
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(parse(r#"release:"a\"thing\"""#), vec![eq("release", "a\"thing\"")]);
        assert_eq!(parse(r#"release:"a\"\"release""#), vec![eq("release", "a\"\"release")]);
        assert_eq!(
            parse(r#"device.family:"" browser.name:"Chrome""#),
            vec![eq("device.family", ""), eq("browser.name", "Chrome")]
        );
        assert_eq!(
            parse(r#"device.family:"\"\"\"\"\"\"\"\"\"\"""#),
            vec![eq("device.family", "\"\"\"\"\"\"\"\"\"\"")]
        );
        assert_eq!(parse(r#"device.family:\""#), vec![eq("device.family", "\"")]);
        assert_eq!(parse(r#"device.family:te\"st"#), vec![eq("device.family", "te\"st")]);
        assert_eq!(
            parse(r#"url:"te"st"#),
            vec![eq("url", "te"), eq("message", "st")]
        );
    }

    #[test]
    fn test_empty_filter_value() {
        assert_eq!(parse_err("device.family:"), "Empty string after 'device.family:'");
    }

    #[test]
    fn test_trailing_quote_value() {
        for (value, query) in [
            ("\"test", "device.family:\"test"),
            ("test\"", "url:test\""),
            ("\"test", "url:\"test transaction:abadcafe"),
            ("te\"st", "url:te\"st transaction:abadcafe"),
        ] {
            assert_eq!(
                parse_err(query),
                format!("Invalid quote at '{value}': quotes must enclose text or be escaped.")
            );
        }
    }

    #[test]
    fn test_tags() {
        assert_eq!(
            parse("tags[fruit]:apple release:1.2.1 tags[project_id]:123"),
            vec![
                eq("tags[fruit]", "apple"),
                eq("release", "1.2.1"),
                eq("tags[project_id]", "123"),
            ]
        );
    }

    #[test]
    fn test_has() {
        let empty = SearchValue::String(String::new());
        assert_eq!(
            parse("has:release"),
            vec![filter("release", Operator::NotEq, empty.clone())]
        );
        assert_eq!(
            parse(r#"has:"hi:there""#),
            vec![filter("hi:there", Operator::NotEq, empty.clone())]
        );
        assert_eq!(parse("!has:release"), vec![filter("release", Operator::Eq, empty)]);
        assert_eq!(parse_err(r#"has:"hi there""#), "Invalid format for \"has\" search: hi there");
    }

    #[test]
    fn test_is_query_unsupported() {
        assert_eq!(
            parse_err("is:unassigned"),
            "\"is:\" queries are only supported in issue search."
        );
    }

    #[test]
    fn test_key_remapping() {
        let visitor = SearchVisitor::new().with_key_mapping("target_value", ["someValue", "legacy-value"]);
        assert_eq!(
            visitor
                .visit("someValue:123 legacy-value:456 normal_value:hello")
                .unwrap(),
            vec![
                eq("target_value", "123"),
                eq("target_value", "456"),
                eq("normal_value", "hello"),
            ]
        );
    }

    #[test]
    fn test_numeric_filters() {
        assert_eq!(parse("random_field:>500"), vec![eq("random_field", ">500")]);
        assert_eq!(
            parse("project.id:>5"),
            vec![filter("project.id", Operator::Gt, SearchValue::Integer(5))]
        );
        for query in ["project.id:one", "issue.id:two", "transaction.duration:>hotdog"] {
            assert_eq!(parse_err(query), "Invalid format for numeric search", "query {query}");
        }
    }

    #[test]
    fn test_duration_filters() {
        assert_eq!(parse("user.id:500s"), vec![eq("user.id", "500s")]);
        assert_eq!(
            parse("!user.id:500s"),
            vec![filter("user.id", Operator::NotEq, SearchValue::text("500s"))]
        );
        assert_eq!(
            parse("transaction.duration:>500s"),
            vec![filter("transaction.duration", Operator::Gt, SearchValue::Duration(500_000.0))]
        );
        assert_eq!(
            parse("avg(transaction.duration):>500s"),
            vec![SearchTerm::from(SearchFilter::new(
                SearchKey::aggregate("avg(transaction.duration)"),
                Operator::Gt,
                SearchValue::Duration(500_000.0),
            ))]
        );
        assert!(parse_err("transaction.duration:>..500s").contains("not a valid duration value"));
        assert!(parse_err("avg(transaction.duration):>..500s").contains("not a valid duration value"));
        assert!(parse_err("avg(stack.colno):>500s").contains("not a duration column"));
        assert!(parse_err("count_unique(user):>500s").contains("user is not a duration column"));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        let huge = "9".repeat(400);
        assert_eq!(
            parse_err(&format!("transaction.duration:>{huge}s")),
            format!("{huge}s is not a valid duration value")
        );
        assert_eq!(
            parse_err(&format!("stack.colno:>{huge}")),
            "Invalid format for numeric search"
        );
        assert_eq!(
            parse_err(&format!("count():>{huge}")),
            "Invalid aggregate query condition: count()"
        );
        assert_eq!(
            parse_err(&format!("error_rate():>{huge}%")),
            "Invalid aggregate query condition: error_rate()"
        );
    }

    #[test]
    fn test_text_in_list() {
        let list = |items: &[&str]| {
            SearchValue::List(items.iter().map(|item| (*item).to_string()).collect())
        };
        assert_eq!(
            parse("event.type:[error,default]"),
            vec![filter("event.type", Operator::Eq, list(&["error", "default"]))]
        );
        assert_eq!(
            parse(r#"!browser.name:[Chrome, "Mobile Safari"]"#),
            vec![filter("browser.name", Operator::NotEq, list(&["Chrome", "Mobile Safari"]))]
        );
        assert_eq!(parse("message:[a,b]"), vec![eq("message", "[a,b]")]);
        assert_eq!(parse_err("stack.colno:[1,2]"), "Invalid format for numeric search");
        assert_eq!(parse_err("timestamp:[a,b]"), "Invalid format for date search");
    }

    #[test]
    fn test_aggregate_values() {
        assert_eq!(
            parse("apdex(300):>-0.5"),
            vec![SearchTerm::from(SearchFilter::new(
                SearchKey::aggregate("apdex(300)"),
                Operator::Gt,
                SearchValue::Float(-0.5),
            ))]
        );
        assert_eq!(
            parse("error_rate():>50%"),
            vec![SearchTerm::from(SearchFilter::new(
                SearchKey::aggregate("error_rate()"),
                Operator::Gt,
                SearchValue::Float(0.5),
            ))]
        );
        assert_eq!(
            parse_err("count():>50%"),
            "Invalid aggregate query condition: count()"
        );
        assert_eq!(
            parse("last_seen():2020-04-01T19:34:52+00:00"),
            vec![SearchTerm::from(SearchFilter::new(
                SearchKey::aggregate("last_seen()"),
                Operator::Eq,
                ts(2020, 4, 1, 19, 34, 52),
            ))]
        );
    }

    #[test]
    fn test_negated_comparison_inverts_operator() {
        assert_eq!(
            parse("!transaction.duration:>500ms"),
            vec![filter("transaction.duration", Operator::LtEq, SearchValue::Duration(500.0))]
        );
    }

    #[test]
    fn test_basic_fallthrough() {
        for (query, value) in [
            ("random:<hello", "<hello"),
            ("random:<512.1.0", "<512.1.0"),
            ("random:2018-01-01", "2018-01-01"),
            ("random:+7d", "+7d"),
            ("random:>2018-01-01", ">2018-01-01"),
            ("random:hello", "hello"),
            ("random:123", "123"),
        ] {
            assert_eq!(parse(query), vec![eq("random", value)], "query {query}");
        }
    }

    #[test]
    fn test_wildcard_values_are_typed() {
        assert_eq!(
            parse("release:3.1.*"),
            vec![filter("release", Operator::Eq, SearchValue::Wildcard("3.1.*".into()))]
        );
    }

    fn email(address: &str) -> SearchTerm {
        eq("user.email", address)
    }

    #[test]
    fn test_boolean_precedence() {
        let a = email("foo@example.com");
        let b = email("bar@example.com");
        let c = email("foobar@example.com");
        let d = email("hello@example.com");

        assert_eq!(
            parse("user.email:foo@example.com OR user.email:bar@example.com"),
            vec![SearchTerm::or(a.clone(), b.clone())]
        );
        assert_eq!(
            parse("user.email:foo@example.com AND user.email:bar@example.com OR user.email:foobar@example.com AND user.email:hello@example.com"),
            vec![SearchTerm::or(
                SearchTerm::and(a.clone(), b.clone()),
                SearchTerm::and(c.clone(), d)
            )]
        );
        assert_eq!(
            parse("user.email:foo@example.com OR user.email:bar@example.com OR user.email:foobar@example.com"),
            vec![SearchTerm::or(a, SearchTerm::or(b, c))]
        );
    }

    #[test]
    fn test_grouping() {
        let a = email("foo@example.com");
        let b = email("bar@example.com");
        let c = email("foobar@example.com");

        assert_eq!(
            parse("(user.email:foo@example.com OR user.email:bar@example.com)"),
            vec![SearchTerm::or(a.clone(), b.clone())]
        );
        assert_eq!(
            parse("(user.email:foo@example.com OR user.email:bar@example.com) AND user.email:foobar@example.com"),
            vec![SearchTerm::and(SearchTerm::or(a.clone(), b.clone()), c.clone())]
        );
        assert_eq!(
            parse("(user.email:foo@example.com OR (user.email:bar@example.com OR user.email:foobar@example.com))"),
            vec![SearchTerm::or(a, SearchTerm::or(b, c))]
        );
    }

    #[test]
    fn test_window_operand_is_and_folded() {
        let a = eq("release", "1");
        let window = SearchTerm::and(
            filter("first_seen", Operator::GtEq, ts(2018, 1, 1, 0, 0, 0)),
            filter("first_seen", Operator::Lt, ts(2018, 1, 2, 0, 0, 0)),
        );
        assert_eq!(
            parse("release:1 OR first_seen:2018-01-01"),
            vec![SearchTerm::or(a, window)]
        );
    }

    #[test]
    fn test_empty_operand_drops_operator() {
        assert_eq!(parse(r#""" OR release:1"#), vec![eq("release", "1")]);
    }

    #[test]
    fn test_malformed_groups() {
        assert_eq!(
            parse_err("(user.email:foo@example.com OR user.email:bar@example.com"),
            "Parse error at '(user.' (column 1). This is commonly caused by unmatched parentheses. Enclose any text in double quotes."
        );
        assert_eq!(
            parse_err("undefined is not an object (evaluating 'function.name')"),
            "Parse error at 'ect (evalu' (column 28). This is commonly caused by unmatched parentheses. Enclose any text in double quotes."
        );
    }

    #[test]
    fn test_empty_string() {
        assert!(parse("").is_empty());
    }
}
