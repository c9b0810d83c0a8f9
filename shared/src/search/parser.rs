//! Search query grammar implemented with nom.
//!
//! Parses queries like:
//! - `user.email:foo@example.com release:>1.2.1 hello world`
//! - `timestamp>2015-05-18 !has:release`
//! - `(user.email:foo OR user.email:bar) AND count():>10`
//!
//! The grammar is documented in `grammar.peg`. Parsing produces a raw parse
//! tree; value typing happens in the visitor.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1, take_while_m_n},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{eof, map, not, opt, peek, recognize, value},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::ast::{BooleanOp, Operator};
use super::error::{Result, SearchError};

/// A node of the raw parse tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node<'a> {
    /// A single search term.
    Term(Term<'a>),
    /// Operands joined by boolean operators, in source order.
    Chain {
        first: Box<Node<'a>>,
        rest: Vec<(BooleanOp, Node<'a>)>,
    },
    /// A parenthesized group.
    Group(Vec<Node<'a>>),
}

/// A raw search term.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Term<'a> {
    Filter(RawFilter<'a>),
    Has { negated: bool, target: HasTarget<'a> },
    Is,
    /// A run of free-text words, untrimmed.
    FreeText(&'a str),
    /// A double-quoted free-text term with `\"` already unescaped.
    QuotedText(String),
}

/// The operand of a `has:` filter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HasTarget<'a> {
    Key(&'a str),
    Value(RawValue<'a>),
}

/// A `key:value` filter before typing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawFilter<'a> {
    pub negated: bool,
    pub key: &'a str,
    pub aggregate: bool,
    pub operator: Option<Operator>,
    pub value: RawValue<'a>,
}

/// A filter value as matched by the grammar.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawValue<'a> {
    Date(&'a str),
    RelativeDate(&'a str),
    Duration { number: &'a str, unit: &'a str },
    Percentage(&'a str),
    Numeric(&'a str),
    Quoted(String),
    Text(&'a str),
    List(Vec<String>),
}

impl RawValue<'_> {
    /// The value as written, without surrounding quotes.
    pub fn text(&self) -> String {
        match self {
            Self::Date(s) | Self::RelativeDate(s) | Self::Numeric(s) | Self::Text(s) => {
                (*s).to_string()
            }
            Self::Duration { number, unit } => format!("{number}{unit}"),
            Self::Percentage(s) => format!("{s}%"),
            Self::Quoted(s) => s.clone(),
            Self::List(items) => format!("[{}]", items.join(",")),
        }
    }
}

type Res<'a, T> = IResult<&'a str, T>;

/// Parses query text into a raw parse tree.
///
/// # Errors
///
/// Returns a positional syntax error when the text cannot be parsed to the end.
pub(crate) fn parse(input: &str) -> Result<Vec<Node<'_>>> {
    match terminated(search, spaces)(input) {
        Ok(("", nodes)) => Ok(nodes),
        Ok((rest, _)) => Err(syntax_error(input, input.len() - rest.len())),
        Err(_) => Err(syntax_error(input, 0)),
    }
}

fn syntax_error(text: &str, offset: usize) -> SearchError {
    let idx = text[..offset].chars().count();
    let snippet: String = text
        .chars()
        .skip(idx.saturating_sub(4))
        .take(idx + 6 - idx.saturating_sub(4))
        .collect();
    SearchError::invalid(format!(
        "Parse error at '{snippet}' (column {}). This is commonly caused by unmatched \
         parentheses. Enclose any text in double quotes.",
        idx + 1
    ))
}

// ============================================================================
// Terms and grouping
// ============================================================================

fn search(input: &str) -> Res<'_, Vec<Node<'_>>> {
    many0(alt((boolean_term, paren_term, search_term)))(input)
}

fn boolean_term(input: &str) -> Res<'_, Node<'_>> {
    let (input, first) = terminated(operand, spaces)(input)?;
    let (input, rest) = many1(pair(
        boolean_operator,
        preceded(spaces, terminated(operand, spaces)),
    ))(input)?;

    Ok((
        input,
        Node::Chain {
            first: Box::new(first),
            rest,
        },
    ))
}

fn operand(input: &str) -> Res<'_, Node<'_>> {
    alt((paren_term, search_term))(input)
}

fn paren_term(input: &str) -> Res<'_, Node<'_>> {
    let (input, _) = pair(spaces, char('('))(input)?;
    let (input, _) = spaces(input)?;
    let (input, inner) = many1(alt((boolean_term, paren_term)))(input)?;
    let (input, _) = tuple((spaces, char(')'), spaces))(input)?;

    Ok((input, Node::Group(inner)))
}

fn search_term(input: &str) -> Res<'_, Node<'_>> {
    alt((key_val_term, quoted_raw_search, raw_search))(input)
}

fn key_val_term(input: &str) -> Res<'_, Node<'_>> {
    map(
        delimited(
            spaces,
            alt((
                time_filter,
                rel_time_filter,
                specific_time_filter,
                duration_filter,
                numeric_filter,
                aggregate_filter,
                aggregate_date_filter,
                aggregate_rel_date_filter,
                has_filter,
                is_filter,
                text_in_filter,
                quoted_basic_filter,
                basic_filter,
            )),
            spaces,
        ),
        Node::Term,
    )(input)
}

fn quoted_raw_search(input: &str) -> Res<'_, Node<'_>> {
    map(delimited(spaces, quoted_value, spaces), |text| {
        Node::Term(Term::QuotedText(text))
    })(input)
}

fn raw_search(input: &str) -> Res<'_, Node<'_>> {
    map(
        recognize(many1(tuple((
            not(key_val_term),
            spaces,
            not(boolean_keyword),
            word,
            spaces,
        )))),
        |text| Node::Term(Term::FreeText(text)),
    )(input)
}

fn word(input: &str) -> Res<'_, &str> {
    take_while1(|c: char| c != ' ' && c != '\n' && c != '(' && c != ')')(input)
}

fn boolean_keyword(input: &str) -> Res<'_, &str> {
    terminated(
        alt((tag("AND"), tag("OR"))),
        peek(alt((
            recognize(satisfy(char::is_whitespace)),
            tag("("),
            eof,
        ))),
    )(input)
}

fn boolean_operator(input: &str) -> Res<'_, BooleanOp> {
    terminated(
        alt((
            value(BooleanOp::And, tag("AND")),
            value(BooleanOp::Or, tag("OR")),
        )),
        peek(one_of(" (")),
    )(input)
}

// ============================================================================
// Filters
// ============================================================================

fn filter<'a>(
    negated: bool,
    key: &'a str,
    aggregate: bool,
    operator: Option<Operator>,
    value: RawValue<'a>,
) -> Term<'a> {
    Term::Filter(RawFilter {
        negated,
        key,
        aggregate,
        operator,
        value,
    })
}

fn time_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, opt(sep), operator, date_format)),
        |(negated, key, _, op, date)| filter(negated, key, false, Some(op), RawValue::Date(date)),
    )(input)
}

fn rel_time_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, rel_date_format)),
        |(negated, key, _, date)| filter(negated, key, false, None, RawValue::RelativeDate(date)),
    )(input)
}

fn specific_time_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, date_format)),
        |(negated, key, _, date)| filter(negated, key, false, None, RawValue::Date(date)),
    )(input)
}

fn duration_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, opt(operator), duration_format)),
        |(negated, key, _, op, value)| filter(negated, key, false, op, value),
    )(input)
}

fn numeric_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, opt(operator), numeric_value)),
        |(negated, key, _, op, number)| {
            filter(negated, key, false, op, RawValue::Numeric(number))
        },
    )(input)
}

fn aggregate_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((
            negation,
            aggregate_key,
            sep,
            opt(operator),
            alt((
                duration_format,
                map(percentage_format, RawValue::Percentage),
                map(numeric_value, RawValue::Numeric),
            )),
        )),
        |(negated, key, _, op, value)| filter(negated, key, true, op, value),
    )(input)
}

fn aggregate_date_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, aggregate_key, sep, opt(operator), date_format)),
        |(negated, key, _, op, date)| filter(negated, key, true, op, RawValue::Date(date)),
    )(input)
}

fn aggregate_rel_date_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, aggregate_key, sep, opt(operator), rel_date_format)),
        |(negated, key, _, op, date)| filter(negated, key, true, op, RawValue::RelativeDate(date)),
    )(input)
}

fn has_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((
            negation,
            tag("has"),
            sep,
            alt((
                map(search_key, HasTarget::Key),
                map(search_value, HasTarget::Value),
            )),
        )),
        |(negated, _, _, target)| Term::Has { negated, target },
    )(input)
}

fn is_filter(input: &str) -> Res<'_, Term<'_>> {
    map(tuple((negation, tag("is"), sep, search_value)), |_| Term::Is)(input)
}

fn text_in_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, text_in_list)),
        |(negated, key, _, items)| filter(negated, key, false, None, RawValue::List(items)),
    )(input)
}

fn quoted_basic_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, quoted_value)),
        |(negated, key, _, text)| filter(negated, key, false, None, RawValue::Quoted(text)),
    )(input)
}

fn basic_filter(input: &str) -> Res<'_, Term<'_>> {
    map(
        tuple((negation, search_key, sep, raw_value)),
        |(negated, key, _, text)| filter(negated, key, false, None, RawValue::Text(text)),
    )(input)
}

// ============================================================================
// Keys
// ============================================================================

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '[' | ']')
}

fn key(input: &str) -> Res<'_, &str> {
    take_while1(is_key_char)(input)
}

fn quoted_key(input: &str) -> Res<'_, &str> {
    delimited(
        char('"'),
        take_while1(|c: char| is_key_char(c) || c == ':'),
        char('"'),
    )(input)
}

fn search_key(input: &str) -> Res<'_, &str> {
    alt((key, quoted_key))(input)
}

fn aggregate_key(input: &str) -> Res<'_, &str> {
    recognize(tuple((
        key,
        char('('),
        take_while(|c: char| is_key_char(c) || c == ',' || c == ' '),
        char(')'),
    )))(input)
}

// ============================================================================
// Values
// ============================================================================

fn search_value(input: &str) -> Res<'_, RawValue<'_>> {
    alt((
        map(quoted_value, RawValue::Quoted),
        map(raw_value, RawValue::Text),
    ))(input)
}

/// `[a, "b c"]`: one or more comma-separated values.
fn text_in_list(input: &str) -> Res<'_, Vec<String>> {
    terminated(
        delimited(
            char('['),
            separated_list1(
                tuple((spaces, char(','), spaces)),
                alt((quoted_value, map(text_in_value, str::to_string))),
            ),
            char(']'),
        ),
        boundary,
    )(input)
}

fn text_in_value(input: &str) -> Res<'_, &str> {
    take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, ',' | '[' | ']' | '(' | ')' | '"')
    })(input)
}

fn raw_value(input: &str) -> Res<'_, &str> {
    take_while(|c: char| !c.is_whitespace() && c != '(' && c != ')')(input)
}

/// A double-quoted string. A quote preceded by a backslash does not close it.
fn quoted_value(input: &str) -> Res<'_, String> {
    let (body, _) = char('"')(input)?;
    let mut prev = None;
    for (idx, c) in body.char_indices() {
        if c == '"' && prev != Some('\\') {
            let text = body[..idx].replace("\\\"", "\"");
            return Ok((&body[idx + 1..], text));
        }
        prev = Some(c);
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn boundary(input: &str) -> Res<'_, ()> {
    peek(alt((
        value((), satisfy(char::is_whitespace)),
        value((), char(')')),
        value((), eof),
    )))(input)
}

fn two_digits(input: &str) -> Res<'_, &str> {
    take_while_m_n(2, 2, |c: char| c.is_ascii_digit())(input)
}

fn four_digits(input: &str) -> Res<'_, &str> {
    take_while_m_n(4, 4, |c: char| c.is_ascii_digit())(input)
}

fn date_format(input: &str) -> Res<'_, &str> {
    terminated(
        recognize(tuple((
            four_digits,
            char('-'),
            two_digits,
            char('-'),
            two_digits,
            opt(tuple((
                char('T'),
                two_digits,
                char(':'),
                two_digits,
                char(':'),
                two_digits,
                opt(pair(
                    char('.'),
                    take_while_m_n(1, 6, |c: char| c.is_ascii_digit()),
                )),
            ))),
            opt(alt((
                tag("Z"),
                recognize(tuple((one_of("+-"), two_digits, char(':'), two_digits))),
            ))),
        ))),
        boundary,
    )(input)
}

fn rel_date_format(input: &str) -> Res<'_, &str> {
    terminated(
        recognize(tuple((one_of("+-"), digit1, one_of("wdhm")))),
        boundary,
    )(input)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn duration_format(input: &str) -> Res<'_, RawValue<'_>> {
    map(
        terminated(
            pair(
                take_while1(is_number_char),
                alt((
                    tag("ms"),
                    tag("s"),
                    tag("min"),
                    tag("m"),
                    tag("hr"),
                    tag("h"),
                    tag("day"),
                    tag("d"),
                    tag("wk"),
                    tag("w"),
                )),
            ),
            boundary,
        ),
        |(number, unit)| RawValue::Duration { number, unit },
    )(input)
}

fn percentage_format(input: &str) -> Res<'_, &str> {
    terminated(terminated(take_while1(is_number_char), char('%')), boundary)(input)
}

fn numeric_value(input: &str) -> Res<'_, &str> {
    terminated(
        recognize(pair(opt(char('-')), take_while1(is_number_char))),
        boundary,
    )(input)
}

// ============================================================================
// Tokens
// ============================================================================

fn operator(input: &str) -> Res<'_, Operator> {
    alt((
        value(Operator::GtEq, tag(">=")),
        value(Operator::LtEq, tag("<=")),
        value(Operator::Gt, char('>')),
        value(Operator::Lt, char('<')),
        value(Operator::Eq, char('=')),
        value(Operator::NotEq, tag("!=")),
    ))(input)
}

fn negation(input: &str) -> Res<'_, bool> {
    map(opt(char('!')), |bang| bang.is_some())(input)
}

fn sep(input: &str) -> Res<'_, char> {
    char(':')(input)
}

fn spaces(input: &str) -> Res<'_, &str> {
    take_while(|c: char| c == ' ')(input)
}

// ============================================================================
// Tests
// ============================================================================
