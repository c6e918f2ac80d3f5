//! Named parameter substitution for hand-written query text
//!
//! A single left-to-right pass tracks whether the scanner is inside a quoted
//! string literal or a backtick/bracket-delimited identifier. Only a `:name`
//! token seen in plain query text is a parameter; everything else is copied
//! through byte for byte.
//!
//! ```text
//! select `Weird:Name Test` from test where Name <> :Name
//!        ^^^^^^^^^^^^^^^^^ copied                   ^^^^^ replaced by the bound literal
//! ```

pub mod errors;
pub mod params;

use chrono::{NaiveDate, NaiveDateTime};

pub use errors::BindError;
pub use params::Params;

use crate::value::DbValue;

/// Lexical context of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexState {
    #[default]
    Normal,
    InString,
    InBacktickIdent,
    InBracketIdent,
    InParamToken,
}

/// Quoting/escaping state machine.
///
/// `advance` is fed each character after it has been copied to the output, so
/// the state always reflects the character just consumed.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    state: LexState,
    escape_pending: bool,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LexState {
        self.state
    }

    /// Whether the next character is escaped by a preceding `\`
    pub fn escape_pending(&self) -> bool {
        self.escape_pending
    }

    /// A `:` starts a parameter token only in plain text and only when an
    /// identifier character follows immediately.
    pub fn starts_parameter(&self, c: char, next: Option<char>) -> bool {
        c == ':' && self.state == LexState::Normal && next.is_some_and(is_param_char)
    }

    /// A `\` escapes the next character inside string literals as well as in
    /// plain text, so `'it\'s'` stays one literal (MySQL-style escaping).
    pub fn advance(&mut self, c: char) {
        let escaped = std::mem::take(&mut self.escape_pending);
        self.state = match (self.state, c) {
            (LexState::Normal | LexState::InString, '\\') if !escaped => {
                self.escape_pending = true;
                self.state
            }
            (LexState::Normal, '\'') if !escaped => LexState::InString,
            (LexState::InString, '\'') if !escaped => LexState::Normal,
            (LexState::Normal, '`') => LexState::InBacktickIdent,
            (LexState::InBacktickIdent, '`') => LexState::Normal,
            (LexState::Normal, '[') => LexState::InBracketIdent,
            (LexState::InBracketIdent, ']') => LexState::Normal,
            (state, _) => state,
        };
    }

    fn enter_parameter(&mut self) {
        self.state = LexState::InParamToken;
        self.escape_pending = false;
    }

    fn leave_parameter(&mut self) {
        self.state = LexState::Normal;
    }
}

fn is_param_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Replace every `:name` token in `sql` with the literal rendering of the
/// matching bound parameter.
///
/// # Errors
/// - `MissingParameter` if a token has no bound value; the query must not run
/// - `UnsupportedValue` if a bound value has no literal form (non-finite floats)
///
/// # Example
/// ```
/// use rowgraph::tokenizer::{parameterize, Params};
///
/// let params = Params::new().bind("id", 1).bind("name", "O'Brien");
/// let sql = parameterize("update root set Name = :name where Id = :id", &params).unwrap();
/// assert_eq!(sql, r"update root set Name = 'O\'Brien' where Id = 1");
/// ```
pub fn parameterize(sql: &str, params: &Params) -> Result<String, BindError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut result = String::with_capacity(sql.len() * 2);
    let mut lexer = Tokenizer::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if lexer.starts_parameter(c, next) {
            lexer.enter_parameter();
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_param_char(chars[end]) {
                end += 1;
            }

            let name: String = chars[start..end].iter().collect();
            let value = params
                .get(&name)
                .ok_or_else(|| BindError::MissingParameter(name.clone()))?;
            result.push_str(&render_literal(&name, value)?);

            lexer.leave_parameter();
            i = end;
            continue;
        }

        // Postgres-style `::type` casts are never parameters
        if c == ':' && next == Some(':') && lexer.state() == LexState::Normal {
            result.push_str("::");
            i += 2;
            continue;
        }

        result.push(c);
        lexer.advance(c);
        i += 1;
    }

    Ok(result)
}

/// Render a bound value as query literal text
fn render_literal(name: &str, value: &DbValue) -> Result<String, BindError> {
    match value {
        DbValue::Null => Ok("NULL".to_string()),
        DbValue::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        DbValue::Int(i) => Ok(i.to_string()),
        DbValue::UInt(u) => Ok(u.to_string()),
        DbValue::Float(f) if f.is_finite() => Ok(f.to_string()),
        DbValue::Float(f) => Err(BindError::UnsupportedValue {
            name: name.to_string(),
            reason: format!("non-finite float {}", f),
        }),
        DbValue::Text(s) => Ok(quote(s)),
        DbValue::Date(d) => Ok(quote(&format_date(d))),
        DbValue::DateTime(dt) => Ok(quote(&format_datetime(dt))),
        DbValue::Json(v) => Ok(quote(&v.to_string())),
    }
}

fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn quote(s: &str) -> String {
    format!("'{}'", escape_string(s))
}

/// Backslash-escape a string literal body.
///
/// Backslashes go first so the `\'` produced for quotes is not doubled.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
