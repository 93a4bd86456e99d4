//! Generic manifest header grammar.
//!
//! ```text
//! header    := clause ( ',' clause )*
//! clause    := path ( ';' path )* ( ';' ( directive | attribute ) )*
//! directive := key ':=' value
//! attribute := key '=' value
//! ```
//!
//! Splitting on `,` and `;` ignores delimiters inside double quotes. Every
//! token is trimmed, and a quoted value has its surrounding quotes removed
//! verbatim (there are no escapes).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const CLAUSE_SEPARATOR: char = ',';
pub const TOKEN_SEPARATOR: char = ';';
pub const DIRECTIVE_SEPARATOR: &str = ":=";
pub const ATTRIBUTE_SEPARATOR: char = '=';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("a header cannot be an empty string")]
    EmptyHeader,
    #[error("no paths specified in clause '{clause}'")]
    NoPathsInClause { clause: String },
    #[error("malformed token '{token}' in clause '{clause}': expected a path, directive, or attribute")]
    MalformedClauseToken { clause: String, token: String },
    #[error("duplicate directive '{key}' in clause '{clause}'")]
    DuplicateDirective { clause: String, key: String },
    #[error("duplicate attribute '{key}' in clause '{clause}'")]
    DuplicateAttribute { clause: String, key: String },
}

/// A plain `key=value` clause property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub value: String,
    /// Set when the clause's `mandatory:=` directive names this attribute.
    #[serde(default)]
    pub mandatory: bool,
}

impl Attribute {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mandatory: false,
        }
    }
}

/// One comma-separated segment of a header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Never empty for a parsed clause.
    pub paths: Vec<String>,
    pub directives: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Clause {
    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }
}

/// Parse a whole header into clauses.
///
/// An absent header has no clauses; a present but empty one is an error.
pub fn parse_header(header: Option<&str>) -> Result<Vec<Clause>, HeaderError> {
    let Some(header) = header else {
        return Ok(Vec::new());
    };
    if header.trim().is_empty() {
        return Err(HeaderError::EmptyHeader);
    }

    split_delimited(header, CLAUSE_SEPARATOR)
        .iter()
        .map(String::as_str)
        .map(parse_clause)
        .collect()
}

/// Parse a single clause: paths first, then directives and attributes.
pub fn parse_clause(text: &str) -> Result<Clause, HeaderError> {
    let tokens = split_delimited(text, TOKEN_SEPARATOR);

    let path_count = tokens
        .iter()
        .take_while(|t| !t.contains(ATTRIBUTE_SEPARATOR))
        .count();
    if path_count == 0 {
        return Err(HeaderError::NoPathsInClause {
            clause: text.trim().to_owned(),
        });
    }

    let mut clause = Clause::default();
    for token in &tokens[..path_count] {
        if token.is_empty() {
            return Err(malformed(text, token));
        }
        clause.paths.push(token.clone());
    }

    for token in &tokens[path_count..] {
        let Some(eq) = token.find(ATTRIBUTE_SEPARATOR) else {
            return Err(malformed(text, token));
        };
        let is_directive = token[..eq].ends_with(':');
        let key_end = if is_directive { eq - 1 } else { eq };
        let key = token[..key_end].trim();
        if key.is_empty() {
            return Err(malformed(text, token));
        }
        let value = unquote(token[eq + 1..].trim()).to_owned();

        if is_directive {
            if clause.directives.contains_key(key) {
                return Err(HeaderError::DuplicateDirective {
                    clause: text.trim().to_owned(),
                    key: key.to_owned(),
                });
            }
            clause.directives.insert(key.to_owned(), value);
        } else {
            if clause.attributes.contains_key(key) {
                return Err(HeaderError::DuplicateAttribute {
                    clause: text.trim().to_owned(),
                    key: key.to_owned(),
                });
            }
            clause.attributes.insert(key.to_owned(), Attribute::new(value));
        }
    }

    Ok(clause)
}

fn malformed(clause: &str, token: &str) -> HeaderError {
    HeaderError::MalformedClauseToken {
        clause: clause.trim().to_owned(),
        token: token.to_owned(),
    }
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Split on `delimiter`, ignoring delimiters between double quotes.
///
/// Tokens are trimmed and keep their quotes. Empty tokens between two
/// delimiters are kept so callers can reject them; a trailing empty token is
/// dropped.
pub fn split_delimited(value: &str, delimiter: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in value.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c == delimiter && !in_quotes {
            tokens.push(current.trim().to_owned());
            current.clear();
        } else {
            current.push(c);
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        tokens.push(last.to_owned());
    }
    tokens
}
