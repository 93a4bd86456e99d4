//! `Bundle-NativeCode` clause parsing.

use crate::platform::{normalize_os_name, normalize_os_version, normalize_processor};
use bundlemeta_schema::clause::{CLAUSE_SEPARATOR, TOKEN_SEPARATOR};
use bundlemeta_schema::{split_delimited, unquote, HeaderError, VersionError, VersionRange};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// The clause that makes native code optional.
pub const OPTIONAL_MARKER: &str = "*";

const OSNAME: &str = "osname";
const OSVERSION: &str = "osversion";
const PROCESSOR: &str = "processor";
const LANGUAGE: &str = "language";
const SELECTION_FILTER: &str = "selection-filter";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeCodeError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("malformed Bundle-NativeCode clause '{clause}': {reason}")]
    MalformedNativeClause { clause: String, reason: String },
    #[error("the optional '*' clause must be the last Bundle-NativeCode clause")]
    MisplacedOptionalMarker,
    #[error("invalid osversion '{value}': {source}")]
    InvalidOsVersion { value: String, source: VersionError },
    #[error("no Bundle-NativeCode clause matches the platform")]
    NoMatchingClause,
    #[error("selection-filter '{filter}' requires a filter evaluator")]
    FilterUnavailable { filter: String },
    #[error("selection-filter '{filter}' could not be evaluated: {reason}")]
    FilterEvaluation { filter: String, reason: String },
}

/// One `Bundle-NativeCode` clause.
///
/// OS names and processors are stored normalized. Empty lists match any
/// platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NativeLibraryClause {
    library_paths: Vec<String>,
    os_names: Vec<String>,
    processors: Vec<String>,
    os_versions: Vec<VersionRange>,
    languages: Vec<String>,
    selection_filter: Option<String>,
    optional_marker: bool,
}

impl NativeLibraryClause {
    /// The trailing `*` clause.
    pub fn optional_marker() -> Self {
        Self {
            optional_marker: true,
            ..Self::default()
        }
    }

    pub fn is_optional_marker(&self) -> bool {
        self.optional_marker
    }

    pub fn library_paths(&self) -> &[String] {
        &self.library_paths
    }

    pub fn os_names(&self) -> &[String] {
        &self.os_names
    }

    pub fn processors(&self) -> &[String] {
        &self.processors
    }

    pub fn os_versions(&self) -> &[VersionRange] {
        &self.os_versions
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn selection_filter(&self) -> Option<&str> {
        self.selection_filter.as_deref()
    }
}

/// Parse a `Bundle-NativeCode` header.
///
/// An absent header yields no clauses. A `*` clause may only appear last.
pub fn parse_native_code(
    header: Option<&str>,
) -> Result<Vec<NativeLibraryClause>, NativeCodeError> {
    let Some(header) = header else {
        return Ok(Vec::new());
    };
    if header.trim().is_empty() {
        return Err(HeaderError::EmptyHeader.into());
    }

    let texts = split_delimited(header, CLAUSE_SEPARATOR);
    let mut clauses = Vec::with_capacity(texts.len());
    for (index, text) in texts.iter().enumerate() {
        if text == OPTIONAL_MARKER {
            if index + 1 != texts.len() {
                return Err(NativeCodeError::MisplacedOptionalMarker);
            }
            clauses.push(NativeLibraryClause::optional_marker());
        } else {
            clauses.push(parse_library_clause(text)?);
        }
    }

    debug!("Bundle-NativeCode: {} clauses", clauses.len());
    Ok(clauses)
}

fn parse_library_clause(text: &str) -> Result<NativeLibraryClause, NativeCodeError> {
    let malformed = |reason: &str| NativeCodeError::MalformedNativeClause {
        clause: text.to_owned(),
        reason: reason.to_owned(),
    };

    let mut clause = NativeLibraryClause::default();
    for token in split_delimited(text, TOKEN_SEPARATOR) {
        let Some((key, value)) = token.split_once('=') else {
            if token.is_empty() {
                return Err(malformed("empty library path"));
            }
            let path = token.strip_prefix('/').unwrap_or(&token);
            clause.library_paths.push(path.to_owned());
            continue;
        };

        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(malformed("parameter without a name"));
        }
        let value = unquote(value.trim());

        match key.as_str() {
            OSNAME => clause.os_names.push(normalize_os_name(value)),
            PROCESSOR => clause.processors.push(normalize_processor(value)),
            OSVERSION => clause.os_versions.push(parse_os_version(value)?),
            LANGUAGE => clause.languages.push(value.to_owned()),
            SELECTION_FILTER => {
                if let Some(previous) = clause.selection_filter.replace(value.to_owned()) {
                    warn!("Bundle-NativeCode: selection-filter '{previous}' replaced by '{value}'");
                }
            }
            _ => warn!("Bundle-NativeCode: ignoring unknown parameter '{key}' in '{text}'"),
        }
    }

    if clause.library_paths.is_empty() {
        return Err(malformed("no library path"));
    }
    Ok(clause)
}

/// A bare OS version is a floor read the way platform versions are read, so
/// `2.6.32-generic` means `2.6.32` and up. Intervals must be valid ranges.
fn parse_os_version(value: &str) -> Result<VersionRange, NativeCodeError> {
    if !value.contains(',') {
        return Ok(VersionRange::at_least(normalize_os_version(value)));
    }
    VersionRange::parse(value).map_err(|source| NativeCodeError::InvalidOsVersion {
        value: value.to_owned(),
        source,
    })
}
