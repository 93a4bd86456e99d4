//! Raw manifest headers and the `MANIFEST.MF` text reader.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

pub const BUNDLE_MANIFESTVERSION: &str = "Bundle-ManifestVersion";
pub const BUNDLE_SYMBOLICNAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const EXPORT_PACKAGE: &str = "Export-Package";
pub const IMPORT_PACKAGE: &str = "Import-Package";
pub const DYNAMICIMPORT_PACKAGE: &str = "DynamicImport-Package";
pub const REQUIRE_BUNDLE: &str = "Require-Bundle";
pub const BUNDLE_NATIVECODE: &str = "Bundle-NativeCode";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeadersError {
    #[error("line {line}: expected 'Name: value', got '{text}'")]
    MissingSeparator { line: usize, text: String },
    #[error("line {line}: invalid header name '{name}'")]
    InvalidName { line: usize, name: String },
    #[error("line {line}: continuation line with no header to continue")]
    OrphanContinuation { line: usize },
}

/// Header name to value map with case-insensitive lookup.
///
/// The spelling of the first insertion of a name is kept for iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestHeaders {
    entries: BTreeMap<String, (String, String)>,
}

impl ManifestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, returning the previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, value)),
            None => {
                self.entries.insert(key, (name, value));
                None
            }
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Headers in case-insensitive name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ManifestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Read the main section of a JAR manifest.
///
/// Lines are `Name: value`; a line starting with a single space continues the
/// previous value. The first blank line ends the main section and the
/// per-entry sections after it are ignored. A repeated header keeps the last
/// value.
pub fn parse_manifest_str(input: &str) -> Result<ManifestHeaders, HeadersError> {
    let mut headers = ManifestHeaders::new();
    let mut current: Option<(String, String)> = None;

    for (index, raw) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.is_empty() {
            if current.is_some() || !headers.is_empty() {
                break;
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(' ') {
            let Some((_, value)) = current.as_mut() else {
                return Err(HeadersError::OrphanContinuation { line: line_no });
            };
            value.push_str(rest);
            continue;
        }

        if let Some((name, value)) = current.take() {
            store(&mut headers, name, value);
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(HeadersError::MissingSeparator {
                line: line_no,
                text: line.to_owned(),
            });
        };
        if !is_valid_name(name) {
            return Err(HeadersError::InvalidName {
                line: line_no,
                name: name.to_owned(),
            });
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        current = Some((name.to_owned(), value.to_owned()));
    }

    if let Some((name, value)) = current {
        store(&mut headers, name, value);
    }
    Ok(headers)
}

fn store(headers: &mut ManifestHeaders, name: String, value: String) {
    if headers.insert(name.as_str(), value).is_some() {
        warn!("manifest header '{name}' appears more than once, keeping the last value");
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let headers = ManifestHeaders::new().with_header("Export-Package", "org.a");
        assert_eq!(headers.get("export-package"), Some("org.a"));
        assert_eq!(headers.get("EXPORT-PACKAGE"), Some("org.a"));
        assert!(!headers.contains("Import-Package"));
    }

    #[test]
    fn insert_replaces_and_keeps_first_spelling() {
        let mut headers = ManifestHeaders::new();
        assert_eq!(headers.insert("bundle-version", "1.0"), None);
        assert_eq!(
            headers.insert("Bundle-Version", "2.0"),
            Some("1.0".to_owned())
        );
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("bundle-version", "2.0")]
        );
    }

    #[test]
    fn collects_from_pairs() {
        let headers: ManifestHeaders = [(BUNDLE_SYMBOLICNAME, "org.x"), (BUNDLE_VERSION, "1.0")]
            .into_iter()
            .collect();
        assert_eq!(headers.get(BUNDLE_SYMBOLICNAME), Some("org.x"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn reads_main_section_with_continuations() {
        let input = "Manifest-Version: 1.0\r\n\
                     Bundle-ManifestVersion: 2\r\n\
                     Export-Package: org.a;version=1.0,org.b;ver\r\n \
                     sion=2.0\r\n\
                     \r\n\
                     Name: org/a/Foo.class\r\n\
                     SHA-256-Digest: abc\r\n";
        let headers = parse_manifest_str(input).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get(BUNDLE_MANIFESTVERSION), Some("2"));
        assert_eq!(
            headers.get(EXPORT_PACKAGE),
            Some("org.a;version=1.0,org.b;version=2.0")
        );
        assert!(!headers.contains("Name"));
    }

    #[test]
    fn value_without_space_after_colon() {
        let headers = parse_manifest_str("Bundle-Version:1.2\n").unwrap();
        assert_eq!(headers.get(BUNDLE_VERSION), Some("1.2"));
    }

    #[test]
    fn repeated_header_keeps_last() {
        let headers = parse_manifest_str("A: 1\nA: 2\n").unwrap();
        assert_eq!(headers.get("a"), Some("2"));
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let headers = parse_manifest_str("\n\nA: 1\n").unwrap();
        assert_eq!(headers.get("A"), Some("1"));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(
            parse_manifest_str("A: 1\nnot a header\n"),
            Err(HeadersError::MissingSeparator {
                line: 2,
                text: "not a header".to_owned()
            })
        );
        assert_eq!(
            parse_manifest_str(" orphan\n"),
            Err(HeadersError::OrphanContinuation { line: 1 })
        );
        assert!(matches!(
            parse_manifest_str("Bad Name: x\n"),
            Err(HeadersError::InvalidName { line: 1, .. })
        ));
    }
}
