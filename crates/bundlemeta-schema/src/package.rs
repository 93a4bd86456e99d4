//! Package descriptors built from Export-Package, Import-Package and
//! DynamicImport-Package headers.

use crate::clause::{parse_header, Attribute, Clause, HeaderError};
use crate::types::PackageName;
use crate::version::{Version, VersionError, VersionRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

pub const VERSION_ATTRIBUTE: &str = "version";
pub const SPECIFICATION_VERSION_ATTRIBUTE: &str = "specification-version";
pub const BUNDLE_SYMBOLICNAME_ATTRIBUTE: &str = "bundle-symbolic-name";
pub const BUNDLE_VERSION_ATTRIBUTE: &str = "bundle-version";
pub const USES_DIRECTIVE: &str = "uses";
pub const MANDATORY_DIRECTIVE: &str = "mandatory";
pub const RESOLUTION_DIRECTIVE: &str = "resolution";
pub const RESOLUTION_OPTIONAL: &str = "optional";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(
        "package '{package}' declares version '{version}' and specification-version \
         '{specification_version}', which differ"
    )]
    VersionAttributeMismatch {
        package: String,
        version: String,
        specification_version: String,
    },
    #[error("{header} must not name java.* packages: '{name}'")]
    ReservedPackagePrefix { header: PackageKind, name: String },
    #[error("duplicate import of package '{0}'")]
    DuplicateImport(String),
    #[error("invalid '{attribute}' attribute on '{package}': {source}")]
    InvalidVersionAttribute {
        package: String,
        attribute: String,
        source: VersionError,
    },
    #[error("mandatory attribute '{attribute}' is not declared on '{package}'")]
    MandatoryAttributeMissing { package: String, attribute: String },
}

/// Which header a descriptor came from. Each kind has its own duplicate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageKind {
    Export,
    Import,
    DynamicImport,
}

impl PackageKind {
    pub fn header_name(self) -> &'static str {
        match self {
            PackageKind::Export => "Export-Package",
            PackageKind::Import => "Import-Package",
            PackageKind::DynamicImport => "DynamicImport-Package",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// One exported, imported, or dynamically imported package.
///
/// Descriptors are immutable; normalization produces new values through
/// [`PackageDescriptor::with_directives`] and
/// [`PackageDescriptor::with_attributes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    kind: PackageKind,
    name: PackageName,
    directives: BTreeMap<String, String>,
    attributes: BTreeMap<String, Attribute>,
}

impl PackageDescriptor {
    pub fn new(
        kind: PackageKind,
        name: impl Into<PackageName>,
        directives: BTreeMap<String, String>,
        attributes: BTreeMap<String, Attribute>,
    ) -> Result<Self, PackageError> {
        let name = name.into();
        if name.is_reserved() {
            return Err(PackageError::ReservedPackagePrefix {
                header: kind,
                name: name.into_inner(),
            });
        }
        Ok(Self {
            kind,
            name,
            directives,
            attributes,
        })
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn directives(&self) -> &BTreeMap<String, String> {
        &self.directives
    }

    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|a| a.value.as_str())
    }

    /// The declared `version` read as an exact version; `0.0.0` if absent.
    pub fn version(&self) -> Version {
        self.attribute(VERSION_ATTRIBUTE)
            .and_then(|v| Version::parse(v).ok())
            .unwrap_or_default()
    }

    /// The declared `version` read as a range; `0.0.0` and up if absent.
    pub fn version_range(&self) -> VersionRange {
        self.attribute(VERSION_ATTRIBUTE)
            .and_then(|v| VersionRange::parse(v).ok())
            .unwrap_or_default()
    }

    /// Package names listed in the `uses` directive.
    pub fn uses(&self) -> Vec<&str> {
        split_list(self.directive(USES_DIRECTIVE).unwrap_or_default())
    }

    /// `resolution:=optional`.
    pub fn is_optional(&self) -> bool {
        self.directive(RESOLUTION_DIRECTIVE) == Some(RESOLUTION_OPTIONAL)
    }

    /// The same package under another header kind.
    #[must_use]
    pub fn with_kind(&self, kind: PackageKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_directives(&self, directives: BTreeMap<String, String>) -> Self {
        Self {
            directives,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_attributes(&self, attributes: BTreeMap<String, Attribute>) -> Self {
        Self {
            attributes,
            ..self.clone()
        }
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.directives {
            write!(f, ";{key}:=\"{value}\"")?;
        }
        for (key, attr) in &self.attributes {
            write!(f, ";{key}=\"{}\"", attr.value)?;
        }
        Ok(())
    }
}

/// Build descriptors from one package header.
///
/// Every path of a clause becomes its own descriptor sharing the clause's
/// directives and attributes. Duplicates are handled per kind: exports keep
/// the first declaration, imports reject the repeat, dynamic imports keep all.
pub fn build_packages(
    header: Option<&str>,
    kind: PackageKind,
) -> Result<Vec<PackageDescriptor>, PackageError> {
    let clauses = parse_header(header)?;

    let mut packages = Vec::new();
    let mut seen = BTreeSet::new();
    for clause in clauses {
        let clause = reconcile_version(clause)?;
        let clause = apply_mandatory(clause)?;
        validate_version_attributes(&clause, kind)?;

        for path in &clause.paths {
            let descriptor = PackageDescriptor::new(
                kind,
                path.as_str(),
                clause.directives.clone(),
                clause.attributes.clone(),
            )?;

            match kind {
                PackageKind::Export => {
                    if !seen.insert(descriptor.name.clone()) {
                        warn!("duplicate export '{path}', keeping the first declaration");
                        continue;
                    }
                }
                PackageKind::Import => {
                    if !seen.insert(descriptor.name.clone()) {
                        return Err(PackageError::DuplicateImport(path.clone()));
                    }
                }
                PackageKind::DynamicImport => {}
            }
            packages.push(descriptor);
        }
    }

    debug!("{kind}: {} package descriptors", packages.len());
    Ok(packages)
}

/// Fold `specification-version` into `version`; the two must agree when both
/// are present.
fn reconcile_version(mut clause: Clause) -> Result<Clause, PackageError> {
    let Some(spec_version) = clause.attributes.remove(SPECIFICATION_VERSION_ATTRIBUTE) else {
        return Ok(clause);
    };

    match clause.attributes.get(VERSION_ATTRIBUTE) {
        Some(version) if version.value.trim() != spec_version.value.trim() => {
            Err(PackageError::VersionAttributeMismatch {
                package: clause.paths.join(";"),
                version: version.value.clone(),
                specification_version: spec_version.value,
            })
        }
        Some(_) => Ok(clause),
        None => {
            clause
                .attributes
                .insert(VERSION_ATTRIBUTE.to_owned(), spec_version);
            Ok(clause)
        }
    }
}

/// Flag every attribute named by `mandatory:=`.
fn apply_mandatory(mut clause: Clause) -> Result<Clause, PackageError> {
    let Some(names) = clause.directives.get(MANDATORY_DIRECTIVE).cloned() else {
        return Ok(clause);
    };

    for name in split_list(&names) {
        match clause.attributes.get_mut(name) {
            Some(attr) => attr.mandatory = true,
            None => {
                return Err(PackageError::MandatoryAttributeMissing {
                    package: clause.paths.join(";"),
                    attribute: name.to_owned(),
                });
            }
        }
    }
    Ok(clause)
}

/// Exports carry an exact `version`; imports carry `version` and
/// `bundle-version` ranges.
fn validate_version_attributes(clause: &Clause, kind: PackageKind) -> Result<(), PackageError> {
    let invalid = |attribute: &str, source: VersionError| PackageError::InvalidVersionAttribute {
        package: clause.paths.join(";"),
        attribute: attribute.to_owned(),
        source,
    };

    match kind {
        PackageKind::Export => {
            if let Some(attr) = clause.attribute(VERSION_ATTRIBUTE) {
                Version::parse(&attr.value).map_err(|e| invalid(VERSION_ATTRIBUTE, e))?;
            }
        }
        PackageKind::Import | PackageKind::DynamicImport => {
            for key in [VERSION_ATTRIBUTE, BUNDLE_VERSION_ATTRIBUTE] {
                if let Some(attr) = clause.attribute(key) {
                    VersionRange::parse(&attr.value).map_err(|e| invalid(key, e))?;
                }
            }
        }
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
