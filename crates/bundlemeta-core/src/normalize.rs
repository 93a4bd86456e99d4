use bundlemeta_schema::package::{
    BUNDLE_SYMBOLICNAME_ATTRIBUTE, BUNDLE_VERSION_ATTRIBUTE, USES_DIRECTIVE, VERSION_ATTRIBUTE,
};
use bundlemeta_schema::{
    Attribute, PackageDescriptor, PackageKind, PackageName, SymbolicName, Version, VersionRange,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("unsupported Bundle-ManifestVersion '{0}', expected 1 or 2")]
    UnsupportedManifestVersion(String),
    #[error("Bundle-ManifestVersion 2 requires a Bundle-SymbolicName")]
    MissingSymbolicName,
    #[error("export '{package}' must not declare the '{attribute}' attribute")]
    ExportAttributeReserved { package: String, attribute: String },
    #[error("R3 manifests do not allow directives: {header} '{package}'")]
    DirectivesNotAllowedInR3 { header: PackageKind, package: String },
    #[error("R3 dynamic imports allow no directives or attributes: '{package}'")]
    AttributesNotAllowedInR3DynamicImport { package: String },
}

/// Manifest semantics selected by `Bundle-ManifestVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestGeneration {
    R3,
    R4,
}

impl ManifestGeneration {
    /// Absent or `1` is R3, `2` is R4.
    pub fn from_header(value: Option<&str>) -> Result<Self, NormalizeError> {
        match value.map(str::trim) {
            None | Some("1") => Ok(Self::R3),
            Some("2") => Ok(Self::R4),
            Some(other) => Err(NormalizeError::UnsupportedManifestVersion(other.to_owned())),
        }
    }
}

impl fmt::Display for ManifestGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R3 => f.write_str("R3"),
            Self::R4 => f.write_str("R4"),
        }
    }
}

/// Package descriptors after generation rules have been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedPackages {
    pub exports: Vec<PackageDescriptor>,
    pub imports: Vec<PackageDescriptor>,
    pub dynamic_imports: Vec<PackageDescriptor>,
}

/// Apply R3 or R4 rules across a manifest's package descriptors.
///
/// The inputs are never modified; every changed descriptor is a new value.
pub fn normalize(
    manifest_version: Option<&str>,
    symbolic_name: Option<&SymbolicName>,
    bundle_version: Option<&Version>,
    exports: &[PackageDescriptor],
    imports: &[PackageDescriptor],
    dynamic_imports: &[PackageDescriptor],
) -> Result<NormalizedPackages, NormalizeError> {
    let generation = ManifestGeneration::from_header(manifest_version)?;
    debug!(
        "normalizing {generation} manifest: {} exports, {} imports, {} dynamic imports",
        exports.len(),
        imports.len(),
        dynamic_imports.len()
    );

    match generation {
        ManifestGeneration::R4 => {
            let symbolic_name = symbolic_name.ok_or(NormalizeError::MissingSymbolicName)?;
            let version = bundle_version.cloned().unwrap_or_default();
            Ok(NormalizedPackages {
                exports: stamp_exports(exports, symbolic_name, &version)?,
                imports: imports.to_vec(),
                dynamic_imports: dynamic_imports.to_vec(),
            })
        }
        ManifestGeneration::R3 => normalize_r3(exports, imports, dynamic_imports),
    }
}

/// R4 exports carry the bundle's identity as attributes.
fn stamp_exports(
    exports: &[PackageDescriptor],
    symbolic_name: &SymbolicName,
    version: &Version,
) -> Result<Vec<PackageDescriptor>, NormalizeError> {
    let version = version.to_string();
    exports
        .iter()
        .map(|export| {
            for attribute in [BUNDLE_SYMBOLICNAME_ATTRIBUTE, BUNDLE_VERSION_ATTRIBUTE] {
                if export.attribute(attribute).is_some() {
                    return Err(NormalizeError::ExportAttributeReserved {
                        package: export.name().to_string(),
                        attribute: attribute.to_owned(),
                    });
                }
            }
            let mut attributes = export.attributes().clone();
            attributes.insert(
                BUNDLE_SYMBOLICNAME_ATTRIBUTE.to_owned(),
                Attribute::new(symbolic_name.as_str()),
            );
            attributes.insert(
                BUNDLE_VERSION_ATTRIBUTE.to_owned(),
                Attribute::new(version.as_str()),
            );
            Ok(export.with_attributes(attributes))
        })
        .collect()
}

fn normalize_r3(
    exports: &[PackageDescriptor],
    imports: &[PackageDescriptor],
    dynamic_imports: &[PackageDescriptor],
) -> Result<NormalizedPackages, NormalizeError> {
    if let Some(package) = exports
        .iter()
        .chain(imports)
        .find(|p| !p.directives().is_empty())
    {
        return Err(NormalizeError::DirectivesNotAllowedInR3 {
            header: package.kind(),
            package: package.name().to_string(),
        });
    }
    if let Some(package) = dynamic_imports.iter().find(|p| !is_plain_r3_dynamic(p)) {
        return Err(NormalizeError::AttributesNotAllowedInR3DynamicImport {
            package: package.name().to_string(),
        });
    }

    let exports: Vec<_> = exports.iter().map(retain_version_only).collect();
    let mut imports: Vec<_> = imports.iter().map(retain_version_only).collect();

    // R3 bundles implicitly import everything they export.
    let mut imported: BTreeSet<PackageName> = imports.iter().map(|p| p.name().clone()).collect();
    for export in &exports {
        if imported.insert(export.name().clone()) {
            imports.push(export.with_kind(PackageKind::Import));
        }
    }

    let uses = imported
        .iter()
        .map(PackageName::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let exports = exports
        .iter()
        .map(|export| {
            export.with_directives(BTreeMap::from([(USES_DIRECTIVE.to_owned(), uses.clone())]))
        })
        .collect();

    Ok(NormalizedPackages {
        exports,
        imports,
        dynamic_imports: dynamic_imports.to_vec(),
    })
}

/// Only a `version` attribute survives on R3 exports and imports.
fn retain_version_only(package: &PackageDescriptor) -> PackageDescriptor {
    let mut attributes = BTreeMap::new();
    for (key, attribute) in package.attributes() {
        if key == VERSION_ATTRIBUTE {
            attributes.insert(key.clone(), attribute.clone());
        } else {
            warn!(
                "R3 manifest: dropping attribute '{key}' from {} '{}'",
                package.kind(),
                package.name()
            );
        }
    }
    package.with_attributes(attributes)
}

/// No directives, and at most a `version` attribute with the default range.
fn is_plain_r3_dynamic(package: &PackageDescriptor) -> bool {
    package.directives().is_empty()
        && package.attributes().keys().all(|key| {
            key == VERSION_ATTRIBUTE && package.version_range() == VersionRange::default()
        })
}
