//! `ManifestParser`, the facade that turns a header map into a validated `ParsedManifest`.

use crate::native::{parse_native_code, NativeLibraryClause};
use crate::normalize::{normalize, ManifestGeneration, NormalizedPackages};
use crate::platform::{FilterEvaluator, PropertyResolver};
use crate::select::{select_native_library, NativeSelection};
use crate::ManifestError;
use bundlemeta_schema::headers::{
    BUNDLE_MANIFESTVERSION, BUNDLE_NATIVECODE, BUNDLE_SYMBOLICNAME, BUNDLE_VERSION,
    DYNAMICIMPORT_PACKAGE, EXPORT_PACKAGE, IMPORT_PACKAGE, REQUIRE_BUNDLE,
};
use bundlemeta_schema::package::{
    BUNDLE_VERSION_ATTRIBUTE, RESOLUTION_DIRECTIVE, RESOLUTION_OPTIONAL,
};
use bundlemeta_schema::{
    build_packages, parse_header, parse_manifest_str, Attribute, ManifestDigest, ManifestHeaders,
    PackageDescriptor, PackageKind, SymbolicName, Version, VersionRange,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const SINGLETON_DIRECTIVE: &str = "singleton";
pub const VISIBILITY_DIRECTIVE: &str = "visibility";
pub const VISIBILITY_REEXPORT: &str = "reexport";

/// The `Bundle-SymbolicName` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSymbolicName {
    pub name: SymbolicName,
    pub directives: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl BundleSymbolicName {
    pub fn is_singleton(&self) -> bool {
        self.directives
            .get(SINGLETON_DIRECTIVE)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

/// One `Require-Bundle` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleRequirement {
    pub symbolic_name: SymbolicName,
    pub directives: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl BundleRequirement {
    /// The `bundle-version` range; any version if absent.
    pub fn version_range(&self) -> VersionRange {
        self.attributes
            .get(BUNDLE_VERSION_ATTRIBUTE)
            .and_then(|a| VersionRange::parse(&a.value).ok())
            .unwrap_or_default()
    }

    pub fn is_optional(&self) -> bool {
        self.directives.get(RESOLUTION_DIRECTIVE).map(String::as_str) == Some(RESOLUTION_OPTIONAL)
    }

    pub fn is_reexport(&self) -> bool {
        self.directives.get(VISIBILITY_DIRECTIVE).map(String::as_str) == Some(VISIBILITY_REEXPORT)
    }
}

/// A fully parsed and normalized manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedManifest {
    generation: ManifestGeneration,
    symbolic_name: Option<BundleSymbolicName>,
    version: Version,
    #[serde(flatten)]
    packages: NormalizedPackages,
    required_bundles: Vec<BundleRequirement>,
    native_code: Vec<NativeLibraryClause>,
}

impl ParsedManifest {
    pub fn generation(&self) -> ManifestGeneration {
        self.generation
    }

    pub fn symbolic_name(&self) -> Option<&BundleSymbolicName> {
        self.symbolic_name.as_ref()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn exports(&self) -> &[PackageDescriptor] {
        &self.packages.exports
    }

    pub fn imports(&self) -> &[PackageDescriptor] {
        &self.packages.imports
    }

    pub fn dynamic_imports(&self) -> &[PackageDescriptor] {
        &self.packages.dynamic_imports
    }

    pub fn required_bundles(&self) -> &[BundleRequirement] {
        &self.required_bundles
    }

    pub fn native_code(&self) -> &[NativeLibraryClause] {
        &self.native_code
    }

    /// Pick the native library clause for `platform`.
    pub fn select_native_code(
        &self,
        platform: &dyn PropertyResolver,
        evaluator: Option<&dyn FilterEvaluator>,
    ) -> Result<NativeSelection, ManifestError> {
        Ok(select_native_library(&self.native_code, platform, evaluator)?)
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// blake3 digest of the canonical JSON form.
    pub fn fingerprint(&self) -> Result<ManifestDigest, serde_json::Error> {
        let json = self.canonical_json()?;
        Ok(ManifestDigest::new(
            blake3::hash(json.as_bytes()).to_hex().to_string(),
        ))
    }
}

/// Runs every header stage over a manifest and normalizes the result.
///
/// Any failure rejects the whole manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestParser;

impl ManifestParser {
    pub fn parse(headers: &ManifestHeaders) -> Result<ParsedManifest, ManifestError> {
        let generation = ManifestGeneration::from_header(headers.get(BUNDLE_MANIFESTVERSION))?;
        let symbolic_name = parse_symbolic_name(headers.get(BUNDLE_SYMBOLICNAME))?;
        let version = parse_bundle_version(headers.get(BUNDLE_VERSION), generation)?;

        let exports = build_packages(headers.get(EXPORT_PACKAGE), PackageKind::Export)?;
        let imports = build_packages(headers.get(IMPORT_PACKAGE), PackageKind::Import)?;
        let dynamic_imports =
            build_packages(headers.get(DYNAMICIMPORT_PACKAGE), PackageKind::DynamicImport)?;
        let required_bundles = parse_required_bundles(headers.get(REQUIRE_BUNDLE))?;
        let native_code = parse_native_code(headers.get(BUNDLE_NATIVECODE))?;

        let packages = normalize(
            headers.get(BUNDLE_MANIFESTVERSION),
            symbolic_name.as_ref().map(|bsn| &bsn.name),
            Some(&version),
            &exports,
            &imports,
            &dynamic_imports,
        )?;

        debug!(
            "parsed {generation} manifest {}: {} exports, {} imports, {} native clauses",
            symbolic_name
                .as_ref()
                .map_or("<unnamed>", |bsn| bsn.name.as_str()),
            packages.exports.len(),
            packages.imports.len(),
            native_code.len()
        );

        Ok(ParsedManifest {
            generation,
            symbolic_name,
            version,
            packages,
            required_bundles,
            native_code,
        })
    }

    /// Read `MANIFEST.MF` text and parse it.
    pub fn parse_str(input: &str) -> Result<ParsedManifest, ManifestError> {
        Self::parse(&parse_manifest_str(input)?)
    }
}

fn parse_symbolic_name(header: Option<&str>) -> Result<Option<BundleSymbolicName>, ManifestError> {
    let mut clauses = parse_header(header)?;
    match clauses.len() {
        0 => return Ok(None),
        1 if clauses[0].paths.len() == 1 => {}
        _ => {
            return Err(ManifestError::MultipleSymbolicNames(
                header.unwrap_or_default().trim().to_owned(),
            ));
        }
    }

    let clause = clauses.remove(0);
    let name = clause.paths.into_iter().next().unwrap_or_default();
    Ok(Some(BundleSymbolicName {
        name: SymbolicName::new(name),
        directives: clause.directives,
        attributes: clause.attributes,
    }))
}

/// R4 bundles must declare a valid version; R3 bundles fall back to `0.0.0`.
fn parse_bundle_version(
    header: Option<&str>,
    generation: ManifestGeneration,
) -> Result<Version, ManifestError> {
    let Some(text) = header else {
        return Ok(Version::EMPTY);
    };
    match (Version::parse(text), generation) {
        (Ok(version), _) => Ok(version),
        (Err(e), ManifestGeneration::R4) => Err(ManifestError::InvalidBundleVersion(e)),
        (Err(e), ManifestGeneration::R3) => {
            warn!("R3 manifest: ignoring invalid Bundle-Version: {e}");
            Ok(Version::EMPTY)
        }
    }
}

fn parse_required_bundles(header: Option<&str>) -> Result<Vec<BundleRequirement>, ManifestError> {
    let mut requirements = Vec::new();
    for clause in parse_header(header)? {
        if let Some(attr) = clause.attribute(BUNDLE_VERSION_ATTRIBUTE) {
            VersionRange::parse(&attr.value).map_err(|source| {
                ManifestError::InvalidRequiredBundleVersion {
                    bundle: clause.paths.join(";"),
                    source,
                }
            })?;
        }
        for path in &clause.paths {
            requirements.push(BundleRequirement {
                symbolic_name: SymbolicName::new(path.as_str()),
                directives: clause.directives.clone(),
                attributes: clause.attributes.clone(),
            });
        }
    }
    Ok(requirements)
}
