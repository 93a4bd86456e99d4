//! Whole-manifest processing for OSGi bundles.
//!
//! This crate ties the schema layer together: R3/R4 generation rules
//! (`normalize`), `Bundle-NativeCode` parsing and platform-driven selection
//! (`parse_native_code`, `select_native_library`), the platform property
//! configuration (`Platform`), and the `ManifestParser` facade that turns a
//! header map into an immutable `ParsedManifest`.

pub mod native;
pub mod normalize;
pub mod parser;
pub mod platform;
pub mod select;

pub use native::{parse_native_code, NativeCodeError, NativeLibraryClause};
pub use normalize::{normalize, ManifestGeneration, NormalizeError, NormalizedPackages};
pub use parser::{BundleRequirement, BundleSymbolicName, ManifestParser, ParsedManifest};
pub use platform::{FilterEvaluator, Platform, PropertyResolver};
pub use select::{select_native_library, NativeSelection};

use bundlemeta_schema::{HeaderError, HeadersError, PackageError, VersionError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("manifest text error: {0}")]
    Headers(#[from] HeadersError),
    #[error("header error: {0}")]
    Header(#[from] HeaderError),
    #[error("package error: {0}")]
    Package(#[from] PackageError),
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("native code error: {0}")]
    NativeCode(#[from] NativeCodeError),
    #[error("Bundle-SymbolicName must name exactly one bundle: '{0}'")]
    MultipleSymbolicNames(String),
    #[error("invalid Bundle-Version: {0}")]
    InvalidBundleVersion(VersionError),
    #[error("invalid bundle-version on required bundle '{bundle}': {source}")]
    InvalidRequiredBundleVersion { bundle: String, source: VersionError },
}
