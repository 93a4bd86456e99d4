//! Value types and header-level parsing for OSGi bundle manifests.
//!
//! This crate defines the schema layer: the generic clause grammar
//! (`parse_header`), versions and version ranges (`Version`, `VersionRange`),
//! package descriptors built from Export/Import/DynamicImport headers
//! (`build_packages`), and the raw header map read from `MANIFEST.MF` text
//! (`ManifestHeaders`).

pub mod clause;
pub mod headers;
pub mod package;
pub mod types;
pub mod version;

pub use clause::{
    parse_clause, parse_header, split_delimited, unquote, Attribute, Clause, HeaderError,
};
pub use headers::{parse_manifest_str, HeadersError, ManifestHeaders};
pub use package::{build_packages, PackageDescriptor, PackageError, PackageKind};
pub use types::{ManifestDigest, PackageName, SymbolicName};
pub use version::{Version, VersionError, VersionRange};
