//! Platform properties consulted by native code selection.

use bundlemeta_schema::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const FRAMEWORK_OS_NAME: &str = "org.osgi.framework.os.name";
pub const FRAMEWORK_PROCESSOR: &str = "org.osgi.framework.processor";
pub const FRAMEWORK_OS_VERSION: &str = "org.osgi.framework.os.version";
pub const FRAMEWORK_LANGUAGE: &str = "org.osgi.framework.language";

/// String key to string value lookup over framework properties.
///
/// The provided accessors return the normalized forms that native code
/// clauses are compared against.
pub trait PropertyResolver {
    fn property(&self, key: &str) -> Option<&str>;

    fn os_name(&self) -> String {
        normalize_os_name(self.property(FRAMEWORK_OS_NAME).unwrap_or_default())
    }

    fn processor(&self) -> String {
        normalize_processor(self.property(FRAMEWORK_PROCESSOR).unwrap_or_default())
    }

    fn os_version(&self) -> Version {
        normalize_os_version(self.property(FRAMEWORK_OS_VERSION).unwrap_or_default())
    }

    fn language(&self) -> Option<&str> {
        self.property(FRAMEWORK_LANGUAGE)
    }
}

impl PropertyResolver for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl<S: std::hash::BuildHasher> PropertyResolver for HashMap<String, String, S> {
    fn property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// Evaluates a `selection-filter` against platform properties.
///
/// The LDAP filter grammar lives with the host framework; this crate only
/// calls into it.
pub trait FilterEvaluator {
    fn evaluate(&self, filter: &str, properties: &dyn PropertyResolver) -> Result<bool, String>;
}

/// Framework properties describing the running platform.
///
/// Serializes as a flat string map keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Platform {
    properties: BTreeMap<String, String>,
}

impl Platform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// OS name and processor of the running process. The OS version is left
    /// unset and reads as `0.0.0`.
    pub fn host() -> Self {
        let processor = match std::env::consts::ARCH {
            "x86_64" => "x86-64",
            "x86" => "x86",
            other => other,
        };
        Self::new()
            .with_property(FRAMEWORK_OS_NAME, std::env::consts::OS)
            .with_property(FRAMEWORK_PROCESSOR, processor)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl PropertyResolver for Platform {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Fold an OS name onto its canonical lower-case alias.
pub fn normalize_os_name(value: &str) -> String {
    let value = value.trim().to_ascii_lowercase();

    if value.starts_with("win") {
        let os = if value.contains("32") || value.contains('*') {
            "win32"
        } else if value.contains("95") {
            "windows95"
        } else if value.contains("98") {
            "windows98"
        } else if value.contains("nt") {
            "windowsnt"
        } else if value.contains("2000") {
            "windows2000"
        } else if value.contains("xp") {
            "windowsxp"
        } else if value.contains("ce") {
            "windowsce"
        } else if value.contains("vista") {
            "windowsvista"
        } else {
            "win"
        };
        return os.to_owned();
    }

    const PREFIXES: &[(&str, &str)] = &[
        ("linux", "linux"),
        ("aix", "aix"),
        ("digitalunix", "digitalunix"),
        ("hpux", "hpux"),
        ("irix", "irix"),
        ("macos", "macos"),
        ("mac os", "macos"),
        ("netware", "netware"),
        ("openbsd", "openbsd"),
        ("netbsd", "netbsd"),
        ("os2", "os2"),
        ("os/2", "os2"),
        ("qnx", "qnx"),
        ("procnto", "qnx"),
        ("solaris", "solaris"),
        ("sunos", "sunos"),
        ("vxworks", "vxworks"),
    ];
    canonical_prefix(value, PREFIXES)
}

/// Windows variants that a `win32` clause alias accepts.
pub fn is_windows_variant(normalized: &str) -> bool {
    matches!(
        normalized,
        "windows95"
            | "windows98"
            | "windowsnt"
            | "windows2000"
            | "windowsxp"
            | "windowsce"
            | "windowsvista"
    )
}

/// Fold a processor name onto its canonical lower-case alias.
pub fn normalize_processor(value: &str) -> String {
    const PREFIXES: &[(&str, &str)] = &[
        ("x86-64", "x86-64"),
        ("x86_64", "x86-64"),
        ("amd64", "x86-64"),
        ("x86", "x86"),
        ("pentium", "x86"),
        ("i386", "x86"),
        ("i486", "x86"),
        ("i586", "x86"),
        ("i686", "x86"),
        ("68k", "68k"),
        ("arm", "arm"),
        ("alpha", "alpha"),
        ("ignite", "ignite"),
        ("psc1k", "ignite"),
        ("mips", "mips"),
        ("parisc", "parisc"),
        ("powerpc", "powerpc"),
        ("power", "powerpc"),
        ("ppc", "powerpc"),
        ("sparc", "sparc"),
    ];
    canonical_prefix(value.trim().to_ascii_lowercase(), PREFIXES)
}

/// Reduce an OS version to `major.minor.micro`.
///
/// Missing components are zero, anything after a `-` in the micro component
/// is dropped, and text that does not start with numbers reads as `0.0.0`.
pub fn normalize_os_version(value: &str) -> Version {
    let mut parts = value.trim().split('.');
    let mut next = |strip_qualifier: bool| -> Option<Option<u32>> {
        let part = parts.next()?;
        let part = if strip_qualifier {
            part.split_once('-').map_or(part, |(head, _)| head)
        } else {
            part
        };
        Some(part.parse().ok())
    };

    let Some(Some(major)) = next(false) else {
        return Version::EMPTY;
    };
    let minor = match next(false) {
        None => 0,
        Some(Some(minor)) => minor,
        Some(None) => return Version::EMPTY,
    };
    let micro = match next(true) {
        None => 0,
        Some(Some(micro)) => micro,
        Some(None) => return Version::EMPTY,
    };
    Version::new(major, minor, micro)
}

fn canonical_prefix(value: String, prefixes: &[(&str, &str)]) -> String {
    prefixes
        .iter()
        .find(|(prefix, _)| value.starts_with(prefix))
        .map_or(value, |(_, canonical)| (*canonical).to_owned())
}
