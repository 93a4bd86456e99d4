use bundlemeta_core::platform::{
    FRAMEWORK_LANGUAGE, FRAMEWORK_OS_NAME, FRAMEWORK_OS_VERSION, FRAMEWORK_PROCESSOR,
};
use bundlemeta_core::{
    parse_native_code, select_native_library, NativeCodeError, NativeLibraryClause,
    NativeSelection, Platform,
};
use bundlemeta_schema::Version;
use proptest::prelude::*;
use proptest::sample::Index;

const OS_NAMES: &[&str] = &["Linux", "win32", "Mac OS X"];
const OS_VERSIONS: &[&str] = &["1.0", "5.0", "\"[4.0,6.0)\"", "\"[2.0,3.0)\"", "7.0"];
const LANGUAGES: &[&str] = &["en", "de"];

fn linux() -> Platform {
    Platform::new()
        .with_property(FRAMEWORK_OS_NAME, "Linux")
        .with_property(FRAMEWORK_PROCESSOR, "amd64")
        .with_property(FRAMEWORK_OS_VERSION, "5.15.0")
        .with_property(FRAMEWORK_LANGUAGE, "en")
}

/// Clause parameters without the library path, e.g. `;osname=Linux;language=en`.
fn clause_parameters() -> impl Strategy<Value = String> {
    (
        prop::option::of(prop::sample::select(OS_NAMES)),
        prop::collection::vec(prop::sample::select(OS_VERSIONS), 0..3),
        prop::option::of(prop::sample::select(LANGUAGES)),
    )
        .prop_map(|(os_name, os_versions, language)| {
            let mut text = String::new();
            if let Some(os_name) = os_name {
                text.push_str(&format!(";osname=\"{os_name}\""));
            }
            for os_version in os_versions {
                text.push_str(&format!(";osversion={os_version}"));
            }
            if let Some(language) = language {
                text.push_str(&format!(";language={language}"));
            }
            text
        })
}

fn clause_texts() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(clause_parameters(), 1..6).prop_map(|parameters| {
        parameters
            .iter()
            .enumerate()
            .map(|(i, params)| format!("lib{i}.so{params}"))
            .collect()
    })
}

fn select(texts: &[String], optional: bool) -> Result<NativeSelection, NativeCodeError> {
    let mut header = texts.join(",");
    if optional {
        header.push_str(",*");
    }
    let clauses = parse_native_code(Some(&header)).unwrap();
    select_native_library(&clauses, &linux(), None)
}

fn matches_linux(clause: &NativeLibraryClause) -> bool {
    let os_version = Version::new(5, 15, 0);
    (clause.os_names().is_empty() || clause.os_names().iter().any(|n| n == "linux"))
        && (clause.os_versions().is_empty()
            || clause.os_versions().iter().any(|r| r.contains(&os_version)))
        && (clause.languages().is_empty() || clause.languages().iter().any(|l| l == "en"))
}

proptest! {
    #[test]
    fn selected_clause_matches_the_platform(texts in clause_texts(), optional in any::<bool>()) {
        let clauses = parse_native_code(Some(&texts.join(","))).unwrap();
        let matching: Vec<_> = clauses.iter().filter(|c| matches_linux(c)).collect();

        match select(&texts, optional) {
            Ok(NativeSelection::Selected(selected)) => {
                prop_assert!(matches_linux(&selected));
                prop_assert!(matching.contains(&&selected));
                if matching.len() == 1 {
                    prop_assert_eq!(matching[0], &selected);
                }
                if matching.iter().any(|c| !c.os_versions().is_empty()) {
                    prop_assert!(!selected.os_versions().is_empty());
                }
            }
            Ok(NativeSelection::NoneNeeded) => {
                prop_assert!(optional);
                prop_assert!(matching.is_empty());
            }
            Err(err) => {
                prop_assert_eq!(err, NativeCodeError::NoMatchingClause);
                prop_assert!(!optional);
                prop_assert!(matching.is_empty());
            }
        }
    }

    #[test]
    fn non_matching_clauses_do_not_change_the_selection(
        texts in clause_texts(),
        positions in prop::collection::vec(any::<Index>(), 0..4),
        optional in any::<bool>(),
    ) {
        let mut padded = texts.clone();
        for (k, position) in positions.iter().enumerate() {
            let at = position.index(padded.len() + 1);
            padded.insert(at, format!("other{k}.dll;osname=win32;osversion=5.0;language=en"));
        }

        prop_assert_eq!(select(&texts, optional), select(&padded, optional));
    }
}
