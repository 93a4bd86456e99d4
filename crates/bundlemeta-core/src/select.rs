//! Native library clause selection.

use crate::native::{NativeCodeError, NativeLibraryClause};
use crate::platform::{is_windows_variant, FilterEvaluator, PropertyResolver};
use bundlemeta_schema::{Version, VersionRange};
use serde::Serialize;
use tracing::debug;

/// Outcome of selecting a native library clause for a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NativeSelection {
    Selected(NativeLibraryClause),
    /// No native code is required: the header is absent, or nothing matched
    /// and the header ends with the optional `*` clause.
    NoneNeeded,
}

/// Normalized platform facts, computed once per selection.
struct Target<'p> {
    os_name: String,
    processor: String,
    os_version: Version,
    language: Option<&'p str>,
}

/// Pick the clause to load for `platform`.
///
/// When several clauses match, prefer clauses declaring the highest
/// `osversion` floor, then clauses declaring a language, then declaration
/// order. A narrowing step that would leave nothing is skipped.
pub fn select_native_library(
    clauses: &[NativeLibraryClause],
    platform: &dyn PropertyResolver,
    evaluator: Option<&dyn FilterEvaluator>,
) -> Result<NativeSelection, NativeCodeError> {
    let (clauses, optional) = match clauses.split_last() {
        Some((last, rest)) if last.is_optional_marker() => (rest, true),
        _ => (clauses, false),
    };
    if clauses.is_empty() {
        return Ok(NativeSelection::NoneNeeded);
    }

    let target = Target {
        os_name: platform.os_name(),
        processor: platform.processor(),
        os_version: platform.os_version(),
        language: platform.language(),
    };

    let mut matches = Vec::new();
    for clause in clauses {
        if clause_matches(clause, &target, platform, evaluator)? {
            matches.push(clause);
        }
    }

    let selected = match matches.as_slice() {
        [] if optional => {
            debug!("no native clause matches, native code is optional");
            return Ok(NativeSelection::NoneNeeded);
        }
        [] => return Err(NativeCodeError::NoMatchingClause),
        [only] => *only,
        _ => break_tie(&matches).ok_or(NativeCodeError::NoMatchingClause)?,
    };

    debug!(
        "selected native clause {:?} out of {} matches",
        selected.library_paths(),
        matches.len()
    );
    Ok(NativeSelection::Selected(selected.clone()))
}

fn clause_matches(
    clause: &NativeLibraryClause,
    target: &Target<'_>,
    platform: &dyn PropertyResolver,
    evaluator: Option<&dyn FilterEvaluator>,
) -> Result<bool, NativeCodeError> {
    let os_matches = clause.os_names().is_empty()
        || clause.os_names().iter().any(|name| {
            *name == target.os_name || (name == "win32" && is_windows_variant(&target.os_name))
        });
    let processor_matches = clause.processors().is_empty()
        || clause.processors().contains(&target.processor);
    let version_matches = clause.os_versions().is_empty()
        || clause
            .os_versions()
            .iter()
            .any(|range| range.contains(&target.os_version));
    let language_matches = clause.languages().is_empty()
        || target
            .language
            .is_some_and(|language| clause.languages().iter().any(|l| l == language));

    if !(os_matches && processor_matches && version_matches && language_matches) {
        return Ok(false);
    }

    let Some(filter) = clause.selection_filter() else {
        return Ok(true);
    };
    let Some(evaluator) = evaluator else {
        return Err(NativeCodeError::FilterUnavailable {
            filter: filter.to_owned(),
        });
    };
    evaluator
        .evaluate(filter, platform)
        .map_err(|reason| NativeCodeError::FilterEvaluation {
            filter: filter.to_owned(),
            reason,
        })
}

/// Narrow two or more matches down to one, keeping declaration order.
fn break_tie<'c>(matches: &[&'c NativeLibraryClause]) -> Option<&'c NativeLibraryClause> {
    let floor = matches
        .iter()
        .flat_map(|clause| clause.os_versions())
        .map(VersionRange::low)
        .max()
        .cloned()
        .unwrap_or_default();

    let versioned: Vec<_> = matches
        .iter()
        .copied()
        .filter(|clause| !clause.os_versions().is_empty())
        .collect();
    let pool = if versioned.is_empty() {
        matches.to_vec()
    } else {
        versioned
    };

    let at_floor: Vec<_> = pool
        .into_iter()
        .filter(|clause| clause.os_versions().iter().any(|r| *r.low() == floor))
        .collect();
    let survivors = if at_floor.is_empty() {
        debug!("no match declares osversion floor {floor}, keeping all matches");
        matches.to_vec()
    } else {
        at_floor
    };

    let with_language: Vec<_> = survivors
        .iter()
        .copied()
        .filter(|clause| !clause.languages().is_empty())
        .collect();
    let survivors = if with_language.is_empty() {
        survivors
    } else {
        with_language
    };

    survivors.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::parse_native_code;
    use crate::platform::{
        Platform, FRAMEWORK_LANGUAGE, FRAMEWORK_OS_NAME, FRAMEWORK_OS_VERSION,
        FRAMEWORK_PROCESSOR,
    };
    use pretty_assertions::assert_eq;

    fn linux() -> Platform {
        Platform::new()
            .with_property(FRAMEWORK_OS_NAME, "Linux")
            .with_property(FRAMEWORK_PROCESSOR, "amd64")
            .with_property(FRAMEWORK_OS_VERSION, "5.15.0-91-generic")
            .with_property(FRAMEWORK_LANGUAGE, "en")
    }

    fn select(header: &str, platform: &Platform) -> Result<NativeSelection, NativeCodeError> {
        let clauses = parse_native_code(Some(header)).unwrap();
        select_native_library(&clauses, platform, None)
    }

    fn selected_path(selection: NativeSelection) -> String {
        match selection {
            NativeSelection::Selected(clause) => clause.library_paths()[0].clone(),
            NativeSelection::NoneNeeded => panic!("expected a selected clause"),
        }
    }

    struct AcceptGtk;

    impl FilterEvaluator for AcceptGtk {
        fn evaluate(&self, filter: &str, _: &dyn PropertyResolver) -> Result<bool, String> {
            match filter {
                "(ws=gtk)" => Ok(true),
                "(ws=win32)" => Ok(false),
                other => Err(format!("unsupported filter {other}")),
            }
        }
    }

    #[test]
    fn single_match_is_selected() {
        let selection = select(
            "win.dll;osname=win32, linux.so;osname=linux;processor=x86-64",
            &linux(),
        )
        .unwrap();
        assert_eq!(selected_path(selection), "linux.so");
    }

    #[test]
    fn absent_lists_match_anything() {
        let selection = select("any.so", &linux()).unwrap();
        assert_eq!(selected_path(selection), "any.so");
    }

    #[test]
    fn no_match_is_an_error_unless_optional() {
        assert_eq!(
            select("win.dll;osname=win32", &linux()),
            Err(NativeCodeError::NoMatchingClause)
        );
        assert_eq!(
            select("win.dll;osname=win32, *", &linux()),
            Ok(NativeSelection::NoneNeeded)
        );
    }

    #[test]
    fn empty_clause_list_needs_nothing() {
        assert_eq!(
            select_native_library(&[], &linux(), None),
            Ok(NativeSelection::NoneNeeded)
        );
        assert_eq!(select("*", &linux()), Ok(NativeSelection::NoneNeeded));
    }

    #[test]
    fn win32_alias_matches_windows_variants() {
        let xp = Platform::new().with_property(FRAMEWORK_OS_NAME, "Windows XP");
        let selection = select("win.dll;osname=win32", &xp).unwrap();
        assert_eq!(selected_path(selection), "win.dll");
    }

    #[test]
    fn osversion_must_contain_platform_version() {
        assert_eq!(
            select("old.so;osversion=\"[2.0,3.0)\"", &linux()),
            Err(NativeCodeError::NoMatchingClause)
        );
        let selection = select("new.so;osversion=\"[5.0,6.0)\"", &linux()).unwrap();
        assert_eq!(selected_path(selection), "new.so");
    }

    #[test]
    fn language_must_match_exactly() {
        assert_eq!(
            select("de.so;language=de", &linux()),
            Err(NativeCodeError::NoMatchingClause)
        );
        let no_language = Platform::new().with_property(FRAMEWORK_OS_NAME, "linux");
        assert_eq!(
            select("en.so;language=en", &no_language),
            Err(NativeCodeError::NoMatchingClause)
        );
    }

    #[test]
    fn clause_with_osversion_beats_clause_without() {
        let selection = select(
            "plain.so;osname=linux, versioned.so;osname=linux;osversion=\"[1.0,9.0)\"",
            &linux(),
        )
        .unwrap();
        assert_eq!(selected_path(selection), "versioned.so");
    }

    #[test]
    fn highest_osversion_floor_wins() {
        let selection = select(
            "a.so;osversion=1.0, b.so;osversion=5.0, c.so;osversion=\"[2.0,4.0)\";osversion=5.0",
            &linux(),
        )
        .unwrap();
        assert_eq!(selected_path(selection), "b.so");
    }

    #[test]
    fn language_breaks_remaining_ties() {
        let selection = select(
            "a.so;osversion=5.0, b.so;osversion=5.0;language=en",
            &linux(),
        )
        .unwrap();
        assert_eq!(selected_path(selection), "b.so");
    }

    #[test]
    fn declaration_order_is_last_resort() {
        let selection = select("a.so;osname=linux, b.so;processor=amd64", &linux()).unwrap();
        assert_eq!(selected_path(selection), "a.so");
    }

    #[test]
    fn language_preferred_when_nothing_is_versioned() {
        let selection = select("a.so, b.so;language=en", &linux()).unwrap();
        assert_eq!(selected_path(selection), "b.so");
    }

    #[test]
    fn selection_filter_uses_evaluator() {
        let clauses = parse_native_code(Some(
            "win.so;selection-filter=\"(ws=win32)\", gtk.so;selection-filter=\"(ws=gtk)\"",
        ))
        .unwrap();
        let selection = select_native_library(&clauses, &linux(), Some(&AcceptGtk)).unwrap();
        assert_eq!(selected_path(selection), "gtk.so");
    }

    #[test]
    fn selection_filter_without_evaluator_fails() {
        assert_eq!(
            select("gtk.so;selection-filter=\"(ws=gtk)\"", &linux()),
            Err(NativeCodeError::FilterUnavailable {
                filter: "(ws=gtk)".to_owned()
            })
        );
    }

    #[test]
    fn evaluator_errors_abort_selection() {
        let clauses = parse_native_code(Some("x.so;selection-filter=\"(bad\"")).unwrap();
        let err = select_native_library(&clauses, &linux(), Some(&AcceptGtk)).unwrap_err();
        assert!(matches!(err, NativeCodeError::FilterEvaluation { .. }));
    }
}
