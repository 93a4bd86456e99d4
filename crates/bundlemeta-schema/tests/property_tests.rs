use bundlemeta_schema::{parse_header, Version, VersionError, VersionRange};
use proptest::prelude::*;

fn version() -> impl Strategy<Value = Version> {
    (0u32..4, 0u32..4, 0u32..4).prop_map(|(major, minor, micro)| Version::new(major, minor, micro))
}

/// Ranges that contain at least one version.
fn range() -> impl Strategy<Value = VersionRange> {
    prop_oneof![
        version().prop_map(VersionRange::at_least),
        (
            prop::collection::btree_set(version(), 2),
            any::<bool>(),
            any::<bool>()
        )
            .prop_map(|(bounds, low_inc, high_inc)| {
                let mut bounds = bounds.into_iter();
                let low = bounds.next().unwrap();
                let high = bounds.next().unwrap();
                VersionRange::new(low, low_inc, Some(high), high_inc).unwrap()
            }),
        version().prop_map(|v| VersionRange::new(v.clone(), true, Some(v), true).unwrap()),
    ]
}

fn package_clause() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z]{1,6}(\\.[a-z]{1,6}){0,2}", 1..3),
        prop::option::of(version()),
        prop::option::of("[a-z]{1,5}(,[a-z]{1,5}){0,2}"),
    )
        .prop_map(|(paths, version, uses)| {
            let mut clause = paths.join(";");
            if let Some(uses) = uses {
                clause.push_str(&format!(";uses:=\"{uses}\""));
            }
            if let Some(version) = version {
                clause.push_str(&format!(";version=\"[{version},{version}]\""));
            }
            clause
        })
}

proptest! {
    #[test]
    fn header_parse_is_deterministic(clauses in prop::collection::vec(package_clause(), 1..5)) {
        let header = clauses.join(", ");
        let first = parse_header(Some(&header));
        let second = parse_header(Some(&header));
        prop_assert!(first.is_ok());
        prop_assert_eq!(first.as_ref().unwrap().len(), clauses.len());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn intersects_is_symmetric(a in range(), b in range()) {
        prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        prop_assert_eq!(a.intersection(&b).is_some(), a.intersects(&b));
    }

    #[test]
    fn interior_versions_are_contained(
        bounds in prop::collection::btree_set(version(), 3),
        low_inc in any::<bool>(),
        high_inc in any::<bool>(),
    ) {
        let mut bounds = bounds.into_iter();
        let low = bounds.next().unwrap();
        let middle = bounds.next().unwrap();
        let high = bounds.next().unwrap();
        let range = VersionRange::new(low.clone(), low_inc, Some(high.clone()), high_inc).unwrap();

        prop_assert!(range.contains(&middle));
        prop_assert_eq!(range.contains(&low), low_inc);
        prop_assert_eq!(range.contains(&high), high_inc);
    }

    #[test]
    fn self_intersection_is_identity(r in range()) {
        prop_assert_eq!(r.intersection(&r), Some(r));
    }

    #[test]
    fn intersection_contains_only_shared_versions(a in range(), b in range(), v in version()) {
        let shared = a.contains(&v) && b.contains(&v);
        let in_intersection = a.intersection(&b).is_some_and(|r| r.contains(&v));
        prop_assert_eq!(shared, in_intersection);
    }

    #[test]
    fn equal_bounds_with_an_exclusive_end_are_rejected(
        point in version(),
        (low_inc, high_inc) in prop_oneof![Just((false, false)), Just((true, false)), Just((false, true))],
    ) {
        let text = format!(
            "{}{point},{point}{}",
            if low_inc { '[' } else { '(' },
            if high_inc { ']' } else { ')' }
        );
        prop_assert!(matches!(
            VersionRange::parse(&text),
            Err(VersionError::EmptyRange(_))
        ));
        prop_assert!(VersionRange::new(point.clone(), low_inc, Some(point), high_inc).is_err());
    }

    #[test]
    fn every_intersection_is_inhabited(a in range(), b in range()) {
        if let Some(overlap) = a.intersection(&b) {
            prop_assert!(overlap.contains(overlap.low()) || !overlap.is_low_inclusive());
            prop_assert!(overlap.intersects(&overlap));
            prop_assert!(overlap.intersects(&a) && overlap.intersects(&b));
        }
    }

    #[test]
    fn range_text_parses_back(r in range()) {
        prop_assert_eq!(VersionRange::parse(&r.to_string()).unwrap(), r);
    }
}
