use std::collections::{BTreeSet, HashSet};

use strata_protocol::ViewExtension;

use super::{fold_pairwise, Merged, RegionMap};

/// Deduplicate by `dedup_key` (first occurrence wins), then stable-sort by ascending priority.
pub fn normalize_region<'a>(
    extensions: impl IntoIterator<Item = &'a ViewExtension>,
) -> Vec<ViewExtension> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for ext in extensions {
        if seen.insert(ext.dedup_key()) {
            out.push(ext.clone());
        }
    }
    out.sort_by_key(ViewExtension::effective_priority);
    out
}

/// Concatenate base then overlay per region and normalize the result.
pub fn merge_view_extensions(base: &RegionMap, overlay: &RegionMap) -> Merged<RegionMap> {
    let regions: BTreeSet<&String> = base.keys().chain(overlay.keys()).collect();
    let merged = regions
        .into_iter()
        .map(|region| {
            let combined = base
                .get(region)
                .into_iter()
                .flatten()
                .chain(overlay.get(region).into_iter().flatten());
            (region.clone(), normalize_region(combined))
        })
        .collect();
    Merged::clean(merged)
}

/// A single input is still normalized so regions always come out in render order.
pub fn merge_multiple_view_extensions(maps: &[&RegionMap]) -> Merged<RegionMap> {
    fold_pairwise(maps, merge_view_extensions, |only| {
        only.iter()
            .map(|(region, exts)| (region.clone(), normalize_region(exts)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(exts: Vec<ViewExtension>) -> RegionMap {
        RegionMap::from([("main".to_string(), exts)])
    }

    fn ids(map: &RegionMap, name: &str) -> Vec<String> {
        map[name].iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn single_trait_is_sorted_by_priority() {
        let feature = region(vec![
            ViewExtension::new("a").with_priority(10),
            ViewExtension::new("b").with_priority(5),
        ]);
        let out = merge_multiple_view_extensions(&[&feature]);
        assert_eq!(ids(&out.merged, "main"), vec!["b", "a"]);
    }

    #[test]
    fn default_priority_is_fifty_and_ties_keep_order() {
        let base = region(vec![
            ViewExtension::new("first"),
            ViewExtension::new("late").with_priority(60),
        ]);
        let overlay = region(vec![
            ViewExtension::new("second"),
            ViewExtension::new("early").with_priority(40),
        ]);
        let out = merge_view_extensions(&base, &overlay);
        assert_eq!(
            ids(&out.merged, "main"),
            vec!["early", "first", "second", "late"]
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn duplicate_keys_keep_first_occurrence() {
        let base = region(vec![ViewExtension::new("base-toolbar")
            .with_key("toolbar")
            .with_priority(20)]);
        let overlay = region(vec![ViewExtension::new("overlay-toolbar")
            .with_key("toolbar")
            .with_priority(1)]);
        let out = merge_view_extensions(&base, &overlay);
        assert_eq!(ids(&out.merged, "main"), vec!["base-toolbar"]);
    }

    #[test]
    fn merging_with_itself_is_idempotent() {
        let a = region(vec![
            ViewExtension::new("x").with_priority(30),
            ViewExtension::new("y").with_priority(10),
            ViewExtension::new("z"),
        ]);
        let twice = merge_multiple_view_extensions(&[&a, &a]);
        let once = merge_multiple_view_extensions(&[&a]);
        assert_eq!(twice.merged, once.merged);
    }

    #[test]
    fn regions_from_both_sides_are_kept() {
        let base = RegionMap::from([("main".to_string(), vec![ViewExtension::new("a")])]);
        let overlay =
            RegionMap::from([("contextPanel".to_string(), vec![ViewExtension::new("b")])]);
        let out = merge_view_extensions(&base, &overlay);
        assert_eq!(out.merged.len(), 2);
        assert_eq!(ids(&out.merged, "contextPanel"), vec!["b"]);
    }
}
