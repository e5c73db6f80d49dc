//! Property-based tests: ordering, cycle reporting, provenance and merge laws.

use std::collections::BTreeSet;

use proptest::prelude::*;
use strata_core::merge::{merge_multiple_view_extensions, RegionMap};
use strata_core::{canonicalize_cycle, CollisionResolution, DependencyGraph, TraitCompositor};
use strata_protocol::{SchemaField, TraitDefinition, ViewExtension};

const NAMES: &[&str] = &["Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta"];
const TYPES: &[&str] = &["string", "number", "boolean", "date"];

/// Acyclic sets: a trait may only depend on traits earlier in `NAMES`.
fn arb_acyclic_traits() -> impl Strategy<Value = Vec<TraitDefinition>> {
    (1..=NAMES.len())
        .prop_flat_map(|n| {
            let deps = (0..n)
                .map(|i| proptest::collection::vec(0..i.max(1), 0..=i))
                .collect::<Vec<_>>();
            let fields = proptest::collection::vec(
                proptest::collection::vec((0..4usize, 0..TYPES.len(), any::<bool>()), 0..3),
                n,
            );
            (deps, fields)
        })
        .prop_map(|(deps, fields)| {
            deps.into_iter()
                .zip(fields)
                .enumerate()
                .map(|(i, (dep_idx, field_specs))| {
                    let mut def = TraitDefinition::new(NAMES[i]);
                    let deps: BTreeSet<usize> = dep_idx.into_iter().filter(|d| *d < i).collect();
                    for d in deps {
                        def = def.depends_on(NAMES[d]);
                    }
                    for (slot, ty, locked) in field_specs {
                        let mut field = SchemaField::new(TYPES[ty]);
                        if locked {
                            field = field.locked();
                        }
                        def = def.with_field(format!("field{slot}"), field);
                    }
                    def
                })
                .collect()
        })
}

fn arb_region() -> impl Strategy<Value = RegionMap> {
    proptest::collection::vec((0..5usize, proptest::option::of(0i64..100)), 0..8).prop_map(
        |specs| {
            let exts = specs
                .into_iter()
                .map(|(id, priority)| {
                    let ext = ViewExtension::new(format!("ext{id}"));
                    match priority {
                        Some(p) => ext.with_priority(p),
                        None => ext,
                    }
                })
                .collect();
            RegionMap::from([("main".to_string(), exts)])
        },
    )
}

proptest! {
    #[test]
    fn composition_is_deterministic(traits in arb_acyclic_traits()) {
        let compositor = TraitCompositor::default();
        let first = compositor.compose("Obj", &traits);
        let mut shuffled = traits.clone();
        shuffled.reverse();
        let second = compositor.compose("Obj", &shuffled);
        prop_assert_eq!(&first.order, &second.order);
        let a = first.composed.expect("acyclic set composes");
        let b = second.composed.expect("acyclic set composes");
        prop_assert_eq!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
    }

    #[test]
    fn order_respects_dependencies(traits in arb_acyclic_traits()) {
        let result = TraitCompositor::default().compose("Obj", &traits);
        let position = |name: &str| result.order.iter().position(|n| n == name).unwrap();
        for def in &traits {
            for dep in def.required_dependencies() {
                prop_assert!(position(dep) < position(def.name.as_str()));
            }
        }
    }

    #[test]
    fn provenance_is_complete(traits in arb_acyclic_traits()) {
        let result = TraitCompositor::default().compose("Obj", &traits);
        let composed = result.composed.unwrap();
        prop_assert_eq!(
            composed.schema.keys().collect::<Vec<_>>(),
            composed.metadata.provenance.keys().collect::<Vec<_>>()
        );
        for (path, prov) in &composed.metadata.provenance {
            let declared = traits
                .iter()
                .find(|t| t.name == prov.source_trait)
                .map(|t| t.schema_fields.contains_key(path))
                .unwrap_or(false);
            prop_assert!(declared, "{} not declared by {}", path, prov.source_trait);
        }
    }

    #[test]
    fn rings_are_reported_rotation_invariant(len in 2usize..=NAMES.len(), start in 0usize..6) {
        let ring: Vec<&str> = NAMES[..len].to_vec();
        let traits: Vec<TraitDefinition> = (0..len)
            .map(|i| {
                let idx = (i + start) % len;
                TraitDefinition::new(ring[idx]).depends_on(ring[(idx + 1) % len])
            })
            .collect();
        let cycles = DependencyGraph::from_traits(traits).cycles();
        prop_assert_eq!(cycles.len(), 1);
        let members: BTreeSet<&str> = cycles[0].iter().map(String::as_str).collect();
        prop_assert_eq!(members, ring.iter().copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(&cycles[0], &canonicalize_cycle(&ring));
    }

    #[test]
    fn later_wins_unless_locked(a_ty in 0..TYPES.len(), b_ty in 0..TYPES.len(), locked in any::<bool>()) {
        prop_assume!(a_ty != b_ty);
        let mut a_field = SchemaField::new(TYPES[a_ty]);
        if locked {
            a_field = a_field.locked();
        }
        let traits = vec![
            TraitDefinition::new("A").with_field("x", a_field),
            TraitDefinition::new("B").depends_on("A").with_field("x", SchemaField::new(TYPES[b_ty])),
        ];
        let result = TraitCompositor::default().compose("Obj", &traits);
        let composed = result.composed.unwrap();
        prop_assert_eq!(result.collisions.len(), 1);
        if locked {
            prop_assert_eq!(&composed.schema["x"].field_type, TYPES[a_ty]);
            prop_assert_eq!(result.collisions[0].resolution, CollisionResolution::Locked);
            prop_assert_eq!(&result.collisions[0].shadowed, "B");
        } else {
            prop_assert_eq!(&composed.schema["x"].field_type, TYPES[b_ty]);
            prop_assert_eq!(&composed.provenance("x").unwrap().overridden_traits, &vec!["A".to_string()]);
        }
    }

    #[test]
    fn view_extension_merge_is_idempotent(region in arb_region()) {
        let once = merge_multiple_view_extensions(&[&region]);
        let twice = merge_multiple_view_extensions(&[&region, &region]);
        prop_assert_eq!(once.merged, twice.merged);
    }
}
