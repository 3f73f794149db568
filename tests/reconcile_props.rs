//! Property tests for the reconciler.
//!
//! Generated trees of bounded depth and fanout exercise the diff/apply
//! pair well beyond what hand-written cases cover: group flattening,
//! keyed lists with duplicate and missing keys, kind flips, and prop
//! churn all fall out of the generators.

use cinder_tui::{Rect, RenderNode, Rgba, apply_patches, clip, diff, element, group, text};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

fn arb_leaf() -> impl Strategy<Value = RenderNode> {
    prop_oneof![
        "[a-z]{0,8}".prop_map(text),
        (0u16..30, 0u16..20, 1u16..10, 1u16..5).prop_map(|(x, y, w, h)| {
            element("box").at(x, y).size(w, h).bg(Rgba::rgb(40, 40, 40))
        }),
    ]
}

fn arb_tree() -> impl Strategy<Value = RenderNode> {
    arb_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            // Plain element with children, sometimes keyed
            (
                prop::collection::vec(inner.clone(), 0..4),
                "[a-z]{1,6}",
                proptest::option::of(0usize..4),
                0u16..30,
                0u16..20,
            )
                .prop_map(|(children, tag, key, x, y)| {
                    let mut node = element(tag).at(x, y).size(8, 3).children_from(children);
                    if let Some(k) = key {
                        // A small key space on purpose: duplicate keys
                        // between siblings must not break the diff
                        node = node.keyed(format!("k{k}"));
                    }
                    node
                }),
            // Transparent group
            prop::collection::vec(inner.clone(), 0..4).prop_map(group),
            // Clip region
            (prop::collection::vec(inner, 0..3), 0u16..20, 0u16..10)
                .prop_map(|(children, x, y)| clip(Rect::new(x, y, 8, 4), children)),
        ]
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// diff(T, T) == [] for any tree T.
    #[test]
    fn diff_of_identical_trees_is_empty(tree in arb_tree()) {
        prop_assert!(diff(&tree, &tree).is_empty());
    }

    /// Applying diff(A, B) to normalize(A) yields normalize(B).
    #[test]
    fn diff_apply_round_trips(a in arb_tree(), b in arb_tree()) {
        let patches = diff(&a, &b);
        let applied = apply_patches(&a.normalize(), &patches)
            .expect("patches from diff must apply to their own source tree");
        prop_assert_eq!(applied, b.normalize());
    }

    /// Diffing is insensitive to group boundaries: wrapping children in
    /// groups produces the same flattened result tree.
    #[test]
    fn grouping_does_not_change_diff_target(a in arb_tree(), b in arb_tree()) {
        let wrapped_b = group([b.clone()]);
        // Both diffs, applied, reach the same normalized content
        let direct = apply_patches(&a.normalize(), &diff(&a, &b)).unwrap();
        prop_assert_eq!(direct, b.normalize());
        let via_group = apply_patches(&a.normalize(), &diff(&a, &wrapped_b)).unwrap();
        prop_assert_eq!(via_group, wrapped_b.normalize());
    }

    /// A second diff after applying is empty (the retained tree has
    /// fully converged).
    #[test]
    fn applied_tree_has_empty_residual_diff(a in arb_tree(), b in arb_tree()) {
        let applied = apply_patches(&a.normalize(), &diff(&a, &b)).unwrap();
        prop_assert!(diff(&applied, &b.normalize()).is_empty());
    }
}
