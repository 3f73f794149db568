//! Tree diffing.
//!
//! `diff` compares the previous and next render trees and produces the
//! minimal edit script between them. It is a pure function: it never
//! touches a grid, and it never mutates either tree.
//!
//! # Algorithm
//!
//! Recursive structural comparison, index-aligned by default. Sibling
//! lists where any child carries a stable `key` prop upgrade to keyed
//! matching: unmatched old children become removes, unmatched new
//! children become inserts, and matched-but-moved children become a
//! single reorder. A longest-increasing-subsequence pass over the
//! surviving children detects whether anything actually moved, so a
//! re-sorted list costs one `Reorder` instead of a cascade of replaces.
//!
//! Nodes of different kind (or elements of different tag) are not worth
//! fine-grained comparison: a single `Replace` is emitted and the
//! compositor repaints that rectangle wholesale.

use std::collections::HashMap;

use crate::tree::{Props, RenderNode};

use super::patch::{NodePath, Patch, PatchOp};

/// Compute the edit script turning `prev` into `next`.
///
/// Applying the result to `prev.normalize()` with
/// [`apply_patches`](super::apply_patches) yields `next.normalize()`.
/// `diff(T, T)` is always empty.
pub fn diff(prev: &RenderNode, next: &RenderNode) -> Vec<Patch> {
    let mut patches = Vec::new();
    let mut path = NodePath::new();
    diff_node(prev, next, &mut path, &mut patches);
    patches
}

fn diff_node(prev: &RenderNode, next: &RenderNode, path: &mut NodePath, out: &mut Vec<Patch>) {
    match (prev, next) {
        (RenderNode::Text(a), RenderNode::Text(b)) => {
            if a.content != b.content {
                out.push(Patch::new(
                    path.clone(),
                    PatchOp::UpdateText {
                        content: b.content.clone(),
                    },
                ));
            }
        }
        (RenderNode::Element(a), RenderNode::Element(b)) if a.tag == b.tag => {
            let changes = diff_props(&a.props, &b.props);
            if !changes.is_empty() {
                out.push(Patch::new(path.clone(), PatchOp::UpdateProps { changes }));
            }
            diff_children(&prev.flat_children(), &next.flat_children(), path, out);
        }
        (RenderNode::Clip(a), RenderNode::Clip(b)) => {
            if a.rect != b.rect {
                // The clip rect moves the drawable intersection, so both
                // the old and new regions need repainting. Replacing the
                // subtree routes that through the union-of-bounds rule.
                out.push(Patch::new(
                    path.clone(),
                    PatchOp::Replace {
                        node: next.normalize(),
                    },
                ));
            } else {
                diff_children(&prev.flat_children(), &next.flat_children(), path, out);
            }
        }
        // Two groups can only meet at the root; everywhere else groups
        // dissolve into their parent's child list.
        (RenderNode::Group(_), RenderNode::Group(_)) => {
            diff_children(&prev.flat_children(), &next.flat_children(), path, out);
        }
        _ => {
            out.push(Patch::new(
                path.clone(),
                PatchOp::Replace {
                    node: next.normalize(),
                },
            ));
        }
    }
}

// =============================================================================
// Prop Diffing
// =============================================================================

/// Changed keys only - unchanged keys never appear, so the compositor
/// never re-emits attribute state that is already correct.
fn diff_props(prev: &Props, next: &Props) -> Vec<(String, Option<crate::tree::PropValue>)> {
    let mut changes = Vec::new();

    for (key, value) in next.iter() {
        if prev.get(key) != Some(value) {
            changes.push((key.to_string(), Some(value.clone())));
        }
    }

    for (key, _) in prev.iter() {
        if !next.contains_key(key) {
            changes.push((key.to_string(), None));
        }
    }

    changes
}

// =============================================================================
// Child List Diffing
// =============================================================================

fn diff_children(
    prev_kids: &[&RenderNode],
    next_kids: &[&RenderNode],
    path: &mut NodePath,
    out: &mut Vec<Patch>,
) {
    let any_keyed = prev_kids.iter().any(|n| n.stable_key().is_some())
        || next_kids.iter().any(|n| n.stable_key().is_some());

    if any_keyed {
        diff_children_keyed(prev_kids, next_kids, path, out);
    } else {
        diff_children_indexed(prev_kids, next_kids, path, out);
    }
}

/// Index-aligned comparison: position i of the old list against position
/// i of the new list. O(n) over the sibling list.
fn diff_children_indexed(
    prev_kids: &[&RenderNode],
    next_kids: &[&RenderNode],
    path: &mut NodePath,
    out: &mut Vec<Patch>,
) {
    let common = prev_kids.len().min(next_kids.len());

    for i in 0..common {
        path.push(i);
        diff_node(prev_kids[i], next_kids[i], path, out);
        path.pop();
    }

    // Trailing removals run back-to-front so earlier removes don't shift
    // the indices of later ones.
    for i in (common..prev_kids.len()).rev() {
        out.push(Patch::new(path.clone(), PatchOp::Remove { index: i }));
    }

    for (i, kid) in next_kids.iter().enumerate().skip(common) {
        out.push(Patch::new(
            path.clone(),
            PatchOp::Insert {
                index: i,
                node: kid.normalize(),
            },
        ));
    }
}

/// Keyed comparison: children match by stable key wherever one is
/// present; unkeyed children in a keyed list match by occurrence order.
/// O(n log n) when a reorder is present, O(n) otherwise.
fn diff_children_keyed(
    prev_kids: &[&RenderNode],
    next_kids: &[&RenderNode],
    path: &mut NodePath,
    out: &mut Vec<Patch>,
) {
    // Index the old list: keyed children by key, unkeyed by occurrence.
    let mut old_by_key: HashMap<&str, usize> = HashMap::new();
    let mut old_unkeyed: Vec<usize> = Vec::new();
    for (i, kid) in prev_kids.iter().enumerate() {
        match kid.stable_key() {
            // First occurrence wins on duplicate keys
            Some(key) => {
                old_by_key.entry(key).or_insert(i);
            }
            None => old_unkeyed.push(i),
        }
    }

    // Match each new child to an old one.
    let mut old_matched = vec![false; prev_kids.len()];
    let mut match_for_new: Vec<Option<usize>> = Vec::with_capacity(next_kids.len());
    let mut next_unkeyed = old_unkeyed.into_iter();

    for kid in next_kids {
        let candidate = match kid.stable_key() {
            Some(key) => old_by_key.get(key).copied(),
            None => next_unkeyed.next(),
        };
        match candidate {
            Some(i) if !old_matched[i] => {
                old_matched[i] = true;
                match_for_new.push(Some(i));
            }
            _ => match_for_new.push(None),
        }
    }

    // Removals for unmatched old children, back-to-front.
    for i in (0..prev_kids.len()).rev() {
        if !old_matched[i] {
            out.push(Patch::new(path.clone(), PatchOp::Remove { index: i }));
        }
    }

    // Post-removal positions of the survivors, in old order.
    let survivors: Vec<usize> = (0..prev_kids.len()).filter(|&i| old_matched[i]).collect();
    let rank: HashMap<usize, usize> = survivors
        .iter()
        .enumerate()
        .map(|(pos, &old_i)| (old_i, pos))
        .collect();

    // The survivors' post-removal positions in new order. If this
    // sequence is already increasing, nothing moved; otherwise one
    // Reorder permutes the whole surviving list.
    let order: Vec<usize> = match_for_new
        .iter()
        .filter_map(|m| m.map(|old_i| rank[&old_i]))
        .collect();
    if lis_length(&order) < order.len() {
        out.push(Patch::new(
            path.clone(),
            PatchOp::Reorder {
                order: order.clone(),
            },
        ));
    }

    // Inserts front-to-back at their final positions.
    for (j, (kid, matched)) in next_kids.iter().zip(&match_for_new).enumerate() {
        if matched.is_none() {
            out.push(Patch::new(
                path.clone(),
                PatchOp::Insert {
                    index: j,
                    node: kid.normalize(),
                },
            ));
        }
    }

    // Recurse into matched pairs at their new positions, after the
    // structural ops so paths resolve against the updated child list.
    for (j, (&kid, matched)) in next_kids.iter().zip(&match_for_new).enumerate() {
        if let Some(old_i) = matched {
            path.push(j);
            diff_node(prev_kids[*old_i], kid, path, out);
            path.pop();
        }
    }
}

/// Length of the longest strictly increasing subsequence.
///
/// Patience algorithm over binary-searched tails; the sequence is a
/// permutation, so "strictly" costs nothing.
fn lis_length(seq: &[usize]) -> usize {
    let mut tails: Vec<usize> = Vec::new();
    for &value in seq {
        match tails.binary_search(&value) {
            // Values are distinct; Err gives the insertion point
            Ok(pos) | Err(pos) => {
                if pos == tails.len() {
                    tails.push(value);
                } else {
                    tails[pos] = value;
                }
            }
        }
    }
    tails.len()
}

// =============================================================================
// Tests
// =============================================================================
