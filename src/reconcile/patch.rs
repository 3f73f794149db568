//! Patch model and patch application.
//!
//! A patch list is the reconciler's output: an ordered edit script that,
//! applied in sequence to the previous (normalized) tree, produces a tree
//! structurally equal to the new one. The frame driver applies patches to
//! its retained tree; tests use application to verify the round-trip
//! property.

use thiserror::Error;

use crate::tree::{PropValue, RenderNode};

// =============================================================================
// Paths
// =============================================================================

/// A structural path from the tree root: a sequence of child indices.
///
/// Paths are expressed against the Group-flattened view of the tree (the
/// driver retains normalized trees), so a `Group` boundary never appears
/// in a path.
pub type NodePath = Vec<usize>;

// =============================================================================
// Patch
// =============================================================================

/// One edit operation, addressed by a structural path.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub path: NodePath,
    pub op: PatchOp,
}

/// The edit operations the reconciler can emit.
///
/// For `Insert`/`Remove`/`Reorder` the path addresses the parent whose
/// child list changes; for the rest it addresses the node itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Insert a subtree at `index` in the parent's child list.
    Insert { index: usize, node: RenderNode },
    /// Remove the child at `index`.
    Remove { index: usize },
    /// Replace the addressed node with a new subtree.
    Replace { node: RenderNode },
    /// Permute the parent's child list: the child currently at
    /// `order[k]` moves to position `k`.
    Reorder { order: Vec<usize> },
    /// Update changed props only. A `None` value removes the key.
    UpdateProps {
        changes: Vec<(String, Option<PropValue>)>,
    },
    /// Replace a text leaf's content.
    UpdateText { content: String },
}

impl Patch {
    pub fn new(path: NodePath, op: PatchOp) -> Self {
        Self { path, op }
    }

    /// Whether this op changes tree structure (as opposed to updating a
    /// node in place). Structural ops invalidate sibling bounding-rect
    /// bookkeeping, so the compositor treats them differently.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.op,
            PatchOp::Insert { .. }
                | PatchOp::Remove { .. }
                | PatchOp::Replace { .. }
                | PatchOp::Reorder { .. }
        )
    }
}

// =============================================================================
// Application
// =============================================================================

/// Why a patch could not be applied.
///
/// Should not occur when patches come from `diff` against the same
/// retained tree; the driver degrades to a full replace when it does.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch path {0:?} does not resolve to a node")]
    PathNotFound(NodePath),
    #[error("child index {index} out of range at path {path:?}")]
    IndexOutOfRange { path: NodePath, index: usize },
    #[error("node at path {0:?} cannot hold children")]
    NotAParent(NodePath),
    #[error("node at path {0:?} is not a text leaf")]
    NotText(NodePath),
    #[error("node at path {0:?} is not an element")]
    NotElement(NodePath),
    #[error("reorder at path {path:?} is not a permutation of 0..{len}")]
    BadReorder { path: NodePath, len: usize },
}

/// Apply an edit script to a (normalized) tree, producing the edited tree.
///
/// `apply_patches(A.normalize(), &diff(&A, &B))` is structurally equal to
/// `B.normalize()`.
pub fn apply_patches(tree: &RenderNode, patches: &[Patch]) -> Result<RenderNode, PatchError> {
    let mut root = tree.clone();
    for patch in patches {
        apply_one(&mut root, patch)?;
    }
    Ok(root)
}

fn apply_one(root: &mut RenderNode, patch: &Patch) -> Result<(), PatchError> {
    match &patch.op {
        PatchOp::Replace { node } => {
            let target = node_at_mut(root, &patch.path)
                .ok_or_else(|| PatchError::PathNotFound(patch.path.clone()))?;
            *target = node.clone();
            Ok(())
        }
        PatchOp::UpdateText { content } => {
            let target = node_at_mut(root, &patch.path)
                .ok_or_else(|| PatchError::PathNotFound(patch.path.clone()))?;
            match target {
                RenderNode::Text(t) => {
                    t.content = content.clone();
                    Ok(())
                }
                _ => Err(PatchError::NotText(patch.path.clone())),
            }
        }
        PatchOp::UpdateProps { changes } => {
            let target = node_at_mut(root, &patch.path)
                .ok_or_else(|| PatchError::PathNotFound(patch.path.clone()))?;
            match target {
                RenderNode::Element(el) => {
                    for (key, value) in changes {
                        match value {
                            Some(v) => el.props.set(key.clone(), v.clone()),
                            None => {
                                el.props.remove(key);
                            }
                        }
                    }
                    Ok(())
                }
                _ => Err(PatchError::NotElement(patch.path.clone())),
            }
        }
        PatchOp::Insert { index, node } => {
            let children = children_at_mut(root, &patch.path)?;
            if *index > children.len() {
                return Err(PatchError::IndexOutOfRange {
                    path: patch.path.clone(),
                    index: *index,
                });
            }
            children.insert(*index, node.clone());
            Ok(())
        }
        PatchOp::Remove { index } => {
            let children = children_at_mut(root, &patch.path)?;
            if *index >= children.len() {
                return Err(PatchError::IndexOutOfRange {
                    path: patch.path.clone(),
                    index: *index,
                });
            }
            children.remove(*index);
            Ok(())
        }
        PatchOp::Reorder { order } => {
            let children = children_at_mut(root, &patch.path)?;
            let len = children.len();
            if !is_permutation(order, len) {
                return Err(PatchError::BadReorder {
                    path: patch.path.clone(),
                    len,
                });
            }
            let old = std::mem::take(children);
            let mut slots: Vec<Option<RenderNode>> = old.into_iter().map(Some).collect();
            for &from in order {
                // is_permutation guarantees each slot is taken once
                children.push(slots[from].take().expect("permutation checked"));
            }
            Ok(())
        }
    }
}

fn node_at_mut<'a>(root: &'a mut RenderNode, path: &[usize]) -> Option<&'a mut RenderNode> {
    let mut current = root;
    for &index in path {
        current = children_mut(current)?.get_mut(index)?;
    }
    Some(current)
}

fn children_at_mut<'a>(
    root: &'a mut RenderNode,
    path: &[usize],
) -> Result<&'a mut Vec<RenderNode>, PatchError> {
    let parent =
        node_at_mut(root, path).ok_or_else(|| PatchError::PathNotFound(path.to_vec()))?;
    children_mut(parent).ok_or_else(|| PatchError::NotAParent(path.to_vec()))
}

fn children_mut(node: &mut RenderNode) -> Option<&mut Vec<RenderNode>> {
    match node {
        RenderNode::Element(el) => Some(&mut el.children),
        RenderNode::Clip(clip) => Some(&mut clip.children),
        RenderNode::Group(group) => Some(&mut group.children),
        RenderNode::Text(_) => None,
    }
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in order {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{element, text};

    fn list(items: &[&str]) -> RenderNode {
        element("list").children_from(items.iter().map(|s| text(*s)))
    }

    fn contents(node: &RenderNode) -> Vec<String> {
        node.children()
            .iter()
            .map(|n| match n {
                RenderNode::Text(t) => t.content.clone(),
                _ => panic!("expected text"),
            })
            .collect()
    }

    #[test]
    fn test_apply_update_text() {
        let tree = list(&["a", "b"]);
        let patched = apply_patches(
            &tree,
            &[Patch::new(
                vec![1],
                PatchOp::UpdateText {
                    content: "B".into(),
                },
            )],
        )
        .unwrap();
        assert_eq!(contents(&patched), vec!["a", "B"]);
    }

    #[test]
    fn test_apply_insert_remove() {
        let tree = list(&["a", "b", "c"]);
        let patched = apply_patches(
            &tree,
            &[
                Patch::new(vec![], PatchOp::Remove { index: 1 }),
                Patch::new(
                    vec![],
                    PatchOp::Insert {
                        index: 0,
                        node: text("z"),
                    },
                ),
            ],
        )
        .unwrap();
        assert_eq!(contents(&patched), vec!["z", "a", "c"]);
    }

    #[test]
    fn test_apply_reorder_permutes() {
        let tree = list(&["a", "b", "c"]);
        let patched = apply_patches(
            &tree,
            &[Patch::new(
                vec![],
                PatchOp::Reorder {
                    order: vec![2, 0, 1],
                },
            )],
        )
        .unwrap();
        assert_eq!(contents(&patched), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_apply_bad_reorder_rejected() {
        let tree = list(&["a", "b"]);
        let err = apply_patches(
            &tree,
            &[Patch::new(
                vec![],
                PatchOp::Reorder {
                    order: vec![0, 0],
                },
            )],
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::BadReorder { .. }));
    }

    #[test]
    fn test_apply_path_not_found() {
        let tree = list(&["a"]);
        let err = apply_patches(
            &tree,
            &[Patch::new(
                vec![5],
                PatchOp::UpdateText {
                    content: "x".into(),
                },
            )],
        )
        .unwrap_err();
        assert_eq!(err, PatchError::PathNotFound(vec![5]));
    }

    #[test]
    fn test_apply_update_props() {
        let tree = element("box").prop("a", 1i64).prop("b", 2i64);
        let patched = apply_patches(
            &tree,
            &[Patch::new(
                vec![],
                PatchOp::UpdateProps {
                    changes: vec![
                        ("a".into(), Some(crate::tree::PropValue::Int(9))),
                        ("b".into(), None),
                    ],
                },
            )],
        )
        .unwrap();
        let RenderNode::Element(el) = &patched else {
            panic!("expected element");
        };
        assert_eq!(el.props.get("a").unwrap().as_int(), Some(9));
        assert!(el.props.get("b").is_none());
    }

    #[test]
    fn test_is_structural() {
        let replace = Patch::new(vec![], PatchOp::Replace { node: text("x") });
        let update = Patch::new(
            vec![],
            PatchOp::UpdateText {
                content: "x".into(),
            },
        );
        assert!(replace.is_structural());
        assert!(!update.is_structural());
    }
}
