//! Tree reconciliation.
//!
//! Given the previous render tree and the newly produced one, compute an
//! ordered list of edit operations (insert subtree, remove subtree,
//! replace subtree, reorder children, update props/text) without
//! re-creating identical subtrees.
//!
//! The diff is the upper of the pipeline's two diff layers: it bounds how
//! much of the tree the compositor has to repaint. The cell-level diff in
//! [`grid`](crate::grid) below it bounds actual terminal I/O.

mod diff;
mod patch;

pub use diff::diff;
pub use patch::{NodePath, Patch, PatchError, PatchOp, apply_patches};
