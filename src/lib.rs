//! # cinder-tui
//!
//! Declarative terminal UI render core for Rust.
//!
//! Application code describes a UI as an immutable tree of nodes; the
//! runtime turns that tree into exact character/attribute writes to a
//! terminal, re-rendering efficiently as state changes.
//!
//! ## Architecture
//!
//! The pipeline runs two diff layers so unchanged work is skipped twice:
//!
//! ```text
//! buildTree() → RenderNode tree → reconciler (vs. previous tree)
//!             → compositor (→ back grid) → cell diff (back vs. front)
//!             → terminal transport → swap
//! ```
//!
//! The tree diff bounds how much gets repainted; the cell diff bounds
//! how many bytes reach the terminal. State mutations from input or
//! timer threads never touch the pipeline directly - they raise a
//! pending-render flag via [`RenderHandle::request_render`], and any
//! burst of requests coalesces into a single subsequent frame.
//!
//! ## Modules
//!
//! - [`types`] - Core types (Rgba, Attr, Cell, Rect)
//! - [`tree`] - Render tree model and builders
//! - [`reconcile`] - Tree diffing and patch application
//! - [`compose`] - Compositor (clipping, paint order, damage repaint)
//! - [`grid`] - Cell grid and front/back double buffer
//! - [`term`] - Terminal transport (crossterm-backed and test)
//! - [`driver`] - Frame driver state machine

pub mod compose;
pub mod driver;
pub mod grid;
pub mod reconcile;
pub mod term;
pub mod tree;
pub mod types;

// Re-export commonly used items
pub use types::{Attr, Cell, Rect, Rgba};

pub use tree::{
    ClipNode, ElementNode, GroupNode, PropValue, Props, RenderNode, TextNode, clip, element,
    group, keys, text,
};

pub use reconcile::{NodePath, Patch, PatchError, PatchOp, apply_patches, diff};

pub use compose::{Compositor, PaintPass};

pub use grid::{CellChange, CellGrid, DoubleBuffer};

pub use term::{AnsiTerminal, TerminalTransport, TestTransport};

pub use driver::{BuildError, FrameDriver, FrameError, FrameOutcome, FramePhase, RenderHandle};
