//! Render tree model.
//!
//! The immutable-per-frame value type describing what should be on
//! screen: element nodes (tag, props, ordered children), text leaves,
//! clip regions, and transparent groups.
//!
//! ```
//! use cinder_tui::tree::{element, text};
//! use cinder_tui::types::Rgba;
//!
//! let frame = element("box")
//!     .at(0, 0)
//!     .size(20, 3)
//!     .bg(Rgba::rgb(20, 20, 30))
//!     .child(text("hello"));
//! # let _ = frame;
//! ```

mod node;
mod props;

pub use node::{
    ClipNode, ElementNode, GroupNode, RenderNode, TextNode, clip, element, group, text,
};
pub(crate) use node::flatten;
pub use props::{PropValue, Props, keys};
