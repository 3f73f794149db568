//! The render tree: an immutable, per-frame description of what should be
//! on screen.
//!
//! Application code (or a component layer above this crate) produces a
//! fresh `RenderNode` tree every frame. The reconciler compares it against
//! the previous frame's tree and the compositor paints it. Nothing in this
//! module is ever mutated after construction - a new frame means a new
//! tree.
//!
//! Coordinates on `Element` and `Clip` nodes are absolute terminal cells,
//! resolved by a layout pass before the tree reaches this crate. Child
//! order is paint order: later siblings overwrite earlier ones.

use crate::types::Rect;

use super::props::{PropValue, Props, keys};

// =============================================================================
// RenderNode
// =============================================================================

/// One node in the render tree.
///
/// A closed sum type: the reconciler and compositor both match
/// exhaustively on every kind, so adding a kind is a compile-visible
/// change everywhere it matters.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    /// A tagged element with props and ordered children.
    Element(ElementNode),
    /// A text leaf. Has no coordinates of its own; it paints at the
    /// position established by its enclosing element.
    Text(TextNode),
    /// A clip region. Descendants never paint outside its rectangle.
    Clip(ClipNode),
    /// A transparent grouping of siblings. Carries no visual state and
    /// dissolves into its parent's child list during diffing.
    Group(GroupNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub props: Props,
    pub children: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipNode {
    pub rect: Rect,
    pub children: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupNode {
    pub children: Vec<RenderNode>,
}

impl ElementNode {
    /// The element's absolute rectangle, if its geometry props are set.
    ///
    /// Elements without geometry paint nothing themselves; their text
    /// children have nowhere to go either.
    pub fn bounds(&self) -> Option<Rect> {
        let x = self.props.get_u16(keys::X)?;
        let y = self.props.get_u16(keys::Y)?;
        let width = self.props.get_u16(keys::WIDTH)?;
        let height = self.props.get_u16(keys::HEIGHT)?;
        Some(Rect::new(x, y, width, height))
    }

    /// Stable identity for keyed child diffing.
    pub fn stable_key(&self) -> Option<&str> {
        self.props.get(keys::KEY).and_then(PropValue::as_str)
    }
}

impl RenderNode {
    /// Direct children (empty slice for `Text`).
    pub fn children(&self) -> &[RenderNode] {
        match self {
            RenderNode::Element(el) => &el.children,
            RenderNode::Text(_) => &[],
            RenderNode::Clip(clip) => &clip.children,
            RenderNode::Group(group) => &group.children,
        }
    }

    /// Stable identity, if this node carries one.
    ///
    /// Only elements can be keyed; other kinds always match by position.
    pub fn stable_key(&self) -> Option<&str> {
        match self {
            RenderNode::Element(el) => el.stable_key(),
            _ => None,
        }
    }

    /// Child list with `Group` boundaries dissolved.
    ///
    /// This is the sibling view the reconciler and compositor agree on:
    /// a `Group` contributes its children (recursively) in place of
    /// itself, so paths and paint order are unaffected by how siblings
    /// were assembled.
    pub fn flat_children(&self) -> Vec<&RenderNode> {
        let mut out = Vec::new();
        collect_flat(self.children(), &mut out);
        out
    }

    /// Canonical Group-free copy of this tree.
    ///
    /// Descendant groups dissolve into their parents' child lists. The
    /// root keeps its own kind so the tree still has a single root. The
    /// frame driver retains normalized trees, which is what makes patch
    /// paths stable across application.
    pub fn normalize(&self) -> RenderNode {
        match self {
            RenderNode::Element(el) => RenderNode::Element(ElementNode {
                tag: el.tag.clone(),
                props: el.props.clone(),
                children: normalize_children(&el.children),
            }),
            RenderNode::Text(t) => RenderNode::Text(t.clone()),
            RenderNode::Clip(clip) => RenderNode::Clip(ClipNode {
                rect: clip.rect,
                children: normalize_children(&clip.children),
            }),
            RenderNode::Group(group) => RenderNode::Group(GroupNode {
                children: normalize_children(&group.children),
            }),
        }
    }

    /// Total node count (Groups excluded, matching the flattened view).
    pub fn node_count(&self) -> usize {
        let own = match self {
            RenderNode::Group(_) => 0,
            _ => 1,
        };
        own + self
            .children()
            .iter()
            .map(RenderNode::node_count)
            .sum::<usize>()
    }
}

/// Flatten a child slice the same way `flat_children` does.
pub(crate) fn flatten(children: &[RenderNode]) -> Vec<&RenderNode> {
    let mut out = Vec::new();
    collect_flat(children, &mut out);
    out
}

fn collect_flat<'a>(children: &'a [RenderNode], out: &mut Vec<&'a RenderNode>) {
    for child in children {
        match child {
            RenderNode::Group(group) => collect_flat(&group.children, out),
            other => out.push(other),
        }
    }
}

fn normalize_children(children: &[RenderNode]) -> Vec<RenderNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            RenderNode::Group(group) => {
                out.extend(normalize_children(&group.children));
            }
            other => out.push(other.normalize()),
        }
    }
    out
}

// =============================================================================
// Builders
// =============================================================================

/// Create an element with no props or children.
pub fn element(tag: impl Into<String>) -> RenderNode {
    RenderNode::Element(ElementNode {
        tag: tag.into(),
        props: Props::new(),
        children: Vec::new(),
    })
}

/// Create a text leaf.
pub fn text(content: impl Into<String>) -> RenderNode {
    RenderNode::Text(TextNode {
        content: content.into(),
    })
}

/// Create a clip region.
pub fn clip(rect: Rect, children: impl IntoIterator<Item = RenderNode>) -> RenderNode {
    RenderNode::Clip(ClipNode {
        rect,
        children: children.into_iter().collect(),
    })
}

/// Create a transparent group of siblings.
pub fn group(children: impl IntoIterator<Item = RenderNode>) -> RenderNode {
    RenderNode::Group(GroupNode {
        children: children.into_iter().collect(),
    })
}

impl RenderNode {
    /// Set a prop (no-op on non-element nodes).
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        if let RenderNode::Element(el) = &mut self {
            el.props.set(key, value);
        }
        self
    }

    /// Append a child (no-op on text leaves).
    pub fn child(mut self, node: RenderNode) -> Self {
        match &mut self {
            RenderNode::Element(el) => el.children.push(node),
            RenderNode::Clip(c) => c.children.push(node),
            RenderNode::Group(g) => g.children.push(node),
            RenderNode::Text(_) => {}
        }
        self
    }

    /// Append several children.
    pub fn children_from(mut self, nodes: impl IntoIterator<Item = RenderNode>) -> Self {
        match &mut self {
            RenderNode::Element(el) => el.children.extend(nodes),
            RenderNode::Clip(c) => c.children.extend(nodes),
            RenderNode::Group(g) => g.children.extend(nodes),
            RenderNode::Text(_) => {}
        }
        self
    }

    /// Set absolute position props.
    pub fn at(self, x: u16, y: u16) -> Self {
        self.prop(keys::X, x).prop(keys::Y, y)
    }

    /// Set size props.
    pub fn size(self, width: u16, height: u16) -> Self {
        self.prop(keys::WIDTH, width).prop(keys::HEIGHT, height)
    }

    /// Set position and size props from a rect.
    pub fn frame(self, rect: Rect) -> Self {
        self.at(rect.x, rect.y).size(rect.width, rect.height)
    }

    /// Set the foreground color prop.
    pub fn fg(self, color: crate::types::Rgba) -> Self {
        self.prop(keys::FG, color)
    }

    /// Set the background color prop.
    pub fn bg(self, color: crate::types::Rgba) -> Self {
        self.prop(keys::BG, color)
    }

    /// Set the attribute prop.
    pub fn attrs(self, attrs: crate::types::Attr) -> Self {
        self.prop(keys::ATTRS, attrs)
    }

    /// Set a stable key for list diffing.
    pub fn keyed(self, key: impl Into<String>) -> Self {
        self.prop(keys::KEY, PropValue::Str(key.into()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rgba;

    #[test]
    fn test_builder_chain() {
        let node = element("box")
            .at(2, 3)
            .size(10, 4)
            .bg(Rgba::BLUE)
            .child(text("hi"));

        let RenderNode::Element(el) = &node else {
            panic!("expected element");
        };
        assert_eq!(el.tag, "box");
        assert_eq!(el.bounds().unwrap(), Rect::new(2, 3, 10, 4));
        assert_eq!(el.children.len(), 1);
    }

    #[test]
    fn test_bounds_requires_all_geometry() {
        let node = element("box").at(2, 3);
        let RenderNode::Element(el) = &node else {
            panic!("expected element");
        };
        assert!(el.bounds().is_none());
    }

    #[test]
    fn test_structural_equality() {
        let a = element("box").at(0, 0).size(4, 2).child(text("x"));
        let b = element("box").at(0, 0).size(4, 2).child(text("x"));
        let c = element("box").at(0, 0).size(4, 2).child(text("y"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_flat_children_dissolves_groups() {
        let tree = element("root").children_from([
            text("a"),
            group([text("b"), group([text("c")]), text("d")]),
            text("e"),
        ]);

        let flat = tree.flat_children();
        let contents: Vec<&str> = flat
            .iter()
            .map(|n| match n {
                RenderNode::Text(t) => t.content.as_str(),
                _ => panic!("expected text"),
            })
            .collect();
        assert_eq!(contents, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_normalize_matches_flat_view() {
        let tree = element("root").children_from([
            group([text("a"), text("b")]),
            element("box").child(group([text("c")])),
        ]);

        let normalized = tree.normalize();
        assert_eq!(normalized.children().len(), 3);
        // Nested group dissolved inside the element too
        let RenderNode::Element(el) = &normalized.children()[2] else {
            panic!("expected element");
        };
        assert_eq!(el.children, vec![text("c")]);
        // Normalizing twice is a fixpoint
        assert_eq!(normalized.normalize(), normalized);
    }

    #[test]
    fn test_node_count_excludes_groups() {
        let tree = element("root").children_from([
            group([text("a"), text("b")]),
            text("c"),
        ]);
        // root + three texts
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_stable_key_only_on_elements() {
        let keyed = element("item").keyed("row-7");
        assert_eq!(keyed.stable_key(), Some("row-7"));
        assert_eq!(text("x").stable_key(), None);
        assert_eq!(group([]).stable_key(), None);
    }
}
