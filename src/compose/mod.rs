//! Compositor: paints a render tree (or the changed parts of one) into a
//! cell grid.
//!
//! Painting walks the tree in child order, so later siblings overwrite
//! earlier ones cell-for-cell - that is the whole layering model, and it
//! is what makes overlays (a modal drawn as a later sibling) occlude the
//! content beneath them. `Clip` nodes intersect an active clip rectangle
//! inherited from their ancestors; a cell write outside the active
//! intersection is silently dropped.
//!
//! # Incremental repaint
//!
//! For frames whose patch list is purely in-place updates, the compositor
//! repaints only each changed node's bounding rectangle: erase the rect,
//! then repaint the whole tree clipped to it. Repainting the *rectangle*
//! rather than just the changed subtree keeps z-order correct when an
//! overlay overlaps the updated node. Anything structural - or any
//! geometry change, whose old and new rects may overlap siblings - takes
//! the full-repaint path instead. That trades some redundant painting for
//! eliminating the classic incremental-compositing bugs (partial
//! backgrounds, multi-highlight artifacts) that come from bad
//! bounding-rect bookkeeping.

use std::collections::HashSet;

use crate::grid::CellGrid;
use crate::reconcile::{NodePath, Patch, PatchOp};
use crate::tree::{ElementNode, RenderNode, keys};
use crate::types::{Attr, Rect, Rgba};

// =============================================================================
// Repaint Decision
// =============================================================================

/// Incremental patches may touch at most this share of the tree before a
/// full repaint becomes the cheaper (and safer) choice.
const INCREMENTAL_MAX_TREE_FRACTION: f32 = 0.25;

/// Which path a composite pass took. Exposed so tests (and debug logs)
/// can assert the repaint decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintPass {
    /// The whole grid was cleared and repainted from the tree.
    Full,
    /// Only the changed rectangles were erased and repainted.
    Incremental { regions: usize },
}

/// Whether a patch list is safe and worthwhile to apply incrementally.
///
/// Structural edits and geometry-prop changes move painted rectangles,
/// which invalidates per-node damage tracking; they always force a full
/// repaint. Pure `UpdateProps`/`UpdateText` patches are incremental as
/// long as they touch no more than a quarter of the tree.
fn should_full_repaint(patches: &[Patch], next: &RenderNode) -> bool {
    if patches.iter().any(Patch::is_structural) {
        return true;
    }
    let touches_geometry = patches.iter().any(|p| match &p.op {
        PatchOp::UpdateProps { changes } => {
            changes.iter().any(|(key, _)| keys::is_geometry(key))
        }
        _ => false,
    });
    if touches_geometry {
        return true;
    }
    let node_count = next.node_count().max(1);
    (patches.len() as f32) > (node_count as f32) * INCREMENTAL_MAX_TREE_FRACTION
}

// =============================================================================
// Compositor
// =============================================================================

/// Paints render trees into cell grids.
///
/// Stateless with respect to frames; the only thing it carries across
/// calls is the set of node paths already reported for clip overflow, so
/// each offender is logged once rather than sixty times a second.
#[derive(Debug, Default)]
pub struct Compositor {
    reported_overflow: HashSet<NodePath>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full fresh paint: clear the grid and paint the whole tree.
    pub fn paint(&mut self, tree: &RenderNode, grid: &mut CellGrid) {
        grid.clear();
        let bounds = grid.bounds();
        let mut path = NodePath::new();
        self.paint_node(tree, grid, &bounds, &mut path);
    }

    /// Apply a frame's patches against the retained tree.
    ///
    /// `next` is the already-reconciled tree for this frame (the state
    /// the grid should reflect afterwards). Returns which repaint path
    /// was taken.
    pub fn apply_patches(
        &mut self,
        patches: &[Patch],
        next: &RenderNode,
        grid: &mut CellGrid,
    ) -> PaintPass {
        if patches.is_empty() {
            return PaintPass::Incremental { regions: 0 };
        }

        if should_full_repaint(patches, next) {
            self.paint(next, grid);
            return PaintPass::Full;
        }

        // Every patch is an in-place update; resolve each one's damage
        // rectangle. An unresolvable rect (missing geometry somewhere on
        // the path) means bounds tracking is off the table - repaint
        // everything rather than guess.
        let grid_bounds = grid.bounds();
        let mut regions: Vec<Rect> = Vec::with_capacity(patches.len());
        for patch in patches {
            match damage_rect(next, &patch.path, &grid_bounds) {
                DamageRect::Rect(rect) => regions.push(rect),
                // Fully clipped away: the update is invisible
                DamageRect::Hidden => {}
                DamageRect::Unresolvable => {
                    self.paint(next, grid);
                    return PaintPass::Full;
                }
            }
        }

        let count = regions.len();
        for rect in regions {
            // Erase, then repaint everything inside the rect in paint
            // order. Every cell in the rect is either repainted or reset
            // to the background default - no stale glyphs.
            grid.erase_rect(rect, None);
            let mut path = NodePath::new();
            self.paint_node(next, grid, &rect, &mut path);
        }
        PaintPass::Incremental { regions: count }
    }

    // =========================================================================
    // Tree Walking
    // =========================================================================

    fn paint_node(
        &mut self,
        node: &RenderNode,
        grid: &mut CellGrid,
        clip: &Rect,
        path: &mut NodePath,
    ) {
        match node {
            RenderNode::Element(el) => {
                self.paint_element(el, grid, clip, path);
            }
            RenderNode::Text(_) => {
                // A text leaf with no enclosing element has no position;
                // omit it rather than guess.
                self.log_once(path, "text leaf outside any element; skipped");
            }
            RenderNode::Clip(clip_node) => {
                match clip_node.rect.intersect(clip) {
                    Some(inner) => {
                        self.paint_children(node, grid, &inner, path);
                    }
                    // Drawable intersection is empty: the entire subtree
                    // is clipped away.
                    None => {}
                }
            }
            RenderNode::Group(_) => {
                self.paint_children(node, grid, clip, path);
            }
        }
    }

    fn paint_children(
        &mut self,
        node: &RenderNode,
        grid: &mut CellGrid,
        clip: &Rect,
        path: &mut NodePath,
    ) {
        for (i, child) in node.flat_children().into_iter().enumerate() {
            path.push(i);
            self.paint_node(child, grid, clip, path);
            path.pop();
        }
    }

    fn paint_element(
        &mut self,
        el: &ElementNode,
        grid: &mut CellGrid,
        clip: &Rect,
        path: &mut NodePath,
    ) {
        let bounds = el.bounds();

        // Background fill, full cells: this is what makes a later
        // sibling occlude earlier content rather than mix with it.
        if let Some(rect) = bounds {
            if let Some(bg) = el.props.get_color(keys::BG) {
                if !bg.is_transparent() {
                    grid.fill_rect(rect, bg, Some(clip));
                }
            }
        }

        let fg = el.props.get_color(keys::FG).unwrap_or(Rgba::TERMINAL_DEFAULT);
        let attrs = el.props.get_attrs(keys::ATTRS).unwrap_or(Attr::NONE);

        // Text runs: consecutive text leaves flow horizontally from the
        // element's origin, clamped to the element rect.
        let text_clip = bounds.and_then(|rect| rect.intersect(clip));
        let mut pen_x = bounds.map(|r| r.x).unwrap_or(0);
        let pen_y = bounds.map(|r| r.y).unwrap_or(0);

        for (i, child) in crate::tree::flatten(&el.children).into_iter().enumerate() {
            path.push(i);
            match child {
                RenderNode::Text(t) => match (bounds, &text_clip) {
                    (Some(rect), Some(tc)) => {
                        let run_width =
                            unicode_width::UnicodeWidthStr::width(t.content.as_str()) as u16;
                        if pen_x.saturating_add(run_width) > rect.x + rect.width {
                            self.log_once(path, "text run exceeds element bounds; clamped");
                        }
                        grid.draw_text(pen_x, pen_y, &t.content, fg, None, attrs, Some(tc));
                        pen_x = pen_x.saturating_add(run_width);
                    }
                    (Some(_), None) => {
                        // Element entirely outside the active clip
                    }
                    (None, _) => {
                        self.log_once(path, "element has no geometry; text child skipped");
                    }
                },
                other => {
                    // Nested elements and clips carry absolute
                    // coordinates; the enclosing element does not
                    // constrain them.
                    self.paint_node(other, grid, clip, path);
                }
            }
            path.pop();
        }
    }

    fn log_once(&mut self, path: &NodePath, message: &str) {
        if self.reported_overflow.insert(path.clone()) {
            log::warn!("compositor: {message} (path {path:?})");
        }
    }
}

// =============================================================================
// Damage Resolution
// =============================================================================

enum DamageRect {
    Rect(Rect),
    /// The target is clipped out of existence; nothing to repaint.
    Hidden,
    /// Geometry on the path is missing; damage can't be tracked.
    Unresolvable,
}

/// Resolve the rectangle an in-place patch can affect: the owning
/// element's bounds (a text leaf's owner is its nearest enclosing
/// element), intersected with the clip chain above it.
fn damage_rect(tree: &RenderNode, path: &[usize], grid_bounds: &Rect) -> DamageRect {
    let mut node = tree;
    let mut path = path;
    let mut clip = *grid_bounds;
    let mut owner_bounds: Option<Rect> = None;

    loop {
        match node {
            RenderNode::Element(el) => {
                owner_bounds = el.bounds();
            }
            RenderNode::Clip(c) => match c.rect.intersect(&clip) {
                Some(inner) => clip = inner,
                None => return DamageRect::Hidden,
            },
            RenderNode::Text(_) | RenderNode::Group(_) => {}
        }

        match path.split_first() {
            None => return finish_damage(node, owner_bounds, clip),
            Some((&index, rest)) => {
                let children = node.flat_children();
                match children.get(index) {
                    Some(child) => {
                        node = child;
                        path = rest;
                    }
                    None => return DamageRect::Unresolvable,
                }
            }
        }
    }
}

fn finish_damage(node: &RenderNode, owner_bounds: Option<Rect>, clip: Rect) -> DamageRect {
    let bounds = match node {
        RenderNode::Element(el) => el.bounds(),
        // A text leaf's damage is its enclosing element's rect
        RenderNode::Text(_) => owner_bounds,
        RenderNode::Clip(c) => Some(c.rect),
        RenderNode::Group(_) => None,
    };
    match bounds {
        Some(rect) => match rect.intersect(&clip) {
            Some(damage) => DamageRect::Rect(damage),
            None => DamageRect::Hidden,
        },
        None => DamageRect::Unresolvable,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::diff;
    use crate::tree::{clip as clip_node, element, group, text};
    use crate::types::Cell;

    fn grid_20x10() -> CellGrid {
        CellGrid::new(20, 10)
    }

    fn char_at(grid: &CellGrid, x: u16, y: u16) -> char {
        char::from_u32(grid.get(x, y).unwrap().char).unwrap()
    }

    #[test]
    fn test_paint_background_and_text() {
        let tree = element("box")
            .at(2, 1)
            .size(8, 3)
            .bg(Rgba::BLUE)
            .fg(Rgba::WHITE)
            .child(text("hi"));

        let mut grid = grid_20x10();
        let mut compositor = Compositor::new();
        compositor.paint(&tree, &mut grid);

        assert_eq!(grid.get(2, 1).unwrap().bg, Rgba::BLUE);
        assert_eq!(grid.get(9, 3).unwrap().bg, Rgba::BLUE);
        assert_eq!(grid.get(10, 1).unwrap().bg, Rgba::TERMINAL_DEFAULT);
        assert_eq!(char_at(&grid, 2, 1), 'h');
        assert_eq!(char_at(&grid, 3, 1), 'i');
        assert_eq!(grid.get(2, 1).unwrap().fg, Rgba::WHITE);
    }

    #[test]
    fn test_text_runs_flow_horizontally() {
        let tree = element("line")
            .at(0, 0)
            .size(10, 1)
            .child(text("ab"))
            .child(text("cd"));

        let mut grid = grid_20x10();
        Compositor::new().paint(&tree, &mut grid);

        assert_eq!(char_at(&grid, 0, 0), 'a');
        assert_eq!(char_at(&grid, 2, 0), 'c');
        assert_eq!(char_at(&grid, 3, 0), 'd');
    }

    #[test]
    fn test_text_clamped_to_element_bounds() {
        let tree = element("line").at(0, 0).size(3, 1).child(text("abcdef"));

        let mut grid = grid_20x10();
        Compositor::new().paint(&tree, &mut grid);

        assert_eq!(char_at(&grid, 2, 0), 'c');
        // Beyond the element rect: untouched
        assert_eq!(grid.get(3, 0), Some(&Cell::default()));
    }

    #[test]
    fn test_later_sibling_occludes_earlier() {
        let tree = group([
            element("under")
                .at(0, 0)
                .size(6, 2)
                .bg(Rgba::RED)
                .child(text("AAAAAA")),
            element("over").at(2, 0).size(6, 2).bg(Rgba::GREEN),
        ]);

        let mut grid = grid_20x10();
        Compositor::new().paint(&tree, &mut grid);

        // Non-overlapping part of the earlier sibling survives
        assert_eq!(grid.get(0, 0).unwrap().bg, Rgba::RED);
        assert_eq!(char_at(&grid, 0, 0), 'A');
        // Overlap: the later sibling's full cell wins, glyph included
        assert_eq!(grid.get(2, 0).unwrap().bg, Rgba::GREEN);
        assert_eq!(char_at(&grid, 2, 0), ' ');
        assert_eq!(grid.get(5, 1).unwrap().bg, Rgba::GREEN);
    }

    #[test]
    fn test_clip_contains_children() {
        let tree = clip_node(
            Rect::new(0, 0, 4, 2),
            [element("wide")
                .at(0, 0)
                .size(10, 5)
                .bg(Rgba::BLUE)
                .child(text("overflowing"))],
        );

        let mut grid = grid_20x10();
        Compositor::new().paint(&tree, &mut grid);

        assert_eq!(grid.get(3, 1).unwrap().bg, Rgba::BLUE);
        // Outside the clip rect nothing is written
        assert_eq!(grid.get(4, 0), Some(&Cell::default()));
        assert_eq!(grid.get(0, 2), Some(&Cell::default()));
    }

    #[test]
    fn test_nested_clips_intersect() {
        let tree = clip_node(
            Rect::new(0, 0, 10, 10),
            [clip_node(
                Rect::new(5, 5, 10, 10),
                [element("fill").at(0, 0).size(20, 20).bg(Rgba::RED)],
            )],
        );

        let mut grid = grid_20x10();
        Compositor::new().paint(&tree, &mut grid);

        // Only the 5..10 x 5..10 intersection is painted
        assert_eq!(grid.get(5, 5).unwrap().bg, Rgba::RED);
        assert_eq!(grid.get(9, 9).unwrap().bg, Rgba::RED);
        assert_eq!(grid.get(4, 5), Some(&Cell::default()));
        assert_eq!(grid.get(10, 5), Some(&Cell::default()));
    }

    #[test]
    fn test_disjoint_clip_paints_nothing() {
        let tree = clip_node(
            Rect::new(50, 50, 5, 5),
            [element("fill").at(50, 50).size(5, 5).bg(Rgba::RED)],
        );

        let mut grid = grid_20x10();
        let before = grid.clone();
        Compositor::new().paint(&tree, &mut grid);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_full_repaint_on_structural_patch() {
        let a = element("root").at(0, 0).size(20, 10).child(
            element("gone").at(0, 0).size(5, 1).bg(Rgba::RED),
        );
        let b = element("root").at(0, 0).size(20, 10);

        let mut grid = grid_20x10();
        let mut compositor = Compositor::new();
        compositor.paint(&a, &mut grid);
        assert_eq!(grid.get(1, 0).unwrap().bg, Rgba::RED);

        let patches = diff(&a, &b);
        let pass = compositor.apply_patches(&patches, &b, &mut grid);
        assert_eq!(pass, PaintPass::Full);
        // Vacated cells reset: no stale background
        assert_eq!(grid.get(1, 0), Some(&Cell::default()));
    }

    #[test]
    fn test_incremental_for_text_update() {
        let make = |label: &str| {
            element("root").at(0, 0).size(20, 10).children_from([
                element("left")
                    .at(0, 0)
                    .size(8, 1)
                    .fg(Rgba::WHITE)
                    .child(text(label)),
                element("right").at(10, 0).size(8, 1).bg(Rgba::BLUE),
            ])
        };
        let a = make("aaaa");
        let b = make("bb");

        let mut grid = grid_20x10();
        let mut compositor = Compositor::new();
        compositor.paint(&a, &mut grid);

        let patches = diff(&a, &b);
        let pass = compositor.apply_patches(&patches, &b, &mut grid);
        assert_eq!(pass, PaintPass::Incremental { regions: 1 });

        assert_eq!(char_at(&grid, 0, 0), 'b');
        assert_eq!(char_at(&grid, 1, 0), 'b');
        // The longer old run is fully vacated
        assert_eq!(char_at(&grid, 2, 0), ' ');
        assert_eq!(char_at(&grid, 3, 0), ' ');
        // Untouched sibling keeps its paint
        assert_eq!(grid.get(10, 0).unwrap().bg, Rgba::BLUE);
    }

    #[test]
    fn test_geometry_prop_update_forces_full() {
        let a = element("box").at(0, 0).size(4, 1).bg(Rgba::RED);
        let b = element("box").at(6, 0).size(4, 1).bg(Rgba::RED);

        let mut grid = grid_20x10();
        let mut compositor = Compositor::new();
        compositor.paint(&a, &mut grid);

        let patches = diff(&a, &b);
        assert!(!patches.is_empty());
        let pass = compositor.apply_patches(&patches, &b, &mut grid);
        assert_eq!(pass, PaintPass::Full);

        assert_eq!(grid.get(0, 0), Some(&Cell::default()));
        assert_eq!(grid.get(6, 0).unwrap().bg, Rgba::RED);
    }

    #[test]
    fn test_incremental_respects_overlay_z_order() {
        // The updated element sits *under* a later-sibling overlay; its
        // incremental repaint must not punch through the overlay.
        let make = |fg: Rgba| {
            element("root").at(0, 0).size(20, 10).children_from([
                element("base")
                    .at(0, 0)
                    .size(10, 2)
                    .fg(fg)
                    .child(text("basebase")),
                element("overlay").at(4, 0).size(6, 2).bg(Rgba::MAGENTA),
            ])
        };
        let a = make(Rgba::WHITE);
        let b = make(Rgba::YELLOW);

        let mut grid = grid_20x10();
        let mut compositor = Compositor::new();
        compositor.paint(&a, &mut grid);

        let patches = diff(&a, &b);
        let pass = compositor.apply_patches(&patches, &b, &mut grid);
        assert!(matches!(pass, PaintPass::Incremental { .. }));

        // Updated fg visible where the base is exposed
        assert_eq!(grid.get(0, 0).unwrap().fg, Rgba::YELLOW);
        // Overlay still owns the overlap
        assert_eq!(grid.get(4, 0).unwrap().bg, Rgba::MAGENTA);
        assert_eq!(char_at(&grid, 4, 0), ' ');
    }

    #[test]
    fn test_empty_patch_list_is_noop() {
        let tree = element("box").at(0, 0).size(4, 1).bg(Rgba::RED);
        let mut grid = grid_20x10();
        let mut compositor = Compositor::new();
        compositor.paint(&tree, &mut grid);
        let before = grid.clone();

        let pass = compositor.apply_patches(&[], &tree, &mut grid);
        assert_eq!(pass, PaintPass::Incremental { regions: 0 });
        assert_eq!(grid, before);
    }

    #[test]
    fn test_threshold_fraction_forces_full() {
        // Many prop updates relative to tree size: full repaint wins
        let make = |c: Rgba| {
            element("root").at(0, 0).size(20, 10).children_from(
                (0..4).map(|i| element("cell").at(i * 2, 0).size(2, 1).bg(c)),
            )
        };
        let a = make(Rgba::RED);
        let b = make(Rgba::GREEN);

        let patches = diff(&a, &b);
        assert_eq!(patches.len(), 4);
        // 4 patches over a 5-node tree is far above the 25% cutoff
        assert!(should_full_repaint(&patches, &b));
    }
}
