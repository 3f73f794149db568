//! Cell grid and double buffer.
//!
//! The compositor paints into a 2D grid of cells; a second, independent
//! diff layer compares the painted (back) grid against what the terminal
//! currently shows (front) and yields only the changed cells. This is
//! what actually bounds terminal I/O: even a full repaint upstream only
//! costs bandwidth proportional to cells that visually changed.
//!
//! # Design Decisions
//!
//! - **Flat storage**: `Vec<Cell>` with row-major indexing for cache
//!   efficiency.
//! - **Clipping**: drawing functions accept an optional `Rect`; writes
//!   outside it are dropped.
//! - **Alpha blending**: translucent backgrounds blend with existing
//!   cells.
//! - **Wide characters**: emoji and CJK glyphs occupy two cells, with a
//!   continuation marker (`char == 0`) in the trailing cell.
//! - **No per-frame allocation**: both grids live for the process
//!   lifetime and are only re-created on terminal resize.

use unicode_width::UnicodeWidthChar;

use crate::types::{Attr, Cell, Rect, Rgba};

// =============================================================================
// CellGrid
// =============================================================================

/// A 2D buffer of terminal cells.
///
/// Uses flat storage with row-major indexing: `index = y * width + x`
#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// Create a new grid filled with default cells.
    pub fn new(width: u16, height: u16) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![Cell::default(); size],
        }
    }

    /// Grid width.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Grid height.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The full grid bounds as a rect.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Convert (x, y) to flat index.
    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Check if coordinates are in bounds.
    #[inline]
    pub fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    /// Get a cell reference (returns None if out of bounds).
    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// Raw cells slice (for diffing).
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Clear the entire grid to default cells.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Resize the grid (clears content).
    ///
    /// Only the frame driver calls this, and only between frames.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = width as usize * height as usize;
        self.cells.clear();
        self.cells.resize(size, Cell::default());
    }

    // =========================================================================
    // Drawing Primitives
    // =========================================================================

    /// Set a single cell with optional clipping.
    ///
    /// Returns true if the cell was written.
    pub fn set_cell(
        &mut self,
        x: u16,
        y: u16,
        char: u32,
        fg: Rgba,
        bg: Rgba,
        attrs: Attr,
        clip: Option<&Rect>,
    ) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }

        if let Some(clip) = clip {
            if !clip.contains(x, y) {
                return false;
            }
        }

        let idx = self.index(x, y);
        let cell = &mut self.cells[idx];

        // Alpha blend background if not opaque
        let blended_bg = if bg.is_opaque() || bg.is_terminal_default() || bg.is_ansi() {
            bg
        } else {
            Rgba::blend(bg, cell.bg)
        };

        cell.char = char;
        cell.fg = fg;
        cell.bg = blended_bg;
        cell.attrs = attrs;

        true
    }

    /// Fill a rectangle with a background color.
    ///
    /// Glyphs inside the rect are cleared to spaces; later children
    /// painting over the fill overwrite it cell-for-cell.
    pub fn fill_rect(&mut self, rect: Rect, bg: Rgba, clip: Option<&Rect>) {
        let Some(bounded) = rect.intersect(&self.bounds()) else {
            return;
        };
        let target = match clip {
            Some(clip) => match bounded.intersect(clip) {
                Some(t) => t,
                None => return,
            },
            None => bounded,
        };

        let is_opaque = bg.is_opaque() || bg.is_terminal_default() || bg.is_ansi();

        for row in target.y..target.y + target.height {
            let row_start = self.index(target.x, row);
            let row_end = row_start + target.width as usize;
            for cell in &mut self.cells[row_start..row_end] {
                if is_opaque {
                    cell.bg = bg;
                } else {
                    cell.bg = Rgba::blend(bg, cell.bg);
                }
                cell.char = b' ' as u32;
                cell.attrs = Attr::NONE;
            }
        }
    }

    /// Reset a rectangle to default cells.
    ///
    /// Used by the compositor to vacate a subtree's rectangle before
    /// repainting it, so removed content can never linger.
    pub fn erase_rect(&mut self, rect: Rect, clip: Option<&Rect>) {
        let Some(bounded) = rect.intersect(&self.bounds()) else {
            return;
        };
        let target = match clip {
            Some(clip) => match bounded.intersect(clip) {
                Some(t) => t,
                None => return,
            },
            None => bounded,
        };

        for row in target.y..target.y + target.height {
            let row_start = self.index(target.x, row);
            let row_end = row_start + target.width as usize;
            self.cells[row_start..row_end].fill(Cell::default());
        }
    }

    /// Draw text at a position.
    ///
    /// Returns the number of cells used (wide characters use two).
    pub fn draw_text(
        &mut self,
        x: u16,
        y: u16,
        text: &str,
        fg: Rgba,
        bg: Option<Rgba>,
        attrs: Attr,
        clip: Option<&Rect>,
    ) -> u16 {
        let bg = bg.unwrap_or(Rgba::TRANSPARENT);
        let mut col = x;

        for ch in text.chars() {
            if col >= self.width {
                break;
            }

            let char_width = ch.width().unwrap_or(0);
            if char_width == 0 {
                continue; // Skip zero-width and control characters
            }

            if self.set_cell(col, y, ch as u32, fg, bg, attrs, clip) {
                // Wide characters (emoji, CJK) claim the next cell too
                if char_width == 2 && col + 1 < self.width {
                    let in_clip = clip.map_or(true, |c| c.contains(col + 1, y));
                    if in_clip {
                        let idx = self.index(col + 1, y);
                        let next = &mut self.cells[idx];
                        next.char = 0; // Continuation marker
                        next.fg = fg;
                        if !bg.is_transparent() {
                            next.bg = Rgba::blend(bg, next.bg);
                        }
                        next.attrs = attrs;
                    }
                }
            }

            col += char_width as u16;
        }

        col.saturating_sub(x)
    }
}

// =============================================================================
// Cell Diff / Double Buffer
// =============================================================================

/// One changed cell from a front/back comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    pub x: u16,
    pub y: u16,
    pub cell: Cell,
}

/// The front/back grid pair.
///
/// `front` mirrors what the physical terminal currently shows; `back` is
/// what the current frame painted. After painting, [`present`] yields
/// exactly the cells whose `(glyph, fg, bg, attrs)` tuple differs and
/// brings `front` up to date, so the next frame's diff starts from an
/// accurate prior state.
///
/// [`present`]: DoubleBuffer::present
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    front: CellGrid,
    back: CellGrid,
}

impl DoubleBuffer {
    /// Create both grids at the given size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            front: CellGrid::new(width, height),
            back: CellGrid::new(width, height),
        }
    }

    /// Grid width.
    pub fn width(&self) -> u16 {
        self.back.width()
    }

    /// Grid height.
    pub fn height(&self) -> u16 {
        self.back.height()
    }

    /// The grid the compositor paints into.
    pub fn back_mut(&mut self) -> &mut CellGrid {
        &mut self.back
    }

    /// The painted (not yet presented) grid.
    pub fn back(&self) -> &CellGrid {
        &self.back
    }

    /// What the terminal currently shows.
    pub fn front(&self) -> &CellGrid {
        &self.front
    }

    /// Cells where back differs from front.
    ///
    /// Pure comparison: calling it twice with no intervening paint
    /// yields the same list; after [`present`](Self::present) it yields
    /// an empty one.
    pub fn cell_diff(&self) -> Vec<CellChange> {
        debug_assert_eq!(self.front.width(), self.back.width());
        debug_assert_eq!(self.front.height(), self.back.height());

        let width = self.back.width() as usize;
        let mut changes = Vec::new();

        for (i, (front_cell, back_cell)) in
            self.front.cells().iter().zip(self.back.cells()).enumerate()
        {
            if front_cell != back_cell {
                changes.push(CellChange {
                    x: (i % width) as u16,
                    y: (i / width) as u16,
                    cell: *back_cell,
                });
            }
        }

        changes
    }

    /// Diff and commit: returns the changed cells and updates `front`
    /// cell-by-cell from the diff, leaving front cell-equal to back.
    pub fn present(&mut self) -> Vec<CellChange> {
        let changes = self.cell_diff();
        for change in &changes {
            let idx = change.y as usize * self.front.width() as usize + change.x as usize;
            self.front.cells[idx] = change.cell;
        }
        changes
    }

    /// Resize both grids (clears content).
    ///
    /// The driver only calls this while idle; the grids are never
    /// resized mid-frame.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.front.resize(width, height);
        self.back.resize(width, height);
    }
}

// =============================================================================
// Tests
// =============================================================================
