//! Output buffering and stateful cell encoding.
//!
//! These components optimize terminal output by:
//! - Batching writes so a frame costs one syscall
//! - Tracking terminal state to avoid redundant escape codes
//! - Only emitting changes (colors, attributes, cursor position)

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};

use crate::types::{Attr, Cell, Rgba};

// =============================================================================
// OutputBuffer
// =============================================================================

/// A buffer that accumulates output for batch writing.
///
/// Instead of many small writes to stdout, we accumulate everything
/// and flush once. This reduces syscall overhead significantly.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    /// Create a new output buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(16384) // 16KB default
    }

    /// Create a buffer with specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Current buffer length.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear the buffer without deallocating.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The accumulated data as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Flush buffer to a writer and clear it.
    pub fn flush_to<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        writer.write_all(&self.data)?;
        self.data.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(()) // Buffering only - the transport flushes for real
    }
}

// =============================================================================
// CellWriter
// =============================================================================

/// Encodes cells while tracking terminal state to minimize output.
///
/// Tracks last cursor position, foreground, background, and attributes;
/// when encoding a cell it only emits escape codes for state that has
/// changed. Sequential cells on one row skip the cursor move entirely.
#[derive(Debug)]
pub struct CellWriter {
    last_x: i32,
    last_y: i32,
    last_fg: Option<Rgba>,
    last_bg: Option<Rgba>,
    last_attrs: Attr,
}

impl CellWriter {
    /// Create a writer with no tracked state.
    pub fn new() -> Self {
        Self {
            last_x: -1,
            last_y: -1,
            last_fg: None,
            last_bg: None,
            last_attrs: Attr::NONE,
        }
    }

    /// Forget all tracked state.
    ///
    /// Call after anything else wrote to the terminal (mode changes,
    /// resize) so the next cell re-emits everything.
    pub fn reset(&mut self) {
        self.last_x = -1;
        self.last_y = -1;
        self.last_fg = None;
        self.last_bg = None;
        self.last_attrs = Attr::NONE;
    }

    /// Encode a single cell into the output buffer.
    pub fn write_cell(
        &mut self,
        output: &mut OutputBuffer,
        x: u16,
        y: u16,
        cell: &Cell,
    ) -> io::Result<()> {
        // Continuation cells (wide glyph placeholders) produce no output;
        // the preceding glyph already covers this column.
        if cell.is_continuation() {
            self.last_x = x as i32;
            self.last_y = y as i32;
            return Ok(());
        }

        // 1. Cursor movement (only if not sequential)
        if y as i32 != self.last_y || x as i32 != self.last_x + 1 {
            queue!(output, MoveTo(x, y))?;
        }

        // 2. Attributes (reset if changed, then apply new)
        if cell.attrs != self.last_attrs {
            queue!(output, SetAttribute(Attribute::Reset))?;
            queue_attrs(output, cell.attrs)?;
            // Reset clobbers colors; force re-emit
            self.last_fg = None;
            self.last_bg = None;
            self.last_attrs = cell.attrs;
        }

        // 3. Foreground color
        if self.last_fg.map_or(true, |c| c != cell.fg) {
            queue!(output, SetForegroundColor(to_crossterm_color(cell.fg)))?;
            self.last_fg = Some(cell.fg);
        }

        // 4. Background color
        if self.last_bg.map_or(true, |c| c != cell.bg) {
            queue!(output, SetBackgroundColor(to_crossterm_color(cell.bg)))?;
            self.last_bg = Some(cell.bg);
        }

        // 5. The character itself
        let ch = char::from_u32(cell.char).unwrap_or(' ');
        queue!(output, Print(ch))?;

        self.last_x = x as i32;
        self.last_y = y as i32;
        Ok(())
    }

    /// Emit a full reset of colors and attributes.
    pub fn write_reset(&mut self, output: &mut OutputBuffer) -> io::Result<()> {
        queue!(output, SetAttribute(Attribute::Reset), ResetColor)?;
        self.reset();
        Ok(())
    }
}

impl Default for CellWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn queue_attrs(output: &mut OutputBuffer, attrs: Attr) -> io::Result<()> {
    const MAP: [(Attr, Attribute); 8] = [
        (Attr::BOLD, Attribute::Bold),
        (Attr::DIM, Attribute::Dim),
        (Attr::ITALIC, Attribute::Italic),
        (Attr::UNDERLINE, Attribute::Underlined),
        (Attr::BLINK, Attribute::SlowBlink),
        (Attr::INVERSE, Attribute::Reverse),
        (Attr::HIDDEN, Attribute::Hidden),
        (Attr::STRIKETHROUGH, Attribute::CrossedOut),
    ];
    for (flag, attribute) in MAP {
        if attrs.contains(flag) {
            queue!(output, SetAttribute(attribute))?;
        }
    }
    Ok(())
}

/// Map an [`Rgba`] onto crossterm's color model.
///
/// Terminal-default maps to `Reset`, palette colors to `AnsiValue`, and
/// everything else to truecolor.
pub fn to_crossterm_color(color: Rgba) -> Color {
    if color.is_terminal_default() {
        Color::Reset
    } else if color.is_ansi() {
        Color::AnsiValue(color.ansi_index())
    } else {
        Color::Rgb {
            r: color.r.clamp(0, 255) as u8,
            g: color.g.clamp(0, 255) as u8,
            b: color.b.clamp(0, 255) as u8,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(ch: char) -> Cell {
        Cell {
            char: ch as u32,
            fg: Rgba::WHITE,
            bg: Rgba::BLACK,
            attrs: Attr::NONE,
        }
    }

    #[test]
    fn test_output_buffer_accumulates_and_flushes() {
        let mut buf = OutputBuffer::new();
        buf.write_all(b"hello").unwrap();
        assert_eq!(buf.as_bytes(), b"hello");

        let mut sink = Vec::new();
        buf.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_sequential_cells_skip_cursor_move() {
        let mut writer = CellWriter::new();
        let mut output = OutputBuffer::new();

        writer.write_cell(&mut output, 0, 0, &cell('A')).unwrap();
        let first_len = output.len();

        output.clear();
        writer.write_cell(&mut output, 1, 0, &cell('B')).unwrap();
        let second_len = output.len();

        assert!(
            second_len < first_len,
            "sequential cell should skip cursor move and colors"
        );
    }

    #[test]
    fn test_same_colors_not_reemitted() {
        let mut writer = CellWriter::new();
        let mut output = OutputBuffer::new();

        writer.write_cell(&mut output, 0, 0, &cell('A')).unwrap();
        output.clear();

        // Jump position but keep colors: only a cursor move + glyph
        writer.write_cell(&mut output, 5, 3, &cell('B')).unwrap();
        let jumped = String::from_utf8_lossy(output.as_bytes()).into_owned();
        assert!(!jumped.contains("38;2"), "fg re-emitted: {jumped:?}");
        assert!(!jumped.contains("48;2"), "bg re-emitted: {jumped:?}");
    }

    #[test]
    fn test_continuation_cell_outputs_nothing() {
        let mut writer = CellWriter::new();
        let mut output = OutputBuffer::new();

        let continuation = Cell {
            char: 0,
            fg: Rgba::WHITE,
            bg: Rgba::BLACK,
            attrs: Attr::NONE,
        };
        writer.write_cell(&mut output, 0, 0, &continuation).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_attr_change_forces_color_reemit() {
        let mut writer = CellWriter::new();
        let mut output = OutputBuffer::new();

        writer.write_cell(&mut output, 0, 0, &cell('A')).unwrap();
        output.clear();

        let bold = Cell {
            attrs: Attr::BOLD,
            ..cell('B')
        };
        writer.write_cell(&mut output, 1, 0, &bold).unwrap();
        let emitted = String::from_utf8_lossy(output.as_bytes()).into_owned();
        // Reset + bold + both colors again
        assert!(emitted.contains("38;2"), "fg missing after reset: {emitted:?}");
        assert!(emitted.contains("48;2"), "bg missing after reset: {emitted:?}");
    }

    #[test]
    fn test_color_mapping() {
        assert_eq!(to_crossterm_color(Rgba::TERMINAL_DEFAULT), Color::Reset);
        assert_eq!(to_crossterm_color(Rgba::ansi(99)), Color::AnsiValue(99));
        assert_eq!(
            to_crossterm_color(Rgba::rgb(1, 2, 3)),
            Color::Rgb { r: 1, g: 2, b: 3 }
        );
    }
}
