//! Terminal transport.
//!
//! The pipeline's only outbound surface: after the cell diff, the frame
//! driver pushes each changed cell through [`TerminalTransport::write_cell`]
//! and finishes the frame with one [`TerminalTransport::flush`]. Nothing
//! above this module knows about escape sequences.

use std::io;

use crate::types::Cell;

mod ansi;
mod output;

pub use ansi::AnsiTerminal;
pub use output::{CellWriter, OutputBuffer, to_crossterm_color};

// =============================================================================
// Transport Contract
// =============================================================================

/// Where changed cells go.
///
/// `write_cell` calls accumulate; `flush` commits them atomically from
/// the viewer's perspective. The flush is the pipeline's only blocking
/// I/O point, and a flush error is fatal for the frame loop - there is
/// no meaningful recovery without a terminal.
pub trait TerminalTransport {
    /// Stage one changed cell.
    fn write_cell(&mut self, x: u16, y: u16, cell: &Cell) -> io::Result<()>;

    /// Commit all staged cells to the terminal.
    fn flush(&mut self) -> io::Result<()>;

    /// Current terminal dimensions.
    fn size(&self) -> io::Result<(u16, u16)>;
}

// =============================================================================
// Test Transport
// =============================================================================

/// A transport that records writes instead of touching a terminal.
///
/// Used by the driver and pipeline tests to assert exactly which cells
/// were written and where the flush boundaries fell.
#[derive(Debug, Clone)]
pub struct TestTransport {
    size: (u16, u16),
    /// Every write since construction, in order.
    pub writes: Vec<(u16, u16, Cell)>,
    /// Number of writes at the time of each flush.
    pub flushes: Vec<usize>,
}

impl TestTransport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            size: (width, height),
            writes: Vec::new(),
            flushes: Vec::new(),
        }
    }

    /// Writes committed by the most recent flush.
    pub fn last_frame(&self) -> &[(u16, u16, Cell)] {
        let end = *self.flushes.last().unwrap_or(&0);
        let start = if self.flushes.len() >= 2 {
            self.flushes[self.flushes.len() - 2]
        } else {
            0
        };
        &self.writes[start..end]
    }

    /// Forget recorded history (size is kept).
    pub fn reset(&mut self) {
        self.writes.clear();
        self.flushes.clear();
    }
}

impl TerminalTransport for TestTransport {
    fn write_cell(&mut self, x: u16, y: u16, cell: &Cell) -> io::Result<()> {
        self.writes.push((x, y, *cell));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.push(self.writes.len());
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok(self.size)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_transport_records_frames() {
        let mut transport = TestTransport::new(10, 4);
        transport.write_cell(0, 0, &Cell::default()).unwrap();
        transport.write_cell(1, 0, &Cell::default()).unwrap();
        transport.flush().unwrap();
        transport.write_cell(2, 0, &Cell::default()).unwrap();
        transport.flush().unwrap();

        assert_eq!(transport.writes.len(), 3);
        assert_eq!(transport.flushes, vec![2, 3]);
        assert_eq!(transport.last_frame().len(), 1);
        assert_eq!(transport.last_frame()[0].0, 2);
        assert_eq!(transport.size().unwrap(), (10, 4));
    }
}
