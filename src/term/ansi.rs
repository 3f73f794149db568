//! The crossterm-backed terminal transport.
//!
//! Owns raw mode and the alternate screen, batches a frame's escape
//! sequences into one buffer, and wraps each flush in a synchronized
//! update block so partially-written frames never tear.

use std::io::{self, Write};

use crossterm::Command;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::terminal::{
    BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate, EnterAlternateScreen,
    LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::queue;

use crate::types::Cell;

use super::TerminalTransport;
use super::output::{CellWriter, OutputBuffer};

/// Fullscreen ANSI terminal transport.
///
/// `enter` switches to the alternate screen and raw mode; `leave` (and
/// `Drop`, best-effort) restores the terminal. Between them, cell writes
/// accumulate in the output buffer and hit stdout on `flush`, once per
/// frame.
#[derive(Debug)]
pub struct AnsiTerminal {
    output: OutputBuffer,
    writer: CellWriter,
    entered: bool,
}

impl AnsiTerminal {
    pub fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            writer: CellWriter::new(),
            entered: false,
        }
    }

    /// Enter fullscreen mode (alternate screen buffer, raw mode, hidden
    /// cursor, cleared screen).
    pub fn enter(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        queue!(
            self.output,
            EnterAlternateScreen,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.flush_raw()?;
        self.writer.reset();
        self.entered = true;
        Ok(())
    }

    /// Leave fullscreen mode and restore the terminal.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        self.writer.write_reset(&mut self.output)?;
        queue!(self.output, Show, LeaveAlternateScreen)?;
        self.flush_raw()?;
        disable_raw_mode()?;
        self.entered = false;
        Ok(())
    }

    /// Flush the buffer without synchronized-update markers.
    fn flush_raw(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.output.flush_to(&mut stdout)?;
        stdout.flush()
    }
}

impl Default for AnsiTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalTransport for AnsiTerminal {
    fn write_cell(&mut self, x: u16, y: u16, cell: &Cell) -> io::Result<()> {
        self.writer.write_cell(&mut self.output, x, y, cell)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.output.is_empty() {
            return Ok(());
        }

        let mut markers = String::new();
        let mut stdout = io::stdout().lock();

        let _ = BeginSynchronizedUpdate.write_ansi(&mut markers);
        stdout.write_all(markers.as_bytes())?;

        self.output.flush_to(&mut stdout)?;

        markers.clear();
        let _ = EndSynchronizedUpdate.write_ansi(&mut markers);
        stdout.write_all(markers.as_bytes())?;

        stdout.flush()
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }
}

impl Drop for AnsiTerminal {
    fn drop(&mut self) {
        // Best effort: never leave the user's terminal in raw mode
        let _ = self.leave();
    }
}
