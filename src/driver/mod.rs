//! Frame driver: the pipeline's orchestration state machine.
//!
//! One frame runs `Idle → Building → Reconciling → Compositing →
//! Diffing → Flushing → Idle`. The driver is the sole writer of the
//! double buffer and the retained previous tree; everything other
//! threads may do is raise the pending-render flag (and report resizes),
//! both of which are picked up at the next frame boundary.
//!
//! Render requests coalesce: any number of [`RenderHandle::request_render`]
//! calls between frames produce exactly one subsequent frame. Requests
//! arriving *during* a frame leave the flag set, guaranteeing one
//! follow-up frame rather than one frame per mutation.

use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::compose::{Compositor, PaintPass};
use crate::grid::DoubleBuffer;
use crate::reconcile::{Patch, PatchOp, apply_patches, diff};
use crate::term::TerminalTransport;
use crate::tree::RenderNode;

/// Poll interval for the blocking run loop (~60fps).
const TICK_INTERVAL: Duration = Duration::from_millis(16);

// =============================================================================
// Phases and Outcomes
// =============================================================================

/// Where the driver currently is in the frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    Building,
    Reconciling,
    Compositing,
    Diffing,
    Flushing,
}

/// What a frame produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame completed; `cells` changed cells reached the terminal.
    Rendered { pass: PaintPass, cells: usize },
    /// Tree building failed; the previous frame remains on screen.
    Aborted,
}

// =============================================================================
// Errors
// =============================================================================

/// Failure raised by the application's tree-build callback.
///
/// Aborts the frame (previous frame stays visible) without corrupting
/// buffer state; it is logged, not propagated.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BuildError {
    message: String,
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Frame-fatal failures.
///
/// Only terminal I/O lands here: with no terminal to write to there is
/// no meaningful recovery, so the error propagates to the process
/// boundary. Everything else is degraded and logged inside the frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

// =============================================================================
// RenderHandle
// =============================================================================

#[derive(Debug, Default)]
struct HandleState {
    pending: AtomicBool,
    stopped: AtomicBool,
    resize: Mutex<Option<(u16, u16)>>,
}

/// Cross-thread handle into the frame driver.
///
/// Cheap to clone; safe to use from input threads, timers, and binding
/// layers. Raising the pending-render flag is the single cross-thread
/// synchronization point of the whole pipeline.
#[derive(Debug, Clone, Default)]
pub struct RenderHandle {
    state: Arc<HandleState>,
}

impl RenderHandle {
    /// Request a re-render. Idempotent while a render is already
    /// pending; callable from any thread.
    pub fn request_render(&self) {
        self.state.pending.store(true, Ordering::Release);
    }

    /// Whether a render request is waiting.
    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Ask the run loop to exit after the current frame.
    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::Release);
    }

    /// Whether the run loop should keep going.
    pub fn is_running(&self) -> bool {
        !self.state.stopped.load(Ordering::Acquire)
    }

    /// Report a terminal resize. Recorded immediately, applied by the
    /// driver only at a frame boundary - the grids are never resized
    /// mid-paint. Implies a render request.
    pub fn notify_resize(&self, width: u16, height: u16) {
        *self.state.resize.lock().expect("resize lock poisoned") = Some((width, height));
        self.request_render();
    }

    /// Atomically consume the pending flag.
    fn take_pending(&self) -> bool {
        self.state.pending.swap(false, Ordering::AcqRel)
    }

    fn take_resize(&self) -> Option<(u16, u16)> {
        self.state.resize.lock().expect("resize lock poisoned").take()
    }
}

// =============================================================================
// FrameDriver
// =============================================================================

/// Owns the transport, the double buffer, the compositor, and the
/// retained previous tree. No other component holds a mutable reference
/// to any of them across a frame boundary.
#[derive(Debug)]
pub struct FrameDriver<T: TerminalTransport> {
    transport: T,
    buffers: DoubleBuffer,
    compositor: Compositor,
    retained: Option<RenderNode>,
    phase: FramePhase,
    handle: RenderHandle,
    /// Force every cell (not just the diff) through the transport on
    /// the next flush - set after a resize, when the terminal's idea of
    /// the screen can no longer be trusted.
    full_flush: bool,
}

impl<T: TerminalTransport> FrameDriver<T> {
    /// Create a driver sized from the transport.
    pub fn new(transport: T) -> io::Result<Self> {
        let (width, height) = transport.size()?;
        Ok(Self::with_size(transport, width, height))
    }

    /// Create a driver with explicit grid dimensions.
    pub fn with_size(transport: T, width: u16, height: u16) -> Self {
        Self {
            transport,
            buffers: DoubleBuffer::new(width, height),
            compositor: Compositor::new(),
            retained: None,
            phase: FramePhase::Idle,
            handle: RenderHandle::default(),
            full_flush: true,
        }
    }

    /// A cloneable cross-thread handle to this driver.
    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    /// Current phase of the frame cycle.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Grid dimensions.
    pub fn size(&self) -> (u16, u16) {
        (self.buffers.width(), self.buffers.height())
    }

    /// What the terminal currently shows, for inspection in tests.
    pub fn front(&self) -> &crate::grid::CellGrid {
        self.buffers.front()
    }

    /// Report a terminal resize (same as via the handle).
    pub fn on_resize(&self, width: u16, height: u16) {
        self.handle.notify_resize(width, height);
    }

    /// Run one complete frame.
    ///
    /// Consumes the pending-render flag at the start, so state mutations
    /// landing after tree-building begins coalesce into one follow-up
    /// frame instead of being half-reflected in this one.
    pub fn render_frame(
        &mut self,
        build: &mut dyn FnMut() -> Result<RenderNode, BuildError>,
    ) -> Result<FrameOutcome, FrameError> {
        // Deferred resize, applied only while idle
        if let Some((width, height)) = self.handle.take_resize() {
            if (width, height) != (self.buffers.width(), self.buffers.height()) {
                self.buffers.resize(width, height);
                self.retained = None;
                self.full_flush = true;
                log::debug!("grids resized to {width}x{height}");
            }
        }

        self.handle.take_pending();

        // --- Building ---
        self.phase = FramePhase::Building;
        let next = match build() {
            Ok(tree) => tree.normalize(),
            Err(err) => {
                // Buffers are untouched; the previous frame stays
                // visible and correct.
                log::error!("frame aborted: tree build failed: {err}");
                self.phase = FramePhase::Idle;
                return Ok(FrameOutcome::Aborted);
            }
        };

        // --- Reconciling ---
        self.phase = FramePhase::Reconciling;
        let (patches, retained_next) = match self.retained.take() {
            Some(prev) => {
                let patches = diff(&prev, &next);
                match apply_patches(&prev, &patches) {
                    Ok(applied) => {
                        debug_assert_eq!(applied, next, "patch round-trip diverged");
                        (patches, applied)
                    }
                    Err(err) => {
                        // Reconciliation inconsistency: degrade to a
                        // root replace rather than propagate.
                        log::warn!("patch application failed ({err}); replacing tree");
                        (
                            vec![Patch::new(
                                Vec::new(),
                                PatchOp::Replace { node: next.clone() },
                            )],
                            next,
                        )
                    }
                }
            }
            None => (
                vec![Patch::new(
                    Vec::new(),
                    PatchOp::Replace { node: next.clone() },
                )],
                next,
            ),
        };

        // --- Compositing ---
        self.phase = FramePhase::Compositing;
        let pass = self
            .compositor
            .apply_patches(&patches, &retained_next, self.buffers.back_mut());

        // --- Diffing ---
        self.phase = FramePhase::Diffing;
        let changes = self.buffers.present();

        // --- Flushing ---
        self.phase = FramePhase::Flushing;
        let cells = if self.full_flush {
            // Post-resize the terminal's contents are unknown: push the
            // whole back grid, not just the diff.
            let back = self.buffers.back();
            for y in 0..back.height() {
                for x in 0..back.width() {
                    let cell = back.get(x, y).expect("in-bounds iteration");
                    self.transport.write_cell(x, y, cell)?;
                }
            }
            self.full_flush = false;
            back.width() as usize * back.height() as usize
        } else {
            for change in &changes {
                self.transport.write_cell(change.x, change.y, &change.cell)?;
            }
            changes.len()
        };
        self.transport.flush()?;

        self.retained = Some(retained_next);
        self.phase = FramePhase::Idle;
        Ok(FrameOutcome::Rendered { pass, cells })
    }

    /// Run a frame if (and only if) one is pending.
    ///
    /// Returns `None` when nothing was pending or the driver is stopped.
    pub fn tick(
        &mut self,
        build: &mut dyn FnMut() -> Result<RenderNode, BuildError>,
    ) -> Result<Option<FrameOutcome>, FrameError> {
        if !self.handle.is_running() {
            return Ok(None);
        }
        if self.handle.is_pending() {
            // render_frame consumes the flag itself, right before
            // building, so requests racing in stay coalesced correctly
            return self.render_frame(build).map(Some);
        }
        Ok(None)
    }

    /// Blocking render loop: renders an initial frame, then one frame
    /// per pending request until [`RenderHandle::stop`] is called.
    pub fn run(
        &mut self,
        build: &mut dyn FnMut() -> Result<RenderNode, BuildError>,
    ) -> Result<(), FrameError> {
        self.handle.request_render();
        while self.handle.is_running() {
            if self.tick(build)?.is_none() {
                thread::park_timeout(TICK_INTERVAL);
            }
        }
        Ok(())
    }

    /// Tear down, returning the transport for final cleanup.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

// =============================================================================
// Tests
// =============================================================================
