//! Clock demo - the full pipeline on a live terminal.
//!
//! A timer thread mutates shared state and requests renders; an input
//! thread forwards quit keys and resizes. The frame driver coalesces the
//! requests and renders diff-only frames at its own pace.
//!
//! Run with: cargo run --example clock
//! Quit with: q or Ctrl+C

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

use cinder_tui::{AnsiTerminal, Attr, FrameDriver, RenderNode, Rgba, element, group, text};

const ITEMS: [&str; 5] = ["alpha", "bravo", "charlie", "delta", "echo"];

fn build_tree(ticks: u64, width: u16) -> RenderNode {
    let highlighted = (ticks as usize) % ITEMS.len();
    let seconds = ticks / 4;

    let list = ITEMS.iter().enumerate().map(|(i, label)| {
        let mut item = element("item")
            .keyed(*label)
            .at(2, 4 + i as u16)
            .size(20, 1)
            .fg(Rgba::WHITE)
            .child(text(*label));
        if i == highlighted {
            item = item.attrs(Attr::BOLD | Attr::INVERSE);
        }
        item
    });

    group([
        element("header")
            .at(0, 0)
            .size(width, 1)
            .bg(Rgba::rgb(40, 42, 54))
            .fg(Rgba::YELLOW)
            .child(text(" cinder-tui clock")),
        element("clock")
            .at(2, 2)
            .size(30, 1)
            .fg(Rgba::CYAN)
            .child(text(format!("running for {seconds}s"))),
        group(list),
        element("footer")
            .at(2, 10)
            .size(30, 1)
            .fg(Rgba::GRAY)
            .child(text("press q to quit")),
    ])
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut terminal = AnsiTerminal::new();
    terminal.enter()?;

    let mut driver = FrameDriver::new(terminal)?;
    let handle = driver.handle();
    let ticks = Arc::new(AtomicU64::new(0));

    // Timer thread: advance state, request a render. Several requests
    // landing between frames still produce a single frame.
    let timer_ticks = ticks.clone();
    let timer_handle = handle.clone();
    thread::spawn(move || {
        while timer_handle.is_running() {
            thread::sleep(Duration::from_millis(250));
            timer_ticks.fetch_add(1, Ordering::Relaxed);
            timer_handle.request_render();
        }
    });

    // Input thread: quit keys and resize notifications.
    let input_handle = handle.clone();
    thread::spawn(move || {
        while input_handle.is_running() {
            let ready = event::poll(Duration::from_millis(100)).unwrap_or(false);
            if !ready {
                continue;
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    let ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);
                    if key.code == KeyCode::Char('q') || ctrl_c {
                        input_handle.stop();
                    }
                }
                Ok(Event::Resize(w, h)) => input_handle.notify_resize(w, h),
                _ => {}
            }
        }
    });

    let build_ticks = ticks.clone();
    let (width, _) = driver.size();
    let mut build = move || Ok(build_tree(build_ticks.load(Ordering::Relaxed), width));
    driver.run(&mut build)?;

    let mut terminal = driver.into_transport();
    terminal.leave()?;
    Ok(())
}
