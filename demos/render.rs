//! Render demo - paint a tree into a grid and print it.
//!
//! This demonstrates the compositor half of the pipeline without taking
//! over the terminal:
//! - Building a render tree with the fluent helpers
//! - Painting it (clipping, paint order)
//! - Reading cells back out of the grid
//!
//! Run with: cargo run --example render

use cinder_tui::{CellGrid, Compositor, Rect, Rgba, clip, element, group, text};

fn main() {
    env_logger::init();

    println!("=== cinder-tui static demo ===\n");

    let tree = group([
        element("panel")
            .at(2, 1)
            .size(36, 7)
            .bg(Rgba::rgb(20, 20, 30)),
        element("title")
            .at(4, 2)
            .size(32, 1)
            .fg(Rgba::YELLOW)
            .child(text("cinder-tui")),
        element("subtitle")
            .at(4, 4)
            .size(32, 1)
            .fg(Rgba::WHITE)
            .child(text("declarative terminal rendering")),
        // The clip keeps this long line from spilling past the panel
        clip(
            Rect::new(4, 6, 28, 1),
            [element("footer")
                .at(4, 6)
                .size(60, 1)
                .fg(Rgba::GRAY)
                .child(text("this footer is longer than its clip region allows"))],
        ),
    ]);

    let mut grid = CellGrid::new(40, 9);
    let mut compositor = Compositor::new();
    compositor.paint(&tree, &mut grid);

    // Dump the grid as plain text
    for y in 0..grid.height() {
        let mut line = String::with_capacity(grid.width() as usize);
        for x in 0..grid.width() {
            let cell = grid.get(x, y).expect("in bounds");
            if cell.is_continuation() {
                continue;
            }
            line.push(char::from_u32(cell.char).unwrap_or(' '));
        }
        println!("|{}|", line.trim_end());
    }
}
