//! services/booth/src/layout.rs
//!
//! Default canvas placement for prints that have no stored position yet.

use dream_booth_core::domain::Position;

pub const GRID_COLUMNS: usize = 5;
pub const GRID_ORIGIN: (f64, f64) = (40.0, 40.0);
pub const CELL_WIDTH: f64 = 220.0;
pub const CELL_HEIGHT: f64 = 260.0;

/// Slot `index` of a left-to-right, top-to-bottom grid. Distinct indices never share a slot.
pub fn grid_position(index: usize) -> Position {
    let column = (index % GRID_COLUMNS) as f64;
    let row = (index / GRID_COLUMNS) as f64;
    Position::new(
        GRID_ORIGIN.0 + column * CELL_WIDTH,
        GRID_ORIGIN.1 + row * CELL_HEIGHT,
    )
}
