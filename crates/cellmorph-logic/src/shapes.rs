//! Start and target shape generators.

use crate::grid::{Cell, Coord};

pub const MASTER_ID: &str = "MASTERBOT";

/// A `width × depth × height` block hanging off the master bot.
///
/// The master sits on the origin. Block cells are numbered `B01`, `B02`, ...
/// layer by layer (layer `l` at `y = -l`), then along x (`x = 1 + ix`),
/// then along z (`z = iz`). Ids are zero padded to two digits and grow past
/// that when needed.
pub fn box_cluster(width: u32, depth: u32, height: u32) -> Vec<Cell> {
    let mut cells = Vec::with_capacity((width * depth * height) as usize + 1);
    cells.push(Cell::new(MASTER_ID, Coord::ORIGIN));
    let mut n = 1;
    for layer in 0..height as i32 {
        for ix in 0..width as i32 {
            for iz in 0..depth as i32 {
                cells.push(Cell::new(format!("B{n:02}"), Coord::new(1 + ix, -layer, iz)));
                n += 1;
            }
        }
    }
    cells
}

/// Bare coordinates of a cell list, in order.
pub fn coords_of(cells: &[Cell]) -> Vec<Coord> {
    cells.iter().map(Cell::pos).collect()
}

/// A straight line of `len` cells along +x starting at the origin, the first
/// of which is the master.
pub fn line_cluster(len: u32) -> Vec<Cell> {
    (0..len as i32)
        .map(|x| {
            if x == 0 {
                Cell::new(MASTER_ID, Coord::ORIGIN)
            } else {
                Cell::new(format!("B{x:02}"), Coord::new(x, 0, 0))
            }
        })
        .collect()
}
