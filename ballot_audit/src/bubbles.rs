use image::GrayImage;

use crate::config::CandidateSlot;
use crate::registration::{RegistrationBox, RegistrationGrid};

/// The pixels of the bubble of a candidate.
///
/// The bubble is on the line of its vertical mark, moved sideways by the
/// distance between its horizontal mark and the first horizontal mark, and
/// grown by one pixel on each side to absorb printing and scanning jitter.
/// The row offset between the two horizontal marks is applied as well, which
/// corrects a slight tilt of the page.
///
/// Returns None if the slot is outside of the grid.
pub fn locate_bubble(grid: &RegistrationGrid, slot: &CandidateSlot) -> Option<RegistrationBox> {
    let first = grid.horizontal.first()?;
    let column = grid.horizontal.get(slot.horizontal_index)?;
    let line = grid.vertical.get(slot.vertical_index)?;
    let (rows, cols) = column.offset_from(first);
    Some(line.shifted(rows, cols).expanded(1))
}

/// The amount of ink in a region: the sum of `255 - intensity` over its pixels.
///
/// The parts of the region outside of the image do not count.
pub fn measure_darkness(img: &GrayImage, region: &RegistrationBox) -> u64 {
    let row_start = region.row_start.max(0);
    let row_end = region.row_end.min(img.height() as i64);
    let col_start = region.col_start.max(0);
    let col_end = region.col_end.min(img.width() as i64);
    let mut total: u64 = 0;
    for y in row_start..row_end {
        for x in col_start..col_end {
            total += (255 - img.get_pixel(x as u32, y as u32)[0]) as u64;
        }
    }
    total
}
