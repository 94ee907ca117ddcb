use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use log::debug;

use crate::config::ScanRules;

/// An axis-aligned rectangle of pixels. Both ranges are half-open.
///
/// Coordinates are signed: shifted or expanded boxes may fall partially
/// outside of the image.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct RegistrationBox {
    pub row_start: i64,
    pub row_end: i64,
    pub col_start: i64,
    pub col_end: i64,
}

impl RegistrationBox {
    pub fn new(row_start: i64, row_end: i64, col_start: i64, col_end: i64) -> RegistrationBox {
        RegistrationBox {
            row_start,
            row_end,
            col_start,
            col_end,
        }
    }

    fn pixel(row: i64, col: i64) -> RegistrationBox {
        RegistrationBox::new(row, row + 1, col, col + 1)
    }

    fn including(self, row: i64, col: i64) -> RegistrationBox {
        RegistrationBox {
            row_start: self.row_start.min(row),
            row_end: self.row_end.max(row + 1),
            col_start: self.col_start.min(col),
            col_end: self.col_end.max(col + 1),
        }
    }

    pub fn height(&self) -> i64 {
        self.row_end - self.row_start
    }

    pub fn width(&self) -> i64 {
        self.col_end - self.col_start
    }

    /// The displacement (rows, columns) between the top-left corners of two boxes.
    pub fn offset_from(&self, other: &RegistrationBox) -> (i64, i64) {
        (
            self.row_start - other.row_start,
            self.col_start - other.col_start,
        )
    }

    pub fn shifted(&self, rows: i64, cols: i64) -> RegistrationBox {
        RegistrationBox::new(
            self.row_start + rows,
            self.row_end + rows,
            self.col_start + cols,
            self.col_end + cols,
        )
    }

    pub fn expanded(&self, by: i64) -> RegistrationBox {
        RegistrationBox::new(
            self.row_start - by,
            self.row_end + by,
            self.col_start - by,
            self.col_end + by,
        )
    }
}

/// The registration marks of one ballot: the top row sorted left to right and
/// the left column sorted top to bottom.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RegistrationGrid {
    pub horizontal: Vec<RegistrationBox>,
    pub vertical: Vec<RegistrationBox>,
}

impl RegistrationGrid {
    /// Only a grid with exactly the number of marks of the layout can be trusted.
    pub fn matches(&self, rules: &ScanRules) -> bool {
        self.horizontal.len() == rules.expected_horizontal_marks
            && self.vertical.len() == rules.expected_vertical_marks
    }
}

/// Rescales the ballot before looking for marks. A factor of 1 keeps the image untouched.
///
/// The new size is truncated, not rounded: the thresholds are calibrated on
/// that pixel grid.
pub fn rescale(img: &GrayImage, scale_factor: f64) -> Cow<'_, GrayImage> {
    if scale_factor == 1.0 {
        return Cow::Borrowed(img);
    }
    let width = (((img.width() as f64) * scale_factor) as u32).max(1);
    let height = (((img.height() as f64) * scale_factor) as u32).max(1);
    debug!(
        "rescale: {}x{} -> {}x{}",
        img.width(),
        img.height(),
        width,
        height
    );
    Cow::Owned(imageops::resize(img, width, height, FilterType::Triangle))
}

/// The bounding boxes of all the connected areas of fully black pixels, in
/// the order of their first pixel (row by row).
pub fn find_marks(img: &GrayImage) -> Vec<RegistrationBox> {
    let black = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] == 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&black, Connectivity::Four, Luma([0u8]));
    let mut boxes: Vec<Option<RegistrationBox>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if boxes.len() < label {
            boxes.resize(label, None);
        }
        let (row, col) = (y as i64, x as i64);
        let slot = &mut boxes[label - 1];
        *slot = Some(match *slot {
            Some(b) => b.including(row, col),
            None => RegistrationBox::pixel(row, col),
        });
    }
    boxes.into_iter().flatten().collect()
}

/// Finds the top row and the left column of registration marks on an
/// already rescaled ballot.
///
/// The returned grid is not checked against the layout, see
/// [RegistrationGrid::matches].
pub fn detect_grid(img: &GrayImage, rules: &ScanRules) -> RegistrationGrid {
    let marks = find_marks(img);
    let top = rules.ignore_top_margin as i64;
    let left = rules.ignore_left_margin as i64;
    let tilt = rules.tilt_allowance as i64;

    let min_row = marks
        .iter()
        .map(|b| b.row_start)
        .filter(|r| *r > top)
        .min();
    let min_col = marks
        .iter()
        .map(|b| b.col_start)
        .filter(|c| *c > left)
        .min();

    let mut horizontal: Vec<RegistrationBox> = match min_row {
        Some(min_row) => marks
            .iter()
            .filter(|b| b.row_start > top && b.row_start - min_row < tilt)
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    let mut vertical: Vec<RegistrationBox> = match min_col {
        Some(min_col) => marks
            .iter()
            .filter(|b| b.col_start > left && b.col_start - min_col < tilt)
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    horizontal.sort_by_key(|b| b.col_start);
    vertical.sort_by_key(|b| b.row_start);
    debug!(
        "detect_grid: {} marks, {} horizontal, {} vertical",
        marks.len(),
        horizontal.len(),
        vertical.len()
    );
    RegistrationGrid {
        horizontal,
        vertical,
    }
}
