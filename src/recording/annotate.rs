//! Best-effort bounding-box overlay
//!
//! Draws match regions onto a copy of the frame before it is written to
//! the recording. Purely cosmetic: regions are clamped to the frame and
//! anything out of range is silently skipped, so the overlay can never
//! take down the write path.

use crate::models::Frame;
use crate::recognizer::BoundingBox;

/// Border thickness in pixels
const THICKNESS: i32 = 2;

/// Overlay color, BGR (green)
const COLOR: [u8; 3] = [0, 255, 0];

/// Return a copy of `frame` with `regions` outlined.
pub fn draw_regions(frame: &Frame, regions: &[BoundingBox]) -> Frame {
    let mut out = frame.clone();
    for region in regions {
        draw_rect(&mut out, region);
    }
    out
}

fn draw_rect(frame: &mut Frame, region: &BoundingBox) {
    if region.width <= 0 || region.height <= 0 {
        return;
    }
    let x1 = region.x;
    let y1 = region.y;
    let x2 = region.x + region.width - 1;
    let y2 = region.y + region.height - 1;

    for t in 0..THICKNESS {
        for x in x1..=x2 {
            put_pixel(frame, x, y1 + t);
            put_pixel(frame, x, y2 - t);
        }
        for y in y1..=y2 {
            put_pixel(frame, x1 + t, y);
            put_pixel(frame, x2 - t, y);
        }
    }
}

fn put_pixel(frame: &mut Frame, x: i32, y: i32) {
    if x < 0 || y < 0 || x >= frame.width as i32 || y >= frame.height as i32 {
        return;
    }
    let idx = (y as usize * frame.width as usize + x as usize) * 3;
    frame.data[idx..idx + 3].copy_from_slice(&COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            seq: 1,
            width,
            height,
            data: vec![0u8; Frame::expected_len(width, height)],
            captured_at: Utc::now(),
        }
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * frame.width as usize + x as usize) * 3;
        [frame.data[idx], frame.data[idx + 1], frame.data[idx + 2]]
    }

    #[test]
    fn test_draws_border_pixels() {
        let f = frame(16, 16);
        let region = BoundingBox {
            x: 2,
            y: 2,
            width: 10,
            height: 10,
        };
        let out = draw_regions(&f, &[region]);

        assert_eq!(pixel(&out, 2, 2), COLOR);
        assert_eq!(pixel(&out, 11, 11), COLOR);
        // Interior untouched
        assert_eq!(pixel(&out, 6, 6), [0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_region_is_harmless() {
        let f = frame(8, 8);
        let region = BoundingBox {
            x: -5,
            y: -5,
            width: 100,
            height: 100,
        };
        // Must not panic; clipping handles everything
        let out = draw_regions(&f, &[region]);
        assert_eq!(out.data.len(), f.data.len());
    }

    #[test]
    fn test_degenerate_region_skipped() {
        let f = frame(8, 8);
        let region = BoundingBox {
            x: 3,
            y: 3,
            width: 0,
            height: 0,
        };
        let out = draw_regions(&f, &[region]);
        assert_eq!(out.data, f.data);
    }
}
