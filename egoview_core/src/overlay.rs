//! Software overlay drawing on camera frames.
//!
//! Line and circle primitives rasterized straight into the RGBA buffer.
//! Every write is clipped to the image bounds, so partially or fully
//! off-screen boxes are safe to draw.

use image::{Rgba, RgbaImage};
use nalgebra::Point2;

use crate::bbox::BOX_EDGES;

/// Clip margin around the image, pixels. Keeps brush stamps and corner dots
/// near the border intact while still bounding the rasterizer.
const CLIP_PAD: f64 = 16.0;

/// Stroke settings for box overlays.
#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub color: [u8; 4],
    pub thickness: u32,
    /// Draw a dot on each projected corner.
    pub corner_dots: bool,
    pub corner_color: [u8; 4],
    pub corner_radius: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [0, 255, 0, 255],
            thickness: 2,
            corner_dots: false,
            corner_color: [255, 0, 0, 255],
            corner_radius: 3,
        }
    }
}

fn put(image: &mut RgbaImage, x: i64, y: i64, color: [u8; 4]) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, Rgba(color));
    }
}

/// Stamps a thickness x thickness square brush centered on (x, y).
fn stamp(image: &mut RgbaImage, x: i64, y: i64, color: [u8; 4], thickness: u32) {
    let size = thickness.max(1) as i64;
    let lo = -(size / 2);
    let hi = lo + size - 1;
    for dy in lo..=hi {
        for dx in lo..=hi {
            put(image, x + dx, y + dy, color);
        }
    }
}

/// Liang-Barsky clip of a segment against the padded image rectangle.
/// Returns `None` when the segment lies entirely outside.
fn clip_segment(
    width: f64,
    height: f64,
    p0: Point2<f64>,
    p1: Point2<f64>,
) -> Option<(Point2<f64>, Point2<f64>)> {
    let (xmin, ymin) = (-CLIP_PAD, -CLIP_PAD);
    let (xmax, ymax) = (width + CLIP_PAD, height + CLIP_PAD);

    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    for (p, q) in [
        (-dx, p0.x - xmin),
        (dx, xmax - p0.x),
        (-dy, p0.y - ymin),
        (dy, ymax - p0.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return None;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
    }

    Some((
        Point2::new(p0.x + t0 * dx, p0.y + t0 * dy),
        Point2::new(p0.x + t1 * dx, p0.y + t1 * dy),
    ))
}

/// Draws a line segment with a square brush, clipping anything outside the
/// image. Degenerate segments collapse to a single brush stamp.
pub fn draw_line(
    image: &mut RgbaImage,
    p0: Point2<f64>,
    p1: Point2<f64>,
    color: [u8; 4],
    thickness: u32,
) {
    if !(p0.x.is_finite() && p0.y.is_finite() && p1.x.is_finite() && p1.y.is_finite()) {
        return;
    }

    let Some((c0, c1)) = clip_segment(image.width() as f64, image.height() as f64, p0, p1)
    else {
        return;
    };

    let mut x0 = c0.x.round() as i64;
    let mut y0 = c0.y.round() as i64;
    let x1 = c1.x.round() as i64;
    let y1 = c1.y.round() as i64;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(image, x0, y0, color, thickness);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draws a filled disc. Pixels outside the image are skipped.
pub fn draw_circle(image: &mut RgbaImage, center: Point2<f64>, radius: u32, color: [u8; 4]) {
    if !(center.x.is_finite() && center.y.is_finite()) {
        return;
    }

    let cx = center.x.round() as i64;
    let cy = center.y.round() as i64;
    let r = radius as i64;

    if cx + r < 0 || cy + r < 0 || cx - r >= image.width() as i64 || cy - r >= image.height() as i64
    {
        return;
    }

    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Strokes the 12 edges of a projected box.
///
/// `corners[i] == None` marks a vertex that fell behind the camera; edges
/// touching it are suppressed rather than drawn to a garbage pixel.
pub fn draw_box(image: &mut RgbaImage, corners: &[Option<Point2<f64>>; 8], style: &OverlayStyle) {
    for [a, b] in BOX_EDGES {
        if let (Some(p0), Some(p1)) = (corners[a], corners[b]) {
            draw_line(image, p0, p1, style.color, style.thickness);
        }
    }

    if style.corner_dots {
        for corner in corners.iter().flatten() {
            draw_circle(image, *corner, style.corner_radius, style.corner_color);
        }
    }
}
