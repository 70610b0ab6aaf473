//! A8 coverage masks: rounded rectangles, box blur and shadows.

use common::geometry::Coord;
use common::{CoreResult, OPA_COVER};

use crate::format::ColorFormat;
use crate::pixel_view::PixelView;

/// Subsamples per pixel along each axis when computing corner coverage.
const SUBSAMPLES: i64 = 4;

/// An owned alpha-only raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub width: Coord,
    pub height: Coord,
    pub data: Vec<u8>,
}

impl Mask {
    pub fn view(&self) -> CoreResult<PixelView<'_>> {
        PixelView::packed(&self.data, self.width, self.height, ColorFormat::A8)
    }

    /// Approximate heap size, used as a cache cost.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// Coverage of a `width` x `height` rectangle with circular corners.
///
/// `radius` is clamped to half of the shorter side. Corner pixels are
/// antialiased by 4x4 supersampling.
pub fn rounded_rect(width: Coord, height: Coord, radius: Coord) -> Vec<u8> {
    if width <= 0 || height <= 0 {
        return Vec::new();
    }

    let (w, h) = (width as usize, height as usize);
    let mut mask = vec![OPA_COVER; w * h];

    let radius = radius.clamp(0, width.min(height) / 2);
    if radius == 0 {
        return mask;
    }

    // Work in 1/(2 * SUBSAMPLES) pixel units so sample centers are integers.
    let unit = 2 * SUBSAMPLES;
    let r = i64::from(radius) * unit;
    let full_w = i64::from(width) * unit;
    let full_h = i64::from(height) * unit;

    for y in 0..height {
        for x in 0..width {
            let in_corner_x = x < radius || x >= width - radius;
            let in_corner_y = y < radius || y >= height - radius;
            if !(in_corner_x && in_corner_y) {
                continue;
            }

            let mut inside = 0i64;
            for sy in 0..SUBSAMPLES {
                let py = i64::from(y) * unit + 2 * sy + 1;
                let my = py.min(full_h - py);
                for sx in 0..SUBSAMPLES {
                    let px = i64::from(x) * unit + 2 * sx + 1;
                    let mx = px.min(full_w - px);

                    if mx >= r || my >= r {
                        inside += 1;
                        continue;
                    }
                    let (dx, dy) = (r - mx, r - my);
                    if dx * dx + dy * dy <= r * r {
                        inside += 1;
                    }
                }
            }

            let total = SUBSAMPLES * SUBSAMPLES;
            mask[y as usize * w + x as usize] = ((inside * 255 + total / 2) / total) as u8;
        }
    }

    mask
}

/// Separable box blur in place: a horizontal pass then a vertical pass, each
/// averaging a window of `2 * radius + 1` pixels with edge clamping.
pub fn box_blur(mask: &mut [u8], width: Coord, height: Coord, radius: Coord) {
    if radius <= 0 || width <= 0 || height <= 0 {
        return;
    }
    let (w, h) = (width as usize, height as usize);
    if mask.len() < w * h {
        return;
    }

    let r = radius as usize;
    let mut line = vec![0u8; w.max(h)];

    for y in 0..h {
        let row = &mut mask[y * w..(y + 1) * w];
        line[..w].copy_from_slice(row);
        blur_line(&line[..w], r, |i, v| row[i] = v);
    }

    for x in 0..w {
        for y in 0..h {
            line[y] = mask[y * w + x];
        }
        blur_line(&line[..h], r, |i, v| mask[i * w + x] = v);
    }
}

/// Running-sum box filter over one line.
fn blur_line(src: &[u8], r: usize, mut write: impl FnMut(usize, u8)) {
    let n = src.len();
    let last = n - 1;
    let window = (2 * r + 1) as u32;
    let at = |i: isize| u32::from(src[i.clamp(0, last as isize) as usize]);

    let mut sum: u32 = (-(r as isize)..=r as isize).map(at).sum();

    for i in 0..n {
        write(i, ((sum + window / 2) / window) as u8);
        let i = i as isize;
        sum = sum + at(i + r as isize + 1) - at(i - r as isize);
    }
}

/// Blurred shadow of a rounded rectangle.
///
/// The mask is `blur` pixels larger than the rectangle on every side; the
/// rectangle sits in the middle and is blurred with a radius of
/// `blur / 2 + 1`.
pub fn shadow(width: Coord, height: Coord, radius: Coord, blur: Coord) -> Mask {
    let blur = blur.max(0);
    let core = rounded_rect(width, height, radius);
    if core.is_empty() {
        return Mask { width: 0, height: 0, data: Vec::new() };
    }

    let mw = width + 2 * blur;
    let mh = height + 2 * blur;
    let mut data = vec![0u8; mw as usize * mh as usize];

    for y in 0..height as usize {
        let dst = (y + blur as usize) * mw as usize + blur as usize;
        data[dst..dst + width as usize].copy_from_slice(&core[y * width as usize..(y + 1) * width as usize]);
    }

    if blur > 0 {
        box_blur(&mut data, mw, mh, blur / 2 + 1);
    }

    Mask { width: mw, height: mh, data }
}
