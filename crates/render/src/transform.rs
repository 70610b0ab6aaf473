//! Fixed-point rotate and zoom sampler.
//!
//! Every destination pixel is mapped back into source space and sampled.
//! Source coordinates are "upscaled": multiplied by 256 so the low byte holds
//! the sub-pixel fraction and the whole walk stays in integer arithmetic.

use common::color::mul_255;
use common::geometry::{Coord, Point, Rect};
use common::{trig, Color, OPA_50, OPA_TRANSP, ZOOM_NONE};
use tracing::trace;

use crate::format::ColorFormat;
use crate::pixel_view::{PixelView, Texel};

/// How a source raster is mapped onto the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformParams {
    /// Rotation in tenths of a degree, clockwise.
    pub angle: i32,
    /// Scale factor, 256 = 1.0.
    pub zoom: u32,
    /// Rotation and zoom center in source coordinates.
    pub pivot: Point,
    pub antialias: bool,
    /// Transparent color for chroma-keyed sources. It is matched after
    /// conversion to the source's color depth.
    pub chroma_key: Color,
    /// Color reported for alpha-only sources.
    pub recolor: Color,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            angle: 0,
            zoom: ZOOM_NONE,
            pivot: Point::ZERO,
            antialias: true,
            chroma_key: Color::CHROMA_KEY,
            recolor: Color::BLACK,
        }
    }
}

impl TransformParams {
    pub fn with_angle(mut self, angle: i32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_zoom(mut self, zoom: u32) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_pivot(mut self, pivot: Point) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_antialias(mut self, antialias: bool) -> Self {
        self.antialias = antialias;
        self
    }

    pub fn with_recolor(mut self, recolor: Color) -> Self {
        self.recolor = recolor;
        self
    }

    pub fn with_chroma_key(mut self, chroma_key: Color) -> Self {
        self.chroma_key = chroma_key;
        self
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.angle == 0 && self.zoom == ZOOM_NONE
    }
}

/// Values derived from [`TransformParams`] once per blit.
///
/// The mapping goes from destination to source, so the angle is negated and
/// the zoom inverted.
#[derive(Clone, Copy, Debug)]
pub struct TransformDescriptor {
    angle: i32,
    zoom_inv: i64,
    sinma: i64,
    cosma: i64,
    pivot: Point,
    pivot_x_256: i64,
    pivot_y_256: i64,
}

impl TransformDescriptor {
    /// Returns `None` for a zero zoom, which has no inverse.
    pub fn new(angle: i32, zoom: u32, pivot: Point) -> Option<Self> {
        if zoom == 0 {
            return None;
        }

        let angle = -angle;
        let (sinma, cosma) = trig::sin_cos_tenths(angle);

        Some(Self {
            angle,
            zoom_inv: (256 * 256) / i64::from(zoom),
            sinma: i64::from(sinma),
            cosma: i64::from(cosma),
            pivot,
            pivot_x_256: i64::from(pivot.x) * 256,
            pivot_y_256: i64::from(pivot.y) * 256,
        })
    }

    /// Map a destination pixel to an upscaled source coordinate.
    pub fn point_upscaled(&self, x: Coord, y: Coord) -> (i64, i64) {
        if self.angle == 0 && self.zoom_inv == i64::from(ZOOM_NONE) {
            return (i64::from(x) * 256, i64::from(y) * 256);
        }

        let x = i64::from(x - self.pivot.x);
        let y = i64::from(y - self.pivot.y);

        if self.angle == 0 {
            (x * self.zoom_inv + self.pivot_x_256, y * self.zoom_inv + self.pivot_y_256)
        } else if self.zoom_inv == i64::from(ZOOM_NONE) {
            (
                ((self.cosma * x - self.sinma * y) >> 2) + self.pivot_x_256,
                ((self.sinma * x + self.cosma * y) >> 2) + self.pivot_y_256,
            )
        } else {
            (
                (((self.cosma * x - self.sinma * y) * self.zoom_inv) >> 10) + self.pivot_x_256,
                (((self.sinma * x + self.cosma * y) * self.zoom_inv) >> 10) + self.pivot_y_256,
            )
        }
    }
}

/// Sample `src` for every pixel of `dest_area` and write the results row by
/// row into `out`.
///
/// `dest_area` is expressed in source coordinates: with an identity transform
/// destination `(x, y)` reads source `(x, y)`. `out` holds
/// `width * height` texels; rows that do not fit are skipped. Pixels that map
/// outside the source come out transparent.
pub fn transform(dest_area: &Rect, src: &PixelView<'_>, params: &TransformParams, out: &mut [Texel]) {
    let dest_w = dest_area.width();
    let dest_h = dest_area.height();
    if dest_w <= 0 || dest_h <= 0 {
        return;
    }

    let rows = out.chunks_exact_mut(dest_w as usize).take(dest_h as usize);

    let Some(desc) = TransformDescriptor::new(params.angle, params.zoom, params.pivot) else {
        trace!("zero zoom, transform output is transparent");
        rows.for_each(|row| row.fill(Texel::TRANSPARENT));
        return;
    };

    let chroma_key = match src.format() {
        ColorFormat::NativeChromaKeyed(depth) => Some(depth.quantize(params.chroma_key)),
        _ => None,
    };
    let sampler = Sampler { src, params, chroma_key };

    if params.is_identity() {
        for (dy, row) in rows.enumerate() {
            let y = dest_area.y1 + dy as Coord;
            for (dx, px) in row.iter_mut().enumerate() {
                *px = sampler.read(dest_area.x1 + dx as Coord, y).unwrap_or(Texel::TRANSPARENT);
            }
        }
        return;
    }

    for (dy, row) in rows.enumerate() {
        let y = dest_area.y1 + dy as Coord;
        let (xs1, ys1) = desc.point_upscaled(dest_area.x1, y);
        let (xs2, ys2) = desc.point_upscaled(dest_area.x2, y);

        let (xs_step, ys_step) = if dest_w > 1 {
            (
                (256 * (xs2 - xs1)) / i64::from(dest_w - 1),
                (256 * (ys2 - ys1)) / i64::from(dest_w - 1),
            )
        } else {
            (0, 0)
        };

        // Sample at pixel centers.
        let xs_start = xs1 + 0x80;
        let ys_start = ys1 + 0x80;

        for (x, px) in row.iter_mut().enumerate() {
            let x = x as i64;
            let xs_ups = xs_start + ((xs_step * x) >> 8);
            let ys_ups = ys_start + ((ys_step * x) >> 8);
            *px = sampler.sample(xs_ups, ys_ups);
        }
    }
}

struct Sampler<'a, 'v> {
    src: &'a PixelView<'v>,
    params: &'a TransformParams,
    /// Chroma key at the source's depth, if the source is keyed.
    chroma_key: Option<Color>,
}

impl Sampler<'_, '_> {
    /// Read one source pixel, applying the chroma key.
    #[inline]
    fn read(&self, x: Coord, y: Coord) -> Option<Texel> {
        let texel = self.src.texel(x, y, self.params.recolor)?;
        match self.chroma_key {
            Some(key) if texel.color.eq_rgb(&key) => Some(Texel::new(texel.color, OPA_TRANSP)),
            _ => Some(texel),
        }
    }

    fn sample(&self, xs_ups: i64, ys_ups: i64) -> Texel {
        let xs_int = (xs_ups >> 8) as Coord;
        let ys_int = (ys_ups >> 8) as Coord;

        let Some(base) = self.read(xs_int, ys_int) else {
            return Texel::TRANSPARENT;
        };
        if !self.params.antialias {
            return base;
        }

        // The half of the pixel the sample falls in picks the neighbor
        // direction; the fraction becomes the neighbor's weight (0..=254).
        let (x_next, xs_fract) = split_fraction(xs_ups);
        let (y_next, ys_fract) = split_fraction(ys_ups);

        let hor = self.read(xs_int + x_next, ys_int);
        let ver = self.read(xs_int, ys_int + y_next);

        match (hor, ver) {
            (Some(hor), Some(ver)) => blend_neighbors(base, hor, ver, xs_fract, ys_fract),
            (None, Some(_)) => Texel::new(base.color, fade(base.alpha, xs_fract)),
            (Some(_), None) => Texel::new(base.color, fade(base.alpha, ys_fract)),
            (None, None) => Texel::new(base.color, OPA_TRANSP),
        }
    }
}

/// Split the low byte of an upscaled coordinate into a neighbor direction
/// and a weight.
#[inline]
fn split_fraction(ups: i64) -> (Coord, u8) {
    let fract = (ups & 0xFF) as u8;
    if fract < 0x80 {
        (-1, (0x7F - fract) * 2)
    } else {
        (1, (fract - 0x80) * 2)
    }
}

/// Fade alpha toward zero as the sample moves past the source edge.
#[inline]
fn fade(alpha: u8, fract: u8) -> u8 {
    mul_255(alpha, 0xFF - fract)
}

#[inline]
fn lerp_alpha(neighbor: u8, base: u8, fract: u8) -> u8 {
    if neighbor == base {
        return base;
    }
    let f = u32::from(fract);
    ((u32::from(neighbor) * f + u32::from(base) * (0x100 - f)) >> 8) as u8
}

/// Two-tap antialiasing: mix the base with each neighbor by its fraction,
/// then average the two results.
fn blend_neighbors(base: Texel, hor: Texel, ver: Texel, xs_fract: u8, ys_fract: u8) -> Texel {
    let alpha = ((u16::from(lerp_alpha(ver.alpha, base.alpha, ys_fract))
        + u16::from(lerp_alpha(hor.alpha, base.alpha, xs_fract)))
        >> 1) as u8;

    // Transparent pixels carry no meaningful color.
    let base_color = if base.alpha != 0 {
        base.color
    } else if hor.alpha != 0 {
        hor.color
    } else {
        ver.color
    };
    let hor_color = if hor.alpha != 0 { hor.color } else { base_color };
    let ver_color = if ver.alpha != 0 { ver.color } else { base_color };

    let color = if base_color.eq_rgb(&hor_color) && base_color.eq_rgb(&ver_color) {
        base_color
    } else {
        let v = ver_color.mix(base_color, ys_fract);
        let h = hor_color.mix(base_color, xs_fract);
        h.mix(v, OPA_50)
    };

    Texel::new(color.with_alpha(0xFF), alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ColorDepth;
    use common::OPA_COVER;

    fn argb_solid(w: usize, h: usize, color: Color, alpha: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(w * h * 4);
        for _ in 0..w * h {
            data.extend_from_slice(&[color.b, color.g, color.r, alpha]);
        }
        data
    }

    fn run(dest: Rect, src: &PixelView<'_>, params: &TransformParams) -> Vec<Texel> {
        let mut out = vec![Texel::new(Color::WHITE, 99); dest.size() as usize];
        transform(&dest, src, params, &mut out);
        out
    }

    #[test]
    fn test_identity_red_argb() {
        let data = argb_solid(4, 4, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 4, 4, ColorFormat::Argb8888).unwrap();

        let out = run(Rect::new(0, 0, 3, 3), &src, &TransformParams::default());
        assert_eq!(out.len(), 16);
        for px in out {
            assert_eq!(px.color, Color::RED);
            assert_eq!(px.alpha, OPA_COVER);
        }
    }

    #[test]
    fn test_identity_copies_each_pixel() {
        let mut data = vec![0u8; 3 * 2 * 2];
        let colors = [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE, Color::BLACK, Color::rgb(8, 16, 24)];
        for (i, c) in colors.iter().enumerate() {
            ColorDepth::Rgb565.encode(*c, &mut data[i * 2..]);
        }
        let src = PixelView::packed(&data, 3, 2, ColorFormat::Native(ColorDepth::Rgb565)).unwrap();

        let out = run(Rect::new(0, 0, 2, 1), &src, &TransformParams::default());
        for (i, px) in out.iter().enumerate() {
            assert_eq!(px.color, ColorDepth::Rgb565.decode(&data[i * 2..]));
            assert_eq!(px.alpha, OPA_COVER);
        }
    }

    #[test]
    fn test_identity_each_depth() {
        let colors = [Color::RED, Color::BLUE];
        for depth in [ColorDepth::Rgb332, ColorDepth::Rgb565, ColorDepth::Rgb888, ColorDepth::Xrgb8888] {
            let format = ColorFormat::Native(depth);
            let px = format.pixel_size();
            let mut data = vec![0u8; 2 * px];
            for (i, c) in colors.iter().enumerate() {
                depth.encode(*c, &mut data[i * px..]);
            }
            let src = PixelView::packed(&data, 2, 1, format).unwrap();

            let out = run(Rect::new(0, 0, 1, 0), &src, &TransformParams::default());
            assert_eq!(out[0], Texel::new(depth.quantize(Color::RED), OPA_COVER), "{:?}", depth);
            assert_eq!(out[1], Texel::new(depth.quantize(Color::BLUE), OPA_COVER), "{:?}", depth);
        }
    }

    #[test]
    fn test_identity_a8_plane() {
        let mut data = vec![0u8; 2 * 2 + 2];
        ColorDepth::Rgb565.encode(Color::RED, &mut data[0..]);
        ColorDepth::Rgb565.encode(Color::BLUE, &mut data[2..]);
        data[4] = 255;
        data[5] = 40;
        let src = PixelView::packed(&data, 2, 1, ColorFormat::NativeA8Plane(ColorDepth::Rgb565)).unwrap();

        let out = run(Rect::new(0, 0, 1, 0), &src, &TransformParams::default());
        assert_eq!(out[0], Texel::new(Color::RED, 255));
        assert_eq!(out[1], Texel::new(Color::BLUE, 40));
    }

    #[test]
    fn test_out_of_bounds_is_transparent_without_aa() {
        let data = argb_solid(4, 4, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 4, 4, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_antialias(false).with_angle(10);

        let dest = Rect::new(-3, -3, 6, 6);
        let out = run(dest, &src, &params);
        // Corners of the destination map far outside the 4x4 source.
        assert_eq!(out[0].alpha, 0);
        assert_eq!(out[out.len() - 1].alpha, 0);
        assert!(out.iter().any(|px| px.alpha == OPA_COVER));
    }

    #[test]
    fn test_no_aa_interior_is_plain_copy() {
        let data = argb_solid(8, 8, Color::BLUE, 200);
        let src = PixelView::packed(&data, 8, 8, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default()
            .with_antialias(false)
            .with_zoom(512)
            .with_pivot(Point::new(4, 4));

        let out = run(Rect::new(2, 2, 5, 5), &src, &params);
        for px in out {
            assert_eq!(px, Texel::new(Color::BLUE, 200));
        }
    }

    #[test]
    fn test_zoom_two_samples_source_centers() {
        // 2x1 source: red, blue.
        let mut data = argb_solid(2, 1, Color::RED, OPA_COVER);
        data[4..8].copy_from_slice(&[255, 0, 0, 255]);
        let src = PixelView::packed(&data, 2, 1, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_antialias(false).with_zoom(512);

        let out = run(Rect::new(0, 0, 3, 0), &src, &params);
        assert_eq!(out[0], Texel::new(Color::RED, OPA_COVER));
        assert_eq!(out[1], Texel::new(Color::BLUE, OPA_COVER));
        assert_eq!(out[2], Texel::new(Color::BLUE, OPA_COVER));
        assert_eq!(out[3].alpha, 0);
    }

    #[test]
    fn test_aa_interior_of_solid_stays_solid() {
        let data = argb_solid(10, 10, Color::GREEN, OPA_COVER);
        let src = PixelView::packed(&data, 10, 10, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_angle(300).with_pivot(Point::new(5, 5));

        let out = run(Rect::new(4, 4, 6, 6), &src, &params);
        for px in out {
            assert_eq!(px.color, Color::GREEN);
            assert_eq!(px.alpha, OPA_COVER);
        }
    }

    #[test]
    fn test_aa_fades_at_edges() {
        let data = argb_solid(10, 10, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 10, 10, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_angle(450).with_pivot(Point::new(5, 5));

        let out = run(Rect::new(-4, -4, 14, 14), &src, &params);
        let partial = out.iter().filter(|px| px.alpha > 0 && px.alpha < OPA_COVER).count();
        assert!(partial > 0);
        assert_eq!(out[0].alpha, 0);
    }

    #[test]
    fn test_aa_both_neighbors_outside_is_transparent() {
        // Zoom 2 puts the sample at (0.5, 0.5): both neighbors are off a 1x1 source.
        let data = argb_solid(1, 1, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 1, 1, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_zoom(512);

        let out = run(Rect::new(0, 0, 0, 0), &src, &params);
        assert_eq!(out[0].alpha, 0);

        let out = run(Rect::new(0, 0, 0, 0), &src, &params.with_antialias(false));
        assert_eq!(out[0], Texel::new(Color::RED, OPA_COVER));
    }

    #[test]
    fn test_aa_one_neighbor_outside_fades() {
        // Sample lands at (128, 214) upscaled. The right neighbor is inside,
        // the one below is not, with weight (0xD6 - 0x80) * 2 = 172.
        let data = argb_solid(2, 1, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 2, 1, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_zoom(384).with_pivot(Point::new(0, 1));

        let out = run(Rect::new(0, 0, 0, 0), &src, &params);
        assert_eq!(out[0], Texel::new(Color::RED, mul_255(OPA_COVER, 0xFF - 172)));
        assert_eq!(out[0].alpha, 83);
    }

    #[test]
    fn test_aa_mixes_neighbors() {
        // Left half black, right half white.
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&[0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255, 255, 255, 255, 255, 255]);
        }
        let src = PixelView::packed(&data, 4, 4, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_zoom(384);

        let out = run(Rect::new(0, 1, 4, 1), &src, &params);
        assert_eq!(out[0].color, Color::BLACK);
        let mixed = out.iter().any(|px| px.color.r > 0 && px.color.r < 255);
        assert!(mixed);
    }

    #[test]
    fn test_chroma_key_is_transparent() {
        let mut data = vec![0u8; 2 * 2];
        ColorDepth::Rgb565.encode(Color::CHROMA_KEY, &mut data[0..]);
        ColorDepth::Rgb565.encode(Color::RED, &mut data[2..]);
        let src = PixelView::packed(&data, 2, 1, ColorFormat::NativeChromaKeyed(ColorDepth::Rgb565)).unwrap();

        let out = run(Rect::new(0, 0, 1, 0), &src, &TransformParams::default());
        assert_eq!(out[0].alpha, 0);
        assert_eq!(out[1], Texel::new(Color::RED, OPA_COVER));
    }

    #[test]
    fn test_chroma_key_matches_at_source_depth() {
        // #123456 is not exact in RGB565 or RGB332.
        let key = Color::rgb(0x12, 0x34, 0x56);
        for depth in [ColorDepth::Rgb565, ColorDepth::Rgb332] {
            let format = ColorFormat::NativeChromaKeyed(depth);
            let px = format.pixel_size();
            let mut data = vec![0u8; 2 * px];
            depth.encode(key, &mut data[0..]);
            depth.encode(Color::RED, &mut data[px..]);
            let src = PixelView::packed(&data, 2, 1, format).unwrap();
            let params = TransformParams::default().with_chroma_key(key);

            let out = run(Rect::new(0, 0, 1, 0), &src, &params);
            assert_eq!(out[0].alpha, 0, "{:?}", depth);
            assert_eq!(out[1].alpha, OPA_COVER, "{:?}", depth);
        }
    }

    #[test]
    fn test_a8_uses_recolor() {
        let data = [0u8, 128, 255, 64];
        let src = PixelView::packed(&data, 2, 2, ColorFormat::A8).unwrap();
        let params = TransformParams::default().with_recolor(Color::BLUE);

        let out = run(Rect::new(0, 0, 1, 1), &src, &params);
        let alphas: Vec<u8> = out.iter().map(|t| t.alpha).collect();
        assert_eq!(alphas, vec![0, 128, 255, 64]);
        assert!(out.iter().all(|t| t.color == Color::BLUE));
    }

    #[test]
    fn test_single_column_destination() {
        let data = argb_solid(4, 4, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 4, 4, ColorFormat::Argb8888).unwrap();
        let params = TransformParams::default().with_angle(900).with_pivot(Point::new(2, 2));

        let out = run(Rect::new(2, 0, 2, 3), &src, &params);
        assert_eq!(out.len(), 4);
        assert!(out.iter().any(|px| px.alpha > 0));
    }

    #[test]
    fn test_zero_zoom_is_transparent() {
        let data = argb_solid(4, 4, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 4, 4, ColorFormat::Argb8888).unwrap();
        let out = run(Rect::new(0, 0, 3, 3), &src, &TransformParams::default().with_zoom(0));
        assert!(out.iter().all(|px| px.alpha == 0));
    }

    #[test]
    fn test_degenerate_destination_is_noop() {
        let data = argb_solid(1, 1, Color::RED, OPA_COVER);
        let src = PixelView::packed(&data, 1, 1, ColorFormat::Argb8888).unwrap();
        let mut out = vec![Texel::new(Color::WHITE, 7); 4];
        transform(&Rect::new(3, 0, 2, 0), &src, &TransformParams::default(), &mut out);
        assert!(out.iter().all(|px| px.alpha == 7));
    }

    #[test]
    fn test_descriptor_quarter_turn() {
        let desc = TransformDescriptor::new(900, ZOOM_NONE, Point::ZERO).unwrap();
        // Walking back from the destination undoes a clockwise quarter turn.
        let (x, y) = desc.point_upscaled(0, 10);
        assert!((x - 10 * 256).abs() <= 256);
        assert!(y.abs() <= 256);
    }

    #[test]
    fn test_split_fraction() {
        assert_eq!(split_fraction(0x80), (1, 0));
        assert_eq!(split_fraction(0xFF), (1, 254));
        assert_eq!(split_fraction(0x7F), (-1, 0));
        assert_eq!(split_fraction(0x00), (-1, 254));
        assert_eq!(split_fraction(-1), (1, 254));
    }
}
