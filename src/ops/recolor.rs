//! Stencil recoloring.
//!
//! Both transforms are 1:1 per-pixel maps over the full buffer and run
//! row-parallel with rayon. Neither resamples.

use rayon::prelude::*;

use crate::error::TransformError;
use crate::raster::RasterImage;

/// Pixels with alpha below this are treated as background.
pub const ALPHA_THRESHOLD: u8 = 10;

/// How a recolor treats the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecolorMode {
    /// White background, line color blended by ink density.
    #[default]
    Opaque,
    /// Keep alpha, replace RGB.
    Transparent,
}

/// Opaque recolor of a black-line stencil on white.
///
/// `density = (1 - min(R,G,B)/255) * alpha/255`, output is
/// `target*density + 255*(1-density)` at full alpha.
pub fn recolor_opaque(src: &RasterImage, target: [u8; 3]) -> RasterImage {
    recolor_opaque_from(src, [0, 0, 0], target)
}

/// Opaque recolor of a stencil whose lines are currently drawn in `line`.
///
/// Ink density is measured relative to the darkest channel of `line`, so a
/// red stencil recolored to blue matches a black stencil recolored to blue.
/// With `line = [0, 0, 0]` this is exactly [`recolor_opaque`].
pub fn recolor_opaque_from(src: &RasterImage, line: [u8; 3], target: [u8; 3]) -> RasterImage {
    let full_ink = match 255 - line.iter().copied().min().unwrap_or(0) {
        0 => 255.0,
        v => v as f32,
    };
    let [tr, tg, tb] = target.map(|c| c as f32);

    map_pixels(src, |[r, g, b, a]| {
        if a < ALPHA_THRESHOLD {
            return [255, 255, 255, 255];
        }
        let ink = (255 - r.min(g).min(b)) as f32;
        let density = (ink / full_ink).min(1.0) * (a as f32 / 255.0);
        let blend = |t: f32| (t * density + 255.0 * (1.0 - density)).round().clamp(0.0, 255.0) as u8;
        [blend(tr), blend(tg), blend(tb), 255]
    })
}

/// Replace RGB with `target` and keep alpha. Sub-threshold pixels become
/// fully transparent (still carrying the target RGB).
pub fn recolor_transparent(src: &RasterImage, target: [u8; 3]) -> RasterImage {
    let [tr, tg, tb] = target;
    map_pixels(src, |[_, _, _, a]| {
        if a < ALPHA_THRESHOLD {
            [tr, tg, tb, 0]
        } else {
            [tr, tg, tb, a]
        }
    })
}

/// Turn an opaque line-on-white stencil into lines on a transparent background:
/// ink density becomes alpha and RGB becomes `target`.
pub fn extract_ink(src: &RasterImage, line: [u8; 3], target: [u8; 3]) -> RasterImage {
    let full_ink = match 255 - line.iter().copied().min().unwrap_or(0) {
        0 => 255.0,
        v => v as f32,
    };
    let [tr, tg, tb] = target;
    map_pixels(src, |[r, g, b, a]| {
        if a < ALPHA_THRESHOLD {
            return [tr, tg, tb, 0];
        }
        let ink = (255 - r.min(g).min(b)) as f32;
        let density = (ink / full_ink).min(1.0) * (a as f32 / 255.0);
        [tr, tg, tb, (density * 255.0).round() as u8]
    })
}

/// Dispatch on `mode`. `line` is only consulted by the opaque path.
pub fn recolor(src: &RasterImage, mode: RecolorMode, line: [u8; 3], target: [u8; 3]) -> RasterImage {
    match mode {
        RecolorMode::Opaque => recolor_opaque_from(src, line, target),
        RecolorMode::Transparent => recolor_transparent(src, target),
    }
}

/// Decode an encoded stencil (PNG bytes or any supported container) and recolor it.
pub fn recolor_encoded(
    bytes: &[u8],
    mode: RecolorMode,
    line: [u8; 3],
    target: [u8; 3],
) -> Result<RasterImage, TransformError> {
    let src = RasterImage::decode(bytes)?;
    Ok(recolor(&src, mode, line, target))
}

fn map_pixels<F>(src: &RasterImage, f: F) -> RasterImage
where
    F: Fn([u8; 4]) -> [u8; 4] + Sync,
{
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }
    let stride = w as usize * 4;
    let src_raw = src.pixels().as_raw();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw
        .par_chunks_mut(stride)
        .zip(src_raw.par_chunks(stride))
        .for_each(|(row_out, row_in)| {
            for (o, i) in row_out.chunks_exact_mut(4).zip(row_in.chunks_exact(4)) {
                o.copy_from_slice(&f([i[0], i[1], i[2], i[3]]));
            }
        });

    // Length matches by construction.
    RasterImage::from_raw(w, h, dst_raw).unwrap_or_else(|_| src.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::ColorStyle;
    use image::Rgba;

    /// Black strokes of varying darkness and coverage on white.
    fn sample_stencil() -> RasterImage {
        let mut img = RasterImage::filled(16, 4, [255, 255, 255, 255]);
        for x in 0..16u32 {
            let v = (x * 17) as u8;
            img.pixels_mut().put_pixel(x, 0, Rgba([v, v, v, 255]));
            img.pixels_mut().put_pixel(x, 1, Rgba([0, 0, 0, (x * 16 + 15) as u8]));
            img.pixels_mut().put_pixel(x, 2, Rgba([v, v / 2, 255 - v, 200]));
        }
        img.pixels_mut().put_pixel(3, 3, Rgba([0, 0, 0, 9]));
        img
    }

    fn max_channel_diff(a: &RasterImage, b: &RasterImage) -> u8 {
        a.pixels()
            .as_raw()
            .iter()
            .zip(b.pixels().as_raw())
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn opaque_matches_density_formula() {
        let mut img = RasterImage::filled(2, 1, [255, 255, 255, 255]);
        img.pixels_mut().put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        img.pixels_mut().put_pixel(1, 0, Rgba([51, 102, 204, 128]));
        let out = recolor_opaque(&img, [0x7f, 0x1d, 0x1d]);
        assert_eq!(out.pixel(0, 0), [0x7f, 0x1d, 0x1d, 255]);
        // density = (204/255) * (128/255)
        let d = (204.0 / 255.0) * (128.0 / 255.0);
        let expect = |t: f32| (t * d + 255.0 * (1.0 - d)).round() as u8;
        assert_eq!(out.pixel(1, 0), [expect(127.0), expect(29.0), expect(29.0), 255]);
    }

    #[test]
    fn opaque_forces_background_white() {
        let img = RasterImage::new(3, 3);
        let out = recolor_opaque(&img, [1, 2, 3]);
        assert!(out.pixels().pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn opaque_is_idempotent() {
        let src = sample_stencil();
        for target in [[0, 0, 0], [255, 0, 0], [0, 0, 255]] {
            let once = recolor_opaque(&src, target);
            let twice = recolor_opaque(&once, target);
            assert_eq!(once, twice, "target {:?}", target);
        }
    }

    #[test]
    fn opaque_is_idempotent_for_palette_when_line_is_tracked() {
        let src = sample_stencil();
        for style in ColorStyle::ALL {
            let once = recolor_opaque(&src, style.rgb());
            let twice = recolor_opaque_from(&once, style.rgb(), style.rgb());
            assert!(max_channel_diff(&once, &twice) <= 1, "{}", style);
        }
    }

    #[test]
    fn opaque_is_invariant_to_current_line_color() {
        let src = sample_stencil();
        let via_red = recolor_opaque(&recolor_opaque(&src, [255, 0, 0]), [0, 0, 255]);
        let direct = recolor_opaque(&src, [0, 0, 255]);
        assert!(max_channel_diff(&via_red, &direct) <= 1);

        let rojas = ColorStyle::Rojas.rgb();
        let azules = ColorStyle::Azules.rgb();
        let chained = recolor_opaque_from(&recolor_opaque(&src, rojas), rojas, azules);
        assert!(max_channel_diff(&chained, &recolor_opaque(&src, azules)) <= 1);
    }

    #[test]
    fn transparent_preserves_alpha() {
        let src = sample_stencil();
        let out = recolor_transparent(&src, [0x14, 0x53, 0x2d]);
        for (i, o) in src.pixels().pixels().zip(out.pixels().pixels()) {
            let expected_alpha = if i.0[3] < ALPHA_THRESHOLD { 0 } else { i.0[3] };
            assert_eq!(o.0, [0x14, 0x53, 0x2d, expected_alpha]);
        }
        assert_eq!(recolor_transparent(&out, [0x14, 0x53, 0x2d]), out);
    }

    #[test]
    fn extract_ink_then_opaque_restores_lines() {
        let src = recolor_opaque(&sample_stencil(), [0, 0, 0]);
        let ink = extract_ink(&src, [0, 0, 0], [0, 0, 0]);
        assert_eq!(ink.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(ink.pixel(15, 0)[3], 0);
        let back = recolor_opaque(&ink, [0, 0, 0]);
        for ((i, b), s) in ink.pixels().pixels().zip(back.pixels().pixels()).zip(src.pixels().pixels()) {
            if i.0[3] < ALPHA_THRESHOLD {
                assert_eq!(b.0, [255, 255, 255, 255]);
            } else {
                assert!(b.0[0].abs_diff(s.0[0]) <= 1);
            }
        }
    }

    #[test]
    fn dimensions_are_preserved() {
        let src = RasterImage::filled(7, 3, [10, 10, 10, 255]);
        assert_eq!(recolor_opaque(&src, [0, 0, 0]).dimensions(), (7, 3));
        assert_eq!(recolor_transparent(&src, [0, 0, 0]).dimensions(), (7, 3));
        assert_eq!(recolor_opaque(&RasterImage::new(0, 0), [0, 0, 0]).dimensions(), (0, 0));
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let err = recolor_encoded(b"nope", RecolorMode::Opaque, [0, 0, 0], [1, 2, 3]).unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }
}
