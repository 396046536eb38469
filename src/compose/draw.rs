use std::collections::BTreeSet;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use rusttype::{point, Font, PositionedGlyph, Scale};

use crate::compose::layout::ShadowStyle;

/// Source-over blend of `color` scaled by `coverage` (0..=1) onto one pixel.
pub fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let alpha = (color.0[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let inv = 1.0 - alpha;
    for channel in 0..3 {
        let blended = color.0[channel] as f32 * alpha + dst.0[channel] as f32 * inv;
        dst.0[channel] = blended.round().clamp(0.0, 255.0) as u8;
    }
    let dst_alpha = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((alpha + dst_alpha * inv) * 255.0).round().clamp(0.0, 255.0) as u8;
}

pub fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x_end = x.saturating_add(width).min(canvas.width());
    let y_end = y.saturating_add(height).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            canvas.put_pixel(px, py, color);
        }
    }
}

/// Paints `color` through an 8-bit coverage mask placed at (`x`, `y`).
pub fn paint_mask(canvas: &mut RgbaImage, mask: &GrayImage, x: i64, y: i64, color: Rgba<u8>) {
    for (mx, my, coverage) in mask.enumerate_pixels() {
        if coverage.0[0] == 0 {
            continue;
        }
        blend_pixel(
            canvas,
            x + mx as i64,
            y + my as i64,
            color,
            coverage.0[0] as f32 / 255.0,
        );
    }
}

/// Gaussian-blurred copy of `mask` painted with the shadow colour.
pub fn paint_shadow(canvas: &mut RgbaImage, mask: &GrayImage, x: i64, y: i64, shadow: ShadowStyle) {
    let margin = (shadow.blur * 1.5).ceil() as u32;
    let mut padded = GrayImage::new(mask.width() + margin * 2, mask.height() + margin * 2);
    imageops::replace(&mut padded, mask, margin as i64, margin as i64);
    let blurred = if shadow.blur > 0.0 {
        imageops::blur(&padded, shadow.blur / 2.0)
    } else {
        padded
    };
    paint_mask(
        canvas,
        &blurred,
        x - margin as i64,
        y - margin as i64 + shadow.offset_y as i64,
        shadow.color,
    );
}

fn layout_glyphs(font: &Font<'static>, px: f32, text: &str) -> Vec<PositionedGlyph<'static>> {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    font.layout(text, scale, point(0.0, v_metrics.ascent)).collect()
}

pub fn text_width(font: &Font<'static>, px: f32, text: &str) -> u32 {
    let glyphs = layout_glyphs(font, px, text);
    let advance = glyphs
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);
    advance.ceil().max(0.0) as u32
}

/// Coverage mask of `text` laid out with its top edge at row 0.
pub fn text_mask(font: &Font<'static>, px: f32, text: &str) -> GrayImage {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let height = (v_metrics.ascent - v_metrics.descent).ceil().max(1.0) as u32;
    let width = text_width(font, px, text).max(1);
    let mut mask = GrayImage::new(width, height);

    for glyph in layout_glyphs(font, px, text) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, v| {
            let px = gx as i32 + bb.min.x;
            let py = gy as i32 + bb.min.y;
            if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                return;
            }
            let value = (v * 255.0).round() as u8;
            let current = mask.get_pixel(px as u32, py as u32).0[0];
            mask.put_pixel(px as u32, py as u32, Luma([current.max(value)]));
        });
    }
    mask
}

/// Alpha mask of a logo scaled to fit a `size`×`size` box.
///
/// Logos without transparency are treated as dark-on-light artwork and masked by darkness.
pub fn logo_mask(logo: &RgbaImage, size: u32) -> GrayImage {
    let (width, height) = fit_within(logo.width(), logo.height(), size);
    let resized = imageops::resize(logo, width, height, FilterType::Lanczos3);
    let has_transparency = resized.pixels().any(|pixel| pixel.0[3] < 255);
    let mut mask = GrayImage::new(resized.width(), resized.height());
    for (x, y, pixel) in resized.enumerate_pixels() {
        let value = if has_transparency {
            pixel.0[3]
        } else {
            let [r, g, b, _] = pixel.0;
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
            255 - luma
        };
        mask.put_pixel(x, y, Luma([value]));
    }
    mask
}

fn fit_within(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (size, size);
    }
    let scale = size as f32 / width.max(height) as f32;
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

fn quadratic_points(
    from: (f32, f32),
    control: (f32, f32),
    to: (f32, f32),
    steps: u32,
    out: &mut BTreeSet<(i64, i64)>,
) {
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let inv = 1.0 - t;
        let x = inv * inv * from.0 + 2.0 * inv * t * control.0 + t * t * to.0;
        let y = inv * inv * from.1 + 2.0 * inv * t * control.1 + t * t * to.1;
        out.insert((x.round() as i64, y.round() as i64));
    }
}

/// 1px rounded-rectangle outline inset from the canvas edges. Each pixel is blended once.
pub fn stroke_rounded_rect(canvas: &mut RgbaImage, inset: u32, radius: u32, color: Rgba<u8>) {
    if canvas.width() <= inset * 2 + 1 || canvas.height() <= inset * 2 + 1 {
        return;
    }
    let left = inset as i64;
    let top = inset as i64;
    let right = (canvas.width() - 1 - inset) as i64;
    let bottom = (canvas.height() - 1 - inset) as i64;
    let r = (radius as i64).min((right - left) / 2).min((bottom - top) / 2);

    let mut points = BTreeSet::new();
    for x in (left + r)..=(right - r) {
        points.insert((x, top));
        points.insert((x, bottom));
    }
    for y in (top + r)..=(bottom - r) {
        points.insert((left, y));
        points.insert((right, y));
    }

    let (l, t, rr, b, rf) = (
        left as f32,
        top as f32,
        right as f32,
        bottom as f32,
        r as f32,
    );
    let steps = (r as u32).max(1) * 4;
    quadratic_points((rr - rf, t), (rr, t), (rr, t + rf), steps, &mut points);
    quadratic_points((rr, b - rf), (rr, b), (rr - rf, b), steps, &mut points);
    quadratic_points((l + rf, b), (l, b), (l, b - rf), steps, &mut points);
    quadratic_points((l, t + rf), (l, t), (l + rf, t), steps, &mut points);

    for (x, y) in points {
        blend_pixel(canvas, x, y, color, 1.0);
    }
}
