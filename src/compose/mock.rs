use image::{Rgb, Rgba, RgbaImage};
use rusttype::Font;

use crate::compose::draw::{blend_pixel, paint_mask, text_mask, text_width};

const MOCK_WIDTH: u32 = 800;
const MOCK_HEIGHT: u32 = 1200;
const MOCK_FONT_SIZE: f32 = 48.0;

fn shift(channel: u8, delta: i16) -> u8 {
    (channel as i16 + delta).clamp(0, 255) as u8
}

/// Synthetic 2:3 portrait: vertical gradient around `color`, a soft "face" disc and a label.
pub fn mock_portrait(color: Rgb<u8>, label: &str, font: Option<&Font<'static>>) -> RgbaImage {
    let [r, g, b] = color.0;
    let start = [shift(r, 30), shift(g, 30), shift(b, 30)];
    let end = [shift(r, -30), shift(g, -30), shift(b, -30)];

    let mut image = RgbaImage::new(MOCK_WIDTH, MOCK_HEIGHT);
    for y in 0..MOCK_HEIGHT {
        let t = y as f32 / (MOCK_HEIGHT - 1) as f32;
        let row = Rgba([
            (start[0] as f32 + (end[0] as f32 - start[0] as f32) * t).round() as u8,
            (start[1] as f32 + (end[1] as f32 - start[1] as f32) * t).round() as u8,
            (start[2] as f32 + (end[2] as f32 - start[2] as f32) * t).round() as u8,
            255,
        ]);
        for x in 0..MOCK_WIDTH {
            image.put_pixel(x, y, row);
        }
    }

    let cx = MOCK_WIDTH as i64 / 2;
    let cy = (MOCK_HEIGHT as f32 * 0.35) as i64;
    let radius = 200i64;
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if (x - cx).pow(2) + (y - cy).pow(2) <= radius.pow(2) {
                blend_pixel(&mut image, x, y, Rgba([255, 255, 255, 26]), 1.0);
            }
        }
    }

    if let Some(font) = font {
        if !label.trim().is_empty() {
            let width = text_width(font, MOCK_FONT_SIZE, label) as i64;
            let mask = text_mask(font, MOCK_FONT_SIZE, label);
            let x = cx - width / 2;
            let y = (MOCK_HEIGHT as f32 * 0.7) as i64 - mask.height() as i64 / 2;
            paint_mask(&mut image, &mask, x, y, Rgba([255, 255, 255, 204]));
        }
    }

    image
}
