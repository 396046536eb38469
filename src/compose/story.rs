use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, Rgb, RgbaImage};
use tracing::debug;

use crate::compose::assets::StoryAssets;
use crate::compose::draw::{
    fill_rect, logo_mask, paint_mask, paint_shadow, stroke_rounded_rect, text_mask, text_width,
};
use crate::compose::layout::{CompositionLayout, StoryDesign};
use crate::compose::mock::mock_portrait;
use crate::errors::CompositionError;

const PREVIEW_WITHOUT_COLOR: Rgb<u8> = Rgb([180, 140, 140]);
const PREVIEW_WITH_COLOR: Rgb<u8> = Rgb([160, 200, 180]);

/// Renders the two-up "story" comparison image.
///
/// Stateless per call: the same inputs always produce the same bytes.
pub struct StoryComposer {
    layout: CompositionLayout,
    design: StoryDesign,
    assets: StoryAssets,
    logo_mask: Option<GrayImage>,
}

impl StoryComposer {
    pub fn new(layout: CompositionLayout, design: StoryDesign, assets: StoryAssets) -> Self {
        let logo_mask = assets
            .logo
            .as_ref()
            .map(|logo| logo_mask(logo, layout.logo_size()));
        Self {
            layout,
            design,
            assets,
            logo_mask,
        }
    }

    pub fn layout(&self) -> &CompositionLayout {
        &self.layout
    }

    pub fn compose(&self, top: &[u8], bottom: &[u8]) -> Result<Vec<u8>, CompositionError> {
        let top = image::load_from_memory(top)
            .map_err(|source| CompositionError::Decode { which: "top", source })?;
        let bottom = image::load_from_memory(bottom)
            .map_err(|source| CompositionError::Decode { which: "bottom", source })?;
        encode_png(self.render(&top, &bottom))
    }

    /// Story built from two synthetic portraits; needs no remote call.
    pub fn compose_preview(&self) -> Result<Vec<u8>, CompositionError> {
        let font = self.assets.font.as_ref();
        let top = mock_portrait(PREVIEW_WITHOUT_COLOR, &self.design.top_label, font);
        let bottom = mock_portrait(PREVIEW_WITH_COLOR, &self.design.bottom_label, font);
        encode_png(self.render(
            &DynamicImage::ImageRgba8(top),
            &DynamicImage::ImageRgba8(bottom),
        ))
    }

    pub fn render(&self, top: &DynamicImage, bottom: &DynamicImage) -> RgbaImage {
        let layout = &self.layout;
        let half = layout.half_height();

        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, layout.background);

        let top_fill = top.resize_to_fill(layout.width, half, FilterType::Lanczos3);
        let bottom_fill = bottom.resize_to_fill(layout.width, layout.height - half, FilterType::Lanczos3);
        imageops::overlay(&mut canvas, &top_fill.to_rgba8(), 0, 0);
        imageops::overlay(&mut canvas, &bottom_fill.to_rgba8(), 0, half as i64);

        fill_rect(
            &mut canvas,
            0,
            layout.divider_top(),
            layout.width,
            layout.divider_thickness,
            layout.divider_color,
        );

        self.draw_labels(&mut canvas);
        self.draw_logos(&mut canvas);

        stroke_rounded_rect(
            &mut canvas,
            layout.frame_inset,
            layout.frame_radius,
            layout.frame_color,
        );
        canvas
    }

    fn draw_labels(&self, canvas: &mut RgbaImage) {
        let Some(font) = self.assets.font.as_ref() else {
            debug!("Skipping story labels: no font loaded");
            return;
        };
        let layout = &self.layout;
        let labels = [
            (
                self.design.top_label.as_str(),
                layout.top_label_y(self.design.logo_in_top_half),
            ),
            (self.design.bottom_label.as_str(), layout.bottom_label_y()),
        ];

        for (text, y) in labels {
            if text.trim().is_empty() {
                continue;
            }
            let width = text_width(font, layout.font_size, text);
            let x = layout.anchored_x(self.design.align, width);
            let mask = text_mask(font, layout.font_size, text);
            paint_shadow(canvas, &mask, x, y, layout.label_shadow);
            paint_mask(canvas, &mask, x, y, layout.label_color);
        }
    }

    fn draw_logos(&self, canvas: &mut RgbaImage) {
        let Some(mask) = self.logo_mask.as_ref() else {
            return;
        };
        let layout = &self.layout;
        let x = layout.anchored_x(self.design.align, mask.width());

        let mut rows = vec![layout.bottom_logo_y()];
        if self.design.logo_in_top_half {
            rows.push(layout.top_logo_y());
        }
        for y in rows {
            paint_shadow(canvas, mask, x, y, layout.logo_shadow);
            paint_mask(canvas, mask, x, y, layout.logo_tint);
        }
    }
}

pub fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, CompositionError> {
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(CompositionError::Encode)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::layout::TextAlign;
    use image::Rgba;
    use std::io::Cursor;

    fn design() -> StoryDesign {
        StoryDesign {
            top_label: "Without".to_string(),
            bottom_label: "With".to_string(),
            align: TextAlign::Left,
            logo_in_top_half: false,
            logo_file_name: "collamin.png".to_string(),
        }
    }

    fn png(image: RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// 500x700 portrait: red upper half, green lower half.
    fn banded_portrait() -> Vec<u8> {
        let mut image = RgbaImage::from_pixel(500, 700, Rgba([220, 20, 20, 255]));
        for y in 350..700 {
            for x in 0..500 {
                image.put_pixel(x, y, Rgba([20, 200, 20, 255]));
            }
        }
        png(image)
    }

    fn solid_portrait(color: [u8; 3]) -> Vec<u8> {
        png(RgbaImage::from_pixel(500, 700, Rgba([color[0], color[1], color[2], 255])))
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory(bytes).unwrap().to_rgba8()
    }

    fn close(actual: &Rgba<u8>, expected: [u8; 3]) -> bool {
        actual
            .0
            .iter()
            .zip(expected.iter())
            .all(|(a, e)| (*a as i16 - *e as i16).abs() <= 3)
    }

    fn composer_without_assets() -> StoryComposer {
        StoryComposer::new(CompositionLayout::default(), design(), StoryAssets::none())
    }

    #[test]
    fn output_has_exact_canvas_size_without_assets() {
        let composer = composer_without_assets();
        let bytes = composer
            .compose(&banded_portrait(), &solid_portrait([20, 20, 220]))
            .unwrap();
        let output = decode(&bytes);
        assert_eq!(output.dimensions(), (1080, 1920));
    }

    #[test]
    fn halves_are_cover_fit_and_divider_sits_on_the_midpoint() {
        let composer = composer_without_assets();
        let output = decode(
            &composer
                .compose(&banded_portrait(), &solid_portrait([20, 20, 220]))
                .unwrap(),
        );

        // 500x700 scales by 2.16 to 1080x1512; 276 rows are cropped from each end,
        // which moves the red/green boundary to row 480 of the top half.
        assert!(close(output.get_pixel(540, 100), [220, 20, 20]));
        assert!(close(output.get_pixel(540, 470), [220, 20, 20]));
        assert!(close(output.get_pixel(540, 490), [20, 200, 20]));
        assert!(close(output.get_pixel(540, 900), [20, 200, 20]));
        assert!(close(output.get_pixel(540, 1400), [20, 20, 220]));

        assert_eq!(output.get_pixel(540, 959).0[..3], [200, 200, 200]);
        assert_eq!(output.get_pixel(540, 960).0[..3], [200, 200, 200]);
        assert!(close(output.get_pixel(540, 958), [20, 200, 20]));
        assert!(close(output.get_pixel(540, 961), [20, 20, 220]));
    }

    #[test]
    fn composition_is_deterministic() {
        let logo = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]));
        let composer = StoryComposer::new(
            CompositionLayout::default(),
            design(),
            StoryAssets {
                font: None,
                logo: Some(logo),
            },
        );
        let a = banded_portrait();
        let b = solid_portrait([20, 20, 220]);
        assert_eq!(composer.compose(&a, &b).unwrap(), composer.compose(&a, &b).unwrap());
    }

    #[test]
    fn logo_is_tinted_white_in_bottom_half_only() {
        let logo = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]));
        let composer = StoryComposer::new(
            CompositionLayout::default(),
            design(),
            StoryAssets {
                font: None,
                logo: Some(logo),
            },
        );
        let output = decode(
            &composer
                .compose(&solid_portrait([20, 20, 220]), &solid_portrait([20, 20, 220]))
                .unwrap(),
        );
        let layout = composer.layout();
        let centre = 40 + layout.logo_size() / 2;
        let bottom_centre = layout.bottom_logo_y() as u32 + layout.logo_size() / 2;
        let logo_pixel = output.get_pixel(centre, bottom_centre);
        assert!(logo_pixel.0[0] > 200 && logo_pixel.0[1] > 200);

        let top_equivalent = bottom_centre - layout.half_height();
        assert!(close(output.get_pixel(centre, top_equivalent), [20, 20, 220]));
    }

    fn system_font() -> Option<rusttype::Font<'static>> {
        crate::compose::assets::GENERIC_FONT_PATHS
            .iter()
            .filter_map(|path| std::fs::read(path).ok())
            .find_map(rusttype::Font::try_from_vec)
    }

    /// Pixels in rows `[y, y + rows)` and columns `columns` matching `predicate`.
    fn count_in_band(
        image: &RgbaImage,
        y: i64,
        rows: u32,
        columns: std::ops::Range<u32>,
        predicate: impl Fn(&Rgba<u8>) -> bool,
    ) -> usize {
        let top = y.max(0) as u32;
        (top..top + rows)
            .flat_map(|row| columns.clone().map(move |column| (column, row)))
            .filter(|&(column, row)| predicate(image.get_pixel(column, row)))
            .count()
    }

    fn labelled_story(
        font: rusttype::Font<'static>,
        design: StoryDesign,
    ) -> (RgbaImage, CompositionLayout) {
        let composer = StoryComposer::new(
            CompositionLayout::default(),
            design,
            StoryAssets {
                font: Some(font),
                logo: None,
            },
        );
        let layout = *composer.layout();
        let gray = solid_portrait([100, 100, 100]);
        (decode(&composer.compose(&gray, &gray).unwrap()), layout)
    }

    #[test]
    fn labels_follow_alignment_and_cast_a_shadow() {
        let Some(font) = system_font() else {
            eprintln!("no system font available; skipping label rendering check");
            return;
        };
        let bright = |pixel: &Rgba<u8>| pixel.0[..3].iter().all(|channel| *channel > 200);
        let shaded = |pixel: &Rgba<u8>| pixel.0[..3].iter().all(|channel| *channel < 92);

        let left_design = design();
        let right_design = StoryDesign {
            top_label: "Today".to_string(),
            bottom_label: "+20 years".to_string(),
            align: TextAlign::Right,
            logo_in_top_half: true,
            logo_file_name: "iceball.png".to_string(),
        };

        for (design, near, far) in [
            (left_design, 40..540, 540..1040),
            (right_design, 540..1040, 40..540),
        ] {
            let logo_in_top_half = design.logo_in_top_half;
            let (output, layout) = labelled_story(font.clone(), design);
            let rows = layout.font_size as u32 + 12;
            for y in [layout.top_label_y(logo_in_top_half), layout.bottom_label_y()] {
                assert!(count_in_band(&output, y, rows, near.clone(), bright) > 20);
                assert_eq!(count_in_band(&output, y, rows, far.clone(), bright), 0);
                assert!(count_in_band(&output, y - 8, rows + 16, near.clone(), shaded) > 0);
                assert_eq!(count_in_band(&output, y - 8, rows + 16, far.clone(), shaded), 0);
            }
        }
    }

    #[test]
    fn frame_is_drawn_inside_the_canvas_edge() {
        let composer = composer_without_assets();
        let output = decode(
            &composer
                .compose(&solid_portrait([0, 0, 0]), &solid_portrait([0, 0, 0]))
                .unwrap(),
        );
        // rgba(200,200,200,0.2) over black.
        assert!(close(output.get_pixel(540, 8), [40, 40, 40]));
        assert_eq!(output.get_pixel(540, 20).0[..3], [0, 0, 0]);
        assert_eq!(output.get_pixel(0, 0).0[..3], [0, 0, 0]);
    }

    #[test]
    fn undecodable_input_is_a_composition_error() {
        let composer = composer_without_assets();
        let err = composer
            .compose(b"definitely not an image", &solid_portrait([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, CompositionError::Decode { which: "top", .. }));

        let err = composer
            .compose(&solid_portrait([1, 2, 3]), &[0u8; 16])
            .unwrap_err();
        assert!(matches!(err, CompositionError::Decode { which: "bottom", .. }));
    }

    #[test]
    fn preview_renders_without_assets() {
        let composer = composer_without_assets();
        let output = decode(&composer.compose_preview().unwrap());
        assert_eq!(output.dimensions(), (1080, 1920));
    }
}
