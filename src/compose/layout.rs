use image::Rgba;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
}

/// Campaign-specific parts of the story design: copy, anchoring and logo placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDesign {
    pub top_label: String,
    pub bottom_label: String,
    pub align: TextAlign,
    pub logo_in_top_half: bool,
    pub logo_file_name: String,
}

/// Fixed geometry and palette of the story canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionLayout {
    pub width: u32,
    pub height: u32,
    pub background: Rgba<u8>,
    pub divider_color: Rgba<u8>,
    pub divider_thickness: u32,
    pub overlay_padding: u32,
    pub font_size: f32,
    pub label_color: Rgba<u8>,
    pub label_shadow: ShadowStyle,
    pub logo_width_ratio: f32,
    pub logo_tint: Rgba<u8>,
    pub logo_shadow: ShadowStyle,
    pub frame_inset: u32,
    pub frame_radius: u32,
    pub frame_color: Rgba<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    pub color: Rgba<u8>,
    pub blur: f32,
    pub offset_y: i32,
}

impl Default for CompositionLayout {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            background: Rgba([245, 250, 250, 255]),
            divider_color: Rgba([200, 200, 200, 255]),
            divider_thickness: 2,
            overlay_padding: 40,
            font_size: 38.0,
            label_color: Rgba([255, 255, 255, 242]),
            label_shadow: ShadowStyle {
                color: Rgba([0, 0, 0, 128]),
                blur: 8.0,
                offset_y: 2,
            },
            logo_width_ratio: 0.22,
            logo_tint: Rgba([255, 255, 255, 230]),
            logo_shadow: ShadowStyle {
                color: Rgba([0, 0, 0, 102]),
                blur: 16.0,
                offset_y: 4,
            },
            frame_inset: 8,
            frame_radius: 20,
            frame_color: Rgba([200, 200, 200, 51]),
        }
    }
}

impl CompositionLayout {
    pub fn half_height(&self) -> u32 {
        self.height / 2
    }

    pub fn logo_size(&self) -> u32 {
        (self.width as f32 * self.logo_width_ratio).round() as u32
    }

    /// First row of the divider; the band is centred on the split.
    pub fn divider_top(&self) -> u32 {
        self.half_height()
            .saturating_sub(self.divider_thickness / 2)
    }

    pub fn bottom_logo_y(&self) -> i64 {
        self.height as i64 - self.overlay_padding as i64 - self.logo_size() as i64
    }

    pub fn top_logo_y(&self) -> i64 {
        self.half_height() as i64 - self.overlay_padding as i64 - self.logo_size() as i64
    }

    pub fn top_label_y(&self, logo_in_top_half: bool) -> i64 {
        if logo_in_top_half {
            self.top_logo_y() - self.font_size as i64 - 20
        } else {
            self.half_height() as i64 - self.overlay_padding as i64 - self.font_size as i64 - 10
        }
    }

    pub fn bottom_label_y(&self) -> i64 {
        self.bottom_logo_y() - self.font_size as i64 - 20
    }

    /// Left edge of an element of `element_width` anchored per `align`.
    pub fn anchored_x(&self, align: TextAlign, element_width: u32) -> i64 {
        match align {
            TextAlign::Left => self.overlay_padding as i64,
            TextAlign::Right => {
                self.width as i64 - self.overlay_padding as i64 - element_width as i64
            }
        }
    }
}
