use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use rusttype::Font;
use tracing::{info, warn};

const INTER_FONT_FILE: &str = "Inter-VariableFont_opsz,wght.ttf";

pub(crate) const GENERIC_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font and logo used by the story composer. Either may be absent.
pub struct StoryAssets {
    pub font: Option<Font<'static>>,
    pub logo: Option<RgbaImage>,
}

impl StoryAssets {
    pub fn none() -> Self {
        Self {
            font: None,
            logo: None,
        }
    }

    pub fn discover(
        font_override: Option<&Path>,
        logo_override: Option<&Path>,
        logo_file_name: &str,
    ) -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let font = load_first_font(&font_candidates(&root, font_override));
        let logo = load_first_logo(&logo_candidates(&root, logo_override, logo_file_name));
        Self { font, logo }
    }
}

fn font_candidates(root: &Path, font_override: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = font_override {
        candidates.push(path.to_path_buf());
    }
    candidates.push(root.join("public").join("fonts").join(INTER_FONT_FILE));
    candidates.push(
        root.join(".next")
            .join("static")
            .join("fonts")
            .join(INTER_FONT_FILE),
    );
    candidates.push(root.join("assets").join("fonts").join(INTER_FONT_FILE));
    candidates.push(root.join("assets").join("fonts").join("Inter-Regular.ttf"));
    candidates.extend(GENERIC_FONT_PATHS.iter().map(PathBuf::from));
    candidates
}

fn logo_candidates(root: &Path, logo_override: Option<&Path>, logo_file_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = logo_override {
        candidates.push(path.to_path_buf());
    }
    candidates.push(root.join("public").join(logo_file_name));
    candidates.push(root.join("assets").join(logo_file_name));
    candidates
}

fn load_first_font(candidates: &[PathBuf]) -> Option<Font<'static>> {
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match fs::read(path) {
            Ok(bytes) => match Font::try_from_vec(bytes) {
                Some(font) => {
                    info!("Story font loaded from {}", path.display());
                    return Some(font);
                }
                None => warn!("Font file {} could not be parsed", path.display()),
            },
            Err(err) => warn!("Failed to read font file {}: {}", path.display(), err),
        }
    }
    warn!("No usable font found; story labels will be skipped");
    None
}

fn load_first_logo(candidates: &[PathBuf]) -> Option<RgbaImage> {
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match image::open(path) {
            Ok(logo) => {
                info!("Story logo loaded from {}", path.display());
                return Some(logo.to_rgba8());
            }
            Err(err) => warn!("Could not load logo {}: {}", path.display(), err),
        }
    }
    warn!("No logo asset found; story will be rendered without brand mark");
    None
}
