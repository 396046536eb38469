use crate::compose::{StoryDesign, TextAlign};

/// Which micro-site this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Campaign {
    /// Skincare "without / with" pair plus a composed story image, answered as JSON.
    Collamin,
    /// Single aged portrait, answered as raw image bytes.
    IceBall,
}

impl Campaign {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collamin" | "shelftalker" | "collamin-shelftalker" => Some(Campaign::Collamin),
            "iceball" | "ice-ball" | "iceball-winter-portrait" => Some(Campaign::IceBall),
            _ => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Campaign::Collamin => "collamin",
            Campaign::IceBall => "iceball",
        }
    }

    /// Identifier reported by the health route.
    pub fn service_name(&self) -> &'static str {
        match self {
            Campaign::Collamin => "collamin-shelftalker",
            Campaign::IceBall => "iceball-winter-portrait",
        }
    }

    pub fn composes_story(&self) -> bool {
        matches!(self, Campaign::Collamin)
    }

    pub fn returns_raw_image(&self) -> bool {
        matches!(self, Campaign::IceBall)
    }

    pub fn design(&self) -> StoryDesign {
        match self {
            Campaign::Collamin => StoryDesign {
                top_label: "Without".to_string(),
                bottom_label: "With".to_string(),
                align: TextAlign::Left,
                logo_in_top_half: false,
                logo_file_name: "collamin.png".to_string(),
            },
            Campaign::IceBall => StoryDesign {
                top_label: "Today".to_string(),
                bottom_label: "+20 years".to_string(),
                align: TextAlign::Right,
                logo_in_top_half: true,
                logo_file_name: "iceball.png".to_string(),
            },
        }
    }
}
