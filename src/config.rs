use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;
use url::Url;

use crate::pipeline::Campaign;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub bind_addr: String,
    pub campaign: Campaign,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_image_model: String,
    pub generation_timeout_seconds: u64,
    pub stats_file: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub public_base_url: String,
    pub reference_asset_path: String,
    pub font_path: Option<PathBuf>,
    pub logo_path: Option<PathBuf>,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn normalize_campaign(value: &str) -> Campaign {
    match Campaign::parse(value) {
        Some(campaign) => campaign,
        None => {
            warn!(
                "Unknown CAMPAIGN value '{}'; defaulting to {}.",
                value,
                Campaign::Collamin.slug()
            );
            Campaign::Collamin
        }
    }
}

fn normalize_base_url(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        // GEMINI_API_KEY is checked per request so the health and stats routes
        // stay up without a credential.
        let generation_timeout_seconds = env_u64("GENERATION_TIMEOUT_SECONDS", 60).max(1);

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_path("LOG_DIR").unwrap_or_else(|| PathBuf::from("logs")),
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:3000"),
            campaign: normalize_campaign(&env_string("CAMPAIGN", "collamin")),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_api_base: normalize_base_url(env_string(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com",
            )),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            generation_timeout_seconds,
            stats_file: env_path("STATS_FILE"),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            public_base_url: normalize_base_url(env_string("PUBLIC_BASE_URL", "")),
            reference_asset_path: env_string("REFERENCE_ASSET_PATH", "").trim().to_string(),
            font_path: env_path("FONT_PATH"),
            logo_path: env_path("LOGO_PATH"),
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }

    /// Full URL of the reference image forwarded as a second attachment, if configured.
    pub fn reference_asset_url(&self) -> Option<String> {
        if self.public_base_url.is_empty() || self.reference_asset_path.is_empty() {
            return None;
        }
        let path = self.reference_asset_path.trim_start_matches('/');
        match Url::parse(&format!("{}/", self.public_base_url)).and_then(|base| base.join(path)) {
            Ok(url) => Some(url.to_string()),
            Err(err) => {
                warn!(
                    "Ignoring reference asset: invalid PUBLIC_BASE_URL '{}': {}",
                    self.public_base_url, err
                );
                None
            }
        }
    }
}

pub const AGING_PROMPT: &str = r#"You are given a real human portrait photo.

Your task is to age the SAME person exactly 20 years older.

CRITICAL RULES:
- Do NOT change facial identity in any way.
- Do NOT alter face shape, bone structure, eye shape, nose, lips, or proportions.
- Do NOT beautify, stylize, or exaggerate aging.
- Do NOT change hairstyle, hairline, hair color, beard, makeup, or clothing.
- Do NOT add or remove facial features.
- Do NOT change camera angle, framing, or expression.

AGING REQUIREMENTS:
- Apply realistic, natural aging consistent with +20 years:
  - Subtle wrinkles (forehead, eyes, smile lines)
  - Slight skin texture changes
  - Mild loss of skin elasticity
  - Very natural aging signs only
- Aging must look medically realistic, not cinematic or dramatic.

IMAGE STYLE:
- Professional studio portrait
- Clean, neutral background (light gray or soft off-white)
- Even, soft lighting
- High realism, no filters, no artistic effects
- Photographic, clinical accuracy

OUTPUT:
- One final image
- Ultra-realistic
- The person must be immediately recognizable as the same individual"#;

pub const WITHOUT_SKINCARE_PROMPT: &str = r#"You are given a real human portrait photo.

Show the SAME person 15 years from now WITHOUT any skincare or collagen routine.

CRITICAL RULES:
- Keep facial identity, face shape, hairstyle, clothing, framing and expression unchanged.
- Do NOT stylize, cartoonize or dramatize.

AGING REQUIREMENTS:
- Visible but natural signs of unmanaged skin aging:
  - Deeper forehead lines and crow's feet
  - Loss of firmness along the jawline and cheeks
  - Duller, uneven skin tone and texture
- Must stay medically plausible, never grotesque.

IMAGE STYLE:
- Professional studio portrait, neutral light background, soft even lighting
- Photographic realism, no filters

OUTPUT:
- One final image
- The person must be immediately recognizable as the same individual"#;

pub const WITH_SKINCARE_PROMPT: &str = r#"You are given a real human portrait photo.

Show the SAME person 15 years from now after a consistent daily collagen and skincare routine.

CRITICAL RULES:
- Keep facial identity, face shape, hairstyle, clothing, framing and expression unchanged.
- Do NOT de-age the person; they must still look 15 years older.
- Do NOT beautify beyond what a healthy routine plausibly achieves.

AGING REQUIREMENTS:
- Graceful, well-cared-for aging:
  - Only fine, soft lines
  - Firm, hydrated skin with preserved elasticity
  - Even, radiant skin tone
- Must stay medically plausible.

IMAGE STYLE:
- Professional studio portrait, neutral light background, soft even lighting
- Photographic realism, no filters

OUTPUT:
- One final image
- The person must be immediately recognizable as the same individual"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            bind_addr: "127.0.0.1:0".to_string(),
            campaign: Campaign::Collamin,
            gemini_api_key: String::new(),
            gemini_api_base: "https://example.test".to_string(),
            gemini_image_model: "model".to_string(),
            generation_timeout_seconds: 60,
            stats_file: None,
            max_upload_bytes: 1024,
            public_base_url: String::new(),
            reference_asset_path: String::new(),
            font_path: None,
            logo_path: None,
        }
    }

    #[test]
    fn reference_asset_url_requires_both_parts() {
        let mut config = sample_config();
        assert_eq!(config.reference_asset_url(), None);

        config.public_base_url = normalize_base_url("https://site.test/".to_string());
        assert_eq!(config.reference_asset_url(), None);

        config.reference_asset_path = "/iceball.png".to_string();
        assert_eq!(
            config.reference_asset_url().as_deref(),
            Some("https://site.test/iceball.png")
        );

        config.public_base_url = "not a url".to_string();
        assert_eq!(config.reference_asset_url(), None);
    }

    #[test]
    fn unknown_campaign_falls_back_to_collamin() {
        assert_eq!(normalize_campaign("ICEBALL"), Campaign::IceBall);
        assert_eq!(normalize_campaign("something-else"), Campaign::Collamin);
    }
}
