//! Report configuration with defaults and optional JSON overrides

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Countries making up the South Asian region of the dataset.
pub const SOUTH_ASIA: [&str; 9] = [
    "India",
    "Afghanistan",
    "Pakistan",
    "Bangladesh",
    "Sri Lanka",
    "Bhutan",
    "Maldives",
    "Nepal",
    "Mauritius",
];

/// Image encoding used for rendered charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

/// Settings shared by the loader, the aggregator and the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Countries kept when loading; rows from anywhere else are dropped
    pub region: Vec<String>,

    /// Number of perpetrator groups shown in the share chart
    pub top_perpetrators: usize,

    /// Chart canvas width in pixels
    pub chart_width: u32,

    /// Chart canvas height in pixels
    pub chart_height: u32,

    /// Caption font size
    pub caption_size: u32,

    /// Encoding for files written by `report`
    pub image_format: ImageFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            region: SOUTH_ASIA.iter().map(|c| c.to_string()).collect(),
            top_perpetrators: 10,
            chart_width: 1000,
            chart_height: 700,
            caption_size: 26,
            image_format: ImageFormat::Png,
        }
    }
}

impl ReportConfig {
    /// Read a config file; absent keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: ReportConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        if config.region.is_empty() {
            anyhow::bail!("config file {} declares an empty region", path.display());
        }
        Ok(config)
    }

    pub fn chart_size(&self) -> (u32, u32) {
        (self.chart_width, self.chart_height)
    }

    /// Exact, case-sensitive match against the configured region.
    pub fn in_region(&self, country: &str) -> bool {
        self.region.iter().any(|c| c == country)
    }
}
