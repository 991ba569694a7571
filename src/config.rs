use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::ingest::{ChromaLayout, SourceConfig};

const DEFAULT_SOURCE_URL: &str = "stub://camera0";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_PREVIEW_WIDTH: u32 = 640;
const DEFAULT_PREVIEW_HEIGHT: u32 = 480;
const DEFAULT_ROW_PADDING: usize = 32;
const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_SENSOR_ORIENTATION: i32 = 90;
const DEFAULT_SCREEN_ROTATION: i32 = 0;

#[derive(Debug, Deserialize, Default)]
struct ClassifydConfigFile {
    source: Option<SourceConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    orientation: Option<OrientationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    row_padding: Option<usize>,
    semi_planar: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    input_size: Option<u32>,
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct OrientationConfigFile {
    sensor: Option<i32>,
    screen: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ClassifydConfig {
    pub source: SourceConfig,
    pub classifier: ClassifierSettings,
    pub orientation: OrientationSettings,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub input_size: u32,
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct OrientationSettings {
    pub sensor_degrees: i32,
    pub screen_degrees: i32,
}

impl ClassifydConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LIVE_CLASSIFY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ClassifydConfigFile) -> Self {
        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            width: source_file.width.unwrap_or(DEFAULT_PREVIEW_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_PREVIEW_HEIGHT),
            row_padding: source_file.row_padding.unwrap_or(DEFAULT_ROW_PADDING),
            chroma: if source_file.semi_planar.unwrap_or(false) {
                ChromaLayout::SemiPlanar
            } else {
                ChromaLayout::Planar
            },
            ..SourceConfig::default()
        };
        let classifier_file = file.classifier.unwrap_or_default();
        let classifier = ClassifierSettings {
            input_size: classifier_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            top_k: classifier_file.top_k.unwrap_or(DEFAULT_TOP_K),
        };
        let orientation_file = file.orientation.unwrap_or_default();
        let orientation = OrientationSettings {
            sensor_degrees: orientation_file
                .sensor
                .unwrap_or(DEFAULT_SENSOR_ORIENTATION),
            screen_degrees: orientation_file.screen.unwrap_or(DEFAULT_SCREEN_ROTATION),
        };
        Self {
            source,
            classifier,
            orientation,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("LIVE_CLASSIFY_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(size) = std::env::var("LIVE_CLASSIFY_INPUT_SIZE") {
            self.classifier.input_size = size
                .trim()
                .parse()
                .map_err(|_| anyhow!("LIVE_CLASSIFY_INPUT_SIZE must be a positive integer"))?;
        }
        if let Ok(sensor) = std::env::var("LIVE_CLASSIFY_SENSOR_ORIENTATION") {
            self.orientation.sensor_degrees = sensor.trim().parse().map_err(|_| {
                anyhow!("LIVE_CLASSIFY_SENSOR_ORIENTATION must be an integer number of degrees")
            })?;
        }
        if let Ok(screen) = std::env::var("LIVE_CLASSIFY_SCREEN_ROTATION") {
            self.orientation.screen_degrees = screen.trim().parse().map_err(|_| {
                anyhow!("LIVE_CLASSIFY_SCREEN_ROTATION must be an integer number of degrees")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "preview size must be non-zero, got {}x{}",
                self.source.width,
                self.source.height
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        if self.classifier.input_size == 0 {
            return Err(anyhow!("classifier input_size must be greater than zero"));
        }
        for (name, degrees) in [
            ("sensor orientation", self.orientation.sensor_degrees),
            ("screen rotation", self.orientation.screen_degrees),
        ] {
            if ![0, 90, 180, 270].contains(&degrees) {
                return Err(anyhow!(
                    "{} must be one of 0, 90, 180, 270 (got {})",
                    name,
                    degrees
                ));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ClassifydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
