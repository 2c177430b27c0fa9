//! Daemon configuration.
//!
//! Loaded from an optional TOML file named by `BELTWATCH_CONFIG`, then
//! overridden by `BELTWATCH_*` environment variables, then validated.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::count::CountingPolicy;
use crate::detect::InferenceOptions;
use crate::ingest::VideoOrigin;
use crate::pipeline::PipelineSettings;

const DEFAULT_SOURCE: &str = "stub://line_camera";
const DEFAULT_DB_PATH: &str = "beltwatch.db";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_FRAME_SKIP: u32 = 1;
const DEFAULT_LINE_FRACTION: f32 = 0.35;
const DEFAULT_DAMAGED_THRESHOLD: u32 = 10;

#[derive(Debug, Deserialize, Default)]
struct BeltwatchConfigFile {
    source: Option<String>,
    model_path: Option<String>,
    db_path: Option<String>,
    detection: Option<DetectionConfigFile>,
    counting: Option<CountingConfigFile>,
    alarm: Option<AlarmConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    agnostic_nms: Option<bool>,
    frame_skip: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CountingConfigFile {
    policy: Option<String>,
    line_fraction: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlarmConfigFile {
    consecutive_damaged_threshold: Option<u32>,
    pause_on_alarm: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BeltwatchConfig {
    pub source: VideoOrigin,
    pub model_path: Option<String>,
    pub db_path: String,
    pub confidence_threshold: f32,
    pub agnostic_nms: bool,
    pub frame_skip: u32,
    pub counting_policy: CountingPolicy,
    pub line_fraction: f32,
    pub consecutive_damaged_threshold: u32,
    pub pause_on_alarm: bool,
}

impl BeltwatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BELTWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BeltwatchConfigFile) -> Result<Self> {
        let source = file
            .source
            .as_deref()
            .unwrap_or(DEFAULT_SOURCE)
            .parse::<VideoOrigin>()?;
        let counting_policy = file
            .counting
            .as_ref()
            .and_then(|counting| counting.policy.as_deref())
            .unwrap_or(CountingPolicy::LineCrossing.as_str())
            .parse::<CountingPolicy>()?;
        Ok(Self {
            source,
            model_path: file.model_path,
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            confidence_threshold: file
                .detection
                .as_ref()
                .and_then(|detection| detection.confidence_threshold)
                .unwrap_or(DEFAULT_CONFIDENCE),
            agnostic_nms: file
                .detection
                .as_ref()
                .and_then(|detection| detection.agnostic_nms)
                .unwrap_or(false),
            frame_skip: file
                .detection
                .as_ref()
                .and_then(|detection| detection.frame_skip)
                .unwrap_or(DEFAULT_FRAME_SKIP),
            counting_policy,
            line_fraction: file
                .counting
                .as_ref()
                .and_then(|counting| counting.line_fraction)
                .unwrap_or(DEFAULT_LINE_FRACTION),
            consecutive_damaged_threshold: file
                .alarm
                .as_ref()
                .and_then(|alarm| alarm.consecutive_damaged_threshold)
                .unwrap_or(DEFAULT_DAMAGED_THRESHOLD),
            pause_on_alarm: file
                .alarm
                .as_ref()
                .and_then(|alarm| alarm.pause_on_alarm)
                .unwrap_or(false),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("BELTWATCH_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source.parse()?;
            }
        }
        if let Ok(path) = std::env::var("BELTWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(path);
            }
        }
        if let Ok(path) = std::env::var("BELTWATCH_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(threshold) = std::env::var("BELTWATCH_CONFIDENCE") {
            self.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("BELTWATCH_CONFIDENCE must be a number"))?;
        }
        if let Ok(skip) = std::env::var("BELTWATCH_FRAME_SKIP") {
            self.frame_skip = skip
                .parse()
                .map_err(|_| anyhow!("BELTWATCH_FRAME_SKIP must be a positive integer"))?;
        }
        if let Ok(policy) = std::env::var("BELTWATCH_COUNTING_POLICY") {
            self.counting_policy = policy.parse()?;
        }
        if let Ok(fraction) = std::env::var("BELTWATCH_LINE_FRACTION") {
            self.line_fraction = fraction
                .parse()
                .map_err(|_| anyhow!("BELTWATCH_LINE_FRACTION must be a number"))?;
        }
        if let Ok(threshold) = std::env::var("BELTWATCH_DAMAGED_THRESHOLD") {
            self.consecutive_damaged_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("BELTWATCH_DAMAGED_THRESHOLD must be a positive integer"))?;
        }
        if let Ok(pause) = std::env::var("BELTWATCH_PAUSE_ON_ALARM") {
            self.pause_on_alarm = pause
                .parse()
                .map_err(|_| anyhow!("BELTWATCH_PAUSE_ON_ALARM must be true or false"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(anyhow!(
                "confidence threshold must be in (0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.frame_skip == 0 {
            return Err(anyhow!("frame skip must be at least 1"));
        }
        if !(self.line_fraction > 0.0 && self.line_fraction < 1.0) {
            return Err(anyhow!(
                "line fraction must be in (0, 1), got {}",
                self.line_fraction
            ));
        }
        if self.consecutive_damaged_threshold == 0 {
            return Err(anyhow!("consecutive damaged threshold must be at least 1"));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            inference: InferenceOptions {
                confidence_threshold: self.confidence_threshold,
                agnostic_nms: self.agnostic_nms,
            },
            frame_skip: self.frame_skip,
            counting_policy: self.counting_policy,
            line_fraction: self.line_fraction,
            consecutive_damaged_threshold: self.consecutive_damaged_threshold,
            pause_on_alarm: self.pause_on_alarm,
        }
    }
}

fn read_config_file(path: &Path) -> Result<BeltwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
}
