use crate::core::error::{DissectError, DissectResult};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_BUFFER_SIZE: usize = 65535;
pub const DEFAULT_MAX_REASSEMBLY_FRAMES: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub capture: CaptureConfig,
    pub dissection: DissectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    // 未指定の場合は起動時に選択する
    pub interface: Option<String>,
    pub buffer_size: usize,
    pub promiscuous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DissectionConfig {
    // 1パケットとして再構築するフレーム数の上限
    pub max_reassembly_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn level_filter(&self) -> DissectResult<LevelFilter> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| DissectError::Config(format!("無効なログレベル: {}", self.level)))
    }
}

impl Default for DissectionConfig {
    fn default() -> Self {
        Self {
            max_reassembly_frames: DEFAULT_MAX_REASSEMBLY_FRAMES,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> DissectResult<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| DissectError::Config(format!("{} の値が不正です ({}): {}", name, value, e))),
        None => Ok(default),
    }
}

impl Configuration {
    pub fn from_env() -> DissectResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DissectResult<Self> {
        let max_reassembly_frames = parse_var(
            &lookup,
            "MAX_REASSEMBLY_FRAMES",
            DEFAULT_MAX_REASSEMBLY_FRAMES,
        )?;
        if max_reassembly_frames == 0 {
            return Err(DissectError::Config(
                "MAX_REASSEMBLY_FRAMES は1以上である必要があります".to_string(),
            ));
        }

        let config = Configuration {
            capture: CaptureConfig {
                interface: lookup("CAPTURE_INTERFACE").filter(|name| !name.trim().is_empty()),
                buffer_size: parse_var(&lookup, "CAPTURE_BUFFER_SIZE", DEFAULT_BUFFER_SIZE)?,
                promiscuous: parse_var(&lookup, "CAPTURE_PROMISCUOUS", true)?,
            },
            dissection: DissectionConfig {
                max_reassembly_frames,
            },
            logging: LoggingConfig {
                level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                file: lookup("LOG_FILE").filter(|path| !path.trim().is_empty()),
            },
        };
        config.logging.level_filter()?;

        Ok(config)
    }
}
