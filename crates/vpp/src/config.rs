use std::fmt;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Hardware acceleration API used for processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccel {
    Vaapi,
    Qsv,
}

impl HwAccel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HwAccel::Vaapi => "vaapi",
            HwAccel::Qsv => "qsv",
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the VPP conformance harness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// ffmpeg binary to invoke (PATH lookup when not absolute)
    pub ffmpeg_bin: PathBuf,
    /// Acceleration API passed to -hwaccel and -init_hw_device
    pub hwaccel: HwAccel,
    /// Render node (or adapter index) backing the hardware device
    pub hw_device: String,
    /// ffmpeg log level passed through -v
    pub verbosity: String,
    /// Directory where transient .yuv artifacts are written
    pub artifact_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl HarnessConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            hwaccel: HwAccel::Vaapi,
            hw_device: "/dev/dri/renderD128".to_string(),
            verbosity: "verbose".to_string(),
            artifact_dir: PathBuf::from("/tmp/vpp-artifacts"),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                config = if is_toml(config_path) {
                    toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?
                } else {
                    serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?
                };
            }
        }

        Ok(config)
    }
}

pub(crate) fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}
