use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use anyhow::{anyhow, Context, Result as AnyResult};
use log::{debug, info};
use tokio::process::Command;
use crate::config::{HarnessConfig, HwAccel};
use crate::error::{Result, VppError};

/// Lines of stderr kept in a failure report
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg version information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FFmpegVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FFmpegVersion {
    /// `-fps_mode` first shipped in 5.1
    pub fn meets_requirement(&self) -> bool {
        (self.major, self.minor) >= (5, 1)
    }

    /// Parse version from FFmpeg version string
    /// Example: "ffmpeg version 6.1.1" -> FFmpegVersion { major: 6, minor: 1, patch: 1 }
    pub fn parse(version_str: &str) -> AnyResult<Self> {
        let version_part = version_str
            .split_whitespace()
            .find(|s| s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
            .ok_or_else(|| anyhow!("No version number found in: {}", version_str))?;

        // Distro builds append suffixes like "6.1.1-3ubuntu5"
        let numeric = version_part
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or(version_part);
        let mut parts = numeric.split('.').filter(|p| !p.is_empty());

        let major = parts
            .next()
            .ok_or_else(|| anyhow!("Invalid version format: {}", version_str))?
            .parse::<u32>()
            .with_context(|| format!("Failed to parse major version from: {}", version_part))?;
        let minor = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .with_context(|| format!("Failed to parse minor version from: {}", p))?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .with_context(|| format!("Failed to parse patch version from: {}", p))?,
            None => 0,
        };

        Ok(FFmpegVersion { major, minor, patch })
    }
}

/// One fully assembled ffmpeg call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub hwaccel: HwAccel,
    pub hw_device: String,
    pub verbosity: String,
    pub input_args: Vec<String>,
    pub output_args: Vec<String>,
    /// File the output args write to
    pub artifact: PathBuf,
}

impl Invocation {
    /// Full argument vector: fixed hardware selectors, then input, then output options
    pub fn args(&self) -> Vec<String> {
        let accel = self.hwaccel.as_str();
        let mut args = vec![
            "-hwaccel".to_string(),
            accel.to_string(),
            "-init_hw_device".to_string(),
            format!("{}=hw:{}", accel, self.hw_device),
            "-hwaccel_output_format".to_string(),
            accel.to_string(),
            "-filter_hw_device".to_string(),
            "hw".to_string(),
            "-v".to_string(),
            self.verbosity.clone(),
        ];
        args.extend(self.input_args.iter().cloned());
        args.extend(self.output_args.iter().cloned());
        args
    }
}

/// Runs one invocation of the external transcoding tool to completion
#[allow(async_fn_in_trait)]
pub trait Transcoder {
    async fn transcode(&self, invocation: &Invocation) -> Result<()>;
}

/// Spawns the ffmpeg binary directly
#[derive(Debug, Clone)]
pub struct FFmpegRunner {
    pub ffmpeg_bin: PathBuf,
}

impl FFmpegRunner {
    pub fn new(config: &HarnessConfig) -> Self {
        FFmpegRunner { ffmpeg_bin: config.ffmpeg_bin.clone() }
    }

    /// Detect FFmpeg version
    pub async fn detect_version(&self) -> AnyResult<FFmpegVersion> {
        detect_version(&self.ffmpeg_bin).await
    }
}

async fn detect_version(ffmpeg_bin: &Path) -> AnyResult<FFmpegVersion> {
    let output = Command::new(ffmpeg_bin)
        .arg("-version")
        .output()
        .await
        .with_context(|| format!("Failed to execute FFmpeg at: {}", ffmpeg_bin.display()))?;

    if !output.status.success() {
        return Err(anyhow!("FFmpeg version check failed"));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout
        .lines()
        .next()
        .ok_or_else(|| anyhow!("Empty output from FFmpeg -version"))?;

    FFmpegVersion::parse(first_line)
}

impl Transcoder for FFmpegRunner {
    async fn transcode(&self, invocation: &Invocation) -> Result<()> {
        let args = invocation.args();
        let artifact = invocation.artifact.display().to_string();
        debug!("Executing FFmpeg: {} {}", self.ffmpeg_bin.display(), args.join(" "));

        let started = Instant::now();
        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| VppError::ToolInvocation {
                artifact: artifact.clone(),
                exit_code: None,
                stderr: format!("failed to spawn {}: {}", self.ffmpeg_bin.display(), e),
            })?;
        let elapsed = started.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VppError::ToolInvocation {
                artifact,
                exit_code: output.status.code(),
                stderr: stderr_tail(&stderr),
            });
        }

        info!("ffmpeg:vpp {} finished in {}", artifact, format_elapsed(elapsed));
        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn format_elapsed(d: Duration) -> String {
    format!("{:.2}s", d.as_secs_f64())
}
