use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use crate::config::is_toml;
use crate::error::{Result, VppError};
use crate::format::{map_format, FormatNegotiator};
use crate::metric::MetricSpec;
use crate::operation::Operation;

/// Formats an operation accepts on input and produces on output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub ifmts: BTreeSet<String>,
    #[serde(default)]
    pub ofmts: BTreeSet<String>,
}

/// Raw r2r setting as written in the case file.
///
/// Anything that is not an integer lands in `Other` so it can be rejected as
/// a configuration error instead of failing the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum R2rValue {
    Count(i64),
    Other(serde_json::Value),
}

/// One VPP trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Optional label (usually the source clip) prefixed to the artifact name
    #[serde(default)]
    pub case: Option<String>,
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Logical pixel format of the source
    pub format: String,
    #[serde(default = "default_frames")]
    pub frames: u32,
    pub operation: Operation,
    #[serde(default)]
    pub caps: Capabilities,
    #[serde(default)]
    pub r2r: Option<R2rValue>,
    #[serde(default)]
    pub metric: MetricSpec,
}

fn default_frames() -> u32 {
    1
}

impl TestCase {
    /// Validated repeat count: `None` for a single run, `Some(n)` with n > 1 for r2r
    pub fn r2r_count(&self) -> Result<Option<u32>> {
        match &self.r2r {
            None => Ok(None),
            Some(R2rValue::Count(n)) if *n > 1 => u32::try_from(*n).map(Some).map_err(|_| {
                VppError::InvalidConfiguration(format!("r2r value {} out of range", n))
            }),
            Some(R2rValue::Count(n)) => Err(VppError::InvalidConfiguration(format!(
                "invalid r2r value {}: must be an integer > 1",
                n
            ))),
            Some(R2rValue::Other(v)) => Err(VppError::InvalidConfiguration(format!(
                "invalid r2r value {}: must be an integer > 1",
                v
            ))),
        }
    }
}

/// Formats resolved for one case, produced once by negotiation and read-only afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormats {
    pub input_format: String,
    pub output_format: String,
    /// Software pixel format of the raw source (`-pix_fmt` on both ends)
    pub mformat: &'static str,
    pub hw_input_format: &'static str,
    pub hw_output_format: &'static str,
    /// Canvas size for composite operations
    pub output_dimensions: Option<(u32, u32)>,
}

impl ResolvedFormats {
    /// Negotiate every format the case needs. Unresolved formats surface as
    /// `UnsupportedFormat`.
    pub fn negotiate(case: &TestCase) -> Result<Self> {
        let mformat = map_format(&case.format)
            .ok_or_else(|| VppError::UnsupportedFormat(format!("ffmpeg.{}", case.format)))?;

        let input_format = case.format.clone();
        let output_format = case.operation.output_format(&case.format).to_string();

        let negotiator = FormatNegotiator::new(case.operation.negotiation());
        let hw_input_format = negotiator
            .resolve_hardware_format(&input_format, &case.caps.ifmts)
            .ok_or_else(|| VppError::UnsupportedFormat(input_format.clone()))?;
        let hw_output_format = negotiator
            .resolve_hardware_format(&output_format, &case.caps.ofmts)
            .ok_or_else(|| VppError::UnsupportedFormat(output_format.clone()))?;

        let output_dimensions = match &case.operation {
            Operation::Composite(p) => Some(p.output_dimensions(case.width, case.height)?),
            _ => None,
        };

        Ok(ResolvedFormats {
            input_format,
            output_format,
            mformat,
            hw_input_format,
            hw_output_format,
            output_dimensions,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    cases: Vec<TestCase>,
}

/// Load test cases from a JSON or TOML case file
pub fn load_cases(path: &Path) -> AnyResult<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read case file: {}", path.display()))?;

    let file: CaseFile = if is_toml(path) {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML case file: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON case file: {}", path.display()))?
    };

    Ok(file.cases)
}
