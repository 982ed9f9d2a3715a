use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use crate::error::{Result, VppError};

/// How an artifact is fingerprinted and what it is expected to equal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricSpec {
    Md5 {
        /// Hash only the first `numbytes` bytes; whole file when absent
        #[serde(default)]
        numbytes: Option<u64>,
        /// Reference checksum for single-run cases
        #[serde(default)]
        expect: Option<String>,
    },
}

impl Default for MetricSpec {
    fn default() -> Self {
        MetricSpec::Md5 { numbytes: None, expect: None }
    }
}

impl MetricSpec {
    pub fn expect(&self) -> Option<&str> {
        match self {
            MetricSpec::Md5 { expect, .. } => expect.as_deref(),
        }
    }
}

/// Content check over produced artifacts.
///
/// `update` fingerprints an artifact, `check` compares the latest fingerprint
/// against the expectation.
pub trait Metric {
    fn update(&mut self, artifact: &Path) -> Result<()>;
    fn actual(&self) -> Option<&str>;
    fn set_expect(&mut self, expect: String);
    fn check(&self) -> Result<()>;
}

/// Builds metrics from case specs
pub trait MetricFactory {
    fn create(&self, spec: &MetricSpec) -> Box<dyn Metric>;
}

/// Default factory backed by [`Md5Metric`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMetrics;

impl MetricFactory for DefaultMetrics {
    fn create(&self, spec: &MetricSpec) -> Box<dyn Metric> {
        match spec {
            MetricSpec::Md5 { numbytes, expect } => Box::new(Md5Metric {
                numbytes: *numbytes,
                expect: expect.clone(),
                actual: None,
                artifact: None,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Md5Metric {
    numbytes: Option<u64>,
    expect: Option<String>,
    actual: Option<String>,
    artifact: Option<PathBuf>,
}

impl Metric for Md5Metric {
    fn update(&mut self, artifact: &Path) -> Result<()> {
        let file = File::open(artifact).map_err(|e| VppError::io(artifact, e))?;
        let mut reader: Box<dyn Read> = match self.numbytes {
            Some(n) => Box::new(BufReader::new(file).take(n)),
            None => Box::new(BufReader::new(file)),
        };

        let mut hasher = Md5::new();
        io::copy(&mut reader, &mut hasher).map_err(|e| VppError::io(artifact, e))?;
        self.actual = Some(format!("{:x}", hasher.finalize()));
        self.artifact = Some(artifact.to_path_buf());
        Ok(())
    }

    fn actual(&self) -> Option<&str> {
        self.actual.as_deref()
    }

    fn set_expect(&mut self, expect: String) {
        self.expect = Some(expect);
    }

    fn check(&self) -> Result<()> {
        let artifact = self.artifact.clone().unwrap_or_default();
        let (Some(expected), Some(actual)) = (&self.expect, &self.actual) else {
            return Err(VppError::InvalidConfiguration(format!(
                "md5 check of {} without {}",
                artifact.display(),
                if self.actual.is_none() { "an update" } else { "an expected value" }
            )));
        };

        if !expected.eq_ignore_ascii_case(actual) {
            return Err(VppError::ContentMismatch {
                artifact,
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
        Ok(())
    }
}
