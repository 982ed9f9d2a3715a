pub mod config;
pub mod error;
pub mod format;
pub mod operation;
pub mod case;
pub mod command;
pub mod ffmpeg;
pub mod metric;
pub mod artifact;
pub mod report;
pub mod orchestrator;

pub use config::{HarnessConfig, HwAccel};
pub use error::VppError;
pub use case::{Capabilities, ResolvedFormats, TestCase};
pub use command::{CommandSynthesizer, Synthesized};
pub use ffmpeg::{FFmpegRunner, Invocation, Transcoder};
pub use metric::{DefaultMetrics, Metric, MetricFactory, MetricSpec};
pub use orchestrator::Orchestrator;
pub use report::{CaseReport, Outcome, Stage};
