//! Sequences one test case through negotiation, synthesis, invocation and
//! verification.
//!
//! Single-run cases are checked against the case's expected fingerprint.
//! Run-to-run cases take the first output as the reference and require every
//! repeat to be byte-identical to it; each artifact is deleted right after its
//! check, so at most the reference and one repeat exist at any time.

use std::path::Path;
use std::time::{Duration, Instant};
use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;
use crate::artifact::ArtifactStore;
use crate::case::{ResolvedFormats, TestCase};
use crate::command::{CommandSynthesizer, Synthesized};
use crate::config::HarnessConfig;
use crate::error::{Result, VppError};
use crate::ffmpeg::{Invocation, Transcoder};
use crate::metric::{MetricFactory, MetricSpec};
use crate::report::{CaseReport, Outcome, Stage};

/// Mutable bookkeeping for the case currently being evaluated
struct CaseRun {
    stage: Stage,
    name: String,
    invocations: u32,
    fingerprints: Vec<String>,
    tool_time: Duration,
}

pub struct Orchestrator<T, M> {
    config: HarnessConfig,
    transcoder: T,
    metrics: M,
    store: ArtifactStore,
}

impl<T: Transcoder, M: MetricFactory> Orchestrator<T, M> {
    pub fn new(config: HarnessConfig, transcoder: T, metrics: M) -> Self {
        let store = ArtifactStore::new(config.artifact_dir.clone());
        Orchestrator { config, transcoder, metrics, store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Evaluate one case to a terminal outcome. Nothing is retried.
    pub async fn run_case(&self, case: &TestCase) -> CaseReport {
        let started_at = Utc::now();
        let mut run = CaseRun {
            stage: Stage::Validating,
            name: case.operation.tag().to_string(),
            invocations: 0,
            fingerprints: Vec::new(),
            tool_time: Duration::ZERO,
        };

        let outcome = match self.evaluate(case, &mut run).await {
            Ok(()) => {
                info!("✅ {} done ({} invocation(s))", run.name, run.invocations);
                Outcome::Done
            }
            Err(e) if e.is_skip() => {
                warn!("⏭️  {} skipped: {}", run.name, e);
                Outcome::Skipped { reason: e.to_string() }
            }
            Err(e) => {
                error!("❌ {} failed while {}: {}", run.name, run.stage, e);
                Outcome::Failed { stage: run.stage, error: e }
            }
        };

        CaseReport {
            run_id: Uuid::new_v4(),
            name: run.name,
            operation: case.operation.tag().to_string(),
            outcome,
            invocations: run.invocations,
            fingerprints: run.fingerprints,
            tool_time_ms: run.tool_time.as_millis() as u64,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn evaluate(&self, case: &TestCase, run: &mut CaseRun) -> Result<()> {
        // A malformed r2r value fails even when the format would be skipped
        let r2r = case.r2r_count()?;

        let resolved = ResolvedFormats::negotiate(case)?;
        case.operation.post_validate(self.config.hwaccel)?;
        if r2r.is_none() && case.metric.expect().is_none() {
            return Err(VppError::InvalidConfiguration(format!(
                "{} has no expected fingerprint",
                case.operation.tag()
            )));
        }
        debug!(
            "Negotiated {}: {} -> {} (hw {} -> {})",
            case.operation.tag(),
            resolved.input_format,
            resolved.output_format,
            resolved.hw_input_format,
            resolved.hw_output_format
        );

        run.stage = Stage::Negotiated;
        let synthesized = CommandSynthesizer::new(self.config.hwaccel).synthesize(case, &resolved)?;
        run.name = synthesized.artifact_name.clone();

        match r2r {
            None => self.single_run(case, &synthesized, run).await,
            Some(count) => self.r2r_run(&synthesized, count, run).await,
        }
    }

    async fn single_run(&self, case: &TestCase, synthesized: &Synthesized, run: &mut CaseRun) -> Result<()> {
        let artifact = self.store.path_for(&synthesized.artifact_name)?;
        self.invoke(synthesized, &artifact, run).await?;

        run.stage = Stage::Verifying;
        let mut metric = self.metrics.create(&case.metric);
        metric.update(&artifact)?;
        if let Some(actual) = metric.actual() {
            run.fingerprints.push(actual.to_string());
        }
        metric.check()
    }

    async fn r2r_run(&self, synthesized: &Synthesized, count: u32, run: &mut CaseRun) -> Result<()> {
        info!("🔁 {}: run-to-run x{}", synthesized.artifact_name, count);

        let reference = self.store.path_for(&synthesized.artifact_name_for(0))?;
        self.invoke(synthesized, &reference, run).await?;

        // Byte-identical output is the criterion, so always hash the whole file
        run.stage = Stage::Verifying;
        let mut metric = self.metrics.create(&MetricSpec::default());
        metric.update(&reference)?;
        let expect = metric
            .actual()
            .map(str::to_string)
            .ok_or_else(|| VppError::InvalidConfiguration("reference produced no fingerprint".to_string()))?;
        run.fingerprints.push(expect.clone());
        metric.set_expect(expect);
        metric.check()?;
        self.store.purge(&reference)?;

        for iteration in 1..count {
            let artifact = self.store.path_for(&synthesized.artifact_name_for(iteration))?;
            self.invoke(synthesized, &artifact, run).await?;

            run.stage = Stage::Verifying;
            let checked = metric.update(&artifact).and_then(|()| metric.check());
            if let Some(actual) = metric.actual() {
                run.fingerprints.push(actual.to_string());
            }
            let purged = self.store.purge(&artifact);
            first_failure(checked, purged)?;
            debug!("{}: iteration {} matches reference", synthesized.artifact_name, iteration);
        }

        Ok(())
    }

    async fn invoke(&self, synthesized: &Synthesized, artifact: &Path, run: &mut CaseRun) -> Result<()> {
        run.stage = Stage::Invoking;
        let invocation = Invocation {
            hwaccel: self.config.hwaccel,
            hw_device: self.config.hw_device.clone(),
            verbosity: self.config.verbosity.clone(),
            input_args: synthesized.input_args.clone(),
            output_args: synthesized.output_args_for(artifact),
            artifact: artifact.to_path_buf(),
        };

        info!("🎬 Invoking ffmpeg -> {}", artifact.display());
        run.invocations += 1;
        let started = Instant::now();
        let result = self.transcoder.transcode(&invocation).await;
        run.tool_time += started.elapsed();
        result
    }
}

/// A mismatch outranks a failed cleanup of the same artifact
fn first_failure(checked: Result<()>, purged: Result<()>) -> Result<()> {
    match (checked, purged) {
        (Err(mismatch), Err(e)) => {
            warn!("⚠️  Could not purge mismatched artifact: {}", e);
            Err(mismatch)
        }
        (checked, purged) => checked.and(purged),
    }
}
