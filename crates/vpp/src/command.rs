use std::path::Path;
use crate::case::{ResolvedFormats, TestCase};
use crate::config::HwAccel;
use crate::error::{Result, VppError};
use crate::operation::{overlay_filter, CompositeParams, Operation};

/// Upload pool size for raw frames pushed to the device
const UPLOAD_FILTER: &str = "hwupload=extra_hw_frames=64";

/// Marker appended to artifact names in run-to-run mode
pub const R2R_MARKER: &str = "_r2r";

/// Options and artifact name for one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    pub input_args: Vec<String>,
    /// Output options up to, but not including, the destination file
    pub output_args: Vec<String>,
    /// Base artifact name (without iteration suffix or extension)
    pub artifact_name: String,
}

impl Synthesized {
    /// Artifact name for an r2r iteration; iteration 0 is the reference run
    pub fn artifact_name_for(&self, iteration: u32) -> String {
        if iteration == 0 {
            self.artifact_name.clone()
        } else {
            format!("{}_{}", self.artifact_name, iteration)
        }
    }

    /// Complete output options writing to `artifact`
    pub fn output_args_for(&self, artifact: &Path) -> Vec<String> {
        let mut args = self.output_args.clone();
        args.push("-y".to_string());
        args.push(artifact.to_string_lossy().to_string());
        args
    }
}

/// Command builder for VPP test cases
#[derive(Debug, Clone, Copy)]
pub struct CommandSynthesizer {
    hwaccel: HwAccel,
}

impl CommandSynthesizer {
    pub fn new(hwaccel: HwAccel) -> Self {
        CommandSynthesizer { hwaccel }
    }

    /// Build input options, output options and the artifact name.
    ///
    /// Takes the negotiated formats by reference, so a case cannot reach this
    /// point with either hardware format unresolved.
    pub fn synthesize(&self, case: &TestCase, resolved: &ResolvedFormats) -> Result<Synthesized> {
        Ok(Synthesized {
            input_args: self.input_args(case, resolved),
            output_args: self.output_args(case, resolved)?,
            artifact_name: artifact_name(case, resolved),
        })
    }

    fn input_args(&self, case: &TestCase, resolved: &ResolvedFormats) -> Vec<String> {
        let mut args = Vec::new();

        match &case.operation {
            Operation::Deinterlace(p) => {
                args.push("-c:v".to_string());
                args.push(p.decoder.clone());
            }
            _ => {
                args.push("-f".to_string());
                args.push("rawvideo".to_string());
                args.push("-pix_fmt".to_string());
                args.push(resolved.mformat.to_string());
                args.push("-s:v".to_string());
                args.push(format!("{}x{}", case.width, case.height));
            }
        }

        args.push("-i".to_string());
        args.push(case.source.to_string_lossy().to_string());
        args
    }

    fn output_args(&self, case: &TestCase, resolved: &ResolvedFormats) -> Result<Vec<String>> {
        let mut filters = self.vpp_filters(case, resolved)?;
        filters.push("hwdownload".to_string());
        filters.push(format!("format={}", resolved.hw_output_format));

        let mut args = Vec::new();
        args.push(if case.operation.is_multi_input() { "-filter_complex" } else { "-vf" }.to_string());
        args.push(filters.join(","));

        if case.operation.restates_pix_fmt() {
            args.push("-pix_fmt".to_string());
            args.push(resolved.mformat.to_string());
        }

        args.push("-f".to_string());
        args.push("rawvideo".to_string());
        args.push("-fps_mode".to_string());
        args.push("passthrough".to_string());
        args.push("-an".to_string());
        args.push("-vframes".to_string());
        args.push(case.frames.to_string());
        Ok(args)
    }

    /// The transformation itself, still on the device
    fn vpp_filters(&self, case: &TestCase, resolved: &ResolvedFormats) -> Result<Vec<String>> {
        if let Operation::Composite(p) = &case.operation {
            let (ow, oh) = resolved
                .output_dimensions
                .unwrap_or((case.width, case.height));
            return Ok(vec![self.composite_graph(p, resolved.hw_input_format, ow, oh)]);
        }

        let filter = case
            .operation
            .filter(self.hwaccel, resolved.hw_output_format)
            .ok_or_else(|| {
                VppError::UnsupportedFormat(format!("{} on {}", case.operation.tag(), self.hwaccel))
            })?;

        let mut filters = Vec::new();
        if !case.operation.uses_hw_decoder() {
            filters.push(format!("format={}", resolved.hw_input_format));
            filters.push(UPLOAD_FILTER.to_string());
        }
        filters.push(filter);
        Ok(filters)
    }

    /// Overlay every layer onto a canvas padded to the output size.
    /// The last overlay is left unlabelled so the download chain can follow it.
    fn composite_graph(&self, p: &CompositeParams, ihwformat: &str, ow: u32, oh: u32) -> String {
        let overlay = overlay_filter(self.hwaccel);
        let layer_labels: String = (0..p.comps.len()).map(|i| format!("[l{}]", i)).collect();

        let mut graph = vec![
            format!("[0:v]split={}[base]{}", p.comps.len() + 1, layer_labels),
            format!("[base]pad={}:{},format={},{}[m0]", ow, oh, ihwformat, UPLOAD_FILTER),
        ];
        for i in 0..p.comps.len() {
            graph.push(format!("[l{}]format={},{}[u{}]", i, ihwformat, UPLOAD_FILTER, i));
        }
        for (i, layer) in p.comps.iter().enumerate() {
            let next = if i + 1 < p.comps.len() { format!("[m{}]", i + 1) } else { String::new() };
            graph.push(format!("[m{}][u{}]{}=x={}:y={}{}", i, i, overlay, layer.x, layer.y, next));
        }
        graph.join(";")
    }
}

/// Deterministic artifact name: every parameter that changes output content
/// appears in it, so distinct cases never share storage.
pub fn artifact_name(case: &TestCase, resolved: &ResolvedFormats) -> String {
    let (w, h, fmt) = (case.width, case.height, &case.format);

    let signature = match &case.operation {
        Operation::Brightness(p)
        | Operation::Contrast(p)
        | Operation::Hue(p)
        | Operation::Saturation(p)
        | Operation::Denoise(p)
        | Operation::Sharpen(p) => format!("{}_{}x{}_{}", p.level, w, h, fmt),
        Operation::Scale(p) | Operation::ScaleQsv(p) => {
            format!("{}x{}_{}", p.scale_width, p.scale_height, fmt)
        }
        Operation::Deinterlace(p) => {
            format!("{}_{}_{}x{}_{}", p.method.as_str(), p.rate.as_str(), w, h, fmt)
        }
        Operation::Csc(p) => format!("{}x{}_{}_to_{}", w, h, fmt, p.csc),
        Operation::Transpose(p) => {
            format!("{}_{}_{}x{}_{}", p.degrees, p.method.as_str(), w, h, fmt)
        }
        Operation::Composite(_) => {
            let (ow, oh) = resolved.output_dimensions.unwrap_or((w, h));
            format!("{}x{}_{}", ow, oh, fmt)
        }
    };

    let mut name = match &case.case {
        Some(label) => format!("{}_{}_{}", label, case.operation.tag(), signature),
        None => format!("{}_{}", case.operation.tag(), signature),
    };
    if case.r2r.is_some() {
        name.push_str(R2R_MARKER);
    }
    name
}
