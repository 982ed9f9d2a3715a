//! VPP operations and their parameter records.
//!
//! Every operation carries exactly the parameters it needs, so a case that
//! omits one fails at deserialization rather than when its name or filter is
//! built.

use serde::{Deserialize, Serialize};
use crate::config::HwAccel;
use crate::error::{Result, VppError};
use crate::format::Negotiation;

/// Adjustment strength on the harness's 0..=100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelParams {
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleParams {
    pub scale_width: u32,
    pub scale_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeinterlaceMethod {
    Bob,
    Weave,
    MotionAdaptive,
    MotionCompensated,
    Advanced,
}

impl DeinterlaceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeinterlaceMethod::Bob => "bob",
            DeinterlaceMethod::Weave => "weave",
            DeinterlaceMethod::MotionAdaptive => "motion_adaptive",
            DeinterlaceMethod::MotionCompensated => "motion_compensated",
            DeinterlaceMethod::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRate {
    Frame,
    Field,
}

impl FieldRate {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRate::Frame => "frame",
            FieldRate::Field => "field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeinterlaceParams {
    pub method: DeinterlaceMethod,
    pub rate: FieldRate,
    /// ffmpeg decoder for the interlaced source (e.g. "h264_qsv")
    pub decoder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CscParams {
    /// Target logical format
    pub csc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipMethod {
    None,
    Horizontal,
    Vertical,
}

impl FlipMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlipMethod::None => "none",
            FlipMethod::Horizontal => "horizontal",
            FlipMethod::Vertical => "vertical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransposeParams {
    pub degrees: u32,
    pub method: FlipMethod,
}

impl TransposeParams {
    /// ffmpeg transpose direction; rotation (clockwise) is applied before the flip.
    /// `Ok(None)` is a valid but inexpressible combination (identity).
    pub fn direction(&self) -> Result<Option<&'static str>> {
        let dir = match (self.degrees, self.method) {
            (0, FlipMethod::None) => None,
            (0, FlipMethod::Horizontal) | (180, FlipMethod::Vertical) => Some("hflip"),
            (0, FlipMethod::Vertical) | (180, FlipMethod::Horizontal) => Some("vflip"),
            (90, FlipMethod::None) => Some("clock"),
            (180, FlipMethod::None) => Some("reversal"),
            (270, FlipMethod::None) => Some("cclock"),
            (90, FlipMethod::Horizontal) | (270, FlipMethod::Vertical) => Some("cclock_flip"),
            (90, FlipMethod::Vertical) | (270, FlipMethod::Horizontal) => Some("clock_flip"),
            (degrees, _) => {
                return Err(VppError::InvalidConfiguration(format!(
                    "transpose degrees must be 0, 90, 180 or 270, got {}",
                    degrees
                )))
            }
        };
        Ok(dir)
    }
}

/// One overlaid copy of the source, positioned on the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeParams {
    pub comps: Vec<Layer>,
}

impl CompositeParams {
    /// Output canvas: base dimensions grown to cover every layer
    pub fn output_dimensions(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        self.comps.iter().try_fold((width, height), |(ow, oh), layer| {
            let right = width.checked_add(layer.x);
            let bottom = height.checked_add(layer.y);
            match (right, bottom) {
                (Some(r), Some(b)) => Ok((ow.max(r), oh.max(b))),
                _ => Err(VppError::InvalidConfiguration(format!(
                    "composite layer at ({}, {}) overflows a {}x{} canvas",
                    layer.x, layer.y, width, height
                ))),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Brightness(LevelParams),
    Contrast(LevelParams),
    Hue(LevelParams),
    Saturation(LevelParams),
    Denoise(LevelParams),
    Sharpen(LevelParams),
    Scale(ScaleParams),
    ScaleQsv(ScaleParams),
    Deinterlace(DeinterlaceParams),
    Csc(CscParams),
    Transpose(TransposeParams),
    Composite(CompositeParams),
}

impl Operation {
    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Brightness(_) => "brightness",
            Operation::Contrast(_) => "contrast",
            Operation::Hue(_) => "hue",
            Operation::Saturation(_) => "saturation",
            Operation::Denoise(_) => "denoise",
            Operation::Sharpen(_) => "sharpen",
            Operation::Scale(_) => "scale",
            Operation::ScaleQsv(_) => "scale_qsv",
            Operation::Deinterlace(_) => "deinterlace",
            Operation::Csc(_) => "csc",
            Operation::Transpose(_) => "transpose",
            Operation::Composite(_) => "composite",
        }
    }

    /// csc declares its own formats; everything else negotiates best-fit
    pub fn negotiation(&self) -> Negotiation {
        match self {
            Operation::Csc(_) => Negotiation::Exact,
            _ => Negotiation::BestFit,
        }
    }

    /// Deinterlace reads through a hardware decoder instead of raw frames
    pub fn uses_hw_decoder(&self) -> bool {
        matches!(self, Operation::Deinterlace(_))
    }

    pub fn is_multi_input(&self) -> bool {
        matches!(self, Operation::Composite(_))
    }

    /// Output -pix_fmt is restated for everything except plain conversion
    pub fn restates_pix_fmt(&self) -> bool {
        !matches!(self, Operation::Csc(_))
    }

    /// Logical output format given the case's source format
    pub fn output_format<'a>(&'a self, source_format: &'a str) -> &'a str {
        match self {
            Operation::Csc(p) => &p.csc,
            _ => source_format,
        }
    }

    /// Operation-specific checks run after negotiation.
    ///
    /// Out-of-range parameters are a configuration failure; a combination the
    /// backend has no filter for is reported as unsupported (skip).
    pub fn post_validate(&self, hwaccel: HwAccel) -> Result<()> {
        match self {
            Operation::Brightness(p)
            | Operation::Contrast(p)
            | Operation::Hue(p)
            | Operation::Saturation(p)
            | Operation::Denoise(p)
            | Operation::Sharpen(p) => {
                if p.level > 100 {
                    return Err(VppError::InvalidConfiguration(format!(
                        "{} level must be within 0..=100, got {}",
                        self.tag(),
                        p.level
                    )));
                }
            }
            Operation::Scale(p) | Operation::ScaleQsv(p) => {
                if p.scale_width == 0 || p.scale_height == 0 {
                    return Err(VppError::InvalidConfiguration(format!(
                        "{} target {}x{} is empty",
                        self.tag(),
                        p.scale_width,
                        p.scale_height
                    )));
                }
            }
            Operation::Composite(p) => {
                if p.comps.is_empty() {
                    return Err(VppError::InvalidConfiguration(
                        "composite needs at least one layer".to_string(),
                    ));
                }
            }
            Operation::Transpose(p) => {
                if p.direction()?.is_none() {
                    return Err(VppError::UnsupportedFormat(format!(
                        "transpose {}/{}",
                        p.degrees,
                        p.method.as_str()
                    )));
                }
            }
            Operation::Deinterlace(_) | Operation::Csc(_) => {}
        }

        if !self.supported_by(hwaccel) {
            return Err(VppError::UnsupportedFormat(format!("{} on {}", self.describe(), hwaccel)));
        }
        Ok(())
    }

    fn supported_by(&self, hwaccel: HwAccel) -> bool {
        match (self, hwaccel) {
            (Operation::ScaleQsv(_), HwAccel::Vaapi) => false,
            (Operation::Deinterlace(p), hwaccel) => deinterlace_mode(p.method, hwaccel).is_some(),
            _ => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            Operation::Deinterlace(p) => format!("deinterlace {}", p.method.as_str()),
            _ => self.tag().to_string(),
        }
    }

    /// The transformation filter for single-input operations.
    ///
    /// `ohwformat` is only consulted by csc. Composite builds a graph instead
    /// and returns `None` here, as does any combination `post_validate` rejects.
    pub fn filter(&self, hwaccel: HwAccel, ohwformat: &str) -> Option<String> {
        let filter = match (self, hwaccel) {
            (Operation::Brightness(p), HwAccel::Vaapi) => {
                format!("procamp_vaapi=b={}", map_range(p.level, (-100.0, 100.0)))
            }
            (Operation::Contrast(p), HwAccel::Vaapi) => {
                format!("procamp_vaapi=c={}", map_range(p.level, (0.0, 10.0)))
            }
            (Operation::Hue(p), HwAccel::Vaapi) => {
                format!("procamp_vaapi=h={}", map_range(p.level, (-180.0, 180.0)))
            }
            (Operation::Saturation(p), HwAccel::Vaapi) => {
                format!("procamp_vaapi=s={}", map_range(p.level, (0.0, 10.0)))
            }
            (Operation::Denoise(p), HwAccel::Vaapi) => {
                format!("denoise_vaapi=denoise={}", map_range(p.level, (0.0, 64.0)).round())
            }
            (Operation::Sharpen(p), HwAccel::Vaapi) => {
                format!("sharpness_vaapi=sharpness={}", map_range(p.level, (0.0, 64.0)).round())
            }
            (Operation::Scale(p), HwAccel::Vaapi) => {
                format!("scale_vaapi=w={}:h={}", p.scale_width, p.scale_height)
            }
            (Operation::Csc(_), HwAccel::Vaapi) => format!("scale_vaapi=format={}", ohwformat),
            (Operation::Transpose(p), HwAccel::Vaapi) => {
                format!("transpose_vaapi=dir={}", p.direction().ok()??)
            }
            (Operation::Deinterlace(p), HwAccel::Vaapi) => format!(
                "deinterlace_vaapi=mode={}:rate={}",
                deinterlace_mode(p.method, hwaccel)?,
                p.rate.as_str()
            ),

            (Operation::Brightness(p), HwAccel::Qsv) => {
                format!("vpp_qsv=procamp=1:brightness={}", map_range(p.level, (-100.0, 100.0)))
            }
            (Operation::Contrast(p), HwAccel::Qsv) => {
                format!("vpp_qsv=procamp=1:contrast={}", map_range(p.level, (0.0, 10.0)))
            }
            (Operation::Hue(p), HwAccel::Qsv) => {
                format!("vpp_qsv=procamp=1:hue={}", map_range(p.level, (-180.0, 180.0)))
            }
            (Operation::Saturation(p), HwAccel::Qsv) => {
                format!("vpp_qsv=procamp=1:saturation={}", map_range(p.level, (0.0, 10.0)))
            }
            (Operation::Denoise(p), HwAccel::Qsv) => format!("vpp_qsv=denoise={}", p.level),
            (Operation::Sharpen(p), HwAccel::Qsv) => format!("vpp_qsv=detail={}", p.level),
            (Operation::Scale(p), HwAccel::Qsv) => {
                format!("vpp_qsv=w={}:h={}", p.scale_width, p.scale_height)
            }
            (Operation::ScaleQsv(p), HwAccel::Qsv) => {
                format!("scale_qsv=w={}:h={}", p.scale_width, p.scale_height)
            }
            (Operation::Csc(_), HwAccel::Qsv) => format!("vpp_qsv=format={}", ohwformat),
            (Operation::Transpose(p), HwAccel::Qsv) => {
                format!("vpp_qsv=transpose={}", qsv_transpose(p.direction().ok()??))
            }
            (Operation::Deinterlace(p), HwAccel::Qsv) => format!(
                "vpp_qsv=deinterlace={}:rate={}",
                deinterlace_mode(p.method, hwaccel)?,
                p.rate.as_str()
            ),

            (Operation::ScaleQsv(_), HwAccel::Vaapi) | (Operation::Composite(_), _) => return None,
        };
        Some(filter)
    }
}

/// Overlay filter name for composite graphs
pub fn overlay_filter(hwaccel: HwAccel) -> &'static str {
    match hwaccel {
        HwAccel::Vaapi => "overlay_vaapi",
        HwAccel::Qsv => "overlay_qsv",
    }
}

/// vpp_qsv spells the rotate-and-flip constants with an explicit `h`
fn qsv_transpose(dir: &'static str) -> &'static str {
    match dir {
        "cclock_flip" => "cclock_hflip",
        "clock_flip" => "clock_hflip",
        other => other,
    }
}

fn deinterlace_mode(method: DeinterlaceMethod, hwaccel: HwAccel) -> Option<&'static str> {
    match (hwaccel, method) {
        (HwAccel::Vaapi, DeinterlaceMethod::Advanced) => None,
        (HwAccel::Vaapi, method) => Some(method.as_str()),
        (HwAccel::Qsv, DeinterlaceMethod::Bob) => Some("1"),
        (HwAccel::Qsv, DeinterlaceMethod::Advanced) => Some("2"),
        (HwAccel::Qsv, _) => None,
    }
}

/// Map a 0..=100 level linearly onto a filter's range
fn map_range(level: u32, (lo, hi): (f64, f64)) -> f64 {
    lo + (level as f64) * (hi - lo) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_mapping() {
        let op = Operation::Brightness(LevelParams { level: 50 });
        assert_eq!(op.filter(HwAccel::Vaapi, "nv12").unwrap(), "procamp_vaapi=b=0");

        let op = Operation::Contrast(LevelParams { level: 10 });
        assert_eq!(op.filter(HwAccel::Vaapi, "nv12").unwrap(), "procamp_vaapi=c=1");

        let op = Operation::Hue(LevelParams { level: 0 });
        assert_eq!(op.filter(HwAccel::Qsv, "nv12").unwrap(), "vpp_qsv=procamp=1:hue=-180");

        let op = Operation::Denoise(LevelParams { level: 100 });
        assert_eq!(op.filter(HwAccel::Vaapi, "nv12").unwrap(), "denoise_vaapi=denoise=64");
        assert_eq!(op.filter(HwAccel::Qsv, "nv12").unwrap(), "vpp_qsv=denoise=100");
    }

    #[test]
    fn test_csc_filter_targets_output_hw_format() {
        let op = Operation::Csc(CscParams { csc: "P010".to_string() });
        assert_eq!(op.filter(HwAccel::Vaapi, "p010le").unwrap(), "scale_vaapi=format=p010le");
        assert_eq!(op.output_format("NV12"), "P010");
        assert!(!op.restates_pix_fmt());
    }

    #[test]
    fn test_post_validate_level_range_is_configuration_error() {
        let op = Operation::Sharpen(LevelParams { level: 101 });
        let err = op.post_validate(HwAccel::Vaapi).unwrap_err();
        assert!(matches!(err, VppError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_post_validate_backend_gaps_are_skips() {
        let op = Operation::ScaleQsv(ScaleParams { scale_width: 640, scale_height: 480 });
        assert!(op.post_validate(HwAccel::Vaapi).unwrap_err().is_skip());
        assert!(op.post_validate(HwAccel::Qsv).is_ok());

        let op = Operation::Deinterlace(DeinterlaceParams {
            method: DeinterlaceMethod::Weave,
            rate: FieldRate::Frame,
            decoder: "h264_qsv".to_string(),
        });
        assert!(op.post_validate(HwAccel::Qsv).unwrap_err().is_skip());
        assert!(op.post_validate(HwAccel::Vaapi).is_ok());

        let op = Operation::Transpose(TransposeParams { degrees: 0, method: FlipMethod::None });
        assert!(op.post_validate(HwAccel::Vaapi).unwrap_err().is_skip());
    }

    #[test]
    fn test_transpose_directions() {
        let dir = |degrees, method| TransposeParams { degrees, method }.direction().unwrap();
        assert_eq!(dir(90, FlipMethod::None), Some("clock"));
        assert_eq!(dir(270, FlipMethod::None), Some("cclock"));
        assert_eq!(dir(180, FlipMethod::Horizontal), Some("vflip"));
        assert_eq!(dir(90, FlipMethod::Horizontal), Some("cclock_flip"));
        assert!(TransposeParams { degrees: 45, method: FlipMethod::None }.direction().is_err());
    }

    #[test]
    fn test_qsv_transpose_uses_vpp_qsv_constants() {
        let filter = |degrees, method| {
            Operation::Transpose(TransposeParams { degrees, method }).filter(HwAccel::Qsv, "nv12")
        };
        assert_eq!(filter(90, FlipMethod::Horizontal).unwrap(), "vpp_qsv=transpose=cclock_hflip");
        assert_eq!(filter(270, FlipMethod::Vertical).unwrap(), "vpp_qsv=transpose=cclock_hflip");
        assert_eq!(filter(90, FlipMethod::Vertical).unwrap(), "vpp_qsv=transpose=clock_hflip");
        assert_eq!(filter(270, FlipMethod::Horizontal).unwrap(), "vpp_qsv=transpose=clock_hflip");
        assert_eq!(filter(90, FlipMethod::None).unwrap(), "vpp_qsv=transpose=clock");
        assert_eq!(filter(0, FlipMethod::Horizontal).unwrap(), "vpp_qsv=transpose=hflip");
        assert_eq!(filter(0, FlipMethod::None), None);

        // transpose_vaapi keeps the short spelling
        let op = Operation::Transpose(TransposeParams { degrees: 90, method: FlipMethod::Horizontal });
        assert_eq!(op.filter(HwAccel::Vaapi, "nv12").unwrap(), "transpose_vaapi=dir=cclock_flip");
    }

    #[test]
    fn test_composite_output_dimensions_example() {
        let p = CompositeParams { comps: vec![Layer { x: 100, y: 50 }] };
        assert_eq!(p.output_dimensions(640, 480).unwrap(), (740, 530));

        let p = CompositeParams { comps: vec![Layer { x: 640, y: 50 }] };
        assert_eq!(p.output_dimensions(640, 480).unwrap(), (1280, 530));
    }

    #[test]
    fn test_composite_offset_overflow_is_configuration_error() {
        let p = CompositeParams { comps: vec![Layer { x: 0, y: 0 }, Layer { x: u32::MAX - 100, y: 0 }] };
        let err = p.output_dimensions(1280, 720).unwrap_err();
        assert!(matches!(err, VppError::InvalidConfiguration(_)), "{:?}", err);

        let p = CompositeParams { comps: vec![Layer { x: 0, y: u32::MAX }] };
        assert!(p.output_dimensions(1, 1).is_err());
    }

    #[test]
    fn test_operation_deserializes_from_tagged_table() {
        let op: Operation = toml::from_str("op = \"deinterlace\"\nmethod = \"motion_adaptive\"\nrate = \"field\"\ndecoder = \"h264\"\n").unwrap();
        assert_eq!(op.tag(), "deinterlace");
        assert!(op.uses_hw_decoder());

        let missing = toml::from_str::<Operation>("op = \"brightness\"\n");
        assert!(missing.is_err(), "level is required for brightness");
    }

    proptest! {
        #[test]
        fn test_composite_dimensions_cover_every_layer(
            width in 1u32..4096,
            height in 1u32..4096,
            layers in prop::collection::vec((0u32..4096, 0u32..4096), 0..8),
        ) {
            let p = CompositeParams {
                comps: layers.iter().map(|&(x, y)| Layer { x, y }).collect(),
            };
            let (ow, oh) = p.output_dimensions(width, height).unwrap();

            let max_x = layers.iter().map(|l| l.0).max().unwrap_or(0);
            let max_y = layers.iter().map(|l| l.1).max().unwrap_or(0);
            prop_assert_eq!(ow, width + max_x);
            prop_assert_eq!(oh, height + max_y);
            prop_assert!(ow >= width && oh >= height);
        }
    }
}
