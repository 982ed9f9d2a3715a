use std::collections::BTreeSet;

/// Chroma layout family, used to decide which formats are interchangeable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chroma {
    Yuv420,
    Yuv422,
    Yuv444,
    Gray,
    Rgb,
}

/// One entry of the logical format table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Logical name as used in test cases (e.g. "NV12")
    pub name: &'static str,
    /// ffmpeg pixel format name (e.g. "nv12")
    pub pix_fmt: &'static str,
    pub chroma: Chroma,
    pub bit_depth: u8,
}

const fn fmt(name: &'static str, pix_fmt: &'static str, chroma: Chroma, bit_depth: u8) -> FormatInfo {
    FormatInfo { name, pix_fmt, chroma, bit_depth }
}

/// Logical formats known to the ffmpeg layer. Order is the best-fit tie-break.
pub const FORMATS: &[FormatInfo] = &[
    fmt("NV12", "nv12", Chroma::Yuv420, 8),
    fmt("I420", "yuv420p", Chroma::Yuv420, 8),
    fmt("P010", "p010le", Chroma::Yuv420, 10),
    fmt("I010", "yuv420p10le", Chroma::Yuv420, 10),
    fmt("P012", "p012le", Chroma::Yuv420, 12),
    fmt("YUY2", "yuyv422", Chroma::Yuv422, 8),
    fmt("UYVY", "uyvy422", Chroma::Yuv422, 8),
    fmt("422H", "yuv422p", Chroma::Yuv422, 8),
    fmt("Y210", "y210le", Chroma::Yuv422, 10),
    fmt("Y212", "y212le", Chroma::Yuv422, 12),
    fmt("AYUV", "vuyx", Chroma::Yuv444, 8),
    fmt("444P", "yuv444p", Chroma::Yuv444, 8),
    fmt("Y410", "xv30le", Chroma::Yuv444, 10),
    fmt("Y412", "xv36le", Chroma::Yuv444, 12),
    fmt("Y800", "gray", Chroma::Gray, 8),
    fmt("BGRA", "bgra", Chroma::Rgb, 8),
    fmt("BGRX", "bgr0", Chroma::Rgb, 8),
    fmt("X2R10", "x2rgb10le", Chroma::Rgb, 10),
];

/// Look up a logical format in the table
pub fn lookup(name: &str) -> Option<&'static FormatInfo> {
    FORMATS.iter().find(|f| f.name == name)
}

/// Map a logical format to its ffmpeg pixel format (`mformat`)
pub fn map_format(name: &str) -> Option<&'static str> {
    lookup(name).map(|f| f.pix_fmt)
}

/// How a logical format is matched against an operation's supported set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// The format must be a member of the set; no substitution (csc)
    Exact,
    /// Closest compatible member of the set
    BestFit,
}

/// Resolves logical formats to hardware formats for one operation
#[derive(Debug, Clone, Copy)]
pub struct FormatNegotiator {
    mode: Negotiation,
}

impl FormatNegotiator {
    pub fn new(mode: Negotiation) -> Self {
        FormatNegotiator { mode }
    }

    pub fn mode(&self) -> Negotiation {
        self.mode
    }

    /// Resolve `logical` against `supported`. `None` means unresolved.
    pub fn resolve_hardware_format(
        &self,
        logical: &str,
        supported: &BTreeSet<String>,
    ) -> Option<&'static str> {
        let chosen = match self.mode {
            Negotiation::Exact => supported.contains(logical).then_some(logical)?,
            Negotiation::BestFit => match_best_format(logical, supported)?,
        };
        map_format(chosen)
    }
}

/// Pick the closest entry of `choices` for `requested`.
///
/// An exact member wins. Otherwise only formats sharing the chroma family are
/// candidates: equal bit depth first, then the shallowest deeper format. A
/// shallower format is never chosen since it would drop precision.
pub fn match_best_format(requested: &str, choices: &BTreeSet<String>) -> Option<&'static str> {
    let want = lookup(requested)?;
    if choices.contains(requested) {
        return Some(want.name);
    }

    let candidates = FORMATS
        .iter()
        .filter(|f| choices.contains(f.name))
        .filter(|f| f.chroma == want.chroma);

    candidates
        .filter(|f| f.bit_depth >= want.bit_depth)
        .min_by_key(|f| f.bit_depth)
        .map(|f| f.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_map_format() {
        assert_eq!(map_format("NV12"), Some("nv12"));
        assert_eq!(map_format("P010"), Some("p010le"));
        assert_eq!(map_format("YV16"), None);
    }

    #[test]
    fn test_best_fit_prefers_exact_member() {
        let neg = FormatNegotiator::new(Negotiation::BestFit);
        assert_eq!(neg.resolve_hardware_format("I420", &set(&["NV12", "I420"])), Some("yuv420p"));
    }

    #[test]
    fn test_best_fit_same_depth_substitute() {
        let neg = FormatNegotiator::new(Negotiation::BestFit);
        assert_eq!(neg.resolve_hardware_format("I420", &set(&["NV12", "P010"])), Some("nv12"));
        assert_eq!(neg.resolve_hardware_format("YUY2", &set(&["NV12", "422H"])), Some("yuv422p"));
    }

    #[test]
    fn test_best_fit_upgrades_depth_but_never_downgrades() {
        let neg = FormatNegotiator::new(Negotiation::BestFit);
        assert_eq!(neg.resolve_hardware_format("NV12", &set(&["P012", "P010"])), Some("p010le"));
        assert_eq!(neg.resolve_hardware_format("P010", &set(&["NV12", "I420"])), None);
    }

    #[test]
    fn test_best_fit_rejects_other_chroma_family() {
        let neg = FormatNegotiator::new(Negotiation::BestFit);
        assert_eq!(neg.resolve_hardware_format("NV12", &set(&["YUY2", "BGRA", "AYUV"])), None);
    }

    #[test]
    fn test_exact_never_substitutes() {
        let neg = FormatNegotiator::new(Negotiation::Exact);
        assert_eq!(neg.resolve_hardware_format("I420", &set(&["NV12", "P010"])), None);
        assert_eq!(neg.resolve_hardware_format("NV12", &set(&["NV12"])), Some("nv12"));
    }

    #[test]
    fn test_unknown_logical_format_is_unresolved() {
        let neg = FormatNegotiator::new(Negotiation::BestFit);
        assert_eq!(neg.resolve_hardware_format("YV16", &set(&["YV16", "NV12"])), None);
    }

    proptest! {
        /// Formats outside every chroma-compatible entry of the supported set never resolve
        #[test]
        fn test_unsupported_formats_never_resolve(
            idx in 0usize..FORMATS.len(),
            mask in prop::collection::vec(prop::bool::ANY, FORMATS.len()),
        ) {
            let requested = FORMATS[idx];
            let supported: BTreeSet<String> = FORMATS
                .iter()
                .zip(mask.iter())
                .filter(|(f, keep)| **keep && f.name != requested.name)
                .map(|(f, _)| f.name.to_string())
                .collect();

            let exact = FormatNegotiator::new(Negotiation::Exact);
            prop_assert_eq!(exact.resolve_hardware_format(requested.name, &supported), None);

            let best = FormatNegotiator::new(Negotiation::BestFit)
                .resolve_hardware_format(requested.name, &supported);
            if let Some(pix_fmt) = best {
                let chosen = FORMATS.iter().find(|f| f.pix_fmt == pix_fmt).unwrap();
                prop_assert!(supported.contains(chosen.name));
                prop_assert_eq!(chosen.chroma, requested.chroma);
                prop_assert!(chosen.bit_depth >= requested.bit_depth);
            }
        }
    }
}
