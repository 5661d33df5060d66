//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during fitting
//! - persisted into dataset metadata
//! - rendered by the CLI/TUI front-ends

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, StoreError};

/// Which lineshape the user asked for. `None` means "do not fit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    None,
    Lorentz,
    Gauss,
    Fano,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::None,
        ModelKind::Lorentz,
        ModelKind::Gauss,
        ModelKind::Fano,
    ];

    /// Name used in the UI and as the metadata key prefix.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::None => "None",
            ModelKind::Lorentz => "Lorentz",
            ModelKind::Gauss => "Gauss",
            ModelKind::Fano => "Fano",
        }
    }

    /// Parse the UI model name (`"None"`, `"Lorentz"`, `"Gauss"`, `"Fano"`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The fittable lineshape, or `None` when no fit is requested.
    pub fn lineshape(self) -> Option<Lineshape> {
        match self {
            ModelKind::None => None,
            ModelKind::Lorentz => Some(Lineshape::Lorentz),
            ModelKind::Gauss => Some(Lineshape::Gauss),
            ModelKind::Fano => Some(Lineshape::Fano),
        }
    }

    pub fn next(self) -> Self {
        match self {
            ModelKind::None => ModelKind::Lorentz,
            ModelKind::Lorentz => ModelKind::Gauss,
            ModelKind::Gauss => ModelKind::Fano,
            ModelKind::Fano => ModelKind::None,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ModelKind::None => ModelKind::Fano,
            ModelKind::Lorentz => ModelKind::None,
            ModelKind::Gauss => ModelKind::Lorentz,
            ModelKind::Fano => ModelKind::Gauss,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A closed-form resonance lineshape that can actually be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lineshape {
    Lorentz,
    Gauss,
    Fano,
}

impl Lineshape {
    pub fn name(self) -> &'static str {
        match self {
            Lineshape::Lorentz => "Lorentz",
            Lineshape::Gauss => "Gauss",
            Lineshape::Fano => "Fano",
        }
    }

    pub fn model_kind(self) -> ModelKind {
        match self {
            Lineshape::Lorentz => ModelKind::Lorentz,
            Lineshape::Gauss => ModelKind::Gauss,
            Lineshape::Fano => ModelKind::Fano,
        }
    }

    /// Number of free parameters in the model.
    pub fn param_len(self) -> usize {
        self.param_names().len()
    }

    /// Metadata key suffixes, in parameter-vector order.
    ///
    /// Parameter order is `[offset, x0, height, dx]` (+ `q` for Fano).
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            Lineshape::Lorentz | Lineshape::Gauss => {
                &["offset", "eigenfrequency", "amplitude", "linewidth"]
            }
            Lineshape::Fano => &["offset", "eigenfrequency", "amplitude", "linewidth", "q"],
        }
    }
}

impl fmt::Display for Lineshape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Index of the linewidth parameter in every lineshape's parameter vector.
pub const LINEWIDTH_INDEX: usize = 3;

/// An ordered sequence of `(x, y)` samples with axis names.
///
/// `x` is expected to be non-decreasing but this is not enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub x_name: String,
    pub y_name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    pub fn new(
        x_name: impl Into<String>,
        y_name: impl Into<String>,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Result<Self, StoreError> {
        if x.len() != y.len() {
            return Err(StoreError::Schema(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(StoreError::Schema("curve has no samples".to_string()));
        }
        Ok(Self {
            x_name: x_name.into(),
            y_name: y_name.into(),
            x,
            y,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

/// Fractional window bounds selecting a contiguous slice of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub lower: f64,
    pub upper: f64,
}

impl Window {
    pub const FULL: Window = Window {
        lower: 0.0,
        upper: 1.0,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Index range `[floor(lower·n), floor(upper·n))`, clipped to `n`.
    ///
    /// Bounds must be finite and inside `[0, 1]`; a reversed or empty range is
    /// rejected rather than silently swapped.
    pub fn index_range(&self, n: usize) -> Result<Range<usize>, FitError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.lower) || !in_unit(self.upper) {
            return Err(FitError::InsufficientData(format!(
                "window bounds ({}, {}) must lie in [0, 1]",
                self.lower, self.upper
            )));
        }

        let lo = (self.lower * n as f64).floor() as usize;
        let hi = ((self.upper * n as f64).floor() as usize).min(n);
        if hi <= lo {
            return Err(FitError::InsufficientData(format!(
                "window ({}, {}) selects no points out of {n}",
                self.lower, self.upper
            )));
        }
        Ok(lo..hi)
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::FULL
    }
}

/// What the caller wants fitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest {
    pub model: ModelKind,
    pub window: Window,
    /// Fraction of the window's x-span used as the initial linewidth guess.
    /// `None` means "use the configured default".
    pub width_ratio: Option<f64>,
}

impl Default for FitRequest {
    fn default() -> Self {
        Self {
            model: ModelKind::None,
            window: Window::FULL,
            width_ratio: None,
        }
    }
}

/// A single scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Null,
}

impl MetadataValue {
    /// Interpret the value as a number. Numeric strings are accepted because
    /// hand-edited metadata often stores constants as text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::String(s) => s.trim().parse::<f64>().ok(),
            MetadataValue::Bool(_) | MetadataValue::Null => None,
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.6e}"),
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

/// String-keyed scalar metadata attached to a dataset.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Fitted parameters keyed as `"<Model>_<param>"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitResult {
    pub values: BTreeMap<String, f64>,
}

impl FitResult {
    /// Package a solved parameter vector under the lineshape's key names.
    pub fn from_params(lineshape: Lineshape, params: &[f64]) -> Self {
        let values = lineshape
            .param_names()
            .iter()
            .zip(params.iter())
            .map(|(name, &v)| (format!("{}_{name}", lineshape.name()), v))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Merge into `metadata` (union, last write wins).
    pub fn merge_into(&self, metadata: &mut Metadata) {
        for (k, v) in &self.values {
            metadata.insert(k.clone(), MetadataValue::Float(*v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_window_covers_every_index() {
        assert_eq!(Window::FULL.index_range(11).unwrap(), 0..11);
    }

    #[test]
    fn window_uses_floor_of_fractions() {
        let w = Window::new(0.25, 0.75);
        assert_eq!(w.index_range(10).unwrap(), 2..7);
    }

    #[test]
    fn reversed_window_is_insufficient_data() {
        let err = Window::new(0.9, 0.1).index_range(100).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData(_)));
    }

    #[test]
    fn out_of_range_window_is_rejected() {
        assert!(Window::new(-0.1, 0.5).index_range(10).is_err());
        assert!(Window::new(0.0, f64::NAN).index_range(10).is_err());
    }

    #[test]
    fn fit_result_keys_follow_model_name() {
        let r = FitResult::from_params(Lineshape::Fano, &[1.0, 2.0, 3.0, 4.0, 0.5]);
        assert_eq!(r.get("Fano_offset"), Some(1.0));
        assert_eq!(r.get("Fano_eigenfrequency"), Some(2.0));
        assert_eq!(r.get("Fano_amplitude"), Some(3.0));
        assert_eq!(r.get("Fano_linewidth"), Some(4.0));
        assert_eq!(r.get("Fano_q"), Some(0.5));
    }

    #[test]
    fn merge_overwrites_existing_keys_and_keeps_others() {
        let mut meta = Metadata::new();
        meta.insert("Lorentz_offset".into(), MetadataValue::Float(9.0));
        meta.insert("ENBW".into(), MetadataValue::Float(30.0));
        FitResult::from_params(Lineshape::Lorentz, &[1.0, 2.0, 3.0, 4.0]).merge_into(&mut meta);
        assert_eq!(meta["Lorentz_offset"], MetadataValue::Float(1.0));
        assert_eq!(meta["ENBW"], MetadataValue::Float(30.0));
    }

    #[test]
    fn model_names_round_trip() {
        for m in ModelKind::ALL {
            assert_eq!(ModelKind::from_name(m.name()), Some(m));
        }
        assert_eq!(ModelKind::from_name("voigt"), None);
    }

    #[test]
    fn metadata_numbers_parse_from_text() {
        assert_eq!(MetadataValue::String(" 1e3 ".into()).as_f64(), Some(1000.0));
        assert_eq!(MetadataValue::Bool(true).as_f64(), None);
    }
}
