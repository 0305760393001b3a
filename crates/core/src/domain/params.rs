//! Parameter store for stimulus and device settings
//!
//! Every parameter has a declared numeric kind, an immutable default and a
//! domain. Edits arrive as raw text from a front end and are parsed under the
//! parameter's kind; invalid edits never change the stored value.

use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced when an edit is rejected
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("{label}: unrecognized input {input:?}")]
    Parse { label: &'static str, input: String },

    #[error("{label}: {value} is out of range (must be {bounds})")]
    OutOfRange {
        label: &'static str,
        value: f64,
        bounds: String,
    },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

pub type Result<T> = std::result::Result<T, ParamError>;

/// Numeric kind a parameter's input is coerced to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

/// A stored parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Float(v) => v,
        }
    }

    /// Integer view; floats are rounded
    pub fn as_int(&self) -> i64 {
        match *self {
            ParamValue::Int(v) => v,
            ParamValue::Float(v) => v.round() as i64,
        }
    }

    pub fn kind(&self) -> NumericKind {
        match self {
            ParamValue::Int(_) => NumericKind::Integer,
            ParamValue::Float(_) => NumericKind::Float,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Which parameter set a parameter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    Tone,
    Noise,
    Device,
}

/// Identifier of every editable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    ToneFrequency,
    ToneAmplitude,
    ToneDuration,
    NoiseCenter,
    NoiseBandwidth,
    NoiseRms,
    NoiseAttenuation,
    NoiseDuration,
    DeviceId,
    SampleRate,
    Channels,
    OutputChannel,
}

impl ParamId {
    pub const ALL: [ParamId; 12] = [
        ParamId::ToneFrequency,
        ParamId::ToneAmplitude,
        ParamId::ToneDuration,
        ParamId::NoiseCenter,
        ParamId::NoiseBandwidth,
        ParamId::NoiseRms,
        ParamId::NoiseAttenuation,
        ParamId::NoiseDuration,
        ParamId::DeviceId,
        ParamId::SampleRate,
        ParamId::Channels,
        ParamId::OutputChannel,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Declared kind, default and domain of this parameter
    pub fn spec(self) -> &'static ParamSpec {
        &SPECS[self.index()]
    }

    pub fn group(self) -> ParamGroup {
        match self {
            ParamId::ToneFrequency | ParamId::ToneAmplitude | ParamId::ToneDuration => {
                ParamGroup::Tone
            }
            ParamId::NoiseCenter
            | ParamId::NoiseBandwidth
            | ParamId::NoiseRms
            | ParamId::NoiseAttenuation
            | ParamId::NoiseDuration => ParamGroup::Noise,
            ParamId::DeviceId
            | ParamId::SampleRate
            | ParamId::Channels
            | ParamId::OutputChannel => ParamGroup::Device,
        }
    }

    /// Stable name used in config files and lookups
    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| ParamError::UnknownParameter(s.to_string()))
    }
}

/// Static description of a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub id: ParamId,
    pub name: &'static str,
    /// Menu key on the screens that show this parameter
    pub key: char,
    pub label: &'static str,
    pub kind: NumericKind,
    pub default: ParamValue,
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
    /// Text around the value in "[...]" displays, e.g. ("", " Hz")
    pub display: (&'static str, &'static str),
}

impl ParamSpec {
    /// Whether `value` lies in this parameter's domain
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && (self.lower, self.upper).contains(&value)
    }

    /// Human-readable domain, e.g. "> 0 and <= 1"
    pub fn describe_bounds(&self) -> String {
        let lower = match self.lower {
            Bound::Included(v) => Some(format!(">= {}", v)),
            Bound::Excluded(v) => Some(format!("> {}", v)),
            Bound::Unbounded => None,
        };
        let upper = match self.upper {
            Bound::Included(v) => Some(format!("<= {}", v)),
            Bound::Excluded(v) => Some(format!("< {}", v)),
            Bound::Unbounded => None,
        };
        match (lower, upper) {
            (Some(l), Some(u)) => format!("{} and {}", l, u),
            (Some(b), None) | (None, Some(b)) => b,
            (None, None) => "any number".to_string(),
        }
    }

    /// Value formatted the way the menus show it, e.g. "[1000 Hz]"
    pub fn format_value(&self, value: ParamValue) -> String {
        format!("[{}{}{}]", self.display.0, value, self.display.1)
    }

    /// Parse raw input under this parameter's kind, without checking the domain
    pub fn parse(&self, raw: &str) -> Result<ParamValue> {
        let parse_err = || ParamError::Parse {
            label: self.label,
            input: raw.to_string(),
        };

        match self.kind {
            NumericKind::Float => {
                let v: f64 = raw.parse().map_err(|_| parse_err())?;
                if !v.is_finite() {
                    return Err(parse_err());
                }
                Ok(ParamValue::Float(v))
            }
            NumericKind::Integer => {
                if let Ok(v) = raw.parse::<i64>() {
                    return Ok(ParamValue::Int(v));
                }
                // "3.0" is an integer written as a float; "2.5" is not
                let v: f64 = raw.parse().map_err(|_| parse_err())?;
                if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Ok(ParamValue::Int(v as i64))
                } else {
                    Err(parse_err())
                }
            }
        }
    }
}

const fn float_spec(
    id: ParamId,
    name: &'static str,
    key: char,
    label: &'static str,
    default: f64,
    lower: Bound<f64>,
    upper: Bound<f64>,
    display: (&'static str, &'static str),
) -> ParamSpec {
    ParamSpec {
        id,
        name,
        key,
        label,
        kind: NumericKind::Float,
        default: ParamValue::Float(default),
        lower,
        upper,
        display,
    }
}

const fn int_spec(
    id: ParamId,
    name: &'static str,
    key: char,
    label: &'static str,
    default: i64,
    lower: Bound<f64>,
    display: (&'static str, &'static str),
) -> ParamSpec {
    ParamSpec {
        id,
        name,
        key,
        label,
        kind: NumericKind::Integer,
        default: ParamValue::Int(default),
        lower,
        upper: Bound::Unbounded,
        display,
    }
}

// Indexed by `ParamId as usize`
static SPECS: [ParamSpec; 12] = [
    float_spec(
        ParamId::ToneFrequency,
        "tone_frequency",
        'f',
        "Frequency",
        1000.0,
        Bound::Excluded(0.0),
        Bound::Unbounded,
        ("", " Hz"),
    ),
    float_spec(
        ParamId::ToneAmplitude,
        "tone_amplitude",
        'a',
        "Amplitude",
        1.0,
        Bound::Unbounded,
        Bound::Included(1.0),
        ("", " v"),
    ),
    float_spec(
        ParamId::ToneDuration,
        "tone_duration",
        'd',
        "Duration",
        10.0,
        Bound::Included(0.0),
        Bound::Unbounded,
        ("", " s"),
    ),
    float_spec(
        ParamId::NoiseCenter,
        "noise_center",
        'c',
        "Center frequency",
        1000.0,
        Bound::Excluded(0.0),
        Bound::Unbounded,
        ("", " Hz"),
    ),
    float_spec(
        ParamId::NoiseBandwidth,
        "noise_bandwidth",
        'w',
        "Bandwidth",
        0.333333,
        Bound::Excluded(0.0),
        Bound::Unbounded,
        ("", " oct"),
    ),
    float_spec(
        ParamId::NoiseRms,
        "noise_rms",
        'r',
        "Root-mean-square",
        0.18,
        Bound::Excluded(0.0),
        Bound::Included(1.0),
        ("", " v"),
    ),
    float_spec(
        ParamId::NoiseAttenuation,
        "noise_attenuation",
        'a',
        "Attenuation",
        0.0,
        Bound::Included(0.0),
        Bound::Unbounded,
        ("", " dB"),
    ),
    float_spec(
        ParamId::NoiseDuration,
        "noise_duration",
        'd',
        "Duration",
        10.0,
        Bound::Included(0.0),
        Bound::Unbounded,
        ("", " s"),
    ),
    int_spec(
        ParamId::DeviceId,
        "device_id",
        'i',
        "Device id",
        0,
        Bound::Included(0.0),
        ("", ""),
    ),
    float_spec(
        ParamId::SampleRate,
        "sample_rate",
        's',
        "Sample rate",
        44100.0,
        Bound::Excluded(0.0),
        Bound::Unbounded,
        ("", " Hz"),
    ),
    int_spec(
        ParamId::Channels,
        "channels",
        'n',
        "Number of output channels",
        2,
        Bound::Excluded(0.0),
        ("", " channels"),
    ),
    int_spec(
        ParamId::OutputChannel,
        "output_channel",
        'o',
        "Output channel",
        1,
        Bound::Excluded(0.0),
        ("channel ", ""),
    ),
];

/// Result of an accepted edit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOutcome {
    Updated(ParamValue),
    /// Blank input: nothing to do
    Unchanged,
}

/// Status of an edit as reported to the operator
#[derive(Debug, Clone, PartialEq)]
pub struct EditStatus {
    pub id: ParamId,
    pub changed: bool,
    pub message: String,
}

/// Current values of all parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    values: [ParamValue; 12],
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    /// Create a store holding every parameter's default
    pub fn new() -> Self {
        Self {
            values: ParamId::ALL.map(|id| id.spec().default),
        }
    }

    pub fn get(&self, id: ParamId) -> ParamValue {
        self.values[id.index()]
    }

    pub fn get_f64(&self, id: ParamId) -> f64 {
        self.get(id).as_f64()
    }

    pub fn get_int(&self, id: ParamId) -> i64 {
        self.get(id).as_int()
    }

    /// Parse and store `raw`
    ///
    /// Blank input leaves the value unchanged; unparsable or out-of-range
    /// input is rejected and also leaves the value unchanged.
    pub fn set(&mut self, id: ParamId, raw: &str) -> Result<EditOutcome> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(EditOutcome::Unchanged);
        }

        let spec = id.spec();
        let value = spec.parse(raw)?;
        if !spec.accepts(value.as_f64()) {
            return Err(ParamError::OutOfRange {
                label: spec.label,
                value: value.as_f64(),
                bounds: spec.describe_bounds(),
            });
        }

        self.values[id.index()] = value;
        debug!(param = %id, %value, "Parameter updated");
        Ok(EditOutcome::Updated(value))
    }

    /// Restore the declared default and return it
    pub fn reset_to_default(&mut self, id: ParamId) -> ParamValue {
        let default = id.spec().default;
        self.values[id.index()] = default;
        default
    }

    /// Apply an edit and describe what happened; never fails
    pub fn apply(&mut self, id: ParamId, raw: &str) -> EditStatus {
        let label = id.spec().label;
        let (changed, message) = match self.set(id, raw) {
            Ok(EditOutcome::Updated(value)) => (true, format!("{} changed: {}", label, value)),
            Ok(EditOutcome::Unchanged) => {
                (false, format!("{} unchanged: {}", label, self.get(id)))
            }
            Err(ParamError::OutOfRange { bounds, .. }) => {
                warn!(param = %id, input = raw, "Rejected out-of-range edit");
                (
                    false,
                    format!(
                        "{} unchanged: {}; out of range (must be {})",
                        label,
                        self.get(id),
                        bounds
                    ),
                )
            }
            Err(_) => {
                warn!(param = %id, input = raw, "Rejected unparsable edit");
                (
                    false,
                    format!(
                        "{} unchanged: {}; Unrecognized input: {}",
                        label,
                        self.get(id),
                        raw.trim()
                    ),
                )
            }
        };
        EditStatus {
            id,
            changed,
            message,
        }
    }

    /// Reset a parameter and describe it
    pub fn apply_default(&mut self, id: ParamId) -> EditStatus {
        let value = self.reset_to_default(id);
        EditStatus {
            id,
            changed: true,
            message: format!("{} set to default: {}", id.spec().label, value),
        }
    }

    /// Parameters of one group, in declaration order
    pub fn group(&self, group: ParamGroup) -> impl Iterator<Item = (ParamId, ParamValue)> + '_ {
        ParamId::ALL
            .into_iter()
            .filter(move |id| id.group() == group)
            .map(move |id| (id, self.get(id)))
    }
}
