// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field values, display hints, provenance, and compare policy.

use serde::{Deserialize, Serialize, Serializer};

use crate::path::FieldPath;
use crate::snapshot::BlockId;
use crate::units::Unit;

fn ser_hex<T: AsRef<[u8]>, S: Serializer>(bytes: &T, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

/// Tagged value held by a [`Field`].
///
/// Integers are unsigned and 128 bits wide so SMART counters never narrow.
/// Negative quantities only arise as reals.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Unsigned integer.
    Int(u128),
    /// Real number.
    Real(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free text.
    Text(String),
    /// Enumerated symbol (lowercase identifier).
    Enum(String),
    /// Raw bytes, serialized as lowercase hex.
    Bytes(#[serde(serialize_with = "ser_hex")] Vec<u8>),
    /// Value could not be decoded; the reason lives in the provenance.
    Unknown,
    /// Value is reported as not present by the drive (e.g. a 0 K sensor).
    Absent,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) | (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Unknown, Self::Unknown) | (Self::Absent, Self::Absent) => true,
            _ => false,
        }
    }
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
            Self::Enum(_) => "enum",
            Self::Bytes(_) => "bytes",
            Self::Unknown => "unknown",
            Self::Absent => "absent",
        }
    }

    /// Whether the value carries data (neither `unknown` nor `absent`).
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::Unknown | Self::Absent)
    }

    /// Whether the value is an integer or a real.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Real(_))
    }

    /// Numeric view as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text or enum symbol view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) | Self::Enum(v) => Some(v),
            _ => None,
        }
    }
}

/// How a value is preferably rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStyle {
    /// Plain decimal rendering.
    #[default]
    Plain,
    /// Hexadecimal (`0x1f`).
    Hex,
    /// Decimal with thousands separators.
    Grouped,
}

/// Rendering preferences attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DisplayHint {
    /// Decimal places for reals.
    pub decimals: Option<u8>,
    /// Integer style.
    pub style: DisplayStyle,
}

impl DisplayHint {
    /// Hex rendering for integers.
    pub const HEX: Self = Self {
        decimals: None,
        style: DisplayStyle::Hex,
    };
    /// Grouped rendering for large counters.
    pub const GROUPED: Self = Self {
        decimals: None,
        style: DisplayStyle::Grouped,
    };

    /// Reals with a fixed number of decimals.
    pub const fn decimals(places: u8) -> Self {
        Self {
            decimals: Some(places),
            style: DisplayStyle::Plain,
        }
    }
}

fn group_digits(v: u128) -> String {
    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// How the differ treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparePolicy {
    /// Any difference in value or unit is a change.
    #[default]
    Compare,
    /// Never reported.
    Ignore,
    /// Only a decrease is reported; forward motion is expected.
    Monotonic,
}

impl std::fmt::Display for ComparePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Compare => "compare",
            Self::Ignore => "ignore",
            Self::Monotonic => "monotonic",
        })
    }
}

/// Where a field came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// Decoded from a byte range of a raw block.
    Block {
        /// Source block.
        block: BlockId,
        /// First byte (inclusive).
        start: u32,
        /// Last byte (exclusive).
        end: u32,
        /// Decode error, when the value is `unknown`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Computed from other fields.
    Derived {
        /// Name of the derivation.
        derivation: String,
        /// Paths consumed.
        sources: Vec<FieldPath>,
        /// Derivation error, when the value is `unknown`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Copied from a manifest key.
    Manifest {
        /// Manifest key.
        key: String,
    },
    /// Read from a textual addendum file.
    Addendum {
        /// File name inside the bundle.
        file: String,
    },
}

impl Provenance {
    /// Provenance for a byte range of a block.
    pub fn block(block: &BlockId, start: usize, end: usize) -> Self {
        Self::Block {
            block: block.clone(),
            start: start as u32,
            end: end as u32,
            error: None,
        }
    }

    /// Provenance for a derivation over `sources`.
    pub fn derived(derivation: &str, sources: &[&FieldPath]) -> Self {
        Self::Derived {
            derivation: derivation.to_owned(),
            sources: sources.iter().map(|p| (*p).clone()).collect(),
            error: None,
        }
    }

    /// Attach an error to a block or derived provenance.
    #[must_use]
    pub fn with_error(self, reason: impl Into<String>) -> Self {
        match self {
            Self::Block {
                block, start, end, ..
            } => Self::Block {
                block,
                start,
                end,
                error: Some(reason.into()),
            },
            Self::Derived {
                derivation,
                sources,
                ..
            } => Self::Derived {
                derivation,
                sources,
                error: Some(reason.into()),
            },
            other => other,
        }
    }

    /// Decode or derivation error recorded in the provenance, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Block { error, .. } | Self::Derived { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// Whether the provenance identifies a source.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Block { start, end, .. } => end <= start,
            Self::Derived {
                derivation,
                sources,
                ..
            } => derivation.is_empty() || sources.is_empty(),
            Self::Manifest { key } => key.is_empty(),
            Self::Addendum { file } => file.is_empty(),
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block {
                block,
                start,
                end,
                error,
            } => {
                write!(f, "{block}[{start}..{end}]")?;
                if let Some(e) = error {
                    write!(f, " ({e})")?;
                }
                Ok(())
            }
            Self::Derived {
                derivation,
                sources,
                error,
            } => {
                write!(f, "derived:{derivation} <- ")?;
                for (i, s) in sources.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{s}")?;
                }
                if let Some(e) = error {
                    write!(f, " ({e})")?;
                }
                Ok(())
            }
            Self::Manifest { key } => write!(f, "manifest:{key}"),
            Self::Addendum { file } => write!(f, "addendum:{file}"),
        }
    }
}

/// An immutable, typed, unit-bearing value with provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    value: Value,
    unit: Unit,
    #[serde(skip_serializing_if = "is_default_hint")]
    hint: DisplayHint,
    provenance: Provenance,
    policy: ComparePolicy,
}

fn is_default_hint(h: &DisplayHint) -> bool {
    *h == DisplayHint::default()
}

impl Field {
    /// Construct a field with the default hint and `compare` policy.
    pub fn new(value: Value, unit: Unit, provenance: Provenance) -> Self {
        Self {
            value,
            unit,
            hint: DisplayHint::default(),
            provenance,
            policy: ComparePolicy::Compare,
        }
    }

    /// An `unknown` field whose provenance records `reason`.
    pub fn unknown(unit: Unit, provenance: Provenance, reason: impl Into<String>) -> Self {
        Self::new(Value::Unknown, unit, provenance.with_error(reason))
    }

    /// Replace the display hint.
    #[must_use]
    pub fn with_hint(mut self, hint: DisplayHint) -> Self {
        self.hint = hint;
        self
    }

    /// Replace the compare policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ComparePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// The display hint.
    pub fn hint(&self) -> DisplayHint {
        self.hint
    }

    /// The provenance.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// The compare policy.
    pub fn policy(&self) -> ComparePolicy {
        self.policy
    }

    /// Render the value (and unit, when meaningful) for humans.
    pub fn display_value(&self) -> String {
        let body = match &self.value {
            Value::Int(v) => match self.hint.style {
                DisplayStyle::Hex => format!("{v:#x}"),
                DisplayStyle::Grouped => group_digits(*v),
                DisplayStyle::Plain => v.to_string(),
            },
            Value::Real(v) => match self.hint.decimals {
                Some(places) => format!("{v:.prec$}", prec = usize::from(places)),
                None => v.to_string(),
            },
            Value::Bool(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Enum(v) => v.clone(),
            Value::Bytes(v) => hex::encode(v),
            Value::Unknown => return "unknown".to_owned(),
            Value::Absent => return "absent".to_owned(),
        };
        if self.unit.is_displayed() {
            format!("{body} {}", self.unit)
        } else {
            body
        }
    }
}
