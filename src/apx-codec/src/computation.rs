//! Computations (spec §4.H): the presentation-layer mapping between a
//! port's raw packed integer and the physical value an application sees
//! -- either a value table (raw integer -> name string) or a rational
//! scaling (raw integer -> physical float via `offset + raw*num/den`).
//! Both variants carry a common signed-or-unsigned range and a
//! hand-written `to_string` that renders a compact one-line summary
//! rather than deriving `Debug`.

use crate::error::{ApxError, Result};

/// The raw-integer range a computation applies over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationRange {
    Signed { lower: i32, upper: i32 },
    Unsigned { lower: u32, upper: u32 },
}

impl ComputationRange {
    fn contains(&self, raw: i64) -> bool {
        match *self {
            ComputationRange::Signed { lower, upper } => {
                raw >= lower as i64 && raw <= upper as i64
            }
            ComputationRange::Unsigned { lower, upper } => {
                raw >= lower as i64 && raw <= upper as i64
            }
        }
    }

    fn offset(&self) -> i64 {
        match *self {
            ComputationRange::Signed { lower, .. } => lower as i64,
            ComputationRange::Unsigned { lower, .. } => lower as i64,
        }
    }

    /// `(lo, hi)` widened to `i64`, for rendering in `to_display_string`.
    pub fn bounds_i64(&self) -> (i64, i64) {
        match *self {
            ComputationRange::Signed { lower, upper } => (lower as i64, upper as i64),
            ComputationRange::Unsigned { lower, upper } => (lower as i64, upper as i64),
        }
    }
}

/// A raw integer <-> name mapping (an enum-like port's physical
/// presentation).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    pub range: ComputationRange,
    pub values: Vec<String>,
}

impl ValueTable {
    pub fn new(range: ComputationRange, values: Vec<String>) -> ValueTable {
        ValueTable { range, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks up the name for `raw`, or `None` if it falls outside the
    /// table's range or there is no entry for that offset.
    pub fn lookup(&self, raw: i64) -> Option<&str> {
        if !self.range.contains(raw) {
            return None;
        }
        let index = (raw - self.range.offset()) as usize;
        self.values.get(index).map(|s| s.as_str())
    }

    /// Finds the raw value whose name is `name`, if any.
    pub fn reverse_lookup(&self, name: &str) -> Option<i64> {
        self.values
            .iter()
            .position(|v| v == name)
            .map(|i| self.range.offset() + i as i64)
    }

    /// Canonical `VT(lo,hi,"v0","v1",…,"vN")` form (spec §4.H). Used both
    /// for display and as the dedup key the node manager groups
    /// computation lists by.
    pub fn to_display_string(&self) -> String {
        let (lo, hi) = self.range.bounds_i64();
        let quoted: Vec<String> = self.values.iter().map(|v| format!("\"{v}\"")).collect();
        format!("VT({lo},{hi},{})", quoted.join(","))
    }
}

/// A linear raw-integer <-> physical-float mapping: `physical = offset +
/// raw * numerator / denominator`.
#[derive(Debug, Clone, PartialEq)]
pub struct RationalScaling {
    pub range: ComputationRange,
    pub offset: f64,
    pub numerator: i32,
    pub denominator: i32,
    pub unit: String,
}

impl RationalScaling {
    pub fn new(
        range: ComputationRange,
        offset: f64,
        numerator: i32,
        denominator: i32,
        unit: impl Into<String>,
    ) -> Result<RationalScaling> {
        if denominator == 0 {
            return Err(ApxError::InvalidArgument(
                "rational scaling denominator cannot be zero".to_string(),
            ));
        }
        Ok(RationalScaling {
            range,
            offset,
            numerator,
            denominator,
            unit: unit.into(),
        })
    }

    pub fn to_physical(&self, raw: i64) -> f64 {
        self.offset + (raw as f64) * (self.numerator as f64) / (self.denominator as f64)
    }

    /// Inverse of `to_physical`, rounding to the nearest raw integer.
    pub fn to_raw(&self, physical: f64) -> i64 {
        ((physical - self.offset) * (self.denominator as f64) / (self.numerator as f64)).round()
            as i64
    }

    /// Canonical `RS(lo,hi,offset,numerator,denominator,"unit")` form (spec
    /// §4.H), offset printed with 8 decimal places.
    pub fn to_display_string(&self) -> String {
        let (lo, hi) = self.range.bounds_i64();
        format!(
            "RS({lo},{hi},{:.8},{},{},\"{}\")",
            self.offset, self.numerator, self.denominator, self.unit
        )
    }
}

/// Either flavor of computation a single port can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Computation {
    ValueTable(ValueTable),
    RationalScaling(RationalScaling),
}

impl Computation {
    pub fn to_display_string(&self) -> String {
        match self {
            Computation::ValueTable(vt) => vt.to_display_string(),
            Computation::RationalScaling(rs) => rs.to_display_string(),
        }
    }
}

/// An ordered, named group of computations a port definition may
/// reference (`apx_computationList_t`). Most ports use at most one
/// computation, but the reference format allows a shared list so several
/// ports can reuse the same value table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputationList {
    pub id: Option<u32>,
    pub computations: Vec<Computation>,
}

impl ComputationList {
    pub fn new() -> ComputationList {
        ComputationList::default()
    }

    pub fn push(&mut self, computation: Computation) {
        self.computations.push(computation);
    }

    pub fn get(&self, index: usize) -> Option<&Computation> {
        self.computations.get(index)
    }

    /// The combined string signature the node manager deduplicates
    /// computation lists by (spec §4.I step 6): each computation's display
    /// string, in order, joined with `;`.
    pub fn signature(&self) -> String {
        self.computations
            .iter()
            .map(Computation::to_display_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}
