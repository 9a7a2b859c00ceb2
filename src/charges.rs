//! Partial atomic charge table extraction.
//!
//! Result files carry their per-atom charges as the final loop of the mmCIF
//! document:
//!
//! ```text
//! loop_
//! _sb_ncbr_partial_atomic_charges.type_id
//! _sb_ncbr_partial_atomic_charges.atom_id
//! _sb_ncbr_partial_atomic_charges.charge
//! 1 1 -0.4157
//! 1 2 ?
//! ```
//!
//! Everything after the last `..._charges.charge` tag line is a data row, with
//! the charge in the third whitespace-delimited column. A charge of `?` means
//! the calculation produced no value for that atom. Any other token that is not
//! a finite number is rejected.

use std::{
    fmt,
    fs,
    io::{self, BufRead},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Tag line that immediately precedes the charge rows.
pub const CHARGES_MARKER: &str = "_sb_ncbr_partial_atomic_charges.charge";

/// The only accepted placeholder for an atom without a computed charge.
pub const UNKNOWN_CHARGE: &str = "?";

/// Zero-based column holding the charge in each data row.
const CHARGE_COLUMN: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("charge table marker `{CHARGES_MARKER}` not found")]
    MarkerNotFound,

    #[error("charge row on line {line} has fewer than {} columns: `{content}`", CHARGE_COLUMN + 1)]
    MalformedRow { line: usize, content: String },

    #[error("invalid charge `{token}` on line {line}")]
    InvalidCharge { line: usize, token: String },

    #[error("failed to read charge file: {0}")]
    Io(#[from] io::Error),
}

/// Charge of a single atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Charge {
    Known(f64),
    Unknown,
}

impl Charge {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Known(v) => Some(*v),
            Self::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Token was neither the sentinel nor a finite number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChargeToken;

impl FromStr for Charge {
    type Err = InvalidChargeToken;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNKNOWN_CHARGE {
            return Ok(Self::Unknown);
        }
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Self::Known(v)),
            _ => Err(InvalidChargeToken),
        }
    }
}

impl fmt::Display for Charge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{v:.4}"),
            Self::Unknown => f.write_str(UNKNOWN_CHARGE),
        }
    }
}

/// How the summed charge of a structure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeRounding {
    /// Nearest integer, ties to even.
    #[default]
    Nearest,
    Unrounded,
}

impl ChargeRounding {
    pub fn apply(&self, total: f64) -> f64 {
        match self {
            Self::Nearest => total.round_ties_even(),
            Self::Unrounded => total,
        }
    }
}

impl FromStr for ChargeRounding {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "unrounded" | "none" => Ok(Self::Unrounded),
            other => Err(anyhow::anyhow!("Unknown charge rounding `{other}` (expected `nearest` or `unrounded`)")),
        }
    }
}

/// Aggregate statistics over one structure's charge table.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeSummary {
    pub atom_count: usize,
    pub unknown_count: usize,
    pub total_charge: f64,
    /// Largest absolute known charge, to 4 decimal places.
    /// `None` when no atom has a known charge.
    pub max_abs_charge: Option<f64>,
}

impl ChargeSummary {
    pub fn known_count(&self) -> usize {
        self.atom_count - self.unknown_count
    }
}

/// Per-atom charges of a structure, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChargeRecord {
    charges: Vec<Charge>,
}

impl ChargeRecord {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        log::debug!("Reading charges from {}", path.as_ref().display());
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    /// Parse the charge table that follows the last marker line in `text`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let lines: Vec<&str> = text.lines().collect();
        let marker = lines
            .iter()
            .rposition(|line| line.trim() == CHARGES_MARKER)
            .ok_or(ParseError::MarkerNotFound)?;

        let mut charges = Vec::with_capacity(lines.len() - marker - 1);
        for (idx, line) in lines.iter().enumerate().skip(marker + 1) {
            let row = line.trim();
            // Blank lines and the `#` loop terminator carry no atoms.
            if row.is_empty() || row.starts_with('#') {
                continue;
            }
            let Some(token) = row.split_whitespace().nth(CHARGE_COLUMN) else {
                return Err(ParseError::MalformedRow { line: idx + 1, content: row.into() });
            };
            let charge = token.parse::<Charge>().map_err(|_| ParseError::InvalidCharge {
                line: idx + 1,
                token: token.into(),
            })?;
            charges.push(charge);
        }
        Ok(Self { charges })
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }

    pub fn charges(&self) -> &[Charge] {
        &self.charges
    }

    pub fn known(&self) -> impl Iterator<Item = f64> + '_ {
        self.charges.iter().filter_map(Charge::value)
    }

    pub fn summary(&self, rounding: ChargeRounding) -> ChargeSummary {
        let unknown_count = self.charges.iter().filter(|c| c.is_unknown()).count();
        // Summed in file order
        let total: f64 = self.known().sum();
        let max_abs_charge = self
            .known()
            .map(f64::abs)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
            .map(round_4dp);
        ChargeSummary {
            atom_count: self.charges.len(),
            unknown_count,
            total_charge: rounding.apply(total),
            max_abs_charge,
        }
    }

    /// Plain-text listing offered for download: the code on the first line,
    /// then every charge in file order separated by single spaces. Known
    /// charges are printed in their shortest exact form, so no precision of
    /// the source table is lost.
    pub fn listing(&self, code: impl fmt::Display) -> String {
        let mut out = String::with_capacity(16 + self.charges.len() * 8);
        out.push_str(&format!("{code}\n"));
        let mut first = true;
        for charge in &self.charges {
            if !first {
                out.push(' ');
            }
            first = false;
            match charge {
                Charge::Known(v) => out.push_str(&v.to_string()),
                Charge::Unknown => out.push_str(UNKNOWN_CHARGE),
            }
        }
        out
    }
}

/// Round on the exact decimal expansion, so `2.54595` (stored just below
/// the half) becomes `2.5459` rather than `2.546`.
fn round_4dp(v: f64) -> f64 {
    format!("{v:.4}").parse().unwrap_or(v)
}
