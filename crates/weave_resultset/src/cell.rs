use std::fmt;

use crate::resultset::ColumnDef;

/// An expected-cell predicate with driver-aware equality.
///
/// Used for values whose textual encoding is not stable enough for byte
/// equality, e.g. floats.
pub trait Cell: fmt::Display {
    fn equal_to(&self, def: &ColumnDef, raw: &[u8]) -> bool;
}

/// Float expectation with absolute tolerance.
///
/// Both sides are parsed as 64-bit floats; equal iff `|a - b| <= |delta|`.
/// A zero delta means exact equality after parsing.
pub struct FloatCell {
    pub v: String,
    pub delta: f64,
}

impl FloatCell {
    pub fn new(v: impl Into<String>, delta: f64) -> Self {
        FloatCell {
            v: v.into(),
            delta,
        }
    }
}

impl fmt::Display for FloatCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.v)
    }
}

impl Cell for FloatCell {
    fn equal_to(&self, _def: &ColumnDef, raw: &[u8]) -> bool {
        let want = match self.v.parse::<f64>() {
            Ok(v) => v,
            Err(_) => return false,
        };
        let got = match std::str::from_utf8(raw).ok().and_then(|s| s.parse::<f64>().ok()) {
            Some(v) => v,
            None => return false,
        };
        (want - got).abs() <= self.delta.abs()
    }
}

/// Single-byte bit expectation (MySQL `BIT(1)` style cells).
pub struct BitCell(pub u8);

impl fmt::Display for BitCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Cell for BitCell {
    fn equal_to(&self, _def: &ColumnDef, raw: &[u8]) -> bool {
        raw.first() == Some(&self.0)
    }
}

/// Byte-literal expectation for binary-protocol cells.
pub trait Bin {
    fn bytes(&self) -> Vec<u8>;
}

/// Boolean rendered as a single 0/1 byte.
pub struct BinBool(pub bool);

impl Bin for BinBool {
    fn bytes(&self) -> Vec<u8> {
        vec![self.0 as u8]
    }
}

/// One expected cell, in one of the supported shapes.
///
/// `ResultSet::assert_data` applies the shapes in declaration order: NULL,
/// raw bytes, binary literal, predicate cell, and finally textual equality
/// against the rendered expected value.
pub enum Expected {
    Null,
    Bytes(Vec<u8>),
    Bin(Box<dyn Bin>),
    Cell(Box<dyn Cell>),
    Text(String),
}

impl Expected {
    pub(crate) fn matches(&self, def: &ColumnDef, actual: &[u8]) -> bool {
        match self {
            // NULL is resolved against the nils bitmap before we get here.
            Expected::Null => false,
            Expected::Bytes(want) => actual == want.as_slice(),
            Expected::Bin(bin) => actual == bin.bytes().as_slice(),
            Expected::Cell(cell) => cell.equal_to(def, actual),
            Expected::Text(want) => actual == want.as_bytes(),
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Null => write!(f, "NULL"),
            Expected::Bytes(b) => write!(f, "{:?}", b),
            Expected::Bin(bin) => write!(f, "{:?}", bin.bytes()),
            Expected::Cell(c) => write!(f, "{}", c),
            Expected::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Expected {
    fn from(s: &str) -> Self {
        Expected::Text(s.to_string())
    }
}

impl From<String> for Expected {
    fn from(s: String) -> Self {
        Expected::Text(s)
    }
}

impl From<Vec<u8>> for Expected {
    fn from(b: Vec<u8>) -> Self {
        Expected::Bytes(b)
    }
}

impl From<&[u8]> for Expected {
    fn from(b: &[u8]) -> Self {
        Expected::Bytes(b.to_vec())
    }
}

impl From<i64> for Expected {
    fn from(v: i64) -> Self {
        Expected::Text(v.to_string())
    }
}

impl From<i32> for Expected {
    fn from(v: i32) -> Self {
        Expected::Text(v.to_string())
    }
}

impl From<u64> for Expected {
    fn from(v: u64) -> Self {
        Expected::Text(v.to_string())
    }
}

impl From<f64> for Expected {
    fn from(v: f64) -> Self {
        Expected::Text(v.to_string())
    }
}

impl From<FloatCell> for Expected {
    fn from(c: FloatCell) -> Self {
        Expected::Cell(Box::new(c))
    }
}

impl From<BitCell> for Expected {
    fn from(c: BitCell) -> Self {
        Expected::Cell(Box::new(c))
    }
}

impl From<BinBool> for Expected {
    fn from(b: BinBool) -> Self {
        Expected::Bin(Box::new(b))
    }
}
