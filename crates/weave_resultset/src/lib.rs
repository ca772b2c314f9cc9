//! Byte-preserving result sets.
//!
//! One query's rows are held verbatim as the driver's textual encoding,
//! with a one-bit-per-cell side table distinguishing SQL NULL from the
//! empty byte string. On top of that the module provides deterministic
//! SHA-1 digests (row-ordered or row-multiset), a first-discrepancy diff,
//! an expected-rows assertion helper, and a gzip-framed self-describing
//! encoding whose round-trip preserves digests, schema presence flags and
//! the NULL/empty distinction.

mod cell;
mod check;
mod pretty;
mod resultset;

pub use cell::{Bin, BinBool, BitCell, Cell, Expected, FloatCell};
pub use check::{diff, DiffOptions, RawBytesChecker, ValueChecker};
pub use pretty::render_table;
pub use resultset::{
    CellFilter, CellMapper, ColumnDef, DataMismatch, DecodeError, DigestOptions, ExecSummary,
    ResultSet,
};
