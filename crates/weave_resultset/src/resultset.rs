use std::fmt;
use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::cell::Expected;

/// Column metadata as reported by the driver.
///
/// `Option` fields model metadata the driver may not expose; an absent
/// field is distinct from a present zero and survives encode/decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision_scale: Option<(i64, i64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            type_name: type_name.into(),
            ..ColumnDef::default()
        }
    }
}

/// Outcome of a non-query statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
}

/// An immutable-after-build table of raw cell bytes.
///
/// A result set is either an *exec result* (empty schema, `exec` summary)
/// or a *row result*. Every row has exactly `cols.len()` cells; a cell is
/// raw bytes (possibly empty), and the `nils` bitmap marks which cells are
/// SQL NULL rather than empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    cols: Vec<ColumnDef>,
    data: Vec<Vec<Vec<u8>>>,
    nils: Vec<u64>,
    exec: ExecSummary,
}

impl ResultSet {
    /// An empty row result with the given schema.
    pub fn new(schema: Vec<ColumnDef>) -> Self {
        ResultSet {
            cols: schema,
            ..ResultSet::default()
        }
    }

    /// An exec result.
    pub fn from_exec(exec: ExecSummary) -> Self {
        ResultSet {
            exec,
            ..ResultSet::default()
        }
    }

    pub fn is_exec_result(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn exec(&self) -> ExecSummary {
        self.exec
    }

    pub fn n_rows(&self) -> usize {
        self.data.len()
    }

    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    /// Column metadata; negative indices wrap.
    pub fn column_def(&self, j: isize) -> Option<&ColumnDef> {
        wrap(j, self.cols.len()).map(|j| &self.cols[j])
    }

    /// Append one row. `None` cells are SQL NULL.
    ///
    /// The row must have exactly one cell per schema column.
    pub fn push_row(&mut self, cells: Vec<Option<Vec<u8>>>) {
        assert_eq!(
            cells.len(),
            self.cols.len(),
            "row width must match the schema"
        );
        let i = self.data.len();
        let mut row = Vec::with_capacity(cells.len());
        for (j, cell) in cells.into_iter().enumerate() {
            match cell {
                Some(bytes) => row.push(bytes),
                None => {
                    row.push(Vec::new());
                    self.mark_null(i, j);
                }
            }
        }
        self.data.push(row);
    }

    /// Raw bytes of a cell; negative indices wrap, out-of-range is `None`.
    ///
    /// A NULL cell yields an empty slice here; [`ResultSet::is_null`] is
    /// the source of truth for the NULL vs empty-string distinction.
    pub fn raw_value(&self, i: isize, j: isize) -> Option<&[u8]> {
        let i = wrap(i, self.data.len())?;
        let j = wrap(j, self.data[i].len())?;
        Some(self.data[i][j].as_slice())
    }

    /// Whether the cell at `(i, j)` is SQL NULL.
    pub fn is_null(&self, i: usize, j: usize) -> bool {
        let n = i * self.cols.len() + j;
        let (pos, off) = (n / 64, n % 64);
        pos < self.nils.len() && self.nils[pos] & (1 << off) != 0
    }

    fn mark_null(&mut self, i: usize, j: usize) {
        let n = i * self.cols.len() + j;
        let (pos, off) = (n / 64, n % 64);
        while self.nils.len() <= pos {
            self.nils.push(0);
        }
        self.nils[pos] |= 1 << off;
    }

    /// Deterministic SHA-1 over the selected cells, hex-encoded.
    ///
    /// Cells are visited in row-major order; each included cell is written
    /// as a 4-byte big-endian length prefix (high bit set iff the cell is
    /// NULL) followed by the (possibly mapped) raw bytes. With `sort` set
    /// the digest instead hashes the bytewise-sorted per-row digests,
    /// which makes it a row-multiset digest.
    ///
    /// Exec results digest to the empty string.
    pub fn data_digest(&self, opts: DigestOptions<'_>) -> String {
        if self.is_exec_result() {
            return String::new();
        }
        if opts.sort {
            return self.sorted_digest(opts);
        }
        let mut h = Sha1::new();
        for (i, row) in self.data.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                if let Some(filter) = opts.filter {
                    if !filter(i, j, v, &self.cols[j]) {
                        continue;
                    }
                }
                self.hash_cell(&mut h, i, j, opts.mapper);
            }
        }
        hex::encode(h.finalize())
    }

    /// Row-multiset digest: `data_digest` with `sort` forced on.
    pub fn unordered_digest(&self, opts: DigestOptions<'_>) -> String {
        self.data_digest(DigestOptions { sort: true, ..opts })
    }

    fn sorted_digest(&self, opts: DigestOptions<'_>) -> String {
        let mut digests: Vec<[u8; 20]> = Vec::with_capacity(self.data.len());
        for (i, row) in self.data.iter().enumerate() {
            let mut h = Sha1::new();
            for (j, v) in row.iter().enumerate() {
                if let Some(filter) = opts.filter {
                    if !filter(i, j, v, &self.cols[j]) {
                        continue;
                    }
                }
                self.hash_cell(&mut h, i, j, opts.mapper);
            }
            digests.push(h.finalize().into());
        }
        digests.sort_unstable();
        let mut h = Sha1::new();
        for d in &digests {
            h.update(d);
        }
        hex::encode(h.finalize())
    }

    fn hash_cell(&self, h: &mut Sha1, i: usize, j: usize, mapper: Option<CellMapper<'_>>) {
        let raw = match mapper {
            Some(f) => f(i, j, &self.data[i][j], &self.cols[j]),
            None => self.data[i][j].clone(),
        };
        let mut prefix = (raw.len() as u32).to_be_bytes();
        if self.is_null(i, j) {
            prefix[0] |= 0x80;
        }
        h.update(prefix);
        h.update(&raw);
    }

    /// Match this result set against an expected row table.
    ///
    /// Shape must match exactly; each cell is compared according to the
    /// expected value's kind (see [`Expected`]). Returns the first
    /// mismatch as an error.
    pub fn assert_data(&self, expect: &[Vec<Expected>]) -> Result<(), DataMismatch> {
        if expect.len() != self.n_rows() {
            return Err(DataMismatch(format!(
                "row count mismatch: {} <> {}",
                self.n_rows(),
                expect.len()
            )));
        }
        for (i, want_row) in expect.iter().enumerate() {
            if want_row.len() != self.n_cols() {
                return Err(DataMismatch(format!(
                    "invalid expected data: there are {} cols at {} row",
                    want_row.len(),
                    i
                )));
            }
            for (j, want) in want_row.iter().enumerate() {
                let name = &self.cols[j].name;
                let is_null = self.is_null(i, j);
                if matches!(want, Expected::Null) {
                    if is_null {
                        continue;
                    }
                    return Err(DataMismatch(format!(
                        "data mismatch ({:?}#{}): expect NULL but got {:?}",
                        name, i, self.data[i][j]
                    )));
                }
                if is_null {
                    return Err(DataMismatch(format!(
                        "data mismatch ({:?}#{}): expect {} but got NULL",
                        name, i, want
                    )));
                }
                let actual = self.data[i][j].as_slice();
                if !want.matches(&self.cols[j], actual) {
                    return Err(DataMismatch(format!(
                        "data mismatch ({:?}#{}): {} <> {}",
                        name,
                        i,
                        printable(actual),
                        want
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize to the gzip-framed self-describing encoding.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_to<W: Write>(&self, w: W) -> io::Result<()> {
        let mut enc = GzEncoder::new(w, Compression::default());
        serde_json::to_writer(&mut enc, self)?;
        enc.finish()?;
        Ok(())
    }

    pub fn decode(raw: &[u8]) -> Result<ResultSet, DecodeError> {
        Self::decode_from(raw)
    }

    pub fn decode_from<R: Read>(r: R) -> Result<ResultSet, DecodeError> {
        Ok(serde_json::from_reader(GzDecoder::new(r))?)
    }

    pub(crate) fn cols(&self) -> &[ColumnDef] {
        &self.cols
    }
}

impl fmt::Display for ResultSet {
    /// Short summary in the style of an interactive SQL client.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exec_result() {
            write!(f, "{} rows affected", self.exec.rows_affected.unwrap_or(0))
        } else if self.n_rows() == 0 {
            write!(f, "empty set")
        } else {
            write!(f, "{} rows in set", self.n_rows())
        }
    }
}

/// Render non-printable actual bytes as a debug list instead of text.
fn printable(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) if s.chars().all(|c| !c.is_control()) => s.to_string(),
        _ => format!("{:?}", raw),
    }
}

fn wrap(idx: isize, len: usize) -> Option<usize> {
    let idx = if idx < 0 { idx + len as isize } else { idx };
    if idx < 0 || idx as usize >= len {
        None
    } else {
        Some(idx as usize)
    }
}

pub type CellFilter<'a> = &'a dyn Fn(usize, usize, &[u8], &ColumnDef) -> bool;
pub type CellMapper<'a> = &'a dyn Fn(usize, usize, &[u8], &ColumnDef) -> Vec<u8>;

/// Options for [`ResultSet::data_digest`].
#[derive(Clone, Copy, Default)]
pub struct DigestOptions<'a> {
    /// Digest the sorted per-row digests instead of the raw cell stream.
    pub sort: bool,
    /// Cell selector; cells it rejects are left out of the digest.
    pub filter: Option<CellFilter<'a>>,
    /// Cell rewrite applied before hashing (e.g. float normalization).
    pub mapper: Option<CellMapper<'a>>,
}

/// First discrepancy found by `assert_data` or `diff`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DataMismatch(pub String);

/// Failure to decode an encoded result set.
#[derive(Debug, Error)]
#[error("decode result set: {0}")]
pub struct DecodeError(#[from] serde_json::Error);
