use crate::resultset::{ColumnDef, DataMismatch, ResultSet};

/// Pluggable per-cell equality for [`diff`].
///
/// The first checker whose `matches` accepts a cell decides its equality;
/// later checkers are not consulted for that cell.
pub trait ValueChecker {
    fn matches(&self, row: usize, col: usize, def: &ColumnDef) -> bool;
    fn equal(&self, v1: &[u8], v2: &[u8], def: &ColumnDef) -> bool;
}

/// Default checker: matches everything, compares raw bytes.
pub struct RawBytesChecker;

impl ValueChecker for RawBytesChecker {
    fn matches(&self, _row: usize, _col: usize, _def: &ColumnDef) -> bool {
        true
    }

    fn equal(&self, v1: &[u8], v2: &[u8], _def: &ColumnDef) -> bool {
        v1 == v2
    }
}

#[derive(Default)]
pub struct DiffOptions<'a> {
    pub check_schema: bool,
    /// Also compare precision/scale when comparing schemas.
    pub check_precision: bool,
    pub checkers: &'a [&'a dyn ValueChecker],
}

/// Compare two result sets structurally and report the first discrepancy.
///
/// Order of checks: exec-vs-row kind, exec fields, column count, row
/// count, schema (optional), then cells via the checker chain.
pub fn diff(rs1: &ResultSet, rs2: &ResultSet, opts: &DiffOptions<'_>) -> Result<(), DataMismatch> {
    if rs1.is_exec_result() != rs2.is_exec_result() {
        return Err(DataMismatch(format!(
            "result type mismatch: {} <> {}",
            rs1, rs2
        )));
    }
    if rs1.is_exec_result() {
        if rs1.exec() != rs2.exec() {
            return Err(DataMismatch(format!(
                "execute result mismatch: {:?} <> {:?}",
                rs1.exec(),
                rs2.exec()
            )));
        }
        return Ok(());
    }
    if rs1.n_cols() != rs2.n_cols() {
        return Err(DataMismatch(format!(
            "col count mismatch: {} <> {}",
            rs1.n_cols(),
            rs2.n_cols()
        )));
    }
    if rs1.n_rows() != rs2.n_rows() {
        return Err(DataMismatch(format!(
            "row count mismatch: {} <> {}",
            rs1.n_rows(),
            rs2.n_rows()
        )));
    }
    if opts.check_schema {
        diff_schema(rs1.cols(), rs2.cols(), opts)?;
    }

    let default_checker = RawBytesChecker;
    let fallback: [&dyn ValueChecker; 1] = [&default_checker];
    let checkers: &[&dyn ValueChecker] = if opts.checkers.is_empty() {
        &fallback
    } else {
        opts.checkers
    };

    for i in 0..rs1.n_rows() {
        for j in 0..rs1.n_cols() {
            let def = &rs1.cols()[j];
            let (v1, v2) = (
                rs1.raw_value(i as isize, j as isize).unwrap_or_default(),
                rs2.raw_value(i as isize, j as isize).unwrap_or_default(),
            );
            for checker in checkers {
                if checker.matches(i, j, def) {
                    if !checker.equal(v1, v2, def) {
                        return Err(DataMismatch(format!(
                            "data mismatch ({:?}#{}): {:?} <> {:?}",
                            def.name, i, v1, v2
                        )));
                    }
                    break;
                }
            }
        }
    }
    Ok(())
}

fn diff_schema(
    cols1: &[ColumnDef],
    cols2: &[ColumnDef],
    opts: &DiffOptions<'_>,
) -> Result<(), DataMismatch> {
    for (i, (t1, t2)) in cols1.iter().zip(cols2).enumerate() {
        if t1.name != t2.name {
            return Err(DataMismatch(format!(
                "schema mismatch: cols[{}].name: {} <> {}",
                i, t1.name, t2.name
            )));
        }
        if t1.type_name != t2.type_name {
            return Err(DataMismatch(format!(
                "schema mismatch: cols[{}].type: {} <> {}",
                i, t1.type_name, t2.type_name
            )));
        }
        if t1.nullable != t2.nullable {
            return Err(DataMismatch(format!(
                "schema mismatch: cols[{}].nullable: {:?} <> {:?}",
                i, t1.nullable, t2.nullable
            )));
        }
        if t1.length != t2.length {
            return Err(DataMismatch(format!(
                "schema mismatch: cols[{}].length: {:?} <> {:?}",
                i, t1.length, t2.length
            )));
        }
        if opts.check_precision && t1.precision_scale != t2.precision_scale {
            return Err(DataMismatch(format!(
                "schema mismatch: cols[{}].precision: {:?} <> {:?}",
                i, t1.precision_scale, t2.precision_scale
            )));
        }
    }
    Ok(())
}
