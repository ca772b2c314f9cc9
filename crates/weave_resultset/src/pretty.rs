use crate::resultset::ResultSet;

/// Render a result set as a bordered text table.
///
/// Row results list the schema's column names as the header; NULL cells
/// render as `NULL`. Exec results render their summary fields the same
/// way. The output always ends with a newline.
pub fn render_table(rs: &ResultSet) -> String {
    if rs.is_exec_result() {
        let exec = rs.exec();
        let row = vec![
            exec.rows_affected
                .map_or_else(|| "NULL".to_string(), |v| v.to_string()),
            exec.last_insert_id
                .map_or_else(|| "NULL".to_string(), |v| v.to_string()),
        ];
        return render(
            &["RowsAffected".to_string(), "LastInsertId".to_string()],
            &[row],
        );
    }

    let header: Vec<String> = (0..rs.n_cols())
        .map(|j| {
            rs.column_def(j as isize)
                .map(|c| c.name.clone())
                .unwrap_or_default()
        })
        .collect();
    let mut rows = Vec::with_capacity(rs.n_rows());
    for i in 0..rs.n_rows() {
        let mut row = Vec::with_capacity(rs.n_cols());
        for j in 0..rs.n_cols() {
            if rs.is_null(i, j) {
                row.push("NULL".to_string());
            } else {
                let raw = rs.raw_value(i as isize, j as isize).unwrap_or_default();
                row.push(String::from_utf8_lossy(raw).into_owned());
            }
        }
        rows.push(row);
    }
    render(&header, &rows)
}

fn render(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (j, cell) in row.iter().enumerate() {
            let w = cell.chars().count();
            if j < widths.len() && w > widths[j] {
                widths[j] = w;
            }
        }
    }

    let mut out = String::new();
    let border = border_line(&widths);
    out.push_str(&border);
    out.push_str(&format_row(header, &widths));
    out.push_str(&border);
    if !rows.is_empty() {
        for row in rows {
            out.push_str(&format_row(row, &widths));
        }
        out.push_str(&border);
    }
    out
}

fn border_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.push_str(&"-".repeat(w + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, w) in cells.iter().zip(widths) {
        let pad = w - cell.chars().count();
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad + 1));
        line.push('|');
    }
    line.push('\n');
    line
}
