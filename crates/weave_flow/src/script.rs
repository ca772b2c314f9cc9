//! Statement-list parsing.
//!
//! The canonical text input is one statement per line, each tagged with a
//! session marker comment:
//!
//! ```text
//! /* a */ begin;
//! /* b:wait,unordered */ select v from t;
//! ```
//!
//! Lines that do not match the grammar are skipped, as are unknown marks.
//! Whether a statement is a query is decided by a prefix heuristic, not a
//! SQL parser.

use std::sync::OnceLock;

use regex::Regex;

use crate::stmt::{flags, Stmt};

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/\*\s*(\w+)(:[\w,]+)?\s*\*/\s+(.*);.*$").expect("statement line pattern")
    })
}

/// Parse a script into its statement list.
///
/// A statement's canonical SQL keeps the session marker (a plain SQL
/// comment) but drops the trailing semicolon and anything after it.
pub fn parse_script(input: &str) -> Vec<Stmt> {
    let mut stmts = Vec::with_capacity(16);
    for line in input.lines() {
        let caps = match line_re().captures(line) {
            Some(caps) => caps,
            None => continue,
        };
        let session = &caps[1];
        let body = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        let sql_end = caps.get(3).map(|m| m.end()).unwrap_or(0);

        let mut stmt_flags = 0;
        if is_query(body) {
            stmt_flags |= flags::QUERY;
        }
        if let Some(marks) = caps.get(2) {
            for mark in marks.as_str()[1..].split(',') {
                match mark.to_ascii_lowercase().as_str() {
                    "wait" => stmt_flags |= flags::WAIT,
                    "unordered" => stmt_flags |= flags::UNORDERED,
                    _ => {}
                }
            }
        }
        stmts.push(Stmt::new(session, &line[..sql_end], stmt_flags));
    }
    stmts
}

/// Prefix-based query-vs-exec heuristic.
pub fn is_query(sql: &str) -> bool {
    let sql = sql.trim_start().trim_start_matches('(').to_ascii_lowercase();
    ["select ", "show ", "admin show ", "explain ", "desc ", "describe "]
        .iter()
        .any(|prefix| sql.starts_with(prefix))
}
