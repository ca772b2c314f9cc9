//! Event histories and their text/JSON renderings.

use std::io::{self, Read, Write};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventBody};
use weave_resultset::render_table;

/// The total ordered event stream of one evaluation. This is the unit of
/// assertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(pub Vec<Event>);

impl History {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.0.iter()
    }

    /// Event-callback form: append a copy of the event.
    pub fn collect(&mut self, e: &Event) {
        self.0.push(e.clone());
    }

    /// Render the whole history as the canonical text dump.
    pub fn dump_text<W: Write>(&self, w: &mut W, opts: &TextDumpOptions) -> io::Result<()> {
        for e in &self.0 {
            write_event(w, e, opts)?;
        }
        Ok(())
    }

    /// Write the history as a canonical JSON event array.
    pub fn dump_json<W: Write>(&self, w: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self)?;
        writeln!(w)
    }

    pub fn load_json<R: Read>(r: R) -> Result<History, serde_json::Error> {
        serde_json::from_reader(r)
    }
}

impl From<Vec<Event>> for History {
    fn from(events: Vec<Event>) -> Self {
        History(events)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextDumpOptions {
    /// Pretty-print row results as tables instead of a one-line summary.
    pub verbose: bool,
    /// Append a start/end/latency line after each completed statement.
    pub with_lat: bool,
}

/// Write one event in the canonical text form.
///
/// Invoke lines echo the statement text; everything else renders as a
/// `-- <session> >> ` comment so the dump stays a readable script.
pub fn write_event<W: Write>(w: &mut W, e: &Event, opts: &TextDumpOptions) -> io::Result<()> {
    match &e.body {
        EventBody::Invoke(inv) => writeln!(w, "{}", inv.stmt.sql),
        EventBody::Block => writeln!(w, "-- {} >> blocked", e.session),
        EventBody::Resume => writeln!(w, "-- {} >> resumed", e.session),
        EventBody::Return(ret) => {
            match &ret.outcome {
                Err(err) => writeln!(w, "-- {} >> {}", e.session, err)?,
                Ok(rs) => {
                    if opts.verbose && !rs.is_exec_result() {
                        for (idx, line) in render_table(rs).lines().enumerate() {
                            if idx == 0 {
                                writeln!(w, "-- {} >> {}", e.session, line)?;
                            } else {
                                writeln!(w, "-- {}    {}", e.session, line)?;
                            }
                        }
                    } else {
                        writeln!(w, "-- {} >> {}", e.session, rs)?;
                    }
                    if opts.with_lat {
                        let t0: DateTime<Local> = ret.t[0].into();
                        let t1: DateTime<Local> = ret.t[1].into();
                        let cost = ret.t[1]
                            .duration_since(ret.t[0])
                            .unwrap_or_default();
                        writeln!(
                            w,
                            "-- {}    {} ~ {} (cost {:?})",
                            e.session,
                            t0.format("%H:%M:%S%.3f"),
                            t1.format("%H:%M:%S%.3f"),
                            cost
                        )?;
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Return;
    use crate::stmt::{flags, Stmt};
    use std::time::{Duration, SystemTime};
    use weave_common::SqlError;
    use weave_resultset::{ColumnDef, ExecSummary, ResultSet};

    fn sample_history() -> History {
        let now = SystemTime::now();
        let later = now + Duration::from_millis(120);

        let mut rs = ResultSet::new(vec![ColumnDef::new("v", "TEXT")]);
        rs.push_row(vec![Some(b"1".to_vec())]);

        History(vec![
            Event::invoke(Stmt::new("a", "/* a */ select v from x", flags::QUERY)),
            Event::ret(Return {
                stmt: Stmt::new("a", "/* a */ select v from x", flags::QUERY),
                outcome: Ok(rs),
                t: [now, later],
            }),
            Event::invoke(Stmt::new("b", "/* b */ update x set v = 2", 0)),
            Event::block("b"),
            Event::resume("b"),
            Event::ret(Return {
                stmt: Stmt::new("b", "/* b */ update x set v = 2", 0),
                outcome: Ok(ResultSet::from_exec(ExecSummary {
                    rows_affected: Some(1),
                    last_insert_id: None,
                })),
                t: [now, later],
            }),
        ])
    }

    #[test]
    fn test_text_dump_non_verbose() {
        let mut out = Vec::new();
        sample_history()
            .dump_text(&mut out, &TextDumpOptions::default())
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "\
/* a */ select v from x
-- a >> 1 rows in set
/* b */ update x set v = 2
-- b >> blocked
-- b >> resumed
-- b >> 1 rows affected
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_text_dump_verbose_prefixes_table_lines() {
        let mut out = Vec::new();
        sample_history()
            .dump_text(
                &mut out,
                &TextDumpOptions {
                    verbose: true,
                    ..TextDumpOptions::default()
                },
            )
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("-- a >> +---+\n"), "dump:\n{}", text);
        assert!(text.contains("-- a    | v |\n"), "dump:\n{}", text);
        assert!(text.contains("-- a    | 1 |\n"), "dump:\n{}", text);
        // exec results stay one-line even in verbose mode
        assert!(text.contains("-- b >> 1 rows affected\n"));
    }

    #[test]
    fn test_text_dump_with_latency() {
        let mut out = Vec::new();
        sample_history()
            .dump_text(
                &mut out,
                &TextDumpOptions {
                    verbose: false,
                    with_lat: true,
                },
            )
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("(cost 120ms)"), "dump:\n{}", text);
        assert!(text.contains(" ~ "), "dump:\n{}", text);
    }

    #[test]
    fn test_text_dump_error_return() {
        let now = SystemTime::now();
        let h = History(vec![Event::ret(Return {
            stmt: Stmt::new("t", "/* t */ update x set v = 1", 0),
            outcome: Err(SqlError::db(1205, "Lock wait timeout exceeded")),
            t: [now, now],
        })]);
        let mut out = Vec::new();
        h.dump_text(&mut out, &TextDumpOptions::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "-- t >> E1205: Lock wait timeout exceeded\n"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let h = sample_history();
        let mut out = Vec::new();
        h.dump_json(&mut out).unwrap();
        let back = History::load_json(out.as_slice()).unwrap();
        assert_eq!(back.len(), h.len());
        for (a, b) in h.iter().zip(back.iter()) {
            assert!(a.equal_to(b).is_ok(), "{:?} != {:?}", a.kind(), b.kind());
        }
    }
}
