//! Event records and their canonical JSON encoding.
//!
//! Four event kinds make up a history: `Invoke` at submission, `Return` at
//! completion (carrying either a result set or a statement error), and the
//! `Block`/`Resume` pair around a detected lock wait. The JSON form is
//! binary-safe: result payloads travel as base64 over the gzip-framed
//! result-set encoding, with a human-friendly `data` view alongside.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use weave_common::SqlError;
use weave_resultset::{DigestOptions, ResultSet};

use crate::stmt::Stmt;

#[derive(Debug, Clone)]
pub struct Invoke {
    pub stmt: Stmt,
}

#[derive(Debug, Clone)]
pub struct Return {
    pub stmt: Stmt,
    /// Result set on success, statement error otherwise. Statement errors
    /// are ordinary data here, not evaluator failures.
    pub outcome: Result<ResultSet, SqlError>,
    /// Wall-clock start and end of the statement's execution.
    pub t: [SystemTime; 2],
}

#[derive(Debug, Clone)]
pub enum EventBody {
    Invoke(Invoke),
    Return(Return),
    Block,
    Resume,
}

/// One entry of a history, tagged with the session that produced it.
#[derive(Debug, Clone)]
pub struct Event {
    pub session: String,
    pub body: EventBody,
}

impl Event {
    pub fn invoke(stmt: Stmt) -> Self {
        Event {
            session: stmt.session.clone(),
            body: EventBody::Invoke(Invoke { stmt }),
        }
    }

    pub fn ret(ret: Return) -> Self {
        Event {
            session: ret.stmt.session.clone(),
            body: EventBody::Return(ret),
        }
    }

    pub fn block(session: impl Into<String>) -> Self {
        Event {
            session: session.into(),
            body: EventBody::Block,
        }
    }

    pub fn resume(session: impl Into<String>) -> Self {
        Event {
            session: session.into(),
            body: EventBody::Resume,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.body {
            EventBody::Invoke(_) => "Invoke",
            EventBody::Return(_) => "Return",
            EventBody::Block => "Block",
            EventBody::Resume => "Resume",
        }
    }

    /// Short `session:kind` label used in mismatch messages.
    fn tag(&self) -> String {
        format!("{}:{}", self.session, self.kind().to_lowercase())
    }

    /// Structural equality with the default error-code rule.
    pub fn equal_to(&self, other: &Event) -> Result<(), String> {
        self.equal_to_with(other, &EventEq::default())
    }

    /// Structural equality used by assertions.
    ///
    /// Kinds and sessions must match. `Invoke` compares statements
    /// field-wise. `Return` compares statements, then outcomes: two errors
    /// match on code alone when the code is a database number (`>= 0`),
    /// and on code plus message for harness codes or in strict mode; two
    /// successes must agree on exec-vs-row, and row results must have
    /// equal digests (the multiset digest when the statement is flagged
    /// UNORDERED).
    pub fn equal_to_with(&self, other: &Event, eq: &EventEq) -> Result<(), String> {
        if self.kind() != other.kind() || self.session != other.session {
            return Err(format!(
                "expect {}:{}, got {}:{}",
                self.session,
                self.kind(),
                other.session,
                other.kind()
            ));
        }
        let tag = self.tag();
        match (&self.body, &other.body) {
            (EventBody::Invoke(a), EventBody::Invoke(b)) => {
                if a.stmt != b.stmt {
                    return Err(format!("{}: expect {:?}, got {:?}", tag, a.stmt, b.stmt));
                }
                Ok(())
            }
            (EventBody::Return(a), EventBody::Return(b)) => {
                if a.stmt != b.stmt {
                    return Err(format!("{}: expect {:?}, got {:?}", tag, a.stmt, b.stmt));
                }
                match (&a.outcome, &b.outcome) {
                    (Err(e1), Err(e2)) => {
                        let message_sensitive = e1.code < 0 || eq.strict_messages;
                        if e1.code != e2.code || (message_sensitive && e1.message != e2.message) {
                            return Err(format!("{}: expect ({}), got ({})", tag, e1, e2));
                        }
                        Ok(())
                    }
                    (Err(e1), Ok(_)) => Err(format!("{}: expect ({}), got ok", tag, e1)),
                    (Ok(_), Err(e2)) => Err(format!("{}: expect a result, got ({})", tag, e2)),
                    (Ok(r1), Ok(r2)) => {
                        if r1.is_exec_result() != r2.is_exec_result() {
                            return Err(format!("{}: expect [{}], got [{}]", tag, r1, r2));
                        }
                        if !r1.is_exec_result() {
                            let opts = DigestOptions::default();
                            let (h1, h2) = if a.stmt.is_unordered() {
                                (r1.unordered_digest(opts), r2.unordered_digest(opts))
                            } else {
                                (r1.data_digest(opts), r2.data_digest(opts))
                            };
                            if h1 != h2 {
                                return Err(format!(
                                    "{}: expect digest {}, got {}",
                                    tag, h1, h2
                                ));
                            }
                        }
                        Ok(())
                    }
                }
            }
            _ => Ok(()),
        }
    }
}

/// Knobs for event equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventEq {
    /// Require full message equality for every error code, not just for
    /// harness codes. Guards against regressions where the same database
    /// code carries a different subcode in the message.
    pub strict_messages: bool,
}

// ── Wire form ──────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct WireEvent {
    kind: String,
    session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stmt: Option<Stmt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    t: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Vec<Vec<Option<String>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<SqlError>,
}

fn time_to_ns(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn ns_to_time(ns: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(ns.max(0) as u64)
}

impl Event {
    fn to_wire(&self) -> Result<WireEvent, String> {
        let mut wire = WireEvent {
            kind: self.kind().to_string(),
            session: self.session.clone(),
            stmt: None,
            t: None,
            data: None,
            result: None,
            error: None,
        };
        match &self.body {
            EventBody::Block | EventBody::Resume => {}
            EventBody::Invoke(inv) => wire.stmt = Some(inv.stmt.clone()),
            EventBody::Return(ret) => {
                wire.stmt = Some(ret.stmt.clone());
                wire.t = Some(vec![time_to_ns(ret.t[0]), time_to_ns(ret.t[1])]);
                match &ret.outcome {
                    Err(e) => wire.error = Some(e.clone()),
                    Ok(rs) => {
                        let raw = rs.encode().map_err(|e| e.to_string())?;
                        wire.result = Some(BASE64.encode(raw));
                        if !rs.is_exec_result() {
                            let mut data = Vec::with_capacity(rs.n_rows());
                            for i in 0..rs.n_rows() {
                                let mut row = Vec::with_capacity(rs.n_cols());
                                for j in 0..rs.n_cols() {
                                    if rs.is_null(i, j) {
                                        row.push(None);
                                    } else {
                                        let raw = rs
                                            .raw_value(i as isize, j as isize)
                                            .unwrap_or_default();
                                        row.push(Some(
                                            String::from_utf8_lossy(raw).into_owned(),
                                        ));
                                    }
                                }
                                data.push(row);
                            }
                            wire.data = Some(data);
                        }
                    }
                }
            }
        }
        Ok(wire)
    }

    fn from_wire(wire: WireEvent) -> Result<Event, String> {
        let body = match wire.kind.as_str() {
            "Block" => EventBody::Block,
            "Resume" => EventBody::Resume,
            "Invoke" => {
                let stmt = wire.stmt.ok_or("invoke data is missing")?;
                EventBody::Invoke(Invoke { stmt })
            }
            "Return" => {
                let stmt = wire.stmt.ok_or("return data is missing")?;
                let ts = wire.t.unwrap_or_default();
                let t = [
                    ns_to_time(ts.first().copied().unwrap_or(0)),
                    ns_to_time(ts.get(1).copied().unwrap_or(0)),
                ];
                let outcome = match (wire.error, wire.result) {
                    (Some(e), _) => Err(e),
                    (None, Some(b64)) => {
                        let raw = BASE64.decode(b64.as_bytes()).map_err(|e| e.to_string())?;
                        Ok(ResultSet::decode(&raw).map_err(|e| e.to_string())?)
                    }
                    (None, None) => {
                        return Err(
                            "invalid return event: `error` or `result` is missing".to_string()
                        )
                    }
                };
                EventBody::Return(Return { stmt, outcome, t })
            }
            other => return Err(format!("unknown event: {}", other)),
        };
        Ok(Event {
            session: wire.session,
            body,
        })
    }
}

impl Serialize for Event {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_wire().map_err(serde::ser::Error::custom)?.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let wire = WireEvent::deserialize(d)?;
        Event::from_wire(wire).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::flags;
    use weave_resultset::{ColumnDef, ExecSummary};

    fn row_result() -> ResultSet {
        let mut rs = ResultSet::new(vec![ColumnDef::new("v", "TEXT")]);
        rs.push_row(vec![Some(b"1".to_vec())]);
        rs.push_row(vec![None]);
        rs
    }

    fn ret_event(stmt: Stmt, outcome: Result<ResultSet, SqlError>) -> Event {
        let now = SystemTime::now();
        Event::ret(Return {
            stmt,
            outcome,
            t: [now, now + Duration::from_secs(1)],
        })
    }

    #[test]
    fn test_block_resume_wire_shape() {
        let js = serde_json::to_string(&Event::block("t")).unwrap();
        assert_eq!(js, r#"{"kind":"Block","session":"t"}"#);
        let back: Event = serde_json::from_str(&js).unwrap();
        assert!(matches!(back.body, EventBody::Block));
        assert_eq!(back.session, "t");
    }

    #[test]
    fn test_invoke_round_trip() {
        let ev = Event::invoke(Stmt::new("t", "select 1", flags::QUERY));
        let js = serde_json::to_string(&ev).unwrap();
        let back: Event = serde_json::from_str(&js).unwrap();
        assert!(ev.equal_to(&back).is_ok());
        assert!(js.contains(r#""stmt":{"s":"t","q":"select 1","flags":1}"#));
    }

    #[test]
    fn test_return_error_round_trip() {
        let ev = ret_event(
            Stmt::new("t", "update x", 0),
            Err(SqlError::db(1205, "Lock wait timeout exceeded")),
        );
        let js = serde_json::to_string(&ev).unwrap();
        assert!(js.contains(r#""error":{"code":1205"#));
        assert!(!js.contains("result"));
        let back: Event = serde_json::from_str(&js).unwrap();
        assert!(ev.equal_to(&back).is_ok());
    }

    #[test]
    fn test_return_rows_round_trip_carries_data_view() {
        let ev = ret_event(Stmt::new("t", "select v from x", flags::QUERY), Ok(row_result()));
        let js = serde_json::to_string(&ev).unwrap();
        assert!(js.contains(r#""data":[["1"],[null]]"#), "json: {}", js);
        assert!(js.contains(r#""result":""#));
        let back: Event = serde_json::from_str(&js).unwrap();
        assert!(ev.equal_to(&back).is_ok());
    }

    #[test]
    fn test_return_exec_has_no_data_view() {
        let ev = ret_event(
            Stmt::new("t", "create table x(a int)", 0),
            Ok(ResultSet::from_exec(ExecSummary {
                rows_affected: Some(0),
                last_insert_id: None,
            })),
        );
        let js = serde_json::to_string(&ev).unwrap();
        assert!(!js.contains(r#""data""#));
        let back: Event = serde_json::from_str(&js).unwrap();
        assert!(ev.equal_to(&back).is_ok());
    }

    #[test]
    fn test_return_timestamps_serialize_as_ns() {
        let t0 = UNIX_EPOCH + Duration::from_nanos(1_700_000_000_123_456_789);
        let ev = Event::ret(Return {
            stmt: Stmt::new("t", "select 1", flags::QUERY),
            outcome: Ok(row_result()),
            t: [t0, t0 + Duration::from_millis(5)],
        });
        let js = serde_json::to_value(&ev).unwrap();
        assert_eq!(js["t"][0].as_i64(), Some(1_700_000_000_123_456_789));
        assert_eq!(js["t"][1].as_i64(), Some(1_700_000_000_128_456_789));
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let err = serde_json::from_str::<Event>(r#"{"kind":"Oops","session":"t"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_decode_requires_result_or_error() {
        let err = serde_json::from_str::<Event>(
            r#"{"kind":"Return","session":"t","stmt":{"s":"t","q":"select 1"},"t":[0,0]}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_equal_to_kind_and_session() {
        let a = Event::block("a");
        assert!(a.equal_to(&Event::block("a")).is_ok());
        assert!(a.equal_to(&Event::block("b")).is_err());
        assert!(a.equal_to(&Event::resume("a")).is_err());
    }

    #[test]
    fn test_equal_to_db_error_matches_on_code_alone() {
        let s = Stmt::new("t", "update x", 0);
        let a = ret_event(s.clone(), Err(SqlError::db(1213, "Deadlock found")));
        let b = ret_event(s.clone(), Err(SqlError::db(1213, "Deadlock found; try restarting")));
        assert!(a.equal_to(&b).is_ok());

        let strict = EventEq {
            strict_messages: true,
        };
        assert!(a.equal_to_with(&b, &strict).is_err());

        let c = ret_event(s, Err(SqlError::db(1205, "Lock wait timeout")));
        assert!(a.equal_to(&c).is_err());
    }

    #[test]
    fn test_equal_to_harness_error_needs_message() {
        let s = Stmt::new("t", "select 1", flags::QUERY);
        let a = ret_event(s.clone(), Err(SqlError::harness("driver: bad conn")));
        let b = ret_event(s.clone(), Err(SqlError::harness("driver: bad conn")));
        let c = ret_event(s, Err(SqlError::harness("driver: gone away")));
        assert!(a.equal_to(&b).is_ok());
        assert!(a.equal_to(&c).is_err());
    }

    #[test]
    fn test_equal_to_digest_honors_unordered_flag() {
        let ordered = Stmt::new("t", "select v from x", flags::QUERY);
        let unordered = Stmt::new("t", "select v from x", flags::QUERY | flags::UNORDERED);

        let mut r1 = ResultSet::new(vec![ColumnDef::new("v", "TEXT")]);
        for v in ["1", "2", "3"] {
            r1.push_row(vec![Some(v.as_bytes().to_vec())]);
        }
        let mut r2 = ResultSet::new(vec![ColumnDef::new("v", "TEXT")]);
        for v in ["3", "1", "2"] {
            r2.push_row(vec![Some(v.as_bytes().to_vec())]);
        }

        let a = ret_event(ordered.clone(), Ok(r1.clone()));
        let b = ret_event(ordered, Ok(r2.clone()));
        assert!(a.equal_to(&b).is_err(), "ordered digest must differ");

        let a = ret_event(unordered.clone(), Ok(r1));
        let b = ret_event(unordered, Ok(r2));
        assert!(a.equal_to(&b).is_ok(), "multiset digest must match");
    }

    #[test]
    fn test_equal_to_exec_vs_row() {
        let s = Stmt::new("t", "select 1", flags::QUERY);
        let a = ret_event(s.clone(), Ok(row_result()));
        let b = ret_event(s, Ok(ResultSet::from_exec(ExecSummary::default())));
        assert!(a.equal_to(&b).is_err());
    }
}
