use serde::{Deserialize, Serialize};

/// Statement flag bits.
pub mod flags {
    /// Result-producing statement: issue a query and read all rows.
    pub const QUERY: u32 = 1 << 0;
    /// Barrier: drain all in-flight statements before this one starts.
    pub const WAIT: u32 = 1 << 1;
    /// Compare result rows as a multiset rather than a sequence.
    pub const UNORDERED: u32 = 1 << 2;
}

/// One SQL invocation attributed to a session.
///
/// The SQL text is stored in canonical form: the script line with its
/// trailing semicolon (and anything after it) stripped. Both the text and
/// JSON outputs preserve this form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(rename = "s")]
    pub session: String,
    #[serde(rename = "q")]
    pub sql: String,
    #[serde(default, skip_serializing_if = "flags_empty")]
    pub flags: u32,
}

fn flags_empty(flags: &u32) -> bool {
    *flags == 0
}

impl Stmt {
    pub fn new(session: impl Into<String>, sql: impl Into<String>, flags: u32) -> Self {
        Stmt {
            session: session.into(),
            sql: sql.into(),
            flags,
        }
    }

    pub fn is_query(&self) -> bool {
        self.flags & flags::QUERY != 0
    }

    pub fn is_wait(&self) -> bool {
        self.flags & flags::WAIT != 0
    }

    pub fn is_unordered(&self) -> bool {
        self.flags & flags::UNORDERED != 0
    }
}
