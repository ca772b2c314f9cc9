use thiserror::Error;

use weave_flow::{EventEq, History, TextDumpOptions};

/// An assertion failure, located where possible.
#[derive(Debug, Error)]
pub enum AssertError {
    #[error("no assertion")]
    NotAsserted,

    #[error("expect {expect} events, got {got}")]
    EventCount { expect: usize, got: usize },

    #[error("event#{index} mismatch: {message}")]
    EventMismatch { index: usize, message: String },

    #[error("result mismatch")]
    TextMismatch,

    #[error("assert message: {0}")]
    Check(String),
}

/// How a test's actual history is compared against its expectation.
pub enum Expectation {
    /// Recorded text dump; equality is trimmed-text equality of both sides
    /// rendered with the same verbose dumper.
    Text(String),
    /// Recorded event history; length equality then pairwise structural
    /// equality, first mismatch wins.
    Events(History),
    /// Opaque predicate. The engine only consumes its outcome: `Ok` means
    /// pass, `Err(message)` means fail.
    Check(Box<dyn Fn(&History) -> Result<(), String> + Send + Sync>),
}

impl Expectation {
    pub fn assert(&self, actual: &History) -> Result<(), AssertError> {
        self.assert_with(actual, &EventEq::default())
    }

    pub fn assert_with(&self, actual: &History, eq: &EventEq) -> Result<(), AssertError> {
        match self {
            Expectation::Text(expect) => {
                let rendered = render_text(actual);
                if expect.trim() != rendered.trim() {
                    return Err(AssertError::TextMismatch);
                }
                Ok(())
            }
            Expectation::Events(expect) => {
                if expect.len() != actual.len() {
                    return Err(AssertError::EventCount {
                        expect: expect.len(),
                        got: actual.len(),
                    });
                }
                for (index, (want, got)) in expect.iter().zip(actual.iter()).enumerate() {
                    if let Err(message) = want.equal_to_with(got, eq) {
                        return Err(AssertError::EventMismatch { index, message });
                    }
                }
                Ok(())
            }
            Expectation::Check(check) => check(actual).map_err(AssertError::Check),
        }
    }

    /// The expected text dump, when this expectation can produce one.
    /// Used by the CLI to show a diff on failure.
    pub fn expected_text(&self) -> Option<String> {
        match self {
            Expectation::Text(s) => Some(s.clone()),
            Expectation::Events(h) => Some(render_text(h)),
            Expectation::Check(_) => None,
        }
    }
}

/// Both sides of a text assertion are rendered with the same dumper
/// configuration, so recorded files and live runs stay comparable.
pub fn render_text(history: &History) -> String {
    let mut buf = Vec::new();
    let opts = TextDumpOptions {
        verbose: true,
        with_lat: false,
    };
    // Writing into a Vec cannot fail.
    let _ = history.dump_text(&mut buf, &opts);
    String::from_utf8_lossy(&buf).into_owned()
}
