//! Declarative test suites and the assertion engine.
//!
//! A suite is a JSON array of test records produced by an external suite
//! evaluator (the embedded scripting language is a collaborator, not part
//! of this crate; its JSON output is the contract). Each record carries a
//! statement flow plus an expectation: a recorded text dump, a recorded
//! event history, or (for programmatic use) an opaque predicate over the
//! actual history.

mod assert;
mod diff;
mod suite;

pub use assert::{render_text, AssertError, Expectation};
pub use diff::render_local_diff;
pub use suite::{load_suite, SuiteError, TestCase};
