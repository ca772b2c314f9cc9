//! Shared foundation for the sqlweave workspace: error taxonomy,
//! cancellation token, and harness configuration.

pub mod cancel;
pub mod config;
pub mod error;

pub use cancel::CancelToken;
pub use config::HarnessConfig;
pub use error::{EvalError, PoolError, SqlError, WeaveError, WeaveResult};
