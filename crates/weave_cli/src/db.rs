use anyhow::{bail, Result};

use weave_flow::Driver;
use weave_sqlite::SqliteDriver;

/// Resolve a DSN to a driver. Only the SQLite adapter ships with the
/// harness; other databases plug in through the driver contract.
pub fn open_driver(dsn: &str) -> Result<Box<dyn Driver>> {
    if let Some(driver) = SqliteDriver::from_dsn(dsn) {
        return Ok(Box::new(driver));
    }
    bail!("unsupported dsn {dsn:?} (expected sqlite:<path>)");
}
