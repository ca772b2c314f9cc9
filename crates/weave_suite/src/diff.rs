use std::fs;
use std::io::{self, Write};
use std::process::Command;

use tracing::debug;

/// Render an expected-vs-actual diff with an external diff command.
///
/// Both sides are written to a scratch directory and the configured
/// command (e.g. `diff -u -N --color`) is run against them, its stdout
/// copied to `w`. The diff command exiting non-zero is the normal case
/// for differing inputs, not an error.
pub fn render_local_diff<W: Write>(
    w: &mut W,
    name: &str,
    expected: &str,
    actual: &str,
    diff_cmd: &[String],
) -> io::Result<()> {
    let (program, args) = match diff_cmd.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    let dir = tempfile::tempdir()?;
    let expected_path = dir.path().join("expected");
    let actual_path = dir.path().join("actual");
    fs::write(&expected_path, expected)?;
    fs::write(&actual_path, actual)?;

    debug!(test = name, command = program, "rendering local diff");
    let output = Command::new(program)
        .args(args)
        .arg(&expected_path)
        .arg(&actual_path)
        .output()?;

    writeln!(w, "--- diff for {} ---", name)?;
    w.write_all(&output.stdout)?;
    if !output.stderr.is_empty() {
        w.write_all(&output.stderr)?;
    }
    Ok(())
}
