use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::args::GenArgs;
use crate::paths::{recorded_result, script_for};

/// One generated manifest record: a script with its recorded expectation.
#[derive(Debug, Serialize)]
struct ManifestEntry {
    name: String,
    script: String,
    expect: String,
    negative: bool,
}

pub fn run_gen(args: &GenArgs) -> Result<()> {
    let entries = scan(&args.dir)?;
    serde_json::to_writer_pretty(io::stdout(), &entries)?;
    println!();
    Ok(())
}

fn scan(dir: &Path) -> Result<Vec<ManifestEntry>> {
    let mut results = Vec::new();
    let mut files = Vec::new();
    walk(dir, &mut files).with_context(|| format!("scan {}", dir.display()))?;
    files.sort();

    for path in files {
        let recorded = match recorded_result(&path) {
            Some(r) => r,
            None => continue,
        };
        let script = script_for(&recorded.base);
        if !script.is_file() {
            continue;
        }
        let name = recorded
            .base
            .strip_prefix(&format!("{}/", dir.display()))
            .unwrap_or(&recorded.base)
            .to_string();
        results.push(ManifestEntry {
            name,
            script: script.display().to_string(),
            expect: path.display().to_string(),
            negative: recorded.negative,
        });
    }
    Ok(results)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
