use std::path::{Path, PathBuf};

const RESULT_TEXT_EXT: &str = ".result.out";
const RESULT_JSON_EXT: &str = ".result.json";
const NEG_MARK: &str = ".neg";

/// Expectation file paths for a played script: `<base>[.neg].result.out`
/// and `<base>[.neg].result.json`, where `<base>` is the script path
/// without its extension.
pub fn play_result_paths(script: &Path, negative: bool) -> (PathBuf, PathBuf) {
    let mut base = match script.extension() {
        Some(_) => script.with_extension(""),
        None => script.to_path_buf(),
    }
    .into_os_string()
    .into_string()
    .unwrap_or_else(|p| p.to_string_lossy().into_owned());
    if negative {
        base.push_str(NEG_MARK);
    }
    (
        PathBuf::from(format!("{base}{RESULT_TEXT_EXT}")),
        PathBuf::from(format!("{base}{RESULT_JSON_EXT}")),
    )
}

/// Recorded-result info derived from a file name, if it is one.
pub struct RecordedResult {
    /// Path without the `.neg` mark or result extension.
    pub base: String,
    pub negative: bool,
}

pub fn recorded_result(path: &Path) -> Option<RecordedResult> {
    let s = path.to_str()?;
    let base = s.strip_suffix(RESULT_JSON_EXT)?;
    let (base, negative) = match base.strip_suffix(NEG_MARK) {
        Some(b) => (b, true),
        None => (base, false),
    };
    Some(RecordedResult {
        base: base.to_string(),
        negative,
    })
}

/// The script a recorded result belongs to.
pub fn script_for(base: &str) -> PathBuf {
    PathBuf::from(format!("{base}.sql"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_result_paths() {
        let (text, json) = play_result_paths(Path::new("cases/locks.t.sql"), false);
        assert_eq!(text, PathBuf::from("cases/locks.t.result.out"));
        assert_eq!(json, PathBuf::from("cases/locks.t.result.json"));

        let (text, _) = play_result_paths(Path::new("cases/locks.t.sql"), true);
        assert_eq!(text, PathBuf::from("cases/locks.t.neg.result.out"));
    }

    #[test]
    fn test_recorded_result_parsing() {
        let r = recorded_result(Path::new("cases/locks.t.result.json")).unwrap();
        assert_eq!(r.base, "cases/locks.t");
        assert!(!r.negative);

        let r = recorded_result(Path::new("cases/locks.t.neg.result.json")).unwrap();
        assert_eq!(r.base, "cases/locks.t");
        assert!(r.negative);

        assert!(recorded_result(Path::new("cases/locks.t.sql")).is_none());
        assert_eq!(script_for("cases/locks.t"), PathBuf::from("cases/locks.t.sql"));
    }
}
