use anyhow::Context;
use std::path::{Path, PathBuf};

fn match_options() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

/// Files directly in `dir` whose names match `pattern`, sorted by name.
/// Office lock files (`~$...`) are skipped.
pub fn discover(dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(pattern).with_context(|| format!("invalid file pattern {pattern:?}"))?;
    let opts = match_options();

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with("~$") {
            continue;
        }
        if pattern.matches_with(name, opts) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// First match of `pattern` in `dir`, if any.
pub fn first_match(dir: &Path, pattern: &str) -> anyhow::Result<Option<PathBuf>> {
    Ok(discover(dir, pattern)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discover_filters_sorts_and_skips_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xlsm", "a.XLSM", "~$a.xlsm", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("c.xlsm")).unwrap();

        let found = discover(dir.path(), "*.xlsm").unwrap();
        let names: Vec<_> = found.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["a.XLSM", "b.xlsm"]);
    }

    #[test]
    fn first_match_prefers_lowest_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gl_march.xlsx"), b"").unwrap();
        fs::write(dir.path().join("gl_april.xlsx"), b"").unwrap();
        fs::write(dir.path().join("bank.xls"), b"").unwrap();

        let gl = first_match(dir.path(), "gl*.xlsx").unwrap().unwrap();
        assert_eq!(gl.file_name().unwrap(), "gl_april.xlsx");
        assert!(first_match(dir.path(), "ledger*.xlsx").unwrap().is_none());
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path(), "[").is_err());
    }
}
