use chrono::NaiveDateTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Replaces every character that is not alphanumeric or in `keep` with `_`.
pub fn sanitize_component(s: &str, keep: &[char]) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || keep.contains(&c) { c } else { '_' })
        .collect()
}

/// `<dir>/<stem>.<ext>`, or the first free `<stem>(<n>).<ext>` when taken.
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    first_free(dir, stem, Some(ext))
}

fn first_free(dir: &Path, stem: &str, ext: Option<&str>) -> PathBuf {
    let name = |suffix: String| match ext {
        Some(ext) => dir.join(format!("{stem}{suffix}.{ext}")),
        None => dir.join(format!("{stem}{suffix}")),
    };
    let first = name(String::new());
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| name(format!("({n})")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Where `source` lands in `archive_dir`: same file name, or
/// `<stem>_<YYYYMMDDHHMMSS><.ext>` when that name is taken. Several
/// archives in the same second count up as `<stem>_<stamp>(<n>)<.ext>`.
pub fn archive_destination(source: &Path, archive_dir: &Path, now: NaiveDateTime) -> PathBuf {
    let name = source.file_name().map(PathBuf::from).unwrap_or_default();
    let plain = archive_dir.join(&name);
    if !plain.exists() {
        return plain;
    }
    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let stamped = format!("{stem}_{}", now.format("%Y%m%d%H%M%S"));
    first_free(archive_dir, &stamped, source.extension().and_then(|e| e.to_str()))
}

/// Moves a processed input into `archive_dir`, creating it when needed.
/// Falls back to copy-and-delete when a rename crosses filesystems.
pub fn archive_file(source: &Path, archive_dir: &Path, now: NaiveDateTime) -> io::Result<PathBuf> {
    fs::create_dir_all(archive_dir)?;
    let dest = archive_destination(source, archive_dir, now);
    if fs::rename(source, &dest).is_err() {
        fs::copy(source, &dest)?;
        fs::remove_file(source)?;
    }
    tracing::debug!(from = %source.display(), to = %dest.display(), "archived input");
    Ok(dest)
}
