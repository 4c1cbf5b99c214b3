use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Longest artist or title kept in a file name, in bytes. Two of these plus
/// the separator, disambiguator and extension stay under the usual 255 byte
/// name limit.
pub const MAX_COMPONENT_BYTES: usize = 100;

/// Cuts `s` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    &s[..end]
}

/// Replaces characters that cannot appear in a single path component and
/// caps its length.
#[must_use]
pub fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = truncate_on_char_boundary(&cleaned, MAX_COMPONENT_BYTES)
        .trim_end()
        .to_owned();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_owned(),
        _ => cleaned,
    }
}

/// `"<artist> - <title>"`, without extension.
#[must_use]
pub fn base_name(artist: &str, title: &str) -> String {
    format!("{} - {}", sanitize_component(artist), sanitize_component(title))
}

/// The `n`th candidate path: `n == 0` is the plain name, later ones carry a
/// `-(n)` disambiguator before the extension.
#[must_use]
pub fn candidate_path(dir: &Path, stem: &str, ext: &str, n: u32) -> PathBuf {
    if n == 0 {
        dir.join(format!("{stem}.{ext}"))
    } else {
        dir.join(format!("{stem}-({n}).{ext}"))
    }
}

/// Reserves a destination by creating it exclusively, scanning disambiguators
/// until creation succeeds. The returned path exists as an empty file.
pub fn claim_destination(dir: &Path, artist: &str, title: &str, ext: &str) -> io::Result<PathBuf> {
    let stem = base_name(artist, title);
    let mut n = 0;
    loop {
        let path = candidate_path(dir, &stem, ext, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Moves `src` onto `dest`, replacing it. Falls back to copy and remove when a
/// plain rename is not possible (different filesystems).
pub fn relocate(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                "rename {} -> {} failed ({}), copying instead",
                src.display(),
                dest.display(),
                rename_err
            );
            fs::copy(src, dest)?;
            fs::remove_file(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disambiguates_existing_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A - B.mp3"), b"x").unwrap();

        let second = claim_destination(dir.path(), "A", "B", "mp3").unwrap();
        assert_eq!(second.file_name().unwrap(), "A - B-(1).mp3");

        let third = claim_destination(dir.path(), "A", "B", "mp3").unwrap();
        assert_eq!(third.file_name().unwrap(), "A - B-(2).mp3");
    }

    #[test]
    fn long_components_are_cut_on_char_boundaries() {
        let title = "é".repeat(200);
        let artist = "a".repeat(300);

        let dir = tempfile::tempdir().unwrap();

        let name = base_name(&artist, &title);
        let path = claim_destination(dir.path(), &artist, &title, "mp3");

        assert!(name.len() <= 2 * MAX_COMPONENT_BYTES + 3);
        assert!(name.starts_with(&"a".repeat(MAX_COMPONENT_BYTES)));
        assert!(name.ends_with(&"é".repeat(MAX_COMPONENT_BYTES / 2)));
        assert!(path.is_ok());
    }

    #[test]
    fn separators_are_sanitized() {
        assert_eq!(base_name("AC/DC", "Back\\In Black"), "AC_DC - Back_In Black");
        assert_eq!(sanitize_component(".."), "_");
    }

    #[test]
    fn relocate_replaces_claimed_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("track.mp3");
        fs::write(&src, b"audio").unwrap();
        let dest = claim_destination(dir.path(), "A", "B", "mp3").unwrap();

        relocate(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"audio");
    }
}
