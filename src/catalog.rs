//! Media catalog: the on-disk snapshot of playable files.
//!
//! The catalog is rescanned on every request; nothing is cached.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

/// Supported media file extensions (lowercase, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
  "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg",
];

/// A playable file found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
  /// File name including extension, e.g. `Superman.mp4`.
  pub name: String,
  /// Absolute path to the file.
  pub path: PathBuf,
  /// Size in bytes.
  pub size: u64,
  /// Extension with its leading dot, as found on disk (`.mp4`).
  pub extension: String,
}

impl MediaRecord {
  pub fn size_mb(&self) -> f64 {
    self.size as f64 / (1024.0 * 1024.0)
  }
}

fn supported_extension(path: &Path) -> Option<String> {
  let ext = path.extension()?.to_str()?;
  let lower = ext.to_ascii_lowercase();
  SUPPORTED_EXTENSIONS
    .contains(&lower.as_str())
    .then(|| format!(".{ext}"))
}

/// Scan `dir` for supported media files, sorted by name.
///
/// A missing directory yields an empty list. Entries that cannot be read are
/// skipped with a warning.
pub fn scan(dir: &Path) -> Vec<MediaRecord> {
  if !dir.is_dir() {
    log::debug!("Media directory {:?} does not exist", dir);
    return Vec::new();
  }

  let walker = WalkDir::new(dir)
    .follow_links(true)
    .min_depth(1)
    .max_depth(1)
    .sort_by_file_name();

  let mut records = Vec::new();
  for entry in walker {
    // Dangling links surface here too, since links are followed.
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) => {
        log::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
        continue;
      }
    };

    let path = entry.path();
    let Some(extension) = supported_extension(path) else {
      continue;
    };

    let metadata = match entry.metadata() {
      Ok(metadata) => metadata,
      Err(e) => {
        log::warn!("Skipping {:?}: {}", path, e);
        continue;
      }
    };
    if !metadata.is_file() {
      continue;
    }

    let Some(name) = entry.file_name().to_str().map(str::to_string) else {
      log::warn!("Skipping {:?}: file name is not valid UTF-8", path);
      continue;
    };

    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    records.push(MediaRecord {
      name,
      path,
      size: metadata.len(),
      extension,
    });
  }

  records.sort_by(|a, b| a.name.cmp(&b.name));

  let mut seen = HashSet::new();
  records.retain(|record| {
    let unique = seen.insert(record.name.to_lowercase());
    if !unique {
      log::warn!(
        "Ignoring {:?}: another file has the same name ignoring case",
        record.path
      );
    }
    unique
  });

  log::debug!("Scanned {} media file(s) in {:?}", records.len(), dir);
  records
}

/// Case-insensitive exact name lookup.
pub fn find_exact<'a>(records: &'a [MediaRecord], query: &str) -> Option<&'a MediaRecord> {
  let query = query.to_lowercase();
  records.iter().find(|r| r.name.to_lowercase() == query)
}

/// Render the listing returned by the `list` command.
pub fn format_listing(dir: &Path, records: &[MediaRecord]) -> String {
  if records.is_empty() {
    return if dir.is_dir() {
      format!("No media files found in {}", dir.display())
    } else {
      format!("Media directory does not exist: {}", dir.display())
    };
  }

  let mut out = format!(
    "Found {} media file(s) in {}:\n\n",
    records.len(),
    dir.display()
  );
  for (i, record) in records.iter().enumerate() {
    let _ = writeln!(out, "{}. {}", i + 1, record.name);
    let _ = writeln!(out, "   Path: {}", record.path.display());
    let _ = writeln!(out, "   Size: {:.2} MB", record.size_mb());
    let _ = writeln!(out, "   Type: {}\n", record.extension);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn touch(dir: &Path, name: &str, len: usize) {
    std::fs::write(dir.join(name), vec![0u8; len]).unwrap();
  }

  #[test]
  fn missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(scan(&missing).is_empty());
    assert!(format_listing(&missing, &[]).starts_with("Media directory does not exist"));
  }

  #[test]
  fn empty_directory_has_its_own_message() {
    let dir = tempfile::tempdir().unwrap();
    assert!(format_listing(dir.path(), &[]).starts_with("No media files found"));
  }

  #[test]
  fn keeps_only_supported_files_sorted_by_name() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Zodiac.mkv", 3);
    touch(dir.path(), "Alien.MP4", 5);
    touch(dir.path(), "notes.txt", 1);
    touch(dir.path(), "README", 1);
    std::fs::create_dir(dir.path().join("Folder.mp4")).unwrap();

    let records = scan(dir.path());
    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Alien.MP4", "Zodiac.mkv"]);

    assert_eq!(records[0].extension, ".MP4");
    assert_eq!(records[0].size, 5);
    assert!(records[0].path.is_absolute());
    assert_eq!(records[1].extension, ".mkv");
  }

  #[test]
  fn exact_lookup_ignores_case() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Superman.mp4", 1);
    let records = scan(dir.path());

    assert_eq!(
      find_exact(&records, "superman.MP4").map(|r| r.name.as_str()),
      Some("Superman.mp4")
    );
    assert!(find_exact(&records, "superman").is_none());
  }

  #[test]
  fn listing_shows_every_record() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Alien.mp4", 1024 * 1024);
    touch(dir.path(), "Brazil.avi", 0);
    let records = scan(dir.path());

    let listing = format_listing(dir.path(), &records);
    assert!(listing.starts_with("Found 2 media file(s)"));
    assert!(listing.contains("1. Alien.mp4"));
    assert!(listing.contains("   Size: 1.00 MB"));
    assert!(listing.contains("2. Brazil.avi"));
    assert!(listing.contains("   Type: .avi"));
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn names_differing_only_in_case_keep_the_first() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "alien.MP4", 2);
    touch(dir.path(), "Alien.mp4", 1);

    let records = scan(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Alien.mp4");
    assert_eq!(records[0].size, 1);
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn non_utf8_names_are_skipped() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(OsStr::from_bytes(b"\xff.mp4")), b"x").unwrap();
    touch(dir.path(), "Heat.mkv", 1);

    let names: Vec<_> = scan(dir.path()).into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Heat.mkv"]);
  }

  #[cfg(unix)]
  #[test]
  fn links_are_followed_and_dangling_ones_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    touch(elsewhere.path(), "Brazil.avi", 4);

    std::os::unix::fs::symlink(elsewhere.path().join("Brazil.avi"), dir.path().join("Brazil.avi"))
      .unwrap();
    std::os::unix::fs::symlink(dir.path().join("gone.mp4"), dir.path().join("Ghost.mp4")).unwrap();

    let records = scan(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Brazil.avi");
    assert_eq!(records[0].size, 4);
  }
}
