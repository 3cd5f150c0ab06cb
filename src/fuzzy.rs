//! Fuzzy resolution of free-text queries against catalog names.

use std::path::Path;

use crate::catalog::MediaRecord;

/// Minimum score a candidate needs to be accepted.
pub const MATCH_THRESHOLD: f64 = 0.3;

/// Best catalog candidate for a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'a> {
  pub record: &'a MediaRecord,
  /// Similarity in `[0.0, 1.0]`.
  pub score: f64,
}

/// Score how well `query` matches `file_name`.
///
/// The extension of `file_name` is ignored. Containment in either direction
/// scores 1.0, otherwise the Ratcliff/Obershelp ratio is used.
pub fn score(query: &str, file_name: &str) -> f64 {
  let query = query.to_lowercase();
  let stem = Path::new(file_name)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or(file_name)
    .to_lowercase();

  if stem.contains(&query) || query.contains(&stem) {
    return 1.0;
  }

  similarity(&query, &stem)
}

/// Pick the best record for `query`, or `None` if nothing reaches
/// [`MATCH_THRESHOLD`]. On equal scores the earlier record wins.
pub fn resolve<'a>(query: &str, records: &'a [MediaRecord]) -> Option<MatchResult<'a>> {
  let mut best: Option<MatchResult<'a>> = None;

  for record in records {
    let score = score(query, &record.name);
    let best_score = best.map(|m| m.score).unwrap_or(0.0);
    if score > best_score && score >= MATCH_THRESHOLD {
      best = Some(MatchResult { record, score });
    }
  }

  if let Some(m) = best {
    log::debug!(
      "Query {:?} resolved to {:?} (score {:.2})",
      query,
      m.record.name,
      m.score
    );
  }
  best
}

/// Ratcliff/Obershelp similarity: `2 * M / (|a| + |b|)` where `M` is the
/// number of characters in the matching blocks.
pub fn similarity(a: &str, b: &str) -> f64 {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  let total = a.len() + b.len();
  if total == 0 {
    return 1.0;
  }
  2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
  let mut matched = 0;
  let mut pending = vec![(0, a.len(), 0, b.len())];

  while let Some((alo, ahi, blo, bhi)) = pending.pop() {
    let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
    if size == 0 {
      continue;
    }
    matched += size;
    if alo < i && blo < j {
      pending.push((alo, i, blo, j));
    }
    if i + size < ahi && j + size < bhi {
      pending.push((i + size, ahi, j + size, bhi));
    }
  }

  matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, size)`, preferring the block that starts earliest in `a`,
/// then earliest in `b`.
fn longest_match(
  a: &[char],
  b: &[char],
  alo: usize,
  ahi: usize,
  blo: usize,
  bhi: usize,
) -> (usize, usize, usize) {
  let mut best = (alo, blo, 0);
  let width = bhi - blo + 1;
  // prev[t] = length of the common run ending at a[i - 1], b[blo + t - 1]
  let mut prev = vec![0usize; width];
  let mut cur = vec![0usize; width];

  for i in alo..ahi {
    for j in blo..bhi {
      let t = j - blo + 1;
      cur[t] = if a[i] == b[j] { prev[t - 1] + 1 } else { 0 };
      if cur[t] > best.2 {
        best = (i + 1 - cur[t], j + 1 - cur[t], cur[t]);
      }
    }
    std::mem::swap(&mut prev, &mut cur);
  }

  best
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  fn records(names: &[&str]) -> Vec<MediaRecord> {
    names
      .iter()
      .map(|name| MediaRecord {
        name: name.to_string(),
        path: PathBuf::from("/movies").join(name),
        size: 0,
        extension: ".mp4".to_string(),
      })
      .collect()
  }

  #[test]
  fn substring_scores_one() {
    let records = records(&["Alien.mp4", "Superman.mp4", "Zodiac.mp4"]);
    let m = resolve("superman", &records).unwrap();
    assert_eq!(m.record.name, "Superman.mp4");
    assert_eq!(m.score, 1.0);
  }

  #[test]
  fn containment_works_both_ways() {
    assert_eq!(score("Superman Returns 2006", "Superman.mkv"), 1.0);
    assert_eq!(score("man", "Superman.mkv"), 1.0);
  }

  #[test]
  fn unrelated_query_has_no_match() {
    let records = records(&["Alien.mp4", "Superman.mp4", "Batman Begins.mp4"]);
    assert!(resolve("zzqqxx", &records).is_none());
  }

  #[test]
  fn empty_catalog_has_no_match() {
    assert!(resolve("anything", &[]).is_none());
  }

  #[test]
  fn similarity_matches_known_ratios() {
    assert_eq!(similarity("abcd", "bcde"), 0.75);
    assert_eq!(similarity("abcd", "abxy"), 0.5);
    assert_eq!(similarity("", ""), 1.0);
    assert_eq!(similarity("abc", ""), 0.0);
    // Matching blocks "a" and "cd" are found on either side of the split.
    assert_eq!(similarity("abcd", "axcd"), 0.75);
  }

  #[test]
  fn below_threshold_is_rejected() {
    // "abc" vs "axyz" shares one character: 2 / 7 < 0.3
    let records = records(&["axyz.mp4"]);
    assert!(resolve("abc", &records).is_none());

    let records = self::records(&["abxy.mp4"]);
    let m = resolve("abcd", &records).unwrap();
    assert_eq!(m.score, 0.5);
  }

  #[test]
  fn ties_keep_the_first_record() {
    let records = records(&["Star Wars I.mp4", "Star Wars II.mp4"]);
    let m = resolve("star wars", &records).unwrap();
    assert_eq!(m.record.name, "Star Wars I.mp4");
  }

  #[test]
  fn best_score_wins_over_order() {
    let records = records(&["Batman.mp4", "Matrix.mp4"]);
    let m = resolve("matrx", &records).unwrap();
    assert_eq!(m.record.name, "Matrix.mp4");
    assert!(m.score > 0.8 && m.score < 1.0);
  }
}
