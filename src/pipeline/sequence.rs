//! Sequencer: natural-sort the discovered images and assign page indices.
//!
//! A file name is split into alternating text and digit runs. Text runs
//! compare case-insensitively; digit runs compare as unbounded non-negative
//! integers, so `img2.png` sorts before `img10.png` and a 40-digit run never
//! overflows. The sort is stable: names with equal keys (`a01.png`, `a1.png`)
//! keep their input order.

use crate::output::ImageTask;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

static RE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+|[^0-9]+").unwrap());

/// One run of a [`NaturalKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Run {
    /// Lowercased non-digit text.
    Text(String),
    /// ASCII digits with leading zeros removed (`"0"` becomes `""`).
    Number(String),
}

impl Ord for Run {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Run::Text(a), Run::Text(b)) => a.cmp(b),
            (Run::Number(a), Run::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            // Runs alternate from a leading text run, so mixed pairs only
            // arise past the end of one key's pattern; keep numbers first.
            (Run::Number(_), Run::Text(_)) => Ordering::Less,
            (Run::Text(_), Run::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Run {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key for natural ordering of file names.
///
/// Always begins with a (possibly empty) text run, so keys line up
/// text-against-text and number-against-number when compared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<Run>);

impl NaturalKey {
    pub fn new(name: &str) -> Self {
        let mut runs = Vec::new();
        for m in RE_RUNS.find_iter(name) {
            let s = m.as_str();
            if s.as_bytes()[0].is_ascii_digit() {
                if runs.is_empty() {
                    runs.push(Run::Text(String::new()));
                }
                runs.push(Run::Number(s.trim_start_matches('0').to_string()));
            } else {
                runs.push(Run::Text(s.to_lowercase()));
            }
        }
        if runs.is_empty() {
            runs.push(Run::Text(String::new()));
        }
        NaturalKey(runs)
    }

    /// Key for a path's file name; falls back to the whole path.
    pub fn for_path(path: &Path) -> Self {
        match path.file_name() {
            Some(name) => Self::new(&name.to_string_lossy()),
            None => Self::new(&path.to_string_lossy()),
        }
    }
}

/// Order `paths` naturally and assign zero-based, contiguous indices.
pub fn sequence(mut paths: Vec<PathBuf>) -> Vec<ImageTask> {
    paths.sort_by_cached_key(|p| NaturalKey::for_path(p));
    paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| ImageTask { index, path })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tasks: &[ImageTask]) -> Vec<String> {
        tasks
            .iter()
            .map(|t| t.path.to_string_lossy().into_owned())
            .collect()
    }

    fn seq(input: &[&str]) -> Vec<String> {
        names(&sequence(input.iter().map(PathBuf::from).collect()))
    }

    #[test]
    fn numbers_sort_by_value() {
        assert_eq!(
            seq(&["img10.png", "img2.png", "img1.png"]),
            vec!["img1.png", "img2.png", "img10.png"]
        );
    }

    #[test]
    fn text_is_case_insensitive() {
        assert_eq!(
            seq(&["b.png", "A.png", "c.png"]),
            vec!["A.png", "b.png", "c.png"]
        );
    }

    #[test]
    fn leading_digits_sort_before_text() {
        assert_eq!(
            seq(&["cover.png", "10.png", "9.png"]),
            vec!["9.png", "10.png", "cover.png"]
        );
    }

    #[test]
    fn equal_keys_keep_input_order() {
        assert_eq!(
            seq(&["page01.png", "page1.png", "page001.png"]),
            vec!["page01.png", "page1.png", "page001.png"]
        );
        assert_eq!(
            seq(&["page1.png", "page01.png"]),
            vec!["page1.png", "page01.png"]
        );
    }

    #[test]
    fn huge_numbers_do_not_overflow() {
        let big = format!("p{}.png", "9".repeat(40));
        let bigger = format!("p1{}.png", "0".repeat(40));
        let got = seq(&[&bigger, &big, "p5.png"]);
        assert_eq!(got, vec!["p5.png".to_string(), big, bigger]);
    }

    #[test]
    fn zero_sorts_first() {
        assert_eq!(seq(&["s1.png", "s0.png", "s00.png"]), vec!["s0.png", "s00.png", "s1.png"]);
    }

    #[test]
    fn uses_file_name_not_directory() {
        assert_eq!(
            seq(&["z/img2.png", "a/img10.png"]),
            vec!["z/img2.png", "a/img10.png"]
        );
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let tasks = sequence(vec![
            PathBuf::from("c3.jpg"),
            PathBuf::from("c1.jpg"),
            PathBuf::from("c2.jpg"),
        ]);
        let idx: Vec<usize> = tasks.iter().map(|t| t.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
        assert_eq!(tasks[0].path, PathBuf::from("c1.jpg"));
    }

    #[test]
    fn key_starts_with_text_run() {
        assert_eq!(
            NaturalKey::new("12ab"),
            NaturalKey(vec![
                Run::Text(String::new()),
                Run::Number("12".into()),
                Run::Text("ab".into()),
            ])
        );
        assert_eq!(NaturalKey::new(""), NaturalKey(vec![Run::Text(String::new())]));
    }
}
