//! Filesystem helpers shared by every stage.
//!
//! A file counts as done once it exists and isn't empty. There is no completion marker, so a
//! file that was cut short with some bytes already written is taken as complete.

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::Result;

/// `true` if `path` exists and has a non-zero size. Only a missing file counts as absent,
/// any other metadata error is returned.
pub async fn is_present(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len() > 0),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Lists the regular files in `dir` in natural file-name order.
/// A directory that doesn't exist lists as empty.
pub async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compares names so that digit runs are ordered by value: `2.txt` < `10.txt`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_runs = runs(a);
    let mut b_runs = runs(b);
    loop {
        match (a_runs.next(), b_runs.next()) {
            // Equal by value ("01" vs "1"), fall back to plain ordering to stay total.
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = if starts_with_digit(x) && starts_with_digit(y) {
                    let x = x.trim_start_matches('0');
                    let y = y.trim_start_matches('0');
                    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
                } else {
                    x.cmp(y)
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Splits `s` into alternating runs of ASCII digits and everything else.
fn runs(s: &str) -> impl Iterator<Item = &str> + '_ {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(run)
    })
}

#[inline]
fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}
