//! Position subdirectory discovery.
use std::cmp::Ordering;
use std::path::Path;

use crate::{Error, Result};

/// Names of the immediate subdirectories of `root`, in natural order.
///
/// Each subdirectory is one stage position of the acquisition.
/// Hidden directories (leading `.`) are not positions.
pub fn position_dirs(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        log::error!("{} is not a directory", root.display());
        return Err(Error::NotADirectory(root.to_path_buf()));
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if name.starts_with('.') => {
                log::debug!("skipping hidden subdirectory {name:?}");
            }
            Ok(name) => names.push(name),
            Err(name) => log::warn!("skipping non-UTF-8 subdirectory {name:?}"),
        }
    }
    if names.is_empty() {
        log::error!("no position subdirectories in {}", root.display());
        return Err(Error::NoSubdirectories(root.to_path_buf()));
    }
    natural_sort(&mut names);
    Ok(names)
}

/// Sort strings so that embedded runs of digits compare numerically.
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

/// Numeric-aware string comparison: `"pos2" < "pos10"`.
///
/// Digit runs of equal value but different width (`"07"` vs `"7"`)
/// fall back to comparing the runs as text, so the order stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a;
    let mut b = b;
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let (run_a, rest_a) = split_digits(a);
                let (run_b, rest_b) = split_digits(b);
                let ord = cmp_digit_runs(run_a, run_b).then_with(|| run_a.cmp(run_b));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                a = &a[ca.len_utf8()..];
                b = &b[cb.len_utf8()..];
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
