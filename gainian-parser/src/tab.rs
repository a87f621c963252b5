//! helpers of the three-field tab separated layout
//!
//! `code \t YYYY-MM-DD \t volume`, shared by standard and historical formats

use crate::record::content_lines;
use chrono::NaiveDate;
use gainian_utils::{parse_date_from_str, parse_volume, DateBounds};
use std::collections::BTreeMap;

pub(crate) fn tab_fields(line: &str) -> Option<(&str, &str, &str)> {
    let mut it = line.split('\t');
    let code = it.next()?;
    let date = it.next()?;
    let volume = it.next()?;
    if it.next().is_some() {
        return None;
    }
    Some((code, date, volume))
}

/// three fields, date parses, volume is a non-negative number
pub(crate) fn shape_ok(line: &str) -> bool {
    match tab_fields(line) {
        Some((code, date, volume)) => {
            !code.trim().is_empty()
                && parse_date_from_str(date).is_ok()
                && parse_volume(volume).map(|v| v >= 0.0).unwrap_or(false)
        }
        None => false,
    }
}

/// a leading title line such as `code\tdate\tvolume`
pub(crate) fn is_header(line: &str) -> bool {
    match tab_fields(line) {
        Some((_, date, volume)) => {
            parse_date_from_str(date).is_err() && parse_volume(volume).is_err()
        }
        None => false,
    }
}

/// first `n` non-empty data lines, a header line is skipped
pub(crate) fn sample(content: &str, n: usize) -> Vec<&str> {
    let mut lines = Vec::with_capacity(n);
    for (i, (_, line)) in content_lines(content).enumerate() {
        if i == 0 && is_header(line) {
            continue;
        }
        if lines.len() >= n {
            break;
        }
        lines.push(line);
    }
    lines
}

pub(crate) fn shape_ratio(sample: &[&str]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let good = sample.iter().filter(|l| shape_ok(l)).count();
    good as f64 / sample.len() as f64
}

/// occurrences of each in-range date in the date column of the whole content
pub(crate) fn date_frequencies(content: &str, bounds: &DateBounds) -> BTreeMap<NaiveDate, usize> {
    let mut freq = BTreeMap::new();
    for (_, l) in content_lines(content) {
        let date = tab_fields(l).and_then(|(_, d, _)| parse_date_from_str(d).ok());
        if let Some(d) = date.filter(|d| bounds.contains(*d)) {
            *freq.entry(d).or_insert(0) += 1;
        }
    }
    freq
}

/// share of dated lines carrying the most frequent date, 1 without dates
pub(crate) fn dominant_share(freq: &BTreeMap<NaiveDate, usize>) -> f64 {
    let dated: usize = freq.values().sum();
    match freq.values().max() {
        Some(&top) if dated > 0 => top as f64 / dated as f64,
        _ => 1.0,
    }
}

/// lines of a multi-date blob grouped by their date field
#[derive(Debug, Default)]
pub struct DateGroups {
    /// sub-content per date, ascending by date
    pub groups: BTreeMap<NaiveDate, String>,
    pub line_counts: BTreeMap<NaiveDate, usize>,
    /// lines without a parseable date field
    pub ungrouped: usize,
    pub warnings: Vec<String>,
}

/// single pass over the content, O(n) in its size
pub fn group_lines_by_date(content: &str) -> DateGroups {
    let mut dg = DateGroups::default();
    for (i, (line_no, line)) in content_lines(content).enumerate() {
        if i == 0 && is_header(line) {
            continue;
        }
        let date = tab_fields(line).and_then(|(_, d, _)| parse_date_from_str(d).ok());
        match date {
            Some(d) => {
                let sub = dg.groups.entry(d).or_insert_with(String::new);
                sub.push_str(line);
                sub.push('\n');
                *dg.line_counts.entry(d).or_insert(0) += 1;
            }
            None => {
                dg.ungrouped += 1;
                if dg.warnings.len() < crate::MAX_WARNINGS {
                    dg.warnings
                        .push(format!("line {}: no parseable trading date", line_no));
                }
            }
        }
    }
    dg
}
