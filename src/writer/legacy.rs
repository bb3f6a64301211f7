//! Legacy SWAT text files: a `YYYYMMDD` start date line, then one line per day of
//! comma-separated values. Lines are newline-joined with no trailing newline.
use itertools::Itertools;

use crate::{series::{Parameter, SubbasinSeries}, utils::fmt_2dp};

pub(super) fn render_series(series: &SubbasinSeries, params: &[Parameter]) -> String {
    let first_line = series.start_date()
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default();

    let data_lines = (0..series.len()).map(|i| {
        params.iter()
            .map(|&p| fmt_2dp(series.value_at(p, i)))
            .join(",")
    });

    std::iter::once(first_line).chain(data_lines).join("\n")
}

/// Read a legacy file back into its start date and per-day rows.
#[cfg(test)]
pub(super) fn parse_series(text: &str, ncol: usize) -> Option<(chrono::NaiveDate, Vec<Vec<Option<f64>>>)> {
    let mut lines = text.split('\n');
    let start = chrono::NaiveDate::parse_from_str(lines.next()?, "%Y%m%d").ok()?;
    let mut rows = vec![];
    for line in lines {
        let row: Vec<Option<f64>> = line.split(',')
            .map(|s| if s.is_empty() { None } else { s.parse().ok() })
            .collect();
        if row.len() != ncol {
            return None;
        }
        rows.push(row);
    }
    Some((start, rows))
}
