//! SWAT+ climate files: the file name, a header line, a metadata line, then one
//! tab-separated `year, day of year, value(s)` line per day. Every line ends with a newline.
use chrono::Datelike;
use itertools::Itertools;

use crate::{series::{Parameter, SubbasinSeries}, subbasin::Subbasin, utils::fmt_2dp};

pub const HEADER_TOKENS: [&str; 5] = ["nbyr", "tstep", "lat", "lon", "elev"];

/// The time step code for daily data.
const DAILY_TSTEP: &str = "0";

/// Number of distinct calendar years covered by the series.
pub(super) fn years_of_record(series: &SubbasinSeries) -> usize {
    series.dates().iter().map(|d| d.year()).unique().count()
}

pub(super) fn render_series(file_name: &str, subbasin: &Subbasin, series: &SubbasinSeries, params: &[Parameter]) -> String {
    let mut out = String::new();
    out.push_str(file_name);
    out.push('\n');
    out.push_str(&HEADER_TOKENS.join("\t"));
    out.push('\n');

    let meta = [
        years_of_record(series).to_string(),
        DAILY_TSTEP.to_string(),
        format!("{:.2}", subbasin.lat),
        format!("{:.2}", subbasin.lon),
        format!("{:.2}", subbasin.elevation_or_default()),
    ];
    out.push_str(&meta.join("\t"));
    out.push('\n');

    for (i, date) in series.dates().iter().enumerate() {
        let values = params.iter().map(|&p| fmt_2dp(series.value_at(p, i)));
        let line = [date.year().to_string(), date.ordinal().to_string()]
            .into_iter()
            .chain(values)
            .join("\t");
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Read the data lines of a SWAT+ file back into dates and values.
#[cfg(test)]
pub(super) fn parse_series(text: &str) -> Option<Vec<(chrono::NaiveDate, Vec<Option<f64>>)>> {
    let mut rows = vec![];
    for line in text.lines().skip(3) {
        let mut fields = line.split('\t');
        let year: i32 = fields.next()?.parse().ok()?;
        let yday: u32 = fields.next()?.parse().ok()?;
        let date = chrono::NaiveDate::from_yo_opt(year, yday)?;
        let values = fields.map(|s| if s.is_empty() { None } else { s.parse().ok() }).collect();
        rows.push((date, values));
    }
    Some(rows)
}
