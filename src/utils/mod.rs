pub mod pattern_replacement;

/// Format a value with two decimal places, or an empty string if there is no value.
pub fn fmt_2dp(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.2}"),
        None => String::new(),
    }
}

/// Format a float the way the legacy index files expect: the shortest representation that
/// round trips, always with a decimal point (e.g. `52.0`, `13.37`).
pub fn fmt_shortest(v: f64) -> String {
    format!("{v:?}")
}
