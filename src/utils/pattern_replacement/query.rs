use std::borrow::Cow;

use chrono::NaiveDate;

use super::{PatternError, PatternReplacer};

const DEFAULT_DATE_FMT: &'static str = "%Y-%m-%d";

/// Render a file pattern or script argument for one subbasin query.
///
/// Recognized keys are `{SUBBASIN}`, `{START_DATE}`, `{END_DATE}`, `{LAT}`, `{LON}` and
/// `{RADIUS}`. `SUBBASIN` accepts a width as its format (`{SUBBASIN:03}` zero pads to three
/// digits), the dates accept a chrono strftime format, and the numeric keys accept a number
/// of decimal places (`{LAT:4}`).
pub fn render_query_pattern(pattern: &str, rep: &QueryPatternReplacer) -> Result<String, PatternError> {
    rep.render_pattern(pattern)
}

#[derive(Debug, Clone, Copy)]
pub struct QueryPatternReplacer {
    pub subbasin_id: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

impl QueryPatternReplacer {
    fn render_float(key: &str, value: f64, fmt: Option<&str>) -> Result<String, PatternError> {
        if let Some(fmt) = fmt {
            let prec: usize = fmt.parse()
                .map_err(|_| PatternError::BadFormat { key: key.to_string(), fmt: fmt.to_string() })?;
            Ok(format!("{value:.prec$}"))
        } else {
            Ok(format!("{value}"))
        }
    }
}

impl PatternReplacer for QueryPatternReplacer {
    fn get_replacement_value(
        &self,
        key: &str,
        fmt: Option<&str>,
    ) -> Result<Cow<'_, str>, PatternError> {
        match key {
            "SUBBASIN" => {
                let s = if let Some(fmt) = fmt {
                    let width: usize = fmt.parse()
                        .map_err(|_| PatternError::BadFormat { key: key.to_string(), fmt: fmt.to_string() })?;
                    if fmt.starts_with('0') {
                        format!("{:0width$}", self.subbasin_id)
                    } else {
                        format!("{:width$}", self.subbasin_id)
                    }
                } else {
                    self.subbasin_id.to_string()
                };
                Ok(s.into())
            }
            "START_DATE" => {
                let fmt = fmt.unwrap_or(DEFAULT_DATE_FMT);
                Ok(self.start_date.format(fmt).to_string().into())
            }
            "END_DATE" => {
                let fmt = fmt.unwrap_or(DEFAULT_DATE_FMT);
                Ok(self.end_date.format(fmt).to_string().into())
            }
            "LAT" => Ok(Self::render_float(key, self.lat, fmt)?.into()),
            "LON" => Ok(Self::render_float(key, self.lon, fmt)?.into()),
            "RADIUS" => Ok(Self::render_float(key, self.radius_km, fmt)?.into()),
            _ => Err(PatternError::UnknownKey(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacer() -> QueryPatternReplacer {
        QueryPatternReplacer {
            subbasin_id: 7,
            start_date: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2012, 12, 31).unwrap(),
            lat: 51.123456,
            lon: 12.5,
            radius_km: 30.0,
        }
    }

    #[test]
    fn test_subbasin_patterns() {
        let rep = replacer();
        assert_eq!(render_query_pattern("/data/{SUBBASIN}/st.csv", &rep).unwrap(), "/data/7/st.csv");
        assert_eq!(render_query_pattern("/data/sb{SUBBASIN:03}.csv", &rep).unwrap(), "/data/sb007.csv");
        assert_eq!(render_query_pattern("{SUBBASIN:3}", &rep).unwrap(), "  7");
        assert!(render_query_pattern("{SUBBASIN:abc}", &rep).is_err());
    }

    #[test]
    fn test_date_patterns() {
        let rep = replacer();
        assert_eq!(render_query_pattern("--start={START_DATE}", &rep).unwrap(), "--start=2010-01-01");
        assert_eq!(render_query_pattern("{START_DATE:%Y%m%d}-{END_DATE:%Y}", &rep).unwrap(), "20100101-2012");
    }

    #[test]
    fn test_numeric_patterns() {
        let rep = replacer();
        assert_eq!(render_query_pattern("{LAT:2},{LON}", &rep).unwrap(), "51.12,12.5");
        assert_eq!(render_query_pattern("r={RADIUS}", &rep).unwrap(), "r=30");
        assert!(render_query_pattern("{ELEV}", &rep).is_err());
    }
}
