//! Turn the raw station and observation tables of one subbasin query into a single canonical
//! shape: for each (parameter, date), the list of stations with their distance and value.
//!
//! Observation tables come in two shapes. A *long* table has one row per station, date and
//! parameter, with an explicit parameter column and a value column. A *wide* table has one
//! row per station and date and one column per parameter. The shape is detected from the
//! column names; if the required columns for the detected shape cannot be found, the table
//! is rejected rather than guessed at.
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;

use crate::{distance::haversine_km, observations::RawTable, series::Parameter, subbasin::Subbasin};

pub const STATION_ID_COLUMNS: &[&str] = &["station_id", "stations_id", "station", "id"];
pub const DATE_COLUMNS: &[&str] = &["date", "datetime", "time", "timestamp"];
pub const PARAMETER_COLUMNS: &[&str] = &["parameter", "element", "variable"];
pub const VALUE_COLUMNS: &[&str] = &["value", "val"];
pub const LATITUDE_COLUMNS: &[&str] = &["latitude", "lat"];
pub const LONGITUDE_COLUMNS: &[&str] = &["longitude", "lon", "long"];
pub const DISTANCE_COLUMNS: &[&str] = &["distance", "distance_km"];

/// Columns of a wide observation table that describe the station or the row rather than
/// holding a parameter.
pub const WIDE_EXCLUDED_COLUMNS: &[&str] = &[
    "station_id", "stations_id", "station", "id",
    "latitude", "lat", "longitude", "lon", "long", "height", "elevation",
    "distance", "distance_km",
    "start_date", "end_date",
    "date", "datetime", "time", "timestamp",
    "name", "state", "dataset", "quality",
];

/// Cell contents treated the same as an empty cell (compared case-insensitively).
pub const NULL_MARKERS: &[&str] = &["NA", "N/A", "NaN", "null", "None"];

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("The {table} table has no {what} column (tried: {tried})")]
    MissingColumn { table: &'static str, what: &'static str, tried: String },
    #[error("The wide observation table has no parameter columns")]
    NoParameterColumns,
    #[error("Row {row} of the {table} table has no {what}")]
    MissingCell { table: &'static str, row: usize, what: &'static str },
    #[error("Row {row}: cannot parse '{value}' as a date (expected YYYY-MM-DD or YYYYMMDD)")]
    BadDate { row: usize, value: String },
    #[error("Row {row}, column '{column}': cannot parse '{value}' as a number")]
    BadNumber { row: usize, column: String, value: String },
}

impl NormalizeError {
    fn missing_column(table: &'static str, what: &'static str, tried: &[&str]) -> Self {
        Self::MissingColumn { table, what, tried: tried.join(", ") }
    }
}

/// A station returned for one subbasin query, with its distance to the subbasin centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Distance to the target point in kilometers, always >= 0
    pub distance_km: f64,
}

/// Read the station table, taking each station's distance from the table when given and
/// otherwise computing it from the station coordinates to the subbasin centroid.
///
/// Stations with neither a distance nor coordinates are skipped. If a station id appears
/// more than once, the first row wins.
pub fn read_station_table(table: &RawTable, subbasin: &Subbasin) -> Result<Vec<Station>, NormalizeError> {
    let id_col = table.find_column(STATION_ID_COLUMNS)
        .ok_or_else(|| NormalizeError::missing_column("station", "station id", STATION_ID_COLUMNS))?;
    let lat_col = table.find_column(LATITUDE_COLUMNS);
    let lon_col = table.find_column(LONGITUDE_COLUMNS);
    let dist_col = table.find_column(DISTANCE_COLUMNS);

    if dist_col.is_none() && (lat_col.is_none() || lon_col.is_none()) {
        return Err(NormalizeError::missing_column("station", "distance or latitude/longitude", DISTANCE_COLUMNS));
    }

    let mut seen = HashSet::new();
    let mut stations = vec![];
    for (irow, row) in table.rows().iter().enumerate() {
        let rownum = irow + 1;
        let id = row[id_col].as_deref()
            .ok_or(NormalizeError::MissingCell { table: "station", row: rownum, what: "station id" })?
            .to_string();

        let lat = parse_opt_number(row, lat_col, table, rownum)?;
        let lon = parse_opt_number(row, lon_col, table, rownum)?;
        let provided = parse_opt_number(row, dist_col, table, rownum)?;

        let distance_km = match (provided, lat, lon) {
            (Some(d), _, _) if d.is_finite() => d,
            (_, Some(lat), Some(lon)) => {
                let d = haversine_km(lat, lon, subbasin.lat, subbasin.lon);
                debug!("Station {id} has no distance, computed {d:.3} km to subbasin {}", subbasin.id);
                d
            },
            _ => {
                debug!("Skipping station {id}: no distance or coordinates");
                continue;
            }
        };

        if distance_km < 0.0 {
            return Err(NormalizeError::BadNumber {
                row: rownum,
                column: "distance".to_string(),
                value: distance_km.to_string(),
            });
        }

        if !seen.insert(id.clone()) {
            debug!("Station {id} listed more than once, keeping the first entry");
            continue;
        }
        stations.push(Station { id, lat, lon, distance_km });
    }

    Ok(stations)
}

/// The two supported observation table layouts, with the indices of their columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableShape {
    Long { station: usize, date: usize, parameter: usize, value: usize },
    Wide { station: usize, date: usize, parameters: Vec<(usize, String)> },
}

impl TableShape {
    /// Detect the layout of an observation table from its header. A table with a parameter
    /// column is long; anything else is wide.
    pub fn detect(table: &RawTable) -> Result<Self, NormalizeError> {
        let station = table.find_column(STATION_ID_COLUMNS)
            .ok_or_else(|| NormalizeError::missing_column("observation", "station id", STATION_ID_COLUMNS))?;
        let date = table.find_column(DATE_COLUMNS)
            .ok_or_else(|| NormalizeError::missing_column("observation", "date", DATE_COLUMNS))?;

        if let Some(parameter) = table.find_column(PARAMETER_COLUMNS) {
            let value = table.find_column(VALUE_COLUMNS)
                .ok_or_else(|| NormalizeError::missing_column("observation", "value", VALUE_COLUMNS))?;
            return Ok(Self::Long { station, date, parameter, value });
        }

        let parameters = table.headers()
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                let h = h.trim().to_ascii_lowercase();
                !WIDE_EXCLUDED_COLUMNS.contains(&h.as_str()) && !h.starts_with("quality") && !h.starts_with("qn_")
            })
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect_vec();

        if parameters.is_empty() {
            return Err(NormalizeError::NoParameterColumns);
        }
        Ok(Self::Wide { station, date, parameters })
    }
}

/// One station's contribution to a (parameter, date) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StationValue {
    pub station_id: String,
    pub distance_km: f64,
    pub value: f64,
}

/// Observations grouped by parameter name, then date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalObservations {
    data: BTreeMap<String, BTreeMap<NaiveDate, Vec<StationValue>>>,
}

impl CanonicalObservations {
    /// Add a value; a second value for the same station, parameter and date is ignored.
    pub fn push(&mut self, parameter: &str, date: NaiveDate, sv: StationValue) {
        let entries = self.data
            .entry(parameter.to_string())
            .or_default()
            .entry(date)
            .or_default();
        if entries.iter().any(|e| e.station_id == sv.station_id) {
            debug!("Duplicate {parameter} value for station {} on {date}, keeping the first", sv.station_id);
            return;
        }
        entries.push(sv);
    }

    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|k| k.as_str())
    }

    pub fn contains_parameter(&self, parameter: &str) -> bool {
        self.data.contains_key(parameter)
    }

    pub fn get(&self, parameter: &str, date: NaiveDate) -> &[StationValue] {
        self.data.get(parameter)
            .and_then(|by_date| by_date.get(&date))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// `(distance, value)` pairs ready for interpolation.
    pub fn pairs(&self, parameter: &str, date: NaiveDate) -> Vec<(f64, f64)> {
        self.get(parameter, date).iter().map(|sv| (sv.distance_km, sv.value)).collect()
    }

    pub(crate) fn by_date_mut(&mut self, parameter: &str) -> Option<&mut BTreeMap<NaiveDate, Vec<StationValue>>> {
        self.data.get_mut(parameter)
    }

    pub(crate) fn by_date(&self, parameter: &str) -> Option<&BTreeMap<NaiveDate, Vec<StationValue>>> {
        self.data.get(parameter)
    }

    /// Total number of station values held.
    pub fn n_values(&self) -> usize {
        self.data.values().flat_map(|m| m.values()).map(|v| v.len()).sum()
    }

    /// Drop everything outside `[start, end]`, and parameters left with no values.
    pub fn restrict_dates(&mut self, start: NaiveDate, end: NaiveDate) {
        for by_date in self.data.values_mut() {
            by_date.retain(|d, _| *d >= start && *d <= end);
        }
        self.data.retain(|_, by_date| !by_date.is_empty());
    }

    /// Drop values from stations farther than `radius_km`, except for the parameters in
    /// `nearest`, which instead keep only the `n` nearest stations that report them.
    pub fn select_stations(&mut self, radius_km: f64, nearest: &BTreeMap<String, usize>) {
        for (param, by_date) in self.data.iter_mut() {
            if let Some(&n) = nearest.get(param) {
                let keep: HashSet<String> = by_date.values()
                    .flatten()
                    .map(|sv| (sv.station_id.as_str(), sv.distance_km))
                    .unique_by(|(id, _)| *id)
                    .sorted_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)))
                    .take(n)
                    .map(|(id, _)| id.to_string())
                    .collect();
                for values in by_date.values_mut() {
                    values.retain(|sv| keep.contains(&sv.station_id));
                }
            } else {
                for values in by_date.values_mut() {
                    values.retain(|sv| sv.distance_km <= radius_km);
                }
            }
            by_date.retain(|_, v| !v.is_empty());
        }
        self.data.retain(|_, by_date| !by_date.is_empty());
    }
}

/// Join an observation table of either shape against the station list.
///
/// Rows whose station is not in `stations` are skipped, as are null values.
pub fn normalize(stations: &[Station], values: &RawTable) -> Result<CanonicalObservations, NormalizeError> {
    let shape = TableShape::detect(values)?;
    let distances: HashMap<&str, f64> = stations.iter()
        .map(|s| (s.id.as_str(), s.distance_km))
        .collect();

    let mut canonical = CanonicalObservations::default();
    let mut n_join_miss = 0;
    let mut n_null = 0;

    for (irow, row) in values.rows().iter().enumerate() {
        let rownum = irow + 1;
        let (station_col, date_col) = match &shape {
            TableShape::Long { station, date, .. } => (*station, *date),
            TableShape::Wide { station, date, .. } => (*station, *date),
        };

        // A row without a station or date cannot be joined to anything
        let (Some(station_id), Some(date_str)) = (row[station_col].as_deref(), row[date_col].as_deref()) else {
            n_join_miss += 1;
            continue;
        };
        let Some(&distance_km) = distances.get(station_id) else {
            n_join_miss += 1;
            continue;
        };
        let date = parse_date(date_str)
            .ok_or_else(|| NormalizeError::BadDate { row: rownum, value: date_str.to_string() })?;

        let cells: Vec<(&str, usize)> = match &shape {
            TableShape::Long { parameter, value, .. } => {
                let param = row[*parameter].as_deref()
                    .ok_or(NormalizeError::MissingCell { table: "observation", row: rownum, what: "parameter" })?;
                vec![(param, *value)]
            },
            TableShape::Wide { parameters, .. } => {
                parameters.iter().map(|(i, name)| (name.as_str(), *i)).collect()
            },
        };

        for (param, icol) in cells {
            let Some(value) = parse_opt_number(row, Some(icol), values, rownum)? else {
                n_null += 1;
                continue;
            };
            canonical.push(&canonical_parameter_name(param), date, StationValue { station_id: station_id.to_string(), distance_km, value });
        }
    }

    if n_join_miss > 0 {
        debug!("{n_join_miss} observation rows had no station or date, or referred to stations not in the station table");
    }
    if n_null > 0 {
        debug!("{n_null} null observation values dropped");
    }

    Ok(canonical)
}

/// Provider name for a recognized parameter (including aliases such as `tmax`), or the
/// trimmed name as given.
fn canonical_parameter_name(name: &str) -> String {
    name.parse::<Parameter>()
        .map(|p| p.provider_name().to_string())
        .unwrap_or_else(|_| name.trim().to_string())
}

fn parse_opt_number(row: &[Option<String>], col: Option<usize>, table: &RawTable, rownum: usize) -> Result<Option<f64>, NormalizeError> {
    let Some(icol) = col else {
        return Ok(None);
    };
    match row[icol].as_deref().map(str::trim) {
        None => Ok(None),
        Some(s) if is_null_marker(s) => Ok(None),
        Some(s) => s.parse::<f64>()
            .map(Some)
            .map_err(|_| NormalizeError::BadNumber {
                row: rownum,
                column: table.headers()[icol].clone(),
                value: s.to_string(),
            }),
    }
}

/// Text that CSV exports commonly write in place of an empty cell.
fn is_null_marker(s: &str) -> bool {
    NULL_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m))
}

/// Parse the date part of a date or timestamp string. Accepts anything starting with
/// `YYYY-MM-DD` (so ISO timestamps work) or a bare `YYYYMMDD`.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Some(d) = s.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()) {
        return Some(d);
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subbasin() -> Subbasin {
        Subbasin { id: 1, lat: 51.0, lon: 12.0, elev: None }
    }

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stations() -> Vec<Station> {
        let st = table("station_id,latitude,longitude,distance\nA,51.0,12.0,0.0\nB,51.1,12.0,10.0\nC,51.2,12.0,20.0\n");
        read_station_table(&st, &subbasin()).unwrap()
    }

    #[test]
    fn test_station_distances() {
        let st = table("Station_ID,Latitude,Longitude,distance\nA,51.0,12.0,0.5\nB,51.18,12.0,\nC,,,\nA,51.0,12.0,9.0\n");
        let stations = read_station_table(&st, &subbasin()).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].distance_km, 0.5);
        assert!((stations[1].distance_km - 20.015).abs() < 0.05);

        let st = table("station_id,height\nA,100\n");
        assert!(matches!(read_station_table(&st, &subbasin()), Err(NormalizeError::MissingColumn { .. })));

        let st = table("station_id,distance\nA,-1.0\n");
        assert!(matches!(read_station_table(&st, &subbasin()), Err(NormalizeError::BadNumber { .. })));
    }

    #[test]
    fn test_detect_shapes() {
        let long = table("station_id,dataset,parameter,date,value,quality\n");
        assert_eq!(TableShape::detect(&long).unwrap(), TableShape::Long { station: 0, date: 3, parameter: 2, value: 4 });

        let wide = table("station_id,date,latitude,longitude,distance,humidity,wind_speed,quality_wind_speed\n");
        assert_eq!(
            TableShape::detect(&wide).unwrap(),
            TableShape::Wide { station: 0, date: 1, parameters: vec![(5, "humidity".to_string()), (6, "wind_speed".to_string())] }
        );

        let no_value = table("station_id,date,parameter,amount\n");
        assert!(matches!(TableShape::detect(&no_value), Err(NormalizeError::MissingColumn { what: "value", .. })));

        let no_date = table("station_id,parameter,value\n");
        assert!(matches!(TableShape::detect(&no_date), Err(NormalizeError::MissingColumn { what: "date", .. })));

        let no_params = table("station_id,date,distance,start_date,end_date\n");
        assert!(matches!(TableShape::detect(&no_params), Err(NormalizeError::NoParameterColumns)));
    }

    #[test]
    fn test_long_and_wide_agree() {
        let long = table("station_id,parameter,date,value
A,humidity,2020-01-01,80.0
B,humidity,2020-01-01,70.0
B,wind_speed,2020-01-01,3.0
C,humidity,2020-01-02,
Z,humidity,2020-01-02,50.0
C,wind_speed,2020-01-02T00:00:00+00:00,4.5
");
        let wide = table("station_id,date,humidity,wind_speed
A,2020-01-01,80.0,
B,2020-01-01,70.0,3.0
C,20200102,,4.5
Z,2020-01-02,50.0,
");
        let st = stations();
        let from_long = normalize(&st, &long).unwrap();
        let from_wide = normalize(&st, &wide).unwrap();
        assert_eq!(from_long, from_wide);

        assert_eq!(from_long.pairs("humidity", ymd(2020, 1, 1)), vec![(0.0, 80.0), (10.0, 70.0)]);
        // null and unknown station both dropped
        assert!(from_long.get("humidity", ymd(2020, 1, 2)).is_empty());
        assert_eq!(from_long.pairs("wind_speed", ymd(2020, 1, 2)), vec![(20.0, 4.5)]);
        assert_eq!(from_long.n_values(), 4);
    }

    #[test]
    fn test_parameter_aliases_merge() {
        let long = table("station_id,parameter,date,value
A,tmax,2020-01-01,3.0
B,temperature_air_max_2m,2020-01-01,5.0
A,sunshine_duration,2020-01-01,6.5
");
        let obs = normalize(&stations(), &long).unwrap();
        assert_eq!(obs.pairs("temperature_air_max_2m", ymd(2020, 1, 1)), vec![(0.0, 3.0), (10.0, 5.0)]);
        assert!(obs.contains_parameter("sunshine_duration"));
        assert!(!obs.contains_parameter("tmax"));
    }

    #[test]
    fn test_bad_cells() {
        let st = stations();
        let bad_date = table("station_id,parameter,date,value\nA,humidity,01/02/2020,1.0\n");
        assert!(matches!(normalize(&st, &bad_date), Err(NormalizeError::BadDate { row: 1, .. })));

        let bad_value = table("station_id,parameter,date,value\nA,humidity,2020-01-02,high\n");
        assert!(matches!(normalize(&st, &bad_value), Err(NormalizeError::BadNumber { row: 1, .. })));

        // Rows with no station or date are join misses, not errors
        let no_keys = table("station_id,parameter,date,value\n,humidity,2020-01-02,1.0\nA,humidity,,2.0\nA,humidity,2020-01-02,3.0\n");
        let obs = normalize(&st, &no_keys).unwrap();
        assert_eq!(obs.pairs("humidity", ymd(2020, 1, 2)), vec![(0.0, 3.0)]);

        // A bad date on a station we don't know about is never looked at
        let unknown = table("station_id,parameter,date,value\nQ,humidity,garbage,1.0\n");
        assert_eq!(normalize(&st, &unknown).unwrap().n_values(), 0);
    }

    #[test]
    fn test_text_null_markers() {
        let long = table("station_id,parameter,date,value
A,humidity,2020-01-01,NA
B,humidity,2020-01-01,null
C,humidity,2020-01-01, None
A,humidity,2020-01-02,NaN
B,humidity,2020-01-02,75.5
");
        let obs = normalize(&stations(), &long).unwrap();
        assert!(obs.get("humidity", ymd(2020, 1, 1)).is_empty());
        assert_eq!(obs.pairs("humidity", ymd(2020, 1, 2)), vec![(10.0, 75.5)]);
        assert_eq!(obs.n_values(), 1);

        let wide = table("station_id,date,humidity,wind_speed\nA,2020-01-01,NULL,2.5\n");
        let obs = normalize(&stations(), &wide).unwrap();
        assert_eq!(obs.pairs("wind_speed", ymd(2020, 1, 1)), vec![(0.0, 2.5)]);
        assert!(!obs.contains_parameter("humidity"));
    }

    #[test]
    fn test_restrict_and_select() {
        let long = table("station_id,parameter,date,value
A,humidity,2020-01-01,80.0
C,humidity,2020-01-01,60.0
B,radiation_global,2020-01-01,500.0
C,radiation_global,2020-01-02,300.0
A,wind_speed,2019-12-31,2.0
");
        let mut obs = normalize(&stations(), &long).unwrap();
        obs.restrict_dates(ymd(2020, 1, 1), ymd(2020, 1, 31));
        assert!(!obs.contains_parameter("wind_speed"));

        let nearest = BTreeMap::from([("radiation_global".to_string(), 1)]);
        obs.select_stations(15.0, &nearest);
        assert_eq!(obs.pairs("humidity", ymd(2020, 1, 1)), vec![(0.0, 80.0)]);
        // Station B is the nearest one reporting radiation, even though A is closer overall
        assert_eq!(obs.pairs("radiation_global", ymd(2020, 1, 1)), vec![(10.0, 500.0)]);
        assert!(obs.get("radiation_global", ymd(2020, 1, 2)).is_empty());
    }
}
