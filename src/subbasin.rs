use std::path::{Path, PathBuf};

use error_stack::ResultExt;
use itertools::Itertools;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SubbasinError {
    #[error("Cannot read subbasin file {}", .0.display())]
    ReadError(PathBuf),
    #[error("Error parsing data line #{0} of the subbasin table")]
    CsvError(usize),
    #[error("Subbasin id {0} appears more than once in the subbasin table")]
    DuplicateId(u32),
    #[error("Subbasin {0} has an invalid centroid ({1}, {2})")]
    InvalidCentroid(u32, f64, f64),
}

/// A spatial unit of the hydrological model that needs its own daily climate series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subbasin {
    #[serde(alias = "subbasin", alias = "Subbasin", alias = "ID")]
    pub id: u32,
    /// Centroid latitude in degrees (south is negative)
    #[serde(alias = "latitude", alias = "Lat", alias = "LAT")]
    pub lat: f64,
    /// Centroid longitude in degrees (west is negative)
    #[serde(alias = "longitude", alias = "Long", alias = "LONG", alias = "Lon")]
    pub lon: f64,
    /// Elevation in meters, if known
    #[serde(default, alias = "elevation", alias = "Elevation", alias = "ELEVATION", alias = "Elev")]
    pub elev: Option<f64>,
}

impl Subbasin {
    /// Elevation to write to output headers; unknown elevations are written as 0.
    pub fn elevation_or_default(&self) -> f64 {
        self.elev.unwrap_or(0.0)
    }
}

/// Read the subbasin table from a CSV file, returning the subbasins sorted by id.
pub fn read_subbasin_table(file: &Path) -> error_stack::Result<Vec<Subbasin>, SubbasinError> {
    let f = std::fs::File::open(file)
        .change_context_lazy(|| SubbasinError::ReadError(file.to_path_buf()))?;
    read_subbasin_inner(f)
        .attach_printable_lazy(|| format!("subbasin file was {}", file.display()))
}

fn read_subbasin_inner<R: std::io::Read>(input: R) -> error_stack::Result<Vec<Subbasin>, SubbasinError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut subbasins: Vec<Subbasin> = vec![];
    for (idx, row) in rdr.deserialize().enumerate() {
        let sb: Subbasin = row.change_context_lazy(|| SubbasinError::CsvError(idx + 1))?;
        if !sb.lat.is_finite() || !sb.lon.is_finite() || sb.lat.abs() > 90.0 || sb.lon.abs() > 360.0 {
            return Err(SubbasinError::InvalidCentroid(sb.id, sb.lat, sb.lon).into());
        }
        subbasins.push(sb);
    }

    subbasins.sort_by_key(|sb| sb.id);
    if let Some((a, _)) = subbasins.iter().tuple_windows().find(|(a, b)| a.id == b.id) {
        return Err(SubbasinError::DuplicateId(a.id).into());
    }

    Ok(subbasins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_table() {
        let table = "Subbasin, Lat, Long, Elevation
        3, 51.25, 12.5, 130.0
        1, 51.0, 12.0,
        2, 51.1, 12.25, 98.5";
        let sbs = read_subbasin_inner(table.as_bytes()).unwrap();
        assert_eq!(sbs.iter().map(|s| s.id).collect_vec(), vec![1, 2, 3]);
        assert_eq!(sbs[0].elev, None);
        assert_eq!(sbs[0].elevation_or_default(), 0.0);
        assert_eq!(sbs[2].elev, Some(130.0));
        assert_eq!(sbs[1].lon, 12.25);
    }

    #[test]
    fn test_duplicate_id() {
        let table = "id,lat,lon\n1,50.0,10.0\n1,50.1,10.1\n";
        let err = read_subbasin_inner(table.as_bytes()).unwrap_err();
        assert!(matches!(err.current_context(), SubbasinError::DuplicateId(1)));
    }

    #[test]
    fn test_bad_latitude() {
        let table = "id,lat,lon\n1,95.0,10.0\n";
        assert!(read_subbasin_inner(table.as_bytes()).is_err());
    }
}
