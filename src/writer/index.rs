use std::path::{Path, PathBuf};

use itertools::Itertools;

use super::{write_whole_file, Variable, WriteError};
use crate::{subbasin::Subbasin, utils::fmt_shortest};

pub const LEGACY_INDEX_HEADER: &str = "ID,NAME,LAT,LONG,ELEVATION";

/// One subbasin's entry in the index of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub variable: Variable,
    pub subbasin_id: u32,
    /// Derived station name, e.g. `tmp001`
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
}

/// Collects index records over a whole run. Owned by the run driver and passed to the
/// writer for each subbasin; the index files are written from it once all subbasins are done.
#[derive(Debug, Clone, Default)]
pub struct IndexAccumulator {
    records: Vec<IndexRecord>,
}

impl IndexAccumulator {
    /// Record that `variable` was written for `subbasin`. Recording the same pair again
    /// replaces the earlier record.
    pub fn record(&mut self, variable: Variable, subbasin: &Subbasin) {
        let rec = IndexRecord {
            variable,
            subbasin_id: subbasin.id,
            name: variable.station_name(subbasin.id),
            lat: subbasin.lat,
            lon: subbasin.lon,
            elev: subbasin.elevation_or_default(),
        };

        if let Some(existing) = self.records.iter_mut().find(|r| r.variable == variable && r.subbasin_id == subbasin.id) {
            *existing = rec;
        } else {
            self.records.push(rec);
        }
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    /// Records for one variable, ascending by subbasin id.
    pub fn records_for(&self, variable: Variable) -> Vec<&IndexRecord> {
        self.records.iter()
            .filter(|r| r.variable == variable)
            .sorted_by_key(|r| r.subbasin_id)
            .collect()
    }

    /// Every subbasin with at least one record, ascending.
    pub fn subbasin_ids(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.subbasin_id).sorted().dedup().collect()
    }
}

/// Write one `<prefix>.txt` table per variable that has any records.
pub(super) fn write_legacy_index_files(output_dir: &Path, index: &IndexAccumulator) -> Vec<Result<PathBuf, WriteError>> {
    Variable::ALL.iter()
        .filter_map(|&variable| {
            let records = index.records_for(variable);
            if records.is_empty() {
                return None;
            }
            let path = output_dir.join(format!("{}.txt", variable.prefix()));
            let contents = render_legacy_index(&records);
            Some(write_whole_file(&path, &contents).map(|_| {
                log::info!("Wrote index file {}", path.display());
                path
            }))
        })
        .collect()
}

fn render_legacy_index(records: &[&IndexRecord]) -> String {
    let rows = records.iter().map(|r| {
        format!("{},{},{},{},{}", r.subbasin_id, r.name, fmt_shortest(r.lat), fmt_shortest(r.lon), fmt_shortest(r.elev))
    });
    std::iter::once(LEGACY_INDEX_HEADER.to_string()).chain(rows).join("\n")
}

/// Write all five `.cli` lists. Each starts with its own name, followed by the data file of
/// every subbasin recorded for that variable.
pub(super) fn write_cli_files(output_dir: &Path, index: &IndexAccumulator) -> Vec<Result<PathBuf, WriteError>> {
    Variable::ALL.iter()
        .map(|&variable| -> Result<PathBuf, WriteError> {
            let cli_name = variable.cli_file_name();
            let path = output_dir.join(&cli_name);
            let contents = render_cli(&cli_name, variable, index);
            write_whole_file(&path, &contents)?;
            log::info!("Wrote climate list {}", path.display());
            Ok(path)
        })
        .collect()
}

fn render_cli(cli_name: &str, variable: Variable, index: &IndexAccumulator) -> String {
    let mut out = String::from(cli_name);
    out.push('\n');
    for rec in index.records_for(variable) {
        out.push_str(&variable.file_name(rec.subbasin_id, super::OutputFormat::NextGen));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subbasins() -> Vec<Subbasin> {
        vec![
            Subbasin { id: 12, lat: 52.0, lon: 13.37, elev: None },
            Subbasin { id: 3, lat: 51.5, lon: 12.25, elev: Some(101.5) },
        ]
    }

    fn filled_index() -> IndexAccumulator {
        let mut index = IndexAccumulator::default();
        for sb in subbasins() {
            for v in Variable::ALL {
                index.record(v, &sb);
            }
        }
        // a rerun of the same subbasin must not duplicate it
        index.record(Variable::Temperature, &subbasins()[1]);
        index
    }

    #[test]
    fn test_legacy_index_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_legacy_index_files(dir.path(), &filled_index());
        assert_eq!(results.len(), 5);
        let text = std::fs::read_to_string(dir.path().join("tmp.txt")).unwrap();
        assert_eq!(text, "ID,NAME,LAT,LONG,ELEVATION\n3,tmp003,51.5,12.25,101.5\n12,tmp012,52.0,13.37,0.0");
        let text = std::fs::read_to_string(dir.path().join("rh.txt")).unwrap();
        assert_eq!(text.lines().nth(1), Some("3,rh003,51.5,12.25,101.5"));
    }

    #[test]
    fn test_legacy_index_skips_unused_variables() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = IndexAccumulator::default();
        index.record(Variable::Precipitation, &subbasins()[0]);
        let results = write_legacy_index_files(dir.path(), &index);
        assert_eq!(results.len(), 1);
        assert!(dir.path().join("pcp.txt").exists());
        assert!(!dir.path().join("tmp.txt").exists());
    }

    #[test]
    fn test_cli_files() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_cli_files(dir.path(), &filled_index());
        assert!(results.iter().all(|r| r.is_ok()));
        let text = std::fs::read_to_string(dir.path().join("hmd.cli")).unwrap();
        assert_eq!(text, "hmd.cli\nrh003.hmd\nrh012.hmd\n");
        let text = std::fs::read_to_string(dir.path().join("slr.cli")).unwrap();
        assert_eq!(text, "slr.cli\nsolar003.slr\nsolar012.slr\n");

        // with nothing recorded, every list is still written with just its name
        let empty = tempfile::tempdir().unwrap();
        write_cli_files(empty.path(), &IndexAccumulator::default());
        let text = std::fs::read_to_string(empty.path().join("tmp.cli")).unwrap();
        assert_eq!(text, "tmp.cli\n");
    }

    #[test]
    fn test_subbasin_ids() {
        assert_eq!(filled_index().subbasin_ids(), vec![3, 12]);
        assert_eq!(filled_index().records().len(), 10);
    }
}
