use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Row {row} has {got} fields but the header has {expected}")]
    RowLength { row: usize, got: usize, expected: usize },
    #[error("Cannot combine tables with different headers ({0} vs. {1})")]
    HeaderMismatch(String, String),
    #[error("Record {0} is not a flat object: field '{1}' holds a nested value")]
    NestedValue(usize, String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// A table as delivered by an observation source, before any interpretation of its columns.
///
/// Cells are kept as text; a `None` cell is a null (an empty CSV field or a JSON `null`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new<S: ToString>(headers: &[S]) -> Self {
        Self { headers: headers.iter().map(|h| h.to_string()).collect(), rows: vec![] }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<(), TableError> {
        if row.len() != self.headers.len() {
            return Err(TableError::RowLength { row: self.rows.len() + 1, got: row.len(), expected: self.headers.len() });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Index of the first column whose name matches one of `candidates`, ignoring ASCII case
    /// and surrounding whitespace. Candidates are tried in order.
    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|c| {
            self.headers.iter().position(|h| h.trim().eq_ignore_ascii_case(c))
        })
    }

    /// Append the rows of `other`, which must have the same header.
    pub fn append(&mut self, other: RawTable) -> Result<(), TableError> {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.headers != other.headers {
            return Err(TableError::HeaderMismatch(self.headers.join(","), other.headers.join(",")));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub fn from_csv_reader<R: std::io::Read>(input: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers = rdr.headers()?.iter().map(|h| h.to_string()).collect::<Vec<_>>();
        let mut table = Self { headers, rows: vec![] };
        for record in rdr.records() {
            let record = record?;
            let row = record.iter()
                .map(|f| if f.is_empty() { None } else { Some(f.to_string()) })
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from flat JSON objects. The header is the union of all keys, in order
    /// of first appearance; keys missing from a record become null cells.
    pub fn from_json_records(records: &[Map<String, Value>]) -> Result<Self, TableError> {
        let mut headers: Vec<String> = vec![];
        for rec in records {
            for key in rec.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut table = Self { headers, rows: Vec::with_capacity(records.len()) };
        for (irec, rec) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(table.headers.len());
            for h in table.headers.iter() {
                let cell = match rec.get(h) {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    Some(Value::Bool(b)) => Some(b.to_string()),
                    Some(Value::Array(_) | Value::Object(_)) => {
                        return Err(TableError::NestedValue(irec + 1, h.clone()));
                    }
                };
                row.push(cell);
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}
