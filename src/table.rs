use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::domain::{
    CODE_COLUMN, CountryCode, ENTITY_COLUMN, STRUCTURAL_COLUMNS, YEAR_COLUMN, is_missing,
};
use crate::error::OkavangoError;

/// A present CSV cell, numeric when it parses as one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    /// Blanks, NA markers and NaN are `None`.
    pub fn parse(raw: &str) -> Option<Cell> {
        if is_missing(raw) {
            return None;
        }
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_nan() => None,
            Ok(number) => Some(Cell::Number(number)),
            Err(_) => Some(Cell::Text(trimmed.to_string())),
        }
    }
}

/// A CSV loaded as strings, header kept in declaration order.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_path(path: &Path) -> Result<Self, OkavangoError> {
        if !path.exists() {
            return Err(OkavangoError::MissingFile(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|err| {
            OkavangoError::Filesystem(format!("open {}: {err}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_reader(name, file)
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self, OkavangoError> {
        let name = name.into();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns = reader
            .headers()
            .map_err(|err| OkavangoError::Csv(format!("{name}: {err}")))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| OkavangoError::Csv(format!("{name}: {err}")))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Fails with the full list of absent columns, not just the first.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), OkavangoError> {
        let present = self.columns.iter().map(String::as_str).collect::<HashSet<_>>();
        let missing = required
            .iter()
            .filter(|column| !present.contains(*column))
            .map(|column| column.to_string())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return Ok(());
        }
        Err(OkavangoError::MissingColumns {
            dataset: self.name.clone(),
            missing,
            found: self.columns.clone(),
        })
    }

    pub fn value_column(&self) -> Result<&str, OkavangoError> {
        infer_value_column(&self.name, &self.columns)
    }

    /// Projects every row onto the structural columns plus `value_column`.
    /// Missing codes and unparseable years come back as `None`.
    pub fn observations(&self, value_column: &str) -> Result<Vec<RawObservation>, OkavangoError> {
        let index = |column: &str| {
            self.column_index(column)
                .ok_or_else(|| OkavangoError::MissingColumns {
                    dataset: self.name.clone(),
                    missing: vec![column.to_string()],
                    found: self.columns.clone(),
                })
        };
        let entity_idx = index(ENTITY_COLUMN)?;
        let code_idx = index(CODE_COLUMN)?;
        let year_idx = index(YEAR_COLUMN)?;
        let value_idx = index(value_column)?;

        Ok(self
            .rows
            .iter()
            .map(|row| RawObservation {
                entity: Some(cell(row, entity_idx))
                    .filter(|entity| !is_missing(entity))
                    .map(|entity| entity.trim().to_string()),
                code: CountryCode::from_dataset_field(cell(row, code_idx)),
                year: parse_year(cell(row, year_idx)),
                value: Cell::parse(cell(row, value_idx)),
            })
            .collect())
    }
}

/// The indicator column: last column that is not Entity, Code or Year.
///
/// Selection is positional. A dataset with several indicator columns yields
/// the last one and the others are ignored.
pub fn infer_value_column<'a>(
    dataset: &str,
    columns: &'a [String],
) -> Result<&'a str, OkavangoError> {
    columns
        .iter()
        .filter(|column| !STRUCTURAL_COLUMNS.contains(&column.as_str()))
        .next_back()
        .map(String::as_str)
        .ok_or_else(|| OkavangoError::ValueColumn {
            dataset: dataset.to_string(),
            columns: columns.to_vec(),
        })
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn parse_year(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|year| year.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub entity: Option<String>,
    pub code: Option<CountryCode>,
    pub year: Option<f64>,
    pub value: Option<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub entity: Option<String>,
    pub code: CountryCode,
    pub year: f64,
    pub value: Option<Cell>,
}

/// Keeps the latest year per country code.
///
/// Rows without a code or a numeric year are dropped. Rows are stably sorted
/// by (code, year) and the last one per code wins, so equal years resolve to
/// the row that appeared last in the input.
pub fn latest_per_country<I>(rows: I) -> Vec<Observation>
where
    I: IntoIterator<Item = RawObservation>,
{
    let mut rows = rows
        .into_iter()
        .filter_map(|row| {
            Some(Observation {
                code: row.code?,
                year: row.year?,
                entity: row.entity,
                value: row.value,
            })
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| a.code.cmp(&b.code).then(a.year.total_cmp(&b.year)));

    let mut latest: Vec<Observation> = Vec::new();
    for row in rows {
        match latest.last_mut() {
            Some(last) if last.code == row.code => *last = row,
            _ => latest.push(row),
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn cell_parsing() {
        assert_eq!(Cell::parse(" 12 "), Some(Cell::Number(12.0)));
        assert_eq!(Cell::parse("low"), Some(Cell::Text("low".to_string())));
        assert_eq!(Cell::parse("NAM"), Some(Cell::Text("NAM".to_string())));
        assert_eq!(Cell::parse(""), None);
        assert_eq!(Cell::parse("NA"), None);
        assert_eq!(Cell::parse(" n/a "), None);
        assert_eq!(Cell::parse("-nan"), None);
        assert_eq!(Cell::parse("#N/A"), None);
    }

    #[test]
    fn value_column_is_positional() {
        let cols = columns(&["GDP", "Entity", "Code", "Year", "Population"]);
        assert_eq!(infer_value_column("t", &cols).unwrap(), "Population");
    }

    #[test]
    fn year_parsing_accepts_floats() {
        assert_eq!(parse_year("2020.0"), Some(2020.0));
        assert_eq!(parse_year("NaN"), None);
        assert_eq!(parse_year("circa 1990"), None);
    }
}
