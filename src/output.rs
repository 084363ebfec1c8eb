use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{CODE_COLUMN, ENTITY_COLUMN, VALUE_COLUMN, YEAR_COLUMN};
use crate::error::OkavangoError;
use crate::fetch::FetchResult;
use crate::fs_util::write_bytes_atomic;
use crate::merge::{MergeSummary, MergedMap};
use crate::pipeline::RawDatasetInfo;
use crate::table::Cell;
use crate::world::AttributeValue;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

/// What `run` reports: the fetch records followed by the merge summaries.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<'a> {
    pub fetch: &'a FetchResult,
    pub merge: Vec<MergeSummary>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_merge(summaries: &[MergeSummary]) -> io::Result<()> {
        Self::print_json(&summaries)
    }

    pub fn print_run(report: &RunReport<'_>) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_raw(datasets: &[RawDatasetInfo]) -> io::Result<()> {
        Self::print_json(&datasets)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::pipeline::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::pipeline::ProgressEvent) {}
}

fn attribute_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Text(text) => Value::from(text.as_str()),
        AttributeValue::Number(number) => Value::from(*number),
        AttributeValue::Bool(flag) => Value::from(*flag),
        AttributeValue::Null => Value::Null,
    }
}

fn cell_json(cell: Option<&Cell>) -> Value {
    match cell {
        Some(Cell::Number(number)) => Value::from(*number),
        Some(Cell::Text(text)) => Value::from(text.as_str()),
        None => Value::Null,
    }
}

/// Map attributes plus the joined Entity, Code, Year and value as properties.
pub fn to_feature_collection(map: &MergedMap) -> FeatureCollection {
    map.rows
        .iter()
        .map(|row| {
            let mut feature = Feature {
                bbox: None,
                geometry: row
                    .country
                    .geometry
                    .as_ref()
                    .map(|geometry| geojson::Geometry::new(geojson::Value::from(geometry))),
                id: None,
                properties: None,
                foreign_members: None,
            };
            for (name, value) in &row.country.attributes {
                feature.set_property(name.as_str(), attribute_json(value));
            }
            feature.set_property(ENTITY_COLUMN, row.entity.clone());
            feature.set_property(CODE_COLUMN, row.code.as_ref().map(|code| code.to_string()));
            feature.set_property(YEAR_COLUMN, row.year);
            feature.set_property(VALUE_COLUMN, cell_json(row.value.as_ref()));
            feature
        })
        .collect()
}

/// `"Red List Index (latest)"` -> `"red_list_index_latest"`.
pub fn file_stem(label: &str) -> String {
    let mut stem = String::with_capacity(label.len());
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    while stem.ends_with('_') {
        stem.pop();
    }
    stem
}

pub fn write_geojson(map: &MergedMap, out_dir: &Utf8Path) -> Result<Utf8PathBuf, OkavangoError> {
    let path = out_dir.join(format!("{}.geojson", file_stem(&map.label)));
    let geojson = GeoJson::from(to_feature_collection(map));
    write_bytes_atomic(path.as_std_path(), geojson.to_string().as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchAction, FetchItemResult};

    #[test]
    fn run_report_keeps_fetch_and_merge_together() {
        let fetch = FetchResult {
            items: vec![FetchItemResult {
                filename: "red_list_index.csv".to_string(),
                url: "https://example.org/red-list-index.csv".to_string(),
                action: FetchAction::Existing,
                path: Utf8PathBuf::from("downloads/red_list_index.csv"),
                attempts: 0,
                downloaded_at: None,
            }],
        };
        let report = RunReport {
            fetch: &fetch,
            merge: vec![MergeSummary {
                label: "Red List Index (latest)".to_string(),
                value_column: "Red List Index".to_string(),
                rows: 177,
                matched: 170,
            }],
        };

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["fetch"]["items"][0]["action"], "existing");
        assert_eq!(json["fetch"]["items"][0]["path"], "downloads/red_list_index.csv");
        assert_eq!(json["merge"][0]["matched"], 170);
    }

    #[test]
    fn stems_are_filesystem_friendly() {
        assert_eq!(file_stem("Red List Index (latest)"), "red_list_index_latest");
        assert_eq!(
            file_stem("Annual change in forest area (latest)"),
            "annual_change_in_forest_area_latest"
        );
    }
}
