use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::domain::{CountryCode, STRUCTURAL_COLUMNS};
use crate::error::OkavangoError;
use crate::table::{Cell, Observation, Table, latest_per_country};
use crate::world::{Country, WorldMap};

/// A map polygon with whatever dataset row matched its code.
#[derive(Debug, Clone)]
pub struct MergedRow {
    pub country: Country,
    pub entity: Option<String>,
    pub code: Option<CountryCode>,
    pub year: Option<f64>,
    pub value: Option<Cell>,
}

impl MergedRow {
    fn unmatched(country: &Country) -> Self {
        Self {
            country: country.clone(),
            entity: None,
            code: None,
            year: None,
            value: None,
        }
    }

    fn matched(country: &Country, observation: &Observation) -> Self {
        Self {
            country: country.clone(),
            entity: observation.entity.clone(),
            code: Some(observation.code.clone()),
            year: Some(observation.year),
            value: observation.value.clone(),
        }
    }
}

/// One indicator joined onto the whole world map.
#[derive(Debug, Clone)]
pub struct MergedMap {
    pub label: String,
    /// Source column that was renamed to `value`.
    pub value_column: String,
    pub rows: Vec<MergedRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub label: String,
    pub value_column: String,
    pub rows: usize,
    pub matched: usize,
}

impl MergedMap {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn matched(&self) -> usize {
        self.rows.iter().filter(|row| row.value.is_some()).count()
    }

    pub fn row_for(&self, code: &str) -> Option<&MergedRow> {
        self.rows.iter().find(|row| {
            row.country
                .code()
                .map(|candidate| candidate.as_str() == code)
                .unwrap_or(false)
        })
    }

    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            label: self.label.clone(),
            value_column: self.value_column.clone(),
            rows: self.len(),
            matched: self.matched(),
        }
    }
}

/// Merged results in the order the datasets were given.
#[derive(Debug, Clone, Default)]
pub struct MergedMaps {
    maps: Vec<MergedMap>,
}

impl MergedMaps {
    pub fn get(&self, label: &str) -> Option<&MergedMap> {
        self.maps.iter().find(|map| map.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedMap> {
        self.maps.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.maps.iter().map(|map| map.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn summaries(&self) -> Vec<MergeSummary> {
        self.maps.iter().map(MergedMap::summary).collect()
    }
}

/// Merges every labelled table; the first failing dataset aborts the call.
pub fn merge(world: &WorldMap, datasets: &[(String, Table)]) -> Result<MergedMaps, OkavangoError> {
    let maps = datasets
        .iter()
        .map(|(label, table)| merge_dataset(world, label, table))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MergedMaps { maps })
}

/// Left-joins one indicator table onto the world map.
///
/// Every polygon is kept exactly once. Polygons whose code is null or has no
/// dataset row get a null value.
pub fn merge_dataset(
    world: &WorldMap,
    label: &str,
    table: &Table,
) -> Result<MergedMap, OkavangoError> {
    table.require_columns(&STRUCTURAL_COLUMNS)?;
    let value_column = table.value_column()?.to_string();
    let latest = latest_per_country(table.observations(&value_column)?);

    let by_code = latest
        .iter()
        .map(|observation| (&observation.code, observation))
        .collect::<HashMap<_, _>>();

    let rows = world
        .countries()
        .iter()
        .map(|country| {
            match country.code().and_then(|code| by_code.get(code)) {
                Some(observation) => MergedRow::matched(country, observation),
                None => MergedRow::unmatched(country),
            }
        })
        .collect::<Vec<_>>();

    let merged = MergedMap {
        label: label.to_string(),
        value_column,
        rows,
    };
    info!(
        dataset = label,
        rows = merged.len(),
        matched = merged.matched(),
        "merged"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::MAP_CODE_FIELD;
    use crate::world::AttributeValue;

    fn country(code: &str) -> Country {
        Country::new(
            None,
            BTreeMap::from([(
                MAP_CODE_FIELD.to_string(),
                AttributeValue::Text(code.to_string()),
            )]),
        )
    }

    #[test]
    fn duplicate_map_codes_each_get_the_value() {
        let world = WorldMap::new(vec![country("KEN"), country("KEN")]);
        let table = Table::from_reader(
            "t.csv",
            "Entity,Code,Year,Forest\nKenya,KEN,2020,12\n".as_bytes(),
        )
        .unwrap();
        let merged = merge_dataset(&world, "t", &table).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.matched(), 2);
    }
}
