use std::collections::BTreeMap;
use std::path::Path;

use geo_types::Geometry;
use serde::Serialize;
use shapefile::dbase::{Date, FieldValue};
use tracing::debug;

use crate::domain::{CountryCode, MAP_CODE_FIELD};
use crate::error::OkavangoError;
use crate::fs_util::{extract_shapefile, find_with_extension};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<FieldValue> for AttributeValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Character(Some(text)) => AttributeValue::Text(text.trim().to_string()),
            FieldValue::Memo(text) => AttributeValue::Text(text),
            FieldValue::Numeric(Some(number)) => AttributeValue::Number(number),
            FieldValue::Float(Some(number)) => AttributeValue::Number(f64::from(number)),
            FieldValue::Double(number) => AttributeValue::Number(number),
            FieldValue::Integer(number) => AttributeValue::Number(f64::from(number)),
            FieldValue::Currency(number) => AttributeValue::Number(number),
            FieldValue::Logical(Some(flag)) => AttributeValue::Bool(flag),
            FieldValue::Date(Some(date)) => AttributeValue::Text(iso_date(&date)),
            FieldValue::DateTime(stamp) => {
                let time = stamp.time();
                AttributeValue::Text(format!(
                    "{}T{:02}:{:02}:{:02}",
                    iso_date(&stamp.date()),
                    time.hours(),
                    time.minutes(),
                    time.seconds()
                ))
            }
            FieldValue::Character(None)
            | FieldValue::Numeric(None)
            | FieldValue::Float(None)
            | FieldValue::Logical(None)
            | FieldValue::Date(None) => AttributeValue::Null,
        }
    }
}

fn iso_date(date: &Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// One polygon record of the world map.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub geometry: Option<Geometry<f64>>,
    pub attributes: BTreeMap<String, AttributeValue>,
    code: Option<CountryCode>,
}

impl Country {
    /// Normalizes the `ISO_A3` attribute: the `-99` sentinel and blanks become null.
    pub fn new(
        geometry: Option<Geometry<f64>>,
        mut attributes: BTreeMap<String, AttributeValue>,
    ) -> Self {
        let code = attributes
            .get(MAP_CODE_FIELD)
            .and_then(AttributeValue::as_str)
            .and_then(CountryCode::from_map_field);
        if let Some(field) = attributes.get_mut(MAP_CODE_FIELD) {
            *field = match &code {
                Some(code) => AttributeValue::Text(code.to_string()),
                None => AttributeValue::Null,
            };
        }
        Self {
            geometry,
            attributes,
            code,
        }
    }

    pub fn code(&self) -> Option<&CountryCode> {
        self.code.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        ["NAME", "ADMIN", "NAME_LONG"]
            .iter()
            .find_map(|field| self.attributes.get(*field).and_then(AttributeValue::as_str))
    }
}

/// The polygon map every indicator is joined onto.
#[derive(Debug, Clone, Default)]
pub struct WorldMap {
    countries: Vec<Country>,
}

impl WorldMap {
    pub fn new(countries: Vec<Country>) -> Self {
        Self { countries }
    }

    /// Loads the first `.shp` found inside a zipped shapefile.
    pub fn from_zip(zip_path: &Path) -> Result<Self, OkavangoError> {
        if !zip_path.exists() {
            return Err(OkavangoError::MissingFile(zip_path.to_path_buf()));
        }
        let temp_dir = tempfile::Builder::new()
            .prefix("okavango-map")
            .tempdir()
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        extract_shapefile(zip_path, temp_dir.path())?;

        let shp_path = find_with_extension(temp_dir.path(), "shp")?.ok_or_else(|| {
            OkavangoError::Shapefile(format!("no .shp file inside {}", zip_path.display()))
        })?;
        Self::from_shapefile(&shp_path)
    }

    /// Reads geometry and attributes; the sibling `.dbf` must exist.
    pub fn from_shapefile(shp_path: &Path) -> Result<Self, OkavangoError> {
        let mut reader = shapefile::Reader::from_path(shp_path)
            .map_err(|err| OkavangoError::Shapefile(err.to_string()))?;

        let mut countries = Vec::new();
        for item in reader.iter_shapes_and_records() {
            let (shape, record) =
                item.map_err(|err| OkavangoError::Shapefile(err.to_string()))?;
            let attributes = record
                .into_iter()
                .map(|(name, value)| (name, AttributeValue::from(value)))
                .collect::<BTreeMap<_, _>>();
            if !attributes.contains_key(MAP_CODE_FIELD) {
                return Err(OkavangoError::MissingCodeField {
                    found: attributes.into_keys().collect(),
                });
            }
            // Null shapes have no geo-types equivalent.
            let geometry = Geometry::<f64>::try_from(shape).ok();
            countries.push(Country::new(geometry, attributes));
        }
        debug!(path = %shp_path.display(), countries = countries.len(), "world map loaded");

        Ok(Self { countries })
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use shapefile::dbase::{DateTime, Time};

    use super::*;

    fn attrs(code: &str) -> BTreeMap<String, AttributeValue> {
        BTreeMap::from([
            ("NAME".to_string(), AttributeValue::Text("Somewhere".to_string())),
            (MAP_CODE_FIELD.to_string(), AttributeValue::Text(code.to_string())),
        ])
    }

    #[test]
    fn sentinel_code_becomes_null() {
        let country = Country::new(None, attrs("-99"));
        assert!(country.code().is_none());
        assert_eq!(country.attributes[MAP_CODE_FIELD], AttributeValue::Null);
    }

    #[test]
    fn real_code_is_kept() {
        let country = Country::new(None, attrs("KEN"));
        assert_eq!(country.code().map(CountryCode::as_str), Some("KEN"));
        assert_eq!(country.name(), Some("Somewhere"));
    }

    #[test]
    fn dbase_values_convert() {
        assert_eq!(
            AttributeValue::from(FieldValue::Character(Some("FRA ".to_string()))),
            AttributeValue::Text("FRA".to_string())
        );
        assert_eq!(
            AttributeValue::from(FieldValue::Numeric(None)),
            AttributeValue::Null
        );
        assert_eq!(
            AttributeValue::from(FieldValue::Integer(7)),
            AttributeValue::Number(7.0)
        );
    }

    #[test]
    fn dbase_dates_become_iso_text() {
        assert_eq!(
            AttributeValue::from(FieldValue::Date(Some(Date::new(5, 3, 2019)))),
            AttributeValue::Text("2019-03-05".to_string())
        );
        assert_eq!(
            AttributeValue::from(FieldValue::Date(None)),
            AttributeValue::Null
        );
        let stamp = DateTime::new(Date::new(1, 12, 2020), Time::new(7, 30, 0));
        assert_eq!(
            AttributeValue::from(FieldValue::DateTime(stamp)),
            AttributeValue::Text("2020-12-01T07:30:00".to_string())
        );
    }
}
