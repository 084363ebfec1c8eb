use std::fmt;

use serde::Serialize;

use crate::error::OkavangoError;

pub const ENTITY_COLUMN: &str = "Entity";
pub const CODE_COLUMN: &str = "Code";
pub const YEAR_COLUMN: &str = "Year";

/// Columns every indicator CSV must carry; anything else is a value candidate.
pub const STRUCTURAL_COLUMNS: [&str; 3] = [ENTITY_COLUMN, CODE_COLUMN, YEAR_COLUMN];

/// Canonical name of the indicator column in merged output.
pub const VALUE_COLUMN: &str = "value";

pub const MAP_CODE_FIELD: &str = "ISO_A3";

/// Natural Earth writes this instead of leaving the code empty.
pub const MISSING_CODE_SENTINEL: &str = "-99";

/// Cell contents read as missing, the same set pandas' `read_csv` treats as NaN.
pub const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Blank or one of [`NA_TOKENS`].
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NA_TOKENS.contains(&trimmed)
}

pub const WORLD_MAP_FILENAME: &str = "ne_110m_admin_0_countries.zip";

pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// A file to keep in the download directory and where it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetSpec {
    pub filename: &'static str,
    pub url: &'static str,
}

pub const DATASETS: &[DatasetSpec] = &[
    DatasetSpec {
        filename: "annual_change_forest_area.csv",
        url: "https://ourworldindata.org/grapher/annual-change-forest-area.csv",
    },
    DatasetSpec {
        filename: "annual_deforestation.csv",
        url: "https://ourworldindata.org/grapher/annual-deforestation.csv",
    },
    DatasetSpec {
        filename: "terrestrial_protected_areas.csv",
        url: "https://ourworldindata.org/grapher/terrestrial-protected-areas.csv",
    },
    DatasetSpec {
        filename: "share_degraded_land.csv",
        url: "https://ourworldindata.org/grapher/share-degraded-land.csv",
    },
    DatasetSpec {
        filename: "red_list_index.csv",
        url: "https://ourworldindata.org/grapher/red-list-index.csv",
    },
    DatasetSpec {
        filename: WORLD_MAP_FILENAME,
        url: "https://naturalearth.s3.amazonaws.com/110m_cultural/ne_110m_admin_0_countries.zip",
    },
];

/// An indicator CSV that gets joined onto the world map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeTarget {
    pub key: &'static str,
    pub label: &'static str,
    pub filename: &'static str,
}

pub const MERGE_TARGETS: &[MergeTarget] = &[
    MergeTarget {
        key: "annual_change_forest_area",
        label: "Annual change in forest area (latest)",
        filename: "annual_change_forest_area.csv",
    },
    MergeTarget {
        key: "annual_deforestation",
        label: "Annual deforestation (latest)",
        filename: "annual_deforestation.csv",
    },
    MergeTarget {
        key: "terrestrial_protected_areas",
        label: "Terrestrial protected areas (latest)",
        filename: "terrestrial_protected_areas.csv",
    },
    MergeTarget {
        key: "share_degraded_land",
        label: "Share degraded land (latest)",
        filename: "share_degraded_land.csv",
    },
    MergeTarget {
        key: "red_list_index",
        label: "Red List Index (latest)",
        filename: "red_list_index.csv",
    },
];

impl MergeTarget {
    pub fn by_key(key: &str) -> Result<&'static MergeTarget, OkavangoError> {
        MERGE_TARGETS
            .iter()
            .find(|target| target.key == key)
            .ok_or_else(|| OkavangoError::UnknownDataset(key.to_string()))
    }
}

/// Join key shared by the map and the indicator tables.
///
/// OWID also uses pseudo-codes such as `OWID_WRL` for aggregates; those are
/// kept as-is and simply never match a polygon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    /// Blank cells and NA markers are treated as missing.
    pub fn from_dataset_field(raw: &str) -> Option<Self> {
        if is_missing(raw) {
            return None;
        }
        Some(Self(raw.trim().to_string()))
    }

    /// Map-side codes: blanks and the `-99` sentinel are missing.
    pub fn from_map_field(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == MISSING_CODE_SENTINEL {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_merge_target_is_downloaded() {
        for target in MERGE_TARGETS {
            assert!(DATASETS.iter().any(|spec| spec.filename == target.filename));
        }
        assert!(DATASETS.iter().any(|spec| spec.filename == WORLD_MAP_FILENAME));
    }

    #[test]
    fn sentinel_is_only_special_on_the_map() {
        assert_eq!(CountryCode::from_map_field("-99"), None);
        assert_eq!(
            CountryCode::from_dataset_field("-99").map(|code| code.to_string()),
            Some("-99".to_string())
        );
    }
}
