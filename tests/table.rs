use assert_matches::assert_matches;

use okavango::domain::CountryCode;
use okavango::error::OkavangoError;
use okavango::table::{Cell, RawObservation, Table, infer_value_column, latest_per_country};

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn raw(code: Option<&str>, year: Option<f64>, value: f64) -> RawObservation {
    RawObservation {
        entity: None,
        code: code.and_then(CountryCode::from_dataset_field),
        year,
        value: Some(Cell::Number(value)),
    }
}

#[test]
fn infers_trailing_indicator_column() {
    let cols = columns(&["Entity", "Code", "Year", "GDP"]);
    assert_eq!(infer_value_column("gdp.csv", &cols).unwrap(), "GDP");
}

#[test]
fn inference_fails_without_candidates() {
    let cols = columns(&["Entity", "Code", "Year"]);
    let err = infer_value_column("empty.csv", &cols).unwrap_err();
    assert_matches!(err, OkavangoError::ValueColumn { ref dataset, .. } if dataset == "empty.csv");
}

#[test]
fn latest_keeps_one_row_per_code_with_max_year() {
    let rows = vec![
        raw(Some("KEN"), Some(2019.0), 10.0),
        raw(Some("BRA"), Some(2021.0), 3.0),
        raw(Some("KEN"), Some(2020.0), 12.0),
        raw(Some("BRA"), Some(2015.0), 1.0),
        raw(Some("KEN"), Some(2001.0), 2.0),
    ];

    let latest = latest_per_country(rows);

    assert_eq!(latest.len(), 2);
    let ken = latest.iter().find(|row| row.code.as_str() == "KEN").unwrap();
    assert_eq!(ken.year, 2020.0);
    assert_eq!(ken.value, Some(Cell::Number(12.0)));
    let bra = latest.iter().find(|row| row.code.as_str() == "BRA").unwrap();
    assert_eq!(bra.year, 2021.0);
}

#[test]
fn latest_drops_missing_codes_and_years() {
    let rows = vec![
        raw(None, Some(2020.0), 1.0),
        raw(Some("KEN"), None, 5.0),
        raw(Some("KEN"), Some(2010.0), 7.0),
    ];

    let latest = latest_per_country(rows);

    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].value, Some(Cell::Number(7.0)));
}

#[test]
fn latest_of_only_null_codes_is_empty() {
    let rows = vec![raw(None, Some(2020.0), 1.0), raw(None, Some(2021.0), 2.0)];
    assert!(latest_per_country(rows).is_empty());
}

#[test]
fn year_ties_resolve_to_last_occurrence() {
    let rows = vec![
        raw(Some("KEN"), Some(2020.0), 1.0),
        raw(Some("KEN"), Some(2020.0), 2.0),
        raw(Some("KEN"), Some(2019.0), 3.0),
    ];
    let latest = latest_per_country(rows);
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].value, Some(Cell::Number(2.0)));
}

#[test]
fn csv_loading_and_observations() {
    let csv = "\
Entity,Code,Year,Forest area
Kenya,KEN,2019,10
Africa,,2019,99
Kenya,KEN,unknown,11
";
    let table = Table::from_reader("forest.csv", csv.as_bytes()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.columns().len(), 4);

    let value_column = table.value_column().unwrap();
    assert_eq!(value_column, "Forest area");

    let observations = table.observations(value_column).unwrap();
    assert_eq!(observations[0].entity.as_deref(), Some("Kenya"));
    assert_eq!(observations[0].year, Some(2019.0));
    assert!(observations[1].code.is_none());
    assert!(observations[2].year.is_none());
}

#[test]
fn missing_structural_columns_are_all_reported() {
    let table = Table::from_reader("bad.csv", "Country,Value\nKenya,1\n".as_bytes()).unwrap();
    let err = table
        .require_columns(&["Entity", "Code", "Year"])
        .unwrap_err();
    assert_matches!(
        err,
        OkavangoError::MissingColumns { ref missing, .. } if missing.len() == 3
    );
}

#[test]
fn absent_file_is_a_precondition_error() {
    let temp = tempfile::tempdir().unwrap();
    let err = Table::from_path(&temp.path().join("missing.csv")).unwrap_err();
    assert_matches!(err, OkavangoError::MissingFile(_));
}
