use std::path::Path;

use fexpr_lang::{Record, Value};
use fexpr_resolve::MemorySource;
use miette::Diagnostic;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum DataError {
    #[error("Failed to read {path}")]
    #[diagnostic(code(DataError::Io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON")]
    #[diagnostic(code(DataError::Json))]
    Json(#[from] serde_json::Error),
    #[error("Expected {0}")]
    #[diagnostic(
        code(DataError::UnexpectedShape),
        help("Records are JSON objects; datasets are objects mapping names to arrays of records.")
    )]
    UnexpectedShape(String),
}

pub fn read(path: &Path) -> Result<String, DataError> {
    std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parses one JSON object into a record.
pub fn parse_record(json: &str) -> Result<Record, DataError> {
    match serde_json::from_str::<serde_json::Value>(json)? {
        serde_json::Value::Object(attributes) => Ok(to_record(attributes)),
        _ => Err(DataError::UnexpectedShape("a JSON object for the record".to_string())),
    }
}

/// Parses `{"<dataset>": [{record}, ...], ...}` into a feature source.
pub fn parse_datasets(json: &str) -> Result<MemorySource, DataError> {
    let serde_json::Value::Object(datasets) = serde_json::from_str::<serde_json::Value>(json)?
    else {
        return Err(DataError::UnexpectedShape("a JSON object mapping dataset names to records".to_string()));
    };

    datasets
        .into_iter()
        .try_fold(MemorySource::new(), |source, (name, records)| {
            let serde_json::Value::Array(records) = records else {
                return Err(DataError::UnexpectedShape(format!(
                    "an array of records for dataset '{}'",
                    name
                )));
            };

            let records = records
                .into_iter()
                .map(|record| match record {
                    serde_json::Value::Object(attributes) => Ok(to_record(attributes)),
                    _ => Err(DataError::UnexpectedShape(format!(
                        "a JSON object for each record of dataset '{}'",
                        name
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(source.with_dataset(&name, records))
        })
}

fn to_record(attributes: serde_json::Map<String, serde_json::Value>) -> Record {
    attributes
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fexpr_lang::Filter;
    use fexpr_resolve::{FeatureRequest, FeatureSource};
    use rstest::rstest;
    use std::sync::mpsc;

    #[test]
    fn test_parse_record() {
        let record = parse_record(r#"{"parcel_id": "42", "quantity": 3, "tags": null}"#).unwrap();
        assert_eq!(record.get("parcel_id"), Some(&Value::from("42")));
        assert_eq!(record.get("quantity"), Some(&Value::from(3)));
        assert_eq!(record.get("tags"), Some(&Value::None));
    }

    #[test]
    fn test_parse_datasets() {
        let source = parse_datasets(
            r#"{"parcels": [{"id": "42", "area": 150}, {"id": "43", "area": 80}], "owners": []}"#,
        )
        .unwrap();
        let (tx, rx) = mpsc::channel();

        source.get_features(
            FeatureRequest {
                dataset: "parcels".into(),
                crs: "EPSG:4326".to_string(),
                page_size: None,
                filters: vec![Filter::eq("id", "43")],
            },
            Box::new(move |records| {
                let _ = tx.send(records);
            }),
        );

        let records = rx.recv().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("area"), Some(&Value::from(80)));
    }

    #[rstest]
    #[case::record_array(r#"[1, 2]"#, true)]
    #[case::invalid_json(r#"{"a": "#, true)]
    #[case::empty_object("{}", false)]
    fn test_parse_record_errors(#[case] json: &str, #[case] is_err: bool) {
        assert_eq!(parse_record(json).is_err(), is_err);
    }

    #[rstest]
    #[case::not_object(r#"[]"#)]
    #[case::dataset_not_array(r#"{"parcels": {"id": 1}}"#)]
    #[case::record_not_object(r#"{"parcels": [1]}"#)]
    fn test_parse_datasets_errors(#[case] json: &str) {
        assert!(parse_datasets(json).is_err());
    }
}
