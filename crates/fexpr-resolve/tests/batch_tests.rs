use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fexpr_lang::{Record, Value};
use fexpr_resolve::{Cache, Evaluator, MemorySource, Mode};
use rstest::{fixture, rstest};

#[fixture]
fn source() -> Arc<MemorySource> {
    Arc::new(
        MemorySource::new()
            .with_dataset(
                "parcels",
                vec![Record::new().with("id", "42").with("area", 150)],
            )
            .with_dataset("roads", vec![Record::new().with("id", 1).with("name", "Main St")])
            .with_latency(Duration::from_millis(5)),
    )
}

#[fixture]
fn evaluator(source: Arc<MemorySource>) -> (Evaluator, Arc<MemorySource>) {
    (Evaluator::new(Cache::new(), source.clone()), source)
}

#[rstest]
#[tokio::test]
async fn test_batch_reruns_whole_batch_once(evaluator: (Evaluator, Arc<MemorySource>)) {
    let (evaluator, source) = evaluator;
    let record = Record::new().with("parcel_id", "42");

    let outcome = evaluator
        .evaluate_all(
            [
                ("x", "1 + 1"),
                ("y", "getFeature('parcels', 'id', {parcel_id}).area"),
            ],
            &record,
            Mode::Value,
        )
        .await;

    assert_eq!(
        outcome.values,
        BTreeMap::from([
            ("x".to_string(), Value::from(2)),
            ("y".to_string(), Value::from(150)),
        ])
    );
    assert_eq!(outcome.rounds, 2);
    assert!(outcome.settled);
    assert_eq!(source.dispatch_count(), 1);
}

#[rstest]
#[tokio::test]
async fn test_batch_shares_lookups_between_expressions(evaluator: (Evaluator, Arc<MemorySource>)) {
    let (evaluator, source) = evaluator;
    let record = Record::new().with("parcel_id", "42").with("road_id", 1);

    let outcome = evaluator
        .evaluate_all(
            [
                ("area", "getFeature('parcels', 'id', {parcel_id}).area"),
                ("double", "getFeature('parcels', 'id', {parcel_id}).area * 2"),
                ("road", "upper(getFeature('roads', 'id', {road_id}).name)"),
            ],
            &record,
            Mode::Value,
        )
        .await;

    assert_eq!(outcome.values.get("area"), Some(&Value::from(150)));
    assert_eq!(outcome.values.get("double"), Some(&Value::from(300)));
    assert_eq!(outcome.values.get("road"), Some(&Value::from("MAIN ST")));
    assert_eq!(outcome.rounds, 2);
    assert_eq!(source.dispatch_count(), 2);
}

#[rstest]
#[tokio::test]
async fn test_batch_drops_failed_expressions(evaluator: (Evaluator, Arc<MemorySource>)) {
    let (evaluator, _) = evaluator;
    let record = Record::new().with("a", 1);

    let outcome = evaluator
        .evaluate_all([("ok", "{a} + 1"), ("broken", "{a +")], &record, Mode::Value)
        .await;

    assert_eq!(
        outcome.values,
        BTreeMap::from([("ok".to_string(), Value::from(2))])
    );
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.diagnostics.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_batch_filter_mode(evaluator: (Evaluator, Arc<MemorySource>)) {
    let (evaluator, _) = evaluator;
    let record = Record::new();

    let outcome = evaluator
        .evaluate_all([("open", "{status} = 'open'")], &record, Mode::Filter)
        .await;

    assert_eq!(
        outcome.values.get("open"),
        Some(&Value::Array(vec![Value::Filter(fexpr_lang::Filter::eq(
            "status", "open"
        ))]))
    );
}

#[rstest]
#[tokio::test]
async fn test_empty_batch(evaluator: (Evaluator, Arc<MemorySource>)) {
    let (evaluator, _) = evaluator;

    let outcome = evaluator
        .evaluate_all(Vec::<(String, String)>::new(), &Record::new(), Mode::Value)
        .await;

    assert!(outcome.values.is_empty());
    assert_eq!(outcome.rounds, 1);
    assert!(outcome.settled);
}
