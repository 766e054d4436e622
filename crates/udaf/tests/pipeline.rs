//! End-to-end: histogram across tasks, then the trimmed average on the
//! reduced map, driven by hand the way a host would.

use std::sync::Arc;

use udaf::algorithms::trimmed_average::histogram_datum;
use udaf::{
    AggregateEvaluator, FrequencyMap, FrequencyMapAggregator, MaxRowAggregator, PartialInput,
    Phase, TrimmedAverageFunction,
};
use udaf_types::codec::encode_datum;
use udaf_types::datum::{Datum, Field, TypeDesc};
use udaf_types::error::UdafError;
use udaf_types::lazy::LazyDatum;

fn map_side(values: &[f64]) -> Datum {
    let mut agg = FrequencyMapAggregator::new();
    agg.initialize(Phase::RawToPartial, &[TypeDesc::Double]).unwrap();
    let mut buf = agg.new_buffer();
    for &v in values {
        agg.accumulate(&mut buf, &[Datum::Double(v)]).unwrap();
    }
    agg.extract_partial(&buf).unwrap()
}

#[test]
fn test_histogram_then_trimmed_average() {
    // {1.0:2, 5.0:2, 10.0:6} spread over three tasks.
    let p1 = map_side(&[10.0, 10.0, 1.0]);
    let p2 = map_side(&[5.0, 10.0, 10.0]);
    let p3 = map_side(&[10.0, 10.0, 1.0, 5.0]);

    let mut reducer = FrequencyMapAggregator::new();
    let shape = reducer
        .initialize(Phase::PartialToFinal, &[TypeDesc::frequency_map()])
        .unwrap();
    let mut buf = reducer.new_buffer();
    reducer.merge(&mut buf, Some(&PartialInput::from(p1))).unwrap();
    // Second partial arrives still encoded.
    let encoded = LazyDatum::new(encode_datum(&p2).unwrap());
    reducer.merge(&mut buf, Some(&PartialInput::from(encoded))).unwrap();
    reducer.merge(&mut buf, Some(&PartialInput::from(p3))).unwrap();
    let histogram = reducer.finalize(&mut buf).unwrap();

    assert_eq!(histogram, histogram_datum(&[(1.0, 2), (5.0, 2), (10.0, 6)]));

    let mut avg = TrimmedAverageFunction::new();
    assert_eq!(avg.initialize(&[shape]).unwrap(), TypeDesc::Double);
    match avg.evaluate(&histogram).unwrap() {
        Datum::Double(v) => assert!((v - 7.75).abs() < 1e-10, "got {}", v),
        other => panic!("Expected Double, got {:?}", other),
    }
}

#[test]
fn test_combiner_stage() {
    let mut combiner = FrequencyMapAggregator::new();
    combiner
        .initialize(Phase::PartialToPartial, &[TypeDesc::frequency_map()])
        .unwrap();
    let mut buf = combiner.new_buffer();
    combiner
        .merge(&mut buf, Some(&PartialInput::from(map_side(&[1.0, 2.0]))))
        .unwrap();
    combiner
        .merge(&mut buf, Some(&PartialInput::from(map_side(&[2.0]))))
        .unwrap();
    let combined = combiner.extract_partial(&buf).unwrap();

    let map = FrequencyMap::from_datum(&combined).unwrap();
    assert_eq!(map.get(1.0), 1);
    assert_eq!(map.get(2.0), 2);
    assert!((map.trimmed_average().unwrap() - 5.0 / 3.0).abs() < 1e-10);
}

#[test]
fn test_trimmed_average_on_empty_histogram() {
    let mut agg = FrequencyMapAggregator::new();
    agg.initialize(Phase::RawToFinal, &[TypeDesc::Double]).unwrap();
    let mut buf = agg.new_buffer();
    agg.accumulate(&mut buf, &[Datum::Null]).unwrap();
    let histogram = agg.finalize(&mut buf).unwrap();

    let mut avg = TrimmedAverageFunction::new();
    avg.initialize(&[TypeDesc::frequency_map()]).unwrap();
    assert!(matches!(
        avg.evaluate(&histogram),
        Err(UdafError::EmptyInput(_))
    ));
}

#[test]
fn test_max_row_across_tasks() {
    let raw_args = [TypeDesc::Double, TypeDesc::Text, TypeDesc::Int];
    let rows = [
        vec![
            vec![Datum::Double(1.5), Datum::from("a"), Datum::Int(1)],
            vec![Datum::Double(4.0), Datum::from("b"), Datum::Int(2)],
        ],
        vec![
            vec![Datum::Double(4.0), Datum::from("c"), Datum::Int(3)],
            vec![Datum::Double(-2.0), Datum::from("d"), Datum::Int(4)],
        ],
    ];

    let mut partials = Vec::new();
    let mut partial_shape = None;
    for task in &rows {
        let mut agg = MaxRowAggregator::new();
        partial_shape = Some(agg.initialize(Phase::RawToPartial, &raw_args).unwrap());
        let mut buf = agg.new_buffer();
        for row in task {
            agg.accumulate(&mut buf, row).unwrap();
        }
        partials.push(agg.extract_partial(&buf).unwrap());
    }

    let shape = partial_shape.unwrap();
    assert_eq!(
        shape,
        TypeDesc::Struct(vec![
            Field::new("col0", TypeDesc::Double),
            Field::new("col1", TypeDesc::Text),
            Field::new("col2", TypeDesc::Int),
        ])
    );

    let mut reducer = MaxRowAggregator::new();
    reducer.initialize(Phase::PartialToFinal, &[shape]).unwrap();
    let mut buf = reducer.new_buffer();
    for partial in &partials {
        let view = LazyDatum::encode(partial).unwrap();
        reducer.merge(&mut buf, Some(&PartialInput::from(view))).unwrap();
    }
    // Equal keys: the row from the first task is kept.
    assert_eq!(
        reducer.finalize(&mut buf).unwrap(),
        Datum::Struct(Arc::from(vec![
            Datum::Double(4.0),
            Datum::from("b"),
            Datum::Int(2),
        ]))
    );
}
