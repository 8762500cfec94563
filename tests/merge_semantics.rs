//! Order- and corruption-independence of the merge path.

use statmerge::{
    key::DEFAULT_SEPARATOR,
    operator::MergeOperator,
    registry::{DESCRIPTOR_COUNT, DESCRIPTOR_MINMAX},
    stat::builtin::{CountSerializer, CountStat, MinMaxSerializer, MinMaxStat},
    stat::{Stat, StatSerializer},
    MergeOperatorConfig, StatsMergeOperator,
};

fn operator() -> StatsMergeOperator {
    let mut config = MergeOperatorConfig::new(DEFAULT_SEPARATOR);
    config.insert("towers", DESCRIPTOR_COUNT);
    config.insert("sensors", DESCRIPTOR_MINMAX);
    StatsMergeOperator::from_config(&config)
}

fn merge(operator: &StatsMergeOperator, key: &[u8], values: &[Vec<u8>]) -> Vec<u8> {
    let refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
    operator.merge(key, &refs).expect("merge")
}

fn decode_count(bytes: &[u8]) -> u64 {
    let stat = CountSerializer.decode(bytes).expect("count frame");
    stat.as_any().downcast_ref::<CountStat>().unwrap().value()
}

#[test]
fn every_permutation_folds_to_the_same_count() {
    let operator = operator();
    let counts = [5u64, 7, 3, 11, 2];
    let expected: u64 = counts.iter().sum();

    let mut values: Vec<Vec<u8>> = counts.iter().map(|n| CountStat::new(*n).encode()).collect();
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..32 {
        rng.shuffle(&mut values);
        let merged = merge(&operator, b"towers~k", &values);
        assert_eq!(decode_count(&merged), expected);
    }
}

#[test]
fn corrupt_value_at_any_position_changes_nothing() {
    let operator = operator();
    let clean: Vec<Vec<u8>> = [5u64, 7, 3].iter().map(|n| CountStat::new(*n).encode()).collect();
    let baseline = decode_count(&merge(&operator, b"towers~k", &clean));

    for position in 0..=clean.len() {
        let mut values = clean.clone();
        values.insert(position, b"corrupt".to_vec());
        let merged = merge(&operator, b"towers~k", &values);
        assert_eq!(decode_count(&merged), baseline, "corrupt at {position}");
    }
}

#[test]
fn truncated_frame_counts_as_corrupt() {
    let operator = operator();
    let mut truncated = CountStat::new(100).encode();
    truncated.truncate(truncated.len() - 2);
    let values = vec![CountStat::new(5).encode(), truncated, CountStat::new(7).encode()];
    let merged = merge(&operator, b"towers~k", &values);
    assert_eq!(decode_count(&merged), 12);
}

#[test]
fn all_corrupt_returns_first_value_byte_for_byte() {
    let operator = operator();
    let values = vec![b"first-junk".to_vec(), b"second-junk".to_vec()];
    let merged = merge(&operator, b"towers~k", &values);
    assert_eq!(merged, b"first-junk");
}

#[test]
fn minmax_is_permutation_independent_too() {
    let operator = operator();
    let observations = [3i64, -5, 42, 0, 17, -1];
    let mut values: Vec<Vec<u8>> = observations
        .iter()
        .map(|v| MinMaxStat::of(*v).encode())
        .collect();
    let mut rng = fastrand::Rng::with_seed(0xfeed);
    for _ in 0..16 {
        rng.shuffle(&mut values);
        let merged = merge(&operator, b"sensors~site", &values);
        let stat = MinMaxSerializer.decode(&merged).expect("minmax frame");
        let stat = stat.as_any().downcast_ref::<MinMaxStat>().unwrap();
        assert_eq!((stat.min(), stat.max()), (-5, 42));
    }
}

#[test]
fn towers_scenario_counts_to_fifteen() {
    // Key K holds 5, 7, an undecodable blob, then 3: the merge yields 15.
    let operator = operator();
    let values = vec![
        CountStat::new(5).encode(),
        CountStat::new(7).encode(),
        vec![0xde, 0xad, 0xbe, 0xef],
        CountStat::new(3).encode(),
    ];
    let merged = merge(&operator, b"towers~K", &values);
    assert_eq!(decode_count(&merged), 15);
}
