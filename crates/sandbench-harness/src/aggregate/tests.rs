//! Unit tests for timing aggregation.

use rstest::rstest;

use super::*;

fn samples(workload: &str, configuration: &str, times: &[f64]) -> Vec<Sample> {
    times
        .iter()
        .map(|time| Sample::new(workload, configuration, *time))
        .collect()
}

fn find<'a>(records: &'a [AggregateRecord], configuration: &str) -> &'a AggregateRecord {
    records
        .iter()
        .find(|record| record.configuration() == configuration)
        .expect("group present")
}

#[rstest]
fn groups_by_workload_and_configuration() {
    let mut log = samples("resize", "none", &[10.0, 12.0, 11.0]);
    log.extend(samples("resize", "landlock", &[14.0, 15.0, 13.0]));

    let records = aggregate(&log);

    assert_eq!(records.len(), 2);
    let none = find(&records, "none");
    assert_eq!(none.mean(), 11.0);
    assert_eq!(none.std(), 1.0);
    assert_eq!(none.count(), Some(3));
    assert_eq!(find(&records, "landlock").mean(), 14.0);
}

#[rstest]
fn single_sample_has_zero_deviation() {
    let records = aggregate(&samples("copy", "none", &[42.5]));
    let [record] = records.as_slice() else {
        panic!("expected one group");
    };
    assert_eq!(record.mean(), 42.5);
    assert_eq!(record.std(), 0.0);
    assert_eq!(record.count(), Some(1));
}

#[rstest]
fn groups_keep_first_appearance_order() {
    let mut log = samples("b", "ebpf", &[1.0]);
    log.extend(samples("a", "none", &[2.0]));
    log.extend(samples("b", "ebpf", &[3.0]));
    log.extend(samples("b", "none", &[4.0]));

    let records = aggregate(&log);
    let keys: Vec<(&str, &str)> = records
        .iter()
        .map(|record| (record.workload(), record.configuration()))
        .collect();

    assert_eq!(keys, [("b", "ebpf"), ("a", "none"), ("b", "none")]);
}

#[rstest]
#[case(&[0, 1, 2, 3, 4])]
#[case(&[4, 3, 2, 1, 0])]
#[case(&[2, 0, 4, 1, 3])]
fn aggregation_is_order_independent(#[case] permutation: &[usize]) {
    let times = [0.1, 17.3, 2.25, 1e-3, 9.875];
    let reference = aggregate(&samples("mux", "landlock", &times));

    let permuted: Vec<Sample> = permutation
        .iter()
        .filter_map(|index| times.get(*index))
        .map(|time| Sample::new("mux", "landlock", *time))
        .collect();
    let records = aggregate(&permuted);

    assert_eq!(records, reference);
}

#[rstest]
fn empty_input_yields_no_groups() {
    assert!(aggregate(&Vec::<Sample>::new()).is_empty());
}
