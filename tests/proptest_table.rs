//! Property tests for series ordering and table shape.

use proptest::prelude::*;
use std::collections::BTreeSet;
use workload_telemetry::{Cell, MetricValue, Sample, SampleSeries, SampleTable, Snapshot};

const NAMES: &[&str] = &["CPU1", "CPU2", "RAM", "GPU", "Fan pwmfan0", "nvp model"];

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    prop::collection::btree_map(
        prop::sample::select(NAMES).prop_map(|name| name.to_string()),
        (0.0f64..100.0).prop_map(MetricValue::Number),
        0..NAMES.len(),
    )
}

fn arb_samples() -> impl Strategy<Value = Vec<Sample>> {
    prop::collection::vec((0.0f64..1_000.0, arb_snapshot()), 0..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(t, snap)| Sample::new(1_700_000_000.0 + t, snap))
            .collect()
    })
}

proptest! {
    #[test]
    fn collected_series_is_time_ordered(samples in arb_samples()) {
        let n = samples.len();
        let series: SampleSeries = samples.into_iter().collect();
        prop_assert_eq!(series.len(), n);
        prop_assert!(series.is_time_ordered());
    }

    #[test]
    fn table_has_one_column_per_metric_name(samples in arb_samples()) {
        let series: SampleSeries = samples.into_iter().collect();
        let table = SampleTable::from_series(&series);

        let expected: BTreeSet<&str> = series
            .iter()
            .flat_map(|s| s.metrics.keys().map(String::as_str))
            .collect();
        prop_assert_eq!(&table.columns()[0], "time");
        let got: Vec<&str> = table.columns()[1..].iter().map(String::as_str).collect();
        prop_assert_eq!(got, expected.into_iter().collect::<Vec<_>>());
        prop_assert_eq!(table.len(), series.len());
        prop_assert!(table.rows().iter().all(|row| row.len() == table.columns().len()));
    }

    #[test]
    fn cells_are_absent_exactly_when_metric_missing(samples in arb_samples()) {
        let series: SampleSeries = samples.into_iter().collect();
        let table = SampleTable::from_series(&series);

        for (row, sample) in series.iter().enumerate() {
            prop_assert_eq!(table.cell(row, "time"), Some(&Cell::Number(sample.timestamp)));
            for column in &table.columns()[1..] {
                let cell = table.cell(row, column).unwrap();
                match sample.get(column) {
                    Some(value) => prop_assert_eq!(cell, &Cell::from(value)),
                    None => prop_assert!(cell.is_absent()),
                }
            }
        }
    }

    #[test]
    fn csv_has_a_line_per_row_and_a_field_per_column(samples in arb_samples()) {
        let series: SampleSeries = samples.into_iter().collect();
        let table = SampleTable::from_series(&series);
        let csv = table.to_csv_string();

        let lines: Vec<&str> = csv.lines().collect();
        prop_assert_eq!(lines.len(), table.len() + 1);
        for line in lines {
            prop_assert_eq!(line.split(',').count(), table.columns().len());
        }
    }
}
