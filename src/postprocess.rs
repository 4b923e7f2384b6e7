//! Cleaning of a session table for presentation.

use crate::table::{Cell, SampleTable, TIME_COLUMN};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Columns whose name contains any of these substrings are dropped.
    #[serde(default = "default_excluded_metrics")]
    pub excluded_metrics: Vec<String>,

    /// Columns starting with this prefix are averaged into one column of
    /// that name.
    #[serde(default = "default_aggregate_prefix")]
    pub aggregate_prefix: String,

    /// Fraction columns converted to percent.
    #[serde(default = "default_percent_columns")]
    pub percent_columns: Vec<String>,

    /// Columns forced to numbers: text that parses becomes a number, other
    /// text becomes absent.
    #[serde(default = "default_numeric_columns")]
    pub numeric_columns: Vec<String>,

    #[serde(default = "default_round_digits")]
    pub round_digits: u32,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            excluded_metrics: default_excluded_metrics(),
            aggregate_prefix: default_aggregate_prefix(),
            percent_columns: default_percent_columns(),
            numeric_columns: default_numeric_columns(),
            round_digits: default_round_digits(),
        }
    }
}

fn default_excluded_metrics() -> Vec<String> {
    [
        "Temp", "Power", "clocks", "model", "EMC", "APE", "NVDEC", "NVJPG", "NVJPG1", "OFA",
        "SE", "VIC", "Fan", "pwmfan0", "uptime",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_aggregate_prefix() -> String {
    "CPU".to_string()
}

fn default_percent_columns() -> Vec<String> {
    vec!["RAM".to_string(), "SWAP".to_string()]
}

fn default_numeric_columns() -> Vec<String> {
    vec!["GPU".to_string()]
}

fn default_round_digits() -> u32 {
    3
}

/// Drop excluded metrics, coerce numeric columns, average per-core columns,
/// convert fractions to percent and round. `time` is never dropped or
/// rounded, absent cells stay absent.
pub fn preprocess(table: &SampleTable, config: &PostProcessConfig) -> SampleTable {
    let mut out = table.clone();

    out.retain_columns(|name| {
        name == TIME_COLUMN || !config.excluded_metrics.iter().any(|x| name.contains(x.as_str()))
    });

    for column in &config.numeric_columns {
        out.map_column(column, |cell| match cell {
            Cell::Text(s) => s.trim().parse::<f64>().map_or(Cell::Absent, Cell::Number),
            other => other.clone(),
        });
    }

    if !config.aggregate_prefix.is_empty() {
        aggregate_prefix(&mut out, &config.aggregate_prefix);
    }

    for column in &config.percent_columns {
        out.map_column(column, |cell| match cell {
            Cell::Number(v) => Cell::Number(v * 100.0),
            other => other.clone(),
        });
    }

    let scale = 10f64.powi(config.round_digits as i32);
    out.map_numbers(|column, v| {
        if column == TIME_COLUMN {
            v
        } else {
            (v * scale).round() / scale
        }
    });

    out
}

fn aggregate_prefix(table: &mut SampleTable, prefix: &str) {
    let indices: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with(prefix))
        .map(|(i, _)| i)
        .collect();
    if indices.is_empty() {
        return;
    }

    let means: Vec<Cell> = table
        .rows()
        .iter()
        .map(|row| {
            let values: Vec<f64> = indices.iter().filter_map(|&i| row[i].as_f64()).collect();
            if values.is_empty() {
                Cell::Absent
            } else {
                Cell::Number(values.iter().sum::<f64>() / values.len() as f64)
            }
        })
        .collect();

    table.retain_columns(|name| !name.starts_with(prefix));
    table.push_column(prefix, means);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Snapshot;
    use crate::sampler::{Sample, SampleSeries};

    fn table(rows: Vec<Vec<(&str, f64)>>) -> SampleTable {
        let series: SampleSeries = rows
            .into_iter()
            .enumerate()
            .map(|(i, metrics)| {
                let snap: Snapshot = metrics
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect();
                Sample::new(1_700_000_000.0 + i as f64 * 0.05, snap)
            })
            .collect();
        SampleTable::from_series(&series)
    }

    #[test]
    fn drops_excluded_and_keeps_time() {
        let t = table(vec![vec![("Temp cpu", 40.0), ("uptime", 99.0), ("GPU", 3.0)]]);
        let out = preprocess(&t, &PostProcessConfig::default());
        assert_eq!(out.columns(), ["time", "GPU"]);
    }

    #[test]
    fn averages_cores_ignoring_absent_cells() {
        let t = table(vec![
            vec![("CPU1", 10.0), ("CPU2", 30.0)],
            vec![("CPU1", 50.0)],
            vec![("GPU", 1.0)],
        ]);
        let out = preprocess(&t, &PostProcessConfig::default());
        assert!(out.column_index("CPU1").is_none());
        assert_eq!(out.cell(0, "CPU"), Some(&Cell::Number(20.0)));
        assert_eq!(out.cell(1, "CPU"), Some(&Cell::Number(50.0)));
        assert_eq!(out.cell(2, "CPU"), Some(&Cell::Absent));
    }

    #[test]
    fn converts_fractions_to_percent_and_rounds() {
        let t = table(vec![vec![("RAM", 0.123456), ("ram_used(total)", 2.71828)]]);
        let out = preprocess(&t, &PostProcessConfig::default());
        assert_eq!(out.cell(0, "RAM"), Some(&Cell::Number(12.346)));
        assert_eq!(out.cell(0, "ram_used(total)"), Some(&Cell::Number(2.718)));
        assert_eq!(out.cell(0, "time"), Some(&Cell::Number(1_700_000_000.0)));
    }

    #[test]
    fn gpu_text_is_coerced_to_number_or_absent() {
        let mut a = Snapshot::new();
        a.insert("GPU".into(), " 42.5 ".into());
        let mut b = Snapshot::new();
        b.insert("GPU".into(), "N/A".into());
        let mut c = Snapshot::new();
        c.insert("GPU".into(), 7.0.into());
        let series: SampleSeries = [
            Sample::new(1.0, a),
            Sample::new(2.0, b),
            Sample::new(3.0, c),
        ]
        .into_iter()
        .collect();

        let out = preprocess(&SampleTable::from_series(&series), &PostProcessConfig::default());
        assert_eq!(out.cell(0, "GPU"), Some(&Cell::Number(42.5)));
        assert_eq!(out.cell(1, "GPU"), Some(&Cell::Absent));
        assert_eq!(out.cell(2, "GPU"), Some(&Cell::Number(7.0)));
    }

    #[test]
    fn source_table_is_left_untouched() {
        let t = table(vec![vec![("RAM", 0.5)]]);
        let _ = preprocess(&t, &PostProcessConfig::default());
        assert_eq!(t.cell(0, "RAM"), Some(&Cell::Number(0.5)));
    }
}
