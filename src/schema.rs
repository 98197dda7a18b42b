use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregated, SizeRow};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,

    pub executable: PathBuf,
    pub data_file: PathBuf,
    pub payload_format: String,
    pub repeats: u32,
    pub test_sizes: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run: RunMeta,
    pub measurements: Vec<String>,
    pub rows: Vec<SizeRow>,
}

impl SweepReport {
    pub fn new(run: RunMeta, aggregated: Aggregated) -> Self {
        Self {
            run,
            measurements: aggregated.names,
            rows: aggregated.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use std::collections::BTreeMap;

    #[test]
    fn test_report_json_shape() {
        let mut agg = Aggregator::new();
        agg.record(100, &BTreeMap::from([("std::vector".to_string(), 5.0)]))
            .unwrap();
        agg.record(100, &BTreeMap::from([("std::vector".to_string(), 7.0)]))
            .unwrap();

        let report = SweepReport::new(
            RunMeta {
                schema_version: SCHEMA_VERSION,
                bench_version: "0.1.0".to_string(),
                profile: "quick".to_string(),
                seed: 9,
                timestamp_utc: "unix:0".to_string(),
                git_sha: None,
                executable: PathBuf::from("../performance"),
                data_file: PathBuf::from("test.dat"),
                payload_format: "bracket".to_string(),
                repeats: 2,
                test_sizes: vec![100],
            },
            agg.finish(),
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["run"]["seed"], 9);
        assert_eq!(value["measurements"][0], "std::vector");
        assert_eq!(value["rows"][0]["test_size"], 100);
        assert_eq!(value["rows"][0]["trials"], 2);
        assert_eq!(value["rows"][0]["measurements"]["std::vector"]["mean"], 6.0);

        let back: SweepReport = serde_json::from_value(value).unwrap();
        assert_eq!(back.rows[0].mean("std::vector"), Some(6.0));
    }
}
