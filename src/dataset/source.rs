//! CSV-backed record source.
//!
//! Expects one headered file per split, `UNSW-NB15-{train,val,test}.csv`.
//! Endpoint and label columns are located by name. Categorical columns are
//! ordinal-encoded through a vocabulary shared by every split read from the
//! same source; every other column that is not ignored must be numeric.

use crate::core::{Error, Result, SplitRole};
use crate::dataset::record::{FlowRecord, RecordSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Column roles of the CSV files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CsvLayout {
    /// Source host column
    pub src_column: String,
    /// Destination host column
    pub dst_column: String,
    /// Category column
    pub label_column: String,
    /// Columns excluded from the feature vector
    pub ignored_columns: Vec<String>,
    /// Text columns encoded as one ordinal feature each
    pub categorical_columns: Vec<String>,
    /// Label used when the category cell is empty
    pub empty_label: String,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            src_column: "srcip".to_string(),
            dst_column: "dstip".to_string(),
            label_column: "attack_cat".to_string(),
            ignored_columns: ["label", "sport", "dsport", "stime", "ltime"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            categorical_columns: ["proto", "state", "service"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            empty_label: "Normal".to_string(),
        }
    }
}

/// Ordinal codes of categorical values, per column.
///
/// Codes are handed out in order of first appearance and never change, so a
/// value keeps its code across splits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    columns: HashMap<String, HashMap<String, usize>>,
}

impl CategoryVocabulary {
    /// Code of `value` in `column`, assigning the next free code if unseen.
    pub fn encode(&mut self, column: &str, value: &str) -> usize {
        let codes = self.columns.entry(column.to_ascii_lowercase()).or_default();
        let next = codes.len();
        *codes.entry(value.to_string()).or_insert(next)
    }

    /// Code of `value` in `column` without assigning one.
    pub fn code(&self, column: &str, value: &str) -> Option<usize> {
        self.columns
            .get(&column.to_ascii_lowercase())
            .and_then(|codes| codes.get(value))
            .copied()
    }

    /// Number of distinct values seen in `column`.
    pub fn cardinality(&self, column: &str) -> usize {
        self.columns
            .get(&column.to_ascii_lowercase())
            .map_or(0, HashMap::len)
    }
}

/// Reads split files from a dataset directory.
#[derive(Clone, Debug)]
pub struct CsvSource {
    root: PathBuf,
    layout: CsvLayout,
    vocabulary: Arc<Mutex<CategoryVocabulary>>,
}

impl CsvSource {
    /// Create a source over `root` with the default layout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: CsvLayout::default(),
            vocabulary: Arc::default(),
        }
    }

    /// Use a custom column layout.
    pub fn with_layout(mut self, layout: CsvLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Dataset directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the categorical codes assigned so far.
    pub fn vocabulary(&self) -> Result<CategoryVocabulary> {
        Ok(self.lock_vocabulary()?.clone())
    }

    fn lock_vocabulary(&self) -> Result<MutexGuard<'_, CategoryVocabulary>> {
        self.vocabulary
            .lock()
            .map_err(|_| Error::DataIntegrity("category vocabulary lock poisoned".to_string()))
    }

    /// File holding the records of `role`.
    pub fn path_for(&self, role: SplitRole) -> PathBuf {
        self.root.join(format!("UNSW-NB15-{}.csv", role))
    }

    /// Parse records from any reader.
    pub fn read<R: Read>(&self, reader: R) -> Result<Vec<FlowRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers().map_err(csv_error)?.clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::DataIntegrity(format!("missing column '{}'", name)))
        };
        let src = find(&self.layout.src_column)?;
        let dst = find(&self.layout.dst_column)?;
        let label = find(&self.layout.label_column)?;
        let feature_columns: Vec<usize> = (0..headers.len())
            .filter(|&c| c != src && c != dst && c != label)
            .filter(|&c| {
                !self
                    .layout
                    .ignored_columns
                    .iter()
                    .any(|ignored| ignored.eq_ignore_ascii_case(&headers[c]))
            })
            .collect();
        let categorical: Vec<bool> = feature_columns
            .iter()
            .map(|&c| {
                self.layout
                    .categorical_columns
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&headers[c]))
            })
            .collect();

        let mut vocabulary = self.lock_vocabulary()?;
        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(csv_error)?;
            let cell = |c: usize| record.get(c).unwrap_or("");

            let features = feature_columns
                .iter()
                .zip(&categorical)
                .map(|(&c, &is_categorical)| {
                    if is_categorical {
                        return Ok(vocabulary.encode(&headers[c], cell(c)) as f32);
                    }
                    cell(c).parse::<f32>().map_err(|_| {
                        Error::DataIntegrity(format!(
                            "row {} column '{}': '{}' is not numeric",
                            row + 1,
                            &headers[c],
                            cell(c)
                        ))
                    })
                })
                .collect::<Result<Vec<f32>>>()?;

            let category = match cell(label) {
                "" => self.layout.empty_label.as_str(),
                other => other,
            };
            records.push(FlowRecord::new(cell(src), cell(dst), features, category));
        }
        for column in &self.layout.categorical_columns {
            debug!(column = %column, values = vocabulary.cardinality(column), "Category codes");
        }
        Ok(records)
    }
}

impl RecordSource for CsvSource {
    fn load(&self, role: SplitRole) -> Result<Vec<FlowRecord>> {
        let path = self.path_for(role);
        let file = File::open(&path)?;
        let records = self.read(file)?;
        info!(split = %role, path = %path.display(), records = records.len(), "Records loaded");
        Ok(records)
    }
}

fn csv_error(err: csv::Error) -> Error {
    Error::DataIntegrity(format!("malformed CSV: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
srcip,sport,dstip,dsport,dur,sbytes,attack_cat,label
10.0.0.1,1390,10.0.0.9,53,0.001,132,,0
10.0.0.2,33661,10.0.0.9,1024,0.036,528, Exploits ,1
10.0.0.1,1464,10.0.0.7,53,0.002,146,DoS,1
";

    #[test]
    fn test_read_sample() {
        let records = CsvSource::new(".").read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].src_addr, "10.0.0.1");
        assert_eq!(records[0].dst_addr, "10.0.0.9");
        assert_eq!(records[0].features, vec![0.001, 132.0]);
        assert_eq!(records[0].label, "Normal");
        assert_eq!(records[1].label, "Exploits");
        assert_eq!(records[2].label, "DoS");
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let text = "srcip,dstip,dur,attack_cat\n10.0.0.1,10.0.0.2,tcp,Normal\n";
        let err = CsvSource::new(".").read(text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_missing_column_rejected() {
        let text = "srcip,dur,attack_cat\n10.0.0.1,0.1,Normal\n";
        assert!(CsvSource::new(".").read(text.as_bytes()).is_err());
    }

    #[test]
    fn test_custom_layout() {
        let layout = CsvLayout {
            src_column: "a".to_string(),
            dst_column: "b".to_string(),
            label_column: "y".to_string(),
            ignored_columns: vec!["id".to_string()],
            categorical_columns: Vec::new(),
            empty_label: "Normal".to_string(),
        };
        let text = "id,a,b,x,y\n7,h1,h2,0.5,Worms\n";
        let records = CsvSource::new(".")
            .with_layout(layout)
            .read(text.as_bytes())
            .unwrap();
        assert_eq!(records[0].features, vec![0.5]);
        assert_eq!(records[0].label, "Worms");
    }

    #[test]
    fn test_categorical_columns_encoded() {
        let text = "\
srcip,sport,dstip,dsport,proto,state,dur,sbytes,service,attack_cat,label
59.166.0.0,1390,149.171.126.6,53,udp,CON,0.001,132,dns,,0
59.166.0.2,4093,149.171.126.3,80,tcp,FIN,0.036,528,http,Exploits,1
59.166.0.0,1464,149.171.126.6,53,udp,CON,0.002,146,-,,0
";
        let source = CsvSource::new(".");
        let records = source.read(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        // proto, state, dur, sbytes, service
        assert_eq!(records[0].features, vec![0.0, 0.0, 0.001, 132.0, 0.0]);
        assert_eq!(records[1].features, vec![1.0, 1.0, 0.036, 528.0, 1.0]);
        assert_eq!(records[2].features, vec![0.0, 0.0, 0.002, 146.0, 2.0]);
        assert_eq!(records[0].label, "Normal");
        assert_eq!(source.vocabulary().unwrap().cardinality("service"), 3);
    }

    #[test]
    fn test_category_codes_shared_across_splits() {
        let train = "srcip,dstip,proto,dur,attack_cat\na,b,tcp,0.1,Normal\na,c,udp,0.2,DoS\n";
        let test = "srcip,dstip,proto,dur,attack_cat\nb,c,udp,0.3,Normal\nb,d,arp,0.4,Normal\n";
        let source = CsvSource::new(".");
        source.read(train.as_bytes()).unwrap();
        let records = source.read(test.as_bytes()).unwrap();
        assert_eq!(records[0].features, vec![1.0, 0.3]);
        assert_eq!(records[1].features, vec![2.0, 0.4]);
        assert_eq!(records[0].features.len(), records[1].features.len());

        let vocabulary = source.vocabulary().unwrap();
        assert_eq!(vocabulary.code("proto", "tcp"), Some(0));
        assert_eq!(vocabulary.code("PROTO", "arp"), Some(2));
        assert_eq!(vocabulary.code("proto", "icmp"), None);
    }

    #[test]
    fn test_load_split_file() {
        let dir = TempDir::new().unwrap();
        let source = CsvSource::new(dir.path());
        std::fs::write(source.path_for(SplitRole::Val), SAMPLE).unwrap();

        assert_eq!(source.load(SplitRole::Val).unwrap().len(), 3);
        assert!(matches!(source.load(SplitRole::Test), Err(Error::Io(_))));
    }
}
