//! Labeled training data built from the accounts CSV

use crate::error::DatasetError;
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::types::account::AccountRecord;
use crate::types::category::{RiskCategory, CATEGORY_COUNT};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One account's features with its category label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledExample {
    pub features: FeatureVector,
    pub category: RiskCategory,
}

/// Feature rows plus labels, with bookkeeping about rejected input rows
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    examples: Vec<LabeledExample>,
    rejected_rows: usize,
    delinquent: usize,
}

impl Dataset {
    /// Read and label a CSV file of accounts.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        reference: DateTime<Utc>,
    ) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dataset = Self::from_reader(file, reference)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            rejected = dataset.rejected_rows(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Read and label CSV from any reader.
    ///
    /// Rows that fail to parse or whose features cannot be derived are
    /// skipped and counted; I/O failures abort the read.
    pub fn from_reader<R: Read>(reader: R, reference: DateTime<Utc>) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut dataset = Self::default();

        for (row, result) in csv_reader.deserialize::<AccountRecord>().enumerate() {
            match result {
                Ok(record) => dataset.push(record, reference, row + 1),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(row = row + 1, error = %e, "Rejected unparseable row");
                    dataset.rejected_rows += 1;
                }
            }
        }

        Ok(dataset)
    }

    /// Label already-parsed records.
    pub fn from_records<I>(records: I, reference: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = AccountRecord>,
    {
        let mut dataset = Self::default();
        for (row, record) in records.into_iter().enumerate() {
            dataset.push(record, reference, row + 1);
        }
        dataset
    }

    fn push(&mut self, record: AccountRecord, reference: DateTime<Utc>, row: usize) {
        if let Err(reason) = record.check_bounds() {
            warn!(row = row, reason = %reason, "Rejected out-of-bounds row");
            self.rejected_rows += 1;
            return;
        }

        match FeatureExtractor::new().extract(&record, reference) {
            Ok(features) => {
                if record.is_delinquent() {
                    self.delinquent += 1;
                }
                self.examples.push(LabeledExample {
                    features,
                    category: RiskCategory::from_months_overdue(record.months_overdue),
                });
            }
            Err(e) => {
                warn!(row = row, error = %e, "Rejected row during feature derivation");
                self.rejected_rows += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    /// Input rows that were skipped
    pub fn rejected_rows(&self) -> usize {
        self.rejected_rows
    }

    /// Number of examples per category, indexed by category code
    pub fn class_distribution(&self) -> [usize; CATEGORY_COUNT] {
        let mut counts = [0; CATEGORY_COUNT];
        for example in &self.examples {
            counts[example.category.index()] += 1;
        }
        counts
    }

    /// Number of distinct categories present
    pub fn distinct_classes(&self) -> usize {
        self.class_distribution().iter().filter(|&&c| c > 0).count()
    }

    /// Share of accounts with any overdue payment
    pub fn delinquent_share(&self) -> f64 {
        if self.examples.is_empty() {
            return 0.0;
        }
        self.delinquent as f64 / self.examples.len() as f64
    }

    /// Log the category distribution
    pub fn log_distribution(&self) {
        let counts = self.class_distribution();
        for category in RiskCategory::ALL {
            info!(
                category = category.short_name(),
                code = category.code(),
                count = counts[category.index()],
                "Category distribution"
            );
        }
        info!(
            delinquent_share = format!("{:.1}%", self.delinquent_share() * 100.0),
            rejected = self.rejected_rows,
            "Dataset summary"
        );
    }
}
