// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Append-only CSV trail of training metrics, one row per
// completed epoch of any model.
//
// Example:
//   model_id,epoch,loss,accuracy,timestamp
//   3,1,3.1245,0.123,1760000000
//   3,2,2.8901,0.184,1760000012
//
// Rows are never rewritten; a model's history is read back by
// filtering on `model_id`.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::model_record::{ModelId, TrainingMetric};

const HEADER: [&str; 5] = ["model_id", "epoch", "loss", "accuracy", "timestamp"];

/// On-disk row. Column names stay snake_case whatever the JSON
/// naming of `TrainingMetric` is.
#[derive(Debug, Serialize, Deserialize)]
struct MetricRow {
    model_id:  ModelId,
    epoch:     usize,
    loss:      f64,
    accuracy:  f64,
    timestamp: u64,
}

impl From<&TrainingMetric> for MetricRow {
    fn from(m: &TrainingMetric) -> Self {
        Self {
            model_id:  m.model_id,
            epoch:     m.epoch,
            loss:      m.loss,
            accuracy:  m.accuracy,
            timestamp: m.timestamp,
        }
    }
}

impl From<MetricRow> for TrainingMetric {
    fn from(r: MetricRow) -> Self {
        Self {
            model_id:  r.model_id,
            epoch:     r.epoch,
            loss:      r.loss,
            accuracy:  r.accuracy,
            timestamp: r.timestamp,
        }
    }
}

/// Logs epoch metrics to a CSV file and reads them back.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open (or create) `<dir>/metrics.csv`.
    /// The header is only written when the file is new.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut w = csv::Writer::from_path(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            w.write_record(HEADER)?;
            w.flush()?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &TrainingMetric) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        w.serialize(MetricRow::from(m))?;
        w.flush()?;

        tracing::debug!(
            "Logged model {} epoch {} metrics: loss={:.4}, accuracy={:.4}",
            m.model_id,
            m.epoch,
            m.loss,
            m.accuracy,
        );

        Ok(())
    }

    /// All rows for one model, ordered by epoch.
    pub fn read_model(&self, model_id: ModelId) -> Result<Vec<TrainingMetric>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.csv_path)
            .with_context(|| format!("Cannot read '{}'", self.csv_path.display()))?;

        let mut rows = Vec::new();
        for result in rdr.deserialize::<MetricRow>() {
            let row = result.with_context(|| format!("Bad row in '{}'", self.csv_path.display()))?;
            if row.model_id == model_id {
                rows.push(TrainingMetric::from(row));
            }
        }
        rows.sort_by_key(|m| m.epoch);
        Ok(rows)
    }
}
