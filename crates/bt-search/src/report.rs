//! Search-run bookkeeping: one record per evaluated candidate.

use bt_types::ParamValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which traversal produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchKind {
    Grid,
    Randomized,
}

/// One evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// 1-based position in evaluation order, global across grids.
    pub number: u64,
    /// Resolved grid parameters under their grid names.
    pub parameters: Vec<(String, ParamValue)>,
    pub metric: f64,
    /// Whether this candidate improved on the best seen so far in its grid.
    pub improved: bool,
    pub finished_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub(crate) fn new(
        number: u64,
        parameters: &[(String, ParamValue)],
        metric: f64,
        improved: bool,
    ) -> Self {
        Self {
            number,
            parameters: parameters.to_vec(),
            metric,
            improved,
            finished_at: Utc::now(),
        }
    }
}

/// Aggregate log of one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub id: Uuid,
    pub kind: SearchKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records: Vec<CandidateRecord>,
    /// Number of the winning candidate, set when the run completes.
    pub best_number: Option<u64>,
    pub best_metric: Option<f64>,
}

impl SearchReport {
    pub(crate) fn new(kind: SearchKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            started_at: Utc::now(),
            finished_at: None,
            records: Vec::new(),
            best_number: None,
            best_metric: None,
        }
    }

    pub(crate) fn next_number(&self) -> u64 {
        self.records.len() as u64 + 1
    }

    pub(crate) fn push(&mut self, record: CandidateRecord) {
        self.records.push(record);
    }

    pub(crate) fn complete(&mut self, best_number: u64, best_metric: f64) {
        self.best_number = Some(best_number);
        self.best_metric = Some(best_metric);
        self.finished_at = Some(Utc::now());
    }

    /// Number of candidates evaluated so far.
    pub fn evaluated(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn best_record(&self) -> Option<&CandidateRecord> {
        self.best_number
            .and_then(|number| self.records.get(number as usize - 1))
    }
}
