use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mcqrag_core::types::{ErrorKind, EvaluationRecord, Grade};

use crate::scorer::aggregate;

/// Whether generation ran with a fixed sampling seed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeterminismMode {
    Seeded { seed: u64, temperature: f32 },
    Unseeded { temperature: f32 },
}

impl DeterminismMode {
    pub fn from_seed(seed: Option<u64>, temperature: f32) -> Self {
        match seed {
            Some(seed) => DeterminismMode::Seeded { seed, temperature },
            None => DeterminismMode::Unseeded { temperature },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub scored: usize,
    pub excluded: usize,
    pub perfect: usize,
    pub partial: usize,
    pub wrong: usize,
    pub errors: usize,
    pub aggregate_score: f64,
}

impl Tally {
    fn from_records<'a>(records: impl IntoIterator<Item = &'a EvaluationRecord>) -> Self {
        let mut t = Tally::default();
        let mut scores = Vec::new();
        for r in records {
            t.total += 1;
            if r.excluded {
                t.excluded += 1;
                continue;
            }
            t.scored += 1;
            scores.push(r.score);
            if r.error.is_some() {
                t.errors += 1;
                continue;
            }
            match r.grade {
                Some(Grade::Correct) => t.perfect += 1,
                Some(Grade::Partial) => t.partial += 1,
                Some(Grade::Wrong) | None => t.wrong += 1,
            }
        }
        t.aggregate_score = aggregate(&scores);
        t
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    #[serde(flatten)]
    pub tally: Tally,
    pub average_time_ms: f64,
    pub determinism: DeterminismMode,
    pub generator: String,
    pub workers: usize,
    pub categories: BTreeMap<String, Tally>,
    pub errors_by_kind: BTreeMap<String, usize>,
    pub finished_at: DateTime<Utc>,
}

impl EvaluationSummary {
    pub fn from_records(records: &[EvaluationRecord], determinism: DeterminismMode, generator: String, workers: usize) -> Self {
        let mut by_category: BTreeMap<&str, Vec<&EvaluationRecord>> = BTreeMap::new();
        for r in records {
            by_category.entry(r.category.as_str()).or_default().push(r);
        }
        let categories = by_category
            .into_iter()
            .map(|(name, rs)| (name.to_string(), Tally::from_records(rs)))
            .collect();

        let mut errors_by_kind = BTreeMap::new();
        for kind in records.iter().filter_map(|r| r.error.as_ref().map(|e| e.kind)) {
            *errors_by_kind.entry(kind_name(kind).to_string()).or_insert(0) += 1;
        }

        let average_time_ms = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.elapsed_ms as f64).sum::<f64>() / records.len() as f64
        };

        Self {
            tally: Tally::from_records(records),
            average_time_ms,
            determinism,
            generator,
            workers,
            categories,
            errors_by_kind,
            finished_at: Utc::now(),
        }
    }

    pub fn aggregate_score(&self) -> f64 {
        self.tally.aggregate_score
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Retrieval => "retrieval",
        ErrorKind::Generation => "generation",
        ErrorKind::GenerationParse => "generation_parse",
        ErrorKind::Scoring => "scoring",
        ErrorKind::Timeout => "timeout",
        ErrorKind::Panic => "panic",
        ErrorKind::Other => "other",
    }
}
