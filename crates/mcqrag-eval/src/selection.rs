//! Which questions of a file an evaluation run processes.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use mcqrag_core::error::{Error, Result};
use mcqrag_core::types::Question;

/// 1-based inclusive row range, written `start-end`; `1 <= start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct QuestionRange {
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RawRange {
    start: usize,
    end: usize,
}

impl TryFrom<RawRange> for QuestionRange {
    type Error = Error;

    fn try_from(raw: RawRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl QuestionRange {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start == 0 || end < start {
            return Err(Error::Input(format!("invalid range {start}-{end}: need 1 <= start <= end")));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

impl FromStr for QuestionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Input(format!("invalid range {s:?}, expected START-END such as 100-200"));
        let (start, end) = s.split_once('-').ok_or_else(invalid)?;
        let start: usize = start.trim().parse().map_err(|_| invalid())?;
        let end: usize = end.trim().parse().map_err(|_| invalid())?;
        Self::new(start, end).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Sampling {
    #[default]
    Sequential,
    Random {
        seed: u64,
    },
}

/// Range first, then limit (head or seeded sample).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub range: Option<QuestionRange>,
    pub limit: Option<usize>,
    pub sampling: Sampling,
}

impl SelectionPolicy {
    pub fn all() -> Self {
        Self::default()
    }

    /// Selected questions in question-index order.
    pub fn select(&self, questions: &[Question]) -> Vec<Question> {
        let mut selected: Vec<&Question> = match self.range {
            Some(QuestionRange { start, end }) => {
                let to = end.min(questions.len());
                let from = start.saturating_sub(1).min(to);
                info!(start, end, selected = to - from, "Applying question range");
                questions[from..to].iter().collect()
            }
            None => questions.iter().collect(),
        };

        if let Some(limit) = self.limit.filter(|l| *l < selected.len()) {
            selected = match self.sampling {
                Sampling::Sequential => {
                    selected.truncate(limit);
                    selected
                }
                Sampling::Random { seed } => {
                    let mut rng = StdRng::seed_from_u64(seed);
                    sample(&mut rng, selected.len(), limit).into_iter().map(|i| selected[i]).collect()
                }
            };
            info!(limit, sampling = ?self.sampling, "Applied question limit");
        }

        let mut out: Vec<Question> = selected.into_iter().cloned().collect();
        out.sort_by_key(|q| q.index);
        out
    }
}
