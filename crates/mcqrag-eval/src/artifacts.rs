//! Predictions CSV and evaluation summary JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use mcqrag_core::config::summary_path_for;
use mcqrag_core::error::{Error, Result};
use mcqrag_core::types::{format_letters, Answer, EvaluationRecord};

use crate::orchestrator::EvaluationOutcome;
use crate::summary::EvaluationSummary;

/// Contents of `<stem>_evaluation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub summary: EvaluationSummary,
    pub records: Vec<EvaluationRecord>,
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(std::fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

/// One row per record: `question_id,num_correct,answers`.
pub fn write_predictions(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    ensure_parent(path)?;
    let csv_err = |e: csv::Error| Error::Operation(format!("{}: {e}", path.display()));
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(["question_id", "num_correct", "answers"]).map_err(csv_err)?;
    for r in records {
        let letters = match r.prediction.as_ref().map(|p| &p.answer) {
            Some(Answer::Letters(l)) => Some(l),
            _ => None,
        };
        let count = letters.map_or(0, |l| l.len()).to_string();
        let answers = letters.map(format_letters).unwrap_or_default();
        writer.write_record([r.question_id.as_str(), count.as_str(), answers.as_str()]).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, report: &EvaluationReport) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report).map_err(|e| Error::Operation(e.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn read_summary(path: &Path) -> Result<EvaluationReport> {
    let raw = std::fs::read_to_string(path).map_err(|_| Error::NotFound(path.display().to_string()))?;
    serde_json::from_str(&raw).map_err(|e| Error::Input(format!("{}: {e}", path.display())))
}

/// Write both artifacts next to each other; returns the summary path.
pub fn persist(output: &Path, outcome: &EvaluationOutcome) -> Result<PathBuf> {
    write_predictions(output, &outcome.records)?;
    let summary_path = summary_path_for(output);
    let report = EvaluationReport { summary: outcome.summary.clone(), records: outcome.records.clone() };
    write_summary(&summary_path, &report)?;
    info!(predictions = %output.display(), summary = %summary_path.display(), "Saved evaluation artifacts");
    Ok(summary_path)
}
