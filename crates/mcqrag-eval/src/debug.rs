//! Single-question trace for interactive debugging. Nothing is persisted.

use std::fmt;

use serde::Serialize;

use mcqrag_core::error::Result;
use mcqrag_core::types::{format_letters, Answer, Grade, GroundTruth, Question, RankedChunk, RecordError};

use crate::pipeline::QuestionPipeline;
use crate::scorer::{grade, score, validate_ground_truth};

#[derive(Debug, Clone, Serialize)]
pub struct InspectionTrace {
    pub question: Question,
    pub retrieved: Vec<RankedChunk>,
    pub raw_outputs: Vec<String>,
    pub answer: Option<Answer>,
    pub expected: Option<GroundTruth>,
    pub grade: Option<Grade>,
    pub score: f64,
    pub error: Option<RecordError>,
}

/// Run one question and return everything the pipeline saw and produced.
///
/// Pipeline failures are captured in the trace rather than returned.
pub async fn inspect(
    pipeline: &QuestionPipeline,
    question: &Question,
    ground_truth: Option<&GroundTruth>,
    weight: f64,
) -> Result<InspectionTrace> {
    let mut trace = InspectionTrace {
        question: question.clone(),
        retrieved: Vec::new(),
        raw_outputs: Vec::new(),
        answer: None,
        expected: ground_truth.cloned(),
        grade: None,
        score: 0.0,
        error: None,
    };
    match pipeline.run(question).await {
        Ok((retrieval, prediction)) => {
            trace.retrieved = retrieval.hits;
            trace.raw_outputs = prediction.raw_outputs;
            if let Some(gt) = ground_truth {
                match validate_ground_truth(gt, &question.option_letters())
                    .and_then(|()| score(&prediction.answer, gt, weight))
                {
                    Ok(s) => {
                        trace.grade = Some(grade(&prediction.answer, gt));
                        trace.score = s;
                    }
                    Err(e) => trace.error = Some(RecordError::from(&e)),
                }
            }
            trace.answer = Some(prediction.answer);
        }
        Err(e) => trace.error = Some(RecordError::from(&e)),
    }
    Ok(trace)
}

impl fmt::Display for InspectionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Question {} (row {}): {}", self.question.id, self.question.index + 1, self.question.text)?;
        for (letter, text) in &self.question.options {
            writeln!(f, "  {letter}. {text}")?;
        }
        writeln!(f, "\nRetrieved {} chunk(s):", self.retrieved.len())?;
        for (n, hit) in self.retrieved.iter().enumerate() {
            let preview: String = hit.chunk.text.chars().take(200).collect();
            writeln!(f, "  [{}] score={:.4} {}", n + 1, hit.score, hit.chunk.provenance())?;
            writeln!(f, "      {}", preview.replace('\n', " "))?;
        }
        for (i, raw) in self.raw_outputs.iter().enumerate() {
            writeln!(f, "\nGeneration #{}:\n{}", i + 1, raw.trim())?;
        }
        writeln!(f)?;
        match &self.answer {
            Some(a) => writeln!(f, "Parsed answer: {a}")?,
            None => writeln!(f, "Parsed answer: -")?,
        }
        match &self.expected {
            Some(gt) => writeln!(f, "Expected:      {}", format_letters(&gt.letters))?,
            None => writeln!(f, "Expected:      -")?,
        }
        if let Some(g) = self.grade {
            writeln!(f, "Grade:         {g:?} (score {:.2})", self.score)?;
        }
        if let Some(e) = &self.error {
            writeln!(f, "Error:         {:?}: {}", e.kind, e.message)?;
        }
        Ok(())
    }
}
