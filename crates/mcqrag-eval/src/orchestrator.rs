//! Bounded worker pool that evaluates a question batch.
//!
//! Jobs go through an mpsc queue shared by `workers` tasks. Each question
//! runs in its own spawned task under a timeout, so a panic or a stuck
//! backend only fails that question. Records come back over a result
//! channel and are sorted by question index once the channel closes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use mcqrag_core::classifier::QuestionClassifier;
use mcqrag_core::config::Settings;
use mcqrag_core::error::{Error, Result};
use mcqrag_core::types::{
    format_letters, Document, ErrorKind, EvaluationRecord, Grade, GroundTruth, Prediction, Question, RecordError,
};
use mcqrag_hybrid::{ChunkStoreBuilder, IndexMode, IndexReport};

use crate::pipeline::QuestionPipeline;
use crate::scorer::{grade, score, validate_ground_truth};
use crate::selection::SelectionPolicy;
use crate::summary::{DeterminismMode, EvaluationSummary};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatorOptions {
    pub workers: usize,
    pub question_timeout: Duration,
    pub score_weight: f64,
    pub determinism: DeterminismMode,
}

impl EvaluatorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            workers: settings.evaluation.workers.max(1),
            question_timeout: Duration::from_secs(settings.evaluation.question_timeout_secs),
            score_weight: settings.evaluation.score_weight,
            determinism: DeterminismMode::from_seed(settings.generation.seed, settings.generation.temperature),
        }
    }
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            question_timeout: Duration::from_secs(300),
            score_weight: 1.0,
            determinism: DeterminismMode::from_seed(None, 0.1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub records: Vec<EvaluationRecord>,
    pub summary: EvaluationSummary,
}

struct Job {
    question: Question,
    ground_truth: Option<GroundTruth>,
}

struct Worker {
    pipeline: Arc<QuestionPipeline>,
    classifier: Arc<QuestionClassifier>,
    options: EvaluatorOptions,
}

pub struct Evaluator {
    pipeline: Arc<QuestionPipeline>,
    classifier: Arc<QuestionClassifier>,
    options: EvaluatorOptions,
}

impl Evaluator {
    pub fn new(pipeline: QuestionPipeline, options: EvaluatorOptions) -> Result<Self> {
        Ok(Self { pipeline: Arc::new(pipeline), classifier: Arc::new(QuestionClassifier::new()?), options })
    }

    pub fn pipeline(&self) -> &QuestionPipeline {
        &self.pipeline
    }

    /// Prepare the indexes, then evaluate. An index failure aborts before any worker starts.
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare_and_evaluate(
        &self,
        builder: &ChunkStoreBuilder,
        documents: &[Document],
        chunk_size: usize,
        overlap: usize,
        mode: IndexMode,
        questions: &[Question],
        ground_truths: &[GroundTruth],
        policy: &SelectionPolicy,
    ) -> Result<(IndexReport, EvaluationOutcome)> {
        let report = builder.build(documents, chunk_size, overlap, mode).await?;
        let outcome = self.evaluate(questions, ground_truths, policy).await?;
        Ok((report, outcome))
    }

    /// Evaluate the selected questions; ground truth is matched by row position.
    pub async fn evaluate(
        &self,
        questions: &[Question],
        ground_truths: &[GroundTruth],
        policy: &SelectionPolicy,
    ) -> Result<EvaluationOutcome> {
        let selected = policy.select(questions);
        if ground_truths.len() != questions.len() {
            warn!(questions = questions.len(), ground_truths = ground_truths.len(), "Question and ground-truth counts differ");
        }
        let workers = self.options.workers.max(1).min(selected.len().max(1));
        info!(selected = selected.len(), workers, "Starting evaluation");

        let pb = ProgressBar::new(selected.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} questions ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>(workers * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<EvaluationRecord>();

        let jobs: Vec<Job> = selected
            .into_iter()
            .map(|q| {
                let ground_truth = ground_truths.get(q.index).cloned();
                Job { question: q, ground_truth }
            })
            .collect();
        let feeder = tokio::spawn(async move {
            for job in jobs {
                if job_tx.send(job).await.is_err() {
                    break;
                }
            }
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let worker = Worker {
                pipeline: Arc::clone(&self.pipeline),
                classifier: Arc::clone(&self.classifier),
                options: self.options,
            };
            let rx = Arc::clone(&job_rx);
            let tx = result_tx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(job) = next else { break };
                    let record = worker.run(job).await;
                    if tx.send(record).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let mut records = Vec::new();
        while let Some(record) = result_rx.recv().await {
            log_record(&record);
            pb.inc(1);
            records.push(record);
        }
        pb.finish_and_clear();

        feeder.await.map_err(|e| Error::Operation(format!("job feeder failed: {e}")))?;
        for h in handles {
            h.await.map_err(|e| Error::Operation(format!("worker failed: {e}")))?;
        }

        records.sort_by_key(|r| r.question_index);
        let summary =
            EvaluationSummary::from_records(&records, self.options.determinism, self.pipeline.generator_id(), workers);
        info!(
            aggregate = summary.aggregate_score(),
            perfect = summary.tally.perfect,
            partial = summary.tally.partial,
            wrong = summary.tally.wrong,
            errors = summary.tally.errors,
            excluded = summary.tally.excluded,
            "Evaluation finished"
        );
        Ok(EvaluationOutcome { records, summary })
    }
}

impl Worker {
    async fn run(&self, job: Job) -> EvaluationRecord {
        let start = Instant::now();
        let Job { question, ground_truth } = job;
        let category = self.classifier.classify(&question.text);

        let pipeline = Arc::clone(&self.pipeline);
        let q = question.clone();
        let task = tokio::spawn(async move { pipeline.run(&q).await });
        let abort = task.abort_handle();

        let outcome: std::result::Result<Prediction, RecordError> =
            match tokio::time::timeout(self.options.question_timeout, task).await {
                Ok(Ok(Ok((_, prediction)))) => Ok(prediction),
                Ok(Ok(Err(e))) => Err(RecordError::from(&e)),
                Ok(Err(join)) if join.is_panic() => {
                    Err(RecordError { kind: ErrorKind::Panic, message: "question pipeline panicked".into() })
                }
                Ok(Err(join)) => Err(RecordError { kind: ErrorKind::Other, message: join.to_string() }),
                Err(_) => {
                    abort.abort();
                    Err(RecordError::from(&Error::Timeout(self.options.question_timeout)))
                }
            };

        let mut record = EvaluationRecord {
            question_id: question.id.clone(),
            question_index: question.index,
            category: category.as_str().to_string(),
            prediction: None,
            ground_truth: ground_truth.clone(),
            score: 0.0,
            grade: None,
            error: None,
            excluded: false,
            elapsed_ms: 0,
        };

        let scoring_error = match &ground_truth {
            None => {
                warn!(question = %question.id, "No ground truth for question; excluded from the aggregate");
                record.excluded = true;
                None
            }
            Some(gt) => validate_ground_truth(gt, &question.option_letters()).err().map(|e| {
                warn!(question = %question.id, error = %e, "Malformed ground truth; excluded from the aggregate");
                record.excluded = true;
                RecordError::from(&e)
            }),
        };

        match outcome {
            Err(e) => record.error = Some(e),
            Ok(prediction) => {
                if prediction.answer.is_unparseable() {
                    record.error = Some(RecordError::from(&Error::GenerationParse(format!(
                        "{} replies without option letters",
                        prediction.attempts
                    ))));
                } else if let (false, Some(gt)) = (record.excluded, &ground_truth) {
                    match score(&prediction.answer, gt, self.options.score_weight) {
                        Ok(s) => {
                            record.grade = Some(grade(&prediction.answer, gt));
                            record.score = s;
                        }
                        Err(e) => {
                            record.excluded = true;
                            record.error = Some(RecordError::from(&e));
                        }
                    }
                }
                record.prediction = Some(prediction);
            }
        }
        if record.error.is_none() {
            record.error = scoring_error;
        }
        record.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        record
    }
}

fn outcome_label(record: &EvaluationRecord) -> &'static str {
    if record.error.is_some() && !record.excluded {
        return "ERROR";
    }
    match record.grade {
        Some(Grade::Correct) => "CORRECT",
        Some(Grade::Partial) => "PARTIAL",
        Some(Grade::Wrong) => "WRONG",
        None => "UNSCORED",
    }
}

fn log_record(record: &EvaluationRecord) {
    let predicted = record.prediction.as_ref().map_or_else(|| "-".to_string(), |p| p.answer.to_string());
    let expected = record.ground_truth.as_ref().map_or_else(|| "-".to_string(), |gt| format_letters(&gt.letters));
    match &record.error {
        Some(e) => info!(
            question = %record.question_id,
            outcome = outcome_label(record),
            kind = ?e.kind,
            error = %e.message,
            elapsed_ms = record.elapsed_ms,
            "Question finished"
        ),
        None => info!(
            question = %record.question_id,
            outcome = outcome_label(record),
            predicted = %predicted,
            expected = %expected,
            score = record.score,
            elapsed_ms = record.elapsed_ms,
            "Question finished"
        ),
    }
}
