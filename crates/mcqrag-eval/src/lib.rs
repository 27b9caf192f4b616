//! mcqrag-eval
//!
//! Scoring, question selection and the batch evaluation pool.
pub mod artifacts;
pub mod debug;
pub mod orchestrator;
pub mod pipeline;
pub mod scorer;
pub mod selection;
pub mod summary;

pub use artifacts::{persist, EvaluationReport};
pub use debug::{inspect, InspectionTrace};
pub use orchestrator::{EvaluationOutcome, Evaluator, EvaluatorOptions};
pub use pipeline::QuestionPipeline;
pub use scorer::{aggregate, grade, score, validate_ground_truth};
pub use selection::{QuestionRange, Sampling, SelectionPolicy};
pub use summary::{DeterminismMode, EvaluationSummary, Tally};
