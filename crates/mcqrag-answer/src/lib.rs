//! mcqrag-answer
//!
//! Turns a question plus retrieved evidence into a parsed set of option letters.
pub mod http;
pub mod parse;
pub mod prompt;
pub mod synthesizer;

pub use http::HttpGenerator;
pub use parse::AnswerParser;
pub use synthesizer::{AnswerState, AnswerSynthesizer, MAX_GENERATION_CALLS};
