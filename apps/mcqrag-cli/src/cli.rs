use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use mcqrag_core::config::Settings;
use mcqrag_core::types::OptionLetter;
use mcqrag_eval::QuestionRange;

#[derive(Parser, Debug)]
#[command(name = "mcqrag", about = "Hybrid RAG answering and partial-credit scoring of multiple-choice questions")]
pub struct Cli {
    /// Directory holding `config.toml` and `config.<RUST_ENV>.toml`.
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk, embed and index the document corpus.
    Index {
        /// Discard existing index contents first.
        #[arg(long)]
        rebuild_index: bool,
        #[arg(long, value_name = "PATH")]
        documents: Option<PathBuf>,
    },

    /// Answer and score a question batch, then write predictions and a summary.
    Evaluate(EvaluateArgs),

    /// Trace the pipeline for individual questions (1-based ids). Writes nothing.
    Debug {
        #[arg(required = true, num_args = 1.., value_name = "QUESTION_ID")]
        ids: Vec<usize>,
        #[arg(long)]
        top_k: Option<usize>,
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Answer a single ad-hoc question.
    Ask {
        #[arg(long)]
        question: String,
        /// Option as `LETTER=TEXT`; repeat for each option.
        #[arg(long = "option", value_name = "LETTER=TEXT", value_parser = parse_option, required = true)]
        options: Vec<(OptionLetter, String)>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        rebuild_index: bool,
        #[arg(long, value_name = "PATH")]
        documents: Option<PathBuf>,
    },

    /// Count questions per category and optionally split the file by category.
    Categories {
        #[arg(long, value_name = "PATH")]
        questions: Option<PathBuf>,
        /// Write one `<category>.csv` per non-empty category here.
        #[arg(long, value_name = "DIR")]
        split_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    #[arg(long, value_name = "PATH")]
    pub questions: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    pub ground_truth: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    pub documents: Option<PathBuf>,
    /// Discard existing index contents before running.
    #[arg(long)]
    pub rebuild_index: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub workers: Option<usize>,
    /// Process at most N questions.
    #[arg(long)]
    pub limit: Option<usize>,
    /// 1-based inclusive range, e.g. `100-200`.
    #[arg(long, value_name = "START-END")]
    pub range: Option<QuestionRange>,
    /// Sample `--limit` questions at random instead of taking the first ones.
    #[arg(long)]
    pub random: bool,
    /// Seed for `--random` sampling.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub top_k: Option<usize>,
    /// Fast preset: retrieve a single passage per question. Overrides `--top-k`.
    #[arg(long, conflicts_with = "accurate")]
    pub quick: bool,
    /// Thorough preset: retrieve five passages per question. Overrides `--top-k`.
    #[arg(long)]
    pub accurate: bool,
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub inputs: InputArgs,
}

pub const QUICK_TOP_K: usize = 1;
pub const ACCURATE_TOP_K: usize = 5;

fn parse_option(raw: &str) -> Result<(OptionLetter, String), String> {
    let (letter, text) = raw.split_once('=').ok_or_else(|| format!("expected LETTER=TEXT, got {raw:?}"))?;
    let letter: OptionLetter = letter.trim().parse()?;
    Ok((letter, text.trim().to_string()))
}

fn set_path(field: &mut String, path: Option<&PathBuf>) {
    if let Some(p) = path {
        *field = p.to_string_lossy().into_owned();
    }
}

impl InputArgs {
    pub fn apply(&self, settings: &mut Settings) {
        set_path(&mut settings.data.questions, self.questions.as_ref());
        set_path(&mut settings.data.ground_truth, self.ground_truth.as_ref());
        set_path(&mut settings.data.documents, self.documents.as_ref());
    }
}

impl EvaluateArgs {
    pub fn apply(&self, settings: &mut Settings) {
        self.inputs.apply(settings);
        set_path(&mut settings.data.output, self.output.as_ref());
        if let Some(workers) = self.workers {
            settings.evaluation.workers = workers;
        }
        if let Some(seed) = self.seed {
            settings.evaluation.sampling_seed = seed;
        }
        if let Some(top_k) = self.top_k {
            settings.retrieval.top_k = top_k;
        }
        if self.quick {
            settings.retrieval.top_k = QUICK_TOP_K;
        } else if self.accurate {
            settings.retrieval.top_k = ACCURATE_TOP_K;
        }
    }
}
