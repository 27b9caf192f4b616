use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use mcqrag_core::classifier::{QuestionCategory, QuestionClassifier};
use mcqrag_core::config::{expand_path, Config, Settings};
use mcqrag_core::loader::{load_ground_truth, load_questions, write_questions};
use mcqrag_core::types::Question;
use mcqrag_eval::{inspect, persist, Sampling, SelectionPolicy};
use mcqrag_hybrid::IndexReport;

use crate::app::{index_mode, Services};
use crate::cli::{Cli, Command, EvaluateArgs, InputArgs};
use crate::logging;

pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    let settings = config.settings_with(|s| apply_overrides(&cli.command, s))?;
    logging::init(&settings.logging)?;

    match cli.command {
        Command::Index { rebuild_index, .. } => index(settings, rebuild_index).await,
        Command::Evaluate(args) => evaluate(settings, &args).await,
        Command::Debug { ids, top_k, inputs } => debug(settings, &ids, top_k, &inputs).await,
        Command::Ask { question, options, top_k, rebuild_index, .. } => {
            ask(settings, question, options, top_k, rebuild_index).await
        }
        Command::Categories { split_dir, .. } => categories(&settings, split_dir.as_deref()),
    }
}

/// Command-line flags that map onto settings fields.
pub fn apply_overrides(command: &Command, settings: &mut Settings) {
    match command {
        Command::Index { documents, .. } | Command::Ask { documents, .. } => {
            InputArgs { documents: documents.clone(), ..InputArgs::default() }.apply(settings);
        }
        Command::Evaluate(args) => args.apply(settings),
        Command::Debug { inputs, .. } => inputs.apply(settings),
        Command::Categories { questions, .. } => {
            InputArgs { questions: questions.clone(), ..InputArgs::default() }.apply(settings);
        }
    }
}

fn print_index_report(report: &IndexReport) {
    println!(
        "✅ Indexes {:?}: {} chunks (lexical {}, vector {}) from {} documents in {} ms",
        report.action, report.chunks, report.text_count, report.vector_count, report.documents, report.elapsed_ms
    );
}

async fn index(settings: Settings, rebuild: bool) -> Result<()> {
    let services = Services::open(settings).await?;
    let report = services.prepare(index_mode(rebuild)).await?;
    print_index_report(&report);
    Ok(())
}

pub fn selection_policy(args: &EvaluateArgs, settings: &Settings) -> SelectionPolicy {
    SelectionPolicy {
        range: args.range,
        limit: args.limit,
        sampling: if args.random {
            Sampling::Random { seed: settings.evaluation.sampling_seed }
        } else {
            Sampling::Sequential
        },
    }
}

async fn evaluate(settings: Settings, args: &EvaluateArgs) -> Result<()> {
    let questions = load_questions(&expand_path(&settings.data.questions))?;
    let ground_truths = load_ground_truth(&expand_path(&settings.data.ground_truth))?;
    let documents = mcqrag_core::loader::load_documents(&expand_path(&settings.data.documents))?;
    let policy = selection_policy(args, &settings);
    let output = settings.output_path();

    let services = Services::open(settings).await?;
    let evaluator = services.evaluator()?;
    let chunking = &services.settings.chunking;
    let (report, outcome) = evaluator
        .prepare_and_evaluate(
            &services.builder(),
            &documents,
            chunking.chunk_size,
            chunking.overlap,
            index_mode(args.inputs.rebuild_index),
            &questions,
            &ground_truths,
            &policy,
        )
        .await?;
    print_index_report(&report);

    let summary_path = persist(&output, &outcome)?;
    let t = &outcome.summary.tally;
    println!("\n📊 Aggregate score: {:.2}/100", outcome.summary.aggregate_score());
    println!(
        "   total {} | scored {} | excluded {} | perfect {} | partial {} | wrong {} | errors {}",
        t.total, t.scored, t.excluded, t.perfect, t.partial, t.wrong, t.errors
    );
    println!("   average {:.0} ms per question", outcome.summary.average_time_ms);
    for (category, tally) in &outcome.summary.categories {
        println!("   {category:<24} {:>4} questions  {:.2}", tally.total, tally.aggregate_score);
    }
    println!("\n💾 Predictions: {}", output.display());
    println!("💾 Summary:     {}", summary_path.display());
    Ok(())
}

async fn debug(settings: Settings, ids: &[usize], top_k: Option<usize>, inputs: &InputArgs) -> Result<()> {
    let questions = load_questions(&expand_path(&settings.data.questions))?;
    let ground_truths = load_ground_truth(&expand_path(&settings.data.ground_truth)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ground truth unavailable; traces will not be scored");
        Vec::new()
    });
    for id in ids {
        if *id == 0 || *id > questions.len() {
            bail!("question id {id} is out of range; valid range: 1-{}", questions.len());
        }
    }

    let weight = settings.evaluation.score_weight;
    let top_k = top_k.unwrap_or(settings.retrieval.top_k);
    let services = Services::open(settings).await?;
    services.prepare(index_mode(inputs.rebuild_index)).await?;
    let pipeline = services.pipeline(top_k)?;
    for id in ids {
        let question = &questions[id - 1];
        let trace = inspect(&pipeline, question, ground_truths.get(id - 1), weight).await?;
        println!("{}", "=".repeat(72));
        println!("{trace}");
    }
    Ok(())
}

async fn ask(
    settings: Settings,
    text: String,
    options: Vec<(mcqrag_core::types::OptionLetter, String)>,
    top_k: Option<usize>,
    rebuild: bool,
) -> Result<()> {
    let question = Question { id: "ask".into(), index: 0, text, options: options.into_iter().collect() };
    let weight = settings.evaluation.score_weight;
    let top_k = top_k.unwrap_or(settings.retrieval.top_k);
    let services = Services::open(settings).await?;
    services.prepare(index_mode(rebuild)).await?;
    let trace = inspect(&services.pipeline(top_k)?, &question, None, weight).await?;
    println!("{trace}");
    Ok(())
}

/// Questions grouped by category, in classification priority order.
pub fn group_by_category(questions: &[Question]) -> Result<BTreeMap<QuestionCategory, Vec<Question>>> {
    let classifier = QuestionClassifier::new()?;
    let mut groups: BTreeMap<QuestionCategory, Vec<Question>> = BTreeMap::new();
    for q in questions {
        groups.entry(classifier.classify(&q.text)).or_default().push(q.clone());
    }
    Ok(groups)
}

/// One `<category>.csv` per group; returns the written paths.
pub fn split_by_category(dir: &Path, groups: &BTreeMap<QuestionCategory, Vec<Question>>) -> Result<Vec<std::path::PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();
    for (category, questions) in groups {
        let path = dir.join(format!("{}.csv", category.as_str()));
        write_questions(&path, questions)?;
        info!(category = %category, questions = questions.len(), path = %path.display(), "Wrote category file");
        written.push(path);
    }
    Ok(written)
}

fn categories(settings: &Settings, split_dir: Option<&Path>) -> Result<()> {
    let questions = load_questions(&expand_path(&settings.data.questions))?;
    let groups = group_by_category(&questions)?;
    println!("📋 {} questions", questions.len());
    for category in QuestionCategory::ALL {
        let n = groups.get(&category).map_or(0, Vec::len);
        if n > 0 {
            let pct = n as f64 / questions.len() as f64 * 100.0;
            println!("   {:<24} {n:>5}  ({pct:.1}%)", category.as_str());
        }
    }
    if let Some(dir) = split_dir {
        let written = split_by_category(dir, &groups)?;
        println!("💾 Wrote {} category files to {}", written.len(), dir.display());
    }
    Ok(())
}
