use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use mcqrag_cli::cli::{Cli, Command};
use mcqrag_cli::commands::{apply_overrides, group_by_category, selection_policy, split_by_category};
use mcqrag_core::classifier::QuestionCategory;
use mcqrag_core::config::Settings;
use mcqrag_core::loader::load_questions;
use mcqrag_core::types::{OptionLetter, Question};
use mcqrag_eval::{QuestionRange, Sampling};

#[test]
fn evaluate_flags_override_settings() {
    let cli = Cli::try_parse_from([
        "mcqrag", "evaluate", "--workers", "8", "--limit", "50", "--range", "100-200", "--random", "--seed", "7",
        "--top-k", "5", "--questions", "q.csv", "--ground-truth", "gt.csv", "--output", "out/p.csv", "--rebuild-index",
    ])
    .unwrap();
    let mut settings = Settings::default();
    apply_overrides(&cli.command, &mut settings);
    assert_eq!(settings.evaluation.workers, 8);
    assert_eq!(settings.evaluation.sampling_seed, 7);
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.data.questions, "q.csv");
    assert_eq!(settings.data.ground_truth, "gt.csv");
    assert_eq!(settings.data.output, "out/p.csv");
    assert_eq!(settings.data.documents, Settings::default().data.documents);

    let Command::Evaluate(args) = cli.command else { panic!("expected evaluate") };
    assert!(args.inputs.rebuild_index);
    let policy = selection_policy(&args, &settings);
    assert_eq!(policy.range, Some(QuestionRange::new(100, 200).unwrap()));
    assert_eq!(policy.limit, Some(50));
    assert_eq!(policy.sampling, Sampling::Random { seed: 7 });
}

#[test]
fn sequential_by_default() {
    let cli = Cli::try_parse_from(["mcqrag", "evaluate", "--limit", "3"]).unwrap();
    let Command::Evaluate(args) = cli.command else { panic!("expected evaluate") };
    assert_eq!(selection_policy(&args, &Settings::default()).sampling, Sampling::Sequential);
}

#[test]
fn quick_and_accurate_presets_set_top_k() {
    let mut settings = Settings::default();
    let cli = Cli::try_parse_from(["mcqrag", "evaluate", "--top-k", "9", "--quick"]).unwrap();
    apply_overrides(&cli.command, &mut settings);
    assert_eq!(settings.retrieval.top_k, 1);

    let cli = Cli::try_parse_from(["mcqrag", "evaluate", "--accurate"]).unwrap();
    apply_overrides(&cli.command, &mut settings);
    assert_eq!(settings.retrieval.top_k, 5);

    assert!(Cli::try_parse_from(["mcqrag", "evaluate", "--quick", "--accurate"]).is_err());
}

#[test]
fn invalid_range_is_rejected() {
    assert!(Cli::try_parse_from(["mcqrag", "evaluate", "--range", "9-3"]).is_err());
    assert!(Cli::try_parse_from(["mcqrag", "evaluate", "--range", "abc"]).is_err());
}

#[test]
fn debug_takes_ids_and_input_paths() {
    let cli = Cli::try_parse_from(["mcqrag", "debug", "3", "17", "--documents", "docs/"]).unwrap();
    let mut settings = Settings::default();
    apply_overrides(&cli.command, &mut settings);
    assert_eq!(settings.data.documents, "docs/");
    let Command::Debug { ids, .. } = cli.command else { panic!("expected debug") };
    assert_eq!(ids, vec![3, 17]);
    assert!(Cli::try_parse_from(["mcqrag", "debug"]).is_err());
}

#[test]
fn ask_parses_letter_options() {
    let cli = Cli::try_parse_from([
        "mcqrag", "ask", "--question", "TCP là gì?", "--option", "A=Giao thức", "--option", "b = Thiết bị",
    ])
    .unwrap();
    let Command::Ask { question, options, .. } = cli.command else { panic!("expected ask") };
    assert_eq!(question, "TCP là gì?");
    assert_eq!(options[0], (OptionLetter::new('A').unwrap(), "Giao thức".to_string()));
    assert_eq!(options[1].0.as_char(), 'B');
    assert!(Cli::try_parse_from(["mcqrag", "ask", "--question", "x", "--option", "AB"]).is_err());
}

#[test]
fn global_config_dir() {
    let cli = Cli::try_parse_from(["mcqrag", "categories", "--config-dir", "conf"]).unwrap();
    assert_eq!(cli.config_dir, Some(PathBuf::from("conf")));
}

fn question(i: usize, text: &str) -> Question {
    let options: BTreeMap<_, _> =
        "ABCD".chars().filter_map(OptionLetter::new).map(|l| (l, format!("đáp án {l}"))).collect();
    Question { id: (i + 1).to_string(), index: i, text: text.into(), options }
}

#[test]
fn categories_split_into_files() {
    let questions = vec![
        question(0, "Hãy tính 10 + 5"),
        question(1, "Định nghĩa của giao thức là gì?"),
        question(2, "Tính 3 + 4 bằng bao nhiêu?"),
    ];
    let groups = group_by_category(&questions).unwrap();
    assert_eq!(groups[&QuestionCategory::Calculation].len(), 2);

    let tmp = tempfile::tempdir().unwrap();
    let written = split_by_category(tmp.path(), &groups).unwrap();
    assert_eq!(written.len(), groups.len());
    let calc = load_questions(&tmp.path().join("calculation.csv")).unwrap();
    assert_eq!(calc.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);
}
