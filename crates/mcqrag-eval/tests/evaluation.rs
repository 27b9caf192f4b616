use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcqrag_answer::AnswerSynthesizer;
use mcqrag_core::config::{EmbeddingSettings, RetrievalSettings};
use mcqrag_core::error::Error;
use mcqrag_core::loader::load_ground_truth;
use mcqrag_core::traits::{Generator, TextIndexer, VectorIndexer};
use mcqrag_core::types::{
    Chunk, Document, EmbeddedChunk, ErrorKind, EvaluationRecord, Grade, GroundTruth, OptionLetter, Question, SearchHit,
    SourceKind,
};
use mcqrag_embed::FakeEmbedder;
use mcqrag_eval::{inspect, persist, Evaluator, EvaluatorOptions, QuestionPipeline, SelectionPolicy};
use mcqrag_hybrid::{ChunkStoreBuilder, HybridRetriever, IndexMode};
use mcqrag_text::TantivyIndexer;

const DIM: usize = 32;

/// Brute-force cosine index kept in memory.
#[derive(Default)]
struct MemVector {
    rows: Mutex<Vec<EmbeddedChunk>>,
}

#[async_trait]
impl VectorIndexer for MemVector {
    async fn index(&self, chunks: &[EmbeddedChunk]) -> anyhow::Result<()> {
        self.rows.lock().unwrap().extend_from_slice(chunks);
        Ok(())
    }

    async fn search_vec(&self, q: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| SearchHit {
                chunk: r.chunk.clone(),
                score: r.embedding.iter().zip(q).map(|(a, b)| a * b).sum(),
                source: SourceKind::Vector,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.rows.lock().unwrap().len())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

/// Tantivy index whose searches fail for queries mentioning "mất kết nối".
struct FlakyText(TantivyIndexer);

impl TextIndexer for FlakyText {
    fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()> {
        self.0.index(chunks)
    }
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
        anyhow::ensure!(!query.contains("mất kết nối"), "lexical index unreachable");
        self.0.search(query, k)
    }
    fn count(&self) -> anyhow::Result<usize> {
        self.0.count()
    }
    fn clear(&self) -> anyhow::Result<()> {
        self.0.clear()
    }
}

/// Replies chosen by a keyword found in the prompt.
struct ScriptedGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn generator_id(&self) -> String {
        "scripted".into()
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let question = prompt.split("Câu hỏi: ").nth(1).unwrap_or_default();
        let reply = if question.starts_with("chậm") {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "Đáp án đúng: A"
        } else if question.starts_with("hỏng") {
            panic!("generator crashed");
        } else if question.starts_with("lỗi") {
            anyhow::bail!("503 from generation service");
        } else if question.starts_with("mơ hồ") {
            "Tôi không biết"
        } else if question.starts_with("TCP") {
            "Đáp án đúng: A, C"
        } else if question.starts_with("UDP") {
            "Đáp án: A"
        } else if question.starts_with("ICMP") {
            "Đáp án đúng: D"
        } else {
            "D"
        };
        Ok(reply.to_string())
    }
}

fn question(i: usize, text: &str) -> Question {
    let options = "ABCD".chars().filter_map(OptionLetter::new).map(|l| (l, format!("lựa chọn {l}"))).collect::<BTreeMap<_, _>>();
    Question { id: (i + 1).to_string(), index: i, text: text.to_string(), options }
}

fn gt(letters: &str) -> GroundTruth {
    GroundTruth::new(letters.chars().filter_map(OptionLetter::new))
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("mang", "# Mạng\nTCP tin cậy. UDP không tin cậy. ICMP dùng cho chẩn đoán."),
        Document::new("khac", "# Khác\nARP ánh xạ địa chỉ IP sang địa chỉ MAC."),
    ]
}

struct Harness {
    text: Arc<FlakyText>,
    vector: Arc<MemVector>,
    embedder: Arc<FakeEmbedder>,
    generator: Arc<ScriptedGenerator>,
}

impl Harness {
    async fn new() -> anyhow::Result<Self> {
        let h = Self {
            text: Arc::new(FlakyText(TantivyIndexer::in_memory()?)),
            vector: Arc::new(MemVector::default()),
            embedder: Arc::new(FakeEmbedder::new(DIM)),
            generator: Arc::new(ScriptedGenerator { calls: AtomicUsize::new(0) }),
        };
        h.builder().build(&corpus(), 1000, 150, IndexMode::Rebuild).await?;
        Ok(h)
    }

    fn builder(&self) -> ChunkStoreBuilder {
        ChunkStoreBuilder::new(self.embedder.clone(), self.text.clone(), self.vector.clone())
    }

    fn pipeline(&self) -> QuestionPipeline {
        let retriever = HybridRetriever::new(
            self.embedder.clone(),
            self.text.clone(),
            self.vector.clone(),
            &RetrievalSettings::default(),
            &EmbeddingSettings::default(),
        );
        let synthesizer = AnswerSynthesizer::new(self.generator.clone()).unwrap();
        QuestionPipeline::new(retriever, synthesizer, 3)
    }

    fn evaluator(&self, workers: usize, timeout: Duration) -> Evaluator {
        let options = EvaluatorOptions { workers, question_timeout: timeout, ..EvaluatorOptions::default() };
        Evaluator::new(self.pipeline(), options).unwrap()
    }
}

fn graded_batch() -> (Vec<Question>, Vec<GroundTruth>) {
    let questions = vec![
        question(0, "TCP có những đặc điểm nào?"),
        question(1, "UDP có những đặc điểm nào?"),
        question(2, "ICMP dùng để làm gì?"),
        question(3, "ARP ánh xạ gì?"),
    ];
    let truths = vec![gt("AC"), gt("AC"), gt("B"), gt("D")];
    (questions, truths)
}

fn comparable(records: &[EvaluationRecord]) -> Vec<EvaluationRecord> {
    records.iter().cloned().map(|mut r| {
        r.elapsed_ms = 0;
        r
    }).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn partial_credit_aggregate() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, truths) = graded_batch();
    let outcome = h.evaluator(2, Duration::from_secs(10)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;

    let scores: Vec<f64> = outcome.records.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![1.0, 0.5, 0.0, 1.0]);
    assert_eq!(outcome.summary.aggregate_score(), 62.5);
    assert_eq!((outcome.summary.tally.perfect, outcome.summary.tally.partial, outcome.summary.tally.wrong), (2, 1, 1));
    assert_eq!(outcome.records[0].grade, Some(Grade::Correct));
    assert_eq!(outcome.records[0].prediction.as_ref().unwrap().chunk_ids.len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn score_weight_scales_record_scores() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, truths) = graded_batch();
    let options = EvaluatorOptions { workers: 2, score_weight: 2.0, ..EvaluatorOptions::default() };
    let outcome = Evaluator::new(h.pipeline(), options)?.evaluate(&questions, &truths, &SelectionPolicy::all()).await?;

    let scores: Vec<f64> = outcome.records.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![2.0, 1.0, 0.0, 2.0]);
    assert_eq!(outcome.records[1].grade, Some(Grade::Partial));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_and_eight_workers_agree() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, truths) = graded_batch();
    let one = h.evaluator(1, Duration::from_secs(10)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;
    let eight = h.evaluator(8, Duration::from_secs(10)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;
    assert_eq!(comparable(&one.records), comparable(&eight.records));
    assert_eq!(one.summary.aggregate_score(), eight.summary.aggregate_score());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_are_isolated_per_question() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let questions = vec![
        question(0, "mất kết nối TCP?"),
        question(1, "lỗi khi hỏi TCP?"),
        question(2, "chậm quá TCP?"),
        question(3, "hỏng TCP?"),
        question(4, "mơ hồ TCP?"),
        question(5, "TCP có những đặc điểm nào?"),
    ];
    let truths = vec![gt("AC"); 6];
    let outcome = h.evaluator(3, Duration::from_millis(500)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;

    let kinds: Vec<Option<ErrorKind>> = outcome.records.iter().map(|r| r.error.as_ref().map(|e| e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::Retrieval),
            Some(ErrorKind::Generation),
            Some(ErrorKind::Timeout),
            Some(ErrorKind::Panic),
            Some(ErrorKind::GenerationParse),
            None,
        ]
    );
    assert!(outcome.records[..5].iter().all(|r| r.score == 0.0 && !r.excluded));
    assert_eq!(outcome.records[5].score, 1.0);
    assert_eq!(outcome.records[4].prediction.as_ref().unwrap().attempts, 2);
    assert_eq!(outcome.summary.tally.errors, 5);
    assert!((outcome.summary.aggregate_score() - 100.0 / 6.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_and_malformed_ground_truth_are_excluded() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, _) = graded_batch();
    let mut bad = gt("AC");
    bad.num_correct = 3;
    let truths = vec![gt("AC"), bad, gt("E")];
    let outcome = h.evaluator(2, Duration::from_secs(10)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;

    let excluded: Vec<bool> = outcome.records.iter().map(|r| r.excluded).collect();
    assert_eq!(excluded, vec![false, true, true, true]);
    assert_eq!(outcome.records[1].error.as_ref().unwrap().kind, ErrorKind::Scoring);
    assert!(outcome.records[3].error.is_none());
    assert_eq!(outcome.summary.tally.scored, 1);
    assert_eq!(outcome.summary.aggregate_score(), 100.0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bad_answer_key_rows_exclude_only_their_question() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, _) = graded_batch();
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("gt.csv");
    std::fs::write(&path, "num_correct,answers\n2,\"A,C\"\n,\nx,B\n1,D\n")?;
    let truths = load_ground_truth(&path)?;
    let outcome = h.evaluator(2, Duration::from_secs(10)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;

    let excluded: Vec<bool> = outcome.records.iter().map(|r| r.excluded).collect();
    assert_eq!(excluded, vec![false, true, true, false]);
    assert_eq!(outcome.records[1].error.as_ref().unwrap().kind, ErrorKind::Scoring);
    assert_eq!(outcome.records[2].error.as_ref().unwrap().kind, ErrorKind::Scoring);
    assert_eq!(outcome.records[3].score, 1.0);
    assert_eq!(outcome.summary.tally.scored, 2);
    assert_eq!(outcome.summary.aggregate_score(), 100.0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn selection_keeps_question_order() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, truths) = graded_batch();
    let policy = SelectionPolicy { range: Some("2-4".parse()?), ..SelectionPolicy::all() };
    let outcome = h.evaluator(4, Duration::from_secs(10)).evaluate(&questions, &truths, &policy).await?;
    let ids: Vec<&str> = outcome.records.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(ids, vec!["2", "3", "4"]);
    assert_eq!(outcome.records[0].score, 0.5);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn index_failure_aborts_before_any_question() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    h.vector.clear().await?;
    let (questions, truths) = graded_batch();
    let result = h
        .evaluator(2, Duration::from_secs(10))
        .prepare_and_evaluate(&h.builder(), &corpus(), 1000, 150, IndexMode::Reuse, &questions, &truths, &SelectionPolicy::all())
        .await;
    assert!(matches!(result, Err(Error::IndexBuild(_))));
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn artifacts_are_persisted() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, truths) = graded_batch();
    let outcome = h.evaluator(2, Duration::from_secs(10)).evaluate(&questions, &truths, &SelectionPolicy::all()).await?;

    let tmp = tempfile::tempdir()?;
    let output = tmp.path().join("out").join("predictions.csv");
    let summary_path = persist(&output, &outcome)?;
    assert_eq!(summary_path, tmp.path().join("out").join("predictions_evaluation.json"));

    let csv = std::fs::read_to_string(&output)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "question_id,num_correct,answers");
    assert_eq!(lines[1], "1,2,\"A,C\"");
    assert_eq!(lines[2], "2,1,A");

    let report = mcqrag_eval::artifacts::read_summary(&summary_path)?;
    assert_eq!(report.summary.aggregate_score(), 62.5);
    assert_eq!(report.records.len(), 4);
    assert!(report.summary.categories.values().map(|t| t.total).sum::<usize>() == 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inspect_returns_full_trace() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (questions, _) = graded_batch();
    let trace = inspect(&h.pipeline(), &questions[1], Some(&gt("AC")), 1.0).await?;
    assert!(!trace.retrieved.is_empty());
    assert_eq!(trace.raw_outputs, vec!["Đáp án: A".to_string()]);
    assert_eq!(trace.grade, Some(Grade::Partial));
    assert_eq!(trace.score, 0.5);
    let rendered = trace.to_string();
    assert!(rendered.contains("Expected:      A,C"));
    assert!(rendered.contains("doc=mang"));
    Ok(())
}
