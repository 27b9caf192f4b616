use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use mcqrag_core::error::{Error, Result};
use mcqrag_core::traits::Generator;
use mcqrag_core::types::{Answer, OptionLetter, Prediction, Question, RetrievalResult};

use crate::parse::AnswerParser;
use crate::prompt::{build_prompt, build_retry_prompt};

/// One initial call plus one reformatting retry.
pub const MAX_GENERATION_CALLS: u8 = 2;

/// Progress of a single question through generation and parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerState {
    Pending,
    /// The first reply could not be parsed; holds that reply.
    Retried(String),
    Accepted(BTreeSet<OptionLetter>),
    Unparseable,
}

impl AnswerState {
    /// Transition after a reply has been parsed (`None` = no letters found).
    pub fn on_reply(self, reply: &str, parsed: Option<BTreeSet<OptionLetter>>) -> Self {
        match (self, parsed) {
            (AnswerState::Pending | AnswerState::Retried(_), Some(letters)) => AnswerState::Accepted(letters),
            (AnswerState::Pending, None) => AnswerState::Retried(reply.to_string()),
            (AnswerState::Retried(_), None) => AnswerState::Unparseable,
            (done, _) => done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnswerState::Accepted(_) | AnswerState::Unparseable)
    }
}

#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    parser: Arc<AnswerParser>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Result<Self> {
        let parser = AnswerParser::new().map_err(|e| Error::InvalidConfig(format!("answer parser: {e}")))?;
        Ok(Self { generator, parser: Arc::new(parser) })
    }

    pub fn generator_id(&self) -> String {
        self.generator.generator_id()
    }

    /// Generate, parse and (once) retry until the answer is accepted or unparseable.
    ///
    /// A failing generation call is returned as `Error::Generation` without
    /// further retries.
    pub async fn synthesize(&self, question: &Question, retrieval: &RetrievalResult) -> Result<Prediction> {
        let allowed = question.option_letters();
        let mut state = AnswerState::Pending;
        let mut raw_outputs = Vec::new();
        let mut attempts = 0u8;

        while !state.is_terminal() && attempts < MAX_GENERATION_CALLS {
            let prompt = match &state {
                AnswerState::Retried(invalid) => build_retry_prompt(question, retrieval, invalid),
                _ => build_prompt(question, retrieval),
            };
            attempts += 1;
            let reply = self.generator.generate(&prompt).await.map_err(|e| {
                Error::Generation(format!("question {} attempt {attempts}: {e:#}", question.id))
            })?;
            debug!(question = %question.id, attempts, reply = %reply.trim(), "Generation reply");
            let parsed = self.parser.parse(&reply, &allowed);
            if parsed.is_none() {
                warn!(question = %question.id, attempts, "Could not parse answer letters");
            }
            state = state.on_reply(&reply, parsed);
            raw_outputs.push(reply);
        }

        let answer = match state {
            AnswerState::Accepted(letters) => Answer::Letters(letters),
            _ => Answer::Unparseable,
        };
        Ok(Prediction { question_id: question.id.clone(), answer, raw_outputs, chunk_ids: retrieval.chunk_ids(), attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Replies from a fixed script; `Err` entries simulate transport failures.
    struct Scripted {
        replies: Mutex<Vec<std::result::Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<std::result::Result<&str, &str>>) -> Arc<Self> {
            let replies = replies.into_iter().rev().map(|r| r.map(str::to_string).map_err(str::to_string)).collect();
            Arc::new(Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        fn generator_id(&self) -> String {
            "scripted".into()
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop() {
                Some(Ok(r)) => Ok(r),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Err(anyhow::anyhow!("script exhausted")),
            }
        }
    }

    fn question() -> Question {
        let options: BTreeMap<_, _> =
            "ABCD".chars().filter_map(OptionLetter::new).map(|l| (l, format!("lựa chọn {l}"))).collect();
        Question { id: "7".into(), index: 6, text: "Câu hỏi?".into(), options }
    }

    fn letters(s: &str) -> BTreeSet<OptionLetter> {
        s.chars().filter_map(OptionLetter::new).collect()
    }

    #[tokio::test]
    async fn accepts_first_parseable_reply() {
        let script = Scripted::new(vec![Ok("Đáp án đúng: A, C")]);
        let synth = AnswerSynthesizer::new(script.clone()).unwrap();
        let p = synth.synthesize(&question(), &RetrievalResult::default()).await.unwrap();
        assert_eq!(p.answer, Answer::Letters(letters("AC")));
        assert_eq!(p.attempts, 1);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn accepts_on_retry_with_quoted_reply() {
        let script = Scripted::new(vec![Ok("Tôi không chắc lắm"), Ok("Đáp án đúng: B")]);
        let synth = AnswerSynthesizer::new(script.clone()).unwrap();
        let p = synth.synthesize(&question(), &RetrievalResult::default()).await.unwrap();
        assert_eq!(p.answer, Answer::Letters(letters("B")));
        assert_eq!(p.attempts, 2);
        assert_eq!(p.raw_outputs, vec!["Tôi không chắc lắm".to_string(), "Đáp án đúng: B".to_string()]);
        assert!(script.prompts.lock().unwrap()[1].contains("Tôi không chắc lắm"));
    }

    #[tokio::test]
    async fn two_bad_replies_are_unparseable_after_exactly_two_calls() {
        let script = Scripted::new(vec![Ok("không biết"), Ok("vẫn không biết"), Ok("Đáp án đúng: A")]);
        let synth = AnswerSynthesizer::new(script.clone()).unwrap();
        let p = synth.synthesize(&question(), &RetrievalResult::default()).await.unwrap();
        assert_eq!(p.answer, Answer::Unparseable);
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_a_generation_error() {
        let script = Scripted::new(vec![Err("connection refused")]);
        let synth = AnswerSynthesizer::new(script.clone()).unwrap();
        let err = synth.synthesize(&question(), &RetrievalResult::default()).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(script.calls(), 1);
    }

    #[test]
    fn state_transitions() {
        let s = AnswerState::Pending.on_reply("x", None);
        assert_eq!(s, AnswerState::Retried("x".into()));
        assert_eq!(s.clone().on_reply("y", None), AnswerState::Unparseable);
        assert_eq!(s.on_reply("A", Some(letters("A"))), AnswerState::Accepted(letters("A")));
        assert!(AnswerState::Unparseable.on_reply("A", Some(letters("A"))).is_terminal());
    }
}
