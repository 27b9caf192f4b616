use mcqrag_answer::AnswerSynthesizer;
use mcqrag_core::error::Result;
use mcqrag_core::types::{Prediction, Question, RetrievalResult};
use mcqrag_hybrid::HybridRetriever;

/// Retrieval followed by answer synthesis for a single question.
#[derive(Clone)]
pub struct QuestionPipeline {
    retriever: HybridRetriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl QuestionPipeline {
    pub fn new(retriever: HybridRetriever, synthesizer: AnswerSynthesizer, top_k: usize) -> Self {
        Self { retriever, synthesizer, top_k }
    }

    pub fn generator_id(&self) -> String {
        self.synthesizer.generator_id()
    }

    pub async fn run(&self, question: &Question) -> Result<(RetrievalResult, Prediction)> {
        let retrieval = self.retriever.retrieve(&question.text, self.top_k).await?;
        let prediction = self.synthesizer.synthesize(question, &retrieval).await?;
        Ok((retrieval, prediction))
    }
}
