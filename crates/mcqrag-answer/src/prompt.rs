//! Prompt construction for grounded multiple-choice answering.

use std::fmt::Write;

use mcqrag_core::types::{Question, RetrievalResult};

const HEADER: &str = "Bạn là một trợ lý AI chuyên trả lời câu hỏi trắc nghiệm tiếng Việt. \
Chỉ sử dụng thông tin trong các đoạn tài liệu dưới đây. Câu hỏi có thể có một hoặc nhiều đáp án đúng.";

const NO_EVIDENCE: &str = "(Không tìm thấy đoạn tài liệu liên quan.)";

fn write_evidence(out: &mut String, retrieval: &RetrievalResult) {
    out.push_str("Thông tin tham khảo:\n");
    if retrieval.is_empty() {
        out.push_str(NO_EVIDENCE);
        out.push('\n');
    }
    for (n, hit) in retrieval.hits.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}\n{}\n", n + 1, hit.chunk.provenance(), hit.chunk.text.trim());
    }
}

fn write_question(out: &mut String, question: &Question) {
    let _ = writeln!(out, "\nCâu hỏi: {}", question.text.trim());
    out.push_str("Các lựa chọn:\n");
    for (letter, text) in &question.options {
        let _ = writeln!(out, "{letter}. {}", text.trim());
    }
}

fn example_letters(question: &Question) -> String {
    let letters: Vec<String> = question.options.keys().map(ToString::to_string).collect();
    letters.join(", ")
}

/// First-attempt prompt: evidence in fused-score order, then the question.
pub fn build_prompt(question: &Question, retrieval: &RetrievalResult) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str(HEADER);
    out.push_str("\n\n");
    write_evidence(&mut out, retrieval);
    write_question(&mut out, question);
    let _ = write!(
        out,
        "\nHướng dẫn:\n\
1. Đọc kỹ các đoạn tài liệu và câu hỏi.\n\
2. Đánh giá từng lựa chọn dựa trên tài liệu.\n\
3. Trả lời đúng một dòng theo định dạng: \"Đáp án đúng: <các chữ cái>\" (ví dụ: \"Đáp án đúng: A, C\").\n\
4. Chỉ dùng các chữ cái {}.\n\nTrả lời:",
        example_letters(question)
    );
    out
}

/// Stricter reformatting prompt that quotes the reply which could not be parsed.
pub fn build_retry_prompt(question: &Question, retrieval: &RetrievalResult, invalid_reply: &str) -> String {
    let mut out = build_prompt(question, retrieval);
    let _ = write!(
        out,
        " {}\n\n\
Câu trả lời trên không đúng định dạng yêu cầu.\n\
Hãy chọn đáp án và trả lời lại CHỈ bằng một dòng duy nhất, không giải thích, theo đúng mẫu:\n\
Đáp án đúng: <các chữ cái cách nhau bởi dấu phẩy>\n\
Các chữ cái hợp lệ: {}.\n\nTrả lời:",
        invalid_reply.trim(),
        example_letters(question)
    );
    out
}
