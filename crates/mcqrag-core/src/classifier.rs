//! Rule-based question categories.
//!
//! Each category owns a list of regular expressions matched against the
//! lower-cased question. Categories are tried in a fixed priority order and
//! the first category with any matching pattern wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    TableData,
    DocumentComprehension,
    Calculation,
    Definition,
    Comparison,
    Procedure,
    Explanation,
    Identification,
    Application,
    Reason,
    General,
}

impl QuestionCategory {
    /// Every category in classification priority order; `General` last.
    pub const ALL: [QuestionCategory; 11] = [
        QuestionCategory::TableData,
        QuestionCategory::DocumentComprehension,
        QuestionCategory::Calculation,
        QuestionCategory::Definition,
        QuestionCategory::Comparison,
        QuestionCategory::Procedure,
        QuestionCategory::Explanation,
        QuestionCategory::Identification,
        QuestionCategory::Application,
        QuestionCategory::Reason,
        QuestionCategory::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionCategory::TableData => "table_data",
            QuestionCategory::DocumentComprehension => "document_comprehension",
            QuestionCategory::Calculation => "calculation",
            QuestionCategory::Definition => "definition",
            QuestionCategory::Comparison => "comparison",
            QuestionCategory::Procedure => "procedure",
            QuestionCategory::Explanation => "explanation",
            QuestionCategory::Identification => "identification",
            QuestionCategory::Application => "application",
            QuestionCategory::Reason => "reason",
            QuestionCategory::General => "general",
        }
    }

    fn patterns(self) -> &'static [&'static str] {
        match self {
            QuestionCategory::TableData => &[
                r"bảng\s*\d+\.?\d*|theo\s+bảng|dựa\s+vào\s+bảng",
                r"bảng.*cho\s+biết|bảng.*cung\s+cấp",
                r"table\s*\d+|theo\s+table",
            ],
            QuestionCategory::DocumentComprehension => &[
                r"public_\d+",
                r"public\s+\d+",
                r"theo\s+tài\s+liệu",
                r"theo\s+tài\s+liệu\s+\d+",
                r"theo\s+văn\s+bản",
                r"trong\s+tài\s+liệu",
            ],
            QuestionCategory::Calculation => &[
                r"hãy\s+tính",
                r"tính\s+.*\s+bao nhiêu|tính\s+.*\s+giá trị|tính\s+.*\s+kết quả",
                r"bao nhiêu.*tính|giá trị.*tính|kết quả.*tính",
                r"tỉ lệ.*được giữ|phần trăm.*được giữ|tỉ lệ.*giữ lại",
                r"\d+\s*[+\-×÷*/]\s*\d+",
                r"λ\d+|eigenvalue|trị riêng|ma trận|matrix",
                r"công thức.*tính|formula.*tính|tính toán.*theo",
                r"=\s*\d+|bằng\s*\d+|kết quả\s*=\s*\d+",
                r"tính\s+.*\s+theo\s+công\s+thức",
            ],
            QuestionCategory::Definition => &[
                r"là\s+gì\s*$|định nghĩa.*là|khái niệm.*là",
                r"viết\s+tắt.*là|tên\s+gọi.*là|được\s+gọi\s+là",
                r"được\s+định\s+nghĩa|được\s+hiểu|được\s+ký\s+hiệu",
                r"định\s+nghĩa\s+của|khái\s+niệm\s+của",
            ],
            QuestionCategory::Comparison => &[
                r"khác\s+nhau.*ở|giống\s+nhau.*ở",
                r"khác\s+.*\s+ở\s+những\s+điểm|giống\s+.*\s+ở\s+những\s+điểm",
                r"so\s+sánh.*và|điểm\s+khác|điểm\s+chung",
                r"khác\s+biệt.*giữa|sự\s+khác\s+biệt",
            ],
            QuestionCategory::Procedure => &[
                r"bước\s+đầu\s+tiên|bước\s+nào|thứ\s+tự.*bước",
                r"quy\s+trình.*gồm|quy\s+trình.*bao\s+nhiêu",
                r"tcvn|iso|theo.*quy\s+định|theo.*tiêu\s+chuẩn",
                r"sắp\s+xếp.*bước|thực\s+hiện.*bước",
                r"quy\s+trình.*là\s+gì",
            ],
            QuestionCategory::Explanation => &[
                r"giải\s+thích.*nguyên\s+lý|mô\s+tả.*nguyên\s+lý",
                r"nguyên\s+lý.*hoạt\s+động|cơ\s+chế.*hoạt\s+động",
                r"hoạt\s+động.*như\s+thế\s+nào|vai\s+trò.*là\s+gì",
                r"trình\s+bày.*cách|mô\s+tả.*cách",
            ],
            QuestionCategory::Identification => &[
                r"đâu\s+là.*đúng|đâu\s+không\s+phải",
                r"thành\s+phần\s+nào|mô\s+hình\s+nào",
                r"công\s+nghệ\s+nào|thuật\s+toán\s+nào",
                r"phương\s+pháp\s+nào|đơn\s+vị\s+nào",
            ],
            QuestionCategory::Application => &[
                r"ứng\s+dụng.*là\s+gì|sử\s+dụng.*để\s+làm",
                r"dùng\s+để\s+làm\s+gì|mục\s+đích.*là\s+gì",
                r"được\s+dùng|được\s+sử\s+dụng|vai\s+trò",
            ],
            QuestionCategory::Reason => &[
                r"tại\s+sao|vì\s+sao|lý\s+do.*là",
                r"nguyên\s+nhân.*là|vì.*nên|do.*nên",
            ],
            QuestionCategory::General => &[],
        }
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct QuestionClassifier {
    rules: Vec<(QuestionCategory, Vec<Regex>)>,
}

impl QuestionClassifier {
    pub fn new() -> Result<Self> {
        let mut rules = Vec::new();
        for category in QuestionCategory::ALL {
            let compiled = category
                .patterns()
                .iter()
                .map(|p| Regex::new(p).map_err(|e| Error::InvalidConfig(format!("pattern {p}: {e}"))))
                .collect::<Result<Vec<_>>>()?;
            rules.push((category, compiled));
        }
        Ok(Self { rules })
    }

    pub fn classify(&self, question: &str) -> QuestionCategory {
        if question.trim().is_empty() {
            return QuestionCategory::General;
        }
        let lower = question.to_lowercase();
        self.rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(&lower)))
            .map_or(QuestionCategory::General, |(category, _)| *category)
    }

    /// Share of the category's patterns that match, boosted when several do.
    pub fn confidence(&self, question: &str, category: QuestionCategory) -> f32 {
        if question.trim().is_empty() || category == QuestionCategory::General {
            return 0.5;
        }
        let Some((_, patterns)) = self.rules.iter().find(|(c, _)| *c == category) else {
            return 0.0;
        };
        if patterns.is_empty() {
            return 0.0;
        }
        let lower = question.to_lowercase();
        let matches = patterns.iter().filter(|re| re.is_match(&lower)).count();
        let confidence = matches as f32 / patterns.len() as f32;
        if matches > 1 { (confidence * 1.2).min(1.0) } else { confidence }
    }

    /// Every category with at least one matching pattern, with its confidence.
    pub fn all_matches(&self, question: &str) -> Vec<(QuestionCategory, f32)> {
        let out: Vec<_> = self
            .rules
            .iter()
            .map(|(category, _)| (*category, self.confidence(question, *category)))
            .filter(|(category, confidence)| *category != QuestionCategory::General && *confidence > 0.0)
            .collect();
        if out.is_empty() { vec![(QuestionCategory::General, 0.5)] } else { out }
    }
}
