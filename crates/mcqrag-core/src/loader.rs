//! Readers for the question file, the ground-truth file and the document corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{Document, GroundTruth, OptionLetter, Question};

const REQUIRED_QUESTION_COLUMNS: [&str; 5] = ["Question", "A", "B", "C", "D"];

fn open_csv(path: &Path) -> Result<csv::Reader<fs::File>> {
    if !path.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| Error::Input(format!("{}: {e}", path.display())))
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
}

/// Load questions from a CSV with header `Question,A,B,C,D`.
///
/// Any further single-letter column is an extra option; an `id` column, if
/// present, supplies the question id (otherwise the 1-based row number).
pub fn load_questions(path: &Path) -> Result<Vec<Question>> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| Error::Input(format!("{}: {e}", path.display())))?
        .clone();

    let question_col = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == "Question")
        .ok_or_else(|| missing_columns(path))?;
    let mut option_cols: Vec<(OptionLetter, usize)> = Vec::new();
    for (idx, h) in headers.iter().enumerate() {
        let mut chars = h.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_uppercase() {
                if let Some(letter) = OptionLetter::new(c) {
                    option_cols.push((letter, idx));
                }
            }
        }
    }
    if !REQUIRED_QUESTION_COLUMNS[1..].iter().all(|name| headers.iter().any(|h| h == *name)) {
        return Err(missing_columns(path));
    }
    let id_col = column(&headers, "id");

    let mut questions = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Input(format!("{} row {}: {e}", path.display(), index + 1)))?;
        let text = record.get(question_col).unwrap_or_default().trim().to_string();
        let mut options = BTreeMap::new();
        for (letter, idx) in &option_cols {
            let value = record.get(*idx).unwrap_or_default().trim();
            let required = letter.as_char() <= 'D';
            if required || !value.is_empty() {
                options.insert(*letter, value.to_string());
            }
        }
        let id = id_col
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| (index + 1).to_string(), str::to_string);
        questions.push(Question { id, index, text, options });
    }
    info!(path = %path.display(), count = questions.len(), "Loaded questions");
    Ok(questions)
}

fn missing_columns(path: &Path) -> Error {
    Error::Input(format!(
        "{}: CSV must have columns {:?}",
        path.display(),
        REQUIRED_QUESTION_COLUMNS
    ))
}

/// Write questions back out with the same column layout `load_questions` reads.
pub fn write_questions(path: &Path, questions: &[Question]) -> Result<()> {
    let mut letters: Vec<OptionLetter> = questions.iter().flat_map(|q| q.options.keys().copied()).collect();
    letters.sort();
    letters.dedup();

    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::Operation(e.to_string()))?;
    let mut header = vec!["id".to_string(), "Question".to_string()];
    header.extend(letters.iter().map(ToString::to_string));
    writer.write_record(&header).map_err(|e| Error::Operation(e.to_string()))?;
    for q in questions {
        let mut row = vec![q.id.clone(), q.text.clone()];
        row.extend(letters.iter().map(|l| q.options.get(l).cloned().unwrap_or_default()));
        writer.write_record(&row).map_err(|e| Error::Operation(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load the answer key: header row, then `num_correct,answers` per question.
///
/// Rows are matched to questions by position. Answer tokens that are not
/// option letters are kept in [`GroundTruth::invalid`].
pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruth>> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| Error::Input(format!("{}: {e}", path.display())))?
        .clone();
    let (num_col, ans_col) = match (column(&headers, "num_correct"), column(&headers, "answers")) {
        (Some(n), Some(a)) => (n, a),
        _ if column(&headers, "id").is_some() => (1, 2),
        _ => (0, 1),
    };

    let mut truths = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Input(format!("{} row {}: {e}", path.display(), row + 1)))?;
        // Malformed rows keep their position so later rows stay aligned.
        if record.iter().all(|f| f.trim().is_empty()) {
            warn!(path = %path.display(), row = row + 1, "Empty ground-truth row");
            truths.push(GroundTruth { num_correct: 0, letters: BTreeSet::new(), invalid: vec!["<empty row>".into()] });
            continue;
        }
        let raw_num = record.get(num_col).unwrap_or_default().trim();
        let cell = record.get(ans_col).unwrap_or_default();
        match raw_num.parse::<usize>() {
            Ok(num_correct) => truths.push(parse_answer_cell(num_correct, cell)),
            Err(_) => {
                warn!(path = %path.display(), row = row + 1, num_correct = raw_num, "Invalid num_correct");
                let mut truth = parse_answer_cell(0, cell);
                truth.invalid.insert(0, format!("num_correct={raw_num}"));
                truths.push(truth);
            }
        }
    }
    info!(path = %path.display(), count = truths.len(), "Loaded ground truth");
    Ok(truths)
}

fn parse_answer_cell(num_correct: usize, cell: &str) -> GroundTruth {
    let mut truth = GroundTruth { num_correct, letters: Default::default(), invalid: Vec::new() };
    for token in cell.trim().trim_matches('"').split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<OptionLetter>() {
            Ok(letter) => {
                truth.letters.insert(letter);
            }
            Err(_) => truth.invalid.push(token.to_string()),
        }
    }
    truth
}

/// Load the corpus.
///
/// A directory yields one document per `.md`/`.txt` file (id = relative path
/// without extension). A single file is split on top-level `# ` headings,
/// one document per heading.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    if path.is_dir() {
        load_directory(path)
    } else if path.is_file() {
        let text = read_lossy(path)?;
        let stem = file_stem(path);
        let docs = split_on_headings(&stem, &text)
            .into_iter()
            .map(|d| d.with_source_path(path.display().to_string()))
            .collect::<Vec<_>>();
        info!(path = %path.display(), documents = docs.len(), "Loaded corpus file");
        Ok(docs)
    } else {
        Err(Error::NotFound(path.display().to_string()))
    }
}

fn load_directory(root: &Path) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("md" | "txt")))
        .collect();
    files.sort();
    if files.is_empty() {
        warn!(path = %root.display(), "No .md or .txt files found");
    }

    let mut docs = Vec::with_capacity(files.len());
    for file in files {
        let rel = file.strip_prefix(root).unwrap_or(&file).with_extension("");
        let id = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        let text = read_lossy(&file)?;
        let title = first_heading(&text).unwrap_or_else(|| file_stem(&file));
        debug!(file = %file.display(), id = %id, "Loaded document");
        docs.push(Document::new(id, text).with_title(title).with_source_path(file.display().to_string()));
    }
    info!(path = %root.display(), documents = docs.len(), "Loaded corpus directory");
    Ok(docs)
}

/// Split one markdown text into documents at each top-level `# ` heading.
/// Text before the first heading becomes a document named after `stem`.
pub fn split_on_headings(stem: &str, text: &str) -> Vec<Document> {
    let mut docs = Vec::new();
    let mut current: Option<String> = None;
    let mut body = String::new();

    let flush = |title: Option<String>, body: &mut String, docs: &mut Vec<Document>| {
        if body.trim().is_empty() {
            body.clear();
            return;
        }
        let doc = match title {
            Some(t) => Document::new(sanitize_id(&t), std::mem::take(body)).with_title(t),
            None => Document::new(stem.to_string(), std::mem::take(body)).with_title(stem.to_string()),
        };
        docs.push(doc);
    };

    for line in text.split_inclusive('\n') {
        if let Some(title) = line.strip_prefix("# ") {
            flush(current.take(), &mut body, &mut docs);
            current = Some(title.trim().to_string());
        }
        body.push_str(line);
    }
    flush(current, &mut body, &mut docs);

    // ids must be unique for chunk ids to be stable
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for doc in &mut docs {
        let n = seen.entry(doc.id.clone()).or_insert(0);
        *n += 1;
        if *n > 1 {
            doc.id = format!("{}-{}", doc.id, n);
        }
    }
    docs
}

fn sanitize_id(title: &str) -> String {
    let id: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if id.is_empty() { "doc".to_string() } else { id }
}

fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map_or_else(|| "doc".to_string(), |s| s.to_string_lossy().into_owned())
}

fn read_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_cell_collects_invalid_tokens() {
        let gt = parse_answer_cell(2, "\"A, x\"");
        assert_eq!(gt.letters.len(), 1);
        assert_eq!(gt.invalid, vec!["x".to_string()]);
        assert!(!gt.is_well_formed());
    }

    #[test]
    fn split_keeps_preamble_and_dedups_ids() {
        let docs = split_on_headings("corpus", "preface\n# Public001\na\n# Public001\nb\n");
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["corpus", "Public001", "Public001-2"]);
        assert!(docs[1].text.starts_with("# Public001"));
    }
}
