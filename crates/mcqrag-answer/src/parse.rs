//! Tolerant extraction of option letters from a model reply.
//!
//! Two shapes are accepted: letters following an answer marker
//! (`Đáp án đúng`, `Đáp án`, `Answer`), or a line made only of letters.
//! Letters are never mined out of free prose.

use std::collections::BTreeSet;

use regex::Regex;

use mcqrag_core::types::OptionLetter;

/// Connectives allowed between letters.
const FILLER: &[&str] = &["và", "and", "là", "is"];

const TRIM: &[char] = &['.', ')', '(', '[', ']', '*', '"', '\'', ':', '`', '“', '”'];

pub struct AnswerParser {
    marker: Regex,
    separator: Regex,
}

impl AnswerParser {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            marker: Regex::new(r"(?i)(?:đáp\s+án\s+đúng|đáp\s+án|\banswers?\b)[\s*_]*[:：]?[\s*_]*(?P<tail>[^\n]*)")?,
            separator: Regex::new(r"[,;/\s]+")?,
        })
    }

    /// Letters chosen in `reply`, restricted to `allowed`.
    ///
    /// `None` when neither shape yields at least one allowed letter.
    pub fn parse(&self, reply: &str, allowed: &BTreeSet<OptionLetter>) -> Option<BTreeSet<OptionLetter>> {
        for caps in self.marker.captures_iter(reply) {
            let tail = caps.name("tail").map_or("", |m| m.as_str());
            if let Some(letters) = self.leading_letters(tail, allowed) {
                return Some(letters);
            }
        }
        reply.lines().find_map(|line| self.letter_line(line, allowed))
    }

    fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.separator
            .split(text)
            .map(|t| t.trim_matches(TRIM))
            .filter(|t| !t.is_empty() && !FILLER.contains(&t.to_lowercase().as_str()))
    }

    /// Letters at the start of a marker's tail, up to the first other word.
    fn leading_letters(&self, tail: &str, allowed: &BTreeSet<OptionLetter>) -> Option<BTreeSet<OptionLetter>> {
        let letters: BTreeSet<_> = self
            .tokens(tail)
            .map_while(single_letter)
            .filter(|l| allowed.contains(l))
            .collect();
        (!letters.is_empty()).then_some(letters)
    }

    fn letter_line(&self, line: &str, allowed: &BTreeSet<OptionLetter>) -> Option<BTreeSet<OptionLetter>> {
        let mut letters = BTreeSet::new();
        for token in self.tokens(line) {
            let letter = single_letter(token)?;
            if !allowed.contains(&letter) {
                return None;
            }
            letters.insert(letter);
        }
        (!letters.is_empty()).then_some(letters)
    }
}

fn single_letter(token: &str) -> Option<OptionLetter> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => OptionLetter::new(c),
        _ => None,
    }
}
