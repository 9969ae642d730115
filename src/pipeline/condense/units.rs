use crate::pipeline::extraction::normalize;

use super::types::Granularity;

/// Split raw (pre-normalization) text into normalized, non-empty units.
///
/// Paragraphs break on blank lines. A document with no blank lines at all
/// (common for direct-text PDF output) falls back to one unit per line.
pub fn split_units(text: &str, granularity: Granularity) -> Vec<String> {
    match granularity {
        Granularity::Paragraph => split_paragraphs(text),
        Granularity::Sentence => split_sentences(text),
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut blocks, &mut current);
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    flush(&mut blocks, &mut current);

    if blocks.len() <= 1 && text.trim().contains('\n') {
        return text
            .lines()
            .map(normalize)
            .filter(|unit| !unit.is_empty())
            .collect();
    }
    blocks
}

fn flush(blocks: &mut Vec<String>, current: &mut String) {
    let unit = normalize(current);
    if !unit.is_empty() {
        blocks.push(unit);
    }
    current.clear();
}

/// Sentences end at `.`, `!` or `?` (optionally followed by closing quotes
/// or brackets) when the next char is whitespace or end of input.
fn split_sentences(text: &str) -> Vec<String> {
    let flat = normalize(text);
    let chars: Vec<char> = flat.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?') {
            let mut end = i + 1;
            while end < chars.len() && matches!(chars[end], '.' | '!' | '?' | '"' | '\'' | ')' | ']') {
                end += 1;
            }
            if end == chars.len() || chars[end].is_whitespace() {
                let sentence: String = chars[start..end].iter().collect();
                let sentence = sentence.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
            i = end;
        } else {
            i += 1;
        }
    }

    let tail: String = chars[start.min(chars.len())..].iter().collect();
    let tail = tail.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
