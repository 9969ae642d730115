/// Non-semantic code points left behind by PDF text layers and OCR.
const ARTIFACTS: &[char] = &[
    '\u{000C}', // form feed
    '\u{F0B7}', // Symbol-font bullet (private use area)
    '\u{F0A7}', // Wingdings bullet
    '\u{F0D8}', // Wingdings arrow bullet
    '\u{2022}', // bullet
    '\u{25CF}', // black circle
    '\u{25AA}', // small black square
    '\u{25E6}', // white bullet
    '\u{2023}', // triangular bullet
    '\u{2043}', // hyphen bullet
    '\u{FEFF}', // byte order mark
];

/// Normalize extracted text: drop layout artifacts and control characters,
/// collapse every whitespace run (newlines included) to one space, trim.
///
/// Artifacts act as separators so a bullet glued to a word does not merge
/// it with its neighbour. Total and idempotent.
pub fn normalize(text: &str) -> String {
    let filtered: String = text
        .chars()
        .map(|c| if ARTIFACTS.contains(&c) { ' ' } else { c })
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}
