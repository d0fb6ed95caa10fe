//! Line records and line numbering

use crate::error::ConvertError;

/// First number assigned when renumbering
pub const FIRST_LINE_NUMBER: u16 = 10;
/// Step between renumbered lines
pub const LINE_NUMBER_STEP: u16 = 10;
/// Byte order mark written at the start of text output
pub const UTF8_BOM: &str = "\u{FEFF}";

/// Source dialect of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Tokenized Sinclair BASIC
    Basic,
    /// HiSoft GEN assembler
    Assembler,
}

impl Dialect {
    /// Line number prefix as printed in text output.
    ///
    /// Assembler numbers take 8 columns so a following TAB keeps its alignment.
    pub fn number_prefix(self, number: u16) -> String {
        match self {
            Dialect::Basic => format!("{:4} ", number),
            Dialect::Assembler => format!("{:6}  ", number),
        }
    }
}

/// One line of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    pub number: Option<u16>,
    pub text: String,
}

impl LineRecord {
    pub fn new(number: Option<u16>, text: impl Into<String>) -> Self {
        Self { number, text: text.into() }
    }

    /// Text of the line, with its number in front when requested
    pub fn render(&self, dialect: Dialect, include_number: bool) -> String {
        match (include_number, self.number) {
            (true, Some(number)) => format!("{}{}", dialect.number_prefix(number), self.text),
            _ => self.text.clone(),
        }
    }
}

/// Render lines as text, each terminated by `\n`
pub fn render_lines(lines: &[LineRecord], dialect: Dialect, include_numbers: bool) -> String {
    let mut output = String::new();
    for line in lines {
        output.push_str(&line.render(dialect, include_numbers));
        output.push('\n');
    }
    output
}

/// Drop a leading byte order mark, if any
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split a leading line number off a text line.
///
/// Accepts optional leading spaces, a run of digits that ends at a word
/// boundary and fits 16 bits, and swallows up to two following spaces.
pub fn split_line_number(line: &str) -> Option<(u16, &str)> {
    let rest = line.trim_start_matches(' ');
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let (digits, mut rest) = rest.split_at(digits_end);
    if rest.chars().next().is_some_and(is_word_char) {
        return None;
    }
    let number = digits.parse::<u16>().ok()?;

    for _ in 0..2 {
        match rest.strip_prefix(' ') {
            Some(stripped) => rest = stripped,
            None => break,
        }
    }
    Some((number, rest))
}

/// Assign line numbers to text lines (trailing whitespace is dropped).
///
/// Numbers already present are kept only when every line has one and they
/// never decrease; otherwise every line is renumbered 10, 20, 30, ...
/// Recognized numbers are removed from the text either way.
pub fn number_lines<'a, I>(lines: I) -> Result<Vec<LineRecord>, ConvertError>
where
    I: IntoIterator<Item = &'a str>,
{
    let parsed: Vec<(Option<u16>, &str)> = lines
        .into_iter()
        .map(|line| {
            let line = line.trim_end();
            match split_line_number(line) {
                Some((number, text)) => (Some(number), text),
                None => (None, line),
            }
        })
        .collect();

    let all_numbered = parsed.iter().all(|(number, _)| number.is_some());
    let non_decreasing = parsed.windows(2).all(|pair| pair[0].0 <= pair[1].0);

    if all_numbered && non_decreasing {
        return Ok(parsed
            .into_iter()
            .map(|(number, text)| LineRecord::new(number, text))
            .collect());
    }

    let mut records = Vec::with_capacity(parsed.len());
    let mut next = Some(FIRST_LINE_NUMBER);
    for (index, (_, text)) in parsed.into_iter().enumerate() {
        let number = next.ok_or(ConvertError::LineNumberOverflow { line: index + 1 })?;
        records.push(LineRecord::new(Some(number), text));
        next = number.checked_add(LINE_NUMBER_STEP);
    }
    Ok(records)
}
