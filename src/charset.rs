//! ZX Spectrum character set <-> Unicode mapping
//!
//! Every byte 0x00-0xFF has exactly one canonical Unicode form. The reverse
//! direction is many-to-one: user-defined graphics accept several decorated
//! letter styles, and the blank graphic accepts several wide spaces.
//!
//! Bytes 0xA3 and 0xA4 depend on the machine generation: on the 128K/+2/+3
//! they are the `SPECTRUM` and `PLAY` keywords, on the 16K/48K they are the
//! last two user-defined graphics.
//!
//! Display attribute control codes (INK, PAPER, AT, TAB, ...) are two- or
//! three-byte sequences and pass through as their raw control characters.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// First byte of the keyword range on a 128K machine
pub const FIRST_TOKEN: u8 = 0xA3;
/// First byte that is a keyword on every machine generation
pub const FIRST_COMMON_TOKEN: u8 = 0xA5;
/// First user-defined graphic
pub const FIRST_UDG: u8 = 0x90;

/// Machine generation, selecting the meaning of bytes 0xA3 and 0xA4
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Generation {
    /// 128K, +2 and +3: 0xA3/0xA4 are the SPECTRUM and PLAY keywords
    #[default]
    Spectrum128,
    /// 16K and 48K: 0xA3/0xA4 are user-defined graphics T and U
    Spectrum48,
}

/// Which kind of source the table is used for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Tokenized Sinclair BASIC
    #[default]
    Basic,
    /// HiSoft GEN assembler source: TAB is itself, keywords are never rebuilt
    Assembler,
}

// Block graphics 0x80-0x8F as Unicode block elements
const BLOCK_GRAPHICS: [char; 16] = [
    '\u{2800}', // blank
    '\u{259D}', // quadrant upper right
    '\u{2598}', // quadrant upper left
    '\u{2580}', // upper half
    '\u{2597}', // quadrant lower right
    '\u{2590}', // right half
    '\u{259A}', // upper left and lower right
    '\u{259C}', // upper left, upper right, lower right
    '\u{2596}', // quadrant lower left
    '\u{259E}', // upper right and lower left
    '\u{258C}', // left half
    '\u{259B}', // upper left, upper right, lower left
    '\u{2584}', // lower half
    '\u{259F}', // upper right, lower left, lower right
    '\u{2599}', // upper left, lower left, lower right
    '\u{2588}', // full block
];

// Extra spellings of the blank graphic accepted on input
const BLANK_GRAPHIC_ALIASES: [char; 4] = ['\u{00A0}', '\u{2002}', '\u{2003}', '\u{3000}'];

// UDG letters A..U: canonical style first
const UDG_COUNT: u8 = 21;
const UDG_STYLES: [u32; 5] = [
    0x1F170, // negative squared capital
    0x24B6,  // circled capital
    0x24D0,  // circled small
    0x1F130, // squared capital
    0x1F150, // negative circled capital
];

// Keywords 0xA5..=0xFF
const KEYWORDS: [&str; 91] = [
    "RND", "INKEY$", "PI", "FN", "POINT", "SCREEN$", "ATTR", "AT", "TAB", "VAL$", "CODE",
    "VAL", "LEN", "SIN", "COS", "TAN", "ASN", "ACS", "ATN", "LN", "EXP", "INT", "SQR", "SGN",
    "ABS", "PEEK", "IN", "USR", "STR$", "CHR$", "NOT", "BIN", "OR", "AND", "<=", ">=", "<>",
    "LINE", "THEN", "TO", "STEP", "DEF FN", "CAT", "FORMAT", "MOVE", "ERASE", "OPEN #",
    "CLOSE #", "MERGE", "VERIFY", "BEEP", "CIRCLE", "INK", "PAPER", "FLASH", "BRIGHT",
    "INVERSE", "OVER", "OUT", "LPRINT", "LLIST", "STOP", "READ", "DATA", "RESTORE", "NEW",
    "BORDER", "CONTINUE", "DIM", "REM", "FOR", "GO TO", "GO SUB", "INPUT", "LOAD", "LIST",
    "LET", "PAUSE", "NEXT", "POKE", "PRINT", "PLOT", "RUN", "SAVE", "RANDOMIZE", "IF", "CLS",
    "DRAW", "CLEAR", "RETURN", "COPY",
];

// 128K-only keywords at 0xA3 and 0xA4
const KEYWORDS_128: [&str; 2] = ["SPECTRUM", "PLAY"];

/// Resolved, immutable character table for one generation and flavor
#[derive(Debug, Clone)]
pub struct CharTable {
    generation: Generation,
    flavor: Flavor,
    /// Canonical Unicode form of each byte
    forward: Vec<Cow<'static, str>>,
    /// Single-codepoint spellings accepted on input
    reverse: HashMap<char, u8>,
    /// Framed keyword forms, longest first; empty when keywords are not rebuilt
    tokens: Vec<(String, u8)>,
}

impl CharTable {
    /// Build a table for the given generation and flavor
    pub fn new(generation: Generation, flavor: Flavor) -> Self {
        let mut forward: Vec<Cow<'static, str>> = (0u8..=0xFF)
            .map(|b| Cow::Owned((b as char).to_string()))
            .collect();
        let mut reverse: HashMap<char, u8> = (0u8..0x80).map(|b| (b as char, b)).collect();

        // Control bytes whose identity character is taken by a special get a
        // Control Picture instead, so every byte has a distinct form
        if flavor == Flavor::Basic {
            forward[0x06] = Cow::Borrowed("\t");
            reverse.insert('\t', 0x06);
            forward[0x09] = Cow::Borrowed("\u{2409}");
            reverse.insert('\u{2409}', 0x09);
        }
        forward[0x0A] = Cow::Borrowed("\u{240A}");
        reverse.insert('\u{240A}', 0x0A);
        forward[0x0D] = Cow::Borrowed("\n");
        reverse.insert('\n', 0x0D);

        for (byte, ch) in [(0x5Eu8, '\u{2191}'), (0x60, '\u{00A3}'), (0x7F, '\u{00A9}')] {
            forward[byte as usize] = Cow::Owned(ch.to_string());
            reverse.insert(ch, byte);
        }

        for (i, ch) in BLOCK_GRAPHICS.iter().enumerate() {
            forward[0x80 + i] = Cow::Owned(ch.to_string());
            reverse.insert(*ch, 0x80 + i as u8);
        }
        for ch in BLANK_GRAPHIC_ALIASES {
            reverse.insert(ch, 0x80);
        }

        for i in 0..UDG_COUNT {
            let byte = FIRST_UDG + i;
            for (style, base) in UDG_STYLES.iter().enumerate() {
                let Some(ch) = char::from_u32(base + u32::from(i)) else {
                    continue;
                };
                if style == 0 {
                    forward[byte as usize] = Cow::Owned(ch.to_string());
                }
                reverse.insert(ch, byte);
            }
        }

        let mut keywords: Vec<(&str, u8)> = KEYWORDS
            .iter()
            .enumerate()
            .map(|(i, kw)| (*kw, FIRST_COMMON_TOKEN + i as u8))
            .collect();
        if generation == Generation::Spectrum128 {
            keywords.extend(
                KEYWORDS_128.iter().enumerate().map(|(i, kw)| (*kw, FIRST_TOKEN + i as u8)),
            );
        }

        let mut tokens = Vec::new();
        for (keyword, byte) in keywords {
            let framed = format!(" {} ", keyword);
            if flavor == Flavor::Basic {
                tokens.push((framed.clone(), byte));
            }
            forward[byte as usize] = Cow::Owned(framed);
        }
        tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self { generation, flavor, forward, reverse, tokens }
    }

    /// Process-wide table for the given generation and flavor, built on first use
    pub fn shared(generation: Generation, flavor: Flavor) -> &'static CharTable {
        static TABLES: [OnceLock<CharTable>; 4] =
            [OnceLock::new(), OnceLock::new(), OnceLock::new(), OnceLock::new()];

        let index = match (generation, flavor) {
            (Generation::Spectrum128, Flavor::Basic) => 0,
            (Generation::Spectrum128, Flavor::Assembler) => 1,
            (Generation::Spectrum48, Flavor::Basic) => 2,
            (Generation::Spectrum48, Flavor::Assembler) => 3,
        };
        TABLES[index].get_or_init(|| CharTable::new(generation, flavor))
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Canonical Unicode form of a byte
    pub fn encode(&self, byte: u8) -> &str {
        &self.forward[byte as usize]
    }

    /// Byte for a complete Unicode form, or `None` if nothing matches.
    ///
    /// Keyword forms match with any surrounding whitespace, and runs of inner
    /// whitespace are collapsed (`"GO  TO"` is `GO TO`).
    pub fn decode(&self, form: &str) -> Option<u8> {
        let mut chars = form.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if let Some(&byte) = self.reverse.get(&ch) {
                return Some(byte);
            }
        }

        let normalized = form.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return None;
        }
        self.tokens
            .iter()
            .find(|(framed, _)| framed.trim() == normalized)
            .map(|(_, byte)| *byte)
    }

    /// Translate a run of native bytes to text
    pub fn to_text(&self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        for &byte in bytes {
            out.push_str(self.encode(byte));
        }
        out
    }

    /// Translate text to native bytes.
    ///
    /// Framed keyword forms are matched longest first (BASIC flavor only),
    /// then single characters; anything unknown is copied through as UTF-8.
    pub fn from_text(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        let mut rest = text;

        while let Some(ch) = rest.chars().next() {
            let token = self
                .tokens
                .iter()
                .find(|(framed, _)| rest.starts_with(framed.as_str()));
            if let Some((framed, byte)) = token {
                out.push(*byte);
                rest = &rest[framed.len()..];
                continue;
            }

            match self.reverse.get(&ch) {
                Some(&byte) => out.push(byte),
                None => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
            rest = &rest[ch.len_utf8()..];
        }

        out
    }
}

impl Default for CharTable {
    fn default() -> Self {
        Self::new(Generation::default(), Flavor::default())
    }
}
