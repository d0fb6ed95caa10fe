//! Locating where meaningful data ends
//!
//! A saved BASIC program is followed by its variables, and files copied off
//! disk are often padded to a record boundary. When a header declares the
//! program length that value wins; otherwise the line structure is scanned.
//!
//! Tokenized BASIC line layout:
//!
//! ```text
//! [2] line number (BE)   values with bit 15 or 14 set start the variables area
//! [2] body length (LE)   including the trailing 0x0D
//! [n] body
//! ```

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;

use crate::header::FileHeader;

/// Bits that can never be set in a line number
pub const VARIABLES_MASK: u16 = 0xC000;

/// Whether a line-start value is a program line number rather than the
/// start of variable storage
pub fn is_program_line(value: u16) -> bool {
    value & VARIABLES_MASK == 0
}

/// Which strategy produced a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundarySource {
    DeclaredProgramLength,
    LineNumberScan,
    WholeBuffer,
}

impl BoundarySource {
    /// Only a header-declared length is trusted over the line structure
    pub fn is_authoritative(self) -> bool {
        self == BoundarySource::DeclaredProgramLength
    }
}

/// Offset at which live program data ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub offset: usize,
    pub source: BoundarySource,
}

/// One way of finding the end of a BASIC program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Program length taken from a header, if one declared it
    DeclaredProgramLength(Option<usize>),
    /// Walk the lines until a value with bit 15 or 14 set
    LineNumberScan,
    /// Everything is program
    WholeBuffer,
}

impl Strategy {
    /// Offset found by this strategy, or `None` when it does not apply
    pub fn resolve(&self, data: &[u8]) -> Option<usize> {
        match *self {
            Strategy::DeclaredProgramLength(length) => length.map(|n| n.min(data.len())),
            Strategy::LineNumberScan => scan_program_end(data),
            Strategy::WholeBuffer => Some(data.len()),
        }
    }

    pub fn source(&self) -> BoundarySource {
        match self {
            Strategy::DeclaredProgramLength(_) => BoundarySource::DeclaredProgramLength,
            Strategy::LineNumberScan => BoundarySource::LineNumberScan,
            Strategy::WholeBuffer => BoundarySource::WholeBuffer,
        }
    }
}

/// Standard order: header, then scan, then the whole buffer
pub fn program_strategies(header: &FileHeader) -> [Strategy; 3] {
    [
        Strategy::DeclaredProgramLength(header.program_length()),
        Strategy::LineNumberScan,
        Strategy::WholeBuffer,
    ]
}

/// Try each strategy in order; the first that applies wins
pub fn resolve(strategies: &[Strategy], data: &[u8]) -> Boundary {
    for strategy in strategies {
        if let Some(offset) = strategy.resolve(data) {
            let boundary = Boundary { offset, source: strategy.source() };
            debug!("Program end at offset {} ({:?})", boundary.offset, boundary.source);
            return boundary;
        }
    }
    Boundary { offset: data.len(), source: BoundarySource::WholeBuffer }
}

/// End of the BASIC program inside `data`, using the header when it knows
pub fn resolve_program_end(header: &FileHeader, data: &[u8]) -> Boundary {
    resolve(&program_strategies(header), data)
}

/// Skip from line to line using the stored body lengths.
///
/// Returns the offset of the first line-start value with bit 15 or 14 set,
/// or `None` if the data runs out (or a length points past the end) first.
pub fn scan_program_end(data: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        let number_bytes = data.get(pos..pos + 2)?;
        let number = BigEndian::read_u16(number_bytes);
        if !is_program_line(number) {
            return Some(pos);
        }

        let length_bytes = data.get(pos + 2..pos + 4)?;
        let next = pos + 4 + LittleEndian::read_u16(length_bytes) as usize;
        if next > data.len() {
            debug!("Line {} at offset {} claims a body past the end of data", number, pos);
            return None;
        }
        pos = next;
    }
}

/// Offset of the first Soft-EOF sentinel, or the full length if there is none
pub fn soft_eof_limit(data: &[u8], sentinel: u8) -> usize {
    match data.iter().position(|&b| b == sentinel) {
        Some(pos) => {
            debug!("Soft-EOF {:#04x} at offset {}", sentinel, pos);
            pos
        }
        None => data.len(),
    }
}

/// Some assembler files start with a spurious 16-bit length. Returns how many
/// leading bytes to skip: 2 when the first word equals the data length with
/// or without itself, 0 otherwise.
///
/// The word is accepted in either byte order. A real first line number
/// (typically 1 or 10, i.e. 256 or 2560 swapped) practically never matches.
pub fn leading_length_prefix(data: &[u8]) -> usize {
    let Some(word) = data.get(..2) else {
        return 0;
    };
    let matches = |value: usize| value == data.len() || value == data.len() - 2;

    let little = LittleEndian::read_u16(word) as usize;
    let big = BigEndian::read_u16(word) as usize;
    if matches(little) || matches(big) {
        debug!("Skipping leading length word {:#06x} (data length {})", little, data.len());
        2
    } else {
        0
    }
}
