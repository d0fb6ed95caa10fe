//! Native file decoder: tokenized BASIC and GEN assembler to text

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, info, trace, warn};

use crate::boundary::{self, Boundary, BoundarySource};
use crate::charset::{CharTable, Flavor, Generation};
use crate::header::{DiskHeader, FileHeader, FileType, TapeHeader, DISK_HEADER_LEN};
use crate::lines::{render_lines, Dialect, LineRecord, UTF8_BOM};
use crate::options::ConvertOptions;

/// End of every native line
const LINE_END: u8 = 0x0D;
/// Start of a hidden binary copy of a number literal
const NUMBER_MARKER: u8 = 0x0E;
const NUMBER_LEN: usize = 5;

/// Line number (BE) plus body length (LE)
const BASIC_LINE_HEADER_LEN: usize = 4;
/// Line number (LE)
const ASM_LINE_HEADER_LEN: usize = 2;

/// Decoded program, ready to render as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub dialect: Dialect,
    pub header: FileHeader,
    pub boundary: Boundary,
    pub lines: Vec<LineRecord>,
    /// Print line numbers in front of each line
    pub numbered: bool,
}

impl Listing {
    /// Text form, one `\n` per line
    pub fn render(&self) -> String {
        render_lines(&self.lines, self.dialect, self.numbered)
    }

    /// Write the text form, prefixed by a byte order mark
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(UTF8_BOM.as_bytes())?;
        writer.write_all(self.render().as_bytes())?;
        Ok(())
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let mut text = String::from(UTF8_BOM);
        text.push_str(&self.render());
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Converts native files to text
pub struct Decoder {
    options: ConvertOptions,
}

impl Decoder {
    /// Create a decoder with default options
    pub fn new() -> Self {
        Self { options: ConvertOptions::default() }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Decode a tokenized BASIC program.
    ///
    /// `tape_header` is the content of a separately supplied tape header
    /// file; it must be valid when given.
    pub fn decode_basic(&self, input: &[u8], tape_header: Option<&[u8]>) -> Result<Listing> {
        self.options.check_conflicts(tape_header.is_some())?;

        let tape = tape_header
            .map(TapeHeader::parse)
            .transpose()
            .context("Invalid tape header")?;
        if let Some(tape) = &tape {
            if tape.type_header.file_type() != FileType::Program {
                warn!(
                    "Tape header describes {:?}, not a BASIC program; no program length available",
                    tape.type_header.file_type()
                );
            }
        }

        let (header, data) = self.limit_input(input, tape);
        let boundary = boundary::resolve_program_end(&header, data);
        let table = CharTable::shared(self.options.generation, Flavor::Basic);
        let stop_at_variables = !boundary.source.is_authoritative();
        let lines = decode_basic_lines(&data[..boundary.offset], table, stop_at_variables);

        info!("Decoded {} BASIC lines from {} bytes", lines.len(), boundary.offset);
        Ok(Listing {
            dialect: Dialect::Basic,
            header,
            boundary,
            lines,
            numbered: self.options.include_line_numbers,
        })
    }

    /// Decode a GEN assembler source file
    pub fn decode_assembler(&self, input: &[u8]) -> Result<Listing> {
        let (header, data) = self.limit_input(input, None);
        let data = &data[boundary::leading_length_prefix(data)..];

        let table = CharTable::shared(Generation::Spectrum48, Flavor::Assembler);
        let lines = decode_assembler_lines(data, table);

        info!("Decoded {} assembler lines from {} bytes", lines.len(), data.len());
        Ok(Listing {
            dialect: Dialect::Assembler,
            header,
            boundary: Boundary { offset: data.len(), source: BoundarySource::WholeBuffer },
            lines,
            numbered: self.options.include_line_numbers,
        })
    }

    pub fn decode_basic_file(&self, path: &Path, tape_header: Option<&Path>) -> Result<Listing> {
        let input = read_file(path)?;
        let tape = tape_header.map(read_file).transpose()?;
        self.decode_basic(&input, tape.as_deref())
            .with_context(|| format!("Failed to decode {}", path.display()))
    }

    pub fn decode_assembler_file(&self, path: &Path) -> Result<Listing> {
        let input = read_file(path)?;
        self.decode_assembler(&input)
            .with_context(|| format!("Failed to decode {}", path.display()))
    }

    /// Strip a disk header and cut the input down to the declared length
    /// and to the Soft-EOF byte, whichever comes first
    fn limit_input<'a>(&self, input: &'a [u8], tape: Option<TapeHeader>) -> (FileHeader, &'a [u8]) {
        let mut data = input;

        let disk = DiskHeader::detect(input);
        if disk.is_some() {
            data = &input[DISK_HEADER_LEN..];
        }

        let header = match (tape, disk) {
            (Some(tape), Some(_)) => {
                warn!("Input has a disk header; using the supplied tape header instead");
                FileHeader::Tape(tape)
            }
            (Some(tape), None) => FileHeader::Tape(tape),
            (None, Some(disk)) => FileHeader::Disk(disk),
            (None, None) => FileHeader::None,
        };
        if !header.is_present() {
            debug!("No file header, data end found by scanning");
        }

        if let Some(length) = header.length() {
            if length < data.len() {
                debug!(
                    "Ignoring {} bytes past the declared length {}",
                    data.len() - length,
                    length
                );
                data = &data[..length];
            }
        }
        if let Some(sentinel) = self.options.soft_eof() {
            data = &data[..boundary::soft_eof_limit(data, sentinel)];
        }

        (header, data)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Decode BASIC lines up to the end of `program`.
///
/// Bodies are read up to their 0x0D rather than skipped by their stored
/// length. A line cut short by the end of data is still emitted.
fn decode_basic_lines(
    program: &[u8],
    table: &CharTable,
    stop_at_variables: bool,
) -> Vec<LineRecord> {
    let mut lines = Vec::new();
    let mut pos = 0;

    while let Some(head) = program.get(pos..pos + BASIC_LINE_HEADER_LEN) {
        let number = BigEndian::read_u16(&head[0..2]);
        if stop_at_variables && !boundary::is_program_line(number) {
            debug!("Variables start at offset {}", pos);
            break;
        }
        let stored = LittleEndian::read_u16(&head[2..4]);
        trace!("Line {} at offset {}, stored length {}", number, pos, stored);

        let (body, next) = read_body(program, pos + BASIC_LINE_HEADER_LEN, true);
        lines.push(LineRecord::new(Some(number), table.to_text(&body)));
        pos = next;
    }

    lines
}

/// Decode assembler lines; each is a LE line number followed by text up to 0x0D
fn decode_assembler_lines(data: &[u8], table: &CharTable) -> Vec<LineRecord> {
    let mut lines = Vec::new();
    let mut pos = 0;

    while data.len() - pos > ASM_LINE_HEADER_LEN {
        let number = LittleEndian::read_u16(&data[pos..pos + ASM_LINE_HEADER_LEN]);
        let (body, next) = read_body(data, pos + ASM_LINE_HEADER_LEN, false);
        trace!("Line {} at offset {}, {} bytes", number, pos, body.len());
        lines.push(LineRecord::new(Some(number), table.to_text(&body)));
        pos = next;
    }

    lines
}

/// Collect body bytes from `start` up to the line end, returning the body
/// and the offset just past the line end
fn read_body(data: &[u8], start: usize, skip_numbers: bool) -> (Vec<u8>, usize) {
    let mut body = Vec::new();
    let mut pos = start;

    while let Some(&byte) = data.get(pos) {
        pos += 1;
        match byte {
            LINE_END => break,
            NUMBER_MARKER if skip_numbers => pos = (pos + NUMBER_LEN).min(data.len()),
            _ => body.push(byte),
        }
    }

    (body, pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvertError, HeaderError};
    use crate::header::{Integrity, TypeHeader};
    use std::io::Read;

    const PRINT: u8 = 0xF5;
    const GO_TO: u8 = 0xEC;

    fn basic_line(number: u16, body: &[u8]) -> Vec<u8> {
        let mut line = number.to_be_bytes().to_vec();
        line.extend_from_slice(&((body.len() + 1) as u16).to_le_bytes());
        line.extend_from_slice(body);
        line.push(LINE_END);
        line
    }

    fn asm_line(number: u16, body: &[u8]) -> Vec<u8> {
        let mut line = number.to_le_bytes().to_vec();
        line.extend_from_slice(body);
        line.push(LINE_END);
        line
    }

    fn two_line_program() -> Vec<u8> {
        let mut program = basic_line(10, &[PRINT, b'"', b'h', b'i', b'"']);
        program.extend(basic_line(20, &[GO_TO, b'1', b'0']));
        program
    }

    fn assembler_source() -> Vec<u8> {
        let mut data = asm_line(10, b"\tORG\t32768");
        data.extend(asm_line(20, b"\tRET"));
        data
    }

    #[test]
    fn test_decode_stops_at_variables_marker() {
        let mut input = two_line_program();
        input.extend_from_slice(&[0x80, 0x00, 0x41, 0x42]);

        let listing = Decoder::new().decode_basic(&input, None).unwrap();

        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.lines[0], LineRecord::new(Some(10), " PRINT \"hi\""));
        assert_eq!(listing.lines[1], LineRecord::new(Some(20), " GO TO 10"));
        assert_eq!(listing.boundary.offset, two_line_program().len());
        assert_eq!(listing.boundary.source, BoundarySource::LineNumberScan);
        assert_eq!(listing.header, FileHeader::None);
    }

    #[test]
    fn test_decoded_lines_reencode_to_program_bytes() {
        let program = two_line_program();
        let mut input = program.clone();
        input.extend_from_slice(&[0xC0, 0x00]);

        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        let table = CharTable::shared(Generation::Spectrum128, Flavor::Basic);

        let mut reencoded = Vec::new();
        for line in &listing.lines {
            reencoded.extend(basic_line(line.number.unwrap(), &table.from_text(&line.text)));
        }
        assert_eq!(reencoded, program);
    }

    #[test]
    fn test_render_with_and_without_numbers() {
        let decoder = Decoder::new();
        let listing = decoder.decode_basic(&two_line_program(), None).unwrap();
        assert_eq!(listing.render(), " PRINT \"hi\"\n GO TO 10\n");

        let decoder = Decoder::new().with_options(ConvertOptions::new().with_line_numbers(true));
        let listing = decoder.decode_basic(&two_line_program(), None).unwrap();
        assert_eq!(listing.render(), "  10  PRINT \"hi\"\n  20  GO TO 10\n");
    }

    #[test]
    fn test_number_literals_are_hidden() {
        let input = basic_line(10, &[GO_TO, b'1', b'0', NUMBER_MARKER, 0, 0, 10, 0, 0]);
        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines, vec![LineRecord::new(Some(10), " GO TO 10")]);
    }

    #[test]
    fn test_number_literal_holding_line_end() {
        let input = basic_line(10, &[b'1', NUMBER_MARKER, 0, 0, LINE_END, 0, 0]);
        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines, vec![LineRecord::new(Some(10), "1")]);
    }

    #[test]
    fn test_truncated_last_line_is_kept() {
        let mut input = two_line_program();
        input.truncate(input.len() - 2);
        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.lines[1].text, " GO TO 1");
    }

    #[test]
    fn test_soft_eof_cuts_input() {
        let first = basic_line(10, &[PRINT, b'1']);
        let mut input = first.clone();
        input.push(0x1A);
        input.extend(basic_line(20, &[PRINT, b'2']));
        input.extend(basic_line(30, &[PRINT, b'3']));

        let decoder = Decoder::new().with_options(ConvertOptions::new().with_soft_eof(true));
        let listing = decoder.decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines, vec![LineRecord::new(Some(10), " PRINT 1")]);
        assert_eq!(listing.boundary.offset, first.len());

        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert!(listing.lines.len() > 1);
    }

    fn with_disk_header(program: &[u8], program_length: usize) -> Vec<u8> {
        let disk = DiskHeader {
            issue: 1,
            version: 0,
            file_length: (DISK_HEADER_LEN + program.len()) as u32,
            type_header: Some(TypeHeader::program(
                program.len() as u16,
                Some(10),
                program_length as u16,
            )),
        };
        let mut input = disk.to_bytes().to_vec();
        input.extend_from_slice(program);
        input.extend_from_slice(&[0x1A; 100]);
        input
    }

    #[test]
    fn test_disk_header_length_wins() {
        let mut program = basic_line(10, &[PRINT, b'1']);
        let first_line_len = program.len();
        program.extend(basic_line(20, &[PRINT, b'2']));

        let input = with_disk_header(&program, program.len());
        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert!(matches!(listing.header, FileHeader::Disk(_)));

        let input = with_disk_header(&program, first_line_len);
        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines.len(), 1);
        assert_eq!(
            listing.boundary,
            Boundary { offset: first_line_len, source: BoundarySource::DeclaredProgramLength }
        );
    }

    #[test]
    fn test_soft_eof_applies_after_disk_header() {
        let first = basic_line(10, &[PRINT, b'1']);
        let mut program = first.clone();
        program.push(0x1A);
        program.extend(basic_line(20, &[PRINT, b'2']));

        let disk = DiskHeader {
            issue: 1,
            version: 0,
            file_length: (DISK_HEADER_LEN + program.len()) as u32,
            type_header: None,
        };
        let mut input = disk.to_bytes().to_vec();
        input.extend_from_slice(&program);

        let decoder = Decoder::new().with_options(ConvertOptions::new().with_soft_eof(true));
        let listing = decoder.decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines, vec![LineRecord::new(Some(10), " PRINT 1")]);
        assert_eq!(listing.boundary.offset, first.len());

        // declared program length shorter than the sentinel offset wins
        let mut program = first.clone();
        program.extend(basic_line(20, &[PRINT, b'2']));
        program.push(0x1A);
        let listing = decoder.decode_basic(&with_disk_header(&program, first.len()), None).unwrap();
        assert_eq!(listing.lines.len(), 1);
    }

    #[test]
    fn test_tape_header_program_length() {
        let program = two_line_program();
        let mut input = program.clone();
        // variables that do not look like a marker
        input.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let tape = TapeHeader {
            name: "hello".to_string(),
            type_header: TypeHeader::program(input.len() as u16, None, program.len() as u16),
            integrity: Integrity::Unchecked,
        };

        let listing = Decoder::new().decode_basic(&input, Some(&tape.to_framed_bytes())).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.boundary.source, BoundarySource::DeclaredProgramLength);
        assert!(listing.header.is_verified());

        let listing = Decoder::new().decode_basic(&input, Some(&tape.to_bytes())).unwrap();
        assert!(!listing.header.is_verified());
    }

    #[test]
    fn test_tape_header_for_code_falls_back_to_scan() {
        let mut input = two_line_program();
        input.extend_from_slice(&[0x80, 0x00]);
        let tape = TapeHeader::for_code("code", input.len()).unwrap();

        let listing = Decoder::new().decode_basic(&input, Some(&tape.to_bytes())).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.boundary.source, BoundarySource::LineNumberScan);
    }

    #[test]
    fn test_code_tape_header_still_limits_length() {
        let program = two_line_program();
        let mut input = program.clone();
        input.extend(basic_line(30, &[PRINT, b'3']));
        let tape = TapeHeader::for_code("code", program.len()).unwrap();

        let listing = Decoder::new().decode_basic(&input, Some(&tape.to_bytes())).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(
            listing.boundary,
            Boundary { offset: program.len(), source: BoundarySource::WholeBuffer }
        );
    }

    #[test]
    fn test_invalid_tape_header_is_fatal() {
        let err = Decoder::new().decode_basic(&two_line_program(), Some(&[0u8; 18])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<HeaderError>(),
            Some(&HeaderError::InvalidLength { found: 18 })
        );
    }

    #[test]
    fn test_tape_header_conflicts_with_soft_eof() {
        let tape = TapeHeader::for_code("x", 1).unwrap().to_bytes();
        let decoder = Decoder::new().with_options(ConvertOptions::new().with_soft_eof(true));
        let err = decoder.decode_basic(&two_line_program(), Some(&tape)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::ConflictingOptions { .. })
        ));
    }

    #[test]
    fn test_48k_generation() {
        let input = basic_line(10, &[0xA3, 0xA4]);

        let listing = Decoder::new().decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines[0].text, " SPECTRUM  PLAY ");

        let options = ConvertOptions::new().with_generation(Generation::Spectrum48);
        let decoder = Decoder::new().with_options(options);
        let listing = decoder.decode_basic(&input, None).unwrap();
        assert_eq!(listing.lines[0].text, "🆃🆄");
    }

    #[test]
    fn test_decode_assembler() {
        let decoder = Decoder::new().with_options(ConvertOptions::new().with_line_numbers(true));
        let listing = decoder.decode_assembler(&assembler_source()).unwrap();

        assert_eq!(listing.dialect, Dialect::Assembler);
        assert_eq!(listing.lines[0], LineRecord::new(Some(10), "\tORG\t32768"));
        assert_eq!(listing.render(), "    10  \tORG\t32768\n    20  \tRET\n");
    }

    #[test]
    fn test_decode_assembler_leading_length() {
        let source = assembler_source();
        let mut input = (source.len() as u16).to_le_bytes().to_vec();
        input.extend_from_slice(&source);

        let listing = Decoder::new().decode_assembler(&input).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.lines[0].number, Some(10));
    }

    #[test]
    fn test_decode_assembler_big_endian_leading_length() {
        let source = assembler_source();
        let mut input = (source.len() as u16).to_be_bytes().to_vec();
        input.extend_from_slice(&source);

        let listing = Decoder::new().decode_assembler(&input).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.lines[0], LineRecord::new(Some(10), "\tORG\t32768"));
    }

    #[test]
    fn test_decode_assembler_disk_header_and_padding() {
        let source = assembler_source();
        let mut input = DiskHeader::for_code(source.len()).unwrap().to_bytes().to_vec();
        input.extend_from_slice(&source);
        input.extend_from_slice(&[0x1A; 64]);

        let listing = Decoder::new().decode_assembler(&input).unwrap();
        assert_eq!(listing.lines.len(), 2);
        assert_eq!(listing.header.file_type(), Some(FileType::CodeOrScreen));
    }

    #[test]
    fn test_decode_assembler_soft_eof() {
        let mut input = assembler_source();
        input.push(0x1A);
        input.extend(asm_line(30, b"\tgarbage"));

        let decoder = Decoder::new().with_options(ConvertOptions::new().with_soft_eof(true));
        let listing = decoder.decode_assembler(&input).unwrap();
        assert_eq!(listing.lines.len(), 2);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(Decoder::new().decode_basic(&[], None).unwrap().lines.is_empty());
        assert!(Decoder::new().decode_assembler(&[]).unwrap().lines.is_empty());
        assert!(Decoder::new().decode_assembler(&[10, 0]).unwrap().lines.is_empty());
    }

    #[test]
    fn test_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("prog.bas");
        let output_path = dir.path().join("prog.bas.txt");
        std::fs::write(&input_path, two_line_program()).unwrap();

        let listing = Decoder::new().decode_basic_file(&input_path, None).unwrap();
        listing.write_to_file(&output_path).unwrap();

        let mut text = String::new();
        std::fs::File::open(&output_path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "\u{FEFF} PRINT \"hi\"\n GO TO 10\n");

        let mut buffer = Vec::new();
        listing.write_to(&mut buffer).unwrap();
        assert_eq!(buffer, text.as_bytes());
    }

    #[test]
    fn test_decode_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Decoder::new().decode_assembler_file(&dir.path().join("missing")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
