//! ZX Spectrum file headers
//!
//! Two physical layouts carry the same type information:
//!
//! ```text
//! Tape header (17 bytes, optionally framed as 19):
//!   [1]  marker 0x00            (framed form only)
//!   [1]  file type
//!   [10] file name, space padded
//!   [2]  length (LE)
//!   [2]  field A (LE)           autostart line / load address / array name
//!   [2]  field B (LE)           program length / 0x8000
//!   [1]  XOR checksum           (framed form only)
//!
//! +3DOS disk header (128 bytes):
//!   [8]  "PLUS3DOS"
//!   [1]  0x1A
//!   [1]  issue, [1] version
//!   [4]  file length including this header (LE)
//!   [8]  type header: type, length, field A, field B, pad
//!   [..] reserved
//!   [1]  checksum: sum of bytes 0..127 mod 256
//! ```

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use crate::charset::{CharTable, Flavor, Generation};
use crate::error::HeaderError;

pub const TAPE_HEADER_LEN: usize = 17;
pub const FRAMED_TAPE_HEADER_LEN: usize = TAPE_HEADER_LEN + 2;
pub const TAPE_HEADER_MARKER: u8 = 0x00;
pub const FILE_NAME_LEN: usize = 10;

pub const DISK_HEADER_LEN: usize = 128;
pub const DISK_SIGNATURE: &[u8; 8] = b"PLUS3DOS";
pub const DISK_SENTINEL: u8 = 0x1A;
const DISK_TYPE_HEADER_OFFSET: usize = 15;
const DISK_TYPE_HEADER_LEN: usize = 8;

/// Autostart field value meaning "no autostart" (anything from here up)
pub const NO_AUTOSTART: u16 = 0x8000;
/// Load address used when none is known: the screen, so a wrong
/// `LOAD "" CODE` shows up as garbage on the display
pub const DEFAULT_LOAD_ADDRESS: u16 = 16384;
const CODE_TAPE_FIELD_B: u16 = 0x8000;

/// File type tag shared by both header layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Program = 0,
    NumericArray = 1,
    CharArray = 2,
    CodeOrScreen = 3,
}

impl FileType {
    pub fn from_tag(tag: u8) -> Result<Self, HeaderError> {
        match tag {
            0 => Ok(FileType::Program),
            1 => Ok(FileType::NumericArray),
            2 => Ok(FileType::CharArray),
            3 => Ok(FileType::CodeOrScreen),
            _ => Err(HeaderError::UnknownFileType { tag }),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Type-dependent part of a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDetail {
    /// BASIC program; `program_length` is the offset where variables begin
    Program { autostart: Option<u16>, program_length: u16 },
    NumericArray { name: char },
    CharArray { name: char },
    CodeOrScreen { load_address: u16 },
}

/// Where a type header is stored; CODE headers differ in field B
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Medium {
    Tape,
    Disk,
}

/// Type, length and the two type-dependent fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHeader {
    pub length: u16,
    pub detail: TypeDetail,
}

impl TypeHeader {
    /// CODE block of `length` bytes loading at `load_address`
    pub fn code(length: u16, load_address: u16) -> Self {
        Self { length, detail: TypeDetail::CodeOrScreen { load_address } }
    }

    pub fn program(length: u16, autostart: Option<u16>, program_length: u16) -> Self {
        Self { length, detail: TypeDetail::Program { autostart, program_length } }
    }

    pub fn file_type(&self) -> FileType {
        match self.detail {
            TypeDetail::Program { .. } => FileType::Program,
            TypeDetail::NumericArray { .. } => FileType::NumericArray,
            TypeDetail::CharArray { .. } => FileType::CharArray,
            TypeDetail::CodeOrScreen { .. } => FileType::CodeOrScreen,
        }
    }

    /// Offset where program ends and variables begin, for BASIC programs
    pub fn program_length(&self) -> Option<u16> {
        match self.detail {
            TypeDetail::Program { program_length, .. } => Some(program_length),
            _ => None,
        }
    }

    /// Decode from the type tag and the 6 bytes holding length, field A and field B
    fn decode(tag: u8, fields: &[u8]) -> Result<Self, HeaderError> {
        let file_type = FileType::from_tag(tag)?;
        let length = LittleEndian::read_u16(&fields[0..2]);
        let field_a = LittleEndian::read_u16(&fields[2..4]);
        let field_b = LittleEndian::read_u16(&fields[4..6]);

        let detail = match file_type {
            FileType::Program => {
                let autostart = match field_a {
                    NO_AUTOSTART..=u16::MAX => None,
                    1..=9999 => Some(field_a),
                    _ => {
                        return Err(HeaderError::InvalidField {
                            field: "autostart line",
                            value: field_a,
                        })
                    }
                };
                TypeDetail::Program { autostart, program_length: field_b }
            }
            FileType::NumericArray => {
                TypeDetail::NumericArray { name: decode_array_name(fields[3])? }
            }
            FileType::CharArray => TypeDetail::CharArray { name: decode_array_name(fields[3])? },
            FileType::CodeOrScreen => TypeDetail::CodeOrScreen { load_address: field_a },
        };

        Ok(Self { length, detail })
    }

    /// Encode the type tag followed by length, field A and field B (7 bytes)
    fn encode(&self, out: &mut [u8], medium: Medium) {
        out[0] = self.file_type().tag();
        LittleEndian::write_u16(&mut out[1..3], self.length);

        let (field_a, field_b) = match self.detail {
            TypeDetail::Program { autostart, program_length } => {
                (autostart.unwrap_or(NO_AUTOSTART), program_length)
            }
            TypeDetail::NumericArray { name } => (u16::from(encode_array_name(name, 0x80)) << 8, 0),
            TypeDetail::CharArray { name } => (u16::from(encode_array_name(name, 0xC0)) << 8, 0),
            TypeDetail::CodeOrScreen { load_address } => match medium {
                Medium::Tape => (load_address, CODE_TAPE_FIELD_B),
                Medium::Disk => (load_address, 0),
            },
        };
        LittleEndian::write_u16(&mut out[3..5], field_a);
        LittleEndian::write_u16(&mut out[5..7], field_b);
    }
}

/// Array names are stored either as a plain letter or in the ROM's
/// variable-name form, whose low five bits index the letter
fn decode_array_name(byte: u8) -> Result<char, HeaderError> {
    if byte.is_ascii_alphabetic() {
        return Ok(byte.to_ascii_lowercase() as char);
    }
    let index = byte & 0x1F;
    if byte & 0x80 != 0 && (1..=26).contains(&index) {
        return Ok((b'a' + index - 1) as char);
    }
    Err(HeaderError::InvalidField { field: "array name", value: u16::from(byte) })
}

fn encode_array_name(name: char, kind_bits: u8) -> u8 {
    let letter = if name.is_ascii_alphabetic() { name as u8 } else { b'a' };
    kind_bits | (letter & 0x1F)
}

/// Sum of bytes modulo 256
fn additive_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// XOR of all bytes
fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn name_table() -> &'static CharTable {
    CharTable::shared(Generation::Spectrum48, Flavor::Assembler)
}

/// +3DOS file header found at the start of files copied off a +3 disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskHeader {
    pub issue: u8,
    pub version: u8,
    /// File length including the 128-byte header
    pub file_length: u32,
    /// `None` when the embedded type header is all zeroes
    pub type_header: Option<TypeHeader>,
}

impl DiskHeader {
    /// Header for a CODE file of `data_length` bytes at the default load address
    pub fn for_code(data_length: usize) -> Result<Self, HeaderError> {
        let overflow = |max: usize| HeaderError::LengthOverflow { length: data_length, max };
        let length = u16::try_from(data_length).map_err(|_| overflow(u16::MAX as usize))?;
        let file_length = u32::try_from(data_length + DISK_HEADER_LEN)
            .map_err(|_| overflow(u32::MAX as usize))?;

        Ok(Self {
            issue: 1,
            version: 0,
            file_length,
            type_header: Some(TypeHeader::code(length, DEFAULT_LOAD_ADDRESS)),
        })
    }

    /// Look for a valid header in the first 128 bytes of `input`.
    ///
    /// Missing or damaged headers are expected and yield `None`.
    pub fn detect(input: &[u8]) -> Option<Self> {
        let Some(bytes) = input.get(..DISK_HEADER_LEN) else {
            trace!("Input shorter than a disk header ({} bytes)", input.len());
            return None;
        };

        if &bytes[0..8] != DISK_SIGNATURE || bytes[8] != DISK_SENTINEL {
            trace!("No disk header signature");
            return None;
        }

        let expected = bytes[DISK_HEADER_LEN - 1];
        let actual = additive_checksum(&bytes[..DISK_HEADER_LEN - 1]);
        if expected != actual {
            debug!(
                "Disk header signature found but checksum fails: expected={:#04x}, actual={:#04x}",
                expected, actual
            );
            return None;
        }

        let type_end = DISK_TYPE_HEADER_OFFSET + DISK_TYPE_HEADER_LEN;
        let type_bytes = &bytes[DISK_TYPE_HEADER_OFFSET..type_end];
        let type_header = if type_bytes.iter().all(|&b| b == 0) {
            None
        } else {
            match TypeHeader::decode(type_bytes[0], &type_bytes[1..7]) {
                Ok(th) => Some(th),
                Err(e) => {
                    debug!("Disk header type information rejected: {}", e);
                    return None;
                }
            }
        };

        let header = Self {
            issue: bytes[9],
            version: bytes[10],
            file_length: LittleEndian::read_u32(&bytes[11..15]),
            type_header,
        };
        debug!(
            "Disk header found: file_length={}, type={:?}",
            header.file_length, header.type_header
        );
        Some(header)
    }

    /// Length of the data following the header
    pub fn data_length(&self) -> usize {
        (self.file_length as usize).saturating_sub(DISK_HEADER_LEN)
    }

    pub fn to_bytes(&self) -> [u8; DISK_HEADER_LEN] {
        let mut bytes = [0u8; DISK_HEADER_LEN];
        bytes[0..8].copy_from_slice(DISK_SIGNATURE);
        bytes[8] = DISK_SENTINEL;
        bytes[9] = self.issue;
        bytes[10] = self.version;
        LittleEndian::write_u32(&mut bytes[11..15], self.file_length);
        if let Some(th) = &self.type_header {
            let fields = &mut bytes[DISK_TYPE_HEADER_OFFSET..DISK_TYPE_HEADER_OFFSET + 7];
            th.encode(fields, Medium::Disk);
        }
        bytes[DISK_HEADER_LEN - 1] = additive_checksum(&bytes[..DISK_HEADER_LEN - 1]);
        bytes
    }
}

/// Whether the tape header came with a checksum that was verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    /// Framed form, XOR checksum matched
    Verified,
    /// Bare 17-byte payload, nothing to check
    Unchecked,
}

/// Tape header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeHeader {
    pub name: String,
    pub type_header: TypeHeader,
    pub integrity: Integrity,
}

impl TapeHeader {
    /// Header for a CODE file of `length` bytes at the default load address
    pub fn for_code(name: &str, length: usize) -> Result<Self, HeaderError> {
        let length = u16::try_from(length)
            .map_err(|_| HeaderError::LengthOverflow { length, max: u16::MAX as usize })?;
        Ok(Self {
            name: name.trim().to_string(),
            type_header: TypeHeader::code(length, DEFAULT_LOAD_ADDRESS),
            integrity: Integrity::Unchecked,
        })
    }

    /// Parse a user-supplied header, either the bare 17-byte payload or the
    /// 19-byte block with leading marker and trailing XOR checksum
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        let (payload, integrity) = match bytes.len() {
            TAPE_HEADER_LEN => (bytes, Integrity::Unchecked),
            FRAMED_TAPE_HEADER_LEN => {
                if bytes[0] != TAPE_HEADER_MARKER {
                    return Err(HeaderError::MissingMarker { found: bytes[0] });
                }
                let payload = &bytes[1..FRAMED_TAPE_HEADER_LEN - 1];
                let expected = bytes[FRAMED_TAPE_HEADER_LEN - 1];
                let actual = xor_checksum(payload);
                if expected != actual {
                    return Err(HeaderError::ChecksumMismatch { expected, actual });
                }
                (payload, Integrity::Verified)
            }
            found => return Err(HeaderError::InvalidLength { found }),
        };

        let type_header = TypeHeader::decode(payload[0], &payload[1 + FILE_NAME_LEN..])?;
        let name = name_table().to_text(&payload[1..1 + FILE_NAME_LEN]).trim().to_string();

        debug!(
            "Tape header parsed: name='{}', type={:?}, integrity={:?}",
            name, type_header, integrity
        );
        Ok(Self { name, type_header, integrity })
    }

    /// Bare 17-byte payload
    pub fn to_bytes(&self) -> [u8; TAPE_HEADER_LEN] {
        let mut bytes = [0u8; TAPE_HEADER_LEN];

        let mut name = name_table().from_text(self.name.trim());
        name.resize(FILE_NAME_LEN, b' ');
        bytes[1..1 + FILE_NAME_LEN].copy_from_slice(&name);

        let mut fields = [0u8; 7];
        self.type_header.encode(&mut fields, Medium::Tape);
        bytes[0] = fields[0];
        bytes[1 + FILE_NAME_LEN..].copy_from_slice(&fields[1..]);
        bytes
    }

    /// 19-byte block: marker, payload, XOR checksum
    pub fn to_framed_bytes(&self) -> [u8; FRAMED_TAPE_HEADER_LEN] {
        let payload = self.to_bytes();
        let mut bytes = [0u8; FRAMED_TAPE_HEADER_LEN];
        bytes[0] = TAPE_HEADER_MARKER;
        bytes[1..FRAMED_TAPE_HEADER_LEN - 1].copy_from_slice(&payload);
        bytes[FRAMED_TAPE_HEADER_LEN - 1] = xor_checksum(&payload);
        bytes
    }
}

/// Header information available for one conversion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FileHeader {
    #[default]
    None,
    Disk(DiskHeader),
    Tape(TapeHeader),
}

impl FileHeader {
    pub fn is_present(&self) -> bool {
        !matches!(self, FileHeader::None)
    }

    pub fn type_header(&self) -> Option<&TypeHeader> {
        match self {
            FileHeader::None => None,
            FileHeader::Disk(disk) => disk.type_header.as_ref(),
            FileHeader::Tape(tape) => Some(&tape.type_header),
        }
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.type_header().map(TypeHeader::file_type)
    }

    /// Declared data length (excluding any disk header)
    pub fn length(&self) -> Option<usize> {
        match self {
            FileHeader::None => None,
            FileHeader::Disk(disk) => Some(disk.data_length()),
            FileHeader::Tape(tape) => Some(tape.type_header.length as usize),
        }
    }

    /// Declared program/variables boundary for BASIC programs
    pub fn program_length(&self) -> Option<usize> {
        self.type_header()
            .and_then(TypeHeader::program_length)
            .map(usize::from)
    }

    /// True when a checksum backed the header
    pub fn is_verified(&self) -> bool {
        match self {
            FileHeader::None => false,
            FileHeader::Disk(_) => true,
            FileHeader::Tape(tape) => tape.integrity == Integrity::Verified,
        }
    }
}
