//! Error types for header parsing and conversion

/// Error type for header parsing and generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Supplied header has neither the bare nor the framed size
    InvalidLength { found: usize },
    /// Framed tape header does not start with the header-block marker
    MissingMarker { found: u8 },
    /// Checksum byte does not match the computed one
    ChecksumMismatch { expected: u8, actual: u8 },
    /// File type tag is not one of the four known types
    UnknownFileType { tag: u8 },
    /// A type-dependent field holds a value the type does not allow
    InvalidField { field: &'static str, value: u16 },
    /// Length does not fit the header's length field
    LengthOverflow { length: usize, max: usize },
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderError::InvalidLength { found } => {
                write!(
                    f,
                    "Invalid tape header size: {} bytes (expected 17, or 19 when framed)",
                    found
                )
            }
            HeaderError::MissingMarker { found } => {
                write!(f, "Tape header block marker mismatch: expected 0x00, found {:#04x}", found)
            }
            HeaderError::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "Header checksum mismatch: expected {:#04x}, got {:#04x}",
                    expected, actual
                )
            }
            HeaderError::UnknownFileType { tag } => {
                write!(f, "Unknown file type tag: {}", tag)
            }
            HeaderError::InvalidField { field, value } => {
                write!(f, "Invalid header field {}: {:#06x}", field, value)
            }
            HeaderError::LengthOverflow { length, max } => {
                write!(f, "Length {} does not fit header (maximum {})", length, max)
            }
        }
    }
}

impl std::error::Error for HeaderError {}

/// Error type for conversion setup and line numbering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Two options that cannot be combined were requested together
    ConflictingOptions { first: &'static str, second: &'static str },
    /// Assigned or parsed line number exceeds 16 bits
    LineNumberOverflow { line: usize },
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::ConflictingOptions { first, second } => {
                write!(f, "Cannot use {} at the same time as {}", first, second)
            }
            ConvertError::LineNumberOverflow { line } => {
                write!(f, "Line number overflow at text line {}", line)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_message_names_both_values() {
        let err = HeaderError::ChecksumMismatch { expected: 0x12, actual: 0x34 };
        let msg = err.to_string();
        assert!(msg.contains("0x12"));
        assert!(msg.contains("0x34"));
    }

    #[test]
    fn test_conflict_message() {
        let err = ConvertError::ConflictingOptions { first: "--tape-header", second: "--soft-eof" };
        assert_eq!(err.to_string(), "Cannot use --tape-header at the same time as --soft-eof");
    }
}
