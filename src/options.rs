//! Conversion options

use crate::charset::Generation;
use crate::error::ConvertError;

/// CP/M end-of-file marker, used by +3DOS for files without a header
pub const DEFAULT_SOFT_EOF: u8 = 0x1A;

/// Options recognized by every conversion direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Machine generation; `Spectrum48` turns 0xA3/0xA4 into graphics
    pub generation: Generation,
    /// Emit line numbers in text output
    pub include_line_numbers: bool,
    /// Stop reading at the Soft-EOF byte / append it when writing
    pub respect_soft_eof: bool,
    /// Value of the Soft-EOF byte
    pub soft_eof_byte: u8,
    /// Prepend a +3DOS disk header to native output
    pub emit_disk_header: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            generation: Generation::default(),
            include_line_numbers: false,
            respect_soft_eof: false,
            soft_eof_byte: DEFAULT_SOFT_EOF,
            emit_disk_header: false,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_line_numbers(mut self, enabled: bool) -> Self {
        self.include_line_numbers = enabled;
        self
    }

    pub fn with_soft_eof(mut self, enabled: bool) -> Self {
        self.respect_soft_eof = enabled;
        self
    }

    pub fn with_soft_eof_byte(mut self, byte: u8) -> Self {
        self.soft_eof_byte = byte;
        self
    }

    pub fn with_disk_header(mut self, enabled: bool) -> Self {
        self.emit_disk_header = enabled;
        self
    }

    /// Soft-EOF byte when enabled
    pub fn soft_eof(&self) -> Option<u8> {
        self.respect_soft_eof.then_some(self.soft_eof_byte)
    }

    /// Reject combinations that mix tape and disk handling.
    ///
    /// `tape_header` is true when a tape header is read or written in this run.
    pub fn check_conflicts(&self, tape_header: bool) -> Result<(), ConvertError> {
        if !tape_header {
            return Ok(());
        }
        if self.emit_disk_header {
            return Err(ConvertError::ConflictingOptions {
                first: "a tape header",
                second: "a disk header",
            });
        }
        if self.respect_soft_eof {
            return Err(ConvertError::ConflictingOptions {
                first: "a tape header",
                second: "Soft-EOF",
            });
        }
        Ok(())
    }
}
