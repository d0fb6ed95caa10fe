//! Text to GEN assembler encoder

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use crate::charset::{CharTable, Flavor, Generation};
use crate::header::{DiskHeader, TapeHeader, FILE_NAME_LEN, TAPE_HEADER_LEN};
use crate::lines::{number_lines, strip_bom};
use crate::options::ConvertOptions;

const LINE_END: u8 = 0x0D;

/// Result of encoding: the native file and, when requested, its tape header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub tape_header: Option<TapeHeader>,
}

impl Encoded {
    /// Bare 17-byte form of the tape header, as tape tools expect it
    pub fn tape_header_bytes(&self) -> Option<[u8; TAPE_HEADER_LEN]> {
        self.tape_header.as_ref().map(TapeHeader::to_bytes)
    }
}

/// Converts text to native assembler files
pub struct Encoder {
    options: ConvertOptions,
}

impl Encoder {
    /// Create an encoder with default options
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

    /// Encode assembler source text.
    ///
    /// A tape header is generated when `tape_name` is given; the name is cut
    /// to 10 characters.
    pub fn encode_assembler(&self, text: &str, tape_name: Option<&str>) -> Result<Encoded> {
        self.options.check_conflicts(tape_name.is_some())?;

        let records = number_lines(strip_bom(text).lines())?;
        let table = CharTable::shared(Generation::Spectrum48, Flavor::Assembler);

        let mut body = Vec::new();
        for record in &records {
            let mut number = [0u8; 2];
            // number_lines numbers every line
            LittleEndian::write_u16(&mut number, record.number.unwrap_or_default());
            body.extend_from_slice(&number);
            body.extend(table.from_text(&record.text));
            body.push(LINE_END);
        }

        let mut data = Vec::with_capacity(body.len() + 129);
        if self.options.emit_disk_header {
            let header = DiskHeader::for_code(body.len()).context("Cannot build disk header")?;
            debug!("Prepending disk header for {} bytes", body.len());
            data.extend_from_slice(&header.to_bytes());
        }
        data.extend_from_slice(&body);
        if let Some(sentinel) = self.options.soft_eof() {
            data.push(sentinel);
        }

        let tape_header = tape_name
            .map(|name| {
                let name: String = name.chars().take(FILE_NAME_LEN).collect();
                TapeHeader::for_code(&name, data.len())
            })
            .transpose()
            .context("Cannot build tape header")?;

        info!("Encoded {} assembler lines into {} bytes", records.len(), data.len());
        Ok(Encoded { data, tape_header })
    }

    /// Encode text directly to a writer
    pub fn encode_to_writer<W: Write>(&self, text: &str, mut writer: W) -> Result<()> {
        let encoded = self.encode_assembler(text, None)?;
        writer.write_all(&encoded.data)?;
        Ok(())
    }

    /// Encode a text file, writing the native file and optionally its tape
    /// header. The header is named after the output file.
    pub fn encode_to_files(
        &self,
        input: &Path,
        output: &Path,
        tape_header: Option<&Path>,
    ) -> Result<Encoded> {
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;

        let tape_name = tape_header.map(|_| tape_name_for(output));
        let encoded = self
            .encode_assembler(&text, tape_name.as_deref())
            .with_context(|| format!("Failed to encode {}", input.display()))?;

        std::fs::write(output, &encoded.data)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        if let (Some(path), Some(bytes)) = (tape_header, encoded.tape_header_bytes()) {
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        Ok(encoded)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tape file name for a native file: its base name, cut to 10 characters
pub fn tape_name_for(output: &Path) -> String {
    output
        .file_name()
        .map(|name| name.to_string_lossy().chars().take(FILE_NAME_LEN).collect())
        .unwrap_or_default()
}
